//! Batch verification module
//!
//! Runs the fixity matcher over a whole set of files and records one report
//! row per file.
//!
//! # Submodules
//!
//! - `input` - Explicit file lists and folder walks
//! - `report` - Report rows, sinks and the CSV report file
//! - `runner` - The batch loop, tally and summary

pub mod input;
pub mod report;
pub mod runner;

pub use crate::fixity::FileError;
pub use input::InputSpec;
pub use report::{CsvReport, MemoryReport, ReportLocation, ReportRow, RowSink};
pub use runner::{BatchError, BatchEvent, BatchOptions, BatchRunner, BatchSummary, BatchTally};
