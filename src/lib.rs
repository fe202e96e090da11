//! Holding Verification Library
//!
//! Checks whether local files are already held in a digital archive by
//! matching their checksums against the fixity values the archive recorded
//! at ingestion time, and writes an auditable report with one row per file.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration and error handling
//! - [`fixity`] - Digest computation, reference table lookups and the
//!   adaptive matcher
//! - [`batch`] - Input walking, the batch loop and the CSV report
//! - [`cli`] - Command-line interface (only used by the binary)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use holding_verification::batch::{BatchOptions, BatchRunner, CsvReport, InputSpec};
//! use holding_verification::core::config::Config;
//! use holding_verification::fixity::{AdaptiveMatcher, DigestComputer, SqliteFixityTable};
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!
//!     // The reference table is opened read-only
//!     let table = SqliteFixityTable::open(&config.reference.database, &config.reference.table)?;
//!     let matcher = AdaptiveMatcher::new(DigestComputer::default(), table);
//!     let runner = BatchRunner::new(matcher, BatchOptions::from_config(&config));
//!
//!     let input = InputSpec::from_paths(vec![PathBuf::from("accession_42")])?;
//!     let mut report = CsvReport::create(
//!         &config.report.output_dir,
//!         &config.report_prefix(),
//!         &input.report_label(),
//!         chrono::Local::now(),
//!     )?;
//!
//!     let summary = runner.run(&input, &mut report, |_| {})?;
//!     println!(
//!         "{} in archive, {} not in archive",
//!         summary.tally.matched, summary.tally.unmatched
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # Matching
//!
//! sha256, md5 and sha1 are tried in turn, starting with whichever
//! algorithm matched the previous file, and a file stops being hashed as
//! soon as one of its digests is found. See [`fixity::matcher`].

pub mod batch;
pub mod cli;
pub mod core;
pub mod fixity;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
