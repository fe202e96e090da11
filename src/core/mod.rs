//! Core functionality module
//!
//! Configuration and error handling shared by the rest of the crate.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases

pub mod config;
pub mod error;
