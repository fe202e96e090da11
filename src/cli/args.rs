//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Check whether local files are already held in a digital archive
#[derive(Parser, Debug)]
#[command(name = "holding-verification")]
#[command(version)]
#[command(about = "Check whether local files are already held in the archive by matching their checksums against recorded fixity values", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Checksum database to verify against (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Table holding the fixity values (overrides config)
    #[arg(short, long, global = true)]
    pub table: Option<String>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify files, or every file under folders, against the archive
    ///
    /// Give either files or folders, not both. One report row is written
    /// per file.
    Verify {
        /// Files or folders to verify
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Title added to the front of the report name (overrides config)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Folder the report is written to (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Verify against a fixity CSV export instead of the database
        #[arg(long, value_name = "CSV")]
        reference_csv: Option<PathBuf>,

        /// Also write the run summary as JSON
        #[arg(long, value_name = "FILE")]
        summary_json: Option<PathBuf>,
    },

    /// Answer a few questions, then verify (default when no command is given)
    Interactive,

    /// Build the checksum database from an archive fixity CSV export
    ///
    /// Rows are added to the table given by --table (or the configured
    /// table), which is created along with its digest index if needed.
    Import {
        /// Fixity CSV export to read
        csv: PathBuf,
    },

    /// Show the archive records holding a digest value
    Lookup {
        /// Digest value, in hex
        digest: String,
    },

    /// Show where the configuration file lives, or reset it
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\holding_verification\config.toml
    /// - Linux: ~/.config/holding_verification/config.toml
    /// - macOS: ~/Library/Application Support/holding_verification/config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_verify_with_overrides() {
        let args = Args::try_parse_from([
            "holding-verification",
            "--database",
            "other.db",
            "verify",
            "a.txt",
            "b.txt",
            "--prefix",
            "Accession 12",
        ])
        .unwrap();

        assert_eq!(args.database, Some(PathBuf::from("other.db")));
        match args.command {
            Some(Commands::Verify { paths, prefix, .. }) => {
                assert_eq!(paths, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
                assert_eq!(prefix.as_deref(), Some("Accession 12"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verify_needs_paths() {
        assert!(Args::try_parse_from(["holding-verification", "verify"]).is_err());
    }

    #[test]
    fn test_no_command() {
        let args = Args::try_parse_from(["holding-verification"]).unwrap();
        assert!(args.command.is_none());
    }
}
