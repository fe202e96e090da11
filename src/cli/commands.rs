//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::batch::{
    BatchError, BatchEvent, BatchOptions, BatchRunner, BatchSummary, CsvReport, InputSpec,
};
use crate::cli::progress::{
    print_header, print_info, print_success, print_summary, print_warning, VerificationProgress,
};
use crate::cli::{Args, Commands};
use crate::core::config::{get_config_path, init_config, Config};
use crate::core::error::VerifyError;
use crate::fixity::{
    import_fixity_csv, AdaptiveMatcher, DigestComputer, FixityLookup, MemoryFixityTable,
    SqliteFixityTable,
};
use anyhow::{Context, Result};
use chrono::Local;
use dialoguer::{Confirm, Input, Select};
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Options of a single verification run beyond the configuration
#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    /// Verify against this fixity CSV export instead of the database
    pub reference_csv: Option<PathBuf>,
    /// Also write the summary here as JSON
    pub summary_json: Option<PathBuf>,
}

/// Run the appropriate command based on CLI arguments
///
/// With no subcommand the tool asks what to verify.
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    let mut config = apply_overrides(args, config);

    match &args.command {
        Some(Commands::Verify {
            paths,
            prefix,
            output_dir,
            reference_csv,
            summary_json,
        }) => {
            if let Some(prefix) = prefix {
                config.report.prefix = prefix.clone();
            }
            if let Some(output_dir) = output_dir {
                config.report.output_dir = output_dir.clone();
            }

            let input = InputSpec::from_paths(paths.clone())?;
            let request = VerifyRequest {
                reference_csv: reference_csv.clone(),
                summary_json: summary_json.clone(),
            };
            verify(&config, &input, &request, shutdown_flag)?;
        }
        Some(Commands::Interactive) | None => {
            run_interactive(&config, shutdown_flag)?;
        }
        Some(Commands::Import { csv }) => {
            import_csv(&config, csv)?;
        }
        Some(Commands::Lookup { digest }) => {
            lookup_digest(&config, digest)?;
        }
        Some(Commands::Config { path, reset }) => {
            handle_config_command(*path, *reset)?;
        }
        Some(Commands::GenerateConfig { output }) => {
            generate_config_file(output.clone())?;
        }
        Some(Commands::ShowConfig) => {
            show_config(&config);
        }
    }

    Ok(())
}

/// Apply the `--database` and `--table` overrides to a copy of the configuration
pub fn apply_overrides(args: &Args, config: &Config) -> Config {
    let mut config = config.clone();
    if let Some(ref database) = args.database {
        config.reference.database = database.clone();
    }
    if let Some(ref table) = args.table {
        config.reference.table = table.clone();
    }
    config
}

// ============================================================================
// Verification
// ============================================================================

/// Verify a batch and print its summary
pub fn verify(
    config: &Config,
    input: &InputSpec,
    request: &VerifyRequest,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<BatchSummary> {
    let lookup = open_reference(config, request.reference_csv.as_deref())?;

    let mut report = CsvReport::create(
        &config.report.output_dir,
        &config.report_prefix(),
        &input.report_label(),
        Local::now(),
    )?;

    let matcher = AdaptiveMatcher::new(DigestComputer::new(config.matching.chunk_size), lookup)
        .with_always_compute_primary(config.matching.always_compute_primary);
    let runner =
        BatchRunner::new(matcher, BatchOptions::from_config(config)).with_shutdown_flag(shutdown_flag);

    let mut progress = VerificationProgress::new();
    let outcome = runner.run(input, &mut report, |event| match event {
        BatchEvent::FileVerified { path, result, .. } => {
            progress.file_verified(path, result.matched())
        }
        BatchEvent::LargeFile { path, size_bytes } => progress.large_file(path, size_bytes),
        BatchEvent::Milestone { files_processed } => progress.milestone(files_processed),
        BatchEvent::WalkError(e) => progress.log_warning(&e.to_string()),
    });
    progress.finish();

    match outcome {
        Ok(summary) => {
            print_summary(&summary, progress.elapsed());
            write_summary_json(request.summary_json.as_deref(), &summary)?;
            Ok(summary)
        }
        Err(BatchError { source, partial }) => {
            error!("Verification stopped: {}", source);
            print_summary(&partial, progress.elapsed());
            write_summary_json(request.summary_json.as_deref(), &partial)?;
            Err(BatchError { source, partial }.into())
        }
    }
}

/// Open the reference table the run verifies against
fn open_reference(config: &Config, reference_csv: Option<&Path>) -> Result<Box<dyn FixityLookup>> {
    if let Some(csv) = reference_csv {
        let table = MemoryFixityTable::from_csv(csv, &config.import)?;
        return Ok(Box::new(table));
    }

    ensure_database(&config.reference.database)?;
    let table = SqliteFixityTable::open(&config.reference.database, &config.reference.table)?
        .with_cache(config.reference.cache_lookups);
    debug!("Reference table holds {} records", table.record_count()?);
    Ok(Box::new(table))
}

/// Make sure the checksum database is present
///
/// At a terminal the user is asked to add it until it appears or they give
/// up. Otherwise a missing database is an error.
pub fn ensure_database(database: &Path) -> std::result::Result<(), VerifyError> {
    while !database.exists() {
        if !console::user_attended() {
            return Err(VerifyError::DatabaseMissing(database.to_path_buf()));
        }

        print_warning(&format!(
            "Checksum database '{}' was not found.",
            database.display()
        ));
        let retry = Confirm::new()
            .with_prompt("Add it to that location, then continue?")
            .default(true)
            .interact()?;

        if !retry {
            return Err(VerifyError::DatabaseMissing(database.to_path_buf()));
        }
    }
    Ok(())
}

fn write_summary_json(path: Option<&Path>, summary: &BatchSummary) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };

    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    info!("Summary written to {}", path.display());
    Ok(())
}

// ============================================================================
// Interactive mode
// ============================================================================

/// Ask for a report title and one file or folder, then verify it
pub fn run_interactive(config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    print_header("HOLDING VERIFICATION");
    print_info(&format!(
        "Checksum database: {}",
        config.reference.database.display()
    ));
    println!();

    ensure_database(&config.reference.database)?;

    let prefix: String = Input::new()
        .with_prompt("Title to add to the report name (leave blank for none)")
        .allow_empty(true)
        .interact_text()?;

    let choice = Select::new()
        .with_prompt("What would you like to check?")
        .items(&["A single file", "A folder (every file inside it)"])
        .default(0)
        .interact()?;
    let want_folder = choice == 1;

    let path = prompt_for_path(want_folder)?;

    let mut config = config.clone();
    if !prefix.trim().is_empty() {
        config.report.prefix = prefix;
    }

    let input = InputSpec::from_paths(vec![path])?;
    verify(&config, &input, &VerifyRequest::default(), shutdown_flag)?;
    Ok(())
}

/// Keep asking until the answer is an existing file (or folder)
fn prompt_for_path(want_folder: bool) -> Result<PathBuf> {
    let kind = if want_folder { "folder" } else { "file" };

    loop {
        let answer: String = Input::new()
            .with_prompt(format!("Path of the {} to check", kind))
            .interact_text()?;
        let path = PathBuf::from(clean_path_input(&answer));

        let fits = if want_folder {
            path.is_dir()
        } else {
            path.is_file()
        };
        if fits {
            return Ok(path);
        }

        print_warning(&format!(
            "'{}' is not an existing {}, please try again.",
            path.display(),
            kind
        ));
    }
}

/// Strip whitespace and the quotes file managers add when copying a path
pub fn clean_path_input(answer: &str) -> &str {
    answer.trim().trim_matches(|c| c == '"' || c == '\'')
}

// ============================================================================
// Reference table commands
// ============================================================================

/// Build the checksum database from a fixity CSV export
pub fn import_csv(config: &Config, csv: &Path) -> Result<()> {
    let rows = import_fixity_csv(
        csv,
        &config.reference.database,
        &config.reference.table,
        &config.import,
    )?;

    print_success(&format!(
        "Added {} fixity records to table '{}' in {}",
        rows,
        config.reference.table,
        config.reference.database.display()
    ));
    Ok(())
}

/// Print the archive records holding one digest value
pub fn lookup_digest(config: &Config, digest: &str) -> Result<()> {
    let table = SqliteFixityTable::open(&config.reference.database, &config.reference.table)?;
    let digest = digest.trim().to_lowercase();
    let records = table.find_by_digest(&digest)?;

    if records.is_empty() {
        print_info(&format!("No archive records hold {}", digest));
        return Ok(());
    }

    print_success(&format!("{} record(s) hold {}", records.len(), digest));
    for record in &records {
        println!("    {}  ({})", record.file_ref, record.algorithm_name);
    }
    Ok(())
}

// ============================================================================
// Configuration commands
// ============================================================================

/// Handle the `config` command - show the path, or reset the config file
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                fs::remove_file(&config_path)?;
                info!("Removed existing config file");
            }
        }
        let path = init_config()?;
        info!("Created fresh config file at: {}", path.display());
        return Ok(());
    }

    let path = Config::get_active_config_path();
    if show_path {
        println!("{}", path.display());
        return Ok(());
    }

    if path.exists() {
        info!("Config file: {}", path.display());
    } else {
        let created = init_config()?;
        info!("Created default config file at: {}", created.display());
    }
    info!("Edit this file to change the database, report and matching settings.");
    info!("Run 'holding-verification show-config' to verify your settings.");
    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            fs::write(&path, Config::generate_default_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to customize the verification settings.");
    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[reference]");
    info!(
        "  database = \"{}\"",
        config.reference.database.display()
    );
    info!("  table = \"{}\"", config.reference.table);
    info!("  cache_lookups = {}", config.reference.cache_lookups);
    if !config.reference.database.exists() {
        info!("  ⚠ The checksum database does not exist yet - see the 'import' command");
    }
    info!("");
    info!("[matching]");
    info!(
        "  initial_algorithm = \"{}\"",
        config.matching.initial_algorithm
    );
    info!(
        "  always_compute_primary = {}",
        config.matching.always_compute_primary
    );
    info!("  chunk_size = {}", config.matching.chunk_size);
    info!(
        "  large_file_threshold = {}",
        config.matching.large_file_threshold
    );
    info!("");
    info!("[report]");
    info!("  output_dir = \"{}\"", config.report.output_dir.display());
    info!("  prefix = \"{}\"", config.report.prefix);
    info!("  progress_interval = {}", config.report.progress_interval);
    info!("");
    info!("[walk]");
    info!("  follow_symlinks = {}", config.walk.follow_symlinks);
    info!("");
    info!("[import]");
    info!("  file_ref_column = \"{}\"", config.import.file_ref_column);
    info!(
        "  fixity_value_column = \"{}\"",
        config.import.fixity_value_column
    );
    info!(
        "  algorithm_name_column = \"{}\"",
        config.import.algorithm_name_column
    );
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    #[test]
    fn test_clean_path_input() {
        assert_eq!(clean_path_input("  \"/data/my files\"  "), "/data/my files");
        assert_eq!(clean_path_input("'C:\\Accession 1'"), "C:\\Accession 1");
        assert_eq!(clean_path_input("plain.txt\n"), "plain.txt");
    }

    #[test]
    fn test_apply_overrides() {
        let args = Args::try_parse_from([
            "holding-verification",
            "--database",
            "other.db",
            "--table",
            "fixity_2024",
            "--log-level",
            "trace",
            "show-config",
        ])
        .unwrap();

        // main applies --log-level before the logger starts
        let config = apply_overrides(&args, &Config::default());
        assert_eq!(config.reference.database, PathBuf::from("other.db"));
        assert_eq!(config.reference.table, "fixity_2024");
        assert_eq!(config.logging.level, Config::default().logging.level);
    }

    #[test]
    fn test_ensure_database_present() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("checksums.db");
        fs::write(&db, b"").unwrap();
        assert!(ensure_database(&db).is_ok());
    }

    #[test]
    fn test_verify_against_reference_csv() {
        let files = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(files.path().join("empty.txt"), b"").unwrap();
        fs::write(files.path().join("other.txt"), b"content").unwrap();

        let reference = out.path().join("export.csv");
        fs::write(
            &reference,
            format!("file_ref,fixity_value,algorithm_name\nref-9,{},MD5\n", EMPTY_MD5),
        )
        .unwrap();

        let mut config = Config::default();
        config.report.output_dir = out.path().join("reports");
        config.report.prefix = "Accession 7".to_string();

        let request = VerifyRequest {
            reference_csv: Some(reference),
            summary_json: Some(out.path().join("summary.json")),
        };
        let input = InputSpec::from_paths(vec![files.path().to_path_buf()]).unwrap();

        let summary = verify(
            &config,
            &input,
            &request,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        assert_eq!(summary.tally.matched, 1);
        assert_eq!(summary.tally.unmatched, 1);
        assert!(summary.report_finalized);

        let report = summary.report.unwrap();
        let name = report.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Accession_7_INGESTED_FILES_in_"));
        assert!(!name.contains("_IN_PROGRESS"));
        assert!(report.exists());

        let json = fs::read_to_string(out.path().join("summary.json")).unwrap();
        let parsed: BatchSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.files_processed, 2);
    }

    #[test]
    fn test_import_then_lookup() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("export.csv");
        fs::write(&csv, "file_ref,fixity_value,algorithm_name\nref-1,abc,MD5\n").unwrap();

        let mut config = Config::default();
        config.reference.database = dir.path().join("checksums.db");

        import_csv(&config, &csv).unwrap();
        assert!(config.reference.database.exists());
        lookup_digest(&config, " ABC ").unwrap();
    }
}
