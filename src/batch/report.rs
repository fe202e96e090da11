//! Per-file report rows and where they go
//!
//! Every verified file produces exactly one [`ReportRow`], handed to a
//! [`RowSink`] in processing order. [`CsvReport`] is the durable sink: it
//! writes under an `_IN_PROGRESS` name, flushes each row as it is written,
//! and drops the marker by renaming the file once the batch completes.

use crate::core::error::{Result, VerifyError};
use crate::fixity::MatchResult;
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Marker carried by a report's file name until the batch completes
pub const IN_PROGRESS_SUFFIX: &str = "_IN_PROGRESS";

/// Timestamp format used in report file names
pub const REPORT_DATE_FORMAT: &str = "%d-%m-%Y-%H_%M_%S";

/// Header row of the CSV report
pub const REPORT_HEADERS: [&str; 7] = [
    "Local File Path",
    "File Size (Bytes)",
    "In Archive",
    "SHA256 Hash",
    "Matching File Refs",
    "Matching Algorithm Name",
    "Matching Algorithm Hash",
];

/// One line of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub matched: bool,
    pub primary_digest: String,
    /// Matching archive references joined with ", "
    pub matching_file_refs: String,
    pub matching_algorithm: String,
    pub matching_digest_value: String,
}

impl ReportRow {
    /// Build the row for a file from its match result
    pub fn from_match(path: &Path, size_bytes: u64, result: &MatchResult) -> Self {
        Self {
            path: path.to_path_buf(),
            size_bytes,
            matched: result.matched(),
            primary_digest: result.primary_digest.clone(),
            matching_file_refs: result.file_refs().join(", "),
            matching_algorithm: result.matching_algorithm_name().to_string(),
            matching_digest_value: result.matching_digest.clone(),
        }
    }

    /// Fields in report column order
    pub fn fields(&self) -> [String; 7] {
        [
            self.path.to_string_lossy().into_owned(),
            self.size_bytes.to_string(),
            if self.matched { "True" } else { "False" }.to_string(),
            self.primary_digest.clone(),
            self.matching_file_refs.clone(),
            self.matching_algorithm.clone(),
            self.matching_digest_value.clone(),
        ]
    }
}

/// Where a finished report ended up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLocation {
    /// Path of the report, if the sink writes one
    pub path: Option<PathBuf>,
    /// Whether the in-progress marker was removed
    pub finalized: bool,
    /// Why finalization did not happen, when it failed
    pub warning: Option<String>,
}

/// Ordered destination for report rows
pub trait RowSink {
    /// Append one row. An `Err` stops the batch.
    fn write_row(&mut self, row: &ReportRow) -> Result<()>;

    /// Current location of the report, while still in progress
    fn location(&self) -> Option<PathBuf>;

    /// Mark the report complete. Failing to do so is not fatal; the
    /// returned location says where the report actually is.
    fn finalize(&mut self) -> ReportLocation;
}

/// Report file name: `[prefix_]INGESTED_FILES_in_<label>_<date>_IN_PROGRESS.csv`
pub fn report_file_name(prefix: &str, label: &str, date: &str) -> String {
    let prefix = if prefix.is_empty() {
        String::new()
    } else {
        format!("{}_", prefix)
    };
    format!(
        "{}INGESTED_FILES_in_{}_{}{}.csv",
        prefix, label, date, IN_PROGRESS_SUFFIX
    )
}

/// Name of the report once the in-progress marker is dropped
pub fn finalized_name(in_progress: &Path) -> PathBuf {
    let name = in_progress
        .file_name()
        .map(|n| n.to_string_lossy().replace(IN_PROGRESS_SUFFIX, ""))
        .unwrap_or_default();
    in_progress.with_file_name(name)
}

/// CSV report on disk
pub struct CsvReport {
    writer: Option<csv::Writer<File>>,
    path: PathBuf,
    rows: usize,
}

impl CsvReport {
    /// Create the report in `output_dir`, named after the batch, and write the header
    pub fn create(
        output_dir: &Path,
        prefix: &str,
        label: &str,
        started: DateTime<Local>,
    ) -> Result<Self> {
        let date = started.format(REPORT_DATE_FORMAT).to_string();
        let path = output_dir.join(report_file_name(prefix, label, &date));
        Self::create_at(path)
    }

    /// Create the report at an explicit in-progress path
    pub fn create_at(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| report_error(&path, e))?;
        }

        let mut writer = csv::Writer::from_path(&path).map_err(|e| report_error(&path, e))?;
        writer
            .write_record(REPORT_HEADERS)
            .and_then(|_| writer.flush().map_err(csv::Error::from))
            .map_err(|e| report_error(&path, e))?;

        info!("Writing results to {}", path.display());
        Ok(Self {
            writer: Some(writer),
            path,
            rows: 0,
        })
    }

    /// Rows written so far
    pub fn rows_written(&self) -> usize {
        self.rows
    }
}

fn report_error(path: &Path, err: impl std::fmt::Display) -> VerifyError {
    VerifyError::ReportError {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

impl RowSink for CsvReport {
    fn write_row(&mut self, row: &ReportRow) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            report_error(&self.path, "report has already been finalized")
        })?;

        writer
            .write_record(row.fields())
            .and_then(|_| writer.flush().map_err(csv::Error::from))
            .map_err(|e| report_error(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    fn finalize(&mut self) -> ReportLocation {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush {}: {}", self.path.display(), e);
            }
        }

        let final_path = finalized_name(&self.path);
        match fs::rename(&self.path, &final_path) {
            Ok(()) => {
                info!(
                    "Report complete: {} row(s) in {}",
                    self.rows_written(),
                    final_path.display()
                );
                self.path = final_path.clone();
                ReportLocation {
                    path: Some(final_path),
                    finalized: true,
                    warning: None,
                }
            }
            Err(e) => {
                let warning = format!(
                    "Processing completed but '{}' could not be removed from the report name: {}",
                    IN_PROGRESS_SUFFIX, e
                );
                warn!("{}", warning);
                ReportLocation {
                    path: Some(self.path.clone()),
                    finalized: false,
                    warning: Some(warning),
                }
            }
        }
    }
}

/// Rows kept in memory, for callers that consume them directly
#[derive(Debug, Clone, Default)]
pub struct MemoryReport {
    pub rows: Vec<ReportRow>,
    pub finalized: bool,
}

impl RowSink for MemoryReport {
    fn write_row(&mut self, row: &ReportRow) -> Result<()> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        None
    }

    fn finalize(&mut self) -> ReportLocation {
        self.finalized = true;
        ReportLocation {
            path: None,
            finalized: true,
            warning: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixity::{DigestAlgorithm, FixityRecord};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2038, 1, 19, 3, 14, 8).unwrap()
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name("", "test_files", "19-01-2038-03_14_08"),
            "INGESTED_FILES_in_test_files_19-01-2038-03_14_08_IN_PROGRESS.csv"
        );
        assert_eq!(
            report_file_name("csv_prefix", "test_files", "19-01-2038-03_14_08"),
            "csv_prefix_INGESTED_FILES_in_test_files_19-01-2038-03_14_08_IN_PROGRESS.csv"
        );
    }

    #[test]
    fn test_finalized_name() {
        let path = PathBuf::from("/out/INGESTED_FILES_in_x_01-01-2024-00_00_00_IN_PROGRESS.csv");
        assert_eq!(
            finalized_name(&path),
            PathBuf::from("/out/INGESTED_FILES_in_x_01-01-2024-00_00_00.csv")
        );
    }

    #[test]
    fn test_row_from_match() {
        let result = MatchResult {
            primary_digest: "abc256".to_string(),
            records: vec![
                FixityRecord::new("ref-1", "abcmd5", "MD5"),
                FixityRecord::new("ref-2", "abcmd5", "MD5"),
            ],
            matched_with: Some(DigestAlgorithm::Md5),
            matching_digest: "abcmd5".to_string(),
            errors: vec![],
        };

        let row = ReportRow::from_match(Path::new("/files/a.txt"), 12, &result);
        assert_eq!(
            row.fields(),
            [
                "/files/a.txt".to_string(),
                "12".to_string(),
                "True".to_string(),
                "abc256".to_string(),
                "ref-1, ref-2".to_string(),
                "md5".to_string(),
                "abcmd5".to_string(),
            ]
        );
    }

    #[test]
    fn test_unmatched_row_has_empty_match_columns() {
        let result = MatchResult {
            primary_digest: "abc256".to_string(),
            ..MatchResult::default()
        };
        let row = ReportRow::from_match(Path::new("b.txt"), 0, &result);

        assert!(!row.matched);
        assert!(row.matching_file_refs.is_empty());
        assert!(row.matching_algorithm.is_empty());
        assert!(row.matching_digest_value.is_empty());
    }

    #[test]
    fn test_csv_report_writes_and_finalizes() {
        let dir = TempDir::new().unwrap();
        let mut report = CsvReport::create(dir.path(), "title", "test_files", fixed_time()).unwrap();

        let in_progress = report.location().unwrap();
        assert_eq!(
            in_progress.file_name().unwrap().to_string_lossy(),
            "title_INGESTED_FILES_in_test_files_19-01-2038-03_14_08_IN_PROGRESS.csv"
        );
        assert!(in_progress.exists());

        let row = ReportRow::from_match(Path::new("a, b.txt"), 3, &MatchResult::default());
        report.write_row(&row).unwrap();
        assert_eq!(report.rows_written(), 1);

        let location = report.finalize();
        assert!(location.finalized);
        let final_path = location.path.unwrap();
        assert!(final_path.exists());
        assert!(!in_progress.exists());

        let content = fs::read_to_string(&final_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], REPORT_HEADERS.join(","));
        assert_eq!(lines[1], "\"a, b.txt\",3,False,,,,");
    }

    #[test]
    fn test_rows_are_durable_before_finalize() {
        let dir = TempDir::new().unwrap();
        let mut report = CsvReport::create_at(dir.path().join("r_IN_PROGRESS.csv")).unwrap();
        report
            .write_row(&ReportRow::from_match(Path::new("x"), 1, &MatchResult::default()))
            .unwrap();

        let content = fs::read_to_string(report.location().unwrap()).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_finalize_failure_keeps_in_progress_location() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report_IN_PROGRESS.csv");
        let mut report = CsvReport::create_at(path.clone()).unwrap();

        // A directory in the way makes the rename fail
        let blocker = dir.path().join("report.csv");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        let location = report.finalize();
        assert!(!location.finalized);
        assert!(location.warning.is_some());
        assert_eq!(location.path, Some(path));
    }

    #[test]
    fn test_write_after_finalize_fails() {
        let dir = TempDir::new().unwrap();
        let mut report = CsvReport::create_at(dir.path().join("r_IN_PROGRESS.csv")).unwrap();
        report.finalize();

        let row = ReportRow::from_match(Path::new("x"), 1, &MatchResult::default());
        assert!(report.write_row(&row).is_err());
    }
}
