//! Progress display and console output for verification runs
//!
//! Key features:
//! - A spinner that suspends cleanly while per-file lines are printed
//! - Green/red per-file outcome lines
//! - The end-of-run summary

use crate::batch::BatchSummary;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Get the spinner style for verification runs
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a section divider
pub fn print_divider() {
    println!();
    println!("{}", "─".repeat(60));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  {} {}", style("✓").green(), msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  {} {}", style("⚠").yellow(), msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("  {} {}", style("✗").red(), msg);
}

/// The per-file outcome line
pub fn outcome_line(path: &Path, matched: bool) -> String {
    format!("File ingested = {}: {}", matched, path.display())
}

// ============================================================================
// Verification progress tracker
// ============================================================================

/// Spinner shown while a batch runs
pub struct VerificationProgress {
    spinner: ProgressBar,
    start_time: Instant,
    files: usize,
}

impl VerificationProgress {
    /// Create a new verification progress tracker
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Starting...");

        Self {
            spinner,
            start_time: Instant::now(),
            files: 0,
        }
    }

    /// Print a file's outcome and advance the count
    pub fn file_verified(&mut self, path: &Path, matched: bool) {
        let line = outcome_line(path, matched);
        self.spinner.suspend(|| {
            if matched {
                println!("{}", style(line).green());
            } else {
                println!("{}", style(line).red());
            }
        });

        self.files += 1;
        self.spinner.set_message(format!(
            "{} file(s) checked ({})",
            self.files,
            format_duration(self.start_time.elapsed())
        ));
    }

    /// Announce that a big file is about to be hashed
    pub fn large_file(&self, path: &Path, size_bytes: u64) {
        self.spinner.suspend(|| {
            print_info(&format!(
                "{} is {}, this might take a while",
                path.display(),
                format_bytes(size_bytes)
            ));
        });
    }

    /// Announce a milestone in a long folder walk
    pub fn milestone(&self, files_processed: usize) {
        self.spinner.suspend(|| {
            println!("{}", style(format!("{} files processed", files_processed)).bold());
        });
    }

    /// Log a warning message while suspending the spinner
    pub fn log_warning(&self, msg: &str) {
        self.spinner.suspend(|| print_warning(msg));
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Finish and clear the progress display
    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Default for VerificationProgress {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Lines of the end-of-run summary, without styling
pub fn summary_lines(summary: &BatchSummary) -> Vec<String> {
    let mut lines = Vec::new();

    let processed = summary.files_processed;
    lines.push(format!(
        "{} {} processed",
        processed,
        if processed == 1 { "file was" } else { "files were" }
    ));
    lines.push(format!(
        "{} of these {} in the archive",
        summary.tally.matched,
        if summary.tally.matched == 1 { "is" } else { "are" }
    ));
    lines.push(format!(
        "{} of these {} not in the archive",
        summary.tally.unmatched,
        if summary.tally.unmatched == 1 { "is" } else { "are" }
    ));

    match &summary.report {
        Some(path) => lines.push(format!("Results saved to {}", path.display())),
        None => lines.push("No report was written".to_string()),
    }

    lines
}

/// Print the end-of-run summary
pub fn print_summary(summary: &BatchSummary, elapsed: Duration) {
    if summary.interrupted {
        print_header("VERIFICATION INTERRUPTED");
    } else {
        print_header("VERIFICATION COMPLETE");
    }

    for line in summary_lines(summary) {
        print_info(&line);
    }
    print_info(&format!("Time taken: {}", format_duration(elapsed)));

    if let Some(warning) = &summary.report_warning {
        print_warning(warning);
    }
    if summary.interrupted {
        print_warning("The run was stopped early; the report keeps its _IN_PROGRESS name");
    }

    if !summary.errors.is_empty() {
        print_divider();
        print_error(&format!(
            "{} file(s) could not be read:",
            summary.errors.len()
        ));
        for error in &summary.errors {
            println!("    {}", error);
        }
    }
    println!();
}

// ============================================================================
// Utility functions
// ============================================================================

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchTally, FileError};
    use std::path::PathBuf;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 bytes");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30.0s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m");
    }

    #[test]
    fn test_outcome_line() {
        assert_eq!(
            outcome_line(Path::new("/data/a.txt"), true),
            "File ingested = true: /data/a.txt"
        );
        assert_eq!(
            outcome_line(Path::new("b.txt"), false),
            "File ingested = false: b.txt"
        );
    }

    #[test]
    fn test_summary_lines_plural() {
        let summary = BatchSummary {
            files_processed: 3,
            tally: BatchTally {
                matched: 1,
                unmatched: 2,
            },
            errors: vec![FileError::new("/x", "gone")],
            report: Some(PathBuf::from("report.csv")),
            ..BatchSummary::default()
        };

        assert_eq!(
            summary_lines(&summary),
            vec![
                "3 files were processed",
                "1 of these is in the archive",
                "2 of these are not in the archive",
                "Results saved to report.csv",
            ]
        );
    }

    #[test]
    fn test_summary_lines_single_file() {
        let summary = BatchSummary {
            files_processed: 1,
            tally: BatchTally {
                matched: 0,
                unmatched: 1,
            },
            ..BatchSummary::default()
        };

        let lines = summary_lines(&summary);
        assert_eq!(lines[0], "1 file was processed");
        assert_eq!(lines[3], "No report was written");
    }
}
