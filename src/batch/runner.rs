//! Batch verification
//!
//! Drives the [`AdaptiveMatcher`] over every file of an [`InputSpec`],
//! strictly one file at a time. The algorithm that matched the previous file
//! is threaded through the loop as the next file's presumption; a file that
//! matches nothing leaves the presumption where it was.
//!
//! Per-file problems (unreadable, vanished) never stop a batch. A reference
//! table that cannot be queried, or a report row that cannot be written,
//! does: the run ends with a [`BatchError`] that still carries everything
//! gathered up to that point.

use crate::batch::input::InputSpec;
use crate::batch::report::{ReportRow, RowSink};
use crate::core::config::{Config, DEFAULT_LARGE_FILE_THRESHOLD};
use crate::core::error::VerifyError;
use crate::fixity::{
    AdaptiveMatcher, DigestAlgorithm, DigestSource, FileError, FixityLookup, MatchResult,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Files matched and not matched so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTally {
    pub matched: usize,
    pub unmatched: usize,
}

impl BatchTally {
    /// Count one file
    pub fn record(&mut self, matched: bool) {
        if matched {
            self.matched += 1;
        } else {
            self.unmatched += 1;
        }
    }

    /// Files counted under the given outcome
    pub fn count(&self, matched: bool) -> usize {
        if matched {
            self.matched
        } else {
            self.unmatched
        }
    }

    /// Files counted in total
    pub fn total(&self) -> usize {
        self.matched + self.unmatched
    }
}

/// What a batch did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Files that produced a report row
    pub files_processed: usize,
    pub tally: BatchTally,
    /// Every per-file error, in the order they happened
    pub errors: Vec<FileError>,
    /// Where the report is, finalized or not
    pub report: Option<PathBuf>,
    /// Whether the report lost its in-progress marker
    pub report_finalized: bool,
    /// Why the report could not be finalized
    pub report_warning: Option<String>,
    /// Whether the run was stopped by a shutdown request
    pub interrupted: bool,
}

/// A batch that had to stop early
#[derive(Debug, Error)]
#[error("Verification stopped after {} file(s): {source}", .partial.files_processed)]
pub struct BatchError {
    pub source: VerifyError,
    /// Everything gathered before the failure
    pub partial: BatchSummary,
}

/// Progress notifications raised while a batch runs
#[derive(Debug)]
pub enum BatchEvent<'a> {
    /// A file above the large-file threshold is about to be hashed
    LargeFile { path: &'a Path, size_bytes: u64 },
    /// A file's row was written
    FileVerified {
        path: &'a Path,
        row: &'a ReportRow,
        result: &'a MatchResult,
    },
    /// `files_processed` reached a multiple of the progress interval (folder input only)
    Milestone { files_processed: usize },
    /// The folder walk could not read an entry
    WalkError(&'a FileError),
}

/// Knobs for a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Presumed algorithm for the first file
    pub initial_algorithm: DigestAlgorithm,
    /// Files larger than this many bytes raise a [`BatchEvent::LargeFile`]
    pub large_file_threshold: u64,
    /// Files between milestones; 0 disables them
    pub progress_interval: usize,
    pub follow_symlinks: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            initial_algorithm: DigestAlgorithm::PRIMARY,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            progress_interval: 100,
            follow_symlinks: false,
        }
    }
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_algorithm: config.matching.initial_algorithm,
            large_file_threshold: config.matching.large_file_threshold,
            progress_interval: config.report.progress_interval,
            follow_symlinks: config.walk.follow_symlinks,
        }
    }
}

/// Runs the matcher over a whole batch and feeds a report
pub struct BatchRunner<D, L> {
    matcher: AdaptiveMatcher<D, L>,
    options: BatchOptions,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl<D: DigestSource, L: FixityLookup> BatchRunner<D, L> {
    pub fn new(matcher: AdaptiveMatcher<D, L>, options: BatchOptions) -> Self {
        Self {
            matcher,
            options,
            shutdown_flag: None,
        }
    }

    /// Stop between files once `flag` is set
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    pub fn matcher(&self) -> &AdaptiveMatcher<D, L> {
        &self.matcher
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Verify every file of `input`, writing one row per file to `sink`
    ///
    /// The sink is finalized when the batch completes. It is left as is when
    /// the run is interrupted or fails.
    pub fn run<S, F>(
        &self,
        input: &InputSpec,
        sink: &mut S,
        mut on_event: F,
    ) -> Result<BatchSummary, BatchError>
    where
        S: RowSink + ?Sized,
        F: FnMut(BatchEvent<'_>),
    {
        let mut summary = BatchSummary::default();
        let mut presumed = self.options.initial_algorithm;
        let milestones = input.is_directories() && self.options.progress_interval > 0;

        info!(
            "Verifying {} {} (starting with {})",
            input.paths().len(),
            if input.is_directories() { "folder(s)" } else { "file(s)" },
            presumed
        );

        for entry in input.files(self.options.follow_symlinks) {
            if self.shutdown_requested() {
                warn!("Shutdown requested, stopping verification...");
                summary.interrupted = true;
                break;
            }

            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    on_event(BatchEvent::WalkError(&e));
                    summary.errors.push(e);
                    continue;
                }
            };

            let (size_bytes, result) = match self.verify_file(&path, presumed, &mut on_event) {
                Ok(verified) => verified,
                Err(source) => return Err(abort(source, summary, &*sink)),
            };

            let row = ReportRow::from_match(&path, size_bytes, &result);
            if let Err(source) = sink.write_row(&row) {
                return Err(abort(source, summary, &*sink));
            }

            if let Some(algorithm) = result.matched_with {
                presumed = algorithm;
            }
            summary.tally.record(result.matched());
            summary.files_processed += 1;

            on_event(BatchEvent::FileVerified {
                path: &path,
                row: &row,
                result: &result,
            });
            summary.errors.extend(result.errors);

            if milestones && summary.files_processed % self.options.progress_interval == 0 {
                info!("{} files processed", summary.files_processed);
                on_event(BatchEvent::Milestone {
                    files_processed: summary.files_processed,
                });
            }
        }

        if summary.interrupted {
            summary.report = sink.location();
        } else {
            let location = sink.finalize();
            summary.report = location.path;
            summary.report_finalized = location.finalized;
            summary.report_warning = location.warning;
        }

        info!(
            "Verified {} file(s): {} in archive, {} not in archive, {} error(s)",
            summary.files_processed,
            summary.tally.matched,
            summary.tally.unmatched,
            summary.errors.len()
        );
        Ok(summary)
    }

    /// Size and match outcome of one file
    fn verify_file<F>(
        &self,
        path: &Path,
        presumed: DigestAlgorithm,
        on_event: &mut F,
    ) -> crate::core::error::Result<(u64, MatchResult)>
    where
        F: FnMut(BatchEvent<'_>),
    {
        let size_bytes = match fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                debug!("Cannot stat {}: {}", path.display(), e);
                let result = MatchResult {
                    errors: vec![FileError::new(path, e.to_string())],
                    ..MatchResult::default()
                };
                return Ok((0, result));
            }
        };

        if size_bytes > self.options.large_file_threshold {
            debug!(
                "{} is {} bytes, this might take a while",
                path.display(),
                size_bytes
            );
            on_event(BatchEvent::LargeFile { path, size_bytes });
        }

        let result = self.matcher.match_file(path, presumed)?;
        Ok((size_bytes, result))
    }
}

fn abort<S: RowSink + ?Sized>(
    source: VerifyError,
    mut partial: BatchSummary,
    sink: &S,
) -> BatchError {
    partial.report = sink.location();
    BatchError { source, partial }
}
