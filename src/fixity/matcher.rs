//! Adaptive digest matching
//!
//! Hashing is the dominant cost of a run, and consecutive files in a batch
//! were usually fixed with the same algorithm (holdings are homogeneous by
//! ingestion era). The matcher therefore tries the algorithm that matched
//! the previous file first, stops at the first digest the reference table
//! knows, and hands back the algorithm that matched so the caller can carry
//! it forward as the next file's presumption.
//!
//! # Rules
//!
//! 1. Candidates are tried in [`DigestAlgorithm::candidate_order`] of the
//!    presumed algorithm.
//! 2. Every digest computed is looked up; the sha256 digest is always kept
//!    as the primary digest, matched or not.
//! 3. The first non-empty lookup ends the search. No further lookups happen
//!    for that file.
//! 4. If the match came from md5 or sha1 before sha256 was computed, sha256
//!    is computed afterwards (without a lookup) unless
//!    `always_compute_primary` is off.
//! 5. A file that cannot be read is unmatched: the remaining candidates are
//!    not tried and the error is attached.
//! 6. A failing lookup is returned as `Err`; the table is unusable and the
//!    caller should stop.

use crate::core::error::Result;
use crate::fixity::{DigestAlgorithm, DigestSource, FileError, FixityLookup, FixityRecord};
use log::debug;
use std::path::Path;

/// Outcome of matching one file against the reference table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// sha256 of the file; empty only if it could not be computed
    pub primary_digest: String,
    /// Records sharing the matching digest (empty when unmatched)
    pub records: Vec<FixityRecord>,
    /// Algorithm whose digest matched
    pub matched_with: Option<DigestAlgorithm>,
    /// The digest value that matched (empty when unmatched)
    pub matching_digest: String,
    /// Read failures hit while hashing this file
    pub errors: Vec<FileError>,
}

impl MatchResult {
    /// Whether any recorded fixity value matched
    pub fn matched(&self) -> bool {
        self.matched_with.is_some()
    }

    /// Canonical name of the matching algorithm, or "" when unmatched
    pub fn matching_algorithm_name(&self) -> &'static str {
        self.matched_with.map(|a| a.name()).unwrap_or("")
    }

    /// Distinct archive references of the matching records, in table order
    pub fn file_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::with_capacity(self.records.len());
        for record in &self.records {
            if !refs.contains(&record.file_ref.as_str()) {
                refs.push(&record.file_ref);
            }
        }
        refs
    }
}

/// Matches files against recorded fixity values with as little hashing as possible
pub struct AdaptiveMatcher<D, L> {
    digests: D,
    lookup: L,
    always_compute_primary: bool,
}

impl<D: DigestSource, L: FixityLookup> AdaptiveMatcher<D, L> {
    /// Create a matcher that always reports a primary digest
    pub fn new(digests: D, lookup: L) -> Self {
        Self {
            digests,
            lookup,
            always_compute_primary: true,
        }
    }

    /// Whether to compute sha256 for files that matched through a weaker algorithm first
    pub fn with_always_compute_primary(mut self, enabled: bool) -> Self {
        self.always_compute_primary = enabled;
        self
    }

    /// The digest source
    pub fn digests(&self) -> &D {
        &self.digests
    }

    /// The reference table
    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Match one file, trying `presumed` first
    pub fn match_file(&self, path: &Path, presumed: DigestAlgorithm) -> Result<MatchResult> {
        let mut result = MatchResult::default();

        for algorithm in DigestAlgorithm::candidate_order(presumed) {
            let digest = match self.digests.compute_digest(path, algorithm) {
                Ok(digest) => digest,
                Err(e) => {
                    debug!("Giving up on {}: {}", path.display(), e.message);
                    result.errors.push(e);
                    return Ok(result);
                }
            };

            if algorithm.is_primary() {
                result.primary_digest = digest.clone();
            }

            let records = self.lookup.find_by_digest(&digest)?;
            if !records.is_empty() {
                debug!(
                    "{} matched {} record(s) via {}",
                    path.display(),
                    records.len(),
                    algorithm
                );
                result.matched_with = Some(algorithm);
                result.matching_digest = digest;
                result.records = records;
                break;
            }
        }

        if result.matched() && result.primary_digest.is_empty() && self.always_compute_primary {
            match self
                .digests
                .compute_digest(path, DigestAlgorithm::PRIMARY)
            {
                Ok(digest) => result.primary_digest = digest,
                Err(e) => result.errors.push(e),
            }
        }

        Ok(result)
    }
}
