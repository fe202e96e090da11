//! Streaming file digests
//!
//! Files are read in fixed-size chunks so memory stays bounded no matter how
//! large the file is. A failure to read a file is not an `Err` for the
//! batch: it comes back as a [`FileError`] keyed by the exact path that was
//! asked for, and the caller decides what that means for the file.

use crate::core::config::DEFAULT_CHUNK_SIZE;
use crate::fixity::DigestAlgorithm;
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// A per-file failure, reported alongside the file's outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// The path exactly as it was handed to the digest computer
    pub path: PathBuf,
    /// The underlying error text
    pub message: String,
}

impl FileError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Something that can produce the hex digest of a file
///
/// [`DigestComputer`] is the real implementation; the seam exists so the
/// matcher can be driven with canned digests.
pub trait DigestSource {
    /// Compute the lowercase hex digest of the file at `path`
    fn compute_digest(
        &self,
        path: &Path,
        algorithm: DigestAlgorithm,
    ) -> std::result::Result<String, FileError>;
}

impl<T: DigestSource + ?Sized> DigestSource for &T {
    fn compute_digest(
        &self,
        path: &Path,
        algorithm: DigestAlgorithm,
    ) -> std::result::Result<String, FileError> {
        (**self).compute_digest(path, algorithm)
    }
}

/// Result of streaming one input through a hasher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedDigest {
    /// Lowercase hex digest
    pub hex: String,
    /// Number of non-empty chunks fed to the hasher
    pub chunks: usize,
    /// Total bytes hashed
    pub bytes: u64,
}

/// Computes file digests by streaming fixed-size chunks
#[derive(Debug, Clone)]
pub struct DigestComputer {
    chunk_size: usize,
}

impl Default for DigestComputer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl DigestComputer {
    /// Create a computer reading `chunk_size` bytes at a time (minimum 1)
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Stream `reader` through `algorithm` until end of input
    ///
    /// An empty reader never feeds the hasher and yields the algorithm's
    /// digest of empty input.
    pub fn digest_reader<R: Read>(
        &self,
        mut reader: R,
        algorithm: DigestAlgorithm,
    ) -> io::Result<StreamedDigest> {
        let mut hasher = algorithm.hasher();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut chunks = 0usize;
        let mut bytes = 0u64;

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            hasher.update(&buffer[..bytes_read]);
            chunks += 1;
            bytes += bytes_read as u64;
        }

        Ok(StreamedDigest {
            hex: hex::encode(hasher.finalize()),
            chunks,
            bytes,
        })
    }

    /// Hash the file at `path`, opening and closing one handle
    pub fn digest_file(
        &self,
        path: &Path,
        algorithm: DigestAlgorithm,
    ) -> io::Result<StreamedDigest> {
        let file = File::open(path)?;
        self.digest_reader(file, algorithm)
    }
}

impl DigestSource for DigestComputer {
    fn compute_digest(
        &self,
        path: &Path,
        algorithm: DigestAlgorithm,
    ) -> std::result::Result<String, FileError> {
        match self.digest_file(path, algorithm) {
            Ok(digest) => {
                trace!(
                    "{} of {} ({} bytes, {} chunks): {}",
                    algorithm,
                    path.display(),
                    digest.bytes,
                    digest.chunks,
                    digest.hex
                );
                Ok(digest.hex)
            }
            Err(e) => Err(FileError::new(path, e.to_string())),
        }
    }
}
