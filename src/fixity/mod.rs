//! Fixity matching module
//!
//! Decides whether a local file's content is already held by the archive by
//! comparing its digests with the fixity values the archive recorded.
//!
//! # Submodules
//!
//! - `algorithm` - The candidate digest algorithms and their order
//! - `digest` - Streaming file digests
//! - `lookup` - Reference fixity table backends and CSV import
//! - `matcher` - Adaptive digest matching across a batch

pub mod algorithm;
pub mod digest;
pub mod lookup;
pub mod matcher;

pub use algorithm::DigestAlgorithm;
pub use digest::{DigestComputer, DigestSource, FileError, StreamedDigest};
pub use lookup::{
    import_fixity_csv, FixityLookup, FixityRecord, MemoryFixityTable, SqliteFixityTable,
};
pub use matcher::{AdaptiveMatcher, MatchResult};
