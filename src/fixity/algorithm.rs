//! Candidate digest algorithms
//!
//! The archive has been fixed with different algorithms over the years, so
//! every file is checked against a small fixed candidate set. Algorithm
//! selection is data: each variant knows its canonical name and how to build
//! its hasher, and the matcher only ever iterates [`DigestAlgorithm::candidate_order`].

use serde::{Deserialize, Serialize};
use sha2::digest::DynDigest;
use std::fmt;
use std::str::FromStr;

/// A digest algorithm the archive may have recorded a fixity value with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256, used for everything ingested recently
    Sha256,
    /// MD5, used by most older holdings
    Md5,
    /// SHA-1
    Sha1,
}

impl DigestAlgorithm {
    /// The strong digest reported for every file
    pub const PRIMARY: DigestAlgorithm = DigestAlgorithm::Sha256;

    /// Fallback order. MD5 comes before SHA-1 because a large share of the
    /// older holdings predate SHA-256 and were fixed with MD5.
    pub const CANDIDATES: [DigestAlgorithm; 3] = [
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Md5,
        DigestAlgorithm::Sha1,
    ];

    /// Canonical lowercase name, as stored in the reference table
    pub const fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
        }
    }

    /// Parse an algorithm from a name, accepting common spellings
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Some(DigestAlgorithm::Sha256),
            "md5" | "md-5" => Some(DigestAlgorithm::Md5),
            "sha1" | "sha-1" => Some(DigestAlgorithm::Sha1),
            _ => None,
        }
    }

    /// Whether this is the primary (strong) algorithm
    pub fn is_primary(&self) -> bool {
        *self == Self::PRIMARY
    }

    /// Fresh running hash state for this algorithm
    pub fn hasher(&self) -> Box<dyn DynDigest> {
        match self {
            DigestAlgorithm::Sha256 => Box::new(<sha2::Sha256 as sha2::Digest>::new()),
            DigestAlgorithm::Md5 => Box::new(<md5::Md5 as md5::Digest>::new()),
            DigestAlgorithm::Sha1 => Box::new(<sha1::Sha1 as sha1::Digest>::new()),
        }
    }

    /// Order in which the candidates are tried for one file: the presumed
    /// algorithm first, then the remaining ones in fallback order.
    pub fn candidate_order(presumed: DigestAlgorithm) -> [DigestAlgorithm; 3] {
        let mut order = Self::CANDIDATES;
        if let Some(pos) = order.iter().position(|a| *a == presumed) {
            order[..=pos].rotate_right(1);
        }
        order
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            format!(
                "unknown digest algorithm '{}' (expected sha256, md5 or sha1)",
                s
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order_presumed_first() {
        use DigestAlgorithm::*;

        assert_eq!(DigestAlgorithm::candidate_order(Sha256), [Sha256, Md5, Sha1]);
        assert_eq!(DigestAlgorithm::candidate_order(Md5), [Md5, Sha256, Sha1]);
        assert_eq!(DigestAlgorithm::candidate_order(Sha1), [Sha1, Sha256, Md5]);
    }

    #[test]
    fn test_names_round_trip() {
        for algorithm in DigestAlgorithm::CANDIDATES {
            assert_eq!(DigestAlgorithm::from_name(algorithm.name()), Some(algorithm));
            assert_eq!(algorithm.to_string(), algorithm.name());
        }
    }

    #[test]
    fn test_from_name_aliases() {
        assert_eq!(DigestAlgorithm::from_name("SHA-256"), Some(DigestAlgorithm::Sha256));
        assert_eq!(DigestAlgorithm::from_name(" MD5 "), Some(DigestAlgorithm::Md5));
        assert_eq!(DigestAlgorithm::from_name("sha-1"), Some(DigestAlgorithm::Sha1));
        assert_eq!(DigestAlgorithm::from_name("crc32"), None);
        assert!("whirlpool".parse::<DigestAlgorithm>().is_err());
    }

    #[test]
    fn test_only_sha256_is_primary() {
        assert!(DigestAlgorithm::Sha256.is_primary());
        assert!(!DigestAlgorithm::Md5.is_primary());
        assert!(!DigestAlgorithm::Sha1.is_primary());
    }

    #[test]
    fn test_hasher_output_sizes() {
        assert_eq!(DigestAlgorithm::Sha256.hasher().output_size(), 32);
        assert_eq!(DigestAlgorithm::Md5.hasher().output_size(), 16);
        assert_eq!(DigestAlgorithm::Sha1.hasher().output_size(), 20);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&DigestAlgorithm::Md5).unwrap();
        assert_eq!(json, "\"md5\"");
        let parsed: DigestAlgorithm = serde_json::from_str("\"sha1\"").unwrap();
        assert_eq!(parsed, DigestAlgorithm::Sha1);
    }
}
