//! Open-time configuration for image files
//!
//! Configuration can be built in code or loaded from TOML:
//!
//! ```toml
//! checksum_policy = 50
//! validate_invariants = true
//! xml_indent = 2
//! ```

use crate::error::{E57Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Percentage of pages whose checksum is verified on read (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct ReadChecksumPolicy(u8);

impl ReadChecksumPolicy {
    /// Never verify
    pub const NONE: Self = ReadChecksumPolicy(0);
    /// Verify a quarter of the pages
    pub const SPARSE: Self = ReadChecksumPolicy(25);
    /// Verify every other page
    pub const HALF: Self = ReadChecksumPolicy(50);
    /// Verify every page
    pub const ALL: Self = ReadChecksumPolicy(100);

    /// Create a policy, clamping the percentage into `0..=100`
    pub fn new(percent: i64) -> Self {
        ReadChecksumPolicy(percent.clamp(0, 100) as u8)
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    /// Whether the page with the given index should be verified
    ///
    /// Out of every 100 consecutive pages exactly `percent` are verified,
    /// spread evenly and starting with page 0.
    pub fn should_verify(&self, page: u64) -> bool {
        match self.0 {
            0 => false,
            100 => true,
            p => {
                let (page, p) = (page as u128, p as u128);
                ((page + 1) * p).div_ceil(100) > (page * p).div_ceil(100)
            }
        }
    }
}

impl Default for ReadChecksumPolicy {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<i64> for ReadChecksumPolicy {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<ReadChecksumPolicy> for i64 {
    fn from(value: ReadChecksumPolicy) -> Self {
        value.0 as i64
    }
}

/// Mode an image file is opened in, fixed for its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    Reader,
    Writer,
}

impl OpenMode {
    pub fn is_writer(&self) -> bool {
        matches!(self, OpenMode::Writer)
    }
}

impl FromStr for OpenMode {
    type Err = E57Error;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "r" => Ok(OpenMode::Reader),
            "w" => Ok(OpenMode::Writer),
            other => Err(E57Error::BadApiArgument(format!("mode={}", other))),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::Reader => write!(f, "r"),
            OpenMode::Writer => write!(f, "w"),
        }
    }
}

/// Settings applied when opening an image file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageFileConfig {
    /// Page checksum verification policy for reads
    pub checksum_policy: ReadChecksumPolicy,

    /// Enable internal invariant checks (counter underflow, header size)
    pub validate_invariants: bool,

    /// Spaces per nesting level in the XML section
    pub xml_indent: usize,
}

impl Default for ImageFileConfig {
    fn default() -> Self {
        ImageFileConfig {
            checksum_policy: ReadChecksumPolicy::default(),
            validate_invariants: cfg!(debug_assertions),
            xml_indent: 2,
        }
    }
}

impl ImageFileConfig {
    pub fn with_checksum_policy(mut self, policy: ReadChecksumPolicy) -> Self {
        self.checksum_policy = policy;
        self
    }

    pub fn with_invariant_validation(mut self, enabled: bool) -> Self {
        self.validate_invariants = enabled;
        self
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| E57Error::Config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            E57Error::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_clamped() {
        assert_eq!(ReadChecksumPolicy::new(-5).percent(), 0);
        assert_eq!(ReadChecksumPolicy::new(250).percent(), 100);
        assert_eq!(ReadChecksumPolicy::new(42).percent(), 42);
    }

    #[test]
    fn test_policy_page_selection() {
        assert!(!ReadChecksumPolicy::NONE.should_verify(0));
        assert!(ReadChecksumPolicy::ALL.should_verify(7));

        let half = ReadChecksumPolicy::HALF;
        assert!(half.should_verify(0));
        assert!(!half.should_verify(1));
        assert!(half.should_verify(2));

        let sparse = ReadChecksumPolicy::SPARSE;
        assert!(sparse.should_verify(4));
        assert!(!sparse.should_verify(5));
    }

    #[test]
    fn test_policy_fraction_matches_percent() {
        for percent in [1i64, 10, 25, 34, 50, 67, 75, 99] {
            let policy = ReadChecksumPolicy::new(percent);
            assert!(policy.should_verify(0));
            for window in [0u64, 100, 12_300] {
                let verified = (window..window + 100)
                    .filter(|&page| policy.should_verify(page))
                    .count();
                assert_eq!(verified as i64, percent, "policy {}", percent);
            }
        }

        let most = ReadChecksumPolicy::new(75);
        assert!(!most.should_verify(3));
        assert!(most.should_verify(4));
    }

    #[test]
    fn test_open_mode_parse() {
        assert_eq!("r".parse::<OpenMode>().unwrap(), OpenMode::Reader);
        assert_eq!("w".parse::<OpenMode>().unwrap(), OpenMode::Writer);
        assert!(matches!(
            "rw".parse::<OpenMode>(),
            Err(E57Error::BadApiArgument(_))
        ));
    }

    #[test]
    fn test_config_from_toml() {
        let config = ImageFileConfig::from_toml_str(
            "checksum_policy = 150\nvalidate_invariants = true\n",
        )
        .unwrap();
        assert_eq!(config.checksum_policy, ReadChecksumPolicy::ALL);
        assert!(config.validate_invariants);
        assert_eq!(config.xml_indent, 2);
    }

    #[test]
    fn test_config_bad_toml() {
        assert!(matches!(
            ImageFileConfig::from_toml_str("checksum_policy = \"lots\""),
            Err(E57Error::Config(_))
        ));
    }
}
