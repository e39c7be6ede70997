//! Known bundler addresses and sender classification.
//!
//! The set is loaded once at startup from either an inline comma separated
//! list or a newline separated file. Entries are parsed into [`Address`]
//! values, so membership does not depend on hex case or checksum form.

use crate::config::BundlerSource;
use crate::error::{TrackerError, TrackerResult};
use alloy::primitives::Address;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Immutable set of known bundler addresses.
#[derive(Debug, Clone, Default)]
pub struct BundlerSet {
    addresses: HashSet<Address>,
}

impl BundlerSet {
    /// Build a set from already-parsed addresses.
    #[must_use]
    pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    /// Parse a comma separated list such as `0xabc...,0xdef...`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any non-blank entry is not a valid address.
    pub fn from_list(list: &str) -> TrackerResult<Self> {
        Self::parse_entries(list.split(','))
    }

    /// Read a newline separated file. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or contains
    /// an invalid address.
    pub fn from_file(path: &Path) -> TrackerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::config(
                format!("failed to read bundlers file {}", path.display()),
                Some(Box::new(e)),
            )
        })?;
        Self::parse_entries(contents.lines())
    }

    /// Load the set from whichever source is configured.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::from_list`] and [`Self::from_file`] errors.
    pub fn load(source: &BundlerSource) -> TrackerResult<Self> {
        let set = match source {
            BundlerSource::Inline(list) => Self::from_list(list)?,
            BundlerSource::File(path) => Self::from_file(path)?,
        };
        info!(bundlers = set.len(), "Loaded bundler set");
        Ok(set)
    }

    fn parse_entries<'a>(entries: impl Iterator<Item = &'a str>) -> TrackerResult<Self> {
        let mut addresses = HashSet::new();
        for entry in entries.map(str::trim).filter(|e| !e.is_empty()) {
            let address = Address::from_str(entry).map_err(|e| {
                TrackerError::config(
                    format!("invalid bundler address: {entry}"),
                    Some(Box::new(e)),
                )
            })?;
            if !addresses.insert(address) {
                debug!(%address, "Duplicate bundler address ignored");
            }
        }
        Ok(Self { addresses })
    }

    /// Whether `address` is a known bundler.
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.addresses.contains(&address)
    }

    /// Textual membership test. Input that is not an address is never a bundler.
    #[must_use]
    pub fn contains_str(&self, address: &str) -> bool {
        Address::from_str(address.trim()).is_ok_and(|a| self.contains(a))
    }

    /// Number of distinct bundlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LOWER: &str = "0x4337001fff419768e088ce247456c1b892888084";
    const CHECKSUM: &str = "0x4337001Fff419768e088Ce247456c1B892888084";
    const UPPER: &str = "0x4337001FFF419768E088CE247456C1B892888084";

    #[test]
    fn test_membership_is_case_insensitive() {
        for loaded in [LOWER, CHECKSUM, UPPER] {
            let set = BundlerSet::from_list(loaded).unwrap();
            for queried in [LOWER, CHECKSUM, UPPER] {
                assert!(set.contains_str(queried), "{loaded} vs {queried}");
            }
        }
    }

    #[test]
    fn test_unknown_address_is_not_bundler() {
        let set = BundlerSet::from_list(LOWER).unwrap();
        assert!(!set.contains(Address::repeat_byte(0xbb)));
        assert!(!set.contains_str("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"));
    }

    #[test]
    fn test_empty_and_garbage_never_match() {
        let set = BundlerSet::from_list(&format!("{LOWER},")).unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set.contains_str(""));
        assert!(!set.contains_str("   "));
        assert!(!set.contains_str("not-an-address"));
    }

    #[test]
    fn test_inline_list_with_spaces() {
        let set = BundlerSet::from_list(&format!(" {LOWER} , 0x{} ", "ab".repeat(20))).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(Address::repeat_byte(0xab)));
    }

    #[test]
    fn test_invalid_entry_is_config_error() {
        let err = BundlerSet::from_list("0x1234").unwrap_err();
        assert!(matches!(err, TrackerError::ConfigError { .. }));
    }

    #[test]
    fn test_file_with_trailing_blank_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{CHECKSUM}").unwrap();
        writeln!(file, "0x{}", "cd".repeat(20)).unwrap();
        writeln!(file).unwrap();

        let set = BundlerSet::from_file(file.path()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains_str(LOWER));
        assert!(!set.contains_str(""));
        assert!(!set.contains(Address::ZERO));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = BundlerSet::from_file(Path::new("/nonexistent/bundlers.txt")).unwrap_err();
        assert!(matches!(err, TrackerError::ConfigError { .. }));
    }

    #[test]
    fn test_load_dispatches_on_source() {
        let set = BundlerSet::load(&BundlerSource::Inline(LOWER.to_string())).unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
    }
}
