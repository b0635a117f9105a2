//! Per-entry sums and the final hash-of-hashes
//!
//! Entries are recorded in the order they appear in the archive. The final
//! checksum hashes the entry digests sorted by digest value, which is what
//! makes it independent of entry order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::hash::HashAlgorithm;
use crate::version::Version;

/// The digest of one archive entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySum {
    /// Normalized entry name (no leading `./`, no trailing `/`)
    pub name: String,
    /// Lowercase hex digest of canonical header + content
    pub digest: String,
    /// Zero-based position of the entry in the source archive
    pub position: u64,
}

/// Append-only collection of [`EntrySum`]s
#[derive(Debug, Clone, Default)]
pub struct EntrySums {
    entries: Vec<EntrySum>,
    // set by sort_by_digest, cleared by anything that may reorder
    sorted: bool,
}

impl EntrySums {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sum: EntrySum) {
        self.entries.push(sum);
        self.sorted = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntrySum> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[EntrySum] {
        &self.entries
    }

    /// First entry recorded under `name`
    pub fn get(&self, name: &str) -> Option<&EntrySum> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Every entry recorded under `name`, in current order
    pub fn get_all(&self, name: &str) -> Vec<&EntrySum> {
        self.entries.iter().filter(|e| e.name == name).collect()
    }

    /// Entries whose name was already seen earlier in the current order.
    ///
    /// An archive may legally repeat a path; later copies shadow earlier ones
    /// on extraction but both contribute to the checksum.
    pub fn duplicate_paths(&self) -> Vec<&EntrySum> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| !seen.insert(e.name.as_str()))
            .collect()
    }

    /// Stable sort by digest, ascending byte order. Equal digests keep their
    /// relative order. A no-op if nothing changed since the last call.
    pub fn sort_by_digest(&mut self) {
        if self.sorted {
            return;
        }
        self.entries.sort_by(|a, b| a.digest.cmp(&b.digest));
        self.sorted = true;
    }

    /// Stable sort by name
    pub fn sort_by_names(&mut self) {
        self.entries.sort_by(|a, b| a.name.cmp(&b.name));
        self.sorted = false;
    }

    /// Restore archive order
    pub fn sort_by_position(&mut self) {
        self.entries.sort_by_key(|e| e.position);
        self.sorted = false;
    }

    /// Combine the entry digests into the final checksum string.
    ///
    /// Sorts by digest, then hashes `extra` (if any) followed by each digest's
    /// hex text, and renders `<version>+<algorithm>:<hex>`.
    pub fn checksum(
        &mut self,
        version: Version,
        algorithm: &dyn HashAlgorithm,
        extra: Option<&[u8]>,
    ) -> String {
        self.sort_by_digest();

        let mut hasher = algorithm.new_hasher();
        if let Some(extra) = extra {
            hasher.update(extra);
        }
        for entry in &self.entries {
            hasher.update(entry.digest.as_bytes());
        }

        format!(
            "{}+{}:{}",
            version.label(),
            algorithm.name(),
            hex::encode(hasher.finalize_reset())
        )
    }
}

impl<'a> IntoIterator for &'a EntrySums {
    type Item = &'a EntrySum;
    type IntoIter = std::slice::Iter<'a, EntrySum>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for EntrySums {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::StandardHash;
    use sha2::{Digest, Sha256};

    fn sum(name: &str, digest: &str, position: u64) -> EntrySum {
        EntrySum {
            name: name.to_string(),
            digest: digest.to_string(),
            position,
        }
    }

    #[test]
    fn test_sort_by_digest_is_stable() {
        let mut sums = EntrySums::new();
        sums.push(sum("c", "bb", 0));
        sums.push(sum("a", "aa", 1));
        sums.push(sum("b", "bb", 2));
        sums.sort_by_digest();

        let order: Vec<_> = sums.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_sort_is_lexicographic_not_numeric() {
        let mut sums = EntrySums::new();
        sums.push(sum("x", "9", 0));
        sums.push(sum("y", "10", 1));
        sums.sort_by_digest();
        assert_eq!(sums.as_slice()[0].name, "y");
    }

    #[test]
    fn test_lookups() {
        let mut sums = EntrySums::new();
        sums.push(sum("etc/hosts", "01", 0));
        sums.push(sum("etc/passwd", "02", 1));
        sums.push(sum("etc/hosts", "03", 2));

        assert_eq!(sums.get("etc/hosts").unwrap().digest, "01");
        assert_eq!(sums.get_all("etc/hosts").len(), 2);
        assert!(sums.get("missing").is_none());

        let dups = sums.duplicate_paths();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].position, 2);
    }

    #[test]
    fn test_alternate_orders() {
        let mut sums = EntrySums::new();
        sums.push(sum("b", "01", 0));
        sums.push(sum("a", "02", 1));

        sums.sort_by_names();
        assert_eq!(sums.as_slice()[0].name, "a");
        sums.sort_by_position();
        assert_eq!(sums.as_slice()[0].name, "b");
    }

    #[test]
    fn test_checksum_is_hash_of_sorted_digests() {
        let mut sums = EntrySums::new();
        sums.push(sum("b", "ff", 0));
        sums.push(sum("a", "00", 1));

        let mut hasher = Sha256::new();
        hasher.update(b"00");
        hasher.update(b"ff");
        let expected = format!("tarsum.v1+sha256:{}", hex::encode(hasher.finalize()));

        assert_eq!(
            sums.checksum(Version::V1, &StandardHash::Sha256, None),
            expected
        );
    }

    #[test]
    fn test_checksum_extra_is_hashed_first() {
        let mut sums = EntrySums::new();
        sums.push(sum("a", "00", 0));

        let mut hasher = Sha256::new();
        hasher.update(b"salt");
        hasher.update(b"00");
        let expected = format!("tarsum+sha256:{}", hex::encode(hasher.finalize()));

        assert_eq!(
            sums.checksum(Version::V0, &StandardHash::Sha256, Some(b"salt")),
            expected
        );
    }

    #[test]
    fn test_empty_checksum() {
        let mut sums = EntrySums::new();
        assert_eq!(
            sums.checksum(Version::V1, &StandardHash::Sha256, None),
            "tarsum.v1+sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
