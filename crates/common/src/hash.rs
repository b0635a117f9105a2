//! Hash algorithms and the per-entry hash accumulator

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::digest::DynDigest;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::version::HeaderField;
use crate::{Error, Result};

/// A named factory for incremental hash states.
///
/// Implementations are stateless and can be shared between transforms.
pub trait HashAlgorithm: Send + Sync {
    /// Name used in the checksum string, e.g. `sha256`
    fn name(&self) -> &str;

    /// A fresh hash state
    fn new_hasher(&self) -> Box<dyn DynDigest + Send>;
}

/// Hash algorithms from the SHA-2 family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandardHash {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl StandardHash {
    pub const ALL: [StandardHash; 4] = [
        StandardHash::Sha224,
        StandardHash::Sha256,
        StandardHash::Sha384,
        StandardHash::Sha512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StandardHash::Sha224 => "sha224",
            StandardHash::Sha256 => "sha256",
            StandardHash::Sha384 => "sha384",
            StandardHash::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes
    pub fn output_size(&self) -> usize {
        match self {
            StandardHash::Sha224 => 28,
            StandardHash::Sha256 => 32,
            StandardHash::Sha384 => 48,
            StandardHash::Sha512 => 64,
        }
    }

    /// Digest length in hex characters
    pub fn hex_len(&self) -> usize {
        self.output_size() * 2
    }
}

impl HashAlgorithm for StandardHash {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn new_hasher(&self) -> Box<dyn DynDigest + Send> {
        match self {
            StandardHash::Sha224 => Box::new(Sha224::default()),
            StandardHash::Sha256 => Box::new(Sha256::default()),
            StandardHash::Sha384 => Box::new(Sha384::default()),
            StandardHash::Sha512 => Box::new(Sha512::default()),
        }
    }
}

impl fmt::Display for StandardHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StandardHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        StandardHash::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| Error::UnsupportedHash(s.to_string()))
    }
}

/// The default algorithm, SHA-256
pub fn default_hash() -> Arc<dyn HashAlgorithm> {
    Arc::new(StandardHash::Sha256)
}

/// Hash state for one entry, reused across entries.
///
/// An entry's digest covers its canonical header fields (`name ++ value`,
/// in selector order) followed by its content bytes.
pub struct EntryHasher {
    state: Box<dyn DynDigest + Send>,
    absorbed: u64,
}

impl EntryHasher {
    pub fn new(algorithm: &dyn HashAlgorithm) -> Self {
        Self {
            state: algorithm.new_hasher(),
            absorbed: 0,
        }
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.absorbed = 0;
    }

    pub fn absorb(&mut self, data: &[u8]) {
        self.state.update(data);
        self.absorbed += data.len() as u64;
    }

    pub fn absorb_headers(&mut self, fields: &[HeaderField]) {
        for (name, value) in fields {
            self.absorb(name.as_bytes());
            self.absorb(value);
        }
    }

    /// Bytes absorbed since the last reset
    pub fn absorbed(&self) -> u64 {
        self.absorbed
    }

    /// Lowercase hex digest of everything absorbed; leaves the state reset.
    pub fn finalize_hex(&mut self) -> String {
        self.absorbed = 0;
        hex::encode(self.state.finalize_reset())
    }
}

impl fmt::Debug for EntryHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryHasher")
            .field("output_size", &self.state.output_size())
            .field("absorbed", &self.absorbed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_finalize_resets_state() {
        let mut hasher = EntryHasher::new(&StandardHash::Sha256);
        hasher.absorb(b"hello");
        assert_eq!(hasher.absorbed(), 5);
        let first = hasher.finalize_hex();
        assert_ne!(first, EMPTY_SHA256);
        assert_eq!(hasher.absorbed(), 0);
        assert_eq!(hasher.finalize_hex(), EMPTY_SHA256);
    }

    #[test]
    fn test_reset_discards_input() {
        let mut hasher = EntryHasher::new(&StandardHash::Sha256);
        hasher.absorb(b"noise");
        hasher.reset();
        assert_eq!(hasher.finalize_hex(), EMPTY_SHA256);
    }

    #[test]
    fn test_headers_are_concatenated_name_then_value() {
        let fields = vec![
            ("name".to_string(), b"a.txt".to_vec()),
            ("size".to_string(), b"2".to_vec()),
        ];
        let mut by_fields = EntryHasher::new(&StandardHash::Sha256);
        by_fields.absorb_headers(&fields);

        let mut by_bytes = EntryHasher::new(&StandardHash::Sha256);
        by_bytes.absorb(b"namea.txtsize2");

        assert_eq!(by_fields.finalize_hex(), by_bytes.finalize_hex());
    }

    #[test]
    fn test_output_sizes_match_hashers() {
        for algorithm in StandardHash::ALL {
            let mut hasher = EntryHasher::new(&algorithm);
            assert_eq!(hasher.finalize_hex().len(), algorithm.hex_len());
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("sha512".parse::<StandardHash>().unwrap(), StandardHash::Sha512);
        assert!(matches!(
            "md5".parse::<StandardHash>(),
            Err(Error::UnsupportedHash(_))
        ));
        assert_eq!(default_hash().name(), "sha256");
    }
}
