//! Parsing of `<version>+<algorithm>:<hex>` checksum strings

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::hash::StandardHash;
use crate::version::Version;
use crate::{Error, Result};

/// A checksum string split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDigest {
    version: Version,
    algorithm: StandardHash,
    hex: String,
}

impl ParsedDigest {
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn algorithm(&self) -> StandardHash {
        self.algorithm
    }

    /// Lowercase hex digest
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Whether `checksum` names the same digest, ignoring hex case.
    pub fn matches(&self, checksum: &str) -> bool {
        checksum
            .parse::<ParsedDigest>()
            .map(|other| other == *self)
            .unwrap_or(false)
    }
}

impl FromStr for ParsedDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (label, rest) = s
            .split_once('+')
            .ok_or_else(|| Error::DigestFormat(format!("missing '+' in {:?}", s)))?;
        let (algorithm, hex) = rest
            .split_once(':')
            .ok_or_else(|| Error::DigestFormat(format!("missing ':' in {:?}", s)))?;

        let version: Version = label
            .parse()
            .map_err(|_| Error::DigestFormat(format!("unknown version {:?}", label)))?;
        let algorithm: StandardHash = algorithm
            .parse()
            .map_err(|_| Error::DigestFormat(format!("unknown algorithm {:?}", algorithm)))?;

        if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(Error::DigestFormat(format!(
                "invalid hex character {:?}",
                bad
            )));
        }
        if hex.len() != algorithm.hex_len() {
            return Err(Error::DigestFormat(format!(
                "{} digest must be {} hex characters, got {}",
                algorithm,
                algorithm.hex_len(),
                hex.len()
            )));
        }

        Ok(Self {
            version,
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for ParsedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}:{}", self.version, self.algorithm, self.hex)
    }
}

impl Serialize for ParsedDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
