//! Construction parameters for a [`TarSum`](crate::TarSum)

use serde::{Deserialize, Serialize};

use crate::hash::StandardHash;
use crate::version::Version;

/// tarsum options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TarSumOptions {
    /// Header selection policy and checksum prefix
    pub version: Version,

    /// Gzip the normalized output stream
    pub compress: bool,

    /// Hash used for entry digests and the final checksum
    pub hash: StandardHash,
}

impl Default for TarSumOptions {
    fn default() -> Self {
        Self {
            version: Version::V1,
            compress: true,
            hash: StandardHash::Sha256,
        }
    }
}
