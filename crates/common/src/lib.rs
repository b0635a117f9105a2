//! tarsum
//!
//! Order-independent content checksums for tar streams. [`TarSum`] reads an
//! archive once, hashes each entry over a versioned set of header fields and
//! its content, re-emits a normalized (optionally gzipped) copy of the
//! stream, and combines the sorted entry digests into a single checksum.

pub mod digest;
pub mod error;
pub mod hash;
pub mod header;
pub mod options;
pub mod reader;
mod sink;
pub mod sums;
pub mod tarsum;
pub mod version;
pub mod writer;

// Re-export commonly used types
pub use digest::ParsedDigest;
pub use error::{Error, Result};
pub use hash::{default_hash, EntryHasher, HashAlgorithm, StandardHash};
pub use header::EntryHeader;
pub use options::TarSumOptions;
pub use reader::TarReader;
pub use sums::{EntrySum, EntrySums};
pub use tarsum::{digest_reader, State, TarSum};
pub use version::{HeaderField, Version};
pub use writer::TarWriter;

/// tarsum library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
