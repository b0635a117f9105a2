//! Streaming tarsum transform
//!
//! [`TarSum`] wraps a tar stream and is itself a [`Read`]. Every read pulls
//! from the source archive and, in the same call:
//! - hashes each entry's canonical header fields and content,
//! - re-serializes the entry into a normalized tar stream,
//! - pushes that stream through an optional gzip compressor,
//! - serves the resulting bytes to the caller.
//!
//! Once the caller has drained the stream, [`TarSum::sum`] combines the
//! per-entry digests into the final checksum.

use std::fmt;
use std::io::{self, Read};
use std::mem;
use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::hash::{default_hash, EntryHasher, HashAlgorithm};
use crate::header::EntryHeader;
use crate::options::TarSumOptions;
use crate::reader::TarReader;
use crate::sink::{serve, Compressor};
use crate::sums::{EntrySum, EntrySums};
use crate::version::Version;
use crate::writer::TarWriter;
use crate::{Error, Result};

const BUF_8K: usize = 8 * 1024;
const BUF_16K: usize = 16 * 1024;
const BUF_32K: usize = 32 * 1024;

/// Lifecycle of a [`TarSum`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Entries remain in the source archive
    Streaming,
    /// The source is exhausted and every output byte is buffered
    Finished,
    /// A previous call failed; the transform cannot continue
    Failed,
}

/// Canonicalizing, checksumming reader over a tar stream
pub struct TarSum<R> {
    reader: TarReader<R>,
    writer: TarWriter<Vec<u8>>,
    compressor: Compressor,
    output: BytesMut,
    scratch: Vec<u8>,
    hasher: EntryHasher,
    hash: Arc<dyn HashAlgorithm>,
    version: Version,
    sums: EntrySums,
    file_counter: u64,
    current_file: String,
    // The first end-of-content event precedes the first header and
    // corresponds to no entry.
    first: bool,
    state: State,
}

impl<R: Read> TarSum<R> {
    /// Create a transform using SHA-256.
    pub fn new(source: R, version: Version, compress: bool) -> Self {
        Self::with_hash(source, version, compress, default_hash())
    }

    /// Create a transform with a caller-supplied hash algorithm.
    pub fn with_hash(
        source: R,
        version: Version,
        compress: bool,
        hash: Arc<dyn HashAlgorithm>,
    ) -> Self {
        Self {
            reader: TarReader::new(source),
            writer: TarWriter::new(Vec::new()),
            compressor: Compressor::new(compress),
            output: BytesMut::new(),
            scratch: Vec::new(),
            hasher: EntryHasher::new(hash.as_ref()),
            hash,
            version,
            sums: EntrySums::new(),
            file_counter: 0,
            current_file: String::new(),
            first: true,
            state: State::Streaming,
        }
    }

    pub fn with_options(source: R, options: &TarSumOptions) -> Self {
        Self::with_hash(
            source,
            options.version,
            options.compress,
            Arc::new(options.hash),
        )
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn hash_name(&self) -> &str {
        self.hash.name()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Entry sums recorded so far, in archive order until [`sum`](Self::sum)
    /// sorts them.
    pub fn sums(&self) -> &EntrySums {
        &self.sums
    }

    /// Final checksum, `<version>+<hash>:<hex>`.
    ///
    /// `extra` is hashed ahead of the entry digests. The stream must have
    /// been read to the end first.
    pub fn sum(&mut self, extra: Option<&[u8]>) -> Result<String> {
        match self.state {
            State::Finished => {}
            State::Streaming => return Err(Error::NotFinished),
            State::Failed => return Err(Error::Poisoned),
        }
        for entry in &self.sums {
            debug!("-->{}<-- {}", entry.digest, entry.name);
        }
        let checksum = self.sums.checksum(self.version, self.hash.as_ref(), extra);
        debug!("Checksum processed: {}", checksum);
        Ok(checksum)
    }

    /// Read normalized output, with typed errors.
    ///
    /// Returns `Ok(0)` only once the transform is finished and drained.
    pub fn read_normalized(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.state == State::Failed {
            return Err(Error::Poisoned);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if !self.output.is_empty() || self.state == State::Finished {
                return Ok(serve(&mut self.output, buf));
            }
            if let Err(e) = self.advance(buf.len()) {
                self.state = State::Failed;
                return Err(e);
            }
        }
    }

    /// One step of the state machine: read content, or cross an entry
    /// boundary.
    fn advance(&mut self, want: usize) -> Result<()> {
        if self.scratch.len() < want {
            self.scratch.resize(scratch_len(want), 0);
        }
        let chunk = &mut self.scratch[..want];

        let n = self.reader.read(chunk)?;
        if n > 0 {
            self.hasher.absorb(&chunk[..n]);
            self.writer.write_content(&chunk[..n])?;
            return self.pump();
        }

        self.finish_entry();
        match self.reader.next_header()? {
            Some(header) => self.start_entry(&header),
            None => self.finish_archive(),
        }
    }

    fn finish_entry(&mut self) {
        if self.first {
            self.first = false;
            self.hasher.reset();
            return;
        }
        let name = mem::take(&mut self.current_file);
        let digest = self.hasher.finalize_hex();
        trace!("Entry {} hashed: {}", name, digest);
        self.sums.push(EntrySum {
            name,
            digest,
            position: self.file_counter,
        });
        self.file_counter += 1;
    }

    fn start_entry(&mut self, header: &EntryHeader) -> Result<()> {
        self.current_file = header.display_name().into_owned();
        let fields = self.version.select_headers(header);
        self.hasher.absorb_headers(&fields);
        self.writer.write_header(header)?;
        self.pump()
    }

    fn finish_archive(&mut self) -> Result<()> {
        self.writer.finish()?;
        self.pump()?;
        self.compressor.finish(&mut self.output)?;
        self.state = State::Finished;
        debug!(
            "Archive finished: {} entries, {} output bytes pending",
            self.sums.len(),
            self.output.len()
        );
        Ok(())
    }

    /// Move re-serialized bytes through the compressor into the output buffer.
    fn pump(&mut self) -> Result<()> {
        let pending = self.writer.get_mut();
        self.compressor.write_flush(pending, &mut self.output)?;
        pending.clear();
        Ok(())
    }
}

impl<R: Read> Read for TarSum<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_normalized(buf).map_err(io::Error::from)
    }
}

impl<R> fmt::Debug for TarSum<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TarSum")
            .field("version", &self.version)
            .field("hash", &self.hash.name())
            .field("state", &self.state)
            .field("entries", &self.sums.len())
            .field("buffered", &self.output.len())
            .finish()
    }
}

/// Scratch buffer size for a read of `requested` bytes
fn scratch_len(requested: usize) -> usize {
    if requested <= BUF_8K {
        BUF_8K
    } else if requested <= BUF_16K {
        BUF_16K
    } else if requested <= BUF_32K {
        BUF_32K
    } else {
        requested
    }
}

/// Drain `source` through a [`TarSum`] and return its checksum.
///
/// The normalized stream is discarded.
pub fn digest_reader<R: Read>(
    source: R,
    options: &TarSumOptions,
    extra: Option<&[u8]>,
) -> Result<String> {
    let mut tarsum = TarSum::with_options(source, options);
    io::copy(&mut tarsum, &mut io::sink())?;
    tarsum.sum(extra)
}
