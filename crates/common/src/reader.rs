//! Forward-only tar reader
//!
//! Reads one header block at a time, folds GNU long-name/long-link entries
//! and PAX extended headers into the entry that follows them, and exposes
//! the entry's content through [`TarReader::read`]. Block padding is skipped
//! when the next header is requested.

use std::io::{self, Read};

use tar::{EntryType, PaxExtensions};
use tracing::trace;

use crate::header::{EntryHeader, BLOCK_SIZE};
use crate::{Error, Result};

/// Upper bound on the payload of a single extension entry
const MAX_EXTENSION_SIZE: u64 = 1024 * 1024;

const PAX_XATTR_PREFIX: &str = "SCHILY.xattr.";

/// Streaming tar parser
#[derive(Debug)]
pub struct TarReader<R> {
    inner: R,
    /// Content bytes left in the current entry
    remaining: u64,
    /// Padding after the current entry's content
    pad: u64,
    done: bool,
}

/// Overrides collected from extension entries for the next real header
#[derive(Debug, Default)]
struct Overrides {
    name: Option<Vec<u8>>,
    link_name: Option<Vec<u8>>,
    pax: Vec<(String, Vec<u8>)>,
}

impl Overrides {
    fn apply(self, header: &mut EntryHeader) -> Result<()> {
        if let Some(name) = self.name {
            header.name = name;
        }
        if let Some(link_name) = self.link_name {
            header.link_name = link_name;
        }
        for (key, value) in self.pax {
            match key.as_str() {
                "path" => header.name = value,
                "linkpath" => header.link_name = value,
                "uname" => header.username = value,
                "gname" => header.groupname = value,
                "size" => header.size = parse_pax_number(&key, &value)?,
                "uid" => header.uid = parse_pax_number(&key, &value)?,
                "gid" => header.gid = parse_pax_number(&key, &value)?,
                "mtime" => {
                    // fractional seconds are dropped
                    let whole = value.split(|&b| b == b'.').next().unwrap_or_default();
                    header.mtime = parse_pax_number(&key, whole)?;
                }
                _ => {
                    if let Some(attr) = key.strip_prefix(PAX_XATTR_PREFIX) {
                        header.xattrs.insert(attr.to_string(), value);
                    }
                }
            }
        }
        Ok(())
    }
}

fn parse_pax_number(key: &str, value: &[u8]) -> Result<u64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            Error::ArchiveFormat(format!(
                "invalid PAX {} value: {:?}",
                key,
                String::from_utf8_lossy(value)
            ))
        })
}

impl<R: Read> TarReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            remaining: 0,
            pad: 0,
            done: false,
        }
    }

    /// Advance to the next entry.
    ///
    /// Skips whatever is left of the current entry. Returns `Ok(None)` at the
    /// end-of-archive marker, or at a clean end of input on a block boundary.
    pub fn next_header(&mut self) -> Result<Option<EntryHeader>> {
        if self.done {
            return Ok(None);
        }
        self.skip_current()?;

        let mut overrides = Overrides::default();
        loop {
            let block = match self.read_block()? {
                Some(block) => block,
                None => return Ok(self.end()),
            };

            if is_zero_block(&block) {
                // The marker is two zero blocks; tolerate a missing second one.
                return match self.read_block()? {
                    Some(next) if !is_zero_block(&next) => Err(Error::ArchiveFormat(
                        "data after end-of-archive marker".to_string(),
                    )),
                    _ => Ok(self.end()),
                };
            }

            let mut header = EntryHeader::decode(&block)?;
            match header.entry_type() {
                EntryType::GNULongName => {
                    let data = self.read_extension(header.size, "long name")?;
                    overrides.name = Some(c_string(&data));
                }
                EntryType::GNULongLink => {
                    let data = self.read_extension(header.size, "long link")?;
                    overrides.link_name = Some(c_string(&data));
                }
                EntryType::XHeader => {
                    let data = self.read_extension(header.size, "PAX header")?;
                    overrides.pax.extend(pax_records(&data)?);
                }
                EntryType::GNUSparse => {
                    return Err(Error::ArchiveFormat(format!(
                        "GNU sparse entry {} is not supported",
                        String::from_utf8_lossy(&header.name)
                    )));
                }
                _ => {
                    overrides.apply(&mut header)?;
                    self.remaining = header.content_size();
                    self.pad = padding(self.remaining);
                    trace!("Entry {} ({} bytes)", header.display_name(), header.size);
                    return Ok(Some(header));
                }
            }
        }
    }

    /// Read content of the current entry. Returns `Ok(0)` once the entry is
    /// exhausted, or before the first header has been read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = usize::try_from(self.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let n = loop {
            match self.inner.read(&mut buf[..want]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::SourceRead(e)),
            }
        };
        if n == 0 {
            return Err(Error::ArchiveFormat(format!(
                "unexpected end of archive: {} content bytes missing",
                self.remaining
            )));
        }
        self.remaining -= n as u64;
        Ok(n)
    }

    /// Content bytes left in the current entry
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn end(&mut self) -> Option<EntryHeader> {
        self.done = true;
        trace!("End of archive");
        None
    }

    fn skip_current(&mut self) -> Result<()> {
        let skip = self.remaining + self.pad;
        if skip == 0 {
            return Ok(());
        }
        let copied = io::copy(&mut (&mut self.inner).take(skip), &mut io::sink())
            .map_err(Error::SourceRead)?;
        if copied < skip {
            return Err(Error::ArchiveFormat(format!(
                "unexpected end of archive: {} bytes missing from entry",
                skip - copied
            )));
        }
        self.remaining = 0;
        self.pad = 0;
        Ok(())
    }

    /// Read one block; `None` on a clean end of input before its first byte.
    fn read_block(&mut self) -> Result<Option<[u8; BLOCK_SIZE]>> {
        let mut block = [0u8; BLOCK_SIZE];
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            match self.inner.read(&mut block[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(Error::ArchiveFormat(format!(
                        "truncated header block: got {} of {} bytes",
                        filled, BLOCK_SIZE
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::SourceRead(e)),
            }
        }
        Ok(Some(block))
    }

    fn read_extension(&mut self, size: u64, what: &str) -> Result<Vec<u8>> {
        if size > MAX_EXTENSION_SIZE {
            return Err(Error::ArchiveFormat(format!(
                "{} entry too large: {} bytes",
                what, size
            )));
        }
        let mut data = vec![0u8; size as usize];
        self.inner.read_exact(&mut data).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::ArchiveFormat(format!("truncated {} entry", what))
            }
            _ => Error::SourceRead(e),
        })?;
        self.remaining = 0;
        self.pad = padding(size);
        self.skip_current()?;
        Ok(data)
    }
}

/// Zero bytes needed to round `size` up to a whole block
pub fn padding(size: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    (block - size % block) % block
}

fn is_zero_block(block: &[u8; BLOCK_SIZE]) -> bool {
    block.iter().all(|&b| b == 0)
}

fn c_string(data: &[u8]) -> Vec<u8> {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    data[..end].to_vec()
}

/// Collect PAX extended header records as `(key, raw value)` pairs.
pub fn pax_records(data: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    PaxExtensions::new(data)
        .map(|record| -> Result<(String, Vec<u8>)> {
            let record = record.map_err(|e| Error::ArchiveFormat(e.to_string()))?;
            let key = record
                .key()
                .map_err(|_| Error::ArchiveFormat("PAX record key is not UTF-8".to_string()))?;
            Ok((key.to_string(), record.value_bytes().to_vec()))
        })
        .collect()
}
