//! Decoded tar entry headers
//!
//! [`EntryHeader`] is the format-independent view of one archive entry: the
//! fields of a v7/ustar/GNU header block after GNU long-name and PAX
//! extended records have been folded in. It is what the header selectors
//! canonicalize and what [`TarWriter`](crate::writer::TarWriter) re-encodes.

use std::borrow::Cow;
use std::collections::BTreeMap;

use tar::{EntryType, Header};

use crate::{Error, Result};

/// Size of one tar block
pub const BLOCK_SIZE: usize = 512;

/// Byte range of the checksum field inside a header block
const CKSUM_RANGE: std::ops::Range<usize> = 148..156;

/// One archive entry's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Raw name bytes; tar does not mandate an encoding
    pub name: Vec<u8>,
    pub mode: u64,
    pub uid: u64,
    pub gid: u64,
    pub size: u64,
    /// Modification time in Unix seconds
    pub mtime: u64,
    /// Raw type byte, kept verbatim (`b'\0'` and `b'0'` are distinct here)
    pub typeflag: u8,
    pub link_name: Vec<u8>,
    pub username: Vec<u8>,
    pub groupname: Vec<u8>,
    pub dev_major: u64,
    pub dev_minor: u64,
    /// Extended attributes from `SCHILY.xattr.*` PAX records
    pub xattrs: BTreeMap<String, Vec<u8>>,
}

impl EntryHeader {
    /// Create a header with the given name and type; every other field is zero.
    pub fn new(name: impl Into<Vec<u8>>, entry_type: EntryType) -> Self {
        Self {
            name: name.into(),
            mode: 0,
            uid: 0,
            gid: 0,
            size: 0,
            mtime: 0,
            typeflag: entry_type.as_byte(),
            link_name: Vec::new(),
            username: Vec::new(),
            groupname: Vec::new(),
            dev_major: 0,
            dev_minor: 0,
            xattrs: BTreeMap::new(),
        }
    }

    /// Regular file header with mode 0644
    pub fn file(name: impl Into<Vec<u8>>, size: u64) -> Self {
        Self {
            mode: 0o644,
            size,
            ..Self::new(name, EntryType::Regular)
        }
    }

    pub fn entry_type(&self) -> EntryType {
        EntryType::new(self.typeflag)
    }

    /// Bytes of content following the header.
    ///
    /// Links, devices, directories and FIFOs never carry content, whatever
    /// their size field says.
    pub fn content_size(&self) -> u64 {
        match self.entry_type() {
            EntryType::Link
            | EntryType::Symlink
            | EntryType::Char
            | EntryType::Block
            | EntryType::Directory
            | EntryType::Fifo => 0,
            _ => self.size,
        }
    }

    /// Entry name with one leading `./` and one trailing `/` removed.
    ///
    /// This is the name recorded in the per-entry sums.
    pub fn normalized_name(&self) -> &[u8] {
        let name = self.name.strip_prefix(b"./").unwrap_or(&self.name);
        name.strip_suffix(b"/").unwrap_or(name)
    }

    /// Normalized name for display, with invalid UTF-8 replaced
    pub fn display_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.normalized_name())
    }

    /// Decode a single header block.
    ///
    /// The block checksum is verified first. Extension records (GNU long
    /// names, PAX) are not applied here; see [`TarReader`](crate::reader::TarReader).
    pub fn decode(block: &[u8; BLOCK_SIZE]) -> Result<Self> {
        verify_checksum(block)?;

        let header = Header::from_byte_slice(block);
        let old = header.as_old();

        let (dev_major, dev_minor) = if let Some(ustar) = header.as_ustar() {
            (
                parse_numeric(&ustar.dev_major, "devmajor")?,
                parse_numeric(&ustar.dev_minor, "devminor")?,
            )
        } else if let Some(gnu) = header.as_gnu() {
            (
                parse_numeric(&gnu.dev_major, "devmajor")?,
                parse_numeric(&gnu.dev_minor, "devminor")?,
            )
        } else {
            (0, 0)
        };

        Ok(Self {
            name: header.path_bytes().into_owned(),
            mode: parse_numeric(&old.mode, "mode")?,
            uid: parse_numeric(&old.uid, "uid")?,
            gid: parse_numeric(&old.gid, "gid")?,
            size: parse_numeric(&old.size, "size")?,
            mtime: parse_numeric(&old.mtime, "mtime")?,
            typeflag: old.linkflag[0],
            link_name: header
                .link_name_bytes()
                .map(Cow::into_owned)
                .unwrap_or_default(),
            username: header.username_bytes().map(<[u8]>::to_vec).unwrap_or_default(),
            groupname: header.groupname_bytes().map(<[u8]>::to_vec).unwrap_or_default(),
            dev_major,
            dev_minor,
            xattrs: BTreeMap::new(),
        })
    }
}

/// Parse a numeric header field.
///
/// Accepts NUL/space padded octal and the GNU base-256 encoding (high bit
/// set). An empty field reads as zero.
pub fn parse_numeric(field: &[u8], what: &str) -> Result<u64> {
    if let Some((&first, rest)) = field.split_first() {
        if first & 0x80 != 0 {
            if first & 0x40 != 0 {
                return Err(Error::ArchiveFormat(format!(
                    "negative value in {} field",
                    what
                )));
            }
            let mut value = u64::from(first & 0x3f);
            for &b in rest {
                value = value
                    .checked_mul(256)
                    .and_then(|v| v.checked_add(u64::from(b)))
                    .ok_or_else(|| {
                        Error::ArchiveFormat(format!("{} field overflows 64 bits", what))
                    })?;
            }
            return Ok(value);
        }
    }

    let start = field.iter().position(|&b| b != b' ' && b != 0);
    let end = field.iter().rposition(|&b| b != b' ' && b != 0);
    let digits = match (start, end) {
        (Some(start), Some(end)) => &field[start..=end],
        _ => return Ok(0),
    };

    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| u64::from_str_radix(s, 8).ok())
        .ok_or_else(|| {
            Error::ArchiveFormat(format!(
                "{} field is not an octal number: {:?}",
                what,
                String::from_utf8_lossy(digits)
            ))
        })
}

/// Check the stored header checksum against the block contents.
///
/// Both the unsigned and the historical signed-byte sums are accepted.
pub fn verify_checksum(block: &[u8; BLOCK_SIZE]) -> Result<()> {
    let recorded = parse_numeric(&block[CKSUM_RANGE], "checksum")?;

    let (unsigned, signed) =
        block
            .iter()
            .enumerate()
            .fold((0u64, 0i64), |(unsigned, signed), (i, &b)| {
                let b = if CKSUM_RANGE.contains(&i) { b' ' } else { b };
                (unsigned + u64::from(b), signed + i64::from(b as i8))
            });

    if recorded == unsigned || i64::try_from(recorded).map_or(false, |r| r == signed) {
        Ok(())
    } else {
        Err(Error::ArchiveFormat(format!(
            "header checksum mismatch: recorded {}, computed {}",
            recorded, unsigned
        )))
    }
}
