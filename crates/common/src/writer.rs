//! Forward-only tar writer
//!
//! Headers are written as ustar blocks through [`tar::Builder`]. Values that
//! do not fit a ustar field (long names and link targets, long user/group
//! names, extended attributes) are carried in a PAX extended header emitted
//! just before the entry. Content may be written in any number of pieces;
//! block padding is added as soon as the declared size has been written.

use std::io::{self, Write};

use tar::{Builder, Header};

use crate::header::EntryHeader;
use crate::reader::padding;
use crate::{Error, Result};

const NAME_LEN: usize = 100;
const PREFIX_LEN: usize = 155;
const OWNER_LEN: usize = 32;

/// Largest value of an 8-byte octal field (mode, devmajor, devminor)
const MAX_OCTAL_8: u64 = 0o7777777;

/// PAX records for one entry, in emission order
type PaxRecords<'a> = Vec<(String, &'a [u8])>;

/// Streaming tar serializer
pub struct TarWriter<W: Write> {
    builder: Builder<W>,
    /// Content bytes still owed for the current entry
    remaining: u64,
    pad: u64,
    finished: bool,
}

impl<W: Write> TarWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            builder: Builder::new(inner),
            remaining: 0,
            pad: 0,
            finished: false,
        }
    }

    /// Start a new entry. The previous entry must be complete.
    pub fn write_header(&mut self, entry: &EntryHeader) -> Result<()> {
        self.check_writable()?;
        let (header, pax) = encode_header(entry)?;
        self.builder
            .append_pax_extensions(pax.iter().map(|(key, value)| (key.as_str(), *value)))
            .map_err(serialization)?;
        self.builder
            .append(&header, io::empty())
            .map_err(serialization)?;
        self.remaining = entry.content_size();
        self.pad = padding(self.remaining);
        Ok(())
    }

    /// Write content for the current entry.
    pub fn write_content(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if data.len() as u64 > self.remaining {
            return Err(Error::Serialization(format!(
                "write too long: {} bytes offered, {} remaining in entry",
                data.len(),
                self.remaining
            )));
        }
        self.put(data)?;
        self.remaining -= data.len() as u64;
        if self.remaining == 0 && self.pad > 0 {
            let pad = vec![0u8; self.pad as usize];
            self.put(&pad)?;
            self.pad = 0;
        }
        Ok(())
    }

    /// Write the end-of-archive marker (two zero blocks).
    pub fn finish(&mut self) -> Result<()> {
        self.check_writable()?;
        self.builder.finish().map_err(serialization)?;
        self.finished = true;
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.builder.get_mut()
    }

    /// Unwrap the sink, writing the end-of-archive marker if still missing.
    pub fn into_inner(self) -> Result<W> {
        self.builder.into_inner().map_err(serialization)
    }

    fn check_writable(&self) -> Result<()> {
        if self.finished {
            return Err(Error::Serialization(
                "archive already finished".to_string(),
            ));
        }
        if self.remaining > 0 {
            return Err(Error::Serialization(format!(
                "missed writing {} bytes of the previous entry",
                self.remaining
            )));
        }
        Ok(())
    }

    fn put(&mut self, data: &[u8]) -> Result<()> {
        self.builder.get_mut().write_all(data).map_err(serialization)
    }
}

fn serialization(e: io::Error) -> Error {
    Error::Serialization(e.to_string())
}

/// Encode the ustar header for an entry, plus the PAX records for values
/// that do not fit it.
pub fn encode_header(entry: &EntryHeader) -> Result<(Header, PaxRecords<'_>)> {
    let mut pax = PaxRecords::new();
    let mut header = Header::new_ustar();

    {
        let ustar = header
            .as_ustar_mut()
            .ok_or_else(|| Error::Serialization("ustar header expected".to_string()))?;

        match split_ustar_path(&entry.name) {
            Some((prefix, name)) => {
                copy_field(&mut ustar.prefix, prefix);
                copy_field(&mut ustar.name, name);
            }
            None => {
                pax.push(("path".to_string(), entry.name.as_slice()));
                copy_field(&mut ustar.name, &entry.name);
            }
        }

        if entry.link_name.len() > NAME_LEN {
            pax.push(("linkpath".to_string(), entry.link_name.as_slice()));
        }
        copy_field(&mut ustar.linkname, &entry.link_name);

        if entry.username.len() > OWNER_LEN {
            pax.push(("uname".to_string(), entry.username.as_slice()));
        }
        copy_field(&mut ustar.uname, &entry.username);

        if entry.groupname.len() > OWNER_LEN {
            pax.push(("gname".to_string(), entry.groupname.as_slice()));
        }
        copy_field(&mut ustar.gname, &entry.groupname);

        ustar.typeflag = [entry.typeflag];
    }

    header.set_mode(octal_field(entry.mode, "mode")?);
    header.set_uid(entry.uid);
    header.set_gid(entry.gid);
    header.set_size(entry.size);
    header.set_mtime(entry.mtime);
    header
        .set_device_major(octal_field(entry.dev_major, "devmajor")?)
        .map_err(serialization)?;
    header
        .set_device_minor(octal_field(entry.dev_minor, "devminor")?)
        .map_err(serialization)?;

    for (key, value) in &entry.xattrs {
        pax.push((format!("SCHILY.xattr.{}", key), value.as_slice()));
    }

    header.set_cksum();
    Ok((header, pax))
}

/// Check a value against an 8-byte octal field; the tar crate would
/// otherwise drop the high digits.
fn octal_field(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|_| value <= MAX_OCTAL_8)
        .ok_or_else(|| {
            Error::Serialization(format!(
                "{} {:o} does not fit an 8-byte octal field",
                what, value
            ))
        })
}

/// Split a path into ustar `(prefix, name)` fields, if it fits.
fn split_ustar_path(path: &[u8]) -> Option<(&[u8], &[u8])> {
    if path.len() <= NAME_LEN {
        return Some((&[], path));
    }
    if path.len() > PREFIX_LEN + 1 + NAME_LEN {
        return None;
    }
    path.iter()
        .enumerate()
        .filter(|&(_, &b)| b == b'/')
        .map(|(i, _)| i)
        .find(|&i| i <= PREFIX_LEN && i > 0 && path.len() - i - 1 <= NAME_LEN && i + 1 < path.len())
        .map(|i| (&path[..i], &path[i + 1..]))
}

/// Copy `src` into a fixed-size field, truncating if necessary.
fn copy_field(dst: &mut [u8], src: &[u8]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::BLOCK_SIZE;
    use crate::reader::TarReader;
    use tar::EntryType;

    fn read_back(bytes: &[u8]) -> Vec<(EntryHeader, Vec<u8>)> {
        let mut reader = TarReader::new(bytes);
        let mut entries = Vec::new();
        while let Some(header) = reader.next_header().unwrap() {
            let mut content = Vec::new();
            let mut buf = [0u8; 64];
            loop {
                let n = reader.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                content.extend_from_slice(&buf[..n]);
            }
            entries.push((header, content));
        }
        entries
    }

    #[test]
    fn test_round_trip_through_reader() {
        let mut file = EntryHeader::file("dir/a.txt", 5);
        file.uid = 1000;
        file.username = b"builder".to_vec();
        file.mtime = 1_600_000_000;
        let dir = EntryHeader::new("dir/", EntryType::Directory);

        let mut writer = TarWriter::new(Vec::new());
        writer.write_header(&dir).unwrap();
        writer.write_header(&file).unwrap();
        writer.write_content(b"he").unwrap();
        writer.write_content(b"llo").unwrap();
        writer.finish().unwrap();
        let bytes = writer.into_inner().unwrap();

        assert_eq!(bytes.len() % BLOCK_SIZE, 0);
        let entries = read_back(&bytes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, dir);
        assert_eq!(entries[1].0, file);
        assert_eq!(entries[1].1, b"hello");
    }

    #[test]
    fn test_tar_crate_reads_output() {
        let mut writer = TarWriter::new(Vec::new());
        writer.write_header(&EntryHeader::file("x.bin", 3)).unwrap();
        writer.write_content(&[1, 2, 3]).unwrap();
        writer.finish().unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut entries = archive.entries().unwrap();
        let entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some("x.bin"));
        assert_eq!(entry.header().size().unwrap(), 3);
        assert!(entries.next().is_none());
    }

    #[test]
    fn test_long_values_use_pax() {
        let long_name = format!("{}/{}", "p".repeat(200), "n".repeat(120));
        let mut file = EntryHeader::file(long_name, 0);
        file.link_name = "l".repeat(150).into_bytes();
        file.groupname = "g".repeat(40).into_bytes();
        file.xattrs
            .insert("security.selinux".to_string(), b"system_u:object_r".to_vec());

        let mut writer = TarWriter::new(Vec::new());
        writer.write_header(&file).unwrap();
        writer.finish().unwrap();

        let entries = read_back(&writer.into_inner().unwrap());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, file);
    }

    #[test]
    fn test_tar_crate_reads_pax_path() {
        let long_name = format!("{}/{}", "q".repeat(180), "leaf.txt");
        let mut writer = TarWriter::new(Vec::new());
        writer.write_header(&EntryHeader::file(long_name.clone(), 2)).unwrap();
        writer.write_content(b"ok").unwrap();
        writer.finish().unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut entries = archive.entries().unwrap();
        let entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path_bytes().as_ref(), long_name.as_bytes());
        assert!(entries.next().is_none());
    }

    #[test]
    fn test_non_utf8_name_is_written_verbatim() {
        let file = EntryHeader::file(b"f\xff".to_vec(), 0);
        let mut writer = TarWriter::new(Vec::new());
        writer.write_header(&file).unwrap();
        writer.finish().unwrap();

        let entries = read_back(&writer.into_inner().unwrap());
        assert_eq!(entries[0].0.name, b"f\xff");
    }

    #[test]
    fn test_oversized_device_numbers_are_rejected() {
        let mut dev = EntryHeader::new("dev/big", EntryType::Char);
        dev.dev_major = MAX_OCTAL_8;
        assert!(TarWriter::new(Vec::new()).write_header(&dev).is_ok());

        dev.dev_major = MAX_OCTAL_8 + 1;
        assert!(matches!(
            TarWriter::new(Vec::new()).write_header(&dev),
            Err(Error::Serialization(_))
        ));

        dev.dev_major = 1;
        dev.dev_minor = 1 << 32;
        assert!(matches!(
            TarWriter::new(Vec::new()).write_header(&dev),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_split_ustar_path() {
        let name = format!("{}/{}", "a".repeat(120), "b".repeat(50));
        let (prefix, rest) = split_ustar_path(name.as_bytes()).unwrap();
        assert_eq!(prefix.len(), 120);
        assert_eq!(rest.len(), 50);

        let unsplittable = "c".repeat(150);
        assert!(split_ustar_path(unsplittable.as_bytes()).is_none());
    }

    #[test]
    fn test_write_too_long_is_rejected() {
        let mut writer = TarWriter::new(Vec::new());
        writer.write_header(&EntryHeader::file("a", 1)).unwrap();
        assert!(matches!(
            writer.write_content(b"ab"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_incomplete_entry_is_rejected() {
        let mut writer = TarWriter::new(Vec::new());
        writer.write_header(&EntryHeader::file("a", 4)).unwrap();
        writer.write_content(b"ab").unwrap();
        assert!(matches!(writer.finish(), Err(Error::Serialization(_))));
        assert!(matches!(
            writer.write_header(&EntryHeader::file("b", 0)),
            Err(Error::Serialization(_))
        ));
    }
}
