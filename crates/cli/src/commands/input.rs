//! Opening archive inputs: files, stdin, and packed directories

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::Context;
use flate2::bufread::GzDecoder;
use tar::Builder;
use walkdir::WalkDir;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open `path` as a tar stream.
///
/// `-` reads standard input. Gzip input is detected by its magic bytes and
/// decompressed transparently. With `dir`, `path` is a directory that is
/// packed into a tar archive first.
pub fn open(path: &Path, dir: bool) -> anyhow::Result<Box<dyn Read>> {
    if dir {
        let packed = pack_directory(path)?;
        return Ok(Box::new(packed));
    }
    if path == Path::new("-") {
        return decompress(BufReader::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    decompress(BufReader::new(file))
}

/// Wrap `reader` in a gzip decoder if it starts with the gzip magic.
pub fn decompress<R: BufRead + 'static>(mut reader: R) -> anyhow::Result<Box<dyn Read>> {
    let head = reader.fill_buf().context("reading archive header")?;
    if head.starts_with(&GZIP_MAGIC) {
        tracing::debug!("Input is gzip-compressed");
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Pack a directory tree into a temporary tar file, entries in sorted order.
pub fn pack_directory(root: &Path) -> anyhow::Result<File> {
    if !root.is_dir() {
        anyhow::bail!("not a directory: {}", root.display());
    }

    let spool = tempfile::tempfile().context("creating temporary archive")?;
    let mut builder = Builder::new(spool);
    builder.follow_symlinks(false);

    let mut count = 0usize;
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        let name = entry.path().strip_prefix(root)?;
        builder
            .append_path_with_name(entry.path(), name)
            .with_context(|| format!("adding {}", entry.path().display()))?;
        count += 1;
    }
    tracing::debug!("Packed {} entries from {}", count, root.display());

    let mut spool = builder.into_inner().context("finishing archive")?;
    spool.seek(SeekFrom::Start(0))?;
    Ok(spool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    #[test]
    fn test_plain_input_passes_through() {
        let mut reader = decompress(Cursor::new(b"plain bytes".to_vec())).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "plain bytes");
    }

    #[test]
    fn test_gzip_input_is_decoded() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"compressed bytes").unwrap();
        let gz = encoder.finish().unwrap();

        let mut reader = decompress(Cursor::new(gz)).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "compressed bytes");
    }

    #[test]
    fn test_pack_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let packed = pack_directory(dir.path()).unwrap();
        let mut archive = tar::Archive::new(packed);
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| {
                let path = e.unwrap().path().unwrap().to_string_lossy().into_owned();
                path.trim_end_matches('/').to_string()
            })
            .collect();
        assert_eq!(names, vec!["a.txt", "sub", "sub/b.txt"]);
    }

    #[test]
    fn test_pack_requires_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(pack_directory(file.path()).is_err());
    }
}
