//! Output side of the transform: optional gzip compression into a byte buffer

use std::io::Write;

use bytes::{Buf, BytesMut};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::{Error, Result};

/// Compressor feeding the caller-visible output buffer
pub(crate) enum Compressor {
    Gzip(GzEncoder<Vec<u8>>),
    Identity,
}

impl Compressor {
    pub(crate) fn new(compress: bool) -> Self {
        if compress {
            Compressor::Gzip(GzEncoder::new(Vec::new(), Compression::default()))
        } else {
            Compressor::Identity
        }
    }

    /// Compress `data`, flush, and move everything produced so far into `out`.
    pub(crate) fn write_flush(&mut self, data: &[u8], out: &mut BytesMut) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        match self {
            Compressor::Identity => out.extend_from_slice(data),
            Compressor::Gzip(encoder) => {
                encoder.write_all(data).map_err(Error::Compression)?;
                encoder.flush().map_err(Error::Compression)?;
                drain(encoder.get_mut(), out);
            }
        }
        Ok(())
    }

    /// Write the compressed stream's trailer into `out`.
    pub(crate) fn finish(&mut self, out: &mut BytesMut) -> Result<()> {
        if let Compressor::Gzip(encoder) = self {
            encoder.try_finish().map_err(Error::Compression)?;
            drain(encoder.get_mut(), out);
        }
        Ok(())
    }
}

fn drain(produced: &mut Vec<u8>, out: &mut BytesMut) {
    out.extend_from_slice(produced);
    produced.clear();
}

/// Copy buffered output into `buf`, returning the byte count.
pub(crate) fn serve(out: &mut BytesMut, buf: &mut [u8]) -> usize {
    let n = out.len().min(buf.len());
    buf[..n].copy_from_slice(&out[..n]);
    out.advance(n);
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_identity_passes_bytes_through() {
        let mut out = BytesMut::new();
        let mut compressor = Compressor::new(false);
        compressor.write_flush(b"abc", &mut out).unwrap();
        compressor.finish(&mut out).unwrap();
        assert_eq!(&out[..], b"abc");
    }

    #[test]
    fn test_gzip_output_decompresses() {
        let mut out = BytesMut::new();
        let mut compressor = Compressor::new(true);
        compressor.write_flush(b"hello ", &mut out).unwrap();
        // flushed output is available before finishing
        assert!(!out.is_empty());
        compressor.write_flush(b"world", &mut out).unwrap();
        compressor.finish(&mut out).unwrap();

        let mut decoded = String::new();
        GzDecoder::new(&out[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, "hello world");
    }

    #[test]
    fn test_serve_drains_in_order() {
        let mut out = BytesMut::from(&b"abcdef"[..]);
        let mut buf = [0u8; 4];
        assert_eq!(serve(&mut out, &mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(serve(&mut out, &mut buf), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(serve(&mut out, &mut buf), 0);
    }
}
