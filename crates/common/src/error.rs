//! Error types for tarsum

use std::io;

use thiserror::Error;

/// Result type alias using tarsum Error
pub type Result<T> = std::result::Result<T, Error>;

/// tarsum error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Source read error: {0}")]
    SourceRead(#[source] io::Error),

    #[error("Invalid archive: {0}")]
    ArchiveFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(#[source] io::Error),

    #[error("Invalid digest: {0}")]
    DigestFormat(String),

    #[error("Unknown tarsum version: {0}")]
    UnknownVersion(String),

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHash(String),

    #[error("Checksum requested before the archive stream was fully read")]
    NotFinished,

    #[error("Transform used after an earlier failure")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[source] io::Error),
}

impl Error {
    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Error::SourceRead(e) | Error::Compression(e) | Error::Io(e) => e.kind(),
            Error::ArchiveFormat(_) | Error::DigestFormat(_) => io::ErrorKind::InvalidData,
            Error::UnknownVersion(_) | Error::UnsupportedHash(_) => io::ErrorKind::InvalidInput,
            Error::Serialization(_) | Error::NotFinished | Error::Poisoned => io::ErrorKind::Other,
        }
    }
}

/// Errors crossing an `io::Read` boundary travel inside `io::Error`.
impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        io::Error::new(e.io_kind(), e)
    }
}

/// Recovers a typed error from an `io::Error` produced by [`TarSum`]'s
/// `Read` impl; anything else becomes [`Error::Io`].
///
/// [`TarSum`]: crate::TarSum
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            return Error::Io(e);
        }
        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(typed)) => *typed,
            Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
            None => Error::Io(kind.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_error_survives_io_boundary() {
        let io_err: io::Error = Error::ArchiveFormat("bad checksum".to_string()).into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        match Error::from(io_err) {
            Error::ArchiveFormat(msg) => assert_eq!(msg, "bad checksum"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_io_error_is_wrapped() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }
}
