//! Error types for exif-io

use crate::tiff::IfdId;
use std::io;

/// Result type for exif-io operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or rewriting EXIF data
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input is not a valid JPEG or TIFF structure
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Invalid JPEG marker segment
    #[error("Invalid segment at offset {offset}: {reason}")]
    InvalidSegment { offset: u64, reason: String },

    /// Serialized EXIF block does not fit in a single APP1 segment
    #[error("EXIF header too large: {size} bytes (max: {max})")]
    DataTooLarge { size: usize, max: usize },

    /// The tag registry has no definition for a tag the writer must synthesize
    #[error("No definition for required tag 0x{tag:04X} in {ifd:?}")]
    MissingTagDefinition { ifd: IfdId, tag: u16 },

    /// A value does not fit the tag it was assigned to
    #[error("Invalid value for tag 0x{tag:04X}: {reason}")]
    InvalidTagValue { tag: u16, reason: String },

    /// JPEG stream carries no EXIF APP1 segment
    #[error("EXIF data not found")]
    ExifNotFound,
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_passthrough() {
        let err: io::Error = Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")).into();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_format_error_maps_to_invalid_data() {
        let err: io::Error = Error::InvalidFormat("not a jpeg".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let inner = err.get_ref().and_then(|e| e.downcast_ref::<Error>());
        assert!(matches!(inner, Some(Error::InvalidFormat(_))));
    }
}
