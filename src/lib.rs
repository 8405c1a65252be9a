//! Streaming EXIF metadata I/O for JPEG images.
//!
//! This crate reads the EXIF block of a JPEG into an in-memory directory
//! store and writes a store back out by rewriting a JPEG stream in a single
//! pass.
//!
//! # Design Principles
//!
//! - **Streaming**: The writer is a `Write` filter holding back at most four bytes
//! - **Non-destructive**: Writing borrows the store; layout happens on a snapshot
//! - **Explicit configuration**: Tag definitions live in a [`TagRegistry`] passed by the caller
//!
//! # Quick Start
//!
//! ```
//! use exif_io::{read_exif, tags, write_exif, ExifData, IfdId, TagRegistry};
//!
//! # fn main() -> exif_io::Result<()> {
//! let registry = TagRegistry::standard();
//!
//! let mut exif = ExifData::default();
//! let mut make = registry.build_uninitialized_tag(IfdId::Ifd0, tags::MAKE).unwrap();
//! make.set_ascii("Canon")?;
//! exif.set_tag(make);
//!
//! let jpeg: &[u8] = &[0xFF, 0xD8, 0xFF, 0xD9];
//! let output = write_exif(jpeg, Vec::new(), &exif, &registry)?;
//!
//! let read_back = read_exif(output.as_slice(), &registry)?;
//! assert_eq!(read_back, exif);
//! # Ok(())
//! # }
//! ```
//!
//! # Streaming API
//!
//! [`ExifWriter`] accepts the input in chunks of any size:
//!
//! ```no_run
//! use exif_io::{ExifReader, ExifWriter, TagRegistry};
//! use std::fs::File;
//! use std::io;
//!
//! # fn main() -> exif_io::Result<()> {
//! let registry = TagRegistry::standard();
//! let exif = ExifReader::new(&registry).read(File::open("camera.jpg")?)?;
//!
//! let mut writer = ExifWriter::new(File::create("output.jpg")?, &registry)
//!     .with_exif_data(&exif);
//! io::copy(&mut File::open("edited.jpg")?, &mut writer)?;
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

mod error;
mod exif_data;
mod ifd;
mod layout;
mod parser;
mod reader;
mod registry;
mod tag;
pub mod tags;
mod tiff;
mod writer;

pub use error::{Error, Result};
pub use exif_data::{ExifData, Thumbnail};
pub use ifd::IfdData;
pub use layout::{ExifLayout, MAX_EXIF_SIZE, MAX_SEGMENT_SIZE};
pub use parser::{find_exif_segment, EventSource, ParseEvent, TiffParser, EXIF_SIGNATURE};
pub use reader::ExifReader;
pub use registry::{TagDefinition, TagRegistry};
pub use tag::{Rational, SRational, Tag, TagValue};
pub use tiff::{ByteOrder, DataType, IfdId, MAX_IFD_TAGS, TIFF_HEADER_SIZE};
pub use writer::{ExifWriter, DEFAULT_BUFFER_CAPACITY};

// Test utilities - only compiled for tests or when explicitly enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::io::{self, Read, Write};

/// Read the EXIF block of a JPEG stream
///
/// Fails with [`Error::ExifNotFound`] when the stream has no EXIF APP1
/// segment.
pub fn read_exif<R: Read>(source: R, registry: &TagRegistry) -> Result<ExifData> {
    ExifReader::new(registry).read(source)
}

/// Copy a JPEG from `source` to `dest`, replacing its EXIF block with `exif`
///
/// Returns `dest` once everything has been flushed.
pub fn write_exif<R: Read, W: Write>(
    mut source: R,
    dest: W,
    exif: &ExifData,
    registry: &TagRegistry,
) -> Result<W> {
    let mut writer = ExifWriter::new(dest, registry).with_exif_data(exif);
    let mut buffer = vec![0u8; DEFAULT_BUFFER_CAPACITY];
    loop {
        let n = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.process(&buffer[..n])?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{minimal_jpeg, sample_exif_data};

    #[test]
    fn test_write_then_read() {
        let registry = TagRegistry::standard();
        let exif = sample_exif_data().unwrap();

        let output = write_exif(minimal_jpeg().as_slice(), Vec::new(), &exif, &registry).unwrap();
        let read_back = read_exif(output.as_slice(), &registry).unwrap();
        assert_eq!(read_back, exif);
    }

    #[test]
    fn test_read_exif_not_found() {
        let registry = TagRegistry::standard();
        let result = read_exif(minimal_jpeg().as_slice(), &registry);
        assert!(matches!(result, Err(Error::ExifNotFound)));
    }

    /// Fails every other read with `Interrupted`
    struct InterruptingReader<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for InterruptingReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::ErrorKind::Interrupted.into());
            }
            let n = buf.len().min(self.data.len()).min(3);
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_write_exif_retries_interrupted_reads() {
        let registry = TagRegistry::standard();
        let exif = sample_exif_data().unwrap();
        let jpeg = minimal_jpeg();

        let expected = write_exif(jpeg.as_slice(), Vec::new(), &exif, &registry).unwrap();
        let source = InterruptingReader {
            data: &jpeg,
            interrupt: false,
        };
        let output = write_exif(source, Vec::new(), &exif, &registry).unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_write_exif_rejects_non_jpeg() {
        let registry = TagRegistry::standard();
        let exif = ExifData::default();
        let result = write_exif(&b"not a jpeg"[..], Vec::new(), &exif, &registry);
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }
}
