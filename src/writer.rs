//! Streaming JPEG rewriter
//!
//! [`ExifWriter`] is a `Write` filter: JPEG bytes pushed into it come out
//! of the wrapped writer with a freshly serialized EXIF APP1 segment placed
//! right after SOI and the first existing APP1 segment removed. Input may
//! arrive in chunks of any size; only four bytes are ever held back.
//!
//! ```text
//! AtStart ──SOI──▶ ScanningHeaderSegments ──APP1 / SOF / SOS / EOI──▶ CopyingImageData
//! ```

use crate::{
    error::{Error, Result},
    exif_data::ExifData,
    layout::ExifLayout,
    registry::TagRegistry,
};
use std::io::{self, BufWriter, Write};
use tracing::{debug, warn};

const SOI: u8 = 0xD8; // Start of Image
const EOI: u8 = 0xD9; // End of Image
const APP1: u8 = 0xE1; // EXIF
const SOS: u8 = 0xDA; // Start of Scan

const SOF0: u8 = 0xC0;
const SOF15: u8 = 0xCF;
const DHT: u8 = 0xC4; // Huffman tables
const JPG: u8 = 0xC8; // Reserved
const DAC: u8 = 0xCC; // Arithmetic coding conditioning

/// Output buffer size used unless overridden
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AtStart,
    ScanningHeaderSegments,
    CopyingImageData,
}

/// Rewrites a JPEG stream, replacing its EXIF block
///
/// # Example
///
/// ```
/// use exif_io::{ExifData, ExifWriter, TagRegistry};
///
/// # fn main() -> exif_io::Result<()> {
/// let registry = TagRegistry::standard();
/// let exif = ExifData::default();
///
/// let mut writer = ExifWriter::new(Vec::new(), &registry).with_exif_data(&exif);
/// writer.process(&[0xFF, 0xD8, 0xFF, 0xD9])?;
/// let jpeg = writer.finish()?;
///
/// assert_eq!(&jpeg[..4], &[0xFF, 0xD8, 0xFF, 0xE1]);
/// # Ok(())
/// # }
/// ```
pub struct ExifWriter<'a, W: Write> {
    out: BufWriter<W>,
    exif: Option<&'a ExifData>,
    registry: &'a TagRegistry,
    state: State,
    staged: [u8; 4],
    staged_len: usize,
    bytes_to_skip: usize,
    bytes_to_copy: usize,
    /// Input bytes consumed so far
    position: u64,
}

impl<'a, W: Write> ExifWriter<'a, W> {
    /// Wrap `out`; without EXIF data the existing block is only removed
    pub fn new(out: W, registry: &'a TagRegistry) -> Self {
        Self {
            out: BufWriter::with_capacity(DEFAULT_BUFFER_CAPACITY, out),
            exif: None,
            registry,
            state: State::AtStart,
            staged: [0; 4],
            staged_len: 0,
            bytes_to_skip: 0,
            bytes_to_copy: 0,
            position: 0,
        }
    }

    /// EXIF data to insert after SOI
    pub fn with_exif_data(mut self, exif: &'a ExifData) -> Self {
        self.exif = Some(exif);
        self
    }

    /// Change the output buffer size; call before any data is processed
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        let (inner, _) = self.out.into_parts();
        self.out = BufWriter::with_capacity(capacity, inner);
        self
    }

    /// The wrapped writer; buffered output may not have reached it yet
    pub fn get_ref(&self) -> &W {
        self.out.get_ref()
    }

    /// Push the next chunk of the input JPEG
    pub fn process(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            if self.bytes_to_skip > 0 {
                let n = self.bytes_to_skip.min(data.len());
                self.bytes_to_skip -= n;
                data = self.consume(data, n);
                continue;
            }
            if self.bytes_to_copy > 0 {
                let n = self.bytes_to_copy.min(data.len());
                self.out.write_all(&data[..n])?;
                self.bytes_to_copy -= n;
                data = self.consume(data, n);
                continue;
            }

            match self.state {
                State::AtStart => {
                    data = self.stage(data, 2);
                    if self.staged_len == 2 {
                        self.start_image()?;
                    }
                }
                State::ScanningHeaderSegments => {
                    data = self.stage(data, 4);
                    self.scan_marker()?;
                }
                State::CopyingImageData => {
                    self.out.write_all(data)?;
                    data = self.consume(data, data.len());
                }
            }
        }
        Ok(())
    }

    fn consume<'d>(&mut self, data: &'d [u8], n: usize) -> &'d [u8] {
        self.position += n as u64;
        &data[n..]
    }

    /// Move bytes into the staging buffer until it holds `want`
    fn stage<'d>(&mut self, data: &'d [u8], want: usize) -> &'d [u8] {
        let n = want.saturating_sub(self.staged_len).min(data.len());
        self.staged[self.staged_len..self.staged_len + n].copy_from_slice(&data[..n]);
        self.staged_len += n;
        self.consume(data, n)
    }

    fn forward_staged(&mut self) -> io::Result<()> {
        let staged_len = self.staged_len;
        self.staged_len = 0;
        self.out.write_all(&self.staged[..staged_len])
    }

    fn start_image(&mut self) -> Result<()> {
        if self.staged[..2] != [0xFF, SOI] {
            return Err(Error::InvalidFormat("Not a valid JPEG".into()));
        }

        // Lay out first so an oversized block leaves the output untouched
        let layout = self
            .exif
            .map(|exif| ExifLayout::build(exif, self.registry))
            .transpose()?;

        self.forward_staged()?;
        if let Some(layout) = layout {
            layout.write_to(&mut self.out)?;
            debug!("Inserted EXIF block ({} bytes)", layout.size());
        }
        self.state = State::ScanningHeaderSegments;
        Ok(())
    }

    fn scan_marker(&mut self) -> Result<()> {
        if self.staged_len >= 2 && self.staged[..2] == [0xFF, EOI] {
            debug!("End of image reached in header segments");
            self.forward_staged()?;
            self.state = State::CopyingImageData;
            return Ok(());
        }
        if self.staged_len < 4 {
            return Ok(());
        }

        let offset = self.position - self.staged_len as u64;
        let marker = self.staged[1];
        if self.staged[0] != 0xFF {
            return Err(Error::InvalidSegment {
                offset,
                reason: format!("Expected marker, got 0x{:02X}", self.staged[0]),
            });
        }
        let length = u16::from_be_bytes([self.staged[2], self.staged[3]]) as usize;
        if length < 2 {
            return Err(Error::InvalidSegment {
                offset,
                reason: format!("Invalid segment length {}", length),
            });
        }

        if marker == APP1 {
            debug!("Dropping existing APP1 segment at {} ({} bytes)", offset, length);
            self.staged_len = 0;
            self.bytes_to_skip = length - 2;
            self.state = State::CopyingImageData;
        } else if is_start_of_frame(marker) || marker == SOS {
            debug!("Marker 0x{:02X} at {}, copying image data", marker, offset);
            self.forward_staged()?;
            self.state = State::CopyingImageData;
        } else {
            self.forward_staged()?;
            self.bytes_to_copy = length - 2;
        }
        Ok(())
    }

    /// Flush and return the wrapped writer
    ///
    /// Bytes still held in the staging buffer are forwarded as they are.
    pub fn finish(mut self) -> Result<W> {
        if self.state == State::AtStart {
            return Err(Error::InvalidFormat(
                "Not a valid JPEG: stream ended before SOI".into(),
            ));
        }
        if self.staged_len > 0 {
            self.forward_staged()?;
        }
        if self.bytes_to_skip > 0 || self.bytes_to_copy > 0 {
            warn!(
                "Input ended inside a segment ({} bytes missing)",
                self.bytes_to_skip + self.bytes_to_copy
            );
        }
        self.out
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

impl<W: Write> Write for ExifWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.process(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn is_start_of_frame(marker: u8) -> bool {
    (SOF0..=SOF15).contains(&marker) && !matches!(marker, DHT | JPG | DAC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        tag::Tag,
        tags,
        tiff::{DataType, IfdId},
    };

    fn rewrite(input: &[u8], exif: Option<&ExifData>) -> Result<Vec<u8>> {
        let registry = TagRegistry::standard();
        let mut writer = ExifWriter::new(Vec::new(), &registry);
        if let Some(exif) = exif {
            writer = writer.with_exif_data(exif);
        }
        writer.process(input)?;
        writer.finish()
    }

    fn rewrite_bytewise(input: &[u8], exif: &ExifData) -> Vec<u8> {
        let registry = TagRegistry::standard();
        let mut writer = ExifWriter::new(Vec::new(), &registry)
            .with_exif_data(exif)
            .with_buffer_capacity(16);
        for byte in input {
            writer.process(std::slice::from_ref(byte)).unwrap();
        }
        writer.finish().unwrap()
    }

    /// SOI, APP0, old APP1, DQT, SOF0, SOS, scan data, EOI
    fn sample_jpeg() -> Vec<u8> {
        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0]);
        jpeg.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x06, b'o', b'l', b'd', b'!']);
        jpeg.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x03, 0x11]);
        jpeg.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x04, 0x08, 0x00]);
        jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0x00]);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_degenerate_image() {
        let out = rewrite(&[0xFF, 0xD8, 0xFF, 0xD9], Some(&ExifData::default())).unwrap();
        #[rustfmt::skip]
        let expected: &[u8] = &[
            0xFF, 0xD8,
            0xFF, 0xE1, 0x00, 0x28, b'E', b'x', b'i', b'f', 0, 0,
            b'M', b'M', 0x00, 0x2A, 0, 0, 0, 8,
            0, 1, 0x87, 0x69, 0, 4, 0, 0, 0, 1, 0, 0, 0, 0x1A, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0,
            0xFF, 0xD9,
        ];
        assert_eq!(out.len(), 46);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_old_app1_replaced() {
        let input = sample_jpeg();
        let out = rewrite(&input, Some(&ExifData::default())).unwrap();

        // SOI, new APP1 (42 bytes), then APP0 and everything after the old APP1
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_eq!(&out[2..4], &[0xFF, 0xE1]);
        let mut expected_tail = input[2..11].to_vec();
        expected_tail.extend_from_slice(&input[19..]);
        assert_eq!(&out[44..], expected_tail.as_slice());
        assert!(!out.windows(4).any(|w| w == b"old!"));
    }

    #[test]
    fn test_without_exif_data() {
        let input = sample_jpeg();
        let out = rewrite(&input, None).unwrap();
        let mut expected = input[..11].to_vec();
        expected.extend_from_slice(&input[19..]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_chunking_independence() {
        let input = sample_jpeg();
        let exif = ExifData::default();
        let whole = rewrite(&input, Some(&exif)).unwrap();
        assert_eq!(rewrite_bytewise(&input, &exif), whole);

        let degenerate = [0xFF, 0xD8, 0xFF, 0xD9];
        assert_eq!(
            rewrite_bytewise(&degenerate, &exif),
            rewrite(&degenerate, Some(&exif)).unwrap()
        );
    }

    #[test]
    fn test_only_first_app1_removed() {
        let mut input = vec![0xFF, 0xD8];
        input.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x04, 0xAA, 0xBB]);
        input.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x04, 0xCC, 0xDD]);
        input.extend_from_slice(&[0xFF, 0xD9]);

        let out = rewrite(&input, None).unwrap();
        assert_eq!(out, [0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x04, 0xCC, 0xDD, 0xFF, 0xD9]);
    }

    #[test]
    fn test_not_a_jpeg() {
        let err = rewrite(b"\x89PNG\r\n", None).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_invalid_marker() {
        let err = rewrite(&[0xFF, 0xD8, 0x12, 0x34, 0x00, 0x10], None).unwrap_err();
        assert!(matches!(err, Error::InvalidSegment { offset: 2, .. }));

        let err = rewrite(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x01], None).unwrap_err();
        assert!(matches!(err, Error::InvalidSegment { offset: 2, .. }));
    }

    #[test]
    fn test_finish_before_soi() {
        let registry = TagRegistry::standard();
        let mut writer = ExifWriter::new(Vec::new(), &registry);
        writer.process(&[0xFF]).unwrap();
        assert!(matches!(writer.finish(), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_finish_forwards_staged_bytes() {
        let out = rewrite(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00], None).unwrap();
        assert_eq!(out, [0xFF, 0xD8, 0xFF, 0xE0, 0x00]);
    }

    #[test]
    fn test_oversized_block_writes_nothing() {
        let mut exif = ExifData::default();
        let mut note = Tag::new(tags::MAKER_NOTE, IfdId::Exif, DataType::Undefined);
        note.set_value(crate::tag::TagValue::Bytes(vec![0; 70_000]))
            .unwrap();
        exif.set_tag(note);

        let registry = TagRegistry::standard();
        let mut writer = ExifWriter::new(Vec::new(), &registry).with_exif_data(&exif);
        let err = writer.process(&[0xFF, 0xD8, 0xFF, 0xD9]).unwrap_err();
        assert!(matches!(err, Error::DataTooLarge { .. }));
        writer.flush().unwrap();
        assert!(writer.get_ref().is_empty());
    }

    #[test]
    fn test_io_write_surfaces_errors() {
        let registry = TagRegistry::standard();
        let mut writer = ExifWriter::new(Vec::new(), &registry);
        let err = writer.write_all(b"GIF89a").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
