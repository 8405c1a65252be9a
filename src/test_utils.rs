//! Test utilities for building synthetic JPEG streams and EXIF stores.
//!
//! This module provides helpers shared by unit tests, integration tests and
//! fuzz targets:
//! - [`JpegBuilder`] assembles JPEG streams segment by segment
//! - [`minimal_jpeg`] is a small, structurally complete JPEG without EXIF
//! - [`sample_exif_data`] is a store touching IFD0, EXIF, GPS and Interoperability
//! - [`split_segments`] splits a JPEG header into its marker segments
//!
//! # Usage
//!
//! ```
//! use exif_io::test_utils::*;
//!
//! # fn example() -> exif_io::Result<()> {
//! let jpeg = JpegBuilder::new()
//!     .app0_jfif()
//!     .app1(b"Exif\0\0old".to_vec())
//!     .sof0()
//!     .scan(&[0x12, 0x34])
//!     .build();
//!
//! let segments = split_segments(&jpeg);
//! assert_eq!(segments[0].marker, 0xE0);
//!
//! let _exif = sample_exif_data()?;
//! # Ok(())
//! # }
//! ```

use crate::{
    tags, ByteOrder, ExifData, IfdId, Rational, Result, SRational, Tag, TagRegistry, TagValue,
};

/// One marker segment of a JPEG header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub marker: u8,
    /// Complete segment bytes, marker and length included
    pub bytes: Vec<u8>,
}

/// Builds JPEG streams from individual segments
///
/// The stream always opens with SOI; [`JpegBuilder::build`] appends EOI.
#[derive(Debug, Clone)]
pub struct JpegBuilder {
    data: Vec<u8>,
}

impl Default for JpegBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JpegBuilder {
    pub fn new() -> Self {
        Self {
            data: vec![0xFF, 0xD8],
        }
    }

    /// Append a marker segment with a computed length field
    pub fn segment(mut self, marker: u8, payload: &[u8]) -> Self {
        self.data.extend_from_slice(&[0xFF, marker]);
        self.data
            .extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    pub fn app0_jfif(self) -> Self {
        self.segment(
            0xE0,
            &[b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0],
        )
    }

    pub fn app1(self, payload: Vec<u8>) -> Self {
        self.segment(0xE1, &payload)
    }

    /// APP1 carrying a TIFF body behind the EXIF identifier
    pub fn exif_app1(self, tiff: &[u8]) -> Self {
        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(tiff);
        self.app1(payload)
    }

    pub fn comment(self, text: &str) -> Self {
        self.segment(0xFE, text.as_bytes())
    }

    /// Quantization table with a constant value
    pub fn dqt(self) -> Self {
        let mut payload = vec![0u8];
        payload.extend_from_slice(&[1u8; 64]);
        self.segment(0xDB, &payload)
    }

    /// Baseline frame header for an 8x8 grayscale image
    pub fn sof0(self) -> Self {
        self.segment(0xC0, &[8, 0, 8, 0, 8, 1, 1, 0x11, 0])
    }

    /// Scan header followed by entropy-coded data
    pub fn scan(mut self, entropy_data: &[u8]) -> Self {
        self = self.segment(0xDA, &[1, 1, 0, 0, 0x3F, 0]);
        self.data.extend_from_slice(entropy_data);
        self
    }

    /// Raw bytes, e.g. to produce malformed streams
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.data.extend_from_slice(&[0xFF, 0xD9]);
        self.data
    }
}

/// A small structurally complete JPEG without EXIF
pub fn minimal_jpeg() -> Vec<u8> {
    JpegBuilder::new()
        .app0_jfif()
        .dqt()
        .sof0()
        .scan(&[0xD2, 0xCF, 0x20, 0xFF, 0x00, 0x0A])
        .build()
}

/// Header segments between SOI and the first SOF/SOS/EOI
///
/// Stops at the first malformed marker.
pub fn split_segments(jpeg: &[u8]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut pos = 2;
    while pos + 4 <= jpeg.len() && jpeg[pos] == 0xFF {
        let marker = jpeg[pos + 1];
        if marker == 0xD9 || marker == 0xDA || (0xC0..=0xCF).contains(&marker) {
            break;
        }
        let length = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let end = pos + 2 + length;
        if length < 2 || end > jpeg.len() {
            break;
        }
        segments.push(Segment {
            marker,
            bytes: jpeg[pos..end].to_vec(),
        });
        pos = end;
    }
    segments
}

fn tag(registry: &TagRegistry, ifd: IfdId, id: u16, value: TagValue) -> Result<Tag> {
    let tag = registry
        .build_uninitialized_tag(ifd, id)
        .ok_or(crate::Error::MissingTagDefinition { ifd, tag: id })?;
    tag.with_value(value)
}

fn ascii(text: &str) -> TagValue {
    let mut buf = text.as_bytes().to_vec();
    buf.push(0);
    TagValue::Ascii(buf)
}

/// A big-endian store with IFD0, EXIF, GPS and Interoperability tags and no
/// thumbnail
pub fn sample_exif_data() -> Result<ExifData> {
    let registry = TagRegistry::standard();
    let mut exif = ExifData::new(ByteOrder::BigEndian);

    for t in [
        tag(&registry, IfdId::Ifd0, tags::MAKE, ascii("Canon"))?,
        tag(&registry, IfdId::Ifd0, tags::MODEL, ascii("Canon EOS R5"))?,
        tag(&registry, IfdId::Ifd0, tags::ORIENTATION, TagValue::Shorts(vec![1]))?,
        tag(
            &registry,
            IfdId::Ifd0,
            tags::X_RESOLUTION,
            TagValue::Rationals(vec![Rational::new(72, 1)]),
        )?,
        tag(&registry, IfdId::Ifd0, tags::DATE_TIME, ascii("2024:05:01 10:30:00"))?,
        tag(
            &registry,
            IfdId::Exif,
            tags::EXPOSURE_TIME,
            TagValue::Rationals(vec![Rational::new(1, 250)]),
        )?,
        tag(
            &registry,
            IfdId::Exif,
            tags::F_NUMBER,
            TagValue::Rationals(vec![Rational::new(28, 10)]),
        )?,
        tag(&registry, IfdId::Exif, tags::ISO_SPEED, TagValue::Shorts(vec![400]))?,
        tag(
            &registry,
            IfdId::Exif,
            tags::EXIF_VERSION,
            TagValue::Bytes(b"0232".to_vec()),
        )?,
        tag(
            &registry,
            IfdId::Exif,
            tags::EXPOSURE_BIAS_VALUE,
            TagValue::SRationals(vec![SRational::new(-1, 3)]),
        )?,
        tag(
            &registry,
            IfdId::Exif,
            tags::USER_COMMENT,
            TagValue::Bytes(b"ASCII\0\0\0sample".to_vec()),
        )?,
        tag(
            &registry,
            IfdId::Gps,
            tags::GPS_VERSION_ID,
            TagValue::Bytes(vec![2, 3, 0, 0]),
        )?,
        tag(&registry, IfdId::Gps, tags::GPS_LATITUDE_REF, ascii("N"))?,
        tag(
            &registry,
            IfdId::Gps,
            tags::GPS_LATITUDE,
            TagValue::Rationals(vec![
                Rational::new(48, 1),
                Rational::new(51, 1),
                Rational::new(2956, 100),
            ]),
        )?,
        tag(
            &registry,
            IfdId::Interoperability,
            tags::INTEROPERABILITY_INDEX,
            ascii("R98"),
        )?,
    ] {
        exif.set_tag(t);
    }
    Ok(exif)
}
