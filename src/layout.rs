//! EXIF block layout and serialization
//!
//! [`ExifLayout::build`] works on a snapshot of the caller's [`ExifData`]:
//! valueless tags are dropped, the pointer tags tying the directories
//! together are synthesized from the registry, and every directory, value
//! and thumbnail payload is assigned its offset. [`ExifLayout::write_to`]
//! then emits the complete APP1 segment.
//!
//! Layout order is IFD0, EXIF, Interoperability, GPS, IFD1, followed by the
//! thumbnail payload. Offsets are relative to the TIFF header, which is why
//! IFD0 always starts at 8.

use crate::{
    error::{Error, Result},
    exif_data::{ExifData, Thumbnail},
    ifd::IfdData,
    registry::TagRegistry,
    tag::{Tag, TagValue},
    tags,
    tiff::{ByteOrder, IfdId, IFD_ENTRY_SIZE, TIFF_HEADER_SIZE, TIFF_MAGIC},
};
use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;
use tracing::{debug, trace};

/// Maximum value of the APP1 length field
pub const MAX_SEGMENT_SIZE: usize = 65535;

/// Length field plus `Exif\0\0`
const APP1_OVERHEAD: usize = 8;

/// Largest TIFF body an APP1 segment can carry
pub const MAX_EXIF_SIZE: usize = MAX_SEGMENT_SIZE - APP1_OVERHEAD;

const APP1_MARKER: [u8; 2] = [0xFF, 0xE1];
const EXIF_IDENTIFIER: &[u8] = b"Exif\0\0";

/// Serialization order of the directories
const LAYOUT_ORDER: [IfdId; 5] = [
    IfdId::Ifd0,
    IfdId::Exif,
    IfdId::Interoperability,
    IfdId::Gps,
    IfdId::Ifd1,
];

/// A fully laid out EXIF block, ready to be written
#[derive(Debug)]
pub struct ExifLayout<'a> {
    ifds: [Option<IfdData>; 5],
    thumbnail: &'a Thumbnail,
    byte_order: ByteOrder,
    size: usize,
}

impl<'a> ExifLayout<'a> {
    /// Lay out `exif`, synthesizing pointer tags from `registry`
    ///
    /// Fails with [`Error::MissingTagDefinition`] when the registry lacks a
    /// required pointer tag and with [`Error::DataTooLarge`] when the block
    /// does not fit in one APP1 segment.
    pub fn build(exif: &'a ExifData, registry: &TagRegistry) -> Result<Self> {
        let mut ifds: [Option<IfdData>; 5] = Default::default();
        for ifd in exif.ifds() {
            let mut ifd = ifd.clone();
            ifd.retain_tags(Tag::has_value);
            ifd.set_offset_to_next_ifd(0);
            let index = ifd.id().index();
            ifds[index] = Some(ifd);
        }

        let mut layout = Self {
            ifds,
            thumbnail: exif.thumbnail(),
            byte_order: exif.byte_order(),
            size: 0,
        };
        layout.add_required_structure(registry)?;
        let starts = layout.assign_offsets()?;
        layout.stamp_pointers(&starts)?;

        debug!("EXIF block laid out: {} bytes", layout.size);
        Ok(layout)
    }

    /// Size of the TIFF body, header included
    pub fn size(&self) -> usize {
        self.size
    }

    /// A directory of the laid out snapshot
    pub fn ifd(&self, id: IfdId) -> Option<&IfdData> {
        self.ifds[id.index()].as_ref()
    }

    fn ifd_mut(&mut self, id: IfdId) -> &mut IfdData {
        self.ifds[id.index()].get_or_insert_with(|| IfdData::new(id))
    }

    fn has_ifd(&self, id: IfdId) -> bool {
        self.ifds[id.index()].is_some()
    }

    fn add_required_structure(&mut self, registry: &TagRegistry) -> Result<()> {
        let exif_pointer = placeholder(registry, IfdId::Ifd0, tags::EXIF_IFD_POINTER)?;
        self.ifd_mut(IfdId::Ifd0).set_tag(exif_pointer);
        self.ifd_mut(IfdId::Exif);

        if self.has_ifd(IfdId::Gps) {
            let gps_pointer = placeholder(registry, IfdId::Ifd0, tags::GPS_IFD_POINTER)?;
            self.ifd_mut(IfdId::Ifd0).set_tag(gps_pointer);
        } else {
            self.ifd_mut(IfdId::Ifd0).remove_tag(tags::GPS_IFD_POINTER);
        }

        if self.has_ifd(IfdId::Interoperability) {
            let interop_pointer =
                placeholder(registry, IfdId::Exif, tags::INTEROPERABILITY_IFD_POINTER)?;
            self.ifd_mut(IfdId::Exif).set_tag(interop_pointer);
        } else {
            self.ifd_mut(IfdId::Exif)
                .remove_tag(tags::INTEROPERABILITY_IFD_POINTER);
        }

        let thumbnail = self.thumbnail;
        match thumbnail {
            Thumbnail::Compressed(data) => {
                let offset = placeholder(registry, IfdId::Ifd1, tags::JPEG_INTERCHANGE_FORMAT)?;
                let mut length =
                    placeholder(registry, IfdId::Ifd1, tags::JPEG_INTERCHANGE_FORMAT_LENGTH)?;
                length.set_value(TagValue::Longs(vec![clamp_u32(data.len())]))?;

                let ifd1 = self.ifd_mut(IfdId::Ifd1);
                ifd1.set_tag(offset);
                ifd1.set_tag(length);
                ifd1.remove_tag(tags::STRIP_OFFSETS);
                ifd1.remove_tag(tags::STRIP_BYTE_COUNTS);
            }
            Thumbnail::Strips(strips) => {
                let mut offsets = registry
                    .build_uninitialized_tag(IfdId::Ifd1, tags::STRIP_OFFSETS)
                    .ok_or(Error::MissingTagDefinition {
                        ifd: IfdId::Ifd1,
                        tag: tags::STRIP_OFFSETS,
                    })?;
                offsets.set_value(TagValue::Longs(vec![0; strips.len()]))?;
                let mut counts = registry
                    .build_uninitialized_tag(IfdId::Ifd1, tags::STRIP_BYTE_COUNTS)
                    .ok_or(Error::MissingTagDefinition {
                        ifd: IfdId::Ifd1,
                        tag: tags::STRIP_BYTE_COUNTS,
                    })?;
                counts.set_value(TagValue::Longs(
                    strips.iter().map(|s| clamp_u32(s.len())).collect(),
                ))?;

                let ifd1 = self.ifd_mut(IfdId::Ifd1);
                ifd1.set_tag(offsets);
                ifd1.set_tag(counts);
                ifd1.remove_tag(tags::JPEG_INTERCHANGE_FORMAT);
                ifd1.remove_tag(tags::JPEG_INTERCHANGE_FORMAT_LENGTH);
            }
            Thumbnail::None => {
                if let Some(ifd1) = self.ifds[IfdId::Ifd1.index()].as_mut() {
                    for id in [
                        tags::JPEG_INTERCHANGE_FORMAT,
                        tags::JPEG_INTERCHANGE_FORMAT_LENGTH,
                        tags::STRIP_OFFSETS,
                        tags::STRIP_BYTE_COUNTS,
                    ] {
                        ifd1.remove_tag(id);
                    }
                }
            }
        }
        Ok(())
    }

    /// First pass: directory start offsets and out-of-line value offsets
    ///
    /// Returns the start offset of each directory, indexed like `ifds`.
    fn assign_offsets(&mut self) -> Result<[u32; 5]> {
        let mut starts = [0u32; 5];
        let mut offset = TIFF_HEADER_SIZE as usize;

        for id in LAYOUT_ORDER {
            let Some(ifd) = self.ifds[id.index()].as_mut() else {
                continue;
            };
            let start = offset;
            offset += 2 + ifd.tag_count() * IFD_ENTRY_SIZE as usize + 4;
            for tag in ifd.tags_mut() {
                if tag.is_out_of_line() {
                    tag.set_offset(clamp_u32(offset));
                    offset += tag.data_size() as usize;
                }
            }
            trace!("{:?} at {}, {} tags", id, start, ifd.tag_count());
            starts[id.index()] = clamp_u32(start);
        }

        offset += self.payload_size();

        if offset > MAX_EXIF_SIZE {
            return Err(Error::DataTooLarge {
                size: offset,
                max: MAX_EXIF_SIZE,
            });
        }
        self.size = offset;
        Ok(starts)
    }

    /// Second pass: fill in the pointers now that every offset is known
    fn stamp_pointers(&mut self, starts: &[u32; 5]) -> Result<()> {
        let start = |id: IfdId| starts[id.index()];

        self.stamp(IfdId::Ifd0, tags::EXIF_IFD_POINTER, vec![start(IfdId::Exif)])?;
        if self.has_ifd(IfdId::Gps) {
            self.stamp(IfdId::Ifd0, tags::GPS_IFD_POINTER, vec![start(IfdId::Gps)])?;
        }
        if self.has_ifd(IfdId::Interoperability) {
            self.stamp(
                IfdId::Exif,
                tags::INTEROPERABILITY_IFD_POINTER,
                vec![start(IfdId::Interoperability)],
            )?;
        }
        if self.has_ifd(IfdId::Ifd1) {
            self.ifd_mut(IfdId::Ifd0)
                .set_offset_to_next_ifd(start(IfdId::Ifd1));
        }

        // Payloads follow the last directory's values
        let thumbnail = self.thumbnail;
        let mut offset = self.size - self.payload_size();
        match thumbnail {
            Thumbnail::None => {}
            Thumbnail::Compressed(_) => {
                self.stamp(IfdId::Ifd1, tags::JPEG_INTERCHANGE_FORMAT, vec![clamp_u32(offset)])?;
            }
            Thumbnail::Strips(strips) => {
                let mut offsets = Vec::with_capacity(strips.len());
                for strip in strips {
                    offsets.push(clamp_u32(offset));
                    offset += strip.len();
                }
                self.stamp(IfdId::Ifd1, tags::STRIP_OFFSETS, offsets)?;
            }
        }
        Ok(())
    }

    fn stamp(&mut self, ifd: IfdId, tag_id: u16, values: Vec<u32>) -> Result<()> {
        let tag = self
            .ifd_mut(ifd)
            .tag_mut(tag_id)
            .ok_or(Error::MissingTagDefinition { ifd, tag: tag_id })?;
        tag.set_value(TagValue::Longs(values))
    }

    fn payload_size(&self) -> usize {
        match self.thumbnail {
            Thumbnail::None => 0,
            Thumbnail::Compressed(data) => data.len(),
            Thumbnail::Strips(strips) => strips.iter().map(Vec::len).sum(),
        }
    }

    /// Serialize the APP1 segment, marker included, with a single write
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let order = self.byte_order;
        let mut buf = Vec::with_capacity(2 + APP1_OVERHEAD + self.size);

        buf.extend_from_slice(&APP1_MARKER);
        buf.write_u16::<BigEndian>((self.size + APP1_OVERHEAD) as u16)?;
        buf.extend_from_slice(EXIF_IDENTIFIER);

        // TIFF header
        buf.write_u16::<BigEndian>(order.mark())?;
        order.write_u16(&mut buf, TIFF_MAGIC)?;
        order.write_u32(&mut buf, TIFF_HEADER_SIZE)?;

        for ifd in LAYOUT_ORDER.iter().filter_map(|id| self.ifd(*id)) {
            order.write_u16(&mut buf, ifd.tag_count() as u16)?;
            for tag in ifd.tags() {
                order.write_u16(&mut buf, tag.id())?;
                order.write_u16(&mut buf, tag.data_type().code())?;
                order.write_u32(&mut buf, tag.component_count())?;
                if tag.is_out_of_line() {
                    order.write_u32(&mut buf, tag.offset())?;
                } else {
                    let start = buf.len();
                    tag.write_value(&mut buf, order)?;
                    buf.resize(start + 4, 0);
                }
            }
            order.write_u32(&mut buf, ifd.offset_to_next_ifd())?;

            for tag in ifd.tags().filter(|tag| tag.is_out_of_line()) {
                tag.write_value(&mut buf, order)?;
            }
        }

        match self.thumbnail {
            Thumbnail::None => {}
            Thumbnail::Compressed(data) => buf.extend_from_slice(data),
            Thumbnail::Strips(strips) => {
                for strip in strips {
                    buf.extend_from_slice(strip);
                }
            }
        }

        writer.write_all(&buf)?;
        Ok(())
    }
}

/// A registry-built pointer tag holding a zero of its final size
fn placeholder(registry: &TagRegistry, ifd: IfdId, tag_id: u16) -> Result<Tag> {
    let mut tag = registry
        .build_uninitialized_tag(ifd, tag_id)
        .ok_or(Error::MissingTagDefinition { ifd, tag: tag_id })?;
    tag.set_value(TagValue::Longs(vec![0]))?;
    Ok(tag)
}

/// Offsets past the size limit are rejected before they are ever written
fn clamp_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
