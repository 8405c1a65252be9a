//! Event-based EXIF parsing
//!
//! [`EventSource`] is the contract the reader consumes: a finite,
//! non-restartable sequence of [`ParseEvent`]s plus a raw-read primitive for
//! thumbnail payloads. [`TiffParser`] implements it over an in-memory TIFF
//! body, delivering events in ascending file-offset order.

use crate::{
    error::{Error, Result},
    registry::TagRegistry,
    tag::{Tag, TagValue},
    tags,
    tiff::{ByteOrder, DataType, IfdId, IFD_ENTRY_SIZE, MAX_IFD_TAGS, TIFF_MAGIC},
};
use byteorder::{BigEndian, ReadBytesExt};
use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    io::{self, Read},
};
use tracing::{debug, warn};

// JPEG markers
const SOI: u8 = 0xD8; // Start of Image
const EOI: u8 = 0xD9; // End of Image
const APP1: u8 = 0xE1; // EXIF / XMP
const SOS: u8 = 0xDA; // Start of Scan (image data follows)
const TEM: u8 = 0x01;

// Markers without length
const RST0: u8 = 0xD0;
const RST7: u8 = 0xD7;

/// Identifier opening an EXIF APP1 payload
pub const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";

/// Events produced while walking a TIFF body
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    /// A directory begins; its tags follow
    StartOfIfd(IfdId),
    /// A directory entry; the value is absent when stored out of line
    NewTag(Tag),
    /// The value of a tag passed to [`EventSource::register_for_tag_value`]
    ///
    /// UNDEFINED values are left for [`EventSource::read_full_tag_value`].
    ValueOfRegisteredTag(Tag),
    /// A compressed thumbnail of `size` bytes can be read
    CompressedImage { size: usize },
    /// Uncompressed strip `index` of `size` bytes can be read
    UncompressedStrip { index: usize, size: usize },
    End,
}

/// A pull-based source of parse events
pub trait EventSource {
    /// Byte order of the TIFF body
    fn byte_order(&self) -> ByteOrder;

    fn next_event(&mut self) -> Result<ParseEvent>;

    /// Ask for a [`ParseEvent::ValueOfRegisteredTag`] once the value is reached
    fn register_for_tag_value(&mut self, tag: Tag);

    /// Read the complete value of a tag delivered without one
    fn read_full_tag_value(&mut self, tag: &mut Tag) -> Result<()>;

    /// Read payload bytes following an image or strip event
    ///
    /// Returns fewer bytes than requested when the payload is truncated.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

#[derive(Debug)]
enum Pending {
    Ifd(IfdId),
    TagValue(Tag),
    CompressedImage { size: usize },
    Strip { index: usize, size: usize },
}

/// [`EventSource`] over a TIFF body held in memory
///
/// The body starts at the byte order mark, i.e. after the `Exif\0\0`
/// identifier of the APP1 payload.
pub struct TiffParser<'r> {
    data: Vec<u8>,
    byte_order: ByteOrder,
    registry: &'r TagRegistry,
    pending: BTreeMap<(u32, u64), Pending>,
    sequence: u64,
    queued: VecDeque<ParseEvent>,
    visited: HashSet<u32>,
    read_pos: usize,
    read_end: usize,
}

impl<'r> TiffParser<'r> {
    /// Validate the TIFF header and queue IFD0
    pub fn new(data: Vec<u8>, registry: &'r TagRegistry) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::InvalidFormat("TIFF header truncated".into()));
        }
        let byte_order = ByteOrder::from_mark(&data[0..2])
            .ok_or_else(|| Error::InvalidFormat("Invalid TIFF byte order mark".into()))?;
        if byte_order.read_u16(&data[2..4]) != TIFF_MAGIC {
            return Err(Error::InvalidFormat("Invalid TIFF magic number".into()));
        }
        let ifd0_offset = byte_order.read_u32(&data[4..8]);
        if ifd0_offset < 8 || ifd0_offset as usize >= data.len() {
            return Err(Error::InvalidFormat(format!(
                "IFD0 offset {} out of bounds",
                ifd0_offset
            )));
        }

        let mut parser = Self {
            data,
            byte_order,
            registry,
            pending: BTreeMap::new(),
            sequence: 0,
            queued: VecDeque::new(),
            visited: HashSet::new(),
            read_pos: 0,
            read_end: 0,
        };
        parser.schedule(ifd0_offset, Pending::Ifd(IfdId::Ifd0));
        Ok(parser)
    }

    fn schedule(&mut self, offset: u32, entry: Pending) {
        self.pending.insert((offset, self.sequence), entry);
        self.sequence += 1;
    }

    fn schedule_ifd(&mut self, offset: u32, id: IfdId) {
        if offset == 0 || offset as usize >= self.data.len() {
            warn!("Skipping {:?} at invalid offset {}", id, offset);
            return;
        }
        self.schedule(offset, Pending::Ifd(id));
    }

    /// Bounds-checked slice of the body
    fn slice(&self, offset: u32, len: u32) -> Option<&[u8]> {
        let start = offset as usize;
        let end = start.checked_add(len as usize)?;
        self.data.get(start..end)
    }

    fn read_ifd(&mut self, offset: u32, id: IfdId) -> Result<()> {
        let count_bytes = self
            .slice(offset, 2)
            .ok_or_else(|| Error::InvalidFormat(format!("{:?} truncated", id)))?;
        let tag_count = self.byte_order.read_u16(count_bytes);
        if tag_count > MAX_IFD_TAGS {
            return Err(Error::InvalidFormat(format!(
                "{:?} has too many tags ({})",
                id, tag_count
            )));
        }

        let table_start = offset + 2;
        let table_len = tag_count as u32 * IFD_ENTRY_SIZE;
        if self.slice(table_start, table_len + 4).is_none() {
            return Err(Error::InvalidFormat(format!("{:?} table truncated", id)));
        }

        self.queued.push_back(ParseEvent::StartOfIfd(id));

        let mut thumbnail_tags = Vec::new();
        for i in 0..tag_count as u32 {
            let entry_offset = table_start + i * IFD_ENTRY_SIZE;
            let Some(tag) = self.read_entry(entry_offset, id) else {
                continue;
            };

            match tag.id() {
                tags::EXIF_IFD_POINTER if id == IfdId::Ifd0 => {
                    if let Some(target) = first_u32(&tag) {
                        self.schedule_ifd(target, IfdId::Exif);
                    }
                }
                tags::GPS_IFD_POINTER if id == IfdId::Ifd0 => {
                    if let Some(target) = first_u32(&tag) {
                        self.schedule_ifd(target, IfdId::Gps);
                    }
                }
                tags::INTEROPERABILITY_IFD_POINTER if id == IfdId::Exif => {
                    if let Some(target) = first_u32(&tag) {
                        self.schedule_ifd(target, IfdId::Interoperability);
                    }
                }
                tags::JPEG_INTERCHANGE_FORMAT
                | tags::JPEG_INTERCHANGE_FORMAT_LENGTH
                | tags::STRIP_OFFSETS
                | tags::STRIP_BYTE_COUNTS
                    if id == IfdId::Ifd1 =>
                {
                    thumbnail_tags.push(tag.clone());
                }
                _ => {}
            }

            self.queued.push_back(ParseEvent::NewTag(tag));
        }

        if id == IfdId::Ifd0 {
            let next_start = (table_start + table_len) as usize;
            let next_offset = self.byte_order.read_u32(&self.data[next_start..]);
            if next_offset != 0 {
                self.schedule_ifd(next_offset, IfdId::Ifd1);
            }
        }

        if id == IfdId::Ifd1 {
            self.schedule_thumbnail(&thumbnail_tags);
        }
        Ok(())
    }

    /// Decode one 12-byte directory entry
    ///
    /// Entries with unknown types, types disagreeing with the registry, or
    /// values outside the body are skipped.
    fn read_entry(&self, entry_offset: u32, ifd: IfdId) -> Option<Tag> {
        let order = self.byte_order;
        let entry = self.slice(entry_offset, IFD_ENTRY_SIZE)?;
        let tag_id = order.read_u16(&entry[0..2]);
        let type_code = order.read_u16(&entry[2..4]);
        let count = order.read_u32(&entry[4..8]);

        let Some(data_type) = DataType::from_code(type_code) else {
            debug!("Tag 0x{:04X}: unsupported type {}", tag_id, type_code);
            return None;
        };
        if let Some(def) = self.registry.definition(ifd, tag_id) {
            if def.data_type != data_type && !compatible_types(def.data_type, data_type) {
                debug!(
                    "Tag 0x{:04X}: type {:?} does not match definition {:?}",
                    tag_id, data_type, def.data_type
                );
                return None;
            }
        }

        let mut tag = Tag::parsed(tag_id, ifd, data_type, count);
        let size = count.checked_mul(data_type.unit_size())?;
        if size <= 4 {
            let value = TagValue::decode(data_type, &entry[8..8 + size as usize], order);
            tag.set_parsed_value(value);
        } else {
            let value_offset = order.read_u32(&entry[8..12]);
            if self.slice(value_offset, size).is_none() {
                warn!(
                    "Tag 0x{:04X}: value at {} ({} bytes) outside EXIF data",
                    tag_id, value_offset, size
                );
                return None;
            }
            tag.set_offset(value_offset);
        }
        Some(tag)
    }

    /// Values of a tag, reading out-of-line storage directly
    fn u32_values(&self, tag: &Tag) -> Vec<u32> {
        let value = match tag.value() {
            Some(value) => value.clone(),
            None => match self.slice(tag.offset(), tag.data_size()) {
                Some(bytes) => TagValue::decode(tag.data_type(), bytes, self.byte_order),
                None => return Vec::new(),
            },
        };
        match value {
            TagValue::Longs(v) => v,
            TagValue::Shorts(v) => v.into_iter().map(u32::from).collect(),
            _ => Vec::new(),
        }
    }

    fn schedule_thumbnail(&mut self, thumbnail_tags: &[Tag]) {
        let find = |id: u16| thumbnail_tags.iter().find(|t| t.id() == id);

        if let (Some(offset), Some(length)) = (
            find(tags::JPEG_INTERCHANGE_FORMAT),
            find(tags::JPEG_INTERCHANGE_FORMAT_LENGTH),
        ) {
            let offset = self.u32_values(offset).first().copied();
            let length = self.u32_values(length).first().copied();
            if let (Some(offset), Some(size)) = (offset, length) {
                self.schedule(
                    offset,
                    Pending::CompressedImage {
                        size: size as usize,
                    },
                );
            }
        } else if let (Some(offsets), Some(counts)) = (
            find(tags::STRIP_OFFSETS),
            find(tags::STRIP_BYTE_COUNTS),
        ) {
            let offsets = self.u32_values(offsets);
            let counts = self.u32_values(counts);
            if offsets.len() != counts.len() {
                warn!(
                    "Strip offsets ({}) and byte counts ({}) disagree",
                    offsets.len(),
                    counts.len()
                );
                return;
            }
            for (index, (offset, size)) in offsets.into_iter().zip(counts).enumerate() {
                self.schedule(
                    offset,
                    Pending::Strip {
                        index,
                        size: size as usize,
                    },
                );
            }
        }
    }

    fn set_read_window(&mut self, offset: u32, size: usize) {
        let start = (offset as usize).min(self.data.len());
        self.read_pos = start;
        self.read_end = start.saturating_add(size).min(self.data.len());
    }
}

impl EventSource for TiffParser<'_> {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn next_event(&mut self) -> Result<ParseEvent> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Ok(event);
            }
            let Some(((offset, _), entry)) = self.pending.pop_first() else {
                return Ok(ParseEvent::End);
            };

            match entry {
                Pending::Ifd(id) => {
                    if !self.visited.insert(offset) {
                        warn!("Skipping {:?}: offset {} already parsed", id, offset);
                        continue;
                    }
                    self.read_ifd(offset, id)?;
                }
                Pending::TagValue(mut tag) => {
                    if tag.data_type() != DataType::Undefined {
                        if let Some(bytes) = self.slice(tag.offset(), tag.data_size()) {
                            let value = TagValue::decode(tag.data_type(), bytes, self.byte_order);
                            tag.set_parsed_value(value);
                        }
                    }
                    return Ok(ParseEvent::ValueOfRegisteredTag(tag));
                }
                Pending::CompressedImage { size } => {
                    self.set_read_window(offset, size);
                    return Ok(ParseEvent::CompressedImage { size });
                }
                Pending::Strip { index, size } => {
                    self.set_read_window(offset, size);
                    return Ok(ParseEvent::UncompressedStrip { index, size });
                }
            }
        }
    }

    fn register_for_tag_value(&mut self, tag: Tag) {
        let offset = tag.offset();
        self.schedule(offset, Pending::TagValue(tag));
    }

    fn read_full_tag_value(&mut self, tag: &mut Tag) -> Result<()> {
        let bytes = self.slice(tag.offset(), tag.data_size()).ok_or_else(|| {
            Error::InvalidFormat(format!("Tag 0x{:04X} value out of bounds", tag.id()))
        })?;
        let value = TagValue::decode(tag.data_type(), bytes, self.byte_order);
        tag.set_parsed_value(value);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let available = self.read_end - self.read_pos;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.data[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        Ok(n)
    }
}

/// SHORT and LONG are interchangeable for integer tags
fn compatible_types(defined: DataType, found: DataType) -> bool {
    matches!(
        (defined, found),
        (DataType::Long, DataType::Short) | (DataType::Short, DataType::Long)
    )
}

fn first_u32(tag: &Tag) -> Option<u32> {
    match tag.value()? {
        TagValue::Longs(v) => v.first().copied(),
        TagValue::Shorts(v) => v.first().map(|&s| u32::from(s)),
        _ => None,
    }
}

/// Locate the EXIF APP1 segment of a JPEG stream and return its TIFF body
///
/// Scanning stops at the first APP1 carrying the `Exif\0\0` identifier, or
/// at SOS/EOI, after which no EXIF can appear.
pub fn find_exif_segment<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    if reader.read_u8()? != 0xFF || reader.read_u8()? != SOI {
        return Err(Error::InvalidFormat("Not a JPEG file".into()));
    }

    let mut offset = 2u64;
    loop {
        let marker_prefix = match reader.read_u8() {
            Ok(byte) => byte,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if marker_prefix != 0xFF {
            return Err(Error::InvalidSegment {
                offset,
                reason: format!("Expected 0xFF, got 0x{:02X}", marker_prefix),
            });
        }

        // Fill bytes before a marker
        let mut marker = reader.read_u8()?;
        while marker == 0xFF {
            offset += 1;
            marker = reader.read_u8()?;
        }

        match marker {
            EOI | SOS => return Ok(None),
            RST0..=RST7 | TEM => {
                offset += 2;
            }
            _ => {
                let size = reader.read_u16::<BigEndian>()? as u64;
                if size < 2 {
                    return Err(Error::InvalidSegment {
                        offset,
                        reason: format!("Invalid segment length {}", size),
                    });
                }
                let data_size = size - 2;

                if marker == APP1 && data_size >= EXIF_SIGNATURE.len() as u64 {
                    let mut payload = vec![0u8; data_size as usize];
                    reader.read_exact(&mut payload)?;
                    if payload.starts_with(EXIF_SIGNATURE) {
                        payload.drain(..EXIF_SIGNATURE.len());
                        return Ok(Some(payload));
                    }
                } else {
                    io::copy(&mut reader.by_ref().take(data_size), &mut io::sink())?;
                }
                offset += 2 + size;
            }
        }
    }
}
