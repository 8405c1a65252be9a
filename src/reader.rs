//! Builds an [`ExifData`] from parse events

use crate::{
    error::{Error, Result},
    exif_data::ExifData,
    parser::{find_exif_segment, EventSource, ParseEvent, TiffParser},
    registry::TagRegistry,
    tiff::DataType,
};
use std::io::Read;
use tracing::{debug, warn};

/// Drives an [`EventSource`] and collects its events into a store
pub struct ExifReader<'r> {
    registry: &'r TagRegistry,
}

impl<'r> ExifReader<'r> {
    pub fn new(registry: &'r TagRegistry) -> Self {
        Self { registry }
    }

    /// Read the EXIF block of a JPEG stream
    pub fn read<R: Read>(&self, mut source: R) -> Result<ExifData> {
        let tiff = find_exif_segment(&mut source)?.ok_or(Error::ExifNotFound)?;
        self.read_tiff(tiff)
    }

    /// Read a TIFF body, starting at its byte order mark
    pub fn read_tiff(&self, tiff: Vec<u8>) -> Result<ExifData> {
        let mut parser = TiffParser::new(tiff, self.registry)?;
        self.read_events(&mut parser)
    }

    /// Consume events until [`ParseEvent::End`]
    pub fn read_events<S: EventSource>(&self, source: &mut S) -> Result<ExifData> {
        let mut exif = ExifData::new(source.byte_order());

        loop {
            match source.next_event()? {
                ParseEvent::StartOfIfd(id) => {
                    exif.get_or_insert_ifd(id);
                }
                ParseEvent::NewTag(tag) => {
                    if tag.has_value() {
                        exif.set_tag(tag);
                    } else {
                        source.register_for_tag_value(tag);
                    }
                }
                ParseEvent::ValueOfRegisteredTag(mut tag) => {
                    if tag.data_type() == DataType::Undefined {
                        source.read_full_tag_value(&mut tag)?;
                    }
                    exif.set_tag(tag);
                }
                ParseEvent::CompressedImage { size } => match read_payload(source, size)? {
                    Some(data) => exif.set_compressed_thumbnail(data),
                    None => warn!("Dropping truncated thumbnail ({} bytes expected)", size),
                },
                ParseEvent::UncompressedStrip { index, size } => {
                    match read_payload(source, size)? {
                        Some(data) => exif.set_strip_bytes(index, data),
                        None => warn!(
                            "Dropping truncated strip {} ({} bytes expected)",
                            index, size
                        ),
                    }
                }
                ParseEvent::End => break,
            }
        }

        debug!("Read {} EXIF tags", exif.all_tags().count());
        Ok(exif)
    }
}

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Read exactly `size` payload bytes, or `None` on a short read
///
/// The buffer grows with the bytes actually delivered, so a bogus declared
/// size never turns into one huge allocation.
fn read_payload<S: EventSource>(source: &mut S, size: usize) -> Result<Option<Vec<u8>>> {
    let mut data = Vec::with_capacity(size.min(READ_CHUNK_SIZE));
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    while data.len() < size {
        let want = (size - data.len()).min(READ_CHUNK_SIZE);
        let n = source.read(&mut chunk[..want])?;
        if n == 0 {
            return Ok(None);
        }
        data.extend_from_slice(&chunk[..n]);
    }
    Ok(Some(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        tag::{Tag, TagValue},
        tags,
        tiff::{ByteOrder, IfdId},
    };
    use std::collections::VecDeque;

    /// Replays a scripted event list
    struct ScriptedSource {
        events: VecDeque<ParseEvent>,
        registered: Vec<Tag>,
        payload: Vec<u8>,
    }

    impl ScriptedSource {
        fn new(events: Vec<ParseEvent>, payload: Vec<u8>) -> Self {
            Self {
                events: events.into(),
                registered: Vec::new(),
                payload,
            }
        }
    }

    impl EventSource for ScriptedSource {
        fn byte_order(&self) -> ByteOrder {
            ByteOrder::LittleEndian
        }

        fn next_event(&mut self) -> Result<ParseEvent> {
            if let Some(event) = self.events.pop_front() {
                return Ok(event);
            }
            if !self.registered.is_empty() {
                let mut tag = self.registered.remove(0);
                if tag.data_type() != DataType::Undefined {
                    tag.set_parsed_value(TagValue::Ascii(b"Pentax\0".to_vec()));
                }
                return Ok(ParseEvent::ValueOfRegisteredTag(tag));
            }
            Ok(ParseEvent::End)
        }

        fn register_for_tag_value(&mut self, tag: Tag) {
            self.registered.push(tag);
        }

        fn read_full_tag_value(&mut self, tag: &mut Tag) -> Result<()> {
            tag.set_parsed_value(TagValue::Bytes(b"ASCII\0\0\0hello".to_vec()));
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = buf.len().min(self.payload.len());
            buf[..n].copy_from_slice(&self.payload[..n]);
            self.payload.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn test_read_events() {
        let mut orientation = Tag::parsed(tags::ORIENTATION, IfdId::Ifd0, DataType::Short, 1);
        orientation.set_parsed_value(TagValue::Shorts(vec![1]));
        let make = Tag::parsed(tags::MAKE, IfdId::Ifd0, DataType::Ascii, 7);
        let comment = Tag::parsed(tags::USER_COMMENT, IfdId::Exif, DataType::Undefined, 13);

        let mut source = ScriptedSource::new(
            vec![
                ParseEvent::StartOfIfd(IfdId::Ifd0),
                ParseEvent::NewTag(orientation),
                ParseEvent::NewTag(make),
                ParseEvent::StartOfIfd(IfdId::Exif),
                ParseEvent::NewTag(comment),
                ParseEvent::CompressedImage { size: 4 },
            ],
            vec![0xFF, 0xD8, 0xFF, 0xD9],
        );

        let registry = TagRegistry::standard();
        let exif = ExifReader::new(&registry).read_events(&mut source).unwrap();

        assert_eq!(exif.byte_order(), ByteOrder::LittleEndian);
        assert_eq!(
            exif.tag(IfdId::Ifd0, tags::ORIENTATION).unwrap().value(),
            Some(&TagValue::Shorts(vec![1]))
        );
        assert_eq!(
            exif.tag(IfdId::Ifd0, tags::MAKE).unwrap().value(),
            Some(&TagValue::Ascii(b"Pentax".to_vec()))
        );
        assert_eq!(
            exif.tag(IfdId::Exif, tags::USER_COMMENT).unwrap().value(),
            Some(&TagValue::Bytes(b"ASCII\0\0\0hello".to_vec()))
        );
        assert_eq!(exif.compressed_thumbnail(), Some(&[0xFF, 0xD8, 0xFF, 0xD9][..]));
    }

    #[test]
    fn test_truncated_payload_is_dropped() {
        let mut source = ScriptedSource::new(
            vec![
                ParseEvent::StartOfIfd(IfdId::Ifd1),
                ParseEvent::UncompressedStrip { index: 0, size: 8 },
            ],
            vec![1, 2, 3],
        );

        let registry = TagRegistry::standard();
        let exif = ExifReader::new(&registry).read_events(&mut source).unwrap();
        assert!(exif.ifd(IfdId::Ifd1).is_some());
        assert!(!exif.has_uncompressed_strips());
    }

    #[test]
    fn test_oversized_declared_payload_is_dropped() {
        let mut source = ScriptedSource::new(
            vec![
                ParseEvent::StartOfIfd(IfdId::Ifd1),
                ParseEvent::CompressedImage { size: 0xFFFF_FFF0 },
            ],
            vec![0xFF, 0xD8, 0xFF, 0xD9],
        );

        let registry = TagRegistry::standard();
        let exif = ExifReader::new(&registry).read_events(&mut source).unwrap();
        assert!(!exif.has_compressed_thumbnail());
    }

    #[test]
    fn test_payload_spanning_chunks() {
        let payload: Vec<u8> = (0..20_000u32).map(|i| i as u8).collect();
        let mut source = ScriptedSource::new(
            vec![ParseEvent::CompressedImage {
                size: payload.len(),
            }],
            payload.clone(),
        );

        let registry = TagRegistry::standard();
        let exif = ExifReader::new(&registry).read_events(&mut source).unwrap();
        assert_eq!(exif.compressed_thumbnail(), Some(payload.as_slice()));
    }

    #[test]
    fn test_read_without_exif() {
        let registry = TagRegistry::standard();
        let jpeg = [0xFF, 0xD8, 0xFF, 0xD9];
        assert!(matches!(
            ExifReader::new(&registry).read(&jpeg[..]),
            Err(Error::ExifNotFound)
        ));
    }
}
