// Integration tests using the test_utils module

use exif_io::{
    read_exif, tags, test_utils::*, write_exif, ByteOrder, DataType, ExifData, ExifReader,
    ExifWriter, IfdId, Rational, Tag, TagRegistry, TagValue,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Route library diagnostics to the test output (`RUST_LOG=exif_io=debug`)
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exif_io=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn registry() -> TagRegistry {
    TagRegistry::standard()
}

fn rewrite(input: &[u8], exif: &ExifData) -> Vec<u8> {
    init_tracing();
    write_exif(input, Vec::new(), exif, &registry()).unwrap()
}

#[test]
fn test_round_trip() {
    let exif = sample_exif_data().unwrap();
    let output = rewrite(&minimal_jpeg(), &exif);

    let read_back = read_exif(output.as_slice(), &registry()).unwrap();
    assert_eq!(read_back, exif);
    assert_eq!(
        read_back.tag(IfdId::Gps, tags::GPS_LATITUDE).unwrap().value(),
        Some(&TagValue::Rationals(vec![
            Rational::new(48, 1),
            Rational::new(51, 1),
            Rational::new(2956, 100),
        ]))
    );
    // Pointer tags synthesized by the writer are visible after reading
    assert!(read_back.tag(IfdId::Ifd0, tags::EXIF_IFD_POINTER).is_some());
    assert!(read_back.tag(IfdId::Ifd0, tags::GPS_IFD_POINTER).is_some());
    assert!(read_back
        .tag(IfdId::Exif, tags::INTEROPERABILITY_IFD_POINTER)
        .is_some());
}

#[test]
fn test_idempotent_write() {
    let exif = sample_exif_data().unwrap();
    let before = exif.clone();

    let first = rewrite(&minimal_jpeg(), &exif);
    let second = rewrite(&minimal_jpeg(), &exif);
    assert_eq!(first, second);
    assert_eq!(exif, before);

    // Rewriting the output with its own EXIF data is stable too
    let read_back = read_exif(first.as_slice(), &registry()).unwrap();
    assert_eq!(rewrite(&first, &read_back), first);
}

#[test]
fn test_valueless_tags_survive_write() {
    let mut exif = sample_exif_data().unwrap();
    exif.set_tag(Tag::new(tags::ARTIST, IfdId::Ifd0, DataType::Ascii));

    let output = rewrite(&minimal_jpeg(), &exif);
    assert!(exif.tag(IfdId::Ifd0, tags::ARTIST).is_some());

    let read_back = read_exif(output.as_slice(), &registry()).unwrap();
    assert!(read_back.tag(IfdId::Ifd0, tags::ARTIST).is_none());
}

#[test]
fn test_segment_preservation() {
    let input = JpegBuilder::new()
        .app0_jfif()
        .comment("first")
        .dqt()
        .comment("second")
        .sof0()
        .scan(&[0x01, 0x02, 0x03])
        .build();
    let exif = sample_exif_data().unwrap();
    let output = rewrite(&input, &exif);

    let original = split_segments(&input);
    let rewritten = split_segments(&output);
    assert_eq!(rewritten.len(), original.len() + 1);
    assert_eq!(rewritten[0].marker, 0xE1);
    assert_eq!(&rewritten[0].bytes[4..10], b"Exif\0\0");
    assert_eq!(&rewritten[1..], original.as_slice());

    // Everything from SOF on is untouched
    let sof = input
        .windows(2)
        .position(|w| w == [0xFF, 0xC0])
        .unwrap();
    assert!(output.ends_with(&input[sof..]));
}

#[test]
fn test_old_exif_removed() {
    let old_payload = b"Exif\0\0MM\0\x2A\0\0\0\x08\0\0\0\0\0\0".to_vec();
    let input = JpegBuilder::new()
        .app0_jfif()
        .app1(old_payload.clone())
        .dqt()
        .sof0()
        .scan(&[0x55])
        .build();

    let exif = sample_exif_data().unwrap();
    let output = rewrite(&input, &exif);

    let app1_count = split_segments(&output)
        .iter()
        .filter(|s| s.marker == 0xE1)
        .count();
    assert_eq!(app1_count, 1);
    assert!(!output.windows(old_payload.len()).any(|w| w == old_payload));

    let read_back = read_exif(output.as_slice(), &registry()).unwrap();
    assert_eq!(read_back, exif);
}

#[test]
fn test_strip_exif() {
    let input = JpegBuilder::new()
        .app1(b"Exif\0\0stale".to_vec())
        .sof0()
        .build();

    let reg = registry();
    let mut writer = ExifWriter::new(Vec::new(), &reg);
    writer.process(&input).unwrap();
    let output = writer.finish().unwrap();

    assert!(split_segments(&output).is_empty());
    assert!(matches!(
        read_exif(output.as_slice(), &reg),
        Err(exif_io::Error::ExifNotFound)
    ));
}

#[test]
fn test_chunked_input() {
    let input = JpegBuilder::new()
        .app0_jfif()
        .app1(b"Exif\0\0old".to_vec())
        .dqt()
        .sof0()
        .scan(&[0xAA, 0xFF, 0x00, 0xBB])
        .build();
    let exif = sample_exif_data().unwrap();
    let expected = rewrite(&input, &exif);
    let reg = registry();

    for chunk_size in [1, 2, 3, 5, 7, 64] {
        let mut writer = ExifWriter::new(Vec::new(), &reg)
            .with_exif_data(&exif)
            .with_buffer_capacity(chunk_size);
        for chunk in input.chunks(chunk_size) {
            writer.process(chunk).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), expected, "chunk size {}", chunk_size);
    }
}

#[test]
fn test_compressed_thumbnail_round_trip() {
    let mut exif = sample_exif_data().unwrap();
    let thumbnail = JpegBuilder::new().sof0().build();
    exif.set_compressed_thumbnail(thumbnail.clone());

    let output = rewrite(&minimal_jpeg(), &exif);
    let read_back = read_exif(output.as_slice(), &registry()).unwrap();

    assert_eq!(read_back, exif);
    assert_eq!(read_back.compressed_thumbnail(), Some(thumbnail.as_slice()));
    assert!(!read_back.has_uncompressed_strips());
    assert_eq!(
        read_back
            .tag(IfdId::Ifd1, tags::JPEG_INTERCHANGE_FORMAT_LENGTH)
            .unwrap()
            .value(),
        Some(&TagValue::Longs(vec![thumbnail.len() as u32]))
    );
}

#[test]
fn test_strip_thumbnail_round_trip() {
    let mut exif = sample_exif_data().unwrap();
    exif.set_strip_bytes(0, vec![0x10; 24]);
    exif.set_strip_bytes(1, vec![0x20; 24]);
    exif.set_strip_bytes(2, vec![0x30; 12]);

    let output = rewrite(&minimal_jpeg(), &exif);
    let read_back = read_exif(output.as_slice(), &registry()).unwrap();

    assert_eq!(read_back, exif);
    assert!(!read_back.has_compressed_thumbnail());
    assert_eq!(read_back.strip_count(), 3);
    assert_eq!(read_back.strip(1), Some(&[0x20; 24][..]));
    assert_eq!(read_back.strip(2), Some(&[0x30; 12][..]));
    assert!(read_back
        .tag(IfdId::Ifd1, tags::JPEG_INTERCHANGE_FORMAT)
        .is_none());
}

#[test]
fn test_little_endian_round_trip() {
    let mut exif = sample_exif_data().unwrap();
    exif.set_byte_order(ByteOrder::LittleEndian);

    let output = rewrite(&minimal_jpeg(), &exif);
    assert_eq!(&output[12..14], b"II");

    let read_back = ExifReader::new(&registry())
        .read(output.as_slice())
        .unwrap();
    assert_eq!(read_back.byte_order(), ByteOrder::LittleEndian);
    assert_eq!(read_back, exif);
}

#[test]
fn test_write_via_io_copy() {
    let exif = sample_exif_data().unwrap();
    let input = minimal_jpeg();
    let reg = registry();

    let mut writer = ExifWriter::new(Vec::new(), &reg).with_exif_data(&exif);
    std::io::copy(&mut input.as_slice(), &mut writer).unwrap();
    assert_eq!(writer.finish().unwrap(), rewrite(&input, &exif));
}
