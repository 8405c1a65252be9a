#![no_main]

use exif_io::{test_utils::sample_exif_data, ExifReader, ExifWriter, TagRegistry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let registry = TagRegistry::standard();

    // Rewrite arbitrary input with a known store, in uneven chunks
    if let Ok(exif) = sample_exif_data() {
        let mut writer = ExifWriter::new(Vec::new(), &registry).with_exif_data(&exif);
        let chunk_size = data.first().map_or(1, |&b| b as usize + 1);
        let mut ok = true;
        for chunk in data.chunks(chunk_size) {
            if writer.process(chunk).is_err() {
                ok = false;
                break;
            }
        }
        if ok {
            let _ = writer.finish();
        }
    }

    // Whatever parses as a TIFF body must serialize again
    if let Ok(exif) = ExifReader::new(&registry).read_tiff(data.to_vec()) {
        let mut writer = ExifWriter::new(Vec::new(), &registry).with_exif_data(&exif);
        let _ = writer.process(&[0xFF, 0xD8, 0xFF, 0xD9]);
    }
});
