#![no_main]

use exif_io::{read_exif, ExifReader, TagRegistry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing arbitrary input should NEVER panic, only return errors
    let registry = TagRegistry::standard();

    // As a JPEG stream
    let _ = read_exif(data, &registry);

    // As a bare TIFF body
    if let Ok(exif) = ExifReader::new(&registry).read_tiff(data.to_vec()) {
        let _ = exif.all_tags().count();
        let _ = exif.thumbnail();
    }
});
