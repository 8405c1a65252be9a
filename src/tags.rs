//! Well-known TIFF/EXIF tag IDs

// IFD0 (main image) tags
pub const IMAGE_WIDTH: u16 = 0x0100;
pub const IMAGE_LENGTH: u16 = 0x0101;
pub const BITS_PER_SAMPLE: u16 = 0x0102;
pub const COMPRESSION: u16 = 0x0103;
pub const PHOTOMETRIC_INTERPRETATION: u16 = 0x0106;
pub const IMAGE_DESCRIPTION: u16 = 0x010E;
pub const MAKE: u16 = 0x010F;
pub const MODEL: u16 = 0x0110;
pub const STRIP_OFFSETS: u16 = 0x0111;
pub const ORIENTATION: u16 = 0x0112;
pub const SAMPLES_PER_PIXEL: u16 = 0x0115;
pub const ROWS_PER_STRIP: u16 = 0x0116;
pub const STRIP_BYTE_COUNTS: u16 = 0x0117;
pub const X_RESOLUTION: u16 = 0x011A;
pub const Y_RESOLUTION: u16 = 0x011B;
pub const RESOLUTION_UNIT: u16 = 0x0128;
pub const SOFTWARE: u16 = 0x0131;
pub const DATE_TIME: u16 = 0x0132;
pub const ARTIST: u16 = 0x013B;
pub const Y_CB_CR_POSITIONING: u16 = 0x0213;
pub const COPYRIGHT: u16 = 0x8298;
pub const EXIF_IFD_POINTER: u16 = 0x8769;
pub const GPS_IFD_POINTER: u16 = 0x8825;

// IFD1 (thumbnail) tags
pub const JPEG_INTERCHANGE_FORMAT: u16 = 0x0201;
pub const JPEG_INTERCHANGE_FORMAT_LENGTH: u16 = 0x0202;

// EXIF sub-IFD tags
pub const EXPOSURE_TIME: u16 = 0x829A;
pub const F_NUMBER: u16 = 0x829D;
pub const EXPOSURE_PROGRAM: u16 = 0x8822;
pub const ISO_SPEED: u16 = 0x8827;
pub const EXIF_VERSION: u16 = 0x9000;
pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
pub const DATE_TIME_DIGITIZED: u16 = 0x9004;
pub const COMPONENTS_CONFIGURATION: u16 = 0x9101;
pub const SHUTTER_SPEED_VALUE: u16 = 0x9201;
pub const APERTURE_VALUE: u16 = 0x9202;
pub const BRIGHTNESS_VALUE: u16 = 0x9203;
pub const EXPOSURE_BIAS_VALUE: u16 = 0x9204;
pub const METERING_MODE: u16 = 0x9207;
pub const FLASH: u16 = 0x9209;
pub const FOCAL_LENGTH: u16 = 0x920A;
pub const MAKER_NOTE: u16 = 0x927C;
pub const USER_COMMENT: u16 = 0x9286;
pub const SUB_SEC_TIME: u16 = 0x9290;
pub const FLASHPIX_VERSION: u16 = 0xA000;
pub const COLOR_SPACE: u16 = 0xA001;
pub const PIXEL_X_DIMENSION: u16 = 0xA002;
pub const PIXEL_Y_DIMENSION: u16 = 0xA003;
pub const INTEROPERABILITY_IFD_POINTER: u16 = 0xA005;
pub const WHITE_BALANCE: u16 = 0xA403;
pub const IMAGE_UNIQUE_ID: u16 = 0xA420;

// GPS tags
pub const GPS_VERSION_ID: u16 = 0x0000;
pub const GPS_LATITUDE_REF: u16 = 0x0001;
pub const GPS_LATITUDE: u16 = 0x0002;
pub const GPS_LONGITUDE_REF: u16 = 0x0003;
pub const GPS_LONGITUDE: u16 = 0x0004;
pub const GPS_ALTITUDE_REF: u16 = 0x0005;
pub const GPS_ALTITUDE: u16 = 0x0006;
pub const GPS_TIME_STAMP: u16 = 0x0007;
pub const GPS_PROCESSING_METHOD: u16 = 0x001B;
pub const GPS_DATE_STAMP: u16 = 0x001D;

// Interoperability tags
pub const INTEROPERABILITY_INDEX: u16 = 0x0001;

/// Returns true for tags whose value is a byte offset computed at write time.
///
/// Their values are layout artifacts, so they are exempt from null-value
/// stripping and ignored when comparing directories.
pub fn is_offset_tag(tag_id: u16) -> bool {
    matches!(
        tag_id,
        EXIF_IFD_POINTER
            | GPS_IFD_POINTER
            | INTEROPERABILITY_IFD_POINTER
            | JPEG_INTERCHANGE_FORMAT
            | STRIP_OFFSETS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_tags() {
        assert!(is_offset_tag(EXIF_IFD_POINTER));
        assert!(is_offset_tag(GPS_IFD_POINTER));
        assert!(is_offset_tag(INTEROPERABILITY_IFD_POINTER));
        assert!(is_offset_tag(JPEG_INTERCHANGE_FORMAT));
        assert!(is_offset_tag(STRIP_OFFSETS));

        assert!(!is_offset_tag(JPEG_INTERCHANGE_FORMAT_LENGTH));
        assert!(!is_offset_tag(STRIP_BYTE_COUNTS));
        assert!(!is_offset_tag(MAKE));
    }
}
