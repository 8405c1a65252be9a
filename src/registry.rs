//! Tag definition table
//!
//! The registry maps a `(directory, tag id)` pair to the tag's default data
//! type and, where the EXIF standard fixes it, its component count. The
//! writer uses it to build the pointer placeholders it synthesizes; the
//! parser uses it to reject entries whose on-disk type disagrees with the
//! definition.

use crate::{
    tag::Tag,
    tags::*,
    tiff::{DataType, IfdId},
};
use std::collections::HashMap;

/// Default metadata for one tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDefinition {
    pub id: u16,
    pub ifd: IfdId,
    pub data_type: DataType,
    /// Fixed component count, `None` when variable
    pub component_count: Option<u32>,
}

impl TagDefinition {
    pub const fn new(
        id: u16,
        ifd: IfdId,
        data_type: DataType,
        component_count: Option<u32>,
    ) -> Self {
        Self {
            id,
            ifd,
            data_type,
            component_count,
        }
    }
}

/// A table of tag definitions, passed explicitly to readers and writers
#[derive(Debug, Clone)]
pub struct TagRegistry {
    definitions: HashMap<(IfdId, u16), TagDefinition>,
}

impl TagRegistry {
    /// A registry with no definitions
    pub fn empty() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    /// The standard IFD0/EXIF/GPS/Interoperability/IFD1 definitions
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for def in STANDARD_DEFINITIONS {
            registry.insert(*def);
        }
        registry
    }

    /// Add or replace a definition
    pub fn insert(&mut self, definition: TagDefinition) -> &mut Self {
        self.definitions
            .insert((definition.ifd, definition.id), definition);
        self
    }

    /// Remove a definition
    pub fn remove(&mut self, ifd: IfdId, tag_id: u16) -> Option<TagDefinition> {
        self.definitions.remove(&(ifd, tag_id))
    }

    pub fn definition(&self, ifd: IfdId, tag_id: u16) -> Option<&TagDefinition> {
        self.definitions.get(&(ifd, tag_id))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Build a typed tag with no value, or `None` if the tag is unknown
    pub fn build_uninitialized_tag(&self, ifd: IfdId, tag_id: u16) -> Option<Tag> {
        let def = self.definition(ifd, tag_id)?;
        Some(match def.component_count {
            Some(count) => Tag::with_defined_count(def.id, def.ifd, def.data_type, count),
            None => Tag::new(def.id, def.ifd, def.data_type),
        })
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

use DataType::*;
use IfdId::*;

const fn def(ifd: IfdId, id: u16, data_type: DataType, count: Option<u32>) -> TagDefinition {
    TagDefinition::new(id, ifd, data_type, count)
}

#[rustfmt::skip]
static STANDARD_DEFINITIONS: &[TagDefinition] = &[
    // IFD0
    def(Ifd0, IMAGE_WIDTH, Long, Some(1)),
    def(Ifd0, IMAGE_LENGTH, Long, Some(1)),
    def(Ifd0, BITS_PER_SAMPLE, Short, Some(3)),
    def(Ifd0, COMPRESSION, Short, Some(1)),
    def(Ifd0, PHOTOMETRIC_INTERPRETATION, Short, Some(1)),
    def(Ifd0, IMAGE_DESCRIPTION, Ascii, None),
    def(Ifd0, MAKE, Ascii, None),
    def(Ifd0, MODEL, Ascii, None),
    def(Ifd0, STRIP_OFFSETS, Long, None),
    def(Ifd0, ORIENTATION, Short, Some(1)),
    def(Ifd0, SAMPLES_PER_PIXEL, Short, Some(1)),
    def(Ifd0, ROWS_PER_STRIP, Long, Some(1)),
    def(Ifd0, STRIP_BYTE_COUNTS, Long, None),
    def(Ifd0, X_RESOLUTION, Rational, Some(1)),
    def(Ifd0, Y_RESOLUTION, Rational, Some(1)),
    def(Ifd0, RESOLUTION_UNIT, Short, Some(1)),
    def(Ifd0, SOFTWARE, Ascii, None),
    def(Ifd0, DATE_TIME, Ascii, Some(20)),
    def(Ifd0, ARTIST, Ascii, None),
    def(Ifd0, Y_CB_CR_POSITIONING, Short, Some(1)),
    def(Ifd0, COPYRIGHT, Ascii, None),
    def(Ifd0, EXIF_IFD_POINTER, Long, Some(1)),
    def(Ifd0, GPS_IFD_POINTER, Long, Some(1)),
    // IFD1
    def(Ifd1, IMAGE_WIDTH, Long, Some(1)),
    def(Ifd1, IMAGE_LENGTH, Long, Some(1)),
    def(Ifd1, BITS_PER_SAMPLE, Short, Some(3)),
    def(Ifd1, COMPRESSION, Short, Some(1)),
    def(Ifd1, PHOTOMETRIC_INTERPRETATION, Short, Some(1)),
    def(Ifd1, STRIP_OFFSETS, Long, None),
    def(Ifd1, ORIENTATION, Short, Some(1)),
    def(Ifd1, SAMPLES_PER_PIXEL, Short, Some(1)),
    def(Ifd1, ROWS_PER_STRIP, Long, Some(1)),
    def(Ifd1, STRIP_BYTE_COUNTS, Long, None),
    def(Ifd1, X_RESOLUTION, Rational, Some(1)),
    def(Ifd1, Y_RESOLUTION, Rational, Some(1)),
    def(Ifd1, RESOLUTION_UNIT, Short, Some(1)),
    def(Ifd1, JPEG_INTERCHANGE_FORMAT, Long, Some(1)),
    def(Ifd1, JPEG_INTERCHANGE_FORMAT_LENGTH, Long, Some(1)),
    def(Ifd1, Y_CB_CR_POSITIONING, Short, Some(1)),
    // EXIF
    def(Exif, EXPOSURE_TIME, Rational, Some(1)),
    def(Exif, F_NUMBER, Rational, Some(1)),
    def(Exif, EXPOSURE_PROGRAM, Short, Some(1)),
    def(Exif, ISO_SPEED, Short, None),
    def(Exif, EXIF_VERSION, Undefined, Some(4)),
    def(Exif, DATE_TIME_ORIGINAL, Ascii, Some(20)),
    def(Exif, DATE_TIME_DIGITIZED, Ascii, Some(20)),
    def(Exif, COMPONENTS_CONFIGURATION, Undefined, Some(4)),
    def(Exif, SHUTTER_SPEED_VALUE, SRational, Some(1)),
    def(Exif, APERTURE_VALUE, Rational, Some(1)),
    def(Exif, BRIGHTNESS_VALUE, SRational, Some(1)),
    def(Exif, EXPOSURE_BIAS_VALUE, SRational, Some(1)),
    def(Exif, METERING_MODE, Short, Some(1)),
    def(Exif, FLASH, Short, Some(1)),
    def(Exif, FOCAL_LENGTH, Rational, Some(1)),
    def(Exif, MAKER_NOTE, Undefined, None),
    def(Exif, USER_COMMENT, Undefined, None),
    def(Exif, SUB_SEC_TIME, Ascii, None),
    def(Exif, FLASHPIX_VERSION, Undefined, Some(4)),
    def(Exif, COLOR_SPACE, Short, Some(1)),
    def(Exif, PIXEL_X_DIMENSION, Long, Some(1)),
    def(Exif, PIXEL_Y_DIMENSION, Long, Some(1)),
    def(Exif, INTEROPERABILITY_IFD_POINTER, Long, Some(1)),
    def(Exif, WHITE_BALANCE, Short, Some(1)),
    def(Exif, IMAGE_UNIQUE_ID, Ascii, Some(33)),
    // GPS
    def(Gps, GPS_VERSION_ID, Byte, Some(4)),
    def(Gps, GPS_LATITUDE_REF, Ascii, Some(2)),
    def(Gps, GPS_LATITUDE, Rational, Some(3)),
    def(Gps, GPS_LONGITUDE_REF, Ascii, Some(2)),
    def(Gps, GPS_LONGITUDE, Rational, Some(3)),
    def(Gps, GPS_ALTITUDE_REF, Byte, Some(1)),
    def(Gps, GPS_ALTITUDE, Rational, Some(1)),
    def(Gps, GPS_TIME_STAMP, Rational, Some(3)),
    def(Gps, GPS_PROCESSING_METHOD, Undefined, None),
    def(Gps, GPS_DATE_STAMP, Ascii, Some(11)),
    // Interoperability
    def(Interoperability, INTEROPERABILITY_INDEX, Ascii, None),
];
