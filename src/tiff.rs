//! TIFF primitives shared by the EXIF reader and writer
//!
//! TIFF Structure:
//! - Header: byte order (II/MM), magic (0x002A), IFD offset
//! - IFD (Image File Directory): tag count, tags (12 bytes each), next IFD offset
//! - Tags: tag ID (2), type (2), count (4), value/offset (4)
//!
//! EXIF embeds a TIFF body in a JPEG APP1 segment after the `Exif\0\0`
//! identifier. All offsets inside the body are relative to the byte order mark.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::{self, Write};

/// Size of the TIFF header (byte order mark + magic + IFD0 offset)
pub const TIFF_HEADER_SIZE: u32 = 8;

/// TIFF magic number following the byte order mark
pub const TIFF_MAGIC: u16 = 0x002A;

/// Size of one IFD entry
pub const IFD_ENTRY_SIZE: u32 = 12;

/// Maximum number of tags in an IFD (prevents DOS attacks)
pub const MAX_IFD_TAGS: u16 = 1000;

/// Byte order of a TIFF body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// "II" (Intel)
    LittleEndian,
    /// "MM" (Motorola)
    #[default]
    BigEndian,
}

impl ByteOrder {
    /// The two-byte mark that opens a TIFF header, read as a big-endian u16
    pub fn mark(&self) -> u16 {
        match self {
            ByteOrder::LittleEndian => 0x4949,
            ByteOrder::BigEndian => 0x4D4D,
        }
    }

    /// Detect byte order from the first two bytes of a TIFF header
    pub fn from_mark(mark: &[u8]) -> Option<Self> {
        match mark {
            b"II" => Some(ByteOrder::LittleEndian),
            b"MM" => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }

    pub fn read_u16(&self, data: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes([data[0], data[1]]),
            ByteOrder::BigEndian => u16::from_be_bytes([data[0], data[1]]),
        }
    }

    pub fn read_u32(&self, data: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            ByteOrder::BigEndian => u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
        }
    }

    pub fn write_u16<W: Write>(&self, writer: &mut W, value: u16) -> io::Result<()> {
        match self {
            ByteOrder::LittleEndian => writer.write_u16::<LittleEndian>(value),
            ByteOrder::BigEndian => writer.write_u16::<BigEndian>(value),
        }
    }

    pub fn write_u32<W: Write>(&self, writer: &mut W, value: u32) -> io::Result<()> {
        match self {
            ByteOrder::LittleEndian => writer.write_u32::<LittleEndian>(value),
            ByteOrder::BigEndian => writer.write_u32::<BigEndian>(value),
        }
    }

    pub fn write_i32<W: Write>(&self, writer: &mut W, value: i32) -> io::Result<()> {
        match self {
            ByteOrder::LittleEndian => writer.write_i32::<LittleEndian>(value),
            ByteOrder::BigEndian => writer.write_i32::<BigEndian>(value),
        }
    }
}

/// The directories an EXIF body is organized into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IfdId {
    /// Primary image description
    Ifd0,
    /// Thumbnail description
    Ifd1,
    /// Camera and capture parameters
    Exif,
    /// Interoperability
    Interoperability,
    /// GPS
    Gps,
}

impl IfdId {
    /// All directory kinds
    pub const ALL: [IfdId; 5] = [
        IfdId::Ifd0,
        IfdId::Ifd1,
        IfdId::Exif,
        IfdId::Interoperability,
        IfdId::Gps,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            IfdId::Ifd0 => 0,
            IfdId::Ifd1 => 1,
            IfdId::Exif => 2,
            IfdId::Interoperability => 3,
            IfdId::Gps => 4,
        }
    }
}

/// TIFF field types supported by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    Undefined,
    SLong,
    SRational,
}

impl DataType {
    /// Decode a TIFF type code
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(DataType::Byte),
            2 => Some(DataType::Ascii),
            3 => Some(DataType::Short),
            4 => Some(DataType::Long),
            5 => Some(DataType::Rational),
            7 => Some(DataType::Undefined),
            9 => Some(DataType::SLong),
            10 => Some(DataType::SRational),
            _ => None,
        }
    }

    /// TIFF type code
    pub fn code(self) -> u16 {
        match self {
            DataType::Byte => 1,
            DataType::Ascii => 2,
            DataType::Short => 3,
            DataType::Long => 4,
            DataType::Rational => 5,
            DataType::Undefined => 7,
            DataType::SLong => 9,
            DataType::SRational => 10,
        }
    }

    /// Encoded size of one component
    pub fn unit_size(self) -> u32 {
        match self {
            DataType::Byte | DataType::Ascii | DataType::Undefined => 1,
            DataType::Short => 2,
            DataType::Long | DataType::SLong => 4,
            DataType::Rational | DataType::SRational => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_order() {
        let be = ByteOrder::BigEndian;
        let le = ByteOrder::LittleEndian;

        assert_eq!(be.read_u16(&[0x12, 0x34]), 0x1234);
        assert_eq!(le.read_u16(&[0x34, 0x12]), 0x1234);

        assert_eq!(be.read_u32(&[0x12, 0x34, 0x56, 0x78]), 0x12345678);
        assert_eq!(le.read_u32(&[0x78, 0x56, 0x34, 0x12]), 0x12345678);
    }

    #[test]
    fn test_byte_order_write() {
        let mut out = Vec::new();
        ByteOrder::LittleEndian.write_u32(&mut out, 0x12345678).unwrap();
        ByteOrder::BigEndian.write_u16(&mut out, 0x1234).unwrap();
        assert_eq!(out, [0x78, 0x56, 0x34, 0x12, 0x12, 0x34]);
    }

    #[test]
    fn test_byte_order_mark() {
        assert_eq!(ByteOrder::from_mark(b"II"), Some(ByteOrder::LittleEndian));
        assert_eq!(ByteOrder::from_mark(b"MM"), Some(ByteOrder::BigEndian));
        assert_eq!(ByteOrder::from_mark(b"XX"), None);
        assert_eq!(ByteOrder::BigEndian.mark().to_be_bytes(), *b"MM");
        assert_eq!(ByteOrder::LittleEndian.mark().to_be_bytes(), *b"II");
    }

    #[test]
    fn test_data_type_codes() {
        for code in [1u16, 2, 3, 4, 5, 7, 9, 10] {
            let ty = DataType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
        assert_eq!(DataType::from_code(6), None);
        assert_eq!(DataType::from_code(12), None);
        assert_eq!(DataType::Rational.unit_size(), 8);
        assert_eq!(DataType::Short.unit_size(), 2);
    }
}
