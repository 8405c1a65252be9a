//! EXIF tags and their typed values

use crate::{
    error::{Error, Result},
    tiff::{ByteOrder, DataType, IfdId},
};
use byteorder::WriteBytesExt;
use std::io::{self, Write};

/// Unsigned numerator/denominator pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// Signed numerator/denominator pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SRational {
    pub numerator: i32,
    pub denominator: i32,
}

impl SRational {
    pub fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// The value carried by a tag
///
/// ASCII buffers may or may not carry their NUL terminator; the component
/// count accounts for it either way and serialization always emits exactly
/// one trailing NUL.
#[derive(Debug, Clone)]
pub enum TagValue {
    Ascii(Vec<u8>),
    /// BYTE or UNDEFINED data
    Bytes(Vec<u8>),
    Shorts(Vec<u16>),
    Longs(Vec<u32>),
    SLongs(Vec<i32>),
    Rationals(Vec<Rational>),
    SRationals(Vec<SRational>),
}

impl TagValue {
    /// Number of TIFF components this value occupies
    pub fn component_count(&self) -> u32 {
        match self {
            TagValue::Ascii(buf) => ascii_count(buf),
            TagValue::Bytes(buf) => buf.len() as u32,
            TagValue::Shorts(v) => v.len() as u32,
            TagValue::Longs(v) => v.len() as u32,
            TagValue::SLongs(v) => v.len() as u32,
            TagValue::Rationals(v) => v.len() as u32,
            TagValue::SRationals(v) => v.len() as u32,
        }
    }

    fn fits(&self, data_type: DataType) -> bool {
        matches!(
            (self, data_type),
            (TagValue::Ascii(_), DataType::Ascii)
                | (TagValue::Bytes(_), DataType::Byte | DataType::Undefined)
                | (TagValue::Shorts(_), DataType::Short)
                | (TagValue::Longs(_), DataType::Long)
                | (TagValue::SLongs(_), DataType::SLong)
                | (TagValue::Rationals(_), DataType::Rational)
                | (TagValue::SRationals(_), DataType::SRational)
        )
    }

    fn kind(&self) -> &'static str {
        match self {
            TagValue::Ascii(_) => "ASCII",
            TagValue::Bytes(_) => "byte",
            TagValue::Shorts(_) => "short",
            TagValue::Longs(_) => "long",
            TagValue::SLongs(_) => "signed long",
            TagValue::Rationals(_) => "rational",
            TagValue::SRationals(_) => "signed rational",
        }
    }

    /// Decode raw TIFF bytes holding whole components of `data_type`
    pub(crate) fn decode(data_type: DataType, bytes: &[u8], order: ByteOrder) -> Self {
        match data_type {
            DataType::Ascii => TagValue::Ascii(bytes.to_vec()),
            DataType::Byte | DataType::Undefined => TagValue::Bytes(bytes.to_vec()),
            DataType::Short => {
                TagValue::Shorts(bytes.chunks_exact(2).map(|c| order.read_u16(c)).collect())
            }
            DataType::Long => {
                TagValue::Longs(bytes.chunks_exact(4).map(|c| order.read_u32(c)).collect())
            }
            DataType::SLong => TagValue::SLongs(
                bytes
                    .chunks_exact(4)
                    .map(|c| order.read_u32(c) as i32)
                    .collect(),
            ),
            DataType::Rational => TagValue::Rationals(
                bytes
                    .chunks_exact(8)
                    .map(|c| Rational::new(order.read_u32(&c[0..4]), order.read_u32(&c[4..8])))
                    .collect(),
            ),
            DataType::SRational => TagValue::SRationals(
                bytes
                    .chunks_exact(8)
                    .map(|c| {
                        SRational::new(
                            order.read_u32(&c[0..4]) as i32,
                            order.read_u32(&c[4..8]) as i32,
                        )
                    })
                    .collect(),
            ),
        }
    }
}

fn trim_nul(buf: &[u8]) -> &[u8] {
    match buf.split_last() {
        Some((0, rest)) => rest,
        _ => buf,
    }
}

impl PartialEq for TagValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TagValue::Ascii(a), TagValue::Ascii(b)) => trim_nul(a) == trim_nul(b),
            (TagValue::Bytes(a), TagValue::Bytes(b)) => a == b,
            (TagValue::Shorts(a), TagValue::Shorts(b)) => a == b,
            (TagValue::Longs(a), TagValue::Longs(b)) => a == b,
            (TagValue::SLongs(a), TagValue::SLongs(b)) => a == b,
            (TagValue::Rationals(a), TagValue::Rationals(b)) => a == b,
            (TagValue::SRationals(a), TagValue::SRationals(b)) => a == b,
            _ => false,
        }
    }
}

/// A single IFD entry
///
/// Values whose encoded size is at most 4 bytes are stored inline in the
/// directory entry; larger values live out of line at [`Tag::offset`], which
/// is only meaningful once the writer has laid the EXIF block out.
#[derive(Debug, Clone)]
pub struct Tag {
    id: u16,
    ifd: IfdId,
    data_type: DataType,
    component_count: u32,
    defined_count: bool,
    value: Option<TagValue>,
    offset: u32,
}

impl Tag {
    /// Create an unvalued tag with a variable component count
    pub fn new(id: u16, ifd: IfdId, data_type: DataType) -> Self {
        Self {
            id,
            ifd,
            data_type,
            component_count: 0,
            defined_count: false,
            value: None,
            offset: 0,
        }
    }

    /// Create an unvalued tag whose component count is fixed
    pub fn with_defined_count(id: u16, ifd: IfdId, data_type: DataType, count: u32) -> Self {
        Self {
            component_count: count,
            defined_count: true,
            ..Self::new(id, ifd, data_type)
        }
    }

    /// Tag as found in a TIFF directory entry, before its value is resolved
    pub(crate) fn parsed(id: u16, ifd: IfdId, data_type: DataType, count: u32) -> Self {
        Self {
            component_count: count,
            ..Self::new(id, ifd, data_type)
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Directory this tag belongs to
    pub fn ifd(&self) -> IfdId {
        self.ifd
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn component_count(&self) -> u32 {
        self.component_count
    }

    pub fn has_defined_count(&self) -> bool {
        self.defined_count
    }

    pub fn value(&self) -> Option<&TagValue> {
        self.value.as_ref()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Out-of-line value offset, relative to the TIFF header
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub(crate) fn set_ifd(&mut self, ifd: IfdId) {
        self.ifd = ifd;
    }

    pub(crate) fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }

    /// Encoded size of the value in bytes
    pub fn data_size(&self) -> u32 {
        self.component_count
            .saturating_mul(self.data_type.unit_size())
    }

    /// Whether the value is stored out of line
    pub fn is_out_of_line(&self) -> bool {
        self.data_size() > 4
    }

    /// Set the value, updating the component count
    ///
    /// Short tags accept `Longs` when every value fits in 16 bits and long
    /// tags accept `Shorts`; UNDEFINED tags accept ASCII bytes verbatim.
    /// Tags with a defined component count reject values of another length,
    /// except ASCII values which are NUL-padded up to the defined length.
    pub fn set_value(&mut self, value: TagValue) -> Result<()> {
        let value = match (self.data_type, value) {
            (DataType::Short, TagValue::Longs(values)) => {
                let shorts = values
                    .iter()
                    .map(|&v| u16::try_from(v))
                    .collect::<std::result::Result<Vec<u16>, _>>()
                    .map_err(|_| Error::InvalidTagValue {
                        tag: self.id,
                        reason: "value out of range for a short".into(),
                    })?;
                TagValue::Shorts(shorts)
            }
            (DataType::Long, TagValue::Shorts(values)) => {
                TagValue::Longs(values.into_iter().map(u32::from).collect())
            }
            (DataType::Undefined, TagValue::Ascii(buf)) => TagValue::Bytes(buf),
            (data_type, value) if value.fits(data_type) => value,
            (data_type, value) => {
                return Err(Error::InvalidTagValue {
                    tag: self.id,
                    reason: format!("{} value for a {:?} tag", value.kind(), data_type),
                })
            }
        };

        let value = if self.defined_count {
            match value {
                TagValue::Ascii(mut buf) if ascii_count(&buf) <= self.component_count => {
                    buf.resize(self.component_count as usize, 0);
                    TagValue::Ascii(buf)
                }
                other if other.component_count() == self.component_count => other,
                other => {
                    return Err(Error::InvalidTagValue {
                        tag: self.id,
                        reason: format!(
                            "expected {} components, got {}",
                            self.component_count,
                            other.component_count()
                        ),
                    })
                }
            }
        } else {
            value
        };

        self.component_count = value.component_count();
        self.value = Some(value);
        Ok(())
    }

    /// Builder form of [`Tag::set_value`]
    pub fn with_value(mut self, value: TagValue) -> Result<Self> {
        self.set_value(value)?;
        Ok(self)
    }

    /// Set an ASCII value from a string
    pub fn set_ascii(&mut self, text: &str) -> Result<()> {
        let mut buf = text.as_bytes().to_vec();
        buf.push(0);
        self.set_value(TagValue::Ascii(buf))
    }

    /// Attach a decoded value without conversion, keeping the parsed count
    pub(crate) fn set_parsed_value(&mut self, value: TagValue) {
        self.value = Some(value);
    }

    /// Drop the value, turning the tag back into a placeholder
    pub fn clear_value(&mut self) {
        self.value = None;
        if !self.defined_count {
            self.component_count = 0;
        }
    }

    /// Write the encoded value, exactly [`Tag::data_size`] bytes
    pub(crate) fn write_value<W: Write>(&self, writer: &mut W, order: ByteOrder) -> io::Result<()> {
        let count = self.component_count as usize;
        let Some(value) = &self.value else {
            return writer.write_all(&vec![0u8; self.data_size() as usize]);
        };

        match value {
            TagValue::Ascii(buf) => {
                if buf.len() == count {
                    if let Some((_, content)) = buf.split_last() {
                        writer.write_all(content)?;
                        writer.write_u8(0)?;
                    }
                } else {
                    writer.write_all(buf)?;
                    writer.write_u8(0)?;
                }
            }
            TagValue::Bytes(buf) => {
                let len = buf.len().min(count);
                writer.write_all(&buf[..len])?;
                writer.write_all(&vec![0u8; count - len])?;
            }
            TagValue::Shorts(values) => {
                for &v in values {
                    order.write_u16(writer, v)?;
                }
            }
            TagValue::Longs(values) => {
                for &v in values {
                    order.write_u32(writer, v)?;
                }
            }
            TagValue::SLongs(values) => {
                for &v in values {
                    order.write_i32(writer, v)?;
                }
            }
            TagValue::Rationals(values) => {
                for r in values {
                    order.write_u32(writer, r.numerator)?;
                    order.write_u32(writer, r.denominator)?;
                }
            }
            TagValue::SRationals(values) => {
                for r in values {
                    order.write_i32(writer, r.numerator)?;
                    order.write_i32(writer, r.denominator)?;
                }
            }
        }
        Ok(())
    }
}

fn ascii_count(buf: &[u8]) -> u32 {
    match buf.last() {
        Some(0) => buf.len() as u32,
        _ => buf.len() as u32 + 1,
    }
}

/// Offsets are layout artifacts and do not take part in equality
impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.ifd == other.ifd
            && self.data_type == other.data_type
            && self.component_count == other.component_count
            && self.value == other.value
    }
}
