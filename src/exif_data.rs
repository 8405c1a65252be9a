//! The EXIF directory store

use crate::{
    ifd::IfdData,
    tag::Tag,
    tiff::{ByteOrder, IfdId},
};

/// Thumbnail carried by IFD1
///
/// A thumbnail is either one compressed (JPEG) blob or a list of
/// uncompressed strips, never both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Thumbnail {
    #[default]
    None,
    Compressed(Vec<u8>),
    Strips(Vec<Vec<u8>>),
}

/// All EXIF directories of one image plus its thumbnail
///
/// # Example
///
/// ```
/// use exif_io::{tags, ExifData, TagRegistry, IfdId};
///
/// # fn main() -> exif_io::Result<()> {
/// let registry = TagRegistry::standard();
/// let mut exif = ExifData::default();
///
/// let mut make = registry.build_uninitialized_tag(IfdId::Ifd0, tags::MAKE).unwrap();
/// make.set_ascii("Canon")?;
/// exif.set_tag(make);
///
/// assert!(exif.tag(IfdId::Ifd0, tags::MAKE).is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExifData {
    ifds: [Option<IfdData>; 5],
    thumbnail: Thumbnail,
    byte_order: ByteOrder,
}

impl ExifData {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            ..Self::default()
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    pub fn ifd(&self, id: IfdId) -> Option<&IfdData> {
        self.ifds[id.index()].as_ref()
    }

    pub fn ifd_mut(&mut self, id: IfdId) -> Option<&mut IfdData> {
        self.ifds[id.index()].as_mut()
    }

    /// Add a directory, replacing any directory of the same kind
    pub fn add_ifd(&mut self, ifd: IfdData) -> Option<IfdData> {
        self.ifds[ifd.id().index()].replace(ifd)
    }

    pub fn get_or_insert_ifd(&mut self, id: IfdId) -> &mut IfdData {
        self.ifds[id.index()].get_or_insert_with(|| IfdData::new(id))
    }

    pub fn remove_ifd(&mut self, id: IfdId) -> Option<IfdData> {
        self.ifds[id.index()].take()
    }

    /// Directories present in the store
    pub fn ifds(&self) -> impl Iterator<Item = &IfdData> {
        self.ifds.iter().flatten()
    }

    pub fn tag(&self, ifd: IfdId, tag_id: u16) -> Option<&Tag> {
        self.ifd(ifd)?.tag(tag_id)
    }

    /// Add or replace a tag in the directory it is stamped with
    pub fn set_tag(&mut self, tag: Tag) -> Option<Tag> {
        self.get_or_insert_ifd(tag.ifd()).set_tag(tag)
    }

    pub fn remove_tag(&mut self, ifd: IfdId, tag_id: u16) -> Option<Tag> {
        self.ifd_mut(ifd)?.remove_tag(tag_id)
    }

    /// All tags across all directories
    pub fn all_tags(&self) -> impl Iterator<Item = &Tag> {
        self.ifds().flat_map(|ifd| ifd.tags())
    }

    pub fn thumbnail(&self) -> &Thumbnail {
        &self.thumbnail
    }

    /// Set a compressed thumbnail, discarding any uncompressed strips
    pub fn set_compressed_thumbnail(&mut self, data: Vec<u8>) {
        self.thumbnail = Thumbnail::Compressed(data);
    }

    pub fn compressed_thumbnail(&self) -> Option<&[u8]> {
        match &self.thumbnail {
            Thumbnail::Compressed(data) => Some(data),
            _ => None,
        }
    }

    pub fn has_compressed_thumbnail(&self) -> bool {
        matches!(self.thumbnail, Thumbnail::Compressed(_))
    }

    /// Set the bytes of one uncompressed strip, discarding any compressed
    /// thumbnail
    ///
    /// Strips below `index` that were never set are left empty.
    pub fn set_strip_bytes(&mut self, index: usize, data: Vec<u8>) {
        if !matches!(self.thumbnail, Thumbnail::Strips(_)) {
            self.thumbnail = Thumbnail::Strips(Vec::new());
        }
        if let Thumbnail::Strips(strips) = &mut self.thumbnail {
            if index >= strips.len() {
                strips.resize(index + 1, Vec::new());
            }
            strips[index] = data;
        }
    }

    pub fn strip(&self, index: usize) -> Option<&[u8]> {
        match &self.thumbnail {
            Thumbnail::Strips(strips) => strips.get(index).map(Vec::as_slice),
            _ => None,
        }
    }

    pub fn strip_count(&self) -> usize {
        match &self.thumbnail {
            Thumbnail::Strips(strips) => strips.len(),
            _ => 0,
        }
    }

    pub fn has_uncompressed_strips(&self) -> bool {
        matches!(self.thumbnail, Thumbnail::Strips(_))
    }

    pub fn clear_thumbnail(&mut self) {
        self.thumbnail = Thumbnail::None;
    }
}

/// Directories holding nothing but offset tags compare equal to absent
/// ones, since the writer synthesizes them.
impl PartialEq for ExifData {
    fn eq(&self, other: &Self) -> bool {
        let same_ifds = self
            .ifds
            .iter()
            .zip(&other.ifds)
            .all(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => a == b,
                (Some(ifd), None) | (None, Some(ifd)) => !ifd.has_value_tags(),
                (None, None) => true,
            });
        self.byte_order == other.byte_order && self.thumbnail == other.thumbnail && same_ifds
    }
}
