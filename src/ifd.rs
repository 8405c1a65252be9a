//! Image File Directory

use crate::{
    tag::Tag,
    tags::{self, is_offset_tag},
    tiff::IfdId,
};
use std::collections::BTreeMap;

/// The tags of one IFD, keyed by tag id
///
/// Tags are kept sorted by id, which is the order TIFF requires them to be
/// serialized in.
#[derive(Debug, Clone)]
pub struct IfdData {
    id: IfdId,
    tags: BTreeMap<u16, Tag>,
    offset_to_next_ifd: u32,
}

impl IfdData {
    pub fn new(id: IfdId) -> Self {
        Self {
            id,
            tags: BTreeMap::new(),
            offset_to_next_ifd: 0,
        }
    }

    pub fn id(&self) -> IfdId {
        self.id
    }

    pub fn tag(&self, tag_id: u16) -> Option<&Tag> {
        self.tags.get(&tag_id)
    }

    pub fn tag_mut(&mut self, tag_id: u16) -> Option<&mut Tag> {
        self.tags.get_mut(&tag_id)
    }

    /// Add or replace a tag, stamping it with this directory's id
    ///
    /// Returns the tag previously stored under the same id.
    pub fn set_tag(&mut self, mut tag: Tag) -> Option<Tag> {
        tag.set_ifd(self.id);
        self.tags.insert(tag.id(), tag)
    }

    pub fn remove_tag(&mut self, tag_id: u16) -> Option<Tag> {
        self.tags.remove(&tag_id)
    }

    pub fn contains_tag(&self, tag_id: u16) -> bool {
        self.tags.contains_key(&tag_id)
    }

    /// All tags in this directory
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub(crate) fn tags_mut(&mut self) -> impl Iterator<Item = &mut Tag> {
        self.tags.values_mut()
    }

    /// Keep only the tags for which `keep` returns true
    pub(crate) fn retain_tags(&mut self, mut keep: impl FnMut(&Tag) -> bool) {
        self.tags.retain(|_, tag| keep(tag));
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn offset_to_next_ifd(&self) -> u32 {
        self.offset_to_next_ifd
    }

    pub fn set_offset_to_next_ifd(&mut self, offset: u32) {
        self.offset_to_next_ifd = offset;
    }

    /// Tags written by the layout rather than the caller
    ///
    /// Besides offset tags this covers the IFD1 payload lengths, which are
    /// derived from the thumbnail itself.
    fn is_layout_tag(&self, tag_id: u16) -> bool {
        is_offset_tag(tag_id)
            || (self.id == IfdId::Ifd1
                && matches!(
                    tag_id,
                    tags::JPEG_INTERCHANGE_FORMAT_LENGTH | tags::STRIP_BYTE_COUNTS
                ))
    }

    fn value_tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags().filter(move |tag| !self.is_layout_tag(tag.id()))
    }

    /// Whether any tag other than a layout tag is present
    pub(crate) fn has_value_tags(&self) -> bool {
        self.value_tags().next().is_some()
    }
}

/// Two directories are equal when they have the same id and the same tags,
/// layout tags excluded. Offset tags and thumbnail lengths are added by the
/// writer.
impl PartialEq for IfdData {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.value_tags().eq(other.value_tags())
    }
}
