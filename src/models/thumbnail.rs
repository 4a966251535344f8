//! Thumbnail model

use bytes::Bytes;

/// A materialized thumbnail: the encoded image bytes delivered by the device.
///
/// Cloning is cheap, the bytes are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// Uid of the owner this thumbnail belongs to
    pub owner_uid: String,
    /// Encoded image data
    pub data: Bytes,
}

impl Thumbnail {
    /// Create a thumbnail for an owner uid.
    pub fn new(owner_uid: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            owner_uid: owner_uid.into(),
            data: data.into(),
        }
    }

    /// Size accounted against the cache budget.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
