//! Thumbnail owner keys

/// Separator between a media uid and a resource uid in a resource owner key.
///
/// Resource keys are `<media uid>/<resource uid>`, which lets a single
/// invalidation on the media uid reach every resource below it.
pub const RESOURCE_SEPARATOR: char = '/';

/// Whatever a thumbnail belongs to: a whole media, or one of its resources.
///
/// Uids are only unique within a single device session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner {
    uid: String,
    media_len: usize,
}

impl Owner {
    /// Owner key for a media.
    pub fn media(media_uid: impl Into<String>) -> Self {
        let uid = media_uid.into();
        let media_len = uid.len();
        Self { uid, media_len }
    }

    /// Owner key for a resource of a media.
    pub fn resource(media_uid: &str, resource_uid: &str) -> Self {
        Self {
            uid: format!("{media_uid}{RESOURCE_SEPARATOR}{resource_uid}"),
            media_len: media_uid.len(),
        }
    }

    /// Parse an owner from its uid, splitting on the first separator.
    pub fn from_uid(uid: &str) -> Self {
        match uid.split_once(RESOURCE_SEPARATOR) {
            Some((media, resource)) => Self::resource(media, resource),
            None => Self::media(uid),
        }
    }

    /// Cache key of this owner.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Uid of the media this owner belongs to (itself for a media).
    pub fn media_uid(&self) -> &str {
        &self.uid[..self.media_len]
    }

    /// Uid of the resource, if this owner is a resource.
    pub fn resource_uid(&self) -> Option<&str> {
        self.is_resource()
            .then(|| &self.uid[self.media_len + RESOURCE_SEPARATOR.len_utf8()..])
    }

    /// Whether this owner is a media resource.
    pub fn is_resource(&self) -> bool {
        self.media_len < self.uid.len()
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uid)
    }
}

/// Whether `uid` equals `prefix` or lives in its namespace.
///
/// `"m1"` covers `"m1"` and `"m1/r2"`, but not `"m10"` or `"m10/r2"`.
pub fn in_namespace(uid: &str, prefix: &str) -> bool {
    uid.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(RESOURCE_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_owner() {
        let owner = Owner::media("m1");
        assert_eq!(owner.uid(), "m1");
        assert_eq!(owner.media_uid(), "m1");
        assert_eq!(owner.resource_uid(), None);
        assert!(!owner.is_resource());
    }

    #[test]
    fn test_resource_owner() {
        let owner = Owner::resource("m1", "r2.jpg");
        assert_eq!(owner.uid(), "m1/r2.jpg");
        assert_eq!(owner.media_uid(), "m1");
        assert_eq!(owner.resource_uid(), Some("r2.jpg"));
        assert_eq!(Owner::from_uid("m1/r2.jpg"), owner);
    }

    #[test]
    fn test_namespace() {
        assert!(in_namespace("m1", "m1"));
        assert!(in_namespace("m1/r1", "m1"));
        assert!(!in_namespace("m10", "m1"));
        assert!(!in_namespace("m10/r1", "m1"));
        assert!(!in_namespace("m", "m1"));
    }
}
