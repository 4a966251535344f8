//! Data models for thumbcache

mod owner;
mod thumbnail;

pub use owner::{Owner, RESOURCE_SEPARATOR, in_namespace};
pub use thumbnail::Thumbnail;
