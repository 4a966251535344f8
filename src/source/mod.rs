//! Thumbnail sources: where thumbnail bytes actually come from

pub mod http;

use std::future::Future;

use bytes::Bytes;
use thiserror::Error;

use crate::models::Owner;

pub use http::HttpThumbnailSource;

/// Why a thumbnail could not be fetched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The device has no thumbnail for this owner
    #[error("no thumbnail available for {0}")]
    NotFound(String),
    /// The device answered with an unexpected status
    #[error("device returned HTTP {0}")]
    Status(u16),
    /// The device answered with an empty body
    #[error("empty thumbnail for {0}")]
    Empty(String),
    /// Transport-level failure talking to the device
    #[error("transport error: {0}")]
    Transport(String),
    /// The fetch could not be started at all
    #[error("fetch could not be started: {0}")]
    Unavailable(String),
    /// The fetch was cancelled before it completed
    #[error("fetch cancelled")]
    Cancelled,
}

/// Asynchronous thumbnail fetch capability of a connected device
pub trait ThumbnailSource: Send + Sync + 'static {
    /// Fetch the encoded thumbnail of `owner`.
    fn fetch(&self, owner: &Owner) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}
