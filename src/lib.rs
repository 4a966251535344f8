//! # thumbcache
//!
//! In-memory thumbnail cache for the media store of a connected device.
//!
//! ## Overview
//!
//! Media lists ask for many thumbnails at once, often for the same media, over a
//! link that handles one download at a time well. thumbcache keeps thumbnails in
//! a byte-bounded LRU, merges concurrent requests for the same owner into one
//! download, and downloads one thumbnail at a time in request order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ThumbnailService                         │
//! │   Cloneable handle, awaitable requests, cancel on drop      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ commands
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 cache task (single owner)                   │
//! │                                                             │
//! │  ThumbnailCache: LRU index • size budget • coalescing       │
//! │  DownloadQueue:  FIFO • one fetch in flight • retry         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ one fetch task at a time
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │        ThumbnailSource (device session, e.g. HTTP)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`cache`] — Synchronous cache and download queue state machine
//! - [`service`] — Async front-end running the cache on a background task
//! - [`source`] — Thumbnail sources (HTTP device endpoint)
//! - [`models`] — Owner keys and thumbnails
//! - [`decode`] — Decoding and downsizing thumbnails for display
//! - [`config`] — Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use thumbcache::{HttpThumbnailSource, Owner, ThumbnailService};
//!
//! # async fn example() {
//! let source = Arc::new(HttpThumbnailSource::new(
//!     "http://192.168.42.1",
//!     Duration::from_secs(30),
//! ));
//! let service = ThumbnailService::spawn(&source, 10 * 1024 * 1024);
//!
//! if let Some(thumbnail) = service.get(Owner::media("10000001")).await {
//!     println!("{} bytes", thumbnail.size());
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::uninlined_format_args)]

pub mod cache;
pub mod config;
pub mod decode;
pub mod models;
pub mod paths;
pub mod service;
pub mod source;

// Re-export main types for convenience
pub use cache::{CacheStats, RequestHandle, ThumbnailBackend, ThumbnailCache};
pub use config::Config;
pub use decode::{DecodeError, decode_thumbnail};
pub use models::{Owner, RESOURCE_SEPARATOR, Thumbnail};
pub use service::{ThumbnailRequest, ThumbnailService};
pub use source::{FetchError, HttpThumbnailSource, ThumbnailSource};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
