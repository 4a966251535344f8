//! Bounded LRU thumbnail cache with coalesced, sequential downloads.
//!
//! The cache is a synchronous state machine. Everything runs on one logical
//! execution context: callers request thumbnails, the cache asks its
//! [`ThumbnailBackend`] to start fetches one at a time, and whoever drives the
//! backend reports each result back through [`ThumbnailCache::fetch_completed`].
//!
//! - Concurrent requests for the same owner share a single fetch.
//! - Fetches run one at a time, in request order.
//! - Images are evicted least-recently-used first once the byte budget is
//!   exceeded. Entries still waiting for a fetch are never evicted.
//! - Invalidating an owner whose fetch is in flight restarts that fetch instead
//!   of failing or serving stale data to its waiters.

mod queue;

use bytes::Bytes;
use lru::LruCache;

use crate::models::{Owner, Thumbnail, in_namespace};
use crate::source::FetchError;
use queue::DownloadQueue;

/// Completion callback of a thumbnail request.
pub type Callback = Box<dyn FnOnce(Option<Thumbnail>) + Send>;

/// Identifies one started backend fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket(u64);

/// Identifies one request for a thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// Something that can be cancelled.
pub trait Cancel {
    /// Cancel it. A cancelled backend fetch must not report back, or its report
    /// is ignored.
    fn cancel(self);
}

/// Starts thumbnail fetches on behalf of the cache.
///
/// The backend belongs to the device session, not to the cache.
pub trait ThumbnailBackend {
    /// Handle on a started fetch
    type Fetch: Cancel;

    /// Start fetching the thumbnail of `owner`.
    ///
    /// The outcome must later be passed to [`ThumbnailCache::fetch_completed`]
    /// with the same `ticket`. An error means the fetch could not be started.
    fn fetch(&self, owner: &Owner, ticket: FetchTicket) -> Result<Self::Fetch, FetchError>;
}

/// Handle returned by [`ThumbnailCache::get_thumbnail`].
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandle {
    pending: Option<(String, RequestId)>,
}

impl RequestHandle {
    const fn delivered() -> Self {
        Self { pending: None }
    }

    /// Whether the thumbnail was not available immediately.
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Uid of the requested owner, for pending requests.
    pub fn owner_uid(&self) -> Option<&str> {
        self.pending.as_ref().map(|(uid, _)| uid.as_str())
    }
}

/// Snapshot of the cache state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached images
    pub images: usize,
    /// Number of owners waiting for a fetch
    pub pending: usize,
    /// Number of owners queued behind the in-flight fetch
    pub queued: usize,
    /// Owner currently being fetched
    pub in_flight: Option<String>,
    /// Bytes used by cached images
    pub size: usize,
    /// Byte budget
    pub max_size: usize,
}

struct Waiter {
    id: RequestId,
    callback: Callback,
}

enum CacheEntry {
    Image(Thumbnail),
    Pending { owner: Owner, waiters: Vec<Waiter> },
}

/// LRU thumbnail cache, see the [module documentation](self).
pub struct ThumbnailCache<B: ThumbnailBackend> {
    backend: B,
    /// Every live owner, most recently used first
    entries: LruCache<String, CacheEntry>,
    queue: DownloadQueue<B::Fetch>,
    size: usize,
    max_size: usize,
    next_request: u64,
}

impl<B: ThumbnailBackend> ThumbnailCache<B> {
    /// Create a cache holding at most `max_size` bytes of images.
    pub fn new(backend: B, max_size: usize) -> Self {
        Self {
            backend,
            entries: LruCache::unbounded(),
            queue: DownloadQueue::new(),
            size: 0,
            max_size,
            next_request: 0,
        }
    }

    /// Request the thumbnail of `owner`.
    ///
    /// `callback` runs exactly once with the thumbnail, or with `None` if it
    /// could not be fetched, unless the request is cancelled first. A cached
    /// thumbnail is delivered before this returns.
    pub fn get_thumbnail<F>(&mut self, owner: Owner, callback: F) -> RequestHandle
    where
        F: FnOnce(Option<Thumbnail>) + Send + 'static,
    {
        let id = RequestId(self.next_request);
        self.next_request += 1;

        match self.entries.get_mut(owner.uid()) {
            Some(CacheEntry::Image(thumbnail)) => {
                let thumbnail = thumbnail.clone();
                callback(Some(thumbnail));
                return RequestHandle::delivered();
            }
            Some(CacheEntry::Pending { waiters, .. }) => {
                waiters.push(Waiter {
                    id,
                    callback: Box::new(callback),
                });
                return RequestHandle {
                    pending: Some((owner.uid().to_string(), id)),
                };
            }
            None => {}
        }

        let uid = owner.uid().to_string();
        tracing::debug!("Queueing thumbnail download for {uid}");
        self.entries.put(
            uid.clone(),
            CacheEntry::Pending {
                owner: owner.clone(),
                waiters: vec![Waiter {
                    id,
                    callback: Box::new(callback),
                }],
            },
        );
        self.queue.enqueue(owner);
        self.process_next();

        RequestHandle {
            pending: Some((uid, id)),
        }
    }

    /// Cancel a request. Its callback will not run.
    ///
    /// Other requests for the same owner are unaffected. Cancelling the last
    /// one drops the owner's download. Unknown or fulfilled requests are
    /// ignored.
    pub fn cancel(&mut self, handle: &RequestHandle) {
        let Some((uid, id)) = &handle.pending else {
            return;
        };
        let Some(CacheEntry::Pending { waiters, .. }) = self.entries.peek_mut(uid.as_str()) else {
            return;
        };
        let Some(index) = waiters.iter().position(|waiter| waiter.id == *id) else {
            return;
        };
        waiters.remove(index);
        if !waiters.is_empty() {
            return;
        }

        if let Some(CacheEntry::Pending { owner, .. }) = self.entries.pop(uid.as_str()) {
            tracing::debug!("Last request for {owner} cancelled, dropping download");
        }
        if !self.queue.remove_queued(uid) && self.queue.in_flight_uid() == Some(uid.as_str()) {
            self.abort_in_flight();
        }
    }

    /// Invalidate the thumbnail of an owner uid, or of every owner in the
    /// namespace of a media uid when no owner has exactly that uid.
    ///
    /// Cached images are dropped so the next request fetches them again. An
    /// in-flight fetch is restarted and its waiters receive the new result.
    pub fn invalidate(&mut self, uid_or_prefix: &str) {
        if self.entries.contains(uid_or_prefix) {
            self.invalidate_entry(uid_or_prefix);
            return;
        }

        let matching: Vec<String> = self
            .entries
            .iter()
            .map(|(uid, _)| uid)
            .filter(|uid| in_namespace(uid, uid_or_prefix))
            .cloned()
            .collect();
        for uid in matching {
            self.invalidate_entry(&uid);
        }
    }

    /// Drop everything: cached images, queued downloads and the in-flight
    /// fetch. Outstanding requests are abandoned without their callback.
    pub fn clear(&mut self) {
        tracing::debug!("Clearing thumbnail cache ({} entries)", self.entries.len());
        self.queue.clear();
        self.entries.clear();
        self.size = 0;
    }

    /// Report the outcome of the fetch identified by `ticket`.
    ///
    /// Reports for fetches that were cancelled or superseded are ignored.
    pub fn fetch_completed(&mut self, ticket: FetchTicket, result: Result<Bytes, FetchError>) {
        let Some(in_flight) = self.queue.complete(ticket) else {
            tracing::debug!("Ignoring result of stale fetch {ticket:?}");
            return;
        };
        self.resolve(in_flight.owner, result);
        self.process_next();
    }

    /// Number of entries, cached or pending.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes used by cached images.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Byte budget for cached images.
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Whether an image is cached for `uid`. Does not touch the entry.
    pub fn contains_image(&self, uid: &str) -> bool {
        matches!(self.entries.peek(uid), Some(CacheEntry::Image(_)))
    }

    /// Whether requests for `uid` are waiting for a fetch.
    pub fn is_pending(&self, uid: &str) -> bool {
        matches!(self.entries.peek(uid), Some(CacheEntry::Pending { .. }))
    }

    /// Uid of the owner currently being fetched.
    pub fn in_flight(&self) -> Option<&str> {
        self.queue.in_flight_uid()
    }

    /// Snapshot of the cache state.
    pub fn stats(&self) -> CacheStats {
        let images = self
            .entries
            .iter()
            .filter(|(_, entry)| matches!(entry, CacheEntry::Image(_)))
            .count();
        CacheStats {
            images,
            pending: self.entries.len() - images,
            queued: self.queue.queued_len(),
            in_flight: self.queue.in_flight_uid().map(str::to_string),
            size: self.size,
            max_size: self.max_size,
        }
    }

    fn invalidate_entry(&mut self, uid: &str) {
        match self.entries.peek(uid) {
            Some(CacheEntry::Image(_)) => {
                if let Some(CacheEntry::Image(thumbnail)) = self.entries.pop(uid) {
                    tracing::debug!("Invalidated cached thumbnail for {uid}");
                    self.size -= thumbnail.size();
                }
            }
            Some(CacheEntry::Pending { .. }) => {
                if self.queue.in_flight_uid() == Some(uid) {
                    tracing::debug!("Invalidated in-flight thumbnail for {uid}, refetching");
                    self.queue.mark_retry();
                    self.abort_in_flight();
                }
            }
            None => {}
        }
    }

    /// Cancel the in-flight fetch and treat it as failed.
    fn abort_in_flight(&mut self) {
        if let Some(owner) = self.queue.abort() {
            self.resolve(owner, Err(FetchError::Cancelled));
            self.process_next();
        }
    }

    /// Start fetches until one is in flight or nothing is queued.
    fn process_next(&mut self) {
        while let Some(owner) = self.queue.next() {
            if !self.is_pending(owner.uid()) {
                continue;
            }
            let ticket = self.queue.issue_ticket();
            match self.backend.fetch(&owner, ticket) {
                Ok(fetch) => {
                    tracing::debug!("Fetching thumbnail for {owner}");
                    self.queue.start(owner, ticket, fetch);
                }
                Err(e) => self.resolve(owner, Err(e)),
            }
        }
    }

    /// Settle a finished fetch, or queue it again when it was invalidated.
    fn resolve(&mut self, owner: Owner, result: Result<Bytes, FetchError>) {
        if self.queue.take_retry() {
            if self.is_pending(owner.uid()) {
                self.queue.requeue(owner);
            }
            return;
        }

        match result {
            Ok(data) => self.store(owner, data),
            Err(e) => self.fail(&owner, &e),
        }
    }

    fn store(&mut self, owner: Owner, data: Bytes) {
        let thumbnail = Thumbnail::new(owner.uid(), data);
        let waiters = match self.entries.pop(owner.uid()) {
            Some(CacheEntry::Pending { waiters, .. }) => waiters,
            Some(CacheEntry::Image(previous)) => {
                self.size -= previous.size();
                Vec::new()
            }
            None => Vec::new(),
        };

        self.size += thumbnail.size();
        self.entries
            .put(owner.uid().to_string(), CacheEntry::Image(thumbnail.clone()));
        self.evict();

        for waiter in waiters {
            (waiter.callback)(Some(thumbnail.clone()));
        }
    }

    fn fail(&mut self, owner: &Owner, error: &FetchError) {
        if !self.is_pending(owner.uid()) {
            return;
        }
        tracing::warn!("Failed to fetch thumbnail for {owner}: {error}");
        if let Some(CacheEntry::Pending { waiters, .. }) = self.entries.pop(owner.uid()) {
            for waiter in waiters {
                (waiter.callback)(None);
            }
        }
    }

    /// Drop least recently used images until the budget is met.
    fn evict(&mut self) {
        let mut excess = self.size.saturating_sub(self.max_size);
        if excess == 0 {
            return;
        }

        let mut victims = Vec::new();
        for (uid, entry) in self.entries.iter().rev() {
            if excess == 0 {
                break;
            }
            if let CacheEntry::Image(thumbnail) = entry {
                victims.push(uid.clone());
                excess = excess.saturating_sub(thumbnail.size());
            }
        }

        for uid in victims {
            if let Some(CacheEntry::Image(thumbnail)) = self.entries.pop(&uid) {
                tracing::debug!("Evicted thumbnail for {uid} ({} bytes)", thumbnail.size());
                self.size -= thumbnail.size();
            }
        }
    }
}
