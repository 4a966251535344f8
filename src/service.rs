//! Async front-end for the thumbnail cache.
//!
//! The cache state lives in a single background task. Callers talk to it
//! through a cloneable [`ThumbnailService`] handle; fetches run as separate
//! tasks and report back to the cache task over a channel, so every cache
//! mutation happens on that one task.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

use crate::cache::{
    CacheStats, Cancel, FetchTicket, RequestHandle, ThumbnailBackend, ThumbnailCache,
};
use crate::models::{Owner, Thumbnail};
use crate::source::{FetchError, ThumbnailSource};

/// Message for the cache task
#[derive(Debug)]
enum Command {
    /// Request a thumbnail
    Get {
        id: u64,
        owner: Owner,
        reply: oneshot::Sender<Option<Thumbnail>>,
    },
    /// A request handle went away
    Release { id: u64 },
    /// Invalidate an owner uid or media namespace
    Invalidate { uid: String },
    /// Drop all cached and pending thumbnails
    Clear,
    /// Report cache statistics
    Stats { reply: oneshot::Sender<CacheStats> },
    /// Stop the cache task
    Shutdown,
}

/// Result of a fetch task
#[derive(Debug)]
struct Fetched {
    ticket: FetchTicket,
    result: Result<Bytes, FetchError>,
}

/// Runs each fetch as its own task against a source owned by the session.
struct TaskBackend<S> {
    source: Weak<S>,
    fetched: mpsc::UnboundedSender<Fetched>,
}

struct TaskFetch(AbortHandle);

impl Cancel for TaskFetch {
    fn cancel(self) {
        self.0.abort();
    }
}

impl<S: ThumbnailSource> ThumbnailBackend for TaskBackend<S> {
    type Fetch = TaskFetch;

    fn fetch(&self, owner: &Owner, ticket: FetchTicket) -> Result<TaskFetch, FetchError> {
        let source = self
            .source
            .upgrade()
            .ok_or_else(|| FetchError::Unavailable("device session closed".to_string()))?;
        let fetched = self.fetched.clone();
        let owner = owner.clone();

        let task = tokio::spawn(async move {
            let result = source.fetch(&owner).await;
            let _ = fetched.send(Fetched { ticket, result });
        });

        Ok(TaskFetch(task.abort_handle()))
    }
}

/// Handle to a background thumbnail cache.
///
/// Cloning is cheap; all clones share the same cache. The cache task stops
/// when every handle is dropped or [`ThumbnailService::shutdown`] is called.
#[derive(Debug, Clone)]
pub struct ThumbnailService {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
}

impl ThumbnailService {
    /// Spawn the cache task, holding at most `max_size` bytes of thumbnails.
    ///
    /// Only a weak reference to `source` is kept: the device session owns it,
    /// and fetches fail once it is gone.
    pub fn spawn<S: ThumbnailSource>(source: &Arc<S>, max_size: usize) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (fetched_tx, fetched_rx) = mpsc::unbounded_channel();

        let backend = TaskBackend {
            source: Arc::downgrade(source),
            fetched: fetched_tx,
        };
        let cache = ThumbnailCache::new(backend, max_size);

        tokio::spawn(cache_task(commands_rx, fetched_rx, cache));

        Self {
            commands: commands_tx,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Request the thumbnail of `owner`.
    ///
    /// Await the returned request for the thumbnail; `None` means it could not
    /// be fetched or the cache was cleared meanwhile. Dropping the request
    /// cancels it.
    pub fn get(&self, owner: Owner) -> ThumbnailRequest {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();
        let _ = self.commands.send(Command::Get { id, owner, reply });

        ThumbnailRequest {
            id,
            receiver,
            commands: self.commands.clone(),
        }
    }

    /// Invalidate an owner uid, or every owner under a media uid.
    pub fn invalidate(&self, uid_or_prefix: &str) {
        let _ = self.commands.send(Command::Invalidate {
            uid: uid_or_prefix.to_string(),
        });
    }

    /// Drop all cached thumbnails and pending downloads.
    pub fn clear(&self) {
        let _ = self.commands.send(Command::Clear);
    }

    /// Current cache statistics, or `None` once the cache task has stopped.
    pub async fn stats(&self) -> Option<CacheStats> {
        let (reply, receiver) = oneshot::channel();
        self.commands.send(Command::Stats { reply }).ok()?;
        receiver.await.ok()
    }

    /// Stop the cache task. Pending requests resolve to `None`.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// A pending thumbnail request, see [`ThumbnailService::get`].
#[must_use = "dropping a request cancels it"]
#[derive(Debug)]
pub struct ThumbnailRequest {
    id: u64,
    receiver: oneshot::Receiver<Option<Thumbnail>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl ThumbnailRequest {
    /// Cancel the request.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Future for ThumbnailRequest {
    type Output = Option<Thumbnail>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.ok().flatten())
    }
}

impl Drop for ThumbnailRequest {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Release { id: self.id });
    }
}

/// Background task owning the cache.
async fn cache_task<S: ThumbnailSource>(
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut fetched: mpsc::UnboundedReceiver<Fetched>,
    mut cache: ThumbnailCache<TaskBackend<S>>,
) {
    // Requests still waiting for their thumbnail, by service request id
    let mut waiting: HashMap<u64, RequestHandle> = HashMap::new();

    loop {
        tokio::select! {
            Some(Fetched { ticket, result }) = fetched.recv() => {
                cache.fetch_completed(ticket, result);
            }
            command = commands.recv() => match command {
                Some(Command::Get { id, owner, reply }) => {
                    let handle = cache.get_thumbnail(owner, move |thumbnail| {
                        let _ = reply.send(thumbnail);
                    });
                    if handle.is_pending() {
                        waiting.insert(id, handle);
                    }
                }
                Some(Command::Release { id }) => {
                    if let Some(handle) = waiting.remove(&id) {
                        cache.cancel(&handle);
                    }
                }
                Some(Command::Invalidate { uid }) => cache.invalidate(&uid),
                Some(Command::Clear) => {
                    cache.clear();
                    waiting.clear();
                }
                Some(Command::Stats { reply }) => {
                    let _ = reply.send(cache.stats());
                }
                Some(Command::Shutdown) | None => break,
            },
        }
    }

    tracing::debug!("Thumbnail cache shutting down");
    cache.clear();
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::{Notify, Semaphore};
    use tokio_test::{assert_pending, task};

    use super::*;

    /// Source whose fetches wait for the test to let them through.
    struct GatedSource {
        calls: AtomicUsize,
        started: Notify,
        gate: Semaphore,
    }

    impl GatedSource {
        fn new(permits: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                started: Notify::new(),
                gate: Semaphore::new(permits),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ThumbnailSource for GatedSource {
        async fn fetch(&self, owner: &Owner) -> Result<Bytes, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            permit.forget();
            if owner.uid().starts_with("missing") {
                return Err(FetchError::NotFound(owner.uid().to_string()));
            }
            Ok(Bytes::from(format!("{}#{call}", owner.uid())))
        }
    }

    #[tokio::test]
    async fn test_requests_are_coalesced() {
        let source = GatedSource::new(0);
        let service = ThumbnailService::spawn(&source, 1024);

        let first = service.get(Owner::media("m1"));
        let second = service.get(Owner::media("m1"));
        source.gate.add_permits(1);

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first, second);
        assert_eq!(first.unwrap().data, Bytes::from_static(b"m1#0"));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_thumbnail_is_not_fetched_again() {
        let source = GatedSource::new(10);
        let service = ThumbnailService::spawn(&source, 1024);

        assert!(service.get(Owner::media("m1")).await.is_some());
        assert!(service.get(Owner::media("m1")).await.is_some());
        assert_eq!(source.calls(), 1);

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.images, 1);
        assert_eq!(stats.size, "m1#0".len());
    }

    #[tokio::test]
    async fn test_request_waits_for_fetch() {
        let source = GatedSource::new(0);
        let service = ThumbnailService::spawn(&source, 1024);

        let mut request = task::spawn(service.get(Owner::resource("m1", "r1")));
        assert_pending!(request.poll());

        source.gate.add_permits(1);
        let thumbnail = request.into_inner().await.unwrap();
        assert_eq!(thumbnail.owner_uid, "m1/r1");
    }

    #[tokio::test]
    async fn test_dropping_last_request_cancels_download() {
        let source = GatedSource::new(0);
        let service = ThumbnailService::spawn(&source, 1024);

        let request = service.get(Owner::media("m1"));
        source.started.notified().await;
        request.cancel();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.in_flight, None);
    }

    #[tokio::test]
    async fn test_invalidate_in_flight_delivers_fresh_result() {
        let source = GatedSource::new(0);
        let service = ThumbnailService::spawn(&source, 1024);

        let request = service.get(Owner::media("m1"));
        source.started.notified().await;
        service.invalidate("m1");
        source.started.notified().await;
        source.gate.add_permits(10);

        let thumbnail = request.await.unwrap();
        assert_eq!(thumbnail.data, Bytes::from_static(b"m1#1"));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_resolves_to_none() {
        let source = GatedSource::new(10);
        let service = ThumbnailService::spawn(&source, 1024);

        assert!(service.get(Owner::media("missing")).await.is_none());
        assert!(service.get(Owner::media("m1")).await.is_some());
    }

    #[tokio::test]
    async fn test_clear_abandons_pending_requests() {
        let source = GatedSource::new(0);
        let service = ThumbnailService::spawn(&source, 1024);

        let request = service.get(Owner::media("m1"));
        service.clear();

        assert!(request.await.is_none());
        assert_eq!(service.stats().await.unwrap().pending, 0);
    }

    #[tokio::test]
    async fn test_closed_session_fails_fetches() {
        let source = GatedSource::new(10);
        let service = ThumbnailService::spawn(&source, 1024);
        drop(source);

        assert!(service.get(Owner::media("m1")).await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_stops_cache() {
        let source = GatedSource::new(0);
        let service = ThumbnailService::spawn(&source, 1024);

        let request = service.get(Owner::media("m1"));
        service.shutdown();

        assert!(request.await.is_none());
        assert!(service.stats().await.is_none());
    }
}
