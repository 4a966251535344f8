//! Sequential download queue
//!
//! Owners wait here in arrival order for their turn at the backend. At most one
//! fetch is in flight at any time.

use std::collections::VecDeque;

use super::{Cancel, FetchTicket};
use crate::models::Owner;

/// The fetch currently running against the backend
pub(super) struct InFlight<F> {
    pub owner: Owner,
    pub ticket: FetchTicket,
    pub fetch: F,
}

/// FIFO of owners awaiting a fetch, plus the single in-flight fetch
pub(super) struct DownloadQueue<F> {
    queued: VecDeque<Owner>,
    in_flight: Option<InFlight<F>>,
    /// Re-queue the in-flight owner instead of resolving it
    retry: bool,
    next_ticket: u64,
}

impl<F: Cancel> DownloadQueue<F> {
    pub fn new() -> Self {
        Self {
            queued: VecDeque::new(),
            in_flight: None,
            retry: false,
            next_ticket: 0,
        }
    }

    /// Append an owner at the tail.
    pub fn enqueue(&mut self, owner: Owner) {
        self.queued.push_back(owner);
    }

    /// Put an owner back at the head, ahead of everything queued after it.
    pub fn requeue(&mut self, owner: Owner) {
        self.queued.push_front(owner);
    }

    /// Next owner to fetch, unless a fetch is already running.
    pub fn next(&mut self) -> Option<Owner> {
        if self.in_flight.is_some() {
            return None;
        }
        self.queued.pop_front()
    }

    /// Allocate the ticket for the next fetch.
    pub fn issue_ticket(&mut self) -> FetchTicket {
        let ticket = FetchTicket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    pub fn start(&mut self, owner: Owner, ticket: FetchTicket, fetch: F) {
        debug_assert!(self.in_flight.is_none(), "two fetches in flight");
        self.retry = false;
        self.in_flight = Some(InFlight {
            owner,
            ticket,
            fetch,
        });
    }

    /// Take the in-flight fetch if `ticket` names it.
    pub fn complete(&mut self, ticket: FetchTicket) -> Option<InFlight<F>> {
        if self.in_flight.as_ref()?.ticket != ticket {
            return None;
        }
        self.in_flight.take()
    }

    /// Cancel the in-flight fetch and hand back its owner.
    pub fn abort(&mut self) -> Option<Owner> {
        let InFlight { owner, fetch, .. } = self.in_flight.take()?;
        fetch.cancel();
        Some(owner)
    }

    /// Drop a queued (not yet started) owner. Returns whether it was queued.
    pub fn remove_queued(&mut self, uid: &str) -> bool {
        match self.queued.iter().position(|owner| owner.uid() == uid) {
            Some(index) => {
                self.queued.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn in_flight_uid(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|in_flight| in_flight.owner.uid())
    }

    pub fn mark_retry(&mut self) {
        self.retry = true;
    }

    /// Consume the retry flag.
    pub fn take_retry(&mut self) -> bool {
        std::mem::take(&mut self.retry)
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Cancel the in-flight fetch and forget everything queued.
    pub fn clear(&mut self) {
        self.abort();
        self.queued.clear();
        self.retry = false;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingFetch(Arc<AtomicUsize>);

    impl Cancel for CountingFetch {
        fn cancel(self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_single_flight() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let mut queue = DownloadQueue::new();
        queue.enqueue(Owner::media("a"));
        queue.enqueue(Owner::media("b"));

        let owner = queue.next().unwrap();
        assert_eq!(owner.uid(), "a");
        let ticket = queue.issue_ticket();
        queue.start(owner, ticket, CountingFetch(Arc::clone(&cancels)));

        // b waits for a
        assert!(queue.next().is_none());
        assert_eq!(queue.in_flight_uid(), Some("a"));

        // stale tickets are ignored
        assert!(queue.complete(FetchTicket(ticket.0 + 1)).is_none());
        let done = queue.complete(ticket).unwrap();
        assert_eq!(done.owner.uid(), "a");
        assert_eq!(queue.next().unwrap().uid(), "b");
        assert_eq!(cancels.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_abort_and_requeue() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let mut queue = DownloadQueue::new();
        queue.enqueue(Owner::media("a"));
        queue.enqueue(Owner::media("b"));

        let owner = queue.next().unwrap();
        let ticket = queue.issue_ticket();
        queue.start(owner, ticket, CountingFetch(Arc::clone(&cancels)));
        queue.mark_retry();

        let owner = queue.abort().unwrap();
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert!(queue.take_retry());
        assert!(!queue.take_retry());

        queue.requeue(owner);
        assert_eq!(queue.next().unwrap().uid(), "a");
    }

    #[test]
    fn test_remove_queued() {
        let mut queue: DownloadQueue<CountingFetch> = DownloadQueue::new();
        queue.enqueue(Owner::media("a"));
        queue.enqueue(Owner::media("b"));
        assert!(queue.remove_queued("a"));
        assert!(!queue.remove_queued("a"));
        assert_eq!(queue.queued_len(), 1);
        assert_eq!(queue.next().unwrap().uid(), "b");
    }
}
