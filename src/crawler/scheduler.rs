//! Scheduler for the fetch frontier and the concurrency ceiling
//!
//! This module handles:
//! - Priority queue management for pending fetch requests
//! - Global concurrency limiting via a semaphore
//!
//! Detail pages are drained before listing pages, and listing pages before
//! index pages, so the frontier stays shallow while the tree is still being
//! walked. Requests of equal priority leave in the order they were added.

use crate::crawler::fetcher::{FetchRequest, RequestKind};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Priority of a request kind (lower is fetched first)
pub fn priority_of(kind: RequestKind) -> u32 {
    match kind {
        RequestKind::Detail => 0,
        RequestKind::Listing => 1,
        RequestKind::Index(_) => 2,
    }
}

/// A request queued for fetching with priority information
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub request: FetchRequest,

    /// Priority value (lower is higher priority)
    pub priority: u32,

    /// Insertion sequence, for FIFO order within a priority
    pub sequence: u64,
}

// Lower priority values, then lower sequence numbers, are popped first
impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedRequest {}

/// A scheduled fetch holding one of the concurrency permits
///
/// The permit is released when the fetch is dropped.
pub struct ScheduledFetch {
    pub request: FetchRequest,

    pub _permit: OwnedSemaphorePermit,
}

/// Frontier queue bounded by a global concurrency ceiling
pub struct Scheduler {
    /// Global semaphore for limiting concurrent fetches
    semaphore: Arc<Semaphore>,

    /// Frontier priority queue
    frontier: BinaryHeap<QueuedRequest>,

    next_sequence: u64,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `max_concurrent_fetches` - Ceiling on simultaneously in-flight fetches
    pub fn new(max_concurrent_fetches: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_fetches.max(1) as usize)),
            frontier: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Adds a request to the frontier
    pub fn add(&mut self, request: FetchRequest) {
        let priority = priority_of(request.meta.kind);
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.frontier.push(QueuedRequest {
            request,
            priority,
            sequence,
        });
    }

    /// Adds every request, preserving their order within a priority
    pub fn extend(&mut self, requests: impl IntoIterator<Item = FetchRequest>) {
        for request in requests {
            self.add(request);
        }
    }

    /// Takes the next request if a concurrency permit is free
    ///
    /// # Returns
    ///
    /// * `Some(ScheduledFetch)` - A request that may be dispatched now
    /// * `None` - The frontier is empty or every permit is in use
    pub fn try_next(&mut self) -> Option<ScheduledFetch> {
        if self.frontier.is_empty() {
            return None;
        }

        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        let queued = self.frontier.pop()?;

        tracing::trace!("Scheduling {} (priority {})", queued.request.url, queued.priority);
        Some(ScheduledFetch {
            request: queued.request,
            _permit: permit,
        })
    }

    /// Returns the number of requests in the frontier
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Number of permits currently free
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
