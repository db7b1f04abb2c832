//! Message counters
//!
//! A lock-free sink for incoming/outgoing message counts. The crate only
//! emits counts; scraping or exporting them is the hosting layer's business.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters shared by everything that sends or receives messages
#[derive(Debug, Default)]
pub struct MessageCounters {
    incoming: AtomicU64,
    incoming_items: AtomicU64,
    outgoing: AtomicU64,
    acks: AtomicU64,
}

impl MessageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record messages received from the backend
    pub fn add_incoming(&self, count: u64) {
        self.incoming.fetch_add(count, Ordering::Relaxed);
    }

    /// Record individual items carried by incoming messages (a batch counts
    /// its members here and one message above)
    pub fn add_incoming_items(&self, count: u64) {
        self.incoming_items.fetch_add(count, Ordering::Relaxed);
    }

    /// Record messages written to the backend
    pub fn add_outgoing(&self, count: u64) {
        self.outgoing.fetch_add(count, Ordering::Relaxed);
    }

    /// Record completed acknowledged writes
    pub fn add_acks(&self, count: u64) {
        self.acks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn incoming(&self) -> u64 {
        self.incoming.load(Ordering::Relaxed)
    }

    pub fn incoming_items(&self) -> u64 {
        self.incoming_items.load(Ordering::Relaxed)
    }

    pub fn outgoing(&self) -> u64 {
        self.outgoing.load(Ordering::Relaxed)
    }

    pub fn acks(&self) -> u64 {
        self.acks.load(Ordering::Relaxed)
    }
}
