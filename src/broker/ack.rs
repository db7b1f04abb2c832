//! First-success completion cell for acknowledged fan-out writes

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// One-shot success signal shared by every endpoint selected for a single
/// ackable write
///
/// The first positive acknowledgement claims the cell with a compare-and-set;
/// later results are ignored. The ledger lives only for the duration of one
/// write call.
#[derive(Debug, Default)]
pub(crate) struct AckLedger {
    acked: AtomicBool,
    notify: Notify,
}

impl AckLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a positive acknowledgement; returns true only for the claiming
    /// caller
    pub(crate) fn try_complete(&self) -> bool {
        if self
            .acked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.notify.notify_waiters();
            true
        } else {
            false
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.acked.load(Ordering::Acquire)
    }

    /// Resolve once some endpoint has acknowledged positively
    pub(crate) async fn acknowledged(&self) {
        let mut notified = std::pin::pin!(self.notify.notified());
        // Register before checking the flag so a claim between the check and
        // the await cannot be missed.
        notified.as_mut().enable();
        if self.is_complete() {
            return;
        }
        notified.await;
    }
}
