//! Fixed-size connection pool with failover scanning and backoff reconnection
//!
//! A [`ConnectionPool`] owns an indexed, fixed-length array of connection
//! slots to a single endpoint. Writes pick a pseudo-random starting slot and
//! scan the whole array, failing over past inactive connections; a dropped
//! slot is replaced in place after an exponential backoff delay. The pool
//! never grows or shrinks — only a slot's occupant changes.

use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::RetryBackoff;
use crate::conn::{ConnectionError, ConnectionStatus, ServiceConnection, ServiceConnectionFactory};
use crate::proto::ServiceMessage;
use crate::router::Endpoint;

/// Error types for pool operations
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// No connected slot (or routed endpoint) could serve the write after
    /// exhausting all candidates
    #[error("no connected slot is available to serve the write")]
    NotConnected,

    /// Caller bug: empty partition key, zero connection count, out-of-range
    /// slot index
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// On-demand connections were requested from a weak pool
    #[error("on-demand connections are not supported by this pool")]
    OnDemandUnsupported,

    /// A connection-level failure that is not absorbed by slot failover
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Reconnection policy for a pool
///
/// Strong pools (primary endpoints) may mint on-demand connections beyond the
/// fixed slot set; weak pools (secondary endpoints) refuse on-demand creation
/// and only ever replace slot occupants in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    Strong,
    Weak,
}

impl ReconnectPolicy {
    /// Whether this policy allows connections outside the fixed slot array
    pub fn can_create_on_demand(&self) -> bool {
        matches!(self, ReconnectPolicy::Strong)
    }

    /// Get a human-readable policy name
    pub fn name(&self) -> &str {
        match self {
            ReconnectPolicy::Strong => "strong",
            ReconnectPolicy::Weak => "weak",
        }
    }
}

/// Snapshot of a pool's slot states
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Slots holding a Connected connection
    pub connected: usize,

    /// Slots holding a Connecting connection
    pub connecting: usize,

    /// Slots holding a Disconnected connection, or not yet started
    pub disconnected: usize,

    /// Live on-demand connections tracked outside the slot array
    pub on_demand: usize,
}

/// One slot of the fixed array: the current occupant plus a guard ensuring at
/// most one reconnect task runs for this slot at a time
struct Slot {
    connection: RwLock<Option<Arc<dyn ServiceConnection>>>,
    reconnecting: AtomicBool,
}

impl Slot {
    fn empty() -> Self {
        Self {
            connection: RwLock::new(None),
            reconnecting: AtomicBool::new(false),
        }
    }
}

struct PoolInner {
    endpoint: Arc<Endpoint>,
    factory: Arc<dyn ServiceConnectionFactory>,
    policy: ReconnectPolicy,
    slots: Box<[Slot]>,
    on_demand: Mutex<Vec<Arc<dyn ServiceConnection>>>,
    backoff: RetryBackoff,
}

/// Fixed-size pool of persistent connections to one endpoint
///
/// Clones share the same slot array and reconnect state.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a pool with `count` slots; connections are not created until
    /// [`ConnectionPool::start`]
    pub fn new(
        endpoint: Arc<Endpoint>,
        factory: Arc<dyn ServiceConnectionFactory>,
        count: usize,
        policy: ReconnectPolicy,
    ) -> Result<Self, PoolError> {
        if count == 0 {
            return Err(PoolError::InvalidArgument(
                "connection count must be greater than zero",
            ));
        }

        let slots: Box<[Slot]> = (0..count).map(|_| Slot::empty()).collect();

        Ok(Self {
            inner: Arc::new(PoolInner {
                endpoint,
                factory,
                policy,
                slots,
                on_demand: Mutex::new(Vec::new()),
                backoff: RetryBackoff::new(),
            }),
        })
    }

    /// The endpoint this pool serves
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.inner.endpoint
    }

    /// Configured slot count
    pub fn count(&self) -> usize {
        self.inner.slots.len()
    }

    /// This pool's reconnection policy
    pub fn policy(&self) -> ReconnectPolicy {
        self.inner.policy
    }

    /// Create one connection per slot and start them all concurrently
    ///
    /// Completes once every start attempt has been issued. A failed start is
    /// logged and handed to the backoff reconnect machinery; it does not fail
    /// this call.
    pub async fn start(&self) {
        let mut handles = Vec::with_capacity(self.inner.slots.len());
        for index in 0..self.inner.slots.len() {
            let connection = self.inner.factory.create(&self.inner.endpoint);
            self.inner.store_slot(index, Arc::clone(&connection));

            let inner = Arc::clone(&self.inner);
            handles.push(tokio::spawn(async move {
                if let Err(error) = connection.start().await {
                    warn!(
                        endpoint = %inner.endpoint.name,
                        slot = index,
                        error = %error,
                        "connection start failed"
                    );
                    PoolInner::spawn_reconnect(&inner, index);
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Stop every tracked connection, best-effort
    pub async fn stop(&self) {
        let mut connections: Vec<Arc<dyn ServiceConnection>> = Vec::new();
        for index in 0..self.inner.slots.len() {
            if let Some(connection) = self.inner.slot_connection(index) {
                connections.push(connection);
            }
        }
        if let Ok(mut on_demand) = self.inner.on_demand.lock() {
            connections.append(&mut on_demand);
        }

        let mut handles = Vec::with_capacity(connections.len());
        for connection in connections {
            handles.push(tokio::spawn(async move {
                if let Err(error) = connection.stop().await {
                    debug!(error = %error, "connection stop failed");
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Write to a pseudo-randomly chosen slot, failing over across the pool
    pub async fn write(&self, message: &ServiceMessage) -> Result<(), PoolError> {
        let count = self.inner.slots.len() as i64;
        let initial = rand::thread_rng().gen_range(-count..count);
        self.inner.write_with_retry(message, initial).await
    }

    /// Write with a sticky starting slot derived from `partition_key`
    ///
    /// The same key always starts its scan from the same slot, so writes for
    /// one key keep landing on one connection while it stays up.
    pub async fn write_partitioned(
        &self,
        partition_key: &str,
        message: &ServiceMessage,
    ) -> Result<(), PoolError> {
        if partition_key.is_empty() {
            return Err(PoolError::InvalidArgument("partition key must not be empty"));
        }

        let mut hasher = DefaultHasher::new();
        partition_key.hash(&mut hasher);
        let initial = (hasher.finish() & i64::MAX as u64) as i64;
        self.inner.write_with_retry(message, initial).await
    }

    /// Write to a single slot and wait for the remote acknowledgement
    ///
    /// Slot selection and failover follow [`ConnectionPool::write`]; the
    /// returned boolean is the remote side's verdict, not local transport
    /// success.
    pub async fn write_ackable(
        &self,
        message: &ServiceMessage,
        cancel: CancellationToken,
    ) -> Result<bool, PoolError> {
        let count = self.inner.slots.len() as i64;
        let initial = rand::thread_rng().gen_range(-count..count);

        for index in scan_order(self.inner.slots.len(), initial) {
            if let Some(connection) = self.inner.slot_connection(index) {
                if connection.status() == ConnectionStatus::Connected {
                    match connection.write_ackable(message, cancel.clone()).await {
                        Ok(acked) => return Ok(acked),
                        Err(ConnectionError::NotActive) => {}
                        Err(error) => return Err(error.into()),
                    }
                }
            }
        }

        Err(PoolError::NotConnected)
    }

    /// Mint connections outside the fixed slot array (strong pools only)
    ///
    /// The connections are tracked for disposal but not started; the caller
    /// starts them.
    pub fn create_on_demand(
        &self,
        count: usize,
    ) -> Result<Vec<Arc<dyn ServiceConnection>>, PoolError> {
        if !self.inner.policy.can_create_on_demand() {
            return Err(PoolError::OnDemandUnsupported);
        }
        if count == 0 {
            return Err(PoolError::InvalidArgument(
                "connection count must be greater than zero",
            ));
        }

        let connections: Vec<Arc<dyn ServiceConnection>> = (0..count)
            .map(|_| self.inner.factory.create(&self.inner.endpoint))
            .collect();

        if let Ok(mut on_demand) = self.inner.on_demand.lock() {
            on_demand.extend(connections.iter().cloned());
        }

        Ok(connections)
    }

    /// Handle a connection reported dropped by the transport
    ///
    /// An on-demand connection is discarded. A slot occupant gets a scheduled
    /// backoff reconnect of its slot. An untracked connection is a no-op.
    pub fn dispose_connection(&self, connection: &Arc<dyn ServiceConnection>) {
        if self.inner.policy.can_create_on_demand() {
            if let Ok(mut on_demand) = self.inner.on_demand.lock() {
                if let Some(position) = on_demand
                    .iter()
                    .position(|tracked| Arc::ptr_eq(tracked, connection))
                {
                    on_demand.remove(position);
                    debug!(
                        endpoint = %self.inner.endpoint.name,
                        "on-demand connection discarded"
                    );
                    return;
                }
            }
        }

        if let Some(index) = self.inner.slot_index_of(connection) {
            PoolInner::spawn_reconnect(&self.inner, index);
        }
    }

    /// Schedule a backoff reconnect of one slot
    pub fn schedule_reconnect(&self, index: usize) -> Result<(), PoolError> {
        if index >= self.inner.slots.len() {
            return Err(PoolError::InvalidArgument("slot index out of range"));
        }
        PoolInner::spawn_reconnect(&self.inner, index);
        Ok(())
    }

    /// Slots currently holding a Connected connection
    pub fn connected_count(&self) -> usize {
        self.stats().connected
    }

    /// Snapshot the slot states
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats::default();
        for index in 0..self.inner.slots.len() {
            match self.inner.slot_connection(index).map(|c| c.status()) {
                Some(ConnectionStatus::Connected) => stats.connected += 1,
                Some(ConnectionStatus::Connecting) => stats.connecting += 1,
                Some(ConnectionStatus::Disconnected) | None => stats.disconnected += 1,
            }
        }
        stats.on_demand = self
            .inner
            .on_demand
            .lock()
            .map(|on_demand| on_demand.len())
            .unwrap_or(0);
        stats
    }
}

impl PoolInner {
    fn slot_connection(&self, index: usize) -> Option<Arc<dyn ServiceConnection>> {
        self.slots[index]
            .connection
            .read()
            .ok()
            .and_then(|slot| slot.clone())
    }

    fn store_slot(&self, index: usize, connection: Arc<dyn ServiceConnection>) {
        if let Ok(mut slot) = self.slots[index].connection.write() {
            *slot = Some(connection);
        }
    }

    fn slot_index_of(&self, connection: &Arc<dyn ServiceConnection>) -> Option<usize> {
        self.slots.iter().position(|slot| {
            slot.connection
                .read()
                .ok()
                .map(|occupant| {
                    occupant
                        .as_ref()
                        .map(|tracked| Arc::ptr_eq(tracked, connection))
                        .unwrap_or(false)
                })
                .unwrap_or(false)
        })
    }

    async fn write_with_retry(
        &self,
        message: &ServiceMessage,
        initial: i64,
    ) -> Result<(), PoolError> {
        // Scan the whole pool so a write survives individual backend
        // instances being down.
        for index in scan_order(self.slots.len(), initial) {
            if let Some(connection) = self.slot_connection(index) {
                if connection.status() == ConnectionStatus::Connected {
                    match connection.write(message).await {
                        Ok(()) => return Ok(()),
                        Err(ConnectionError::NotActive) => {}
                        Err(error) => return Err(error.into()),
                    }
                }
            }
        }

        Err(PoolError::NotConnected)
    }

    /// Spawn a reconnect task for `index` unless one is already in flight
    fn spawn_reconnect(inner: &Arc<PoolInner>, index: usize) {
        let slot = &inner.slots[index];
        if slot
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            inner.reconnect_slot(index).await;
            inner.slots[index].reconnecting.store(false, Ordering::Release);
        });
    }

    async fn reconnect_slot(&self, index: usize) {
        loop {
            let delay = self.backoff.current_delay();
            debug!(
                endpoint = %self.endpoint.name,
                slot = index,
                delay_ms = delay.as_millis() as u64,
                attempts = self.backoff.attempts(),
                "reconnect scheduled"
            );
            tokio::time::sleep(delay).await;
            // Advance the counter after the delay, not before: slots that
            // dropped together share the first delay window, and only
            // sustained failure escalates the backoff.
            self.backoff.record_attempt();

            let connection = self.factory.create(&self.endpoint);
            self.store_slot(index, Arc::clone(&connection));

            match connection.start().await {
                Ok(()) => {
                    if connection.status() == ConnectionStatus::Connected {
                        self.backoff.reset();
                        info!(
                            endpoint = %self.endpoint.name,
                            slot = index,
                            "slot reconnected"
                        );
                    }
                    return;
                }
                Err(error) => {
                    warn!(
                        endpoint = %self.endpoint.name,
                        slot = index,
                        error = %error,
                        "reconnect attempt failed"
                    );
                }
            }
        }
    }
}

/// Slot probe order for a starting offset in `[-count, count)`
///
/// The sign of `initial` picks the direction: non-negative offsets scan
/// ascending, negative ones descending. Either way every slot is visited
/// exactly once.
fn scan_order(count: usize, initial: i64) -> impl Iterator<Item = usize> {
    let start = ((initial & i64::MAX) % count as i64) as usize;
    let step = if initial >= 0 { 1 } else { count - 1 };
    (0..count).map(move |probe| (start + probe * step) % count)
}
