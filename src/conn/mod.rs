//! Transport connection primitives
//!
//! A [`ServiceConnection`] is one logical persistent connection to one backend
//! endpoint. The transport implementation (handshake, wire framing, keepalive)
//! lives outside this crate; the pool only needs status, start/stop, and the
//! two write operations defined here.
//!
//! Connections are created through a [`ServiceConnectionFactory`] supplied by
//! the hosting layer, one factory per broker.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::proto::ServiceMessage;
use crate::router::Endpoint;

/// Lifecycle state of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Handshake in progress
    Connecting,

    /// Established and writable
    Connected,

    /// Dropped or never established
    Disconnected,
}

impl ConnectionStatus {
    /// Get a human-readable state name
    pub fn name(&self) -> &str {
        match self {
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }
}

/// Error types for connection-level operations
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Transient: the connection cannot currently serve a write. The pool
    /// fails over to the next slot instead of surfacing this.
    #[error("connection is not active")]
    NotActive,

    /// The ack wait was canceled before the remote side responded
    #[error("ack wait was canceled")]
    Canceled,

    /// Any other transport failure; surfaced immediately without failover
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

/// One persistent, bidirectional connection to a backend endpoint
#[async_trait]
pub trait ServiceConnection: Send + Sync {
    /// Current lifecycle state
    fn status(&self) -> ConnectionStatus;

    /// Establish the connection. Completion does not imply `Connected`;
    /// callers check `status` afterwards.
    async fn start(&self) -> Result<(), ConnectionError>;

    /// Tear the connection down
    async fn stop(&self) -> Result<(), ConnectionError>;

    /// Send a message; fails with `NotActive` if the connection cannot
    /// currently serve writes
    async fn write(&self, message: &ServiceMessage) -> Result<(), ConnectionError>;

    /// Send a message and wait for the remote acknowledgement. Returns the
    /// acknowledgement outcome, `Canceled` if the token fires first.
    async fn write_ackable(
        &self,
        message: &ServiceMessage,
        cancel: CancellationToken,
    ) -> Result<bool, ConnectionError>;
}

/// Creates startable connections for a given endpoint
///
/// Supplied by the hosting layer; the pool calls it during `start` and every
/// time a slot is replaced after a drop.
pub trait ServiceConnectionFactory: Send + Sync {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn ServiceConnection>;
}
