//! Fake transport shared by the integration tests
//!
//! `FakeConnection` is a controllable stand-in for a real transport
//! connection: its post-start status, write behavior, and ack verdict are
//! fixed per instance, and every probe/write is counted.

#![allow(dead_code)]

use async_trait::async_trait;
use hubpool::conn::{
    ConnectionError, ConnectionStatus, ServiceConnection, ServiceConnectionFactory,
};
use hubpool::proto::ServiceMessage;
use hubpool::router::Endpoint;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// How a fake connection answers ackable writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckBehavior {
    /// Positive acknowledgement
    Ack,
    /// Negative acknowledgement
    Nack,
    /// Transport error instead of a verdict
    Fail,
    /// Never resolves until the cancellation token fires
    Hang,
}

pub struct FakeConnection {
    status: Mutex<ConnectionStatus>,
    status_after_start: ConnectionStatus,
    start_fails: bool,
    write_fails_not_active: bool,
    write_fails_transport: bool,
    ack: AckBehavior,
    writes: AtomicUsize,
    status_checks: AtomicUsize,
}

impl FakeConnection {
    fn build(status_after_start: ConnectionStatus) -> Self {
        Self {
            status: Mutex::new(ConnectionStatus::Disconnected),
            status_after_start,
            start_fails: false,
            write_fails_not_active: false,
            write_fails_transport: false,
            ack: AckBehavior::Ack,
            writes: AtomicUsize::new(0),
            status_checks: AtomicUsize::new(0),
        }
    }

    /// Reaches Connected after start; writes succeed
    pub fn connected() -> Arc<Self> {
        Arc::new(Self::build(ConnectionStatus::Connected))
    }

    /// Stays Disconnected after start
    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self::build(ConnectionStatus::Disconnected))
    }

    /// Reports Connected but every write fails with NotActive
    pub fn not_active() -> Arc<Self> {
        let mut conn = Self::build(ConnectionStatus::Connected);
        conn.write_fails_not_active = true;
        Arc::new(conn)
    }

    /// Reports Connected but every write fails with a transport error
    pub fn transport_failing() -> Arc<Self> {
        let mut conn = Self::build(ConnectionStatus::Connected);
        conn.write_fails_transport = true;
        Arc::new(conn)
    }

    /// Connected, with a fixed ackable-write behavior
    pub fn acking(behavior: AckBehavior) -> Arc<Self> {
        let mut conn = Self::build(ConnectionStatus::Connected);
        conn.ack = behavior;
        Arc::new(conn)
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn status_check_count(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceConnection for FakeConnection {
    fn status(&self) -> ConnectionStatus {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        *self.status.lock().unwrap()
    }

    async fn start(&self) -> Result<(), ConnectionError> {
        if self.start_fails {
            return Err(ConnectionError::Transport(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        *self.status.lock().unwrap() = self.status_after_start;
        Ok(())
    }

    async fn stop(&self) -> Result<(), ConnectionError> {
        *self.status.lock().unwrap() = ConnectionStatus::Disconnected;
        Ok(())
    }

    async fn write(&self, _message: &ServiceMessage) -> Result<(), ConnectionError> {
        if self.write_fails_not_active {
            return Err(ConnectionError::NotActive);
        }
        if self.write_fails_transport {
            return Err(ConnectionError::Transport(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer reset",
            )));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write_ackable(
        &self,
        _message: &ServiceMessage,
        cancel: CancellationToken,
    ) -> Result<bool, ConnectionError> {
        match self.ack {
            AckBehavior::Ack => Ok(true),
            AckBehavior::Nack => Ok(false),
            AckBehavior::Fail => Err(ConnectionError::Transport(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "ack channel failed",
            ))),
            AckBehavior::Hang => {
                cancel.cancelled().await;
                Err(ConnectionError::Canceled)
            }
        }
    }
}

/// Hands out preset connections in creation order, then defaults to
/// [`FakeConnection::connected`]; keeps every created connection for
/// inspection
pub struct SequenceFactory {
    preset: Mutex<VecDeque<Arc<FakeConnection>>>,
    created: Mutex<Vec<Arc<FakeConnection>>>,
    created_dyn: Mutex<Vec<Arc<dyn ServiceConnection>>>,
}

impl SequenceFactory {
    pub fn new(preset: Vec<Arc<FakeConnection>>) -> Arc<Self> {
        Arc::new(Self {
            preset: Mutex::new(preset.into()),
            created: Mutex::new(Vec::new()),
            created_dyn: Mutex::new(Vec::new()),
        })
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// The n-th created connection, for behavior inspection
    pub fn connection(&self, index: usize) -> Arc<FakeConnection> {
        Arc::clone(&self.created.lock().unwrap()[index])
    }

    /// The n-th created connection as the trait object the pool tracks
    pub fn dyn_connection(&self, index: usize) -> Arc<dyn ServiceConnection> {
        Arc::clone(&self.created_dyn.lock().unwrap()[index])
    }

    pub fn total_writes(&self) -> usize {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|conn| conn.write_count())
            .sum()
    }

    pub fn total_status_checks(&self) -> usize {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|conn| conn.status_check_count())
            .sum()
    }
}

impl ServiceConnectionFactory for SequenceFactory {
    fn create(&self, _endpoint: &Endpoint) -> Arc<dyn ServiceConnection> {
        let connection = self
            .preset
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(FakeConnection::connected);
        self.created.lock().unwrap().push(Arc::clone(&connection));
        let as_dyn: Arc<dyn ServiceConnection> = connection;
        self.created_dyn.lock().unwrap().push(Arc::clone(&as_dyn));
        as_dyn
    }
}

/// Per-endpoint variant of [`SequenceFactory`] for broker tests
pub struct EndpointFactory {
    preset: Mutex<HashMap<String, VecDeque<Arc<FakeConnection>>>>,
    created: Mutex<HashMap<String, Vec<Arc<FakeConnection>>>>,
}

impl EndpointFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            preset: Mutex::new(HashMap::new()),
            created: Mutex::new(HashMap::new()),
        })
    }

    /// Queue connections to hand out for one endpoint
    pub fn preset(&self, endpoint_name: &str, connections: Vec<Arc<FakeConnection>>) {
        self.preset
            .lock()
            .unwrap()
            .insert(endpoint_name.to_string(), connections.into());
    }

    pub fn created_for(&self, endpoint_name: &str) -> Vec<Arc<FakeConnection>> {
        self.created
            .lock()
            .unwrap()
            .get(endpoint_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Writes delivered to one endpoint, across all of its connections
    pub fn writes_for(&self, endpoint_name: &str) -> usize {
        self.created_for(endpoint_name)
            .iter()
            .map(|conn| conn.write_count())
            .sum()
    }
}

impl ServiceConnectionFactory for EndpointFactory {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn ServiceConnection> {
        let connection = self
            .preset
            .lock()
            .unwrap()
            .get_mut(&endpoint.name)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(FakeConnection::connected);
        self.created
            .lock()
            .unwrap()
            .entry(endpoint.name.clone())
            .or_default()
            .push(Arc::clone(&connection));
        connection
    }
}
