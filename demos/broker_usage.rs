//! Example demonstrating broker and pool usage with a loopback transport
//!
//! This example shows how to:
//! 1. Configure endpoints and pool sizing
//! 2. Supply a connection factory and a routing policy
//! 3. Send plain and acknowledged messages through the core
//! 4. Inspect pool statistics and message counters

use async_trait::async_trait;
use bytes::Bytes;
use hubpool::config::{Config, EndpointEntry};
use hubpool::conn::{
    ConnectionError, ConnectionStatus, ServiceConnection, ServiceConnectionFactory,
};
use hubpool::proto::ServiceMessage;
use hubpool::router::{Endpoint, EndpointKind, EndpointRouter};
use hubpool::Core;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Transport stand-in: accepts every write and acknowledges every ackable one
struct LoopbackConnection;

#[async_trait]
impl ServiceConnection for LoopbackConnection {
    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::Connected
    }

    async fn start(&self) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn write(&self, message: &ServiceMessage) -> Result<(), ConnectionError> {
        info!(kind = message.kind(), "delivered");
        Ok(())
    }

    async fn write_ackable(
        &self,
        message: &ServiceMessage,
        _cancel: CancellationToken,
    ) -> Result<bool, ConnectionError> {
        info!(kind = message.kind(), "delivered with ack");
        Ok(true)
    }
}

struct LoopbackFactory;

impl ServiceConnectionFactory for LoopbackFactory {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn ServiceConnection> {
        info!(endpoint = %endpoint.name, url = %endpoint.url, "creating connection");
        Arc::new(LoopbackConnection)
    }
}

/// Demo policy: every target goes to every available endpoint
struct FanOutRouter;

impl EndpointRouter for FanOutRouter {
    fn route_broadcast(&self, available: &[Arc<Endpoint>]) -> Vec<Arc<Endpoint>> {
        available.to_vec()
    }

    fn route_group(&self, _group: &str, available: &[Arc<Endpoint>]) -> Vec<Arc<Endpoint>> {
        available.to_vec()
    }

    fn route_connection(
        &self,
        _connection_id: &str,
        available: &[Arc<Endpoint>],
    ) -> Vec<Arc<Endpoint>> {
        available.to_vec()
    }

    fn route_user(&self, _user_id: &str, available: &[Arc<Endpoint>]) -> Vec<Arc<Endpoint>> {
        available.to_vec()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Two endpoints: a primary (strong reconnection policy) and a secondary
    // (weak policy)
    let mut config = Config::new();
    config.endpoints.push(EndpointEntry {
        name: "east".to_string(),
        url: "tcp://east.example.com:5001".to_string(),
        kind: EndpointKind::Primary,
    });
    config.endpoints.push(EndpointEntry {
        name: "west".to_string(),
        url: "tcp://west.example.com:5001".to_string(),
        kind: EndpointKind::Secondary,
    });
    config.pool.connections_per_endpoint = 3;

    let core = Core::new(config, Arc::new(LoopbackFactory), Some(Arc::new(FanOutRouter)))?;
    core.start().await;

    // Plain fan-out writes
    core.write(&ServiceMessage::Broadcast {
        payload: Bytes::from_static(b"hello, everyone"),
    })
    .await?;
    core.write(&ServiceMessage::GroupBroadcast {
        group: "lobby".to_string(),
        payload: Bytes::from_static(b"hello, lobby"),
    })
    .await?;

    // Acknowledged group join, raced across both endpoints
    let acked = core
        .write_ackable(
            &ServiceMessage::JoinGroupWithAck {
                connection_id: "conn-1".to_string(),
                group: "lobby".to_string(),
            },
            CancellationToken::new(),
        )
        .await?;
    info!(acked, "join group result");

    // Inspect the pools and counters
    for endpoint in core.endpoints() {
        if let Some(pool) = core.broker().pool(&endpoint.name) {
            let stats = pool.stats();
            info!(
                endpoint = %endpoint.name,
                policy = pool.policy().name(),
                connected = stats.connected,
                "pool status"
            );
        }
    }
    info!(
        outgoing = core.counters().outgoing(),
        acks = core.counters().acks(),
        "message counters"
    );

    core.stop().await;
    Ok(())
}
