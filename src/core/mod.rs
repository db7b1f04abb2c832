use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::broker::MultiEndpointBroker;
use crate::config::Config;
use crate::conn::ServiceConnectionFactory;
use crate::metrics::MessageCounters;
use crate::pool::PoolError;
use crate::proto::ServiceMessage;
use crate::router::{Endpoint, EndpointRouter};

/// Core assembly shared by the hosting layer
///
/// Builds one pool per configured endpoint behind a broker and wires the
/// message counters. Clones share the same broker and counters.
#[derive(Clone)]
pub struct Core {
    pub config: Arc<Config>,
    broker: Arc<MultiEndpointBroker>,
    counters: Arc<MessageCounters>,
}

impl Core {
    /// Validate the configuration and build the broker stack
    ///
    /// A router is mandatory when more than one endpoint is configured;
    /// omitting it is a startup-time configuration error.
    pub fn new(
        config: Config,
        factory: Arc<dyn ServiceConnectionFactory>,
        router: Option<Arc<dyn EndpointRouter>>,
    ) -> Result<Self> {
        config.validate()?;

        if config.endpoints.len() > 1 && router.is_none() {
            anyhow::bail!(
                "a message router must be supplied when more than one endpoint is configured"
            );
        }

        let endpoints: Vec<Arc<Endpoint>> = config
            .endpoints
            .iter()
            .map(|entry| {
                Arc::new(Endpoint::new(
                    entry.name.clone(),
                    entry.url.clone(),
                    entry.kind,
                ))
            })
            .collect();

        let broker = MultiEndpointBroker::from_factory(
            factory,
            config.pool.connections_per_endpoint,
            endpoints,
            router,
        )
        .context("failed to build the endpoint broker")?;

        Ok(Self {
            config: Arc::new(config),
            broker: Arc::new(broker),
            counters: Arc::new(MessageCounters::new()),
        })
    }

    /// The broker routing outbound messages
    pub fn broker(&self) -> &Arc<MultiEndpointBroker> {
        &self.broker
    }

    /// Shared message counters
    pub fn counters(&self) -> &Arc<MessageCounters> {
        &self.counters
    }

    /// All configured endpoints (for liveness toggling by the hosting layer)
    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.broker.endpoints()
    }

    /// Start every endpoint's pool
    pub async fn start(&self) {
        self.broker.start().await;
    }

    /// Stop every endpoint's pool, best-effort
    pub async fn stop(&self) {
        self.broker.stop().await;
    }

    /// Route and send one message, counting it on success
    pub async fn write(&self, message: &ServiceMessage) -> Result<(), PoolError> {
        self.broker.write(message).await?;
        self.counters.add_outgoing(1);
        Ok(())
    }

    /// Route and send one acknowledged message, counting it on success
    pub async fn write_ackable(
        &self,
        message: &ServiceMessage,
        cancel: CancellationToken,
    ) -> Result<bool, PoolError> {
        let acked = self.broker.write_ackable(message, cancel).await?;
        self.counters.add_outgoing(1);
        if acked {
            self.counters.add_acks(1);
        }
        Ok(acked)
    }
}
