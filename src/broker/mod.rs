//! Multi-endpoint fan-out and acknowledgement racing
//!
//! This module provides:
//! - [`MultiEndpointBroker`]: one connection pool per configured endpoint
//! - Direct passthrough when exactly one endpoint is configured (the router
//!   is never consulted)
//! - Router-driven fan-out and multi-target de-duplication with several
//!   endpoints
//! - First-success racing of acknowledged writes across the selected pools

mod ack;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ack::AckLedger;
use crate::conn::ServiceConnectionFactory;
use crate::pool::{ConnectionPool, PoolError, ReconnectPolicy};
use crate::proto::ServiceMessage;
use crate::router::{Endpoint, EndpointKind, EndpointRouter};

/// Error types for broker construction
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("at least one endpoint must be configured")]
    NoEndpoints,

    #[error("a message router is required when more than one endpoint is configured")]
    RouterRequired,

    #[error(transparent)]
    Pool(#[from] PoolError),
}

enum Inner {
    /// One endpoint: forward everything, zero routing cost
    Single {
        endpoint: Arc<Endpoint>,
        pool: ConnectionPool,
    },

    /// Several endpoints: route, then fan out
    Multi {
        endpoints: Vec<Arc<Endpoint>>,
        pools: HashMap<String, ConnectionPool>,
        router: Arc<dyn EndpointRouter>,
    },
}

/// Routes every outbound message to the pools of the endpoints that must
/// receive it
pub struct MultiEndpointBroker {
    inner: Inner,
}

impl MultiEndpointBroker {
    /// Build a broker with a caller-supplied pool generator
    ///
    /// The router may be omitted only when exactly one endpoint is
    /// configured.
    pub fn new<F>(
        endpoints: Vec<Arc<Endpoint>>,
        router: Option<Arc<dyn EndpointRouter>>,
        generator: F,
    ) -> Result<Self, BrokerError>
    where
        F: Fn(&Arc<Endpoint>) -> Result<ConnectionPool, PoolError>,
    {
        if endpoints.is_empty() {
            return Err(BrokerError::NoEndpoints);
        }

        if endpoints.len() == 1 {
            let endpoint = endpoints
                .into_iter()
                .next()
                .ok_or(BrokerError::NoEndpoints)?;
            let pool = generator(&endpoint)?;
            return Ok(Self {
                inner: Inner::Single { endpoint, pool },
            });
        }

        let router = router.ok_or(BrokerError::RouterRequired)?;
        let mut pools = HashMap::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            pools.insert(endpoint.name.clone(), generator(endpoint)?);
        }

        Ok(Self {
            inner: Inner::Multi {
                endpoints,
                pools,
                router,
            },
        })
    }

    /// Build a broker with one pool per endpoint from a connection factory
    ///
    /// Primary endpoints get the strong reconnection policy, secondary
    /// endpoints the weak one.
    pub fn from_factory(
        factory: Arc<dyn ServiceConnectionFactory>,
        connection_count: usize,
        endpoints: Vec<Arc<Endpoint>>,
        router: Option<Arc<dyn EndpointRouter>>,
    ) -> Result<Self, BrokerError> {
        Self::new(endpoints, router, |endpoint| {
            let policy = match endpoint.kind {
                EndpointKind::Primary => ReconnectPolicy::Strong,
                EndpointKind::Secondary => ReconnectPolicy::Weak,
            };
            ConnectionPool::new(
                Arc::clone(endpoint),
                Arc::clone(&factory),
                connection_count,
                policy,
            )
        })
    }

    /// All configured endpoints
    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        match &self.inner {
            Inner::Single { endpoint, .. } => vec![Arc::clone(endpoint)],
            Inner::Multi { endpoints, .. } => endpoints.clone(),
        }
    }

    /// The pool serving one endpoint, by name
    pub fn pool(&self, endpoint_name: &str) -> Option<&ConnectionPool> {
        match &self.inner {
            Inner::Single { endpoint, pool } => {
                (endpoint.name == endpoint_name).then_some(pool)
            }
            Inner::Multi { pools, .. } => pools.get(endpoint_name),
        }
    }

    /// Start every endpoint's pool concurrently
    pub async fn start(&self) {
        match &self.inner {
            Inner::Single { pool, .. } => pool.start().await,
            Inner::Multi {
                endpoints, pools, ..
            } => {
                let mut handles = Vec::with_capacity(endpoints.len());
                for endpoint in endpoints {
                    if let Some(pool) = pools.get(&endpoint.name) {
                        debug!(endpoint = %endpoint.name, "starting connections for endpoint");
                        let pool = pool.clone();
                        handles.push(tokio::spawn(async move { pool.start().await }));
                    }
                }
                for handle in handles {
                    let _ = handle.await;
                }
            }
        }
    }

    /// Stop every endpoint's pool concurrently, best-effort
    pub async fn stop(&self) {
        match &self.inner {
            Inner::Single { pool, .. } => pool.stop().await,
            Inner::Multi {
                endpoints, pools, ..
            } => {
                let mut handles = Vec::with_capacity(endpoints.len());
                for endpoint in endpoints {
                    if let Some(pool) = pools.get(&endpoint.name) {
                        debug!(endpoint = %endpoint.name, "stopping connections for endpoint");
                        let pool = pool.clone();
                        handles.push(tokio::spawn(async move { pool.stop().await }));
                    }
                }
                for handle in handles {
                    let _ = handle.await;
                }
            }
        }
    }

    /// Write to every endpoint the router selects, waiting for all of them
    ///
    /// Fails with `NotConnected` when no online endpoint is selected; the
    /// first pool failure (if any) is propagated once every fan-out write has
    /// finished.
    pub async fn write(&self, message: &ServiceMessage) -> Result<(), PoolError> {
        let pools = match &self.inner {
            Inner::Single { pool, .. } => return pool.write(message).await,
            Inner::Multi {
                endpoints,
                pools,
                router,
            } => Self::select_pools(endpoints, pools, router, message)?,
        };

        let mut handles = Vec::with_capacity(pools.len());
        for pool in pools {
            let message = message.clone();
            handles.push(tokio::spawn(async move { pool.write(&message).await }));
        }

        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(error) => warn!(error = %error, "fan-out write task failed"),
            }
        }

        match first_error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }

    /// Race an acknowledged write across the selected endpoints
    ///
    /// Resolves `true` as soon as the first pool reports a positive
    /// acknowledgement; the remaining attempts continue detached and their
    /// results are discarded. With no positive acknowledgement, the first
    /// error (if any) surfaces once every attempt has settled, otherwise the
    /// result is `false`.
    pub async fn write_ackable(
        &self,
        message: &ServiceMessage,
        cancel: CancellationToken,
    ) -> Result<bool, PoolError> {
        let pools = match &self.inner {
            Inner::Single { pool, .. } => return pool.write_ackable(message, cancel).await,
            Inner::Multi {
                endpoints,
                pools,
                router,
            } => Self::select_pools(endpoints, pools, router, message)?,
        };

        let ledger = Arc::new(AckLedger::new());
        let mut handles = Vec::with_capacity(pools.len());
        for pool in pools {
            let message = message.clone();
            let cancel = cancel.clone();
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                let result = pool.write_ackable(&message, cancel).await;
                if let Ok(true) = result {
                    ledger.try_complete();
                }
                result
            }));
        }

        let all_settled = async move {
            let mut first_error = None;
            for handle in handles {
                match handle.await {
                    Ok(Ok(_)) => {}
                    Ok(Err(error)) => {
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                    Err(error) => warn!(error = %error, "ackable write task failed"),
                }
            }
            first_error
        };

        tokio::select! {
            _ = ledger.acknowledged() => Ok(true),
            first_error = all_settled => {
                if ledger.is_complete() {
                    Ok(true)
                } else if let Some(error) = first_error {
                    Err(error)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Resolve the routed endpoint set against the online endpoints and
    /// collect their pools
    fn select_pools(
        endpoints: &[Arc<Endpoint>],
        pools: &HashMap<String, ConnectionPool>,
        router: &Arc<dyn EndpointRouter>,
        message: &ServiceMessage,
    ) -> Result<Vec<ConnectionPool>, PoolError> {
        let available: Vec<Arc<Endpoint>> = endpoints
            .iter()
            .filter(|endpoint| endpoint.is_online())
            .cloned()
            .collect();

        let routed = Self::routed_endpoints(router, message, &available);
        if routed.is_empty() {
            return Err(PoolError::NotConnected);
        }

        let mut selected = Vec::with_capacity(routed.len());
        for endpoint in &routed {
            let pool = pools.get(&endpoint.name).ok_or(PoolError::InvalidArgument(
                "router returned an endpoint that is not configured",
            ))?;
            selected.push(pool.clone());
        }

        Ok(selected)
    }

    /// Map one message to its endpoint subset; multi-target variants union
    /// and de-duplicate the per-target sets
    fn routed_endpoints(
        router: &Arc<dyn EndpointRouter>,
        message: &ServiceMessage,
        available: &[Arc<Endpoint>],
    ) -> Vec<Arc<Endpoint>> {
        match message {
            ServiceMessage::Broadcast { .. } => router.route_broadcast(available),
            ServiceMessage::GroupBroadcast { group, .. }
            | ServiceMessage::JoinGroupWithAck { group, .. }
            | ServiceMessage::LeaveGroupWithAck { group, .. } => {
                router.route_group(group, available)
            }
            ServiceMessage::MultiGroupBroadcast { groups, .. } => dedup_union(
                groups
                    .iter()
                    .map(|group| router.route_group(group, available)),
            ),
            ServiceMessage::ConnectionData { connection_id, .. } => {
                router.route_connection(connection_id, available)
            }
            ServiceMessage::MultiConnectionData { connection_ids, .. } => dedup_union(
                connection_ids
                    .iter()
                    .map(|id| router.route_connection(id, available)),
            ),
            ServiceMessage::UserData { user_id, .. } => router.route_user(user_id, available),
            ServiceMessage::MultiUserData { user_ids, .. } => {
                dedup_union(user_ids.iter().map(|id| router.route_user(id, available)))
            }
        }
    }
}

fn dedup_union(sets: impl Iterator<Item = Vec<Arc<Endpoint>>>) -> Vec<Arc<Endpoint>> {
    let mut seen = HashSet::new();
    let mut union = Vec::new();
    for set in sets {
        for endpoint in set {
            if seen.insert(endpoint.name.clone()) {
                union.push(endpoint);
            }
        }
    }
    union
}
