//! Endpoint identity and routing policy
//!
//! This module provides:
//! - [`Endpoint`]: one backend endpoint with a runtime liveness flag
//! - [`EndpointRouter`]: the caller-supplied policy choosing which endpoint
//!   subset receives a given message target
//!
//! The router is pure: a function of (target, available endpoints) with no
//! side effects. No default implementation ships with this crate — the policy
//! is deployment-specific (consistent hashing, shard-by-group,
//! broadcast-to-all). A router is mandatory whenever more than one endpoint is
//! configured; with a single endpoint it is never consulted.

pub mod endpoint;

pub use endpoint::{Endpoint, EndpointKind};

use std::sync::Arc;

/// Routing policy mapping a message target to the endpoint subset that must
/// receive it
///
/// `available` holds only endpoints whose liveness flag is currently set; the
/// returned endpoints must be drawn from it. One entry point per target kind;
/// group-ack messages route through [`EndpointRouter::route_group`].
pub trait EndpointRouter: Send + Sync {
    /// Endpoints for a hub-wide broadcast
    fn route_broadcast(&self, available: &[Arc<Endpoint>]) -> Vec<Arc<Endpoint>>;

    /// Endpoints for a single group target
    fn route_group(&self, group: &str, available: &[Arc<Endpoint>]) -> Vec<Arc<Endpoint>>;

    /// Endpoints for a single client connection target
    fn route_connection(
        &self,
        connection_id: &str,
        available: &[Arc<Endpoint>],
    ) -> Vec<Arc<Endpoint>>;

    /// Endpoints for a single user target
    fn route_user(&self, user_id: &str, available: &[Arc<Endpoint>]) -> Vec<Arc<Endpoint>>;
}
