//! Connection pooling and reconnection module
//!
//! This module provides:
//! - Fixed-size, per-endpoint pools of persistent connections
//! - Failover scanning across the pool on write
//! - Sticky partition-key routing to a deterministic starting slot
//! - In-place slot replacement with exponential backoff and jitter
//! - Strong/weak reconnection policies (with and without on-demand creation)

pub mod backoff;
pub mod container;

pub use backoff::RetryBackoff;
pub use container::{ConnectionPool, PoolError, PoolStats, ReconnectPolicy};
