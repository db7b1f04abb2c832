use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Endpoint category, fixed at configuration time
///
/// Primary endpoints run the strong reconnection policy (on-demand connections
/// allowed); secondary endpoints run the weak policy (fixed pool only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Primary,
    Secondary,
}

impl Default for EndpointKind {
    fn default() -> Self {
        EndpointKind::Primary
    }
}

impl EndpointKind {
    /// Get a human-readable kind name
    pub fn name(&self) -> &str {
        match self {
            EndpointKind::Primary => "primary",
            EndpointKind::Secondary => "secondary",
        }
    }
}

/// One backend messaging-service endpoint the frontend can connect to
///
/// The endpoint set is immutable for the process lifetime; only the `online`
/// flag toggles at runtime, driven by the hosting layer's monitoring.
#[derive(Debug)]
pub struct Endpoint {
    /// Stable identity used for routing and de-duplication
    pub name: String,

    /// Connection string / URI handed to the connection factory
    pub url: String,

    /// Primary or secondary
    pub kind: EndpointKind,

    /// Whether this endpoint currently receives routed traffic
    online: AtomicBool,
}

impl Endpoint {
    /// Create an endpoint, online by default
    pub fn new(name: String, url: String, kind: EndpointKind) -> Self {
        Self {
            name,
            url,
            kind,
            online: AtomicBool::new(true),
        }
    }

    /// Whether the endpoint is currently live for routing
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Toggle the liveness flag
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl Clone for Endpoint {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            url: self.url.clone(),
            kind: self.kind,
            online: AtomicBool::new(self.online.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_creation() {
        let endpoint = Endpoint::new(
            "east".to_string(),
            "tcp://east.example.com:5001".to_string(),
            EndpointKind::Primary,
        );
        assert_eq!(endpoint.name, "east");
        assert!(endpoint.is_online());
        assert_eq!(endpoint.kind, EndpointKind::Primary);
    }

    #[test]
    fn test_online_toggle() {
        let endpoint = Endpoint::new(
            "west".to_string(),
            "tcp://west.example.com:5001".to_string(),
            EndpointKind::Secondary,
        );

        endpoint.set_online(false);
        assert!(!endpoint.is_online());

        endpoint.set_online(true);
        assert!(endpoint.is_online());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(EndpointKind::Primary.name(), "primary");
        assert_eq!(EndpointKind::Secondary.name(), "secondary");
        assert_eq!(EndpointKind::default(), EndpointKind::Primary);
    }
}
