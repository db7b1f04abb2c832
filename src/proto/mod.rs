//! Outbound message taxonomy
//!
//! Every message the connector sends carries a routing target: the whole hub,
//! a group (or list of groups), a single client connection (or list), or a
//! user (or list). Group membership changes are ackable: the send is only
//! successful once the backend confirms it.
//!
//! Payload bytes are opaque to this crate; wire framing belongs to the
//! transport.

use bytes::Bytes;

/// A routed outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceMessage {
    /// Deliver to every connection on every routed endpoint
    Broadcast { payload: Bytes },

    /// Deliver to one group
    GroupBroadcast { group: String, payload: Bytes },

    /// Deliver to a list of groups (routed endpoint sets are unioned and
    /// de-duplicated)
    MultiGroupBroadcast { groups: Vec<String>, payload: Bytes },

    /// Deliver to one client connection
    ConnectionData { connection_id: String, payload: Bytes },

    /// Deliver to a list of client connections
    MultiConnectionData {
        connection_ids: Vec<String>,
        payload: Bytes,
    },

    /// Deliver to one user (all of their connections)
    UserData { user_id: String, payload: Bytes },

    /// Deliver to a list of users
    MultiUserData { user_ids: Vec<String>, payload: Bytes },

    /// Add a connection to a group; requires a remote acknowledgement
    JoinGroupWithAck { connection_id: String, group: String },

    /// Remove a connection from a group; requires a remote acknowledgement
    LeaveGroupWithAck { connection_id: String, group: String },
}

impl ServiceMessage {
    /// Whether this message requires an explicit remote acknowledgement
    pub fn is_ackable(&self) -> bool {
        matches!(
            self,
            ServiceMessage::JoinGroupWithAck { .. } | ServiceMessage::LeaveGroupWithAck { .. }
        )
    }

    /// Tag name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceMessage::Broadcast { .. } => "Broadcast",
            ServiceMessage::GroupBroadcast { .. } => "GroupBroadcast",
            ServiceMessage::MultiGroupBroadcast { .. } => "MultiGroupBroadcast",
            ServiceMessage::ConnectionData { .. } => "ConnectionData",
            ServiceMessage::MultiConnectionData { .. } => "MultiConnectionData",
            ServiceMessage::UserData { .. } => "UserData",
            ServiceMessage::MultiUserData { .. } => "MultiUserData",
            ServiceMessage::JoinGroupWithAck { .. } => "JoinGroupWithAck",
            ServiceMessage::LeaveGroupWithAck { .. } => "LeaveGroupWithAck",
        }
    }
}
