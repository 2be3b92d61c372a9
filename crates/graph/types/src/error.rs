//! Fetch error types.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use thiserror::Error;

/// Classification of a fetch failure.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum NodeErrorKind {
    /// The entity definitely does not exist. Safe to cache as a negative.
    #[display("NODE_NOT_EXISTS")]
    NodeNotExists = 1,
    /// The answer could not be determined. Safe to retry, never cached.
    #[display("NETWORK_ERROR")]
    NetworkError = 2,
}

/// Terminal error of a fetch stream.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {debug_message}")]
pub struct NodeError {
    /// Machine readable code.
    #[serde(rename = "c")]
    pub kind: NodeErrorKind,
    /// Message suitable for end users.
    #[serde(rename = "usr")]
    pub user_message: String,
    /// Message with internal detail.
    #[serde(rename = "db")]
    pub debug_message: String,
}

impl NodeError {
    /// A definite absence.
    pub fn not_exists(user_message: impl Into<String>, debug_message: impl Into<String>) -> Self {
        Self {
            kind: NodeErrorKind::NodeNotExists,
            user_message: user_message.into(),
            debug_message: debug_message.into(),
        }
    }

    /// A transient failure.
    pub fn network(user_message: impl Into<String>, debug_message: impl Into<String>) -> Self {
        Self {
            kind: NodeErrorKind::NetworkError,
            user_message: user_message.into(),
            debug_message: debug_message.into(),
        }
    }

    /// Returns true for [`NodeErrorKind::NodeNotExists`].
    pub const fn is_not_exists(&self) -> bool {
        matches!(self.kind, NodeErrorKind::NodeNotExists)
    }

    /// Returns true for [`NodeErrorKind::NetworkError`].
    pub const fn is_network(&self) -> bool {
        matches!(self.kind, NodeErrorKind::NetworkError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_uses_numeric_code() {
        let err = NodeError::not_exists("Address not found", "no record for a,x");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["c"], 1);
        assert_eq!(json["usr"], "Address not found");
        assert_eq!(serde_json::from_value::<NodeError>(json).unwrap(), err);
    }

    #[test]
    fn test_display_includes_code() {
        let err = NodeError::network("try again", "socket closed");
        assert_eq!(err.to_string(), "NETWORK_ERROR: socket closed");
        assert!(err.is_network());
        assert!(!err.is_not_exists());
    }
}
