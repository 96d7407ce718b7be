//! Message bus error primitives.

use crate::payloads::MessageId;
use std::fmt::{self, Display, Formatter};

/// Error emitted when publishing fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// No subscriber was attached to receive the message.
    NoSubscribers {
        /// Identifier assigned to the message.
        message_id: MessageId,
        /// Message kind string for filtering in logs.
        message_kind: &'static str,
    },
    /// The transport refused the message.
    Rejected {
        /// Message kind string for filtering in logs.
        message_kind: &'static str,
        /// Static reason reported by the transport.
        reason: &'static str,
    },
}

impl BusError {
    /// Identifier assigned to the message when the failure occurred, if one was assigned.
    #[must_use]
    pub const fn message_id(&self) -> Option<MessageId> {
        match self {
            Self::NoSubscribers { message_id, .. } => Some(*message_id),
            Self::Rejected { .. } => None,
        }
    }

    /// Message kind string associated with the failed delivery.
    #[must_use]
    pub const fn message_kind(&self) -> &'static str {
        match self {
            Self::NoSubscribers { message_kind, .. } | Self::Rejected { message_kind, .. } => {
                message_kind
            }
        }
    }
}

impl Display for BusError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("message bus publish failed")
    }
}

impl std::error::Error for BusError {}

/// Result wrapper for message bus operations.
pub type BusResult<T> = Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_error_exposes_fields() {
        let err = BusError::NoSubscribers {
            message_id: 42,
            message_kind: "adaptation_requested",
        };

        assert_eq!(err.message_id(), Some(42));
        assert_eq!(err.message_kind(), "adaptation_requested");
        assert_eq!(err.to_string(), "message bus publish failed");

        let rejected = BusError::Rejected {
            message_kind: "archive_processed",
            reason: "broker_unavailable",
        };
        assert_eq!(rejected.message_id(), None);
        assert_eq!(rejected.message_kind(), "archive_processed");
    }
}
