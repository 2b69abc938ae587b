//! Station errors

use thiserror::Error;

use crate::support::ocpp_frame::FrameError;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("Connector not found: {0}")]
    ConnectorNotFound(u32),

    #[error("Connection closed: code {code}, reason: {reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("OCPP frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl StationError {
    /// Whether the error should be surfaced on the station's `error` field.
    /// Lookups of unknown connectors are only logged.
    pub fn is_surfaced(&self) -> bool {
        matches!(self, Self::ConnectionClosed { .. } | Self::Transport(_))
    }
}

/// Result type for station operations
pub type StationResult<T> = Result<T, StationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_closed_message_carries_code_and_reason() {
        let err = StationError::ConnectionClosed {
            code: 1011,
            reason: "server restarting".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("1011"));
        assert!(msg.contains("server restarting"));
        assert!(err.is_surfaced());
    }

    #[test]
    fn connector_not_found_is_not_surfaced() {
        let err = StationError::ConnectorNotFound(9);
        assert_eq!(err.to_string(), "Connector not found: 9");
        assert!(!err.is_surfaced());
    }
}
