//! Unified error type for aptrack.

use aptrack_client::ClientError;
use aptrack_protocol::ProtocolError;
use aptrack_session::ReconcileError;
use aptrack_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
#[derive(Debug, thiserror::Error)]
pub enum AptrackError {
    /// Settings failed validation; no connection was attempted.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let aptrack_err: AptrackError = err.into();
        assert!(matches!(aptrack_err, AptrackError::Transport(_)));
        assert!(aptrack_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::MissingCommand { index: 2 };
        let aptrack_err: AptrackError = err.into();
        assert!(matches!(aptrack_err, AptrackError::Protocol(_)));
    }

    #[test]
    fn test_from_client_error() {
        let err = ClientError::NotConnected { cmd: "Sync" };
        let aptrack_err: AptrackError = err.into();
        assert!(matches!(aptrack_err, AptrackError::Client(_)));
    }

    #[test]
    fn test_invalid_settings_message() {
        let err = AptrackError::InvalidSettings("slot name is required".into());
        assert_eq!(err.to_string(), "invalid settings: slot name is required");
    }
}
