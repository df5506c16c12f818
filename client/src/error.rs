//! Error types for the client crate

use thiserror::Error;
use tiesdb_core::CoreError;

/// Client error type
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failure inside the core: codec, integrity, cheque or protocol
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The node answered with an `Error` message
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for the client crate
pub type Result<T> = std::result::Result<T, ClientError>;

/// Build a protocol error for an unexpected message shape
pub fn protocol_error(message: impl Into<String>) -> ClientError {
    ClientError::Core(CoreError::Protocol(message.into()))
}

impl ClientError {
    /// Whether the error came from the node rather than from local processing
    pub fn is_server(&self) -> bool {
        matches!(self, ClientError::Server(_))
    }

    /// Whether received data failed verification and must be discarded
    pub fn is_rejection(&self) -> bool {
        matches!(self, ClientError::Core(err) if err.is_rejection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_pass_through() {
        let err: ClientError = CoreError::Integrity("bad signature".to_string()).into();
        assert!(err.is_rejection());
        assert!(!err.is_server());
        assert_eq!(err.to_string(), "Integrity error: bad signature");
    }

    #[test]
    fn test_protocol_error() {
        let err = protocol_error("Unknown response MessageId: 9");
        assert!(matches!(err, ClientError::Core(CoreError::Protocol(_))));
        assert_eq!(err.to_string(), "Protocol error: Unknown response MessageId: 9");
    }
}
