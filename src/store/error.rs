//! Errors returned by external collaborators (issue tracker, receipt store,
//! supply-task and insights APIs).

use std::fmt;

/// Store error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Request never produced a response (DNS, TLS, connection reset, ...)
    Transport(String),
    /// Non-2xx response
    Api { status: u16, message: String },
    /// Response body could not be decoded
    Parse(String),
    /// Referenced record does not exist
    NotFound(String),
    /// Failure injected by an in-memory test double
    Injected(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transport(s) => write!(f, "Transport error: {s}"),
            StoreError::Api { status, message } => write!(f, "API error ({status}): {message}"),
            StoreError::Parse(s) => write!(f, "Parse error: {s}"),
            StoreError::NotFound(s) => write!(f, "Not found: {s}"),
            StoreError::Injected(s) => write!(f, "Injected failure: {s}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<ureq::Error> for StoreError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => StoreError::Api {
                status,
                message: response
                    .into_string()
                    .unwrap_or_else(|e| format!("<unreadable body: {e}>")),
            },
            ureq::Error::Transport(transport) => StoreError::Transport(transport.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Api {
            status: 422,
            message: "Validation Failed".to_string(),
        };
        assert_eq!(err.to_string(), "API error (422): Validation Failed");
        assert!(StoreError::Transport("reset".into()).to_string().contains("Transport error"));
        assert!(StoreError::Parse("eof".into()).to_string().contains("Parse error"));
        assert!(StoreError::NotFound("#9".into()).to_string().contains("Not found"));
    }
}
