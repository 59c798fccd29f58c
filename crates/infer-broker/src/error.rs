use thiserror::Error;

/// Errors that escape to callers of the inference client.
///
/// Only these four kinds are ever surfaced. Lower-level failures are folded
/// into [`ComputeError::Network`] with the failing operation named in the
/// message. The type is `Clone` so a single shared initialization outcome can
/// be handed to every task waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    /// Bad or missing input, or a client that has not been set up yet.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connectivity, non-2xx HTTP, malformed responses and timeouts.
    #[error("network error: {message}")]
    Network {
        message: String,
        /// HTTP status code when the failure came from an inference endpoint.
        status: Option<u16>,
        /// Set when the request was aborted by its deadline.
        timed_out: bool,
    },

    /// The ledger cannot cover the request (HTTP 402/403 or an oversized withdrawal).
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Malformed caller input, rejected before touching the network.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Discriminant of [`ComputeError`], handy for assertions and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Network,
    InsufficientFunds,
    Validation,
}

impl ComputeError {
    pub fn network(message: impl Into<String>) -> Self {
        ComputeError::Network {
            message: message.into(),
            status: None,
            timed_out: false,
        }
    }

    /// A non-success HTTP status from an inference endpoint.
    pub fn http_status(status: u16, body: &str) -> Self {
        ComputeError::Network {
            message: format!(
                "service returned HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ),
            status: Some(status),
            timed_out: false,
        }
    }

    pub fn timeout(after_ms: u64) -> Self {
        ComputeError::Network {
            message: format!("request timed out after {after_ms}ms"),
            status: None,
            timed_out: true,
        }
    }

    /// Wrap a broker SDK failure with the operation that produced it.
    pub fn broker(operation: &str, err: BrokerError) -> Self {
        ComputeError::network(format!("{operation} failed: {err}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ComputeError::Configuration(_) => ErrorKind::Configuration,
            ComputeError::Network { .. } => ErrorKind::Network,
            ComputeError::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            ComputeError::Validation(_) => ErrorKind::Validation,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ComputeError::Network { timed_out: true, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ComputeError::Network { status, .. } => *status,
            _ => None,
        }
    }
}

/// Failure reported by the broker SDK or the chain behind it.
///
/// The SDK exposes nothing richer than a message, so neither does this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BrokerError {
    pub message: String,
}

impl BrokerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Whether the ledger rejected the operation for lack of balance.
    pub fn is_insufficient_funds(&self) -> bool {
        self.message.to_lowercase().contains("insufficient")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_network_kind() {
        let err = ComputeError::timeout(30_000);
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.is_timeout());
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("30000ms"));
    }

    #[test]
    fn test_http_status_truncates_body() {
        let body = "x".repeat(1_000);
        let err = ComputeError::http_status(500, &body);
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_timeout());
        assert!(err.to_string().len() < 300);
    }

    #[test]
    fn test_broker_error_wrapping_keeps_operation() {
        let err = ComputeError::broker("acknowledgeProviderSigner", BrokerError::new("rpc down"));
        assert_eq!(
            err.to_string(),
            "network error: acknowledgeProviderSigner failed: rpc down"
        );
    }

    #[test]
    fn test_insufficient_detection_is_case_insensitive() {
        assert!(BrokerError::new("Insufficient balance for refund").is_insufficient_funds());
        assert!(BrokerError::new("execution reverted: INSUFFICIENT_FUNDS").is_insufficient_funds());
        assert!(!BrokerError::new("nonce too low").is_insufficient_funds());
    }
}
