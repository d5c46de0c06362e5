/// Error type shared by the backend client, the ledger client and the feed
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Network error: {0}")] Network(String),

    #[error("Timeout: {0}")] Timeout(String),

    #[error("HTTP {status} from {endpoint}")] HttpStatus {
        endpoint: String,
        status: u16,
    },

    #[error("Invalid response: {0}")] InvalidResponse(String),

    #[error("Ledger error: {0}")] Ledger(String),

    #[error("RPC error {code}: {message}")] Rpc {
        code: i64,
        message: String,
    },

    #[error("Configuration error: {0}")] Config(String),

    #[error("IO error: {0}")] Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")] Serialization(#[from] serde_json::Error),
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;

impl FeedError {
    /// Failures worth retrying on the next poll tick
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Network(_) | FeedError::Timeout(_) => true,
            FeedError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            FeedError::HttpStatus {
                endpoint: err.url().map(|u| u.to_string()).unwrap_or_default(),
                status: status.as_u16(),
            }
        } else {
            FeedError::Network(err.to_string())
        }
    }
}

impl From<FeedError> for String {
    fn from(err: FeedError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FeedError::Network("reset".into()).is_transient());
        assert!(FeedError::Timeout("10s".into()).is_transient());
        assert!(FeedError::HttpStatus { endpoint: "x".into(), status: 503 }.is_transient());
        assert!(FeedError::HttpStatus { endpoint: "x".into(), status: 429 }.is_transient());
        assert!(!FeedError::HttpStatus { endpoint: "x".into(), status: 404 }.is_transient());
        assert!(!FeedError::InvalidResponse("bad json".into()).is_transient());
    }

    #[test]
    fn test_display_messages() {
        let err = FeedError::HttpStatus {
            endpoint: "http://localhost:8000/blockchain-logs".into(),
            status: 502,
        };
        assert_eq!(err.to_string(), "HTTP 502 from http://localhost:8000/blockchain-logs");

        let err = FeedError::Rpc { code: -32601, message: "method not found".into() };
        assert_eq!(String::from(err), "RPC error -32601: method not found");
    }
}
