use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid proxy entry: {0}")]
    InvalidProxy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl cancelled")]
    Cancelled,

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    /// Whether another attempt (possibly through a different proxy) could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScanError::Network(e) => !e.is_builder() && !e.is_redirect(),
            ScanError::Timeout(_) => true,
            ScanError::Io(_) => true,
            ScanError::Other(_) => true,
            ScanError::InvalidUrl(_)
            | ScanError::InvalidProxy(_)
            | ScanError::Cancelled
            | ScanError::JoinError(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ScanError::Timeout(15_000).is_retryable());
        assert!(ScanError::Other("connection reset".into()).is_retryable());
        assert!(!ScanError::Cancelled.is_retryable());
        assert!(!ScanError::InvalidUrl("::".into()).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ScanError::Cancelled.to_string(), "Crawl cancelled");
        assert_eq!(
            ScanError::InvalidProxy("missing port".into()).to_string(),
            "Invalid proxy entry: missing port"
        );
    }
}
