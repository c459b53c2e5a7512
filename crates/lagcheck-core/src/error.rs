use crate::traits::Key;

/// Errors reported by a store adapter for a single read or write.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store refused the operation (duplicate key, missing row, constraint).
    #[error("Store rejected operation: {0}")]
    Rejected(String),

    /// Connection to the store failed.
    #[error("Connection to store '{store}' failed")]
    ConnectionFailed {
        store: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation did not finish before its deadline.
    #[error("Operation '{operation}' timed out for key: {key}")]
    Timeout { operation: String, key: Key },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other driver-specific error.
    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Returns true if this error is transient and the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::ConnectionFailed { .. } => true,
            StoreError::Timeout { .. } => true,
            StoreError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Returns true if the operation was cut off by its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout { .. })
            || matches!(self, StoreError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
    }
}

/// Errors raised while building an engine. Running loops never fail.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Argument outside the accepted range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<lagcheck_config::ConfigError> for EngineError {
    fn from(e: lagcheck_config::ConfigError) -> Self {
        EngineError::Config(e.to_string())
    }
}
