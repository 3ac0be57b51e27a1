//! Error types shared across the crate.

use crate::types::{ErrorCode, LockError};

/// A host (browser) API call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The call was made but the host rejected it
    #[error("{0}")]
    Failed(String),
    /// The API is not available in this context
    #[error("Host API unavailable: {0}")]
    Unavailable(&'static str),
}

impl HostError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Session error recorded for this failure.
    ///
    /// The host message is kept verbatim; an empty message becomes `UNKNOWN`.
    pub fn to_lock_error(&self) -> LockError {
        match self {
            Self::Failed(message) if !message.is_empty() => LockError::Detail(message.clone()),
            _ => LockError::Code(ErrorCode::Unknown),
        }
    }
}

/// Key-value storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(#[from] HostError),
    #[error("Corrupt record under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode record for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_to_lock_error() {
        assert_eq!(
            HostError::failed("Cannot access a chrome:// URL").to_lock_error(),
            LockError::Detail("Cannot access a chrome:// URL".to_string())
        );
        assert_eq!(HostError::failed("").to_lock_error(), LockError::Code(ErrorCode::Unknown));
        assert_eq!(
            HostError::Unavailable("scripting").to_lock_error(),
            LockError::Code(ErrorCode::Unknown)
        );
    }
}
