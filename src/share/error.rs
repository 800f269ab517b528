//! Error types for share management.

use super::types::ShareId;
use thiserror::Error;

/// Errors returned by registry and orchestration operations on a share.
#[derive(Debug, Error, PartialEq)]
pub enum ShareError {
    /// Another share already points at this locator.
    #[error("a share with URL {address} already exists")]
    DuplicateShare { address: String },

    /// The locator has no host, so it cannot be mounted.
    #[error("share {name} has no host in {address}")]
    MalformedShare { name: String, address: String },

    /// No share with this ID is registered.
    #[error("share not found: {0}")]
    NotFound(ShareId),
}

impl ShareError {
    /// Create a duplicate share error.
    pub fn duplicate(address: impl Into<String>) -> Self {
        Self::DuplicateShare {
            address: address.into(),
        }
    }

    /// Create a malformed share error.
    pub fn malformed(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self::MalformedShare {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Result type for share operations
pub type ShareResult<T> = Result<T, ShareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_display() {
        let err = ShareError::duplicate("smb://nas.local/Media");
        assert_eq!(
            err.to_string(),
            "a share with URL smb://nas.local/Media already exists"
        );
    }

    #[test]
    fn test_malformed_display() {
        let err = ShareError::malformed("Media", "smb:Media");
        assert!(err.to_string().contains("no host"));
    }
}
