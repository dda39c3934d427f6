//! # Errors
//!
//! Two error types live here, and they travel different roads:
//!
//! - [`ResourceError`] is *data*. It is stored on a [`ResourceEntry`](crate::ResourceEntry)
//!   when the last fetch attempt for that reference failed, so it has to be cheap to clone
//!   and shareable between snapshots of the store.
//! - [`KitError`] is what callers of the cache get back from fallible operations
//!   (store communication, configuration, a failed load transaction).

use std::sync::Arc;

/// A per-reference fetch failure, as recorded in the store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResourceError {
    /// The loader settled without supplying a result for this reference.
    #[error("The fetching function did not return a result for {reference}")]
    MissingResult { reference: String },

    /// The loader (or a transaction handler) failed with an error of its own.
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync>),

    /// A plain failure message.
    #[error("{0}")]
    Message(String),
}

impl ResourceError {
    /// Wraps any error so it can be stored on an entry.
    pub fn failed<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ResourceError::Failed(Arc::new(error))
    }

    pub fn message(msg: impl Into<String>) -> Self {
        ResourceError::Message(msg.into())
    }

    pub fn is_missing_result(&self) -> bool {
        matches!(self, ResourceError::MissingResult { .. })
    }
}

impl From<String> for ResourceError {
    fn from(msg: String) -> Self {
        ResourceError::Message(msg)
    }
}

impl From<&str> for ResourceError {
    fn from(msg: &str) -> Self {
        ResourceError::Message(msg.to_string())
    }
}

/// Errors returned to whoever drives the cache.
#[derive(Debug, thiserror::Error)]
pub enum KitError {
    #[error("Store closed")]
    StoreClosed,
    #[error("Store dropped response channel")]
    StoreDropped,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Load failed: {0}")]
    Load(ResourceError),
    #[error("Load transaction aborted: {0}")]
    TransactionAborted(String),
}

impl From<ResourceError> for KitError {
    fn from(error: ResourceError) -> Self {
        KitError::Load(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct ConnectionReset;

    #[test]
    fn test_failed_keeps_source_message() {
        let error = ResourceError::failed(ConnectionReset);
        assert_eq!(error.to_string(), "connection reset");
        assert!(!error.is_missing_result());
    }

    #[test]
    fn test_missing_result_names_reference() {
        let error = ResourceError::MissingResult {
            reference: "Task:t1".to_string(),
        };
        assert!(error.is_missing_result());
        assert!(error.to_string().contains("Task:t1"));
    }

    #[test]
    fn test_kit_error_wraps_load_error() {
        let error: KitError = ResourceError::message("boom").into();
        assert_eq!(error.to_string(), "Load failed: boom");
    }
}
