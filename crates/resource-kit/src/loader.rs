//! # Loader Contract
//!
//! A loader fetches the values for a batch of keys of one resource type. It may answer in
//! two ways, and may mix them:
//!
//! 1. Return a `Vec<T>` positionally aligned with `keys` (`results[i]` is the value for
//!    `keys[i]`). A shorter vector is allowed; keys without a value are reported as missing.
//! 2. Call [`LoadTransaction::receive`] / [`LoadTransaction::error`] for any reference,
//!    including references of other types. This is how one request can populate entries
//!    nobody asked for.
//!
//! An explicit call for a requested key wins over the positional value for that key.
//! Returning `Err` marks every requested key still lacking a result as failed with that
//! error.
//!
//! The loader is handed the [`ResourceType`] it is loading for, so it can build references
//! to its own keys without holding a handle on the type it belongs to.

use crate::error::ResourceError;
use crate::model::ResourceType;
use crate::transaction::LoadTransaction;
use async_trait::async_trait;
use std::future::Future;

/// Fetches values for a batch of keys.
#[async_trait]
pub trait ResourceLoader<T>: Send + Sync + 'static {
    async fn load(
        &self,
        resource_type: &ResourceType<T>,
        keys: Vec<String>,
        tx: LoadTransaction,
    ) -> Result<Vec<T>, ResourceError>;
}

/// Adapts an async closure into a [`ResourceLoader`].
pub struct LoaderFn<F> {
    f: F,
}

impl<F> LoaderFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<T, F, Fut> ResourceLoader<T> for LoaderFn<F>
where
    T: Send + Sync + 'static,
    F: Fn(ResourceType<T>, Vec<String>, LoadTransaction) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, ResourceError>> + Send + 'static,
{
    async fn load(
        &self,
        resource_type: &ResourceType<T>,
        keys: Vec<String>,
        tx: LoadTransaction,
    ) -> Result<Vec<T>, ResourceError> {
        (self.f)(resource_type.clone(), keys, tx).await
    }
}
