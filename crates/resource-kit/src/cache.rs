//! # Resource Cache
//!
//! The composition root of the library. A `ResourceCache` owns a handle on the state store,
//! the [`BatchScheduler`] and the gate that keeps concurrent transactions from claiming the
//! same reference twice. It is cheap to clone; clones share all of it.
//!
//! Several independent caches can live in one process (e.g. one per test), each with its
//! own store and its own pending batches.
//!
//! The store may hold more than resources. [`ResourceCache::with_selector`] takes the
//! function that finds the [`ResourcesState`] inside the store's state; every read the cache
//! makes goes through it.

use crate::config::CacheConfig;
use crate::error::KitError;
use crate::error::ResourceError;
use crate::message::{FetchResult, ResourceAction, ResultEntry};
use crate::model::{should_fetch, AnyReference, ResourceEntry, ResourceReference, ResourceType};
use crate::scheduler::BatchScheduler;
use crate::state::{whole, ResourcesState, Selector};
use crate::store::StateStore;
use crate::transaction::{self, LoadTransaction};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info_span, warn, Instrument};

struct CacheInner<S: StateStore> {
    store: S,
    select: Selector<S::State>,
    scheduler: BatchScheduler,
    gate: Arc<AsyncMutex<()>>,
}

pub struct ResourceCache<S: StateStore> {
    inner: Arc<CacheInner<S>>,
}

impl<S: StateStore> Clone for ResourceCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StateStore<State = ResourcesState>> ResourceCache<S> {
    /// A cache over a store that holds nothing but resources.
    pub fn new(store: S, config: &CacheConfig) -> Result<Self, KitError> {
        Self::with_selector(store, whole, config)
    }
}

impl<S: StateStore> ResourceCache<S> {
    /// A cache over a store whose state embeds the resources; `select` locates them.
    pub fn with_selector(
        store: S,
        select: Selector<S::State>,
        config: &CacheConfig,
    ) -> Result<Self, KitError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(CacheInner {
                store,
                select,
                scheduler: BatchScheduler::new(config.batch_window()),
                gate: Arc::new(AsyncMutex::new(())),
            }),
        })
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn selector(&self) -> Selector<S::State> {
        self.inner.select
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.inner.scheduler
    }

    /// Current entry for `reference`; NULL if it was never touched. Never fetches.
    pub fn get_entry<T: Send + Sync + 'static>(
        &self,
        reference: &ResourceReference<T>,
    ) -> ResourceEntry<T> {
        let state = self.inner.store.get_state();
        (self.inner.select)(&state).get(reference)
    }

    /// Loads `keys` of `resource_type` with its loader, as one transaction.
    ///
    /// Keys that are no longer stale are dropped first; if none remain, nothing is
    /// dispatched. A type without a loader is a no-op. Positional results fill only the
    /// requested keys the loader did not answer explicitly.
    pub async fn run_load_transaction<T: Send + Sync + 'static>(
        &self,
        resource_type: &ResourceType<T>,
        keys: Vec<String>,
    ) -> Result<(), KitError> {
        let Some(loader) = resource_type.loader().cloned() else {
            debug!(resource_type = resource_type.name(), "No loader, nothing to fetch");
            return Ok(());
        };
        let span = info_span!(
            "load_transaction",
            resource_type = resource_type.name(),
            keys = keys.len()
        );
        let references = keys
            .into_iter()
            .map(|key| resource_type.reference(key).erase())
            .collect();
        let rtype = resource_type.clone();

        transaction::execute(
            &self.inner.store,
            self.inner.select,
            &self.inner.gate,
            references,
            |requested, tx| async move {
                let keys: Vec<String> = requested.iter().map(|r| r.key().to_string()).collect();
                let values = loader.load(&rtype, keys.clone(), tx.clone()).await?;
                if values.len() > keys.len() {
                    warn!(
                        requested = keys.len(),
                        returned = values.len(),
                        "Loader returned more results than keys, extras ignored"
                    );
                }
                for (key, value) in keys.into_iter().zip(values) {
                    tx.put_if_absent(
                        rtype.reference(key).erase(),
                        FetchResult::Completed(Arc::new(value)),
                    );
                }
                Ok(())
            },
        )
        .instrument(span)
        .await
    }

    /// Runs a load transaction for arbitrary references with a custom handler.
    ///
    /// The handler receives the references that were still stale (and are now marked
    /// loading) and the transaction to record results into. It runs on its own task, so it
    /// must own what it captures.
    pub async fn begin_load_transaction<F, Fut>(
        &self,
        references: Vec<AnyReference>,
        handler: F,
    ) -> Result<(), KitError>
    where
        F: FnOnce(Vec<AnyReference>, LoadTransaction) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ResourceError>> + Send + 'static,
    {
        let span = info_span!("load_transaction", references = references.len());
        transaction::execute(
            &self.inner.store,
            self.inner.select,
            &self.inner.gate,
            references,
            handler,
        )
        .instrument(span)
        .await
    }

    /// Stores a value that arrived without being requested (e.g. a pushed update).
    pub async fn receive<T: Send + Sync + 'static>(
        &self,
        reference: &ResourceReference<T>,
        value: T,
    ) -> Result<(), KitError> {
        let now = Utc::now();
        self.inner
            .store
            .dispatch(ResourceAction::Received {
                start_time: now,
                finish_time: now,
                result_entries: vec![ResultEntry {
                    reference: reference.erase(),
                    result: FetchResult::Completed(Arc::new(value)),
                }],
            })
            .await
    }

    /// Feeds a stale, idle reference into the batching scheduler.
    ///
    /// Does nothing if the entry does not need fetching or its type has no loader.
    pub fn request_fetch<T: Send + Sync + 'static>(&self, reference: &ResourceReference<T>) {
        let resource_type = reference.resource_type();
        if resource_type.loader().is_none() {
            debug!(%reference, "No loader, nothing to fetch");
            return;
        }
        if !should_fetch(&self.get_entry(reference)) {
            return;
        }

        let cache = self.clone();
        let rtype = resource_type.clone();
        self.inner.scheduler.schedule(
            rtype.id(),
            rtype.batch_policy(),
            reference.key().to_string(),
            move |keys| async move {
                if let Err(e) = cache.run_load_transaction(&rtype, keys).await {
                    warn!(resource_type = rtype.name(), error = %e, "Batch load failed");
                }
            },
        );
    }
}
