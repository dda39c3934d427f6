//! # Test Doubles
//!
//! Two helpers for testing code built on the cache without writing a backend:
//!
//! | Helper | Stands in for | Records |
//! |--------|---------------|---------|
//! | [`RecordingStore`] | any [`StateStore`] (wraps a real one) | every dispatched action |
//! | [`ScriptedLoader`] | a [`ResourceLoader`] | every batch of keys it was asked for |
//!
//! Plus [`create_mock_store`] / [`expect_dispatch`] for asserting on raw store traffic when
//! no actor should run at all.
//!
//! ## Counting loads and dispatches
//!
//! ```rust
//! use resource_kit::mock::{RecordingStore, ScriptedLoader};
//! use resource_kit::{CacheConfig, ResourceCache, ResourceType, StoreActor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (actor, client) = StoreActor::new(32);
//!     tokio::spawn(actor.run());
//!     let store = RecordingStore::new(client);
//!     let cache = ResourceCache::new(store.clone(), &CacheConfig::default()).unwrap();
//!
//!     let loader =
//!         ScriptedLoader::<usize>::new(|_, keys, _| Ok(keys.iter().map(|k| k.len()).collect()));
//!     let lengths = ResourceType::<usize>::builder("Length")
//!         .loader(loader.clone())
//!         .build()
//!         .unwrap();
//!
//!     cache.run_load_transaction(&lengths, vec!["abc".into()]).await.unwrap();
//!     assert_eq!(loader.calls(), vec![vec!["abc".to_string()]]);
//!     assert_eq!(store.received_count(), 1);
//! }
//! ```

use crate::client::StoreClient;
use crate::error::{KitError, ResourceError};
use crate::loader::ResourceLoader;
use crate::message::{ResourceAction, Response, StoreRequest};
use crate::model::{AnyReference, ResourceType};
use crate::state::ResourcesState;
use crate::store::StateStore;
use crate::transaction::LoadTransaction;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// RECORDING STORE
// =============================================================================

/// Wraps a store and keeps a copy of every action dispatched through it.
///
/// Clones share the same log.
#[derive(Clone)]
pub struct RecordingStore<S> {
    inner: S,
    actions: Arc<Mutex<Vec<ResourceAction>>>,
}

impl<S: StateStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            actions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// All actions dispatched so far, in dispatch order.
    pub fn actions(&self) -> Vec<ResourceAction> {
        lock(&self.actions).clone()
    }

    pub fn loading_started_count(&self) -> usize {
        self.count(|action| matches!(action, ResourceAction::LoadingStarted { .. }))
    }

    pub fn received_count(&self) -> usize {
        self.count(|action| matches!(action, ResourceAction::Received { .. }))
    }

    /// Number of dispatched actions that mention `reference`.
    pub fn dispatches_touching(&self, reference: &AnyReference) -> usize {
        self.count(|action| action.touches(reference))
    }

    pub fn clear(&self) {
        lock(&self.actions).clear();
    }

    fn count(&self, predicate: impl Fn(&ResourceAction) -> bool) -> usize {
        lock(&self.actions).iter().filter(|a| predicate(a)).count()
    }
}

#[async_trait]
impl<S: StateStore> StateStore for RecordingStore<S> {
    type State = S::State;

    fn get_state(&self) -> Arc<S::State> {
        self.inner.get_state()
    }

    async fn dispatch(&self, action: ResourceAction) -> Result<(), KitError> {
        lock(&self.actions).push(action.clone());
        self.inner.dispatch(action).await
    }

    fn subscribe(&self) -> watch::Receiver<Arc<S::State>> {
        self.inner.subscribe()
    }
}

// =============================================================================
// SCRIPTED LOADER
// =============================================================================

type Script<T> =
    dyn Fn(&ResourceType<T>, &[String], &LoadTransaction) -> Result<Vec<T>, ResourceError>
        + Send
        + Sync;

/// A loader that answers from a synchronous script and remembers each batch it received.
///
/// The script may record explicit results on the transaction as well as return positional
/// values. Clones share the call log, so keep one clone for assertions and hand the other
/// to [`ResourceTypeBuilder::loader`](crate::ResourceTypeBuilder::loader).
pub struct ScriptedLoader<T> {
    script: Arc<Script<T>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    latency: Option<Duration>,
}

impl<T> Clone for ScriptedLoader<T> {
    fn clone(&self) -> Self {
        Self {
            script: Arc::clone(&self.script),
            calls: Arc::clone(&self.calls),
            latency: self.latency,
        }
    }
}

impl<T: Send + Sync + 'static> ScriptedLoader<T> {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&ResourceType<T>, &[String], &LoadTransaction) -> Result<Vec<T>, ResourceError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Arc::new(script),
            calls: Arc::new(Mutex::new(Vec::new())),
            latency: None,
        }
    }

    /// Sleeps for `latency` before running the script, to keep entries loading for a while.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every batch of keys requested so far, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> ResourceLoader<T> for ScriptedLoader<T> {
    async fn load(
        &self,
        resource_type: &ResourceType<T>,
        keys: Vec<String>,
        tx: LoadTransaction,
    ) -> Result<Vec<T>, ResourceError> {
        lock(&self.calls).push(keys.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        (self.script)(resource_type, &keys, &tx)
    }
}

// =============================================================================
// RAW STORE HELPERS
// =============================================================================

/// Creates a store client whose requests land on a receiver you control.
///
/// Nothing applies the actions, so the client's state stays empty. Answer each request
/// through the returned `respond_to` to let the dispatching side continue.
pub fn create_mock_store(buffer_size: usize) -> (StoreClient, mpsc::Receiver<StoreRequest>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    let (_publisher, snapshots) = watch::channel(Arc::new(ResourcesState::new()));
    (StoreClient::new(sender, snapshots), receiver)
}

/// Waits for the next dispatch on a mock store.
pub async fn expect_dispatch(
    receiver: &mut mpsc::Receiver<StoreRequest>,
) -> Option<(ResourceAction, Response<()>)> {
    match receiver.recv().await? {
        StoreRequest::Dispatch { action, respond_to } => Some((action, respond_to)),
        StoreRequest::Host { action, .. } => match action {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::StoreActor;
    use crate::cache::ResourceCache;
    use crate::config::CacheConfig;
    use chrono::Utc;

    #[tokio::test]
    async fn test_mock_store_surfaces_dispatches() {
        let (client, mut receiver) = create_mock_store(4);
        let tasks: ResourceType<u8> = ResourceType::new("Task").unwrap();
        let t1 = tasks.reference("t1").erase();

        let dispatching = tokio::spawn({
            let client = client.clone();
            let t1 = t1.clone();
            async move {
                client
                    .dispatch(ResourceAction::LoadingStarted {
                        start_time: Utc::now(),
                        references: vec![t1],
                    })
                    .await
            }
        });

        let (action, respond_to) = expect_dispatch(&mut receiver).await.unwrap();
        assert!(action.touches(&t1));
        respond_to.send(Ok(())).unwrap();
        dispatching.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_recording_store_counts_transaction_actions() {
        let (actor, client) = StoreActor::new(8);
        tokio::spawn(actor.run());
        let store = RecordingStore::new(client);
        let cache = ResourceCache::new(store.clone(), &CacheConfig::default()).unwrap();

        let loader =
            ScriptedLoader::<String>::new(|_, _, _| Err(ResourceError::message("offline")));
        let tasks = ResourceType::<String>::builder("Task")
            .loader(loader.clone())
            .build()
            .unwrap();

        let result = cache
            .run_load_transaction(&tasks, vec!["t1".to_string(), "t2".to_string()])
            .await;
        assert!(result.is_err());
        assert_eq!(loader.call_count(), 1);
        assert_eq!(store.loading_started_count(), 1);
        assert_eq!(store.received_count(), 1);
        assert_eq!(store.dispatches_touching(&tasks.reference("t2").erase()), 2);

        store.clear();
        assert!(store.actions().is_empty());
    }
}
