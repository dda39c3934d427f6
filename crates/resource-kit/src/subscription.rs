//! # Subscriptions
//!
//! [`ResourceCache::subscribe`] is the integration point for consumers: it hands back a
//! [`ResourceSubscription`] that reads the current entry of one reference, and spawns a
//! small *effect* task that watches the store and feeds the reference into the batching
//! scheduler whenever it becomes stale and idle.
//!
//! Reading never fetches. Fetching is only ever triggered by the effect task reacting to a
//! state change (or to the initial state), never from inside a read.
//!
//! ```rust
//! use resource_kit::{CacheConfig, ResourceCache, ResourceType, StoreActor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (actor, store) = StoreActor::new(32);
//!     tokio::spawn(actor.run());
//!     let cache = ResourceCache::new(store, &CacheConfig::default()).unwrap();
//!
//!     let greetings = ResourceType::<String>::builder("Greeting")
//!         .load_fn(|_greetings, keys, _tx| async move {
//!             Ok(keys.iter().map(|name| format!("hello {name}")).collect())
//!         })
//!         .build()
//!         .unwrap();
//!
//!     let mut subscription = cache.subscribe(greetings.reference("world"));
//!     let view = subscription.settled().await.unwrap();
//!     assert_eq!(view.data.as_deref().map(String::as_str), Some("hello world"));
//! }
//! ```

use crate::cache::ResourceCache;
use crate::error::KitError;
use crate::model::{should_fetch, ResourceEntry, ResourceReference};
use crate::state::{ResourcesState, Selector};
use crate::store::StateStore;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// An entry together with the reference it belongs to.
pub struct ResourceView<T> {
    pub reference: ResourceReference<T>,
    pub entry: ResourceEntry<T>,
}

impl<T> Clone for ResourceView<T> {
    fn clone(&self) -> Self {
        Self {
            reference: self.reference.clone(),
            entry: self.entry.clone(),
        }
    }
}

impl<T> fmt::Debug for ResourceView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceView")
            .field("reference", &self.reference)
            .field("entry", &self.entry)
            .finish()
    }
}

impl<T> Deref for ResourceView<T> {
    type Target = ResourceEntry<T>;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

/// Live interest in one reference. Dropping it stops the effect task; a load already
/// started keeps running and still commits.
///
/// `H` is the store's whole state; the subscription reads the resources out of it with the
/// cache's selector.
pub struct ResourceSubscription<T: Send + Sync + 'static, H: 'static = ResourcesState> {
    reference: ResourceReference<T>,
    snapshots: watch::Receiver<Arc<H>>,
    select: Selector<H>,
    effect: JoinHandle<()>,
}

impl<T: Send + Sync + 'static, H: 'static> ResourceSubscription<T, H> {
    pub fn reference(&self) -> &ResourceReference<T> {
        &self.reference
    }

    /// The entry as of the latest snapshot.
    pub fn current(&self) -> ResourceView<T> {
        let entry = {
            let snapshot = self.snapshots.borrow();
            (self.select)(&snapshot).get(&self.reference)
        };
        self.view(entry)
    }

    /// Waits for the next store change (to any entry) and returns this reference's view.
    pub async fn changed(&mut self) -> Result<ResourceView<T>, KitError> {
        self.snapshots
            .changed()
            .await
            .map_err(|_| KitError::StoreClosed)?;
        Ok(self.current())
    }

    /// Waits until the entry is neither loading nor outdated.
    ///
    /// For a type without a loader this only resolves once the entry is received as side
    /// data.
    pub async fn settled(&mut self) -> Result<ResourceView<T>, KitError> {
        loop {
            let entry = {
                let snapshot = self.snapshots.borrow_and_update();
                (self.select)(&snapshot).get(&self.reference)
            };
            if !entry.loading && !entry.outdated {
                return Ok(self.view(entry));
            }
            self.snapshots
                .changed()
                .await
                .map_err(|_| KitError::StoreClosed)?;
        }
    }

    fn view(&self, entry: ResourceEntry<T>) -> ResourceView<T> {
        ResourceView {
            reference: self.reference.clone(),
            entry,
        }
    }
}

impl<T: Send + Sync + 'static, H: 'static> Drop for ResourceSubscription<T, H> {
    fn drop(&mut self) {
        self.effect.abort();
    }
}

impl<S: StateStore> ResourceCache<S> {
    /// Registers interest in `reference`, arranging a fetch whenever it is stale and idle.
    pub fn subscribe<T: Send + Sync + 'static>(
        &self,
        reference: ResourceReference<T>,
    ) -> ResourceSubscription<T, S::State> {
        let effect = tokio::spawn(fetch_effect(
            self.clone(),
            reference.clone(),
            self.store().subscribe(),
        ));
        ResourceSubscription {
            reference,
            snapshots: self.store().subscribe(),
            select: self.selector(),
            effect,
        }
    }
}

/// Re-evaluates the fetch decision whenever `(loading, outdated)` of the entry changes.
async fn fetch_effect<S, T>(
    cache: ResourceCache<S>,
    reference: ResourceReference<T>,
    mut snapshots: watch::Receiver<Arc<S::State>>,
) where
    S: StateStore,
    T: Send + Sync + 'static,
{
    let select = cache.selector();
    let mut last = None;
    loop {
        let entry = {
            let snapshot = snapshots.borrow_and_update();
            select(&snapshot).get(&reference)
        };
        let flags = (entry.loading, entry.outdated);
        if last != Some(flags) {
            last = Some(flags);
            if should_fetch(&entry) {
                trace!(%reference, "Stale and idle, requesting fetch");
                cache.request_fetch(&reference);
            }
        }
        if snapshots.changed().await.is_err() {
            break;
        }
    }
}
