//! # StateStore Trait
//!
//! The narrow interface the cache needs from a central state container: read the current
//! snapshot, dispatch an action, and subscribe to changes. Nothing else is used.
//!
//! [`StoreClient`](crate::StoreClient) is the built-in implementation backed by a
//! [`StoreActor`](crate::StoreActor). Anything that applies [`reduce`](crate::state::reduce)
//! to dispatched actions in submission order can stand in for it (see
//! [`RecordingStore`](crate::mock::RecordingStore) for a wrapper used in tests).
//!
//! The store's [`State`](StateStore::State) may be larger than the resource state; the
//! cache is told where the resources live with a [`Selector`](crate::state::Selector).

use crate::error::KitError;
use crate::message::ResourceAction;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

#[async_trait]
pub trait StateStore: Clone + Send + Sync + 'static {
    /// The whole state the store holds.
    type State: Send + Sync + 'static;

    /// The latest applied snapshot.
    fn get_state(&self) -> Arc<Self::State>;

    /// Applies an action. Resolves once the new snapshot is visible through
    /// [`get_state`](Self::get_state).
    async fn dispatch(&self, action: ResourceAction) -> Result<(), KitError>;

    /// A receiver notified on every applied action.
    fn subscribe(&self) -> watch::Receiver<Arc<Self::State>>;
}
