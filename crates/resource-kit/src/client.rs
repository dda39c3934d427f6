//! # Store Client
//!
//! This module defines the client for communicating with the [`StoreActor`](crate::StoreActor).

use crate::error::KitError;
use crate::message::{ResourceAction, StoreRequest};
use crate::state::{HostState, ResourcesState};
use crate::store::StateStore;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// ## StoreClient
///
/// A cheap-to-clone handle on a running `StoreActor`. Dispatches travel over the actor's
/// mpsc channel and are acknowledged over a oneshot; reads come straight from the latest
/// published snapshot.
pub struct StoreClient<H: HostState = ResourcesState> {
    sender: mpsc::Sender<StoreRequest<H::Action>>,
    snapshots: watch::Receiver<Arc<H>>,
}

impl<H: HostState> Clone for StoreClient<H> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<H: HostState> StoreClient<H> {
    pub fn new(
        sender: mpsc::Sender<StoreRequest<H::Action>>,
        snapshots: watch::Receiver<Arc<H>>,
    ) -> Self {
        Self { sender, snapshots }
    }

    /// True once the actor loop has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Applies an application action through [`HostState::reduce_host`].
    pub async fn dispatch_host(&self, action: H::Action) -> Result<(), KitError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Host { action, respond_to })
            .await
            .map_err(|_| KitError::StoreClosed)?;
        response.await.map_err(|_| KitError::StoreDropped)?
    }
}

#[async_trait]
impl<H: HostState> StateStore for StoreClient<H> {
    type State = H;

    fn get_state(&self) -> Arc<H> {
        Arc::clone(&self.snapshots.borrow())
    }

    async fn dispatch(&self, action: ResourceAction) -> Result<(), KitError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Dispatch { action, respond_to })
            .await
            .map_err(|_| KitError::StoreClosed)?;
        response.await.map_err(|_| KitError::StoreDropped)?
    }

    fn subscribe(&self) -> watch::Receiver<Arc<H>> {
        self.snapshots.clone()
    }
}
