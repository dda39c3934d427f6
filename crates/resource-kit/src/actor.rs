//! # Store Actor
//!
//! The `StoreActor` owns the [`ResourcesState`] (or a [`HostState`] embedding it) and is
//! the only writer of it. It processes dispatched actions *sequentially* from an mpsc
//! channel, so actions are applied in submission order and no lock guards the state.
//!
//! After each action it publishes the new snapshot on a `watch` channel. Readers
//! ([`StoreClient::get_state`](crate::StoreClient), subscriptions) only ever see whole
//! snapshots, which is what makes a single `Received` action an atomic commit.
//!
//! # Usage Pattern
//!
//! ```rust
//! use resource_kit::{StoreActor, StateStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     // 1. Create
//!     let (actor, client) = StoreActor::new(32);
//!
//!     // 2. Run
//!     let handle = tokio::spawn(actor.run());
//!
//!     // 3. Use
//!     assert!(client.get_state().is_empty());
//!
//!     // 4. Dropping every client ends the loop
//!     drop(client);
//!     handle.await.unwrap();
//! }
//! ```

use crate::client::StoreClient;
use crate::message::StoreRequest;
use crate::state::{HostState, ResourcesState};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

pub struct StoreActor<H: HostState = ResourcesState> {
    receiver: mpsc::Receiver<StoreRequest<H::Action>>,
    publisher: watch::Sender<Arc<H>>,
    state: Arc<H>,
}

impl StoreActor {
    /// Creates a new `StoreActor` holding only resources, and its associated `StoreClient`.
    ///
    /// `buffer_size` is the capacity of the request channel; when it is full, dispatches
    /// wait for space.
    pub fn new(buffer_size: usize) -> (Self, StoreClient) {
        Self::with_state(ResourcesState::new(), buffer_size)
    }
}

impl<H: HostState> StoreActor<H> {
    /// Creates a `StoreActor` that owns `initial`, a host state with the resources
    /// embedded in it.
    pub fn with_state(initial: H, buffer_size: usize) -> (Self, StoreClient<H>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let state = Arc::new(initial);
        let (publisher, snapshots) = watch::channel(Arc::clone(&state));
        let actor = Self {
            receiver,
            publisher,
            state,
        };
        let client = StoreClient::new(sender, snapshots);
        (actor, client)
    }

    /// Runs the actor's event loop until every client has been dropped.
    pub async fn run(mut self) {
        info!("Store started");
        let mut applied: u64 = 0;

        while let Some(msg) = self.receiver.recv().await {
            let respond_to = match msg {
                StoreRequest::Dispatch { action, respond_to } => {
                    debug!(action = action.name(), references = action.len(), "Dispatch");
                    self.state = Arc::new(self.state.reduce_resources(&action));
                    respond_to
                }
                StoreRequest::Host { action, respond_to } => {
                    debug!(?action, "Host dispatch");
                    self.state = Arc::new(self.state.reduce_host(&action));
                    respond_to
                }
            };
            self.publisher.send_replace(Arc::clone(&self.state));
            applied += 1;
            let _ = respond_to.send(Ok(()));
        }

        info!(applied, "Store shutdown");
    }
}
