//! # Resource Kit Sample
//!
//! A small project tracker wired onto `resource-kit`. It exposes its modules for the
//! integration tests and the demo binary.
//!
//! - **[model]**: `Project`, `Task` and their ids
//! - **[app_state]**: the store's state, resources next to UI state
//! - **[api]**: the in-memory backend the loaders talk to
//! - **[resources]**: the `ProjectList`, `Project` and `Task` resource types
//! - **[lifecycle]**: [`AppSystem`](lifecycle::AppSystem), which starts and stops it all

pub mod api;
pub mod app_state;
pub mod lifecycle;
pub mod model;
pub mod resources;
