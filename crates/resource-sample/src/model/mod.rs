//! Pure data structures served by the mock API and cached as resources.

pub mod project;
pub mod task;

pub use project::*;
pub use task::*;
