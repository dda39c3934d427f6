//! # Tracing Setup
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter filtered by
//! `RUST_LOG`. The target is hidden (`with_target(false)`); events carry the resource type
//! and key as structured fields instead.
//!
//! ## What Gets Traced
//!
//! - **Store lifecycle**: startup, every applied action at `debug`, shutdown with totals
//! - **Batches**: a batch opening, keys joining it, and its flush (`debug`)
//! - **Load transactions**: one `load_transaction` span per transaction with the committed
//!   entry count at `info`
//! - **Loader misbehavior**: late results, surplus positional values, failed loads (`warn`)
//!
//! ```bash
//! RUST_LOG=info cargo run -p resource-sample
//! RUST_LOG=resource_kit=debug cargo run -p resource-sample
//! ```
//!
//! With `RUST_LOG=debug` a batched load of three tasks reads roughly:
//!
//! ```text
//! DEBUG Batch opened type_id=type_3 generation=0
//! DEBUG Key joined batch type_id=type_3 size=2
//! DEBUG Key joined batch type_id=type_3 size=3
//! DEBUG Batch flushed type_id=type_3 generation=0 size=3
//! DEBUG load_transaction: Dispatch action="Resource loading started" references=3
//! DEBUG load_transaction: Dispatch action="Resource received" references=3
//!  INFO load_transaction: Transaction committed requested=3 received=3 errors=0
//! ```

/// Initializes the global subscriber. Call once, at program start.
///
/// # Example
///
/// ```rust,ignore
/// resource_kit::tracing::setup_tracing();
/// tracing::info!("Application started");
/// ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
