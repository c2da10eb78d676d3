//! Nullable infrastructure for deterministic testing.
//!
//! All external collaborators (clock, node, storage, notification channel) are
//! abstracted behind traits. This crate provides in-memory implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically, including injected failures
//! - Never touch the filesystem or network

pub mod clock;
pub mod node;
pub mod notify;
pub mod store;

pub use clock::NullClock;
pub use node::NullNode;
pub use notify::NullNotifier;
pub use store::NullStore;
