//! Processor state management for logpipe.
//!
//! Processors that need incrementality keep a small key/value map per
//! [`Scope`]:
//!
//! - `Local` - owned by one worker (one partition task), never shared
//! - `Cluster` - shared by every instance of the same processor identity;
//!   writes are last-writer-wins and readers must tolerate stale versions
//!
//! Every write bumps the map's version. [`StateStore::compare_and_store`]
//! offers optimistic concurrency for callers that want it; nothing here
//! takes a distributed lock.
//!
//! ## Storage Backends
//!
//! - [`MemoryStateStore`] - process-local, used in standalone runs and tests
//! - [`FilesystemStateStore`] - one JSON file per state map, shareable
//!   through a common directory

mod filesystem;
mod manager;
mod memory;
mod scope;
pub mod store;


pub use filesystem::FilesystemStateStore;
pub use manager::StateManager;
pub use memory::MemoryStateStore;
pub use scope::{Scope, StateMap};
pub use store::{Result, StateError, StateKey, StateStore};
