//! # Audix Persist
//!
//! Append-only storage for sealed audit events.
//!
//! Features:
//! - [`EventStore`] — object-safe async store contract
//! - [`MemoryStore`] — in-memory reference backend
//! - [`EventFilter`] / [`EventPage`] — forensic query surface with
//!   cursor pagination
//! - [`recover_tail`] — rebuild the chain tail after a restart

pub mod memory;
pub mod query;
pub mod store;

pub use memory::MemoryStore;
pub use query::{EventFilter, EventPage};
pub use store::{recover_tail, EventStore, StorageError};
