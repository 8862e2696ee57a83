//! Session storage for Hearth.
//!
//! [`SessionStore`] is the single owner of the live
//! [`hearth_domain::Session`]: every mutation goes through
//! [`SessionStore::update`] and every reader, including long-lived
//! background tasks, sees the latest published snapshot.  Persistence is
//! delegated to a [`DurableStore`].

pub mod durable;
pub mod store;

pub use durable::{DurableStore, JsonFileStore, MemoryStore};
pub use store::SessionStore;
