//! Conversation lifecycle: the in-memory store, validation of persisted
//! records and the repository that reads and writes them.

pub mod repository;
pub mod snapshot;
#[allow(clippy::module_inception)]
pub mod store;

pub use repository::Repository;
pub use snapshot::{Snapshot, parse_conversations};
pub use store::{ConversationStore, Seed, StoreError};
