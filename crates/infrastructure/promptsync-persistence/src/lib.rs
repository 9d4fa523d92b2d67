mod api;
mod codec;
mod error;
mod maintenance;
mod memory_store;
mod redb_store;

pub use api::*;
pub use error::*;
pub use memory_store::MemoryKeyValueStore;
pub use redb_store::RedbKeyValueStore;
