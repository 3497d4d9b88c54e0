use tokio::sync::broadcast;

mod file_store;
mod memory_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;

/// A change notification, delivered to every subscriber of the profile,
/// including the writer. Consumers filter by key and content.
#[derive(Clone, Debug)]
pub struct StoreEvent {
    pub key: String,
}

/// Shared, synchronously accessed key-value store, durable within one
/// simulated browser profile. There is no locking across contexts: every
/// read may be stale and every write may be overwritten, so consumers must
/// keep their operations idempotent.
pub trait FactStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
    /// Change feed for keys written through any handle of this store.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
