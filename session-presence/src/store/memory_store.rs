use super::{FactStore, StoreEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// In-memory fact store. Clones share the same underlying map, like tabs
/// sharing one browser profile; nothing survives the process.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        MemoryStore {
            entries: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    fn notify(&self, key: &str) {
        // No subscribers is fine; the feed is best-effort.
        let _ = self.events.send(StoreEvent {
            key: key.to_string(),
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FactStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("Fact store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("Fact store lock poisoned")
            .insert(key.to_string(), value.to_string());
        self.notify(key);
    }

    fn remove(&self, key: &str) {
        let removed = self
            .entries
            .lock()
            .expect("Fact store lock poisoned")
            .remove(key)
            .is_some();
        if removed {
            self.notify(key);
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .expect("Fact store lock poisoned")
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
