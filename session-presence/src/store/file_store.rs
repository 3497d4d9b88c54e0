use super::{FactStore, StoreEvent};
use crate::errors::store_error::StoreError;
use log::{error, warn};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::fs;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Fact store backed by a single JSON document on disk, durable across
/// simulated reloads of the profile. Clones share one document.
#[derive(Clone)]
pub struct FileStore {
    path: Arc<PathBuf>,
    entries: Arc<Mutex<HashMap<String, String>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl FileStore {
    /// Opens the store, loading any existing document at `path`. A corrupt
    /// document is discarded and the store starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<FileStore, StoreError> {
        let path = path.as_ref().to_path_buf();

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        "Discarding corrupt fact store document at {}: {err}",
                        path.display()
                    );
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(StoreError::Io(err)),
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(FileStore {
            path: Arc::new(path),
            entries: Arc::new(Mutex::new(entries)),
            events,
        })
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        let document =
            serde_json::to_string_pretty(entries).expect("Could not encode store document");
        if let Err(err) = fs::write(self.path.as_path(), document) {
            // A failed flush only loses durability; the in-memory view stays.
            error!("Could not write fact store to {}: {err}", self.path.display());
        }
    }

    fn notify(&self, key: &str) {
        let _ = self.events.send(StoreEvent {
            key: key.to_string(),
        });
    }
}

impl FactStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("Fact store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let entries = {
            let mut entries = self.entries.lock().expect("Fact store lock poisoned");
            entries.insert(key.to_string(), value.to_string());
            entries.clone()
        };
        self.flush(&entries);
        self.notify(key);
    }

    fn remove(&self, key: &str) {
        let entries = {
            let mut entries = self.entries.lock().expect("Fact store lock poisoned");
            if entries.remove(key).is_none() {
                return;
            }
            entries.clone()
        };
        self.flush(&entries);
        self.notify(key);
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
