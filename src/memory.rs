use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{SeenContent, SeenContentLedger};

/// Whole-snapshot persistence keyed by name (a file path for the JSON
/// backend). There are no partial writes: `save` replaces the snapshot.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn save(&self, key: &str, snapshot: &Value) -> Result<(), StoreError>;
}

/// Loads the snapshot stored under `key`, or persists and returns the
/// default value when nothing is stored yet.
pub fn load_or_init<T>(store: &dyn SnapshotStore, key: &str) -> Result<T, StoreError>
where
    T: Serialize + DeserializeOwned + Default,
{
    match store.load(key)? {
        Some(value) => serde_json::from_value(value).map_err(|source| StoreError::Encoding {
            key: key.to_string(),
            source,
        }),
        None => {
            info!(key, "no snapshot found, creating an empty one");
            let empty = T::default();
            save_typed(store, key, &empty)?;
            Ok(empty)
        }
    }
}

pub fn save_typed<T: Serialize>(store: &dyn SnapshotStore, key: &str, value: &T) -> Result<(), StoreError> {
    let snapshot = serde_json::to_value(value).map_err(|source| StoreError::Encoding {
        key: key.to_string(),
        source,
    })?;
    store.save(key, &snapshot)
}

/// Pretty-printed JSON files, one per key. Writes go to a sibling temp
/// file first and are renamed over the target.
#[derive(Debug, Default, Clone)]
pub struct JsonFileStore;

impl JsonFileStore {
    pub fn new() -> Self {
        JsonFileStore
    }

    fn write(path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = PathBuf::from(path);
        tmp.as_mut_os_string().push(".tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let data = match fs::read_to_string(key) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        };
        let value = serde_json::from_str(&data).map_err(|source| StoreError::Encoding {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    fn save(&self, key: &str, snapshot: &Value) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(snapshot).map_err(|source| StoreError::Encoding {
            key: key.to_string(),
            source,
        })?;
        Self::write(Path::new(key), &data).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })?;
        debug!(key, bytes = data.len(), "snapshot saved");
        Ok(())
    }
}

/// Process-local snapshots, used for dry runs and tests. Saves can be made
/// to fail on demand.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    snapshots: Arc<Mutex<HashMap<String, Value>>>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn insert(&self, key: &str, snapshot: Value) {
        self.lock().insert(key.to_string(), snapshot);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        // A panic while holding this lock cannot leave a half-written map.
        self.snapshots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotStore for InMemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, snapshot: &Value) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                key: key.to_string(),
                reason: "saves disabled".to_string(),
            });
        }
        self.insert(key, snapshot.clone());
        Ok(())
    }
}

/// Content already acted upon (retweeted), persisted across runs.
pub struct ContentLedger {
    key: String,
    backend: Arc<dyn SnapshotStore>,
    ledger: tokio::sync::Mutex<SeenContentLedger>,
}

impl ContentLedger {
    pub fn open(key: impl Into<String>, backend: Arc<dyn SnapshotStore>) -> Result<Self, StoreError> {
        let key = key.into();
        let ledger: SeenContentLedger = load_or_init(backend.as_ref(), &key)?;
        info!(key = %key, items = ledger.items.len(), "content ledger loaded");
        Ok(ContentLedger {
            key,
            backend,
            ledger: tokio::sync::Mutex::new(ledger),
        })
    }

    pub async fn snapshot(&self) -> Vec<SeenContent> {
        self.ledger.lock().await.items.clone()
    }

    pub async fn len(&self) -> usize {
        self.ledger.lock().await.items.len()
    }

    /// Appends `item` and persists the whole ledger. On failure the
    /// in-memory ledger is left as it was.
    pub async fn append(&self, item: SeenContent) -> Result<(), StoreError> {
        let mut ledger = self.ledger.lock().await;
        let mut updated = ledger.clone();
        updated.items.push(item);
        save_typed(self.backend.as_ref(), &self.key, &updated)?;
        *ledger = updated;
        Ok(())
    }
}
