use crate::data::{KeyValueStore, MemoryStore, StorageError};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// What the registry remembers about a link, stored under the link's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: String,
    pub text: String,
    #[serde(rename = "documentPath", alias = "file")]
    pub document_path: String,
}

impl LinkRecord {
    pub fn new(
        url: impl Into<String>,
        text: impl Into<String>,
        document_path: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            document_path: document_path.into(),
        }
    }
}

/// Storage keys of the two persisted structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub progress: String,
    pub registry: String,
}

impl StorageKeys {
    pub fn for_namespace(namespace: &str) -> Self {
        Self {
            progress: format!("{}-progress", namespace),
            registry: format!("{}-all-links", namespace),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::for_namespace("study")
    }
}

/// Completion state and the registry of every link seen so far.
///
/// Both structures live in memory and are written through to the backend
/// after every mutation. A failing backend is logged and otherwise ignored,
/// so the in-memory state keeps working for the rest of the session.
pub struct ProgressStore {
    backend: Box<dyn KeyValueStore>,
    keys: StorageKeys,
    completed: BTreeMap<String, bool>,
    registry: BTreeMap<String, LinkRecord>,
    last_error: Option<String>,
}

impl ProgressStore {
    /// Load both structures from `backend`, defaulting to empty ones.
    pub fn load(backend: Box<dyn KeyValueStore>, keys: StorageKeys) -> Self {
        let mut last_error = None;
        let completed: BTreeMap<String, bool> =
            load_structure(backend.as_ref(), &keys.progress, &mut last_error);
        let registry: BTreeMap<String, LinkRecord> =
            load_structure(backend.as_ref(), &keys.registry, &mut last_error);

        info!(
            "Loaded progress from {}: {} completed, {} known links",
            backend.describe(),
            completed.values().filter(|done| **done).count(),
            registry.len()
        );

        Self {
            backend,
            keys,
            completed,
            registry,
            last_error,
        }
    }

    pub fn in_memory() -> Self {
        Self::load(Box::new(MemoryStore::new()), StorageKeys::default())
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.get(id).copied().unwrap_or(false)
    }

    /// Flip the completion state of `id` and return the new state.
    ///
    /// Unknown links are registered first so stats stay consistent.
    pub fn toggle(&mut self, id: &str, record: &LinkRecord) -> bool {
        self.last_error = None;
        if !self.registry.contains_key(id) {
            self.registry.insert(id.to_string(), record.clone());
        }

        let completed = !self.is_completed(id);
        self.completed.insert(id.to_string(), completed);
        self.save_progress();
        self.save_registry();

        if completed {
            info!("Marked as completed in {}: {}", record.document_path, record.text);
        } else {
            info!("Unmarked in {}: {}", record.document_path, record.text);
        }
        completed
    }

    /// Insert or refresh the registry entry for `id`.
    ///
    /// Completion state is never touched.
    pub fn register_link(&mut self, id: &str, record: &LinkRecord) {
        if self.registry.get(id) == Some(record) {
            return;
        }
        self.last_error = None;
        self.registry.insert(id.to_string(), record.clone());
        self.save_registry();
    }

    /// Forget every completion and every registered link.
    pub fn clear_all(&mut self) {
        self.last_error = None;
        self.completed.clear();
        self.registry.clear();
        self.save_progress();
        self.save_registry();
        info!("Study progress cleared");
    }

    pub fn completion_map(&self) -> &BTreeMap<String, bool> {
        &self.completed
    }

    pub fn registry(&self) -> &BTreeMap<String, LinkRecord> {
        &self.registry
    }

    pub fn completed_count(&self) -> usize {
        self.completed.values().filter(|done| **done).count()
    }

    /// The first storage failure of the last mutation, or of loading when
    /// nothing was changed since.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn storage_description(&self) -> String {
        self.backend.describe()
    }

    fn save_progress(&mut self) {
        let result = write_structure(self.backend.as_mut(), &self.keys.progress, &self.completed);
        self.record_save(result);
    }

    fn save_registry(&mut self) {
        let result = write_structure(self.backend.as_mut(), &self.keys.registry, &self.registry);
        self.record_save(result);
    }

    fn record_save(&mut self, result: Result<(), StorageError>) {
        match result {
            Ok(()) => {}
            Err(e) => {
                error!("Error saving study progress: {}", e);
                self.last_error.get_or_insert_with(|| e.to_string());
            }
        }
    }
}

fn load_structure<T: DeserializeOwned + Default>(
    backend: &dyn KeyValueStore,
    key: &str,
    last_error: &mut Option<String>,
) -> T {
    match backend.get(key) {
        Ok(Some(text)) => match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding unreadable {} blob: {}", key, e);
                *last_error = Some(e.to_string());
                T::default()
            }
        },
        Ok(None) => {
            debug!("No {} stored yet", key);
            T::default()
        }
        Err(e) => {
            error!("Error loading {}: {}", key, e);
            *last_error = Some(e.to_string());
            T::default()
        }
    }
}

fn write_structure<T: Serialize>(
    backend: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let text = serde_json::to_string(value)?;
    backend.set(key, &text)?;
    debug!("Saved {} ({} bytes)", key, text.len());
    Ok(())
}
