//! Bookmarked cities persisted to a key-value store.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::PathBuf,
    sync::Mutex,
};

use crate::error::StoreError;

/// Key under which the favorites list is stored.
pub const FAVORITES_KEY: &str = "favorites";

/// Durable storage for named string lists.
pub trait KeyValueStore: Send + Sync {
    fn load_list(&self, key: &str) -> Result<Option<Vec<String>>, StoreError>;

    /// Overwrite the list stored under `key`.
    fn save_list(&self, key: &str, values: &[String]) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    lists: Mutex<HashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load_list(&self, key: &str) -> Result<Option<Vec<String>>, StoreError> {
        let lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        Ok(lists.get(key).cloned())
    }

    fn save_list(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        lists.insert(key.to_string(), values.to_vec());
        Ok(())
    }
}

/// JSON object file mapping keys to string lists.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, Vec<String>>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl KeyValueStore for JsonFileStore {
    fn load_list(&self, key: &str) -> Result<Option<Vec<String>>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    /// Unreadable contents are replaced rather than blocking the write.
    fn save_list(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        let mut all = self.read_all().unwrap_or_else(|err| {
            tracing::warn!(error = %err, path = %self.path.display(), "replacing unreadable store");
            BTreeMap::new()
        });
        all.insert(key.to_string(), values.to_vec());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, serde_json::to_string_pretty(&all)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

pub struct FavoritesStore<S: KeyValueStore> {
    store: S,
    favorites: Vec<String>,
}

impl<S: KeyValueStore> FavoritesStore<S> {
    /// Read the persisted list once. Unreadable storage starts empty.
    pub fn open(store: S) -> Self {
        let favorites = match store.load_list(FAVORITES_KEY) {
            Ok(list) => list.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read favorites, starting empty");
                Vec::new()
            }
        };

        Self { store, favorites }
    }

    /// Bookmark `city` unless an identical name is already present.
    ///
    /// Returns whether the city was inserted. Blank names are rejected. On a
    /// storage error the entry stays in memory for this session.
    pub fn add(&mut self, city: &str) -> Result<bool, StoreError> {
        if city.trim().is_empty() {
            return Err(StoreError::EmptyName);
        }
        if self.contains(city) {
            return Ok(false);
        }

        self.favorites.push(city.to_string());
        self.store.save_list(FAVORITES_KEY, &self.favorites).inspect_err(|err| {
            tracing::warn!(error = %err, city, "failed to persist favorites");
        })?;

        tracing::info!(city, "added favorite");
        Ok(true)
    }

    pub fn contains(&self, city: &str) -> bool {
        self.favorites.iter().any(|c| c == city)
    }

    pub fn list(&self) -> &[String] {
        &self.favorites
    }
}
