//! Thread-safe metadata store with atomic persistence.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use wslss_common::paths::{DEFAULT_ALIAS, LOGIN_COLLECTION};
use wslss_common::time::unix_now;
use wslss_common::{Error, Result};

/// File name of the metadata document inside the config directory.
pub const METADATA_FILENAME: &str = "metadata.json";

const STORE_VERSION: u32 = 1;

/// Metadata for a single secret item. The payload itself is not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMeta {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub modified: u64,
    #[serde(default)]
    pub content_type: String,
}

/// Metadata for a collection of items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMeta {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub modified: u64,
    #[serde(default)]
    pub items: HashMap<String, ItemMeta>,
}

/// Top-level document persisted to disk.
#[derive(Debug, Serialize, Deserialize)]
struct StoreData {
    version: u32,
    #[serde(default)]
    collections: HashMap<String, CollectionMeta>,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

impl StoreData {
    fn empty() -> Self {
        Self {
            version: STORE_VERSION,
            collections: HashMap::new(),
            aliases: HashMap::new(),
        }
    }
}

/// Identifies an item by collection name and UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub collection: String,
    pub uuid: String,
}

/// Thread-safe access to the Secret Service metadata document.
///
/// Mutations rewrite the whole document to a temp file and rename it over
/// the live one while holding the write lock, so the file on disk is
/// always a complete snapshot. Readers copy values out under the shared
/// lock.
pub struct Store {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl Store {
    /// Opens (or creates) the store at `config_dir/metadata.json`.
    ///
    /// The config directory is created with mode `0700` when absent. A
    /// store that has no `login` collection after load is seeded with it
    /// and the `default` alias, then saved.
    ///
    /// # Errors
    /// - Directory creation or file I/O fails
    /// - An existing metadata file is malformed or has the wrong version
    pub fn open(config_dir: &Path) -> Result<Self> {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(config_dir)?;

        let path = config_dir.join(METADATA_FILENAME);
        let data = match fs::read(&path) {
            Ok(bytes) => {
                let data: StoreData = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::Store(format!("malformed {}: {e}", path.display()))
                })?;
                if data.version != STORE_VERSION {
                    return Err(Error::Store(format!(
                        "unsupported metadata version {} in {}",
                        data.version,
                        path.display()
                    )));
                }
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::empty(),
            Err(e) => return Err(e.into()),
        };

        let store = Self {
            path,
            data: RwLock::new(data),
        };
        store.seed()?;
        Ok(store)
    }

    /// Ensures the `login` collection and the `default` alias exist.
    fn seed(&self) -> Result<()> {
        let mut data = self.data.write().unwrap();
        if data.collections.contains_key(LOGIN_COLLECTION) {
            return Ok(());
        }
        let now = unix_now();
        data.collections.insert(
            LOGIN_COLLECTION.to_string(),
            CollectionMeta {
                label: "Login".to_string(),
                created: now,
                modified: now,
                items: HashMap::new(),
            },
        );
        data.aliases
            .insert(DEFAULT_ALIAS.to_string(), LOGIN_COLLECTION.to_string());
        self.save_locked(&data)
    }

    /// Writes the document to `<path>.tmp` with mode 0600 and renames it
    /// over the live file. Caller must hold the write lock.
    fn save_locked(&self, data: &StoreData) -> Result<()> {
        use std::os::unix::fs::OpenOptionsExt;

        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    // --- Collections ---

    /// Returns a copy of the collection metadata, if it exists.
    pub fn get_collection(&self, name: &str) -> Option<CollectionMeta> {
        self.data.read().unwrap().collections.get(name).cloned()
    }

    /// All collection names, in no particular order.
    pub fn list_collections(&self) -> Vec<String> {
        self.data.read().unwrap().collections.keys().cloned().collect()
    }

    /// Whether a collection with this name exists.
    pub fn contains_collection(&self, name: &str) -> bool {
        self.data.read().unwrap().collections.contains_key(name)
    }

    /// Adds a new collection.
    ///
    /// # Errors
    /// - A collection with this name already exists
    /// - Persisting fails
    pub fn create_collection(&self, name: &str, label: &str) -> Result<()> {
        let mut data = self.data.write().unwrap();
        if data.collections.contains_key(name) {
            return Err(Error::Store(format!("collection {name:?} already exists")));
        }
        let now = unix_now();
        data.collections.insert(
            name.to_string(),
            CollectionMeta {
                label: label.to_string(),
                created: now,
                modified: now,
                items: HashMap::new(),
            },
        );
        self.save_locked(&data)
    }

    /// Updates the label of an existing collection.
    pub fn update_collection_label(&self, name: &str, label: &str) -> Result<()> {
        let mut data = self.data.write().unwrap();
        let collection = data
            .collections
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("collection {name:?}")))?;
        collection.label = label.to_string();
        collection.modified = unix_now();
        self.save_locked(&data)
    }

    /// Removes a collection, all its item metadata, and every alias that
    /// pointed at it. Returns the names of the removed aliases.
    pub fn delete_collection(&self, name: &str) -> Result<Vec<String>> {
        let mut data = self.data.write().unwrap();
        if data.collections.remove(name).is_none() {
            return Err(Error::NotFound(format!("collection {name:?}")));
        }
        let removed: Vec<String> = data
            .aliases
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.clone())
            .collect();
        for alias in &removed {
            data.aliases.remove(alias);
        }
        self.save_locked(&data)?;
        Ok(removed)
    }

    // --- Items ---

    /// Returns a copy of the item metadata, if it exists.
    pub fn get_item(&self, collection: &str, uuid: &str) -> Option<ItemMeta> {
        self.data
            .read()
            .unwrap()
            .collections
            .get(collection)?
            .items
            .get(uuid)
            .cloned()
    }

    /// All item UUIDs in a collection.
    pub fn list_items(&self, collection: &str) -> Vec<String> {
        self.data
            .read()
            .unwrap()
            .collections
            .get(collection)
            .map(|c| c.items.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Adds an item to a collection.
    ///
    /// `created` defaults to the current time when left zero; `modified`
    /// is always set to the current time and propagated to the owning
    /// collection.
    pub fn create_item(&self, collection: &str, uuid: &str, mut meta: ItemMeta) -> Result<()> {
        let mut data = self.data.write().unwrap();
        let col = data
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::NotFound(format!("collection {collection:?}")))?;
        let now = unix_now();
        if meta.created == 0 {
            meta.created = now;
        }
        meta.modified = now;
        col.items.insert(uuid.to_string(), meta);
        col.modified = now;
        self.save_locked(&data)
    }

    /// Replaces the metadata of an existing item, bumping `modified` on
    /// the item and its collection.
    pub fn update_item(&self, collection: &str, uuid: &str, mut meta: ItemMeta) -> Result<()> {
        let mut data = self.data.write().unwrap();
        let col = data
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::NotFound(format!("collection {collection:?}")))?;
        if !col.items.contains_key(uuid) {
            return Err(Error::NotFound(format!(
                "item {uuid:?} in collection {collection:?}"
            )));
        }
        let now = unix_now();
        meta.modified = now;
        col.items.insert(uuid.to_string(), meta);
        col.modified = now;
        self.save_locked(&data)
    }

    /// Removes an item from a collection.
    pub fn delete_item(&self, collection: &str, uuid: &str) -> Result<()> {
        let mut data = self.data.write().unwrap();
        let col = data
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::NotFound(format!("collection {collection:?}")))?;
        if col.items.remove(uuid).is_none() {
            return Err(Error::NotFound(format!(
                "item {uuid:?} in collection {collection:?}"
            )));
        }
        col.modified = unix_now();
        self.save_locked(&data)
    }

    /// Finds all items whose attributes are a superset of `attrs`, across
    /// every collection. An empty query matches every item.
    pub fn search_items(&self, attrs: &HashMap<String, String>) -> Vec<ItemRef> {
        let data = self.data.read().unwrap();
        let mut results = Vec::new();
        for (name, col) in &data.collections {
            for (uuid, item) in &col.items {
                if matches_all(&item.attributes, attrs) {
                    results.push(ItemRef {
                        collection: name.clone(),
                        uuid: uuid.clone(),
                    });
                }
            }
        }
        results
    }

    /// Finds matching items within a single collection.
    pub fn search_items_in_collection(
        &self,
        collection: &str,
        attrs: &HashMap<String, String>,
    ) -> Vec<ItemRef> {
        let data = self.data.read().unwrap();
        let Some(col) = data.collections.get(collection) else {
            return Vec::new();
        };
        col.items
            .iter()
            .filter(|(_, item)| matches_all(&item.attributes, attrs))
            .map(|(uuid, _)| ItemRef {
                collection: collection.to_string(),
                uuid: uuid.clone(),
            })
            .collect()
    }

    // --- Aliases ---

    /// Resolves an alias to a collection name.
    pub fn get_alias(&self, name: &str) -> Option<String> {
        self.data.read().unwrap().aliases.get(name).cloned()
    }

    /// All aliases and their targets.
    pub fn list_aliases(&self) -> HashMap<String, String> {
        self.data.read().unwrap().aliases.clone()
    }

    /// Maps an alias to a collection, or removes it when `collection` is
    /// `None`.
    ///
    /// # Errors
    /// - The target collection does not exist
    /// - Persisting fails
    pub fn set_alias(&self, name: &str, collection: Option<&str>) -> Result<()> {
        let mut data = self.data.write().unwrap();
        match collection {
            None => {
                data.aliases.remove(name);
            }
            Some(target) => {
                if !data.collections.contains_key(target) {
                    return Err(Error::NotFound(format!("collection {target:?}")));
                }
                data.aliases.insert(name.to_string(), target.to_string());
            }
        }
        self.save_locked(&data)
    }
}

/// True when `item_attrs` contains every key/value pair in `want`.
fn matches_all(item_attrs: &HashMap<String, String>, want: &HashMap<String, String>) -> bool {
    want.iter()
        .all(|(k, v)| item_attrs.get(k).map(String::as_str) == Some(v.as_str()))
}
