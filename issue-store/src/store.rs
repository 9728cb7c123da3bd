use crate::error::Result;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// On-disk schema version of the store index.
const INDEX_VERSION: u32 = 1;

const INDEX_FILENAME: &str = "index.bin";
const INDEX_TMP_FILENAME: &str = "index.bin.tmp";
const OBJECTS_DIR: &str = "objects";

/// Maps each key to the hashed relative path its record actually lives at,
/// so deletion and lookup never recompute (or trust the stability of) the
/// hash function.
#[derive(Debug, Serialize, Deserialize)]
struct StoreIndex {
    version: u32,
    entries: BTreeMap<String, String>,
}

impl Default for StoreIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// A key→value store persisting one binary record per key under a
/// project-level root directory.
///
/// Keys are project-relative file path strings. Each key hashes to a shallow
/// two-level directory fan-out (`objects/ab/cd/<rest>.bin`), which bounds
/// directory sizes regardless of project size. Every mutation loads the
/// whole index, applies the change, and rewrites the index atomically.
///
/// I/O failures surface as recoverable errors; a corrupt index loads as
/// empty rather than failing.
pub struct ObjectStore<V> {
    root: PathBuf,
    _value: PhantomData<fn() -> V>,
}

impl<V> ObjectStore<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Opens (and creates, if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(OBJECTS_DIR))?;
        Ok(Self {
            root,
            _value: PhantomData,
        })
    }

    /// The directory this store persists under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `value` under `key`, replacing any previous record.
    pub fn write(&self, key: &str, value: &V) -> Result<()> {
        let relative = hashed_relative_path(key);
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = bincode::serialize(value)?;
        let tmp = path.with_extension("bin.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        let mut index = self.load_index();
        index.entries.insert(key.to_string(), relative);
        self.save_index(&index)?;
        debug!("stored record for {key} ({} bytes)", data.len());
        Ok(())
    }

    /// Reads the record under `key`, if one exists.
    pub fn read(&self, key: &str) -> Result<Option<V>> {
        let index = self.load_index();
        let Some(relative) = index.entries.get(key) else {
            return Ok(None);
        };
        let path = self.root.join(relative);
        if !path.exists() {
            warn!("index points at missing record for {key}, treating as absent");
            return Ok(None);
        }
        let data = fs::read(path)?;
        Ok(Some(bincode::deserialize(&data)?))
    }

    /// Whether a record exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.load_index().entries.contains_key(key)
    }

    /// Removes the record under `key`, if any.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut index = self.load_index();
        let Some(relative) = index.entries.remove(key) else {
            return Ok(());
        };
        remove_record_file(&self.root.join(relative), key);
        self.save_index(&index)
    }

    /// Drops every record whose key fails the validity predicate (typically:
    /// the key no longer names an analyzable file in the workspace).
    pub fn delete_invalid(&self, is_valid: impl Fn(&str) -> bool) -> Result<usize> {
        let mut index = self.load_index();
        let stale: Vec<String> = index
            .entries
            .keys()
            .filter(|key| !is_valid(key))
            .cloned()
            .collect();
        for key in &stale {
            if let Some(relative) = index.entries.remove(key) {
                remove_record_file(&self.root.join(relative), key);
            }
        }
        if !stale.is_empty() {
            self.save_index(&index)?;
            debug!("dropped {} stale record(s)", stale.len());
        }
        Ok(stale.len())
    }

    /// Removes every record and empties the index.
    pub fn clear(&self) -> Result<()> {
        let mut index = self.load_index();
        for (key, relative) in std::mem::take(&mut index.entries) {
            remove_record_file(&self.root.join(relative), &key);
        }
        self.save_index(&index)
    }

    /// Loads the whole index. Missing, corrupt, or incompatible index files
    /// all degrade to an empty index so the store heals itself on the next
    /// write.
    fn load_index(&self) -> StoreIndex {
        let path = self.root.join(INDEX_FILENAME);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return StoreIndex::default();
            }
            Err(err) => {
                warn!("could not read store index at {}: {err}", path.display());
                return StoreIndex::default();
            }
        };
        match bincode::deserialize::<StoreIndex>(&data) {
            Ok(index) if index.version == INDEX_VERSION => index,
            Ok(index) => {
                warn!(
                    "store index has version {} (current {INDEX_VERSION}), starting empty",
                    index.version
                );
                StoreIndex::default()
            }
            Err(err) => {
                warn!("store index is unreadable ({err}), starting empty");
                StoreIndex::default()
            }
        }
    }

    /// Rewrites the whole index atomically (tmp file + rename).
    fn save_index(&self, index: &StoreIndex) -> Result<()> {
        let data = bincode::serialize(index)?;
        let tmp = self.root.join(INDEX_TMP_FILENAME);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(tmp, self.root.join(INDEX_FILENAME))?;
        Ok(())
    }
}

/// `objects/<h0..2>/<h2..4>/<h4..>.bin` from the blake3 hex digest of the key.
fn hashed_relative_path(key: &str) -> String {
    let digest = blake3::hash(key.as_bytes()).to_hex();
    format!(
        "{OBJECTS_DIR}/{}/{}/{}.bin",
        &digest[0..2],
        &digest[2..4],
        &digest[4..]
    )
}

fn remove_record_file(path: &Path, key: &str) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!("could not remove record for {key}: {err}");
        }
    }
}
