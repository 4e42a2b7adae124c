// src/cache.rs

//! Content-addressed local store of source bundles.
//!
//! Storage is addressed by an XXH128 digest of catalog key + published
//! version hash, sharded git-style (`<cache root>/<ab>/<rest>/__data`).
//! Folding the version into the address means a game update lands at a fresh
//! path and stale copies simply stop being hit. Writes are atomic (temp file
//! + rename), so a crash mid-download never leaves a half-written file where
//! the next run would trust it.
//!
//! Concurrent fetches for the same catalog key are serialized through a
//! per-key lock map: the first caller downloads, the rest wait and then read
//! the landed file.

use crate::bundle::{self, Bundle};
use crate::error::{Error, Result};
use crate::fingerprint;
use crate::remote::{CatalogEntry, RemoteSource};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Bundle payload file name inside a version directory.
const DATA_FILE: &str = "__data";

pub struct SourceCache {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SourceCache {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(SourceCache {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// On-disk location for a resolved catalog entry.
    pub fn bundle_path(&self, entry: &CatalogEntry) -> PathBuf {
        let key = fingerprint::cache_key(
            format!("{}:{}", entry.bundle_name, entry.hash).as_bytes(),
        );
        self.root.join(&key[..2]).join(&key[2..]).join(DATA_FILE)
    }

    /// Fetch and decode the source bundle for a catalog key.
    ///
    /// Serves from the local store when the declared version is present;
    /// downloads on a miss. A cached copy that fails to decode is evicted and
    /// re-fetched once before surfacing [`Error::CorruptSource`].
    pub fn fetch(
        &self,
        catalog_key: &str,
        remote: &dyn RemoteSource,
    ) -> Result<(CatalogEntry, Bundle)> {
        let entry = remote.resolve(catalog_key)?;

        let lock = self.key_lock(catalog_key);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let path = self.bundle_path(&entry);
        if path.exists() {
            debug!("cache hit for '{catalog_key}' at {}", path.display());
            let bytes = fs::read(&path)?;
            match bundle::decode(&bytes) {
                Ok(decoded) => return Ok((entry, decoded)),
                Err(e) => {
                    warn!(
                        "cached bundle for '{catalog_key}' failed to decode ({e}); \
                         evicting and re-fetching"
                    );
                    let _ = fs::remove_file(&path);
                }
            }
        } else {
            debug!("cache miss for '{catalog_key}'");
        }

        let bytes = remote.fetch(&entry)?;
        self.store(&path, &bytes)?;
        info!(
            "cached '{catalog_key}' version {} ({} bytes)",
            entry.hash,
            bytes.len()
        );

        match bundle::decode(&bytes) {
            Ok(decoded) => Ok((entry, decoded)),
            Err(e) => {
                let _ = fs::remove_file(&path);
                Err(Error::CorruptSource {
                    identifier: catalog_key.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn store(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = path.parent().expect("bundle path always has a parent");
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}
