// src/manifest.rs

//! Persisted record of prior run outcomes, keyed by identifier.
//!
//! The manifest is what makes re-runs idempotent: change detection compares
//! each identifier's combined fingerprint against the stored one and skips
//! matches. It is owned by the package assembler, written exactly once per
//! run after every unit has reached a terminal state, and written atomically
//! (temp file + rename) so a crash never leaves it referencing an output that
//! was not fully written.
//!
//! Forward compatibility: unknown JSON fields are ignored on load, a missing
//! file is an empty history, and an unreadable file is treated as empty with
//! a warning - losing history costs a re-run, not correctness.

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::identifier::ResourceIdentifier;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MANIFEST_FORMAT: u32 = 1;

/// One identifier's last successful processing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub fingerprint: String,
    pub last_run_timestamp: DateTime<Utc>,
    pub output_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, ManifestEntry>,
}

/// In-memory manifest bound to its on-disk location.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Load the manifest, treating a missing file as empty history.
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<ManifestFile>(&bytes) {
                Ok(file) => {
                    debug!(
                        "loaded manifest v{} with {} entries from {}",
                        file.version,
                        file.entries.len(),
                        path.display()
                    );
                    file.entries
                }
                Err(e) => {
                    warn!(
                        "manifest {} is unreadable ({e}); treating all identifiers as changed",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no manifest at {}; no prior history", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                warn!(
                    "manifest {} could not be read ({e}); treating all identifiers as changed",
                    path.display()
                );
                BTreeMap::new()
            }
        };
        Manifest {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored fingerprint for an identifier, if any.
    pub fn fingerprint(&self, identifier: &ResourceIdentifier) -> Option<Fingerprint> {
        self.entries
            .get(identifier.as_str())
            .map(|e| Fingerprint::from_hex(e.fingerprint.clone()))
    }

    pub fn entry(&self, identifier: &ResourceIdentifier) -> Option<&ManifestEntry> {
        self.entries.get(identifier.as_str())
    }

    /// Record a successful run for one identifier. Takes effect on disk only
    /// at the next [`Manifest::persist`].
    pub fn record(
        &mut self,
        identifier: &ResourceIdentifier,
        fingerprint: &Fingerprint,
        output_path: PathBuf,
    ) {
        self.entries.insert(
            identifier.as_str().to_string(),
            ManifestEntry {
                fingerprint: fingerprint.as_hex().to_string(),
                last_run_timestamp: Utc::now(),
                output_path,
            },
        );
    }

    /// Persist atomically: serialize to a temp file in the manifest's
    /// directory, sync, then rename over the target.
    pub fn persist(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .map_err(|e| Error::ManifestIo(format!("creating {}: {e}", dir.display())))?;

        let file = ManifestFile {
            version: MANIFEST_FORMAT,
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| Error::ManifestIo(format!("serializing manifest: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::ManifestIo(format!("creating temp manifest: {e}")))?;
        tmp.write_all(&json)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Error::ManifestIo(format!("writing temp manifest: {e}")))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::ManifestIo(format!("renaming manifest into place: {e}")))?;

        debug!(
            "persisted manifest with {} entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Exclusive advisory lock guarding a manifest against concurrent engine
/// invocations. Held for the whole run; released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(manifest_path: &Path) -> Result<Self> {
        let path = manifest_path.with_extension("lock");
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| Error::ManifestIo(format!("creating {}: {e}", dir.display())))?;
        }
        let file = File::create(&path)
            .map_err(|e| Error::ManifestIo(format!("opening {}: {e}", path.display())))?;
        file.try_lock_exclusive().map_err(|e| {
            Error::ManifestIo(format!(
                "another run holds the lock at {}: {e}",
                path.display()
            ))
        })?;
        Ok(RunLock { file, path })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            warn!("releasing run lock {}: {e}", self.path.display());
        }
    }
}
