// tests/common/mod.rs

//! Shared fixtures for integration tests: a sandboxed world (workspace,
//! cache, output tree, manifest, roster), an in-memory remote source and
//! canonical test bundles.

use bundleforge::bundle::{self, Bundle, Entry, EntryKind, TextureHeader};
use bundleforge::remote::{CatalogEntry, RemoteSource};
use bundleforge::roster::{CharacterRecord, FileRoster};
use bundleforge::{Config, Engine, Error, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Sandboxed engine environment. Keep the `TempDir` alive for the test's
/// duration.
pub struct World {
    pub dir: TempDir,
    pub config: Config,
}

impl World {
    pub fn new() -> World {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.workspace_root = dir.path().join("workspace");
        config.paths.cache_dir = dir.path().join("sourcedata");
        config.paths.output_root = dir.path().join("target");
        config.paths.manifest = dir.path().join("manifest.json");
        config.paths.roster = dir.path().join("roster.json");
        config.run.max_concurrency = 4;
        World { dir, config }
    }

    /// Write one replacement file into `workspace/<ws>/<category>/<mod>/`.
    pub fn write_mod_file(
        &self,
        workspace: &str,
        category: &str,
        mod_name: &str,
        file_name: &str,
        bytes: &[u8],
    ) {
        let path = self
            .config
            .paths
            .workspace_root
            .join(workspace)
            .join(category)
            .join(mod_name)
            .join(file_name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    pub fn manifest_path(&self) -> &Path {
        &self.config.paths.manifest
    }

    pub fn output_root(&self) -> &Path {
        &self.config.paths.output_root
    }

    /// Build an engine over this world with the given roster and remote.
    pub fn engine(&self, roster: Vec<CharacterRecord>, remote: FakeRemote) -> Engine {
        Engine::new(
            self.config.clone(),
            Box::new(FileRoster::from_records(roster)),
            Box::new(remote),
        )
    }
}

/// Standard roster record: idle key `<id>-idle`, cutscene key `<id>-cut`.
pub fn record(char_id: &str, character: &str, costume: &str) -> CharacterRecord {
    CharacterRecord {
        char_id: char_id.to_string(),
        character: character.to_string(),
        costume: costume.to_string(),
        idle: format!("{char_id}-idle"),
        cutscene: format!("{char_id}-cut"),
    }
}

/// In-memory remote source with shared call counters.
#[derive(Default)]
pub struct FakeRemote {
    bundles: HashMap<String, Vec<u8>>,
    hash: String,
    pub resolves: Arc<AtomicUsize>,
    pub fetches: Arc<AtomicUsize>,
}

impl FakeRemote {
    pub fn new() -> FakeRemote {
        FakeRemote {
            bundles: HashMap::new(),
            hash: "v1".to_string(),
            resolves: Arc::new(AtomicUsize::new(0)),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish a bundle under a catalog key.
    pub fn publish(mut self, catalog_key: &str, bytes: Vec<u8>) -> Self {
        self.bundles.insert(catalog_key.to_string(), bytes);
        self
    }

    /// Handles to the call counters, surviving the move into the engine.
    pub fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (self.resolves.clone(), self.fetches.clone())
    }
}

impl RemoteSource for FakeRemote {
    fn resolve(&self, catalog_key: &str) -> Result<CatalogEntry> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let bytes = self
            .bundles
            .get(catalog_key)
            .ok_or_else(|| Error::SourceUnavailable {
                identifier: catalog_key.to_string(),
                reason: "not published".to_string(),
            })?;
        Ok(CatalogEntry {
            bundle_name: catalog_key.to_string(),
            readable_name: format!("{catalog_key}.bundle"),
            hash: self.hash.clone(),
            size: bytes.len() as u64,
        })
    }

    fn fetch(&self, entry: &CatalogEntry) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .bundles
            .get(&entry.bundle_name)
            .expect("fetch is only called after a successful resolve")
            .clone())
    }
}

/// Canonical source bundle: atlas + skeleton text entries named
/// `<prefix>.atlas` / `<prefix>.skel` and a texture entry named `<prefix>`.
pub fn source_bundle(prefix: &str, tex_width: u32, tex_height: u32) -> Vec<u8> {
    let pixels = vec![0x11u8; (tex_width * tex_height * 4) as usize];
    bundle::encode(&Bundle::new(vec![
        Entry::new(
            format!("{prefix}.atlas"),
            EntryKind::Atlas,
            b"original atlas".to_vec(),
        ),
        Entry::new(
            format!("{prefix}.skel"),
            EntryKind::Skeleton,
            vec![0x53, 0x4B, 0x45, 0x4C],
        ),
        Entry::new(
            prefix.to_string(),
            EntryKind::Texture,
            TextureHeader::build_payload(tex_width, tex_height, &pixels),
        ),
    ]))
    .unwrap()
}

/// Solid-color PNG bytes.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// The single run directory created under the output root for a workspace.
pub fn only_run_dir(output_root: &Path, workspace: &str) -> PathBuf {
    let ws_dir = output_root.join(workspace);
    let mut runs: Vec<PathBuf> = fs::read_dir(&ws_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    assert_eq!(runs.len(), 1, "expected exactly one run directory");
    runs.pop().unwrap()
}
