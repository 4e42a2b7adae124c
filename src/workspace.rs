// src/workspace.rs

//! Workspace scanning: turns the mod folder tree into replacement assets.
//!
//! Layout: `<workspace root>/<IDLE|CUTSCENE>/<mod name>/<files>`. The scan is
//! read-only. Files with unknown extensions are ignored; files whose names
//! match no identifier family are reported, not fatal. A stem shipping a
//! Spine JSON export without a binary `.skel` sibling cannot be packed, so
//! its atlas and texture siblings are excluded as well.

use crate::error::Error;
use crate::identifier::{AssetCategory, AssetKind, IdentifierRules, ResourceIdentifier};
use crate::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One replacement file, ready for change detection and injection.
#[derive(Debug, Clone)]
pub struct ReplacementAsset {
    pub identifier: ResourceIdentifier,
    pub path: PathBuf,
    /// Leaf file name, used to match container entries by name.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub category: AssetCategory,
    pub kind: AssetKind,
    pub mod_name: String,
}

/// Result of scanning a workspace.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub assets: Vec<ReplacementAsset>,
    /// Files whose names matched no identifier family: (file stem, error).
    pub unrecognized: Vec<(String, Error)>,
    /// Non-empty mod directories, in scan order.
    pub mod_names: Vec<String>,
}

impl ScanOutcome {
    pub fn mod_count(&self) -> usize {
        self.mod_names.len()
    }
}

/// Scan one workspace directory tree.
///
/// A missing workspace directory is an empty scan, not an error - the caller
/// reports the "no updates" outcome.
pub fn scan_workspace(root: &Path, rules: &IdentifierRules) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();

    if !root.exists() {
        warn!("workspace directory does not exist: {}", root.display());
        return Ok(outcome);
    }

    for category_entry in fs::read_dir(root)? {
        let category_entry = category_entry?;
        if !category_entry.file_type()?.is_dir() {
            continue;
        }
        let Some(category) = category_entry
            .file_name()
            .to_str()
            .and_then(AssetCategory::from_dir_name)
        else {
            debug!(
                "ignoring non-category directory {:?}",
                category_entry.file_name()
            );
            continue;
        };

        let mut mod_dirs: Vec<PathBuf> = fs::read_dir(category_entry.path())?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.path())
            .collect();
        mod_dirs.sort();

        for mod_dir in mod_dirs {
            scan_mod_dir(&mod_dir, category, rules, &mut outcome)?;
        }
    }

    debug!(
        "workspace scan: {} assets from {} mods, {} unrecognized files",
        outcome.assets.len(),
        outcome.mod_names.len(),
        outcome.unrecognized.len()
    );
    Ok(outcome)
}

fn scan_mod_dir(
    mod_dir: &Path,
    category: AssetCategory,
    rules: &IdentifierRules,
    outcome: &mut ScanOutcome,
) -> Result<()> {
    let mod_name = mod_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut files = Vec::new();
    for entry in WalkDir::new(mod_dir).follow_links(false) {
        let entry = entry.map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "walking {}: {e}",
                mod_dir.display()
            )))
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();

    if files.is_empty() {
        debug!("skipping empty mod directory: {}", mod_dir.display());
        return Ok(());
    }

    // Stems with a Spine JSON export but no binary skeleton cannot be packed;
    // drop their atlas/texture siblings too.
    let stem_of = |p: &Path| {
        p.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let json_stems: BTreeSet<String> = files
        .iter()
        .filter(|p| AssetKind::from_path(p) == Some(AssetKind::SpineJson))
        .map(|p| stem_of(p))
        .collect();
    let skel_stems: BTreeSet<String> = files
        .iter()
        .filter(|p| AssetKind::from_path(p) == Some(AssetKind::Skeleton))
        .map(|p| stem_of(p))
        .collect();
    let unpackable: BTreeSet<String> = json_stems.difference(&skel_stems).cloned().collect();

    let mut contributed = false;
    for path in files {
        let Some(kind) = AssetKind::from_path(&path) else {
            debug!("ignoring {}", path.display());
            continue;
        };

        if kind.is_injectable() && unpackable.contains(&stem_of(&path)) {
            warn!(
                "excluding {}: Spine JSON without a .skel sibling cannot be packed",
                path.display()
            );
            continue;
        }

        let identifier = match rules.extract(&path) {
            Ok(id) => id,
            Err(err) => {
                warn!("{err}");
                outcome.unrecognized.push((stem_of(&path), err));
                continue;
            }
        };

        let bytes = fs::read(&path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        outcome.assets.push(ReplacementAsset {
            identifier,
            path,
            file_name,
            bytes,
            category,
            kind,
            mod_name: mod_name.clone(),
        });
        contributed = true;
    }

    if contributed {
        outcome.mod_names.push(mod_name);
    }
    Ok(())
}

/// List the mod directories of a workspace with their file counts, for the
/// `workspaces` command. Empty directories are listed with a zero count.
pub fn list_mods(root: &Path) -> Result<Vec<(String, usize)>> {
    let mut mods = Vec::new();
    if !root.exists() {
        return Ok(mods);
    }
    for category_entry in fs::read_dir(root)? {
        let category_entry = category_entry?;
        if !category_entry.file_type()?.is_dir() {
            continue;
        }
        let Some(category) = category_entry
            .file_name()
            .to_str()
            .and_then(AssetCategory::from_dir_name)
        else {
            continue;
        };
        for mod_entry in fs::read_dir(category_entry.path())? {
            let mod_entry = mod_entry?;
            if !mod_entry.file_type()?.is_dir() {
                continue;
            }
            let count = WalkDir::new(mod_entry.path())
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .count();
            mods.push((
                format!("{}/{}", category, mod_entry.file_name().to_string_lossy()),
                count,
            ));
        }
    }
    mods.sort();
    Ok(mods)
}
