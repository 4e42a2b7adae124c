// src/identifier.rs

//! Resource identifier extraction from replacement file names.
//!
//! Mod authors name their files after the target resource
//! (`char000101.atlas`, `cutscene_illust_dating23.png`, ...). The extractor
//! strips the optional animation prefix and matches the remainder against an
//! ordered list of identifier-family prefixes. Rules are sorted longest-first
//! at construction, so when one family is a strict prefix of another the more
//! specific family wins.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Canonical key linking a replacement asset to its container entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentifier(String);

impl ResourceIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        ResourceIdentifier(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which animation slot a replacement targets, from the workspace layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetCategory {
    Idle,
    Cutscene,
}

impl AssetCategory {
    /// Parse a workspace directory name (`IDLE`, `CUTSCENE`).
    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "IDLE" => Some(AssetCategory::Idle),
            "CUTSCENE" => Some(AssetCategory::Cutscene),
            _ => None,
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            AssetCategory::Idle => "IDLE",
            AssetCategory::Cutscene => "CUTSCENE",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Replacement file classification by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// `.png` (or other raster) texture replacement.
    Texture,
    /// `.atlas` region table.
    Atlas,
    /// `.skel` binary skeleton.
    Skeleton,
    /// `.json` Spine JSON export; marks its stem as unpackable unless a
    /// `.skel` sibling exists.
    SpineJson,
    /// `.modfile` marker carrying only the identifier.
    Marker,
}

impl AssetKind {
    /// Classify by file extension. Unknown extensions return `None` and the
    /// file is ignored by the scan.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" => Some(AssetKind::Texture),
            "atlas" => Some(AssetKind::Atlas),
            "skel" => Some(AssetKind::Skeleton),
            "json" => Some(AssetKind::SpineJson),
            "modfile" => Some(AssetKind::Marker),
            _ => None,
        }
    }

    /// Whether payloads of this kind are written into containers.
    #[inline]
    pub fn is_injectable(&self) -> bool {
        matches!(self, AssetKind::Texture | AssetKind::Atlas | AssetKind::Skeleton)
    }
}

/// Animation prefixes stripped before family matching.
const STRIP_PREFIXES: [&str; 2] = ["cutscene_", "idle_"];

/// Identifier families known to the game's naming scheme.
const DEFAULT_FAMILIES: [&str; 8] = [
    "char",
    "illust_dating",
    "illust_talk",
    "illust_special",
    "specialillust",
    "specialIllust",
    "npc",
    "storypack",
];

/// Ordered identifier-family rules.
///
/// Longest prefix first; ties keep their given order. New game-specific
/// families are added by constructing with a custom list, no core changes.
#[derive(Debug, Clone)]
pub struct IdentifierRules {
    prefixes: Vec<String>,
}

impl Default for IdentifierRules {
    fn default() -> Self {
        Self::new(DEFAULT_FAMILIES.iter().map(|s| s.to_string()))
    }
}

impl IdentifierRules {
    pub fn new(prefixes: impl IntoIterator<Item = String>) -> Self {
        let mut prefixes: Vec<String> = prefixes.into_iter().collect();
        // Decreasing specificity: longer prefixes are tried first.
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        IdentifierRules { prefixes }
    }

    /// Derive the canonical identifier from a replacement file path.
    ///
    /// Fails with [`Error::UnrecognizedIdentifier`] when the stem matches no
    /// family; the caller records the failure and excludes the file from the
    /// work set.
    pub fn extract(&self, path: &Path) -> Result<ResourceIdentifier> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::UnrecognizedIdentifier(path.display().to_string()))?;

        let mut candidate = stem;
        for prefix in STRIP_PREFIXES {
            if let Some(rest) = candidate.strip_prefix(prefix) {
                candidate = rest;
                break;
            }
        }

        for family in &self.prefixes {
            if candidate.starts_with(family.as_str()) {
                return Ok(ResourceIdentifier::new(candidate));
            }
        }

        Err(Error::UnrecognizedIdentifier(path.display().to_string()))
    }

    /// The matching family for an already-extracted identifier, if any.
    pub fn family_of(&self, identifier: &ResourceIdentifier) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|p| identifier.as_str().starts_with(p.as_str()))
            .map(|p| p.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn extract(name: &str) -> Result<ResourceIdentifier> {
        IdentifierRules::default().extract(&PathBuf::from(name))
    }

    #[test]
    fn plain_char_id() {
        assert_eq!(extract("char000101.atlas").unwrap().as_str(), "char000101");
    }

    #[test]
    fn strips_animation_prefixes() {
        assert_eq!(
            extract("cutscene_char000101.skel").unwrap().as_str(),
            "char000101"
        );
        assert_eq!(extract("idle_npc0042.png").unwrap().as_str(), "npc0042");
    }

    #[test]
    fn only_first_animation_prefix_is_stripped() {
        // A second occurrence is part of the identifier, not a prefix.
        assert_eq!(
            extract("idle_storypack_idle_07.atlas").unwrap().as_str(),
            "storypack_idle_07"
        );
    }

    #[test]
    fn illust_families_match() {
        assert_eq!(
            extract("illust_dating23.png").unwrap().as_str(),
            "illust_dating23"
        );
        assert_eq!(
            extract("specialIllust11.modfile").unwrap().as_str(),
            "specialIllust11"
        );
    }

    #[test]
    fn unknown_family_is_rejected() {
        let err = extract("weapon_sword01.png").unwrap_err();
        assert!(matches!(err, Error::UnrecognizedIdentifier(_)));
    }

    #[test]
    fn longer_prefix_wins_over_its_strict_prefix() {
        // "illust_special" is a strict extension of "illust_"; a name matching
        // both must resolve through the longer rule.
        let rules = IdentifierRules::new(vec!["illust_".to_string(), "illust_special".to_string()]);
        let id = rules.extract(&PathBuf::from("illust_special09.atlas")).unwrap();
        assert_eq!(rules.family_of(&id), Some("illust_special"));

        // The looser rule still catches names only it matches.
        let id = rules.extract(&PathBuf::from("illust_other01.atlas")).unwrap();
        assert_eq!(rules.family_of(&id), Some("illust_"));
    }

    #[test]
    fn asset_kind_classification() {
        assert_eq!(
            AssetKind::from_path(Path::new("a/char000101.PNG")),
            Some(AssetKind::Texture)
        );
        assert_eq!(
            AssetKind::from_path(Path::new("char000101.atlas")),
            Some(AssetKind::Atlas)
        );
        assert_eq!(
            AssetKind::from_path(Path::new("char000101.skel")),
            Some(AssetKind::Skeleton)
        );
        assert_eq!(
            AssetKind::from_path(Path::new("char000101.json")),
            Some(AssetKind::SpineJson)
        );
        assert_eq!(AssetKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(AssetKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn category_from_dir_name() {
        assert_eq!(AssetCategory::from_dir_name("IDLE"), Some(AssetCategory::Idle));
        assert_eq!(
            AssetCategory::from_dir_name("CUTSCENE"),
            Some(AssetCategory::Cutscene)
        );
        assert_eq!(AssetCategory::from_dir_name("OTHER"), None);
    }
}
