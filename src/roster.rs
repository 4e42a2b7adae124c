// src/roster.rs

//! Character metadata source.
//!
//! Maps a resource identifier to display names and to the catalog keys under
//! which the game publishes the matching bundles. The engine only consumes
//! this as a lookup table; where the records come from (a bundled file, an
//! export from a community sheet) is the caller's concern.

use crate::error::{Error, Result};
use crate::identifier::{AssetCategory, ResourceIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// One character/costume record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub char_id: String,
    pub character: String,
    pub costume: String,
    /// Catalog key of the idle-animation bundle.
    #[serde(default)]
    pub idle: String,
    /// Catalog key of the cutscene bundle; empty when the costume has none.
    #[serde(default)]
    pub cutscene: String,
}

impl CharacterRecord {
    /// Catalog key for the requested category, if the costume has one.
    pub fn catalog_key(&self, category: AssetCategory) -> Option<&str> {
        let key = match category {
            AssetCategory::Idle => self.idle.as_str(),
            AssetCategory::Cutscene => self.cutscene.as_str(),
        };
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// `character/costume` label for reports.
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.character, self.costume)
    }
}

/// Identifier -> character record lookup.
pub trait Roster: Send + Sync {
    fn lookup(&self, identifier: &ResourceIdentifier) -> Option<&CharacterRecord>;
}

/// Roster backed by a JSON file: an array of [`CharacterRecord`]s.
#[derive(Debug, Default)]
pub struct FileRoster {
    records: HashMap<String, CharacterRecord>,
}

impl FileRoster {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            Error::Config(format!("reading roster {}: {e}", path.display()))
        })?;
        let records: Vec<CharacterRecord> = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Config(format!("parsing roster {}: {e}", path.display())))?;
        debug!("loaded {} roster records from {}", records.len(), path.display());
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<CharacterRecord>) -> Self {
        FileRoster {
            records: records
                .into_iter()
                .map(|r| (r.char_id.clone(), r))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Roster for FileRoster {
    fn lookup(&self, identifier: &ResourceIdentifier) -> Option<&CharacterRecord> {
        self.records.get(identifier.as_str())
    }
}
