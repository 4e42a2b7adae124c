// src/workset.rs

//! Change detection: decides which identifiers actually need work.
//!
//! Replacement assets are grouped per logical target - an identifier within
//! an animation category, written `char000101@IDLE` in manifests and reports,
//! since the idle and cutscene slots of one character live in different
//! bundles. Each group's combined fingerprint is compared against the
//! manifest; matches are skipped, which is the idempotence guarantee: a
//! re-run over unchanged inputs produces zero work units.

use crate::error::ErrorKind;
use crate::fingerprint::Fingerprint;
use crate::identifier::{AssetCategory, ResourceIdentifier};
use crate::manifest::Manifest;
use crate::roster::Roster;
use crate::workspace::ReplacementAsset;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The unit of concurrent processing: one identifier in one category.
#[derive(Debug)]
pub struct WorkUnit {
    /// Qualified identifier used for manifest keys and reporting.
    pub unit_id: ResourceIdentifier,
    pub identifier: ResourceIdentifier,
    pub category: AssetCategory,
    /// Key under which the game's catalog publishes the source bundle.
    pub catalog_key: String,
    /// `character/costume` label for reports.
    pub display_name: String,
    /// Contributing mod directories, in scan order.
    pub mod_names: Vec<String>,
    pub assets: Vec<ReplacementAsset>,
    pub fingerprint: Fingerprint,
}

/// Output of change detection.
#[derive(Debug, Default)]
pub struct WorkSet {
    pub units: Vec<WorkUnit>,
    /// Unchanged identifiers (qualified), no work emitted.
    pub skipped: Vec<ResourceIdentifier>,
    /// Identifiers that failed before reaching the scheduler.
    pub failed: Vec<(String, ErrorKind)>,
}

impl WorkSet {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Qualified form of an identifier within a category.
pub fn qualified_id(
    identifier: &ResourceIdentifier,
    category: AssetCategory,
) -> ResourceIdentifier {
    ResourceIdentifier::new(format!("{identifier}@{}", category.dir_name()))
}

/// Group assets per target, fingerprint each group and compare against the
/// manifest. Unchanged targets are skipped; targets the roster cannot resolve
/// or that carry nothing packable fail here, without consuming a worker.
pub fn compute_work_set(
    assets: Vec<ReplacementAsset>,
    manifest: &Manifest,
    roster: &dyn Roster,
) -> WorkSet {
    let mut groups: BTreeMap<(ResourceIdentifier, &'static str), Vec<ReplacementAsset>> =
        BTreeMap::new();
    for asset in assets {
        groups
            .entry((asset.identifier.clone(), asset.category.dir_name()))
            .or_default()
            .push(asset);
    }

    let mut set = WorkSet::default();

    for ((identifier, _), group) in groups {
        let category = group[0].category;
        let unit_id = qualified_id(&identifier, category);

        let fingerprint = Fingerprint::combined(
            group
                .iter()
                .map(|a| (a.file_name.as_str(), a.bytes.as_slice())),
        );

        if manifest.fingerprint(&unit_id).as_ref() == Some(&fingerprint) {
            debug!("{unit_id}: unchanged since last run, skipping");
            set.skipped.push(unit_id);
            continue;
        }

        if !group.iter().any(|a| a.kind.is_injectable()) {
            info!("{unit_id}: changed but carries nothing packable");
            set.failed
                .push((unit_id.as_str().to_string(), ErrorKind::UnrecognizedIdentifier));
            continue;
        }

        let Some(record) = roster.lookup(&identifier) else {
            info!("{unit_id}: identifier not present in the roster");
            set.failed
                .push((unit_id.as_str().to_string(), ErrorKind::UnrecognizedIdentifier));
            continue;
        };

        let Some(catalog_key) = record.catalog_key(category) else {
            info!(
                "{unit_id}: roster record has no {} catalog key",
                category.dir_name()
            );
            set.failed
                .push((unit_id.as_str().to_string(), ErrorKind::UnrecognizedIdentifier));
            continue;
        };

        let mut mod_names: Vec<String> = Vec::new();
        for asset in &group {
            if !mod_names.contains(&asset.mod_name) {
                mod_names.push(asset.mod_name.clone());
            }
        }

        set.units.push(WorkUnit {
            unit_id,
            identifier: identifier.clone(),
            category,
            catalog_key: catalog_key.to_string(),
            display_name: record.display_name(),
            mod_names,
            assets: group,
            fingerprint,
        });
    }

    info!(
        "work set: {} to process, {} unchanged, {} failed early",
        set.units.len(),
        set.skipped.len(),
        set.failed.len()
    );
    set
}
