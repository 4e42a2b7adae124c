// src/assembler.rs

//! Package assembly: the per-run output tree, reports, run summary and the
//! final manifest persist.
//!
//! Run directories are named by UTC timestamp so the output root sorts by
//! creation time. The manifest is updated in memory per succeeded unit and
//! persisted exactly once, after every unit has reached a terminal state;
//! a failure of that persist fails the whole run.

use crate::error::{ErrorKind, Result};
use crate::identifier::ResourceIdentifier;
use crate::manifest::Manifest;
use crate::scheduler::{UnitOutcome, UnitStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Aggregate of per-unit outcomes. Every discovered identifier lands in
/// exactly one bucket - nothing is silently omitted.
#[derive(Debug, Default, Serialize)]
pub struct RunResult {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, ErrorKind)>,
    pub skipped: Vec<String>,
}

impl RunResult {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }
}

/// Machine-readable run summary, handed to any post-run hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub package_time: String,
    pub workspace_name: String,
    pub mod_count: usize,
    pub mod_list: Vec<String>,
}

/// Summary file name at the run root.
pub const SUMMARY_FILE: &str = "package_result.json";

pub struct Assembler {
    output_root: PathBuf,
    workspace_name: String,
}

impl Assembler {
    pub fn new(output_root: impl Into<PathBuf>, workspace_name: impl Into<String>) -> Self {
        Assembler {
            output_root: output_root.into(),
            workspace_name: workspace_name.into(),
        }
    }

    /// Create this run's output directory. Called only once a non-empty work
    /// set exists; an empty run never touches the output tree.
    pub fn create_run_dir(&self) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let run_dir = self
            .output_root
            .join(&self.workspace_name)
            .join(stamp.to_string());
        fs::create_dir_all(&run_dir)?;
        info!("run output directory: {}", run_dir.display());
        Ok(run_dir)
    }

    /// Fold all terminal outcomes into a [`RunResult`], write reports and the
    /// summary artifact, record succeeded units in the manifest and persist
    /// it. The persist happens last; its failure fails the run.
    pub fn assemble(
        &self,
        run_dir: &Path,
        outcomes: Vec<UnitOutcome>,
        early_failures: Vec<(String, ErrorKind)>,
        unchanged: Vec<ResourceIdentifier>,
        manifest: &mut Manifest,
    ) -> Result<(RunResult, RunSummary)> {
        let mut result = RunResult {
            failed: early_failures,
            skipped: unchanged.iter().map(|id| id.as_str().to_string()).collect(),
            ..RunResult::default()
        };

        let mut mod_list: Vec<String> = Vec::new();
        for outcome in &outcomes {
            for name in &outcome.unit.mod_names {
                if !mod_list.contains(name) {
                    mod_list.push(name.clone());
                }
            }
        }

        for outcome in outcomes {
            let unit = outcome.unit;
            match outcome.status {
                UnitStatus::Done { output_path } => {
                    if let Err(e) = write_target_readme(&unit, &output_path) {
                        warn!("{}: writing README: {e}", unit.unit_id);
                    }
                    manifest.record(&unit.unit_id, &unit.fingerprint, output_path);
                    result.succeeded.push(unit.unit_id.as_str().to_string());
                }
                UnitStatus::Failed { kind, message } => {
                    warn!("{}: {message}", unit.unit_id);
                    result.failed.push((unit.unit_id.as_str().to_string(), kind));
                }
                UnitStatus::Cancelled => {
                    result.skipped.push(unit.unit_id.as_str().to_string());
                }
            }
        }

        let summary = RunSummary {
            package_time: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            workspace_name: self.workspace_name.clone(),
            mod_count: mod_list.len(),
            mod_list,
        };

        let summary_path = run_dir.join(SUMMARY_FILE);
        fs::write(
            &summary_path,
            serde_json::to_vec_pretty(&summary)
                .expect("run summary always serializes"),
        )?;
        info!("run summary written to {}", summary_path.display());

        // Terminal barrier passed: persist the manifest. Fatal on failure.
        manifest.persist()?;

        info!(
            "run complete: {} succeeded, {} failed, {} skipped",
            result.succeeded.len(),
            result.failed.len(),
            result.skipped.len()
        );
        Ok((result, summary))
    }
}

/// Human-readable report next to one target's `__data`.
fn write_target_readme(unit: &crate::workset::WorkUnit, output_path: &Path) -> Result<()> {
    let readme_path = output_path
        .parent()
        .unwrap_or(Path::new("."))
        .join("README.txt");
    let mut file = fs::File::create(&readme_path)?;

    writeln!(file, "Mod resource package")?;
    writeln!(file, "====================")?;
    writeln!(file)?;
    writeln!(
        file,
        "Generated: {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(file, "Character: {}", unit.display_name)?;
    writeln!(file, "Identifier: {}", unit.identifier)?;
    writeln!(file, "Category: {}", unit.category)?;
    writeln!(file, "Contributing mods:")?;
    for name in &unit.mod_names {
        writeln!(file, "  - {name}")?;
    }
    writeln!(file)?;
    writeln!(file, "Copy the __data file over the matching game resource,")?;
    writeln!(file, "keeping the directory structure, then restart the game.")?;
    Ok(())
}
