// src/engine.rs

//! Run orchestration: ties scanning, change detection, scheduling and
//! assembly into one engine call.
//!
//! The engine owns no ambient state - manifest, cache and lock are opened at
//! run start and flushed/released at run end. An empty work set short-circuits
//! before the source cache, scheduler or output tree are touched: that is the
//! explicit "no updates" outcome, distinct from a failed run.

use crate::assembler::{Assembler, RunResult, RunSummary};
use crate::cache::SourceCache;
use crate::config::Config;
use crate::error::Result;
use crate::identifier::IdentifierRules;
use crate::manifest::{Manifest, RunLock};
use crate::remote::RemoteSource;
use crate::roster::Roster;
use crate::scheduler::{CancelToken, Scheduler};
use crate::workset::{self, WorkSet};
use crate::workspace;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Everything a run produced, for the CLI and any post-run hook.
#[derive(Debug)]
pub struct RunReport {
    pub result: RunResult,
    pub summary: RunSummary,
    /// Absent when the run short-circuited with no updates.
    pub run_dir: Option<PathBuf>,
}

impl RunReport {
    pub fn no_updates(&self) -> bool {
        self.run_dir.is_none()
    }
}

/// Dry-run view of a workspace, for `status`.
#[derive(Debug)]
pub struct PlanReport {
    pub mod_names: Vec<String>,
    /// File stems that matched no identifier family.
    pub unrecognized: Vec<String>,
    pub set: WorkSet,
}

/// The container replacement engine.
pub struct Engine {
    config: Config,
    roster: Box<dyn Roster>,
    remote: Box<dyn RemoteSource>,
    rules: IdentifierRules,
}

impl Engine {
    pub fn new(config: Config, roster: Box<dyn Roster>, remote: Box<dyn RemoteSource>) -> Self {
        Engine {
            config,
            roster,
            remote,
            rules: IdentifierRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: IdentifierRules) -> Self {
        self.rules = rules;
        self
    }

    /// Scan a workspace and compute its work set without executing anything.
    /// Backs the `status` command.
    pub fn plan(&self, workspace: &str) -> Result<PlanReport> {
        let root = self.config.workspace_path(workspace);
        let scan = workspace::scan_workspace(&root, &self.rules)?;
        let manifest = Manifest::load(&self.config.paths.manifest);

        let mod_names = scan.mod_names;
        let unrecognized = scan.unrecognized.into_iter().map(|(stem, _)| stem).collect();
        let set = workset::compute_work_set(scan.assets, &manifest, self.roster.as_ref());
        Ok(PlanReport {
            mod_names,
            unrecognized,
            set,
        })
    }

    /// Execute a full run for one workspace.
    pub fn run(&self, workspace: &str, cancel: CancelToken) -> Result<RunReport> {
        info!("packing workspace '{workspace}'");

        let _lock = RunLock::acquire(&self.config.paths.manifest)?;
        let mut manifest = Manifest::load(&self.config.paths.manifest);

        let root = self.config.workspace_path(workspace);
        let scan = workspace::scan_workspace(&root, &self.rules)?;
        let mod_count = scan.mod_count();

        let mut early_failures: Vec<(String, crate::error::ErrorKind)> = scan
            .unrecognized
            .iter()
            .map(|(stem, err)| (stem.clone(), err.kind()))
            .collect();

        let set = workset::compute_work_set(scan.assets, &manifest, self.roster.as_ref());
        early_failures.extend(set.failed);

        if set.units.is_empty() {
            info!(
                "no updates for '{workspace}': {} unchanged, {} failed early",
                set.skipped.len(),
                early_failures.len()
            );
            return Ok(RunReport {
                result: RunResult {
                    succeeded: Vec::new(),
                    failed: early_failures,
                    skipped: set
                        .skipped
                        .iter()
                        .map(|id| id.as_str().to_string())
                        .collect(),
                },
                summary: RunSummary {
                    package_time: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                    workspace_name: workspace.to_string(),
                    mod_count: 0,
                    mod_list: Vec::new(),
                },
                run_dir: None,
            });
        }

        info!(
            "{} unit(s) to process from {} mod(s)",
            set.units.len(),
            mod_count
        );

        let cache = SourceCache::new(&self.config.paths.cache_dir)?;
        let assembler = Assembler::new(&self.config.paths.output_root, workspace);
        let run_dir = assembler.create_run_dir()?;

        if let Some(secs) = self.config.run.timeout_secs {
            cancel.arm_timeout(Duration::from_secs(secs));
        }
        let scheduler = Scheduler::new(self.config.run.max_concurrency, cancel)?;
        let outcomes = scheduler.run(set.units, &cache, self.remote.as_ref(), &run_dir);

        let (result, summary) =
            assembler.assemble(&run_dir, outcomes, early_failures, set.skipped, &mut manifest)?;

        Ok(RunReport {
            result,
            summary,
            run_dir: Some(run_dir),
        })
    }
}
