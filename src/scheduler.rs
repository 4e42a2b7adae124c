// src/scheduler.rs

//! Bounded fan-out of work units.
//!
//! Each unit walks `Pending -> Fetching -> Injecting -> Encoding -> Done |
//! Failed`, monotonically, entirely on one worker: the bundle handle is never
//! shared across threads. Units are independent; a failure is captured in the
//! unit's outcome and never aborts siblings. Results come back through the
//! parallel iterator's collection point - there is no shared accumulator.
//!
//! Cancellation stops dispatching: units that have not started return
//! `Cancelled` (reported as skipped), in-flight units run to completion.

use crate::cache::SourceCache;
use crate::error::{Error, ErrorKind};
use crate::inject;
use crate::remote::RemoteSource;
use crate::workset::WorkUnit;
use crate::{bundle, Result};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Work-unit lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitState {
    Pending,
    Fetching,
    Injecting,
    Encoding,
    Done,
    Failed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitState::Pending => "pending",
            UnitState::Fetching => "fetching",
            UnitState::Injecting => "injecting",
            UnitState::Encoding => "encoding",
            UnitState::Done => "done",
            UnitState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Tracks one unit's state and enforces forward-only transitions.
struct UnitProgress<'a> {
    unit_id: &'a str,
    state: UnitState,
}

impl<'a> UnitProgress<'a> {
    fn new(unit_id: &'a str) -> Self {
        UnitProgress {
            unit_id,
            state: UnitState::Pending,
        }
    }

    fn advance(&mut self, to: UnitState) {
        debug_assert!(to > self.state, "unit state must only move forward");
        debug!("{}: {} -> {to}", self.unit_id, self.state);
        self.state = to;
    }
}

/// Terminal status of one unit.
#[derive(Debug)]
pub enum UnitStatus {
    /// Encoded container written to `output_path`.
    Done { output_path: PathBuf },
    Failed { kind: ErrorKind, message: String },
    /// Never dispatched because the run was cancelled.
    Cancelled,
}

/// A consumed unit plus how it ended.
#[derive(Debug)]
pub struct UnitOutcome {
    pub unit: WorkUnit,
    pub status: UnitStatus,
}

/// Cooperative cancellation shared between the run and its watchers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Arm a run-level timeout: the token cancels itself after `timeout`.
    pub fn arm_timeout(&self, timeout: Duration) {
        let token = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(timeout);
            if !token.is_cancelled() {
                info!("run timeout reached after {timeout:?}; cancelling remaining units");
                token.cancel();
            }
        });
    }
}

/// Bounded worker pool over work units.
pub struct Scheduler {
    pool: rayon::ThreadPool,
    cancel: CancelToken,
}

impl Scheduler {
    pub fn new(max_concurrency: usize, cancel: CancelToken) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_concurrency.max(1))
            .build()
            .map_err(|e| Error::Config(format!("building worker pool: {e}")))?;
        Ok(Scheduler { pool, cancel })
    }

    /// Process every unit, collecting one outcome per unit. Never fails as a
    /// whole: per-unit errors land in the unit's outcome.
    pub fn run(
        &self,
        units: Vec<WorkUnit>,
        cache: &SourceCache,
        remote: &dyn RemoteSource,
        run_dir: &Path,
    ) -> Vec<UnitOutcome> {
        info!(
            "scheduling {} unit(s) across up to {} worker(s)",
            units.len(),
            self.pool.current_num_threads()
        );
        self.pool.install(|| {
            units
                .into_par_iter()
                .map(|unit| self.process(unit, cache, remote, run_dir))
                .collect()
        })
    }

    fn process(
        &self,
        unit: WorkUnit,
        cache: &SourceCache,
        remote: &dyn RemoteSource,
        run_dir: &Path,
    ) -> UnitOutcome {
        if self.cancel.is_cancelled() {
            debug!("{}: cancelled before dispatch", unit.unit_id);
            return UnitOutcome {
                unit,
                status: UnitStatus::Cancelled,
            };
        }

        let status = match run_unit(&unit, cache, remote, run_dir) {
            Ok(output_path) => {
                info!("{}: done -> {}", unit.unit_id, output_path.display());
                UnitStatus::Done { output_path }
            }
            Err(e) => {
                error!("{}: {e}", unit.unit_id);
                UnitStatus::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        };
        UnitOutcome { unit, status }
    }
}

/// The whole per-unit pipeline: fetch, decode, inject, encode, write.
fn run_unit(
    unit: &WorkUnit,
    cache: &SourceCache,
    remote: &dyn RemoteSource,
    run_dir: &Path,
) -> crate::error::Result<PathBuf> {
    let mut progress = UnitProgress::new(unit.unit_id.as_str());

    progress.advance(UnitState::Fetching);
    let (entry, source) = cache.fetch(&unit.catalog_key, remote)?;

    progress.advance(UnitState::Injecting);
    let injected = inject::inject(&source, &unit.identifier, &unit.assets)?;

    progress.advance(UnitState::Encoding);
    let bytes = bundle::encode(&injected)?;

    let target_dir = run_dir.join(&unit.catalog_key).join(&entry.hash);
    std::fs::create_dir_all(&target_dir)?;
    let output_path = target_dir.join("__data");
    std::fs::write(&output_path, &bytes)?;

    progress.advance(UnitState::Done);
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{Bundle, Entry, EntryKind};
    use crate::identifier::{AssetCategory, AssetKind, ResourceIdentifier};
    use crate::remote::CatalogEntry;
    use crate::workspace::ReplacementAsset;
    use crate::workset::qualified_id;
    use std::path::PathBuf;

    struct StaticRemote {
        bytes: Vec<u8>,
    }

    impl RemoteSource for StaticRemote {
        fn resolve(&self, catalog_key: &str) -> crate::error::Result<CatalogEntry> {
            Ok(CatalogEntry {
                bundle_name: catalog_key.to_string(),
                readable_name: format!("{catalog_key}.bundle"),
                hash: "v1".to_string(),
                size: self.bytes.len() as u64,
            })
        }
        fn fetch(&self, _entry: &CatalogEntry) -> crate::error::Result<Vec<u8>> {
            Ok(self.bytes.clone())
        }
    }

    fn unit_for(id: &str, atlas_payload: &[u8]) -> WorkUnit {
        let identifier = ResourceIdentifier::new(id);
        let file_name = format!("{id}.atlas");
        WorkUnit {
            unit_id: qualified_id(&identifier, AssetCategory::Idle),
            identifier: identifier.clone(),
            category: AssetCategory::Idle,
            catalog_key: format!("{id}-idle"),
            display_name: format!("{id}/Default"),
            mod_names: vec!["m1".to_string()],
            assets: vec![ReplacementAsset {
                identifier,
                path: PathBuf::from(&file_name),
                file_name,
                bytes: atlas_payload.to_vec(),
                category: AssetCategory::Idle,
                kind: AssetKind::Atlas,
                mod_name: "m1".to_string(),
            }],
            fingerprint: crate::fingerprint::Fingerprint::of_bytes(atlas_payload),
        }
    }

    fn source_bytes(id: &str) -> Vec<u8> {
        bundle::encode(&Bundle::new(vec![Entry::new(
            format!("{id}.atlas"),
            EntryKind::Atlas,
            b"original".to_vec(),
        )]))
        .unwrap()
    }

    #[test]
    fn unit_runs_to_done_and_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SourceCache::new(dir.path().join("cache")).unwrap();
        let remote = StaticRemote {
            bytes: source_bytes("char000101"),
        };
        let run_dir = dir.path().join("run");
        std::fs::create_dir_all(&run_dir).unwrap();

        let scheduler = Scheduler::new(2, CancelToken::new()).unwrap();
        let outcomes = scheduler.run(
            vec![unit_for("char000101", b"replacement atlas")],
            &cache,
            &remote,
            &run_dir,
        );

        assert_eq!(outcomes.len(), 1);
        let UnitStatus::Done { output_path } = &outcomes[0].status else {
            panic!("expected Done, got {:?}", outcomes[0].status);
        };
        let written = std::fs::read(output_path).unwrap();
        let decoded = bundle::decode(&written).unwrap();
        assert_eq!(&*decoded.entries[0].payload, b"replacement atlas");
    }

    #[test]
    fn failure_is_isolated_to_its_unit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SourceCache::new(dir.path().join("cache")).unwrap();
        // The remote only knows char000101's entry name, so char000202's
        // replacements will match nothing and that unit alone fails.
        let remote = StaticRemote {
            bytes: source_bytes("char000101"),
        };
        let run_dir = dir.path().join("run");
        std::fs::create_dir_all(&run_dir).unwrap();

        let scheduler = Scheduler::new(4, CancelToken::new()).unwrap();
        let outcomes = scheduler.run(
            vec![
                unit_for("char000101", b"good"),
                unit_for("char000202", b"matches nothing"),
            ],
            &cache,
            &remote,
            &run_dir,
        );

        let done = outcomes
            .iter()
            .filter(|o| matches!(o.status, UnitStatus::Done { .. }))
            .count();
        let failed: Vec<_> = outcomes
            .iter()
            .filter_map(|o| match &o.status {
                UnitStatus::Failed { kind, .. } => Some((o.unit.unit_id.as_str(), *kind)),
                _ => None,
            })
            .collect();

        assert_eq!(done, 1);
        assert_eq!(
            failed,
            vec![("char000202@IDLE", ErrorKind::UnrecognizedIdentifier)]
        );
    }

    #[test]
    fn cancelled_run_dispatches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SourceCache::new(dir.path().join("cache")).unwrap();
        let remote = StaticRemote {
            bytes: source_bytes("char000101"),
        };
        let run_dir = dir.path().join("run");
        std::fs::create_dir_all(&run_dir).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let scheduler = Scheduler::new(2, cancel).unwrap();
        let outcomes = scheduler.run(
            vec![unit_for("char000101", b"x"), unit_for("char000202", b"y")],
            &cache,
            &remote,
            &run_dir,
        );

        assert!(outcomes
            .iter()
            .all(|o| matches!(o.status, UnitStatus::Cancelled)));
    }

    #[test]
    fn state_order_is_monotonic() {
        assert!(UnitState::Pending < UnitState::Fetching);
        assert!(UnitState::Fetching < UnitState::Injecting);
        assert!(UnitState::Injecting < UnitState::Encoding);
        assert!(UnitState::Encoding < UnitState::Done);
    }
}
