// src/lib.rs

//! bundleforge
//!
//! Asset-bundle replacement engine for game mod packaging: replaces embedded
//! textures, animation atlases and skeleton data inside the game's binary
//! resource containers with user-supplied replacement art, then re-emits
//! valid containers and a distributable package.
//!
//! # Architecture
//!
//! - Identifier extraction: file names carry canonical resource identifiers
//! - Manifest + change detection: fingerprint comparison makes re-runs
//!   idempotent
//! - Source cache: content-addressed store of downloaded bundles, one
//!   in-flight fetch per key
//! - Container codec: structure-of-indices decode/encode with rederived
//!   offset tables
//! - Work scheduler: bounded fan-out, one worker owns a unit end to end
//! - Package assembler: timestamped output trees, run summary, atomic
//!   manifest persist

pub mod assembler;
pub mod bundle;
pub mod cache;
pub mod commands;
pub mod config;
pub mod engine;
mod error;
pub mod fingerprint;
pub mod identifier;
pub mod inject;
pub mod manifest;
pub mod remote;
pub mod roster;
pub mod scheduler;
pub mod workset;
pub mod workspace;

pub use assembler::{Assembler, RunResult, RunSummary};
pub use config::Config;
pub use engine::{Engine, PlanReport, RunReport};
pub use error::{Error, ErrorKind, Result};
pub use fingerprint::Fingerprint;
pub use identifier::{AssetCategory, AssetKind, IdentifierRules, ResourceIdentifier};
pub use manifest::{Manifest, ManifestEntry, RunLock};
pub use remote::{CatalogEntry, CdnClient, RemoteSource};
pub use roster::{CharacterRecord, FileRoster, Roster};
pub use scheduler::{CancelToken, Scheduler, UnitOutcome, UnitState, UnitStatus};
pub use workset::{compute_work_set, WorkSet, WorkUnit};
