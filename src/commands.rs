// src/commands.rs

//! Command handlers for the bundleforge CLI.

use crate::bundle;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::remote::CdnClient;
use crate::roster::FileRoster;
use crate::scheduler::CancelToken;
use crate::workspace;
use std::fs;
use std::path::Path;
use tracing::info;

fn build_engine(config: Config) -> Result<Engine> {
    let roster = FileRoster::load(&config.paths.roster)?;
    if config.network.catalog_url.is_empty() || config.network.cdn_base_url.is_empty() {
        return Err(Error::Config(
            "network.catalog_url and network.cdn_base_url must be set".to_string(),
        ));
    }
    let remote = CdnClient::with_retries(
        &config.network.catalog_url,
        &config.network.cdn_base_url,
        config.network.max_retries,
    )?;
    Ok(Engine::new(config, Box::new(roster), Box::new(remote)))
}

/// `pack`: run the full replacement pipeline for one workspace.
///
/// Exit contract: `Ok(true)` when every unit succeeded or was skipped,
/// `Ok(false)` when at least one unit failed, `Err` only for run-level
/// failures (lock contention, manifest persist).
pub fn cmd_pack(workspace: &str, config: Config) -> Result<bool> {
    let engine = build_engine(config)?;
    let cancel = CancelToken::new();
    let report = engine.run(workspace, cancel)?;

    if report.no_updates() {
        println!("No updates for workspace '{workspace}'.");
    } else {
        println!(
            "Packaged workspace '{workspace}' ({} mods) -> {}",
            report.summary.mod_count,
            report
                .run_dir
                .as_deref()
                .unwrap_or(Path::new("?"))
                .display()
        );
    }

    println!(
        "  succeeded: {}  failed: {}  skipped: {}",
        report.result.succeeded.len(),
        report.result.failed.len(),
        report.result.skipped.len()
    );
    for (identifier, kind) in &report.result.failed {
        println!("  failed {identifier}: {kind}");
    }

    Ok(report.result.failed.is_empty())
}

/// `status`: dry-run change detection report for one workspace.
pub fn cmd_status(workspace: &str, config: Config) -> Result<()> {
    let engine = build_engine(config)?;
    let plan = engine.plan(workspace)?;

    println!(
        "Workspace '{workspace}': {} mod(s), {} unit(s) to process, {} unchanged",
        plan.mod_names.len(),
        plan.set.units.len(),
        plan.set.skipped.len()
    );
    for unit in &plan.set.units {
        println!(
            "  {} ({}) via catalog key '{}'",
            unit.unit_id, unit.display_name, unit.catalog_key
        );
    }
    for id in &plan.set.skipped {
        println!("  {id} (unchanged)");
    }
    for (id, kind) in &plan.set.failed {
        println!("  {id}: would fail ({kind})");
    }
    for stem in &plan.unrecognized {
        println!("  {stem}: unrecognized identifier");
    }
    Ok(())
}

/// `workspaces`: list workspaces under the configured root with mod counts.
pub fn cmd_workspaces(config: Config) -> Result<()> {
    let root = &config.paths.workspace_root;
    if !root.exists() {
        println!("Workspace root {} does not exist.", root.display());
        return Ok(());
    }

    let mut names: Vec<String> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    if names.is_empty() {
        println!("No workspaces under {}.", root.display());
        return Ok(());
    }
    for name in names {
        let mods = workspace::list_mods(&root.join(&name))?;
        println!("{name}: {} mod director(ies)", mods.len());
        for (mod_path, files) in mods {
            println!("  {mod_path} ({files} file(s))");
        }
    }
    Ok(())
}

/// `inspect`: decode a container file and print its entry table.
pub fn cmd_inspect(path: &Path) -> Result<()> {
    let bytes = fs::read(path)?;
    let decoded = bundle::decode(&bytes)?;
    info!("decoded {} ({} bytes)", path.display(), bytes.len());

    println!(
        "{}: format v{}, {} entries, {} bytes",
        path.display(),
        decoded.version,
        decoded.entries.len(),
        bytes.len()
    );
    for (index, entry) in decoded.entries.iter().enumerate() {
        let detail = match entry.kind {
            crate::bundle::EntryKind::Texture => {
                match crate::bundle::TextureHeader::parse(&entry.payload) {
                    Ok(h) => format!(" {}x{}", h.width, h.height),
                    Err(_) => " <bad texture header>".to_string(),
                }
            }
            _ => String::new(),
        };
        println!(
            "  [{index}] {} ({}, {} bytes at {}){detail}",
            entry.name,
            entry.kind.name(),
            entry.length,
            entry.offset
        );
    }
    Ok(())
}
