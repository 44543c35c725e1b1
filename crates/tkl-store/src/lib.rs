//! Filesystem side of the pipeline: the registry document and the
//! file-per-asset source directory.
//!
//! Registry writes go through a temp file in the same directory followed by a
//! rename, so an interrupted run leaves the previous document intact.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tkl_reconcile::{Candidate, Violation, ViolationKind};
use tkl_schemas::Registry;
use tracing::{debug, info};

const ASSET_EXT: &str = "json";

// ---------------------------------------------------------------------------
// Registry document
// ---------------------------------------------------------------------------

pub fn load_registry(path: &Path) -> Result<Registry> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read registry failed: {}", path.display()))?;
    let reg: Registry = serde_json::from_str(&raw)
        .with_context(|| format!("parse registry failed: {}", path.display()))?;
    Ok(reg)
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string_pretty(value).context("serialize json failed")?;
    Ok(format!("{json}\n"))
}

/// Replace `path` with `registry`, all or nothing.
pub fn save_registry_atomic(path: &Path, registry: &Registry) -> Result<()> {
    let body = to_pretty_json(registry)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("create registry dir failed: {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("create temp file failed in {}", dir.display()))?;
    tmp.write_all(body.as_bytes())
        .context("write temp registry failed")?;
    tmp.as_file()
        .sync_all()
        .context("sync temp registry failed")?;
    tmp.persist(path)
        .with_context(|| format!("replace registry failed: {}", path.display()))?;

    info!(path = %path.display(), version = %registry.version, assets = registry.assets.len(), "registry written");
    Ok(())
}

/// Descriptive metadata for a fresh registry.
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub name: String,
    pub network: String,
    pub logo_uri: Option<String>,
    pub keywords: Vec<String>,
}

/// Create an empty registry at version `0.0.0`. Never overwrites.
pub fn init_registry(path: &Path, opts: &InitOptions) -> Result<Registry> {
    if path.exists() {
        bail!("refusing to overwrite existing registry: {}", path.display());
    }

    let mut metadata: Map<String, Value> = Map::new();
    metadata.insert("name".to_string(), Value::from(opts.name.clone()));
    metadata.insert("network".to_string(), Value::from(opts.network.clone()));
    metadata.insert("timestamp".to_string(), Value::from(Utc::now().to_rfc3339()));
    if let Some(logo) = &opts.logo_uri {
        metadata.insert("logoURI".to_string(), Value::from(logo.clone()));
    }
    if !opts.keywords.is_empty() {
        metadata.insert("keywords".to_string(), Value::from(opts.keywords.clone()));
    }

    let registry = Registry::empty(metadata);
    save_registry_atomic(path, &registry)?;
    Ok(registry)
}

// ---------------------------------------------------------------------------
// Source directory
// ---------------------------------------------------------------------------

/// Everything read from a source directory. Files that could not be read or
/// parsed are reported, not fatal.
#[derive(Debug, Clone, Default)]
pub struct SourceDir {
    pub candidates: Vec<Candidate>,
    pub unreadable: Vec<Violation>,
}

/// Read every `*.json` file directly under `dir`, sorted by file name.
/// Subdirectories and other extensions are ignored.
pub fn read_candidates(dir: &Path) -> Result<SourceDir> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("read source dir failed: {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("list source dir failed: {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(ASSET_EXT) {
            debug!(path = %path.display(), "skipping non-json file");
            continue;
        }
        paths.push(path);
    }
    paths.sort();

    let mut out = SourceDir::default();
    for path in paths {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<Value>(&raw).map_err(|e| e.to_string()));

        match parsed {
            Ok(value) => out.candidates.push(Candidate::new(source, value)),
            Err(msg) => out.unreadable.push(Violation {
                source,
                contract: None,
                kind: ViolationKind::Unreadable(msg),
            }),
        }
    }

    debug!(dir = %dir.display(), candidates = out.candidates.len(), unreadable = out.unreadable.len(), "source dir read");
    Ok(out)
}

/// Write each registry asset to `<dir>/<contract>.json`. Returns the number
/// of files written.
pub fn export_assets(registry: &Registry, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create export dir failed: {}", dir.display()))?;

    let mut written = 0;
    for asset in &registry.assets {
        let Some(contract) = asset.contract_id() else {
            bail!("registry asset '{}' has no contract id", asset.name);
        };
        let path = dir.join(format!("{contract}.{ASSET_EXT}"));
        fs::write(&path, to_pretty_json(asset)?)
            .with_context(|| format!("write asset failed: {}", path.display()))?;
        written += 1;
    }

    info!(dir = %dir.display(), files = written, "assets exported");
    Ok(written)
}
