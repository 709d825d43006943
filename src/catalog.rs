//! Persisted package catalog: stable id to last-known name and version.
//!
//! The catalog is a cache of what the plugin directory holds. It is rebuilt
//! from disk whenever it is missing, empty, unreadable or written by an older
//! schema (recognised by fields that have since been removed).

use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};

use crate::config::ManagerConfig;
use crate::error::{IoResultExt, ModError, ModResult};
use crate::package::PackageIdentity;
use crate::registry::scan_installed;

const LEGACY_FIELDS: [&str; 3] = ["\"confidence\"", "\"primarydll\"", "\"sha256\""];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub guid: String,
    pub name: String,
    pub version: String,
}

impl From<&PackageIdentity> for CatalogEntry {
    fn from(identity: &PackageIdentity) -> Self {
        Self {
            guid: identity.stable_id.clone(),
            name: identity.display_name.clone(),
            version: identity.version.clone(),
        }
    }
}

pub type Catalog = BTreeMap<String, CatalogEntry>;

/// Loads the catalog; a missing or unreadable file yields an empty catalog.
pub fn load(config: &ManagerConfig) -> Catalog {
    let path = config.catalog_path();
    let Ok(text) = fs::read_to_string(&path) else {
        return Catalog::new();
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "catalog unreadable");
        Catalog::new()
    })
}

pub fn save(config: &ManagerConfig, catalog: &Catalog) -> ModResult<()> {
    let dir = config.tool_dir();
    fs::create_dir_all(&dir).at(&dir)?;
    let path = config.catalog_path();
    let json = serde_json::to_string_pretty(catalog).map_err(|e| ModError::Catalog {
        path: path.clone(),
        source: e,
    })?;
    fs::write(&path, json).at(&path)
}

/// Case-insensitive lookup by stable id.
pub fn find<'a>(catalog: &'a Catalog, stable_id: &str) -> Option<&'a CatalogEntry> {
    catalog
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(stable_id))
        .map(|(_, entry)| entry)
}

/// Inserts or replaces the entry for an identity.
pub fn upsert(config: &ManagerConfig, identity: &PackageIdentity) -> ModResult<()> {
    let mut catalog = load(config);
    catalog.retain(|key, _| !identity.same_package(key));
    catalog.insert(identity.stable_id.clone(), CatalogEntry::from(identity));
    save(config, &catalog)?;
    tracing::debug!(id = %identity.stable_id, version = %identity.version, "catalog updated");
    Ok(())
}

/// Re-derives the catalog by scanning every installed package.
pub fn rebuild_from_disk(config: &ManagerConfig) -> ModResult<Catalog> {
    if !config.plugins_dir().is_dir() {
        return Ok(Catalog::new());
    }
    let catalog: Catalog = scan_installed(config)?
        .iter()
        .map(|p| (p.identity.stable_id.clone(), CatalogEntry::from(&p.identity)))
        .collect();
    save(config, &catalog)?;
    tracing::info!(entries = catalog.len(), "catalog rebuilt from plugin directory");
    Ok(catalog)
}

/// Rebuilds the catalog if it is absent, empty or shaped by an older schema.
/// Returns whether a rebuild happened.
pub fn ensure_minimal(config: &ManagerConfig) -> ModResult<bool> {
    let text = fs::read_to_string(config.catalog_path()).unwrap_or_default();
    if !needs_rebuild(&text) {
        return Ok(false);
    }
    rebuild_from_disk(config)?;
    Ok(true)
}

fn needs_rebuild(text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    let lowered = text.to_lowercase();
    if LEGACY_FIELDS.iter().any(|field| lowered.contains(field)) {
        return true;
    }
    serde_json::from_str::<Catalog>(text).map_or(true, |c| c.is_empty())
}
