//! Installed package discovery for the plugin directory.
//!
//! # Layout
//!
//! - Folder packages: `plugins/<Folder>/...`, identified by the shallowest
//!   module carrying an identity. Folders without one are dependency bundles
//!   and are not listed.
//! - Single-file packages: `plugins/<Name>.dll` or `plugins/<Name>.dll.disabled`.
//!   When both exist and declare the same package the enabled file wins;
//!   twins declaring different packages are listed separately.
//! - Dot-prefixed folders (the version store, renamed-aside trash) are skipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::ManagerConfig;
use crate::error::{IoResultExt, ModResult};
use crate::package::{enabled_path, is_disabled, is_module_file, InstalledPackage, PackageKind};
use crate::scanner::{locate_identity, module_files, scan_module};

/// Scans the plugin directory and returns every installed package: folders
/// first, then single files, each sorted case-insensitively by name.
/// Returns an empty list if the plugin directory does not exist.
pub fn scan_installed(config: &ManagerConfig) -> ModResult<Vec<InstalledPackage>> {
    let plugins = config.plugins_dir();
    if !plugins.is_dir() {
        return Ok(Vec::new());
    }

    let mut folders = Vec::new();
    let mut files: BTreeMap<String, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();

    for entry in fs::read_dir(&plugins).at(&plugins)? {
        let entry = entry.at(&plugins)?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if path.is_dir() {
            if !name.starts_with('.') {
                folders.push((name.to_lowercase(), name, path));
            }
        } else if is_module_file(&path) {
            let base = file_name_of(&enabled_path(&path));
            let slot = files.entry(base.to_lowercase()).or_default();
            if is_disabled(&path) {
                slot.1 = Some(path);
            } else {
                slot.0 = Some(path);
            }
        }
    }
    folders.sort();

    let mut installed = Vec::new();

    for (_, name, dir) in folders {
        let Some((identity, module_path)) = locate_identity(&dir) else {
            tracing::debug!(folder = %dir.display(), "no identity, treating as dependency bundle");
            continue;
        };
        installed.push(InstalledPackage {
            identity,
            kind: PackageKind::Folder,
            location_name: name,
            enabled: is_folder_enabled(&dir),
            active_path: dir,
            module_path,
        });
    }

    for (_, (enabled, disabled)) in files {
        let mut listed: Option<String> = None;
        for (path, is_enabled) in [(enabled, true), (disabled, false)] {
            let Some(path) = path else {
                continue;
            };
            let Some(identity) = scan_module(&path) else {
                continue;
            };
            if listed.as_deref().is_some_and(|id| identity.same_package(id)) {
                continue;
            }
            listed = Some(identity.stable_id.clone());
            installed.push(InstalledPackage {
                identity,
                kind: PackageKind::SingleFile,
                location_name: file_name_of(&enabled_path(&path)),
                active_path: path.clone(),
                module_path: path,
                enabled: is_enabled,
            });
        }
    }

    Ok(installed)
}

/// Finds the active payload for a stable id (case-insensitive).
pub fn find_installed(config: &ManagerConfig, stable_id: &str) -> ModResult<Option<InstalledPackage>> {
    Ok(scan_installed(config)?
        .into_iter()
        .find(|p| p.identity.same_package(stable_id)))
}

/// A folder counts as enabled if at least one of its modules is enabled.
pub fn is_folder_enabled(dir: &Path) -> bool {
    module_files(dir).iter().any(|m| !is_disabled(m))
}

/// Enumerates all files belonging to an installed package.
pub fn enumerate_package_files(package: &InstalledPackage) -> Vec<PathBuf> {
    match package.kind {
        PackageKind::SingleFile => vec![package.active_path.clone()],
        PackageKind::Folder => WalkDir::new(&package.active_path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect(),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
