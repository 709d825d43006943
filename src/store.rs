//! Hidden per-package version store.
//!
//! ```text
//! plugins/.versions/<sanitized id>/<version>/<payload as it sat in plugins/>
//! ```
//!
//! Every module inside the store carries the disabled marker. Stable ids are
//! matched case-insensitively, so package directories use the lower-cased id.
//! Directory names are sanitized for the file system; when that changes a
//! name, a short hash of the original is appended so distinct ids never
//! collide. Dot-prefixed entries (renamed-aside trash) are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ManagerConfig;
use crate::error::{IoResultExt, ModError, ModResult};
use crate::fsutil::{copy_path, mark_hidden, move_path, remove_path_robust, set_modules_enabled};
use crate::version;

const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// How a payload enters the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Move,
    Copy,
}

/// One stored version of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub version: String,
    pub path: PathBuf,
}

/// File-system-safe directory name for an id or version.
pub fn sanitize_name(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_end_matches(['.', ' ']);
    let trimmed = if trimmed.is_empty() { "_" } else { trimmed };

    if trimmed == raw {
        raw.to_string()
    } else {
        let digest = format!("{:x}", md5::compute(raw.as_bytes()));
        format!("{trimmed}-{}", &digest[..8])
    }
}

pub fn package_dir(config: &ManagerConfig, stable_id: &str) -> PathBuf {
    config
        .store_root()
        .join(sanitize_name(&stable_id.to_lowercase()))
}

pub fn version_dir(config: &ManagerConfig, stable_id: &str, version: &str) -> PathBuf {
    package_dir(config, stable_id).join(sanitize_name(version))
}

/// Moves `payload` into the store under `version`, replacing any entry
/// already stored for that version, and disables its modules.
pub fn stash(
    config: &ManagerConfig,
    stable_id: &str,
    version: &str,
    payload: &Path,
) -> ModResult<PathBuf> {
    stash_items(config, stable_id, version, &[payload.to_path_buf()], Transfer::Move)
}

/// Stores several top-level items (files or folders) as one version entry.
pub fn stash_items(
    config: &ManagerConfig,
    stable_id: &str,
    version: &str,
    items: &[PathBuf],
    transfer: Transfer,
) -> ModResult<PathBuf> {
    let target = version_dir(config, stable_id, version);
    remove_path_robust(&target)?;
    fs::create_dir_all(&target).at(&target)?;
    mark_hidden(&config.store_root());

    for item in items {
        let name = item
            .file_name()
            .ok_or_else(|| ModError::not_found("payload", item))?;
        let dest = target.join(name);
        match transfer {
            Transfer::Move => move_path(item, &dest)?,
            Transfer::Copy => copy_path(item, &dest)?,
        }
    }
    set_modules_enabled(&target, false);

    tracing::info!(
        id = stable_id,
        version,
        path = %target.display(),
        "stored version"
    );
    Ok(target)
}

/// Path of a stored version, for moving it back into the active slot.
pub fn restore(config: &ManagerConfig, stable_id: &str, version: &str) -> ModResult<PathBuf> {
    let dir = version_dir(config, stable_id, version);
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(ModError::not_found("stored version", dir))
    }
}

/// Stored versions for a package, newest first.
pub fn list_versions(config: &ManagerConfig, stable_id: &str) -> Vec<StoreEntry> {
    let Ok(entries) = fs::read_dir(package_dir(config, stable_id)) else {
        return Vec::new();
    };
    let mut versions: Vec<StoreEntry> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir() && !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| StoreEntry {
            version: e.file_name().to_string_lossy().into_owned(),
            path: e.path(),
        })
        .collect();
    versions.sort_by(|a, b| version::compare(&b.version, &a.version));
    versions
}

/// Stored versions that do not compare equal to `excluding_version`,
/// newest first.
pub fn list_alternates(
    config: &ManagerConfig,
    stable_id: &str,
    excluding_version: &str,
) -> Vec<String> {
    list_versions(config, stable_id)
        .into_iter()
        .map(|entry| entry.version)
        .filter(|v| !version::compare(v, excluding_version).is_eq())
        .collect()
}

/// Deletes one stored version, and the package's store directory if that
/// leaves it empty.
pub fn prune(config: &ManagerConfig, stable_id: &str, version: &str) -> ModResult<()> {
    let dir = version_dir(config, stable_id, version);
    remove_path_robust(&dir)?;
    tracing::info!(id = stable_id, version, "pruned stored version");

    let package = package_dir(config, stable_id);
    let empty = fs::read_dir(&package)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .all(|e| e.file_name().to_string_lossy().starts_with('.'))
        })
        .unwrap_or(false);
    if empty {
        remove_path_robust(&package)?;
    }
    Ok(())
}

/// Deletes every stored version of a package.
pub fn remove_package(config: &ManagerConfig, stable_id: &str) -> ModResult<()> {
    remove_path_robust(&package_dir(config, stable_id))
}

/// Drops every stored version that compares equal to the active one.
pub fn reconcile(config: &ManagerConfig, stable_id: &str, active_version: &str) -> ModResult<()> {
    for entry in list_versions(config, stable_id) {
        if version::compare(&entry.version, active_version).is_eq() {
            tracing::debug!(
                id = stable_id,
                version = %entry.version,
                active = active_version,
                "stored copy duplicates active version"
            );
            prune(config, stable_id, &entry.version)?;
        }
    }
    Ok(())
}
