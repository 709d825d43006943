//! File system helpers shared by the store and the orchestrator.
//!
//! - `move_path`: rename, falling back to copy then delete across volumes
//! - `copy_path` / `copy_dir_recursive`: plain recursive copies
//! - `remove_path_robust`: delete that clears read-only flags and, as a last
//!   resort, renames a stubborn directory aside
//! - `set_modules_enabled`: best-effort disabled-marker renames over a tree

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{IoResultExt, ModError, ModResult};
use crate::package::{disabled_path, enabled_path, is_disabled, is_module_file};
use crate::scanner::scan_module;

/// Moves a file or directory to `dest`, replacing a file already there.
///
/// A rename is tried first; if that fails (another volume, a locked file)
/// the source is copied and then removed.
pub fn move_path(source: &Path, dest: &Path) -> ModResult<()> {
    if !source.exists() {
        return Err(ModError::not_found("move source", source));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    if dest.is_file() {
        remove_path_robust(dest)?;
    }

    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(
                from = %source.display(),
                to = %dest.display(),
                error = %e,
                "rename failed, copying instead"
            );
            copy_path(source, dest)?;
            remove_path_robust(source)
        }
    }
}

/// Copies a file or a directory tree to `dest`.
pub fn copy_path(source: &Path, dest: &Path) -> ModResult<()> {
    if source.is_dir() {
        copy_dir_recursive(source, dest)
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        fs::copy(source, dest).at(source)?;
        Ok(())
    }
}

/// Recursively copy a directory, merging into `dest` if it exists.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> ModResult<()> {
    fs::create_dir_all(dest).at(dest)?;

    for entry in fs::read_dir(source).at(source)? {
        let entry = entry.at(source)?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if path.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path).at(&path)?;
        }
    }

    Ok(())
}

/// Deletes a file or directory tree. Missing paths are fine.
///
/// Read-only flags are cleared first. If a directory still cannot be removed,
/// it is renamed aside to a hidden `.<name>.trash-<timestamp>` sibling so the
/// original name is free again.
pub fn remove_path_robust(path: &Path) -> ModResult<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };

    if !meta.is_dir() {
        clear_readonly(path);
        return fs::remove_file(path).at(path);
    }

    for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
        clear_readonly(entry.path());
    }
    let Err(e) = fs::remove_dir_all(path) else {
        return Ok(());
    };

    let aside = trash_path(path);
    tracing::warn!(
        path = %path.display(),
        aside = %aside.display(),
        error = %e,
        "directory delete failed, renaming aside"
    );
    fs::rename(path, &aside).map_err(|_| ModError::io(path, e))
}

fn trash_path(path: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.trash-{timestamp}"))
}

fn clear_readonly(path: &Path) {
    if let Ok(meta) = fs::symlink_metadata(path) {
        let mut permissions = meta.permissions();
        if permissions.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            let _ = fs::set_permissions(path, permissions);
        }
    }
}

/// Renames a single module file to its enabled or disabled name and returns
/// the new path. A module already in the requested state is left alone.
///
/// An existing file under the other name is replaced only when it declares
/// the same package; anything else is a [`ModError::Conflict`].
pub fn set_module_enabled(path: &Path, enabled: bool) -> ModResult<PathBuf> {
    let target = if enabled {
        enabled_path(path)
    } else {
        disabled_path(path)
    };
    if target != path {
        if target.exists() {
            if !same_declared_package(path, &target) {
                return Err(ModError::Conflict { path: target });
            }
            remove_path_robust(&target)?;
        }
        fs::rename(path, &target).at(path)?;
    }
    Ok(target)
}

fn same_declared_package(a: &Path, b: &Path) -> bool {
    match (scan_module(a), scan_module(b)) {
        (Some(a), Some(b)) => a.same_package(&b.stable_id),
        _ => false,
    }
}

/// Enables or disables every module under `root` (a file or directory).
///
/// Failures are logged per file and do not stop the rest of the batch.
/// Returns how many modules ended up in the requested state.
pub fn set_modules_enabled(root: &Path, enabled: bool) -> usize {
    let modules: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_module_file(e.path()))
        .map(|e| e.into_path())
        .collect();

    let mut done = 0;
    for module in modules {
        if is_disabled(&module) != enabled {
            done += 1;
            continue;
        }
        match set_module_enabled(&module, enabled) {
            Ok(_) => done += 1,
            Err(e) => tracing::warn!(path = %module.display(), error = %e, "module rename failed"),
        }
    }
    done
}

/// Marks a directory hidden in the platform file browser. The store's dot
/// prefix already hides it on Unix-likes.
pub fn mark_hidden(path: &Path) {
    #[cfg(target_os = "windows")]
    {
        match std::process::Command::new("attrib").arg("+h").arg(path).status() {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::debug!(path = %path.display(), %status, "attrib +h failed")
            }
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "attrib unavailable"),
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        let _ = path;
    }
}
