//! Package management operations (install, enable/disable, switch, uninstall).
//!
//! - Install: preflight-scan the incoming payload, compare against the
//!   installed version, stash whichever side is displaced, place the payload,
//!   then rescan it and update the catalog
//! - Enable/disable: rename module files to and from the disabled marker
//! - Switch: swap the active payload with a stored version
//! - Uninstall: delete everything, or prune selected stored versions
//!
//! Every operation validates its inputs before touching the plugin directory.
//! Operations are not safe to run concurrently against the same game folder.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::archive::{self, ArchiveFormat};
use crate::catalog;
use crate::config::ManagerConfig;
use crate::confirm::{Choice, Confirmer, Prompt, VersionSelection};
use crate::error::{IoResultExt, ModError, ModResult};
use crate::fsutil::{
    copy_dir_recursive, copy_path, move_path, remove_path_robust, set_module_enabled,
    set_modules_enabled,
};
use crate::layout::{placement, resolve_content_root, LayoutWarning, Placement};
use crate::package::{
    disabled_path, enabled_path, is_disabled, is_module_file, InstalledPackage, PackageIdentity,
    PackageKind,
};
use crate::registry::{enumerate_package_files, find_installed};
use crate::scanner::{locate_identity, scan_folder, scan_module};
use crate::store::{self, Transfer};
use crate::version;

/// What an install did.
#[derive(Debug, Clone)]
pub enum InstallOutcome {
    Installed(InstallReport),
    /// The incoming payload was stored as an alternate; the active one is untouched.
    KeptBoth {
        identity: PackageIdentity,
        stored_at: PathBuf,
    },
    Canceled,
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    /// The plugin directory for flat installs, otherwise `plugins/<Folder>`.
    pub target: PathBuf,
    /// Module carrying the identity, if the payload has one.
    pub primary_module: Option<PathBuf>,
    /// Identity read back from the placed payload.
    pub identity: Option<PackageIdentity>,
    pub warning: Option<LayoutWarning>,
    /// Version of the previously active payload moved into the store.
    pub stashed_version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SwitchOutcome {
    pub identity: PackageIdentity,
    pub previous_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallOutcome {
    /// Active payload and every stored version are gone.
    Removed {
        removed_files: usize,
        removed_versions: Vec<String>,
    },
    /// Selected stored versions were pruned; the package stays installed.
    Pruned {
        removed_versions: Vec<String>,
        active_version: String,
    },
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Folder,
    Module,
    Archive,
}

fn classify_source(source: &Path) -> ModResult<SourceKind> {
    if source.is_dir() {
        return Ok(SourceKind::Folder);
    }
    if !source.is_file() {
        return Err(ModError::not_found("install source", source));
    }
    if ArchiveFormat::from_path(source).is_some() {
        Ok(SourceKind::Archive)
    } else if is_module_file(source) && !is_disabled(source) {
        Ok(SourceKind::Module)
    } else {
        Err(ModError::UnsupportedFormat {
            path: source.to_path_buf(),
        })
    }
}

/// Incoming payload ready to be placed into the plugin directory.
struct Staged {
    /// Top-level items, each landing at `plugins/<item name>`.
    items: Vec<PathBuf>,
    transfer: Transfer,
    /// Existing folders are merged into rather than replaced (flat archives).
    merge_dirs: bool,
    target: PathBuf,
    warning: Option<LayoutWarning>,
    _scratch: Option<TempDir>,
}

fn scratch_dir(config: &ManagerConfig, prefix: &str) -> ModResult<TempDir> {
    let root = config.scratch_root();
    fs::create_dir_all(&root).at(&root)?;
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(&root)
        .at(&root)
}

fn file_name(path: &Path) -> ModResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ModError::not_found("file name", path))
}

fn preflight(
    config: &ManagerConfig,
    source: &Path,
    kind: SourceKind,
) -> ModResult<Option<PackageIdentity>> {
    match kind {
        SourceKind::Module => Ok(scan_module(source)),
        SourceKind::Folder => Ok(scan_folder(source)),
        SourceKind::Archive => {
            let peek = scratch_dir(config, "peek-")?;
            archive::extract_modules(source, peek.path())?;
            Ok(scan_folder(peek.path()))
        }
    }
}

fn stage(config: &ManagerConfig, source: &Path, kind: SourceKind) -> ModResult<Staged> {
    let plugins = config.plugins_dir();
    match kind {
        SourceKind::Module => Ok(Staged {
            items: vec![source.to_path_buf()],
            transfer: Transfer::Copy,
            merge_dirs: false,
            target: plugins,
            warning: None,
            _scratch: None,
        }),
        SourceKind::Folder => Ok(Staged {
            items: vec![source.to_path_buf()],
            transfer: Transfer::Copy,
            merge_dirs: false,
            target: plugins.join(file_name(source)?),
            warning: None,
            _scratch: None,
        }),
        SourceKind::Archive => {
            let scratch = scratch_dir(config, "extract-")?;
            archive::extract_all(source, scratch.path())?;
            let content = resolve_content_root(scratch.path());
            let (items, target, merge_dirs) = match placement(scratch.path(), &content.path) {
                Placement::Flat => {
                    let mut children: Vec<PathBuf> = fs::read_dir(&content.path)
                        .at(&content.path)?
                        .filter_map(|e| e.ok())
                        .map(|e| e.path())
                        .collect();
                    children.sort();
                    (children, plugins, true)
                }
                Placement::Folder(name) => (vec![content.path.clone()], plugins.join(name), false),
            };
            Ok(Staged {
                items,
                transfer: Transfer::Move,
                merge_dirs,
                target,
                warning: content.warning,
                _scratch: Some(scratch),
            })
        }
    }
}

/// True if `path` is the installed payload, or its marker twin declaring the
/// same package.
fn belongs_to(installed: Option<&InstalledPackage>, path: &Path) -> bool {
    installed.is_some_and(|p| {
        p.active_path == path
            || (enabled_path(&p.active_path) == enabled_path(path)
                && scan_module(path).is_some_and(|i| i.same_package(p.stable_id())))
    })
}

/// A plugin directory entry and, for modules, its disabled twin.
fn name_variants(dest: &Path) -> Vec<PathBuf> {
    if is_module_file(dest) {
        vec![dest.to_path_buf(), disabled_path(dest)]
    } else {
        vec![dest.to_path_buf()]
    }
}

/// Installs a module file, folder or archive into the plugin directory.
pub fn install(
    config: &ManagerConfig,
    source: &Path,
    confirmer: &mut dyn Confirmer,
) -> ModResult<InstallOutcome> {
    config.validate()?;
    let kind = classify_source(source)?;
    let plugins = config.plugins_dir();

    let incoming = preflight(config, source, kind)?;
    catalog::ensure_minimal(config)?;
    let installed = match &incoming {
        Some(identity) => find_installed(config, &identity.stable_id)?,
        None => None,
    };

    let mut stash_installed = false;
    if let (Some(incoming), Some(current)) = (&incoming, &installed) {
        match version::compare(&incoming.version, current.version()) {
            Ordering::Less => {
                let choice = confirmer.ask_choice(&Prompt::Downgrade {
                    display_name: &current.identity.display_name,
                    installed: current.version(),
                    incoming: &incoming.version,
                });
                match choice {
                    Choice::Primary | Choice::Destructive => stash_installed = true,
                    Choice::Secondary => return keep_both(config, source, kind, incoming),
                    Choice::Cancel => {
                        tracing::info!(id = %incoming.stable_id, "install canceled");
                        return Ok(InstallOutcome::Canceled);
                    }
                }
            }
            Ordering::Greater => stash_installed = true,
            Ordering::Equal => {}
        }
    }

    let staged = stage(config, source, kind)?;

    let mut displaced = Vec::new();
    if kind != SourceKind::Archive {
        let dest = plugins.join(file_name(source)?);
        let collisions: Vec<PathBuf> = name_variants(&dest)
            .into_iter()
            .filter(|p| p.exists() && !belongs_to(installed.as_ref(), p))
            .collect();
        if let Some(taken) = collisions.first() {
            let name = file_name(taken)?;
            if confirmer.ask_choice(&Prompt::OverwriteFile { file_name: &name }) != Choice::Primary {
                tracing::info!(path = %taken.display(), "install canceled, file exists");
                return Ok(InstallOutcome::Canceled);
            }
        }
        displaced = collisions.into_iter().filter(|p| *p != dest).collect();
    }

    let mut stashed_version = None;
    if let (true, Some(current)) = (stash_installed, &installed) {
        store::stash(config, current.stable_id(), current.version(), &current.active_path)?;
        stashed_version = Some(current.version().to_string());
    }

    for path in &displaced {
        tracing::info!(path = %path.display(), "removing overwritten twin");
        remove_path_robust(path)?;
    }

    let placed = materialize(&plugins, &staged)?;

    if let (None, Some(current)) = (&stashed_version, &installed) {
        if current.active_path.exists() && !placed.contains(&current.active_path) {
            tracing::debug!(path = %current.active_path.display(), "removing replaced payload");
            remove_path_robust(&current.active_path)?;
        }
    }

    let found = identify(&placed);
    if let Some((identity, _)) = &found {
        catalog::upsert(config, identity)?;
        store::reconcile(config, &identity.stable_id, &identity.version)?;
    } else {
        tracing::warn!(source = %source.display(), "installed payload declares no package identity");
    }

    tracing::info!(
        source = %source.display(),
        target = %staged.target.display(),
        "installed"
    );
    if let Some(warning) = &staged.warning {
        tracing::warn!(%warning, "unusual archive layout");
    }

    let (identity, primary_module) = found.unzip();
    Ok(InstallOutcome::Installed(InstallReport {
        target: staged.target.clone(),
        primary_module,
        identity,
        warning: staged.warning.clone(),
        stashed_version,
    }))
}

fn keep_both(
    config: &ManagerConfig,
    source: &Path,
    kind: SourceKind,
    incoming: &PackageIdentity,
) -> ModResult<InstallOutcome> {
    let staged = stage(config, source, kind)?;
    let stored_at = store::stash_items(
        config,
        &incoming.stable_id,
        &incoming.version,
        &staged.items,
        staged.transfer,
    )?;
    tracing::info!(
        id = %incoming.stable_id,
        version = %incoming.version,
        "kept incoming version as an alternate"
    );
    Ok(InstallOutcome::KeptBoth {
        identity: incoming.clone(),
        stored_at,
    })
}

/// Places staged items into the plugin directory, returning the top-level
/// paths written.
fn materialize(plugins: &Path, staged: &Staged) -> ModResult<Vec<PathBuf>> {
    let mut placed = Vec::with_capacity(staged.items.len());
    for item in &staged.items {
        let dest = plugins.join(file_name(item)?);
        if same_file(item, &dest) {
            placed.push(dest);
            continue;
        }

        if item.is_dir() && dest.is_dir() {
            if staged.merge_dirs {
                copy_dir_recursive(item, &dest)?;
                placed.push(dest);
                continue;
            }
            remove_path_robust(&dest)?;
        }

        match staged.transfer {
            Transfer::Copy => copy_path(item, &dest)?,
            Transfer::Move => move_path(item, &dest)?,
        }
        placed.push(dest);
    }
    Ok(placed)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// First identity found among placed items, with the declaring module.
fn identify(placed: &[PathBuf]) -> Option<(PackageIdentity, PathBuf)> {
    placed.iter().find_map(|path| {
        if path.is_dir() {
            locate_identity(path)
        } else if is_module_file(path) {
            scan_module(path).map(|identity| (identity, path.clone()))
        } else {
            None
        }
    })
}

fn require_installed(config: &ManagerConfig, stable_id: &str) -> ModResult<InstalledPackage> {
    find_installed(config, stable_id)?
        .ok_or_else(|| ModError::not_found("installed package", config.plugins_dir().join(stable_id)))
}

/// Enables or disables an installed package and returns its refreshed state.
///
/// Folder packages are toggled file by file; a module that cannot be renamed
/// is logged and skipped.
pub fn set_enabled(
    config: &ManagerConfig,
    stable_id: &str,
    enabled: bool,
) -> ModResult<InstalledPackage> {
    config.validate()?;
    let package = require_installed(config, stable_id)?;

    match package.kind {
        PackageKind::SingleFile => {
            let path = set_module_enabled(&package.active_path, enabled)?;
            tracing::info!(path = %path.display(), enabled, "toggled module");
        }
        PackageKind::Folder => {
            let toggled = set_modules_enabled(&package.active_path, enabled);
            tracing::info!(
                folder = %package.active_path.display(),
                enabled,
                modules = toggled,
                "toggled folder"
            );
        }
    }

    require_installed(config, stable_id)
}

/// Makes a stored version the active one, stashing the current payload.
pub fn switch_version(
    config: &ManagerConfig,
    stable_id: &str,
    version: &str,
) -> ModResult<SwitchOutcome> {
    config.validate()?;
    let entry = store::restore(config, stable_id, version)?;
    let current = find_installed(config, stable_id)?;

    if let Some(current) = &current {
        if version::compare(current.version(), version).is_eq() {
            store::reconcile(config, stable_id, current.version())?;
            return Ok(SwitchOutcome {
                identity: current.identity.clone(),
                previous_version: None,
            });
        }
    }

    if locate_identity(&entry).is_none() {
        return Err(ModError::NotAPackage { path: entry });
    }

    let plugins = config.plugins_dir();
    let mut children: Vec<PathBuf> = fs::read_dir(&entry)
        .at(&entry)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    children.sort();

    let mut moves = Vec::with_capacity(children.len());
    for child in children {
        let dest = plugins.join(file_name(&enabled_path(&child))?);
        if let Some(taken) = name_variants(&dest)
            .into_iter()
            .find(|c| c.exists() && !belongs_to(current.as_ref(), c))
        {
            return Err(ModError::Conflict { path: taken });
        }
        moves.push((child, dest));
    }

    let previous_version = match &current {
        Some(current) => {
            store::stash(config, stable_id, current.version(), &current.active_path)?;
            Some(current.version().to_string())
        }
        None => None,
    };

    let mut placed = Vec::with_capacity(moves.len());
    for (child, dest) in moves {
        move_path(&child, &dest)?;
        set_modules_enabled(&dest, true);
        placed.push(dest);
    }
    store::prune(config, stable_id, version)?;

    let (identity, _) = identify(&placed).ok_or(ModError::NotAPackage { path: entry })?;
    catalog::upsert(config, &identity)?;
    store::reconcile(config, &identity.stable_id, &identity.version)?;

    tracing::info!(
        id = stable_id,
        version = %identity.version,
        previous = previous_version.as_deref().unwrap_or("none"),
        "switched version"
    );
    Ok(SwitchOutcome {
        identity,
        previous_version,
    })
}

/// Uninstalls a package. With stored alternates the caller may remove
/// everything or pick versions to prune and a stored version to keep active.
pub fn uninstall(
    config: &ManagerConfig,
    stable_id: &str,
    confirmer: &mut dyn Confirmer,
) -> ModResult<UninstallOutcome> {
    config.validate()?;
    let installed = require_installed(config, stable_id)?;
    let display_name = installed.identity.display_name.clone();
    let alternates = store::list_alternates(config, stable_id, installed.version());

    let outcome = if alternates.is_empty() {
        match confirmer.ask_choice(&Prompt::UninstallSingle {
            display_name: &display_name,
        }) {
            Choice::Primary | Choice::Destructive => remove_everything(config, &installed)?,
            Choice::Secondary | Choice::Cancel => UninstallOutcome::Canceled,
        }
    } else {
        let choice = confirmer.ask_choice(&Prompt::UninstallMulti {
            display_name: &display_name,
            active_version: installed.version(),
            stored: &alternates,
        });
        match choice {
            Choice::Primary | Choice::Destructive => remove_everything(config, &installed)?,
            Choice::Secondary => {
                match confirmer.pick_versions(&display_name, installed.version(), &alternates) {
                    Some(selection) => apply_selection(config, stable_id, &alternates, &selection)?,
                    None => UninstallOutcome::Canceled,
                }
            }
            Choice::Cancel => UninstallOutcome::Canceled,
        }
    };

    if outcome != UninstallOutcome::Canceled {
        catalog::rebuild_from_disk(config)?;
    }
    Ok(outcome)
}

fn remove_everything(
    config: &ManagerConfig,
    installed: &InstalledPackage,
) -> ModResult<UninstallOutcome> {
    let removed_files = enumerate_package_files(installed).len();
    remove_path_robust(&installed.active_path)?;
    if installed.kind == PackageKind::SingleFile {
        for twin in [enabled_path(&installed.active_path), disabled_path(&installed.active_path)] {
            if scan_module(&twin).is_some_and(|i| i.same_package(installed.stable_id())) {
                remove_path_robust(&twin)?;
            }
        }
    }

    let removed_versions: Vec<String> = store::list_versions(config, installed.stable_id())
        .into_iter()
        .map(|entry| entry.version)
        .collect();
    store::remove_package(config, installed.stable_id())?;

    tracing::info!(
        id = installed.stable_id(),
        files = removed_files,
        versions = removed_versions.len(),
        "uninstalled"
    );
    Ok(UninstallOutcome::Removed {
        removed_files,
        removed_versions,
    })
}

fn apply_selection(
    config: &ManagerConfig,
    stable_id: &str,
    alternates: &[String],
    selection: &VersionSelection,
) -> ModResult<UninstallOutcome> {
    let stored = |v: &str| alternates.iter().find(|a| a.eq_ignore_ascii_case(v)).cloned();

    if let Some(keep) = &selection.keep_as_active {
        let keep = stored(keep)
            .ok_or_else(|| ModError::not_found("stored version", store::version_dir(config, stable_id, keep)))?;
        switch_version(config, stable_id, &keep)?;
    }

    let mut removed_versions = Vec::new();
    for version in selection.effective_removals() {
        match stored(version) {
            Some(version) => {
                store::prune(config, stable_id, &version)?;
                removed_versions.push(version);
            }
            None => tracing::warn!(id = stable_id, version, "not a stored version, skipping"),
        }
    }

    let active = require_installed(config, stable_id)?;
    store::reconcile(config, stable_id, active.version())?;
    Ok(UninstallOutcome::Pruned {
        removed_versions,
        active_version: active.version().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        dependency_bytes, game_root, plugin_bytes, snapshot, write_file, write_plugin, write_zip,
        ScriptedConfirmer,
    };
    use pretty_assertions::assert_eq;

    fn installed_report(outcome: InstallOutcome) -> InstallReport {
        match outcome {
            InstallOutcome::Installed(report) => report,
            other => panic!("expected an install, got {other:?}"),
        }
    }

    fn stored_versions(config: &ManagerConfig, id: &str) -> Vec<String> {
        store::list_versions(config, id)
            .into_iter()
            .map(|e| e.version)
            .collect()
    }

    #[test]
    fn test_install_single_module() {
        let (temp, config) = game_root();
        let source = write_plugin(&temp.path().join("dl/ModA.dll"), "com.x.a", "A", "1.0.0");

        let report = installed_report(
            install(&config, &source, &mut ScriptedConfirmer::default()).unwrap(),
        );
        let plugins = config.plugins_dir();
        assert_eq!(report.target, plugins);
        assert_eq!(report.primary_module, Some(plugins.join("ModA.dll")));
        assert_eq!(report.identity.unwrap().version, "1.0.0");
        assert!(source.is_file());
        assert_eq!(
            catalog::find(&catalog::load(&config), "com.x.a").unwrap().version,
            "1.0.0"
        );
    }

    #[test]
    fn test_downgrade_keep_both() {
        let (temp, config) = game_root();
        let plugins = config.plugins_dir();
        let v1 = write_plugin(&temp.path().join("v1/ModA.dll"), "com.x.a", "A", "1.0.0");
        let v09 = write_plugin(&temp.path().join("v09/ModA_old.dll"), "com.x.a", "A", "0.9.0");
        install(&config, &v1, &mut ScriptedConfirmer::default()).unwrap();

        let mut confirmer = ScriptedConfirmer::new(&[Choice::Secondary]);
        let outcome = install(&config, &v09, &mut confirmer).unwrap();

        assert_eq!(confirmer.asked, vec!["Older version"]);
        let InstallOutcome::KeptBoth { identity, stored_at } = outcome else {
            panic!("expected keep both");
        };
        assert_eq!(identity.version, "0.9.0");
        assert_eq!(stored_at, config.store_root().join("com.x.a/0.9.0"));
        assert!(stored_at.join("ModA_old.dll.disabled").is_file());

        let active = find_installed(&config, "com.x.a").unwrap().unwrap();
        assert_eq!(active.version(), "1.0.0");
        assert_eq!(active.active_path, plugins.join("ModA.dll"));
        assert!(!plugins.join("ModA_old.dll").exists());
    }

    #[test]
    fn test_downgrade_cancel_changes_nothing() {
        let (temp, config) = game_root();
        let v1 = write_plugin(&temp.path().join("v1/ModA.dll"), "com.x.a", "A", "1.0.0");
        let v09 = write_plugin(&temp.path().join("v09/ModA.dll"), "com.x.a", "A", "0.9.0");
        install(&config, &v1, &mut ScriptedConfirmer::default()).unwrap();
        let before = snapshot(&config.plugins_dir());

        let outcome = install(&config, &v09, &mut ScriptedConfirmer::new(&[Choice::Cancel])).unwrap();
        assert!(matches!(outcome, InstallOutcome::Canceled));
        assert_eq!(snapshot(&config.plugins_dir()), before);
    }

    #[test]
    fn test_downgrade_overwrite_stashes_installed() {
        let (temp, config) = game_root();
        let v1 = write_plugin(&temp.path().join("v1/ModA.dll"), "com.x.a", "A", "1.0.0");
        let v09 = write_plugin(&temp.path().join("v09/ModA.dll"), "com.x.a", "A", "0.9.0");
        install(&config, &v1, &mut ScriptedConfirmer::default()).unwrap();

        let report = installed_report(
            install(&config, &v09, &mut ScriptedConfirmer::new(&[Choice::Primary])).unwrap(),
        );
        assert_eq!(report.stashed_version.as_deref(), Some("1.0.0"));
        assert_eq!(
            find_installed(&config, "com.x.a").unwrap().unwrap().version(),
            "0.9.0"
        );
        assert_eq!(stored_versions(&config, "com.x.a"), vec!["1.0.0"]);
    }

    #[test]
    fn test_upgrade_stashes_without_asking() {
        let (temp, config) = game_root();
        let old = write_plugin(&temp.path().join("a/Mod/Mod.dll"), "com.x.m", "M", "1.0.0");
        write_file(&old.with_file_name("old.cfg"), b"old");
        let new = write_plugin(&temp.path().join("b/Mod/Mod.dll"), "com.x.m", "M", "1.1.0");
        install(&config, &temp.path().join("a/Mod"), &mut ScriptedConfirmer::default()).unwrap();

        let mut confirmer = ScriptedConfirmer::default();
        let report = installed_report(
            install(&config, new.parent().unwrap(), &mut confirmer).unwrap(),
        );
        assert!(confirmer.asked.is_empty());
        assert_eq!(report.target, config.plugins_dir().join("Mod"));
        assert_eq!(report.stashed_version.as_deref(), Some("1.0.0"));
        assert!(!config.plugins_dir().join("Mod/old.cfg").exists());
        assert!(config
            .store_root()
            .join("com.x.m/1.0.0/Mod/Mod.dll.disabled")
            .is_file());
    }

    #[test]
    fn test_same_version_overwrites_and_replaces_old_location() {
        let (temp, config) = game_root();
        let plugins = config.plugins_dir();
        write_plugin(&plugins.join("Old.dll.disabled"), "com.x.a", "A", "1.0.0");
        let source = write_plugin(&temp.path().join("New.dll"), "com.x.a", "A", "1.0.0");

        install(&config, &source, &mut ScriptedConfirmer::default()).unwrap();
        assert!(!plugins.join("Old.dll.disabled").exists());
        assert!(plugins.join("New.dll").is_file());
        assert!(stored_versions(&config, "com.x.a").is_empty());
    }

    #[test]
    fn test_existing_unrelated_file_asks_before_overwrite() {
        let (temp, config) = game_root();
        let plugins = config.plugins_dir();
        write_file(&plugins.join("Shared.dll"), &dependency_bytes());
        let source = write_plugin(&temp.path().join("Shared.dll"), "com.x.s", "S", "1.0");

        let mut confirmer = ScriptedConfirmer::new(&[Choice::Cancel]);
        let outcome = install(&config, &source, &mut confirmer).unwrap();
        assert!(matches!(outcome, InstallOutcome::Canceled));
        assert_eq!(confirmer.asked, vec!["File exists"]);
        assert_eq!(fs::read(plugins.join("Shared.dll")).unwrap(), dependency_bytes());

        install(&config, &source, &mut ScriptedConfirmer::new(&[Choice::Primary])).unwrap();
        assert!(scan_module(&plugins.join("Shared.dll")).is_some());
    }

    #[test]
    fn test_disabled_twin_of_other_package_needs_confirmation() {
        let (temp, config) = game_root();
        let plugins = config.plugins_dir();
        write_plugin(&plugins.join("Shared.dll.disabled"), "com.x.other", "O", "1.0");
        let source = write_plugin(&temp.path().join("Shared.dll"), "com.x.s", "S", "1.0");

        let mut confirmer = ScriptedConfirmer::new(&[Choice::Cancel]);
        let outcome = install(&config, &source, &mut confirmer).unwrap();
        assert!(matches!(outcome, InstallOutcome::Canceled));
        assert_eq!(confirmer.asked, vec!["File exists"]);
        assert!(!plugins.join("Shared.dll").exists());
        assert!(find_installed(&config, "com.x.other").unwrap().is_some());

        install(&config, &source, &mut ScriptedConfirmer::new(&[Choice::Primary])).unwrap();
        assert!(find_installed(&config, "com.x.other").unwrap().is_none());
        let off = set_enabled(&config, "com.x.s", false).unwrap();
        assert_eq!(off.active_path, plugins.join("Shared.dll.disabled"));
    }

    #[test]
    fn test_disable_never_replaces_another_package() {
        let (_temp, config) = game_root();
        let plugins = config.plugins_dir();
        write_plugin(&plugins.join("Shared.dll"), "com.x.s", "S", "1.0");
        let other = write_plugin(&plugins.join("Shared.dll.disabled"), "com.x.other", "O", "1.0");
        let before = fs::read(&other).unwrap();

        assert!(matches!(
            set_enabled(&config, "com.x.s", false),
            Err(ModError::Conflict { .. })
        ));
        assert!(plugins.join("Shared.dll").is_file());
        assert_eq!(fs::read(&other).unwrap(), before);
        assert!(find_installed(&config, "com.x.other").unwrap().is_some());
    }

    #[test]
    fn test_downgrade_to_equivalent_version_leaves_no_stored_copy() {
        let (temp, config) = game_root();
        for version in ["1.0.0", "2.0.0"] {
            let source = write_plugin(&temp.path().join(version).join("A.dll"), "com.x.a", "A", version);
            install(&config, &source, &mut ScriptedConfirmer::default()).unwrap();
        }
        assert_eq!(stored_versions(&config, "com.x.a"), vec!["1.0.0"]);

        let short = write_plugin(&temp.path().join("short/A.dll"), "com.x.a", "A", "1.0");
        install(&config, &short, &mut ScriptedConfirmer::new(&[Choice::Primary])).unwrap();

        let active = find_installed(&config, "com.x.a").unwrap().unwrap();
        assert_eq!(active.version(), "1.0");
        assert_eq!(stored_versions(&config, "com.x.a"), vec!["2.0.0"]);
        assert_eq!(store::list_alternates(&config, "com.x.a", "1.0"), vec!["2.0.0"]);
    }

    #[test]
    fn test_guid_case_change_keeps_versions_together() {
        let (temp, config) = game_root();
        let old = write_plugin(&temp.path().join("a/Mod/Mod.dll"), "com.x.a", "A", "1.0");
        let new = write_plugin(&temp.path().join("b/Mod/Mod.dll"), "COM.X.A", "A", "2.0");
        install(&config, old.parent().unwrap(), &mut ScriptedConfirmer::default()).unwrap();
        install(&config, new.parent().unwrap(), &mut ScriptedConfirmer::default()).unwrap();
        assert_eq!(stored_versions(&config, "COM.X.A"), vec!["1.0"]);

        let mut confirmer = ScriptedConfirmer::new(&[Choice::Primary]);
        let outcome = uninstall(&config, "com.x.a", &mut confirmer).unwrap();
        assert_eq!(
            outcome,
            UninstallOutcome::Removed {
                removed_files: 1,
                removed_versions: vec!["1.0".into()],
            }
        );
        assert!(snapshot(&config.plugins_dir()).is_empty());
    }

    #[test]
    fn test_wrapper_archive_installs_flat() {
        let (temp, config) = game_root();
        let archive = temp.path().join("Mod.zip");
        write_zip(
            &archive,
            &[("Wrapper/Mod.dll", plugin_bytes("com.x.w", "W", "1.0.0"))],
        );

        let report = installed_report(
            install(&config, &archive, &mut ScriptedConfirmer::default()).unwrap(),
        );
        let plugins = config.plugins_dir();
        assert!(matches!(report.warning, Some(LayoutWarning::WrapperFolder { .. })));
        assert_eq!(report.target, plugins);
        assert_eq!(report.primary_module, Some(plugins.join("Mod.dll")));
        assert!(!plugins.join("Wrapper").exists());
        assert!(fs::read_dir(config.scratch_root()).unwrap().next().is_none());
    }

    #[test]
    fn test_archive_with_assets_keeps_folder() {
        let (temp, config) = game_root();
        let archive = temp.path().join("Cool.tar.gz");
        crate::testing::write_tar_gz(
            &archive,
            &[
                ("CoolMod/CoolMod.dll", plugin_bytes("com.x.cool", "Cool", "2.0")),
                ("CoolMod/assets/a.bundle", b"asset".to_vec()),
            ],
        );

        let report = installed_report(
            install(&config, &archive, &mut ScriptedConfirmer::default()).unwrap(),
        );
        let folder = config.plugins_dir().join("CoolMod");
        assert_eq!(report.target, folder);
        assert!(folder.join("assets/a.bundle").is_file());
        assert_eq!(report.identity.unwrap().stable_id, "com.x.cool");
    }

    #[test]
    fn test_failures_abort_before_mutation() {
        let (temp, config) = game_root();
        let mut confirmer = ScriptedConfirmer::default();

        let missing = install(&config, &temp.path().join("nope.zip"), &mut confirmer);
        assert!(matches!(missing, Err(ModError::NotFound { .. })));

        let rar = write_file(&temp.path().join("Mod.rar"), b"Rar!");
        let unsupported = install(&config, &rar, &mut confirmer);
        assert!(matches!(unsupported, Err(ModError::UnsupportedFormat { .. })));

        let unconfigured = install(&ManagerConfig::default(), &rar, &mut confirmer);
        assert!(matches!(unconfigured, Err(ModError::NotConfigured { .. })));

        fs::remove_dir_all(config.plugins_dir()).unwrap();
        let source = write_plugin(&temp.path().join("A.dll"), "com.x.a", "A", "1.0");
        let no_plugins = install(&config, &source, &mut confirmer);
        assert!(matches!(no_plugins, Err(ModError::NotFound { .. })));
    }

    #[test]
    fn test_enable_disable_round_trip() {
        let (_temp, config) = game_root();
        let disabled = config.plugins_dir().join("ModA.dll.disabled");
        write_plugin(&disabled, "com.x.a", "A", "1.0.0");
        let original = fs::read(&disabled).unwrap();

        let on = set_enabled(&config, "com.x.a", true).unwrap();
        assert!(on.enabled);
        assert_eq!(on.active_path, config.plugins_dir().join("ModA.dll"));

        let off = set_enabled(&config, "com.x.a", false).unwrap();
        assert!(!off.enabled);
        assert_eq!(off.active_path, disabled);
        assert_eq!(fs::read(&disabled).unwrap(), original);
    }

    #[test]
    fn test_toggle_folder_package() {
        let (_temp, config) = game_root();
        let dir = config.plugins_dir().join("Mod");
        write_plugin(&dir.join("Mod.dll"), "com.x.m", "M", "1.0");
        write_file(&dir.join("lib/Dep.dll"), &dependency_bytes());

        assert!(!set_enabled(&config, "com.x.m", false).unwrap().enabled);
        assert!(dir.join("lib/Dep.dll.disabled").is_file());
        assert!(set_enabled(&config, "com.x.m", true).unwrap().enabled);
        assert!(dir.join("lib/Dep.dll").is_file());

        assert!(matches!(
            set_enabled(&config, "com.x.none", true),
            Err(ModError::NotFound { .. })
        ));
    }

    #[test]
    fn test_stash_and_switch_back_restores_folder() {
        let (temp, config) = game_root();
        let v1 = temp.path().join("v1/Mod");
        write_plugin(&v1.join("Mod.dll"), "com.x.m", "M", "1.0.0");
        write_file(&v1.join("lib/Dep.dll"), &dependency_bytes());
        write_file(&v1.join("readme.txt"), b"v1");
        let v2 = temp.path().join("v2/Mod");
        write_plugin(&v2.join("Mod.dll"), "com.x.m", "M", "2.0.0");

        install(&config, &v1, &mut ScriptedConfirmer::default()).unwrap();
        let folder = config.plugins_dir().join("Mod");
        let original = snapshot(&folder);
        install(&config, &v2, &mut ScriptedConfirmer::default()).unwrap();
        assert_eq!(stored_versions(&config, "com.x.m"), vec!["1.0.0"]);

        let outcome = switch_version(&config, "com.x.m", "1.0.0").unwrap();
        assert_eq!(outcome.identity.version, "1.0.0");
        assert_eq!(outcome.previous_version.as_deref(), Some("2.0.0"));
        assert_eq!(snapshot(&folder), original);
        assert_eq!(stored_versions(&config, "com.x.m"), vec!["2.0.0"]);
        assert_eq!(
            catalog::find(&catalog::load(&config), "com.x.m").unwrap().version,
            "1.0.0"
        );
    }

    #[test]
    fn test_switch_errors() {
        let (_temp, config) = game_root();
        let plugins = config.plugins_dir();
        write_plugin(&plugins.join("A.dll"), "com.x.a", "A", "2.0");
        write_plugin(&plugins.join("Other.dll"), "com.x.other", "O", "1.0");
        let stored = store::version_dir(&config, "com.x.a", "1.0");
        write_plugin(&stored.join("Other.dll.disabled"), "com.x.a", "A", "1.0");

        assert!(matches!(
            switch_version(&config, "com.x.a", "9.9"),
            Err(ModError::NotFound { .. })
        ));
        assert!(matches!(
            switch_version(&config, "com.x.a", "1.0"),
            Err(ModError::Conflict { .. })
        ));
        assert!(plugins.join("A.dll").is_file());
        assert!(stored.join("Other.dll.disabled").is_file());
    }

    #[test]
    fn test_uninstall_single_version() {
        let (temp, config) = game_root();
        let source = write_plugin(&temp.path().join("A.dll"), "com.x.a", "A", "1.0");
        install(&config, &source, &mut ScriptedConfirmer::default()).unwrap();

        let canceled = uninstall(&config, "com.x.a", &mut ScriptedConfirmer::default()).unwrap();
        assert_eq!(canceled, UninstallOutcome::Canceled);

        let mut confirmer = ScriptedConfirmer::new(&[Choice::Destructive]);
        let outcome = uninstall(&config, "com.x.a", &mut confirmer).unwrap();
        assert_eq!(
            outcome,
            UninstallOutcome::Removed {
                removed_files: 1,
                removed_versions: Vec::new(),
            }
        );
        assert!(!config.plugins_dir().join("A.dll").exists());
        assert!(catalog::find(&catalog::load(&config), "com.x.a").is_none());
    }

    #[test]
    fn test_uninstall_remove_all_leaves_no_trace() {
        let (temp, config) = game_root();
        for version in ["1.0.0", "1.1.0", "1.2.0"] {
            let source = write_plugin(
                &temp.path().join(version).join("Mod/Mod.dll"),
                "com.x.m",
                "M",
                version,
            );
            install(&config, source.parent().unwrap(), &mut ScriptedConfirmer::default()).unwrap();
        }
        assert_eq!(stored_versions(&config, "com.x.m"), vec!["1.1.0", "1.0.0"]);

        let mut confirmer = ScriptedConfirmer::new(&[Choice::Primary]);
        let outcome = uninstall(&config, "com.x.m", &mut confirmer).unwrap();
        assert_eq!(confirmer.asked, vec!["Confirm uninstall"]);
        assert!(matches!(
            outcome,
            UninstallOutcome::Removed { ref removed_versions, .. } if removed_versions.len() == 2
        ));
        assert!(find_installed(&config, "com.x.m").unwrap().is_none());
        assert!(!store::package_dir(&config, "com.x.m").exists());
        assert!(snapshot(&config.plugins_dir()).is_empty());
    }

    #[test]
    fn test_uninstall_picker_switches_then_prunes() {
        let (temp, config) = game_root();
        for version in ["1.0.0", "1.1.0", "1.2.0"] {
            let source = write_plugin(
                &temp.path().join(version).join("A.dll"),
                "com.x.a",
                "A",
                version,
            );
            install(&config, &source, &mut ScriptedConfirmer::default()).unwrap();
        }

        let mut confirmer =
            ScriptedConfirmer::new(&[Choice::Secondary]).with_selection(VersionSelection {
                remove: vec!["1.0.0".into(), "1.1.0".into()],
                keep_as_active: Some("1.1.0".into()),
            });
        let outcome = uninstall(&config, "com.x.a", &mut confirmer).unwrap();

        assert_eq!(
            outcome,
            UninstallOutcome::Pruned {
                removed_versions: vec!["1.0.0".into()],
                active_version: "1.1.0".into(),
            }
        );
        assert_eq!(stored_versions(&config, "com.x.a"), vec!["1.2.0"]);
        assert!(config.plugins_dir().join("A.dll").is_file());
    }

    #[test]
    fn test_uninstall_picker_cancel() {
        let (temp, config) = game_root();
        for version in ["1.0.0", "2.0.0"] {
            let source = write_plugin(&temp.path().join(version).join("A.dll"), "com.x.a", "A", version);
            install(&config, &source, &mut ScriptedConfirmer::default()).unwrap();
        }

        let mut confirmer = ScriptedConfirmer::new(&[Choice::Secondary]);
        let outcome = uninstall(&config, "com.x.a", &mut confirmer).unwrap();
        assert_eq!(outcome, UninstallOutcome::Canceled);
        assert_eq!(confirmer.asked, vec!["Confirm uninstall", "pick versions"]);
        assert_eq!(stored_versions(&config, "com.x.a"), vec!["1.0.0"]);
    }
}
