use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File extension of a loadable module, without the leading dot.
pub const MODULE_EXTENSION: &str = "dll";

/// Suffix appended to a module file name to stop the host from loading it.
pub const DISABLED_SUFFIX: &str = ".disabled";

/// Placeholder version for modules that declare none.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Identity triple declared by a package module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub stable_id: String,
    pub display_name: String,
    pub version: String,
}

impl PackageIdentity {
    /// Builds an identity from raw annotation values, applying the
    /// display-name and version fallbacks. Returns `None` for a blank id.
    pub fn from_declared(stable_id: &str, display_name: &str, version: &str) -> Option<Self> {
        let stable_id = stable_id.trim();
        if stable_id.is_empty() {
            return None;
        }

        let display_name = match display_name.trim() {
            "" => stable_id,
            name => name,
        };

        let version = match version.trim() {
            "" | "0.0.0.0" => DEFAULT_VERSION,
            v => v,
        };

        Some(Self {
            stable_id: stable_id.to_string(),
            display_name: display_name.to_string(),
            version: version.to_string(),
        })
    }

    /// Case-insensitive stable id comparison.
    pub fn same_package(&self, stable_id: &str) -> bool {
        self.stable_id.eq_ignore_ascii_case(stable_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageKind {
    Folder,
    SingleFile,
}

/// A package currently present in the plugin directory.
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub identity: PackageIdentity,
    pub kind: PackageKind,
    /// Folder name, or base module file name without the disabled marker.
    pub location_name: String,
    /// Folder path, or the module file path as it currently exists on disk.
    pub active_path: PathBuf,
    /// The module that carries the identity annotation.
    pub module_path: PathBuf,
    pub enabled: bool,
}

impl InstalledPackage {
    pub fn stable_id(&self) -> &str {
        &self.identity.stable_id
    }

    pub fn version(&self) -> &str {
        &self.identity.version
    }
}

/// Returns true for `X.dll` and `X.dll.disabled` (case-insensitive).
pub fn is_module_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let stem = strip_suffix_ignore_case(name, DISABLED_SUFFIX).unwrap_or(name);
    matches!(
        strip_suffix_ignore_case(stem, MODULE_EXTENSION),
        Some(base) if base.len() > 1 && base.ends_with('.')
    )
}

pub fn is_disabled(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| strip_suffix_ignore_case(n, DISABLED_SUFFIX))
        .is_some()
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(split) || !name[split..].eq_ignore_ascii_case(suffix) {
        return None;
    }
    Some(&name[..split])
}

/// The path with the disabled marker removed.
pub fn enabled_path(path: &Path) -> PathBuf {
    match path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| strip_suffix_ignore_case(n, DISABLED_SUFFIX))
    {
        Some(base) => path.with_file_name(base),
        None => path.to_path_buf(),
    }
}

/// The path with the disabled marker appended.
pub fn disabled_path(path: &Path) -> PathBuf {
    if is_disabled(path) {
        return path.to_path_buf();
    }
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(DISABLED_SUFFIX);
    path.with_file_name(name)
}
