//! Content root detection for extracted archives and dropped folders.
//!
//! Third-party archives come in many shapes: modules at the root, a single
//! wrapper folder, or the payload buried a few levels down next to readmes.
//! [`resolve_content_root`] picks the subtree that is the payload, and
//! [`placement`] decides whether it lands flat in the plugin directory or
//! under its own folder.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::package::is_module_file;

/// Informational notes about an unusual archive layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutWarning {
    /// The payload sat inside one or more wrapper folders.
    WrapperFolder { name: String },
    /// The payload was found below other content.
    NestedContent { relative: String },
    /// No module file anywhere; the whole tree is used as-is.
    NoModuleFound,
}

impl fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutWarning::WrapperFolder { name } => {
                write!(f, "archive content is wrapped in folder '{name}'")
            }
            LayoutWarning::NestedContent { relative } => {
                write!(f, "modules found nested at '{relative}'")
            }
            LayoutWarning::NoModuleFound => {
                write!(f, "no module found, structure may be non-standard")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRoot {
    pub path: PathBuf,
    pub warning: Option<LayoutWarning>,
}

/// Where a resolved payload goes inside the plugin directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Children of the content root go straight into the plugin directory.
    Flat,
    /// The content root becomes `plugins/<name>`.
    Folder(String),
}

/// Picks the payload subtree of `root`. Resolving the returned path again
/// yields the same path with no warning whenever a module was found.
pub fn resolve_content_root(root: &Path) -> ContentRoot {
    if has_direct_modules(root) {
        return ContentRoot {
            path: root.to_path_buf(),
            warning: None,
        };
    }

    let mut wrapper = root.to_path_buf();
    while let Some(only) = sole_subdirectory(&wrapper) {
        wrapper = only;
    }
    if wrapper != root && has_direct_modules(&wrapper) {
        let name = relative_name(root, &wrapper);
        return ContentRoot {
            path: wrapper,
            warning: Some(LayoutWarning::WrapperFolder { name }),
        };
    }

    if let Some(nested) = shallowest_module_dir(root) {
        let relative = relative_name(root, &nested);
        return ContentRoot {
            path: nested,
            warning: Some(LayoutWarning::NestedContent { relative }),
        };
    }

    ContentRoot {
        path: root.to_path_buf(),
        warning: Some(LayoutWarning::NoModuleFound),
    }
}

/// Decides how a content root found inside `extracted_root` is placed.
///
/// The extracted root itself installs flat. A content folder with no
/// subfolders is just a wrapper around modules and also installs flat;
/// anything richer keeps its own folder.
pub fn placement(extracted_root: &Path, content_root: &Path) -> Placement {
    if content_root == extracted_root {
        return Placement::Flat;
    }
    let has_subdirs = fs::read_dir(content_root)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .any(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        })
        .unwrap_or(false);
    match content_root.file_name().and_then(|n| n.to_str()) {
        Some(name) if has_subdirs => Placement::Folder(name.to_string()),
        _ => Placement::Flat,
    }
}

fn has_direct_modules(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(|e| e.ok())
        .any(|e| e.file_type().is_ok_and(|t| t.is_file()) && is_module_file(&e.path()))
}

/// The only child of `dir` when it holds no files and exactly one folder.
fn sole_subdirectory(dir: &Path) -> Option<PathBuf> {
    let mut only = None;
    for entry in fs::read_dir(dir).ok()?.filter_map(|e| e.ok()) {
        if !entry.file_type().ok()?.is_dir() || only.is_some() {
            return None;
        }
        only = Some(entry.path());
    }
    only
}

fn shallowest_module_dir(root: &Path) -> Option<PathBuf> {
    let mut dirs: Vec<(usize, String, PathBuf)> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| {
            let key = e.path().to_string_lossy().to_lowercase();
            (e.depth(), key, e.into_path())
        })
        .collect();
    dirs.sort();
    dirs.into_iter()
        .map(|(_, _, path)| path)
        .find(|dir| has_direct_modules(dir))
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
