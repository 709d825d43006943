//! Package identity scanning.
//!
//! A module is a package when one of its types carries the plugin identity
//! attribute `BepInPlugin(guid, name, version)`. Modules are read as bytes and
//! decoded with [`crate::metadata`]; nothing is loaded or executed. Failures to
//! read a module mean "not a package" and are only logged at debug level.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::metadata::{ModuleMetadata, TypeAttribute};
use crate::package::{is_module_file, PackageIdentity};

const IDENTITY_ATTRIBUTE: &str = "BepInPlugin";
const IDENTITY_ATTRIBUTE_LONG: &str = "BepInPluginAttribute";

/// Reads the identity declared by a single module, active or disabled.
pub fn scan_module(path: &Path) -> Option<PackageIdentity> {
    let image = match fs::read(path) {
        Ok(image) => image,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "module unreadable");
            return None;
        }
    };
    identity_from_image(&image).unwrap_or_else(|e| {
        tracing::debug!(path = %path.display(), error = %e, "not a managed module");
        None
    })
}

/// Reads the identity declared anywhere in a folder. Shallower modules are
/// tried first; a folder without one is a dependency bundle.
pub fn scan_folder(path: &Path) -> Option<PackageIdentity> {
    locate_identity(path).map(|(identity, _)| identity)
}

/// Like [`scan_folder`], also returning the module that declared the identity.
pub fn locate_identity(folder: &Path) -> Option<(PackageIdentity, PathBuf)> {
    module_files(folder)
        .into_iter()
        .find_map(|module| scan_module(&module).map(|identity| (identity, module)))
}

/// Module files under `folder` (recursively), ordered by depth and then
/// case-insensitively by path.
pub fn module_files(folder: &Path) -> Vec<PathBuf> {
    let mut modules: Vec<(usize, String, PathBuf)> = WalkDir::new(folder)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_module_file(entry.path()))
        .map(|entry| {
            let key = entry.path().to_string_lossy().to_lowercase();
            (entry.depth(), key, entry.into_path())
        })
        .collect();
    modules.sort();
    modules.into_iter().map(|(_, _, path)| path).collect()
}

fn identity_from_image(
    image: &[u8],
) -> Result<Option<PackageIdentity>, crate::metadata::MetadataError> {
    let metadata = ModuleMetadata::parse(image)?;
    let attributes = metadata.type_attributes()?;
    if attributes.is_empty() {
        return Ok(None);
    }

    for row in metadata.types_in_declaration_order()? {
        let Some(found) = attributes.get(&row) else {
            continue;
        };
        for attribute in found.iter().filter(|a| is_identity_attribute(a)) {
            let Some(args) = attribute.leading_string_args(3) else {
                continue;
            };
            if let Some(identity) = PackageIdentity::from_declared(&args[0], &args[1], &args[2]) {
                return Ok(Some(identity));
            }
        }
    }
    Ok(None)
}

fn is_identity_attribute(attribute: &TypeAttribute<'_>) -> bool {
    attribute.name == IDENTITY_ATTRIBUTE || attribute.name == IDENTITY_ATTRIBUTE_LONG
}
