//! Archive extraction for package installation.
//!
//! Supported formats: `.zip`, `.7z` and gzip tarballs (`.tar.gz` / `.tgz`).
//! Entries whose path would escape the destination are skipped.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::{IoResultExt, ModError, ModResult};
use crate::package::is_module_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
    TarGz,
}

impl ArchiveFormat {
    /// Detects the format from the file name (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".7z") {
            Some(Self::SevenZip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }
}

/// Extracts every entry of `archive` under `dest`.
pub fn extract_all(archive: &Path, dest: &Path) -> ModResult<usize> {
    extract_filtered(archive, dest, |_| true)
}

/// Extracts only module files, keeping their relative paths. Used to peek at
/// an archive's identity without unpacking assets.
pub fn extract_modules(archive: &Path, dest: &Path) -> ModResult<usize> {
    extract_filtered(archive, dest, is_module_file)
}

fn extract_filtered(
    archive: &Path,
    dest: &Path,
    keep: impl Fn(&Path) -> bool,
) -> ModResult<usize> {
    let format =
        ArchiveFormat::from_path(archive).ok_or_else(|| ModError::UnsupportedFormat {
            path: archive.to_path_buf(),
        })?;
    if !archive.is_file() {
        return Err(ModError::not_found("archive", archive));
    }
    fs::create_dir_all(dest).at(dest)?;

    let count = match format {
        ArchiveFormat::Zip => extract_zip(archive, dest, &keep)?,
        ArchiveFormat::SevenZip => extract_7z(archive, dest, &keep)?,
        ArchiveFormat::TarGz => extract_tar_gz(archive, dest, &keep)?,
    };
    tracing::debug!(archive = %archive.display(), entries = count, "extracted");
    Ok(count)
}

fn extraction_error(archive: &Path, reason: impl ToString) -> ModError {
    ModError::Extraction {
        path: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Joins an archive entry name onto `dest`, refusing absolute paths and
/// parent components.
fn safe_join(dest: &Path, entry_name: &str) -> Option<PathBuf> {
    let normalized = entry_name.replace('\\', "/");
    let mut out = dest.to_path_buf();
    let mut pushed = false;
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    pushed.then_some(out)
}

/// Resolves where an entry goes, or `None` when it is skipped.
fn entry_target(
    archive: &Path,
    dest: &Path,
    name: &str,
    keep: &impl Fn(&Path) -> bool,
) -> Option<PathBuf> {
    let Some(target) = safe_join(dest, name) else {
        tracing::warn!(archive = %archive.display(), entry = name, "skipping unsafe entry path");
        return None;
    };
    keep(&target).then_some(target)
}

fn write_entry(reader: &mut dyn Read, target: &Path) -> ModResult<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    let mut out = File::create(target).at(target)?;
    io::copy(reader, &mut out).at(target)?;
    Ok(())
}

fn extract_zip(archive: &Path, dest: &Path, keep: &impl Fn(&Path) -> bool) -> ModResult<usize> {
    let file = File::open(archive).at(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| extraction_error(archive, e))?;

    let mut count = 0;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| extraction_error(archive, e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if let Some(target) = entry_target(archive, dest, &name, keep) {
            write_entry(&mut entry, &target)?;
            count += 1;
        }
    }
    Ok(count)
}

fn extract_7z(archive: &Path, dest: &Path, keep: &impl Fn(&Path) -> bool) -> ModResult<usize> {
    let mut count = 0;
    let mut failure: Option<ModError> = None;

    let result = sevenz_rust::decompress_file_with_extract_fn(
        archive,
        dest,
        |entry, reader, _default_target| {
            if entry.is_directory() {
                return Ok(true);
            }
            let Some(target) = entry_target(archive, dest, entry.name(), keep) else {
                // Solid blocks must still be read through.
                if let Err(e) = io::copy(reader, &mut io::sink()) {
                    failure = Some(extraction_error(archive, e));
                    return Ok(false);
                }
                return Ok(true);
            };
            match write_entry(reader, &target) {
                Ok(()) => {
                    count += 1;
                    Ok(true)
                }
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        },
    );

    if let Some(e) = failure {
        return Err(e);
    }
    result.map_err(|e| extraction_error(archive, e))?;
    Ok(count)
}

fn extract_tar_gz(archive: &Path, dest: &Path, keep: &impl Fn(&Path) -> bool) -> ModResult<usize> {
    let file = File::open(archive).at(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    let mut count = 0;
    for entry in tar.entries().map_err(|e| extraction_error(archive, e))? {
        let mut entry = entry.map_err(|e| extraction_error(archive, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .map_err(|e| extraction_error(archive, e))?
            .to_string_lossy()
            .into_owned();
        if let Some(target) = entry_target(archive, dest, &name, keep) {
            write_entry(&mut entry, &target)?;
            count += 1;
        }
    }
    Ok(count)
}
