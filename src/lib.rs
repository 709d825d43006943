//! ModDepot Core Library
//!
//! Package manager core for BepInEx plugins: identifies packages from their
//! compiled modules, places them in the plugin directory and keeps alternate
//! versions side by side.
//!
//! # Architecture
//!
//! The library owns all file-system state and never presents anything itself.
//! Front ends supply a [`Confirmer`] for branch decisions and a game folder via
//! [`ManagerConfig`]; the `moddepot` binary is one such front end.
//!
//! # Core Features Implemented
//!
//! ## Package Identity (`scanner`, `metadata` modules)
//! - `scan_module()` - Read a module's declared identity without loading it
//! - `scan_folder()` - Shallowest identified module in a directory tree
//!
//! ## Layout (`layout`, `archive` modules)
//! - `resolve_content_root()` - Find the payload inside an extracted tree
//! - `extract_all()` / `extract_modules()` - zip, 7z and tar.gz extraction
//!
//! ## Installed Packages (`registry`, `catalog` modules)
//! - `scan_installed()` - Enumerate folder and single-file packages
//! - `ensure_minimal()` / `rebuild_from_disk()` - Self-healing package catalog
//!
//! ## Version Store (`store` module)
//! - `stash()` / `restore()` - Move payloads in and out of `plugins/.versions`
//! - `list_versions()` / `prune()` - Browse and trim stored versions
//!
//! ## Package Management (`operations` module)
//! - `install()` - Install a module, folder or archive with version checks
//! - `set_enabled()` - Toggle the disabled marker
//! - `switch_version()` - Swap the active payload for a stored one
//! - `uninstall()` - Remove everything, or prune selected versions
//!
//! ## Host (`host` module)
//! - `HostLocator` / `RuntimeCheck` - Locate the game and check runtime setup

pub mod archive;
pub mod catalog;
pub mod config;
pub mod confirm;
pub mod error;
pub mod fsutil;
pub mod host;
pub mod layout;
pub mod metadata;
pub mod operations;
pub mod package;
pub mod registry;
pub mod scanner;
pub mod store;
pub mod version;

#[cfg(test)]
mod testing;

pub use config::ManagerConfig;
pub use confirm::{Choice, Confirmer, Prompt, VersionSelection};
pub use error::{ModError, ModResult};
pub use package::{InstalledPackage, PackageIdentity, PackageKind};
