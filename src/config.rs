//! Configuration for the mod manager.
//!
//! Every path the manager touches is derived from the game folder:
//!
//! ```text
//! <game>/BepInEx/plugins/                      active packages
//! <game>/BepInEx/plugins/.versions/<id>/<ver>/ version store
//! <game>/BepInEx/ModDepot/ModIndex.json         package catalog
//! ```

use std::path::{Path, PathBuf};

use crate::error::{ModError, ModResult};

/// Configuration for the mod manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Game install folder that holds the plugin host directory.
    pub game_root: PathBuf,

    /// Plugin host directory under the game folder.
    pub host_dir_name: String,

    /// Tool directory under the host directory, holding the catalog and scratch space.
    pub tool_dir_name: String,

    pub catalog_file_name: String,

    /// Hidden version store directory under the plugin directory.
    pub store_dir_name: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            game_root: PathBuf::new(),
            host_dir_name: "BepInEx".to_string(),
            tool_dir_name: "ModDepot".to_string(),
            catalog_file_name: "ModIndex.json".to_string(),
            store_dir_name: ".versions".to_string(),
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration for the given game folder.
    pub fn new(game_root: impl Into<PathBuf>) -> Self {
        Self {
            game_root: game_root.into(),
            ..Default::default()
        }
    }

    pub fn with_host_dir_name(mut self, name: impl Into<String>) -> Self {
        self.host_dir_name = name.into();
        self
    }

    pub fn with_tool_dir_name(mut self, name: impl Into<String>) -> Self {
        self.tool_dir_name = name.into();
        self
    }

    pub fn with_catalog_file_name(mut self, name: impl Into<String>) -> Self {
        self.catalog_file_name = name.into();
        self
    }

    pub fn with_store_dir_name(mut self, name: impl Into<String>) -> Self {
        self.store_dir_name = name.into();
        self
    }

    pub fn host_root(&self) -> PathBuf {
        self.game_root.join(&self.host_dir_name)
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.host_root().join("plugins")
    }

    pub fn store_root(&self) -> PathBuf {
        self.plugins_dir().join(&self.store_dir_name)
    }

    pub fn tool_dir(&self) -> PathBuf {
        self.host_root().join(&self.tool_dir_name)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.tool_dir().join(&self.catalog_file_name)
    }

    /// Parent for extraction scratch directories. Kept inside the host
    /// directory so moves out of scratch stay on one volume.
    pub fn scratch_root(&self) -> PathBuf {
        self.tool_dir().join("scratch")
    }

    /// True when `path` is the version store directory itself.
    pub fn is_store_dir(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.eq_ignore_ascii_case(&self.store_dir_name))
    }

    /// Checks that the game folder is set and the plugin directory exists.
    pub fn validate(&self) -> ModResult<()> {
        if self.game_root.as_os_str().is_empty() {
            return Err(ModError::NotConfigured {
                reason: "no game folder set".to_string(),
            });
        }
        if !self.game_root.is_dir() {
            return Err(ModError::NotConfigured {
                reason: format!("{} is not a directory", self.game_root.display()),
            });
        }
        if !self.host_root().is_dir() {
            return Err(ModError::NotConfigured {
                reason: format!(
                    "{} folder not found in {}",
                    self.host_dir_name,
                    self.game_root.display()
                ),
            });
        }
        let plugins = self.plugins_dir();
        if !plugins.is_dir() {
            return Err(ModError::not_found("plugin directory", plugins));
        }
        Ok(())
    }
}
