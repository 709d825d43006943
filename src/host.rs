//! Collaborators outside the package engine: finding the game folder and
//! checking that the plugin host runtime is in place.
//!
//! Launcher-registry lookups and runtime downloads live in front ends; the
//! library only needs the answers.

use std::path::{Path, PathBuf};

use crate::config::ManagerConfig;

/// Finds the game install directory.
pub trait HostLocator {
    fn locate(&self) -> Option<PathBuf>;
}

/// A path chosen up front (command line, saved settings).
#[derive(Debug, Clone)]
pub struct FixedLocation(pub PathBuf);

impl HostLocator for FixedLocation {
    fn locate(&self) -> Option<PathBuf> {
        self.0.is_dir().then(|| self.0.clone())
    }
}

/// Reads the game directory from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvLocator {
    pub var: String,
}

impl EnvLocator {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl HostLocator for EnvLocator {
    fn locate(&self) -> Option<PathBuf> {
        let value = std::env::var_os(&self.var)?;
        let path = PathBuf::from(value);
        path.is_dir().then_some(path)
    }
}

/// State of the plugin host runtime in a game folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    /// Loader and core libraries present, first-run configuration generated.
    Ready,
    /// Installed, but the game has not been launched once yet.
    AwaitingFirstRun { config_path: PathBuf },
    /// A required file is missing.
    Missing { path: PathBuf },
}

pub trait RuntimeCheck {
    fn check(&self, config: &ManagerConfig) -> RuntimeStatus;
}

/// Checks for the proxy loader, the host core libraries and the host's
/// generated configuration file.
#[derive(Debug, Clone, Default)]
pub struct FileSystemCheck;

const LOADER_FILES: [&str; 2] = ["winhttp.dll", "doorstop_config.ini"];
const CORE_LIBRARIES: [&str; 2] = ["BepInEx.dll", "BepInEx.Preloader.dll"];
const HOST_CONFIG: &str = "BepInEx.cfg";

impl RuntimeCheck for FileSystemCheck {
    fn check(&self, config: &ManagerConfig) -> RuntimeStatus {
        for name in LOADER_FILES {
            let path = config.game_root.join(name);
            if !path.is_file() {
                return RuntimeStatus::Missing { path };
            }
        }

        let core = config.host_root().join("core");
        if !CORE_LIBRARIES.iter().any(|name| core.join(name).is_file()) {
            return RuntimeStatus::Missing { path: core };
        }

        let plugins = config.plugins_dir();
        if !plugins.is_dir() {
            return RuntimeStatus::Missing { path: plugins };
        }

        let config_path = host_config_path(config);
        if config_path.is_file() {
            RuntimeStatus::Ready
        } else {
            RuntimeStatus::AwaitingFirstRun { config_path }
        }
    }
}

pub fn host_config_path(config: &ManagerConfig) -> PathBuf {
    config.host_root().join("config").join(HOST_CONFIG)
}

/// First candidate that resolves to a game folder.
pub fn locate_first(locators: &[&dyn HostLocator]) -> Option<PathBuf> {
    locators.iter().find_map(|l| l.locate())
}

/// True if `dir` looks like a game folder with the host runtime unpacked.
pub fn has_host_dir(dir: &Path, config: &ManagerConfig) -> bool {
    dir.join(&config.host_dir_name).is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_file;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_runtime_status_walks_setup_stages() {
        let temp = TempDir::new().unwrap();
        let config = ManagerConfig::new(temp.path());

        assert_eq!(
            FileSystemCheck.check(&config),
            RuntimeStatus::Missing {
                path: temp.path().join("winhttp.dll")
            }
        );

        write_file(&temp.path().join("winhttp.dll"), b"");
        write_file(&temp.path().join("doorstop_config.ini"), b"");
        write_file(&config.host_root().join("core/BepInEx.Preloader.dll"), b"");
        std::fs::create_dir_all(config.plugins_dir()).unwrap();

        assert_eq!(
            FileSystemCheck.check(&config),
            RuntimeStatus::AwaitingFirstRun {
                config_path: host_config_path(&config)
            }
        );

        write_file(&host_config_path(&config), b"[Logging]\n");
        assert_eq!(FileSystemCheck.check(&config), RuntimeStatus::Ready);
    }

    #[test]
    fn test_locators() {
        let temp = TempDir::new().unwrap();
        let missing = FixedLocation(temp.path().join("nope"));
        let present = FixedLocation(temp.path().to_path_buf());

        assert_eq!(missing.locate(), None);
        assert_eq!(
            locate_first(&[&missing, &present]),
            Some(temp.path().to_path_buf())
        );
        assert_eq!(EnvLocator::new("MODDEPOT_TEST_UNSET_VARIABLE").locate(), None);

        let config = ManagerConfig::new(temp.path());
        assert!(!has_host_dir(temp.path(), &config));
        std::fs::create_dir_all(config.host_root()).unwrap();
        assert!(has_host_dir(temp.path(), &config));
    }
}
