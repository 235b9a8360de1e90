//! Where talostpl keeps its own files
//!
//! `TALOSTPL_CONFIG_DIR` and `TALOSTPL_CACHE_DIR` replace the platform
//! locations (`~/.config/talostpl`, `~/.cache/talostpl` on Linux).

use std::path::{Path, PathBuf};

pub const ENV_CACHE_DIR: &str = "TALOSTPL_CACHE_DIR";
pub const ENV_CONFIG_DIR: &str = "TALOSTPL_CONFIG_DIR";

/// Per-user directories, resolved once at startup
#[derive(Debug, Clone)]
pub struct TalostplDirs {
    cache: PathBuf,
    settings: PathBuf,
    home: PathBuf,
}

impl TalostplDirs {
    #[must_use]
    pub fn new() -> Self {
        let home = ::dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            cache: app_dir(ENV_CACHE_DIR, ::dirs::cache_dir(), &home, ".cache"),
            settings: app_dir(ENV_CONFIG_DIR, ::dirs::config_dir(), &home, ".config"),
            home,
        }
    }

    #[must_use]
    pub fn with_roots(cache_dir: &Path, config_dir: &Path, home_dir: &Path) -> Self {
        Self {
            cache: cache_dir.into(),
            settings: config_dir.into(),
            home: home_dir.into(),
        }
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.settings
    }

    /// Release artifacts are staged here before being installed
    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.cache.join("downloads")
    }

    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.settings.join("config.toml")
    }

    /// `~/.local/bin`
    #[must_use]
    pub fn default_bin_dir(&self) -> PathBuf {
        self.home.join(".local/bin")
    }

    /// `~/.kube`, the destination of generated kubeconfigs
    #[must_use]
    pub fn kube_dir(&self) -> PathBuf {
        self.home.join(".kube")
    }
}

impl Default for TalostplDirs {
    fn default() -> Self {
        Self::new()
    }
}

/// Env override, else `<platform>/talostpl`, else `~/<hidden>/talostpl`
fn app_dir(var: &str, platform: Option<PathBuf>, home: &Path, hidden: &str) -> PathBuf {
    match std::env::var_os(var) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => platform
            .unwrap_or_else(|| home.join(hidden))
            .join("talostpl"),
    }
}
