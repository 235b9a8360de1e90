//! User settings from `config.toml`
//!
//! Every key is optional. A missing file behaves like an empty one, and
//! command-line flags and environment variables override whatever is set
//! here.
//!
//! ```toml
//! [defaults]
//! image = "ghcr.io/siderolabs/installer:v1.12.2"
//! k8s_version = "1.35.0"
//! config_dir = "config"
//!
//! [update]
//! check_enabled = false
//!
//! [install]
//! bin_dir = "/usr/local/bin"
//! ```

use crate::config::defaults;
use crate::infra::dirs::TalostplDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlobalConfigError {
    #[error("Cannot read settings from {}: {error}", path.display())]
    Unreadable { path: PathBuf, error: String },

    #[error("Invalid settings in {}: {error}", path.display())]
    Invalid { path: PathBuf, error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    pub defaults: GeneratorDefaults,
    pub update: UpdateSettings,
    pub install: InstallSettings,
}

/// Values offered as prompt defaults by `generate`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneratorDefaults {
    pub image: Option<String>,
    pub k8s_version: Option<String>,
    pub config_dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpdateSettings {
    pub check_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InstallSettings {
    pub bin_dir: Option<PathBuf>,
}

impl GlobalConfig {
    pub fn load(dirs: &TalostplDirs) -> Result<Self, GlobalConfigError> {
        Self::read(&dirs.global_config_path())
    }

    /// Parse `path`, treating a missing file as "nothing configured"
    pub fn read(path: &Path) -> Result<Self, GlobalConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(GlobalConfigError::Unreadable {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                })
            }
        };
        Self::parse(&text).map_err(|error| GlobalConfigError::Invalid {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.message().to_string())
    }

    #[must_use]
    pub fn image(&self) -> &str {
        non_empty(&self.defaults.image).unwrap_or(defaults::DEFAULT_IMAGE)
    }

    #[must_use]
    pub fn k8s_version(&self) -> &str {
        non_empty(&self.defaults.k8s_version).unwrap_or(defaults::DEFAULT_K8S_VERSION)
    }

    #[must_use]
    pub fn config_dir(&self) -> &str {
        non_empty(&self.defaults.config_dir).unwrap_or(defaults::DEFAULT_CONFIG_DIR)
    }

    /// The update check is on unless explicitly disabled
    #[must_use]
    pub fn update_check_enabled(&self) -> bool {
        self.update.check_enabled != Some(false)
    }

    /// Where `release install` places the binary when no `--bin-dir` is given
    #[must_use]
    pub fn bin_dir(&self, dirs: &TalostplDirs) -> PathBuf {
        match &self.install.bin_dir {
            Some(dir) => dir.clone(),
            None => dirs.default_bin_dir(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
