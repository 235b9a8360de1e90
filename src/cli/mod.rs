//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::core::global_config::GlobalConfig;
use crate::core::version::{update_check_disabled, ENV_NO_UPDATE_CHECK};
use crate::infra::dirs::TalostplDirs;
use commands::Commands;

/// talostpl - Interactive Talos K8s config generator
///
/// Utility for generating configs and running Talos K8s bootstrap.
#[derive(Parser, Debug)]
#[command(name = "talostpl")]
#[command(author, about, long_about = None)]
#[command(version = concat!("version v", env!("CARGO_PKG_VERSION")))]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Talos installer image
    #[arg(long, global = true)]
    pub image: Option<String>,

    /// Kubernetes version
    #[arg(long = "k8s-version", global = true)]
    pub k8s_version: Option<String>,

    /// Directory for configs
    #[arg(long = "config-dir", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Skip the check for a newer talostpl release
    #[arg(long, global = true)]
    pub no_update_check: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Settings shared by all commands, resolved as flag > environment > config file > default
#[derive(Debug, Clone)]
pub struct Settings {
    pub dirs: TalostplDirs,
    pub global: GlobalConfig,
    pub image: String,
    pub k8s_version: String,
    pub config_dir: PathBuf,
    pub update_check: bool,
}

impl Settings {
    /// Resolve against `dirs` and the environment
    pub fn resolve(cli: &Cli, dirs: TalostplDirs) -> Result<Self> {
        let global = GlobalConfig::load(&dirs).context("Failed to load global config")?;
        let env_value = std::env::var(ENV_NO_UPDATE_CHECK).ok();
        let update_check = !update_check_disabled(
            cli.no_update_check,
            env_value.as_deref(),
            global.update_check_enabled(),
        );

        Ok(Self {
            image: cli
                .image
                .clone()
                .unwrap_or_else(|| global.image().to_string()),
            k8s_version: cli
                .k8s_version
                .clone()
                .unwrap_or_else(|| global.k8s_version().to_string()),
            config_dir: cli
                .config_dir
                .clone()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| PathBuf::from(global.config_dir())),
            update_check,
            dirs,
            global,
        })
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let settings = Settings::resolve(&self, TalostplDirs::new())?;
        if let Some(cmd) = self.command {
            cmd.run(&settings).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}
