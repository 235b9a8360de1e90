//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod add;
pub mod doctor;
pub mod generate;
pub mod release;

use std::io::{StdinLock, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::cli::output::{is_quiet, print_detail, print_warning, stdout_reserved};
use crate::cli::Settings;
use crate::core::doctor::{check_required_tools, install_instructions, HostOs};
use crate::core::version::{check_for_updates, UpdateCheckResult};
use crate::config::urls;
use crate::error::ToolError;
use crate::infra::prompt::TerminalPrompt;
use crate::infra::talosctl::SystemRunner;

const GENERATE_EXAMPLE: &str = "\
Example answers file for --from-file:

  clusterName: talos-demo
  k8sVersion: 1.35.0
  image: factory.talos.dev/nocloud-installer/<schematic>:v1.12.2
  iface: ens18
  cpCount: 3
  workerCount: 2
  gateway: 10.0.0.1
  netmask: \"24\"
  dns1: 8.8.8.8
  dns2: 8.8.4.4
  ntp1: 1.ru.pool.ntp.org
  ntp2: 2.ru.pool.ntp.org
  ntp3: 3.ru.pool.ntp.org
  useVIP: true
  vipIP: 10.0.0.100
  useExtBalancer: false
  extBalancerIP: \"\"
  disk: /dev/sda
  useDRBD: true
  useZFS: false
  useSPL: false
  useVFIOPCI: false
  useVFIOIOMMU: false
  useOVS: false
  useMirrors: true
  useMaxPods: false
  cpIPs: [10.0.0.11, 10.0.0.12, 10.0.0.13]
  workerIPs: [10.0.0.21, 10.0.0.22]";

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate Talos machine configs for a new cluster
    #[command(after_long_help = GENERATE_EXAMPLE)]
    Generate {
        /// Force clean config directory if not empty
        #[arg(long)]
        force: bool,

        /// YAML file with all answers for non-interactive mode (see --help for example)
        #[arg(long = "from-file", value_name = "FILE")]
        from_file: Option<PathBuf>,
    },

    /// Add new node based on existing configuration
    ///
    /// The node config is derived from cp1.patch or worker1.patch.
    Add {
        /// Control plane node number
        #[arg(long, value_name = "N")]
        cp: Option<usize>,

        /// Worker node number
        #[arg(long, value_name = "N")]
        worker: Option<usize>,

        /// IP address for the new node
        #[arg(long)]
        address: Option<String>,

        /// Automatically apply configuration to the node
        #[arg(long = "auto-apply")]
        auto_apply: bool,
    },

    /// Check that talosctl and kubectl are installed
    Doctor,

    /// Download, verify and install a talostpl release binary
    Release {
        #[command(subcommand)]
        command: ReleaseCommands,
    },
}

/// `release` subcommands
#[derive(Subcommand, Debug)]
pub enum ReleaseCommands {
    /// Print the release descriptor
    Show {
        /// Descriptor file (defaults to the published release)
        #[arg(long, value_name = "FILE")]
        descriptor: Option<PathBuf>,
    },

    /// Download the artifact and verify its checksum
    Check {
        /// Descriptor file (defaults to the published release)
        #[arg(long, value_name = "FILE")]
        descriptor: Option<PathBuf>,
    },

    /// Install the release binary and smoke-test it
    Install {
        /// Descriptor file (defaults to the published release)
        #[arg(long, value_name = "FILE")]
        descriptor: Option<PathBuf>,

        /// Install location (defaults to ~/.local/bin)
        #[arg(long = "bin-dir", value_name = "DIR")]
        bin_dir: Option<PathBuf>,

        /// Do not run the installed binary afterwards
        #[arg(long = "skip-test")]
        skip_test: bool,
    },

    /// Run the smoke test against an installed binary
    Test {
        /// Descriptor file (defaults to the published release)
        #[arg(long, value_name = "FILE")]
        descriptor: Option<PathBuf>,

        /// Install location (defaults to ~/.local/bin)
        #[arg(long = "bin-dir", value_name = "DIR")]
        bin_dir: Option<PathBuf>,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self, settings: &Settings) -> Result<()> {
        match self {
            Self::Generate { force, from_file } => {
                generate::execute(settings, force, from_file).await
            }
            Self::Add {
                cp,
                worker,
                address,
                auto_apply,
            } => add::execute(settings, cp, worker, address.as_deref(), auto_apply).await,
            Self::Doctor => doctor::execute().await,
            Self::Release { command } => match command {
                ReleaseCommands::Show { descriptor } => {
                    release::show(descriptor.as_deref())
                }
                ReleaseCommands::Check { descriptor } => {
                    release::check(settings, descriptor.as_deref()).await
                }
                ReleaseCommands::Install {
                    descriptor,
                    bin_dir,
                    skip_test,
                } => {
                    release::install(settings, descriptor.as_deref(), bin_dir, skip_test).await
                }
                ReleaseCommands::Test {
                    descriptor,
                    bin_dir,
                } => release::test(settings, descriptor.as_deref(), bin_dir),
            },
        }
    }
}

/// Checks run before `generate` and `add`
///
/// Missing tools abort with install instructions; the update check only
/// ever warns.
async fn preflight(settings: &Settings) -> Result<()> {
    if let Err(e) = check_required_tools() {
        if let ToolError::Missing { tools } = &e {
            eprintln!("Required tools not found: {}", tools.join(", "));
            eprintln!("\nInstallation instructions:\n");
            eprintln!("{}\n", install_instructions(HostOs::current()));
        }
        return Err(e.into());
    }

    if !settings.update_check || is_quiet() {
        return Ok(());
    }
    match check_for_updates().await {
        UpdateCheckResult::UpdateAvailable { current, latest } => {
            print_warning(&format!(
                "Your version is v{current}, latest is v{latest}. Please update!"
            ));
            print_detail(&format!("{}/latest", urls::RELEASES_PAGE));
        }
        UpdateCheckResult::UpToDate { current } => {
            tracing::debug!("talostpl v{current} is up to date");
        }
        UpdateCheckResult::CheckFailed { reason } => {
            print_warning("Failed to check latest version");
            tracing::debug!("Update check failed: {reason}");
        }
    }
    Ok(())
}

/// talosctl runner and terminal prompt for the current output mode
///
/// In JSON or quiet mode both talk on stderr so stdout stays parseable.
fn terminal_session() -> (SystemRunner, TerminalPrompt<StdinLock<'static>, Box<dyn Write>>) {
    let reserved = stdout_reserved();
    (SystemRunner::new(reserved), TerminalPrompt::stdio(reserved))
}

/// Run talosctl and stdin prompts without holding up the async workers
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    tokio::task::block_in_place(work)
}
