//! talosctl invocation
//!
//! Every talosctl call goes through a [`CommandRunner`] so the workflows
//! can be exercised without a real binary. Commands that read files
//! relative to the config directory run with it as working directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::defaults::API_SERVER_PORT;
use crate::error::ToolError;

/// Name of the talosctl binary
pub const TALOSCTL: &str = "talosctl";

/// Runs external programs
pub trait CommandRunner {
    /// Run `program args...` in `cwd` (or the current directory)
    fn run(&mut self, program: &str, args: &[String], cwd: Option<&Path>) -> Result<(), ToolError>;
}

/// Runs programs with inherited stdio
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner {
    stdout_to_stderr: bool,
}

impl SystemRunner {
    /// With `stdout_to_stderr`, child output joins our stderr and stdout
    /// carries only what talostpl itself prints
    pub fn new(stdout_to_stderr: bool) -> Self {
        Self { stdout_to_stderr }
    }

    fn child_stdout(self) -> Stdio {
        if self.stdout_to_stderr {
            Stdio::from(std::io::stderr())
        } else {
            Stdio::inherit()
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, program: &str, args: &[String], cwd: Option<&Path>) -> Result<(), ToolError> {
        let rendered = render_command(program, args);
        tracing::debug!("Running: {rendered} (cwd: {cwd:?})");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(self.child_stdout())
            .stderr(Stdio::inherit());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let status = command.status().map_err(|e| ToolError::Spawn {
            command: rendered.clone(),
            error: e.to_string(),
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(ToolError::Failed {
                command: rendered,
                status: status.to_string(),
            })
        }
    }
}

/// Human-readable command line
pub fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_string()).collect()
}

/// talosctl argument builders
pub mod args {
    use super::{owned, API_SERVER_PORT};
    use std::path::Path;

    /// `gen secrets -o <output>`
    pub fn gen_secrets(output: &Path) -> Vec<String> {
        let mut a = owned(&["gen", "secrets", "-o"]);
        a.push(output.display().to_string());
        a
    }

    /// `gen config ...` run inside the config directory
    pub fn gen_config(k8s_version: &str, cluster_name: &str, endpoint_ip: &str) -> Vec<String> {
        let endpoint = format!("https://{endpoint_ip}:{API_SERVER_PORT}");
        owned(&[
            "gen",
            "config",
            "--kubernetes-version",
            k8s_version,
            "--with-secrets",
            "secrets.yaml",
            cluster_name,
            &endpoint,
            "--config-patch",
            "@patch.yaml",
        ])
    }

    /// `machineconfig patch <base> --patch @<patch> --output <output>`
    pub fn machineconfig_patch(base: &str, patch: &str, output: &str) -> Vec<String> {
        let patch_arg = format!("@{patch}");
        owned(&["machineconfig", "patch", base, "--patch", &patch_arg, "--output", output])
    }

    /// `apply-config --insecure -n <node> --file <file>`
    pub fn apply_config(node: &str, file: &Path) -> Vec<String> {
        let file = file.display().to_string();
        owned(&["apply-config", "--insecure", "-n", node, "--file", &file])
    }

    /// `bootstrap --nodes <node> --endpoints <node> --talosconfig=<path>`
    pub fn bootstrap(node: &str, talosconfig: &Path) -> Vec<String> {
        let talosconfig = format!("--talosconfig={}", talosconfig.display());
        owned(&["bootstrap", "--nodes", node, "--endpoints", node, &talosconfig])
    }

    /// `kubeconfig <output> --nodes <ep> --endpoints <ep> --talosconfig <path>`
    pub fn kubeconfig(output: &Path, endpoint: &str, talosconfig: &Path) -> Vec<String> {
        let output = output.display().to_string();
        let talosconfig = talosconfig.display().to_string();
        owned(&[
            "kubeconfig",
            &output,
            "--nodes",
            endpoint,
            "--endpoints",
            endpoint,
            "--talosconfig",
            &talosconfig,
        ])
    }
}

/// talosctl front end over a runner
pub struct Talosctl<'a> {
    runner: &'a mut dyn CommandRunner,
}

impl<'a> Talosctl<'a> {
    pub fn new(runner: &'a mut dyn CommandRunner) -> Self {
        Self { runner }
    }

    fn run(&mut self, args: Vec<String>, cwd: Option<&Path>) -> Result<(), ToolError> {
        self.runner.run(TALOSCTL, &args, cwd)
    }

    pub fn gen_secrets(&mut self, output: &Path) -> Result<(), ToolError> {
        self.run(args::gen_secrets(output), None)
    }

    pub fn gen_config(
        &mut self,
        config_dir: &Path,
        k8s_version: &str,
        cluster_name: &str,
        endpoint_ip: &str,
    ) -> Result<(), ToolError> {
        self.run(
            args::gen_config(k8s_version, cluster_name, endpoint_ip),
            Some(config_dir),
        )
    }

    pub fn machineconfig_patch(
        &mut self,
        config_dir: &Path,
        base: &str,
        patch: &str,
        output: &str,
    ) -> Result<(), ToolError> {
        self.run(args::machineconfig_patch(base, patch, output), Some(config_dir))
    }

    pub fn apply_config(&mut self, node: &str, file: &Path) -> Result<(), ToolError> {
        self.run(args::apply_config(node, file), None)
    }

    pub fn bootstrap(&mut self, node: &str, talosconfig: &Path) -> Result<(), ToolError> {
        self.run(args::bootstrap(node, talosconfig), None)
    }

    pub fn kubeconfig(
        &mut self,
        output: &Path,
        endpoint: &str,
        talosconfig: &Path,
    ) -> Result<(), ToolError> {
        self.run(args::kubeconfig(output, endpoint, talosconfig), None)
    }
}

/// A recorded program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// Command line without the working directory
    pub fn line(&self) -> String {
        render_command(&self.program, &self.args)
    }
}
