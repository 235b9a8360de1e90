//! Manual bootstrap commands
//!
//! When the cluster is not initialised automatically, the talosctl
//! commands to do it by hand are printed and saved to `commands.md`.

use std::path::Path;

use crate::core::cluster::{strip_prefix_len, ClusterFile};
use crate::core::patch::NodeRole;
use crate::infra::talosctl::{args, render_command, TALOSCTL};

/// File the manual commands are saved to
pub const COMMANDS_FILE: &str = "commands.md";

/// One line of the manual procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A command to run
    Run(String),
    /// A pause the operator has to wait out
    Wait(String),
}

/// Ordered manual bootstrap procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualCommands {
    steps: Vec<Step>,
}

impl ManualCommands {
    /// Build the procedure for `cluster` with configs under `config_dir`
    pub fn for_cluster(cluster: &ClusterFile, config_dir: &Path, kube_dir: &Path) -> Self {
        let talosconfig = config_dir.join("talosconfig");
        let mut steps = Vec::new();
        let run = |a: Vec<String>| Step::Run(render_command(TALOSCTL, &a));

        if let Some(first) = cluster.first_cp_ip() {
            steps.push(run(args::apply_config(
                first,
                &config_dir.join(NodeRole::ControlPlane.config_file(1)),
            )));
            steps.push(Step::Wait(
                "Please, wait init and reboot first control plane, before run next commands".to_string(),
            ));
            steps.push(run(args::bootstrap(first, &talosconfig)));
            steps.push(Step::Wait(
                "Please, wait bootstrap first control plane, before run next commands".to_string(),
            ));
        }

        for (i, ip) in cluster.cp_ips.iter().enumerate().skip(1) {
            steps.push(run(args::apply_config(
                strip_prefix_len(ip),
                &config_dir.join(NodeRole::ControlPlane.config_file(i + 1)),
            )));
        }
        for (i, ip) in cluster.worker_ips.iter().enumerate() {
            steps.push(run(args::apply_config(
                strip_prefix_len(ip),
                &config_dir.join(NodeRole::Worker.config_file(i + 1)),
            )));
        }

        let kubeconfig = kube_dir.join(format!("{}.yaml", cluster.answers.cluster_name));
        steps.push(run(args::kubeconfig(
            &kubeconfig,
            &cluster.endpoint_ip(),
            &talosconfig,
        )));

        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Commands only, in order
    pub fn commands(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                Step::Run(cmd) => Some(cmd.as_str()),
                Step::Wait(_) => None,
            })
            .collect()
    }

    /// Markdown with a single `sh` block; waits become shell comments
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Manual cluster initialization commands\n\n```sh\n");
        for step in &self.steps {
            match step {
                Step::Run(cmd) => out.push_str(cmd),
                Step::Wait(note) => {
                    out.push_str("# ");
                    out.push_str(note);
                }
            }
            out.push('\n');
        }
        out.push_str("```\n");
        out
    }
}
