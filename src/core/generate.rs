//! Cluster config generation workflow
//!
//! Answers come from a YAML file or from interactive prompts. The patches
//! are written, talosctl renders the machine configs and, in interactive
//! mode, the cluster can be bootstrapped on the spot.

use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::bootstrap::{ManualCommands, Step, COMMANDS_FILE};
use crate::core::cluster::{
    strip_prefix_len, validate_cp_count, validate_worker_count, ClusterAnswers, ClusterFile,
    IpRegistry,
};
use crate::core::patch::{cluster_patch, node_patch, to_yaml, NodeRole};
use crate::error::{ClusterError, GenerateError};
use crate::infra::filesystem;
use crate::infra::prompt::Prompt;
use crate::infra::talosctl::{CommandRunner, Talosctl};

/// Answers file written after an interactive session
pub const CLUSTER_FILE: &str = "cluster.yaml";

/// Inputs to a generate run
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Where patches and machine configs go
    pub config_dir: PathBuf,
    /// Where `cluster.yaml` and `commands.md` go
    pub work_dir: PathBuf,
    /// Where the kubeconfig is exported (`~/.kube`)
    pub kube_dir: PathBuf,
    /// Clean a non-empty config dir
    pub force: bool,
    /// Non-interactive answers file
    pub from_file: Option<PathBuf>,
    /// Default installer image for the prompts
    pub image: String,
    /// Default Kubernetes version for the prompts
    pub k8s_version: String,
}

impl GenerateOptions {
    pub fn interactive(&self) -> bool {
        self.from_file.is_none()
    }
}

/// How the optional bootstrap ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Answers came from a file; nothing is run
    Skipped,
    /// User said no before anything was applied
    Declined,
    /// User stopped at one of the wait points
    Cancelled,
    /// Cluster bootstrapped and kubeconfig exported
    Completed { kubeconfig: PathBuf },
}

/// Summary of a generate run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    pub cleaned: bool,
    pub patches: Vec<PathBuf>,
    pub configs: Vec<PathBuf>,
    /// `None` when talosconfig was not produced
    pub talosconfig_endpoints: Option<Vec<String>>,
    pub cluster_file: Option<PathBuf>,
    pub commands_file: Option<PathBuf>,
    pub init: InitOutcome,
}

/// Ensure the config dir exists and is empty
///
/// Returns whether existing content was removed.
pub fn prepare_config_dir(
    dir: &Path,
    force: bool,
    interactive: bool,
    prompt: &mut dyn Prompt,
) -> Result<bool, GenerateError> {
    filesystem::create_dir_all(dir)?;
    if filesystem::is_dir_empty(dir)? {
        return Ok(false);
    }
    if !force {
        return Err(GenerateError::DirectoryNotEmpty {
            path: dir.to_path_buf(),
        });
    }
    if interactive
        && !prompt.ask_yes_no(
            &format!(
                "Config directory '{}' is not empty. Do you want to delete all its contents?",
                dir.display()
            ),
            false,
        )?
    {
        return Err(GenerateError::Aborted {
            path: dir.to_path_buf(),
        });
    }
    filesystem::clear_dir(dir)?;
    tracing::info!("Directory '{}' cleaned", dir.display());
    Ok(true)
}

/// Load and validate a `--from-file` answers file
pub fn load_answers_file(path: &Path) -> Result<ClusterFile, GenerateError> {
    let cluster = ClusterFile::load(path)?;
    cluster.validate()?;
    Ok(cluster)
}

fn ask_node_ips(
    prompt: &mut dyn Prompt,
    used: &mut IpRegistry,
    label: &str,
    count: usize,
) -> Result<Vec<String>, GenerateError> {
    let mut ips = Vec::with_capacity(count);
    for i in 1..=count {
        loop {
            let ip = prompt.ask(&format!("Enter IP address for {label} {i}"), None)?;
            match used.claim(&ip) {
                Ok(()) => {
                    ips.push(ip);
                    break;
                }
                Err(ClusterError::DuplicateIp { .. }) => {
                    prompt.complain("This IP address is already used. Enter a unique address.")?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(ips)
}

/// Collect every answer interactively
pub fn ask_answers(
    prompt: &mut dyn Prompt,
    image: &str,
    k8s_version: &str,
) -> Result<ClusterFile, GenerateError> {
    let d = ClusterAnswers::with_defaults(image, k8s_version);
    let mut a = ClusterAnswers {
        cluster_name: prompt.ask("Enter cluster name", Some(d.cluster_name.as_str()))?,
        k8s_version: prompt.ask("Enter Kubernetes version", Some(d.k8s_version.as_str()))?,
        image: prompt.ask("Enter Talos installer image", Some(d.image.as_str()))?,
        iface: prompt.ask(
            "Enter network interface name: ens18 for KVM, Proxmox or eth0 for Nebula, OpenStack",
            Some(d.iface.as_str()),
        )?,
        ..d.clone()
    };

    a.cp_count = prompt.ask_number(
        &format!(
            "Enter number of control planes (odd, max {})",
            defaults::MAX_CONTROL_PLANES
        ),
        d.cp_count,
        &|n| {
            validate_cp_count(n).map_err(|_| {
                format!(
                    "Enter an odd number between 1 and {}.",
                    defaults::MAX_CONTROL_PLANES
                )
            })
        },
    )?;
    a.worker_count = prompt.ask_number(
        &format!(
            "Enter number of worker nodes (max {}, min 0)",
            defaults::MAX_WORKERS
        ),
        d.worker_count,
        &|n| {
            validate_worker_count(n)
                .map_err(|_| format!("Enter a number between 0 and {}.", defaults::MAX_WORKERS))
        },
    )?;

    a.gateway = prompt.ask("Enter default gateway", None)?;
    a.netmask = prompt.ask("Enter network mask", Some(d.netmask.as_str()))?;
    a.dns1 = prompt.ask("Enter first DNS server", Some(d.dns1.as_str()))?;
    a.dns2 = prompt.ask("Enter second DNS server", Some(d.dns2.as_str()))?;
    a.ntp1 = prompt.ask("Enter first NTP server", Some(d.ntp1.as_str()))?;
    a.ntp2 = prompt.ask("Enter second NTP server", Some(d.ntp2.as_str()))?;
    a.ntp3 = prompt.ask("Enter third NTP server", Some(d.ntp3.as_str()))?;

    if a.cp_count > 1 {
        a.use_vip = prompt.ask_yes_no("Do you need a VIP address?", true)?;
        if a.use_vip {
            a.vip_ip = prompt.ask("Enter VIP address", None)?;
        }
    }
    a.use_ext_balancer =
        prompt.ask_yes_no("Do you need an external load balancers (SAN's proxy)?", false)?;
    if a.use_ext_balancer {
        a.ext_balancer_ip = prompt.ask(
            "Enter external load balancer IPs (proxy server IPs or list of SAN's) \
             (input comma separated, if more than one)",
            None,
        )?;
    }

    a.disk = prompt.ask("Enter disk for base OS installation", Some(d.disk.as_str()))?;
    a.use_drbd = prompt.ask_yes_no("Enable drbd support?", d.use_drbd)?;
    a.use_zfs = prompt.ask_yes_no("Enable zfs support?", d.use_zfs)?;
    a.use_spl = prompt.ask_yes_no("Enable spl support?", d.use_spl)?;
    a.use_vfio_pci = prompt.ask_yes_no("Enable vfio_pci support?", d.use_vfio_pci)?;
    a.use_vfio_iommu = prompt.ask_yes_no("Enable vfio_iommu_type1 support?", d.use_vfio_iommu)?;
    a.use_ovs = prompt.ask_yes_no("Enable openvswitch support?", d.use_ovs)?;
    a.use_mirrors =
        prompt.ask_yes_no("Use timeweb.cloud and gcr.io mirrors for docker.io?", d.use_mirrors)?;
    a.use_max_pods = prompt.ask_yes_no(
        &format!(
            "Set maxPods: {} for kubelet? (default is 110 per node)",
            defaults::RAISED_MAX_PODS
        ),
        d.use_max_pods,
    )?;

    let mut used = IpRegistry::new(&a.gateway);
    let cp_ips = ask_node_ips(prompt, &mut used, "control plane", a.cp_count)?;
    let worker_ips = ask_node_ips(prompt, &mut used, "worker", a.worker_count)?;

    Ok(ClusterFile {
        answers: a,
        cp_ips,
        worker_ips,
    })
}

/// Write `patch.yaml` and one patch per node
pub fn write_patches(cluster: &ClusterFile, config_dir: &Path) -> Result<Vec<PathBuf>, GenerateError> {
    let answers = &cluster.answers;
    let mut written = Vec::new();

    let path = config_dir.join("patch.yaml");
    filesystem::write_file(&path, &to_yaml(&cluster_patch(answers))?)?;
    written.push(path);

    for (role, ips) in [
        (NodeRole::ControlPlane, &cluster.cp_ips),
        (NodeRole::Worker, &cluster.worker_ips),
    ] {
        for (i, ip) in ips.iter().enumerate() {
            let node = node_patch(answers, role, i + 1, ip);
            let path = config_dir.join(role.patch_file(i + 1));
            filesystem::write_file(&path, &node.to_yaml()?)?;
            written.push(path);
        }
    }
    Ok(written)
}

/// Secrets, base configs and per-node machine configs via talosctl
pub fn render_configs(
    cluster: &ClusterFile,
    config_dir: &Path,
    talosctl: &mut Talosctl<'_>,
) -> Result<Vec<PathBuf>, GenerateError> {
    talosctl.gen_secrets(&config_dir.join("secrets.yaml"))?;
    tracing::info!("Created secrets.yaml");

    talosctl.gen_config(
        config_dir,
        &cluster.answers.k8s_version,
        &cluster.answers.cluster_name,
        &cluster.endpoint_ip(),
    )?;

    let mut configs = Vec::new();
    for (role, count) in [
        (NodeRole::ControlPlane, cluster.cp_ips.len()),
        (NodeRole::Worker, cluster.worker_ips.len()),
    ] {
        for i in 1..=count {
            let output = role.config_file(i);
            talosctl.machineconfig_patch(config_dir, role.base_config(), &role.patch_file(i), &output)?;
            configs.push(config_dir.join(output));
        }
    }
    Ok(configs)
}

/// Print the manual procedure and save it to `commands.md`
pub fn publish_manual_commands(
    cluster: &ClusterFile,
    options: &GenerateOptions,
    prompt: &mut dyn Prompt,
) -> Result<PathBuf, GenerateError> {
    let commands = ManualCommands::for_cluster(cluster, &options.config_dir, &options.kube_dir);

    prompt.say("Manual cluster initialization required. Run the following commands:")?;
    prompt.say("")?;
    for step in commands.steps() {
        match step {
            Step::Run(cmd) => prompt.say(cmd)?,
            Step::Wait(note) => prompt.complain(note)?,
        }
    }
    prompt.say("")?;

    let path = options.work_dir.join(COMMANDS_FILE);
    filesystem::write_file(&path, &commands.to_markdown())?;
    Ok(path)
}

/// Apply cp1, bootstrap, then apply the remaining nodes
///
/// Returns `false` when the user stops at a wait point.
fn apply_and_bootstrap(
    cluster: &ClusterFile,
    config_dir: &Path,
    talosctl: &mut Talosctl<'_>,
    prompt: &mut dyn Prompt,
) -> Result<bool, GenerateError> {
    let talosconfig = config_dir.join("talosconfig");
    let first = cluster.first_cp_ip().unwrap_or_default();

    talosctl.apply_config(first, &config_dir.join(NodeRole::ControlPlane.config_file(1)))?;
    prompt.complain("Please, wait init and reboot first control plane, before continue")?;
    if !prompt.ask_yes_no("Continue?", true)? {
        return Ok(false);
    }

    talosctl.bootstrap(first, &talosconfig)?;
    prompt.complain("Please, wait bootstrap first control plane, before continue")?;
    if !prompt.ask_yes_no("Continue?", true)? {
        return Ok(false);
    }

    prompt.say("Applying config to control planes and workers ..")?;
    for (role, ips) in [
        (NodeRole::ControlPlane, &cluster.cp_ips),
        (NodeRole::Worker, &cluster.worker_ips),
    ] {
        let skip = usize::from(role == NodeRole::ControlPlane);
        for (i, ip) in ips.iter().enumerate().skip(skip) {
            talosctl.apply_config(
                strip_prefix_len(ip),
                &config_dir.join(role.config_file(i + 1)),
            )?;
        }
    }
    Ok(true)
}

/// Bootstrap the cluster interactively
///
/// A failing talosctl step publishes the manual commands before the error
/// is returned.
pub fn initialize_cluster(
    cluster: &ClusterFile,
    options: &GenerateOptions,
    talosctl: &mut Talosctl<'_>,
    prompt: &mut dyn Prompt,
) -> Result<(InitOutcome, Option<PathBuf>), GenerateError> {
    if !prompt.ask_yes_no("Do you want to start cluster initialization?", true)? {
        prompt.say("Cluster initialization cancelled by user.")?;
        let commands = publish_manual_commands(cluster, options, prompt)?;
        return Ok((InitOutcome::Declined, Some(commands)));
    }

    let talosconfig = options.config_dir.join("talosconfig");
    match apply_and_bootstrap(cluster, &options.config_dir, talosctl, prompt) {
        Ok(false) => {
            prompt.say("Cluster initialization cancelled by user.")?;
            return Ok((InitOutcome::Cancelled, None));
        }
        Ok(true) => {}
        Err(e @ GenerateError::Tool(_)) => {
            publish_manual_commands(cluster, options, prompt)?;
            return Err(e);
        }
        Err(e) => return Err(e),
    }

    prompt.say("Generating kubeconfig ..")?;
    filesystem::create_dir_all(&options.kube_dir)?;
    let kubeconfig = options
        .kube_dir
        .join(format!("{}.yaml", cluster.answers.cluster_name));
    talosctl.kubeconfig(&kubeconfig, &cluster.endpoint_ip(), &talosconfig)?;
    Ok((InitOutcome::Completed { kubeconfig }, None))
}

/// Run the whole workflow
pub fn generate(
    options: &GenerateOptions,
    runner: &mut dyn CommandRunner,
    prompt: &mut dyn Prompt,
) -> Result<GenerateReport, GenerateError> {
    // Read the answers file before the config dir is touched; it may live there.
    let from_file = match &options.from_file {
        Some(path) => Some(load_answers_file(path)?),
        None => None,
    };

    let cleaned = prepare_config_dir(
        &options.config_dir,
        options.force,
        options.interactive(),
        prompt,
    )?;

    let cluster = match from_file {
        Some(cluster) => cluster,
        None => ask_answers(prompt, &options.image, &options.k8s_version)?,
    };

    let patches = write_patches(&cluster, &options.config_dir)?;
    tracing::info!("Created {} patch files", patches.len());

    let mut talosctl = Talosctl::new(runner);
    let configs = render_configs(&cluster, &options.config_dir, &mut talosctl)?;

    let endpoints = cluster.talosconfig_endpoints();
    let talosconfig_endpoints = filesystem::rewrite_talosconfig_endpoints(
        &options.config_dir.join("talosconfig"),
        &endpoints,
    )?
    .then_some(endpoints);
    if talosconfig_endpoints.is_none() {
        tracing::warn!("File talosconfig not found");
    }

    let mut report = GenerateReport {
        cleaned,
        patches,
        configs,
        talosconfig_endpoints,
        cluster_file: None,
        commands_file: None,
        init: InitOutcome::Skipped,
    };

    if !options.interactive() {
        prompt.say("Cluster initialization skipped (non interactive mode)")?;
        report.commands_file = Some(publish_manual_commands(&cluster, options, prompt)?);
        return Ok(report);
    }

    let cluster_path = options.work_dir.join(CLUSTER_FILE);
    filesystem::write_file(&cluster_path, &cluster.to_yaml_string()?)?;
    report.cluster_file = Some(cluster_path);

    let (init, commands_file) = initialize_cluster(&cluster, options, &mut talosctl, prompt)?;
    report.init = init;
    report.commands_file = commands_file;
    Ok(report)
}
