//! Talos machine-config patch generation
//!
//! Builds the cluster-wide `patch.yaml` and the per-node `cpN.patch` /
//! `workerN.patch` documents that `talosctl` merges into the generated
//! machine configs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{defaults, urls};
use crate::core::cluster::ClusterAnswers;
use crate::core::talos_version::HostnameFormat;
use crate::error::PatchError;

/// Node role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Control plane
    ControlPlane,
    /// Worker
    Worker,
}

impl NodeRole {
    /// File stem prefix: `cp` / `worker`
    pub fn file_prefix(self) -> &'static str {
        match self {
            Self::ControlPlane => "cp",
            Self::Worker => "worker",
        }
    }

    /// Hostname for the Nth node of this role
    pub fn hostname(self, index: usize) -> String {
        format!("{}-{index}", self.file_prefix())
    }

    /// Patch file name for the Nth node
    pub fn patch_file(self, index: usize) -> String {
        format!("{}{index}.patch", self.file_prefix())
    }

    /// Machine config file name for the Nth node
    pub fn config_file(self, index: usize) -> String {
        format!("{}{index}.yaml", self.file_prefix())
    }

    /// Base config produced by `talosctl gen config`
    pub fn base_config(self) -> &'static str {
        match self {
            Self::ControlPlane => "controlplane.yaml",
            Self::Worker => "worker.yaml",
        }
    }
}

/// Cluster-wide patch (`patch.yaml`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterPatch {
    pub machine: MachineSection,
    pub cluster: ClusterSection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineSection {
    pub network: NameserverSection,
    pub install: InstallSection,
    pub time: TimeSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registries: Option<RegistriesSection>,
    #[serde(rename = "certSANs", skip_serializing_if = "Option::is_none")]
    pub cert_sans: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel: Option<KernelSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameserverSection {
    pub nameservers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallSection {
    pub disk: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSection {
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistriesSection {
    pub mirrors: BTreeMap<String, MirrorEndpoints>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorEndpoints {
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelSection {
    pub modules: Vec<KernelModule>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelModule {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

impl KernelModule {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSection {
    #[serde(
        rename = "allowSchedulingOnControlPlanes",
        skip_serializing_if = "Option::is_none"
    )]
    pub allow_scheduling_on_control_planes: Option<bool>,
    pub network: ClusterNetwork,
    pub proxy: ProxySection,
    #[serde(rename = "apiServer", skip_serializing_if = "Option::is_none")]
    pub api_server: Option<ApiServerSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterNetwork {
    pub cni: CniSection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CniSection {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxySection {
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiServerSection {
    #[serde(rename = "certSANs")]
    pub cert_sans: Vec<String>,
}

/// Per-node patch (`cpN.patch`, `workerN.patch`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePatch {
    pub machine: NodeMachine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMachine {
    pub network: NodeNetwork,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<KubeletSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel: Option<KernelSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkInterface {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(rename = "deviceSelector", skip_serializing_if = "Option::is_none")]
    pub device_selector: Option<DeviceSelector>,
    pub dhcp: bool,
    pub addresses: Vec<String>,
    pub routes: Vec<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip: Option<VipSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSelector {
    pub physical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub network: String,
    pub gateway: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VipSection {
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KubeletSection {
    #[serde(rename = "extraConfig")]
    pub extra_config: KubeletExtraConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KubeletExtraConfig {
    #[serde(rename = "maxPods")]
    pub max_pods: u32,
}

/// `HostnameConfig` document used by Talos >= 1.12
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostnameConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub hostname: String,
}

impl HostnameConfig {
    /// Document for `hostname`
    pub fn new(hostname: &str) -> Self {
        Self {
            api_version: "v1alpha1".to_string(),
            kind: "HostnameConfig".to_string(),
            hostname: hostname.to_string(),
        }
    }
}

/// Kernel modules for the enabled storage and virtualization features
///
/// Empty unless drbd is enabled; the optional modules ride along with it.
pub fn kernel_modules(answers: &ClusterAnswers) -> Vec<KernelModule> {
    if !answers.use_drbd {
        return Vec::new();
    }

    let mut modules = vec![
        KernelModule {
            name: "drbd".to_string(),
            parameters: vec!["usermode_helper=disabled".to_string()],
        },
        KernelModule::named("drbd_transport_tcp"),
        KernelModule::named("dm-thin-pool"),
    ];
    for (enabled, name) in [
        (answers.use_zfs, "zfs"),
        (answers.use_spl, "spl"),
        (answers.use_vfio_pci, "vfio_pci"),
        (answers.use_vfio_iommu, "vfio_iommu_type1"),
        (answers.use_ovs, "openvswitch"),
    ] {
        if enabled {
            modules.push(KernelModule::named(name));
        }
    }
    modules
}

fn kernel_section(answers: &ClusterAnswers) -> Option<KernelSection> {
    let modules = kernel_modules(answers);
    (!modules.is_empty()).then_some(KernelSection { modules })
}

/// Build the cluster-wide patch
pub fn cluster_patch(answers: &ClusterAnswers) -> ClusterPatch {
    let sans = answers.ext_balancer_ips();
    let no_workers = answers.worker_count == 0;

    let registries = answers.use_mirrors.then(|| RegistriesSection {
        mirrors: BTreeMap::from([(
            "docker.io".to_string(),
            MirrorEndpoints {
                endpoints: urls::DOCKER_IO_MIRRORS
                    .iter()
                    .map(|s| (*s).to_string())
                    .collect(),
            },
        )]),
    });

    ClusterPatch {
        machine: MachineSection {
            network: NameserverSection {
                nameservers: vec![answers.dns1.clone(), answers.dns2.clone()],
            },
            install: InstallSection {
                disk: answers.disk.clone(),
                image: answers.image.clone(),
            },
            time: TimeSection {
                servers: vec![
                    answers.ntp1.clone(),
                    answers.ntp2.clone(),
                    answers.ntp3.clone(),
                ],
            },
            registries,
            cert_sans: (!sans.is_empty()).then(|| sans.clone()),
            kernel: if no_workers {
                kernel_section(answers)
            } else {
                None
            },
        },
        cluster: ClusterSection {
            allow_scheduling_on_control_planes: no_workers.then_some(true),
            network: ClusterNetwork {
                cni: CniSection {
                    name: "none".to_string(),
                },
            },
            proxy: ProxySection { disabled: true },
            api_server: (!sans.is_empty()).then_some(ApiServerSection { cert_sans: sans }),
        },
    }
}

/// A rendered node patch with its hostname
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNode {
    pub role: NodeRole,
    pub index: usize,
    pub hostname: String,
    pub patch: NodePatch,
    pub format: HostnameFormat,
}

impl RenderedNode {
    /// Serialize, adding the hostname document when required
    pub fn to_yaml(&self) -> Result<String, PatchError> {
        match self.format {
            HostnameFormat::Inline => to_yaml(&self.patch),
            HostnameFormat::Document => {
                to_yaml_documents(&[to_yaml(&self.patch)?, to_yaml(&HostnameConfig::new(&self.hostname))?])
            }
        }
    }
}

/// Build the patch for the `index`-th (1-based) node of `role` at `ip`
pub fn node_patch(answers: &ClusterAnswers, role: NodeRole, index: usize, ip: &str) -> RenderedNode {
    let format = answers.hostname_format();
    let hostname = role.hostname(index);

    let mut interface = NetworkInterface {
        interface: None,
        device_selector: None,
        dhcp: false,
        addresses: vec![answers.node_address(ip)],
        routes: vec![Route {
            network: "0.0.0.0/0".to_string(),
            gateway: answers.gateway.clone(),
        }],
        vip: None,
    };

    let mut machine = NodeMachine {
        network: NodeNetwork {
            hostname: (format == HostnameFormat::Inline).then(|| hostname.clone()),
            interfaces: Vec::new(),
        },
        kubelet: None,
        kernel: None,
    };

    match role {
        NodeRole::ControlPlane => {
            interface.interface = Some(answers.iface.clone());
            interface.vip = answers.vip().map(|ip| VipSection { ip: ip.to_string() });
            if answers.use_max_pods {
                machine.kubelet = Some(KubeletSection {
                    extra_config: KubeletExtraConfig {
                        max_pods: defaults::RAISED_MAX_PODS,
                    },
                });
            }
        }
        NodeRole::Worker => {
            interface.device_selector = Some(DeviceSelector { physical: true });
            machine.kernel = kernel_section(answers);
        }
    }
    machine.network.interfaces.push(interface);

    RenderedNode {
        role,
        index,
        hostname,
        patch: NodePatch { machine },
        format,
    }
}

/// Serialize one YAML document
pub fn to_yaml<T: Serialize>(value: &T) -> Result<String, PatchError> {
    serde_yaml::to_string(value).map_err(|e| PatchError::Serialize(e.to_string()))
}

/// Join serialized documents into one multi-document stream
pub fn to_yaml_documents(documents: &[String]) -> Result<String, PatchError> {
    let mut out = String::new();
    for (i, doc) in documents.iter().enumerate() {
        if i > 0 {
            out.push_str("---\n");
        }
        out.push_str(doc);
        if !doc.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out)
}
