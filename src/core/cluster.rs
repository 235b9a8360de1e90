//! Cluster answers
//!
//! Everything the generator needs to know about a cluster, either
//! collected interactively or read from a YAML answers file. The same YAML
//! shape is written back as `cluster.yaml` after an interactive run so the
//! generation can be repeated with `--from-file`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::defaults;
use crate::core::talos_version::HostnameFormat;
use crate::error::ClusterError;

/// Cluster-wide answers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterAnswers {
    #[serde(rename = "clusterName", deserialize_with = "scalar_string")]
    pub cluster_name: String,
    #[serde(rename = "k8sVersion", deserialize_with = "scalar_string")]
    pub k8s_version: String,
    pub image: String,
    pub iface: String,
    #[serde(rename = "cpCount")]
    pub cp_count: usize,
    #[serde(rename = "workerCount")]
    pub worker_count: usize,
    pub gateway: String,
    #[serde(deserialize_with = "scalar_string")]
    pub netmask: String,
    pub dns1: String,
    pub dns2: String,
    pub ntp1: String,
    pub ntp2: String,
    pub ntp3: String,
    #[serde(rename = "useVIP", deserialize_with = "yaml_bool")]
    pub use_vip: bool,
    #[serde(rename = "vipIP")]
    pub vip_ip: String,
    #[serde(rename = "useExtBalancer", deserialize_with = "yaml_bool")]
    pub use_ext_balancer: bool,
    /// Comma-separated list of balancer IPs or SANs
    #[serde(rename = "extBalancerIP")]
    pub ext_balancer_ip: String,
    pub disk: String,
    #[serde(rename = "useDRBD", deserialize_with = "yaml_bool")]
    pub use_drbd: bool,
    #[serde(rename = "useZFS", deserialize_with = "yaml_bool")]
    pub use_zfs: bool,
    #[serde(rename = "useSPL", deserialize_with = "yaml_bool")]
    pub use_spl: bool,
    #[serde(rename = "useVFIOPCI", deserialize_with = "yaml_bool")]
    pub use_vfio_pci: bool,
    #[serde(rename = "useVFIOIOMMU", deserialize_with = "yaml_bool")]
    pub use_vfio_iommu: bool,
    #[serde(rename = "useOVS", deserialize_with = "yaml_bool")]
    pub use_ovs: bool,
    #[serde(rename = "useMirrors", deserialize_with = "yaml_bool")]
    pub use_mirrors: bool,
    #[serde(rename = "useMaxPods", deserialize_with = "yaml_bool")]
    pub use_max_pods: bool,
}

impl ClusterAnswers {
    /// Answers pre-filled with the interactive defaults
    pub fn with_defaults(image: &str, k8s_version: &str) -> Self {
        Self {
            cluster_name: defaults::DEFAULT_CLUSTER_NAME.to_string(),
            k8s_version: k8s_version.to_string(),
            image: image.to_string(),
            iface: defaults::DEFAULT_IFACE.to_string(),
            cp_count: 1,
            worker_count: 3,
            netmask: defaults::DEFAULT_NETMASK.to_string(),
            dns1: defaults::DEFAULT_DNS[0].to_string(),
            dns2: defaults::DEFAULT_DNS[1].to_string(),
            ntp1: defaults::DEFAULT_NTP[0].to_string(),
            ntp2: defaults::DEFAULT_NTP[1].to_string(),
            ntp3: defaults::DEFAULT_NTP[2].to_string(),
            disk: defaults::DEFAULT_DISK.to_string(),
            use_drbd: true,
            use_mirrors: true,
            ..Self::default()
        }
    }

    /// VIP address when enabled and set
    pub fn vip(&self) -> Option<&str> {
        let vip = self.vip_ip.trim();
        (self.use_vip && !vip.is_empty()).then_some(vip)
    }

    /// External balancer IPs when enabled, trimmed, empty entries dropped
    pub fn ext_balancer_ips(&self) -> Vec<String> {
        if !self.use_ext_balancer {
            return Vec::new();
        }
        split_ip_list(&self.ext_balancer_ip)
    }

    /// Hostname placement for the configured image
    pub fn hostname_format(&self) -> HostnameFormat {
        HostnameFormat::for_image(&self.image)
    }

    /// Address with prefix length for a node IP
    pub fn node_address(&self, ip: &str) -> String {
        format!("{ip}/{}", self.netmask)
    }
}

/// Accept unquoted numbers (`netmask: 24`, `k8sVersion: 1.31`) as strings
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!("expected a scalar, found {other:?}"))),
    }
}

/// Accept the YAML 1.1 spellings (`yes`, `no`, `on`, `off`) alongside
/// `true` and `false`
fn yaml_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(false),
        serde_yaml::Value::Bool(b) => Ok(b),
        serde_yaml::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "on" => Ok(true),
            "false" | "no" | "n" | "off" | "" => Ok(false),
            _ => Err(D::Error::custom(format!("expected a boolean, found {s:?}"))),
        },
        other => Err(D::Error::custom(format!("expected a boolean, found {other:?}"))),
    }
}

/// Split a comma-separated IP list
pub fn split_ip_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(String::from)
        .collect()
}

/// Strip a `/prefix` suffix from an address
pub fn strip_prefix_len(address: &str) -> &str {
    address.split('/').next().unwrap_or(address)
}

/// Answers plus node addresses: the `--from-file` / `cluster.yaml` format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterFile {
    #[serde(flatten)]
    pub answers: ClusterAnswers,
    #[serde(rename = "cpIPs", default)]
    pub cp_ips: Vec<String>,
    #[serde(rename = "workerIPs", default)]
    pub worker_ips: Vec<String>,
}

impl ClusterFile {
    /// Parse an answers file
    pub fn from_yaml_str(content: &str) -> Result<Self, ClusterError> {
        serde_yaml::from_str(content).map_err(|e| ClusterError::ParseError(e.to_string()))
    }

    /// Read and parse an answers file
    pub fn load(path: &Path) -> Result<Self, ClusterError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClusterError::ParseError(format!("failed to open {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Serialize to YAML
    pub fn to_yaml_string(&self) -> Result<String, ClusterError> {
        serde_yaml::to_string(self).map_err(|e| ClusterError::ParseError(e.to_string()))
    }

    /// Check counts, required fields and address uniqueness
    pub fn validate(&self) -> Result<(), ClusterError> {
        let a = &self.answers;

        for (field, value) in [
            ("clusterName", &a.cluster_name),
            ("k8sVersion", &a.k8s_version),
            ("image", &a.image),
            ("iface", &a.iface),
            ("gateway", &a.gateway),
            ("netmask", &a.netmask),
            ("disk", &a.disk),
        ] {
            if value.trim().is_empty() {
                return Err(ClusterError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        validate_cp_count(a.cp_count)?;
        validate_worker_count(a.worker_count)?;

        if self.cp_ips.len() != a.cp_count {
            return Err(ClusterError::IpCountMismatch {
                role: "control plane".to_string(),
                expected: a.cp_count,
                found: self.cp_ips.len(),
            });
        }
        if self.worker_ips.len() != a.worker_count {
            return Err(ClusterError::IpCountMismatch {
                role: "worker".to_string(),
                expected: a.worker_count,
                found: self.worker_ips.len(),
            });
        }

        let mut used = IpRegistry::new(&a.gateway);
        for (role, ips) in [("control plane", &self.cp_ips), ("worker", &self.worker_ips)] {
            for (i, ip) in ips.iter().enumerate() {
                if ip.trim().is_empty() {
                    return Err(ClusterError::EmptyIp {
                        role: role.to_string(),
                        index: i + 1,
                    });
                }
                used.claim(ip)?;
            }
        }

        Ok(())
    }

    /// Control-plane endpoint: the VIP, else the first control plane, without prefix
    pub fn endpoint_ip(&self) -> String {
        let endpoint = self
            .answers
            .vip()
            .or_else(|| self.cp_ips.first().map(String::as_str))
            .unwrap_or_default();
        strip_prefix_len(endpoint).to_string()
    }

    /// First control plane address without prefix
    pub fn first_cp_ip(&self) -> Option<&str> {
        self.cp_ips.first().map(|ip| strip_prefix_len(ip))
    }

    /// Endpoints written into talosconfig
    pub fn talosconfig_endpoints(&self) -> Vec<String> {
        let mut endpoints = self.cp_ips.clone();
        if let Some(vip) = self.answers.vip() {
            endpoints.push(vip.to_string());
        }
        endpoints.extend(self.answers.ext_balancer_ips());
        endpoints
    }
}

/// Control planes must be an odd number between 1 and 7
pub fn validate_cp_count(count: usize) -> Result<(), ClusterError> {
    if count == 0 || count > defaults::MAX_CONTROL_PLANES || count % 2 == 0 {
        return Err(ClusterError::InvalidControlPlaneCount { count });
    }
    Ok(())
}

/// Workers must be between 0 and 15
pub fn validate_worker_count(count: usize) -> Result<(), ClusterError> {
    if count > defaults::MAX_WORKERS {
        return Err(ClusterError::InvalidWorkerCount { count });
    }
    Ok(())
}

/// Tracks addresses already taken by the gateway and other nodes
#[derive(Debug, Default)]
pub struct IpRegistry {
    used: HashSet<String>,
}

impl IpRegistry {
    /// Start with the gateway marked as used
    pub fn new(gateway: &str) -> Self {
        let mut used = HashSet::new();
        if !gateway.trim().is_empty() {
            used.insert(gateway.trim().to_string());
        }
        Self { used }
    }

    /// Claim an address, failing when it is already taken
    pub fn claim(&mut self, ip: &str) -> Result<(), ClusterError> {
        let ip = ip.trim();
        if self.used.insert(ip.to_string()) {
            Ok(())
        } else {
            Err(ClusterError::DuplicateIp { ip: ip.to_string() })
        }
    }
}
