//! Adding a node to an existing config directory
//!
//! The new node's patch is derived from the first node of the same role:
//! only the address and hostname change. talosctl then renders the
//! machine config from the base `controlplane.yaml` / `worker.yaml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::core::patch::{to_yaml, to_yaml_documents, HostnameConfig, NodeRole};
use crate::core::talos_version::HostnameFormat;
use crate::error::{GenerateError, PatchError};
use crate::infra::prompt::Prompt;
use crate::infra::talosctl::{args, render_command, CommandRunner, Talosctl, TALOSCTL};

/// Which node to add, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    pub role: NodeRole,
    pub index: usize,
    pub address: String,
}

impl AddRequest {
    /// Build from the `--cp` / `--worker` / `--address` flags
    pub fn from_flags(
        cp: Option<usize>,
        worker: Option<usize>,
        address: Option<&str>,
    ) -> Result<Self, GenerateError> {
        let (role, index) = match (cp, worker) {
            (Some(_), Some(_)) => {
                return Err(GenerateError::InvalidNode(
                    "cannot specify both --cp and --worker".to_string(),
                ))
            }
            (None, None) => {
                return Err(GenerateError::InvalidNode(
                    "must specify either --cp or --worker".to_string(),
                ))
            }
            (Some(n), None) => (NodeRole::ControlPlane, n),
            (None, Some(n)) => (NodeRole::Worker, n),
        };
        if index == 0 {
            return Err(GenerateError::InvalidNode(
                "node number must be 1 or greater".to_string(),
            ));
        }
        let address = address.map(str::trim).unwrap_or_default();
        if address.is_empty() {
            return Err(GenerateError::InvalidNode("--address is required".to_string()));
        }
        Ok(Self {
            role,
            index,
            address: address.to_string(),
        })
    }

    pub fn hostname(&self) -> String {
        self.role.hostname(self.index)
    }
}

/// Files involved in adding one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPlan {
    pub config_dir: PathBuf,
    pub base_config: PathBuf,
    pub base_patch: PathBuf,
    pub talosconfig: PathBuf,
    pub cluster_patch: PathBuf,
    pub new_patch: PathBuf,
    pub new_config: PathBuf,
}

impl AddPlan {
    pub fn new(config_dir: &Path, request: &AddRequest) -> Self {
        let role = request.role;
        Self {
            config_dir: config_dir.to_path_buf(),
            base_config: config_dir.join(role.base_config()),
            base_patch: config_dir.join(role.patch_file(1)),
            talosconfig: config_dir.join("talosconfig"),
            cluster_patch: config_dir.join("patch.yaml"),
            new_patch: config_dir.join(role.patch_file(request.index)),
            new_config: config_dir.join(role.config_file(request.index)),
        }
    }

    /// Inputs must exist and outputs must not
    pub fn check(&self) -> Result<(), GenerateError> {
        for (what, path) in [
            ("base file", &self.base_config),
            ("talosconfig", &self.talosconfig),
            ("base patch file", &self.base_patch),
        ] {
            if !path.exists() {
                return Err(GenerateError::MissingFile {
                    what: what.to_string(),
                    path: path.clone(),
                });
            }
        }
        for (what, path) in [("patch file", &self.new_patch), ("config file", &self.new_config)] {
            if path.exists() {
                return Err(GenerateError::AlreadyExists {
                    what: what.to_string(),
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    /// The apply command for running by hand
    pub fn manual_apply_command(&self, address: &str) -> String {
        render_command(TALOSCTL, &args::apply_config(address, &self.new_config))
    }
}

/// First YAML document of `content`
fn first_document(content: &str, path: &Path) -> Result<Value, PatchError> {
    let parse_error = |error: String| PatchError::Parse {
        path: path.to_path_buf(),
        error,
    };
    let document = serde_yaml::Deserializer::from_str(content)
        .next()
        .ok_or_else(|| parse_error("empty document".to_string()))?;
    Value::deserialize(document).map_err(|e| parse_error(e.to_string()))
}

/// Hostname format from `machine.install.image` in `patch.yaml`
///
/// Falls back to [`HostnameFormat::Inline`] when the file or key is missing.
pub fn detect_hostname_format(cluster_patch: &Path) -> HostnameFormat {
    let Ok(content) = std::fs::read_to_string(cluster_patch) else {
        return HostnameFormat::Inline;
    };
    match first_document(&content, cluster_patch) {
        Ok(doc) => doc["machine"]["install"]["image"]
            .as_str()
            .map_or(HostnameFormat::Inline, HostnameFormat::for_image),
        Err(e) => {
            tracing::warn!("Ignoring unreadable {}: {e}", cluster_patch.display());
            HostnameFormat::Inline
        }
    }
}

fn mapping_mut<'v>(value: &'v mut Value, key: &str, path: &Path) -> Result<&'v mut Mapping, PatchError> {
    value
        .get_mut(key)
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| PatchError::InvalidStructure {
            path: path.to_path_buf(),
            reason: format!("missing mapping '{key}'"),
        })
}

/// Derive the new node's patch from the base patch
pub fn derive_patch(
    base: &str,
    base_path: &Path,
    address: &str,
    hostname: &str,
    format: HostnameFormat,
) -> Result<String, PatchError> {
    let invalid = |reason: &str| PatchError::InvalidStructure {
        path: base_path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut doc = first_document(base, base_path)?;
    let network = {
        let machine = doc
            .get_mut("machine")
            .ok_or_else(|| invalid("missing mapping 'machine'"))?;
        mapping_mut(machine, "network", base_path)?
    };

    let first_address = network
        .get_mut("interfaces")
        .and_then(Value::as_sequence_mut)
        .and_then(|interfaces| interfaces.first_mut())
        .and_then(|iface| iface.get_mut("addresses"))
        .and_then(Value::as_sequence_mut)
        .and_then(|addresses| addresses.first_mut())
        .ok_or_else(|| invalid("missing machine.network.interfaces[0].addresses[0]"))?;

    let old = first_address
        .as_str()
        .ok_or_else(|| invalid("address is not a string"))?;
    let prefix = match old.split('/').collect::<Vec<_>>().as_slice() {
        [_, prefix] => (*prefix).to_string(),
        _ => {
            return Err(PatchError::InvalidAddress {
                address: old.to_string(),
            })
        }
    };
    *first_address = Value::String(format!("{address}/{prefix}"));

    let hostname_key = Value::String("hostname".to_string());
    match format {
        HostnameFormat::Inline => {
            network.insert(hostname_key, Value::String(hostname.to_string()));
            to_yaml(&doc)
        }
        HostnameFormat::Document => {
            network.remove(&hostname_key);
            to_yaml_documents(&[to_yaml(&doc)?, to_yaml(&HostnameConfig::new(hostname))?])
        }
    }
}

/// What happened to the rendered config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    /// `--auto-apply` was not given
    NotRequested,
    /// The user declined at the prompt
    Declined,
    /// `talosctl apply-config` succeeded
    Applied,
}

/// Outcome of adding a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddReport {
    pub patch: PathBuf,
    pub config: PathBuf,
    pub apply: ApplyState,
}

/// Write the new patch, render the machine config and optionally apply it
pub fn add_node(
    plan: &AddPlan,
    request: &AddRequest,
    auto_apply: bool,
    runner: &mut dyn CommandRunner,
    prompt: &mut dyn Prompt,
) -> Result<AddReport, GenerateError> {
    plan.check()?;

    let format = detect_hostname_format(&plan.cluster_patch);
    tracing::debug!("Hostname format for new node: {format:?}");

    let base = crate::infra::filesystem::read_file(&plan.base_patch)?;
    let patch = derive_patch(
        &base,
        &plan.base_patch,
        &request.address,
        &request.hostname(),
        format,
    )?;
    crate::infra::filesystem::write_file(&plan.new_patch, &patch)?;
    tracing::info!("Created patch file: {}", plan.new_patch.display());

    let mut talosctl = Talosctl::new(runner);
    talosctl.machineconfig_patch(
        &plan.config_dir,
        request.role.base_config(),
        &request.role.patch_file(request.index),
        &request.role.config_file(request.index),
    )?;
    tracing::info!("Created config file: {}", plan.new_config.display());

    let apply = if !auto_apply {
        ApplyState::NotRequested
    } else if prompt.ask_yes_no(
        &format!("Apply configuration to node {}?", request.address),
        true,
    )? {
        talosctl.apply_config(&request.address, &plan.new_config)?;
        ApplyState::Applied
    } else {
        ApplyState::Declined
    };

    Ok(AddReport {
        patch: plan.new_patch.clone(),
        config: plan.new_config.clone(),
        apply,
    })
}
