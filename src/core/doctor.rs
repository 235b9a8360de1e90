//! Required tool checks
//!
//! `generate` and `add` shell out to `talosctl`, and the generated
//! kubeconfig is only useful with `kubectl`. Both must be on `PATH`.

use std::path::{Path, PathBuf};

use crate::config::urls;
use crate::error::ToolError;

/// Tools the workflows depend on, with the arguments that print a version
pub const REQUIRED_TOOLS: [(&str, &[&str]); 2] = [
    ("talosctl", &["version", "--client", "--short"]),
    ("kubectl", &["version", "--client"]),
];

/// Operating system family, for install instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl HostOs {
    /// The OS this binary was built for
    pub fn current() -> Self {
        Self::from_name(std::env::consts::OS)
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            "windows" => Self::Windows,
            _ => Self::Other,
        }
    }
}

/// Result of a single tool check
#[derive(Debug, Clone)]
pub struct ToolCheck {
    pub name: String,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
}

impl ToolCheck {
    pub fn passed(&self) -> bool {
        self.path.is_some()
    }
}

/// Report over all required tools
#[derive(Debug, Default)]
pub struct ToolReport {
    pub checks: Vec<ToolCheck>,
}

impl ToolReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(ToolCheck::passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed()).count()
    }

    /// Names of the tools not found
    pub fn missing(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.passed())
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Names from `tools` that `lookup` cannot resolve
pub fn missing_tools<F>(tools: &[&str], lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    tools
        .iter()
        .filter(|t| lookup(t).is_none())
        .map(|t| (*t).to_string())
        .collect()
}

/// Fail with [`ToolError::Missing`] unless every required tool is on `PATH`
pub fn check_required_tools() -> Result<(), ToolError> {
    let names: Vec<&str> = REQUIRED_TOOLS.iter().map(|(name, _)| *name).collect();
    let missing = missing_tools(&names, |t| which::which(t).ok());
    if missing.is_empty() {
        tracing::debug!("All required tools found");
        Ok(())
    } else {
        Err(ToolError::Missing { tools: missing })
    }
}

/// Install instructions for `os`
pub fn install_instructions(os: HostOs) -> String {
    match os {
        HostOs::Linux => format!(
            "1. Install talosctl:\n\
             \x20  curl -sL https://talos.dev/install | sh\n\
             \x20  or\n\
             \x20  wget -O - https://talos.dev/install | sh\n\
             \n\
             2. Install kubectl:\n\
             \x20  curl -LO \"https://dl.k8s.io/release/$(curl -L -s https://dl.k8s.io/release/stable.txt)/bin/linux/amd64/kubectl\"\n\
             \x20  chmod +x kubectl\n\
             \x20  sudo mv kubectl /usr/local/bin/\n\
             \n\
             \x20  For more details see:\n\
             \x20  {}",
            urls::KUBECTL_DOCS
        ),
        HostOs::MacOs => format!(
            "1. Install talosctl:\n\
             \x20  brew install siderolabs/tap/talosctl\n\
             \n\
             2. Install kubectl:\n\
             \x20  brew install kubectl\n\
             \n\
             \x20  For more details see:\n\
             \x20  {}",
            urls::KUBECTL_DOCS
        ),
        HostOs::Windows => format!(
            "Please refer to the official documentation for installation:\n\
             \x20  talosctl: {}\n\
             \x20  kubectl: {}",
            urls::TALOSCTL_DOCS,
            urls::KUBECTL_WINDOWS_DOCS
        ),
        HostOs::Other => format!(
            "Please refer to the official documentation for installation:\n\
             \x20  talosctl: {}\n\
             \x20  kubectl: {}",
            urls::TALOSCTL_DOCS,
            urls::KUBECTL_DOCS
        ),
    }
}

/// Run `binary args...` and pull a version out of its output
pub fn tool_version(binary: &Path, args: &[&str]) -> Option<String> {
    let output = std::process::Command::new(binary).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    first_version(&text)
}

/// Find the first `1.2.3`-like version in tool output
fn first_version(output: &str) -> Option<String> {
    let pattern = regex::Regex::new(r"v?(\d+\.\d+(?:\.\d+)?(?:-[\w.]+)?)").ok()?;
    pattern
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Check every required tool, with versions
pub fn run_doctor() -> ToolReport {
    let mut report = ToolReport::default();
    for (name, version_args) in REQUIRED_TOOLS {
        let path = which::which(name).ok();
        let version = path.as_ref().and_then(|p| tool_version(p, version_args));
        tracing::debug!("{name}: path={path:?} version={version:?}");
        report.checks.push(ToolCheck {
            name: name.to_string(),
            path,
            version,
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tools_reports_unresolved_only() {
        let missing = missing_tools(&["talosctl", "kubectl"], |t| {
            (t == "talosctl").then(|| PathBuf::from("/usr/local/bin/talosctl"))
        });
        assert_eq!(missing, vec!["kubectl".to_string()]);
    }

    #[test]
    fn test_missing_tools_none_missing() {
        let missing = missing_tools(&["talosctl", "kubectl"], |t| Some(PathBuf::from(t)));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_host_os_from_name() {
        assert_eq!(HostOs::from_name("linux"), HostOs::Linux);
        assert_eq!(HostOs::from_name("macos"), HostOs::MacOs);
        assert_eq!(HostOs::from_name("windows"), HostOs::Windows);
        assert_eq!(HostOs::from_name("freebsd"), HostOs::Other);
    }

    #[test]
    fn test_install_instructions_per_os() {
        assert!(install_instructions(HostOs::Linux).contains("curl -sL https://talos.dev/install | sh"));
        assert!(install_instructions(HostOs::MacOs).contains("brew install siderolabs/tap/talosctl"));
        let windows = install_instructions(HostOs::Windows);
        assert!(windows.contains("install-kubectl-windows"));
        assert!(windows.contains("installing-talosctl"));
        assert!(!install_instructions(HostOs::Other).contains("windows"));
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(
            first_version("Client:\n\tTag:         v1.12.2\n"),
            Some("1.12.2".to_string())
        );
        assert_eq!(
            first_version("Client Version: v1.35.0\nKustomize Version: v5.7.1"),
            Some("1.35.0".to_string())
        );
        assert_eq!(first_version("v1.12.0-beta.1"), Some("1.12.0-beta.1".to_string()));
        assert_eq!(first_version("no version here"), None);
    }

    #[test]
    fn test_report_counts() {
        let report = ToolReport {
            checks: vec![
                ToolCheck {
                    name: "talosctl".to_string(),
                    path: Some(PathBuf::from("/bin/talosctl")),
                    version: Some("1.12.2".to_string()),
                },
                ToolCheck {
                    name: "kubectl".to_string(),
                    path: None,
                    version: None,
                },
            ],
        };
        assert!(!report.all_passed());
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.missing(), vec!["kubectl".to_string()]);
    }
}
