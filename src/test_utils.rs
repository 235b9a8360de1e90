//! Test utilities
//!
//! Shared fixtures and proptest generators.

/// Answers file for a 3 control plane, 2 worker cluster on Talos 1.12
pub const SAMPLE_CLUSTER_YAML: &str = r"
clusterName: prod
k8sVersion: 1.35.0
image: factory.talos.dev/nocloud-installer/abc:v1.12.2
iface: ens18
cpCount: 3
workerCount: 2
gateway: 10.0.0.1
netmask: '24'
dns1: 8.8.8.8
dns2: 8.8.4.4
ntp1: 1.ru.pool.ntp.org
ntp2: 2.ru.pool.ntp.org
ntp3: 3.ru.pool.ntp.org
useVIP: true
vipIP: 10.0.0.100
useExtBalancer: true
extBalancerIP: 1.2.3.4, 5.6.7.8
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
workerIPs: [10.0.0.21, 10.0.0.22]
";

/// Parsed [`SAMPLE_CLUSTER_YAML`]
pub fn sample_cluster() -> crate::core::cluster::ClusterFile {
    crate::core::cluster::ClusterFile::from_yaml_str(SAMPLE_CLUSTER_YAML)
        .expect("sample cluster parses")
}

/// Records talosctl calls and fakes the files talosctl would produce
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub calls: Vec<crate::infra::talosctl::Invocation>,
    /// Fail any call whose command line contains this text
    pub fail_on: Option<String>,
}

impl RecordingRunner {
    pub fn failing_on(pattern: &str) -> Self {
        Self {
            calls: Vec::new(),
            fail_on: Some(pattern.to_string()),
        }
    }

    /// Recorded command lines
    pub fn lines(&self) -> Vec<String> {
        self.calls.iter().map(|c| c.line()).collect()
    }

    fn fake_outputs(args: &[String], cwd: Option<&std::path::Path>) {
        let dir = cwd.map(std::path::Path::to_path_buf).unwrap_or_default();
        let arg = |i: usize| args.get(i).map(String::as_str);
        match (arg(0), arg(1)) {
            (Some("gen"), Some("secrets")) => {
                if let Some(out) = arg(3) {
                    std::fs::write(out, "secrets: fake\n").unwrap();
                }
            }
            (Some("gen"), Some("config")) => {
                std::fs::write(dir.join("controlplane.yaml"), "machine:\n  type: controlplane\n").unwrap();
                std::fs::write(dir.join("worker.yaml"), "machine:\n  type: worker\n").unwrap();
                std::fs::write(
                    dir.join("talosconfig"),
                    "context: fake\ncontexts:\n    fake:\n        endpoints: []\n",
                )
                .unwrap();
            }
            (Some("machineconfig"), Some("patch")) => {
                if let Some(out) = arg(6) {
                    std::fs::write(dir.join(out), "machine: {}\n").unwrap();
                }
            }
            _ => {}
        }
    }
}

impl crate::infra::talosctl::CommandRunner for RecordingRunner {
    fn run(
        &mut self,
        program: &str,
        args: &[String],
        cwd: Option<&std::path::Path>,
    ) -> Result<(), crate::error::ToolError> {
        let invocation = crate::infra::talosctl::Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            cwd: cwd.map(std::path::Path::to_path_buf),
        };
        let line = invocation.line();
        self.calls.push(invocation);
        if self.fail_on.as_deref().is_some_and(|p| line.contains(p)) {
            return Err(crate::error::ToolError::Failed {
                command: line,
                status: "exit status: 1".to_string(),
            });
        }
        Self::fake_outputs(args, cwd);
        Ok(())
    }
}

pub mod generators {
    use proptest::prelude::*;

    /// Generate an IPv4 address
    pub fn ipv4() -> impl Strategy<Value = String> {
        (1u8..=254, 0u8..=255, 0u8..=255, 1u8..=254)
            .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}"))
    }

    /// Generate a prefix length
    pub fn netmask() -> impl Strategy<Value = String> {
        (8u8..=32).prop_map(|n| n.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    #[test]
    fn test_sample_cluster_is_valid() {
        assert!(super::sample_cluster().validate().is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_ipv4_generator(ip in ipv4()) {
            prop_assert!(ip.parse::<std::net::Ipv4Addr>().is_ok());
        }
    }
}
