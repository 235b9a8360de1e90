//! Common test utilities and helpers
//!
//! Every test gets its own working directory, home, cache and config
//! roots, and a `tools/` directory that is the whole `PATH` of the
//! spawned binary.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Answers file for a 3 control plane, 2 worker cluster with a VIP
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
useExtBalancer: false
extBalancerIP: ''
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

/// Fake talosctl: logs its arguments and writes the files the real one would
const FAKE_TALOSCTL: &str = r#"#!/bin/sh
printf '%s\n' "$*" >> "$TALOSTPL_FAKE_LOG"
if [ -n "$TALOSTPL_FAKE_FAIL" ]; then
  case "$*" in
    *"$TALOSTPL_FAKE_FAIL"*) echo "fake failure" >&2; exit 1 ;;
  esac
fi
case "$1 $2" in
  "gen secrets") printf 'secrets: fake\n' > "$4" ;;
  "gen config")
    printf 'machine:\n  type: controlplane\n' > controlplane.yaml
    printf 'machine:\n  type: worker\n' > worker.yaml
    printf 'context: prod\ncontexts:\n    prod:\n        endpoints: []\n' > talosconfig
    echo "Created controlplane.yaml"
    ;;
  "machineconfig patch") printf 'machine: {}\n' > "$7" ;;
  "apply-config --insecure") echo "Applied configuration" ;;
  "version --client") printf 'Client:\n\tTag:         v1.12.2\n' ;;
esac
exit 0
"#;

const FAKE_KUBECTL: &str = "#!/bin/sh\nprintf 'Client Version: v1.35.0\\n'\nexit 0\n";

/// Isolated environment for running the talostpl binary
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    /// Fresh environment with no tools on `PATH`
    pub fn new() -> Self {
        let env = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        for sub in ["work", "home", "cache", "cfg", "tools"] {
            std::fs::create_dir_all(env.dir.path().join(sub)).expect("Failed to create directory");
        }
        env
    }

    /// Environment with fake talosctl and kubectl on `PATH`
    #[cfg(unix)]
    pub fn with_fake_tools() -> Self {
        let env = Self::new();
        env.install_tool("talosctl", FAKE_TALOSCTL);
        env.install_tool("kubectl", FAKE_KUBECTL);
        env
    }

    /// Write an executable script into `tools/`
    #[cfg(unix)]
    pub fn install_tool(&self, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = self.tools().join(name);
        std::fs::write(&path, script).expect("Failed to write tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to chmod tool");
        path
    }

    pub fn work(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    pub fn tools(&self) -> PathBuf {
        self.dir.path().join("tools")
    }

    pub fn cache(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn global_config_dir(&self) -> PathBuf {
        self.dir.path().join("cfg")
    }

    /// Lines logged by the fake talosctl
    pub fn talosctl_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("talosctl.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Write a file relative to the working directory
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.work().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Read a file relative to the working directory
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.work().join(name)).expect("Failed to read file")
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.work().join(name).exists()
    }

    /// talostpl command confined to this environment
    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_talostpl"));
        cmd.args(args)
            .current_dir(self.work())
            .env_clear()
            .env("PATH", self.tools())
            .env("HOME", self.home())
            .env("TALOSTPL_CONFIG_DIR", self.global_config_dir())
            .env("TALOSTPL_CACHE_DIR", self.cache())
            .env("TALOSTPL_NO_UPDATE_CHECK", "1")
            .env("TALOSTPL_FAKE_LOG", self.dir.path().join("talosctl.log"))
            .env("NO_COLOR", "1");
        cmd
    }

    /// Run with empty stdin
    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .expect("Failed to execute talostpl")
    }

    /// Run, answering prompts from `input`
    pub fn run_with_input(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn talostpl");
        child
            .stdin
            .take()
            .expect("stdin is piped")
            .write_all(input.as_bytes())
            .expect("Failed to write stdin");
        child.wait_with_output().expect("Failed to wait for talostpl")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
