//! Integration tests for `talostpl generate`
//!
//! A fake talosctl on `PATH` records its arguments and writes the files
//! the real tool would produce.

mod common;

use common::{stderr, stdout, TestEnv, SAMPLE_CLUSTER_YAML};

#[test]
fn test_generate_requires_tools() {
    let env = TestEnv::new();
    env.create_file("answers.yaml", SAMPLE_CLUSTER_YAML);
    let output = env.run(&["generate", "--from-file", "answers.yaml"]);

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("Required tools not found: talosctl, kubectl"));
    assert!(err.contains("Installation instructions"));
    assert!(!env.file_exists("config/patch.yaml"));
}

#[cfg(unix)]
mod with_tools {
    use super::*;

    #[test]
    fn test_generate_from_file_full_workflow() {
        let env = TestEnv::with_fake_tools();
        env.create_file("answers.yaml", SAMPLE_CLUSTER_YAML);

        let output = env.run(&["generate", "--from-file", "answers.yaml"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        for name in [
            "config/patch.yaml",
            "config/cp1.patch",
            "config/cp2.patch",
            "config/cp3.patch",
            "config/worker1.patch",
            "config/worker2.patch",
            "config/secrets.yaml",
            "config/cp1.yaml",
            "config/worker2.yaml",
            "commands.md",
        ] {
            assert!(env.file_exists(name), "{name} missing");
        }
        assert!(!env.file_exists("cluster.yaml"));

        let calls = env.talosctl_calls();
        assert_eq!(calls[0], "gen secrets -o config/secrets.yaml");
        assert_eq!(
            calls[1],
            "gen config --kubernetes-version 1.35.0 --with-secrets secrets.yaml prod \
             https://10.0.0.100:6443 --config-patch @patch.yaml"
        );
        assert_eq!(calls.len(), 7);
        assert!(!calls.iter().any(|c| c.starts_with("apply-config")));

        let talosconfig = env.read_file("config/talosconfig");
        assert!(talosconfig.contains("endpoints: [10.0.0.11, 10.0.0.12, 10.0.0.13, 10.0.0.100]"));

        let cp2 = env.read_file("config/cp2.patch");
        assert!(cp2.contains("10.0.0.12/24"));
        assert!(cp2.contains("kind: HostnameConfig"));
        assert!(cp2.contains("hostname: cp-2"));

        let commands = env.read_file("commands.md");
        assert!(commands.starts_with("# Manual cluster initialization commands"));
        assert!(commands.contains("talosctl apply-config --insecure -n 10.0.0.11 --file config/cp1.yaml"));

        let out = stdout(&output);
        assert!(out.contains("Cluster initialization skipped (non interactive mode)"));
        assert!(out.contains("talosctl bootstrap --nodes 10.0.0.11 --endpoints 10.0.0.11"));
    }

    #[test]
    fn test_generate_json_stdout_is_only_the_summary() {
        let env = TestEnv::with_fake_tools();
        env.create_file("answers.yaml", SAMPLE_CLUSTER_YAML);

        let output = env.run(&["--json", "generate", "--from-file", "answers.yaml"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["init"], "skipped");
        assert_eq!(json["configs"].as_array().unwrap().len(), 5);

        let err = stderr(&output);
        assert!(err.contains("Created controlplane.yaml"));
        assert!(err.contains("talosctl bootstrap --nodes 10.0.0.11 --endpoints 10.0.0.11"));
    }

    #[test]
    fn test_generate_quiet_prints_nothing_on_stdout() {
        let env = TestEnv::with_fake_tools();
        env.create_file("answers.yaml", SAMPLE_CLUSTER_YAML);

        let output = env.run(&["--quiet", "generate", "--from-file", "answers.yaml"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert_eq!(stdout(&output), "");
        assert!(env.file_exists("commands.md"));
    }

    #[test]
    fn test_generate_refuses_non_empty_dir() {
        let env = TestEnv::with_fake_tools();
        env.create_file("answers.yaml", SAMPLE_CLUSTER_YAML);
        env.create_file("config/old.yaml", "stale");

        let output = env.run(&["generate", "--from-file", "answers.yaml"]);
        assert_eq!(output.status.code(), Some(1));
        assert!(stderr(&output).contains("Use --force to overwrite or clean it."));
        assert!(env.file_exists("config/old.yaml"));
        assert!(env.talosctl_calls().is_empty());
    }

    #[test]
    fn test_generate_force_from_file_cleans_dir() {
        let env = TestEnv::with_fake_tools();
        env.create_file("answers.yaml", SAMPLE_CLUSTER_YAML);
        env.create_file("config/old.yaml", "stale");

        let output = env.run(&["generate", "--force", "--from-file", "answers.yaml"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(!env.file_exists("config/old.yaml"));
        assert!(env.file_exists("config/cp1.yaml"));
    }

    #[test]
    fn test_generate_rejects_invalid_answers() {
        let env = TestEnv::with_fake_tools();
        env.create_file(
            "answers.yaml",
            &SAMPLE_CLUSTER_YAML.replace("workerIPs: [10.0.0.21, 10.0.0.22]", "workerIPs: [10.0.0.21, 10.0.0.11]"),
        );
        env.create_file("config/keep.yaml", "x");

        let output = env.run(&["generate", "--force", "--from-file", "answers.yaml"]);
        assert_eq!(output.status.code(), Some(1));
        assert!(stderr(&output).contains("10.0.0.11"));
        assert!(env.file_exists("config/keep.yaml"));
    }

    #[test]
    fn test_generate_honours_config_dir_flag() {
        let env = TestEnv::with_fake_tools();
        env.create_file("answers.yaml", SAMPLE_CLUSTER_YAML);

        let output = env.run(&["generate", "--config-dir", "prod", "--from-file", "answers.yaml"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(env.file_exists("prod/patch.yaml"));
        assert!(!env.file_exists("config"));
        assert!(env.read_file("commands.md").contains("--file prod/cp1.yaml"));
    }

    #[test]
    fn test_generate_talosctl_failure_exits_nonzero() {
        let env = TestEnv::with_fake_tools();
        env.create_file("answers.yaml", SAMPLE_CLUSTER_YAML);

        let output = env
            .command(&["generate", "--from-file", "answers.yaml"])
            .env("TALOSTPL_FAKE_FAIL", "gen config")
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));
        assert!(stderr(&output).contains("gen config"));
        assert!(!env.file_exists("config/cp1.yaml"));
    }

    #[test]
    fn test_generate_interactive_declined_init() {
        let env = TestEnv::with_fake_tools();
        // name, k8s, image, iface, cp count, workers, gateway, netmask, dns x2,
        // ntp x3, ext balancer, disk, 8 toggles, cp1 ip, start init?
        let input = [
            "lab", "", "ghcr.io/siderolabs/installer:v1.11.5", "", "1", "0", "192.168.1.1", "",
            "", "", "", "", "", "n", "", "n", "", "", "", "", "", "n", "", "192.168.1.10", "n",
        ]
        .join("\n")
            + "\n";

        let output = env.run_with_input(&["generate"], &input);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let cluster = env.read_file("cluster.yaml");
        assert!(cluster.contains("clusterName: lab"));
        assert!(cluster.contains("192.168.1.10"));

        let cp1 = env.read_file("config/cp1.patch");
        assert!(cp1.contains("hostname: cp-1"));
        assert!(!cp1.contains("HostnameConfig"));

        assert!(stdout(&output).contains("Cluster initialization cancelled by user."));
        assert!(env.file_exists("commands.md"));
        assert!(!env.talosctl_calls().iter().any(|c| c.starts_with("apply-config")));
    }

    #[test]
    fn test_generate_interactive_full_bootstrap() {
        let env = TestEnv::with_fake_tools();
        let input = [
            "lab", "", "", "", "1", "0", "192.168.1.1", "", "", "", "", "", "", "n", "", "", "",
            "", "", "", "", "", "", "192.168.1.10", "y", "y", "y",
        ]
        .join("\n")
            + "\n";

        let output = env.run_with_input(&["generate"], &input);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let calls = env.talosctl_calls();
        assert!(calls.contains(&"apply-config --insecure -n 192.168.1.10 --file config/cp1.yaml".to_string()));
        assert!(calls.contains(
            &"bootstrap --nodes 192.168.1.10 --endpoints 192.168.1.10 --talosconfig=config/talosconfig".to_string()
        ));
        let kubeconfig = env.home().join(".kube").join("lab.yaml");
        assert!(calls.last().unwrap().starts_with(&format!("kubeconfig {}", kubeconfig.display())));
        assert!(env.home().join(".kube").is_dir());
        assert!(stdout(&output).contains("install the network plugin Cilium"));
    }
}
