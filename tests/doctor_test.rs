//! Integration tests for `talostpl doctor`

mod common;

use common::{stderr, stdout, TestEnv};

#[test]
fn test_doctor_reports_missing_tools() {
    let env = TestEnv::new();
    let output = env.run(&["doctor"]);

    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("talosctl"));
    assert!(out.contains("kubectl"));
    assert!(out.contains("0/2 checks passed"));
    assert!(stderr(&output).contains("Missing required tools"));
}

#[test]
fn test_doctor_quiet_only_errors() {
    let env = TestEnv::new();
    let output = env.run(&["doctor", "--quiet"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("Missing required: talosctl"));
}

#[cfg(unix)]
#[test]
fn test_doctor_passes_with_tools() {
    let env = TestEnv::with_fake_tools();
    let output = env.run(&["doctor"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("talosctl (v1.12.2)"));
    assert!(out.contains("kubectl (v1.35.0)"));
    assert!(out.contains("All checks passed (2/2)"));
}

#[cfg(unix)]
#[test]
fn test_doctor_json_output() {
    let env = TestEnv::new();
    env.install_tool("kubectl", "#!/bin/sh\nprintf 'Client Version: v1.30.1\\n'\n");
    let output = env.run(&["--json", "doctor"]);

    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["passed_count"], 1);
    assert_eq!(json["total_count"], 2);
    let checks = json["checks"].as_array().unwrap();
    assert_eq!(checks[0]["name"], "talosctl");
    assert_eq!(checks[0]["passed"], false);
    assert_eq!(checks[1]["version"], "1.30.1");
}
