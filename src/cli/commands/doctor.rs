//! `talostpl doctor`: are talosctl and kubectl installed?

use anyhow::{bail, Result};

use crate::cli::output::{is_json, is_quiet, print_detail, print_info, print_success, status};
use crate::core::doctor::{install_instructions, run_doctor, HostOs, ToolCheck, ToolReport};

pub async fn execute() -> Result<()> {
    let report = run_doctor();

    if is_json() {
        println!("{}", serde_json::to_string_pretty(&as_json(&report))?);
    } else if is_quiet() {
        for name in report.missing() {
            eprintln!("{} Missing required: {name}", status::ERROR);
        }
    } else {
        print_listing(&report);
    }

    let missing = report.missing();
    if !missing.is_empty() {
        bail!("Missing required tools: {}", missing.join(", "));
    }
    Ok(())
}

fn as_json(report: &ToolReport) -> serde_json::Value {
    let checks: Vec<_> = report
        .checks
        .iter()
        .map(|check| {
            serde_json::json!({
                "name": check.name,
                "passed": check.passed(),
                "path": check.path,
                "version": check.version,
            })
        })
        .collect();

    serde_json::json!({
        "status": if report.all_passed() { "success" } else { "error" },
        "checks": checks,
        "passed_count": report.passed_count(),
        "total_count": report.checks.len(),
    })
}

fn check_line(check: &ToolCheck) -> String {
    match (&check.path, &check.version) {
        (Some(_), Some(version)) => format!("  {} {} (v{version})", status::SUCCESS, check.name),
        (Some(_), None) => format!("  {} {}", status::SUCCESS, check.name),
        (None, _) => format!("  {} {}", status::ERROR, check.name),
    }
}

fn print_listing(report: &ToolReport) {
    print_info("Checking required tools...");
    println!();
    for check in &report.checks {
        println!("{}", check_line(check));
        if let Some(path) = &check.path {
            print_detail(&format!("  {}", path.display()));
        }
    }
    println!();

    let (passed, total) = (report.passed_count(), report.checks.len());
    if report.all_passed() {
        print_success(&format!("All checks passed ({passed}/{total})"));
        return;
    }

    println!("{} {passed}/{total} checks passed", status::ERROR);
    print_detail("Installation instructions:");
    println!();
    install_instructions(HostOs::current())
        .lines()
        .for_each(print_detail);
}
