//! CLI command for `talostpl generate`

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::output::{
    is_json, print_detail, print_info, print_success, print_warning, stdout_reserved,
};
use crate::cli::Settings;
use crate::config::urls;
use crate::core::generate::{generate, GenerateOptions, GenerateReport, InitOutcome};

/// Execute the generate command
pub async fn execute(settings: &Settings, force: bool, from_file: Option<PathBuf>) -> Result<()> {
    super::preflight(settings).await?;

    let options = GenerateOptions {
        config_dir: settings.config_dir.clone(),
        work_dir: std::env::current_dir().context("Failed to read current directory")?,
        kube_dir: settings.dirs.kube_dir(),
        force,
        from_file,
        image: settings.image.clone(),
        k8s_version: settings.k8s_version.clone(),
    };
    tracing::debug!("Generate options: {options:?}");

    let (mut runner, mut prompt) = super::terminal_session();
    let report = super::run_blocking(|| generate(&options, &mut runner, &mut prompt))
        .context("Cluster config generation failed")?;

    if is_json() {
        print_json(&report);
    } else {
        print_report(&report, &options);
    }
    Ok(())
}

fn print_json(report: &GenerateReport) {
    let (init, kubeconfig) = match &report.init {
        InitOutcome::Skipped => ("skipped", None),
        InitOutcome::Declined => ("declined", None),
        InitOutcome::Cancelled => ("cancelled", None),
        InitOutcome::Completed { kubeconfig } => ("completed", Some(kubeconfig)),
    };
    let json_result = serde_json::json!({
        "status": "success",
        "cleaned": report.cleaned,
        "patches": report.patches,
        "configs": report.configs,
        "talosconfig_endpoints": report.talosconfig_endpoints,
        "cluster_file": report.cluster_file,
        "commands_file": report.commands_file,
        "init": init,
        "kubeconfig": kubeconfig,
    });
    println!("{}", serde_json::to_string_pretty(&json_result).unwrap_or_default());
}

fn print_report(report: &GenerateReport, options: &GenerateOptions) {
    if report.cleaned {
        print_success(&format!("Directory '{}' cleaned", options.config_dir.display()));
    }
    print_success(&format!(
        "Generated {} patches and {} node configs in '{}'",
        report.patches.len(),
        report.configs.len(),
        options.config_dir.display()
    ));
    match &report.talosconfig_endpoints {
        Some(endpoints) => print_info(&format!(
            "Updated talosconfig endpoints: [{}]",
            endpoints.join(", ")
        )),
        None => print_warning("File talosconfig not found"),
    }
    if let Some(path) = &report.cluster_file {
        print_info(&format!("Answers saved to {}", path.display()));
    }
    if let Some(path) = &report.commands_file {
        print_info(&format!("Manual commands saved to {}", path.display()));
    }

    if let InitOutcome::Completed { kubeconfig } = &report.init {
        if !stdout_reserved() {
            println!();
        }
        print_success("Cluster initialized");
        print_detail(&format!("kubeconfig: {}", kubeconfig.display()));
        print_detail("Next, you need to install the network plugin Cilium");
        print_detail(&format!("Documentation: {}", urls::CILIUM_DOCS));
    }
}
