//! CLI command for `talostpl add`
//!
//! Derives one more control plane or worker from the first node of the
//! same role in the config directory.

use anyhow::{Context, Result};

use crate::cli::output::{is_json, print_detail, print_success, print_warning};
use crate::cli::Settings;
use crate::core::add_node::{add_node, AddPlan, AddRequest, ApplyState};
use crate::error::GenerateError;

/// Execute the add command
pub async fn execute(
    settings: &Settings,
    cp: Option<usize>,
    worker: Option<usize>,
    address: Option<&str>,
    auto_apply: bool,
) -> Result<()> {
    super::preflight(settings).await?;

    let request = AddRequest::from_flags(cp, worker, address)?;
    let plan = AddPlan::new(&settings.config_dir, &request);

    let (mut runner, mut prompt) = super::terminal_session();
    let outcome =
        super::run_blocking(|| add_node(&plan, &request, auto_apply, &mut runner, &mut prompt));
    let report = match outcome {
        Ok(report) => report,
        Err(e @ GenerateError::Tool(_)) if plan.new_config.exists() => {
            print_manual_apply(&plan, &request.address);
            return Err(e).context(format!("Failed to apply config to {}", request.address));
        }
        Err(e) => return Err(e).context(format!("Failed to add node {}", request.hostname())),
    };

    if is_json() {
        let json_result = serde_json::json!({
            "status": "success",
            "hostname": request.hostname(),
            "address": request.address,
            "patch": report.patch,
            "config": report.config,
            "applied": report.apply == ApplyState::Applied,
        });
        println!("{}", serde_json::to_string_pretty(&json_result).unwrap_or_default());
        return Ok(());
    }

    print_success(&format!("Created patch file: {}", report.patch.display()));
    print_success(&format!("Created config file: {}", report.config.display()));
    match report.apply {
        ApplyState::Applied => print_success(&format!(
            "Configuration applied successfully to {}",
            request.address
        )),
        ApplyState::Declined => {
            print_warning("Configuration application cancelled by user.");
            print_manual_apply(&plan, &request.address);
        }
        ApplyState::NotRequested => print_manual_apply(&plan, &request.address),
    }
    Ok(())
}

fn print_manual_apply(plan: &AddPlan, address: &str) {
    print_warning("You can apply configuration manually with command:");
    print_detail(&plan.manual_apply_command(address));
}
