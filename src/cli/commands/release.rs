//! CLI commands for `talostpl release`
//!
//! `show` prints the descriptor, `check` downloads and verifies the
//! artifact, `install` places it into the bin directory and smoke-tests
//! it, `test` re-runs the smoke test on an installed binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressBar;

use crate::cli::output::{create_download_bar, is_json, print_detail, print_info, print_success};
use crate::cli::Settings;
use crate::core::release::ReleaseDescriptor;
use crate::infra::download::ProgressCallback;
use crate::infra::installer::{self, Installer, SmokeTestReport};

/// Load `path`, or the published descriptor when no file is given
fn load_descriptor(path: Option<&Path>) -> Result<ReleaseDescriptor> {
    let release = match path {
        Some(path) => ReleaseDescriptor::load(path)
            .with_context(|| format!("Failed to load descriptor {}", path.display()))?,
        None => ReleaseDescriptor::builtin()?,
    };
    release.validate()?;
    Ok(release)
}

fn progress_bar() -> (ProgressBar, ProgressCallback) {
    let bar = create_download_bar(0);
    let handle = bar.clone();
    let callback: ProgressCallback = Box::new(move |downloaded, total| {
        if total > 0 {
            handle.set_length(total);
        }
        handle.set_position(downloaded);
    });
    (bar, callback)
}

fn resolve_bin_dir(settings: &Settings, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| settings.global.bin_dir(&settings.dirs))
}

/// Print the release descriptor
pub fn show(descriptor: Option<&Path>) -> Result<()> {
    let release = load_descriptor(descriptor)?;

    if is_json() {
        let json_result = serde_json::json!({
            "name": release.name(),
            "description": release.description(),
            "homepage": release.homepage(),
            "url": release.artifact_url(),
            "version": release.version().to_string(),
            "checksum": release.checksum().to_string(),
            "install": {
                "source": release.install_mapping().source,
                "target": release.install_mapping().target,
            },
            "test": { "args": release.smoke_test().args },
        });
        println!("{}", serde_json::to_string_pretty(&json_result).unwrap_or_default());
        return Ok(());
    }

    println!("{} {}", release.name(), release.version());
    if !release.description().is_empty() {
        println!("{}", release.description());
    }
    println!();
    println!("  homepage: {}", release.homepage());
    println!("  url:      {}", release.artifact_url());
    println!("  checksum: {}", release.checksum());
    println!(
        "  install:  {} -> {}",
        release.install_mapping().source,
        release.install_mapping().target
    );
    println!(
        "  test:     {} {}",
        release.install_mapping().target,
        release.smoke_test().args.join(" ")
    );
    Ok(())
}

/// Download and verify without installing
pub async fn check(settings: &Settings, descriptor: Option<&Path>) -> Result<()> {
    let release = load_descriptor(descriptor)?;
    let installer = Installer::new(&settings.dirs.downloads_dir());

    print_info(&format!("Fetching {} {}", release.name(), release.version()));
    let (bar, callback) = progress_bar();
    let staging = installer.fetch(&release, Some(callback)).await;
    bar.finish_and_clear();
    let staging = staging.context("Release verification failed")?;

    if is_json() {
        let json_result = serde_json::json!({
            "status": "success",
            "artifact": staging.join(release.artifact_file_name()),
            "checksum": release.checksum().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&json_result).unwrap_or_default());
    } else {
        print_success(&format!("Checksum verified: {}", release.checksum()));
        print_detail(&format!("Artifact: {}", staging.join(release.artifact_file_name()).display()));
    }
    Ok(())
}

/// Install the release binary and smoke-test it
pub async fn install(
    settings: &Settings,
    descriptor: Option<&Path>,
    bin_dir: Option<PathBuf>,
    skip_test: bool,
) -> Result<()> {
    let release = load_descriptor(descriptor)?;
    let bin_dir = resolve_bin_dir(settings, bin_dir);
    let installer = Installer::new(&settings.dirs.downloads_dir());

    print_info(&format!(
        "Installing {} {} into {}",
        release.name(),
        release.version(),
        bin_dir.display()
    ));
    let (bar, callback) = progress_bar();
    let report = installer.install(&release, &bin_dir, Some(callback)).await;
    bar.finish_and_clear();
    let report = report.context("Install failed")?;

    let smoke = if skip_test {
        None
    } else {
        Some(
            installer::smoke_test(&report.path, &release.smoke_test().args)
                .context("Installed binary failed its smoke test")?,
        )
    };

    if is_json() {
        let json_result = serde_json::json!({
            "status": "success",
            "path": report.path,
            "checksum": report.checksum.to_string(),
            "size": report.size,
            "version_line": smoke.as_ref().and_then(|s| s.version_line.clone()),
        });
        println!("{}", serde_json::to_string_pretty(&json_result).unwrap_or_default());
        return Ok(());
    }

    print_success(&format!("Installed {}", report.path.display()));
    print_detail(&format!("checksum: {}", report.checksum));
    if let Some(smoke) = &smoke {
        print_smoke(smoke);
    }
    Ok(())
}

/// Smoke-test an installed binary
pub fn test(settings: &Settings, descriptor: Option<&Path>, bin_dir: Option<PathBuf>) -> Result<()> {
    let release = load_descriptor(descriptor)?;
    let binary = resolve_bin_dir(settings, bin_dir).join(&release.install_mapping().target);
    let smoke = installer::smoke_test(&binary, &release.smoke_test().args)
        .context("Smoke test failed")?;

    if is_json() {
        let json_result = serde_json::json!({
            "status": "success",
            "binary": smoke.binary,
            "version_line": smoke.version_line,
        });
        println!("{}", serde_json::to_string_pretty(&json_result).unwrap_or_default());
    } else {
        print_smoke(&smoke);
    }
    Ok(())
}

fn print_smoke(smoke: &SmokeTestReport) {
    print_success(&format!("Smoke test passed: {}", smoke.binary.display()));
    if let Some(line) = &smoke.version_line {
        print_detail(line);
    }
}
