//! Self-update check
//!
//! Queries the GitHub releases API for the latest talostpl tag and
//! compares it with the running version. Failures never abort a command.

use semver::Version;

use crate::config::urls;

pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable that disables the check
pub const ENV_NO_UPDATE_CHECK: &str = "TALOSTPL_NO_UPDATE_CHECK";

/// Outcome of comparing the running binary with the latest release
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheckResult {
    UpdateAvailable { current: String, latest: String },
    /// Running version is the latest release or newer
    UpToDate { current: String },
    /// The check itself failed; callers only warn about it
    CheckFailed { reason: String },
}

/// Parse `1.2.3` or `v1.2.3`
pub fn parse_tag(tag: &str) -> Option<Version> {
    Version::parse(tag.trim().strip_prefix('v').unwrap_or(tag.trim())).ok()
}

/// Compare a release tag against `current`
pub fn compare_with_current(latest_tag: &str, current: &str) -> UpdateCheckResult {
    let (Some(latest), Some(running)) = (parse_tag(latest_tag), parse_tag(current)) else {
        return UpdateCheckResult::CheckFailed {
            reason: format!("cannot compare {latest_tag} with {current}"),
        };
    };

    if latest > running {
        UpdateCheckResult::UpdateAvailable {
            current: running.to_string(),
            latest: latest.to_string(),
        }
    } else {
        UpdateCheckResult::UpToDate {
            current: running.to_string(),
        }
    }
}

/// Ask the GitHub releases API for the latest tag
pub async fn check_for_updates() -> UpdateCheckResult {
    match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(client) => check_for_updates_with_client(&client, urls::LATEST_RELEASE_API).await,
        Err(e) => UpdateCheckResult::CheckFailed {
            reason: format!("HTTP client unavailable: {e}"),
        },
    }
}

pub async fn check_for_updates_with_client(client: &reqwest::Client, url: &str) -> UpdateCheckResult {
    match latest_tag(client, url).await {
        Ok(tag) => compare_with_current(&tag, CURRENT_VERSION),
        Err(reason) => UpdateCheckResult::CheckFailed { reason },
    }
}

#[derive(serde::Deserialize)]
struct LatestRelease {
    tag_name: Option<String>,
}

async fn latest_tag(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, format!("talostpl/{CURRENT_VERSION}"))
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await
        .map_err(|e| format!("request to {url} failed: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("releases endpoint answered {status}"));
    }

    let release: LatestRelease = response
        .json()
        .await
        .map_err(|e| format!("unexpected releases payload: {e}"))?;
    release
        .tag_name
        .ok_or_else(|| "release has no tag_name".to_string())
}

/// Whether the check is switched off by flag, environment or config
pub fn update_check_disabled(flag: bool, env_value: Option<&str>, config_enabled: bool) -> bool {
    let env_disables = env_value
        .map(|v| v.trim().to_ascii_lowercase())
        .is_some_and(|v| !matches!(v.as_str(), "" | "0" | "false"));
    flag || env_disables || !config_enabled
}
