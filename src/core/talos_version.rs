//! Talos version detection
//!
//! The installer image tag decides where node hostnames go: Talos 1.12
//! moved them out of `machine.network.hostname` into a separate
//! `HostnameConfig` document.

/// Where a node's hostname is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnameFormat {
    /// `machine.network.hostname` (Talos < 1.12)
    Inline,
    /// Separate `HostnameConfig` document (Talos >= 1.12)
    Document,
}

impl HostnameFormat {
    /// Pick the format for an installer image reference
    pub fn for_image(image: &str) -> Self {
        if is_talos_112_or_newer(&extract_talos_version(image)) {
            Self::Document
        } else {
            Self::Inline
        }
    }
}

/// Extract the Talos version from an image tag
///
/// `factory.talos.dev/...:v1.12.2` gives `1.12.2`. Images without a tag
/// give an empty string.
pub fn extract_talos_version(image: &str) -> String {
    match image.rsplit_once(':') {
        Some((_, tag)) => tag.strip_prefix('v').unwrap_or(tag).to_string(),
        None => String::new(),
    }
}

/// True for versions >= 1.12.0
pub fn is_talos_112_or_newer(version: &str) -> bool {
    let mut parts = version.split('.');
    let (Some(major), Some(minor)) = (parts.next(), parts.next()) else {
        return false;
    };
    let (Ok(major), Ok(minor)) = (major.parse::<u64>(), minor.parse::<u64>()) else {
        return false;
    };
    major > 1 || (major == 1 && minor >= 12)
}
