//! Package release descriptor
//!
//! A release descriptor binds a package name and version to exactly one
//! prebuilt binary artifact through an algorithm-qualified checksum, and
//! says how the artifact is installed and smoke-tested.
//!
//! Descriptors are read-only once loaded. A new release is a new
//! descriptor value.

use std::fmt;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::config::{defaults, urls};
use crate::error::ReleaseError;

/// Hash algorithm of a checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
}

impl ChecksumAlgorithm {
    /// Name used in the `algo:hex` form
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex encoded digest
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Create an incremental hasher for this algorithm
    pub fn hasher(self) -> StreamHasher {
        match self {
            Self::Sha256 => StreamHasher::Sha256(Sha256::new()),
            Self::Sha512 => StreamHasher::Sha512(Sha512::new()),
        }
    }
}

/// Incremental hasher over the supported algorithms
#[derive(Debug, Clone)]
pub enum StreamHasher {
    /// SHA-256 state
    Sha256(Sha256),
    /// SHA-512 state
    Sha512(Sha512),
}

impl StreamHasher {
    /// Feed bytes
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    /// Finish and return the lowercase hex digest
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Algorithm-qualified content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    digest: String,
}

impl Checksum {
    /// Parse `sha256:<hex>`, `sha512:<hex>` or a bare sha256 hex digest
    pub fn parse(value: &str) -> Result<Self, ReleaseError> {
        let value = value.trim();
        let (algorithm, digest) = match value.split_once(':') {
            Some((algo, digest)) => {
                let algorithm = match algo.to_ascii_lowercase().as_str() {
                    "sha256" => ChecksumAlgorithm::Sha256,
                    "sha512" => ChecksumAlgorithm::Sha512,
                    _ => {
                        return Err(ReleaseError::UnsupportedAlgorithm {
                            algorithm: algo.to_string(),
                        })
                    }
                };
                (algorithm, digest)
            }
            None => (ChecksumAlgorithm::Sha256, value),
        };

        if digest.len() != algorithm.hex_len() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ReleaseError::InvalidChecksum {
                algorithm: algorithm.name().to_string(),
                value: digest.to_string(),
                expected_len: algorithm.hex_len(),
            });
        }

        Ok(Self {
            algorithm,
            digest: digest.to_ascii_lowercase(),
        })
    }

    /// Hash `data` with `algorithm`
    pub fn compute(algorithm: ChecksumAlgorithm, data: &[u8]) -> Self {
        let mut hasher = algorithm.hasher();
        hasher.update(data);
        Self::from_digest(algorithm, hasher.finalize_hex())
    }

    /// Wrap a digest produced by [`StreamHasher::finalize_hex`]
    pub fn from_digest(algorithm: ChecksumAlgorithm, digest: String) -> Self {
        Self {
            algorithm,
            digest: digest.to_ascii_lowercase(),
        }
    }

    /// Hash algorithm
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Lowercase hex digest
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Compare against a hex digest produced with the same algorithm
    pub fn matches(&self, hex_digest: &str) -> bool {
        self.digest.eq_ignore_ascii_case(hex_digest)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.digest)
    }
}

/// Artifact name to installed binary name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallMapping {
    /// File name inside the downloaded artifact
    pub source: String,
    /// Binary name in the bin directory
    pub target: String,
}

/// Smoke-test invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokeTest {
    /// Arguments passed to the installed binary
    #[serde(default = "default_smoke_args")]
    pub args: Vec<String>,
}

fn default_smoke_args() -> Vec<String> {
    defaults::SMOKE_TEST_ARGS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

impl Default for SmokeTest {
    fn default() -> Self {
        Self {
            args: default_smoke_args(),
        }
    }
}

/// On-disk form of a descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDescriptor {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    homepage: String,
    url: String,
    version: String,
    checksum: String,
    install: InstallMapping,
    #[serde(default)]
    test: SmokeTest,
}

/// A validated package release descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    name: String,
    description: String,
    homepage: String,
    artifact_url: String,
    version: Version,
    checksum: Checksum,
    install: InstallMapping,
    smoke_test: SmokeTest,
}

const BUILTIN_DESCRIPTOR: &str = r#"
name = "talostpl"
description = "Interactive and non-interactive Talos K8s config generator"
homepage = "https://github.com/vasyakrg/talostpl"
url = "https://github.com/vasyakrg/talostpl/releases/download/v1.0.0/talostpl-darwin-arm64"
version = "1.0.0"
checksum = "sha256:9843d546bd541b9bf58e2e1c3c85aa8ff0b2f3705630b84b9123be55a99d5202"

[install]
source = "talostpl-darwin-arm64"
target = "talostpl"

[test]
args = ["--version"]
"#;

impl ReleaseDescriptor {
    /// The published release of talostpl
    pub fn builtin() -> Result<Self, ReleaseError> {
        Self::from_toml_str(BUILTIN_DESCRIPTOR)
    }

    /// Load a descriptor file
    pub fn load(path: &Path) -> Result<Self, ReleaseError> {
        let content = std::fs::read_to_string(path).map_err(|e| ReleaseError::ReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a descriptor from TOML
    pub fn from_toml_str(content: &str) -> Result<Self, ReleaseError> {
        let raw: RawDescriptor =
            toml::from_str(content).map_err(|e| ReleaseError::ParseError(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDescriptor) -> Result<Self, ReleaseError> {
        let release = raw.name.trim().to_string();
        if release.is_empty() {
            return Err(ReleaseError::MissingField {
                release: "<unnamed>".to_string(),
                field: "name".to_string(),
            });
        }

        let missing = |field: &str| ReleaseError::MissingField {
            release: release.clone(),
            field: field.to_string(),
        };
        if raw.url.trim().is_empty() {
            return Err(missing("url"));
        }
        if raw.install.source.trim().is_empty() {
            return Err(missing("install.source"));
        }
        if raw.install.target.trim().is_empty() {
            return Err(missing("install.target"));
        }
        if raw.checksum.trim().is_empty() {
            return Err(missing("checksum"));
        }

        let url = raw.url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ReleaseError::InvalidUrl {
                release,
                url: url.to_string(),
            });
        }

        let version_str = raw.version.trim().trim_start_matches('v');
        let version = Version::parse(version_str).map_err(|e| ReleaseError::InvalidVersion {
            release: release.clone(),
            version: raw.version.clone(),
            error: e.to_string(),
        })?;

        let target = raw.install.target.trim();
        if target.contains('/') || target.contains('\\') || target == "." || target == ".." {
            return Err(ReleaseError::InvalidTarget {
                target: target.to_string(),
            });
        }

        let checksum = Checksum::parse(&raw.checksum)?;

        Ok(Self {
            name: release,
            description: raw.description,
            homepage: raw.homepage,
            artifact_url: url.to_string(),
            version,
            checksum,
            install: InstallMapping {
                source: raw.install.source.trim().to_string(),
                target: target.to_string(),
            },
            smoke_test: raw.test,
        })
    }

    /// Re-check every field rule
    pub fn validate(&self) -> Result<(), ReleaseError> {
        Self::from_raw(self.to_raw()).map(|_| ())
    }

    fn to_raw(&self) -> RawDescriptor {
        RawDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            homepage: self.homepage.clone(),
            url: self.artifact_url.clone(),
            version: self.version.to_string(),
            checksum: self.checksum.to_string(),
            install: self.install.clone(),
            test: self.smoke_test.clone(),
        }
    }

    /// Package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable summary
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Homepage, falling back to the project homepage
    pub fn homepage(&self) -> &str {
        if self.homepage.is_empty() {
            urls::HOMEPAGE
        } else {
            &self.homepage
        }
    }

    /// Versioned artifact download URL
    pub fn artifact_url(&self) -> &str {
        &self.artifact_url
    }

    /// Release version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Expected artifact checksum
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Install mapping
    pub fn install_mapping(&self) -> &InstallMapping {
        &self.install
    }

    /// Smoke-test invocation
    pub fn smoke_test(&self) -> &SmokeTest {
        &self.smoke_test
    }

    /// File name the artifact is stored under after download
    pub fn artifact_file_name(&self) -> &str {
        let path = self
            .artifact_url
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.artifact_url);
        path.rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(self.install.source.as_str())
    }

    /// Staging subdirectory name for this release
    pub fn staging_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}
