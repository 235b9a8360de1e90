//! Error types for talostpl
//!
//! One enum per layer; the CLI wraps them in `anyhow` with context.

use std::path::PathBuf;
use thiserror::Error;

/// Release descriptor errors
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Descriptor file could not be read
    #[error("Failed to read release descriptor '{path}': {error}")]
    ReadError { path: PathBuf, error: String },

    /// Descriptor file is not valid TOML or misses fields
    #[error("Failed to parse release descriptor: {0}")]
    ParseError(String),

    #[error("Release '{release}' is missing required field '{field}'")]
    MissingField { release: String, field: String },

    /// Version is not semver
    #[error("Release '{release}' has invalid version '{version}': {error}")]
    InvalidVersion {
        release: String,
        version: String,
        error: String,
    },

    /// Artifact URL is not http(s)
    #[error("Release '{release}' has unsupported artifact URL '{url}'")]
    InvalidUrl { release: String, url: String },

    /// Install target is not a bare file name
    #[error("Install target '{target}' must be a plain file name")]
    InvalidTarget { target: String },

    /// Checksum algorithm is not supported
    #[error("Unsupported checksum algorithm '{algorithm}' (expected sha256 or sha512)")]
    UnsupportedAlgorithm { algorithm: String },

    /// Checksum digest is malformed
    #[error("Invalid {algorithm} checksum '{value}': expected {expected_len} hex digits")]
    InvalidChecksum {
        algorithm: String,
        value: String,
        expected_len: usize,
    },
}

/// Failures while fetching a release artifact
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Could not fetch {url}: {error}")]
    NetworkError { url: String, error: String },

    #[error("Checksum mismatch for {file} (wanted {expected}, downloaded {actual})")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Cannot write {path}: {error}")]
    IoError { path: PathBuf, error: String },
}

/// Installation errors
#[derive(Error, Debug)]
pub enum InstallError {
    /// Artifact download or verification failed
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Source named by the install mapping is not in the artifact
    #[error("Artifact '{source_name}' not found in {dir}")]
    SourceMissing { source_name: String, dir: PathBuf },

    /// Filesystem error while placing the binary
    #[error("Failed to install '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Installed binary does not hash to the descriptor checksum
    #[error("Installed binary '{path}' does not match checksum {expected}")]
    InstalledChecksumMismatch { path: PathBuf, expected: String },

    /// Smoke test failed
    #[error("Smoke test failed for '{binary}': {reason}")]
    SmokeTestFailed { binary: PathBuf, reason: String },
}

/// Cluster answers validation errors
#[derive(Error, Debug, PartialEq)]
pub enum ClusterError {
    /// Control plane count must be odd and within bounds
    #[error("Control plane count {count} is invalid: enter an odd number between 1 and 7")]
    InvalidControlPlaneCount { count: usize },

    /// Worker count out of bounds
    #[error("Worker count {count} is invalid: must be between 0 and 15")]
    InvalidWorkerCount { count: usize },

    /// Number of listed IPs does not match the declared count
    #[error("Expected {expected} {role} IP address(es), found {found}")]
    IpCountMismatch {
        role: String,
        expected: usize,
        found: usize,
    },

    /// Empty IP address
    #[error("{role} IP address #{index} is empty")]
    EmptyIp { role: String, index: usize },

    /// IP used twice
    #[error("IP address '{ip}' is used more than once")]
    DuplicateIp { ip: String },

    #[error("Field '{field}' is required")]
    MissingField { field: String },

    /// Answers file could not be parsed
    #[error("Failed to parse YAML: {0}")]
    ParseError(String),
}

/// Patch handling errors
#[derive(Error, Debug)]
pub enum PatchError {
    /// Serialization failed
    #[error("Failed to write YAML: {0}")]
    Serialize(String),

    /// Patch is not valid YAML
    #[error("Failed to parse patch '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Patch does not have the expected structure
    #[error("Invalid patch structure in '{path}': {reason}")]
    InvalidStructure { path: PathBuf, reason: String },

    /// Address is not in `ip/prefix` form
    #[error("Invalid address format '{address}' in base patch")]
    InvalidAddress { address: String },
}

/// Interactive prompt errors
#[derive(Error, Debug)]
pub enum PromptError {
    /// Standard input was closed before an answer was given
    #[error("Input closed while waiting for: {prompt}")]
    InputClosed { prompt: String },

    /// Reading or writing the terminal failed
    #[error("Terminal IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// External tool errors
#[derive(Error, Debug)]
pub enum ToolError {
    /// Tools missing from PATH
    #[error("Required tools missing: {}", tools.join(", "))]
    Missing { tools: Vec<String> },

    /// Tool could not be started
    #[error("Failed to run '{command}': {error}")]
    Spawn { command: String, error: String },

    /// Tool exited with failure
    #[error("Command '{command}' failed with {status}")]
    Failed { command: String, status: String },
}

/// Generate and add workflow errors
#[derive(Error, Debug)]
pub enum GenerateError {
    /// Config directory has content and --force was not given
    #[error("Config directory '{path}' is not empty. Use --force to overwrite or clean it.")]
    DirectoryNotEmpty { path: PathBuf },

    /// User declined to clean the directory
    #[error("Aborted by user. Directory '{path}' not cleaned.")]
    Aborted { path: PathBuf },

    /// Required input file is missing
    #[error("{what} {path} does not exist")]
    MissingFile { what: String, path: PathBuf },

    /// Output file already exists
    #[error("{what} {path} already exists")]
    AlreadyExists { what: String, path: PathBuf },

    #[error("Cannot access {path}: {error}")]
    IoError { path: PathBuf, error: String },

    /// Invalid node selection on `add`
    #[error("{0}")]
    InvalidNode(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}
