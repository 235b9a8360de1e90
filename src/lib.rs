//! talostpl - Interactive Talos K8s config generator
//!
//! This library generates Talos Linux machine configuration for Kubernetes
//! clusters and drives `talosctl` to render and apply it. It also carries
//! the release descriptor and installer used to distribute the binary.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic (no I/O besides what is injected)
//! - [`infra`] - Infrastructure layer (network, filesystem, processes, prompts)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
