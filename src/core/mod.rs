//! Core business logic module
//!
//! Talos cluster modelling, patch rendering and the generate/add workflows.
//! External effects go through the traits in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`release`] - Release descriptor and checksums
//! - [`talos_version`] - Talos version detection from the installer image
//! - [`cluster`] - Cluster answers and the `cluster.yaml` answers file
//! - [`patch`] - Machine config patch rendering
//! - [`generate`] - Config generation workflow
//! - [`bootstrap`] - Manual bootstrap commands
//! - [`add_node`] - Adding a node to an existing config directory
//! - [`doctor`] - Required tool checks
//! - [`version`] - Self-update check
//! - [`global_config`] - Global configuration management

pub mod add_node;
pub mod bootstrap;
pub mod cluster;
pub mod doctor;
pub mod generate;
pub mod global_config;
pub mod patch;
pub mod release;
pub mod talos_version;
pub mod version;
