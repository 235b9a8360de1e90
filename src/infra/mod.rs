//! Infrastructure layer
//!
//! Handles all I/O operations: network, filesystem, external processes and
//! terminal prompts. This module is the only place where side effects occur.

pub mod dirs;
pub mod download;
pub mod filesystem;
pub mod installer;
pub mod prompt;
pub mod talosctl;
