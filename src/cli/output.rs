//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying progress bars,
//! colored output, and formatted messages to the user. Quiet and JSON
//! modes are process-wide and set once from the command line.

use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};

static QUIET: AtomicBool = AtomicBool::new(false);
static JSON: AtomicBool = AtomicBool::new(false);

/// Output mode selected on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make this the mode for every print helper
    pub fn apply_global(self) {
        QUIET.store(self.quiet, Ordering::Relaxed);
        JSON.store(self.json, Ordering::Relaxed);
    }

    /// Log level for the `-v` count
    pub fn log_level(self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    }
}

/// Only errors are printed
pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Machine-readable output requested
pub fn is_json() -> bool {
    JSON.load(Ordering::Relaxed)
}

fn chatty() -> bool {
    !is_quiet() && !is_json()
}

/// Stdout is reserved for the JSON summary, or for nothing in quiet mode
pub fn stdout_reserved() -> bool {
    !chatty()
}

pub fn print_success(message: &str) {
    if chatty() {
        println!("{} {message}", status::SUCCESS.green());
    }
}

pub fn print_info(message: &str) {
    if chatty() {
        println!("{} {message}", status::INFO.blue());
    }
}

/// Warnings go to stderr and survive `--json`
pub fn print_warning(message: &str) {
    if !is_quiet() {
        eprintln!("{} {}", status::WARNING.yellow(), message.yellow());
    }
}

/// Indented follow-up line
pub fn print_detail(message: &str) {
    if chatty() {
        println!("  {message}");
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {}", status::ERROR.red(), error.to_string().red());
    for cause in error.chain().skip(1) {
        eprintln!("  {} {cause}", "caused by:".dark_grey());
    }
}

/// Create a progress bar for downloads
pub fn create_download_bar(total: u64) -> ProgressBar {
    if !chatty() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        pb.set_style(style.progress_chars("█▓▒░"));
    }
    pb
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}
