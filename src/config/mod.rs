//! Configuration constants
//!
//! - [`defaults`] - Built-in default values
//! - [`urls`] - Upstream URLs

pub mod defaults;
pub mod urls;
