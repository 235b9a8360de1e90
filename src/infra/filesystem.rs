//! Filesystem operations
//!
//! Config directory handling and the few in-place file edits the workflows
//! need.

use std::path::Path;

use crate::error::GenerateError;

fn io_error(path: &Path, e: std::io::Error) -> GenerateError {
    GenerateError::IoError {
        path: path.to_path_buf(),
        error: e.to_string(),
    }
}

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), GenerateError> {
    std::fs::create_dir_all(path).map_err(|e| io_error(path, e))
}

/// True when `path` has no entries
pub fn is_dir_empty(path: &Path) -> Result<bool, GenerateError> {
    let mut entries = std::fs::read_dir(path).map_err(|e| io_error(path, e))?;
    Ok(entries.next().is_none())
}

/// Remove everything inside `dir`, keeping `dir` itself
pub fn clear_dir(dir: &Path) -> Result<(), GenerateError> {
    for entry in std::fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_error(&path, e))?;
        if file_type.is_dir() {
            std::fs::remove_dir_all(&path).map_err(|e| io_error(&path, e))?;
        } else {
            std::fs::remove_file(&path).map_err(|e| io_error(&path, e))?;
        }
    }
    Ok(())
}

/// Write content to a file
pub fn write_file(path: &Path, content: &str) -> Result<(), GenerateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| io_error(path, e))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, GenerateError> {
    std::fs::read_to_string(path).map_err(|e| io_error(path, e))
}

/// Replace the first `endpoints: []` on each line with the given list
pub fn fill_endpoints(content: &str, endpoints: &[String]) -> String {
    let replacement = format!("endpoints: [{}]", endpoints.join(", "));
    let mut out = String::with_capacity(content.len() + replacement.len());
    for line in content.lines() {
        out.push_str(&line.replacen("endpoints: []", &replacement, 1));
        out.push('\n');
    }
    out
}

/// Fill the empty endpoint list of a generated talosconfig
///
/// Returns `false` when the file does not exist.
pub fn rewrite_talosconfig_endpoints(path: &Path, endpoints: &[String]) -> Result<bool, GenerateError> {
    if !path.exists() {
        return Ok(false);
    }
    let content = read_file(path)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, fill_endpoints(&content, endpoints)).map_err(|e| io_error(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_error(path, e))?;
    Ok(true)
}
