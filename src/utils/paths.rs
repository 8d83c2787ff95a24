//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories and project-relative paths.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// File name of the per-project sidecar document
pub const SIDECAR_FILE_NAME: &str = ".codeaskdata";

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the CodeAsk directory (~/.codeask/)
pub fn codeask_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".codeask"))
}

/// Get the config file path (~/.codeask/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(codeask_dir()?.join("config.json"))
}

/// Get the local key-value store path (~/.codeask/store.json)
pub fn store_path() -> AppResult<PathBuf> {
    Ok(codeask_dir()?.join("store.json"))
}

/// Sidecar document path for a project root
pub fn sidecar_path(project_root: &Path) -> PathBuf {
    project_root.join(SIDECAR_FILE_NAME)
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the CodeAsk directory, creating if it doesn't exist
pub fn ensure_codeask_dir() -> AppResult<PathBuf> {
    let path = codeask_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}

/// Path of `path` relative to `root`, with `/` separators.
///
/// Paths outside `root` are returned unchanged.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let Ok(rel) = path.strip_prefix(root) else {
        return path.to_string_lossy().to_string();
    };
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
