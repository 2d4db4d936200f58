#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the location cache.
//!
//! The data directory defaults to `data/` under the workspace root and can
//! be moved with `CASE_GEO_DATA_DIR`. The cache file itself can be pointed
//! anywhere with `CASE_GEO_CACHE_PATH`.

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CASE_GEO_DATA_DIR";

/// Environment variable overriding the cache file path.
pub const CACHE_PATH_ENV: &str = "CASE_GEO_CACHE_PATH";

/// Environment variable naming an alias override file.
pub const ALIASES_ENV: &str = "CASE_GEO_ALIASES";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
#[must_use]
pub fn project_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

/// Returns the data directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    env_path(DATA_DIR_ENV).unwrap_or_else(|| project_root().join("data"))
}

/// Returns the `shared/` directory inside the data directory.
#[must_use]
pub fn shared_dir() -> PathBuf {
    data_dir().join("shared")
}

/// Returns the location cache file path.
#[must_use]
pub fn location_cache_path() -> PathBuf {
    env_path(CACHE_PATH_ENV).unwrap_or_else(|| shared_dir().join("location_cache.json"))
}

/// Returns the alias override file named by `CASE_GEO_ALIASES`, if any.
#[must_use]
pub fn aliases_path() -> Option<PathBuf> {
    env_path(ALIASES_ENV)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
