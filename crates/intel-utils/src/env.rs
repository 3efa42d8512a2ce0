//! `.env` loading

use std::path::{Path, PathBuf};

/// Load variables from a `.env` file in the current directory or its parents
///
/// Returns the path that was loaded, if any. Variables already present in the
/// process environment are left untouched.
pub fn load_env() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!("Failed to load .env file: {e}");
            None
        }
    }
}

/// Load variables from a specific file
pub fn load_env_from(path: impl AsRef<Path>) -> Result<(), dotenvy::Error> {
    dotenvy::from_path(path.as_ref())
}
