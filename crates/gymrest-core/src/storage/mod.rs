mod config;
pub mod snapshot;

pub use config::Config;
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};

use std::path::PathBuf;

use crate::error::StoreError;

/// Returns `~/.config/gymrest[-dev]/` based on GYMREST_ENV.
///
/// Set GYMREST_ENV=dev to use the development data directory, or
/// GYMREST_DATA_DIR to point somewhere else entirely (hermetic tests).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    if let Ok(dir) = std::env::var("GYMREST_DATA_DIR") {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::DataDir(e.to_string()))?;
        return Ok(dir);
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("GYMREST_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("gymrest-dev")
    } else {
        base_dir.join("gymrest")
    };

    std::fs::create_dir_all(&dir).map_err(|e| StoreError::DataDir(e.to_string()))?;
    Ok(dir)
}
