//! Where Grab keeps its installation records.
//!
//! - **Linux**: `~/.local/share/Grab/`
//! - **macOS**: `~/Library/Application Support/Grab/`
//! - **Windows**: `%APPDATA%\Grab\`
//!
//! `GRAB_DATA_DIR` overrides the platform default. In containers, mount that
//! directory as a writable volume.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, StorageError};

/// Application name used for the data directory.
pub const APP_NAME: &str = "Grab";

/// File holding all installation records.
pub const INSTANCES_FILE: &str = "instances.json";

/// Environment override for the data directory.
pub const DATA_DIR_ENV: &str = "GRAB_DATA_DIR";

/// Get the Grab data directory for the current OS.
pub fn grab_data_dir() -> Result<PathBuf> {
    if let Ok(val) = std::env::var(DATA_DIR_ENV) {
        if !val.is_empty() {
            let path = PathBuf::from(val);
            debug!(path = %path.display(), "Using GRAB_DATA_DIR override");
            return Ok(path);
        }
    }

    let base = dirs::data_dir().ok_or(StorageError::HomeDirNotFound)?;
    Ok(base.join(APP_NAME))
}

/// Path of the instances file inside a data directory.
pub fn instances_path(data_dir: &Path) -> PathBuf {
    data_dir.join(INSTANCES_FILE)
}
