//! Path utilities

use std::path::PathBuf;

const DATA_DIR_NAME: &str = ".reddit-analyzer";

/// Data directory (~/.reddit-analyzer), relative to the working directory
/// when no home directory can be found
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}
