// Skiff Engine — Filesystem Paths
//
// Everything Skiff persists lives under one per-user data directory.

use std::path::PathBuf;

/// Per-user data directory, created on first use.
pub fn data_dir() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    let dir = base.join("skiff");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// The preference database.
pub fn pref_db_path() -> PathBuf {
    data_dir().join("prefs.db")
}

/// Default location of the TOML configuration file.
pub fn default_config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("skiff").join("config.toml")
}
