//! Filesystem locations for configuration.

use std::path::PathBuf;

/// Name of the config directory under the platform config root
pub const CONFIG_DIR_NAME: &str = "blurfm";
/// Name of the config file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration directory (`~/.config/blurfm/` on Linux).
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path to the config file (`~/.config/blurfm/config.toml` on Linux).
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}
