//! Standard locations for VirtualRef configuration files

use std::path::PathBuf;

/// Name of the default config file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Get the VirtualRef config directory
///
/// Returns: `<platform config dir>/vref` (e.g. `~/.config/vref` on Linux),
/// falling back to `./vref` when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vref")
}

/// Get the default engine config file path
///
/// Returns: `<config dir>/vref/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}
