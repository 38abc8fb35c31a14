//! Settings files
//!
//! Unlike the engine config, a settings file the user explicitly asked to
//! load must parse: failures are reported, not replaced with defaults.

use std::path::Path;

use super::ReferenceSettings;
use crate::error::ReferencingResult;

/// Write a settings document to `path` as YAML
pub fn save_settings(path: &Path, settings: &ReferenceSettings) -> ReferencingResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(path, yaml)?;
    log::info!("Saved channel reference data to {:?}", path);
    Ok(())
}

/// Read a settings document from `path`
pub fn load_settings(path: &Path) -> ReferencingResult<ReferenceSettings> {
    let contents = std::fs::read_to_string(path)?;
    let settings = serde_yaml::from_str(&contents)?;
    log::info!("Loaded channel reference data from {:?}", path);
    Ok(settings)
}
