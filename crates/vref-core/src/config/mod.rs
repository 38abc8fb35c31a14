//! Engine configuration
//!
//! - Generic YAML config loading/saving
//! - Default config location
//! - [`ReferencingConfig`]: channel cap, pre-allocation sizes and queue bounds
//!
//! # Usage
//!
//! ```ignore
//! use vref_core::config::{default_config_path, ReferencingConfig};
//!
//! let config = ReferencingConfig::load(&default_config_path());
//! let (controller, engine) = ReferencingController::new(&config)?;
//! ```

mod io;
mod paths;
mod referencing;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use referencing::ReferencingConfig;
