//! Persistence of reference selections
//!
//! The settings document mirrors the engine state hierarchically: global
//! gain at the top, then one entry per stream, per channel with at least
//! one reference, per selected reference. Channel and reference indices
//! are 1-based in the document and 0-based everywhere else.
//!
//! ```yaml
//! Type: VirtualRef
//! GlobalGain: 1.0
//! STREAM:
//!   - ID: 101
//!     CHANNEL:
//!       - Index: 1
//!         REFERENCE:
//!           - Index: 2
//!             Value: 1.0
//! ```

mod document;
mod file;

pub use document::{ChannelSettings, ReferenceEntry, ReferenceSettings, StreamSettings, SETTINGS_TYPE};
pub use file::{load_settings, save_settings};
