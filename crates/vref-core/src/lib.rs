//! VirtualRef Core - virtual referencing for multichannel electrophysiology
//!
//! For every stream of continuous channels, a per-stream selection matrix
//! says which channels serve as references for which. Each processing
//! cycle subtracts from every channel the mean of its selected references,
//! scaled by a global gain.
//!
//! - [`engine::ReferencingEngine`] runs on the audio thread
//! - [`engine::ReferencingController`] edits selections from the UI thread
//!   and forwards them through a lock-free queue
//! - [`settings`] persists selections; [`preset`] fills common patterns

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod preset;
pub mod settings;
pub mod types;

pub use engine::{ReferenceMatrix, ReferencingController, ReferencingEngine};
pub use error::{ReferencingError, ReferencingResult};
pub use preset::ReferencePreset;
pub use types::*;
