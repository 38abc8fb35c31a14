//! Referencing engine - matrices, command queue, audio-side processing
//!
//! This module contains the core of virtual referencing:
//! - ReferenceMatrix: per-stream N×N selection weights
//! - ReferenceState: matrices for every live stream plus the global gain
//! - ReferencingEngine: the audio-side processor
//! - ReferencingController: the control-side mirror that feeds the engine
//!   through a lock-free command queue

mod command;
mod controller;
mod engine;
pub mod gc;
mod matrix;
mod state;

pub use command::*;
pub use controller::*;
pub use engine::*;
pub use matrix::*;
pub use state::*;
