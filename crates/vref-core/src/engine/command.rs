//! Lock-free command queue for control → audio updates
//!
//! The control thread never touches the matrices the audio thread reads.
//! It edits its own mirror, then pushes a command describing the edit onto
//! an `rtrb` ring. The audio thread drains the ring at the start of each
//! processing cycle, so every update lands between buffers:
//!
//! - structural changes (topology, presets, restore) arrive as a complete
//!   replacement matrix and are swapped in whole ([`EngineCommand::InstallMatrix`])
//! - single-cell and single-row edits are applied in place
//!
//! ```ignore
//! let (mut tx, rx) = command_channel(1024);
//! let mut engine = ReferencingEngine::with_commands(&config, rx)?;
//! tx.push(EngineCommand::SetGlobalGain(0.5))?;   // control thread
//! engine.process_commands();                      // audio thread
//! ```

use basedrop::Owned;

use super::ReferenceMatrix;
use crate::types::{Sample, StreamId};

/// Commands sent from the control thread to the audio thread
pub enum EngineCommand {
    /// Swap in a fully built matrix for a stream (adds the stream if new)
    ///
    /// The matrix is already wrapped in `Owned`, so the replaced matrix is
    /// handed to the collector instead of being freed on the audio thread.
    InstallMatrix {
        stream: StreamId,
        matrix: Owned<ReferenceMatrix>,
    },
    /// Drop a stream's matrix
    RemoveStream { stream: StreamId },
    /// Write one weight
    SetCell {
        stream: StreamId,
        row: usize,
        col: usize,
        value: Sample,
    },
    /// Write every weight of one row
    SetRow {
        stream: StreamId,
        row: usize,
        value: Sample,
    },
    /// Set the global gain
    SetGlobalGain(f32),
}

/// Default capacity of the command queue
///
/// A full restore of a 128-channel setup is a handful of `InstallMatrix`
/// commands, but a user dragging across cells can queue many `SetCell`s
/// between two audio cycles.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Create a new command channel (producer/consumer pair)
///
/// Returns `(Producer, Consumer)`: the producer belongs to the control
/// thread, the consumer to the audio thread.
pub fn command_channel(
    capacity: usize,
) -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(capacity)
}
