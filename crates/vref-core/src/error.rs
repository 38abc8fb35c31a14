//! Referencing error types

use thiserror::Error;

use crate::types::StreamId;

/// Errors that can occur while building or controlling referencing state
///
/// Out-of-range cell access and unknown stream IDs during restore are not
/// errors: they are logged and ignored where they occur.
#[derive(Error, Debug)]
pub enum ReferencingError {
    /// Matrix or scratch storage could not be reserved
    #[error("Failed to allocate storage for {elements} samples/weights")]
    Allocation { elements: usize },

    /// No live matrix exists for the requested stream
    #[error("No reference matrix for stream {0}")]
    UnknownStream(StreamId),

    /// Settings files can't be saved or loaded while acquisition is running
    #[error("Stop acquisition before saving or loading channel references")]
    AcquisitionActive,

    /// The control → audio command queue is full
    #[error("Engine command queue is full")]
    CommandQueueFull,

    /// Settings file I/O failed
    #[error("Settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Settings document could not be (de)serialized
    #[error("Invalid settings document: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Result type for referencing operations
pub type ReferencingResult<T> = Result<T, ReferencingError>;
