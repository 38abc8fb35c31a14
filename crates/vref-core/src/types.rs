//! Common types for VirtualRef
//!
//! This module contains the host-facing data types: stream and channel
//! descriptors reported by the signal chain, and the multichannel sample
//! buffer the engine references in place.

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};

use crate::error::{ReferencingError, ReferencingResult};

/// Maximum number of channels covered by one stream's reference matrix
///
/// Streams with more channels are capped to bound matrix memory
/// (128 × 128 weights per stream).
pub const MAX_CHANNELS: usize = 128;

/// Maximum buffer size to pre-allocate for real-time safety
/// Covers all common host block sizes (64 .. 8192 samples)
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Number of streams whose matrices fit without reallocating the stream map
pub const MAX_STREAMS: usize = 64;

/// Sample type (32-bit float, as delivered by the host)
pub type Sample = f32;

/// Host-assigned stream identifier
///
/// ID 0 is never assigned to a live stream; persisted entries with ID 0
/// are ignored on restore.
pub type StreamId = u16;

/// A continuous channel within a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Row of this channel in the host's multi-stream buffer
    pub global_index: usize,
}

impl ChannelInfo {
    pub fn new(global_index: usize) -> Self {
        Self { global_index }
    }
}

/// A stream as reported by the host signal chain
///
/// Channels are ordered: matrix row/column `i` refers to `channels[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Host stream ID
    pub id: StreamId,
    /// Ordered channel list
    pub channels: Vec<ChannelInfo>,
    /// Whether the host has enabled processing for this stream
    pub enabled: bool,
}

impl StreamInfo {
    /// Create an enabled stream with the given channels
    pub fn new(id: StreamId, channels: Vec<ChannelInfo>) -> Self {
        Self {
            id,
            channels,
            enabled: true,
        }
    }

    /// Create an enabled stream whose channels occupy consecutive buffer rows
    /// starting at `first_global_index`
    pub fn contiguous(id: StreamId, first_global_index: usize, channel_count: usize) -> Self {
        let channels = (first_global_index..first_global_index + channel_count)
            .map(ChannelInfo::new)
            .collect();
        Self::new(id, channels)
    }

    /// Builder-style toggle for the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Number of channels the host reports for this stream
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Allocate a zero-filled sample vector, reporting allocation failure
/// instead of aborting
pub(crate) fn try_zeroed(len: usize) -> ReferencingResult<Vec<Sample>> {
    let mut samples = Vec::new();
    samples
        .try_reserve_exact(len)
        .map_err(|_| ReferencingError::Allocation { elements: len })?;
    samples.resize(len, 0.0);
    Ok(samples)
}

/// A buffer of multichannel samples
///
/// Rows are channels (indexed by [`ChannelInfo::global_index`]), columns
/// are samples. This is the owned counterpart of the `ArrayViewMut2` the
/// engine actually operates on, for hosts and tests that do not already
/// hold their samples in an ndarray.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiChannelBuffer {
    samples: Array2<Sample>,
}

impl MultiChannelBuffer {
    /// Create a buffer filled with silence
    pub fn silence(channels: usize, len: usize) -> Self {
        Self {
            samples: Array2::zeros((channels, len)),
        }
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// Panics if the channels have different lengths.
    pub fn from_channels(channels: &[Vec<Sample>]) -> Self {
        let len = channels.first().map(Vec::len).unwrap_or(0);
        let mut samples = Array2::zeros((channels.len(), len));
        for (mut row, channel) in samples.rows_mut().into_iter().zip(channels) {
            assert_eq!(channel.len(), len, "Channel lengths must match");
            row.assign(&ArrayView1::from(channel.as_slice()));
        }
        Self { samples }
    }

    /// Create a buffer where every channel holds a constant value
    pub fn from_constants(values: &[Sample], len: usize) -> Self {
        let mut samples = Array2::zeros((values.len(), len));
        for (mut row, &value) in samples.rows_mut().into_iter().zip(values) {
            row.fill(value);
        }
        Self { samples }
    }

    /// Number of channels (rows)
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.nrows()
    }

    /// Number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.ncols()
    }

    /// Check if the buffer holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Read-only view of one channel
    pub fn channel(&self, index: usize) -> Option<ArrayView1<'_, Sample>> {
        (index < self.num_channels()).then(|| self.samples.row(index))
    }

    /// Mutable view of one channel
    pub fn channel_mut(&mut self, index: usize) -> Option<ArrayViewMut1<'_, Sample>> {
        (index < self.num_channels()).then(|| self.samples.row_mut(index))
    }

    /// Read-only view of the whole buffer
    #[inline]
    pub fn view(&self) -> ArrayView2<'_, Sample> {
        self.samples.view()
    }

    /// Mutable view of the whole buffer
    #[inline]
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, Sample> {
        self.samples.view_mut()
    }

    /// Fill the buffer with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(0.0);
    }
}
