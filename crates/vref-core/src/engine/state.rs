//! Per-stream matrices and global gain
//!
//! `ReferenceState` is the data both sides of the engine hold: the audio
//! thread owns one inside [`super::ReferencingEngine`], the control thread
//! owns a mirror inside [`super::ReferencingController`]. Matrices are kept
//! in `basedrop::Owned` so that replacing one never frees memory on the
//! thread doing the replacing.

use std::collections::HashMap;

use basedrop::{Handle, Owned};

use super::gc::gc_handle_with_interval;
use super::ReferenceMatrix;
use crate::config::ReferencingConfig;
use crate::error::{ReferencingError, ReferencingResult};
use crate::preset::ReferencePreset;
use crate::types::{StreamId, StreamInfo};

/// Default global gain: full, unscaled reference removal
pub const DEFAULT_GLOBAL_GAIN: f32 = 1.0;

/// Outcome of a topology pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyUpdate {
    /// Streams whose matrices were (re)built, in host order
    pub rebuilt: Vec<StreamId>,
    /// Streams that disappeared and whose matrices were dropped
    pub removed: Vec<StreamId>,
}

/// Reference matrices for every live stream, plus the global gain
pub struct ReferenceState {
    matrices: HashMap<StreamId, Owned<ReferenceMatrix>>,
    global_gain: f32,
    max_channels: usize,
    handle: Handle,
}

impl ReferenceState {
    /// Create an empty state
    ///
    /// Capacity for `max_streams` entries is reserved up front so that
    /// installing matrices for new streams doesn't grow the map.
    pub fn new(config: &ReferencingConfig) -> Self {
        Self {
            matrices: HashMap::with_capacity(config.max_streams),
            global_gain: config.default_global_gain,
            max_channels: config.max_channels,
            handle: gc_handle_with_interval(config.gc_interval()),
        }
    }

    /// Channel count a stream's matrix covers: the host count, capped
    pub fn effective_channel_count(&self, stream: &StreamInfo) -> usize {
        stream.channel_count().min(self.max_channels)
    }

    /// Per-stream channel cap
    pub fn max_channels(&self) -> usize {
        self.max_channels
    }

    /// Rebuild matrices for the reported stream topology
    ///
    /// Every reported stream gets a freshly zeroed matrix (prior selections
    /// for that stream are discarded); streams no longer reported are
    /// dropped. Calling this twice with the same topology yields the same
    /// state.
    pub fn rebuild(&mut self, streams: &[StreamInfo]) -> ReferencingResult<TopologyUpdate> {
        let mut update = TopologyUpdate::default();

        // Build everything first so a failed allocation leaves the state untouched
        let mut built = Vec::with_capacity(streams.len());
        for stream in streams {
            let channels = self.effective_channel_count(stream);
            if channels < stream.channel_count() {
                log::info!(
                    "Stream {}: {} channels, matrix capped to {}",
                    stream.id,
                    stream.channel_count(),
                    channels
                );
            }
            built.push((stream.id, ReferenceMatrix::new(channels)?));
        }

        let stale: Vec<StreamId> = self
            .matrices
            .keys()
            .copied()
            .filter(|id| !streams.iter().any(|s| s.id == *id))
            .collect();
        for id in stale {
            self.matrices.remove(&id);
            update.removed.push(id);
        }

        for (id, matrix) in built {
            self.install(id, Owned::new(&self.handle, matrix));
            update.rebuilt.push(id);
        }

        log::info!(
            "Reference topology updated: {} stream(s), {} removed",
            update.rebuilt.len(),
            update.removed.len()
        );
        Ok(update)
    }

    /// Replace (or add) a stream's matrix as a whole
    ///
    /// The previous matrix, if any, is returned; dropping it defers the
    /// deallocation to the collector thread.
    pub fn install(
        &mut self,
        stream: StreamId,
        matrix: Owned<ReferenceMatrix>,
    ) -> Option<Owned<ReferenceMatrix>> {
        self.matrices.insert(stream, matrix)
    }

    /// Drop a stream's matrix
    pub fn remove(&mut self, stream: StreamId) -> Option<Owned<ReferenceMatrix>> {
        self.matrices.remove(&stream)
    }

    /// Wrap a matrix for installation, using this state's collector
    pub fn wrap(&self, matrix: ReferenceMatrix) -> Owned<ReferenceMatrix> {
        Owned::new(&self.handle, matrix)
    }

    /// Matrix for a stream; absent IDs yield `None` (nothing is created)
    pub fn matrix(&self, stream: StreamId) -> Option<&ReferenceMatrix> {
        self.matrices.get(&stream).map(|m| &**m)
    }

    /// Mutable matrix for a stream
    pub fn matrix_mut(&mut self, stream: StreamId) -> Option<&mut ReferenceMatrix> {
        self.matrices.get_mut(&stream).map(|m| &mut **m)
    }

    /// Live stream IDs, ascending
    pub fn stream_ids(&self) -> Vec<StreamId> {
        let mut ids: Vec<StreamId> = self.matrices.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live streams
    pub fn stream_count(&self) -> usize {
        self.matrices.len()
    }

    /// Current global gain
    #[inline]
    pub fn global_gain(&self) -> f32 {
        self.global_gain
    }

    /// Set the global gain (no range validation at this layer)
    #[inline]
    pub fn set_global_gain(&mut self, gain: f32) {
        self.global_gain = gain;
    }

    /// Apply a preset to one stream's matrix, bounded by `channel_limit`
    pub fn apply_preset(
        &mut self,
        stream: StreamId,
        preset: ReferencePreset,
        channel_limit: usize,
    ) -> ReferencingResult<()> {
        let matrix = self
            .matrix_mut(stream)
            .ok_or(ReferencingError::UnknownStream(stream))?;
        preset.apply(matrix, channel_limit);
        log::debug!(
            "Applied preset '{}' to stream {} (limit {})",
            preset,
            stream,
            channel_limit
        );
        Ok(())
    }
}
