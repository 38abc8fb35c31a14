//! Referencing engine - per-buffer virtual reference subtraction

use ndarray::{s, Array2, ArrayViewMut2};

use super::command::EngineCommand;
use super::state::{ReferenceState, TopologyUpdate};
use super::ReferenceMatrix;
use crate::config::ReferencingConfig;
use crate::error::{ReferencingError, ReferencingResult};
use crate::events::{EventBus, ReferencingEvent};
use crate::preset::ReferencePreset;
use crate::settings::ReferenceSettings;
use crate::types::{try_zeroed, MultiChannelBuffer, Sample, StreamId, StreamInfo};

/// The referencing engine
///
/// Owns one reference matrix per live stream and subtracts, from every
/// channel with at least one selected reference, the unweighted mean of
/// those references scaled by the global gain.
///
/// `process()` runs on the audio thread and never allocates: the averaging
/// buffer and the per-stream input snapshot are sized from
/// [`ReferencingConfig`] at construction. When paired with a
/// [`super::ReferencingController`], all control operations arrive as
/// [`EngineCommand`]s drained at the start of each `process()` call; a
/// single-threaded host can instead call the control methods here directly.
pub struct ReferencingEngine {
    /// Matrices and global gain
    state: ReferenceState,
    /// Averaging buffer, one row of `max_buffer_size` samples
    scratch: Vec<Sample>,
    /// Copy of the current stream's input channels, taken before any
    /// channel is modified (`max_channels × max_buffer_size`)
    snapshot: Array2<Sample>,
    /// Commands from the control thread, if paired with a controller
    commands: Option<rtrb::Consumer<EngineCommand>>,
    /// Change notifications for direct (single-threaded) use
    events: EventBus,
}

impl ReferencingEngine {
    /// Create an engine with no streams
    ///
    /// Fails if the scratch or snapshot storage can't be allocated.
    pub fn new(config: &ReferencingConfig) -> ReferencingResult<Self> {
        let block = config.max_buffer_size.max(1);
        let snapshot_len = config
            .max_channels
            .checked_mul(block)
            .ok_or(ReferencingError::Allocation { elements: usize::MAX })?;
        let snapshot = Array2::from_shape_vec((config.max_channels, block), try_zeroed(snapshot_len)?)
            .map_err(|_| ReferencingError::Allocation { elements: snapshot_len })?;

        Ok(Self {
            state: ReferenceState::new(config),
            scratch: try_zeroed(block)?,
            snapshot,
            commands: None,
            events: EventBus::new(config.event_capacity),
        })
    }

    /// Create an engine that drains `commands` at the start of every cycle
    pub(crate) fn with_commands(
        config: &ReferencingConfig,
        commands: rtrb::Consumer<EngineCommand>,
    ) -> ReferencingResult<Self> {
        let mut engine = Self::new(config)?;
        engine.commands = Some(commands);
        Ok(engine)
    }

    /// Subscribe to change notifications raised by the direct control methods
    pub fn subscribe(&mut self) -> crossbeam::channel::Receiver<ReferencingEvent> {
        self.events.subscribe()
    }

    /// Matrices and gain as currently seen by the audio path
    pub fn state(&self) -> &ReferenceState {
        &self.state
    }

    // ─────────────────────────────────────────────────────────────
    // Control operations (direct use)
    // ─────────────────────────────────────────────────────────────

    /// Rebuild matrices after the host's stream topology changed
    ///
    /// Each reported stream gets a zeroed `min(channels, max_channels)`
    /// matrix; unreported streams are dropped. Raises
    /// [`ReferencingEvent::TopologyChanged`].
    pub fn on_streams_changed(&mut self, streams: &[StreamInfo]) -> ReferencingResult<TopologyUpdate> {
        let update = self.state.rebuild(streams)?;
        self.events.publish(ReferencingEvent::TopologyChanged {
            streams: update.rebuilt.clone(),
            removed: update.removed.clone(),
        });
        Ok(update)
    }

    /// Matrix for a stream, if the stream is live
    pub fn matrix_for(&self, stream: StreamId) -> Option<&ReferenceMatrix> {
        self.state.matrix(stream)
    }

    /// Mutable matrix for a stream, if the stream is live
    pub fn matrix_for_mut(&mut self, stream: StreamId) -> Option<&mut ReferenceMatrix> {
        self.state.matrix_mut(stream)
    }

    /// Get the global gain
    pub fn global_gain(&self) -> f32 {
        self.state.global_gain()
    }

    /// Set the global gain (not clamped)
    pub fn set_global_gain(&mut self, gain: f32) {
        self.state.set_global_gain(gain);
    }

    /// Apply a preset to one stream
    pub fn apply_preset(
        &mut self,
        stream: StreamId,
        preset: ReferencePreset,
        channel_limit: usize,
    ) -> ReferencingResult<()> {
        self.state.apply_preset(stream, preset, channel_limit)?;
        self.events.publish(ReferencingEvent::SelectionChanged { stream });
        Ok(())
    }

    /// Capture the current selections and gain as a settings document
    pub fn serialize(&self) -> ReferenceSettings {
        ReferenceSettings::capture(&self.state)
    }

    /// Restore selections and gain from a settings document
    ///
    /// Returns the streams that were restored; entries for streams that
    /// aren't live are skipped.
    pub fn restore(&mut self, settings: &ReferenceSettings) -> Vec<StreamId> {
        let restored = settings.apply_to(&mut self.state);
        self.events.publish(ReferencingEvent::SettingsRestored {
            streams: restored.clone(),
        });
        restored
    }

    // ─────────────────────────────────────────────────────────────
    // Audio thread
    // ─────────────────────────────────────────────────────────────

    /// Apply one command from the control thread
    pub fn apply_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::InstallMatrix { stream, matrix } => {
                // Replaced matrix goes to the collector when dropped here
                drop(self.state.install(stream, matrix));
            }
            EngineCommand::RemoveStream { stream } => {
                drop(self.state.remove(stream));
            }
            EngineCommand::SetCell {
                stream,
                row,
                col,
                value,
            } => {
                if let Some(matrix) = self.state.matrix_mut(stream) {
                    matrix.set(row, col, value);
                }
            }
            EngineCommand::SetRow { stream, row, value } => {
                if let Some(matrix) = self.state.matrix_mut(stream) {
                    matrix.fill_row(row, value);
                }
            }
            EngineCommand::SetGlobalGain(gain) => {
                self.state.set_global_gain(gain);
            }
        }
    }

    /// Drain all pending commands
    ///
    /// Returns the number of commands applied. Called automatically at the
    /// start of [`process`](Self::process).
    pub fn process_commands(&mut self) -> usize {
        let Some(mut rx) = self.commands.take() else {
            return 0;
        };
        let mut applied = 0;
        while let Ok(command) = rx.pop() {
            self.apply_command(command);
            applied += 1;
        }
        self.commands = Some(rx);
        applied
    }

    /// Reference one buffer in place
    pub fn process(&mut self, buffer: &mut MultiChannelBuffer, streams: &[StreamInfo]) {
        self.process_view(buffer.view_mut(), streams);
    }

    /// Reference a host-owned buffer view in place
    ///
    /// Rows are channels by global index, columns are samples. Buffers
    /// longer than the pre-allocated block size are processed in
    /// consecutive blocks.
    pub fn process_view(&mut self, mut buffer: ArrayViewMut2<'_, Sample>, streams: &[StreamInfo]) {
        self.process_commands();

        // Zero gain disables referencing without touching selections
        if self.state.global_gain() == 0.0 {
            return;
        }

        let block = self.scratch.len();
        let total = buffer.ncols();
        let mut start = 0;
        while start < total {
            let end = (start + block).min(total);
            self.process_block(buffer.slice_mut(s![.., start..end]), streams);
            start = end;
        }
    }

    fn process_block(&mut self, mut block: ArrayViewMut2<'_, Sample>, streams: &[StreamInfo]) {
        let len = block.ncols();
        let buffer_channels = block.nrows();
        let gain = self.state.global_gain();
        let snapshot = &mut self.snapshot;
        let avg = &mut self.scratch[..len];

        for stream in streams.iter().filter(|s| s.enabled) {
            let Some(matrix) = self.state.matrix(stream.id) else {
                continue;
            };
            let n = matrix
                .channel_count()
                .min(stream.channel_count())
                .min(snapshot.nrows());
            let channels = &stream.channels[..n];
            let present = |j: usize| channels[j].global_index < buffer_channels;

            // Read every input before writing any output
            for (j, channel) in channels.iter().enumerate() {
                if present(j) {
                    snapshot
                        .slice_mut(s![j, ..len])
                        .assign(&block.row(channel.global_index));
                }
            }

            for (i, channel) in channels.iter().enumerate() {
                if !present(i) {
                    continue;
                }
                let Some(weights) = matrix.row(i) else {
                    continue;
                };
                let is_reference = |j: usize| weights[j] > 0.0 && present(j);

                let num_refs = (0..n).filter(|&j| is_reference(j)).count();
                if num_refs == 0 {
                    continue;
                }
                let ref_gain = 1.0 / num_refs as Sample;

                avg.fill(0.0);
                for j in (0..n).filter(|&j| is_reference(j)) {
                    let source = snapshot.slice(s![j, ..len]);
                    for (acc, &x) in avg.iter_mut().zip(source.iter()) {
                        *acc += x * ref_gain;
                    }
                }

                let mut target = block.row_mut(channel.global_index);
                for (y, &r) in target.iter_mut().zip(avg.iter()) {
                    *y -= r * gain;
                }
            }
        }
    }
}
