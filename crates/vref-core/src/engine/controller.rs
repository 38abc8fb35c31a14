//! Control-side handle for a running engine
//!
//! The controller owns a mirror of the engine's [`ReferenceState`]. Every
//! edit is applied to the mirror first and then forwarded to the audio
//! thread as an [`EngineCommand`]. Reads (matrix lookups, serialization)
//! are served from the mirror and never touch audio-thread data.
//!
//! Queue space is checked before the mirror is modified, so a full queue
//! leaves both sides unchanged.

use std::path::Path;

use super::command::{command_channel, EngineCommand};
use super::engine::ReferencingEngine;
use super::state::{ReferenceState, TopologyUpdate};
use super::{ReferenceMatrix, SELECTED};
use crate::config::ReferencingConfig;
use crate::error::{ReferencingError, ReferencingResult};
use crate::events::{EventBus, ReferencingEvent};
use crate::preset::ReferencePreset;
use crate::settings::{load_settings, save_settings, ReferenceSettings};
use crate::types::{Sample, StreamId, StreamInfo};

/// Control-thread side of the referencing engine
pub struct ReferencingController {
    /// Mirror of what the audio thread holds once pending commands land
    state: ReferenceState,
    /// Producer end of the command ring
    commands: rtrb::Producer<EngineCommand>,
    /// Notifications for the settings UI
    events: EventBus,
    /// Selecting a reference deselects the rest of its row
    single_select: bool,
    /// Host is acquiring; settings files are locked
    acquisition_active: bool,
}

impl ReferencingController {
    /// Create a controller and the engine it drives
    ///
    /// Move the returned engine to the audio thread; keep the controller on
    /// the control/UI thread.
    pub fn new(config: &ReferencingConfig) -> ReferencingResult<(Self, ReferencingEngine)> {
        let (producer, consumer) = command_channel(config.command_queue_capacity);
        let engine = ReferencingEngine::with_commands(config, consumer)?;

        let controller = Self {
            state: ReferenceState::new(config),
            commands: producer,
            events: EventBus::new(config.event_capacity),
            single_select: config.single_select,
            acquisition_active: false,
        };

        log::info!(
            "Referencing controller created (max {} channels/stream, queue {})",
            config.max_channels,
            config.command_queue_capacity
        );
        Ok((controller, engine))
    }

    /// Subscribe to change notifications
    pub fn subscribe(&mut self) -> crossbeam::channel::Receiver<ReferencingEvent> {
        self.events.subscribe()
    }

    /// The control-side mirror
    pub fn state(&self) -> &ReferenceState {
        &self.state
    }

    // ─────────────────────────────────────────────────────────────
    // Topology
    // ─────────────────────────────────────────────────────────────

    /// Rebuild matrices after the host's stream topology changed
    ///
    /// Each reported stream gets a fresh zeroed matrix on both sides;
    /// streams no longer reported are removed.
    pub fn on_streams_changed(&mut self, streams: &[StreamInfo]) -> ReferencingResult<TopologyUpdate> {
        let stale = self
            .state
            .stream_ids()
            .into_iter()
            .filter(|id| !streams.iter().any(|s| s.id == *id))
            .count();
        self.reserve(streams.len() + stale)?;

        let update = self.state.rebuild(streams)?;
        for &stream in &update.removed {
            self.send(EngineCommand::RemoveStream { stream })?;
        }
        for &stream in &update.rebuilt {
            self.send_matrix(stream)?;
        }

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

    // ─────────────────────────────────────────────────────────────
    // Selection editing
    // ─────────────────────────────────────────────────────────────

    /// Whether selecting a reference deselects the rest of its row
    pub fn single_select(&self) -> bool {
        self.single_select
    }

    /// Enable or disable single-select mode
    pub fn set_single_select(&mut self, enabled: bool) {
        self.single_select = enabled;
    }

    /// Write one weight
    ///
    /// Returns `Ok(false)` (and sends nothing) if the cell is outside the
    /// matrix.
    pub fn set_cell(
        &mut self,
        stream: StreamId,
        row: usize,
        col: usize,
        value: Sample,
    ) -> ReferencingResult<bool> {
        self.reserve(1)?;
        let matrix = self.matrix_mut(stream)?;
        if !matrix.set(row, col, value) {
            return Ok(false);
        }

        self.send(EngineCommand::SetCell {
            stream,
            row,
            col,
            value,
        })?;
        self.events.publish(ReferencingEvent::SelectionChanged { stream });
        Ok(true)
    }

    /// Toggle one reference the way the selection table does
    ///
    /// In single-select mode a click always makes `(row, col)` the channel's
    /// only reference, whatever `selected` says: the rest of the row is
    /// cleared and the clicked cell set. Returns `Ok(false)` if the cell is
    /// outside the matrix.
    pub fn select(
        &mut self,
        stream: StreamId,
        row: usize,
        col: usize,
        selected: bool,
    ) -> ReferencingResult<bool> {
        if !self.single_select {
            let value = if selected { SELECTED } else { 0.0 };
            return self.set_cell(stream, row, col, value);
        }
        let value = SELECTED;

        self.reserve(2)?;
        let matrix = self.matrix_mut(stream)?;
        if row >= matrix.channel_count() || col >= matrix.channel_count() {
            log::warn!(
                "Stream {}: selection ({}, {}) out of range for {} channels",
                stream,
                row,
                col,
                matrix.channel_count()
            );
            return Ok(false);
        }
        matrix.fill_row(row, 0.0);
        matrix.set(row, col, value);

        self.send(EngineCommand::SetRow {
            stream,
            row,
            value: 0.0,
        })?;
        self.send(EngineCommand::SetCell {
            stream,
            row,
            col,
            value,
        })?;
        self.events.publish(ReferencingEvent::SelectionChanged { stream });
        Ok(true)
    }

    /// Write every weight of one row
    ///
    /// Returns `Ok(false)` if the row is outside the matrix.
    pub fn set_row(&mut self, stream: StreamId, row: usize, value: Sample) -> ReferencingResult<bool> {
        self.reserve(1)?;
        if !self.matrix_mut(stream)?.fill_row(row, value) {
            return Ok(false);
        }

        self.send(EngineCommand::SetRow { stream, row, value })?;
        self.events.publish(ReferencingEvent::SelectionChanged { stream });
        Ok(true)
    }

    /// Write every weight of a stream's matrix
    pub fn fill_all(&mut self, stream: StreamId, value: Sample) -> ReferencingResult<()> {
        self.edit_matrix(stream, |matrix| matrix.fill_all(value))
    }

    /// Write weights `[0, max_channel)` × `[0, max_channel)`, leaving the rest
    pub fn fill_all_bounded(
        &mut self,
        stream: StreamId,
        value: Sample,
        max_channel: usize,
    ) -> ReferencingResult<()> {
        self.edit_matrix(stream, |matrix| matrix.fill_all_bounded(value, max_channel))
    }

    /// Deselect everything in a stream
    pub fn clear(&mut self, stream: StreamId) -> ReferencingResult<()> {
        self.edit_matrix(stream, ReferenceMatrix::clear)
    }

    /// Replace a stream's selections with a preset pattern
    pub fn apply_preset(
        &mut self,
        stream: StreamId,
        preset: ReferencePreset,
        channel_limit: usize,
    ) -> ReferencingResult<()> {
        self.reserve(1)?;
        self.state.apply_preset(stream, preset, channel_limit)?;
        self.send_matrix(stream)?;
        self.events.publish(ReferencingEvent::SelectionChanged { stream });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Global gain
    // ─────────────────────────────────────────────────────────────

    /// Get the global gain
    pub fn global_gain(&self) -> f32 {
        self.state.global_gain()
    }

    /// Set the global gain
    ///
    /// Values outside the UI's 0..=2 range are accepted and applied.
    pub fn set_global_gain(&mut self, gain: f32) -> ReferencingResult<()> {
        self.send(EngineCommand::SetGlobalGain(gain))?;
        self.state.set_global_gain(gain);
        self.events.publish(ReferencingEvent::GlobalGainChanged { gain });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────

    /// Capture the current selections and gain
    pub fn serialize(&self) -> ReferenceSettings {
        ReferenceSettings::capture(&self.state)
    }

    /// Restore selections and gain from a settings document
    ///
    /// Entries for streams that aren't live (or for ID 0) are skipped.
    /// Returns the streams that were restored.
    pub fn restore(&mut self, settings: &ReferenceSettings) -> ReferencingResult<Vec<StreamId>> {
        // Gain plus one matrix per live stream; skipped entries send nothing
        let live = settings
            .streams
            .iter()
            .filter(|s| s.id != 0 && self.state.matrix(s.id).is_some())
            .count();
        self.reserve(live + 1)?;

        let restored = settings.apply_to(&mut self.state);
        self.send(EngineCommand::SetGlobalGain(self.state.global_gain()))?;
        for &stream in &restored {
            self.send_matrix(stream)?;
        }

        self.events.publish(ReferencingEvent::SettingsRestored {
            streams: restored.clone(),
        });
        Ok(restored)
    }

    /// Whether the host is currently acquiring
    pub fn is_acquisition_active(&self) -> bool {
        self.acquisition_active
    }

    /// Host acquisition started or stopped
    pub fn set_acquisition_active(&mut self, active: bool) {
        self.acquisition_active = active;
    }

    /// Save the current selections to a settings file
    ///
    /// Refused while acquisition is running.
    pub fn save_settings_file(&self, path: &Path) -> ReferencingResult<()> {
        if self.acquisition_active {
            return Err(ReferencingError::AcquisitionActive);
        }
        save_settings(path, &self.serialize())
    }

    /// Load selections from a settings file
    ///
    /// Refused while acquisition is running.
    pub fn load_settings_file(&mut self, path: &Path) -> ReferencingResult<Vec<StreamId>> {
        if self.acquisition_active {
            return Err(ReferencingError::AcquisitionActive);
        }
        let settings = load_settings(path)?;
        self.restore(&settings)
    }

    // ─────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────

    fn matrix_mut(&mut self, stream: StreamId) -> ReferencingResult<&mut ReferenceMatrix> {
        self.state
            .matrix_mut(stream)
            .ok_or(ReferencingError::UnknownStream(stream))
    }

    /// Apply a whole-matrix edit and ship the result
    fn edit_matrix(
        &mut self,
        stream: StreamId,
        edit: impl FnOnce(&mut ReferenceMatrix),
    ) -> ReferencingResult<()> {
        self.reserve(1)?;
        edit(self.matrix_mut(stream)?);
        self.send_matrix(stream)?;
        self.events.publish(ReferencingEvent::SelectionChanged { stream });
        Ok(())
    }

    /// Fail early unless `needed` commands fit in the queue
    fn reserve(&self, needed: usize) -> ReferencingResult<()> {
        if self.commands.slots() < needed {
            log::warn!(
                "Engine command queue full ({} slot(s) free, {} needed)",
                self.commands.slots(),
                needed
            );
            return Err(ReferencingError::CommandQueueFull);
        }
        Ok(())
    }

    /// Send a copy of the mirror's matrix for `stream`
    fn send_matrix(&mut self, stream: StreamId) -> ReferencingResult<()> {
        let matrix = self.matrix_mut(stream)?.clone();
        let matrix = self.state.wrap(matrix);
        self.send(EngineCommand::InstallMatrix { stream, matrix })
    }

    fn send(&mut self, command: EngineCommand) -> ReferencingResult<()> {
        self.commands.push(command).map_err(|_| {
            log::warn!("Engine command queue full, dropping command");
            ReferencingError::CommandQueueFull
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ChannelSettings, ReferenceEntry, StreamSettings};
    use crate::types::MultiChannelBuffer;

    const EPS: f32 = 1e-5;

    fn pair() -> (ReferencingController, ReferencingEngine) {
        ReferencingController::new(&ReferencingConfig::default()).unwrap()
    }

    fn value(buffer: &MultiChannelBuffer, channel: usize) -> f32 {
        buffer.channel(channel).unwrap()[0]
    }

    #[test]
    fn test_topology_reaches_engine() {
        let (mut controller, mut engine) = pair();
        controller
            .on_streams_changed(&[StreamInfo::contiguous(1, 0, 4), StreamInfo::contiguous(2, 4, 2)])
            .unwrap();

        // Nothing lands until the engine drains its queue
        assert!(engine.matrix_for(1).is_none());
        assert_eq!(engine.process_commands(), 2);
        assert_eq!(engine.matrix_for(1).unwrap().channel_count(), 4);
        assert_eq!(engine.matrix_for(2).unwrap().channel_count(), 2);

        controller
            .on_streams_changed(&[StreamInfo::contiguous(2, 0, 2)])
            .unwrap();
        engine.process_commands();
        assert!(engine.matrix_for(1).is_none());
        assert!(engine.matrix_for(2).is_some());
    }

    #[test]
    fn test_cell_edit_applies_on_next_process() {
        let stream = StreamInfo::contiguous(1, 0, 4);
        let (mut controller, mut engine) = pair();
        controller.on_streams_changed(std::slice::from_ref(&stream)).unwrap();
        assert!(controller.set_cell(1, 0, 1, 1.0).unwrap());
        assert!(controller.set_cell(1, 0, 2, 1.0).unwrap());

        let mut buffer = MultiChannelBuffer::from_constants(&[10.0, 20.0, 30.0, 0.0], 8);
        engine.process(&mut buffer, &[stream]);

        assert!((value(&buffer, 0) - (-15.0)).abs() < EPS);
        assert_eq!(engine.matrix_for(1), controller.matrix_for(1));
    }

    #[test]
    fn test_out_of_range_edit_sends_nothing() {
        let (mut controller, mut engine) = pair();
        controller
            .on_streams_changed(&[StreamInfo::contiguous(1, 0, 4)])
            .unwrap();
        engine.process_commands();

        assert!(!controller.set_cell(1, 4, 0, 1.0).unwrap());
        assert!(!controller.set_row(1, 9, 1.0).unwrap());
        assert_eq!(engine.process_commands(), 0);
    }

    #[test]
    fn test_unknown_stream_is_an_error() {
        let (mut controller, _engine) = pair();
        assert!(matches!(
            controller.set_cell(5, 0, 0, 1.0),
            Err(ReferencingError::UnknownStream(5))
        ));
        assert!(matches!(
            controller.apply_preset(5, ReferencePreset::CommonAverage, 128),
            Err(ReferencingError::UnknownStream(5))
        ));
    }

    #[test]
    fn test_single_select_replaces_row() {
        let (mut controller, mut engine) = pair();
        controller
            .on_streams_changed(&[StreamInfo::contiguous(1, 0, 4)])
            .unwrap();
        controller.set_row(1, 0, 1.0).unwrap();
        controller.set_single_select(true);

        assert!(controller.select(1, 0, 2, true).unwrap());
        engine.process_commands();

        let expected = vec![(0, 2, 1.0)];
        assert_eq!(controller.matrix_for(1).unwrap().selected().collect::<Vec<_>>(), expected);
        assert_eq!(engine.matrix_for(1).unwrap().selected().collect::<Vec<_>>(), expected);

        // Clicking the selected cell again keeps it as the only reference
        assert!(controller.select(1, 0, 2, false).unwrap());
        engine.process_commands();
        assert_eq!(controller.matrix_for(1).unwrap().selected().collect::<Vec<_>>(), expected);
        assert_eq!(engine.matrix_for(1).unwrap().selected().collect::<Vec<_>>(), expected);

        // Out of range in single-select mode leaves the row alone
        assert!(!controller.select(1, 0, 9, true).unwrap());
        assert!(controller.matrix_for(1).unwrap().is_selected(0, 2));
    }

    #[test]
    fn test_multi_select_deselects() {
        let (mut controller, _engine) = pair();
        controller
            .on_streams_changed(&[StreamInfo::contiguous(1, 0, 4)])
            .unwrap();
        controller.select(1, 0, 1, true).unwrap();
        controller.select(1, 0, 1, false).unwrap();
        assert_eq!(controller.matrix_for(1).unwrap().reference_count(0), 0);
    }

    #[test]
    fn test_multi_select_keeps_row() {
        let (mut controller, _engine) = pair();
        controller
            .on_streams_changed(&[StreamInfo::contiguous(1, 0, 4)])
            .unwrap();
        controller.select(1, 0, 1, true).unwrap();
        controller.select(1, 0, 3, true).unwrap();
        assert_eq!(controller.matrix_for(1).unwrap().reference_count(0), 2);
    }

    #[test]
    fn test_preset_and_fill_reach_engine() {
        let (mut controller, mut engine) = pair();
        controller
            .on_streams_changed(&[StreamInfo::contiguous(1, 0, 8)])
            .unwrap();

        controller
            .apply_preset(1, ReferencePreset::AllTetrodeElectrodes, 128)
            .unwrap();
        engine.process_commands();
        assert_eq!(engine.matrix_for(1), controller.matrix_for(1));

        controller.fill_all_bounded(1, 1.0, 2).unwrap();
        controller.clear(1).unwrap();
        engine.process_commands();
        assert_eq!(engine.matrix_for(1).unwrap().selected().count(), 0);

        controller.fill_all(1, 1.0).unwrap();
        engine.process_commands();
        assert_eq!(engine.matrix_for(1).unwrap().selected().count(), 64);
    }

    #[test]
    fn test_global_gain_is_forwarded() {
        let (mut controller, mut engine) = pair();
        let events = controller.subscribe();

        controller.set_global_gain(0.25).unwrap();
        assert_eq!(controller.global_gain(), 0.25);
        assert_eq!(engine.global_gain(), 1.0);

        engine.process_commands();
        assert_eq!(engine.global_gain(), 0.25);
        assert_eq!(
            events.try_recv().unwrap(),
            ReferencingEvent::GlobalGainChanged { gain: 0.25 }
        );
    }

    #[test]
    fn test_full_queue_leaves_mirror_unchanged() {
        let config = ReferencingConfig {
            command_queue_capacity: 2,
            ..ReferencingConfig::default()
        };
        let (mut controller, _engine) = ReferencingController::new(&config).unwrap();

        let result = controller.on_streams_changed(&[
            StreamInfo::contiguous(1, 0, 2),
            StreamInfo::contiguous(2, 2, 2),
            StreamInfo::contiguous(3, 4, 2),
        ]);
        assert!(matches!(result, Err(ReferencingError::CommandQueueFull)));
        assert_eq!(controller.state().stream_count(), 0);
    }

    #[test]
    fn test_restore_reaches_engine() {
        let streams = [StreamInfo::contiguous(1, 0, 4)];
        let (mut source, _) = pair();
        source.on_streams_changed(&streams).unwrap();
        source.set_cell(1, 3, 0, 1.0).unwrap();
        source.set_global_gain(0.5).unwrap();
        let settings = source.serialize();

        let (mut controller, mut engine) = pair();
        controller.on_streams_changed(&streams).unwrap();
        let restored = controller.restore(&settings).unwrap();
        engine.process_commands();

        assert_eq!(restored, vec![1]);
        assert_eq!(engine.global_gain(), 0.5);
        assert_eq!(
            engine.matrix_for(1).unwrap().selected().collect::<Vec<_>>(),
            vec![(3, 0, 1.0)]
        );
    }

    #[test]
    fn test_settings_file_locked_during_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.yaml");
        let (mut controller, _engine) = pair();
        controller
            .on_streams_changed(&[StreamInfo::contiguous(1, 0, 4)])
            .unwrap();

        controller.set_acquisition_active(true);
        assert!(matches!(
            controller.save_settings_file(&path),
            Err(ReferencingError::AcquisitionActive)
        ));
        assert!(matches!(
            controller.load_settings_file(&path),
            Err(ReferencingError::AcquisitionActive)
        ));
        assert!(!path.exists());

        controller.set_acquisition_active(false);
        controller.set_cell(1, 1, 0, 1.0).unwrap();
        controller.save_settings_file(&path).unwrap();
        controller.clear(1).unwrap();
        assert_eq!(controller.load_settings_file(&path).unwrap(), vec![1]);
        assert!(controller.matrix_for(1).unwrap().is_selected(1, 0));
    }

    #[test]
    fn test_restore_with_many_unknown_streams_fits_small_queue() {
        let config = ReferencingConfig {
            command_queue_capacity: 8,
            ..ReferencingConfig::default()
        };
        let (mut controller, mut engine) = ReferencingController::new(&config).unwrap();
        controller
            .on_streams_changed(&[StreamInfo::contiguous(1, 0, 4)])
            .unwrap();
        engine.process_commands();

        let stream = |id| StreamSettings {
            id,
            channels: vec![ChannelSettings {
                index: 1,
                references: vec![ReferenceEntry {
                    index: 2,
                    value: 1.0,
                }],
            }],
        };
        let mut streams: Vec<StreamSettings> = (100..120).map(stream).collect();
        streams.push(stream(0));
        streams.push(stream(1));
        let settings = ReferenceSettings {
            global_gain: 0.75,
            streams,
            ..ReferenceSettings::default()
        };

        assert_eq!(controller.restore(&settings).unwrap(), vec![1]);
        assert_eq!(engine.process_commands(), 2);
        assert_eq!(engine.global_gain(), 0.75);
        assert!(engine.matrix_for(1).unwrap().is_selected(0, 1));
    }

    #[test]
    fn test_topology_event_reaches_every_subscriber() {
        let (mut controller, _engine) = pair();
        let ui = controller.subscribe();
        let other = controller.subscribe();

        controller
            .on_streams_changed(&[StreamInfo::contiguous(2, 0, 4)])
            .unwrap();

        let expected = ReferencingEvent::TopologyChanged {
            streams: vec![2],
            removed: vec![],
        };
        assert_eq!(ui.try_iter().collect::<Vec<_>>(), vec![expected.clone()]);
        assert_eq!(other.try_iter().collect::<Vec<_>>(), vec![expected]);
    }
}
