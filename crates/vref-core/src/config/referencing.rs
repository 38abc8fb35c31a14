//! Referencing engine configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::io::load_config;
use crate::engine::gc::DEFAULT_COLLECT_INTERVAL;
use crate::engine::{COMMAND_QUEUE_CAPACITY, DEFAULT_GLOBAL_GAIN};
use crate::events::EVENT_CAPACITY;
use crate::types::{MAX_BUFFER_SIZE, MAX_CHANNELS, MAX_STREAMS};

/// Sizes and defaults for the referencing engine
///
/// Everything the audio thread needs is allocated from these values when
/// the engine is built; nothing grows afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencingConfig {
    /// Per-stream channel cap for reference matrices
    /// Default: 128
    pub max_channels: usize,

    /// Samples per pre-allocated scratch/snapshot row
    /// Longer host buffers are processed in chunks of this size.
    /// Default: 8192
    pub max_buffer_size: usize,

    /// Streams the audio-side matrix map holds without reallocating
    /// Default: 64
    pub max_streams: usize,

    /// Control → audio command ring capacity
    /// Default: 1024
    pub command_queue_capacity: usize,

    /// Bound of the UI event channel
    /// Default: 256
    pub event_capacity: usize,

    /// Global gain applied at startup
    /// Default: 1.0 (full reference removal)
    pub default_global_gain: f32,

    /// Selecting a reference deselects the rest of that channel's row
    /// Default: false
    pub single_select: bool,

    /// How often replaced matrices are freed by the collector thread (ms)
    /// Only the first state created in a process starts the collector.
    /// Default: 100
    pub gc_interval_ms: u64,
}

impl Default for ReferencingConfig {
    fn default() -> Self {
        Self {
            max_channels: MAX_CHANNELS,
            max_buffer_size: MAX_BUFFER_SIZE,
            max_streams: MAX_STREAMS,
            command_queue_capacity: COMMAND_QUEUE_CAPACITY,
            event_capacity: EVENT_CAPACITY,
            default_global_gain: DEFAULT_GLOBAL_GAIN,
            single_select: false,
            gc_interval_ms: DEFAULT_COLLECT_INTERVAL.as_millis() as u64,
        }
    }
}

impl ReferencingConfig {
    /// Load from a YAML file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        load_config(path)
    }

    /// Collector reclaim interval; zero is raised to 1 ms
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReferencingConfig::default();
        assert_eq!(config.max_channels, 128);
        assert_eq!(config.max_buffer_size, 8192);
        assert_eq!(config.default_global_gain, 1.0);
        assert!(!config.single_select);
        assert_eq!(config.gc_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_gc_interval_from_yaml() {
        let config: ReferencingConfig = serde_yaml::from_str("gc_interval_ms: 250\n").unwrap();
        assert_eq!(config.gc_interval(), Duration::from_millis(250));

        let config: ReferencingConfig = serde_yaml::from_str("gc_interval_ms: 0\n").unwrap();
        assert_eq!(config.gc_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_partial_yaml_uses_defaults_for_missing_fields() {
        let config: ReferencingConfig = serde_yaml::from_str("max_channels: 32\n").unwrap();
        assert_eq!(config.max_channels, 32);
        assert_eq!(config.max_buffer_size, MAX_BUFFER_SIZE);
        assert_eq!(config.command_queue_capacity, COMMAND_QUEUE_CAPACITY);
    }
}
