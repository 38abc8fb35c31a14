//! Settings document types and conversion to/from engine state

use serde::{Deserialize, Serialize};

use crate::engine::{ReferenceState, DEFAULT_GLOBAL_GAIN};
use crate::types::{Sample, StreamId};

/// Value of the document's `Type` tag
pub const SETTINGS_TYPE: &str = "VirtualRef";

fn default_type() -> String {
    SETTINGS_TYPE.to_string()
}

fn default_global_gain() -> f32 {
    DEFAULT_GLOBAL_GAIN
}

fn default_weight() -> Sample {
    1.0
}

/// Top-level settings record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSettings {
    #[serde(rename = "Type", default = "default_type")]
    pub kind: String,
    #[serde(rename = "GlobalGain", default = "default_global_gain")]
    pub global_gain: f32,
    #[serde(rename = "STREAM", default)]
    pub streams: Vec<StreamSettings>,
}

/// Selections for one stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(rename = "ID")]
    pub id: StreamId,
    #[serde(rename = "CHANNEL", default)]
    pub channels: Vec<ChannelSettings>,
}

/// Selected references of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// 1-based channel index
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "REFERENCE", default)]
    pub references: Vec<ReferenceEntry>,
}

/// One selected reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// 1-based reference channel index
    #[serde(rename = "Index")]
    pub index: usize,
    /// Stored weight
    #[serde(rename = "Value", default = "default_weight")]
    pub value: Sample,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            kind: default_type(),
            global_gain: DEFAULT_GLOBAL_GAIN,
            streams: Vec::new(),
        }
    }
}

impl ReferenceSettings {
    /// Snapshot the selections and global gain of `state`
    ///
    /// Streams are written in ascending ID order. Channels without any
    /// selected reference are omitted.
    pub fn capture(state: &ReferenceState) -> Self {
        let streams = state
            .stream_ids()
            .into_iter()
            .filter_map(|id| state.matrix(id).map(|matrix| (id, matrix)))
            .map(|(id, matrix)| {
                let channels = (0..matrix.channel_count())
                    .filter_map(|row| {
                        let weights = matrix.row(row)?;
                        let references: Vec<ReferenceEntry> = weights
                            .iter()
                            .enumerate()
                            .filter(|&(_, &w)| w > 0.0)
                            .map(|(col, &w)| ReferenceEntry {
                                index: col + 1,
                                value: w,
                            })
                            .collect();
                        (!references.is_empty()).then(|| ChannelSettings {
                            index: row + 1,
                            references,
                        })
                    })
                    .collect();
                StreamSettings { id, channels }
            })
            .collect();

        Self {
            kind: default_type(),
            global_gain: state.global_gain(),
            streams,
        }
    }

    /// Restore global gain and selections into `state`
    ///
    /// Each stream entry whose ID is live has its matrix cleared and then
    /// repopulated; entries for ID 0 or for streams that aren't live are
    /// skipped. Returns the IDs of the streams that were restored.
    pub fn apply_to(&self, state: &mut ReferenceState) -> Vec<StreamId> {
        if self.kind != SETTINGS_TYPE {
            log::warn!(
                "Settings document has Type '{}', expected '{}'; restoring anyway",
                self.kind,
                SETTINGS_TYPE
            );
        }

        state.set_global_gain(self.global_gain);

        let mut restored = Vec::new();
        for stream in &self.streams {
            if stream.id == 0 {
                log::debug!("Skipping settings for stream ID 0");
                continue;
            }
            let Some(matrix) = state.matrix_mut(stream.id) else {
                log::debug!("Skipping settings for unknown stream {}", stream.id);
                continue;
            };

            matrix.clear();
            for channel in &stream.channels {
                for reference in &channel.references {
                    match (channel.index.checked_sub(1), reference.index.checked_sub(1)) {
                        (Some(row), Some(col)) => {
                            matrix.set(row, col, reference.value);
                        }
                        _ => log::warn!(
                            "Stream {}: ignoring reference with zero index (channel {}, reference {})",
                            stream.id,
                            channel.index,
                            reference.index
                        ),
                    }
                }
            }
            restored.push(stream.id);
        }

        log::info!(
            "Restored reference settings for {} stream(s), global gain {}",
            restored.len(),
            self.global_gain
        );
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReferencingConfig;
    use crate::types::StreamInfo;

    fn state_with(streams: &[StreamInfo]) -> ReferenceState {
        let mut state = ReferenceState::new(&ReferencingConfig::default());
        state.rebuild(streams).unwrap();
        state
    }

    fn pairs(state: &ReferenceState, stream: StreamId) -> Vec<(usize, usize, f32)> {
        state.matrix(stream).unwrap().selected().collect()
    }

    #[test]
    fn test_capture_uses_one_based_indices() {
        let mut state = state_with(&[StreamInfo::contiguous(7, 0, 4)]);
        state.matrix_mut(7).unwrap().set(0, 2, 1.0);
        state.set_global_gain(0.75);

        let settings = ReferenceSettings::capture(&state);
        assert_eq!(settings.kind, SETTINGS_TYPE);
        assert_eq!(settings.global_gain, 0.75);
        assert_eq!(settings.streams.len(), 1);
        assert_eq!(settings.streams[0].id, 7);
        // Only channel 1 has a reference
        assert_eq!(settings.streams[0].channels.len(), 1);
        let channel = &settings.streams[0].channels[0];
        assert_eq!(channel.index, 1);
        assert_eq!(
            channel.references,
            vec![ReferenceEntry {
                index: 3,
                value: 1.0
            }]
        );
    }

    #[test]
    fn test_roundtrip_through_yaml() {
        let streams = [StreamInfo::contiguous(1, 0, 8), StreamInfo::contiguous(2, 8, 4)];
        let mut state = state_with(&streams);
        {
            let m = state.matrix_mut(1).unwrap();
            m.set(0, 1, 1.0);
            m.set(0, 7, 1.0);
            m.set(5, 5, 0.3);
            m.set(7, 0, 2.5);
        }
        state.matrix_mut(2).unwrap().fill_all(1.0);
        state.set_global_gain(1.37);

        let yaml = serde_yaml::to_string(&ReferenceSettings::capture(&state)).unwrap();
        let parsed: ReferenceSettings = serde_yaml::from_str(&yaml).unwrap();

        let mut target = state_with(&streams);
        let restored = parsed.apply_to(&mut target);

        assert_eq!(restored, vec![1, 2]);
        assert_eq!(target.global_gain(), 1.37);
        // Exact float round-trip, including non-unit weights
        assert_eq!(pairs(&target, 1), pairs(&state, 1));
        assert_eq!(pairs(&target, 2), pairs(&state, 2));
    }

    #[test]
    fn test_restore_clears_previous_selections() {
        let mut state = state_with(&[StreamInfo::contiguous(1, 0, 4)]);
        state.matrix_mut(1).unwrap().fill_all(1.0);

        let settings = ReferenceSettings {
            streams: vec![StreamSettings {
                id: 1,
                channels: vec![ChannelSettings {
                    index: 2,
                    references: vec![ReferenceEntry {
                        index: 4,
                        value: 1.0,
                    }],
                }],
            }],
            ..ReferenceSettings::default()
        };
        settings.apply_to(&mut state);

        assert_eq!(pairs(&state, 1), vec![(1, 3, 1.0)]);
    }

    #[test]
    fn test_restore_skips_unknown_and_zero_ids() {
        let mut state = state_with(&[StreamInfo::contiguous(1, 0, 4)]);
        state.matrix_mut(1).unwrap().set(0, 0, 1.0);

        let entry = |id| StreamSettings {
            id,
            channels: vec![ChannelSettings {
                index: 1,
                references: vec![ReferenceEntry {
                    index: 2,
                    value: 1.0,
                }],
            }],
        };
        let settings = ReferenceSettings {
            streams: vec![entry(0), entry(99)],
            ..ReferenceSettings::default()
        };
        let restored = settings.apply_to(&mut state);

        assert!(restored.is_empty());
        // Live stream untouched; nothing created for 99
        assert_eq!(pairs(&state, 1), vec![(0, 0, 1.0)]);
        assert!(state.matrix(99).is_none());
    }

    #[test]
    fn test_restore_ignores_invalid_indices() {
        let mut state = state_with(&[StreamInfo::contiguous(1, 0, 2)]);
        let settings = ReferenceSettings {
            streams: vec![StreamSettings {
                id: 1,
                channels: vec![
                    ChannelSettings {
                        index: 0,
                        references: vec![ReferenceEntry {
                            index: 1,
                            value: 1.0,
                        }],
                    },
                    ChannelSettings {
                        index: 1,
                        references: vec![
                            ReferenceEntry {
                                index: 3,
                                value: 1.0,
                            },
                            ReferenceEntry {
                                index: 2,
                                value: 1.0,
                            },
                        ],
                    },
                ],
            }],
            ..ReferenceSettings::default()
        };
        settings.apply_to(&mut state);

        assert_eq!(pairs(&state, 1), vec![(0, 1, 1.0)]);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let yaml = "STREAM:\n  - ID: 3\n    CHANNEL:\n      - Index: 1\n        REFERENCE:\n          - Index: 2\n";
        let settings: ReferenceSettings = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(settings.kind, SETTINGS_TYPE);
        assert_eq!(settings.global_gain, 1.0);
        assert_eq!(settings.streams[0].channels[0].references[0].value, 1.0);
    }

    #[test]
    fn test_document_tags() {
        let mut state = state_with(&[StreamInfo::contiguous(5, 0, 2)]);
        state.matrix_mut(5).unwrap().set(1, 0, 1.0);
        let yaml = serde_yaml::to_string(&ReferenceSettings::capture(&state)).unwrap();

        assert!(yaml.contains("Type: VirtualRef"));
        assert!(yaml.contains("GlobalGain: 1.0"));
        assert!(yaml.contains("ID: 5"));
        assert!(yaml.contains("CHANNEL:"));
        assert!(yaml.contains("REFERENCE:"));
        assert!(yaml.contains("Index: 2"));
    }
}
