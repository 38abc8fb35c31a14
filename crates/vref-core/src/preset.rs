//! Reference presets
//!
//! A preset clears a stream's matrix and repopulates it from a fixed
//! pattern over the first `min(N, channel_limit)` channels. Tetrode
//! presets group channels in consecutive blocks of [`TETRODE_SIZE`];
//! trailing channels that don't fill a whole tetrode are left out of the
//! grouping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::{ReferenceMatrix, SELECTED};

/// Channels per tetrode
pub const TETRODE_SIZE: usize = 4;

/// Channel limits offered by the settings UI ("No. of channels")
pub const CHANNEL_LIMIT_CHOICES: [usize; 8] = [16, 32, 48, 64, 80, 96, 112, 128];

/// Built-in reference selection patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReferencePreset {
    /// No references (matrix cleared)
    #[default]
    None,
    /// Every channel references every channel, itself included
    CommonAverage,
    /// Every channel references all four channels of its own tetrode
    AllTetrodeElectrodes,
    /// Every channel references the other three channels of its tetrode
    OtherTetrodeElectrodes,
    /// Every channel references everything outside its own tetrode
    AverageOfOtherTetrodes,
    /// Every channel references the whole next tetrode
    /// (the last tetrode references the previous one)
    AverageOfNextTetrode,
}

impl ReferencePreset {
    /// All presets in UI order
    pub const ALL: [ReferencePreset; 6] = [
        ReferencePreset::None,
        ReferencePreset::CommonAverage,
        ReferencePreset::AllTetrodeElectrodes,
        ReferencePreset::OtherTetrodeElectrodes,
        ReferencePreset::AverageOfOtherTetrodes,
        ReferencePreset::AverageOfNextTetrode,
    ];

    /// Display name shown in the preset selector
    pub fn name(&self) -> &'static str {
        match self {
            ReferencePreset::None => "None",
            ReferencePreset::CommonAverage => "Common average reference",
            ReferencePreset::AllTetrodeElectrodes => "All tetrode electrodes",
            ReferencePreset::OtherTetrodeElectrodes => "Other tetrode electrodes",
            ReferencePreset::AverageOfOtherTetrodes => "Average of other tetrodes",
            ReferencePreset::AverageOfNextTetrode => "Average of next tetrode",
        }
    }

    /// Clear `matrix` and apply this pattern to its leading
    /// `min(N, channel_limit)` channels
    pub fn apply(&self, matrix: &mut ReferenceMatrix, channel_limit: usize) {
        let channels = matrix.channel_count().min(channel_limit);
        let tetrodes = channels / TETRODE_SIZE;

        matrix.clear();

        match self {
            ReferencePreset::None => {}
            ReferencePreset::CommonAverage => {
                matrix.fill_all_bounded(SELECTED, channels);
            }
            ReferencePreset::AllTetrodeElectrodes => {
                for tetrode in 0..tetrodes {
                    fill_group_block(matrix, tetrode, tetrode, SELECTED);
                }
            }
            ReferencePreset::OtherTetrodeElectrodes => {
                for tetrode in 0..tetrodes {
                    for channel in group_channels(tetrode) {
                        for reference in group_channels(tetrode).filter(|&r| r != channel) {
                            matrix.set(channel, reference, SELECTED);
                        }
                    }
                }
            }
            ReferencePreset::AverageOfOtherTetrodes => {
                matrix.fill_all_bounded(SELECTED, channels);
                for tetrode in 0..tetrodes {
                    fill_group_block(matrix, tetrode, tetrode, 0.0);
                }
            }
            ReferencePreset::AverageOfNextTetrode => {
                // A single tetrode has no neighbour to reference
                if tetrodes < 2 {
                    return;
                }
                for tetrode in 0..tetrodes {
                    let target = if tetrode + 1 < tetrodes {
                        tetrode + 1
                    } else {
                        tetrode - 1
                    };
                    fill_group_block(matrix, tetrode, target, SELECTED);
                }
            }
        }
    }
}

/// Channel indices belonging to tetrode `group`
fn group_channels(group: usize) -> std::ops::Range<usize> {
    group * TETRODE_SIZE..(group + 1) * TETRODE_SIZE
}

/// Set every `(channel in rows_group, reference in cols_group)` cell
fn fill_group_block(matrix: &mut ReferenceMatrix, rows_group: usize, cols_group: usize, value: f32) {
    for channel in group_channels(rows_group) {
        for reference in group_channels(cols_group) {
            matrix.set(channel, reference, value);
        }
    }
}

impl fmt::Display for ReferencePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a preset name isn't recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPreset(pub String);

impl fmt::Display for UnknownPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown reference preset: {}", self.0)
    }
}

impl std::error::Error for UnknownPreset {}

impl FromStr for ReferencePreset {
    type Err = UnknownPreset;

    /// Case-insensitive match on the display name; also accepts the short
    /// "Avg of ..." spellings used by older settings panels
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if let Some(preset) = Self::ALL
            .iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(wanted))
        {
            return Ok(*preset);
        }
        match wanted.to_ascii_lowercase().as_str() {
            "avg of other tetrodes" => Ok(ReferencePreset::AverageOfOtherTetrodes),
            "avg of next tetrode" => Ok(ReferencePreset::AverageOfNextTetrode),
            _ => Err(UnknownPreset(s.to_string())),
        }
    }
}
