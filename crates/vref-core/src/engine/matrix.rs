//! Per-stream reference selection matrix
//!
//! Row `i` holds the reference contributions for channel `i`: a weight
//! greater than zero at column `j` means channel `j` is part of channel
//! `i`'s virtual reference. Mutators currently only write 0 or 1, but any
//! positive value counts as selected and is stored (and persisted) as-is.

use std::fmt;

use ndarray::{s, Array2, ArrayView1, ArrayViewMut1};

use crate::error::{ReferencingError, ReferencingResult};
use crate::types::{try_zeroed, Sample};

/// Value returned by [`ReferenceMatrix::get`] for out-of-range indices
pub const OUT_OF_RANGE: Sample = -1.0;

/// Weight written for a selected reference
pub const SELECTED: Sample = 1.0;

/// Square N×N reference selection table for one stream
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMatrix {
    weights: Array2<Sample>,
}

impl ReferenceMatrix {
    /// Allocate an `n × n` matrix with every weight set to zero
    ///
    /// Fails only if the weight storage can't be allocated.
    pub fn new(channel_count: usize) -> ReferencingResult<Self> {
        Ok(Self {
            weights: zeroed_square(channel_count)?,
        })
    }

    /// Number of channels covered (rows == columns)
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.weights.nrows()
    }

    /// Resize to `n × n`, discarding every selection
    ///
    /// Selections are never carried over to the new size. Resizing to the
    /// current size is a no-op and keeps the existing selections.
    pub fn resize(&mut self, channel_count: usize) -> ReferencingResult<()> {
        if channel_count != self.channel_count() {
            self.weights = zeroed_square(channel_count)?;
        }
        Ok(())
    }

    #[inline]
    fn in_range(&self, row: usize, col: usize) -> bool {
        row < self.channel_count() && col < self.channel_count()
    }

    /// Get the stored weight, or [`OUT_OF_RANGE`] if either index is invalid
    pub fn get(&self, row: usize, col: usize) -> Sample {
        if self.in_range(row, col) {
            self.weights[[row, col]]
        } else {
            log::warn!(
                "ReferenceMatrix::get: index out of bounds (row={}, col={}, channels={})",
                row,
                col,
                self.channel_count()
            );
            OUT_OF_RANGE
        }
    }

    /// Write a weight
    ///
    /// Returns `false` (and leaves the matrix untouched) if either index is
    /// out of range.
    pub fn set(&mut self, row: usize, col: usize, value: Sample) -> bool {
        if self.in_range(row, col) {
            self.weights[[row, col]] = value;
            true
        } else {
            log::warn!(
                "ReferenceMatrix::set: index out of bounds (row={}, col={}, channels={})",
                row,
                col,
                self.channel_count()
            );
            false
        }
    }

    /// Whether channel `col` contributes to channel `row`'s reference
    #[inline]
    pub fn is_selected(&self, row: usize, col: usize) -> bool {
        self.in_range(row, col) && self.weights[[row, col]] > 0.0
    }

    /// Weight row for channel `row` (its reference contributors)
    pub fn row(&self, row: usize) -> Option<ArrayView1<'_, Sample>> {
        (row < self.channel_count()).then(|| self.weights.row(row))
    }

    /// Mutable weight row for bulk edits
    pub fn row_mut(&mut self, row: usize) -> Option<ArrayViewMut1<'_, Sample>> {
        (row < self.channel_count()).then(|| self.weights.row_mut(row))
    }

    /// Number of selected references for channel `row`
    pub fn reference_count(&self, row: usize) -> usize {
        self.row(row)
            .map(|weights| weights.iter().filter(|&&w| w > 0.0).count())
            .unwrap_or(0)
    }

    /// True iff every entry of `row` is selected
    ///
    /// An out-of-range row is never "all selected".
    pub fn all_selected(&self, row: usize) -> bool {
        match self.row(row) {
            Some(weights) => weights.iter().all(|&w| w > 0.0),
            None => false,
        }
    }

    /// Set every cell to `value`
    pub fn fill_all(&mut self, value: Sample) {
        self.weights.fill(value);
    }

    /// Set the leading `min(n, max_channel)` square block to `value`
    ///
    /// Cells outside the block keep their current weight.
    pub fn fill_all_bounded(&mut self, value: Sample, max_channel: usize) {
        let bound = self.channel_count().min(max_channel);
        self.weights.slice_mut(s![..bound, ..bound]).fill(value);
    }

    /// Set every cell of one row to `value`
    ///
    /// Returns `false` if the row is out of range.
    pub fn fill_row(&mut self, row: usize, value: Sample) -> bool {
        match self.row_mut(row) {
            Some(mut weights) => {
                weights.fill(value);
                true
            }
            None => {
                log::warn!(
                    "ReferenceMatrix::fill_row: row {} out of bounds (channels={})",
                    row,
                    self.channel_count()
                );
                false
            }
        }
    }

    /// Deselect everything
    pub fn clear(&mut self) {
        self.fill_all(0.0);
    }

    /// Iterate over selected cells as `(row, col, weight)`, row-major
    pub fn selected(&self) -> impl Iterator<Item = (usize, usize, Sample)> + '_ {
        self.weights
            .indexed_iter()
            .filter(|&(_, &w)| w > 0.0)
            .map(|((row, col), &w)| (row, col, w))
    }
}

fn zeroed_square(channel_count: usize) -> ReferencingResult<Array2<Sample>> {
    let elements = channel_count
        .checked_mul(channel_count)
        .ok_or(ReferencingError::Allocation { elements: usize::MAX })?;
    let weights = try_zeroed(elements)?;
    Array2::from_shape_vec((channel_count, channel_count), weights)
        .map_err(|_| ReferencingError::Allocation { elements })
}

/// One row per line, weights separated by spaces
impl fmt::Display for ReferenceMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.weights.rows() {
            let mut first = true;
            for w in row.iter() {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{}", w)?;
                first = false;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
