//! Selection of the best focused z-slices.
//!
//! Slices are ranked by their average focus score; the best ones are returned in
//! depth order so the kept stack stays contiguous for downstream consumers.

use crate::error::{ProjectionError, Result};
use crate::sample::Sample;
use crate::validation::{check_same_shape, check_volume};
use ndarray::{Array1, Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

/// How many slices to keep.
///
/// Deserializes from a bare number: an integer is a count, a float a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Proportion {
    /// Absolute number of slices, clamped to the stack depth.
    Count(usize),
    /// Fraction of the stack depth in `[0, 1]`, rounded down.
    Fraction(f64),
}

impl Proportion {
    /// Number of slices to keep out of `depth`.
    ///
    /// Fractions outside `[0, 1]` (and NaN) are rejected rather than clamped.
    pub fn n_slices(self, depth: usize) -> Result<usize> {
        match self {
            Proportion::Count(n) => Ok(n.min(depth)),
            Proportion::Fraction(f) if (0.0..=1.0).contains(&f) => {
                Ok(((depth as f64 * f).floor() as usize).min(depth))
            }
            Proportion::Fraction(f) => Err(ProjectionError::InvalidProportion(f)),
        }
    }
}

impl Default for Proportion {
    fn default() -> Self {
        Proportion::Fraction(0.75)
    }
}

/// Mean focus score of every slice.
pub fn focus_levels(focus: &ArrayView3<f64>) -> Array1<f64> {
    focus
        .axis_iter(Axis(0))
        .map(|slice| slice.mean().unwrap_or(0.0))
        .collect()
}

/// Indices of the best focused slices, in ascending depth order.
///
/// Slices are ranked by descending mean focus; on equal scores the shallower
/// slice ranks first.
///
/// # Arguments
/// - `focus`: focus map from [`crate::focus::compute_focus`].
/// - `proportion`: fraction or count of slices to keep.
///
/// # Returns
/// - (*Vec<usize>*): `min(n, z)` sorted depth indices.
pub fn get_in_focus_indices(focus: &ArrayView3<f64>, proportion: Proportion) -> Result<Vec<usize>> {
    check_volume(focus)?;
    let n = proportion.n_slices(focus.len_of(Axis(0)))?;

    let levels = focus_levels(focus);
    let mut ranking: Vec<usize> = (0..levels.len()).collect();
    ranking.sort_by(|&a, &b| levels[b].total_cmp(&levels[a]));
    ranking.truncate(n);
    ranking.sort_unstable();
    Ok(ranking)
}

/// Keeps only the best focused slices of `volume`.
///
/// # Returns
/// - (*Array3<T>*): a `(z_in_focus, y, x)` stack in ascending depth order.
pub fn in_focus_selection<T: Sample>(
    volume: &ArrayView3<T>,
    focus: &ArrayView3<f64>,
    proportion: Proportion,
) -> Result<Array3<T>> {
    check_volume(volume)?;
    check_same_shape("focus map", volume.shape(), focus.shape())?;
    let indices = get_in_focus_indices(focus, proportion)?;
    Ok(volume.select(Axis(0), &indices))
}
