//! 2D projections of a `(z, y, x)` volume along the depth axis.
//!
//! The intensity projections (maximum, mean, median, sum) reduce every `yx` pixel
//! independently. [`focus_projection`] first keeps the best focused slices and
//! then fuses, per pixel, the few slices with the highest local focus.

use crate::error::{ProjectionError, Result};
use crate::focus::{compute_focus, NeighborhoodSize};
use crate::math_tools::{max_ignoring_nan, mean, median_mut};
use crate::sample::Sample;
use crate::selection::{get_in_focus_indices, Proportion};
use crate::validation::check_volume;
use ndarray::{s, Array2, ArrayView3, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Maximum number of slices fused at every pixel by [`focus_projection`].
pub const TOP_FOCUS_SLICES: usize = 5;

/// Reduction applied to the per-pixel winners of [`focus_projection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMethod {
    #[default]
    Median,
    Max,
}

impl ProjectionMethod {
    fn reduce(self, values: &mut [f64]) -> f64 {
        match self {
            ProjectionMethod::Median => median_mut(values),
            ProjectionMethod::Max => max_ignoring_nan(values),
        }
    }
}

impl Display for ProjectionMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectionMethod::Median => write!(f, "median"),
            ProjectionMethod::Max => write!(f, "max"),
        }
    }
}

impl FromStr for ProjectionMethod {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "median" => Ok(ProjectionMethod::Median),
            "max" => Ok(ProjectionMethod::Max),
            other => Err(ProjectionError::InvalidMethod(other.to_string())),
        }
    }
}

/// Keeps the maximum intensity of every `yx` pixel.
pub fn maximum_projection<T: Sample>(volume: &ArrayView3<T>) -> Result<Array2<T>> {
    check_volume(volume)?;
    Ok(volume.map_axis(Axis(0), |lane| {
        lane.iter()
            .copied()
            .fold(lane[0], |best, v| if v > best { v } else { best })
    }))
}

/// Mean intensity of every `yx` pixel, cast back to the sample type.
pub fn mean_projection<T: Sample>(volume: &ArrayView3<T>) -> Result<Array2<T>> {
    Ok(mean_projection_f64(volume)?.mapv(T::from_f64))
}

/// Mean intensity of every `yx` pixel, kept in `f64`.
pub fn mean_projection_f64<T: Sample>(volume: &ArrayView3<T>) -> Result<Array2<f64>> {
    check_volume(volume)?;
    Ok(volume.map_axis(Axis(0), |lane| {
        let values: Vec<f64> = lane.iter().map(|v| v.as_f64()).collect();
        mean(&values)
    }))
}

/// Median intensity of every `yx` pixel, cast back to the sample type.
pub fn median_projection<T: Sample>(volume: &ArrayView3<T>) -> Result<Array2<T>> {
    check_volume(volume)?;
    Ok(volume.map_axis(Axis(0), |lane| {
        let mut values: Vec<f64> = lane.iter().map(|v| v.as_f64()).collect();
        T::from_f64(median_mut(&mut values))
    }))
}

/// Sum of every `yx` pixel, cast back to the sample type.
///
/// The sum is accumulated in `f64`; integer results saturate at the type bounds.
pub fn sum_projection<T: Sample>(volume: &ArrayView3<T>) -> Result<Array2<T>> {
    check_volume(volume)?;
    Ok(volume.map_axis(Axis(0), |lane| {
        T::from_f64(lane.iter().map(|v| v.as_f64()).sum())
    }))
}

/// Projects the volume by fusing the best focused slices of every pixel.
///
/// 1. Compute a focus score for each pixel with the given neighborhood.
/// 2. Keep the slices with the highest average focus (see [`get_in_focus_indices`]).
/// 3. At each `yx` pixel, fuse the (at most) 5 kept slices with the highest
///    focus score using the median or the maximum.
///
/// Ties between equal focus scores favour the deeper slice.
///
/// # Arguments
/// - `volume`: a `(z, y, x)` stack.
/// - `proportion`: fraction or count of slices to keep.
/// - `neighborhood`: window of the focus metric.
/// - `method`: `median` or `max`.
///
/// # Returns
/// - (*Array2<T>*): a `(y, x)` image in the volume's sample type.
pub fn focus_projection<T: Sample>(
    volume: &ArrayView3<T>,
    proportion: Proportion,
    neighborhood: NeighborhoodSize,
    method: ProjectionMethod,
) -> Result<Array2<T>> {
    check_volume(volume)?;
    let (depth, height, width) = volume.dim();

    let focus = compute_focus(volume, neighborhood)?;
    let indices = get_in_focus_indices(&focus.view(), proportion)?;
    if indices.is_empty() {
        return Err(ProjectionError::NoSlicesSelected { depth });
    }
    log::debug!(
        "{} projection over {} of {} slices: {:?}",
        method,
        indices.len(),
        depth,
        indices
    );

    let in_focus = volume.select(Axis(0), &indices);
    let focus = focus.select(Axis(0), &indices);
    let n_top = indices.len().min(TOP_FOCUS_SLICES);

    let mut projected = Array2::<T>::zeros((height, width));
    Zip::indexed(&mut projected).par_for_each(|(y, x), pixel| {
        let scores = focus.slice(s![.., y, x]);
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
        let mut winners: Vec<f64> = order[order.len() - n_top..]
            .iter()
            .map(|&k| in_focus[(k, y, x)].as_f64())
            .collect();
        *pixel = T::from_f64(method.reduce(&mut winners));
    });
    Ok(projected)
}
