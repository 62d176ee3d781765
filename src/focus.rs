//! Per-pixel focus measure.
//!
//! Helmli and Scherer's mean method: every pixel is compared with the mean of its
//! neighborhood and scored by the ratio of the larger to the smaller of the two.
//! Flat regions score 1, textured (sharp) regions score higher.

use crate::error::{ProjectionError, Result};
use crate::filters::uniform::uniform_filter;
use crate::sample::Sample;
use crate::validation::check_volume;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Neighborhood over which the focus metric aggregates local contrast.
///
/// A square neighborhood widens to `(n, n)`. Odd sizes are preferred so the
/// window is centred on the pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NeighborhoodSize {
    Square(usize),
    /// `(height, width)`
    Rect(usize, usize),
}

impl NeighborhoodSize {
    /// Normalized `(height, width)`, rejecting zero extents.
    pub fn dims(self) -> Result<(usize, usize)> {
        let (height, width) = match self {
            NeighborhoodSize::Square(n) => (n, n),
            NeighborhoodSize::Rect(height, width) => (height, width),
        };
        if height == 0 || width == 0 {
            return Err(ProjectionError::InvalidNeighborhood { height, width });
        }
        Ok((height, width))
    }
}

impl Default for NeighborhoodSize {
    fn default() -> Self {
        NeighborhoodSize::Square(7)
    }
}

impl From<usize> for NeighborhoodSize {
    fn from(size: usize) -> Self {
        NeighborhoodSize::Square(size)
    }
}

impl From<(usize, usize)> for NeighborhoodSize {
    fn from((height, width): (usize, usize)) -> Self {
        NeighborhoodSize::Rect(height, width)
    }
}

/// Computes a focus score for every voxel of a `(z, y, x)` volume.
///
/// # Arguments
/// - `volume`: the z-stack, any integer or float sample type.
/// - `neighborhood`: window used to compute the local mean of each slice.
///
/// # Returns
/// - (*Array3<f64>*): focus map with the shape of `volume`, every value `>= 1`.
///
/// # Errors
/// Empty volumes and zero-sized neighborhoods.
pub fn compute_focus<T: Sample>(
    volume: &ArrayView3<T>,
    neighborhood: NeighborhoodSize,
) -> Result<Array3<f64>> {
    check_volume(volume)?;
    let size = neighborhood.dims()?;
    log::debug!(
        "computing focus for {:?} volume with {}x{} neighborhood",
        volume.dim(),
        size.0,
        size.1
    );

    let mut focus = Array3::<f64>::zeros(volume.raw_dim());
    (focus.axis_iter_mut(Axis(0)), volume.axis_iter(Axis(0)))
        .into_par_iter()
        .for_each(|(mut focus_slice, slice)| {
            focus_slice.assign(&slice_focus(&slice, size));
        });
    Ok(focus)
}

fn slice_focus<T: Sample>(slice: &ArrayView2<T>, size: (usize, usize)) -> Array2<f64> {
    let image = slice.mapv(|v| v.as_f64());
    let local_mean = uniform_filter(&image.view(), size);

    let mut focus = Array2::<f64>::ones(image.raw_dim());
    Zip::from(&mut focus)
        .and(&image)
        .and(&local_mean)
        .for_each(|f, &value, &mean| {
            if value >= mean {
                if mean > 0.0 {
                    *f = value / mean;
                }
            } else if value > 0.0 {
                *f = mean / value;
            }
        });
    focus
}
