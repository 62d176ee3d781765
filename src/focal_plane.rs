//! Block-wise focal plane estimation.
//!
//! The volume is cut into square `block_size x block_size` columns spanning the
//! full depth. For each block the Laplacian variance of every slice forms an
//! axial focus curve, and a Gaussian fitted to that curve places the focal plane
//! at its peak.

use crate::config::FocalPlaneConfig;
use crate::curve_fit::{fit_gaussian, FitOptions, Gaussian};
use crate::error::{ProjectionError, Result};
use crate::filters::laplacian::laplacian_variance;
use crate::sample::Sample;
use crate::validation::{check_block_size, check_volume};
use cancellable_loops::{for_each_cancellable, par_map_cancellable};
use ndarray::{s, Array2, ArrayView3, Axis};
use rayon::prelude::*;
use std::sync::atomic::AtomicBool;

/// A `(z, y, x)` volume seen as a grid of square blocks.
#[derive(Debug, Clone)]
pub struct BlockGrid<'a, T> {
    volume: ArrayView3<'a, T>,
    block_size: usize,
    rows: usize,
    cols: usize,
}

impl<'a, T> BlockGrid<'a, T> {
    /// Fails if the volume is empty or `block_size` does not divide its `yx` extent.
    pub fn new(volume: ArrayView3<'a, T>, block_size: usize) -> Result<Self> {
        check_volume(&volume)?;
        let (_, height, width) = volume.dim();
        let (rows, cols) = check_block_size(height, width, block_size)?;
        Ok(BlockGrid {
            volume,
            block_size,
            rows,
            cols,
        })
    }

    /// `(rows, cols)` of the grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn depth(&self) -> usize {
        self.volume.len_of(Axis(0))
    }

    /// Full-depth block at grid position `(row, col)`.
    pub fn block(&self, row: usize, col: usize) -> ArrayView3<'a, T> {
        let b = self.block_size;
        self.volume
            .clone()
            .slice_move(s![.., row * b..(row + 1) * b, col * b..(col + 1) * b])
    }

    /// Grid positions in row-major order.
    pub fn indices(&self) -> Vec<(usize, usize)> {
        let cols = self.cols;
        (0..self.rows)
            .flat_map(|i| (0..cols).map(move |j| (i, j)))
            .collect()
    }
}

/// Result of the focal plane estimation of one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FocalPlaneOutcome {
    /// A well-defined peak inside the stack.
    Reliable { focal_plane: f64, fwhm: f64 },
    /// The fit converged, but the peak is too wide or lies more than half a
    /// slice outside the stack.
    Unreliable { focal_plane: f64, fwhm: f64 },
    /// The fit did not converge.
    NonConvergent,
    /// Every slice has zero Laplacian variance, nothing to fit.
    FlatProfile,
    /// The curve cannot be fitted at all; the middle of the stack is used.
    Fallback { focal_plane: f64 },
}

impl FocalPlaneOutcome {
    /// Focal plane entering the matrix, NaN when the block has no estimate.
    pub fn focal_plane(&self) -> f64 {
        match *self {
            FocalPlaneOutcome::Reliable { focal_plane, .. }
            | FocalPlaneOutcome::Fallback { focal_plane } => focal_plane,
            _ => f64::NAN,
        }
    }

    /// Peak width entering the matrix; the fallback reports a width of 0.
    pub fn fwhm(&self) -> f64 {
        match *self {
            FocalPlaneOutcome::Reliable { fwhm, .. } => fwhm,
            FocalPlaneOutcome::Fallback { .. } => 0.0,
            _ => f64::NAN,
        }
    }

    pub fn is_reliable(&self) -> bool {
        matches!(self, FocalPlaneOutcome::Reliable { .. })
    }
}

/// Laplacian variance of every slice of a block, in depth order.
pub fn focus_curve<T: Sample>(block: &ArrayView3<T>) -> Vec<f64> {
    (0..block.len_of(Axis(0)))
        .into_par_iter()
        .map(|z| {
            let slice = block.index_axis(Axis(0), z).mapv(|v| v.as_f64());
            laplacian_variance(&slice.view())
        })
        .collect()
}

/// Estimates the focal plane of one full-depth block.
///
/// The focus curve is normalized by its maximum and fitted by a Gaussian over
/// the depth indices, see [`focal_plane_from_curve`].
pub fn find_focal_plane<T: Sample>(
    block: &ArrayView3<T>,
    threshold_fwhm: f64,
    max_iterations: usize,
) -> FocalPlaneOutcome {
    let curve = focus_curve(block);
    focal_plane_from_curve(&curve, threshold_fwhm, max_iterations)
}

/// Classifies a raw (unnormalized) focus curve.
pub fn focal_plane_from_curve(
    curve: &[f64],
    threshold_fwhm: f64,
    max_iterations: usize,
) -> FocalPlaneOutcome {
    let depth = curve.len();
    let peak = curve.iter().copied().fold(f64::NAN, f64::max);
    if peak == 0.0 {
        return FocalPlaneOutcome::FlatProfile;
    }

    let x: Vec<f64> = (0..depth).map(|z| z as f64).collect();
    let y: Vec<f64> = curve.iter().map(|v| v / peak).collect();
    let options = FitOptions {
        max_iterations,
        ..FitOptions::default()
    };

    match fit_gaussian(&x, &y, &options) {
        Ok(fit) => classify(&fit.params, depth, threshold_fwhm),
        Err(err) if err.is_ill_posed() => FocalPlaneOutcome::Fallback {
            focal_plane: depth.saturating_sub(1) as f64 / 2.0,
        },
        Err(_) => FocalPlaneOutcome::NonConvergent,
    }
}

/// Peaks up to half a slice beyond the first or last slice still belong to it.
const EDGE_TOLERANCE: f64 = 0.5;

fn classify(params: &Gaussian, depth: usize, threshold_fwhm: f64) -> FocalPlaneOutcome {
    let focal_plane = params.mean;
    let fwhm = params.fwhm();
    let last = depth.saturating_sub(1) as f64;
    let inside = (-EDGE_TOLERANCE..=last + EDGE_TOLERANCE).contains(&focal_plane);
    if inside && fwhm <= threshold_fwhm {
        FocalPlaneOutcome::Reliable {
            focal_plane: focal_plane.clamp(0.0, last),
            fwhm,
        }
    } else {
        FocalPlaneOutcome::Unreliable { focal_plane, fwhm }
    }
}

/// Per-block estimates of a volume.
#[derive(Debug, Clone)]
pub struct BlockFocus<'a, T> {
    /// Focal plane of every block, NaN where no estimate survived.
    pub focal_plane_matrix: Array2<f64>,
    pub fwhm: Array2<f64>,
    pub outcomes: Array2<FocalPlaneOutcome>,
    pub blocks: BlockGrid<'a, T>,
}

impl<T> BlockFocus<'_, T> {
    /// Number of blocks with a [`FocalPlaneOutcome::Reliable`] estimate.
    pub fn reliable_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_reliable()).count()
    }
}

/// Estimates the focal plane of every block of the volume.
///
/// # Arguments
/// - `volume`: a `(z, y, x)` stack whose `yx` extent is a multiple of
///   `config.block_size_xy`.
/// - `config`: block size, fit threshold and iteration cap.
///
/// # Returns
/// - (*BlockFocus*): matrices of shape `(height / block, width / block)`.
pub fn calculate_focus_per_block<'a, T: Sample>(
    volume: &ArrayView3<'a, T>,
    config: &FocalPlaneConfig,
) -> Result<BlockFocus<'a, T>> {
    let abort_flag = AtomicBool::new(false);
    calculate_focus_per_block_cancellable(volume, config, &abort_flag)
}

/// Same as [`calculate_focus_per_block`], checking `abort_flag` between blocks.
///
/// # Errors
/// [`ProjectionError::Cancelled`] if the flag was raised before every block was
/// estimated.
pub fn calculate_focus_per_block_cancellable<'a, T: Sample>(
    volume: &ArrayView3<'a, T>,
    config: &FocalPlaneConfig,
    abort_flag: &AtomicBool,
) -> Result<BlockFocus<'a, T>> {
    config.validate()?;
    let blocks = BlockGrid::new(volume.clone(), config.block_size_xy)?;
    let (rows, cols) = blocks.shape();
    log::info!(
        "estimating focal planes on a {}x{} grid of {}px blocks, {} slices",
        rows,
        cols,
        blocks.block_size(),
        blocks.depth()
    );

    let indices = blocks.indices();
    let estimate = |(i, j): (usize, usize)| {
        find_focal_plane(
            &blocks.block(i, j),
            config.threshold_fwhm,
            config.max_fit_iterations,
        )
    };

    let outcomes = if config.parallel {
        par_map_cancellable(indices, abort_flag, &estimate)
    } else {
        let mut outcomes = Vec::with_capacity(rows * cols);
        let completed = for_each_cancellable(indices, abort_flag, |index| {
            outcomes.push(estimate(index))
        });
        completed.then_some(outcomes)
    };
    let Some(outcomes) = outcomes else {
        log::warn!("focal plane estimation cancelled");
        return Err(ProjectionError::Cancelled);
    };

    let n_outcomes = outcomes.len();
    let outcomes = Array2::from_shape_vec((rows, cols), outcomes).map_err(|_| {
        ProjectionError::ShapeMismatch {
            what: "block outcomes",
            expected: vec![rows * cols],
            got: vec![n_outcomes],
        }
    })?;

    for ((i, j), outcome) in outcomes.indexed_iter() {
        if !outcome.is_reliable() {
            log::debug!("block ({}, {}): {:?}", i, j, outcome);
        }
    }

    let block_focus = BlockFocus {
        focal_plane_matrix: outcomes.mapv(|o| o.focal_plane()),
        fwhm: outcomes.mapv(|o| o.fwhm()),
        outcomes,
        blocks,
    };
    log::debug!(
        "{} of {} blocks have a reliable focal plane",
        block_focus.reliable_count(),
        rows * cols
    );
    Ok(block_focus)
}
