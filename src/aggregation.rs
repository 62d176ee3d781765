//! Global focal plane of a volume from its per-block estimates.

use crate::config::FocalPlaneConfig;
use crate::error::Result;
use crate::focal_plane::{calculate_focus_per_block_cancellable, BlockFocus};
use crate::math_tools::{mean, std_dev};
use crate::sample::Sample;
use ndarray::{s, ArrayView2, ArrayView3};
use std::ops::Range;
use std::sync::atomic::AtomicBool;

/// Iterative sigma clipping.
///
/// Repeatedly drops the values outside `[mean - low * std, mean + high * std]`
/// (population standard deviation of the current set) until no value is
/// removed. Bounds are inclusive.
pub fn sigma_clip(values: &[f64], low: f64, high: f64) -> Vec<f64> {
    let mut kept = values.to_vec();
    while !kept.is_empty() {
        let center = mean(&kept);
        let spread = std_dev(&kept);
        let (lower, upper) = (center - low * spread, center + high * spread);
        let before = kept.len();
        kept.retain(|&v| v >= lower && v <= upper);
        if kept.len() == before {
            break;
        }
    }
    kept
}

/// Depth slices to keep around the focal plane of a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZRange {
    pub focal_plane: usize,
    /// Half-open range of depth indices, always inside `0..depth`.
    pub depth_interval: Range<usize>,
    /// `false` when no block produced an estimate and the whole stack is used.
    pub estimated: bool,
}

impl ZRange {
    /// The slices of `volume` inside the depth interval.
    pub fn select<'a, T>(&self, volume: &ArrayView3<'a, T>) -> ArrayView3<'a, T> {
        volume
            .clone()
            .slice_move(s![self.depth_interval.clone(), .., ..])
    }
}

/// Aggregates the focal plane matrix into a single focal plane.
///
/// NaN entries are ignored, the rest is sigma clipped with `sigma` on both
/// sides and the focal plane is the truncated mean of the survivors. The depth
/// interval spans `window` slices on each side of it, clamped to the stack.
///
/// Without any surviving estimate, the focal plane is the middle slice and the
/// interval is the whole stack.
pub fn global_focal_plane(
    focal_plane_matrix: &ArrayView2<f64>,
    depth: usize,
    window: usize,
    sigma: f64,
) -> ZRange {
    let estimates: Vec<f64> = focal_plane_matrix
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    let kept = sigma_clip(&estimates, sigma, sigma);

    if kept.is_empty() {
        log::warn!(
            "no block produced a focal plane, using the full stack of {} slices",
            depth
        );
        return ZRange {
            focal_plane: depth / 2,
            depth_interval: 0..depth,
            estimated: false,
        };
    }

    let focal_plane = (mean(&kept).floor().max(0.0) as usize).min(depth.saturating_sub(1));
    let depth_interval = focal_plane.saturating_sub(window)..(focal_plane + window + 1).min(depth);
    log::info!(
        "focal plane {} from {} of {} blocks, keeping slices {:?}",
        focal_plane,
        kept.len(),
        focal_plane_matrix.len(),
        depth_interval
    );
    ZRange {
        focal_plane,
        depth_interval,
        estimated: true,
    }
}

/// Per-block estimates together with the global focal plane.
#[derive(Debug, Clone)]
pub struct FocalPlaneReport<'a, T> {
    pub block_focus: BlockFocus<'a, T>,
    pub z_range: ZRange,
}

/// Estimates the focal plane of every block, then of the whole volume.
pub fn reinterpolate_focal_plane<'a, T: Sample>(
    volume: &ArrayView3<'a, T>,
    config: &FocalPlaneConfig,
) -> Result<FocalPlaneReport<'a, T>> {
    let abort_flag = AtomicBool::new(false);
    reinterpolate_focal_plane_cancellable(volume, config, &abort_flag)
}

/// Same as [`reinterpolate_focal_plane`], checking `abort_flag` between blocks.
///
/// # Errors
/// [`crate::ProjectionError::Cancelled`] if the flag was raised before every block
/// was estimated.
pub fn reinterpolate_focal_plane_cancellable<'a, T: Sample>(
    volume: &ArrayView3<'a, T>,
    config: &FocalPlaneConfig,
    abort_flag: &AtomicBool,
) -> Result<FocalPlaneReport<'a, T>> {
    let block_focus = calculate_focus_per_block_cancellable(volume, config, abort_flag)?;
    let z_range = global_focal_plane(
        &block_focus.focal_plane_matrix.view(),
        block_focus.blocks.depth(),
        config.window,
        config.sigma_clip,
    );
    Ok(FocalPlaneReport {
        block_focus,
        z_range,
    })
}
