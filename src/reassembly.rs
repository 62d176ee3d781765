//! Composite image from per-block focal planes.
//!
//! Each block contributes the slice (or a small maximum projection around the
//! slice) at its own focal plane. Blocks whose estimate strays more than one
//! slice from the most common plane are snapped back to it, which keeps
//! neighbouring tiles consistent.

use crate::aggregation::reinterpolate_focal_plane_cancellable;
use crate::config::FocalPlaneConfig;
use crate::error::Result;
use crate::focal_plane::BlockGrid;
use crate::math_tools::half_window;
use crate::projection::maximum_projection;
use crate::sample::Sample;
use crate::validation::check_same_shape;
use ndarray::{s, Array2, ArrayView2, ArrayView3, Axis};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

/// Most common truncated focal plane among the blocks with an estimate.
///
/// Ties go to the shallowest plane. Without any estimate the middle slice,
/// `depth / 2`, is returned.
pub fn dominant_focal_plane(focal_plane_matrix: &ArrayView2<f64>, depth: usize) -> usize {
    let mut votes = BTreeMap::<usize, usize>::new();
    for &estimate in focal_plane_matrix.iter().filter(|v| v.is_finite()) {
        *votes.entry(estimate.max(0.0) as usize).or_default() += 1;
    }
    match votes.iter().rev().max_by_key(|&(_, count)| *count) {
        Some((&plane, _)) => plane.min(depth.saturating_sub(1)),
        None => {
            log::warn!("no block has a focal plane, reassembling at slice {}", depth / 2);
            depth / 2
        }
    }
}

fn block_plane(estimate: f64, dominant: usize, depth: usize) -> usize {
    let plane = if estimate.is_finite() {
        estimate.max(0.0) as usize
    } else {
        dominant
    };
    let plane = if plane.abs_diff(dominant) > 1 {
        dominant
    } else {
        plane
    };
    plane.min(depth.saturating_sub(1))
}

/// Reassembles a 2D image from the blocks of a volume.
///
/// # Arguments
/// - `focal_plane_matrix`: one estimate per block, NaN allowed.
/// - `blocks`: the block view of the volume the matrix was computed on.
/// - `window`: `0` copies the focal slice of every block; otherwise the
///   maximum projection over `round(window / 2)` slices on both sides of it.
///
/// # Returns
/// - (*Array2<T>*): image with the spatial shape of the volume.
///
/// # Errors
/// [`crate::ProjectionError::ShapeMismatch`] if the matrix does not match the grid.
pub fn reassemble_images<T: Sample>(
    focal_plane_matrix: &ArrayView2<f64>,
    blocks: &BlockGrid<'_, T>,
    window: usize,
) -> Result<Array2<T>> {
    let (rows, cols) = blocks.shape();
    check_same_shape("focal plane matrix", &[rows, cols], focal_plane_matrix.shape())?;

    let depth = blocks.depth();
    let b = blocks.block_size();
    let dominant = dominant_focal_plane(focal_plane_matrix, depth);
    let half = half_window(window);
    log::debug!(
        "reassembling {}x{} blocks around dominant plane {} with window {}",
        rows,
        cols,
        dominant,
        window
    );

    let mut output = Array2::<T>::zeros((rows * b, cols * b));
    for ((i, j), &estimate) in focal_plane_matrix.indexed_iter() {
        let plane = block_plane(estimate, dominant, depth);
        let block = blocks.block(i, j);
        let mut tile = output.slice_mut(s![i * b..(i + 1) * b, j * b..(j + 1) * b]);
        if window == 0 {
            tile.assign(&block.index_axis(Axis(0), plane));
        } else {
            let lower = plane.saturating_sub(half);
            let upper = (plane + half).min(depth - 1);
            tile.assign(&maximum_projection(&block.slice(s![lower..=upper, .., ..]))?);
        }
    }
    Ok(output)
}

/// Block-wise focal plane projection of a volume.
///
/// Estimates the focal plane of every block, aggregates them, then reassembles
/// the image with `config.reassembly_window`.
pub fn focal_plane_projection<T: Sample>(
    volume: &ArrayView3<T>,
    config: &FocalPlaneConfig,
) -> Result<Array2<T>> {
    let abort_flag = AtomicBool::new(false);
    focal_plane_projection_cancellable(volume, config, &abort_flag)
}

/// Same as [`focal_plane_projection`], checking `abort_flag` between blocks.
///
/// # Errors
/// [`crate::ProjectionError::Cancelled`] if the flag was raised during the block
/// estimation.
pub fn focal_plane_projection_cancellable<T: Sample>(
    volume: &ArrayView3<T>,
    config: &FocalPlaneConfig,
    abort_flag: &AtomicBool,
) -> Result<Array2<T>> {
    let report = reinterpolate_focal_plane_cancellable(volume, config, abort_flag)?;
    reassemble_images(
        &report.block_focus.focal_plane_matrix.view(),
        &report.block_focus.blocks,
        config.reassembly_window,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProjectionError;
    use crate::focal_plane::tests::gaussian_block;
    use ndarray::{array, Array3};

    fn depth_coded_volume(depth: usize, size: usize) -> Array3<u16> {
        Array3::from_shape_fn((depth, size, size), |(z, y, x)| {
            (z * 1000 + y * size + x) as u16
        })
    }

    #[test]
    fn uniform_matrix_reproduces_the_slice() {
        let volume = depth_coded_volume(6, 16);
        let blocks = BlockGrid::new(volume.view(), 8).unwrap();
        let matrix = Array2::from_elem((2, 2), 3.0);
        let image = reassemble_images(&matrix.view(), &blocks, 0).unwrap();
        assert_eq!(image, volume.index_axis(Axis(0), 3));
    }

    #[test]
    fn outliers_snap_to_the_dominant_plane() {
        let volume = depth_coded_volume(8, 8);
        let blocks = BlockGrid::new(volume.view(), 4).unwrap();
        let matrix = array![[2.7, 3.2], [2.1, 6.0]];
        let image = reassemble_images(&matrix.view(), &blocks, 0).unwrap();
        assert_eq!(image[(0, 0)], volume[(2, 0, 0)]);
        assert_eq!(image[(0, 4)], volume[(3, 0, 4)]);
        assert_eq!(image[(4, 0)], volume[(2, 4, 0)]);
        assert_eq!(image[(4, 4)], volume[(2, 4, 4)]);

        let matrix = array![[5.0, f64::NAN], [5.0, 4.0]];
        let image = reassemble_images(&matrix.view(), &blocks, 0).unwrap();
        assert_eq!(image[(0, 4)], volume[(5, 0, 4)]);
        assert_eq!(image[(4, 4)], volume[(4, 4, 4)]);
    }

    #[test]
    fn ties_go_to_the_shallowest_plane() {
        let matrix = array![[4.0, 1.5], [1.0, 4.9]];
        assert_eq!(dominant_focal_plane(&matrix.view(), 10), 1);

        let matrix = Array2::<f64>::from_elem((2, 2), f64::NAN);
        assert_eq!(dominant_focal_plane(&matrix.view(), 10), 5);
    }

    #[test]
    fn window_projects_neighbouring_slices() {
        let volume = depth_coded_volume(8, 4);
        let blocks = BlockGrid::new(volume.view(), 4).unwrap();

        // round(3 / 2) = 2 slices on each side
        let image = reassemble_images(&array![[3.0]].view(), &blocks, 3).unwrap();
        assert_eq!(image, volume.index_axis(Axis(0), 5));

        // clamped at the bottom of the stack
        let image = reassemble_images(&array![[7.0]].view(), &blocks, 3).unwrap();
        assert_eq!(image, volume.index_axis(Axis(0), 7));

        // round(1 / 2) = 0, same as copying the slice
        let image = reassemble_images(&array![[2.0]].view(), &blocks, 1).unwrap();
        assert_eq!(image, volume.index_axis(Axis(0), 2));
    }

    #[test]
    fn matrix_must_match_the_grid() {
        let volume = depth_coded_volume(4, 8);
        let blocks = BlockGrid::new(volume.view(), 4).unwrap();
        let matrix = Array2::from_elem((1, 2), 1.0);
        assert_eq!(
            reassemble_images(&matrix.view(), &blocks, 0),
            Err(ProjectionError::ShapeMismatch {
                what: "focal plane matrix",
                expected: vec![2, 2],
                got: vec![1, 2],
            })
        );
    }

    #[test]
    fn raised_flag_cancels_the_projection() {
        let volume = gaussian_block(6, 8, 2.0, 1.0);
        let config = FocalPlaneConfig {
            block_size_xy: 4,
            ..Default::default()
        };
        let abort_flag = AtomicBool::new(true);
        assert_eq!(
            focal_plane_projection_cancellable(&volume.view(), &config, &abort_flag),
            Err(ProjectionError::Cancelled)
        );
    }

    #[test]
    fn projection_picks_the_sharp_slice_of_every_block() {
        let (depth, size) = (12, 8);
        let block = gaussian_block(depth, size, 5.4, 1.3);
        let mut volume = Array3::<f64>::zeros((depth, 2 * size, 2 * size));
        for i in 0..2 {
            for j in 0..2 {
                volume
                    .slice_mut(s![.., i * size..(i + 1) * size, j * size..(j + 1) * size])
                    .assign(&block);
            }
        }
        let config = FocalPlaneConfig {
            block_size_xy: size,
            ..Default::default()
        };
        let image = focal_plane_projection(&volume.view(), &config).unwrap();
        assert_eq!(image, volume.index_axis(Axis(0), 5));
    }
}
