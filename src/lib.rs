//! # stack-focus
//!
//! Projection of `(z, y, x)` microscopy stacks into a single in-focus image.
//!
//! Two pipelines are provided:
//!
//! * **Pixel path**: [`focus_projection`] scores every voxel with a local focus
//!   measure, keeps the best focused slices and fuses the sharpest few at every
//!   pixel.
//! * **Block path**: [`focal_plane_projection`] cuts the stack into square blocks,
//!   fits a Gaussian to the Laplacian variance profile of each block, aggregates
//!   the estimates into a global focal plane and reassembles the image from the
//!   focal slice of every block.
//!
//! ```
//! use ndarray::Array3;
//! use stack_focus::{focal_plane_projection, FocalPlaneConfig};
//!
//! let volume = Array3::<u16>::from_shape_fn((8, 32, 32), |(z, y, x)| {
//!     ((x + y) % 4) as u16 * (1 + z as u16)
//! });
//! let config = FocalPlaneConfig {
//!     block_size_xy: 16,
//!     ..Default::default()
//! };
//! let image = focal_plane_projection(&volume.view(), &config).unwrap();
//! assert_eq!(image.dim(), (32, 32));
//! ```

pub mod aggregation;
pub mod config;
pub mod curve_fit;
pub mod error;
pub mod filters;
pub mod focal_plane;
pub mod focus;
pub mod math_tools;
pub mod projection;
pub mod reassembly;
pub mod sample;
pub mod selection;
mod validation;

pub use aggregation::{
    global_focal_plane, reinterpolate_focal_plane, reinterpolate_focal_plane_cancellable,
    sigma_clip, FocalPlaneReport, ZRange,
};
pub use config::{FocalPlaneConfig, FocusProjectionConfig};
pub use error::{ProjectionError, Result};
pub use focal_plane::{
    calculate_focus_per_block, calculate_focus_per_block_cancellable, find_focal_plane, BlockFocus,
    BlockGrid, FocalPlaneOutcome,
};
pub use focus::{compute_focus, NeighborhoodSize};
pub use projection::{focus_projection, maximum_projection, ProjectionMethod};
pub use reassembly::{
    dominant_focal_plane, focal_plane_projection, focal_plane_projection_cancellable,
    reassemble_images,
};
pub use sample::Sample;
pub use selection::{get_in_focus_indices, in_focus_selection, Proportion};
