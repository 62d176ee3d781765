//! Error type shared by every projection and focal-plane routine.
//!
//! Only caller mistakes are errors. Numerical degeneracy inside a block (flat
//! focus curve, failed or unreliable fit) is reported as data, see
//! [`crate::focal_plane::FocalPlaneOutcome`].

use thiserror::Error;

/// Errors produced by the projection pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// One of the volume axes has zero length.
    #[error("volume must not be empty, got shape {shape:?}")]
    EmptyVolume { shape: [usize; 3] },

    /// The neighborhood used by the focus metric has a zero extent.
    #[error("neighborhood size must be positive, got {height}x{width}")]
    InvalidNeighborhood { height: usize, width: usize },

    /// A fractional proportion outside `[0, 1]` (or NaN).
    #[error("proportion should be a fraction between 0 and 1 or a slice count, not {0}")]
    InvalidProportion(f64),

    /// A pixel fusion method other than `median` or `max`.
    #[error("method should be 'median' or 'max', not '{0}'")]
    InvalidMethod(String),

    /// The block edge is zero or does not divide the spatial extent.
    #[error(
        "block size {block_size} must be positive and divide the spatial shape {height}x{width}"
    )]
    InvalidBlockSize {
        block_size: usize,
        height: usize,
        width: usize,
    },

    /// Two arrays that must agree in shape do not.
    #[error("shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Slice selection kept no slice at all.
    #[error("slice selection kept no slices out of {depth}")]
    NoSlicesSelected { depth: usize },

    /// A configuration value is out of its valid range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The abort flag was raised before all blocks were processed.
    #[error("focal plane estimation was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ProjectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProjectionError::InvalidMethod("mean".to_string());
        assert!(err.to_string().contains("'mean'"));

        let err = ProjectionError::InvalidBlockSize {
            block_size: 100,
            height: 256,
            width: 256,
        };
        assert!(err.to_string().contains("block size 100"));
    }
}
