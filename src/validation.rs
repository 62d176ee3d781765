//! Shape checks run at the entry of every public routine.
//!
//! Rank and sample type are enforced by the signatures (`ArrayView3<T>` with
//! `T: Sample`); what remains are the runtime shape constraints.

use crate::error::{ProjectionError, Result};
use ndarray::ArrayView3;

/// Fails if any axis of the `(z, y, x)` volume is empty.
pub fn check_volume<T>(volume: &ArrayView3<T>) -> Result<()> {
    let (z, y, x) = volume.dim();
    if z == 0 || y == 0 || x == 0 {
        return Err(ProjectionError::EmptyVolume { shape: [z, y, x] });
    }
    Ok(())
}

/// Returns the `(rows, cols)` block grid for a `height x width` field.
///
/// The block edge must be positive and divide both spatial dimensions exactly;
/// partial blocks are never produced.
pub fn check_block_size(height: usize, width: usize, block_size: usize) -> Result<(usize, usize)> {
    if block_size == 0 || height % block_size != 0 || width % block_size != 0 {
        return Err(ProjectionError::InvalidBlockSize {
            block_size,
            height,
            width,
        });
    }
    Ok((height / block_size, width / block_size))
}

/// Fails unless both shapes are identical.
pub fn check_same_shape(what: &'static str, expected: &[usize], got: &[usize]) -> Result<()> {
    if expected != got {
        return Err(ProjectionError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn empty_axis_is_rejected() {
        let volume = Array3::<u8>::zeros((0, 4, 4));
        assert_eq!(
            check_volume(&volume.view()),
            Err(ProjectionError::EmptyVolume { shape: [0, 4, 4] })
        );
        assert!(check_volume(&Array3::<u8>::zeros((1, 1, 1)).view()).is_ok());
    }

    #[test]
    fn block_size_must_divide_both_axes() {
        assert_eq!(check_block_size(512, 256, 128), Ok((4, 2)));
        assert!(check_block_size(512, 250, 128).is_err());
        assert!(check_block_size(512, 512, 0).is_err());
    }
}
