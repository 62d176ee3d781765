//! Numeric sample types accepted as volume voxels.

use num_traits::{Bounded, NumCast, Zero};
use std::fmt::Debug;

/// A voxel type: any primitive integer or floating-point number.
///
/// Focus measures are always computed in `f64`; projections that need floating
/// arithmetic (median, mean) are cast back with [`Sample::from_f64`].
pub trait Sample:
    Copy + PartialOrd + NumCast + Zero + Bounded + Debug + Send + Sync + 'static
{
    /// Widens the sample to `f64`. Values that cannot be represented become NaN.
    fn as_f64(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }

    /// Narrows an `f64` back to the sample type.
    ///
    /// Integers are truncated toward zero and saturate at the type bounds.
    /// NaN becomes zero.
    fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self::zero();
        }
        <Self as NumCast>::from(value).unwrap_or_else(|| {
            if value > 0.0 {
                Self::max_value()
            } else {
                Self::min_value()
            }
        })
    }
}

impl<T> Sample for T where
    T: Copy + PartialOrd + NumCast + Zero + Bounded + Debug + Send + Sync + 'static
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_round_trip_truncates() {
        assert_eq!(u8::from_f64(12.7), 12);
        assert_eq!(i32::from_f64(-3.9), -3);
        assert_eq!(u16::from_f64(f64::NAN), 0);
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(u8::from_f64(-4.0), 0);
    }

    #[test]
    fn float_samples_widen_exactly() {
        assert_eq!(0.1f32.as_f64(), 0.1f32 as f64);
        assert_eq!(f64::from_f64(2.5), 2.5);
    }
}
