//! Spatial filters applied slice by slice to a volume.
//!
//! # Filter Implementations
//!
//! * **Uniform filter**: separable box mean used by the focus metric to estimate
//!   the local mean intensity around every pixel.
//!
//! * **Laplacian**: 3x3 second-derivative kernel whose variance over a slice is the
//!   sharpness score of that slice in the block-wise focal plane estimation.
//!
//! All filters work on `f64` views and return owned `f64` arrays of the input shape.

/// Discrete 3x3 Laplacian and the Laplacian variance sharpness score.
pub mod laplacian;

/// Separable box (mean) filter with reflected borders.
pub mod uniform;

/// How indices outside `[0, n)` are mapped back into a line of length `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    /// Half-sample symmetric: `d c b a | a b c d | d c b a`
    Reflect,
    /// Whole-sample symmetric, the edge is not repeated: `d c b | a b c d | c b a`
    Reflect101,
}

impl Border {
    /// Maps a possibly out-of-range index onto `[0, n)`. `n` must be positive.
    pub fn index(self, i: isize, n: usize) -> usize {
        match self {
            Border::Reflect => {
                let period = 2 * n as isize;
                let m = i.rem_euclid(period);
                if m < n as isize {
                    m as usize
                } else {
                    (period - 1 - m) as usize
                }
            }
            Border::Reflect101 => {
                if n == 1 {
                    return 0;
                }
                let period = 2 * (n as isize - 1);
                let m = i.rem_euclid(period);
                if m < n as isize {
                    m as usize
                } else {
                    (period - m) as usize
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_repeats_the_edge_sample() {
        let mapped: Vec<usize> = (-3..7).map(|i| Border::Reflect.index(i, 4)).collect();
        assert_eq!(mapped, vec![2, 1, 0, 0, 1, 2, 3, 3, 2, 1]);
    }

    #[test]
    fn reflect_101_skips_the_edge_sample() {
        let mapped: Vec<usize> = (-3..7).map(|i| Border::Reflect101.index(i, 4)).collect();
        assert_eq!(mapped, vec![3, 2, 1, 0, 1, 2, 3, 2, 1, 0]);
        assert_eq!(Border::Reflect101.index(-1, 1), 0);
        assert_eq!(Border::Reflect.index(5, 1), 0);
    }
}
