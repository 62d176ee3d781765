use super::Border;
use ndarray::{Array2, ArrayView2};

/// Applies the 4-connected Laplacian kernel
///
/// ```text
/// [ 0  1  0 ]
/// [ 1 -4  1 ]
/// [ 0  1  0 ]
/// ```
///
/// with whole-sample symmetric borders (`c b | a b c d | c b`).
pub fn laplacian(image: &ArrayView2<f64>) -> Array2<f64> {
    let (height, width) = image.dim();
    Array2::from_shape_fn((height, width), |(y, x)| {
        let up = Border::Reflect101.index(y as isize - 1, height);
        let down = Border::Reflect101.index(y as isize + 1, height);
        let left = Border::Reflect101.index(x as isize - 1, width);
        let right = Border::Reflect101.index(x as isize + 1, width);
        image[(up, x)] + image[(down, x)] + image[(y, left)] + image[(y, right)]
            - 4.0 * image[(y, x)]
    })
}

/// Population variance of the Laplacian of a slice.
///
/// Sharp slices carry more high-frequency content and score higher. An empty
/// slice scores 0.
pub fn laplacian_variance(image: &ArrayView2<f64>) -> f64 {
    if image.is_empty() {
        return 0.0;
    }
    let response = laplacian(image);
    let n = response.len() as f64;
    let mean = response.sum() / n;
    response.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn flat_slice_has_zero_variance() {
        let image = Array2::<f64>::from_elem((8, 8), 42.0);
        assert_eq!(laplacian_variance(&image.view()), 0.0);
    }

    #[test]
    fn linear_ramp_has_zero_laplacian_inside() {
        let image = Array2::from_shape_fn((5, 5), |(y, x)| (y + 2 * x) as f64);
        let response = laplacian(&image.view());
        assert_abs_diff_eq!(response[(2, 2)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn single_spike_response() {
        let image = array![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        let response = laplacian(&image.view());
        assert_abs_diff_eq!(response[(1, 1)], -4.0, epsilon = 1e-12);
        // corner: both reflected neighbours point back to the centre row/column
        assert_abs_diff_eq!(response[(0, 0)], 0.0, epsilon = 1e-12);
        // edge centre: up and down both map onto the spike
        assert_abs_diff_eq!(response[(0, 1)], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn sharper_slice_scores_higher() {
        let sharp = Array2::from_shape_fn((16, 16), |(y, x)| ((y + x) % 2) as f64 * 100.0);
        let soft = sharp.mapv(|v| 0.5 * v + 25.0);
        assert!(laplacian_variance(&sharp.view()) > laplacian_variance(&soft.view()));
    }
}
