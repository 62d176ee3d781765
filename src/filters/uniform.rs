use super::Border;
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};

/// Local mean over a `(height, width)` window around every pixel.
///
/// The window of odd size `n` is centred on the pixel; for an even size it spans
/// `n / 2` samples before and `n / 2 - 1` after. Borders are reflected
/// (`d c b a | a b c d`). The filter is separable: rows are smoothed first, then
/// columns.
///
/// # Arguments
/// - `image`: a 2D slice in `f64`.
/// - `size`: `(height, width)` of the window, both at least 1.
///
/// # Returns
/// - (*Array2<f64>*): the filtered slice, same shape as `image`.
pub fn uniform_filter(image: &ArrayView2<f64>, size: (usize, usize)) -> Array2<f64> {
    let (height, width) = size;
    let mut filtered = image.to_owned();
    for mut row in filtered.lanes_mut(Axis(1)) {
        smooth_lane(&mut row, width);
    }
    for mut column in filtered.lanes_mut(Axis(0)) {
        smooth_lane(&mut column, height);
    }
    filtered
}

fn smooth_lane(lane: &mut ArrayViewMut1<f64>, size: usize) {
    let n = lane.len();
    if size <= 1 || n == 0 {
        return;
    }
    let offset = (size / 2) as isize;

    // prefix sums over the reflected, extended lane
    let mut prefix = Vec::with_capacity(n + size);
    prefix.push(0.0);
    let mut acc = 0.0;
    for k in 0..(n + size - 1) {
        acc += lane[Border::Reflect.index(k as isize - offset, n)];
        prefix.push(acc);
    }

    let count = size as f64;
    for (i, value) in lane.iter_mut().enumerate() {
        *value = (prefix[i + size] - prefix[i]) / count;
    }
}
