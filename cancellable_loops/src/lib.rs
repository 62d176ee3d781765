//! # cancellable_loops
//!
//! Cancellable loops over independent work items, sequential or parallel.
//!
//! Every item is checked against an abort flag before it is processed, so a long
//! batch (for example one curve fit per image block) can be stopped between items
//! without interrupting an item that is already running.
//!
//! ## Example
//!
//! ```
//! use std::sync::atomic::AtomicBool;
//! use cancellable_loops::par_map_cancellable;
//!
//! let abort_flag = AtomicBool::new(false);
//! let squares = par_map_cancellable(0..8usize, &abort_flag, |i| i * i);
//! assert_eq!(squares, Some(vec![0, 1, 4, 9, 16, 25, 36, 49]));
//! ```

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Executes a sequential loop that can be cancelled via an abort flag.
///
/// The flag is checked before each item. Returns `true` when every item was
/// processed and `false` when the loop stopped early.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use cancellable_loops::for_each_cancellable;
///
/// let abort_flag = AtomicBool::new(false);
/// let mut sum = 0;
///
/// let completed = for_each_cancellable(1..=10, &abort_flag, |i| {
///     sum += i;
///     if sum > 15 {
///         abort_flag.store(true, Ordering::Relaxed);
///     }
/// });
///
/// // 1 + 2 + 3 + 4 + 5 + 6 = 21 is the first sum above 15
/// assert!(!completed);
/// assert_eq!(sum, 21);
/// ```
pub fn for_each_cancellable<I, F, T>(iter: I, abort_flag: &AtomicBool, mut func: F) -> bool
where
    I: IntoIterator<Item = T>,
    F: FnMut(T),
{
    for item in iter {
        if abort_flag.load(Ordering::Relaxed) {
            return false;
        }
        func(item);
    }
    true
}

/// Maps every item in parallel and collects the results in input order.
///
/// Items whose turn comes after the abort flag was raised are skipped and the
/// whole map yields `None`. Items already running are allowed to finish.
///
/// # Arguments
///
/// * `iter` - Any parallel iterator to process
/// * `abort_flag` - An atomic boolean that can be set to `true` to cancel the map
/// * `func` - The per-item computation
///
/// # Examples
///
/// ```
/// use std::sync::atomic::AtomicBool;
/// use cancellable_loops::par_map_cancellable;
///
/// let abort_flag = AtomicBool::new(true);
/// let result = par_map_cancellable(0..100usize, &abort_flag, |i| i + 1);
/// assert_eq!(result, None);
/// ```
pub fn par_map_cancellable<I, F, R>(iter: I, abort_flag: &AtomicBool, func: F) -> Option<Vec<R>>
where
    I: IntoParallelIterator,
    I::Item: Send,
    F: Fn(I::Item) -> R + Sync + Send,
    R: Send,
{
    iter.into_par_iter()
        .map(|item| {
            if abort_flag.load(Ordering::Relaxed) {
                None
            } else {
                Some(func(item))
            }
        })
        .collect()
}
