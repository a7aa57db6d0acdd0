//! Window-smoothed speed estimation.
//!
//! Raw instantaneous GPS speed is noisy; averaging total haversine distance
//! over the trailing handful of fixes trades a little responsiveness for
//! stability.

use crate::geodesic;
use crate::Fix;

/// Default number of trailing fixes used for smoothing.
pub const DEFAULT_SPEED_WINDOW: usize = 5;

/// Smoothed speed over a trailing window of fixes, in m/s.
///
/// Total haversine distance across the window divided by elapsed wall-clock
/// time across it. Returns 0 for fewer than 2 fixes and clamps to 0 when
/// the time delta is zero or negative (duplicate timestamps).
///
/// # Example
/// ```
/// use livetrack::{speed, Fix};
///
/// let fixes = vec![
///     Fix::new(0.0, 10.0, 0),
///     Fix::new(0.0, 10.0009, 1000), // ~100 m in 1 s
/// ];
/// let ms = speed::current_speed_ms(&fixes);
/// assert!((ms - 100.0).abs() < 1.0);
/// ```
pub fn current_speed_ms(window: &[Fix]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }

    let first = &window[0];
    let last = &window[window.len() - 1];
    let elapsed_ms = last.timestamp_ms - first.timestamp_ms;
    if elapsed_ms <= 0 {
        return 0.0;
    }

    let distance_m = geodesic::path_distance_m(window);
    distance_m / (elapsed_ms as f64 / 1000.0)
}
