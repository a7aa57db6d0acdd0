//! Pure geodesic math: haversine distance, bearing, and path length.
//!
//! All functions are total over geometrically valid fixes, have no side
//! effects, and allocate nothing.

use crate::Fix;

/// Mean Earth radius in kilometers used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two fixes in kilometers.
///
/// Symmetric, and exactly zero when both fixes share identical coordinates.
///
/// # Example
/// ```
/// use livetrack::{geodesic, Fix};
///
/// let london = Fix::new(51.5074, -0.1278, 0);
/// let paris = Fix::new(48.8566, 2.3522, 0);
/// let km = geodesic::distance_km(&london, &paris);
/// assert!((km - 343.5).abs() < 2.0);
/// ```
pub fn distance_km(a: &Fix, b: &Fix) -> f64 {
    if a.latitude == b.latitude && a.longitude == b.longitude {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Great-circle distance between two fixes in meters.
pub fn haversine_m(a: &Fix, b: &Fix) -> f64 {
    distance_km(a, b) * 1000.0
}

/// Initial bearing from `a` to `b` in degrees clockwise from north, [0, 360).
pub fn initial_bearing_deg(a: &Fix, b: &Fix) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Total path length over a sequence of fixes, in meters.
pub fn path_distance_m(fixes: &[Fix]) -> f64 {
    fixes.windows(2).map(|w| haversine_m(&w[0], &w[1])).sum()
}
