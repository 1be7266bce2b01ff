//! Great-circle distance between two coordinates.

use std::f64::consts::PI;

/// Mean Earth diameter in kilometres (2 × 6371).
const EARTH_DIAMETER_KM: f64 = 12742.0;

/// Distance in kilometres between `(lat1, lon1)` and `(lat2, lon2)`, in degrees.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p = PI / 180.0;
    let hav = 0.5 - ((lat2 - lat1) * p).cos() / 2.0
        + (lat1 * p).cos() * (lat2 * p).cos() * (1.0 - ((lon2 - lon1) * p).cos()) / 2.0;
    // Rounding can push `hav` a hair outside [0, 1] for (anti)coincident points.
    EARTH_DIAMETER_KM * hav.clamp(0.0, 1.0).sqrt().asin()
}
