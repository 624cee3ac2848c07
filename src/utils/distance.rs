// Geometric travel estimates used when no routing answer is available

use crate::models::{GeoPoint, Kilometers, Minutes};

/// Nominal courier speed used to turn a straight-line distance into a time
pub const NOMINAL_SPEED_KMH: f64 = 50.0;

/// Straight-line distance between two points
pub fn crow_flies_distance(from: &GeoPoint, to: &GeoPoint) -> Kilometers {
    from.haversine_km(to)
}

/// Straight-line travel time at the given speed
pub fn crow_flies_time(from: &GeoPoint, to: &GeoPoint, speed_kmh: f64) -> Minutes {
    crow_flies_distance(from, to) / speed_kmh * 60.0
}
