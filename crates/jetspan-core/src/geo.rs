// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Great-circle helpers shared by the graph, router, index and assignment code.

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two lat/lon pairs (degrees).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Initial bearing in degrees (0..360, clockwise from true north) when
/// travelling from the first point towards the second along the great circle.
pub fn initial_bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Straight-line ground estimate used whenever no routed ground time exists.
pub fn estimate_ground_minutes(distance_km: f64, speed_kmh: f64) -> u32 {
    (distance_km / speed_kmh * 60.0).round() as u32
}

/// True when the pair is a valid WGS84 coordinate.
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_pairs() {
        // LHR -> CDG is roughly 350 km
        let d = haversine_km(51.470, -0.461, 49.009, 2.548);
        assert!((d - 347.0).abs() < 10.0, "got {}", d);

        // JFK -> LAX is roughly 3980 km
        let d = haversine_km(40.641, -73.778, 33.942, -118.408);
        assert!((d - 3975.0).abs() < 30.0, "got {}", d);
    }

    #[test]
    fn test_haversine_zero_and_symmetry() {
        assert_eq!(haversine_km(10.0, 20.0, 10.0, 20.0), 0.0);
        let ab = haversine_km(51.0, -2.0, -33.9, 151.2);
        let ba = haversine_km(-33.9, 151.2, 51.0, -2.0);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert!((initial_bearing_deg(0.0, 0.0, 10.0, 0.0) - 0.0).abs() < 1e-6);
        assert!((initial_bearing_deg(0.0, 0.0, 0.0, 10.0) - 90.0).abs() < 1e-6);
        assert!((initial_bearing_deg(10.0, 0.0, 0.0, 0.0) - 180.0).abs() < 1e-6);
        assert!((initial_bearing_deg(0.0, 10.0, 0.0, 0.0) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_ground_estimate_rounds() {
        assert_eq!(estimate_ground_minutes(80.0, 40.0), 120);
        assert_eq!(estimate_ground_minutes(10.0, 60.0), 10);
        assert_eq!(estimate_ground_minutes(0.0, 40.0), 0);
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(is_valid_coordinate(51.4, -2.5));
        assert!(!is_valid_coordinate(91.0, 0.0));
        assert!(!is_valid_coordinate(0.0, -181.0));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
    }
}
