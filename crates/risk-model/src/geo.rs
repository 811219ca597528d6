//! Geodesic helpers shared across the engine.
//!
//! The spatial index works in cheap rectangular degree space; consumers
//! always refine with the true great-circle distance computed here.

/// Mean Earth radius (meters), used for great-circle distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude, used for rough degree/meter conversion.
/// Deliberately coarse; consumers pad windows with it, never measure.
pub const METERS_PER_DEG_LAT: f64 = 111_000.0;

/// Clamp a value to [0, 1].
pub fn clamp01(v: f64) -> f64 {
    if v < 0.0 {
        0.0
    } else if v > 1.0 {
        1.0
    } else {
        v
    }
}

/// Great-circle distance between two WGS84 coordinates (meters).
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Convert a metric distance to degrees of latitude.
pub fn meters_to_deg_lat(m: f64) -> f64 {
    m / METERS_PER_DEG_LAT
}

/// Convert a metric distance to degrees of longitude at a given latitude.
pub fn meters_to_deg_lng(m: f64, at_lat: f64) -> f64 {
    m / (METERS_PER_DEG_LAT * at_lat.to_radians().cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        assert_eq!(haversine_m(51.5, -0.1, 51.5, -0.1), 0.0);
    }

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude is ~111.2 km
        let d = haversine_m(51.0, 0.0, 52.0, 0.0);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn test_haversine_symmetry() {
        let a = haversine_m(51.5154, -0.1410, 51.5390, -0.1426);
        let b = haversine_m(51.5390, -0.1426, 51.5154, -0.1410);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_deg_conversions_roundtrip() {
        let lat_deg = meters_to_deg_lat(250.0);
        assert!((lat_deg * METERS_PER_DEG_LAT - 250.0).abs() < 1e-9);

        // Longitude degrees get wider toward the poles
        assert!(meters_to_deg_lng(250.0, 51.5) > lat_deg);
    }

    #[test]
    fn test_padding_conversion_never_understates_distance() {
        // Windows padded via the coarse constant must cover at least the
        // nominal metric distance, and not by much more.
        let d = haversine_m(51.0, 0.0, 51.0 + meters_to_deg_lat(1000.0), 0.0);
        assert!(d >= 1000.0, "got {d}");
        assert!(d < 1005.0, "got {d}");
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(0.5), 0.5);
        assert_eq!(clamp01(1.5), 1.0);
    }
}
