//! Great-circle distance between two coordinates.

/// Position jumps beyond this distance invalidate the cached weather data.
pub const WEATHER_INVALIDATION_DISTANCE_KM: f64 = 10.0;

/// Law-of-cosines great-circle distance, degrees in, kilometers out.
///
/// Uses the nautical-mile based constant `60 * 1.853159616`; stored
/// thresholds were calibrated against it, so it must not be replaced with a
/// different earth radius.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }
    let theta = lon1 - lon2;
    let mut dist = lat1.to_radians().sin() * lat2.to_radians().sin()
        + lat1.to_radians().cos() * lat2.to_radians().cos() * theta.to_radians().cos();
    dist = dist.acos().to_degrees();
    dist * 60.0 * 1.853159616
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coincident_points_are_zero() {
        assert_eq!(distance_km(52.0, 21.0, 52.0, 21.0), 0.0);
        assert_eq!(distance_km(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(distance_km(-33.9, 151.2, -33.9, 151.2), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let a = distance_km(52.2297, 21.0122, 50.0647, 19.9450);
        let b = distance_km(50.0647, 19.9450, 52.2297, 21.0122);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // One degree of latitude equals 60 nautical miles by construction.
        let d = distance_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 60.0 * 1.853159616).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn test_warsaw_to_krakow() {
        // Roughly 252 km apart.
        let d = distance_km(52.2297, 21.0122, 50.0647, 19.9450);
        assert!((248.0..258.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_invalidation_threshold() {
        // 0.135 degrees of latitude is about 15 km; 0.05 about 5.6 km.
        let far = distance_km(52.0, 21.0, 52.135, 21.0);
        let near = distance_km(52.0, 21.0, 52.05, 21.0);
        assert!(far > WEATHER_INVALIDATION_DISTANCE_KM, "got {far}");
        assert!(near < WEATHER_INVALIDATION_DISTANCE_KM, "got {near}");
    }
}
