//! Great-circle distance

use ha_config::DistanceUnit;

const STATUTE_MILES_PER_DEGREE: f64 = 60.0 * 1.1515;
const KILOMETERS_PER_MILE: f64 = 1.609344;
const NAUTICAL_MILES_PER_MILE: f64 = 0.8684;

/// Distance between two coordinates (degrees), spherical law of cosines
///
/// Identical points are exactly 0; otherwise the cosine term is clamped to
/// [-1, 1] before `acos`.
pub fn distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64, unit: DistanceUnit) -> f64 {
    if lat1 == lat2 && lng1 == lng2 {
        return 0.0;
    }

    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let theta = (lng1 - lng2).to_radians();

    let cosine = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * theta.cos();
    let miles = cosine.clamp(-1.0, 1.0).acos().to_degrees() * STATUTE_MILES_PER_DEGREE;

    match unit {
        DistanceUnit::Kilometers => miles * KILOMETERS_PER_MILE,
        DistanceUnit::Miles => miles,
        DistanceUnit::NauticalMiles => miles * NAUTICAL_MILES_PER_MILE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.01,
            "expected {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_same_point_is_zero() {
        for (lat, lng) in [(0.0, 0.0), (59.3293, 18.0686), (-33.86, 151.2), (1.0, 1.0)] {
            assert_eq!(distance(lat, lng, lat, lng, DistanceUnit::Kilometers), 0.0);
            assert_eq!(
                distance(lat, lng, lat, lng, DistanceUnit::NauticalMiles),
                0.0
            );
            assert_eq!(distance(lat, lng, lat, lng, DistanceUnit::Miles), 0.0);
        }
    }

    #[test]
    fn test_regression_fixtures() {
        assert_close(
            distance(1.0, 1.0, 2.0, 2.0, DistanceUnit::Kilometers),
            157.22,
        );
        assert_close(
            distance(1.0, 1.0, 2.0, 2.0, DistanceUnit::NauticalMiles),
            84.83,
        );
        assert_close(distance(1.0, 1.0, 2.0, 2.0, DistanceUnit::Miles), 97.69);
    }

    #[test]
    fn test_symmetric() {
        let a = distance(59.3, 18.0, 57.7, 11.9, DistanceUnit::Kilometers);
        let b = distance(57.7, 11.9, 59.3, 18.0, DistanceUnit::Kilometers);
        assert_close(a, b);
        assert!(a > 350.0 && a < 420.0);
    }

    #[test]
    fn test_nearby_points_stay_finite() {
        let d = distance(
            59.329300,
            18.068600,
            59.329301,
            18.068600,
            DistanceUnit::Kilometers,
        );
        assert!(d.is_finite());
        assert!(d < 0.01);
    }
}
