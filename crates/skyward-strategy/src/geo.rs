//! Great-circle distance.

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in kilometres, via the
/// Haversine formula. Shared by both control planes so placement and
/// routing agree to the bit on identical inputs.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_coordinates_are_zero_distance() {
        assert_eq!(haversine_km(34.05, -118.24, 34.05, -118.24), 0.0);
        assert_eq!(haversine_km(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn antipodal_points_are_half_the_circumference() {
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_KM;
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - half_circumference).abs() / half_circumference < 0.001);

        let d = haversine_km(90.0, 0.0, -90.0, 0.0);
        assert!((d - half_circumference).abs() / half_circumference < 0.001);
    }

    #[test]
    fn los_angeles_to_new_york_is_roughly_3940_km() {
        let d = haversine_km(34.0522, -118.2437, 40.7128, -74.0060);
        assert!((3900.0..4000.0).contains(&d), "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let there = haversine_km(48.85, 2.35, 51.51, -0.13);
        let back = haversine_km(51.51, -0.13, 48.85, 2.35);
        assert!((there - back).abs() < 1e-9);
    }
}
