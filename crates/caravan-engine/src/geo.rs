//! Geographic proximity. The threshold is a tunable, not a contract;
//! callers carry it in [`GeoParams`] rather than reading a constant.

use caravan_types::models::Location;

pub const DEFAULT_NEAR_DISTANCE_KM: f64 = 100.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy)]
pub struct GeoParams {
    pub near_distance_km: f64,
}

impl Default for GeoParams {
    fn default() -> Self {
        Self {
            near_distance_km: DEFAULT_NEAR_DISTANCE_KM,
        }
    }
}

/// Great-circle distance between two coordinate pairs, in kilometers.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Whether two locations are near enough under the configured threshold.
/// Symmetric. A location with unresolved coordinates is never near
/// anything.
pub fn is_near(a: &Location, b: &Location, params: GeoParams) -> bool {
    match (a.latitude, a.longitude, b.latitude, b.longitude) {
        (Some(lat1), Some(lon1), Some(lat2), Some(lon2)) => {
            distance_km(lat1, lon1, lat2, lon2) <= params.near_distance_km
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(lat: f64, lon: f64) -> Location {
        Location::new("somewhere", lat, lon)
    }

    #[test]
    fn test_distance_known_pair() {
        // Nairobi to Mombasa is roughly 440 km
        let d = distance_km(-1.2921, 36.8219, -4.0435, 39.6682);
        assert!((430.0..460.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_is_near_threshold() {
        let nairobi = loc(-1.2921, 36.8219);
        let thika = loc(-1.0333, 37.0693); // ~40 km away
        let mombasa = loc(-4.0435, 39.6682);

        let params = GeoParams {
            near_distance_km: 100.0,
        };
        assert!(is_near(&nairobi, &thika, params));
        assert!(is_near(&thika, &nairobi, params)); // symmetric
        assert!(!is_near(&nairobi, &mombasa, params));

        // Tighter threshold excludes the nearby town too
        let tight = GeoParams {
            near_distance_km: 10.0,
        };
        assert!(!is_near(&nairobi, &thika, tight));
    }

    #[test]
    fn test_unresolved_coordinates_never_near() {
        let resolved = loc(-1.2921, 36.8219);
        let unresolved = Location {
            description: "somewhere vague".into(),
            country: None,
            latitude: None,
            longitude: None,
        };
        let params = GeoParams::default();
        assert!(!is_near(&resolved, &unresolved, params));
        assert!(!is_near(&unresolved, &resolved, params));
    }
}
