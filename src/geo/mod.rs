use crate::models::location::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance on a spherical Earth. Ellipsoid error (up to ~0.5%)
/// is accepted.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * central_angle
}

/// NaN fails both range checks.
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

/// Conservative lat/lng rectangle enclosing a circle; used to skip the
/// trigonometry for points that cannot be within the radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn around(center: &GeoPoint, radius_km: f64) -> Self {
        let angular = radius_km / EARTH_RADIUS_KM;
        let delta_lat = angular.to_degrees();
        let min_lat = center.lat - delta_lat;
        let max_lat = center.lat + delta_lat;

        // A circle touching a pole spans every meridian.
        if min_lat <= -90.0 || max_lat >= 90.0 || angular >= std::f64::consts::FRAC_PI_2 {
            return Self {
                min_lat: min_lat.max(-90.0),
                max_lat: max_lat.min(90.0),
                min_lng: -180.0,
                max_lng: 180.0,
            };
        }

        let ratio = angular.sin() / center.lat.to_radians().cos();
        let delta_lng = if ratio >= 1.0 {
            180.0
        } else {
            ratio.asin().to_degrees()
        };

        Self {
            min_lat,
            max_lat,
            min_lng: center.lng - delta_lng,
            max_lng: center.lng + delta_lng,
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        if point.lat < self.min_lat || point.lat > self.max_lat {
            return false;
        }

        // Longitude bounds may extend past the antimeridian.
        [point.lng, point.lng + 360.0, point.lng - 360.0]
            .iter()
            .any(|lng| *lng >= self.min_lng && *lng <= self.max_lng)
    }
}
