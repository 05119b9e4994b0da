const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance at which the bus counts as arrived at the stop.
pub const DEFAULT_THRESHOLD_METERS: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance between two points in meters (haversine, spherical earth).
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Inclusive: a bus exactly on the threshold has arrived.
pub fn is_within_threshold(distance_meters: f64, threshold_meters: f64) -> bool {
    distance_meters <= threshold_meters
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityCheck {
    pub distance_meters: f64,
    pub threshold_meters: f64,
}

impl ProximityCheck {
    pub fn evaluate(stop: GeoPoint, bus: GeoPoint, threshold_meters: f64) -> Self {
        Self {
            distance_meters: distance(stop, bus),
            threshold_meters,
        }
    }

    pub fn arrived(&self) -> bool {
        is_within_threshold(self.distance_meters, self.threshold_meters)
    }
}
