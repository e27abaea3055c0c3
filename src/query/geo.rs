//! Great-circle distance on a spherical Earth.

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two lat/lon points given in degrees
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Clamp guards against a > 1 from rounding on antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Latitude band (degrees) that contains every point within `radius_km` of `lat`.
///
/// Great-circle distance is never shorter than the meridian distance, so
/// points outside the band are always farther than `radius_km`.
pub fn latitude_band(lat: f64, radius_km: f64) -> (f64, f64) {
    let delta = (radius_km / EARTH_RADIUS_KM).to_degrees();
    // Widen slightly so rounding never excludes a point on the boundary
    let delta = delta + 1e-9;
    ((lat - delta).max(-90.0), (lat + delta).min(90.0))
}
