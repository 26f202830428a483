use chrono::{NaiveTime, Timelike};

use crate::models::stop::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn time_to_minutes(t: NaiveTime) -> f64 {
    f64::from(t.hour() * 60 + t.minute()) + f64::from(t.second()) / 60.0
}

/// Renders minutes-since-midnight as "HH:MM". Hours are not wrapped at
/// midnight, so a schedule running past 24:00 stays monotone in the output.
pub fn minutes_to_clock(minutes: f64) -> String {
    let total = minutes.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
