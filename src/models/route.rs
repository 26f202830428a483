use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: i64,
    pub vehicle_id: i64,
    pub date: NaiveDate,
    pub total_distance_km: f64,
    pub total_time_min: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub stop_id: i64,
    pub sequence: u32,
    /// "HH:MM" wall-clock rendering of the planned arrival.
    pub planned_arrival: String,
    /// Minutes from depot open.
    pub planned_arrival_min: f64,
}
