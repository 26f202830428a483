use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::models::stop::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depot {
    pub id: i64,
    pub name: String,
    pub location: GeoPoint,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}
