use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub depot_id: i64,
    pub capacity_kg: f64,
    pub driver_name: String,
}
