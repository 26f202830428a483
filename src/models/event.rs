use serde::{Deserialize, Serialize};

/// Scales travel time on one undirected edge of a route's tour.
/// Edge endpoints are stop ids; `0` denotes the depot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrafficEvent {
    pub edge: [i64; 2],
    pub delay_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReroutedStop {
    pub stop_id: i64,
    pub sequence: u32,
    pub planned_arrival: String,
    pub planned_arrival_min: f64,
    pub lat: f64,
    pub lng: f64,
    pub late: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RouteEvent {
    Rerouted {
        route_id: i64,
        stops: Vec<ReroutedStop>,
    },
}
