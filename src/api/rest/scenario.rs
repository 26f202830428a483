use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::scenario::{generate_scenario, ScenarioParams, ScenarioSeed};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scenario/start", post(start_scenario))
        .route("/scenario/inject-traffic", post(inject_traffic))
}

/// Seeds a demo scenario and returns ids ready for `/routes/optimize`.
async fn start_scenario(
    State(state): State<Arc<AppState>>,
    Json(params): Json<ScenarioParams>,
) -> Result<Json<ScenarioSeed>, AppError> {
    if params.num_stops == 0 || params.num_vehicles == 0 {
        return Err(AppError::BadRequest(
            "num_stops and num_vehicles must be > 0".to_string(),
        ));
    }

    Ok(Json(generate_scenario(&state, &params)))
}

#[derive(Deserialize)]
pub struct TrafficInjectRequest {
    pub route_id: i64,
    #[serde(default = "default_delay_factor")]
    pub delay_factor: f64,
}

fn default_delay_factor() -> f64 {
    1.5
}

/// Builds a synthetic traffic event payload for the demo frontend to feed
/// into `POST /routes/{route_id}/reroute`.
async fn inject_traffic(Json(req): Json<TrafficInjectRequest>) -> Json<Value> {
    Json(json!({
        "route_id": req.route_id,
        "delay_factor": req.delay_factor,
        "event": "traffic_injected",
    }))
}
