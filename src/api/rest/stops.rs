use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::NaiveTime;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::stop::{GeoPoint, Stop, StopStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stops", post(create_stop).get(list_stops))
        .route("/stops/:id", get(get_stop))
}

#[derive(Deserialize)]
pub struct CreateStopRequest {
    #[serde(default)]
    pub address: Option<String>,
    pub location: GeoPoint,
    pub earliest_time: NaiveTime,
    pub latest_time: NaiveTime,
    pub package_weight_kg: f64,
}

async fn create_stop(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateStopRequest>,
) -> Result<Json<Stop>, AppError> {
    if !payload.location.in_bounds() {
        return Err(AppError::BadRequest(
            "location is out of bounds".to_string(),
        ));
    }
    if payload.earliest_time > payload.latest_time {
        return Err(AppError::BadRequest(
            "earliest_time must not be after latest_time".to_string(),
        ));
    }
    if !payload.package_weight_kg.is_finite() || payload.package_weight_kg < 0.0 {
        return Err(AppError::BadRequest(
            "package_weight_kg must be >= 0".to_string(),
        ));
    }

    let stop = Stop {
        id: state.next_id(),
        address: payload.address.unwrap_or_default(),
        location: payload.location,
        earliest_time: payload.earliest_time,
        latest_time: payload.latest_time,
        package_weight_kg: payload.package_weight_kg,
        status: StopStatus::Pending,
    };

    state.stops.insert(stop.id, stop.clone());
    Ok(Json(stop))
}

async fn list_stops(State(state): State<Arc<AppState>>) -> Json<Vec<Stop>> {
    let stops = state.stops.iter().map(|entry| entry.value().clone()).collect();
    Json(stops)
}

async fn get_stop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Stop>, AppError> {
    let stop = state
        .stops
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("stop {} not found", id)))?;

    Ok(Json(stop.value().clone()))
}
