use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::NaiveTime;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::depot::Depot;
use crate::models::stop::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/depots", post(create_depot).get(list_depots))
        .route("/depots/:id", get(get_depot))
}

#[derive(Deserialize)]
pub struct CreateDepotRequest {
    pub name: String,
    pub location: GeoPoint,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

async fn create_depot(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDepotRequest>,
) -> Result<Json<Depot>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if !payload.location.in_bounds() {
        return Err(AppError::BadRequest(
            "location is out of bounds".to_string(),
        ));
    }
    if payload.open_time >= payload.close_time {
        return Err(AppError::BadRequest(
            "open_time must be before close_time".to_string(),
        ));
    }

    let depot = Depot {
        id: state.next_id(),
        name: payload.name,
        location: payload.location,
        open_time: payload.open_time,
        close_time: payload.close_time,
    };

    state.depots.insert(depot.id, depot.clone());
    Ok(Json(depot))
}

async fn list_depots(State(state): State<Arc<AppState>>) -> Json<Vec<Depot>> {
    let depots = state.depots.iter().map(|entry| entry.value().clone()).collect();
    Json(depots)
}

async fn get_depot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Depot>, AppError> {
    let depot = state
        .depots
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("depot {} not found", id)))?;

    Ok(Json(depot.value().clone()))
}
