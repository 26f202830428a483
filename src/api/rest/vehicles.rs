use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::vehicle::Vehicle;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vehicles", post(create_vehicle).get(list_vehicles))
        .route("/vehicles/:id", get(get_vehicle))
}

#[derive(Deserialize)]
pub struct CreateVehicleRequest {
    pub depot_id: i64,
    pub capacity_kg: f64,
    pub driver_name: String,
}

async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateVehicleRequest>,
) -> Result<Json<Vehicle>, AppError> {
    if payload.driver_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "driver_name cannot be empty".to_string(),
        ));
    }
    if !payload.capacity_kg.is_finite() || payload.capacity_kg <= 0.0 {
        return Err(AppError::BadRequest("capacity_kg must be > 0".to_string()));
    }
    if !state.depots.contains_key(&payload.depot_id) {
        return Err(AppError::BadRequest(format!(
            "unknown depot {}",
            payload.depot_id
        )));
    }

    let vehicle = Vehicle {
        id: state.next_id(),
        depot_id: payload.depot_id,
        capacity_kg: payload.capacity_kg,
        driver_name: payload.driver_name,
    };

    state.vehicles.insert(vehicle.id, vehicle.clone());
    Ok(Json(vehicle))
}

async fn list_vehicles(State(state): State<Arc<AppState>>) -> Json<Vec<Vehicle>> {
    let vehicles = state
        .vehicles
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(vehicles)
}

async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vehicle>, AppError> {
    let vehicle = state
        .vehicles
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("vehicle {} not found", id)))?;

    Ok(Json(vehicle.value().clone()))
}
