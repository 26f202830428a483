use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::rest::ws;
use crate::dispatch::queue::submit_job;
use crate::error::AppError;
use crate::models::event::TrafficEvent;
use crate::models::job::{JobState, OptimizationRequest};
use crate::reroute::reroute_active;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/routes/optimize", post(optimize))
        .route("/routes/:id/status", get(job_status))
        .route("/routes/:id/stops", get(route_stops))
        .route("/routes/:id/detail", get(route_detail))
        .route("/routes/:id/reroute", post(reroute))
        .route("/routes/ws/:id", get(ws::ws_handler))
}

#[derive(Deserialize)]
pub struct OptimizeRequest {
    pub depot_id: i64,
    pub vehicle_ids: Vec<i64>,
    pub stop_ids: Vec<i64>,
    pub date: String,
}

/// Validates entity references synchronously, then enqueues the job and
/// returns its id for polling. Solver work happens entirely off this path.
async fn optimize(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OptimizeRequest>,
) -> Result<Json<Value>, AppError> {
    let date = NaiveDate::parse_from_str(&payload.date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date: {}", payload.date)))?;

    if !state.depots.contains_key(&payload.depot_id) {
        return Err(AppError::BadRequest(format!(
            "unknown depot {}",
            payload.depot_id
        )));
    }
    for id in &payload.vehicle_ids {
        if !state.vehicles.contains_key(id) {
            return Err(AppError::BadRequest(format!("unknown vehicle {id}")));
        }
    }
    for id in &payload.stop_ids {
        if !state.stops.contains_key(id) {
            return Err(AppError::BadRequest(format!("unknown stop {id}")));
        }
    }

    let job_id = submit_job(
        &state,
        OptimizationRequest {
            depot_id: payload.depot_id,
            vehicle_ids: payload.vehicle_ids,
            stop_ids: payload.stop_ids,
            date,
        },
    )
    .await?;

    Ok(Json(json!({ "job_id": job_id, "status": "queued" })))
}

#[derive(Serialize)]
struct JobStatusResponse {
    status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let job = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("job {} not found", job_id)))?;

    Ok(Json(JobStatusResponse {
        status: job.state,
        result: job.result.clone(),
        reason: job.reason.clone(),
    }))
}

#[derive(Serialize)]
struct RouteStopResponse {
    stop_id: i64,
    sequence: u32,
    planned_arrival: String,
}

async fn route_stops(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<i64>,
) -> Result<Json<Vec<RouteStopResponse>>, AppError> {
    let route_stops = state
        .route_stops
        .get(&route_id)
        .ok_or_else(|| AppError::NotFound(format!("route {} not found", route_id)))?;

    let stops = route_stops
        .iter()
        .map(|rs| RouteStopResponse {
            stop_id: rs.stop_id,
            sequence: rs.sequence,
            planned_arrival: rs.planned_arrival.clone(),
        })
        .collect();

    Ok(Json(stops))
}

/// Full stop data including coordinates, used to draw map polylines and
/// marker popups.
#[derive(Serialize)]
struct RouteStopDetail {
    stop_id: i64,
    sequence: u32,
    planned_arrival: String,
    lat: f64,
    lng: f64,
    address: String,
    earliest_time: NaiveTime,
    latest_time: NaiveTime,
    package_weight_kg: f64,
}

async fn route_detail(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<i64>,
) -> Result<Json<Vec<RouteStopDetail>>, AppError> {
    let route_stops = state
        .route_stops
        .get(&route_id)
        .map(|rs| rs.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("route {} not found", route_id)))?;

    let mut detail = Vec::with_capacity(route_stops.len());
    for rs in &route_stops {
        let stop = state
            .stops
            .get(&rs.stop_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| {
                AppError::Internal(format!("route references missing stop {}", rs.stop_id))
            })?;

        detail.push(RouteStopDetail {
            stop_id: rs.stop_id,
            sequence: rs.sequence,
            planned_arrival: rs.planned_arrival.clone(),
            lat: stop.location.lat,
            lng: stop.location.lng,
            address: stop.address,
            earliest_time: stop.earliest_time,
            latest_time: stop.latest_time,
            package_weight_kg: stop.package_weight_kg,
        });
    }

    Ok(Json(detail))
}

#[derive(Deserialize)]
pub struct RerouteRequest {
    pub traffic_events: Vec<TrafficEvent>,
}

/// Applies traffic delays to a live route's schedule. The updated ETAs are
/// broadcast to every subscriber of the route's topic as a side effect.
async fn reroute(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<i64>,
    Json(payload): Json<RerouteRequest>,
) -> Result<Json<Value>, AppError> {
    for event in &payload.traffic_events {
        if !event.delay_factor.is_finite() || event.delay_factor <= 0.0 {
            return Err(AppError::BadRequest(format!(
                "delay_factor must be positive, got {}",
                event.delay_factor
            )));
        }
    }

    match reroute_active(&state, route_id, &payload.traffic_events).await {
        Ok(_) => {
            state
                .metrics
                .reroutes_total
                .with_label_values(&["success"])
                .inc();
            Ok(Json(json!({ "ok": true })))
        }
        Err(err) => {
            state
                .metrics
                .reroutes_total
                .with_label_values(&["error"])
                .inc();
            Err(err)
        }
    }
}
