use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::geo::{minutes_to_clock, time_to_minutes};
use crate::models::job::JobState;
use crate::models::route::{Route, RouteStop};
use crate::models::stop::StopStatus;
use crate::solver::{SolveError, Solver, SolverStop, SolverVehicle};
use crate::state::{AppState, QueuedJob};

/// Spawns the worker pool. Workers share the queue receiver behind an async
/// mutex, so each queued job is claimed by exactly one worker and jobs drain
/// in FIFO order up to `worker_pool_size` at a time.
pub async fn run_solver_workers(state: Arc<AppState>, job_rx: mpsc::Receiver<QueuedJob>) {
    let shared_rx = Arc::new(Mutex::new(job_rx));
    let mut handles = Vec::new();

    for worker in 0..state.config.worker_pool_size {
        handles.push(tokio::spawn(run_worker(
            worker,
            state.clone(),
            shared_rx.clone(),
        )));
    }

    for handle in handles {
        let _ = handle.await;
    }

    warn!("solver worker pool stopped: queue channel closed");
}

async fn run_worker(
    worker: usize,
    state: Arc<AppState>,
    shared_rx: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
) {
    info!(worker, "solver worker started");

    loop {
        if state.shutting_down.load(Ordering::Relaxed) {
            info!(worker, "solver worker draining for shutdown");
            break;
        }

        let queued = { shared_rx.lock().await.recv().await };
        let Some(queued) = queued else {
            break;
        };

        state.metrics.jobs_in_queue.dec();

        let start = Instant::now();
        match process_job(&state, &queued).await {
            Ok(()) => {
                let elapsed = start.elapsed().as_secs_f64();
                state
                    .metrics
                    .solve_latency_seconds
                    .with_label_values(&["done"])
                    .observe(elapsed);
                state.metrics.jobs_total.with_label_values(&["done"]).inc();
            }
            Err(reason) => {
                let elapsed = start.elapsed().as_secs_f64();
                state
                    .metrics
                    .solve_latency_seconds
                    .with_label_values(&["failed"])
                    .observe(elapsed);
                state
                    .metrics
                    .jobs_total
                    .with_label_values(&["failed"])
                    .inc();
                error!(job_id = %queued.job_id, reason = %reason, "optimization job failed");
            }
        }
    }
}

/// Runs one job end-to-end: claim, load entities, build the travel matrix,
/// solve, persist the plan and mark the job done or failed. Returns the
/// failure reason code on any error.
pub async fn process_job(state: &AppState, queued: &QueuedJob) -> Result<(), String> {
    if !mark_running(state, &queued.job_id) {
        // Already claimed; at-most-once completion per job id.
        return Ok(());
    }

    match execute(state, queued).await {
        Ok(result) => {
            mark_done(state, &queued.job_id, result);
            Ok(())
        }
        Err(reason) => {
            mark_failed(state, &queued.job_id, reason.clone());
            Err(reason)
        }
    }
}

async fn execute(state: &AppState, queued: &QueuedJob) -> Result<Value, String> {
    let request = &queued.request;

    let depot = state
        .depots
        .get(&request.depot_id)
        .map(|d| d.value().clone())
        .ok_or_else(|| "internal".to_string())?;

    let mut vehicles = Vec::with_capacity(request.vehicle_ids.len());
    for id in &request.vehicle_ids {
        let vehicle = state
            .vehicles
            .get(id)
            .map(|v| v.value().clone())
            .ok_or_else(|| "internal".to_string())?;
        vehicles.push(SolverVehicle {
            id: vehicle.id,
            capacity_kg: vehicle.capacity_kg,
        });
    }

    // Depot is matrix index 0; stops occupy 1..=n in request order.
    let mut coords = vec![depot.location];
    let mut solver_stops = Vec::with_capacity(request.stop_ids.len());
    for id in &request.stop_ids {
        if solver_stops.iter().any(|s: &SolverStop| s.id == *id) {
            continue;
        }
        let stop = state
            .stops
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| "internal".to_string())?;
        coords.push(stop.location);
        solver_stops.push(SolverStop {
            id: stop.id,
            matrix_idx: solver_stops.len() + 1,
            weight_kg: stop.package_weight_kg,
            earliest_min: time_to_minutes(stop.earliest_time),
            latest_min: time_to_minutes(stop.latest_time),
        });
    }

    let matrix = state
        .matrix
        .build(&coords)
        .await
        .map_err(|err| {
            error!(job_id = %queued.job_id, error = %err, "matrix build failed");
            "matrix_unavailable".to_string()
        })?;

    let depot_open_min = time_to_minutes(depot.open_time);
    let solver = Solver::new(
        &solver_stops,
        &vehicles,
        &matrix,
        depot_open_min,
        state.config.service_time_min,
        Duration::from_millis(state.config.solver_timeout_ms),
    );

    let plan = solver.solve().map_err(|err| {
        if let SolveError::Timeout { greedy_distance_km } = err {
            warn!(
                job_id = %queued.job_id,
                greedy_distance_km,
                "solver budget exceeded; discarding partial greedy plan"
            );
        }
        err.reason()
    })?;

    let mut route_ids = Vec::with_capacity(plan.routes.len());
    for planned in &plan.routes {
        let route_id = state.next_id();

        let route_stops: Vec<RouteStop> = planned
            .stops
            .iter()
            .enumerate()
            .map(|(seq, ps)| RouteStop {
                stop_id: ps.stop_id,
                sequence: seq as u32,
                planned_arrival: minutes_to_clock(ps.arrival_min),
                planned_arrival_min: ps.arrival_min - depot_open_min,
            })
            .collect();

        state.routes.insert(
            route_id,
            Route {
                id: route_id,
                vehicle_id: planned.vehicle_id,
                date: request.date,
                total_distance_km: planned.distance_km,
                total_time_min: planned.time_min,
            },
        );
        state.route_stops.insert(route_id, route_stops);

        for ps in &planned.stops {
            if let Some(mut stop) = state.stops.get_mut(&ps.stop_id) {
                stop.status = StopStatus::InRoute;
            }
        }

        route_ids.push(route_id);
    }

    state
        .metrics
        .route_improvement_pct
        .observe(plan.improvement_pct);

    info!(
        job_id = %queued.job_id,
        num_routes = route_ids.len(),
        total_distance_km = plan.total_distance_km,
        improvement_pct = plan.improvement_pct,
        "optimization complete"
    );

    Ok(json!({
        "route_ids": route_ids,
        "total_distance_km": round3(plan.total_distance_km),
        "greedy_distance_km": round3(plan.greedy_distance_km),
        "improvement_pct": round2(plan.improvement_pct),
        "num_routes": route_ids.len(),
    }))
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn mark_running(state: &AppState, job_id: &str) -> bool {
    match state.jobs.get_mut(job_id) {
        Some(mut job) if job.state == JobState::Queued => {
            job.state = JobState::Running;
            true
        }
        _ => false,
    }
}

/// The result payload and the `done` state land in one entry guard, so no
/// reader ever observes `done` without a result.
fn mark_done(state: &AppState, job_id: &str, result: Value) {
    if let Some(mut job) = state.jobs.get_mut(job_id) {
        if job.state == JobState::Running {
            job.state = JobState::Done;
            job.completed_at = Some(Utc::now());
            job.result = Some(result);
        }
    }
}

fn mark_failed(state: &AppState, job_id: &str, reason: String) {
    if let Some(mut job) = state.jobs.get_mut(job_id) {
        if job.state == JobState::Running || job.state == JobState::Queued {
            job.state = JobState::Failed;
            job.completed_at = Some(Utc::now());
            job.reason = Some(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};

    use super::process_job;
    use crate::config::Config;
    use crate::models::depot::Depot;
    use crate::models::job::{Job, JobState, OptimizationRequest};
    use crate::models::stop::{GeoPoint, Stop, StopStatus};
    use crate::models::vehicle::Vehicle;
    use crate::state::{AppState, QueuedJob};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn seed_state() -> Arc<AppState> {
        let (state, _rx) = AppState::new(Config::default());
        let state = Arc::new(state);

        let depot_id = state.next_id();
        state.depots.insert(
            depot_id,
            Depot {
                id: depot_id,
                name: "Seattle Distribution Center".to_string(),
                location: GeoPoint {
                    lat: 47.6062,
                    lng: -122.3321,
                },
                open_time: hm(8, 0),
                close_time: hm(18, 0),
            },
        );

        let vehicle_id = state.next_id();
        state.vehicles.insert(
            vehicle_id,
            Vehicle {
                id: vehicle_id,
                depot_id,
                capacity_kg: 100.0,
                driver_name: "Driver 1".to_string(),
            },
        );

        for (lat, lng) in [(47.62, -122.34), (47.60, -122.30)] {
            let stop_id = state.next_id();
            state.stops.insert(
                stop_id,
                Stop {
                    id: stop_id,
                    address: "somewhere in Seattle".to_string(),
                    location: GeoPoint { lat, lng },
                    earliest_time: hm(9, 0),
                    latest_time: hm(11, 0),
                    package_weight_kg: 5.0,
                    status: StopStatus::Pending,
                },
            );
        }

        state
    }

    fn queued(state: &AppState, job_id: &str) -> QueuedJob {
        state
            .jobs
            .insert(job_id.to_string(), Job::queued(job_id.to_string()));
        QueuedJob {
            job_id: job_id.to_string(),
            request: OptimizationRequest {
                depot_id: 1,
                vehicle_ids: vec![2],
                stop_ids: vec![3, 4],
                date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            },
        }
    }

    #[tokio::test]
    async fn processes_job_to_done_with_result() {
        let state = seed_state();
        let job = queued(&state, "job-1");

        process_job(&state, &job).await.unwrap();

        let stored = state.jobs.get("job-1").unwrap().clone();
        assert_eq!(stored.state, JobState::Done);
        assert!(stored.completed_at.is_some());

        let result = stored.result.expect("done job has a result");
        assert_eq!(result["num_routes"], 1);
        assert!(result["total_distance_km"].as_f64().unwrap() > 0.0);
        assert!(result["total_distance_km"].as_f64().unwrap() <= result["greedy_distance_km"].as_f64().unwrap());

        let route_id = result["route_ids"][0].as_i64().unwrap();
        let route = state.routes.get(&route_id).unwrap().clone();
        assert_eq!(route.vehicle_id, 2);

        let route_stops = state.route_stops.get(&route_id).unwrap().clone();
        assert_eq!(route_stops.len(), 2);
        let sequences: Vec<u32> = route_stops.iter().map(|rs| rs.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);

        // Placed stops are flagged as in-route.
        assert_eq!(
            state.stops.get(&route_stops[0].stop_id).unwrap().status,
            StopStatus::InRoute
        );
    }

    #[tokio::test]
    async fn window_arrivals_are_clamped_to_window_open() {
        let state = seed_state();
        let job = queued(&state, "job-2");
        process_job(&state, &job).await.unwrap();

        let result = state.jobs.get("job-2").unwrap().result.clone().unwrap();
        let route_id = result["route_ids"][0].as_i64().unwrap();
        let route_stops = state.route_stops.get(&route_id).unwrap().clone();

        // Both stops are minutes from the depot but their windows open at
        // 09:00, an hour after depot open, so the driver waits.
        assert_eq!(route_stops[0].planned_arrival, "09:00");
        assert_eq!(route_stops[0].planned_arrival_min, 60.0);
    }

    #[tokio::test]
    async fn infeasible_job_fails_with_stop_ids() {
        let state = seed_state();
        state.stops.get_mut(&3).unwrap().package_weight_kg = 500.0;

        let job = queued(&state, "job-3");
        let reason = process_job(&state, &job).await.unwrap_err();
        assert!(reason.starts_with("infeasible"));
        assert!(reason.contains('3'));
    }

    #[tokio::test]
    async fn empty_vehicle_list_fails_with_no_vehicles() {
        let state = seed_state();
        let mut job = queued(&state, "job-4");
        job.request.vehicle_ids.clear();

        let reason = process_job(&state, &job).await.unwrap_err();
        assert_eq!(reason, "no_vehicles");
    }

    #[tokio::test]
    async fn terminal_jobs_are_not_reclaimed() {
        let state = seed_state();
        let job = queued(&state, "job-5");
        process_job(&state, &job).await.unwrap();
        let done_at = state.jobs.get("job-5").unwrap().completed_at;

        // A duplicate delivery of the same job id is a no-op.
        process_job(&state, &job).await.unwrap();
        let stored = state.jobs.get("job-5").unwrap().clone();
        assert_eq!(stored.state, JobState::Done);
        assert_eq!(stored.completed_at, done_at);
        assert_eq!(state.routes.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_stop_ids_are_visited_once() {
        let state = seed_state();
        let mut job = queued(&state, "job-6");
        job.request.stop_ids = vec![3, 4, 3];

        process_job(&state, &job).await.unwrap();

        let result = state.jobs.get("job-6").unwrap().result.clone().unwrap();
        let route_id = result["route_ids"][0].as_i64().unwrap();
        assert_eq!(state.route_stops.get(&route_id).unwrap().len(), 2);
    }
}
