//! ETA-only rerouting. A traffic event invalidates arrival times, not the
//! stop assignment: the sequence stays fixed, the time matrix is rebuilt with
//! per-edge delay factors and the schedule is recomputed. Window violations
//! are reported, not rejected.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::AppError;
use crate::geo::{minutes_to_clock, time_to_minutes};
use crate::models::event::{ReroutedStop, RouteEvent, TrafficEvent};
use crate::models::route::RouteStop;
use crate::models::stop::Stop;
use crate::solver::constraints::compute_arrivals;
use crate::solver::SolverStop;
use crate::state::AppState;

/// Recomputes and persists arrival times for a route under the given traffic
/// events, then publishes a `rerouted` event on the route's topic. Duplicate
/// events on one edge resolve to the maximum factor; edges naming ids outside
/// the tour are ignored. On error the route is left unchanged and nothing is
/// published.
pub async fn reroute_active(
    state: &AppState,
    route_id: i64,
    traffic_events: &[TrafficEvent],
) -> Result<RouteEvent, AppError> {
    let lock = state.route_lock(route_id);
    let _guard = lock.lock().await;

    let route = state
        .routes
        .get(&route_id)
        .map(|r| r.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("route {route_id} not found")))?;

    let route_stops = state
        .route_stops
        .get(&route_id)
        .map(|rs| rs.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("route {route_id} has no stops")))?;

    let vehicle = state
        .vehicles
        .get(&route.vehicle_id)
        .map(|v| v.value().clone())
        .ok_or_else(|| {
            AppError::Internal(format!("route {route_id} references a missing vehicle"))
        })?;

    let depot = state
        .depots
        .get(&vehicle.depot_id)
        .map(|d| d.value().clone())
        .ok_or_else(|| {
            AppError::Internal(format!("vehicle {} references a missing depot", vehicle.id))
        })?;

    let mut stops = Vec::with_capacity(route_stops.len());
    for rs in &route_stops {
        let stop = state
            .stops
            .get(&rs.stop_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| {
                AppError::Internal(format!("route {route_id} references missing stop {}", rs.stop_id))
            })?;
        stops.push(stop);
    }

    let mut coords = vec![depot.location];
    coords.extend(stops.iter().map(|s| s.location));

    let mut matrix = state
        .matrix
        .build(&coords)
        .await
        .map_err(|err| AppError::Internal(format!("matrix build failed: {err}")))?;

    // Edge endpoints are stop ids, with 0 for the depot. Ids outside this
    // route resolve to nothing and leave the matrix untouched.
    let mut idx_of: HashMap<i64, usize> = HashMap::with_capacity(stops.len() + 1);
    idx_of.insert(0, 0);
    for (i, stop) in stops.iter().enumerate() {
        idx_of.insert(stop.id, i + 1);
    }

    let mut factors: HashMap<(usize, usize), f64> = HashMap::new();
    for event in traffic_events {
        let (Some(&a), Some(&b)) = (idx_of.get(&event.edge[0]), idx_of.get(&event.edge[1]))
        else {
            debug!(route_id, edge = ?event.edge, "traffic event off this route, ignored");
            continue;
        };
        if a == b {
            continue;
        }
        let key = (a.min(b), a.max(b));
        factors
            .entry(key)
            .and_modify(|f| *f = f.max(event.delay_factor))
            .or_insert(event.delay_factor);
    }
    for (&(a, b), &factor) in &factors {
        matrix.scale_time(a, b, factor);
    }

    let depot_open_min = time_to_minutes(depot.open_time);
    let solver_stops: Vec<SolverStop> = stops
        .iter()
        .enumerate()
        .map(|(i, s)| SolverStop {
            id: s.id,
            matrix_idx: i + 1,
            weight_kg: s.package_weight_kg,
            earliest_min: time_to_minutes(s.earliest_time),
            latest_min: time_to_minutes(s.latest_time),
        })
        .collect();
    let sequence: Vec<usize> = (0..solver_stops.len()).collect();

    let arrivals = compute_arrivals(
        &solver_stops,
        &sequence,
        &matrix,
        depot_open_min,
        state.config.service_time_min,
    );

    let (updated_route_stops, event_stops) =
        build_updates(&stops, &arrivals, depot_open_min);

    state.route_stops.insert(route_id, updated_route_stops);

    let event = RouteEvent::Rerouted {
        route_id,
        stops: event_stops,
    };
    let delivered = state.bus.publish(route_id, event.clone());

    info!(
        route_id,
        events = traffic_events.len(),
        subscribers = delivered,
        "route rerouted"
    );

    Ok(event)
}

fn build_updates(
    stops: &[Stop],
    arrivals: &[f64],
    depot_open_min: f64,
) -> (Vec<RouteStop>, Vec<ReroutedStop>) {
    let mut route_stops = Vec::with_capacity(stops.len());
    let mut event_stops = Vec::with_capacity(stops.len());

    for (k, (stop, &arrival)) in stops.iter().zip(arrivals).enumerate() {
        let planned_arrival = minutes_to_clock(arrival);
        let planned_arrival_min = arrival - depot_open_min;

        route_stops.push(RouteStop {
            stop_id: stop.id,
            sequence: k as u32,
            planned_arrival: planned_arrival.clone(),
            planned_arrival_min,
        });
        event_stops.push(ReroutedStop {
            stop_id: stop.id,
            sequence: k as u32,
            planned_arrival,
            planned_arrival_min,
            lat: stop.location.lat,
            lng: stop.location.lng,
            late: arrival > time_to_minutes(stop.latest_time),
        });
    }

    (route_stops, event_stops)
}
