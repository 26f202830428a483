//! CVRPTW solver: greedy nearest-neighbor construction (phase 1) followed by
//! per-route 2-opt local search (phase 2). Matrix index 0 is the depot; stops
//! occupy indices 1..=n in the order they were given.

pub mod constraints;
pub mod two_opt;

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::matrix::TravelMatrix;
use crate::solver::constraints::{capacity_ok, compute_arrivals};
use crate::solver::two_opt::route_distance;

pub const DEPOT_IDX: usize = 0;

#[derive(Debug, Clone)]
pub struct SolverStop {
    pub id: i64,
    pub matrix_idx: usize,
    pub weight_kg: f64,
    pub earliest_min: f64,
    pub latest_min: f64,
}

#[derive(Debug, Clone)]
pub struct SolverVehicle {
    pub id: i64,
    pub capacity_kg: f64,
}

#[derive(Debug, Clone)]
pub struct PlannedStop {
    pub stop_id: i64,
    pub matrix_idx: usize,
    /// Minutes since midnight, window-open clamp applied.
    pub arrival_min: f64,
}

#[derive(Debug, Clone)]
pub struct PlannedRoute {
    pub vehicle_id: i64,
    pub stops: Vec<PlannedStop>,
    pub distance_km: f64,
    pub time_min: f64,
}

#[derive(Debug, Clone)]
pub struct SolvePlan {
    pub routes: Vec<PlannedRoute>,
    pub greedy_distance_km: f64,
    pub total_distance_km: f64,
    pub improvement_pct: f64,
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("vehicle list is empty")]
    NoVehicles,

    #[error("stop set is empty")]
    NoStops,

    #[error("unassigned stops: {0:?}")]
    Infeasible(Vec<i64>),

    #[error("wall-clock budget exceeded (greedy plan was {greedy_distance_km:.3} km)")]
    Timeout { greedy_distance_km: f64 },
}

impl SolveError {
    /// Short machine-readable code persisted as the job failure reason.
    pub fn reason(&self) -> String {
        match self {
            SolveError::NoVehicles => "no_vehicles".to_string(),
            SolveError::NoStops => "no_stops".to_string(),
            SolveError::Infeasible(ids) => format!("infeasible: {ids:?}"),
            SolveError::Timeout { .. } => "timeout".to_string(),
        }
    }
}

pub struct Solver<'a> {
    stops: &'a [SolverStop],
    vehicles: &'a [SolverVehicle],
    matrix: &'a TravelMatrix,
    depot_open_min: f64,
    service_time_min: f64,
    budget: Duration,
}

struct GreedyRoute {
    vehicle_id: i64,
    sequence: Vec<usize>,
}

impl<'a> Solver<'a> {
    pub fn new(
        stops: &'a [SolverStop],
        vehicles: &'a [SolverVehicle],
        matrix: &'a TravelMatrix,
        depot_open_min: f64,
        service_time_min: f64,
        budget: Duration,
    ) -> Self {
        Self {
            stops,
            vehicles,
            matrix,
            depot_open_min,
            service_time_min,
            budget,
        }
    }

    pub fn solve(&self) -> Result<SolvePlan, SolveError> {
        let deadline = Instant::now() + self.budget;

        let mut routes = self.greedy()?;
        let greedy_distance_km: f64 = routes
            .iter()
            .map(|r| route_distance(self.stops, &r.sequence, self.matrix))
            .sum();

        for route in &mut routes {
            two_opt::improve(
                self.stops,
                &mut route.sequence,
                self.matrix,
                self.depot_open_min,
                self.service_time_min,
                deadline,
            )
            .map_err(|_| SolveError::Timeout { greedy_distance_km })?;
        }

        let planned: Vec<PlannedRoute> = routes.iter().map(|r| self.plan_route(r)).collect();
        let total_distance_km: f64 = planned.iter().map(|r| r.distance_km).sum();
        let improvement_pct = if greedy_distance_km > 0.0 {
            100.0 * (greedy_distance_km - total_distance_km) / greedy_distance_km
        } else {
            0.0
        };

        Ok(SolvePlan {
            routes: planned,
            greedy_distance_km,
            total_distance_km,
            improvement_pct,
        })
    }

    /// Phase 1: per vehicle, repeatedly append the nearest unvisited stop that
    /// fits both capacity and its time window; close the route when none does.
    /// Equal distances break toward the smaller stop id.
    fn greedy(&self) -> Result<Vec<GreedyRoute>, SolveError> {
        if self.vehicles.is_empty() {
            return Err(SolveError::NoVehicles);
        }
        if self.stops.is_empty() {
            return Err(SolveError::NoStops);
        }

        let mut unvisited: Vec<usize> = (0..self.stops.len()).collect();
        let mut routes = Vec::new();

        for vehicle in self.vehicles {
            if unvisited.is_empty() {
                break;
            }

            let mut sequence = Vec::new();
            let mut load = 0.0;
            let mut clock = self.depot_open_min;
            let mut pos = DEPOT_IDX;

            while !unvisited.is_empty() {
                let mut best: Option<(f64, i64, usize)> = None;

                for (k, &si) in unvisited.iter().enumerate() {
                    let stop = &self.stops[si];

                    if !capacity_ok(&[load, stop.weight_kg], vehicle.capacity_kg) {
                        continue;
                    }

                    let arrival =
                        (clock + self.matrix.time(pos, stop.matrix_idx)).max(stop.earliest_min);
                    if arrival > stop.latest_min {
                        continue;
                    }

                    let d = self.matrix.dist(pos, stop.matrix_idx);
                    let closer = match best {
                        None => true,
                        Some((best_d, best_id, _)) => {
                            d < best_d || (d == best_d && stop.id < best_id)
                        }
                    };
                    if closer {
                        best = Some((d, stop.id, k));
                    }
                }

                let Some((_, _, k)) = best else {
                    break;
                };

                let si = unvisited.remove(k);
                let stop = &self.stops[si];
                let arrival =
                    (clock + self.matrix.time(pos, stop.matrix_idx)).max(stop.earliest_min);
                clock = arrival + self.service_time_min;
                load += stop.weight_kg;
                pos = stop.matrix_idx;
                sequence.push(si);
            }

            if !sequence.is_empty() {
                routes.push(GreedyRoute {
                    vehicle_id: vehicle.id,
                    sequence,
                });
            }
        }

        if !unvisited.is_empty() {
            let mut ids: Vec<i64> = unvisited.iter().map(|&si| self.stops[si].id).collect();
            ids.sort_unstable();
            return Err(SolveError::Infeasible(ids));
        }

        Ok(routes)
    }

    fn plan_route(&self, route: &GreedyRoute) -> PlannedRoute {
        let arrivals = compute_arrivals(
            self.stops,
            &route.sequence,
            self.matrix,
            self.depot_open_min,
            self.service_time_min,
        );

        let stops: Vec<PlannedStop> = route
            .sequence
            .iter()
            .zip(&arrivals)
            .map(|(&si, &arrival_min)| PlannedStop {
                stop_id: self.stops[si].id,
                matrix_idx: self.stops[si].matrix_idx,
                arrival_min,
            })
            .collect();

        PlannedRoute {
            vehicle_id: route.vehicle_id,
            distance_km: route_distance(self.stops, &route.sequence, self.matrix),
            time_min: self.route_time(&route.sequence),
            stops,
        }
    }

    /// Closed-tour travel time plus the service dwell at each stop.
    fn route_time(&self, sequence: &[usize]) -> f64 {
        let Some((&first, rest)) = sequence.split_first() else {
            return 0.0;
        };

        let mut time = self.matrix.time(DEPOT_IDX, self.stops[first].matrix_idx);
        let mut pos = self.stops[first].matrix_idx;
        for &si in rest {
            time += self.matrix.time(pos, self.stops[si].matrix_idx);
            pos = self.stops[si].matrix_idx;
        }
        time + self.matrix.time(pos, DEPOT_IDX) + self.service_time_min * sequence.len() as f64
    }
}
