use crate::matrix::TravelMatrix;
use crate::solver::{SolverStop, DEPOT_IDX};

pub fn capacity_ok(weights: &[f64], capacity_kg: f64) -> bool {
    weights.iter().sum::<f64>() <= capacity_kg
}

/// Arrival schedule along `sequence` (indices into `stops`), starting from
/// the depot at `depot_open_min`. A driver arriving before a window opens
/// waits, so each arrival is clamped to the stop's `earliest_min`; departure
/// is arrival plus the per-stop service time.
pub fn compute_arrivals(
    stops: &[SolverStop],
    sequence: &[usize],
    matrix: &TravelMatrix,
    depot_open_min: f64,
    service_time_min: f64,
) -> Vec<f64> {
    let mut arrivals = Vec::with_capacity(sequence.len());
    let mut clock = depot_open_min;
    let mut pos = DEPOT_IDX;

    for &si in sequence {
        let stop = &stops[si];
        let arrival = (clock + matrix.time(pos, stop.matrix_idx)).max(stop.earliest_min);
        arrivals.push(arrival);
        clock = arrival + service_time_min;
        pos = stop.matrix_idx;
    }

    arrivals
}

pub fn windows_ok(stops: &[SolverStop], sequence: &[usize], arrivals: &[f64]) -> bool {
    sequence.iter().zip(arrivals).all(|(&si, &arrival)| {
        let stop = &stops[si];
        stop.earliest_min <= arrival && arrival <= stop.latest_min
    })
}
