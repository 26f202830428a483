//! Intra-route 2-opt: reverse a sub-segment of the stop sequence whenever the
//! reversal shortens the closed tour without breaking a time window.
//! First-improvement scan; distances are compared in integer metres so each
//! accepted swap strictly decreases a bounded non-negative quantity.

use std::time::Instant;

use crate::matrix::TravelMatrix;
use crate::solver::constraints::{compute_arrivals, windows_ok};
use crate::solver::{SolverStop, DEPOT_IDX};

pub struct DeadlineExceeded;

pub fn quantize_km(km: f64) -> i64 {
    (km * 1000.0).round() as i64
}

pub fn route_distance(stops: &[SolverStop], sequence: &[usize], matrix: &TravelMatrix) -> f64 {
    let Some((&first, rest)) = sequence.split_first() else {
        return 0.0;
    };

    let mut dist = matrix.dist(DEPOT_IDX, stops[first].matrix_idx);
    let mut pos = stops[first].matrix_idx;
    for &si in rest {
        dist += matrix.dist(pos, stops[si].matrix_idx);
        pos = stops[si].matrix_idx;
    }
    dist + matrix.dist(pos, DEPOT_IDX)
}

/// Improves `sequence` in place. Routes with fewer than four stops are left
/// untouched. Returns `Err` if the solver deadline passes mid-search; the
/// sequence then holds the best ordering found so far.
pub fn improve(
    stops: &[SolverStop],
    sequence: &mut Vec<usize>,
    matrix: &TravelMatrix,
    depot_open_min: f64,
    service_time_min: f64,
    deadline: Instant,
) -> Result<(), DeadlineExceeded> {
    let n = sequence.len();
    if n < 4 {
        return Ok(());
    }

    loop {
        if Instant::now() >= deadline {
            return Err(DeadlineExceeded);
        }

        let mut improved = false;

        for i in 0..n - 1 {
            for j in i + 1..n {
                let current = quantize_km(route_distance(stops, sequence, matrix));

                let mut candidate = sequence.clone();
                candidate[i..=j].reverse();

                if quantize_km(route_distance(stops, &candidate, matrix)) >= current {
                    continue;
                }

                let arrivals =
                    compute_arrivals(stops, &candidate, matrix, depot_open_min, service_time_min);
                if !windows_ok(stops, &candidate, &arrivals) {
                    continue;
                }

                *sequence = candidate;
                improved = true;
            }
        }

        if !improved {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{improve, quantize_km, route_distance};
    use crate::matrix::{MatrixSource, TravelMatrix};
    use crate::solver::SolverStop;

    fn euclid_matrix(points: &[(f64, f64)]) -> TravelMatrix {
        let n = points.len();
        let mut grid = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                let dx = points[i].0 - points[j].0;
                let dy = points[i].1 - points[j].1;
                grid[i][j] = (dx * dx + dy * dy).sqrt();
            }
        }
        TravelMatrix {
            dist_km: grid.clone(),
            time_min: grid,
            source: MatrixSource::Haversine,
        }
    }

    fn stop(id: i64, matrix_idx: usize, latest_min: f64) -> SolverStop {
        SolverStop {
            id,
            matrix_idx,
            weight_kg: 1.0,
            earliest_min: 0.0,
            latest_min,
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    /// Depot at the origin, four stops on a unit-wide column. Visiting the
    /// far column corner before the near one doubles back along the y axis.
    fn column_case() -> (Vec<SolverStop>, TravelMatrix) {
        let points = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)];
        let stops = vec![
            stop(1, 1, 1440.0),
            stop(2, 2, 1440.0),
            stop(3, 3, 1440.0),
            stop(4, 4, 1440.0),
        ];
        (stops, euclid_matrix(&points))
    }

    #[test]
    fn untangles_doubled_back_tour() {
        let (stops, matrix) = column_case();
        let mut seq = vec![0, 1, 2, 3];
        let before = route_distance(&stops, &seq, &matrix);

        improve(&stops, &mut seq, &matrix, 480.0, 5.0, far_deadline())
            .unwrap_or_else(|_| panic!("deadline not reachable"));

        let after = route_distance(&stops, &seq, &matrix);
        assert!(after < before);
        // Perimeter order: (0,1) → (0,2) → (1,2) → (1,1).
        assert_eq!(seq, vec![0, 3, 2, 1]);
        assert_eq!(quantize_km(after), quantize_km(4.0 + std::f64::consts::SQRT_2));
    }

    #[test]
    fn never_increases_distance() {
        let (stops, matrix) = column_case();
        for initial in [vec![0, 1, 2, 3], vec![3, 1, 0, 2], vec![2, 0, 3, 1]] {
            let mut seq = initial.clone();
            let before = route_distance(&stops, &seq, &matrix);
            let _ = improve(&stops, &mut seq, &matrix, 480.0, 5.0, far_deadline());
            assert!(route_distance(&stops, &seq, &matrix) <= before + 1e-9);
        }
    }

    #[test]
    fn rejects_shorter_tour_that_misses_a_window() {
        let (mut stops, matrix) = column_case();
        // The improving reversal moves stop 2 to the end of the route, where
        // its arrival would be ~499; close its window just before that.
        stops[1].latest_min = 497.0;

        let mut seq = vec![0, 1, 2, 3];
        let before = route_distance(&stops, &seq, &matrix);
        improve(&stops, &mut seq, &matrix, 480.0, 5.0, far_deadline())
            .unwrap_or_else(|_| panic!("deadline not reachable"));

        assert_eq!(seq, vec![0, 1, 2, 3]);
        assert_eq!(route_distance(&stops, &seq, &matrix), before);
    }

    #[test]
    fn leaves_short_routes_untouched() {
        let (stops, matrix) = column_case();
        let mut seq = vec![2, 0, 1];
        improve(&stops, &mut seq, &matrix, 480.0, 5.0, far_deadline())
            .unwrap_or_else(|_| panic!("deadline not reachable"));
        assert_eq!(seq, vec![2, 0, 1]);
    }

    #[test]
    fn expired_deadline_stops_the_search() {
        let (stops, matrix) = column_case();
        let mut seq = vec![0, 1, 2, 3];
        let result = improve(
            &stops,
            &mut seq,
            &matrix,
            480.0,
            5.0,
            Instant::now() - Duration::from_millis(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn quantize_rounds_to_metres() {
        assert_eq!(quantize_km(1.2344), 1234);
        assert_eq!(quantize_km(1.2346), 1235);
        assert_eq!(quantize_km(0.0), 0);
    }
}
