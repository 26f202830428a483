use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::geo::haversine_km;
use crate::models::stop::GeoPoint;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("coordinate {0} is out of bounds")]
    InvalidCoordinate(usize),
}

#[derive(Debug, Error)]
enum FetchError {
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("response matrix has wrong shape")]
    BadShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixSource {
    External,
    Haversine,
}

/// N×N travel distances (km) and times (minutes) over an ordered location
/// list. Index 0 is the depot by convention; the fallback strategy produces
/// symmetric matrices with zero diagonals.
#[derive(Debug, Clone)]
pub struct TravelMatrix {
    pub dist_km: Vec<Vec<f64>>,
    pub time_min: Vec<Vec<f64>>,
    pub source: MatrixSource,
}

impl TravelMatrix {
    pub fn len(&self) -> usize {
        self.dist_km.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dist_km.is_empty()
    }

    pub fn dist(&self, from: usize, to: usize) -> f64 {
        self.dist_km[from][to]
    }

    pub fn time(&self, from: usize, to: usize) -> f64 {
        self.time_min[from][to]
    }

    /// Scales travel time on the undirected edge (i, j) in both directions.
    pub fn scale_time(&mut self, i: usize, j: usize, factor: f64) {
        self.time_min[i][j] *= factor;
        if i != j {
            self.time_min[j][i] *= factor;
        }
    }
}

#[derive(Deserialize)]
struct ExternalMatrixResponse {
    /// Pairwise distances in km.
    distances: Vec<Vec<f64>>,
    /// Pairwise durations in seconds.
    durations: Vec<Vec<f64>>,
}

pub struct MatrixBuilder {
    url: String,
    api_key: String,
    location_cap: usize,
    timeout: Duration,
    avg_speed_kmh: f64,
    client: reqwest::Client,
}

impl MatrixBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            url: config.external_matrix_url.clone(),
            api_key: config.external_matrix_key.clone(),
            location_cap: config.external_matrix_cap,
            timeout: Duration::from_millis(config.external_matrix_timeout_ms),
            avg_speed_kmh: config.avg_speed_kmh,
            client: reqwest::Client::new(),
        }
    }

    /// Builds the distance/time matrices for an ordered location list.
    ///
    /// Tries the external routing service in a single batched call and falls
    /// back to haversine-at-average-speed when no credential is configured,
    /// the location count exceeds the per-request cap, or the call fails or
    /// times out. The only error is a malformed coordinate, rejected before
    /// any strategy runs.
    pub async fn build(&self, coords: &[GeoPoint]) -> Result<TravelMatrix, MatrixError> {
        if let Some(bad) = coords.iter().position(|c| !c.in_bounds()) {
            return Err(MatrixError::InvalidCoordinate(bad));
        }

        if self.api_key.is_empty() {
            return Ok(self.haversine_matrix(coords));
        }

        if coords.len() > self.location_cap {
            warn!(
                locations = coords.len(),
                cap = self.location_cap,
                "location count exceeds external matrix cap, using haversine"
            );
            return Ok(self.haversine_matrix(coords));
        }

        match tokio::time::timeout(self.timeout, self.fetch_external(coords)).await {
            Ok(Ok(matrix)) => Ok(matrix),
            Ok(Err(err)) => {
                warn!(error = %err, "external matrix service unavailable, using haversine");
                Ok(self.haversine_matrix(coords))
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "external matrix call timed out, using haversine");
                Ok(self.haversine_matrix(coords))
            }
        }
    }

    async fn fetch_external(&self, coords: &[GeoPoint]) -> Result<TravelMatrix, FetchError> {
        // The routing service expects [lng, lat] pairs.
        let locations: Vec<[f64; 2]> = coords.iter().map(|c| [c.lng, c.lat]).collect();

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", &self.api_key)
            .json(&serde_json::json!({
                "locations": locations,
                "metrics": ["distance", "duration"],
                "units": "km",
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: ExternalMatrixResponse = response.json().await?;

        let n = coords.len();
        if body.distances.len() != n
            || body.durations.len() != n
            || body.distances.iter().any(|row| row.len() != n)
            || body.durations.iter().any(|row| row.len() != n)
        {
            return Err(FetchError::BadShape);
        }

        let time_min = body
            .durations
            .into_iter()
            .map(|row| row.into_iter().map(|secs| secs / 60.0).collect())
            .collect();

        Ok(TravelMatrix {
            dist_km: body.distances,
            time_min,
            source: MatrixSource::External,
        })
    }

    pub fn haversine_matrix(&self, coords: &[GeoPoint]) -> TravelMatrix {
        let n = coords.len();
        let mut dist_km = vec![vec![0.0; n]; n];
        let mut time_min = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let d = haversine_km(&coords[i], &coords[j]);
                let t = d / self.avg_speed_kmh * 60.0;
                dist_km[i][j] = d;
                dist_km[j][i] = d;
                time_min[i][j] = t;
                time_min[j][i] = t;
            }
        }

        TravelMatrix {
            dist_km,
            time_min,
            source: MatrixSource::Haversine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MatrixBuilder, MatrixError, MatrixSource};
    use crate::config::Config;
    use crate::models::stop::GeoPoint;

    fn seattle_coords() -> Vec<GeoPoint> {
        vec![
            GeoPoint {
                lat: 47.6062,
                lng: -122.3321,
            },
            GeoPoint {
                lat: 47.62,
                lng: -122.34,
            },
            GeoPoint {
                lat: 47.60,
                lng: -122.30,
            },
        ]
    }

    fn builder(config: Config) -> MatrixBuilder {
        MatrixBuilder::new(&config)
    }

    #[tokio::test]
    async fn no_credential_falls_back_to_haversine() {
        let matrix = builder(Config::default())
            .build(&seattle_coords())
            .await
            .unwrap();
        assert_eq!(matrix.source, MatrixSource::Haversine);
        assert_eq!(matrix.len(), 3);
    }

    #[tokio::test]
    async fn location_cap_forces_fallback_despite_credential() {
        let config = Config {
            external_matrix_key: "test-key".to_string(),
            external_matrix_cap: 2,
            ..Config::default()
        };
        let matrix = builder(config).build(&seattle_coords()).await.unwrap();
        assert_eq!(matrix.source, MatrixSource::Haversine);
    }

    #[tokio::test]
    async fn out_of_range_coordinate_is_rejected() {
        let mut coords = seattle_coords();
        coords[1].lat = 91.0;
        let err = builder(Config::default()).build(&coords).await.unwrap_err();
        assert!(matches!(err, MatrixError::InvalidCoordinate(1)));
    }

    #[test]
    fn haversine_matrix_is_symmetric_with_zero_diagonal() {
        let matrix = builder(Config::default()).haversine_matrix(&seattle_coords());
        for i in 0..matrix.len() {
            assert_eq!(matrix.dist(i, i), 0.0);
            assert_eq!(matrix.time(i, i), 0.0);
            for j in 0..matrix.len() {
                assert!((matrix.dist(i, j) - matrix.dist(j, i)).abs() < 1e-12);
                assert!((matrix.time(i, j) - matrix.time(j, i)).abs() < 1e-12);
                assert!(matrix.dist(i, j) >= 0.0);
            }
        }
    }

    #[test]
    fn haversine_matrix_is_deterministic() {
        let b = builder(Config::default());
        let first = b.haversine_matrix(&seattle_coords());
        let second = b.haversine_matrix(&seattle_coords());
        assert_eq!(first.dist_km, second.dist_km);
        assert_eq!(first.time_min, second.time_min);
    }

    #[test]
    fn travel_time_uses_configured_average_speed() {
        let config = Config {
            avg_speed_kmh: 60.0,
            ..Config::default()
        };
        let matrix = builder(config).haversine_matrix(&seattle_coords());
        // At 60 km/h a kilometre takes exactly one minute.
        assert!((matrix.time(0, 1) - matrix.dist(0, 1)).abs() < 1e-9);
    }

    #[test]
    fn scale_time_applies_to_both_directions() {
        let mut matrix = builder(Config::default()).haversine_matrix(&seattle_coords());
        let before = matrix.time(0, 1);
        matrix.scale_time(0, 1, 2.0);
        assert!((matrix.time(0, 1) - 2.0 * before).abs() < 1e-9);
        assert!((matrix.time(1, 0) - 2.0 * before).abs() < 1e-9);
    }
}
