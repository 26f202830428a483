use std::env;

use crate::error::AppError;

pub const DEFAULT_EXTERNAL_MATRIX_URL: &str =
    "https://api.openrouteservice.org/v2/matrix/driving-car";

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub job_queue_size: usize,
    pub worker_pool_size: usize,
    pub external_matrix_url: String,
    pub external_matrix_key: String,
    pub external_matrix_cap: usize,
    pub external_matrix_timeout_ms: u64,
    pub solver_timeout_ms: u64,
    pub service_time_min: f64,
    pub avg_speed_kmh: f64,
    pub bus_subscriber_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            job_queue_size: parse_or_default("JOB_QUEUE_SIZE", 1024)?,
            worker_pool_size: parse_or_default("WORKER_POOL_SIZE", 4)?.max(1),
            external_matrix_url: env::var("EXTERNAL_MATRIX_URL")
                .unwrap_or_else(|_| DEFAULT_EXTERNAL_MATRIX_URL.to_string()),
            external_matrix_key: env::var("EXTERNAL_MATRIX_KEY").unwrap_or_default(),
            external_matrix_cap: parse_or_default("EXTERNAL_MATRIX_CAP", 49)?,
            external_matrix_timeout_ms: parse_or_default("EXTERNAL_MATRIX_TIMEOUT_MS", 10_000)?,
            solver_timeout_ms: parse_or_default("SOLVER_TIMEOUT_MS", 30_000)?,
            service_time_min: parse_or_default("SERVICE_TIME_MIN", 5.0)?,
            avg_speed_kmh: parse_or_default("AVG_SPEED_KMH", 40.0)?,
            bus_subscriber_buffer: parse_or_default("BUS_SUBSCRIBER_BUFFER", 64)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            job_queue_size: 1024,
            worker_pool_size: 4,
            external_matrix_url: DEFAULT_EXTERNAL_MATRIX_URL.to_string(),
            external_matrix_key: String::new(),
            external_matrix_cap: 49,
            external_matrix_timeout_ms: 10_000,
            solver_timeout_ms: 30_000,
            service_time_min: 5.0,
            avg_speed_kmh: 40.0,
            bus_subscriber_buffer: 64,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
