use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};

use crate::bus::RouteEventBus;
use crate::config::Config;
use crate::matrix::MatrixBuilder;
use crate::models::depot::Depot;
use crate::models::job::{Job, OptimizationRequest};
use crate::models::route::{Route, RouteStop};
use crate::models::stop::Stop;
use crate::models::vehicle::Vehicle;
use crate::observability::metrics::Metrics;

/// One unit of work for the solver pool.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job_id: String,
    pub request: OptimizationRequest,
}

pub struct AppState {
    pub depots: DashMap<i64, Depot>,
    pub stops: DashMap<i64, Stop>,
    pub vehicles: DashMap<i64, Vehicle>,
    pub routes: DashMap<i64, Route>,
    /// Ordered stop entries per route id; each reroute or solve replaces the
    /// whole vector in one write.
    pub route_stops: DashMap<i64, Vec<RouteStop>>,
    pub jobs: DashMap<String, Job>,
    pub job_tx: mpsc::Sender<QueuedJob>,
    pub bus: RouteEventBus,
    /// Serializes reroutes per route so the matrix rebuild and the persisted
    /// ETAs update atomically.
    pub route_locks: DashMap<i64, Arc<Mutex<()>>>,
    pub matrix: MatrixBuilder,
    pub config: Config,
    pub metrics: Metrics,
    pub shutting_down: AtomicBool,
    next_id: AtomicI64,
}

impl AppState {
    pub fn new(config: Config) -> (Self, mpsc::Receiver<QueuedJob>) {
        let (job_tx, job_rx) = mpsc::channel(config.job_queue_size);

        (
            Self {
                depots: DashMap::new(),
                stops: DashMap::new(),
                vehicles: DashMap::new(),
                routes: DashMap::new(),
                route_stops: DashMap::new(),
                jobs: DashMap::new(),
                job_tx,
                bus: RouteEventBus::new(config.bus_subscriber_buffer),
                route_locks: DashMap::new(),
                matrix: MatrixBuilder::new(&config),
                config,
                metrics: Metrics::new(),
                shutting_down: AtomicBool::new(false),
                next_id: AtomicI64::new(1),
            },
            job_rx,
        )
    }

    /// Entity ids start at 1; 0 is reserved for the depot in traffic-event
    /// edge addressing.
    pub fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn route_lock(&self, route_id: i64) -> Arc<Mutex<()>> {
        self.route_locks
            .entry(route_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
