use prometheus::{
    Encoder, Histogram, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub jobs_total: IntCounterVec,
    pub jobs_in_queue: IntGauge,
    pub solve_latency_seconds: HistogramVec,
    pub reroutes_total: IntCounterVec,
    pub route_improvement_pct: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let jobs_total = IntCounterVec::new(
            Opts::new("jobs_total", "Total optimization jobs by outcome"),
            &["outcome"],
        )
        .expect("valid jobs_total metric");

        let jobs_in_queue = IntGauge::new("jobs_in_queue", "Current number of queued jobs")
            .expect("valid jobs_in_queue metric");

        let solve_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "solve_latency_seconds",
                "End-to-end job processing latency in seconds",
            ),
            &["outcome"],
        )
        .expect("valid solve_latency_seconds metric");

        let reroutes_total = IntCounterVec::new(
            Opts::new("reroutes_total", "Total reroute requests by outcome"),
            &["outcome"],
        )
        .expect("valid reroutes_total metric");

        let route_improvement_pct = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "route_improvement_pct",
                "Distance improvement of 2-opt over greedy, percent",
            )
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 40.0]),
        )
        .expect("valid route_improvement_pct metric");

        registry
            .register(Box::new(jobs_total.clone()))
            .expect("register jobs_total");
        registry
            .register(Box::new(jobs_in_queue.clone()))
            .expect("register jobs_in_queue");
        registry
            .register(Box::new(solve_latency_seconds.clone()))
            .expect("register solve_latency_seconds");
        registry
            .register(Box::new(reroutes_total.clone()))
            .expect("register reroutes_total");
        registry
            .register(Box::new(route_improvement_pct.clone()))
            .expect("register route_improvement_pct");

        Self {
            registry,
            jobs_total,
            jobs_in_queue,
            solve_latency_seconds,
            reroutes_total,
            route_improvement_pct,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
