//! Demo scenario seeding: generates a depot, a vehicle fleet and a spread of
//! delivery stops inside a city bounding box so the optimizer can be driven
//! without real data.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use chrono::NaiveTime;

use crate::models::depot::Depot;
use crate::models::stop::{GeoPoint, Stop, StopStatus};
use crate::models::vehicle::Vehicle;
use crate::state::AppState;

/// (lat_min, lat_max), (lng_min, lng_max) boxes for demo cities.
const CITIES: [(&str, (f64, f64), (f64, f64)); 3] = [
    ("seattle", (47.55, 47.72), (-122.45, -122.25)),
    ("la", (33.90, 34.10), (-118.45, -118.20)),
    ("nyc", (40.65, 40.80), (-74.05, -73.85)),
];

/// Realistic delivery windows: (earliest, latest) in whole hours.
const TIME_WINDOWS: [(u32, u32); 4] = [(8, 12), (10, 14), (12, 16), (14, 18)];

const VEHICLE_CAPACITIES: [f64; 3] = [200.0, 300.0, 500.0];

const STREETS: [&str; 5] = ["Main", "Oak", "Elm", "Pine", "Cedar"];

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioParams {
    #[serde(default = "default_city")]
    pub city: String,
    #[serde(default = "default_num_stops")]
    pub num_stops: usize,
    #[serde(default = "default_num_vehicles")]
    pub num_vehicles: usize,
    pub seed: Option<u64>,
}

fn default_city() -> String {
    "seattle".to_string()
}

fn default_num_stops() -> usize {
    20
}

fn default_num_vehicles() -> usize {
    3
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSeed {
    pub depot_id: i64,
    pub vehicle_ids: Vec<i64>,
    pub stop_ids: Vec<i64>,
    pub city: String,
    pub num_stops: usize,
    pub num_vehicles: usize,
}

/// Seeds the entity store and returns ids ready to submit to the optimizer.
pub fn generate_scenario(state: &AppState, params: &ScenarioParams) -> ScenarioSeed {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (city, lat_bounds, lng_bounds) = CITIES
        .iter()
        .find(|(name, _, _)| *name == params.city)
        .copied()
        .unwrap_or(CITIES[0]);

    let depot_id = state.next_id();
    state.depots.insert(
        depot_id,
        Depot {
            id: depot_id,
            name: format!("{} Distribution Center", title_case(city)),
            location: GeoPoint {
                lat: (lat_bounds.0 + lat_bounds.1) / 2.0,
                lng: (lng_bounds.0 + lng_bounds.1) / 2.0,
            },
            open_time: hm(6, 0),
            close_time: hm(22, 0),
        },
    );

    let mut vehicle_ids = Vec::with_capacity(params.num_vehicles);
    for i in 0..params.num_vehicles {
        let id = state.next_id();
        state.vehicles.insert(
            id,
            Vehicle {
                id,
                depot_id,
                capacity_kg: VEHICLE_CAPACITIES[rng.gen_range(0..VEHICLE_CAPACITIES.len())],
                driver_name: format!("Driver {}", i + 1),
            },
        );
        vehicle_ids.push(id);
    }

    let mut stop_ids = Vec::with_capacity(params.num_stops);
    for _ in 0..params.num_stops {
        let (earliest_h, latest_h) = TIME_WINDOWS[rng.gen_range(0..TIME_WINDOWS.len())];
        let id = state.next_id();
        state.stops.insert(
            id,
            Stop {
                id,
                address: format!(
                    "{} {} St, {}",
                    rng.gen_range(100..10_000),
                    STREETS[rng.gen_range(0..STREETS.len())],
                    title_case(city)
                ),
                location: GeoPoint {
                    lat: rng.gen_range(lat_bounds.0..lat_bounds.1),
                    lng: rng.gen_range(lng_bounds.0..lng_bounds.1),
                },
                earliest_time: hm(earliest_h, 0),
                latest_time: hm(latest_h, 0),
                package_weight_kg: (rng.gen_range(1.0..30.0_f64) * 10.0).round() / 10.0,
                status: StopStatus::Pending,
            },
        );
        stop_ids.push(id);
    }

    ScenarioSeed {
        depot_id,
        vehicle_ids,
        stop_ids,
        city: city.to_string(),
        num_stops: params.num_stops,
        num_vehicles: params.num_vehicles,
    }
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("static clock time")
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
