use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub reason: Option<String>,
}

impl Job {
    pub fn queued(id: String) -> Self {
        Self {
            id,
            state: JobState::Queued,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub depot_id: i64,
    pub vehicle_ids: Vec<i64>,
    pub stop_ids: Vec<i64>,
    pub date: NaiveDate,
}
