// ABOUTME: The persisted history record: a marketing plan annotated with cost and score.
// ABOUTME: This is the shape stored in the history table and fed back to the plan agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluation::Score;

/// A marketing plan as stored in the history table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    pub id: i64,
    pub product_name: String,
    pub product_url: String,
    pub plan_uuid: String,
    pub plan_name: String,
    pub plan_description: String,
    pub plan_details: String,
    pub budget: f64,
    pub actual_cost: Option<f64>,
    pub plan_evaluation: Option<String>,
    pub plan_score: Option<Score>,
    pub created_at: DateTime<Utc>,
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl HistoryRecord {
    pub fn is_evaluated(&self) -> bool {
        self.plan_score.is_some()
    }
}
