// ABOUTME: Campaign budget schedules for planned high-demand periods.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::GraphClient;
use crate::endpoints::params;
use crate::error::{GraphError, ToolError};
use crate::validate::{BUDGET_VALUE_TYPE, require_id};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBudgetSchedule {
    pub campaign_id: String,
    /// Absolute amount in cents, or a multiplier such as 2 for double.
    pub budget_value: u64,
    pub budget_value_type: String,
    /// Unix timestamps.
    pub time_start: i64,
    pub time_end: i64,
}

impl GraphClient {
    pub async fn create_budget_schedule(&self, args: &CreateBudgetSchedule) -> Result<Value, GraphError> {
        let campaign = require_id(&args.campaign_id)?;
        let value_type = BUDGET_VALUE_TYPE.check(&args.budget_value_type)?;
        if args.time_end <= args.time_start {
            return Err(ToolError::arg_invalid(
                "time_end",
                "int",
                args.time_end,
                format!("time_end must be after time_start ({})", args.time_start),
            )
            .into());
        }
        self.post(
            &format!("{}/budget_schedules", campaign),
            params(json!({
                "budget_value": args.budget_value,
                "budget_value_type": value_type,
                "time_start": args.time_start,
                "time_end": args.time_end,
            })),
        )
        .await
    }
}
