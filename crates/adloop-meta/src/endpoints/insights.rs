// ABOUTME: Performance insights for an account, campaign, ad set, or ad.
// ABOUTME: Time ranges are either a named Graph preset or an explicit since/until date pair.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::GraphClient;
use crate::endpoints::{params, put_opt};
use crate::error::{GraphError, ToolError};
use crate::validate::{INSIGHTS_LEVEL, require_id};

pub const INSIGHTS_FIELDS: &str = "account_id,account_name,campaign_id,campaign_name,adset_id,adset_name,ad_id,ad_name,impressions,clicks,spend,cpc,cpm,ctr,reach,frequency,actions,action_values,conversions,unique_clicks,cost_per_action_type";

pub const DATE_PRESETS: &[&str] = &[
    "today",
    "yesterday",
    "this_month",
    "last_month",
    "this_quarter",
    "maximum",
    "data_maximum",
    "last_3d",
    "last_7d",
    "last_14d",
    "last_28d",
    "last_30d",
    "last_90d",
    "last_week_mon_sun",
    "last_week_sun_sat",
    "last_quarter",
    "last_year",
    "this_week_mon_today",
    "this_week_sun_today",
    "this_year",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A preset name like `last_7d`, or `{"since": "...", "until": "..."}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimeRange {
    Preset(String),
    Custom { since: String, until: String },
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::Preset("maximum".to_string())
    }
}

impl TimeRange {
    /// Validate and render as the request parameter Graph expects.
    pub fn to_param(&self) -> Result<(&'static str, Value), ToolError> {
        match self {
            TimeRange::Preset(name) => {
                let lower = name.to_lowercase();
                if DATE_PRESETS.contains(&lower.as_str()) {
                    Ok(("date_preset", json!(lower)))
                } else {
                    Err(ToolError::invalid_time_range(name))
                }
            }
            TimeRange::Custom { since, until } => {
                let parse = |s: &str| NaiveDate::parse_from_str(s, DATE_FORMAT);
                match (parse(since), parse(until)) {
                    (Ok(from), Ok(to)) if from <= to => {
                        Ok(("time_range", json!({ "since": since, "until": until })))
                    }
                    (Ok(_), Ok(_)) => Err(ToolError::invalid_time_range(format!(
                        "since {} is after until {}",
                        since, until
                    ))),
                    _ => Err(ToolError::invalid_time_range(format!("since={} until={}", since, until))),
                }
            }
        }
    }
}

fn default_level() -> String {
    "ad".to_string()
}

fn default_limit() -> u32 {
    25
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightsRequest {
    /// Account (with or without `act_`), campaign, ad set, or ad id.
    pub object_id: String,
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub breakdown: Option<String>,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub after: Option<String>,
}

impl InsightsRequest {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            time_range: TimeRange::default(),
            breakdown: None,
            level: default_level(),
            limit: default_limit(),
            after: None,
        }
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self
    }
}

impl GraphClient {
    pub async fn insights(&self, req: &InsightsRequest) -> Result<Value, GraphError> {
        let id = require_id(&req.object_id)?;
        let level = INSIGHTS_LEVEL.check(&req.level)?.to_lowercase();
        let (range_key, range_value) = req.time_range.to_param()?;

        let mut p = params(json!({
            "fields": INSIGHTS_FIELDS,
            "level": level,
            "limit": req.limit,
        }));
        p.insert(range_key.to_string(), range_value);
        put_opt(&mut p, "breakdowns", req.breakdown.clone().filter(|b| !b.is_empty()));
        put_opt(&mut p, "after", req.after.clone());

        self.get(&format!("{}/insights", id), p).await
    }
}
