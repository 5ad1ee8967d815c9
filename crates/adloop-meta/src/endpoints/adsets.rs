// ABOUTME: Ad set endpoints: list by account or campaign, details, create, update, delete.
// ABOUTME: Creation fills a broad default targeting and validates app-install promoted objects.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::GraphClient;
use crate::endpoints::{params, put_cents, put_opt};
use crate::error::{GraphError, ToolError};
use crate::validate::{
    BID_STRATEGY, BILLING_EVENT, DESTINATION_TYPE, OPTIMIZATION_GOAL, STATUS, require_account_id,
    require_arg, require_id,
};

pub const ADSET_FIELDS: &str = "id,name,campaign_id,status,daily_budget,lifetime_budget,targeting,bid_amount,bid_strategy,optimization_goal,billing_event,start_time,end_time,created_time,updated_time,is_dynamic_creative,frequency_control_specs{event,interval_days,max_frequency}";

pub const ADSET_DETAIL_FIELDS: &str = "id,name,campaign_id,status,frequency_control_specs{event,interval_days,max_frequency},daily_budget,lifetime_budget,targeting,bid_amount,bid_strategy,optimization_goal,billing_event,start_time,end_time,created_time,updated_time,attribution_spec,destination_type,promoted_object,pacing_type,budget_remaining,dsa_beneficiary,is_dynamic_creative";

const APP_STORE_HOSTS: [&str; 3] = ["apps.apple.com", "play.google.com", "itunes.apple.com"];

fn default_limit() -> u32 {
    10
}

fn default_paused() -> String {
    "PAUSED".to_string()
}

/// Used when the agent supplies no targeting at all.
pub fn default_targeting() -> Value {
    json!({
        "age_min": 18,
        "age_max": 65,
        "geo_locations": {"countries": ["US"]},
        "targeting_automation": {"advantage_audience": 1}
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAdSets {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAdSet {
    pub account_id: String,
    pub campaign_id: String,
    pub name: String,
    pub optimization_goal: String,
    pub billing_event: String,
    #[serde(default = "default_paused")]
    pub status: String,
    #[serde(default)]
    pub daily_budget: Option<u64>,
    #[serde(default)]
    pub lifetime_budget: Option<u64>,
    #[serde(default)]
    pub targeting: Option<Value>,
    #[serde(default)]
    pub bid_amount: Option<u64>,
    #[serde(default)]
    pub bid_strategy: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub dsa_beneficiary: Option<String>,
    #[serde(default)]
    pub promoted_object: Option<Value>,
    #[serde(default)]
    pub destination_type: Option<String>,
    #[serde(default)]
    pub is_dynamic_creative: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAdSet {
    pub adset_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub daily_budget: Option<u64>,
    #[serde(default)]
    pub lifetime_budget: Option<u64>,
    #[serde(default)]
    pub bid_amount: Option<u64>,
    #[serde(default)]
    pub bid_strategy: Option<String>,
    #[serde(default)]
    pub optimization_goal: Option<String>,
    #[serde(default)]
    pub targeting: Option<Value>,
    #[serde(default)]
    pub frequency_control_specs: Option<Value>,
}

/// App install ad sets must point at a store listing.
fn check_promoted_object(optimization_goal: &str, promoted: Option<&Value>) -> Result<(), ToolError> {
    if optimization_goal != "APP_INSTALLS" {
        return Ok(());
    }
    let Some(obj) = promoted else {
        return Err(ToolError::arg_missing(
            "promoted_object",
            "dict",
            "promoted_object is required for APP_INSTALLS optimization goal, with 'application_id' and 'object_store_url'",
        ));
    };
    let store_url = match (obj.get("application_id"), obj.get("object_store_url").and_then(|u| u.as_str())) {
        (Some(_), Some(url)) => url,
        _ => {
            return Err(ToolError::arg_invalid(
                "promoted_object",
                "dict",
                obj,
                "promoted_object must contain at least 'application_id' and 'object_store_url'",
            ));
        }
    };
    if !APP_STORE_HOSTS.iter().any(|host| store_url.contains(host)) {
        return Err(ToolError::arg_invalid(
            "promoted_object",
            "dict",
            obj,
            "object_store_url must be an App Store (apps.apple.com) or Google Play (play.google.com) link",
        ));
    }
    Ok(())
}

impl GraphClient {
    pub async fn list_adsets(&self, args: &ListAdSets) -> Result<Value, GraphError> {
        let endpoint = match (&args.campaign_id, &args.account_id) {
            (Some(campaign), _) if !campaign.trim().is_empty() => format!("{}/adsets", campaign.trim()),
            (_, Some(account)) => format!("{}/adsets", require_account_id(account)?),
            _ => return Err(ToolError::no_id().into()),
        };
        self.get(&endpoint, params(json!({ "fields": ADSET_FIELDS, "limit": args.limit })))
            .await
    }

    pub async fn adset_details(&self, adset_id: &str) -> Result<Value, GraphError> {
        let id = require_id(adset_id)?;
        self.get(id, params(json!({ "fields": ADSET_DETAIL_FIELDS }))).await
    }

    pub async fn create_adset(&self, args: &CreateAdSet) -> Result<Value, GraphError> {
        let account = require_account_id(&args.account_id)?;
        require_arg("campaign_id", &args.campaign_id)?;
        require_arg("name", &args.name)?;
        let optimization_goal = OPTIMIZATION_GOAL.check(&args.optimization_goal)?;
        let billing_event = BILLING_EVENT.check(&args.billing_event)?;
        let status = STATUS.check(&args.status)?;
        let bid_strategy = BID_STRATEGY.check_opt(args.bid_strategy.as_deref())?;
        let destination_type = DESTINATION_TYPE.check_opt(args.destination_type.as_deref())?;
        check_promoted_object(&optimization_goal, args.promoted_object.as_ref())?;

        let targeting = args
            .targeting
            .clone()
            .filter(|t| t.as_object().is_some_and(|o| !o.is_empty()))
            .unwrap_or_else(default_targeting);

        let mut p = params(json!({
            "name": args.name,
            "campaign_id": args.campaign_id,
            "status": status,
            "optimization_goal": optimization_goal,
            "billing_event": billing_event,
            "targeting": targeting,
        }));
        put_cents(&mut p, "daily_budget", args.daily_budget);
        put_cents(&mut p, "lifetime_budget", args.lifetime_budget);
        put_cents(&mut p, "bid_amount", args.bid_amount);
        put_opt(&mut p, "bid_strategy", bid_strategy);
        put_opt(&mut p, "start_time", args.start_time.clone());
        put_opt(&mut p, "end_time", args.end_time.clone());
        put_opt(&mut p, "dsa_beneficiary", args.dsa_beneficiary.clone());
        put_opt(&mut p, "promoted_object", args.promoted_object.clone());
        put_opt(&mut p, "destination_type", destination_type);
        put_opt(&mut p, "is_dynamic_creative", args.is_dynamic_creative.map(|b| b.to_string()));

        let created = self.post(&format!("{}/adsets", account), p).await?;
        tracing::info!(adset = ?created.get("id"), campaign = %args.campaign_id, "created ad set");
        Ok(created)
    }

    pub async fn update_adset(&self, args: &UpdateAdSet) -> Result<Value, GraphError> {
        let id = require_id(&args.adset_id)?;
        let mut p = params(json!({}));
        put_opt(&mut p, "name", args.name.clone());
        put_opt(&mut p, "status", STATUS.check_opt(args.status.as_deref())?);
        put_cents(&mut p, "daily_budget", args.daily_budget);
        put_cents(&mut p, "lifetime_budget", args.lifetime_budget);
        put_cents(&mut p, "bid_amount", args.bid_amount);
        put_opt(&mut p, "bid_strategy", BID_STRATEGY.check_opt(args.bid_strategy.as_deref())?);
        put_opt(
            &mut p,
            "optimization_goal",
            OPTIMIZATION_GOAL.check_opt(args.optimization_goal.as_deref())?,
        );
        put_opt(&mut p, "targeting", args.targeting.clone());
        put_opt(&mut p, "frequency_control_specs", args.frequency_control_specs.clone());

        if p.is_empty() {
            return Err(ToolError::arg_missing(
                "update fields",
                "object",
                "Provide at least one field to update",
            )
            .into());
        }
        self.post(id, p).await
    }

    pub async fn delete_adset(&self, adset_id: &str) -> Result<Value, GraphError> {
        self.delete(require_id(adset_id)?).await
    }
}
