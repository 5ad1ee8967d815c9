// ABOUTME: Campaign endpoints: list, details, create, update, delete.
// ABOUTME: Budgets are in the account's minor currency unit (cents) and required unless ad set budgets are used.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::GraphClient;
use crate::endpoints::{params, put_cents, put_opt};
use crate::error::{GraphError, ToolError};
use crate::validate::{
    BID_STRATEGY, DELETE_STRATEGY, EFFECTIVE_STATUS, OBJECTIVE, STATUS, require_account_id, require_arg,
};

pub const CAMPAIGN_FIELDS: &str = "id,name,objective,status,daily_budget,lifetime_budget,buying_type,start_time,stop_time,created_time,updated_time,bid_strategy";

pub const CAMPAIGN_DETAIL_FIELDS: &str = "id,name,objective,status,daily_budget,lifetime_budget,buying_type,start_time,stop_time,created_time,updated_time,bid_strategy,special_ad_categories,special_ad_category_country,budget_remaining,configured_status";

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListCampaigns {
    pub account_id: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub effective_status: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

fn default_paused() -> String {
    "PAUSED".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaign {
    pub account_id: String,
    pub name: String,
    pub objective: String,
    #[serde(default = "default_paused")]
    pub status: String,
    #[serde(default)]
    pub special_ad_categories: Vec<String>,
    #[serde(default)]
    pub daily_budget: Option<u64>,
    #[serde(default)]
    pub lifetime_budget: Option<u64>,
    #[serde(default)]
    pub buying_type: Option<String>,
    #[serde(default)]
    pub bid_strategy: Option<String>,
    #[serde(default)]
    pub bid_cap: Option<u64>,
    #[serde(default)]
    pub spend_cap: Option<u64>,
    #[serde(default)]
    pub campaign_budget_optimization: Option<bool>,
    #[serde(default)]
    pub use_adset_level_budgets: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCampaign {
    pub campaign_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub daily_budget: Option<u64>,
    #[serde(default)]
    pub lifetime_budget: Option<u64>,
    #[serde(default)]
    pub bid_strategy: Option<String>,
    #[serde(default)]
    pub bid_cap: Option<u64>,
    #[serde(default)]
    pub spend_cap: Option<u64>,
}

/// Bulk-detach campaigns from an account.
#[derive(Debug, Clone, Deserialize)]
pub struct UnassociateCampaigns {
    pub account_id: String,
    pub delete_strategy: String,
    /// `YYYY-MM-DD`, used with DELETE_ARCHIVED_BEFORE.
    #[serde(default)]
    pub before_date: Option<String>,
    #[serde(default)]
    pub object_count: Option<u32>,
}

impl GraphClient {
    pub async fn list_campaigns(&self, args: &ListCampaigns) -> Result<Value, GraphError> {
        let account = require_account_id(&args.account_id)?;
        let mut p = params(json!({
            "fields": CAMPAIGN_FIELDS,
            "limit": args.limit,
        }));
        if let Some(status) = EFFECTIVE_STATUS.check_opt(args.effective_status.as_deref())? {
            p.insert("effective_status".into(), json!([status]));
        }
        put_opt(&mut p, "after", args.after.clone());
        self.get(&format!("{}/campaigns", account), p).await
    }

    pub async fn campaign_details(&self, campaign_id: &str) -> Result<Value, GraphError> {
        if campaign_id.trim().is_empty() {
            return Err(ToolError::no_campaign_id().into());
        }
        self.get(campaign_id.trim(), params(json!({ "fields": CAMPAIGN_DETAIL_FIELDS })))
            .await
    }

    pub async fn create_campaign(&self, args: &CreateCampaign) -> Result<Value, GraphError> {
        let account = require_account_id(&args.account_id)?;
        require_arg("name", &args.name)?;
        let objective = OBJECTIVE.check(&args.objective)?;
        let status = STATUS.check(&args.status)?;
        let bid_strategy = BID_STRATEGY.check_opt(args.bid_strategy.as_deref())?;

        if !args.use_adset_level_budgets && args.daily_budget.is_none() && args.lifetime_budget.is_none() {
            return Err(ToolError::arg_missing(
                "daily_budget or lifetime_budget",
                "int",
                "Either daily_budget or lifetime_budget must be provided unless use_adset_level_budgets is true, \
                 e.g. daily_budget=1000 (10 USD) or lifetime_budget=10000 (100 USD)",
            )
            .into());
        }

        let mut p = params(json!({
            "name": args.name,
            "objective": objective,
            "status": status,
            "special_ad_categories": args.special_ad_categories,
        }));
        if !args.use_adset_level_budgets {
            put_cents(&mut p, "daily_budget", args.daily_budget);
            put_cents(&mut p, "lifetime_budget", args.lifetime_budget);
            put_opt(
                &mut p,
                "campaign_budget_optimization",
                args.campaign_budget_optimization.map(|b| b.to_string()),
            );
        }
        put_opt(&mut p, "buying_type", args.buying_type.clone());
        put_opt(&mut p, "bid_strategy", bid_strategy);
        put_cents(&mut p, "bid_cap", args.bid_cap);
        put_cents(&mut p, "spend_cap", args.spend_cap);

        let mut created = self.post(&format!("{}/campaigns", account), p).await?;
        if args.use_adset_level_budgets
            && let Some(obj) = created.as_object_mut()
        {
            obj.insert("budget_strategy".into(), json!("ad_set_level"));
            obj.insert(
                "note".into(),
                json!("Campaign created with ad set level budgets. Set budgets when creating ad sets within this campaign."),
            );
        }
        tracing::info!(campaign = ?created.get("id"), account = %account, "created campaign");
        Ok(created)
    }

    pub async fn update_campaign(&self, args: &UpdateCampaign) -> Result<Value, GraphError> {
        if args.campaign_id.trim().is_empty() {
            return Err(ToolError::no_campaign_id().into());
        }
        let mut p = params(json!({}));
        put_opt(&mut p, "name", args.name.clone());
        put_opt(&mut p, "status", STATUS.check_opt(args.status.as_deref())?);
        put_cents(&mut p, "daily_budget", args.daily_budget);
        put_cents(&mut p, "lifetime_budget", args.lifetime_budget);
        put_opt(&mut p, "bid_strategy", BID_STRATEGY.check_opt(args.bid_strategy.as_deref())?);
        put_cents(&mut p, "bid_cap", args.bid_cap);
        put_cents(&mut p, "spend_cap", args.spend_cap);

        if p.is_empty() {
            return Err(ToolError::arg_missing(
                "update fields",
                "object",
                "Provide at least one field to update (name, status, budgets, bid settings)",
            )
            .into());
        }
        self.post(args.campaign_id.trim(), p).await
    }

    pub async fn delete_campaign(&self, campaign_id: &str) -> Result<Value, GraphError> {
        if campaign_id.trim().is_empty() {
            return Err(ToolError::no_campaign_id().into());
        }
        self.delete(campaign_id.trim()).await
    }

    pub async fn unassociate_campaigns(&self, args: &UnassociateCampaigns) -> Result<Value, GraphError> {
        let account = require_account_id(&args.account_id)?;
        let strategy = DELETE_STRATEGY.check(&args.delete_strategy)?;
        let mut p = params(json!({ "delete_strategy": strategy }));
        put_opt(&mut p, "before_date", args.before_date.clone());
        put_opt(&mut p, "object_count", args.object_count.map(|n| n.to_string()));
        self.request(Method::DELETE, &format!("{}/campaigns", account), p)
            .await
    }
}
