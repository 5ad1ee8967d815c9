// ABOUTME: Ad endpoints: list by account/campaign/ad set, details, create, update, delete.
// ABOUTME: An ad ties an ad set to an existing creative by id.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::GraphClient;
use crate::endpoints::{params, put_cents, put_opt};
use crate::error::{GraphError, ToolError};
use crate::validate::{STATUS, require_account_id, require_arg, require_id};

pub const AD_FIELDS: &str = "id,name,adset_id,campaign_id,status,creative,created_time,updated_time,bid_amount,conversion_domain,tracking_specs";

fn default_limit() -> u32 {
    10
}

fn default_paused() -> String {
    "PAUSED".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAds {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub adset_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAd {
    pub account_id: String,
    pub name: String,
    pub adset_id: String,
    pub creative_id: String,
    #[serde(default = "default_paused")]
    pub status: String,
    #[serde(default)]
    pub bid_amount: Option<u64>,
    #[serde(default)]
    pub tracking_specs: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAd {
    pub ad_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub bid_amount: Option<u64>,
    #[serde(default)]
    pub creative_id: Option<String>,
    #[serde(default)]
    pub tracking_specs: Option<Value>,
}

impl GraphClient {
    /// The narrowest scope wins: ad set, then campaign, then account.
    pub async fn list_ads(&self, args: &ListAds) -> Result<Value, GraphError> {
        let nonblank = |s: &Option<String>| s.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        let endpoint = if let Some(adset) = nonblank(&args.adset_id) {
            format!("{}/ads", adset)
        } else if let Some(campaign) = nonblank(&args.campaign_id) {
            format!("{}/ads", campaign)
        } else if let Some(account) = nonblank(&args.account_id) {
            format!("{}/ads", require_account_id(&account)?)
        } else {
            return Err(ToolError::no_id().into());
        };
        self.get(&endpoint, params(json!({ "fields": AD_FIELDS, "limit": args.limit })))
            .await
    }

    pub async fn ad_details(&self, ad_id: &str) -> Result<Value, GraphError> {
        self.get(require_id(ad_id)?, params(json!({ "fields": AD_FIELDS })))
            .await
    }

    pub async fn create_ad(&self, args: &CreateAd) -> Result<Value, GraphError> {
        let account = require_account_id(&args.account_id)?;
        require_arg("name", &args.name)?;
        require_arg("adset_id", &args.adset_id)?;
        require_arg("creative_id", &args.creative_id)?;
        let status = STATUS.check(&args.status)?;

        let mut p = params(json!({
            "name": args.name,
            "adset_id": args.adset_id,
            "creative": {"creative_id": args.creative_id},
            "status": status,
        }));
        put_cents(&mut p, "bid_amount", args.bid_amount);
        put_opt(&mut p, "tracking_specs", args.tracking_specs.clone());

        let created = self.post(&format!("{}/ads", account), p).await?;
        tracing::info!(ad = ?created.get("id"), adset = %args.adset_id, "created ad");
        Ok(created)
    }

    pub async fn update_ad(&self, args: &UpdateAd) -> Result<Value, GraphError> {
        let id = require_id(&args.ad_id)?;
        let mut p = params(json!({}));
        put_opt(&mut p, "name", args.name.clone());
        put_opt(&mut p, "status", STATUS.check_opt(args.status.as_deref())?);
        put_cents(&mut p, "bid_amount", args.bid_amount);
        put_opt(
            &mut p,
            "creative",
            args.creative_id.as_ref().map(|c| json!({"creative_id": c})),
        );
        put_opt(&mut p, "tracking_specs", args.tracking_specs.clone());

        if p.is_empty() {
            return Err(ToolError::arg_missing(
                "update fields",
                "object",
                "Provide at least one field to update (name, status, bid_amount, creative_id, tracking_specs)",
            )
            .into());
        }
        self.post(id, p).await
    }

    pub async fn delete_ad(&self, ad_id: &str) -> Result<Value, GraphError> {
        self.delete(require_id(ad_id)?).await
    }
}
