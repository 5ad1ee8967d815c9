// ABOUTME: Agent tools over the Meta Graph endpoint wrappers, one MetaOp per endpoint operation.
// ABOUTME: API and argument errors return as error results; a rejected token aborts the agent run.

use std::sync::Arc;

use adloop_meta::endpoints::{
    AccountInfo, CreateAd, CreateAdSet, CreateBudgetSchedule, CreateCampaign, CreateCreative, EstimateAudience,
    GetAdImages, GraphCall, InsightsRequest, InterestSuggestions, ListAdAccounts, ListAdSets, ListAds, ListCampaigns,
    SearchDemographics, SearchGeoLocations, SearchInterests, SearchPages, UnassociateCampaigns, UpdateAd, UpdateAdSet,
    UpdateCampaign, UpdateCreative, UploadAdImage,
};
use adloop_meta::{GraphClient, GraphError, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::tools::{Tool, ToolResult, parse_args};

/// Every Meta operation exposed to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaOp {
    ListAdAccounts,
    GetAccountInfo,
    ListPages,
    ListCampaigns,
    GetCampaignDetails,
    CreateCampaign,
    UpdateCampaign,
    DeleteCampaign,
    UnassociateCampaigns,
    ListAdSets,
    GetAdSetDetails,
    CreateAdSet,
    UpdateAdSet,
    DeleteAdSet,
    ListAds,
    GetAdDetails,
    CreateAd,
    UpdateAd,
    DeleteAd,
    ListCreatives,
    GetAdCreatives,
    GetCreativeDetails,
    CreateCreative,
    UpdateCreative,
    DeleteCreative,
    GetAdImageUrls,
    UploadAdImage,
    GetAdImage,
    GetInsights,
    SearchInterests,
    GetInterestSuggestions,
    SearchBehaviors,
    SearchDemographics,
    SearchGeoLocations,
    EstimateAudienceSize,
    CreateBudgetSchedule,
    GraphApiCall,
}

impl MetaOp {
    pub const ALL: [MetaOp; 37] = [
        MetaOp::ListAdAccounts,
        MetaOp::GetAccountInfo,
        MetaOp::ListPages,
        MetaOp::ListCampaigns,
        MetaOp::GetCampaignDetails,
        MetaOp::CreateCampaign,
        MetaOp::UpdateCampaign,
        MetaOp::DeleteCampaign,
        MetaOp::UnassociateCampaigns,
        MetaOp::ListAdSets,
        MetaOp::GetAdSetDetails,
        MetaOp::CreateAdSet,
        MetaOp::UpdateAdSet,
        MetaOp::DeleteAdSet,
        MetaOp::ListAds,
        MetaOp::GetAdDetails,
        MetaOp::CreateAd,
        MetaOp::UpdateAd,
        MetaOp::DeleteAd,
        MetaOp::ListCreatives,
        MetaOp::GetAdCreatives,
        MetaOp::GetCreativeDetails,
        MetaOp::CreateCreative,
        MetaOp::UpdateCreative,
        MetaOp::DeleteCreative,
        MetaOp::GetAdImageUrls,
        MetaOp::UploadAdImage,
        MetaOp::GetAdImage,
        MetaOp::GetInsights,
        MetaOp::SearchInterests,
        MetaOp::GetInterestSuggestions,
        MetaOp::SearchBehaviors,
        MetaOp::SearchDemographics,
        MetaOp::SearchGeoLocations,
        MetaOp::EstimateAudienceSize,
        MetaOp::CreateBudgetSchedule,
        MetaOp::GraphApiCall,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetaOp::ListAdAccounts => "list_ad_accounts",
            MetaOp::GetAccountInfo => "get_account_info",
            MetaOp::ListPages => "list_pages",
            MetaOp::ListCampaigns => "list_campaigns",
            MetaOp::GetCampaignDetails => "get_campaign_details",
            MetaOp::CreateCampaign => "create_campaign",
            MetaOp::UpdateCampaign => "update_campaign",
            MetaOp::DeleteCampaign => "delete_campaign",
            MetaOp::UnassociateCampaigns => "unassociate_campaigns",
            MetaOp::ListAdSets => "list_adsets",
            MetaOp::GetAdSetDetails => "get_adset_details",
            MetaOp::CreateAdSet => "create_adset",
            MetaOp::UpdateAdSet => "update_adset",
            MetaOp::DeleteAdSet => "delete_adset",
            MetaOp::ListAds => "list_ads",
            MetaOp::GetAdDetails => "get_ad_details",
            MetaOp::CreateAd => "create_ad",
            MetaOp::UpdateAd => "update_ad",
            MetaOp::DeleteAd => "delete_ad",
            MetaOp::ListCreatives => "list_creatives",
            MetaOp::GetAdCreatives => "get_ad_creatives",
            MetaOp::GetCreativeDetails => "get_creative_details",
            MetaOp::CreateCreative => "create_creative",
            MetaOp::UpdateCreative => "update_creative",
            MetaOp::DeleteCreative => "delete_creative",
            MetaOp::GetAdImageUrls => "get_ad_image_urls",
            MetaOp::UploadAdImage => "upload_ad_image",
            MetaOp::GetAdImage => "get_ad_image",
            MetaOp::GetInsights => "get_insights",
            MetaOp::SearchInterests => "search_interests",
            MetaOp::GetInterestSuggestions => "get_interest_suggestions",
            MetaOp::SearchBehaviors => "search_behaviors",
            MetaOp::SearchDemographics => "search_demographics",
            MetaOp::SearchGeoLocations => "search_geo_locations",
            MetaOp::EstimateAudienceSize => "estimate_audience_size",
            MetaOp::CreateBudgetSchedule => "create_budget_schedule",
            MetaOp::GraphApiCall => "graph_api_call",
        }
    }

    pub fn from_name(name: &str) -> Option<MetaOp> {
        MetaOp::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Whether the operation only reads from the ad account.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            MetaOp::ListAdAccounts
                | MetaOp::GetAccountInfo
                | MetaOp::ListPages
                | MetaOp::ListCampaigns
                | MetaOp::GetCampaignDetails
                | MetaOp::ListAdSets
                | MetaOp::GetAdSetDetails
                | MetaOp::ListAds
                | MetaOp::GetAdDetails
                | MetaOp::ListCreatives
                | MetaOp::GetAdCreatives
                | MetaOp::GetCreativeDetails
                | MetaOp::GetAdImageUrls
                | MetaOp::GetAdImage
                | MetaOp::GetInsights
                | MetaOp::SearchInterests
                | MetaOp::GetInterestSuggestions
                | MetaOp::SearchBehaviors
                | MetaOp::SearchDemographics
                | MetaOp::SearchGeoLocations
                | MetaOp::EstimateAudienceSize
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            MetaOp::ListAdAccounts => "List the ad accounts the authenticated user can access, with balance, currency, and spend.",
            MetaOp::GetAccountInfo => "Get details of one ad account. The result includes dsa_required for accounts in EU countries, where ad sets need a dsa_beneficiary.",
            MetaOp::ListPages => "List the Facebook pages usable by an ad account, optionally filtered by a case-insensitive name query. Creatives need a page_id.",
            MetaOp::ListCampaigns => "List campaigns of an ad account, optionally filtered by effective status.",
            MetaOp::GetCampaignDetails => "Get details of a campaign by id.",
            MetaOp::CreateCampaign => "Create a campaign. Budgets are integers in the account's minor currency unit (cents). Campaigns are created PAUSED unless status says otherwise.",
            MetaOp::UpdateCampaign => "Update a campaign's name, status, budgets, or bid settings.",
            MetaOp::DeleteCampaign => "Delete a campaign by id.",
            MetaOp::UnassociateCampaigns => "Bulk-remove campaigns from an ad account using a delete strategy.",
            MetaOp::ListAdSets => "List ad sets of a campaign, or of an ad account when no campaign is given.",
            MetaOp::GetAdSetDetails => "Get details of an ad set by id, including targeting and budget remaining.",
            MetaOp::CreateAdSet => "Create an ad set under a campaign. Budgets are in cents. When targeting is omitted a broad US audience aged 18-65 is used.",
            MetaOp::UpdateAdSet => "Update an ad set's name, status, budgets, bidding, optimization goal, or targeting.",
            MetaOp::DeleteAdSet => "Delete an ad set by id.",
            MetaOp::ListAds => "List ads of an ad set, a campaign, or an ad account, most specific scope first.",
            MetaOp::GetAdDetails => "Get details of an ad by id.",
            MetaOp::CreateAd => "Create an ad in an ad set from an existing creative.",
            MetaOp::UpdateAd => "Update an ad's name, status, bid, creative, or tracking specs.",
            MetaOp::DeleteAd => "Delete an ad by id.",
            MetaOp::ListCreatives => "List ad creatives of an ad account.",
            MetaOp::GetAdCreatives => "List the creatives attached to an ad.",
            MetaOp::GetCreativeDetails => "Get details of a creative by id.",
            MetaOp::CreateCreative => "Create a single-image link creative for a page. Provide image_hash or a public picture_url.",
            MetaOp::UpdateCreative => "Update a creative's name or status.",
            MetaOp::DeleteCreative => "Delete a creative by id.",
            MetaOp::GetAdImageUrls => "Get the image URLs used by an ad's creatives.",
            MetaOp::UploadAdImage => "Upload a picture to the ad account's image library from a public image_url or base64 image_data. Returns the image_hash to use in create_creative.",
            MetaOp::GetAdImage => "Look up uploaded images of an ad account by hash, with their URLs and dimensions.",
            MetaOp::GetInsights => "Get performance insights (impressions, clicks, spend, CTR, CPC, actions) for an account, campaign, ad set, or ad.",
            MetaOp::SearchInterests => "Search targeting interests by keyword. Use the returned ids in targeting.flexible_spec.",
            MetaOp::GetInterestSuggestions => "Suggest related targeting interests for a list of interest names.",
            MetaOp::SearchBehaviors => "List behavior targeting options.",
            MetaOp::SearchDemographics => "List demographic targeting options of one class.",
            MetaOp::SearchGeoLocations => "Search locations (countries, regions, cities, zips) for geo targeting.",
            MetaOp::EstimateAudienceSize => "Estimate the audience size reached by a targeting spec. targeting must include geo_locations.",
            MetaOp::CreateBudgetSchedule => "Schedule a temporary budget increase for a campaign between two Unix timestamps.",
            MetaOp::GraphApiCall => "Call any Graph API endpoint directly when no dedicated tool fits. The access token is added automatically.",
        }
    }

    pub fn schema(&self) -> Value {
        let account = json!({"type": "string", "description": "Ad account id, with or without the act_ prefix."});
        let limit = |default: u32| json!({"type": "integer", "description": format!("Maximum results. Defaults to {}.", default)});
        let cents = |what: &str| json!({"type": "integer", "description": format!("{} in cents of the account currency.", what)});
        let status = json!({"type": "string", "enum": ["ACTIVE", "PAUSED", "DELETED", "ARCHIVED"]});
        let id = |what: &str| json!({"type": "string", "description": format!("The {} id.", what)});

        match self {
            MetaOp::ListAdAccounts => object(json!({"limit": limit(10)}), &[]),
            MetaOp::GetAccountInfo => object(json!({"account_id": account}), &["account_id"]),
            MetaOp::ListPages => object(
                json!({
                    "account_id": account,
                    "query": {"type": "string", "description": "Case-insensitive part of the page name."}
                }),
                &["account_id"],
            ),
            MetaOp::ListCampaigns => object(
                json!({
                    "account_id": account,
                    "limit": limit(10),
                    "effective_status": {"type": "string", "description": "e.g. ACTIVE, PAUSED, ARCHIVED."},
                    "after": {"type": "string", "description": "Pagination cursor."}
                }),
                &["account_id"],
            ),
            MetaOp::GetCampaignDetails | MetaOp::DeleteCampaign => {
                object(json!({"campaign_id": id("campaign")}), &["campaign_id"])
            }
            MetaOp::CreateCampaign => object(
                json!({
                    "account_id": account,
                    "name": {"type": "string"},
                    "objective": {"type": "string", "description": "OUTCOME_AWARENESS, OUTCOME_TRAFFIC, OUTCOME_ENGAGEMENT, OUTCOME_LEADS, OUTCOME_SALES, or OUTCOME_APP_PROMOTION."},
                    "status": status,
                    "special_ad_categories": {"type": "array", "items": {"type": "string"}},
                    "daily_budget": cents("Daily budget"),
                    "lifetime_budget": cents("Lifetime budget"),
                    "buying_type": {"type": "string"},
                    "bid_strategy": {"type": "string", "description": "LOWEST_COST_WITHOUT_CAP, LOWEST_COST_WITH_BID_CAP, COST_CAP, or LOWEST_COST_WITH_MIN_ROAS."},
                    "bid_cap": cents("Bid cap"),
                    "spend_cap": cents("Spend cap"),
                    "campaign_budget_optimization": {"type": "boolean"},
                    "use_adset_level_budgets": {"type": "boolean", "description": "Set when budgets live on the ad sets instead of the campaign."}
                }),
                &["account_id", "name", "objective"],
            ),
            MetaOp::UpdateCampaign => object(
                json!({
                    "campaign_id": id("campaign"),
                    "name": {"type": "string"},
                    "status": status,
                    "daily_budget": cents("Daily budget"),
                    "lifetime_budget": cents("Lifetime budget"),
                    "bid_strategy": {"type": "string"},
                    "bid_cap": cents("Bid cap"),
                    "spend_cap": cents("Spend cap")
                }),
                &["campaign_id"],
            ),
            MetaOp::UnassociateCampaigns => object(
                json!({
                    "account_id": account,
                    "delete_strategy": {"type": "string", "enum": ["DELETE_ANY", "DELETE_OLDEST", "DELETE_ARCHIVED_BEFORE"]},
                    "before_date": {"type": "string", "description": "YYYY-MM-DD, required for DELETE_ARCHIVED_BEFORE."},
                    "object_count": {"type": "integer"}
                }),
                &["account_id", "delete_strategy"],
            ),
            MetaOp::ListAdSets => object(
                json!({"account_id": account, "campaign_id": id("campaign"), "limit": limit(10)}),
                &[],
            ),
            MetaOp::GetAdSetDetails | MetaOp::DeleteAdSet => {
                object(json!({"adset_id": id("ad set")}), &["adset_id"])
            }
            MetaOp::CreateAdSet => object(
                json!({
                    "account_id": account,
                    "campaign_id": id("campaign"),
                    "name": {"type": "string"},
                    "optimization_goal": {"type": "string", "description": "e.g. LINK_CLICKS, REACH, IMPRESSIONS, LANDING_PAGE_VIEWS, OFFSITE_CONVERSIONS."},
                    "billing_event": {"type": "string", "description": "e.g. IMPRESSIONS, LINK_CLICKS."},
                    "status": status,
                    "daily_budget": cents("Daily budget"),
                    "lifetime_budget": cents("Lifetime budget"),
                    "targeting": {"type": "object", "description": "Targeting spec with geo_locations, age_min, age_max, flexible_spec, etc."},
                    "bid_amount": cents("Bid amount"),
                    "bid_strategy": {"type": "string"},
                    "start_time": {"type": "string", "description": "ISO 8601 start time."},
                    "end_time": {"type": "string", "description": "ISO 8601 end time, required with lifetime_budget."},
                    "dsa_beneficiary": {"type": "string", "description": "Who benefits from the ad; required for EU accounts."},
                    "promoted_object": {"type": "object", "description": "For APP_INSTALLS: application_id and object_store_url."},
                    "destination_type": {"type": "string"},
                    "is_dynamic_creative": {"type": "boolean"}
                }),
                &["account_id", "campaign_id", "name", "optimization_goal", "billing_event"],
            ),
            MetaOp::UpdateAdSet => object(
                json!({
                    "adset_id": id("ad set"),
                    "name": {"type": "string"},
                    "status": status,
                    "daily_budget": cents("Daily budget"),
                    "lifetime_budget": cents("Lifetime budget"),
                    "bid_amount": cents("Bid amount"),
                    "bid_strategy": {"type": "string"},
                    "optimization_goal": {"type": "string"},
                    "targeting": {"type": "object"}
                }),
                &["adset_id"],
            ),
            MetaOp::ListAds => object(
                json!({
                    "account_id": account,
                    "campaign_id": id("campaign"),
                    "adset_id": id("ad set"),
                    "limit": limit(10)
                }),
                &[],
            ),
            MetaOp::GetAdDetails | MetaOp::DeleteAd | MetaOp::GetAdCreatives | MetaOp::GetAdImageUrls => {
                object(json!({"ad_id": id("ad")}), &["ad_id"])
            }
            MetaOp::CreateAd => object(
                json!({
                    "account_id": account,
                    "name": {"type": "string"},
                    "adset_id": id("ad set"),
                    "creative_id": id("creative"),
                    "status": status,
                    "bid_amount": cents("Bid amount"),
                    "tracking_specs": {"type": "array", "items": {"type": "object"}}
                }),
                &["account_id", "name", "adset_id", "creative_id"],
            ),
            MetaOp::UpdateAd => object(
                json!({
                    "ad_id": id("ad"),
                    "name": {"type": "string"},
                    "status": status,
                    "bid_amount": cents("Bid amount"),
                    "creative_id": id("creative"),
                    "tracking_specs": {"type": "array", "items": {"type": "object"}}
                }),
                &["ad_id"],
            ),
            MetaOp::ListCreatives => object(json!({"account_id": account, "limit": limit(25)}), &["account_id"]),
            MetaOp::GetCreativeDetails | MetaOp::DeleteCreative => {
                object(json!({"creative_id": id("creative")}), &["creative_id"])
            }
            MetaOp::CreateCreative => object(
                json!({
                    "account_id": account,
                    "name": {"type": "string"},
                    "page_id": id("Facebook page"),
                    "link_url": {"type": "string", "description": "Landing page URL."},
                    "image_hash": {"type": "string"},
                    "picture_url": {"type": "string", "description": "Public image URL, used when there is no image_hash."},
                    "message": {"type": "string", "description": "Primary text."},
                    "headline": {"type": "string"},
                    "description": {"type": "string"},
                    "call_to_action_type": {"type": "string", "description": "e.g. SHOP_NOW, LEARN_MORE, SIGN_UP."},
                    "instagram_actor_id": {"type": "string"}
                }),
                &["account_id", "name", "page_id", "link_url"],
            ),
            MetaOp::UpdateCreative => object(
                json!({"creative_id": id("creative"), "name": {"type": "string"}, "status": status}),
                &["creative_id"],
            ),
            MetaOp::GetInsights => object(
                json!({
                    "object_id": {"type": "string", "description": "Account (act_...), campaign, ad set, or ad id."},
                    "time_range": {
                        "description": "A preset such as last_7d, last_30d, maximum, or {\"since\": \"YYYY-MM-DD\", \"until\": \"YYYY-MM-DD\"}.",
                        "anyOf": [
                            {"type": "string"},
                            {"type": "object", "properties": {"since": {"type": "string"}, "until": {"type": "string"}}, "required": ["since", "until"]}
                        ]
                    },
                    "breakdown": {"type": "string", "description": "e.g. age, gender, country, publisher_platform."},
                    "level": {"type": "string", "enum": ["ad", "adset", "campaign", "account"]},
                    "limit": limit(25),
                    "after": {"type": "string", "description": "Pagination cursor."}
                }),
                &["object_id"],
            ),
            MetaOp::SearchInterests => object(
                json!({"query": {"type": "string"}, "limit": limit(20)}),
                &["query"],
            ),
            MetaOp::GetInterestSuggestions => object(
                json!({
                    "interest_list": {"type": "array", "items": {"type": "string"}, "description": "Interest names, e.g. [\"Running\", \"Hiking\"]."},
                    "limit": limit(20)
                }),
                &["interest_list"],
            ),
            MetaOp::SearchBehaviors => object(json!({"limit": limit(50)}), &[]),
            MetaOp::SearchDemographics => object(
                json!({
                    "demographic_class": {"type": "string", "description": "demographics, life_events, industries, income, family_statuses, user_device, or user_os."},
                    "limit": limit(50)
                }),
                &[],
            ),
            MetaOp::SearchGeoLocations => object(
                json!({
                    "query": {"type": "string"},
                    "location_types": {"type": "array", "items": {"type": "string"}, "description": "Defaults to [\"country\", \"region\"]."},
                    "limit": limit(25)
                }),
                &["query"],
            ),
            MetaOp::EstimateAudienceSize => object(
                json!({
                    "account_id": account,
                    "targeting": {"type": "object", "description": "Targeting spec; must include geo_locations."},
                    "optimization_goal": {"type": "string"}
                }),
                &["account_id", "targeting"],
            ),
            MetaOp::CreateBudgetSchedule => object(
                json!({
                    "campaign_id": id("campaign"),
                    "budget_value": {"type": "integer", "description": "Cents for ABSOLUTE, percent for MULTIPLIER."},
                    "budget_value_type": {"type": "string", "enum": ["ABSOLUTE", "MULTIPLIER"]},
                    "time_start": {"type": "integer", "description": "Unix timestamp."},
                    "time_end": {"type": "integer", "description": "Unix timestamp after time_start."}
                }),
                &["campaign_id", "budget_value", "budget_value_type", "time_start", "time_end"],
            ),
            MetaOp::UploadAdImage => object(
                json!({
                    "account_id": account,
                    "image_url": {"type": "string", "description": "Public URL of the picture to upload."},
                    "image_data": {"type": "string", "description": "Base64 picture data, used instead of image_url."},
                    "image_name": {"type": "string", "description": "File name. Defaults to the URL's file name."}
                }),
                &["account_id"],
            ),
            MetaOp::GetAdImage => object(
                json!({
                    "account_id": account,
                    "hashes": {"type": "array", "items": {"type": "string"}, "description": "Image hashes from upload_ad_image."}
                }),
                &["account_id", "hashes"],
            ),
            MetaOp::GraphApiCall => object(
                json!({
                    "endpoint": {"type": "string", "description": "Path below the API version, e.g. act_123/customaudiences."},
                    "method": {"type": "string", "enum": ["GET", "POST", "DELETE"]},
                    "params": {"type": "object", "description": "Query or form parameters."}
                }),
                &["endpoint"],
            ),
        }
    }
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({"type": "object", "properties": properties, "required": required})
}

#[derive(Deserialize)]
struct Limit {
    #[serde(default = "default_behavior_limit")]
    limit: u32,
}

fn default_behavior_limit() -> u32 {
    50
}

#[derive(Deserialize)]
struct AccountLimit {
    account_id: String,
    #[serde(default = "default_creative_limit")]
    limit: u32,
}

fn default_creative_limit() -> u32 {
    25
}

/// Pull a required string id out of the arguments.
fn id_arg(params: &Value, key: &str) -> Result<String, ToolResult> {
    match params.get(key).and_then(|v| v.as_str()).map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(ToolResult::error(
            ToolError::arg_missing(key, "str", format!("Provide {} as a non-empty string", key)).to_json(),
        )),
    }
}

/// One Meta operation bound to a Graph client.
#[derive(Clone)]
pub struct MetaTool {
    op: MetaOp,
    client: GraphClient,
}

impl MetaTool {
    pub fn new(op: MetaOp, client: GraphClient) -> Self {
        Self { op, client }
    }

    pub fn op(&self) -> MetaOp {
        self.op
    }

    /// Decode arguments and call the endpoint. The outer error is an argument
    /// problem already rendered for the model.
    async fn call(&self, params: Value) -> Result<Result<Value, GraphError>, ToolResult> {
        let name = self.op.name();
        let c = &self.client;
        Ok(match self.op {
            MetaOp::ListAdAccounts => c.list_ad_accounts(&parse_args::<ListAdAccounts>(name, params)?).await,
            MetaOp::GetAccountInfo => c.account_info(&parse_args::<AccountInfo>(name, params)?).await,
            MetaOp::ListPages => c.search_pages(&parse_args::<SearchPages>(name, params)?).await,
            MetaOp::ListCampaigns => c.list_campaigns(&parse_args::<ListCampaigns>(name, params)?).await,
            MetaOp::GetCampaignDetails => c.campaign_details(&id_arg(&params, "campaign_id")?).await,
            MetaOp::CreateCampaign => c.create_campaign(&parse_args::<CreateCampaign>(name, params)?).await,
            MetaOp::UpdateCampaign => c.update_campaign(&parse_args::<UpdateCampaign>(name, params)?).await,
            MetaOp::DeleteCampaign => c.delete_campaign(&id_arg(&params, "campaign_id")?).await,
            MetaOp::UnassociateCampaigns => {
                c.unassociate_campaigns(&parse_args::<UnassociateCampaigns>(name, params)?).await
            }
            MetaOp::ListAdSets => c.list_adsets(&parse_args::<ListAdSets>(name, params)?).await,
            MetaOp::GetAdSetDetails => c.adset_details(&id_arg(&params, "adset_id")?).await,
            MetaOp::CreateAdSet => c.create_adset(&parse_args::<CreateAdSet>(name, params)?).await,
            MetaOp::UpdateAdSet => c.update_adset(&parse_args::<UpdateAdSet>(name, params)?).await,
            MetaOp::DeleteAdSet => c.delete_adset(&id_arg(&params, "adset_id")?).await,
            MetaOp::ListAds => c.list_ads(&parse_args::<ListAds>(name, params)?).await,
            MetaOp::GetAdDetails => c.ad_details(&id_arg(&params, "ad_id")?).await,
            MetaOp::CreateAd => c.create_ad(&parse_args::<CreateAd>(name, params)?).await,
            MetaOp::UpdateAd => c.update_ad(&parse_args::<UpdateAd>(name, params)?).await,
            MetaOp::DeleteAd => c.delete_ad(&id_arg(&params, "ad_id")?).await,
            MetaOp::ListCreatives => {
                let args = parse_args::<AccountLimit>(name, params)?;
                c.list_account_creatives(&args.account_id, args.limit).await
            }
            MetaOp::GetAdCreatives => c.ad_creatives(&id_arg(&params, "ad_id")?).await,
            MetaOp::GetCreativeDetails => c.creative_details(&id_arg(&params, "creative_id")?).await,
            MetaOp::CreateCreative => c.create_creative(&parse_args::<CreateCreative>(name, params)?).await,
            MetaOp::UpdateCreative => c.update_creative(&parse_args::<UpdateCreative>(name, params)?).await,
            MetaOp::DeleteCreative => c.delete_creative(&id_arg(&params, "creative_id")?).await,
            MetaOp::GetAdImageUrls => c
                .ad_image_urls(&id_arg(&params, "ad_id")?)
                .await
                .map(|urls| json!({"image_urls": urls})),
            MetaOp::UploadAdImage => c.upload_ad_image(&parse_args::<UploadAdImage>(name, params)?).await,
            MetaOp::GetAdImage => c.get_ad_images(&parse_args::<GetAdImages>(name, params)?).await,
            MetaOp::GetInsights => c.insights(&parse_args::<InsightsRequest>(name, params)?).await,
            MetaOp::SearchInterests => c.search_interests(&parse_args::<SearchInterests>(name, params)?).await,
            MetaOp::GetInterestSuggestions => {
                c.interest_suggestions(&parse_args::<InterestSuggestions>(name, params)?).await
            }
            MetaOp::SearchBehaviors => c.search_behaviors(parse_args::<Limit>(name, params)?.limit).await,
            MetaOp::SearchDemographics => {
                c.search_demographics(&parse_args::<SearchDemographics>(name, params)?).await
            }
            MetaOp::SearchGeoLocations => {
                c.search_geo_locations(&parse_args::<SearchGeoLocations>(name, params)?).await
            }
            MetaOp::EstimateAudienceSize => {
                c.estimate_audience(&parse_args::<EstimateAudience>(name, params)?).await
            }
            MetaOp::CreateBudgetSchedule => {
                c.create_budget_schedule(&parse_args::<CreateBudgetSchedule>(name, params)?).await
            }
            MetaOp::GraphApiCall => c.call_graph(&parse_args::<GraphCall>(name, params)?).await,
        })
    }
}

#[async_trait]
impl Tool for MetaTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn schema(&self) -> Value {
        self.op.schema()
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, anyhow::Error> {
        let outcome = match self.call(params).await {
            Ok(outcome) => outcome,
            Err(bad_args) => return Ok(bad_args),
        };
        match outcome {
            Ok(body) => Ok(ToolResult::json(&body)),
            // No point letting the model retry with a dead token.
            Err(e) if e.is_auth_error() => Err(e.into()),
            Err(e) => {
                tracing::debug!(tool = self.op.name(), error = %e, "meta tool returned an error to the agent");
                Ok(ToolResult::error(e.to_tool_error().to_json()))
            }
        }
    }
}

/// Every Meta tool.
pub fn meta_tools(client: &GraphClient) -> Vec<Arc<dyn Tool>> {
    MetaOp::ALL
        .iter()
        .map(|&op| Arc::new(MetaTool::new(op, client.clone())) as Arc<dyn Tool>)
        .collect()
}

/// Meta tools that never change the ad account.
pub fn read_only_meta_tools(client: &GraphClient) -> Vec<Arc<dyn Tool>> {
    MetaOp::ALL
        .iter()
        .filter(|op| op.is_read_only())
        .map(|&op| Arc::new(MetaTool::new(op, client.clone())) as Arc<dyn Tool>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use adloop_meta::StaticToken;
    use axum::Router;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::any;

    type Seen = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

    /// Fake Graph server answering every path with the given status and body.
    async fn graph(status: StatusCode, body: Value) -> (GraphClient, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/{*path}",
                any(
                    |State((seen, status, body)): State<(Seen, StatusCode, Value)>,
                     uri: axum::http::Uri,
                     Query(q): Query<HashMap<String, String>>| async move {
                        seen.lock().unwrap().push((uri.path().to_string(), q));
                        (status, axum::Json(body))
                    },
                ),
            )
            .with_state((seen.clone(), status, body));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let client = GraphClient::new(format!("http://{}", addr), Arc::new(StaticToken::new("tok"))).unwrap();
        (client, seen)
    }

    #[test]
    fn names_are_unique_and_round_trip() {
        let names: HashSet<&str> = MetaOp::ALL.iter().map(|op| op.name()).collect();
        assert_eq!(names.len(), MetaOp::ALL.len());
        for op in MetaOp::ALL {
            assert_eq!(MetaOp::from_name(op.name()), Some(op));
        }
        assert_eq!(MetaOp::from_name("nope"), None);
    }

    #[test]
    fn schemas_require_known_properties() {
        for op in MetaOp::ALL {
            let schema = op.schema();
            assert_eq!(schema["type"], "object", "{}", op.name());
            for req in schema["required"].as_array().unwrap() {
                let key = req.as_str().unwrap();
                assert!(
                    schema["properties"].get(key).is_some(),
                    "{} requires undeclared {}",
                    op.name(),
                    key
                );
            }
        }
    }

    #[tokio::test]
    async fn read_only_set_excludes_mutations() {
        let (client, _) = graph(StatusCode::OK, json!({})).await;
        let names: Vec<String> = read_only_meta_tools(&client).iter().map(|t| t.name().to_string()).collect();
        assert!(names.contains(&"get_insights".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("create_") || n.starts_with("delete_")));
        assert_eq!(meta_tools(&client).len(), MetaOp::ALL.len());
    }

    #[tokio::test]
    async fn successful_call_returns_json() {
        let (client, seen) = graph(StatusCode::OK, json!({"id": "c1", "name": "Launch"})).await;
        let tool = MetaTool::new(MetaOp::GetCampaignDetails, client);
        let result = tool.execute(json!({"campaign_id": "c1"})).await.unwrap();

        assert!(!result.is_error);
        let body: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(body["name"], "Launch");
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "/c1");
        assert_eq!(seen[0].1["access_token"], "tok");
    }

    #[tokio::test]
    async fn missing_id_is_error_result_without_request() {
        let (client, seen) = graph(StatusCode::OK, json!({})).await;
        let tool = MetaTool::new(MetaOp::DeleteAd, client);
        let result = tool.execute(json!({})).await.unwrap();

        assert!(result.is_error);
        assert!(result.content.contains("ad_id"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn validation_errors_reach_the_model() {
        let (client, seen) = graph(StatusCode::OK, json!({})).await;
        let tool = MetaTool::new(MetaOp::CreateCampaign, client);
        let result = tool
            .execute(json!({"account_id": "123", "name": "X", "objective": "WIN_BIG"}))
            .await
            .unwrap();

        assert!(result.is_error);
        let value: Value = serde_json::from_str(&result.content).unwrap();
        assert!(value["error"]["message"].as_str().unwrap().contains("objective"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_errors_are_results_but_auth_errors_abort() {
        let (client, _) = graph(
            StatusCode::BAD_REQUEST,
            json!({"error": {"message": "Invalid parameter", "code": 100}}),
        )
        .await;
        let tool = MetaTool::new(MetaOp::GetAdDetails, client);
        let result = tool.execute(json!({"ad_id": "9"})).await.unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("Invalid parameter"));

        let (client, _) = graph(
            StatusCode::BAD_REQUEST,
            json!({"error": {"message": "Session has expired", "code": 190}}),
        )
        .await;
        let tool = MetaTool::new(MetaOp::GetAdDetails, client);
        let err = tool.execute(json!({"ad_id": "9"})).await.unwrap_err();
        assert!(err.to_string().contains("Session has expired"));
    }

    #[tokio::test]
    async fn ad_image_urls_wrap_list() {
        let (client, _) = graph(
            StatusCode::OK,
            json!({"data": [{"id": "cr1", "image_url": "https://cdn/x.jpg"}]}),
        )
        .await;
        let tool = MetaTool::new(MetaOp::GetAdImageUrls, client);
        let result = tool.execute(json!({"ad_id": "a1"})).await.unwrap();
        let value: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(value["image_urls"][0], "https://cdn/x.jpg");
    }

    #[tokio::test]
    async fn upload_ad_image_returns_hash() {
        let (client, seen) = graph(
            StatusCode::OK,
            json!({"images": {"shoe.jpg": {"hash": "h1", "url": "https://cdn/h1.jpg"}}}),
        )
        .await;
        let tool = MetaTool::new(MetaOp::UploadAdImage, client);
        let result = tool
            .execute(json!({"account_id": "42", "image_data": "aGVsbG8=", "image_name": "shoe.jpg"}))
            .await
            .unwrap();

        assert!(!result.is_error);
        let value: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(value["image_hash"], "h1");
        assert_eq!(seen.lock().unwrap()[0].0, "/act_42/adimages");
    }

    #[tokio::test]
    async fn image_lookup_is_read_only_but_upload_and_raw_calls_are_not() {
        assert!(MetaOp::GetAdImage.is_read_only());
        assert!(!MetaOp::UploadAdImage.is_read_only());
        assert!(!MetaOp::GraphApiCall.is_read_only());

        let (client, seen) = graph(StatusCode::OK, json!({"data": []})).await;
        let tool = MetaTool::new(MetaOp::GetAdImage, client);
        let result = tool.execute(json!({"account_id": "act_42", "hashes": ["h1"]})).await.unwrap();
        assert!(!result.is_error);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "/act_42/adimages");
        assert_eq!(seen[0].1["hashes"], r#"["h1"]"#);
    }

    #[tokio::test]
    async fn graph_api_call_rejects_unknown_method() {
        let (client, seen) = graph(StatusCode::OK, json!({})).await;
        let tool = MetaTool::new(MetaOp::GraphApiCall, client.clone());
        let result = tool.execute(json!({"endpoint": "me", "method": "PUT"})).await.unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("method"));
        assert!(seen.lock().unwrap().is_empty());

        let tool = MetaTool::new(MetaOp::GraphApiCall, client);
        let result = tool.execute(json!({"endpoint": "me/adaccounts", "params": {"limit": 2}})).await.unwrap();
        assert!(!result.is_error);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "/me/adaccounts");
        assert_eq!(seen[0].1["limit"], "2");
    }
}
