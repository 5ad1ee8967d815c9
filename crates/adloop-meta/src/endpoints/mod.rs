// ABOUTME: Typed wrappers over the Meta Ads Graph endpoints used by the agents.
// ABOUTME: Argument structs deserialize straight from tool-call JSON and validate before any request.

pub mod accounts;
pub mod adsets;
pub mod ads;
pub mod budget;
pub mod campaigns;
pub mod creatives;
pub mod graph_call;
pub mod images;
pub mod insights;
pub mod pages;
pub mod targeting;

use serde_json::Value;

use crate::client::Params;

pub use accounts::{AccountInfo, ListAdAccounts};
pub use ads::{CreateAd, ListAds, UpdateAd};
pub use adsets::{CreateAdSet, ListAdSets, UpdateAdSet};
pub use budget::CreateBudgetSchedule;
pub use campaigns::{CreateCampaign, ListCampaigns, UnassociateCampaigns, UpdateCampaign};
pub use creatives::{CreateCreative, UpdateCreative, creative_image_urls};
pub use graph_call::GraphCall;
pub use images::{GetAdImages, UploadAdImage};
pub use insights::{InsightsRequest, TimeRange};
pub use pages::SearchPages;
pub use targeting::{
    EstimateAudience, InterestSuggestions, SearchDemographics, SearchGeoLocations, SearchInterests,
};

/// Turn a `json!({...})` literal into request params.
pub(crate) fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

/// Insert a value only when present.
pub(crate) fn put_opt<T: Into<Value>>(params: &mut Params, key: &str, value: Option<T>) {
    if let Some(v) = value {
        params.insert(key.to_string(), v.into());
    }
}

/// Graph expects budgets and bids as integer strings in the account's minor unit.
pub(crate) fn put_cents(params: &mut Params, key: &str, value: Option<u64>) {
    if let Some(v) = value {
        params.insert(key.to_string(), Value::String(v.to_string()));
    }
}
