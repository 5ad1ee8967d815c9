// ABOUTME: Targeting discovery: interests, interest suggestions, behaviors, demographics, geo locations.
// ABOUTME: Also estimates audience size for a targeting spec before an ad set is created.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::GraphClient;
use crate::endpoints::params;
use crate::error::{GraphError, ToolError};
use crate::validate::{EnumValidator, require_account_id, require_arg};

pub const DEMOGRAPHIC_CLASS: EnumValidator = EnumValidator::new(
    "demographic_class",
    &[
        "DEMOGRAPHICS",
        "LIFE_EVENTS",
        "INDUSTRIES",
        "INCOME",
        "FAMILY_STATUSES",
        "USER_DEVICE",
        "USER_OS",
    ],
);

const DEFAULT_LOCATION_TYPES: [&str; 2] = ["country", "region"];

fn limit_20() -> u32 {
    20
}

fn limit_25() -> u32 {
    25
}

fn limit_50() -> u32 {
    50
}

fn default_demographic_class() -> String {
    "demographics".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchInterests {
    pub query: String,
    #[serde(default = "limit_20")]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterestSuggestions {
    pub interest_list: Vec<String>,
    #[serde(default = "limit_20")]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchDemographics {
    #[serde(default = "default_demographic_class")]
    pub demographic_class: String,
    #[serde(default = "limit_50")]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchGeoLocations {
    pub query: String,
    #[serde(default)]
    pub location_types: Option<Vec<String>>,
    #[serde(default = "limit_25")]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimateAudience {
    pub account_id: String,
    pub targeting: Value,
    #[serde(default)]
    pub optimization_goal: Option<String>,
}

impl GraphClient {
    pub async fn search_interests(&self, args: &SearchInterests) -> Result<Value, GraphError> {
        require_arg("query", &args.query)?;
        self.get(
            "search",
            params(json!({ "type": "adinterest", "q": args.query, "limit": args.limit })),
        )
        .await
    }

    pub async fn interest_suggestions(&self, args: &InterestSuggestions) -> Result<Value, GraphError> {
        if args.interest_list.is_empty() {
            return Err(ToolError::arg_missing(
                "interest_list",
                "list[str]",
                "Provide at least one interest name, e.g. [\"Basketball\", \"Soccer\"]",
            )
            .into());
        }
        self.get(
            "search",
            params(json!({
                "type": "adinterestsuggestion",
                "interest_list": args.interest_list,
                "limit": args.limit,
            })),
        )
        .await
    }

    pub async fn search_behaviors(&self, limit: u32) -> Result<Value, GraphError> {
        self.get(
            "search",
            params(json!({ "type": "adTargetingCategory", "class": "behaviors", "limit": limit })),
        )
        .await
    }

    pub async fn search_demographics(&self, args: &SearchDemographics) -> Result<Value, GraphError> {
        let class = DEMOGRAPHIC_CLASS.check(&args.demographic_class)?.to_lowercase();
        self.get(
            "search",
            params(json!({ "type": "adTargetingCategory", "class": class, "limit": args.limit })),
        )
        .await
    }

    pub async fn search_geo_locations(&self, args: &SearchGeoLocations) -> Result<Value, GraphError> {
        require_arg("query", &args.query)?;
        let types: Vec<String> = match &args.location_types {
            Some(types) if !types.is_empty() => types.clone(),
            _ => DEFAULT_LOCATION_TYPES.iter().map(|t| t.to_string()).collect(),
        };
        self.get(
            "search",
            params(json!({
                "type": "adgeolocation",
                "q": args.query,
                "location_types": types,
                "limit": args.limit,
            })),
        )
        .await
    }

    pub async fn estimate_audience(&self, args: &EstimateAudience) -> Result<Value, GraphError> {
        let account = require_account_id(&args.account_id)?;
        if args.targeting.get("geo_locations").is_none() {
            return Err(ToolError::arg_invalid(
                "targeting",
                "dict",
                &args.targeting,
                "targeting must include geo_locations, e.g. {\"geo_locations\": {\"countries\": [\"US\"]}}",
            )
            .into());
        }
        let mut p = params(json!({ "targeting_spec": args.targeting }));
        if let Some(goal) = &args.optimization_goal {
            p.insert("optimization_goal".into(), json!(goal.to_uppercase()));
        }
        self.get(&format!("{}/reachestimate", account), p).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::test_support::{fake_graph, last};

    #[tokio::test]
    async fn interest_search_params() {
        let (client, log) = fake_graph(json!({"data": []})).await;
        client
            .search_interests(&SearchInterests {
                query: "running".to_string(),
                limit: limit_20(),
            })
            .await
            .unwrap();
        let req = last(&log);
        assert_eq!(req.path, "search");
        assert_eq!(req.params["type"], "adinterest");
        assert_eq!(req.params["q"], "running");
        assert_eq!(req.params["limit"], "20");
    }

    #[tokio::test]
    async fn suggestions_send_json_list() {
        let (client, log) = fake_graph(json!({"data": []})).await;
        let args: InterestSuggestions =
            serde_json::from_value(json!({"interest_list": ["Running", "Hiking"]})).unwrap();
        client.interest_suggestions(&args).await.unwrap();
        assert_eq!(last(&log).params["interest_list"], r#"["Running","Hiking"]"#);

        let empty = InterestSuggestions {
            interest_list: vec![],
            limit: 5,
        };
        assert!(client.interest_suggestions(&empty).await.is_err());
    }

    #[tokio::test]
    async fn demographics_validate_class() {
        let (client, log) = fake_graph(json!({"data": []})).await;
        let args: SearchDemographics = serde_json::from_value(json!({"demographic_class": "LIFE_EVENTS"})).unwrap();
        client.search_demographics(&args).await.unwrap();
        assert_eq!(last(&log).params["class"], "life_events");

        let bad: SearchDemographics = serde_json::from_value(json!({"demographic_class": "hobbies"})).unwrap();
        assert!(client.search_demographics(&bad).await.is_err());
    }

    #[tokio::test]
    async fn geo_search_defaults_location_types() {
        let (client, log) = fake_graph(json!({"data": []})).await;
        let args: SearchGeoLocations = serde_json::from_value(json!({"query": "Berlin"})).unwrap();
        client.search_geo_locations(&args).await.unwrap();
        let req = last(&log);
        assert_eq!(req.params["location_types"], r#"["country","region"]"#);
        assert_eq!(req.params["limit"], "25");
    }

    #[tokio::test]
    async fn reach_estimate_requires_geo() {
        let (client, log) = fake_graph(json!({"data": {"users": 1000}})).await;
        let bad = EstimateAudience {
            account_id: "1".to_string(),
            targeting: json!({"age_min": 20}),
            optimization_goal: None,
        };
        assert!(client.estimate_audience(&bad).await.is_err());

        let good = EstimateAudience {
            account_id: "1".to_string(),
            targeting: json!({"geo_locations": {"countries": ["US"]}}),
            optimization_goal: Some("reach".to_string()),
        };
        client.estimate_audience(&good).await.unwrap();
        let req = last(&log);
        assert_eq!(req.path, "act_1/reachestimate");
        assert_eq!(req.params["optimization_goal"], "REACH");
    }
}
