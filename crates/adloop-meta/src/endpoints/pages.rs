// ABOUTME: Facebook page lookup: pages the user manages and pages bound to an ad account.
// ABOUTME: Creatives need a page id, so agents search here before building one.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::GraphClient;
use crate::endpoints::params;
use crate::error::GraphError;
use crate::validate::require_account_id;

pub const PAGE_FIELDS: &str = "id,name,username,category,fan_count,link,verification_status,picture";

#[derive(Debug, Clone, Deserialize)]
pub struct SearchPages {
    pub account_id: String,
    /// Case-insensitive substring of the page name; empty returns every page.
    #[serde(default)]
    pub query: Option<String>,
}

fn page_list(body: &Value) -> Vec<Value> {
    body.get("data")
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default()
}

impl GraphClient {
    /// Pages from the user's own accounts plus the ad account's client pages, deduplicated by id.
    pub async fn pages_for_account(&self, account_id: &str) -> Result<Vec<Value>, GraphError> {
        let account = require_account_id(account_id)?;
        let fields = params(json!({ "fields": PAGE_FIELDS }));

        let mut pages = page_list(&self.get("me/accounts", fields.clone()).await?);
        // Client pages need extra permissions; a failure here is not fatal.
        match self.get(&format!("{}/client_pages", account), fields).await {
            Ok(body) => {
                for page in page_list(&body) {
                    let id = page.get("id").cloned();
                    if !pages.iter().any(|p| p.get("id") == id.as_ref()) {
                        pages.push(page);
                    }
                }
            }
            Err(err) => tracing::debug!(account = %account, error = %err, "client pages unavailable"),
        }
        Ok(pages)
    }

    pub async fn search_pages(&self, args: &SearchPages) -> Result<Value, GraphError> {
        let pages = self.pages_for_account(&args.account_id).await?;
        let needle = args.query.as_deref().unwrap_or("").trim().to_lowercase();
        let matched: Vec<Value> = pages
            .into_iter()
            .filter(|page| {
                needle.is_empty()
                    || page
                        .get("name")
                        .and_then(|n| n.as_str())
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .collect();
        Ok(json!({ "data": matched, "total": matched.len() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::test_support::{fake_graph, last};

    #[tokio::test]
    async fn search_filters_by_name() {
        // The fake server answers both page endpoints with the same list, so this also covers dedup.
        let (client, log) = fake_graph(json!({"data": [
            {"id": "1", "name": "Trail Shoes Co"},
            {"id": "2", "name": "Coffee Corner"}
        ]}))
        .await;

        let found = client
            .search_pages(&SearchPages {
                account_id: "9".to_string(),
                query: Some("SHOES".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(found["total"], 1);
        assert_eq!(found["data"][0]["id"], "1");
        assert_eq!(last(&log).path, "act_9/client_pages");

        let all = client
            .search_pages(&SearchPages {
                account_id: "9".to_string(),
                query: None,
            })
            .await
            .unwrap();
        assert_eq!(all["total"], 2);
    }
}
