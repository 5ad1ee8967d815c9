// ABOUTME: Ad account listing and account details.
// ABOUTME: Details flag EU accounts, which need a DSA beneficiary on every ad set.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::GraphClient;
use crate::endpoints::params;
use crate::error::GraphError;
use crate::validate::require_account_id;

pub const ACCOUNT_FIELDS: &str = "id,name,account_id,account_status,amount_spent,balance,currency,age,business_city,business_country_code";

pub const ACCOUNT_INFO_FIELDS: &str = "id,name,account_id,account_status,amount_spent,balance,currency,age,business_city,business_country_code,timezone_name";

/// Countries where ads fall under the Digital Services Act.
pub const DSA_COUNTRIES: [&str; 12] = ["DE", "FR", "IT", "ES", "NL", "BE", "AT", "IE", "DK", "SE", "FI", "NO"];

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListAdAccounts {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for ListAdAccounts {
    fn default() -> Self {
        Self { limit: default_limit() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
}

impl GraphClient {
    pub async fn list_ad_accounts(&self, args: &ListAdAccounts) -> Result<Value, GraphError> {
        self.get(
            "me/adaccounts",
            params(json!({ "fields": ACCOUNT_FIELDS, "limit": args.limit })),
        )
        .await
    }

    pub async fn account_info(&self, args: &AccountInfo) -> Result<Value, GraphError> {
        let account = require_account_id(&args.account_id)?;
        let mut info = self
            .get(&account, params(json!({ "fields": ACCOUNT_INFO_FIELDS })))
            .await?;

        let country = info
            .get("business_country_code")
            .and_then(|c| c.as_str())
            .map(str::to_uppercase);
        if let Some(country) = country
            && DSA_COUNTRIES.contains(&country.as_str())
            && let Some(obj) = info.as_object_mut()
        {
            obj.insert("dsa_required".into(), json!(true));
            obj.insert(
                "dsa_compliance_note".into(),
                json!("This account is in a DSA country. Ad sets must set dsa_beneficiary."),
            );
        }
        Ok(info)
    }
}
