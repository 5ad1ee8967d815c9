// ABOUTME: Ad creative endpoints: list, details, create from a link and image, update, and image URL lookup.
// ABOUTME: Creatives are built as object_story_spec link ads anchored to a Facebook page.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::client::GraphClient;
use crate::endpoints::{params, put_opt};
use crate::error::{GraphError, ToolError};
use crate::validate::{STATUS, require_account_id, require_arg, require_id};

pub const CREATIVE_FIELDS: &str = "id,name,status,thumbnail_url,image_url,image_hash,object_story_spec,asset_feed_spec,image_urls_for_viewing";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCreative {
    pub account_id: String,
    pub name: String,
    pub page_id: String,
    pub link_url: String,
    #[serde(default)]
    pub image_hash: Option<String>,
    /// Public image URL, used when no uploaded image hash is available.
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub call_to_action_type: Option<String>,
    #[serde(default)]
    pub instagram_actor_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCreative {
    pub creative_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CreateCreative {
    fn object_story_spec(&self) -> Result<Value, ToolError> {
        let mut link_data = Map::new();
        match (&self.image_hash, &self.picture_url) {
            (Some(hash), _) if !hash.trim().is_empty() => {
                link_data.insert("image_hash".into(), json!(hash));
            }
            (_, Some(url)) if !url.trim().is_empty() => {
                link_data.insert("picture".into(), json!(url));
            }
            _ => {
                return Err(ToolError::arg_missing(
                    "image_hash or picture_url",
                    "str",
                    "A creative needs an image: pass an uploaded image_hash or a public picture_url",
                ));
            }
        }
        link_data.insert("link".into(), json!(self.link_url));
        let optional = [
            ("message", &self.message),
            ("name", &self.headline),
            ("description", &self.description),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                link_data.insert(key.into(), json!(v));
            }
        }
        if let Some(cta) = &self.call_to_action_type {
            link_data.insert(
                "call_to_action".into(),
                json!({"type": cta.to_uppercase(), "value": {"link": self.link_url}}),
            );
        }

        let mut spec = json!({ "page_id": self.page_id, "link_data": link_data });
        if let Some(ig) = &self.instagram_actor_id {
            spec["instagram_actor_id"] = json!(ig);
        }
        Ok(spec)
    }
}

/// Collect every image URL a creative exposes, in a stable order without duplicates.
pub fn creative_image_urls(creative: &Value) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let mut push = |v: Option<&Value>| {
        if let Some(url) = v.and_then(|u| u.as_str())
            && !url.is_empty()
            && !urls.iter().any(|u| u == url)
        {
            urls.push(url.to_string());
        }
    };

    push(creative.get("image_url"));
    push(creative.pointer("/object_story_spec/link_data/picture"));
    if let Some(list) = creative.get("image_urls_for_viewing").and_then(|v| v.as_array()) {
        list.iter().for_each(|u| push(Some(u)));
    }
    if let Some(images) = creative.pointer("/asset_feed_spec/images").and_then(|v| v.as_array()) {
        images.iter().for_each(|img| push(img.get("url")));
    }
    push(creative.get("thumbnail_url"));
    urls
}

impl GraphClient {
    pub async fn list_account_creatives(&self, account_id: &str, limit: u32) -> Result<Value, GraphError> {
        let account = require_account_id(account_id)?;
        self.get(
            &format!("{}/adcreatives", account),
            params(json!({ "fields": CREATIVE_FIELDS, "limit": limit })),
        )
        .await
    }

    pub async fn ad_creatives(&self, ad_id: &str) -> Result<Value, GraphError> {
        let id = require_id(ad_id)?;
        self.get(
            &format!("{}/adcreatives", id),
            params(json!({ "fields": CREATIVE_FIELDS })),
        )
        .await
    }

    pub async fn creative_details(&self, creative_id: &str) -> Result<Value, GraphError> {
        self.get(require_id(creative_id)?, params(json!({ "fields": CREATIVE_FIELDS })))
            .await
    }

    pub async fn create_creative(&self, args: &CreateCreative) -> Result<Value, GraphError> {
        let account = require_account_id(&args.account_id)?;
        require_arg("name", &args.name)?;
        require_arg("page_id", &args.page_id)?;
        require_arg("link_url", &args.link_url)?;
        let spec = args.object_story_spec()?;

        let created = self
            .post(
                &format!("{}/adcreatives", account),
                params(json!({ "name": args.name, "object_story_spec": spec })),
            )
            .await?;
        tracing::info!(creative = ?created.get("id"), page = %args.page_id, "created ad creative");
        Ok(created)
    }

    pub async fn update_creative(&self, args: &UpdateCreative) -> Result<Value, GraphError> {
        let id = require_id(&args.creative_id)?;
        let mut p = params(json!({}));
        put_opt(&mut p, "name", args.name.clone());
        put_opt(&mut p, "status", STATUS.check_opt(args.status.as_deref())?);
        if p.is_empty() {
            return Err(ToolError::arg_missing("update fields", "object", "Provide name or status to update").into());
        }
        self.post(id, p).await
    }

    pub async fn delete_creative(&self, creative_id: &str) -> Result<Value, GraphError> {
        self.delete(require_id(creative_id)?).await
    }

    /// Image URLs of every creative attached to an ad.
    pub async fn ad_image_urls(&self, ad_id: &str) -> Result<Vec<String>, GraphError> {
        let creatives = self.ad_creatives(ad_id).await?;
        let mut urls = Vec::new();
        for creative in creatives.get("data").and_then(|d| d.as_array()).into_iter().flatten() {
            for url in creative_image_urls(creative) {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::test_support::{fake_graph, last, ok};

    fn create_args() -> CreateCreative {
        serde_json::from_value(json!({
            "account_id": "5",
            "name": "Trail shoe hero",
            "page_id": "p1",
            "link_url": "https://shoes.example.com",
            "picture_url": "https://cdn.example.com/shoe.jpg",
            "message": "Run further",
            "headline": "New trail shoe",
            "call_to_action_type": "shop_now"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn create_creative_builds_link_story() {
        let (client, log) = fake_graph(ok()).await;
        client.create_creative(&create_args()).await.unwrap();

        let req = last(&log);
        assert_eq!(req.path, "act_5/adcreatives");
        let spec: Value = serde_json::from_str(&req.params["object_story_spec"]).unwrap();
        assert_eq!(spec["page_id"], "p1");
        assert_eq!(spec["link_data"]["picture"], "https://cdn.example.com/shoe.jpg");
        assert_eq!(spec["link_data"]["name"], "New trail shoe");
        assert_eq!(spec["link_data"]["call_to_action"]["type"], "SHOP_NOW");
        assert!(spec["link_data"].get("image_hash").is_none());
    }

    #[tokio::test]
    async fn image_hash_wins_over_picture() {
        let (client, log) = fake_graph(ok()).await;
        let mut args = create_args();
        args.image_hash = Some("abc123".to_string());
        client.create_creative(&args).await.unwrap();

        let spec: Value = serde_json::from_str(&last(&log).params["object_story_spec"]).unwrap();
        assert_eq!(spec["link_data"]["image_hash"], "abc123");
        assert!(spec["link_data"].get("picture").is_none());
    }

    #[tokio::test]
    async fn creative_without_image_is_rejected() {
        let (client, log) = fake_graph(ok()).await;
        let mut args = create_args();
        args.picture_url = None;
        assert!(client.create_creative(&args).await.is_err());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn image_urls_are_collected_once() {
        let creative = json!({
            "image_url": "https://a/1.jpg",
            "thumbnail_url": "https://a/thumb.jpg",
            "object_story_spec": {"link_data": {"picture": "https://a/1.jpg"}},
            "image_urls_for_viewing": ["https://a/2.jpg"],
            "asset_feed_spec": {"images": [{"url": "https://a/3.jpg"}, {"hash": "x"}]}
        });
        assert_eq!(
            creative_image_urls(&creative),
            vec!["https://a/1.jpg", "https://a/2.jpg", "https://a/3.jpg", "https://a/thumb.jpg"]
        );
        assert!(creative_image_urls(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn ad_image_urls_reads_creatives_of_ad() {
        let (client, log) = fake_graph(json!({"data": [
            {"id": "cr1", "image_url": "https://a/1.jpg"},
            {"id": "cr2", "image_url": "https://a/1.jpg", "thumbnail_url": "https://a/t.jpg"}
        ]}))
        .await;
        let urls = client.ad_image_urls("ad1").await.unwrap();
        assert_eq!(urls, vec!["https://a/1.jpg", "https://a/t.jpg"]);
        assert_eq!(last(&log).path, "ad1/adcreatives");
    }
}
