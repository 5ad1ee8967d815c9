// ABOUTME: Ad image library: upload pictures to get an image hash, and look hashes back up.
// ABOUTME: Creatives built from an uploaded hash render reliably, unlike hotlinked picture URLs.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::GraphClient;
use crate::endpoints::params;
use crate::error::{GraphError, ToolError};
use crate::validate::require_account_id;

const DEFAULT_IMAGE_NAME: &str = "upload.jpeg";
const IMAGE_FIELDS: &str = "hash,url,width,height,name,status";

#[derive(Debug, Clone, Deserialize)]
pub struct UploadAdImage {
    pub account_id: String,
    /// Public URL to fetch the picture from. Ignored when `image_data` is set.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Base64 encoded picture, optionally as a `data:` URI.
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetAdImages {
    pub account_id: String,
    pub hashes: Vec<String>,
}

impl GraphClient {
    pub async fn upload_ad_image(&self, args: &UploadAdImage) -> Result<Value, GraphError> {
        let account = require_account_id(&args.account_id)?;
        let data = match (&args.image_data, &args.image_url) {
            (Some(data), _) if !data.trim().is_empty() => {
                let raw = strip_data_uri(data.trim());
                STANDARD
                    .decode(raw)
                    .map_err(|e| ToolError::arg_invalid("image_data", "str", "<base64>", e.to_string()))?;
                raw.to_string()
            }
            (_, Some(url)) if !url.trim().is_empty() => STANDARD.encode(self.download(url.trim()).await?),
            _ => {
                return Err(ToolError::arg_missing(
                    "image_data",
                    "str",
                    "Provide either image_data (base64) or image_url",
                )
                .into());
            }
        };
        let name = args
            .image_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| args.image_url.as_deref().and_then(file_name))
            .unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string());

        let response = self
            .post(
                &format!("{}/adimages", account),
                params(json!({ "bytes": data, "name": name })),
            )
            .await?;
        Ok(summarize_upload(&account, &name, response))
    }

    pub async fn get_ad_images(&self, args: &GetAdImages) -> Result<Value, GraphError> {
        let account = require_account_id(&args.account_id)?;
        let hashes: Vec<&str> = args.hashes.iter().map(|h| h.trim()).filter(|h| !h.is_empty()).collect();
        if hashes.is_empty() {
            return Err(ToolError::arg_missing("hashes", "list[str]", "At least one image hash is required").into());
        }
        self.get(
            &format!("{}/adimages", account),
            params(json!({ "fields": IMAGE_FIELDS, "hashes": hashes })),
        )
        .await
    }
}

fn strip_data_uri(data: &str) -> &str {
    match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    }
}

/// Last path segment of a URL, without query or fragment.
fn file_name(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    let (_, tail) = path.split_once('/')?;
    tail.rsplit('/').next().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Graph answers `{"images": {<name>: {hash, url, ...}}}`; flatten that into
/// something an agent can read the hash from directly.
fn summarize_upload(account: &str, name: &str, response: Value) -> Value {
    let Some(images) = response.get("images").and_then(Value::as_object).filter(|m| !m.is_empty()) else {
        return json!({ "success": false, "account_id": account, "name": name, "raw_response": response });
    };
    let mut list: Vec<Value> = images
        .iter()
        .map(|(key, info)| {
            let hash = info.get("hash").and_then(Value::as_str).unwrap_or(key);
            json!({
                "hash": hash,
                "url": info.get("url"),
                "width": info.get("width"),
                "height": info.get("height"),
                "name": info.get("name"),
            })
        })
        .collect();
    list.sort_by(|a, b| a["hash"].as_str().cmp(&b["hash"].as_str()));
    json!({
        "success": true,
        "account_id": account,
        "name": name,
        "image_hash": list[0]["hash"],
        "images_count": list.len(),
        "images": list,
    })
}
