// ABOUTME: Web tools for the research agent: page summary, product picture discovery, and random UUIDs.
// ABOUTME: Pages are fetched with reqwest and reduced to text with a few regex passes, no browser involved.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::tools::{Tool, ToolResult, parse_args};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const BROWSER_AGENT: &str = "Mozilla/5.0 (compatible; adloop/1.0)";
const DEFAULT_EXCERPT_CHARS: usize = 4000;

/// Image URLs containing these are site chrome, not product shots.
const SKIPPED_IMAGE_MARKERS: [&str; 4] = ["logo", "placeholder", "sprite", "icon"];

static TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static DESCRIPTION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\b[^>]*(?:name|property)\s*=\s*["'](?:og:)?description["'][^>]*>"#).unwrap()
});
static CONTENT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)\bcontent\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());
static HIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:script|style|noscript|template)\b[^>]*>.*?</(?:script|style|noscript|template)>").unwrap()
});
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").unwrap());
static IMG_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)\s(src|data-src)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

/// All web tools, sharing one HTTP client.
pub fn web_tools() -> Vec<Arc<dyn Tool>> {
    let http = page_client();
    vec![
        Arc::new(RandomUuidTool),
        Arc::new(WebSummaryTool::with_client(http.clone())),
        Arc::new(FetchPicturesTool::with_client(http)),
    ]
}

fn page_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(BROWSER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// GET a page and return its body, or an error result describing why not.
async fn fetch_page(http: &reqwest::Client, url: &str) -> Result<String, ToolResult> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| ToolResult::error(format!("Failed to fetch {}: {}", url, e)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ToolResult::error(format!("Failed to fetch {}: HTTP {}", url, status)));
    }
    response
        .text()
        .await
        .map_err(|e| ToolResult::error(format!("Failed to read {}: {}", url, e)))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The text of the `<title>` element.
pub fn page_title(html: &str) -> Option<String> {
    TITLE
        .captures(html)
        .map(|c| collapse_whitespace(&decode_entities(&c[1])))
        .filter(|t| !t.is_empty())
}

/// The page description from `<meta name="description">` or `og:description`.
pub fn meta_description(html: &str) -> Option<String> {
    for found in DESCRIPTION_TAG.find_iter(html) {
        if let Some(c) = CONTENT_ATTR.captures(found.as_str()) {
            let value = c.get(1).or_else(|| c.get(2)).map(|m| m.as_str()).unwrap_or_default();
            let value = collapse_whitespace(&decode_entities(value));
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Drop comments and the bodies of scripts, styles, and templates.
fn strip_hidden(html: &str) -> String {
    let text = HIDDEN.replace_all(html, " ");
    COMMENT.replace_all(&text, " ").into_owned()
}

/// Visible text with scripts, styles, and markup stripped.
pub fn visible_text(html: &str) -> String {
    let text = strip_hidden(html);
    let text = TAG.replace_all(&text, " ");
    collapse_whitespace(&decode_entities(&text))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Image URLs referenced by `<img src>` (or lazy-loaded `data-src`), absolutized
/// against `base` and with logos, placeholders, sprites, and icons dropped.
pub fn product_image_urls(html: &str, base: &Url) -> Vec<String> {
    let html = strip_hidden(html);
    let mut urls: Vec<String> = Vec::new();
    for tag in IMG_TAG.find_iter(&html) {
        let mut src = None;
        let mut lazy = None;
        for c in IMG_SRC.captures_iter(tag.as_str()) {
            let value = c.get(2).or_else(|| c.get(3)).map(|m| m.as_str().trim()).unwrap_or_default();
            if value.is_empty() {
                continue;
            }
            if c[1].eq_ignore_ascii_case("src") {
                src.get_or_insert(value);
            } else {
                lazy.get_or_insert(value);
            }
        }

        // Inline data URIs are usually lazy-load placeholders.
        let Some(raw) = src.filter(|s| !s.starts_with("data:")).or(lazy) else {
            continue;
        };
        let Ok(full) = base.join(&decode_entities(raw)) else {
            continue;
        };
        let full = full.to_string();
        let lowered = full.to_lowercase();
        if SKIPPED_IMAGE_MARKERS.iter().any(|m| lowered.contains(m)) {
            continue;
        }
        if !urls.contains(&full) {
            urls.push(full);
        }
    }
    urls
}

/// Generates a random UUID, e.g. for unique campaign names.
pub struct RandomUuidTool;

#[async_trait]
impl Tool for RandomUuidTool {
    fn name(&self) -> &str {
        "random_uuid"
    }

    fn description(&self) -> &str {
        "Generate a random UUID (v4). Use it to make names of campaigns, ad sets, ads, and creatives unique."
    }

    fn schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn execute(&self, _params: Value) -> Result<ToolResult, anyhow::Error> {
        Ok(ToolResult::text(uuid::Uuid::new_v4().to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct SummaryArgs {
    url: String,
    #[serde(default)]
    max_chars: Option<usize>,
}

/// Fetches a page and returns its title, description, and a text excerpt.
pub struct WebSummaryTool {
    http: reqwest::Client,
}

impl WebSummaryTool {
    pub fn new() -> Self {
        Self::with_client(page_client())
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Default for WebSummaryTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSummaryTool {
    fn name(&self) -> &str {
        "web_summary"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its title, meta description, and the beginning of its visible text. Use it to learn what a product page says."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute URL of the page."},
                "max_chars": {"type": "integer", "description": "Maximum characters of page text to return. Defaults to 4000."}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, anyhow::Error> {
        let args: SummaryArgs = match parse_args(self.name(), params) {
            Ok(args) => args,
            Err(result) => return Ok(result),
        };
        let html = match fetch_page(&self.http, &args.url).await {
            Ok(html) => html,
            Err(result) => return Ok(result),
        };

        let title = page_title(&html);
        let description = meta_description(&html);
        let text = visible_text(&html);
        let excerpt = truncate_chars(&text, args.max_chars.unwrap_or(DEFAULT_EXCERPT_CHARS));

        tracing::debug!(url = %args.url, chars = text.len(), "summarized page");
        Ok(ToolResult::json(&json!({
            "url": args.url,
            "title": title,
            "description": description,
            "text": excerpt,
        })))
    }
}

#[derive(Debug, Deserialize)]
struct PicturesArgs {
    url: String,
}

/// Collects candidate product image URLs from a page.
pub struct FetchPicturesTool {
    http: reqwest::Client,
}

impl FetchPicturesTool {
    pub fn new() -> Self {
        Self::with_client(page_client())
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Default for FetchPicturesTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchPicturesTool {
    fn name(&self) -> &str {
        "fetch_pictures"
    }

    fn description(&self) -> &str {
        "Fetch a web page and list the absolute URLs of the product pictures on it. Logos, placeholders, sprites, and icons are left out."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute URL of the product page."}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, anyhow::Error> {
        let args: PicturesArgs = match parse_args(self.name(), params) {
            Ok(args) => args,
            Err(result) => return Ok(result),
        };
        let base = match Url::parse(&args.url) {
            Ok(base) => base,
            Err(e) => return Ok(ToolResult::error(format!("Invalid URL {}: {}", args.url, e))),
        };
        let html = match fetch_page(&self.http, &args.url).await {
            Ok(html) => html,
            Err(result) => return Ok(result),
        };

        let urls = product_image_urls(&html, &base);
        tracing::debug!(url = %args.url, found = urls.len(), "collected product pictures");
        Ok(ToolResult::json(&urls))
    }
}
