// ABOUTME: Research agent: studies the product page with web tools and reports keywords, a summary, and pictures.
// ABOUTME: Its report is the grounding the plan and execute agents work from.

use adloop_core::MarketingInput;
use serde::{Deserialize, Serialize};

use crate::agents::{AgentSettings, parse_output};
use crate::runtime::{AgentError, AgentLoop};
use crate::tools::{ToolRegistry, web_tools};

const SYSTEM_PROMPT: &str = "You are a product research agent for a Meta Ads marketing team. \
Use the web tools to study the product page and any other page it links to. \
Be factual: describe only what the pages show. \
Finish with a single JSON object and nothing after it.";

/// What the research agent learned about the product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResearchReport {
    #[serde(default)]
    pub keywords: Vec<String>,
    pub research_summary: String,
    #[serde(default)]
    pub picture_urls: Vec<String>,
}

pub struct ResearchAgent {
    agent: AgentLoop,
}

impl ResearchAgent {
    pub fn new(settings: &AgentSettings) -> Self {
        Self::with_tools(settings, web_tools().into_iter().collect())
    }

    pub fn with_tools(settings: &AgentSettings, tools: ToolRegistry) -> Self {
        let agent = AgentLoop::new("research", settings.client.clone(), &settings.model, SYSTEM_PROMPT)
            .tools(tools)
            .max_iterations(settings.max_iterations);
        Self { agent }
    }

    pub fn prompt(input: &MarketingInput) -> String {
        let mut prompt = format!(
            "We are preparing Meta Ads marketing plans for the product \"{}\".\n\n\
             Product URL: {}\n",
            input.product_name, input.product_url
        );
        if input.picture_urls.is_empty() {
            prompt.push_str("Known product pictures: none yet.\n");
        } else {
            prompt.push_str("Known product pictures:\n");
            for url in &input.picture_urls {
                prompt.push_str(&format!("- {}\n", url));
            }
        }
        prompt.push_str(
            "\nResearch the product and produce:\n\
             1. keywords: search and interest keywords that describe the product and its buyers.\n\
             2. research_summary: the product background, its main features, who it is for, \
             and concrete suggestions for the marketing plan.\n\
             3. picture_urls: the known pictures plus any better product pictures you found. \
             Only include direct image URLs that can be downloaded.\n\n\
             Reply with JSON in this shape:\n\
             {\"keywords\": [\"...\"], \"research_summary\": \"...\", \"picture_urls\": [\"...\"]}\n",
        );
        prompt
    }

    pub async fn run(&self, input: &MarketingInput) -> Result<ResearchReport, AgentError> {
        let run = self.agent.run(&Self::prompt(input)).await?;
        let mut report: ResearchReport = parse_output(&run.text)?;
        if report.research_summary.trim().is_empty() {
            return Err(AgentError::InvalidResponse("research_summary is empty".to_string()));
        }

        // Pictures the user supplied are always kept, ahead of anything found.
        let mut pictures = input.picture_urls.clone();
        for url in report.picture_urls.drain(..) {
            if !pictures.contains(&url) {
                pictures.push(url);
            }
        }
        report.picture_urls = pictures;

        tracing::info!(
            product = %input.product_name,
            keywords = report.keywords.len(),
            pictures = report.picture_urls.len(),
            "research finished"
        );
        Ok(report)
    }
}
