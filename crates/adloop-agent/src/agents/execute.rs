// ABOUTME: Execute agent: builds one plan on Meta (campaign, ad sets, creatives, ads) through the Meta tools.
// ABOUTME: Returns the plan with the ids of the campaigns it created.

use std::sync::Arc;

use adloop_core::{MarketingInput, MarketingPlan, PlanStatus};
use adloop_meta::GraphClient;
use serde_json::Value;

use crate::agents::{AgentSettings, ResearchReport, extract_json, unwrap_field};
use crate::runtime::{AgentError, AgentLoop};
use crate::tools::{RandomUuidTool, Tool, ToolRegistry, meta_tools};

const SYSTEM_PROMPT: &str = "You are a Meta Ads execution agent. \
You build a marketing plan in the user's ad account using the Meta tools, step by step: \
first the campaign, then its ad sets, then a creative for each ad set, then the ads. \
Check ids returned by each call before using them in the next one. \
When a tool returns an error, read it, fix the arguments, and try again. \
Budgets are integers in cents of the account currency. \
Finish with a single JSON object and nothing after it.";

pub struct ExecuteAgent {
    agent: AgentLoop,
}

impl ExecuteAgent {
    pub fn new(settings: &AgentSettings, graph: &GraphClient) -> Self {
        let mut tools: ToolRegistry = meta_tools(graph).into_iter().collect();
        tools.register(Arc::new(RandomUuidTool) as Arc<dyn Tool>);
        Self::with_tools(settings, tools)
    }

    pub fn with_tools(settings: &AgentSettings, tools: ToolRegistry) -> Self {
        let agent = AgentLoop::new("execute", settings.client.clone(), &settings.model, SYSTEM_PROMPT)
            .tools(tools)
            .max_iterations(settings.max_iterations);
        Self { agent }
    }

    /// The status new Meta objects get for this plan.
    pub fn launch_status(plan: &MarketingPlan) -> &'static str {
        if plan.status == PlanStatus::Active { "ACTIVE" } else { "PAUSED" }
    }

    pub fn prompt(plan: &MarketingPlan, input: &MarketingInput, research: &ResearchReport) -> String {
        let mut prompt = format!(
            "Build this marketing plan for the product \"{}\" ({}).\n\n\
             Plan name: {}\n\
             Plan id: {}\n\
             Description: {}\n\
             Details: {}\n\
             Budget: {:.2} in the account currency ({} cents)\n",
            input.product_name,
            input.product_url,
            plan.plan_name,
            plan.plan_uuid,
            plan.plan_description,
            plan.plan_details,
            plan.budget,
            (plan.budget * 100.0).round() as u64,
        );
        if let Some(days) = input.total_days {
            prompt.push_str(&format!("Run time: {} days.\n", days));
        }
        if !research.keywords.is_empty() {
            prompt.push_str(&format!("Keywords: {}\n", research.keywords.join(", ")));
        }
        if !research.picture_urls.is_empty() {
            prompt.push_str(
                "Product pictures for creatives (upload with upload_ad_image and pass the image_hash to \
                 create_creative; fall back to picture_url if the upload fails):\n",
            );
            for url in &research.picture_urls {
                prompt.push_str(&format!("- {}\n", url));
            }
        }

        prompt.push_str(&format!(
            "\nSteps:\n\
             1. Pick the ad account with list_ad_accounts and a page with list_pages. \
             Call get_account_info; if dsa_required is true every ad set needs dsa_beneficiary.\n\
             2. Create one campaign with status {status}. Put the plan name and a random_uuid in \
             the campaign name so it is unique.\n\
             3. Create the ad sets, creatives, and ads the plan describes, all with status {status}. \
             Spend no more than the plan budget in total.\n\n\
             Reply with JSON in this shape:\n\
             {{\"campaign_ids\": [\"...\"]}}\n",
            status = Self::launch_status(plan)
        ));
        prompt
    }

    /// Realize the plan and return it with the created campaign ids.
    pub async fn run(
        &self,
        plan: &MarketingPlan,
        input: &MarketingInput,
        research: &ResearchReport,
    ) -> Result<MarketingPlan, AgentError> {
        let run = self.agent.run(&Self::prompt(plan, input, research)).await?;
        let campaign_ids = Self::parse_campaign_ids(&run.text)?;

        let mut executed = plan.clone();
        executed.campaign_ids = campaign_ids;
        if executed.status == PlanStatus::Initialized {
            executed.status = PlanStatus::Paused;
        }
        tracing::info!(
            plan = %executed.plan_uuid,
            campaigns = ?executed.campaign_ids,
            tool_calls = run.tool_use_count,
            "plan executed"
        );
        Ok(executed)
    }

    pub fn parse_campaign_ids(text: &str) -> Result<Vec<String>, AgentError> {
        let value = unwrap_field(extract_json(text)?, "campaign_ids");
        let ids: Vec<String> = match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            other => {
                return Err(AgentError::InvalidResponse(format!(
                    "expected campaign_ids to be a list, got {}",
                    other
                )));
            }
        };
        if ids.is_empty() {
            return Err(AgentError::InvalidResponse("no campaign was created".to_string()));
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedLlmClient, StubLlmClient};
    use serde_json::json;

    fn plan(status: PlanStatus) -> MarketingPlan {
        let mut plan = MarketingPlan::new("Mud lovers", "Target muddy trail runners", 42.5);
        plan.status = status;
        plan
    }

    fn research() -> ResearchReport {
        ResearchReport {
            keywords: vec!["trail".into()],
            research_summary: "s".into(),
            picture_urls: vec!["https://cdn.example.com/shoe.jpg".into()],
        }
    }

    #[test]
    fn campaigns_start_paused_unless_active() {
        assert_eq!(ExecuteAgent::launch_status(&plan(PlanStatus::Initialized)), "PAUSED");
        assert_eq!(ExecuteAgent::launch_status(&plan(PlanStatus::Active)), "ACTIVE");

        let input = MarketingInput::new("Trail Runner 3", "https://shop.example.com");
        let prompt = ExecuteAgent::prompt(&plan(PlanStatus::Initialized), &input, &research());
        assert!(prompt.contains("status PAUSED"));
        assert!(prompt.contains("4250 cents"));
        assert!(prompt.contains("- https://cdn.example.com/shoe.jpg"));
        assert!(prompt.contains("upload_ad_image"));
    }

    #[test]
    fn campaign_ids_accept_both_shapes() {
        assert_eq!(
            ExecuteAgent::parse_campaign_ids(r#"{"campaign_ids": ["120", 121]}"#).unwrap(),
            vec!["120", "121"]
        );
        assert_eq!(ExecuteAgent::parse_campaign_ids(r#"["9"]"#).unwrap(), vec!["9"]);
        assert!(ExecuteAgent::parse_campaign_ids(r#"{"campaign_ids": []}"#).is_err());
        assert!(ExecuteAgent::parse_campaign_ids(r#"{"campaign_ids": "120"}"#).is_err());
    }

    #[tokio::test]
    async fn run_records_campaigns_and_pauses() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .tool_call("random_uuid", json!({}))
                .text(r#"Created. {"campaign_ids": ["c-1"]}"#),
        );
        let settings = AgentSettings::new(client, "m");
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(RandomUuidTool));
        let agent = ExecuteAgent::with_tools(&settings, tools);

        let input = MarketingInput::new("Trail Runner 3", "https://shop.example.com");
        let executed = agent.run(&plan(PlanStatus::Initialized), &input, &research()).await.unwrap();
        assert_eq!(executed.campaign_ids, vec!["c-1"]);
        assert_eq!(executed.status, PlanStatus::Paused);
    }

    #[tokio::test]
    async fn active_plan_stays_active() {
        let settings = AgentSettings::new(Arc::new(StubLlmClient::new(r#"{"campaign_ids": ["c-2"]}"#)), "m");
        let agent = ExecuteAgent::with_tools(&settings, ToolRegistry::new());
        let input = MarketingInput::new("Trail Runner 3", "https://shop.example.com");
        let executed = agent.run(&plan(PlanStatus::Active), &input, &research()).await.unwrap();
        assert_eq!(executed.status, PlanStatus::Active);
    }
}
