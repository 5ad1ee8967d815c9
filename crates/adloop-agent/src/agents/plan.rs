// ABOUTME: Plan agent: turns the product, research, and past results into a small batch of marketing plans.
// ABOUTME: The first run explores with several plans; later runs refine with one or two, within the budget.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use adloop_core::{HistoryRecord, MarketingInput, MarketingPlan, PlanStatus, check_budget};
use adloop_meta::GraphClient;
use serde_json::Value;
use ulid::Ulid;

use crate::agents::{AgentSettings, ResearchReport, extract_json, unwrap_field};
use crate::runtime::{AgentError, AgentLoop};
use crate::tools::{ToolRegistry, read_only_meta_tools};

pub const FIRST_RUN_PLANS: RangeInclusive<usize> = 3..=5;
pub const LATER_RUN_PLANS: RangeInclusive<usize> = 1..=2;

const SYSTEM_PROMPT: &str = "You are a Meta Ads marketing planner. \
A plan is one campaign strategy: who to reach, with what message, on what budget. \
The Meta hierarchy is campaign, then ad sets (budget, schedule, targeting), then ads, then creatives. \
You may use the read-only Meta tools to check the ad account and explore targeting, but you never create anything. \
Finish with a single JSON object and nothing after it.";

/// Everything the plan agent sees for one run.
pub struct PlanRequest<'a> {
    pub input: &'a MarketingInput,
    pub research: &'a ResearchReport,
    /// Past plans for the product, newest first. Empty on the first run.
    pub history: &'a [HistoryRecord],
    pub first_run: bool,
}

impl PlanRequest<'_> {
    fn plan_count(&self) -> RangeInclusive<usize> {
        if self.first_run { FIRST_RUN_PLANS } else { LATER_RUN_PLANS }
    }
}

pub struct PlanAgent {
    agent: AgentLoop,
}

impl PlanAgent {
    pub fn new(settings: &AgentSettings, graph: &GraphClient) -> Self {
        Self::with_tools(settings, read_only_meta_tools(graph).into_iter().collect())
    }

    pub fn with_tools(settings: &AgentSettings, tools: ToolRegistry) -> Self {
        let agent = AgentLoop::new("plan", settings.client.clone(), &settings.model, SYSTEM_PROMPT)
            .tools(tools)
            .max_iterations(settings.max_iterations);
        Self { agent }
    }

    pub fn prompt(req: &PlanRequest<'_>) -> String {
        let input = req.input;
        let count = req.plan_count();
        let mut prompt = format!(
            "Create marketing plans for the product \"{}\" ({}).\n\n",
            input.product_name, input.product_url
        );

        prompt.push_str("## Research\n");
        prompt.push_str(&format!("Summary: {}\n", req.research.research_summary));
        if !req.research.keywords.is_empty() {
            prompt.push_str(&format!("Keywords: {}\n", req.research.keywords.join(", ")));
        }
        if !req.research.picture_urls.is_empty() {
            prompt.push_str(&format!("Pictures: {}\n", req.research.picture_urls.join(", ")));
        }

        prompt.push_str("\n## Budget\n");
        match input.total_budget {
            Some(total) => prompt.push_str(&format!(
                "The total budget is {:.2} in the ad account currency. \
                 The sum of all plan budgets must not exceed {:.2}.\n",
                total, total
            )),
            None => prompt.push_str(
                "No total budget was given. Use get_account_info to check the account balance and \
                 amount spent, and keep the plans within what the account can afford.\n",
            ),
        }
        if let Some(days) = input.total_days {
            prompt.push_str(&format!("The plans run for {} days.\n", days));
        }

        if req.history.is_empty() {
            prompt.push_str("\n## History\nNo plans have run for this product yet.\n");
        } else {
            prompt.push_str("\n## History (newest first)\n");
            for record in req.history {
                prompt.push_str(&format!(
                    "- {} ({}): {}. Budget {:.2}",
                    record.plan_name, record.plan_uuid, record.plan_description, record.budget
                ));
                if let Some(cost) = record.actual_cost {
                    prompt.push_str(&format!(", spent {:.2}", cost));
                }
                match (&record.plan_score, &record.plan_evaluation) {
                    (Some(score), Some(evaluation)) => {
                        prompt.push_str(&format!(", score {}/10: {}", score, evaluation))
                    }
                    _ => prompt.push_str(", not evaluated yet"),
                }
                prompt.push('\n');
            }
            prompt.push_str("Keep what scored well and change what did not.\n");
        }

        prompt.push_str(&format!(
            "\n## Output\nProduce {} to {} plans. Each plan needs a short plan_name, a \
             plan_description of the strategy, plan_details with the audience, placements, \
             message, and schedule the execute agent should build, and a budget. \
             Set status to \"active\" only if the ads should start immediately; otherwise \
             leave it \"initialized\" and the campaign is created paused.\n\n\
             Reply with JSON in this shape:\n\
             {{\"plans\": [{{\"plan_name\": \"...\", \"plan_description\": \"...\", \
             \"plan_details\": \"...\", \"budget\": 0.0, \"status\": \"initialized\"}}]}}\n",
            count.start(),
            count.end()
        ));
        prompt
    }

    pub async fn run(&self, req: &PlanRequest<'_>) -> Result<Vec<MarketingPlan>, AgentError> {
        let run = self.agent.run(&Self::prompt(req)).await?;
        let plans = Self::parse_plans(&run.text, req)?;
        tracing::info!(
            product = %req.input.product_name,
            plans = plans.len(),
            budget = plans.iter().map(|p| p.budget).sum::<f64>(),
            "plans created"
        );
        Ok(plans)
    }

    /// Decode and check the plans in a reply.
    pub fn parse_plans(text: &str, req: &PlanRequest<'_>) -> Result<Vec<MarketingPlan>, AgentError> {
        let value = unwrap_field(extract_json(text)?, "plans");
        let items = match value {
            Value::Array(items) => items,
            single @ Value::Object(_) => vec![single],
            other => {
                return Err(AgentError::InvalidResponse(format!("expected a list of plans, got {}", other)));
            }
        };

        let mut plans = Vec::with_capacity(items.len());
        for mut item in items {
            // Models often emit plan_details as structured JSON; store it as text.
            if let Some(details) = item.get_mut("plan_details")
                && !details.is_string()
                && !details.is_null()
            {
                *details = Value::String(details.to_string());
            }
            let plan: MarketingPlan = serde_json::from_value(item)
                .map_err(|e| AgentError::InvalidResponse(format!("invalid plan: {}", e)))?;
            plans.push(plan);
        }

        let count = req.plan_count();
        if plans.is_empty() || plans.len() > *count.end() {
            return Err(AgentError::InvalidResponse(format!(
                "expected {} to {} plans, got {}",
                count.start(),
                count.end(),
                plans.len()
            )));
        }
        if plans.len() < *count.start() {
            tracing::warn!(expected = *count.start(), got = plans.len(), "fewer plans than asked for");
        }

        check_budget(&plans, req.input.total_budget)
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

        // Plan ids must be unique across the batch and the history shown to the model.
        let mut seen: HashSet<String> = req.history.iter().map(|r| r.plan_uuid.clone()).collect();
        for plan in &mut plans {
            if !seen.insert(plan.plan_uuid.clone()) {
                plan.plan_uuid = Ulid::new().to_string();
                seen.insert(plan.plan_uuid.clone());
            }
            if matches!(plan.status, PlanStatus::Paused | PlanStatus::Deleted) {
                plan.status = PlanStatus::Initialized;
            }
            plan.campaign_ids.clear();
        }
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubLlmClient;
    use adloop_core::Score;
    use chrono::Utc;
    use std::sync::Arc;

    fn input(budget: Option<f64>) -> MarketingInput {
        let mut input = MarketingInput::new("Trail Runner 3", "https://shop.example.com/trail-runner");
        input.total_budget = budget;
        input.total_days = Some(7);
        input
    }

    fn research() -> ResearchReport {
        ResearchReport {
            keywords: vec!["trail running".into()],
            research_summary: "Lightweight trail shoe.".into(),
            picture_urls: vec![],
        }
    }

    fn record(uuid: &str) -> HistoryRecord {
        HistoryRecord {
            id: 1,
            product_name: "Trail Runner 3".into(),
            product_url: "https://shop.example.com/trail-runner".into(),
            plan_uuid: uuid.into(),
            plan_name: "Mud lovers".into(),
            plan_description: "Target muddy trail runners".into(),
            plan_details: String::new(),
            budget: 50.0,
            actual_cost: Some(48.5),
            plan_evaluation: Some("Good CTR, low conversions".into()),
            plan_score: Some(Score::new(6).unwrap()),
            created_at: Utc::now(),
            evaluated_at: Some(Utc::now()),
        }
    }

    fn three_plans(budgets: [f64; 3]) -> String {
        format!(
            r#"{{"plans": [
                {{"plan_name": "A", "plan_description": "a", "plan_details": "x", "budget": {}}},
                {{"plan_name": "B", "plan_description": "b", "plan_details": {{"age": "18-35"}}, "budget": {}}},
                {{"plan_name": "C", "plan_description": "c", "budget": {}, "status": "active"}}
            ]}}"#,
            budgets[0], budgets[1], budgets[2]
        )
    }

    #[test]
    fn first_run_prompt_states_budget_rule() {
        let input = input(Some(300.0));
        let research = research();
        let req = PlanRequest {
            input: &input,
            research: &research,
            history: &[],
            first_run: true,
        };
        let prompt = PlanAgent::prompt(&req);
        assert!(prompt.contains("must not exceed 300.00"));
        assert!(prompt.contains("Produce 3 to 5 plans"));
        assert!(prompt.contains("No plans have run"));
        assert!(prompt.contains("7 days"));
    }

    #[test]
    fn later_prompt_includes_history_and_asks_tools_for_budget() {
        let input = input(None);
        let research = research();
        let history = vec![record("p-old")];
        let req = PlanRequest {
            input: &input,
            research: &research,
            history: &history,
            first_run: false,
        };
        let prompt = PlanAgent::prompt(&req);
        assert!(prompt.contains("get_account_info"));
        assert!(prompt.contains("Produce 1 to 2 plans"));
        assert!(prompt.contains("Mud lovers (p-old)"));
        assert!(prompt.contains("score 6/10: Good CTR"));
    }

    #[test]
    fn parses_plans_within_budget() {
        let input = input(Some(300.0));
        let research = research();
        let req = PlanRequest {
            input: &input,
            research: &research,
            history: &[],
            first_run: true,
        };
        let plans = PlanAgent::parse_plans(&three_plans([100.0, 100.0, 100.0]), &req).unwrap();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[1].plan_details, r#"{"age":"18-35"}"#);
        assert_eq!(plans[2].status, PlanStatus::Active);
        let ids: HashSet<_> = plans.iter().map(|p| p.plan_uuid.clone()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn over_budget_is_invalid() {
        let input = input(Some(250.0));
        let research = research();
        let req = PlanRequest {
            input: &input,
            research: &research,
            history: &[],
            first_run: true,
        };
        let err = PlanAgent::parse_plans(&three_plans([100.0, 100.0, 100.0]), &req).unwrap_err();
        assert!(err.to_string().contains("exceeding the budget"));
    }

    #[test]
    fn too_many_plans_on_later_run() {
        let input = input(None);
        let research = research();
        let history = vec![record("p-old")];
        let req = PlanRequest {
            input: &input,
            research: &research,
            history: &history,
            first_run: false,
        };
        assert!(PlanAgent::parse_plans(&three_plans([1.0, 1.0, 1.0]), &req).is_err());
    }

    #[test]
    fn reused_uuid_is_replaced() {
        let input = input(None);
        let research = research();
        let history = vec![record("p-old")];
        let req = PlanRequest {
            input: &input,
            research: &research,
            history: &history,
            first_run: false,
        };
        let reply = r#"[{"plan_uuid": "p-old", "plan_name": "Again", "plan_description": "d", "budget": 20}]"#;
        let plans = PlanAgent::parse_plans(reply, &req).unwrap();
        assert_ne!(plans[0].plan_uuid, "p-old");
    }

    #[tokio::test]
    async fn run_with_stub_model() {
        let settings = AgentSettings::new(Arc::new(StubLlmClient::new(&three_plans([10.0, 20.0, 30.0]))), "m");
        let input = input(Some(100.0));
        let research = research();
        let agent = PlanAgent::with_tools(&settings, ToolRegistry::new());
        let plans = agent
            .run(&PlanRequest {
                input: &input,
                research: &research,
                history: &[],
                first_run: true,
            })
            .await
            .unwrap();
        assert_eq!(plans.iter().map(|p| p.budget).sum::<f64>(), 60.0);
    }
}
