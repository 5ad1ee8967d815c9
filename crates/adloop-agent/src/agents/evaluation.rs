// ABOUTME: Evaluation agent: reads Meta insights for the ongoing plans and scores each one 1 to 10.
// ABOUTME: Evaluations for plans it was not asked about are dropped.

use adloop_core::{MarketingPlan, PlanEvaluation};
use adloop_meta::GraphClient;
use serde_json::Value;

use crate::agents::{AgentSettings, extract_json, unwrap_field};
use crate::runtime::{AgentError, AgentLoop};
use crate::tools::{ToolRegistry, read_only_meta_tools};

const SYSTEM_PROMPT: &str = "You are a Meta Ads performance analyst. \
Use the read-only Meta tools to look up how each marketing plan performed: \
spend, impressions, clicks, CTR, CPC, and conversions from get_insights. \
Judge each plan against its budget and against the other plans. \
Finish with a single JSON value and nothing after it.";

pub struct EvaluationAgent {
    agent: AgentLoop,
}

impl EvaluationAgent {
    pub fn new(settings: &AgentSettings, graph: &GraphClient) -> Self {
        Self::with_tools(settings, read_only_meta_tools(graph).into_iter().collect())
    }

    pub fn with_tools(settings: &AgentSettings, tools: ToolRegistry) -> Self {
        let agent = AgentLoop::new("evaluation", settings.client.clone(), &settings.model, SYSTEM_PROMPT)
            .tools(tools)
            .max_iterations(settings.max_iterations);
        Self { agent }
    }

    pub fn prompt(plans: &[MarketingPlan]) -> String {
        let mut prompt = String::from("Evaluate these marketing plans:\n\n");
        for plan in plans {
            prompt.push_str(&format!(
                "- {} ({}): {}\n  Budget {:.2}. Campaign ids: {}\n",
                plan.plan_name,
                plan.plan_uuid,
                plan.plan_description,
                plan.budget,
                if plan.campaign_ids.is_empty() {
                    "none".to_string()
                } else {
                    plan.campaign_ids.join(", ")
                }
            ));
        }
        prompt.push_str(
            "\nFor every campaign call get_insights with level \"campaign\" and \
             date_preset \"maximum\". For each plan report the total spend as actual_cost, \
             a short written evaluation of what worked and what did not, and a score \
             from 1 (worst) to 10 (best).\n\n\
             Reply with JSON in this shape:\n\
             {\"evaluations\": [{\"plan_uuid\": \"...\", \"actual_cost\": 0.0, \
             \"evaluation\": \"...\", \"score\": 7}]}\n",
        );
        prompt
    }

    pub async fn run(&self, plans: &[MarketingPlan]) -> Result<Vec<PlanEvaluation>, AgentError> {
        if plans.is_empty() {
            return Ok(Vec::new());
        }
        let run = self.agent.run(&Self::prompt(plans)).await?;
        let evaluations = Self::parse_evaluations(&run.text, plans)?;
        tracing::info!(
            plans = plans.len(),
            evaluated = evaluations.len(),
            tool_calls = run.tool_use_count,
            "evaluation finished"
        );
        Ok(evaluations)
    }

    /// Decode evaluations, keeping one per known plan in the order the plans were given.
    pub fn parse_evaluations(
        text: &str,
        plans: &[MarketingPlan],
    ) -> Result<Vec<PlanEvaluation>, AgentError> {
        let items = match unwrap_field(extract_json(text)?, "evaluations") {
            Value::Array(items) => items,
            obj @ Value::Object(_) => vec![obj],
            other => {
                return Err(AgentError::InvalidResponse(format!(
                    "expected a list of evaluations, got {}",
                    other
                )));
            }
        };

        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
            let evaluation: PlanEvaluation = serde_json::from_value(item)
                .map_err(|e| AgentError::InvalidResponse(format!("bad evaluation: {}", e)))?;
            evaluation
                .validate()
                .map_err(|e| AgentError::InvalidResponse(e.to_string()))?;
            parsed.push(evaluation);
        }

        let mut evaluations = Vec::with_capacity(plans.len());
        for plan in plans {
            match parsed.iter().position(|e| e.plan_uuid == plan.plan_uuid) {
                Some(idx) => evaluations.push(parsed.swap_remove(idx)),
                None => tracing::warn!(plan = %plan.plan_uuid, "plan was not evaluated"),
            }
        }
        for stray in &parsed {
            tracing::warn!(plan = %stray.plan_uuid, "ignoring evaluation for unknown plan");
        }
        Ok(evaluations)
    }
}
