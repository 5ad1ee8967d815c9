// ABOUTME: The marketing workflow: research, plan, execute, and save on the first step, then evaluate and iterate.
// ABOUTME: Keeps the plans from the previous step as ongoing plans awaiting evaluation.

use std::sync::Arc;

use adloop_core::{CoreError, MarketingInput, MarketingPlan, WorkflowStatus};
use adloop_meta::{GraphClient, OAuthError, OAuthManager};
use adloop_store::{DEFAULT_HISTORY_LIMIT, HistoryStore, StoreError};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::agents::{
    AgentSettings, EvaluationAgent, ExecuteAgent, PlanAgent, PlanRequest, ResearchAgent, ResearchReport,
};
use crate::runtime::AgentError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("agent failed: {0}")]
    Agent(#[from] AgentError),

    #[error("history store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid marketing input: {0}")]
    Invalid(#[from] CoreError),

    #[error("meta authentication failed: {0}")]
    Auth(#[from] OAuthError),

    #[error("history database is not available")]
    StoreUnavailable,
}

/// A unit of scheduled work. The scheduler calls `init_run` until it succeeds
/// once, then `run` on every later tick.
#[async_trait]
pub trait Workflow: Send + Sync {
    fn name(&self) -> &str;

    fn status(&self) -> WorkflowStatus;

    async fn init_run(&mut self) -> Result<(), WorkflowError>;

    async fn run(&mut self) -> Result<(), WorkflowError>;

    /// Mark the workflow as done; no further steps will run.
    fn finish(&mut self);
}

pub struct MarketingWorkflow {
    input: MarketingInput,
    settings: AgentSettings,
    graph: GraphClient,
    store: Arc<Mutex<HistoryStore>>,
    ongoing: Vec<MarketingPlan>,
    status: WorkflowStatus,
}

impl MarketingWorkflow {
    pub async fn new(
        input: MarketingInput,
        settings: AgentSettings,
        graph: GraphClient,
        store: Arc<Mutex<HistoryStore>>,
    ) -> Result<Self, WorkflowError> {
        input.validate()?;
        if !store.lock().await.is_available(true) {
            return Err(WorkflowError::StoreUnavailable);
        }
        Ok(Self {
            input,
            settings,
            graph,
            store,
            ongoing: Vec::new(),
            status: WorkflowStatus::Initialized,
        })
    }

    /// Like `new`, but first makes sure a Meta access token is available,
    /// running the browser authorization flow when none is cached.
    pub async fn authenticated(
        input: MarketingInput,
        settings: AgentSettings,
        graph: GraphClient,
        store: Arc<Mutex<HistoryStore>>,
        oauth: &OAuthManager,
    ) -> Result<Self, WorkflowError> {
        oauth.ensure_token().await?;
        Self::new(input, settings, graph, store).await
    }

    pub fn input(&self) -> &MarketingInput {
        &self.input
    }

    /// Plans from the last step, waiting to be evaluated.
    pub fn ongoing_plans(&self) -> &[MarketingPlan] {
        &self.ongoing
    }

    /// Persist ongoing plans that are not in history yet. Safe to repeat.
    async fn save_ongoing(&self) -> Result<(), WorkflowError> {
        let mut store = self.store.lock().await;
        let mut unsaved = Vec::new();
        for plan in &self.ongoing {
            if store.get_plan(&plan.plan_uuid)?.is_none() {
                unsaved.push(plan.clone());
            }
        }
        if !unsaved.is_empty() {
            store.insert_plans(&self.input, &unsaved)?;
        }
        Ok(())
    }

    /// Give any plan whose id is already taken in history a fresh one.
    async fn assign_fresh_ids(&self, plans: &mut [MarketingPlan]) -> Result<(), WorkflowError> {
        let store = self.store.lock().await;
        for plan in plans.iter_mut() {
            while store.get_plan(&plan.plan_uuid)?.is_some()
                || self.ongoing.iter().any(|p| p.plan_uuid == plan.plan_uuid)
            {
                let fresh = Ulid::new().to_string();
                tracing::debug!(old = %plan.plan_uuid, new = %fresh, "plan id already in history");
                plan.plan_uuid = fresh;
            }
        }
        Ok(())
    }

    async fn evaluate_ongoing(&mut self) -> Result<(), WorkflowError> {
        if self.ongoing.is_empty() {
            tracing::info!(product = %self.input.product_name, "no ongoing plans to evaluate");
            return Ok(());
        }
        // Evaluations update existing rows, so a save that failed last step is retried first.
        self.save_ongoing().await?;
        let evaluations = EvaluationAgent::new(&self.settings, &self.graph)
            .run(&self.ongoing)
            .await?;

        let store = self.store.lock().await;
        for evaluation in &evaluations {
            store.record_evaluation(evaluation)?;
            tracing::info!(
                plan = %evaluation.plan_uuid,
                score = evaluation.score.get(),
                actual_cost = evaluation.actual_cost,
                "plan evaluated"
            );
        }
        Ok(())
    }

    /// Research, plan, and execute a new batch of plans, saving whatever was
    /// built on Meta even when a later plan fails.
    async fn new_plans(&mut self, first_run: bool) -> Result<(), WorkflowError> {
        let research: ResearchReport = ResearchAgent::new(&self.settings).run(&self.input).await?;

        let history = if first_run {
            Vec::new()
        } else {
            self.store.lock().await.latest_for_product(
                &self.input.product_name,
                &self.input.product_url,
                DEFAULT_HISTORY_LIMIT,
            )?
        };
        let request = PlanRequest {
            input: &self.input,
            research: &research,
            history: &history,
            first_run,
        };
        let mut plans = PlanAgent::new(&self.settings, &self.graph).run(&request).await?;
        self.assign_fresh_ids(&mut plans).await?;

        let executor = ExecuteAgent::new(&self.settings, &self.graph);
        let mut executed = Vec::with_capacity(plans.len());
        let mut failure = None;
        for plan in &plans {
            match executor.run(plan, &self.input, &research).await {
                Ok(done) => executed.push(done),
                Err(e) => {
                    tracing::error!(plan = %plan.plan_uuid, error = %e, "plan execution failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        // Executed plans are live on Meta; track them before touching the store.
        let saved = if executed.is_empty() {
            Ok(())
        } else {
            self.ongoing = executed;
            self.save_ongoing().await
        };
        match (failure, saved) {
            (Some(e), saved) => {
                if let Err(store_err) = saved {
                    tracing::error!(error = %store_err, "saving executed plans failed");
                }
                Err(e.into())
            }
            (None, saved) => saved,
        }
    }

    async fn step(&mut self, first_run: bool) -> Result<(), WorkflowError> {
        // A failed first step may still have left live plans behind; those are
        // evaluated like any later step instead of being replaced.
        if first_run && !self.ongoing.is_empty() {
            tracing::warn!(
                ongoing = self.ongoing.len(),
                "first step is being retried with live plans; evaluating them first"
            );
        }
        let first_run = first_run && self.ongoing.is_empty();
        let previous = self.status;
        self.status = WorkflowStatus::Executing;
        tracing::info!(
            workflow = self.name(),
            product = %self.input.product_name,
            first_run,
            "workflow step started"
        );

        let result = if first_run {
            self.new_plans(true).await
        } else {
            match self.evaluate_ongoing().await {
                Ok(()) => self.new_plans(false).await,
                Err(e) => Err(e),
            }
        };

        match &result {
            Ok(()) => {
                self.status = WorkflowStatus::Completed;
                tracing::info!(ongoing = self.ongoing.len(), "workflow step completed");
            }
            Err(e) => {
                self.status = previous;
                tracing::error!(error = %e, "workflow step failed");
            }
        }
        result
    }
}

#[async_trait]
impl Workflow for MarketingWorkflow {
    fn name(&self) -> &str {
        "marketing"
    }

    fn status(&self) -> WorkflowStatus {
        self.status
    }

    async fn init_run(&mut self) -> Result<(), WorkflowError> {
        self.step(true).await
    }

    async fn run(&mut self) -> Result<(), WorkflowError> {
        self.step(false).await
    }

    fn finish(&mut self) {
        self.status = WorkflowStatus::Finished;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlmClient;
    use adloop_meta::StaticToken;

    const RESEARCH: &str =
        r#"{"keywords": ["trail"], "research_summary": "Trail shoe.", "picture_urls": ["https://cdn.example.com/a.jpg"]}"#;

    fn first_plans() -> &'static str {
        r#"{"plans": [
            {"plan_uuid": "p1", "plan_name": "Mud", "plan_description": "d", "budget": 30},
            {"plan_uuid": "p2", "plan_name": "City", "plan_description": "d", "budget": 30},
            {"plan_uuid": "p3", "plan_name": "Gift", "plan_description": "d", "budget": 30}
        ]}"#
    }

    fn graph() -> GraphClient {
        // Never contacted: scripted replies make no tool calls.
        GraphClient::new("http://127.0.0.1:9", Arc::new(StaticToken::new("t"))).unwrap()
    }

    async fn workflow(client: Arc<ScriptedLlmClient>) -> (MarketingWorkflow, Arc<Mutex<HistoryStore>>) {
        let store = Arc::new(Mutex::new(HistoryStore::open_in_memory().unwrap()));
        let input = MarketingInput::new("Trail Runner 3", "https://shop.example.com").with_budget(100.0);
        let wf = MarketingWorkflow::new(input, AgentSettings::new(client, "m"), graph(), store.clone())
            .await
            .unwrap();
        (wf, store)
    }

    fn init_script() -> ScriptedLlmClient {
        ScriptedLlmClient::new()
            .text(RESEARCH)
            .text(first_plans())
            .text(r#"{"campaign_ids": ["c1"]}"#)
            .text(r#"{"campaign_ids": ["c2"]}"#)
            .text(r#"{"campaign_ids": ["c3"]}"#)
    }

    #[tokio::test]
    async fn init_run_saves_executed_plans() {
        let client = Arc::new(init_script());
        let (mut wf, store) = workflow(client.clone()).await;
        assert_eq!(wf.status(), WorkflowStatus::Initialized);

        wf.init_run().await.unwrap();

        assert_eq!(wf.status(), WorkflowStatus::Completed);
        assert_eq!(client.remaining(), 0);
        let ids: Vec<&str> = wf.ongoing_plans().iter().map(|p| p.campaign_ids[0].as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(store.lock().await.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn run_evaluates_then_replans_with_history() {
        let client = Arc::new(
            init_script()
                .text(
                    r#"{"evaluations": [
                        {"plan_uuid": "p1", "actual_cost": 25, "evaluation": "strong", "score": 8},
                        {"plan_uuid": "p2", "actual_cost": 30, "evaluation": "weak", "score": 3}
                    ]}"#,
                )
                .text(RESEARCH)
                .text(r#"[{"plan_uuid": "p4", "plan_name": "Mud v2", "plan_description": "d", "budget": 50}]"#)
                .text(r#"{"campaign_ids": ["c4"]}"#),
        );
        let (mut wf, store) = workflow(client.clone()).await;
        wf.init_run().await.unwrap();
        wf.run().await.unwrap();

        let store = store.lock().await;
        let p1 = store.get_plan("p1").unwrap().unwrap();
        assert_eq!(p1.plan_score.map(|s| s.get()), Some(8));
        assert!(store.get_plan("p3").unwrap().unwrap().plan_score.is_none());
        assert_eq!(store.count().unwrap(), 4);

        assert_eq!(wf.ongoing_plans().len(), 1);
        assert_eq!(wf.ongoing_plans()[0].plan_uuid, "p4");

        // The second plan prompt carried the evaluated history.
        let requests = client.requests();
        let plan_prompt = format!("{:?}", requests[7].messages);
        assert!(plan_prompt.contains("strong"));
    }

    #[tokio::test]
    async fn failed_init_keeps_status_and_saves_nothing() {
        let client = Arc::new(ScriptedLlmClient::new().text("I could not find anything."));
        let (mut wf, store) = workflow(client).await;

        assert!(matches!(wf.init_run().await, Err(WorkflowError::Agent(_))));
        assert_eq!(wf.status(), WorkflowStatus::Initialized);
        assert!(wf.ongoing_plans().is_empty());
        assert_eq!(store.lock().await.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn partial_execution_is_saved() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .text(RESEARCH)
                .text(first_plans())
                .text(r#"{"campaign_ids": ["c1"]}"#)
                .text("Something went wrong."),
        );
        let (mut wf, store) = workflow(client).await;

        assert!(wf.init_run().await.is_err());
        assert_eq!(store.lock().await.count().unwrap(), 1);
        assert_eq!(wf.ongoing_plans().len(), 1);
    }

    #[tokio::test]
    async fn retried_init_evaluates_live_plans_before_replanning() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .text(RESEARCH)
                .text(first_plans())
                .text(r#"{"campaign_ids": ["c1"]}"#)
                .text("Something went wrong.")
                // The retry evaluates p1 and then plans like a later step.
                .text(r#"{"evaluations": [{"plan_uuid": "p1", "actual_cost": 12, "evaluation": "early", "score": 5}]}"#)
                .text(RESEARCH)
                .text(r#"[{"plan_uuid": "q1", "plan_name": "Mud v2", "plan_description": "d", "budget": 40}]"#)
                .text(r#"{"campaign_ids": ["c9"]}"#),
        );
        let (mut wf, store) = workflow(client.clone()).await;

        assert!(wf.init_run().await.is_err());
        assert_eq!(wf.ongoing_plans()[0].campaign_ids, vec!["c1".to_string()]);

        wf.init_run().await.unwrap();
        assert_eq!(client.remaining(), 0);
        assert_eq!(wf.status(), WorkflowStatus::Completed);

        let store = store.lock().await;
        let p1 = store.get_plan("p1").unwrap().unwrap();
        assert_eq!(p1.plan_score.map(|s| s.get()), Some(5));
        assert_eq!(p1.actual_cost, Some(12.0));
        assert_eq!(store.count().unwrap(), 2);

        let ongoing: Vec<&str> = wf.ongoing_plans().iter().map(|p| p.plan_uuid.as_str()).collect();
        assert_eq!(ongoing, vec!["q1"]);

        let requests = client.requests();
        assert!(format!("{:?}", requests[4].messages).contains("p1"));
        let plan_prompt = format!("{:?}", requests[6].messages);
        assert!(plan_prompt.contains("Produce 1 to 2 plans"));
        assert!(plan_prompt.contains("early"));
    }

    #[tokio::test]
    async fn plan_ids_taken_in_history_are_replaced() {
        let client = Arc::new(init_script());
        let (mut wf, store) = workflow(client).await;
        // An older row for another product already uses p2.
        let other = MarketingInput::new("Road Runner", "https://shop.example.com/road");
        let mut old = MarketingPlan::new("Old", "d", 10.0);
        old.plan_uuid = "p2".into();
        store.lock().await.insert_plans(&other, &[old]).unwrap();

        wf.init_run().await.unwrap();

        let ids: Vec<&str> = wf.ongoing_plans().iter().map(|p| p.plan_uuid.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], "p1");
        assert_ne!(ids[1], "p2");
        assert_eq!(ids[2], "p3");
        let store = store.lock().await;
        assert_eq!(store.count().unwrap(), 4);
        assert_eq!(store.get_plan("p2").unwrap().unwrap().product_name, "Road Runner");
        assert!(store.get_plan(ids[1]).unwrap().is_some());
    }

    #[tokio::test]
    async fn unsaved_ongoing_plans_are_saved_before_evaluation() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .text(r#"[{"plan_uuid": "lost", "actual_cost": 3, "evaluation": "meh", "score": 4}]"#)
                .text(RESEARCH)
                .text(r#"[{"plan_uuid": "n1", "plan_name": "Next", "plan_description": "d", "budget": 20}]"#)
                .text(r#"{"campaign_ids": ["c5"]}"#),
        );
        let (mut wf, store) = workflow(client).await;
        let mut live = MarketingPlan::new("Live", "d", 30.0);
        live.plan_uuid = "lost".into();
        live.campaign_ids = vec!["c0".into()];
        wf.ongoing = vec![live];

        wf.run().await.unwrap();

        let store = store.lock().await;
        let lost = store.get_plan("lost").unwrap().unwrap();
        assert_eq!(lost.plan_score.map(|s| s.get()), Some(4));
        assert!(store.get_plan("n1").unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let store = Arc::new(Mutex::new(HistoryStore::open_in_memory().unwrap()));
        let settings = AgentSettings::new(Arc::new(ScriptedLlmClient::new()), "m");
        let input = MarketingInput::new("", "https://shop.example.com");
        assert!(matches!(
            MarketingWorkflow::new(input, settings, graph(), store).await,
            Err(WorkflowError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn finish_marks_finished() {
        let (mut wf, _) = workflow(Arc::new(ScriptedLlmClient::new())).await;
        wf.finish();
        assert_eq!(wf.status(), WorkflowStatus::Finished);
        assert_eq!(wf.name(), "marketing");
    }
}
