// ABOUTME: End-to-end test of the scheduler driving the marketing workflow with a scripted LLM.
// ABOUTME: Covers init then run sequencing, history persistence, and control over the Unix socket.

use std::sync::Arc;
use std::time::Duration;

use adloop::control::{self, ControlRequest, RuntimeFiles};
use adloop::scheduler::{Scheduler, SchedulerControl, SchedulerStatus};
use adloop_agent::testing::ScriptedLlmClient;
use adloop_agent::{AgentSettings, MarketingWorkflow};
use adloop_core::{MarketingInput, WorkflowStatus};
use adloop_meta::{GraphClient, StaticToken};
use adloop_store::{CachePaths, HistoryStore};
use tokio::sync::Mutex;

const RESEARCH: &str = r#"{"keywords": ["trail"], "research_summary": "Trail shoe for mud."}"#;

/// Replies for one init step: research, three plans, and one execution per plan.
fn init_replies(client: ScriptedLlmClient) -> ScriptedLlmClient {
    client
        .text(RESEARCH)
        .text(
            r#"{"plans": [
                {"plan_uuid": "p1", "plan_name": "Mud", "plan_description": "d", "budget": 20},
                {"plan_uuid": "p2", "plan_name": "City", "plan_description": "d", "budget": 20},
                {"plan_uuid": "p3", "plan_name": "Gift", "plan_description": "d", "budget": 20}
            ]}"#,
        )
        .text(r#"{"campaign_ids": ["c1"]}"#)
        .text(r#"{"campaign_ids": ["c2"]}"#)
        .text(r#"{"campaign_ids": ["c3"]}"#)
}

/// Replies for one later step: evaluation, research, one plan, one execution.
fn run_replies(client: ScriptedLlmClient) -> ScriptedLlmClient {
    client
        .text(
            r#"[{"plan_uuid": "p1", "actual_cost": 18, "evaluation": "good", "score": 7},
                {"plan_uuid": "p2", "actual_cost": 20, "evaluation": "poor", "score": 2},
                {"plan_uuid": "p3", "actual_cost": 5, "evaluation": "slow", "score": 4}]"#,
        )
        .text(RESEARCH)
        .text(r#"[{"plan_uuid": "p4", "plan_name": "Mud again", "plan_description": "d", "budget": 40}]"#)
        .text(r#"{"campaign_ids": ["c4"]}"#)
}

async fn workflow(client: Arc<ScriptedLlmClient>, store: Arc<Mutex<HistoryStore>>) -> MarketingWorkflow {
    let input = MarketingInput::new("Trail Runner 3", "https://shop.example.com").with_budget(60.0);
    // Scripted replies never call tools, so the Graph API is not contacted.
    let graph = GraphClient::new("http://127.0.0.1:9", Arc::new(StaticToken::new("t"))).unwrap();
    MarketingWorkflow::new(input, AgentSettings::new(client, "stub-model"), graph, store)
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn scheduler_runs_init_then_evaluates_and_replans() {
    let client = Arc::new(run_replies(init_replies(ScriptedLlmClient::new())));
    let store = Arc::new(Mutex::new(HistoryStore::open_in_memory().unwrap()));
    let control = SchedulerControl::new("e2e", 60, false, None);
    let scheduler = Scheduler::new(Box::new(workflow(client.clone(), store.clone()).await), control.clone());
    let handle = tokio::spawn(scheduler.run());

    // Init at t=0, run at t=60; stop while waiting for the third step.
    tokio::time::sleep(Duration::from_secs(90)).await;
    control.stop();
    let status: SchedulerStatus = handle.await.unwrap();

    assert_eq!(status.step_count, 2);
    assert!(status.last_error.is_none());
    assert_eq!(status.workflow, "marketing");
    assert_eq!(status.workflow_status, WorkflowStatus::Finished);
    assert_eq!(client.remaining(), 0);

    let store = store.lock().await;
    assert_eq!(store.count().unwrap(), 4);
    let p2 = store.get_plan("p2").unwrap().unwrap();
    assert_eq!(p2.plan_score.map(|s| s.get()), Some(2));
    assert_eq!(p2.actual_cost, Some(20.0));
    assert!(store.get_plan("p4").unwrap().unwrap().plan_score.is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_init_is_retried_on_the_next_tick() {
    // The first research reply has no JSON, so the first init fails.
    let client = Arc::new(init_replies(ScriptedLlmClient::new().text("I could not open the page.")));
    let store = Arc::new(Mutex::new(HistoryStore::open_in_memory().unwrap()));
    let control = SchedulerControl::new("retry", 30, false, None);
    let scheduler = Scheduler::new(Box::new(workflow(client.clone(), store.clone()).await), control.clone());
    let handle = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_secs(10)).await;
    let status = control.status();
    assert_eq!(status.step_count, 0);
    assert!(status.last_error.is_some());
    assert_eq!(store.lock().await.count().unwrap(), 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    let status = control.status();
    assert_eq!(status.step_count, 1);
    assert!(status.last_error.is_none());
    assert_eq!(store.lock().await.count().unwrap(), 3);

    control.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn running_scheduler_answers_on_its_socket() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = CachePaths::new(dir.path().to_path_buf()).unwrap();
    let files = RuntimeFiles::new(&paths, "sock");

    let client = Arc::new(init_replies(ScriptedLlmClient::new()));
    let store = Arc::new(Mutex::new(HistoryStore::open(&paths.db_path()).unwrap()));
    let control = SchedulerControl::new("sock", 3600, true, Some(files.status.clone()));
    files.write_pid().unwrap();
    let server = tokio::spawn(control::serve(control::bind(&files.socket).unwrap(), control.clone()));
    let scheduler = tokio::spawn(Scheduler::new(Box::new(workflow(client, store).await), control.clone()).run());

    // Wait for the init step to land.
    let mut steps = 0;
    for _ in 0..50 {
        let data = files.request(&ControlRequest::Status).await.unwrap().into_result().unwrap();
        steps = data.unwrap()["step_count"].as_u64().unwrap();
        if steps == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(steps, 1);

    files.request(&ControlRequest::Pause).await.unwrap();
    let on_disk = files.read_status().unwrap();
    assert!(on_disk.paused);
    assert!(on_disk.daemon_mode);

    files
        .request(&ControlRequest::Interval { seconds: 120 })
        .await
        .unwrap()
        .into_result()
        .unwrap();
    files.request(&ControlRequest::Stop).await.unwrap();

    let status = tokio::time::timeout(Duration::from_secs(5), scheduler).await.unwrap().unwrap();
    assert_eq!(status.interval_seconds, 120);
    assert!(!status.running);
    tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap();

    files.cleanup();
    assert!(files.running_pid().is_none());
    assert!(!files.read_status().unwrap().running);
}
