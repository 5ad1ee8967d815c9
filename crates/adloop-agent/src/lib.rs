// ABOUTME: Agent system for adloop: LLM provider clients, tools, the tool-use loop, and the marketing agents.
// ABOUTME: The MarketingWorkflow ties research, planning, execution, and evaluation together.

pub mod agents;
pub mod client;
pub mod llm;
pub mod providers;
pub mod runtime;
pub mod testing;
pub mod tools;
pub mod workflow;

pub use agents::{
    AgentSettings, EvaluationAgent, ExecuteAgent, PlanAgent, PlanRequest, ResearchAgent, ResearchReport,
};
pub use client::create_llm_client;
pub use llm::{LlmClient, LlmError};
pub use runtime::{AgentError, AgentLoop, AgentRun, DEFAULT_MAX_ITERATIONS};
pub use tools::{Tool, ToolRegistry, ToolResult};
pub use workflow::{MarketingWorkflow, Workflow, WorkflowError};
