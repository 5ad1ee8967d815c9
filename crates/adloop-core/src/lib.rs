// ABOUTME: Core domain types for adloop, the Meta Ads marketing automation loop.
// ABOUTME: Defines marketing inputs, plans, evaluations, history records, and workflow status.

pub mod error;
pub mod evaluation;
pub mod history;
pub mod plan;
pub mod workflow;

pub use error::CoreError;
pub use evaluation::{PlanEvaluation, Score};
pub use history::HistoryRecord;
pub use plan::{MarketingInput, MarketingPlan, PlanStatus, check_budget};
pub use workflow::WorkflowStatus;
