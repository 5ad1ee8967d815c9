// ABOUTME: Marketing input and marketing plan types with their validation rules.
// ABOUTME: Plans deserialize leniently from agent output, filling ids and timestamps when absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::CoreError;

/// What the user asked us to market. Passed from the CLI into the workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketingInput {
    pub product_name: String,
    pub product_url: String,
    #[serde(default)]
    pub total_budget: Option<f64>,
    #[serde(default)]
    pub total_days: Option<u32>,
    #[serde(default)]
    pub picture_urls: Vec<String>,
}

impl MarketingInput {
    pub fn new(product_name: impl Into<String>, product_url: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            product_url: product_url.into(),
            total_budget: None,
            total_days: None,
            picture_urls: Vec::new(),
        }
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.total_budget = Some(budget);
        self
    }

    /// Reject inputs the workflow cannot act on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.product_name.trim().is_empty() {
            return Err(CoreError::MissingField("product_name"));
        }
        if self.product_url.trim().is_empty() {
            return Err(CoreError::MissingField("product_url"));
        }
        if let Some(budget) = self.total_budget
            && !(budget > 0.0)
        {
            return Err(CoreError::InvalidBudget(budget));
        }
        Ok(())
    }
}

/// Lifecycle of a plan's ads on the Meta side.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Initialized,
    Active,
    Paused,
    Deleted,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Initialized => "initialized",
            PlanStatus::Active => "active",
            PlanStatus::Paused => "paused",
            PlanStatus::Deleted => "deleted",
        }
    }
}

fn new_plan_uuid() -> String {
    Ulid::new().to_string()
}

/// A campaign strategy produced by the plan agent and realized by the execute agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketingPlan {
    #[serde(default = "new_plan_uuid")]
    pub plan_uuid: String,
    pub plan_name: String,
    pub plan_description: String,
    #[serde(default)]
    pub plan_details: String,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub campaign_ids: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl MarketingPlan {
    pub fn new(plan_name: impl Into<String>, plan_description: impl Into<String>, budget: f64) -> Self {
        Self {
            plan_uuid: new_plan_uuid(),
            plan_name: plan_name.into(),
            plan_description: plan_description.into(),
            plan_details: String::new(),
            budget,
            status: PlanStatus::Initialized,
            campaign_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.plan_name.trim().is_empty() {
            return Err(CoreError::MissingField("plan_name"));
        }
        if self.budget < 0.0 {
            return Err(CoreError::NegativeAmount {
                field: "budget",
                value: self.budget,
            });
        }
        Ok(())
    }
}

/// Check that a batch of plans fits within the total budget, if one was given.
pub fn check_budget(plans: &[MarketingPlan], total_budget: Option<f64>) -> Result<(), CoreError> {
    for plan in plans {
        plan.validate()?;
    }
    let Some(total) = total_budget else {
        return Ok(());
    };
    let planned: f64 = plans.iter().map(|p| p.budget).sum();
    // Cent-level slack for float sums of LLM-produced budgets.
    if planned > total + 0.005 {
        return Err(CoreError::OverBudget { planned, total });
    }
    Ok(())
}
