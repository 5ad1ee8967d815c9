// ABOUTME: Workflow lifecycle status shared by the workflow and the scheduler status file.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Initialized,
    Executing,
    Completed,
    Finished,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Initialized => "initialized",
            WorkflowStatus::Executing => "executing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Finished => "finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&WorkflowStatus::Executing).unwrap();
        assert_eq!(json, "\"executing\"");
        assert_eq!(WorkflowStatus::default().as_str(), "initialized");
    }
}
