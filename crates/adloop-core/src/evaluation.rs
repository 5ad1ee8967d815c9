// ABOUTME: Plan evaluation results and the bounded Score type.
// ABOUTME: Scores are always within 1..=10, enforced at construction and deserialization.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

/// An evaluation score in the inclusive range 1..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: i64) -> Result<Self, CoreError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(CoreError::ScoreOutOfRange(value))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Score {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // LLMs sometimes emit 7.0 instead of 7.
        let raw = f64::deserialize(deserializer)?;
        if raw.fract() != 0.0 {
            return Err(serde::de::Error::custom(format!(
                "score must be a whole number, got {}",
                raw
            )));
        }
        Score::new(raw as i64).map_err(serde::de::Error::custom)
    }
}

/// The evaluation agent's verdict on one plan after it ran for an interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanEvaluation {
    pub plan_uuid: String,
    #[serde(default)]
    pub actual_cost: f64,
    #[serde(alias = "plan_evaluation")]
    pub evaluation: String,
    #[serde(alias = "plan_score")]
    pub score: Score,
}

impl PlanEvaluation {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.plan_uuid.trim().is_empty() {
            return Err(CoreError::MissingField("plan_uuid"));
        }
        if self.actual_cost < 0.0 {
            return Err(CoreError::NegativeAmount {
                field: "actual_cost",
                value: self.actual_cost,
            });
        }
        Ok(())
    }
}
