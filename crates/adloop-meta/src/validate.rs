// ABOUTME: Case-insensitive enum validators for Graph API arguments and small id helpers.
// ABOUTME: Each validator normalizes to the uppercase form the API expects.

use crate::error::ToolError;

/// A named set of allowed values for one enum argument.
#[derive(Debug, Clone, Copy)]
pub struct EnumValidator {
    pub name: &'static str,
    pub values: &'static [&'static str],
}

impl EnumValidator {
    pub const fn new(name: &'static str, values: &'static [&'static str]) -> Self {
        Self { name, values }
    }

    pub fn is_valid(&self, value: &str) -> bool {
        let upper = value.to_uppercase();
        self.values.iter().any(|v| *v == upper)
    }

    /// Normalize a value or explain what would have been accepted.
    pub fn check(&self, value: &str) -> Result<String, ToolError> {
        if self.is_valid(value) {
            Ok(value.to_uppercase())
        } else {
            Err(ToolError::invalid_enum_value(self.name, self.values, value))
        }
    }

    /// Like `check`, but absent or empty values pass through as None.
    pub fn check_opt(&self, value: Option<&str>) -> Result<Option<String>, ToolError> {
        match value {
            Some(v) if !v.is_empty() => self.check(v).map(Some),
            _ => Ok(None),
        }
    }
}

pub const EFFECTIVE_STATUS: EnumValidator = EnumValidator::new(
    "effective_status",
    &["", "ACTIVE", "PAUSED", "ARCHIVED", "DELETED", "IN_PROCESS", "WITH_ISSUES"],
);

pub const STATUS: EnumValidator =
    EnumValidator::new("status", &["ACTIVE", "PAUSED", "ARCHIVED", "DELETED"]);

pub const OBJECTIVE: EnumValidator = EnumValidator::new(
    "objective",
    &[
        "OUTCOME_AWARENESS",
        "OUTCOME_TRAFFIC",
        "OUTCOME_ENGAGEMENT",
        "OUTCOME_LEADS",
        "OUTCOME_SALES",
        "OUTCOME_APP_PROMOTION",
    ],
);

pub const BID_STRATEGY: EnumValidator = EnumValidator::new(
    "bid_strategy",
    &[
        "LOWEST_COST_WITHOUT_CAP",
        "LOWEST_COST_WITH_BID_CAP",
        "COST_CAP",
        "LOWEST_COST_WITH_MIN_ROAS",
    ],
);

pub const OPTIMIZATION_GOAL: EnumValidator = EnumValidator::new(
    "optimization_goal",
    &[
        "NONE",
        "APP_INSTALLS",
        "AD_RECALL_LIFT",
        "ENGAGED_USERS",
        "EVENT_RESPONSES",
        "IMPRESSIONS",
        "LEAD_GENERATION",
        "QUALITY_LEAD",
        "LINK_CLICKS",
        "OFFSITE_CONVERSIONS",
        "PAGE_LIKES",
        "POST_ENGAGEMENT",
        "QUALITY_CALL",
        "REACH",
        "LANDING_PAGE_VIEWS",
        "VISIT_INSTAGRAM_PROFILE",
        "VALUE",
        "THRUPLAY",
        "DERIVED_EVENTS",
        "APP_INSTALLS_AND_OFFSITE_CONVERSIONS",
        "CONVERSATIONS",
        "IN_APP_VALUE",
        "MESSAGING_PURCHASE_CONVERSION",
        "SUBSCRIBERS",
        "REMINDERS_SET",
        "MEANINGFUL_CALL_ATTEMPT",
        "PROFILE_VISIT",
        "PROFILE_AND_PAGE_ENGAGEMENT",
        "ADVERTISER_SILOED_VALUE",
        "AUTOMATIC_OBJECTIVE",
        "MESSAGING_APPOINTMENT_CONVERSION",
    ],
);

pub const BILLING_EVENT: EnumValidator = EnumValidator::new(
    "billing_event",
    &[
        "APP_INSTALLS",
        "CLICKS",
        "IMPRESSIONS",
        "LINK_CLICKS",
        "NONE",
        "OFFER_CLAIMS",
        "PAGE_LIKES",
        "POST_ENGAGEMENT",
        "THRUPLAY",
        "PURCHASE",
        "LISTING_INTERACTION",
    ],
);

pub const DESTINATION_TYPE: EnumValidator = EnumValidator::new(
    "destination_type",
    &[
        "WEBSITE",
        "APP",
        "MESSENGER",
        "APPLINKS_AUTOMATIC",
        "WHATSAPP",
        "INSTAGRAM_DIRECT",
        "FACEBOOK",
        "MESSAGING_MESSENGER_WHATSAPP",
        "MESSAGING_INSTAGRAM_DIRECT_MESSENGER",
        "MESSAGING_INSTAGRAM_DIRECT_MESSENGER_WHATSAPP",
        "MESSAGING_INSTAGRAM_DIRECT_WHATSAPP",
        "SHOP_AUTOMATIC",
        "ON_AD",
        "ON_POST",
        "ON_EVENT",
        "ON_VIDEO",
        "ON_PAGE",
        "INSTAGRAM_PROFILE",
        "FACEBOOK_PAGE",
        "INSTAGRAM_PROFILE_AND_FACEBOOK_PAGE",
        "INSTAGRAM_LIVE",
        "FACEBOOK_LIVE",
        "IMAGINE",
    ],
);

pub const DELETE_STRATEGY: EnumValidator = EnumValidator::new(
    "delete_strategy",
    &["DELETE_ANY", "DELETE_OLDEST", "DELETE_ARCHIVED_BEFORE"],
);

pub const BUDGET_VALUE_TYPE: EnumValidator =
    EnumValidator::new("budget_value_type", &["ABSOLUTE", "MULTIPLIER"]);

pub const INSIGHTS_LEVEL: EnumValidator =
    EnumValidator::new("level", &["AD", "ADSET", "CAMPAIGN", "ACCOUNT"]);

/// Graph ad account ids carry an `act_` prefix; accept either form.
pub fn valid_account_id(account_id: &str) -> String {
    if account_id.starts_with("act_") {
        account_id.to_string()
    } else {
        format!("act_{}", account_id)
    }
}

/// Reject a blank account id up front, then normalize it.
pub fn require_account_id(account_id: &str) -> Result<String, ToolError> {
    if account_id.trim().is_empty() {
        return Err(ToolError::no_account_id());
    }
    Ok(valid_account_id(account_id.trim()))
}

pub fn require_id(id: &str) -> Result<&str, ToolError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ToolError::no_id());
    }
    Ok(id)
}

pub fn require_arg<'a>(name: &str, value: &'a str) -> Result<&'a str, ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::arg_missing(
            name,
            "str",
            format!("{} parameter cannot be empty", name),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_case_insensitive() {
        assert!(STATUS.is_valid("paused"));
        assert_eq!(OBJECTIVE.check("outcome_traffic").unwrap(), "OUTCOME_TRAFFIC");
        assert!(!BILLING_EVENT.is_valid("CONVERSIONS"));
    }

    #[test]
    fn invalid_value_reports_enum_name() {
        let err = BID_STRATEGY.check("CHEAPEST").unwrap_err();
        assert!(err.message.contains("bid_strategy"));
        assert!(err.details.unwrap().contains("COST_CAP"));
    }

    #[test]
    fn check_opt_skips_empty() {
        assert_eq!(STATUS.check_opt(None).unwrap(), None);
        assert_eq!(STATUS.check_opt(Some("")).unwrap(), None);
        assert_eq!(STATUS.check_opt(Some("active")).unwrap().as_deref(), Some("ACTIVE"));
    }

    #[test]
    fn account_id_gets_prefix_once() {
        assert_eq!(valid_account_id("123"), "act_123");
        assert_eq!(valid_account_id("act_123"), "act_123");
        assert_eq!(require_account_id(" 42 ").unwrap(), "act_42");
        assert_eq!(require_account_id("").unwrap_err(), ToolError::no_account_id());
    }
}
