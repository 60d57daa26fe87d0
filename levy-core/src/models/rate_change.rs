use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payload of the submit-change endpoint: a maker proposes a new rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateChangeRequest {
    pub rate_id: i64,
    pub new_rate: Decimal,
    pub submitted_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approve,
    Reject,
}

/// Payload of the approve/reject endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDecision {
    pub rate_id: i64,
    pub action: DecisionAction,
    pub approved_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateChangeOutcome {
    Pending,
    Approved,
    Rejected,
}

impl RateChangeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl From<DecisionAction> for RateChangeOutcome {
    fn from(action: DecisionAction) -> Self {
        match action {
            DecisionAction::Approve => Self::Approved,
            DecisionAction::Reject => Self::Rejected,
        }
    }
}

/// Audit trail entry for one proposal and its eventual decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateChangeRecord {
    pub id: i64,
    pub levy_id: i64,
    pub previous_rate: Decimal,
    pub proposed_rate: Decimal,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub outcome: RateChangeOutcome,
}
