use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a levy participates in the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevyCategory {
    /// Flat-percentage charge applied directly to gross sales (NHIL, GETFund, COVID-19).
    FlatLevy,
    /// Standard VAT, applied to the taxable value (gross sales plus all flat levies).
    Vat,
}

impl LevyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlatLevy => "flat_levy",
            Self::Vat => "vat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat_levy" | "levy" => Some(Self::FlatLevy),
            "vat" => Some(Self::Vat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevyStatus {
    Active,
    Pending,
}

impl LevyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

/// Rate currently in force for a levy, plus any proposal waiting on a checker.
///
/// A levy is never computed with `proposed_rate`; it only becomes the
/// active rate once a checker approves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RateState {
    Active {
        rate: Decimal,
    },
    PendingApproval {
        current_rate: Decimal,
        proposed_rate: Decimal,
        submitted_by: String,
    },
}

impl RateState {
    pub fn status(&self) -> LevyStatus {
        match self {
            Self::Active { .. } => LevyStatus::Active,
            Self::PendingApproval { .. } => LevyStatus::Pending,
        }
    }

    /// The rate used for computation, whatever the approval state.
    pub fn active_rate(&self) -> Decimal {
        match self {
            Self::Active { rate } => *rate,
            Self::PendingApproval { current_rate, .. } => *current_rate,
        }
    }

    pub fn pending_rate(&self) -> Option<Decimal> {
        match self {
            Self::Active { .. } => None,
            Self::PendingApproval { proposed_rate, .. } => Some(*proposed_rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevyDefinition {
    pub id: i64,
    pub name: String,
    pub category: LevyCategory,
    /// Flat levies are listed in ascending order; VAT conventionally uses 2.
    pub calculation_order: i32,
    /// Rates are percentages out of 100 (2.5 means 2.5%).
    pub rate_state: RateState,
    pub effective_date: Option<NaiveDate>,
}

impl LevyDefinition {
    pub fn status(&self) -> LevyStatus {
        self.rate_state.status()
    }

    pub fn active_rate(&self) -> Decimal {
        self.rate_state.active_rate()
    }

    pub fn pending_rate(&self) -> Option<Decimal> {
        self.rate_state.pending_rate()
    }

    pub fn is_vat(&self) -> bool {
        self.category == LevyCategory::Vat
    }
}

/// For creating new levy definitions (no id, always active on creation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLevyDefinition {
    pub name: String,
    pub category: LevyCategory,
    pub rate: Decimal,
    pub calculation_order: i32,
    pub effective_date: Option<NaiveDate>,
}

/// What loading one rate-table row did to the stored levy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateTableAction {
    Created,
    Unchanged,
    /// Only the calculation order changed.
    Reordered,
    /// The row carried a different rate, now awaiting a checker.
    RateProposed,
}

impl RateTableAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Unchanged => "unchanged",
            Self::Reordered => "reordered",
            Self::RateProposed => "rate_proposed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTableOutcome {
    pub levy: LevyDefinition,
    pub action: RateTableAction,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn pending_state_exposes_current_rate_as_active() {
        let state = RateState::PendingApproval {
            current_rate: dec!(2.5),
            proposed_rate: dec!(3.0),
            submitted_by: "maker".to_string(),
        };

        assert_eq!(state.status(), LevyStatus::Pending);
        assert_eq!(state.active_rate(), dec!(2.5));
        assert_eq!(state.pending_rate(), Some(dec!(3.0)));
    }

    #[test]
    fn active_state_has_no_pending_rate() {
        let state = RateState::Active { rate: dec!(15) };

        assert_eq!(state.status(), LevyStatus::Active);
        assert_eq!(state.pending_rate(), None);
    }

    #[test]
    fn category_parse_round_trips_codes() {
        for category in [LevyCategory::FlatLevy, LevyCategory::Vat] {
            assert_eq!(LevyCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(LevyCategory::parse(" VAT "), Some(LevyCategory::Vat));
        assert_eq!(LevyCategory::parse("standard"), None);
    }

    #[test]
    fn status_parse_rejects_unknown() {
        assert_eq!(LevyStatus::parse("Pending"), Some(LevyStatus::Pending));
        assert_eq!(LevyStatus::parse("rejected"), None);
    }
}
