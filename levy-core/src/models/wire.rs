//! Wire shape of the rate-configuration list endpoint.
//!
//! Records arrive as
//! `{ id, levy_type, rate, calculation_order, status, pending_rate, effective_date }`,
//! optionally with an explicit `category` and the maker in `submitted_by`.
//! The category is never inferred from a display name: when it is absent,
//! `levy_type` must be one of the known levy codes below.
//!
//! | levy_type                   | category  |
//! |-----------------------------|-----------|
//! | `NHIL`                      | flat levy |
//! | `GETFUND`                   | flat levy |
//! | `COVID19`, `COVID`          | flat levy |
//! | `VAT`, `STANDARD_VAT`       | VAT       |

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{LevyCategory, LevyDefinition, LevyStatus, RateState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordConversionError {
    #[error("unknown levy type '{0}' and no category supplied")]
    UnknownLevyType(String),

    #[error("unknown status '{status}' on levy {id}")]
    UnknownStatus { id: i64, status: String },

    #[error("levy {0} is pending but carries no pending_rate")]
    MissingPendingRate(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevyRateRecord {
    pub id: i64,
    pub levy_type: String,
    pub rate: Decimal,
    pub calculation_order: i32,
    pub status: String,
    #[serde(default)]
    pub pending_rate: Option<Decimal>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<LevyCategory>,
    #[serde(default)]
    pub submitted_by: Option<String>,
}

/// Maps a known levy code to its category. Matching is exact (case and
/// separators aside), never by substring.
pub fn category_for_levy_type(levy_type: &str) -> Option<LevyCategory> {
    let code: String = levy_type
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect::<String>()
        .to_ascii_uppercase();

    match code.as_str() {
        "NHIL" | "GETFUND" | "COVID19" | "COVID" => Some(LevyCategory::FlatLevy),
        "VAT" | "STANDARDVAT" => Some(LevyCategory::Vat),
        _ => None,
    }
}

impl TryFrom<LevyRateRecord> for LevyDefinition {
    type Error = RecordConversionError;

    fn try_from(record: LevyRateRecord) -> Result<Self, Self::Error> {
        let category = match record.category {
            Some(category) => category,
            None => category_for_levy_type(&record.levy_type)
                .ok_or_else(|| RecordConversionError::UnknownLevyType(record.levy_type.clone()))?,
        };

        let status =
            LevyStatus::parse(&record.status).ok_or_else(|| RecordConversionError::UnknownStatus {
                id: record.id,
                status: record.status.clone(),
            })?;

        let rate_state = match status {
            LevyStatus::Active => RateState::Active { rate: record.rate },
            LevyStatus::Pending => RateState::PendingApproval {
                current_rate: record.rate,
                proposed_rate: record
                    .pending_rate
                    .ok_or(RecordConversionError::MissingPendingRate(record.id))?,
                submitted_by: record.submitted_by.unwrap_or_default(),
            },
        };

        Ok(LevyDefinition {
            id: record.id,
            name: record.levy_type,
            category,
            calculation_order: record.calculation_order,
            rate_state,
            effective_date: record.effective_date,
        })
    }
}

impl From<&LevyDefinition> for LevyRateRecord {
    fn from(levy: &LevyDefinition) -> Self {
        let submitted_by = match &levy.rate_state {
            RateState::PendingApproval { submitted_by, .. } => Some(submitted_by.clone()),
            RateState::Active { .. } => None,
        };

        LevyRateRecord {
            id: levy.id,
            levy_type: levy.name.clone(),
            rate: levy.active_rate(),
            calculation_order: levy.calculation_order,
            status: levy.status().as_str().to_string(),
            pending_rate: levy.pending_rate(),
            effective_date: levy.effective_date,
            category: Some(levy.category),
            submitted_by,
        }
    }
}
