use std::io::Read;

use chrono::NaiveDate;
use levy_core::{
    LevyCategory, LevyRepository, NewLevyDefinition, RateTableAction, RateTableOutcome,
    RepositoryError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::decimal::deserialize_decimal;

/// Errors that can occur when loading a levy rate table.
#[derive(Debug, Error)]
pub enum LevyRateLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Levy '{name}' has unknown category '{category}' (expected flat_levy or vat)")]
    InvalidCategory { name: String, category: String },

    #[error("Levy '{name}' has negative rate {rate}")]
    NegativeRate { name: String, rate: Decimal },

    #[error("Levy name is empty on row {row}")]
    MissingName { row: usize },

    #[error("Levy '{0}' appears more than once")]
    DuplicateName(String),

    #[error("Rate table must contain exactly one VAT levy, found {0}")]
    VatCount(usize),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for LevyRateLoaderError {
    fn from(err: csv::Error) -> Self {
        LevyRateLoaderError::CsvParse(err.to_string())
    }
}

/// A single row of a levy rate table.
///
/// - `name`: display name, also the key used to update an existing levy
/// - `category`: `flat_levy` or `vat`
/// - `rate`: percentage out of 100 (e.g. `2.5`)
/// - `calculation_order`: ascending; VAT conventionally last
/// - `effective_date`: `YYYY-MM-DD`, may be empty
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LevyRateCsvRecord {
    pub name: String,
    pub category: String,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub rate: Decimal,
    pub calculation_order: i32,
    pub effective_date: Option<NaiveDate>,
}

/// Loader for levy rate tables.
///
/// Loading goes through [`LevyRepository::load_rate_table`], so the whole
/// table lands in one transaction or not at all. Unknown levies are created;
/// a new rate for an existing levy becomes a proposal that a checker must
/// approve. Reloading the same file is a no-op.
pub struct LevyRateLoader;

impl LevyRateLoader {
    pub fn parse<R: Read>(reader: R) -> Result<Vec<LevyRateCsvRecord>, LevyRateLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: LevyRateCsvRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Checks the whole table before anything is written: every row named,
    /// categorised and non-negative, names unique, exactly one VAT row.
    pub fn validate(
        records: &[LevyRateCsvRecord]
    ) -> Result<Vec<NewLevyDefinition>, LevyRateLoaderError> {
        let mut levies: Vec<NewLevyDefinition> = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let name = record.name.trim();
            if name.is_empty() {
                return Err(LevyRateLoaderError::MissingName { row: index + 1 });
            }
            if levies.iter().any(|l| l.name.eq_ignore_ascii_case(name)) {
                return Err(LevyRateLoaderError::DuplicateName(name.to_string()));
            }

            let category = LevyCategory::parse(&record.category).ok_or_else(|| {
                LevyRateLoaderError::InvalidCategory {
                    name: name.to_string(),
                    category: record.category.clone(),
                }
            })?;

            if record.rate.is_sign_negative() && !record.rate.is_zero() {
                return Err(LevyRateLoaderError::NegativeRate {
                    name: name.to_string(),
                    rate: record.rate,
                });
            }

            levies.push(NewLevyDefinition {
                name: name.to_string(),
                category,
                rate: record.rate,
                calculation_order: record.calculation_order,
                effective_date: record.effective_date,
            });
        }

        let vat_count = levies.iter().filter(|l| l.category == LevyCategory::Vat).count();
        if vat_count != 1 {
            return Err(LevyRateLoaderError::VatCount(vat_count));
        }

        Ok(levies)
    }

    /// Validate `records` and apply them as one rate table, with any rate
    /// changes proposed by `submitted_by`.
    pub async fn load<R: LevyRepository + ?Sized>(
        repo: &R,
        records: &[LevyRateCsvRecord],
        submitted_by: &str,
    ) -> Result<Vec<RateTableOutcome>, LevyRateLoaderError> {
        let levies = Self::validate(records)?;

        let outcomes = repo.load_rate_table(&levies, submitted_by).await?;
        for outcome in &outcomes {
            info!(
                levy_id = outcome.levy.id,
                levy = %outcome.levy.name,
                rate = %outcome.levy.active_rate(),
                action = outcome.action.as_str(),
                "levy rate loaded"
            );
        }

        Ok(outcomes)
    }

    /// Rows per action, in [`RateTableAction`] order, skipping empty ones.
    pub fn summarize(outcomes: &[RateTableOutcome]) -> Vec<(RateTableAction, usize)> {
        [
            RateTableAction::Created,
            RateTableAction::Reordered,
            RateTableAction::RateProposed,
            RateTableAction::Unchanged,
        ]
        .into_iter()
        .map(|action| (action, outcomes.iter().filter(|o| o.action == action).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
    }
}
