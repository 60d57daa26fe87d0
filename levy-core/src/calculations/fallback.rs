//! Explicit default rate configuration.
//!
//! When the rate-configuration store cannot be reached, or returns a set the
//! calculator rejects, callers may compute against a named, versioned default
//! table instead. Every use of the table is logged at `warn` and reported back
//! through [`RateSource::Fallback`] so the caller can surface it to the user.

use std::fmt::Display;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::calculations::cascade::{LevyCascadeError, LevyCascadeResult, compute_levy_cascade};
use crate::{LevyCategory, LevyDefinition, RateState};

/// Version tag of the built-in Ghana rate table.
pub const GHANA_STANDARD_VERSION: &str = "GRA-VAT-2023";

/// A documented default rate set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackRateTable {
    pub version: &'static str,
    pub levies: Vec<LevyDefinition>,
}

impl FallbackRateTable {
    /// Standard Ghana rates in force since the COVID-19 Health Recovery Levy
    /// was introduced: NHIL 2.5%, GETFund 2.5%, COVID-19 1%, VAT 15%.
    pub fn ghana_standard() -> Self {
        let effective_date = NaiveDate::from_ymd_opt(2023, 1, 1);
        let levy = |id: i64, name: &str, category, rate: Decimal, calculation_order| LevyDefinition {
            id,
            name: name.to_string(),
            category,
            calculation_order,
            rate_state: RateState::Active { rate },
            effective_date,
        };

        Self {
            version: GHANA_STANDARD_VERSION,
            levies: vec![
                levy(1, "NHIL", LevyCategory::FlatLevy, Decimal::new(25, 1), 1),
                levy(2, "GETFund Levy", LevyCategory::FlatLevy, Decimal::new(25, 1), 1),
                levy(3, "COVID-19 Health Recovery Levy", LevyCategory::FlatLevy, Decimal::ONE, 1),
                levy(4, "Standard VAT", LevyCategory::Vat, Decimal::from(15), 2),
            ],
        }
    }
}

impl Default for FallbackRateTable {
    fn default() -> Self {
        Self::ghana_standard()
    }
}

/// Where the rates behind a computation came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RateSource {
    Configured,
    Fallback { version: &'static str, reason: String },
}

impl RateSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRates {
    pub levies: Vec<LevyDefinition>,
    pub source: RateSource,
}

fn use_fallback(
    fallback: &FallbackRateTable,
    reason: String,
) -> ResolvedRates {
    warn!(version = fallback.version, %reason, "using fallback levy rate table");
    ResolvedRates {
        levies: fallback.levies.clone(),
        source: RateSource::Fallback {
            version: fallback.version,
            reason,
        },
    }
}

/// Picks the rate set for a computation from the outcome of a store fetch.
///
/// A failed fetch or an empty rate set selects the fallback table.
pub fn resolve_rates<E: Display>(
    fetched: Result<Vec<LevyDefinition>, E>,
    fallback: &FallbackRateTable,
) -> ResolvedRates {
    match fetched {
        Ok(levies) if !levies.is_empty() => ResolvedRates {
            levies,
            source: RateSource::Configured,
        },
        Ok(_) => use_fallback(fallback, "rate store returned no levies".to_string()),
        Err(e) => use_fallback(fallback, format!("rate store unavailable: {e}")),
    }
}

/// Runs `compute` over the `resolved` rates. When a configured set is
/// rejected with a [`ConfigurationError`](crate::ConfigurationError), runs it
/// again over the fallback table and reports that source instead.
///
/// Invalid input is returned as-is; the fallback cannot fix input.
pub fn run_with_fallback<T, F>(
    resolved: &ResolvedRates,
    fallback: &FallbackRateTable,
    compute: F,
) -> Result<(T, RateSource), LevyCascadeError>
where
    F: Fn(&[LevyDefinition]) -> Result<T, LevyCascadeError>,
{
    match compute(&resolved.levies) {
        Ok(value) => Ok((value, resolved.source.clone())),
        Err(LevyCascadeError::Configuration(e)) if !resolved.source.is_fallback() => {
            let retry = use_fallback(fallback, format!("configured rates rejected: {e}"));
            let value = compute(&retry.levies)?;
            Ok((value, retry.source))
        }
        Err(e) => Err(e),
    }
}

/// [`run_with_fallback`] for a single cascade.
pub fn compute_with_fallback(
    gross_sales: Decimal,
    resolved: &ResolvedRates,
    fallback: &FallbackRateTable,
) -> Result<(LevyCascadeResult, RateSource), LevyCascadeError> {
    run_with_fallback(resolved, fallback, |levies| {
        compute_levy_cascade(gross_sales, levies)
    })
}
