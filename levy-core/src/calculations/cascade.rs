//! VAT cascading-levy computation.
//!
//! Ghana's VAT liability is computed in two steps. Flat levies are charged on
//! gross sales, then standard VAT is charged on the levied total:
//!
//! | Step | Description |
//! |------|-------------|
//! | 1    | Each flat levy: gross sales × levy rate / 100 |
//! | 2    | Total levies: sum of step 1 |
//! | 3    | Taxable value: gross sales + total levies |
//! | 4    | VAT: taxable value × VAT rate / 100 |
//! | 5    | Total payable: total levies + VAT |
//!
//! Amounts are carried at full decimal precision through every step. Rounding
//! to two places happens once, at presentation, via
//! [`LevyCascadeResult::rounded`].
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use levy_core::{LevyCategory, LevyDefinition, RateState, compute_levy_cascade};
//!
//! let levy = |id, name: &str, category, rate, calculation_order| LevyDefinition {
//!     id,
//!     name: name.to_string(),
//!     category,
//!     calculation_order,
//!     rate_state: RateState::Active { rate },
//!     effective_date: None,
//! };
//!
//! let levies = vec![
//!     levy(1, "NHIL", LevyCategory::FlatLevy, dec!(2.5), 1),
//!     levy(2, "GETFund Levy", LevyCategory::FlatLevy, dec!(2.5), 1),
//!     levy(3, "COVID-19 Health Recovery Levy", LevyCategory::FlatLevy, dec!(1.0), 1),
//!     levy(4, "Standard VAT", LevyCategory::Vat, dec!(15), 2),
//! ];
//!
//! let result = compute_levy_cascade(dec!(50000), &levies).unwrap();
//!
//! assert_eq!(result.total_levies, dec!(3000));
//! assert_eq!(result.taxable_value, dec!(53000));
//! assert_eq!(result.vat.amount, dec!(7950));
//! assert_eq!(result.total_payable, dec!(10950));
//! ```

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::LevyDefinition;
use crate::calculations::common::{percent_of, round_half_up};

/// Gross sales input that cannot be used for a computation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidInputError {
    #[error("gross sales is required")]
    EmptyGrossSales,

    #[error("gross sales '{0}' is not a number")]
    NonNumericGrossSales(String),

    #[error("gross sales cannot be negative, got {0}")]
    NegativeGrossSales(Decimal),

    #[error("gross sales {0} is too large to compute levies on")]
    GrossSalesTooLarge(Decimal),
}

/// The levy set cannot produce a cascade.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no levy definitions supplied")]
    NoLevies,

    #[error("no levy is tagged as VAT")]
    NoVatLevy,

    #[error("{count} levies are tagged as VAT, exactly one is required")]
    MultipleVatLevies { count: usize },

    #[error("levy '{name}' has negative rate {rate}")]
    NegativeRate { name: String, rate: Decimal },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevyCascadeError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// One row of the breakdown table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevyLine {
    pub name: String,
    /// Percentage out of 100.
    pub rate: Decimal,
    pub amount: Decimal,
}

/// Result of a cascade computation. Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevyCascadeResult {
    pub gross_sales: Decimal,

    /// Flat levies in ascending calculation order.
    pub levies_breakdown: Vec<LevyLine>,

    /// Sum of every flat levy amount.
    pub total_levies: Decimal,

    /// Gross sales plus total levies; the VAT base.
    pub taxable_value: Decimal,

    pub vat: LevyLine,

    /// Total levies plus VAT.
    pub total_payable: Decimal,
}

impl LevyCascadeResult {
    /// Copy of the result with every amount rounded half-up to two places,
    /// for display. Totals are rounded from the unrounded values, so the
    /// displayed lines may differ from the displayed total by a cent.
    pub fn rounded(&self) -> Self {
        let round_line = |line: &LevyLine| LevyLine {
            name: line.name.clone(),
            rate: line.rate,
            amount: round_half_up(line.amount),
        };

        Self {
            gross_sales: round_half_up(self.gross_sales),
            levies_breakdown: self.levies_breakdown.iter().map(round_line).collect(),
            total_levies: round_half_up(self.total_levies),
            taxable_value: round_half_up(self.taxable_value),
            vat: round_line(&self.vat),
            total_payable: round_half_up(self.total_payable),
        }
    }
}

/// Checks that a gross sales figure can enter the cascade.
pub fn validate_gross_sales(gross_sales: Decimal) -> Result<Decimal, InvalidInputError> {
    if gross_sales.is_sign_negative() && !gross_sales.is_zero() {
        return Err(InvalidInputError::NegativeGrossSales(gross_sales));
    }
    Ok(gross_sales)
}

/// Parses user-entered gross sales.
///
/// Accepts thousands separators and an optional `GHS` / `GH₵` / `₵` prefix
/// (`"GHS 50,000.00"`). Empty or non-numeric input is an error, never zero.
pub fn parse_gross_sales(input: &str) -> Result<Decimal, InvalidInputError> {
    let trimmed = input.trim();
    let without_symbol = ["GHS", "ghs", "GH₵", "₵"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    let normalized = without_symbol.trim().replace(',', "");

    if normalized.is_empty() {
        return Err(InvalidInputError::EmptyGrossSales);
    }

    let value = Decimal::from_str(&normalized)
        .map_err(|_| InvalidInputError::NonNumericGrossSales(input.to_string()))?;

    validate_gross_sales(value)
}

/// Calculator for the levy cascade over a fixed set of levy definitions.
///
/// Only the active rate of each definition is used. A definition awaiting
/// checker approval contributes its current rate, never the proposed one.
#[derive(Debug, Clone)]
pub struct LevyCascadeCalculator<'a> {
    levies: &'a [LevyDefinition],
}

impl<'a> LevyCascadeCalculator<'a> {
    pub fn new(levies: &'a [LevyDefinition]) -> Self {
        Self { levies }
    }

    /// Computes the full cascade for `gross_sales`.
    ///
    /// # Errors
    ///
    /// Returns [`LevyCascadeError`] if:
    /// - `gross_sales` is negative
    /// - no levy definitions were supplied
    /// - there is not exactly one VAT-tagged levy
    /// - any levy carries a negative rate
    /// - an amount in the cascade does not fit in a [`Decimal`]
    pub fn calculate(
        &self,
        gross_sales: Decimal,
    ) -> Result<LevyCascadeResult, LevyCascadeError> {
        let gross_sales = validate_gross_sales(gross_sales)?;
        let (flat_levies, vat_levy) = self.partition()?;
        let too_large = || InvalidInputError::GrossSalesTooLarge(gross_sales);

        let levies_breakdown = self
            .flat_levy_lines(&flat_levies, gross_sales)
            .ok_or_else(too_large)?;
        let total_levies = self.total_levies(&levies_breakdown).ok_or_else(too_large)?;
        let taxable_value = self
            .taxable_value(gross_sales, total_levies)
            .ok_or_else(too_large)?;
        let vat = self.vat_line(vat_levy, taxable_value).ok_or_else(too_large)?;
        let total_payable = self
            .total_payable(total_levies, vat.amount)
            .ok_or_else(too_large)?;

        debug!(
            %gross_sales,
            %total_levies,
            %taxable_value,
            vat = %vat.amount,
            %total_payable,
            "computed levy cascade"
        );

        Ok(LevyCascadeResult {
            gross_sales,
            levies_breakdown,
            total_levies,
            taxable_value,
            vat,
            total_payable,
        })
    }

    /// Splits the levy set into flat levies (sorted by calculation order,
    /// stable on ties) and the single VAT levy.
    fn partition(&self) -> Result<(Vec<&'a LevyDefinition>, &'a LevyDefinition), ConfigurationError> {
        if self.levies.is_empty() {
            return Err(ConfigurationError::NoLevies);
        }

        if let Some(levy) = self
            .levies
            .iter()
            .find(|l| l.active_rate().is_sign_negative() && !l.active_rate().is_zero())
        {
            return Err(ConfigurationError::NegativeRate {
                name: levy.name.clone(),
                rate: levy.active_rate(),
            });
        }

        let (vat_levies, mut flat_levies): (Vec<&LevyDefinition>, Vec<&LevyDefinition>) =
            self.levies.iter().partition(|l| l.is_vat());

        let vat_levy = match vat_levies.as_slice() {
            [] => return Err(ConfigurationError::NoVatLevy),
            [single] => *single,
            many => {
                return Err(ConfigurationError::MultipleVatLevies { count: many.len() });
            }
        };

        flat_levies.sort_by_key(|l| l.calculation_order);

        Ok((flat_levies, vat_levy))
    }

    // Each step returns `None` on Decimal overflow.

    fn flat_levy_lines(
        &self,
        flat_levies: &[&LevyDefinition],
        gross_sales: Decimal,
    ) -> Option<Vec<LevyLine>> {
        flat_levies
            .iter()
            .map(|levy| {
                Some(LevyLine {
                    name: levy.name.clone(),
                    rate: levy.active_rate(),
                    amount: percent_of(gross_sales, levy.active_rate())?,
                })
            })
            .collect()
    }

    fn total_levies(
        &self,
        lines: &[LevyLine],
    ) -> Option<Decimal> {
        lines
            .iter()
            .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.amount))
    }

    fn taxable_value(
        &self,
        gross_sales: Decimal,
        total_levies: Decimal,
    ) -> Option<Decimal> {
        gross_sales.checked_add(total_levies)
    }

    fn vat_line(
        &self,
        vat_levy: &LevyDefinition,
        taxable_value: Decimal,
    ) -> Option<LevyLine> {
        Some(LevyLine {
            name: vat_levy.name.clone(),
            rate: vat_levy.active_rate(),
            amount: percent_of(taxable_value, vat_levy.active_rate())?,
        })
    }

    fn total_payable(
        &self,
        total_levies: Decimal,
        vat_amount: Decimal,
    ) -> Option<Decimal> {
        total_levies.checked_add(vat_amount)
    }
}

/// Computes the levy cascade for `gross_sales` under `levy_definitions`.
///
/// This is the single entry point every breakdown view goes through.
pub fn compute_levy_cascade(
    gross_sales: Decimal,
    levy_definitions: &[LevyDefinition],
) -> Result<LevyCascadeResult, LevyCascadeError> {
    LevyCascadeCalculator::new(levy_definitions).calculate(gross_sales)
}
