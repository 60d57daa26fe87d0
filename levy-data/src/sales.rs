use std::collections::HashMap;
use std::io::Read;

use levy_core::calculations::{LevyCascadeCalculator, parse_gross_sales};
use levy_core::{InvalidInputError, LevyCascadeError, LevyCascadeResult, LevyDefinition};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading a PSP sales feed.
#[derive(Debug, Error)]
pub enum SalesFeedError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Row {row}: merchant TIN is empty")]
    MissingMerchant { row: usize },

    #[error("Row {row}: period is empty")]
    MissingPeriod { row: usize },

    #[error("Row {row}: invalid gross sales")]
    InvalidGrossSales {
        row: usize,
        #[source]
        source: InvalidInputError,
    },
}

impl From<csv::Error> for SalesFeedError {
    fn from(err: csv::Error) -> Self {
        SalesFeedError::CsvParse(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RawSalesRow {
    merchant_tin: String,
    period: String,
    gross_sales: String,
}

/// One settled transaction (or daily total) reported by a payment service
/// provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesRecord {
    pub merchant_tin: String,
    /// Filing period as reported, e.g. `2024-03`.
    pub period: String,
    pub gross_sales: Decimal,
}

/// Reader for PSP sales feeds: CSV with `merchant_tin,period,gross_sales`.
///
/// `gross_sales` accepts the same forms as interactive input, so
/// `"GHS 1,250.00"` and `1250` are both valid.
pub struct SalesFeed;

impl SalesFeed {
    pub fn parse<R: Read>(reader: R) -> Result<Vec<SalesRecord>, SalesFeedError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for (index, result) in csv_reader.deserialize().enumerate() {
            let raw: RawSalesRow = result?;
            let row = index + 1;

            if raw.merchant_tin.is_empty() {
                return Err(SalesFeedError::MissingMerchant { row });
            }
            if raw.period.is_empty() {
                return Err(SalesFeedError::MissingPeriod { row });
            }
            let gross_sales = parse_gross_sales(&raw.gross_sales)
                .map_err(|source| SalesFeedError::InvalidGrossSales { row, source })?;

            records.push(SalesRecord {
                merchant_tin: raw.merchant_tin,
                period: raw.period,
                gross_sales,
            });
        }

        Ok(records)
    }
}

/// Levy liability of one merchant for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MerchantLiability {
    pub merchant_tin: String,
    pub period: String,
    pub transactions: usize,
    pub cascade: LevyCascadeResult,
}

/// Sums gross sales per (merchant, period) and runs the cascade on each
/// total. Groups come back in the order they first appear in `records`.
///
/// The cascade is linear in gross sales, so taxing the summed total equals
/// summing per-transaction liabilities before rounding. A group total too
/// large for a [`Decimal`] is [`InvalidInputError::GrossSalesTooLarge`].
pub fn assess_liabilities(
    records: &[SalesRecord],
    levies: &[LevyDefinition],
) -> Result<Vec<MerchantLiability>, LevyCascadeError> {
    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut totals: HashMap<(&str, &str), (Decimal, usize)> = HashMap::new();

    for record in records {
        let key = (record.merchant_tin.as_str(), record.period.as_str());
        let entry = totals.entry(key).or_insert_with(|| {
            order.push(key);
            (Decimal::ZERO, 0)
        });
        entry.0 = entry
            .0
            .checked_add(record.gross_sales)
            .ok_or(InvalidInputError::GrossSalesTooLarge(record.gross_sales))?;
        entry.1 += 1;
    }

    let calculator = LevyCascadeCalculator::new(levies);
    let mut liabilities = Vec::with_capacity(order.len());

    for key in order {
        let (gross_sales, transactions) = totals[&key];
        let cascade = calculator.calculate(gross_sales)?;
        debug!(
            merchant_tin = key.0,
            period = key.1,
            transactions,
            total_payable = %cascade.total_payable,
            "assessed merchant liability"
        );
        liabilities.push(MerchantLiability {
            merchant_tin: key.0.to_string(),
            period: key.1.to_string(),
            transactions,
            cascade,
        });
    }

    Ok(liabilities)
}
