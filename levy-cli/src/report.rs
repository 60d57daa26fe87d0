//! Plain-text rendering for terminal output.
//!
//! All amounts pass through [`format_currency`], so rounding happens here
//! and nowhere earlier.

use std::fmt::Write;

use levy_core::calculations::RateSource;
use levy_core::currency::{format_amount, format_currency, format_rate};
use levy_core::{LevyCascadeResult, LevyDefinition, RateChangeRecord, RateState};
use levy_data::MerchantLiability;
use rust_decimal::Decimal;

const LABEL_WIDTH: usize = 32;
const RATE_WIDTH: usize = 8;
const AMOUNT_WIDTH: usize = 20;

fn row(
    out: &mut String,
    label: &str,
    rate: &str,
    amount: &str,
) {
    let _ = writeln!(
        out,
        "{label:<LABEL_WIDTH$}{rate:>RATE_WIDTH$}{amount:>AMOUNT_WIDTH$}"
    );
}

fn rule(out: &mut String) {
    let _ = writeln!(out, "{}", "-".repeat(LABEL_WIDTH + RATE_WIDTH + AMOUNT_WIDTH));
}

/// One line telling the user the built-in table was used, or `None`.
pub fn fallback_notice(source: &RateSource) -> Option<String> {
    match source {
        RateSource::Configured => None,
        RateSource::Fallback { version, reason } => Some(format!(
            "WARNING: using default rate table {version} ({reason})"
        )),
    }
}

/// The levy breakdown table.
///
/// ```text
/// Gross sales                                        GHS 50,000.00
/// ------------------------------------------------------------
/// NHIL                                2.5%            GHS 1,250.00
/// ...
/// Total payable                                      GHS 10,950.00
/// ```
pub fn render_breakdown(
    result: &LevyCascadeResult,
    source: &RateSource,
    currency: &str,
) -> String {
    let mut out = String::new();
    if let Some(notice) = fallback_notice(source) {
        let _ = writeln!(out, "{notice}");
    }

    let money = |amount| format_currency(amount, currency);

    row(&mut out, "Gross sales", "", &money(result.gross_sales));
    rule(&mut out);
    for line in &result.levies_breakdown {
        row(&mut out, &line.name, &format_rate(line.rate), &money(line.amount));
    }
    row(&mut out, "Total levies", "", &money(result.total_levies));
    row(&mut out, "Taxable value", "", &money(result.taxable_value));
    row(
        &mut out,
        &result.vat.name,
        &format_rate(result.vat.rate),
        &money(result.vat.amount),
    );
    rule(&mut out);
    row(&mut out, "Total payable", "", &money(result.total_payable));

    out
}

/// Configured levies with any rate awaiting approval.
pub fn render_levies(levies: &[LevyDefinition]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4}  {:<32}{:<10}{:>6}{:>8}  {:<10}{:>9}  {}",
        "ID", "Name", "Category", "Order", "Rate", "Status", "Proposed", "Submitted by"
    );
    for levy in levies {
        let (proposed, submitted_by) = match &levy.rate_state {
            RateState::Active { .. } => (String::new(), ""),
            RateState::PendingApproval {
                proposed_rate,
                submitted_by,
                ..
            } => (format_rate(*proposed_rate), submitted_by.as_str()),
        };
        let _ = writeln!(
            out,
            "{:>4}  {:<32}{:<10}{:>6}{:>8}  {:<10}{:>9}  {}",
            levy.id,
            levy.name,
            levy.category.as_str(),
            levy.calculation_order,
            format_rate(levy.active_rate()),
            levy.status().as_str(),
            proposed,
            submitted_by
        );
    }
    out
}

pub fn render_history(records: &[RateChangeRecord]) -> String {
    if records.is_empty() {
        return "No rate changes recorded.\n".to_string();
    }

    let mut out = String::new();
    for record in records {
        let _ = write!(
            out,
            "#{} {} {} -> {} by {} at {}",
            record.id,
            record.outcome.as_str(),
            format_rate(record.previous_rate),
            format_rate(record.proposed_rate),
            record.submitted_by,
            record.submitted_at.format("%Y-%m-%d %H:%M")
        );
        if let (Some(by), Some(at)) = (&record.decided_by, record.decided_at) {
            let _ = write!(out, "; decided by {} at {}", by, at.format("%Y-%m-%d %H:%M"));
        }
        out.push('\n');
    }
    out
}

/// One line per merchant and period, then the grand total.
pub fn render_liabilities(
    liabilities: &[MerchantLiability],
    source: &RateSource,
    currency: &str,
) -> String {
    let mut out = String::new();
    if let Some(notice) = fallback_notice(source) {
        let _ = writeln!(out, "{notice}");
    }

    let _ = writeln!(
        out,
        "{:<16}{:<10}{:>6}{:>22}{:>20}{:>22}",
        "Merchant TIN", "Period", "Txns", "Gross sales", "Levies + VAT", "Total payable"
    );
    for liability in liabilities {
        let cascade = &liability.cascade;
        let _ = writeln!(
            out,
            "{:<16}{:<10}{:>6}{:>22}{:>20}{:>22}",
            liability.merchant_tin,
            liability.period,
            liability.transactions,
            format_currency(cascade.gross_sales, currency),
            format!(
                "{} + {}",
                format_amount(cascade.total_levies),
                format_amount(cascade.vat.amount)
            ),
            format_currency(cascade.total_payable, currency)
        );
    }

    let total = liabilities
        .iter()
        .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.cascade.total_payable));
    match total {
        Some(total) => {
            let _ = writeln!(
                out,
                "Total payable across all merchants: {}",
                format_currency(total, currency)
            );
        }
        None => {
            let _ = writeln!(out, "Total payable across all merchants: too large to total");
        }
    }
    out
}
