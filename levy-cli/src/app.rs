use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use levy_core::calculations::{
    FallbackRateTable, RateSource, compute_with_fallback, parse_gross_sales, resolve_rates,
    run_with_fallback,
};
use levy_core::currency::format_rate;
use levy_core::db::{DbConfig, RepositoryRegistry};
use levy_core::{
    DecisionAction, LevyCascadeResult, LevyDefinition, LevyRepository, RateChangeRequest,
    RateDecision, RepositoryError, compute_levy_cascade,
};
use levy_data::{MerchantLiability, SalesFeed, SalesRecord, assess_liabilities};
use levy_db_sqlite::SqliteRepositoryFactory;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::report;

/// Registry with every backend this binary links.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

pub async fn open_repository(
    registry: &RepositoryRegistry,
    db: &DbConfig,
) -> Result<Box<dyn LevyRepository>> {
    debug!(backend = %db.backend, "opening rate store");
    registry
        .create(db)
        .await
        .with_context(|| format!("cannot open {} store '{}'", db.backend, db.connection_string))
}

/// Current levies, with an unreachable store reported the same way as a
/// failed query.
pub async fn fetch_levies(
    registry: &RepositoryRegistry,
    db: &DbConfig,
) -> Result<Vec<LevyDefinition>, RepositoryError> {
    let repo = registry.create(db).await?;
    repo.list_levies().await
}

/// Runs the cascade against `fetched`. With `allow_fallback` an unusable
/// store or rate set is replaced by the built-in table and reported through
/// the returned [`RateSource`].
pub fn compute_with_rates(
    gross_sales: Decimal,
    fetched: Result<Vec<LevyDefinition>, RepositoryError>,
    allow_fallback: bool,
) -> Result<(LevyCascadeResult, RateSource)> {
    if !allow_fallback {
        let levies = fetched.context("rate store unavailable and fallback is disabled")?;
        let result = compute_levy_cascade(gross_sales, &levies)?;
        return Ok((result, RateSource::Configured));
    }

    let fallback = FallbackRateTable::ghana_standard();
    let resolved = resolve_rates(fetched, &fallback);
    Ok(compute_with_fallback(gross_sales, &resolved, &fallback)?)
}

/// [`compute_with_rates`] for a whole sales feed. A rate set the calculator
/// rejects falls back for every merchant at once, never for some of them.
pub fn assess_with_rates(
    sales: &[SalesRecord],
    fetched: Result<Vec<LevyDefinition>, RepositoryError>,
    allow_fallback: bool,
) -> Result<(Vec<MerchantLiability>, RateSource)> {
    if !allow_fallback {
        let levies = fetched.context("rate store unavailable and fallback is disabled")?;
        let liabilities = assess_liabilities(sales, &levies)?;
        return Ok((liabilities, RateSource::Configured));
    }

    let fallback = FallbackRateTable::ghana_standard();
    let resolved = resolve_rates(fetched, &fallback);
    Ok(run_with_fallback(&resolved, &fallback, |levies| {
        assess_liabilities(sales, levies)
    })?)
}

/// `compute <gross>`: the breakdown table, or JSON with `json`.
pub async fn run_compute(
    registry: &RepositoryRegistry,
    config: &AppConfig,
    gross_input: &str,
    json: bool,
) -> Result<String> {
    // Bad input never reaches the store.
    let gross_sales = parse_gross_sales(gross_input)
        .with_context(|| format!("invalid gross sales '{gross_input}'"))?;

    let fetched = fetch_levies(registry, &config.db_config()).await;
    let (result, source) = compute_with_rates(gross_sales, fetched, config.rates.allow_fallback)?;

    info!(
        %gross_sales,
        total_payable = %result.total_payable,
        fallback = source.is_fallback(),
        "levy cascade computed"
    );

    if json {
        let body = json!({
            "result": result,
            "rounded": result.rounded(),
            "rate_source": source,
        });
        return Ok(serde_json::to_string_pretty(&body)? + "\n");
    }
    Ok(report::render_breakdown(&result, &source, &config.display.currency))
}

pub async fn rates_list(repo: &dyn LevyRepository) -> Result<String> {
    let levies = repo.list_levies().await.context("cannot list levies")?;
    Ok(report::render_levies(&levies))
}

pub async fn rates_history(
    repo: &dyn LevyRepository,
    levy_id: i64,
) -> Result<String> {
    let records = repo
        .list_rate_changes(levy_id)
        .await
        .with_context(|| format!("cannot read rate history for levy {levy_id}"))?;
    Ok(report::render_history(&records))
}

pub async fn rates_propose(
    repo: &dyn LevyRepository,
    levy_id: i64,
    new_rate: Decimal,
    submitted_by: &str,
) -> Result<String> {
    let request = RateChangeRequest {
        rate_id: levy_id,
        new_rate,
        submitted_by: submitted_by.to_string(),
    };
    let levy = repo
        .submit_rate_change(&request)
        .await
        .with_context(|| format!("cannot propose a new rate for levy {levy_id}"))?;

    Ok(format!(
        "{}: {} proposed by {}, awaiting approval ({} remains in force)\n",
        levy.name,
        format_rate(new_rate),
        submitted_by.trim(),
        format_rate(levy.active_rate())
    ))
}

pub async fn rates_decide(
    repo: &dyn LevyRepository,
    levy_id: i64,
    action: DecisionAction,
    decided_by: &str,
) -> Result<String> {
    let decision = RateDecision {
        rate_id: levy_id,
        action,
        approved_by: decided_by.to_string(),
    };
    let levy = repo
        .decide_rate_change(&decision)
        .await
        .with_context(|| format!("cannot decide the rate change for levy {levy_id}"))?;

    let verb = match action {
        DecisionAction::Approve => "approved",
        DecisionAction::Reject => "rejected",
    };
    Ok(format!(
        "{}: change {} by {}; active rate {}\n",
        levy.name,
        verb,
        decided_by.trim(),
        format_rate(levy.active_rate())
    ))
}

/// `assess <sales.csv>`: liabilities per merchant and period.
pub async fn run_assess(
    registry: &RepositoryRegistry,
    config: &AppConfig,
    sales_file: &Path,
    json: bool,
) -> Result<String> {
    let file = File::open(sales_file)
        .with_context(|| format!("Failed to open: {}", sales_file.display()))?;
    let sales = SalesFeed::parse(file)
        .with_context(|| format!("Failed to parse sales feed: {}", sales_file.display()))?;
    debug!(records = sales.len(), "sales feed parsed");

    let fetched = fetch_levies(registry, &config.db_config()).await;
    let (liabilities, source) = assess_with_rates(&sales, fetched, config.rates.allow_fallback)
        .context("cannot assess sales feed")?;
    info!(
        merchants = liabilities.len(),
        fallback = source.is_fallback(),
        "sales feed assessed"
    );

    if json {
        let body = json!({
            "liabilities": liabilities,
            "rate_source": source,
        });
        return Ok(serde_json::to_string_pretty(&body)? + "\n");
    }
    Ok(report::render_liabilities(
        &liabilities,
        &source,
        &config.display.currency,
    ))
}
