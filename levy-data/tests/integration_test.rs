//! Integration tests for rate loading and sales assessment against SQLite.

use levy_core::{
    ApprovalError, DecisionAction, LevyCategory, LevyRepository, RateChangeRequest, RateDecision,
    RateState, RateTableAction, RateTableOutcome, RepositoryError, compute_levy_cascade,
};
use levy_data::{LevyRateLoader, LevyRateLoaderError, SalesFeed, assess_liabilities};
use levy_db_sqlite::SqliteRepository;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use sqlx::sqlite::SqlitePoolOptions;

const RATES_2023: &str = include_str!("../test-data/levy_rates_2023.csv");
const RATES_REVISED: &str = include_str!("../test-data/levy_rates_revised.csv");
const SALES_2024_03: &str = include_str!("../test-data/psp_sales_2024_03.csv");

/// Migrated database with no levies, as after `--migrate` without `--seeds`.
async fn setup_test_db() -> SqliteRepository {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    let repo = SqliteRepository::new_with_pool(pool).await;
    repo.run_migrations()
        .await
        .expect("Failed to run migrations");

    repo
}

async fn load(
    repo: &SqliteRepository,
    csv: &str,
) -> Result<Vec<RateTableOutcome>, LevyRateLoaderError> {
    let records = LevyRateLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");
    LevyRateLoader::load(repo, &records, "ama").await
}

async fn find(
    repo: &SqliteRepository,
    name: &str,
) -> levy_core::LevyDefinition {
    repo.list_levies()
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.name == name)
        .unwrap_or_else(|| panic!("levy {name} not loaded"))
}

#[tokio::test]
async fn test_load_standard_rates() {
    let repo = setup_test_db().await;

    let loaded = load(&repo, RATES_2023).await.expect("Failed to load rates");

    assert!(loaded.iter().all(|o| o.action == RateTableAction::Created));
    let levies = repo.list_levies().await.unwrap();
    assert_eq!(levies.len(), 4);
    assert_eq!(
        levies.iter().filter(|l| l.category == LevyCategory::Vat).count(),
        1
    );
}

#[tokio::test]
async fn test_loaded_rates_reproduce_reference_total() {
    let repo = setup_test_db().await;
    load(&repo, RATES_2023).await.unwrap();

    let levies = repo.list_levies().await.unwrap();
    let result = compute_levy_cascade(dec!(50000), &levies).unwrap();

    assert_eq!(result.total_payable, dec!(10950));
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let repo = setup_test_db().await;
    load(&repo, RATES_2023).await.unwrap();
    let before = repo.list_levies().await.unwrap();

    let reloaded = load(&repo, RATES_2023).await.unwrap();

    assert!(reloaded.iter().all(|o| o.action == RateTableAction::Unchanged));
    assert_eq!(repo.list_levies().await.unwrap(), before);
}

#[tokio::test]
async fn test_revised_table_updates_and_adds() {
    let repo = setup_test_db().await;
    load(&repo, RATES_2023).await.unwrap();
    let vat_id = repo
        .list_levies()
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.is_vat())
        .unwrap()
        .id;

    let outcomes = load(&repo, RATES_REVISED).await.unwrap();

    assert_eq!(
        LevyRateLoader::summarize(&outcomes),
        vec![
            (RateTableAction::Created, 1),
            (RateTableAction::Reordered, 1),
            (RateTableAction::Unchanged, 3),
        ]
    );
    let levies = repo.list_levies().await.unwrap();
    assert_eq!(levies.len(), 5);
    let vat = levies.iter().find(|l| l.is_vat()).unwrap();
    assert_eq!(vat.id, vat_id);
    assert_eq!(vat.calculation_order, 3);

    let result = compute_levy_cascade(dec!(50000), &levies).unwrap();
    assert_eq!(result.total_levies, dec!(3500));
    assert_eq!(result.taxable_value, dec!(53500));
    assert_eq!(result.vat.amount, dec!(8025));
    assert_eq!(result.total_payable, dec!(11525));
}

#[tokio::test]
async fn test_invalid_table_writes_nothing() {
    let repo = setup_test_db().await;
    let csv = "name,category,rate,calculation_order,effective_date
NHIL,flat_levy,2.5,1,
GETFund Levy,flat_levy,2.5,1,
";

    let result = load(&repo, csv).await;

    assert!(matches!(result, Err(LevyRateLoaderError::VatCount(0))));
    assert!(repo.list_levies().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_changed_rate_waits_for_checker() {
    let repo = setup_test_db().await;
    load(&repo, RATES_2023).await.unwrap();
    let csv = RATES_2023.replace("NHIL,flat_levy,2.5", "NHIL,flat_levy,3");

    let outcomes = load(&repo, &csv).await.unwrap();

    assert_eq!(
        LevyRateLoader::summarize(&outcomes),
        vec![(RateTableAction::RateProposed, 1), (RateTableAction::Unchanged, 3)]
    );
    let nhil = find(&repo, "NHIL").await;
    assert_eq!(
        nhil.rate_state,
        RateState::PendingApproval {
            current_rate: dec!(2.5),
            proposed_rate: dec!(3),
            submitted_by: "ama".to_string(),
        }
    );
    let levies = repo.list_levies().await.unwrap();
    assert_eq!(compute_levy_cascade(dec!(50000), &levies).unwrap().total_payable, dec!(10950));

    // Reloading while the proposal is open changes nothing.
    let reloaded = load(&repo, &csv).await.unwrap();
    assert!(reloaded.iter().all(|o| o.action == RateTableAction::Unchanged));

    repo.decide_rate_change(&RateDecision {
        rate_id: nhil.id,
        action: DecisionAction::Approve,
        approved_by: "kofi".to_string(),
    })
    .await
    .unwrap();

    let levies = repo.list_levies().await.unwrap();
    assert_eq!(
        compute_levy_cascade(dec!(50000), &levies).unwrap().total_payable,
        dec!(11237.5)
    );
}

#[tokio::test]
async fn test_load_refuses_second_proposal_for_pending_levy() {
    let repo = setup_test_db().await;
    load(&repo, RATES_2023).await.unwrap();
    let nhil = find(&repo, "NHIL").await;
    repo.submit_rate_change(&RateChangeRequest {
        rate_id: nhil.id,
        new_rate: dec!(3),
        submitted_by: "maker".to_string(),
    })
    .await
    .unwrap();
    let csv = RATES_2023.replace("NHIL,flat_levy,2.5", "NHIL,flat_levy,3.5");

    let result = load(&repo, &csv).await;

    assert!(matches!(
        result,
        Err(LevyRateLoaderError::Repository(RepositoryError::Workflow(
            ApprovalError::AlreadyPending { .. }
        )))
    ));
    assert_eq!(find(&repo, "NHIL").await.pending_rate(), Some(dec!(3)));
}

#[tokio::test]
async fn test_failed_load_writes_nothing() {
    let repo = setup_test_db().await;
    let first = "name,category,rate,calculation_order,effective_date
NHIL,flat_levy,2.5,1,
Standard VAT,vat,15,2,
";
    let conflicting = "name,category,rate,calculation_order,effective_date
NHIL,flat_levy,9,1,
VAT,vat,12.5,2,
";
    load(&repo, first).await.unwrap();
    let before = repo.list_levies().await.unwrap();

    let result = load(&repo, conflicting).await;

    assert!(matches!(
        result,
        Err(LevyRateLoaderError::Repository(RepositoryError::Conflict(_)))
    ));
    assert_eq!(repo.list_levies().await.unwrap(), before);
    let nhil = find(&repo, "NHIL").await;
    assert!(repo.list_rate_changes(nhil.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_assess_psp_feed_against_loaded_rates() {
    let repo = setup_test_db().await;
    load(&repo, RATES_2023).await.unwrap();
    let levies = repo.list_levies().await.unwrap();

    let sales = SalesFeed::parse(SALES_2024_03.as_bytes()).expect("Failed to parse feed");
    let liabilities = assess_liabilities(&sales, &levies).expect("assessment should succeed");

    let summary: Vec<_> = liabilities
        .iter()
        .map(|l| {
            (
                l.merchant_tin.as_str(),
                l.period.as_str(),
                l.transactions,
                l.cascade.total_payable,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("C0001234567", "2024-03", 2, dec!(10950)),
            ("P0009876543", "2024-03", 2, dec!(273.8595)),
            ("C0001234567", "2024-04", 1, dec!(72.99927)),
        ]
    );
    assert_eq!(liabilities[2].cascade.rounded().total_payable, dec!(73.00));
}
