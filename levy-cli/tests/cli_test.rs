//! End-to-end command handlers against an in-memory SQLite store.

use std::path::PathBuf;

use levy_cli::app;
use levy_cli::config::{AppConfig, CliOverrides};
use levy_core::{DecisionAction, LevyRepository};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn in_memory_config() -> AppConfig {
    AppConfig::default().apply(CliOverrides {
        db: Some(":memory:".to_string()),
        ..CliOverrides::default()
    })
}

async fn nhil_id(repo: &dyn LevyRepository) -> i64 {
    repo.list_levies()
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.name == "NHIL")
        .unwrap()
        .id
}

#[test]
fn fixture_config_loads() {
    let config = AppConfig::load(Some(fixture("gra-levy.toml").as_path())).unwrap();

    assert_eq!(config.database.connection_string, ":memory:");
    assert_eq!(config.display.currency, "GH₵");
    assert_eq!(config.logging.level, "debug");
    assert!(!config.rates.allow_fallback);
}

#[tokio::test]
async fn compute_reference_scenario() {
    let registry = app::build_registry();

    let output = app::run_compute(&registry, &in_memory_config(), "50000", false)
        .await
        .unwrap();

    assert!(!output.contains("WARNING"));
    assert!(output.lines().last().unwrap().ends_with("GHS 10,950.00"));
}

#[tokio::test]
async fn compute_uses_configured_currency() {
    let registry = app::build_registry();
    let config = AppConfig::load(Some(fixture("gra-levy.toml").as_path())).unwrap();

    let output = app::run_compute(&registry, &config, "GHS 50,000", false)
        .await
        .unwrap();

    assert!(output.contains("GH₵ 10,950.00"));
}

#[tokio::test]
async fn compute_json_carries_exact_and_rounded_values() {
    let registry = app::build_registry();

    let output = app::run_compute(&registry, &in_memory_config(), "333.33", true)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();

    let exact: Decimal = value["result"]["total_payable"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(exact, dec!(72.99927));
    assert_eq!(value["rounded"]["total_payable"], "73.00");
    assert_eq!(value["rate_source"]["source"], "configured");
}

#[tokio::test]
async fn compute_rejects_bad_input() {
    let registry = app::build_registry();

    for input in ["", "abc", "-100"] {
        let result = app::run_compute(&registry, &in_memory_config(), input, false).await;
        assert!(result.is_err(), "input {input:?} should fail");
    }
}

#[tokio::test]
async fn compute_falls_back_for_unknown_backend() {
    let registry = app::build_registry();
    let config = in_memory_config().apply(CliOverrides {
        backend: Some("postgres".to_string()),
        ..CliOverrides::default()
    });

    let output = app::run_compute(&registry, &config, "50000", false)
        .await
        .unwrap();

    assert!(output.starts_with("WARNING: using default rate table GRA-VAT-2023"));
    assert!(output.contains("GHS 10,950.00"));
}

#[tokio::test]
async fn compute_without_fallback_fails_for_unknown_backend() {
    let registry = app::build_registry();
    let config = in_memory_config().apply(CliOverrides {
        backend: Some("postgres".to_string()),
        no_fallback: true,
        ..CliOverrides::default()
    });

    let result = app::run_compute(&registry, &config, "50000", false).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn maker_checker_round_trip() {
    let registry = app::build_registry();
    let repo = app::open_repository(&registry, &in_memory_config().db_config())
        .await
        .unwrap();
    let nhil = nhil_id(&*repo).await;

    let proposed = app::rates_propose(&*repo, nhil, dec!(3), "ama").await.unwrap();
    assert_eq!(
        proposed,
        "NHIL: 3% proposed by ama, awaiting approval (2.5% remains in force)\n"
    );

    let listing = app::rates_list(&*repo).await.unwrap();
    assert!(listing.contains("pending"));

    assert!(
        app::rates_decide(&*repo, nhil, DecisionAction::Approve, "AMA")
            .await
            .is_err(),
        "maker must not approve own change"
    );

    let approved = app::rates_decide(&*repo, nhil, DecisionAction::Approve, "kofi")
        .await
        .unwrap();
    assert_eq!(approved, "NHIL: change approved by kofi; active rate 3%\n");

    let history = app::rates_history(&*repo, nhil).await.unwrap();
    assert!(history.contains("approved 2.5% -> 3% by ama"));
    assert!(history.contains("decided by kofi"));
}

#[tokio::test]
async fn reject_keeps_current_rate() {
    let registry = app::build_registry();
    let repo = app::open_repository(&registry, &in_memory_config().db_config())
        .await
        .unwrap();
    let nhil = nhil_id(&*repo).await;
    app::rates_propose(&*repo, nhil, dec!(10), "ama").await.unwrap();

    let rejected = app::rates_decide(&*repo, nhil, DecisionAction::Reject, "kofi")
        .await
        .unwrap();

    assert_eq!(rejected, "NHIL: change rejected by kofi; active rate 2.5%\n");
}

#[tokio::test]
async fn assess_fixture_feed() {
    let registry = app::build_registry();

    let output = app::run_assess(
        &registry,
        &in_memory_config(),
        &fixture("sales_feed.csv"),
        false,
    )
    .await
    .unwrap();

    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("C0001234567"));
    assert!(lines[1].ends_with("GHS 10,950.00"));
    assert!(lines[2].starts_with("P0009876543"));
    assert!(lines[2].ends_with("GHS 2,190.00"));
    assert_eq!(lines[3], "Total payable across all merchants: GHS 13,140.00");
}

#[tokio::test]
async fn assess_missing_file_fails() {
    let registry = app::build_registry();

    let result = app::run_assess(
        &registry,
        &in_memory_config(),
        &fixture("does_not_exist.csv"),
        false,
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn store_without_vat_levy_falls_back_for_compute_and_assess() {
    let dir = tempfile::tempdir().unwrap();
    let registry = app::build_registry();
    let config = AppConfig::default().apply(CliOverrides {
        db: Some(dir.path().join("levies.db").display().to_string()),
        ..CliOverrides::default()
    });
    let repo = app::open_repository(&registry, &config.db_config())
        .await
        .unwrap();
    let vat = repo
        .list_levies()
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.is_vat())
        .unwrap();
    repo.delete_levy(vat.id).await.unwrap();
    drop(repo);

    let computed = app::run_compute(&registry, &config, "50000", false)
        .await
        .unwrap();
    let assessed = app::run_assess(&registry, &config, &fixture("sales_feed.csv"), false)
        .await
        .unwrap();

    for output in [&computed, &assessed] {
        assert!(
            output.starts_with("WARNING: using default rate table GRA-VAT-2023"),
            "{output}"
        );
        assert!(output.contains("no levy is tagged as VAT"), "{output}");
    }
    assert!(assessed.ends_with("Total payable across all merchants: GHS 13,140.00\n"));
}

#[tokio::test]
async fn store_without_vat_levy_fails_assess_when_fallback_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let registry = app::build_registry();
    let config = AppConfig::default().apply(CliOverrides {
        db: Some(dir.path().join("levies.db").display().to_string()),
        no_fallback: true,
        ..CliOverrides::default()
    });
    let repo = app::open_repository(&registry, &config.db_config())
        .await
        .unwrap();
    let vat = repo
        .list_levies()
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.is_vat())
        .unwrap();
    repo.delete_levy(vat.id).await.unwrap();
    drop(repo);

    let err = app::run_assess(&registry, &config, &fixture("sales_feed.csv"), false)
        .await
        .unwrap_err();

    assert_eq!(
        format!("{err:#}"),
        "cannot assess sales feed: no levy is tagged as VAT"
    );
}
