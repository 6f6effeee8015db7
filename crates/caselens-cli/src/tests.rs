//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::{Path, PathBuf};

use caselens_core::config::{CloudConfig, LocalConfig};
use caselens_core::insight::MockBackend;
use caselens_core::test_utils::fixtures::{account, closed_case, open_case};
use caselens_core::{
    Backend, BackendKind, Config, GenerationParams, InsightConfig, InsightEngine, RecordStore,
    ReportCatalog,
};

use crate::commands::{self, truncate, Sources};

fn setup_store() -> RecordStore {
    let cases = vec![
        closed_case("C1", "Verify", "A1", "2024-01-01", "2024-01-05"),
        open_case("C2", "Verify", "A1", "2024-01-03"),
        open_case("C3", "Inspect", "A2", "2024-01-09"),
        open_case("C4", "Inspect", "A9", "2024-01-10"),
    ];
    let accounts = vec![account("A1", "Canada", "Pharma"), account("A2", "Spain", "Retail")];
    RecordStore::from_records(&cases, &accounts).unwrap()
}

fn setup_catalog() -> ReportCatalog {
    ReportCatalog::new(setup_store(), Config::default().reports)
}

fn mock_engine() -> InsightEngine {
    InsightEngine::with_backend(Backend::Mock(MockBackend::new()), GenerationParams::default())
        .unwrap()
}

fn unavailable_engine() -> InsightEngine {
    InsightEngine::with_backend(
        Backend::Unavailable(vec!["cloud: no key".to_string()]),
        GenerationParams::default(),
    )
    .unwrap()
}

// ========== Helpers ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a much longer label", 10), "a much ...");
    assert_eq!(truncate("Québec-Montréal", 8), "Québe...");
}

// ========== Setup Tests ==========

#[test]
fn test_sources_prefer_command_line_paths() {
    let config = Config::default();
    let sources = Sources::new(&config, Some(Path::new("/tmp/cases.csv")), None);
    assert_eq!(sources.cases, PathBuf::from("/tmp/cases.csv"));
    assert_eq!(sources.accounts, config.data.accounts_file);
}

#[test]
fn test_sources_search_configured_dirs_first() {
    let mut config = Config::default();
    config.data.search_dirs = vec![PathBuf::from("/srv/support-data")];
    let sources = Sources::new(&config, None, None);
    assert_eq!(sources.locator.dirs()[0], PathBuf::from("/srv/support-data"));
}

#[test]
fn test_open_store_from_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cases.csv"),
        "case_sfid,case_product,case_type,case_severity,case_status,case_created_date,case_closed_date,account_sfid\n\
         C1,Verify,Bug,High,Closed,2024-01-01,2024-01-03,A1\n\
         C2,Verify,Question,Low,Open,2024-01-02,,A1\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("accounts.json"),
        r#"[{"account_sfid": "A1", "account_country": "Canada", "account_industry": "Pharma", "account_created_date": "2020-01-01"}]"#,
    )
    .unwrap();

    let mut config = Config::default();
    config.data.search_dirs = vec![dir.path().to_path_buf()];
    let sources = Sources::new(
        &config,
        Some(Path::new("cases.csv")),
        Some(Path::new("accounts.json")),
    );

    let store = commands::open_store(&sources).unwrap();
    assert_eq!(store.summary().unwrap().cases, 2);
    assert!(commands::cmd_load(&store).is_ok());
}

#[test]
fn test_open_store_skips_inconsistent_cases() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cases.csv"),
        "case_sfid,case_product,case_type,case_severity,case_status,case_created_date,case_closed_date,account_sfid\n\
         C1,Verify,Bug,High,Closed,2024-01-05,2024-01-01,A1\n\
         C2,Verify,Question,Low,Open,2024-01-02,,A1\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("accounts.json"),
        r#"[{"account_sfid": "A1", "account_country": "Canada", "account_industry": "Pharma", "account_created_date": "2020-01-01"}]"#,
    )
    .unwrap();

    let config = Config::default();
    let sources = Sources::new(
        &config,
        Some(&dir.path().join("cases.csv")),
        Some(&dir.path().join("accounts.json")),
    );
    let store = commands::open_store(&sources).unwrap();
    let summary = store.summary().unwrap();
    assert_eq!(summary.cases, 1);
    assert_eq!(summary.skipped_cases, 1);
    assert!(commands::cmd_load(&store).is_ok());
}

#[test]
fn test_open_store_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default();
    let sources = Sources::new(
        &config,
        Some(&dir.path().join("absent.json")),
        Some(&dir.path().join("absent-accounts.json")),
    );
    let err = commands::open_store(&sources).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.json"));
}

#[test]
fn test_load_config_explicit_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    assert!(commands::load_config(Some(&dir.path().join("missing.toml"))).is_err());

    let path = dir.path().join("caselens.toml");
    std::fs::write(&path, "[reports]\nhome_market = \"Spain\"\n").unwrap();
    let config = commands::load_config(Some(&path)).unwrap();
    assert_eq!(config.reports.home_market, "Spain");
}

#[test]
fn test_cmd_load_requires_loaded_store() {
    assert!(commands::cmd_load(&RecordStore::new()).is_err());
}

// ========== Report Command Tests ==========

#[test]
fn test_cmd_reports() {
    assert!(commands::cmd_reports().is_ok());
}

#[tokio::test]
async fn test_cmd_report_by_slug_and_number() {
    let catalog = setup_catalog();
    assert!(commands::cmd_report(&catalog, "top-products", false, None)
        .await
        .is_ok());
    assert!(commands::cmd_report(&catalog, "9", false, None).await.is_ok());
    assert!(commands::cmd_report(&catalog, "Resolution Time", true, None)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_cmd_report_unknown_name() {
    let catalog = setup_catalog();
    let err = commands::cmd_report(&catalog, "churn", false, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Unknown report 'churn'"));
}

#[tokio::test]
async fn test_cmd_report_with_insight() {
    let catalog = setup_catalog();
    let engine = mock_engine();
    assert!(
        commands::cmd_report(&catalog, "global-hotspots", false, Some(&engine))
            .await
            .is_ok()
    );
    assert!(
        commands::cmd_report(&catalog, "ticket-density", true, Some(&engine))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_cmd_report_insight_failure_is_not_fatal() {
    let catalog = setup_catalog();
    let engine = unavailable_engine();
    assert!(
        commands::cmd_report(&catalog, "volume-trend", false, Some(&engine))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_cmd_all() {
    let catalog = setup_catalog();
    assert!(commands::cmd_all(&catalog, None).await.is_ok());
    assert!(commands::cmd_all(&catalog, Some(&mock_engine())).await.is_ok());
}

#[tokio::test]
async fn test_cmd_all_on_unloaded_store_reports_failures() {
    let catalog = ReportCatalog::new(RecordStore::new(), Config::default().reports);
    assert!(commands::cmd_all(&catalog, None).await.is_ok());
}

// ========== Query Command Tests ==========

#[test]
fn test_cmd_query() {
    let store = setup_store();
    assert!(commands::cmd_query(
        &store,
        "SELECT case_product, COUNT(*) AS n FROM cases GROUP BY case_product",
        false
    )
    .is_ok());
    assert!(commands::cmd_query(&store, "SELECT * FROM accounts", true).is_ok());
}

#[test]
fn test_cmd_query_rejects_writes_and_bad_sql() {
    let store = setup_store();
    assert!(commands::cmd_query(&store, "DELETE FROM cases", false).is_err());
    assert!(commands::cmd_query(&store, "SELEC nonsense", false).is_err());
    assert!(commands::cmd_query(&RecordStore::new(), "SELECT 1", false).is_err());
}

// ========== Insight Command Tests ==========

#[tokio::test]
async fn test_cmd_insight() {
    let engine = mock_engine();
    assert!(
        commands::cmd_insight(&engine, "You are a Planner.", "Backlog grew by 4.")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_cmd_insight_unavailable_fails() {
    let engine = unavailable_engine();
    let err = commands::cmd_insight(&engine, "objective", "facts")
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("no key"));
}

#[tokio::test]
async fn test_cmd_backends() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.insight = InsightConfig {
        backends: vec![BackendKind::Cloud, BackendKind::Local, BackendKind::Mock],
        cloud: CloudConfig {
            api_key_env: "CASELENS_CLI_TEST_KEY_NEVER_SET".to_string(),
            ..CloudConfig::default()
        },
        local: LocalConfig {
            weights_file: PathBuf::from("absent.gguf"),
            model_dirs: vec![dir.path().to_path_buf()],
            ..LocalConfig::default()
        },
        ..InsightConfig::default()
    };

    let engine = commands::start_engine(&config).await.unwrap();
    assert!(engine.is_available());
    assert_eq!(engine.attempts().len(), 3);
    assert!(commands::cmd_backends(&config, &engine).is_ok());

    assert!(commands::cmd_backends(&config, &unavailable_engine()).is_ok());
}
