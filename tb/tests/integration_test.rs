//! Integration tests for TrustBridge
//!
//! These drive whole conversations through the SQLite-backed state actor
//! and exercise the `tb` binary end to end.

use std::path::Path;
use std::sync::Arc;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use trustbridge::config::{ConversationConfig, DispatcherConfig};
use trustbridge::dispatcher::Dispatcher;
use trustbridge::domain::{ConversationState, ReportData, ReportStatus, Session};
use trustbridge::engine::ConversationEngine;
use trustbridge::evidence;
use trustbridge::llm::Generator;
use trustbridge::prompts::PromptLoader;
use trustbridge::state::{ReportGateway, SessionGateway, StateManager};

const PHONE: &str = "254700000001";

fn engine_over(manager: &StateManager) -> ConversationEngine {
    let generator = Generator::new(
        None,
        Dispatcher::spawn(DispatcherConfig::default()),
        Arc::new(PromptLoader::embedded_only()),
    );
    ConversationEngine::new(
        Arc::new(manager.clone()),
        Arc::new(manager.clone()),
        generator,
        ConversationConfig::default(),
    )
}

async fn state_of(engine: &ConversationEngine, phone: &str) -> ConversationState {
    engine.session(phone).await.expect("session should load").state
}

// =============================================================================
// Conversation Tests
// =============================================================================

#[tokio::test]
async fn test_full_report_persists_in_sqlite() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = StateManager::spawn(temp_dir.path().join("tb.db")).expect("Failed to open store");
    let engine = engine_over(&manager);

    engine.handle(PHONE, "1").await;
    engine.handle(PHONE, "Infrastructure").await;
    engine.handle(PHONE, "roads").await;
    engine.handle(PHONE, "There is a large pothole on Main Street").await;
    engine.handle(PHONE, "Nairobi CBD").await;
    let summary = engine.handle(PHONE, "no").await;
    assert!(summary.contains("*Category:* Infrastructure"));
    assert_eq!(state_of(&engine, PHONE).await, ConversationState::Confirm);

    let reply = engine.handle(PHONE, "yes").await;
    assert!(reply.contains("Report submitted! ID: INF-"), "unexpected reply: {}", reply);

    let reports = manager.find_by_owner(PHONE).await.expect("reports should load");
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.category, "Infrastructure");
    assert_eq!(report.subcategory.as_deref(), Some("Roads"));
    assert_eq!(report.description, "There is a large pothole on Main Street");
    assert_eq!(report.location, "Nairobi CBD");
    assert_eq!(report.status, ReportStatus::Pending);

    // Session is gone once the report is filed
    assert!(manager.get(PHONE).await.expect("get should succeed").is_none());
}

#[tokio::test]
async fn test_conversation_survives_restart() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("tb.db");

    {
        let manager = StateManager::spawn(&db_path).expect("Failed to open store");
        let engine = engine_over(&manager);
        engine.handle(PHONE, "1").await;
        engine.handle(PHONE, "4").await;
        assert_eq!(state_of(&engine, PHONE).await, ConversationState::Subcategory);
        manager.shutdown().await.expect("shutdown should succeed");
    }

    let manager = StateManager::spawn(&db_path).expect("Failed to reopen store");
    let engine = engine_over(&manager);
    let session = engine.session(PHONE).await.expect("session should load");
    assert_eq!(session.state, ConversationState::Subcategory);
    assert_eq!(session.report_data.category.as_deref(), Some("Security"));

    engine.handle(PHONE, "police").await;
    assert_eq!(state_of(&engine, PHONE).await, ConversationState::Description);
}

#[tokio::test]
async fn test_missing_location_returns_to_initial_without_report() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = StateManager::spawn(temp_dir.path().join("tb.db")).expect("Failed to open store");
    let engine = engine_over(&manager);

    let data = ReportData {
        category: Some("Healthcare".to_string()),
        description: Some("The clinic has had no medicine for weeks".to_string()),
        language: Some("en".to_string()),
        ..Default::default()
    };
    manager
        .set(PHONE, &Session::new(ConversationState::Confirm, data.clone()))
        .await
        .expect("set should succeed");

    let reply = engine.handle(PHONE, "yes").await;
    assert!(reply.contains("Location missing"));

    let session = engine.session(PHONE).await.expect("session should load");
    assert_eq!(session.state, ConversationState::Initial);
    assert_eq!(session.report_data.description, data.description);
    assert!(manager.list_reports().await.expect("list should succeed").is_empty());
}

#[tokio::test]
async fn test_menu_resets_every_state() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = StateManager::spawn(temp_dir.path().join("tb.db")).expect("Failed to open store");
    let engine = engine_over(&manager);

    for state in ConversationState::ALL {
        let data = ReportData {
            category: Some("Education".to_string()),
            description: Some("The school roof is leaking badly".to_string()),
            ..Default::default()
        };
        manager
            .set(PHONE, &Session::new(state, data))
            .await
            .expect("set should succeed");

        let reply = engine.handle(PHONE, "menu").await;
        assert!(reply.contains("1. Report Issue"), "state {} gave: {}", state, reply);

        let session = engine.session(PHONE).await.expect("session should load");
        assert_eq!(session.state, ConversationState::Initial);
        assert_eq!(session.report_data, ReportData::default());
    }
}

#[tokio::test]
async fn test_senders_are_isolated() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = StateManager::spawn(temp_dir.path().join("tb.db")).expect("Failed to open store");
    let engine = Arc::new(engine_over(&manager));

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine.handle("whatsapp:+254700000001", "1").await;
            engine.handle("whatsapp:+254700000001", "3").await;
        })
    };
    let second = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine.handle("254700000002@c.us", "1").await;
            engine.handle("254700000002@c.us", "1").await;
        })
    };
    first.await.expect("first sender task panicked");
    second.await.expect("second sender task panicked");

    let a = engine.session("254700000001").await.expect("session should load");
    let b = engine.session("254700000002").await.expect("session should load");
    assert_eq!(a.report_data.category.as_deref(), Some("Education"));
    assert_eq!(b.report_data.category.as_deref(), Some("Healthcare"));
}

#[tokio::test]
async fn test_evidence_upload_through_media_dir() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = StateManager::spawn(temp_dir.path().join("tb.db")).expect("Failed to open store");
    let engine = engine_over(&manager);

    let source = temp_dir.path().join("pothole.jpg");
    std::fs::write(&source, b"jpeg bytes").expect("write source");

    engine.handle(PHONE, "1").await;
    engine.handle(PHONE, "2").await;
    engine.handle(PHONE, "1").await;
    engine.handle(PHONE, "There is a large pothole on Main Street").await;
    engine.handle(PHONE, "Nairobi CBD").await;
    engine.handle(PHONE, "yes").await;
    assert_eq!(state_of(&engine, PHONE).await, ConversationState::EvidenceMedia);

    let file = evidence::store_media(&temp_dir.path().join("media"), PHONE, &source)
        .await
        .expect("store media");
    let reply = engine.attach_evidence(PHONE, file).await;
    assert!(reply.contains("1 file(s)"));

    let summary = engine.handle(PHONE, "done").await;
    assert!(summary.contains("*Evidence:* 1 file(s)"));
    engine.handle(PHONE, "yes").await;

    let reports = manager.find_by_owner(PHONE).await.expect("reports should load");
    assert_eq!(reports[0].evidence_files.len(), 1);
    assert_eq!(reports[0].evidence_files[0].mime_type, "image/jpeg");
}

// =============================================================================
// Binary Tests
// =============================================================================

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("tb.yml");
    let yaml = format!(
        "llm:\n  api-key-env: TB_TEST_KEY_THAT_IS_NOT_SET\nstorage:\n  db-path: {}\n  media-dir: {}\n",
        dir.join("tb.db").display(),
        dir.join("media").display()
    );
    std::fs::write(&path, yaml).expect("write config");
    path
}

fn tb(dir: &Path, config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tb").expect("binary should build");
    cmd.env("XDG_DATA_HOME", dir.join("data")).arg("-c").arg(config);
    cmd
}

#[test]
fn test_cli_send_prints_reply() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path());

    tb(temp_dir.path(), &config)
        .args(["send", "--phone", PHONE, "menu"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. Report Issue"));

    tb(temp_dir.path(), &config)
        .args(["send", "--phone", PHONE, "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Select a Category"));
}

#[test]
fn test_cli_reports_empty_json() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path());

    tb(temp_dir.path(), &config)
        .args(["reports", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_cli_set_status_unknown_report_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path());

    tb(temp_dir.path(), &config)
        .args(["set-status", "99", "resolved"])
        .assert()
        .failure();

    tb(temp_dir.path(), &config)
        .args(["set-status", "1", "closed"])
        .assert()
        .failure();
}
