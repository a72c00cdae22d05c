//! Config safeguard write / rollback / repair against a simulated environment.

#![allow(clippy::expect_used)]

use std::time::Duration;

use gateway_supervisor::application::services::config_safeguard::{
    ConfigSafeguard, TRANSFER_CHUNK_LEN,
};
use gateway_supervisor::application::services::gateway::Gateway;
use gateway_supervisor::domain::error::SafeguardError;
use serde_json::json;

use crate::helpers::{
    BACKUP_PATH, CONFIG_PATH, FakeEnvironment, clean_config, dirty_config, instance, test_settings,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn wrote(env: &FakeEnvironment) -> bool {
    env.commands().iter().any(|c| c.starts_with("base64 -d "))
}

#[tokio::test]
async fn test_write_sanitizes_and_keeps_backup_of_previous() {
    let env = FakeEnvironment::new();
    let previous = json!({ "channels": { "whatsapp": { "enabled": false } } });
    env.put_json(CONFIG_PATH, &previous);
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);

    let sanitized = ConfigSafeguard::new(&gateway)
        .write(&dirty_config())
        .await
        .expect("write succeeds");

    assert_eq!(sanitized.changes.len(), 2);
    assert_eq!(env.json(CONFIG_PATH), Some(clean_config()));
    assert_eq!(env.json(BACKUP_PATH), Some(previous));
}

#[tokio::test]
async fn test_nonzero_write_exit_restores_previous_document() {
    let env = FakeEnvironment::new();
    let previous = json!({ "channels": { "telegram": { "dmPolicy": "open", "allowFrom": ["*"] } } });
    env.put_json(CONFIG_PATH, &previous);
    env.fail_writes_with(2);
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);
    let safeguard = ConfigSafeguard::new(&gateway);

    let err = safeguard.write(&clean_config()).await.expect_err("write fails");

    assert!(matches!(err, SafeguardError::WriteFailed { exit_code: 2 }));
    assert_eq!(safeguard.read().await.expect("readable"), previous);
}

#[tokio::test]
async fn test_nonzero_write_exit_without_previous_leaves_no_file() {
    let env = FakeEnvironment::new();
    env.fail_writes_with(1);
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);

    let err = ConfigSafeguard::new(&gateway)
        .write(&clean_config())
        .await
        .expect_err("write fails");

    assert!(matches!(err, SafeguardError::WriteFailed { .. }));
    assert!(env.file(CONFIG_PATH).is_none());
}

#[tokio::test]
async fn test_verify_mismatch_rolls_back() {
    let env = FakeEnvironment::new();
    let previous = clean_config();
    env.put_json(CONFIG_PATH, &previous);
    env.tamper_writes();
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);

    let err = ConfigSafeguard::new(&gateway)
        .write(&dirty_config())
        .await
        .expect_err("verify fails");

    assert!(matches!(err, SafeguardError::VerifyFailed(_)));
    assert_eq!(env.json(CONFIG_PATH), Some(previous));
}

#[tokio::test]
async fn test_non_object_document_is_never_written() {
    let env = FakeEnvironment::new();
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);

    let err = ConfigSafeguard::new(&gateway)
        .write(&json!(["not", "an", "object"]))
        .await
        .expect_err("rejected");

    assert!(matches!(err, SafeguardError::NotAnObject));
    assert!(!wrote(&env));
}

#[tokio::test]
async fn test_missing_process_does_not_change_write_outcome() {
    let settings = test_settings();
    let inst = instance("alpha");

    let stopped = FakeEnvironment::new();
    let gateway = Gateway::new(&stopped, &inst, &settings.gateway, TIMEOUT);
    let without = ConfigSafeguard::new(&gateway).write(&dirty_config()).await;
    assert!(without.is_ok());
    assert_eq!(stopped.reloads(), 0);

    let running = FakeEnvironment::new();
    running.set_running(true);
    let gateway = Gateway::new(&running, &inst, &settings.gateway, TIMEOUT);
    let with = ConfigSafeguard::new(&gateway).write(&dirty_config()).await;
    assert!(with.is_ok());
    assert_eq!(running.reloads(), 1);

    assert_eq!(stopped.json(CONFIG_PATH), running.json(CONFIG_PATH));
}

#[tokio::test]
async fn test_repair_falls_back_to_backup_when_live_unparseable() {
    let env = FakeEnvironment::new();
    env.put_file(CONFIG_PATH, "{\"channels\": {");
    env.put_json(BACKUP_PATH, &dirty_config());
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);

    ConfigSafeguard::new(&gateway)
        .repair()
        .await
        .expect("repaired from backup");

    assert_eq!(env.json(CONFIG_PATH), Some(clean_config()));
}

#[tokio::test]
async fn test_repair_of_clean_backup_still_rewrites_live() {
    let env = FakeEnvironment::new();
    env.put_file(CONFIG_PATH, "garbage");
    env.put_json(BACKUP_PATH, &clean_config());
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);

    let sanitized = ConfigSafeguard::new(&gateway).repair().await.expect("repaired");

    assert!(sanitized.is_unchanged());
    assert!(wrote(&env));
    assert_eq!(env.json(CONFIG_PATH), Some(clean_config()));
}

#[tokio::test]
async fn test_repair_leaves_clean_config_alone() {
    let env = FakeEnvironment::new();
    env.put_json(CONFIG_PATH, &clean_config());
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);

    let sanitized = ConfigSafeguard::new(&gateway).repair().await.expect("ok");

    assert!(sanitized.is_unchanged());
    assert!(!wrote(&env));
}

#[tokio::test]
async fn test_repair_fails_when_nothing_parses() {
    let env = FakeEnvironment::new();
    env.put_file(CONFIG_PATH, "garbage");
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);

    let err = ConfigSafeguard::new(&gateway)
        .repair()
        .await
        .expect_err("unreadable");

    assert!(matches!(err, SafeguardError::Unreadable));
    assert_eq!(env.file(CONFIG_PATH).as_deref(), Some("garbage"));
}

#[tokio::test]
async fn test_failed_repair_from_backup_keeps_backup_slot() {
    let env = FakeEnvironment::new();
    env.put_file(CONFIG_PATH, "garbage");
    env.put_json(BACKUP_PATH, &clean_config());
    env.fail_writes_with(1);
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);
    let safeguard = ConfigSafeguard::new(&gateway);

    let err = safeguard.repair().await.expect_err("write fails");
    assert!(matches!(err, SafeguardError::WriteFailed { exit_code: 1 }));
    assert_eq!(env.json(BACKUP_PATH), Some(clean_config()));

    env.fail_writes_with(0);
    safeguard.repair().await.expect("second attempt recovers");
    assert_eq!(env.json(CONFIG_PATH), Some(clean_config()));
    assert_eq!(env.json(BACKUP_PATH), Some(clean_config()));
}

#[tokio::test]
async fn test_failed_repair_of_missing_live_keeps_backup_slot() {
    let env = FakeEnvironment::new();
    env.put_json(BACKUP_PATH, &dirty_config());
    env.fail_writes_with(3);
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);

    let err = ConfigSafeguard::new(&gateway)
        .repair()
        .await
        .expect_err("write fails");

    assert!(matches!(err, SafeguardError::WriteFailed { exit_code: 3 }));
    assert_eq!(env.json(BACKUP_PATH), Some(dirty_config()));
    // rollback puts the backup's content back in place of the clobbered file
    assert_eq!(env.json(CONFIG_PATH), Some(dirty_config()));
}

#[tokio::test]
async fn test_large_config_is_transferred_in_bounded_chunks() {
    let env = FakeEnvironment::new();
    let allow: Vec<String> = (0..20_000).map(|n| format!("+1555{n:07}")).collect();
    let doc = json!({
        "channels": { "whatsapp": { "enabled": true, "dmPolicy": "allowlist", "allowFrom": allow } }
    });
    let settings = test_settings();
    let inst = instance("alpha");
    let gateway = Gateway::new(&env, &inst, &settings.gateway, TIMEOUT);

    ConfigSafeguard::new(&gateway)
        .write(&doc)
        .await
        .expect("write succeeds");

    let commands = env.commands();
    let chunks = commands.iter().filter(|c| c.starts_with("printf ")).count();
    assert!(chunks > 2, "expected several chunks, got {chunks}");
    assert!(commands.iter().all(|c| c.len() < TRANSFER_CHUNK_LEN + 1024));
    assert_eq!(env.json(CONFIG_PATH), Some(doc));
}
