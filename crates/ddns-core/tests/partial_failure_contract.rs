//! Contract Test: Partial Failure & Persist Failure
//!
//! Constraints verified:
//! - Backends run in configured order; the first failure stops the list
//! - Nothing is persisted unless every backend succeeded
//! - The next cycle retries the whole list from the top
//! - A failed write rolls the in-memory addresses back

mod common;

use common::*;
use ddns_core::traits::PublicAddresses;
use ddns_core::{Error, ErrorKind};
use tempfile::tempdir;

#[tokio::test]
async fn second_of_three_fails() {
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        &config_json("5m", &[("A", "a.example"), ("B", "b.example"), ("C", "c.example")]),
    );

    let provider = ControlledAddressProvider::new(PublicAddresses::v4(IP_A));
    let log = CallLog::new();
    let mut registry = registry_with(&provider);
    registry.register_backend("A", Box::new(RecordingBackendFactory::new("A", &log)));
    registry.register_backend("B", Box::new(RecordingBackendFactory::failing("B", &log)));
    registry.register_backend("C", Box::new(RecordingBackendFactory::new("C", &log)));
    let (store, orchestrator) = orchestrator(&path, registry).await;

    let err = orchestrator.perform_update_cycle().await.unwrap_err();

    assert_eq!(log.count_for("A"), 1);
    assert_eq!(log.count_for("B"), 1);
    assert_eq!(log.count_for("C"), 0, "backends after the failure are not attempted");
    match err {
        Error::Backend { service, message } => {
            assert_eq!(service, "B");
            assert_eq!(message, "update rejected");
        }
        other => panic!("expected the second backend's error, got {:?}", other),
    }

    assert_eq!(store.snapshot().await.last_public_ipv4, None);
    assert!(read_persisted(&path).get("lastPublicIpv4").is_none());
}

#[tokio::test]
async fn next_cycle_retries_from_the_top() {
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        &config_json("5m", &[("A", "a.example"), ("B", "b.example"), ("C", "c.example")]),
    );

    let provider = ControlledAddressProvider::new(PublicAddresses::new(Some(IP_A), Some(IP6_A)));
    let log = CallLog::new();
    let flaky = RecordingBackendFactory::failing("B", &log);
    let mut registry = registry_with(&provider);
    registry.register_backend("A", Box::new(RecordingBackendFactory::new("A", &log)));
    registry.register_backend("B", Box::new(flaky.clone()));
    registry.register_backend("C", Box::new(RecordingBackendFactory::new("C", &log)));
    let (store, orchestrator) = orchestrator(&path, registry).await;

    assert!(orchestrator.perform_update_cycle().await.is_err());
    assert_eq!(log.order(), vec!["A", "B"]);

    flaky.set_failing(false);
    log.clear();
    orchestrator.perform_update_cycle().await.unwrap();

    assert_eq!(log.order(), vec!["A", "B", "C"]);
    assert_eq!(store.snapshot().await.last_public_ipv4, Some(IP_A));

    log.clear();
    orchestrator.perform_update_cycle().await.unwrap();
    assert_eq!(log.len(), 0);
}

#[tokio::test]
async fn rejected_descriptor_counts_as_backend_failure() {
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        &config_json("5m", &[("NoToken", "a.example"), ("C", "c.example")]),
    );

    let provider = ControlledAddressProvider::new(PublicAddresses::v4(IP_A));
    let log = CallLog::new();
    let mut registry = registry_with(&provider);
    registry.register_backend("NoToken", Box::new(RejectingBackendFactory));
    registry.register_backend("C", Box::new(RecordingBackendFactory::new("C", &log)));
    let (store, orchestrator) = orchestrator(&path, registry).await;

    let err = orchestrator.perform_update_cycle().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
    assert!(err.to_string().contains("NoToken"));
    assert_eq!(log.len(), 0);
    assert_eq!(store.snapshot().await.last_public_ipv4, None);
}

#[tokio::test]
async fn persist_failure_rolls_back_and_retries_everything() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), &config_json("5m", &[("A", "a.example"), ("B", "b.example")]));

    let provider = ControlledAddressProvider::new(PublicAddresses::new(Some(IP_A), Some(IP6_A)));
    let log = CallLog::new();
    let mut registry = registry_with(&provider);
    registry.register_backend("A", Box::new(RecordingBackendFactory::new("A", &log)));
    registry.register_backend("B", Box::new(RecordingBackendFactory::new("B", &log)));
    let (store, orchestrator) = orchestrator(&path, registry).await;

    let before = store.snapshot().await;
    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let err = orchestrator.perform_update_cycle().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persist);
    assert_eq!(log.order(), vec!["A", "B"]);

    let after = store.snapshot().await;
    assert_eq!(after.last_public_ipv4, before.last_public_ipv4);
    assert_eq!(after.last_public_ipv6, before.last_public_ipv6);
    assert_eq!(after.last_updated, before.last_updated);

    // Storage is back; the same observation re-attempts every backend
    std::fs::write(&path, contents).unwrap();
    store.reload().await.unwrap();
    log.clear();
    orchestrator.perform_update_cycle().await.unwrap();
    assert_eq!(log.order(), vec!["A", "B"]);
    assert_eq!(read_persisted(&path)["lastPublicIpv4"], "203.0.113.9");
}
