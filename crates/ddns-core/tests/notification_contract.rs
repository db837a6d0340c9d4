//! Contract Test: Notifications
//!
//! Constraints verified:
//! - Enabled notifiers receive one notice after a successful persist
//! - Disabled notifiers and unchanged cycles send nothing
//! - A notifier failure is the cycle's error but the persist stands,
//!   so the failed notice is not retried

mod common;

use common::*;
use ddns_core::config::SIPGATE_SMS;
use ddns_core::traits::PublicAddresses;
use ddns_core::{CycleOutcome, ErrorKind};
use tempfile::tempdir;

fn config_with_sms(enabled: bool) -> String {
    format!(
        r#"{{
            "updateInterval": "5m",
            "services": [
                {{ "serviceType": "A", "targetDomain": "a.example" }},
                {{ "serviceType": "A", "targetDomain": "b.example" }}
            ],
            "notifications": {{ "sipgateSMS": {{ "enabled": {} }} }}
        }}"#,
        enabled
    )
}

#[tokio::test]
async fn notice_follows_successful_persist() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), &config_with_sms(true));

    let provider = ControlledAddressProvider::new(PublicAddresses::new(Some(IP_A), Some(IP6_A)));
    let log = CallLog::new();
    let notifier = RecordingNotifier::new();
    let mut registry = registry_with(&provider);
    registry.register_backend("A", Box::new(RecordingBackendFactory::new("A", &log)));
    registry.register_notifier(SIPGATE_SMS, Box::new(notifier.clone()));
    let (_store, orchestrator) = orchestrator(&path, registry).await;

    orchestrator.perform_update_cycle().await.unwrap();

    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].domains, vec!["a.example", "b.example"]);
    assert_eq!(notices[0].hostname, "test-host");
    assert_eq!(
        notices[0].render(),
        "The IP addresses for domains 'a.example,b.example' were updated to:\n203.0.113.9\n2001:db8::1\nby: test-host"
    );

    // Unchanged cycle sends nothing
    orchestrator.perform_update_cycle().await.unwrap();
    assert_eq!(notifier.send_count(), 1);
}

#[tokio::test]
async fn disabled_notifier_is_not_called() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), &config_with_sms(false));

    let provider = ControlledAddressProvider::new(PublicAddresses::v4(IP_A));
    let log = CallLog::new();
    let notifier = RecordingNotifier::new();
    let mut registry = registry_with(&provider);
    registry.register_backend("A", Box::new(RecordingBackendFactory::new("A", &log)));
    registry.register_notifier(SIPGATE_SMS, Box::new(notifier.clone()));
    let (_store, orchestrator) = orchestrator(&path, registry).await;

    orchestrator.perform_update_cycle().await.unwrap();
    assert_eq!(notifier.send_count(), 0);
}

#[tokio::test]
async fn notifier_failure_does_not_roll_back() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), &config_with_sms(true));

    let observed = PublicAddresses::new(Some(IP_A), Some(IP6_A));
    let provider = ControlledAddressProvider::new(observed);
    let log = CallLog::new();
    let notifier = RecordingNotifier::new();
    notifier.set_failing(true);
    let mut registry = registry_with(&provider);
    registry.register_backend("A", Box::new(RecordingBackendFactory::new("A", &log)));
    registry.register_notifier(SIPGATE_SMS, Box::new(notifier.clone()));
    let (store, orchestrator) = orchestrator(&path, registry).await;

    let err = orchestrator.perform_update_cycle().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Notify);

    assert_eq!(store.snapshot().await.last_public_ipv4, Some(IP_A));
    assert_eq!(read_persisted(&path)["lastPublicIpv4"], "203.0.113.9");

    // The change is recorded, so the failed notice is never retried
    let outcome = orchestrator.perform_update_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Unchanged { addresses: observed });
    assert_eq!(notifier.send_count(), 1);
    assert_eq!(log.len(), 2);
}

#[tokio::test]
async fn unregistered_enabled_notifier_is_skipped() {
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"{
            "updateInterval": "5m",
            "services": [ { "serviceType": "A", "targetDomain": "a.example" } ],
            "notifications": { "email": { "enabled": true, "smtpServer": "mail.example:465" } }
        }"#,
    );

    let provider = ControlledAddressProvider::new(PublicAddresses::v4(IP_A));
    let log = CallLog::new();
    let mut registry = registry_with(&provider);
    registry.register_backend("A", Box::new(RecordingBackendFactory::new("A", &log)));
    let (_store, orchestrator) = orchestrator(&path, registry).await;

    let outcome = orchestrator.perform_update_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Updated { .. }));

    // The email block survives the rewrite
    let persisted = read_persisted(&path);
    assert_eq!(persisted["notifications"]["email"]["enabled"], true);
    assert_eq!(persisted["notifications"]["email"]["smtpServer"], "mail.example:465");
}
