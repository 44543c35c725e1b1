use std::sync::Arc;
use tkl_network::PUBLIC_NETWORK_PASSPHRASE;
use tkl_reconcile::*;
use tkl_schemas::{Registry, RegistryVersion};
use tkl_testkit::{contract, contract_record, to_json, FakeNetwork};
use tkl_verify::IdentityVerifier;

fn engine() -> ReconciliationEngine {
    let verifier = IdentityVerifier::new(Arc::new(FakeNetwork::new()), PUBLIC_NETWORK_PASSPHRASE);
    ReconciliationEngine::new(ReconcileConfig::default(), verifier)
}

#[tokio::test]
async fn scenario_changed_decimals_replaces_entry_and_bumps_patch() {
    let key = contract(0xAA);
    let existing = Registry {
        version: RegistryVersion::new(0, 0, 9),
        assets: vec![contract_record(&key, "Foo Token", 7)],
        ..Default::default()
    };

    let candidate = Candidate::new("foo.json", to_json(&contract_record(&key, "Foo Token", 9)));
    let out = engine().run(&existing, &[candidate]).await.unwrap();

    assert!(out.is_clean());
    assert_eq!(out.changes.updated.len(), 1);
    assert_eq!(out.changes.updated[&key], vec!["decimals".to_string()]);
    assert!(out.changes.added.is_empty());
    assert!(out.changes.removed.is_empty());

    // 0.0.9 carries into minor
    assert_eq!(out.registry.version, RegistryVersion::new(0, 1, 0));
    assert_eq!(out.registry.assets.len(), 1);
    assert_eq!(out.registry.assets[0].decimals, Some(9));
    assert!(out.should_write(true));
}

#[tokio::test]
async fn scenario_update_replaces_whole_record_not_fields() {
    let key = contract(0xAB);
    let mut stored = contract_record(&key, "Foo Token", 7);
    stored.comment = Some("old comment".to_string());
    let existing = Registry {
        assets: vec![stored],
        ..Default::default()
    };

    // candidate drops the comment entirely
    let candidate = Candidate::new("foo.json", to_json(&contract_record(&key, "Foo Token", 7)));
    let out = engine().run(&existing, &[candidate]).await.unwrap();

    assert_eq!(out.changes.updated[&key], vec!["comment".to_string()]);
    assert_eq!(out.registry.assets[0].comment, None);
}
