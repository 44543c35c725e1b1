use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;

fn contract(seed: u8) -> String {
    stellar_strkey::Contract([seed; 32]).to_string()
}

fn tkl(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tkl-cli").unwrap();
    cmd.current_dir(dir).env("RUST_LOG", "warn");
    cmd
}

fn write_asset(dir: &Path, file: &str, body: serde_json::Value) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(file), serde_json::to_string_pretty(&body).unwrap()).unwrap();
}

#[test]
fn init_creates_registry_and_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();

    tkl(dir.path())
        .args(["init", "--name", "Test List", "--keyword", "dex"])
        .assert()
        .success()
        .stdout(predicate::str::contains("version=0.0.0"));

    let raw = fs::read_to_string(dir.path().join("tokenList.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["name"], "Test List");
    assert_eq!(doc["network"], "mainnet");
    assert_eq!(doc["assets"], serde_json::json!([]));

    tkl(dir.path())
        .args(["init", "--name", "Other"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));
}

#[test]
fn merge_admits_contract_assets_then_resubmission_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let assets = dir.path().join("assets");
    tkl(dir.path()).args(["init", "--name", "Test List"]).assert().success();

    write_asset(
        &assets,
        "b.json",
        serde_json::json!({"name": "Bravo Token", "org": "Bravo Org", "contract": contract(2), "decimals": 7}),
    );
    write_asset(
        &assets,
        "a.json",
        serde_json::json!({"name": "Alpha Token", "org": "Alpha Org", "contract": contract(1), "decimals": 7}),
    );

    tkl(dir.path())
        .arg("merge")
        .assert()
        .success()
        .stdout(predicate::str::contains("written=true"))
        .stdout(predicate::str::contains(format!("added={}", contract(1))));

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("tokenList.json")).unwrap())
            .unwrap();
    assert_eq!(doc["version"], "0.0.1");
    assert_eq!(doc["assets"][0]["contract"], contract(1).as_str());
    assert_eq!(doc["assets"][1]["contract"], contract(2).as_str());

    tkl(dir.path())
        .arg("merge")
        .assert()
        .success()
        .stdout(predicate::str::contains("written=false"));

    let again: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("tokenList.json")).unwrap())
            .unwrap();
    assert_eq!(again["version"], "0.0.1");
}

#[test]
fn export_writes_one_file_per_asset() {
    let dir = tempfile::tempdir().unwrap();
    let registry = serde_json::json!({
        "name": "Test List",
        "version": "0.3.1",
        "assets": [
            {"name": "Alpha Token", "org": "Alpha Org", "contract": contract(1), "decimals": 7}
        ]
    });
    fs::write(dir.path().join("list.json"), registry.to_string()).unwrap();

    tkl(dir.path())
        .args(["--registry", "list.json", "export", "--out", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exported=1"));

    assert!(dir.path().join("out").join(format!("{}.json", contract(1))).exists());
}

#[test]
fn config_hash_prints_hash_and_canonical_json() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cfg.yaml"), "verify:\n  check_icons: false\n").unwrap();

    tkl(dir.path())
        .args(["--config", "cfg.yaml", "config-hash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains("{\"verify\":{\"check_icons\":false}}"));
}
