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

fn registry_with(dir: &Path, seeds: &[u8]) -> String {
    let assets: Vec<serde_json::Value> = seeds
        .iter()
        .map(|s| serde_json::json!({"name": "Some Token", "org": "Some Org", "contract": contract(*s), "decimals": 7}))
        .collect();
    let body = serde_json::json!({"name": "Test List", "version": "1.0.0", "assets": assets}).to_string();
    fs::write(dir.join("tokenList.json"), &body).unwrap();
    body
}

#[test]
fn verify_reports_schema_violation_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let before = registry_with(dir.path(), &[1]);
    let assets = dir.path().join("assets");
    fs::create_dir_all(&assets).unwrap();
    fs::write(
        assets.join("one.json"),
        serde_json::json!({"name": "Some Token", "org": "Some Org", "contract": contract(1), "decimals": 7, "website": "x"}).to_string(),
    )
    .unwrap();
    fs::write(
        assets.join("two.json"),
        serde_json::json!({"name": "Second Token", "org": "Some Org", "contract": contract(2), "decimals": 7}).to_string(),
    )
    .unwrap();

    tkl(dir.path())
        .arg("verify")
        .assert()
        .failure()
        .stdout(predicate::str::contains(format!("added={}", contract(2))))
        .stdout(predicate::str::contains("written=false"))
        .stderr(predicate::str::contains("unknown field 'website'"))
        .stderr(predicate::str::contains("CANDIDATE_VIOLATIONS"));

    assert_eq!(fs::read_to_string(dir.path().join("tokenList.json")).unwrap(), before);
}

#[test]
fn strict_merge_does_not_write_when_any_candidate_fails() {
    let dir = tempfile::tempdir().unwrap();
    let before = registry_with(dir.path(), &[]);
    let assets = dir.path().join("assets");
    fs::create_dir_all(&assets).unwrap();
    fs::write(assets.join("bad.json"), "{ not json").unwrap();
    fs::write(
        assets.join("good.json"),
        serde_json::json!({"name": "Good Token", "org": "Some Org", "contract": contract(3), "decimals": 7}).to_string(),
    )
    .unwrap();

    tkl(dir.path())
        .arg("merge")
        .assert()
        .failure()
        .stdout(predicate::str::contains("written=false"))
        .stderr(predicate::str::contains("bad.json: unreadable"));

    assert_eq!(fs::read_to_string(dir.path().join("tokenList.json")).unwrap(), before);
}

#[test]
fn empty_source_dir_cannot_wipe_registry() {
    let dir = tempfile::tempdir().unwrap();
    let before = registry_with(dir.path(), &[1, 2, 3]);
    fs::create_dir_all(dir.path().join("assets")).unwrap();

    tkl(dir.path())
        .arg("merge")
        .assert()
        .failure()
        .stderr(predicate::str::contains("RECONCILE_REFUSED"));

    assert_eq!(fs::read_to_string(dir.path().join("tokenList.json")).unwrap(), before);

    tkl(dir.path())
        .args(["merge", "--allow-mass-removal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("written=true"));

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("tokenList.json")).unwrap())
            .unwrap();
    assert_eq!(doc["assets"], serde_json::json!([]));
    assert_eq!(doc["version"], "1.0.1");
}
