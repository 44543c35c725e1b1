use tkl_schemas::{parse_candidate, Registry};
use tkl_store::{export_assets, read_candidates};
use tkl_testkit::{classic_record, contract, contract_record, issuer};

#[test]
fn scenario_exported_directory_reads_back_as_identical_records() {
    let reg = Registry {
        assets: vec![
            contract_record(&contract(1), "Alpha Token", 7),
            classic_record("USDC", &issuer(2), "centre.io"),
        ],
        ..Default::default()
    };

    let dir = tempfile::tempdir().unwrap();
    assert_eq!(export_assets(&reg, dir.path()).unwrap(), 2);

    let src = read_candidates(dir.path()).unwrap();
    assert!(src.unreadable.is_empty());
    assert_eq!(src.candidates.len(), 2);

    for cand in &src.candidates {
        let rec = parse_candidate(&cand.value).unwrap();
        let contract = rec.contract_id().unwrap();
        assert_eq!(cand.source, format!("{contract}.json"));
        assert_eq!(reg.find(contract), Some(&rec));
    }
}

#[test]
fn scenario_export_of_unkeyed_entry_fails() {
    let mut rec = contract_record(&contract(1), "Alpha Token", 7);
    rec.contract = None;
    let reg = Registry {
        assets: vec![rec],
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();
    assert!(export_assets(&reg, dir.path()).is_err());
}
