//! Pure first pass: validate, key and classify every candidate.

use crate::{Candidate, Violation, ViolationKind};
use std::collections::{BTreeMap, BTreeSet};
use tkl_network::asset_contract_id;
use tkl_schemas::{parse_candidate, AssetRecord, Registry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedKind {
    Added,
    /// Names of the fields that differ from the stored entry.
    Updated(Vec<String>),
}

/// A candidate that must pass identity verification before it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub source: String,
    /// Always carries `contract`, declared or derived.
    pub record: AssetRecord,
    pub kind: PlannedKind,
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Keyed by contract.
    pub changes: BTreeMap<String, PlannedChange>,
    /// Identical to the stored entry; nothing to verify.
    pub unchanged: BTreeSet<String>,
    /// Every contract key any candidate resolved to, valid or not.
    pub encountered: BTreeSet<String>,
    pub violations: Vec<Violation>,
}

impl Plan {
    /// Existing keys no candidate mentioned.
    pub fn absent_from(&self, existing: &Registry) -> BTreeSet<String> {
        existing
            .assets
            .iter()
            .filter_map(|a| a.contract_id())
            .filter(|c| !self.encountered.contains(*c))
            .map(str::to_string)
            .collect()
    }
}

/// Best-effort key for a candidate that failed validation, so that a broken
/// edit of an existing asset does not read as a deletion.
fn readable_key(candidate: &Candidate, network_passphrase: &str) -> Option<String> {
    let obj = candidate.value.as_object()?;
    if let Some(c) = obj.get("contract").and_then(|v| v.as_str()) {
        return Some(c.to_string());
    }
    let code = obj.get("code").and_then(|v| v.as_str())?;
    let issuer = obj.get("issuer").and_then(|v| v.as_str())?;
    asset_contract_id(code, issuer, network_passphrase).ok()
}

/// Classify `candidates` against `existing`. Candidates are taken in source
/// order; the first one to claim a key wins.
pub fn plan(existing: &Registry, candidates: &[Candidate], network_passphrase: &str) -> Plan {
    let index: BTreeMap<&str, &AssetRecord> = existing
        .assets
        .iter()
        .filter_map(|a| a.contract_id().map(|c| (c, a)))
        .collect();

    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by(|a, b| a.source.cmp(&b.source));

    let mut out = Plan::default();
    let mut claimed: BTreeMap<String, String> = BTreeMap::new();

    for cand in ordered {
        let mut record = match parse_candidate(&cand.value) {
            Ok(r) => r,
            Err(schema) => {
                let key = readable_key(cand, network_passphrase);
                if let Some(k) = &key {
                    out.encountered.insert(k.clone());
                }
                out.violations.extend(schema.into_iter().map(|v| Violation {
                    source: cand.source.clone(),
                    contract: key.clone(),
                    kind: ViolationKind::Schema(v),
                }));
                continue;
            }
        };

        let key = match (record.contract.clone(), record.classic_identity()) {
            (Some(c), _) => c,
            (None, Some((code, issuer))) => {
                match asset_contract_id(code, issuer, network_passphrase) {
                    Ok(derived) => derived,
                    Err(e) => {
                        out.violations.push(Violation {
                            source: cand.source.clone(),
                            contract: None,
                            kind: ViolationKind::Derivation(e.to_string()),
                        });
                        continue;
                    }
                }
            }
            // Validation guarantees one identity form.
            (None, None) => continue,
        };

        out.encountered.insert(key.clone());

        if let Some(first) = claimed.get(&key) {
            out.violations.push(Violation {
                source: cand.source.clone(),
                contract: Some(key.clone()),
                kind: ViolationKind::DuplicateCandidate {
                    contract: key,
                    first_source: first.clone(),
                },
            });
            continue;
        }
        claimed.insert(key.clone(), cand.source.clone());

        record.contract = Some(key.clone());

        let kind = match index.get(key.as_str()) {
            None => PlannedKind::Added,
            Some(stored) => {
                let changed = stored.changed_fields(&record);
                if changed.is_empty() {
                    out.unchanged.insert(key);
                    continue;
                }
                PlannedKind::Updated(changed.into_iter().map(str::to_string).collect())
            }
        };

        out.changes.insert(
            key,
            PlannedChange {
                source: cand.source.clone(),
                record,
                kind,
            },
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tkl_network::PUBLIC_NETWORK_PASSPHRASE;
    use tkl_testkit::{classic_record, contract, contract_record, issuer, to_json};

    fn registry(assets: Vec<AssetRecord>) -> Registry {
        Registry {
            assets,
            ..Default::default()
        }
    }

    fn run(existing: &Registry, cands: Vec<(&str, serde_json::Value)>) -> Plan {
        let cands: Vec<Candidate> = cands
            .into_iter()
            .map(|(s, v)| Candidate::new(s, v))
            .collect();
        plan(existing, &cands, PUBLIC_NETWORK_PASSPHRASE)
    }

    #[test]
    fn classifies_new_changed_unchanged() {
        let a = contract_record(&contract(1), "Alpha Token", 7);
        let b = contract_record(&contract(2), "Bravo Token", 7);
        let existing = registry(vec![a.clone(), b.clone()]);

        let mut b2 = b.clone();
        b2.decimals = Some(9);
        let c = contract_record(&contract(3), "Charlie Token", 7);

        let p = run(
            &existing,
            vec![("a.json", to_json(&a)), ("b.json", to_json(&b2)), ("c.json", to_json(&c))],
        );

        assert!(p.violations.is_empty());
        assert_eq!(p.unchanged, BTreeSet::from([contract(1)]));
        assert_eq!(
            p.changes[&contract(2)].kind,
            PlannedKind::Updated(vec!["decimals".to_string()])
        );
        assert_eq!(p.changes[&contract(3)].kind, PlannedKind::Added);
        assert!(p.absent_from(&existing).is_empty());
    }

    #[test]
    fn invalid_edit_still_counts_as_encountered() {
        let a = contract_record(&contract(1), "Alpha Token", 7);
        let existing = registry(vec![a]);

        let p = run(
            &existing,
            vec![("a.json", json!({"contract": contract(1), "name": "Alpha Token", "org": "Test Org", "bogus": true}))],
        );

        assert_eq!(p.violations.len(), 1);
        assert_eq!(p.violations[0].contract, Some(contract(1)));
        assert!(p.encountered.contains(&contract(1)));
        assert!(p.absent_from(&existing).is_empty());
        assert!(p.changes.is_empty());
    }

    #[test]
    fn classic_record_without_contract_is_keyed_by_derivation() {
        let mut rec = classic_record("USDC", &issuer(1), "centre.io");
        let expected = rec.contract.take().unwrap();

        let p = run(&Registry::default(), vec![("usdc.json", to_json(&rec))]);
        let change = &p.changes[&expected];
        assert_eq!(change.record.contract.as_deref(), Some(expected.as_str()));
        assert_eq!(change.kind, PlannedKind::Added);
    }

    #[test]
    fn second_claim_on_a_key_is_rejected() {
        let a = contract_record(&contract(1), "Alpha Token", 7);
        let p = run(
            &Registry::default(),
            vec![("z.json", to_json(&a)), ("a.json", to_json(&a))],
        );
        assert_eq!(p.changes[&contract(1)].source, "a.json");
        assert_eq!(p.violations.len(), 1);
        assert_eq!(p.violations[0].source, "z.json");
        assert!(matches!(
            p.violations[0].kind,
            ViolationKind::DuplicateCandidate { .. }
        ));
    }

    #[test]
    fn missing_identity_is_a_schema_violation() {
        let p = run(
            &Registry::default(),
            vec![("x.json", json!({"name": "Nameless Token", "org": "Test Org"}))],
        );
        assert_eq!(p.violations.len(), 1);
        assert!(p.violations[0].to_string().contains("anyOf"));
        assert!(p.encountered.is_empty());
    }
}
