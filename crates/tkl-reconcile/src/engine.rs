use crate::{
    canonicalize, next_version, plan, Candidate, PlannedKind, ReconcileError, ReconcileOutcome,
    Violation, ViolationKind,
};
use std::collections::BTreeMap;
use tkl_schemas::{AssetRecord, ChangeSet, Registry};
use tkl_verify::IdentityVerifier;
use tracing::{info, warn};

/// Run-level knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// A non-empty registry is never reconciled against fewer candidates.
    pub min_candidates: usize,
    /// Largest fraction of existing entries one run may remove.
    pub max_removal_ratio: f64,
    /// In-flight identity verifications.
    pub max_concurrency: usize,
    /// Skip both removal guards.
    pub allow_mass_removal: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            min_candidates: 1,
            max_removal_ratio: 0.5,
            max_concurrency: 4,
            allow_mass_removal: false,
        }
    }
}

pub struct ReconciliationEngine {
    config: ReconcileConfig,
    verifier: IdentityVerifier,
}

impl ReconciliationEngine {
    pub fn new(config: ReconcileConfig, verifier: IdentityVerifier) -> Self {
        Self { config, verifier }
    }

    /// Reconcile `candidates` against `existing`.
    ///
    /// Per-candidate failures become violations and never stop the run. The
    /// removal guard runs before any network call. The working set is only
    /// assembled after every verification has completed.
    pub async fn run(
        &self,
        existing: &Registry,
        candidates: &[Candidate],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        check_existing(existing)?;

        let mut plan = plan(existing, candidates, self.verifier.network_passphrase());
        let removed = plan.absent_from(existing);
        self.guard(existing.assets.len(), plan.encountered.len(), removed.len())?;

        info!(
            candidates = candidates.len(),
            to_verify = plan.changes.len(),
            unchanged = plan.unchanged.len(),
            to_remove = removed.len(),
            "reconcile planned"
        );

        let pending: Vec<(String, AssetRecord)> = plan
            .changes
            .iter()
            .map(|(k, c)| (k.clone(), c.record.clone()))
            .collect();
        let verified = self
            .verifier
            .verify_batch(pending, self.config.max_concurrency)
            .await;

        let mut working: BTreeMap<String, AssetRecord> = existing
            .assets
            .iter()
            .filter_map(|a| a.contract.clone().map(|c| (c, a.clone())))
            .filter(|(c, _)| !removed.contains(c))
            .collect();
        let mut changes = ChangeSet {
            removed,
            ..Default::default()
        };

        for (key, record, verification) in verified {
            let Some(planned) = plan.changes.remove(&key) else {
                continue;
            };
            if !verification.is_verified() {
                for v in verification.violations {
                    warn!(source = %planned.source, contract = %key, violation = %v, "candidate rejected");
                    plan.violations.push(Violation {
                        source: planned.source.clone(),
                        contract: Some(key.clone()),
                        kind: ViolationKind::Identity(v),
                    });
                }
                continue;
            }
            match planned.kind {
                PlannedKind::Added => {
                    changes.added.insert(key.clone());
                }
                PlannedKind::Updated(fields) => {
                    changes.updated.insert(key.clone(), fields);
                }
            }
            working.insert(key, record);
        }

        let mut violations = plan.violations;
        violations.sort_by(|a, b| a.source.cmp(&b.source));

        let registry = Registry {
            metadata: existing.metadata.clone(),
            version: next_version(existing.version, !changes.is_empty()),
            assets: canonicalize(working.into_values().collect()),
            key_order: existing.key_order.clone(),
        };

        info!(
            added = changes.added.len(),
            updated = changes.updated.len(),
            removed = changes.removed.len(),
            violations = violations.len(),
            version = %registry.version,
            "reconcile complete"
        );

        Ok(ReconcileOutcome {
            registry,
            changes,
            violations,
        })
    }

    fn guard(&self, existing: usize, encountered: usize, removed: usize) -> Result<(), ReconcileError> {
        if existing == 0 || self.config.allow_mass_removal {
            return Ok(());
        }
        if encountered < self.config.min_candidates {
            return Err(ReconcileError::BelowMinimumCandidates {
                encountered,
                minimum: self.config.min_candidates,
            });
        }
        let ratio = removed as f64 / existing as f64;
        if ratio > self.config.max_removal_ratio {
            return Err(ReconcileError::DestructiveRemoval {
                removed,
                existing,
                max_ratio: self.config.max_removal_ratio,
            });
        }
        Ok(())
    }
}

fn check_existing(existing: &Registry) -> Result<(), ReconcileError> {
    if existing.assets.iter().any(|a| a.contract.is_none()) {
        return Err(ReconcileError::CorruptRegistry(
            "entry without a contract id".to_string(),
        ));
    }
    let dups = existing.duplicate_contracts();
    if !dups.is_empty() {
        return Err(ReconcileError::CorruptRegistry(format!(
            "duplicate contract ids: {}",
            dups.join(", ")
        )));
    }
    Ok(())
}
