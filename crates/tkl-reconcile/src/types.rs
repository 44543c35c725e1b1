use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tkl_schemas::{ChangeSet, Registry, SchemaViolation};
use tkl_verify::IdentityViolation;

/// One source file's parsed content.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Where the candidate came from (file name). Only used for reporting and
    /// deterministic ordering.
    pub source: String,
    pub value: Value,
}

impl Candidate {
    pub fn new(source: impl Into<String>, value: Value) -> Self {
        Self {
            source: source.into(),
            value,
        }
    }
}

// ---------------------------------------------------------------------------
// Violations (per candidate, never fatal to the run)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// The source could not be read or parsed as JSON.
    Unreadable(String),
    Schema(SchemaViolation),
    /// `code` + `issuer` could not be turned into a contract id.
    Derivation(String),
    /// Another candidate already claimed this contract.
    DuplicateCandidate { contract: String, first_source: String },
    Identity(IdentityViolation),
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Unreadable(msg) => write!(f, "unreadable: {msg}"),
            ViolationKind::Schema(v) => write!(f, "schema: {v}"),
            ViolationKind::Derivation(msg) => write!(f, "contract derivation failed: {msg}"),
            ViolationKind::DuplicateCandidate {
                contract,
                first_source,
            } => write!(
                f,
                "duplicate candidate for {contract} (already provided by {first_source})"
            ),
            ViolationKind::Identity(v) => write!(f, "identity: {v}"),
        }
    }
}

/// A rejected candidate, with enough context to fix it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub source: String,
    pub contract: Option<String>,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.contract {
            Some(c) => write!(f, "{} [{}]: {}", self.source, c, self.kind),
            None => write!(f, "{}: {}", self.source, self.kind),
        }
    }
}

impl std::error::Error for Violation {}

// ---------------------------------------------------------------------------
// Run-level refusal
// ---------------------------------------------------------------------------

/// Conditions under which no registry is proposed at all.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileError {
    /// The run would remove more than the allowed fraction of entries.
    DestructiveRemoval {
        removed: usize,
        existing: usize,
        max_ratio: f64,
    },
    /// Too few candidates were seen to trust deletion-by-absence.
    BelowMinimumCandidates { encountered: usize, minimum: usize },
    /// The existing registry breaks its own invariants.
    CorruptRegistry(String),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::DestructiveRemoval {
                removed,
                existing,
                max_ratio,
            } => write!(
                f,
                "refusing to remove {removed} of {existing} registry entries (limit {:.0}%); pass --allow-mass-removal to override",
                max_ratio * 100.0
            ),
            ReconcileError::BelowMinimumCandidates {
                encountered,
                minimum,
            } => write!(
                f,
                "only {encountered} candidate(s) found, at least {minimum} required against a non-empty registry; pass --allow-mass-removal to override"
            ),
            ReconcileError::CorruptRegistry(msg) => write!(f, "existing registry is corrupt: {msg}"),
        }
    }
}

impl std::error::Error for ReconcileError {}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Proposed next registry. Nothing has been written.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub registry: Registry,
    pub changes: ChangeSet,
    /// Sorted by source.
    pub violations: Vec<Violation>,
}

impl ReconcileOutcome {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Write only on change, and under `strict` only without violations.
    pub fn should_write(&self, strict: bool) -> bool {
        !self.changes.is_empty() && !(strict && !self.is_clean())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            version: self.registry.version.to_string(),
            assets: self.registry.assets.len(),
            added: self.changes.added.len(),
            updated: self.changes.updated.len(),
            removed: self.changes.removed.len(),
            violations: self.violations.len(),
        }
    }
}

/// Count-and-result line reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub version: String,
    pub assets: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub violations: usize,
}
