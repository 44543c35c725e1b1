//! tkl-reconcile
//!
//! Reconciles a directory of per-asset candidates against the existing
//! registry and produces the next registry document plus its change set.
//!
//! - planning (`plan`) is pure: validate, key, classify, track encountered
//! - the engine (`engine`) adds the removal guard and identity verification
//! - `canonical` and `version` produce the deterministic output form
//!
//! Nothing here writes. The caller persists [`ReconcileOutcome::registry`]
//! only when [`ReconcileOutcome::should_write`] says so.

mod canonical;
mod engine;
mod plan;
mod types;
mod version;

pub use canonical::{canonicalize, is_canonical};
pub use engine::{ReconcileConfig, ReconciliationEngine};
pub use plan::{plan, Plan, PlannedChange, PlannedKind};
pub use types::*;
pub use version::{bump, next_version};
