//! tkl-dispatch
//!
//! Best-effort side effects for admitted assets. The pipeline hands the
//! admitted records to a [`Dispatcher`] after the registry is written and
//! does not wait on, or retry for, the hooks. The returned
//! [`DispatchHandle`] lets the process drain in-flight hooks before exit;
//! dropping it aborts them.

pub mod trustline;

pub use trustline::{CommandTrustlines, TrustlineHook, TrustlineSubmitter};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tkl_schemas::AssetRecord;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Hook trait
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// The hook does not apply to this record.
    Skipped(String),
    Failed(String),
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookError::Skipped(msg) => write!(f, "skipped: {msg}"),
            HookError::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

impl std::error::Error for HookError {}

/// External action triggered once per added or updated asset.
#[async_trait::async_trait]
pub trait AdmissionHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_admitted(&self, record: &AssetRecord) -> Result<(), HookError>;
}

/// Logs every admission.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHook;

#[async_trait::async_trait]
impl AdmissionHook for LoggingHook {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn on_admitted(&self, record: &AssetRecord) -> Result<(), HookError> {
        info!(
            contract = record.contract_id().unwrap_or("<none>"),
            name = %record.name,
            code = record.code.as_deref().unwrap_or(""),
            "asset admitted"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Default, Clone)]
pub struct Dispatcher {
    hooks: Vec<Arc<dyn AdmissionHook>>,
}

struct HookOutcome {
    hook: &'static str,
    contract: String,
    result: Result<(), HookError>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(mut self, hook: Arc<dyn AdmissionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn hook_names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    /// Spawn every hook for every record and return immediately.
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, records: &[AssetRecord]) -> DispatchHandle {
        let mut tasks = JoinSet::new();
        for record in records {
            for hook in &self.hooks {
                let hook = Arc::clone(hook);
                let record = record.clone();
                tasks.spawn(async move {
                    let result = hook.on_admitted(&record).await;
                    HookOutcome {
                        hook: hook.name(),
                        contract: record.contract.unwrap_or_default(),
                        result,
                    }
                });
            }
        }
        debug!(tasks = tasks.len(), "admission hooks dispatched");
        DispatchHandle { tasks }
    }
}

/// In-flight hook tasks. Dropping the handle aborts them.
pub struct DispatchHandle {
    tasks: JoinSet<HookOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Still running at the deadline; aborted.
    pub abandoned: usize,
}

impl DispatchHandle {
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait up to `timeout` for outstanding hooks, then abort the rest.
    /// Hook failures are logged and counted, never propagated.
    pub async fn drain(mut self, timeout: Duration) -> DrainReport {
        let mut report = DrainReport::default();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(Ok(outcome))) => match outcome.result {
                    Ok(()) => report.succeeded += 1,
                    Err(HookError::Skipped(reason)) => {
                        debug!(hook = outcome.hook, contract = %outcome.contract, %reason, "hook skipped");
                        report.skipped += 1;
                    }
                    Err(HookError::Failed(reason)) => {
                        warn!(hook = outcome.hook, contract = %outcome.contract, %reason, "hook failed");
                        report.failed += 1;
                    }
                },
                Ok(Some(Err(join_err))) => {
                    warn!(error = %join_err, "hook task did not complete");
                    report.failed += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    report.abandoned = self.tasks.len();
                    warn!(abandoned = report.abandoned, "drain timeout; aborting hooks");
                    self.tasks.abort_all();
                    break;
                }
            }
        }
        report
    }
}
