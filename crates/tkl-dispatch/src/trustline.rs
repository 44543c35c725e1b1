//! Trustline hook: make the configured account trust every admitted classic
//! asset.
//!
//! Building and signing the change-trust transaction is not done here; a
//! [`TrustlineSubmitter`] does it. Submissions are retried with a
//! [`RetryPolicy`], bidding `base_fee * 2^(attempt-1)` per attempt.

use crate::{AdmissionHook, HookError};
use std::fmt;
use std::sync::Arc;
use tkl_network::{HorizonClient, NetworkError, RetryPolicy};
use tkl_schemas::AssetRecord;
use tracing::{debug, info};

#[async_trait::async_trait]
pub trait TrustlineSubmitter: Send + Sync {
    async fn has_trustline(&self, code: &str, issuer: &str) -> Result<bool, NetworkError>;

    async fn submit_change_trust(
        &self,
        code: &str,
        issuer: &str,
        fee: u32,
    ) -> Result<(), NetworkError>;
}

pub struct TrustlineHook {
    submitter: Arc<dyn TrustlineSubmitter>,
    retry: RetryPolicy,
}

impl TrustlineHook {
    pub fn new(submitter: Arc<dyn TrustlineSubmitter>, retry: RetryPolicy) -> Self {
        Self { submitter, retry }
    }
}

#[async_trait::async_trait]
impl AdmissionHook for TrustlineHook {
    fn name(&self) -> &'static str {
        "trustline"
    }

    async fn on_admitted(&self, record: &AssetRecord) -> Result<(), HookError> {
        let Some((code, issuer)) = record.classic_identity() else {
            return Err(HookError::Skipped("no code/issuer".to_string()));
        };

        let exists = self
            .submitter
            .has_trustline(code, issuer)
            .await
            .map_err(|e| HookError::Failed(format!("trustline lookup for {code}:{issuer}: {e}")))?;
        if exists {
            debug!(code, issuer, "trustline already present");
            return Ok(());
        }

        let submitter = &self.submitter;
        let attempts = self
            .retry
            .run(|attempt| async move {
                debug!(code, issuer, attempt = attempt.number, fee = attempt.fee, "submitting change-trust");
                submitter.submit_change_trust(code, issuer, attempt.fee).await?;
                Ok::<u32, NetworkError>(attempt.number)
            })
            .await
            .map_err(|e| HookError::Failed(format!("change-trust {code}:{issuer}: {e}")))?;

        info!(code, issuer, attempts, "trustline established");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CommandTrustlines
// ---------------------------------------------------------------------------

/// Looks trustlines up on Horizon and submits change-trust by running an
/// external command. `{code}`, `{issuer}` and `{fee}` in the arguments are
/// substituted per attempt; the signer secret is passed to the child in its
/// environment under `secret_env`.
pub struct CommandTrustlines {
    horizon: HorizonClient,
    account: String,
    command: Vec<String>,
    secret_env: String,
    secret: String,
}

impl fmt::Debug for CommandTrustlines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTrustlines")
            .field("account", &self.account)
            .field("command", &self.command)
            .field("secret_env", &self.secret_env)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

impl CommandTrustlines {
    pub fn new(
        horizon: HorizonClient,
        account: impl Into<String>,
        command: Vec<String>,
        secret_env: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, NetworkError> {
        if command.is_empty() {
            return Err(NetworkError::Config("trustline command is empty".to_string()));
        }
        Ok(Self {
            horizon,
            account: account.into(),
            command,
            secret_env: secret_env.into(),
            secret: secret.into(),
        })
    }

    fn args_for(&self, code: &str, issuer: &str, fee: u32) -> Vec<String> {
        let fee = fee.to_string();
        self.command[1..]
            .iter()
            .map(|a| {
                a.replace("{code}", code)
                    .replace("{issuer}", issuer)
                    .replace("{fee}", &fee)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl TrustlineSubmitter for CommandTrustlines {
    async fn has_trustline(&self, code: &str, issuer: &str) -> Result<bool, NetworkError> {
        self.horizon.has_trustline(&self.account, code, issuer).await
    }

    async fn submit_change_trust(
        &self,
        code: &str,
        issuer: &str,
        fee: u32,
    ) -> Result<(), NetworkError> {
        let program = &self.command[0];
        let output = tokio::process::Command::new(program)
            .args(self.args_for(code, issuer, fee))
            .env(&self.secret_env, &self.secret)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NetworkError::Transport(format!("spawn {program}: {e}")))?;

        if !output.status.success() {
            return Err(NetworkError::Transport(format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
