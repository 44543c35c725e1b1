//! Runtime secret resolution.
//!
//! Config stores only env var NAMES (e.g. `dispatch.signer_key_env`). Callers
//! resolve them once at startup and pass [`ResolvedSecrets`] into
//! constructors. Debug output redacts values; errors name the variable, never
//! its value.

use crate::PipelineConfig;
use anyhow::{bail, Result};

#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Secret seed of the account that holds registry trustlines.
    /// `None` if the named env var was absent or blank.
    pub trustline_signer: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "trustline_signer",
                &self.trustline_signer.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Unset or blank counts as absent.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve secrets named by `cfg`. With `require_signer`, a missing signer
/// is an error that names the env var.
pub fn resolve_secrets(cfg: &PipelineConfig, require_signer: bool) -> Result<ResolvedSecrets> {
    let var = cfg.dispatch.signer_key_env.trim();
    let trustline_signer = resolve_env(var);

    if require_signer && trustline_signer.is_none() {
        bail!("SECRETS_MISSING: required env var '{}' (trustline signer) is not set or empty", var);
    }

    Ok(ResolvedSecrets { trustline_signer })
}
