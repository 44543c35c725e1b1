//! Typed pipeline configuration.
//!
//! Every section and every field has a default, so an empty config document
//! yields a working mainnet setup. Values are validated once here; consumers
//! receive a `PipelineConfig` at construction time and never read globals.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";
pub const DEFAULT_HORIZON_URL: &str = "https://horizon.stellar.org";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub network: NetworkSettings,
    pub verify: VerifySettings,
    pub reconcile: ReconcileSettings,
    pub dispatch: DispatchSettings,
    pub registry: RegistrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub passphrase: String,
    pub horizon_url: String,
    pub request_timeout_secs: u64,
    /// Attempts per Horizon request; only transient failures are retried.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            passphrase: DEFAULT_PASSPHRASE.to_string(),
            horizon_url: DEFAULT_HORIZON_URL.to_string(),
            request_timeout_secs: 15,
            max_attempts: 2,
            retry_delay_ms: 250,
        }
    }
}

impl NetworkSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    /// Upper bound on in-flight candidate verifications.
    pub max_concurrency: usize,
    /// Probe icon URLs for an `image/*` content type.
    pub check_icons: bool,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            check_icons: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// A non-empty registry is never reconciled against fewer candidates.
    pub min_candidates: usize,
    /// Largest fraction of existing entries one run may remove.
    pub max_removal_ratio: f64,
    /// Any violation blocks the registry write.
    pub strict: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            min_candidates: 1,
            max_removal_ratio: 0.5,
            strict: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub enabled: bool,
    pub max_attempts: u32,
    /// Fee (stroops) for the first attempt; doubles per retry.
    pub base_fee: u32,
    pub base_delay_ms: u64,
    /// How long the CLI waits for in-flight hooks before exiting.
    pub drain_timeout_secs: u64,
    /// NAME of the env var holding the trustline signer secret.
    pub signer_key_env: String,
    /// Public account (`G...`) that should trust every admitted asset.
    pub trustline_account: Option<String>,
    /// External change-trust command, program first. `{code}`, `{issuer}`
    /// and `{fee}` are substituted per attempt. Empty disables trustlines.
    pub trustline_command: Vec<String>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_fee: 100,
            base_delay_ms: 500,
            drain_timeout_secs: 30,
            signer_key_env: "TKL_TRUSTLINE_SECRET".to_string(),
            trustline_account: None,
            trustline_command: Vec::new(),
        }
    }
}

impl DispatchSettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn trustlines_enabled(&self) -> bool {
        self.enabled && !self.trustline_command.is_empty()
    }
}

/// Default locations, overridable from the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub path: String,
    pub assets_dir: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            path: "tokenList.json".to_string(),
            assets_dir: "assets".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Decode from a merged config document and validate ranges.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: PipelineConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: pipeline config does not match expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.passphrase.trim().is_empty() {
            bail!("CONFIG_INVALID: network.passphrase must not be empty");
        }
        if self.network.horizon_url.trim().is_empty() {
            bail!("CONFIG_INVALID: network.horizon_url must not be empty");
        }
        if self.network.request_timeout_secs == 0 {
            bail!("CONFIG_INVALID: network.request_timeout_secs must be > 0");
        }
        if self.verify.max_concurrency == 0 {
            bail!("CONFIG_INVALID: verify.max_concurrency must be > 0");
        }
        let r = self.reconcile.max_removal_ratio;
        if !(0.0..=1.0).contains(&r) {
            bail!("CONFIG_INVALID: reconcile.max_removal_ratio must be within 0.0..=1.0 (got {r})");
        }
        if self.dispatch.max_attempts == 0 {
            bail!("CONFIG_INVALID: dispatch.max_attempts must be > 0");
        }
        if self.dispatch.signer_key_env.trim().is_empty() {
            bail!("CONFIG_INVALID: dispatch.signer_key_env must name an env var");
        }
        if !self.dispatch.trustline_command.is_empty() && self.dispatch.trustline_account.is_none() {
            bail!("CONFIG_INVALID: dispatch.trustline_command requires dispatch.trustline_account");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = PipelineConfig::from_json(&json!({})).unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.network.passphrase, DEFAULT_PASSPHRASE);
        assert_eq!(cfg.verify.max_concurrency, 4);
        assert!(cfg.reconcile.strict);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = PipelineConfig::from_json(&json!({"verify": {"check_icons": false}})).unwrap();
        assert!(!cfg.verify.check_icons);
        assert_eq!(cfg.verify.max_concurrency, 4);
    }

    #[test]
    fn invalid_ranges_rejected() {
        assert!(PipelineConfig::from_json(&json!({"verify": {"max_concurrency": 0}})).is_err());
        assert!(
            PipelineConfig::from_json(&json!({"reconcile": {"max_removal_ratio": 1.5}})).is_err()
        );
        assert!(PipelineConfig::from_json(&json!({"network": {"passphrase": " "}})).is_err());
    }

    #[test]
    fn trustline_command_needs_account() {
        let err = PipelineConfig::from_json(
            &json!({"dispatch": {"trustline_command": ["stellar", "tx"]}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("trustline_account"));

        let cfg = PipelineConfig::from_json(&json!({"dispatch": {
            "trustline_command": ["stellar", "tx"],
            "trustline_account": "GABC"
        }}))
        .unwrap();
        assert!(cfg.dispatch.trustlines_enabled());
        assert!(!PipelineConfig::default().dispatch.trustlines_enabled());
    }

    #[test]
    fn wrong_shape_rejected() {
        let err = PipelineConfig::from_json(&json!({"verify": {"max_concurrency": "four"}}))
            .unwrap_err();
        assert!(format!("{err:#}").contains("CONFIG_INVALID"));
    }
}
