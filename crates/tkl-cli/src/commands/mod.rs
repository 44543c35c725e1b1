//! Command handler modules for tkl-cli.
//!
//! Config loading and collaborator construction shared by every command live
//! here. Command-specific logic lives in the submodules.

pub mod pipeline;
pub mod registry;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tkl_config::{report_unused_keys, LoadedConfig, PipelineConfig, UnusedKeyPolicy};
use tkl_network::{HorizonClient, RetryPolicy};
use tkl_verify::IdentityVerifier;

/// Everything a command needs, resolved once at startup.
pub struct Context {
    pub loaded: LoadedConfig,
    pub cfg: PipelineConfig,
    pub registry_path: PathBuf,
    pub assets_dir: PathBuf,
}

impl Context {
    pub fn load(
        config_paths: &[String],
        registry: Option<PathBuf>,
        assets_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
        let loaded = if path_refs.is_empty() {
            tkl_config::load_layered_yaml_from_strings(&[])?
        } else {
            tkl_config::load_layered_yaml(&path_refs)?
        };

        let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
        if !report.is_clean() {
            eprintln!(
                "WARN: CONFIG_UNUSED_KEYS unused_leaf_keys={}",
                report.unused_leaf_pointers.len()
            );
            for p in report.unused_leaf_pointers.iter().take(50) {
                eprintln!("  unused={}", p);
            }
        }

        let cfg = loaded.pipeline()?;
        let registry_path = registry.unwrap_or_else(|| PathBuf::from(&cfg.registry.path));
        let assets_dir = assets_dir.unwrap_or_else(|| PathBuf::from(&cfg.registry.assets_dir));

        Ok(Self {
            loaded,
            cfg,
            registry_path,
            assets_dir,
        })
    }

    pub fn horizon(&self) -> Result<HorizonClient> {
        let net = &self.cfg.network;
        let client = HorizonClient::new(&net.horizon_url, net.request_timeout())?.with_retry(
            RetryPolicy {
                max_attempts: net.max_attempts,
                base_fee: 0,
                base_delay: net.retry_delay(),
            },
        );
        Ok(client)
    }

    pub fn verifier(&self) -> Result<IdentityVerifier> {
        let verifier = IdentityVerifier::new(Arc::new(self.horizon()?), &self.cfg.network.passphrase)
            .with_icon_checks(self.cfg.verify.check_icons);
        Ok(verifier)
    }
}
