//! Test doubles and fixture builders shared by the workspace's tests.
//!
//! Nothing here touches the network or the filesystem. [`FakeNetwork`] is a
//! deterministic in-memory [`NetworkClient`]; [`RecordingHook`] captures
//! admitted records; the builders produce schema-valid records with real
//! strkey-encoded identifiers.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tkl_dispatch::{AdmissionHook, HookError};
use tkl_network::{asset_contract_id, NetworkClient, NetworkError, PUBLIC_NETWORK_PASSPHRASE};
use tkl_schemas::AssetRecord;

// ---------------------------------------------------------------------------
// Fixture builders
// ---------------------------------------------------------------------------

/// A valid ed25519 account id (`G...`) derived from a single repeated byte.
pub fn issuer(seed: u8) -> String {
    stellar_strkey::ed25519::PublicKey([seed; 32]).to_string()
}

/// A valid contract id (`C...`) derived from a single repeated byte.
pub fn contract(seed: u8) -> String {
    stellar_strkey::Contract([seed; 32]).to_string()
}

/// Mainnet contract id of `code:issuer`.
pub fn derived_contract(code: &str, issuer: &str) -> String {
    match asset_contract_id(code, issuer, PUBLIC_NETWORK_PASSPHRASE) {
        Ok(id) => id,
        Err(e) => panic!("fixture derivation failed for {code}:{issuer}: {e}"),
    }
}

/// Contract-only record. Passes schema validation.
pub fn contract_record(contract: &str, name: &str, decimals: u8) -> AssetRecord {
    AssetRecord {
        name: name.to_string(),
        org: "Test Org".to_string(),
        contract: Some(contract.to_string()),
        decimals: Some(decimals),
        ..Default::default()
    }
}

/// Classic record with `code`, `issuer`, `domain` and the matching mainnet
/// `contract` filled in.
pub fn classic_record(code: &str, issuer: &str, domain: &str) -> AssetRecord {
    AssetRecord {
        name: format!("{code} Token"),
        org: "Test Org".to_string(),
        contract: Some(derived_contract(code, issuer)),
        code: Some(code.to_string()),
        issuer: Some(issuer.to_string()),
        domain: Some(domain.to_string()),
        decimals: Some(7),
        ..Default::default()
    }
}

/// JSON form of `record`, as it would appear in a source file.
pub fn to_json(record: &AssetRecord) -> Value {
    match serde_json::to_value(record) {
        Ok(v) => v,
        Err(e) => panic!("record serialization failed: {e}"),
    }
}

// ---------------------------------------------------------------------------
// FakeNetwork
// ---------------------------------------------------------------------------

#[derive(Default)]
struct NetworkState {
    home_domains: BTreeMap<String, String>,
    assets: BTreeSet<(String, String)>,
    content_types: BTreeMap<String, String>,
    /// Keys (account id, `code:issuer`, or url) whose lookups fail.
    failing: BTreeMap<String, NetworkError>,
    calls: Vec<String>,
}

/// Deterministic in-memory network. Unknown accounts have no home domain,
/// unknown assets do not exist, unknown urls are unreachable (404).
#[derive(Default)]
pub struct FakeNetwork {
    state: Mutex<NetworkState>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(self, f: impl FnOnce(&mut NetworkState)) -> Self {
        if let Ok(mut s) = self.state.lock() {
            f(&mut s);
        }
        self
    }

    pub fn with_home_domain(self, account_id: &str, domain: &str) -> Self {
        self.with_state(|s| {
            s.home_domains
                .insert(account_id.to_string(), domain.to_string());
        })
    }

    pub fn with_asset(self, code: &str, issuer: &str) -> Self {
        self.with_state(|s| {
            s.assets.insert((code.to_string(), issuer.to_string()));
        })
    }

    pub fn with_content_type(self, url: &str, content_type: &str) -> Self {
        self.with_state(|s| {
            s.content_types
                .insert(url.to_string(), content_type.to_string());
        })
    }

    /// Make every lookup keyed by `key` fail with `error`.
    pub fn failing(self, key: &str, error: NetworkError) -> Self {
        self.with_state(|s| {
            s.failing.insert(key.to_string(), error);
        })
    }

    /// Register a fully consistent classic asset: home domain, existence.
    pub fn with_classic(self, record: &AssetRecord) -> Self {
        let (code, issuer) = match record.classic_identity() {
            Some(pair) => pair,
            None => return self,
        };
        let (code, issuer) = (code.to_string(), issuer.to_string());
        let domain = record.domain.clone();
        self.with_state(|s| {
            if let Some(d) = domain {
                s.home_domains.insert(issuer.clone(), d);
            }
            s.assets.insert((code, issuer));
        })
    }

    /// Every call made so far, as `"<method> <key>"`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    fn record_call(&self, method: &str, key: &str) -> Result<(), NetworkError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| NetworkError::Transport("fake network poisoned".to_string()))?;
        s.calls.push(format!("{method} {key}"));
        match s.failing.get(key) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl NetworkClient for FakeNetwork {
    async fn home_domain(&self, account_id: &str) -> Result<Option<String>, NetworkError> {
        self.record_call("home_domain", account_id)?;
        Ok(self
            .state
            .lock()
            .ok()
            .and_then(|s| s.home_domains.get(account_id).cloned()))
    }

    async fn asset_exists(&self, code: &str, issuer: &str) -> Result<bool, NetworkError> {
        self.record_call("asset_exists", &format!("{code}:{issuer}"))?;
        Ok(self
            .state
            .lock()
            .map(|s| s.assets.contains(&(code.to_string(), issuer.to_string())))
            .unwrap_or(false))
    }

    async fn fetch_content_type(&self, url: &str) -> Result<String, NetworkError> {
        self.record_call("fetch_content_type", url)?;
        self.state
            .lock()
            .ok()
            .and_then(|s| s.content_types.get(url).cloned())
            .ok_or(NetworkError::Api {
                status: 404,
                message: "Not Found".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// RecordingHook
// ---------------------------------------------------------------------------

/// Admission hook that remembers every record it was handed.
#[derive(Default)]
pub struct RecordingHook {
    seen: Mutex<Vec<AssetRecord>>,
    fail: bool,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook that records, then reports failure.
    pub fn failing() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Contract ids seen so far, sorted.
    pub fn seen_contracts(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .seen
            .lock()
            .map(|v| v.iter().filter_map(|r| r.contract.clone()).collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    pub fn count(&self) -> usize {
        self.seen.lock().map(|v| v.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl AdmissionHook for RecordingHook {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn on_admitted(&self, record: &AssetRecord) -> Result<(), HookError> {
        if let Ok(mut v) = self.seen.lock() {
            v.push(record.clone());
        }
        if self.fail {
            return Err(HookError::Failed("recording hook told to fail".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tkl_schemas::validate_asset;

    #[test]
    fn builders_produce_schema_valid_records() {
        let c = contract_record(&contract(1), "Foo Token", 7);
        assert!(validate_asset(&to_json(&c)).is_valid());

        let k = classic_record("USDC", &issuer(2), "centre.io");
        assert!(validate_asset(&to_json(&k)).is_valid());
        assert!(k.contract.as_deref().is_some_and(|c| c.starts_with('C')));
    }

    #[tokio::test]
    async fn fake_network_answers_from_registered_state() {
        let iss = issuer(3);
        let net = FakeNetwork::new()
            .with_home_domain(&iss, "example.com")
            .with_asset("ABC", &iss)
            .with_content_type("https://example.com/i.png", "image/png");

        assert_eq!(
            net.home_domain(&iss).await.unwrap().as_deref(),
            Some("example.com")
        );
        assert_eq!(net.home_domain(&issuer(4)).await.unwrap(), None);
        assert!(net.asset_exists("ABC", &iss).await.unwrap());
        assert!(!net.asset_exists("XYZ", &iss).await.unwrap());
        assert!(net.fetch_content_type("https://nowhere/x.png").await.is_err());
        assert_eq!(net.calls().len(), 5);
    }

    #[tokio::test]
    async fn injected_failure_surfaces() {
        let iss = issuer(5);
        let net = FakeNetwork::new().failing(&iss, NetworkError::Transport("timeout".into()));
        assert_eq!(
            net.home_domain(&iss).await.unwrap_err(),
            NetworkError::Transport("timeout".into())
        );
    }
}
