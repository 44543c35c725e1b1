//! tkl-schemas
//!
//! Shared data model for the asset registry: the per-asset descriptor
//! ([`AssetRecord`]), the canonical document ([`Registry`]), its three-part
//! [`RegistryVersion`], and the per-run [`ChangeSet`].
//!
//! Also owns the closed-schema validator for candidate descriptors
//! (see [`validate`]). Pure data + pure functions. No IO.

pub mod validate;

pub use validate::{parse_candidate, validate_asset, SchemaViolation, Validation};

use serde::de;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// AssetRecord
// ---------------------------------------------------------------------------

/// One asset's descriptive and identifying metadata.
///
/// The field set is closed: unknown fields are rejected on deserialization.
/// `name` and `org` are required for candidates (enforced by [`validate`]);
/// they default to empty only so that legacy registry entries still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub org: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl AssetRecord {
    /// The reconciliation key, when declared.
    pub fn contract_id(&self) -> Option<&str> {
        self.contract.as_deref()
    }

    /// `code` + `issuer` pair, when both are present.
    pub fn classic_identity(&self) -> Option<(&str, &str)> {
        match (self.code.as_deref(), self.issuer.as_deref()) {
            (Some(code), Some(issuer)) => Some((code, issuer)),
            _ => None,
        }
    }

    /// Names of every field whose value differs between `self` and `other`.
    ///
    /// Absent and present-with-a-value are different. Order follows the
    /// declared field order so diffs are stable across runs.
    pub fn changed_fields(&self, other: &AssetRecord) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.name != other.name {
            out.push("name");
        }
        if self.contract != other.contract {
            out.push("contract");
        }
        if self.code != other.code {
            out.push("code");
        }
        if self.issuer != other.issuer {
            out.push("issuer");
        }
        if self.org != other.org {
            out.push("org");
        }
        if self.domain != other.domain {
            out.push("domain");
        }
        if self.icon != other.icon {
            out.push("icon");
        }
        if self.decimals != other.decimals {
            out.push("decimals");
        }
        if self.comment != other.comment {
            out.push("comment");
        }
        out
    }
}

// ---------------------------------------------------------------------------
// RegistryVersion
// ---------------------------------------------------------------------------

/// Highest permitted major component.
pub const MAX_MAJOR: u16 = 999;
/// Highest permitted minor / patch component.
pub const MAX_MINOR_PATCH: u8 = 9;

/// Three-component registry version, serialized as `"MAJOR.MINOR.PATCH"`.
///
/// Bounds: `major <= 999`, `minor <= 9`, `patch <= 9`. Parsing rejects
/// anything outside these bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistryVersion {
    pub major: u16,
    pub minor: u8,
    pub patch: u8,
}

impl RegistryVersion {
    pub const fn new(major: u16, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn is_within_bounds(&self) -> bool {
        self.major <= MAX_MAJOR && self.minor <= MAX_MINOR_PATCH && self.patch <= MAX_MINOR_PATCH
    }
}

impl fmt::Display for RegistryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error parsing a [`RegistryVersion`] string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionParseError {
    pub input: String,
    pub reason: &'static str,
}

impl fmt::Display for VersionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid registry version '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for VersionParseError {}

impl FromStr for RegistryVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| VersionParseError {
            input: s.to_string(),
            reason,
        };

        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(err("expected MAJOR.MINOR.PATCH"));
        }
        let major: u16 = parts[0].parse().map_err(|_| err("major is not a number"))?;
        let minor: u8 = parts[1].parse().map_err(|_| err("minor is not a number"))?;
        let patch: u8 = parts[2].parse().map_err(|_| err("patch is not a number"))?;

        let v = RegistryVersion::new(major, minor, patch);
        if !v.is_within_bounds() {
            return Err(err("component out of bounds (major<=999, minor<=9, patch<=9)"));
        }
        Ok(v)
    }
}

impl Serialize for RegistryVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RegistryVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The canonical registry document.
///
/// `metadata` carries every top-level field other than `version` and
/// `assets` (name, timestamp, network, logoURI, ...) in document order.
/// Reconciliation never touches it.
///
/// A rewrite keeps the top-level keys where the loaded document had them,
/// so an unchanged header stays byte-identical. Keys without a recorded slot
/// (new metadata, or a registry built in code) follow, then `version`, then
/// `assets`.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub metadata: Map<String, Value>,
    pub version: RegistryVersion,
    pub assets: Vec<AssetRecord>,
    /// Top-level key order of the source document. Layout only; ignored by
    /// equality.
    pub key_order: Vec<String>,
}

impl PartialEq for Registry {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata
            && self.version == other.version
            && self.assets == other.assets
    }
}

const VERSION_KEY: &str = "version";
const ASSETS_KEY: &str = "assets";

impl Serialize for Registry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metadata.len() + 2))?;
        let mut written: BTreeSet<&str> = BTreeSet::new();

        for key in &self.key_order {
            match key.as_str() {
                VERSION_KEY => map.serialize_entry(VERSION_KEY, &self.version)?,
                ASSETS_KEY => map.serialize_entry(ASSETS_KEY, &self.assets)?,
                other => match self.metadata.get(other) {
                    Some(v) => map.serialize_entry(other, v)?,
                    None => continue,
                },
            }
            written.insert(key.as_str());
        }

        for (k, v) in &self.metadata {
            if !written.contains(k.as_str()) {
                map.serialize_entry(k, v)?;
            }
        }
        if !written.contains(VERSION_KEY) {
            map.serialize_entry(VERSION_KEY, &self.version)?;
        }
        if !written.contains(ASSETS_KEY) {
            map.serialize_entry(ASSETS_KEY, &self.assets)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Registry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = Map::<String, Value>::deserialize(deserializer)?;
        let key_order: Vec<String> = doc.keys().cloned().collect();

        let mut metadata = Map::new();
        let mut version = None;
        let mut assets = Vec::new();
        for (k, v) in doc {
            match k.as_str() {
                VERSION_KEY => {
                    version = Some(serde_json::from_value(v).map_err(<D::Error as de::Error>::custom)?)
                }
                ASSETS_KEY => {
                    assets = serde_json::from_value(v).map_err(<D::Error as de::Error>::custom)?
                }
                _ => {
                    metadata.insert(k, v);
                }
            }
        }

        Ok(Self {
            metadata,
            version: version.ok_or_else(|| <D::Error as de::Error>::missing_field(VERSION_KEY))?,
            assets,
            key_order,
        })
    }
}

impl Registry {
    pub fn empty(metadata: Map<String, Value>) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    /// Contract ids that appear more than once, sorted.
    pub fn duplicate_contracts(&self) -> Vec<String> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut dups: BTreeSet<String> = BTreeSet::new();
        for a in &self.assets {
            if let Some(c) = a.contract_id() {
                if !seen.insert(c) {
                    dups.insert(c.to_string());
                }
            }
        }
        dups.into_iter().collect()
    }

    pub fn find(&self, contract: &str) -> Option<&AssetRecord> {
        self.assets
            .iter()
            .find(|a| a.contract_id() == Some(contract))
    }
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// Result of one reconciliation pass. Disjoint `added` / `updated` / `removed`
/// contract ids. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub added: BTreeSet<String>,
    /// contract id -> names of the fields that changed.
    pub updated: BTreeMap<String, Vec<String>>,
    pub removed: BTreeSet<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Contract ids that were admitted this pass (added or updated), sorted.
    pub fn admitted(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .added
            .iter()
            .chain(self.updated.keys())
            .map(|s| s.as_str())
            .collect();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(contract: &str, decimals: u8) -> AssetRecord {
        AssetRecord {
            name: "Foo Token".to_string(),
            org: "Org One".to_string(),
            contract: Some(contract.to_string()),
            decimals: Some(decimals),
            ..Default::default()
        }
    }

    #[test]
    fn version_parse_and_display() {
        let v: RegistryVersion = "1.2.3".parse().unwrap();
        assert_eq!(v, RegistryVersion::new(1, 2, 3));
        assert_eq!(v.to_string(), "1.2.3");
    }

    #[test]
    fn version_parse_rejects_out_of_bounds() {
        assert!("1.10.0".parse::<RegistryVersion>().is_err());
        assert!("1000.0.0".parse::<RegistryVersion>().is_err());
        assert!("1.0".parse::<RegistryVersion>().is_err());
        assert!("a.b.c".parse::<RegistryVersion>().is_err());
    }

    #[test]
    fn changed_fields_reports_only_differences() {
        let a = rec("CAAA", 7);
        let b = rec("CAAA", 9);
        assert_eq!(a.changed_fields(&b), vec!["decimals"]);
        assert!(a.changed_fields(&a.clone()).is_empty());
    }

    #[test]
    fn absent_and_present_fields_differ() {
        let a = rec("CAAA", 7);
        let mut b = a.clone();
        b.comment = Some("now with a comment".to_string());
        assert_eq!(a.changed_fields(&b), vec!["comment"]);
    }

    #[test]
    fn registry_keeps_metadata_through_round_trip() {
        let raw = r#"{
            "name": "Soroswap",
            "network": "mainnet",
            "version": "0.1.9",
            "assets": [{"name": "Foo Token", "org": "Org One", "contract": "CAAA", "decimals": 7}]
        }"#;
        let reg: Registry = serde_json::from_str(raw).unwrap();
        assert_eq!(reg.version, RegistryVersion::new(0, 1, 9));
        assert_eq!(reg.metadata.get("name"), Some(&Value::from("Soroswap")));
        assert_eq!(reg.assets.len(), 1);

        let back = serde_json::to_value(&reg).unwrap();
        assert_eq!(back["network"], "mainnet");
        assert_eq!(back["version"], "0.1.9");
    }

    #[test]
    fn rewrite_keeps_top_level_key_order() {
        let raw = r#"{"name":"Soroswap","version":"0.1.9","network":"mainnet","assets":[],"logoURI":"https://x.example/l.png","keywords":["dex"]}"#;
        let mut reg: Registry = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_string(&reg).unwrap(), raw);

        reg.version = RegistryVersion::new(0, 2, 0);
        reg.metadata
            .insert("timestamp".to_string(), Value::from("2024-01-01T00:00:00Z"));
        assert_eq!(
            serde_json::to_string(&reg).unwrap(),
            r#"{"name":"Soroswap","version":"0.2.0","network":"mainnet","assets":[],"logoURI":"https://x.example/l.png","keywords":["dex"],"timestamp":"2024-01-01T00:00:00Z"}"#
        );
    }

    #[test]
    fn built_registry_puts_metadata_first() {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::from("Fresh"));
        metadata.insert("network".to_string(), Value::from("testnet"));
        let reg = Registry::empty(metadata);
        assert_eq!(
            serde_json::to_string(&reg).unwrap(),
            r#"{"name":"Fresh","network":"testnet","version":"0.0.0","assets":[]}"#
        );
        assert!(serde_json::from_str::<Registry>(r#"{"assets":[]}"#).is_err());
    }

    #[test]
    fn registry_rejects_unknown_asset_fields() {
        let raw = r#"{"version": "0.0.1", "assets": [{"name": "Foo Token", "org": "Org One", "contract": "CAAA", "extra": 1}]}"#;
        assert!(serde_json::from_str::<Registry>(raw).is_err());
    }

    #[test]
    fn duplicate_contracts_detected() {
        let reg = Registry {
            assets: vec![rec("CAAA", 7), rec("CBBB", 7), rec("CAAA", 9)],
            ..Default::default()
        };
        assert_eq!(reg.duplicate_contracts(), vec!["CAAA".to_string()]);
    }

    #[test]
    fn change_set_admitted_is_sorted_union() {
        let mut cs = ChangeSet::default();
        cs.added.insert("CBBB".to_string());
        cs.updated.insert("CAAA".to_string(), vec!["decimals".to_string()]);
        cs.removed.insert("CCCC".to_string());
        assert_eq!(cs.admitted(), vec!["CAAA", "CBBB"]);
        assert_eq!(cs.len(), 3);
        assert!(!cs.is_empty());
    }
}
