//! tkl-verify
//!
//! Identity verification of schema-valid asset records against the network.
//!
//! Checks (all run, every failure is collected):
//! - domain authority: the issuer's published home domain equals `domain`
//! - derivation: `contract`, when declared, equals the id derived from
//!   `code` + `issuer` on the configured network
//! - existence: the network knows at least one `code:issuer` asset
//! - icon: a URL icon answers with an `image/*` content type
//!
//! The first three need an `issuer`; contract-only records only get the icon
//! check. A failed network call is a violation, never a pass. Nothing here
//! retries; that belongs to the [`NetworkClient`] implementation.

use futures_util::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use tkl_network::{NetworkClient, NetworkError};
use tkl_schemas::validate::is_content_id;
use tkl_schemas::AssetRecord;
use tracing::debug;

const IMAGE_PREFIX: &str = "image/";

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// Which check a network failure interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Check {
    Domain,
    Derivation,
    Existence,
    Icon,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Check::Domain => "domain",
            Check::Derivation => "derivation",
            Check::Existence => "existence",
            Check::Icon => "icon",
        };
        f.write_str(s)
    }
}

/// One failed identity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityViolation {
    DomainMismatch {
        published: Option<String>,
        declared: Option<String>,
    },
    ContractMismatch {
        derived: String,
        declared: String,
    },
    AssetNotFound {
        code: String,
        issuer: String,
    },
    /// `issuer` is present but `code` is not, so nothing can be derived.
    MissingCode {
        issuer: String,
    },
    /// `code` + `issuer` pass the schema patterns but do not decode to an
    /// asset identity (e.g. the issuer strkey checksum is wrong).
    InvalidIdentity {
        code: String,
        issuer: String,
        reason: String,
    },
    IconUnreachable {
        url: String,
        error: NetworkError,
    },
    IconNotImage {
        url: String,
        content_type: String,
    },
    /// The collaborator failed; the check is counted as failed.
    Network {
        check: Check,
        error: NetworkError,
    },
}

fn opt(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("<none>")
}

impl fmt::Display for IdentityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityViolation::DomainMismatch {
                published,
                declared,
            } => write!(
                f,
                "domain mismatch: issuer publishes '{}', record declares '{}'",
                opt(published),
                opt(declared)
            ),
            IdentityViolation::ContractMismatch { derived, declared } => write!(
                f,
                "contract mismatch: derived '{derived}', record declares '{declared}'"
            ),
            IdentityViolation::AssetNotFound { code, issuer } => {
                write!(f, "asset {code}:{issuer} does not exist on the network")
            }
            IdentityViolation::MissingCode { issuer } => {
                write!(f, "issuer '{issuer}' given without an asset code")
            }
            IdentityViolation::InvalidIdentity {
                code,
                issuer,
                reason,
            } => write!(f, "invalid asset identity {code}:{issuer}: {reason}"),
            IdentityViolation::IconUnreachable { url, error } => {
                write!(f, "icon '{url}' unreachable: {error}")
            }
            IdentityViolation::IconNotImage { url, content_type } => write!(
                f,
                "icon '{url}' has content-type '{content_type}', expected {IMAGE_PREFIX}*"
            ),
            IdentityViolation::Network { check, error } => {
                write!(f, "{check} check failed: {error}")
            }
        }
    }
}

impl std::error::Error for IdentityViolation {}

/// Outcome of verifying one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    /// Declared contract, or the derived one when none was declared.
    pub contract: Option<String>,
    pub violations: Vec<IdentityViolation>,
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        self.violations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

pub struct IdentityVerifier {
    client: Arc<dyn NetworkClient>,
    network_passphrase: String,
    check_icons: bool,
}

impl IdentityVerifier {
    pub fn new(client: Arc<dyn NetworkClient>, network_passphrase: impl Into<String>) -> Self {
        Self {
            client,
            network_passphrase: network_passphrase.into(),
            check_icons: true,
        }
    }

    pub fn with_icon_checks(mut self, enabled: bool) -> Self {
        self.check_icons = enabled;
        self
    }

    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    /// Run every applicable check against `record`.
    pub async fn verify(&self, record: &AssetRecord) -> Verification {
        let mut out = Verification {
            contract: record.contract.clone(),
            violations: Vec::new(),
        };

        let classic = async {
            match (record.code.as_deref(), record.issuer.as_deref()) {
                (Some(code), Some(issuer)) => self.verify_classic(record, code, issuer).await,
                (None, Some(issuer)) => (
                    None,
                    vec![IdentityViolation::MissingCode {
                        issuer: issuer.to_string(),
                    }],
                ),
                _ => (None, Vec::new()),
            }
        };
        let icon = self.verify_icon(record);

        let ((derived, classic_violations), icon_violation) = futures_util::join!(classic, icon);

        if out.contract.is_none() {
            out.contract = derived;
        }
        out.violations.extend(classic_violations);
        out.violations.extend(icon_violation);

        for v in &out.violations {
            debug!(contract = ?out.contract, violation = %v, "identity check failed");
        }
        out
    }

    /// Verify many records with at most `max_concurrency` in flight.
    ///
    /// Results come back sorted by key, independent of completion order.
    pub async fn verify_batch<K>(
        &self,
        records: Vec<(K, AssetRecord)>,
        max_concurrency: usize,
    ) -> Vec<(K, AssetRecord, Verification)>
    where
        K: Ord,
    {
        let mut results: Vec<(K, AssetRecord, Verification)> = stream::iter(records)
            .map(|(key, record)| async move {
                let v = self.verify(&record).await;
                (key, record, v)
            })
            .buffer_unordered(max_concurrency.max(1))
            .collect()
            .await;
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    async fn verify_classic(
        &self,
        record: &AssetRecord,
        code: &str,
        issuer: &str,
    ) -> (Option<String>, Vec<IdentityViolation>) {
        let mut violations = Vec::new();

        let (domain, exists) = futures_util::join!(
            self.client.home_domain(issuer),
            self.client.asset_exists(code, issuer)
        );

        // domain authority
        match domain {
            Ok(published) if published == record.domain => {}
            Ok(published) => violations.push(IdentityViolation::DomainMismatch {
                published,
                declared: record.domain.clone(),
            }),
            Err(error) => violations.push(IdentityViolation::Network {
                check: Check::Domain,
                error,
            }),
        }

        // deterministic derivation
        let derived = match self
            .client
            .derive_contract_id(code, issuer, &self.network_passphrase)
        {
            Ok(derived) => {
                if let Some(declared) = record.contract.as_deref() {
                    if declared != derived {
                        violations.push(IdentityViolation::ContractMismatch {
                            derived: derived.clone(),
                            declared: declared.to_string(),
                        });
                    }
                }
                Some(derived)
            }
            Err(NetworkError::Config(reason)) => {
                violations.push(IdentityViolation::InvalidIdentity {
                    code: code.to_string(),
                    issuer: issuer.to_string(),
                    reason,
                });
                None
            }
            Err(error) => {
                violations.push(IdentityViolation::Network {
                    check: Check::Derivation,
                    error,
                });
                None
            }
        };

        // existence
        match exists {
            Ok(true) => {}
            Ok(false) => violations.push(IdentityViolation::AssetNotFound {
                code: code.to_string(),
                issuer: issuer.to_string(),
            }),
            Err(error) => violations.push(IdentityViolation::Network {
                check: Check::Existence,
                error,
            }),
        }

        (derived, violations)
    }

    async fn verify_icon(&self, record: &AssetRecord) -> Option<IdentityViolation> {
        if !self.check_icons {
            return None;
        }
        let url = record.icon.as_deref()?;
        if is_content_id(url) {
            return None;
        }
        match self.client.fetch_content_type(url).await {
            Ok(ct) if ct.trim_start().to_ascii_lowercase().starts_with(IMAGE_PREFIX) => None,
            Ok(content_type) => Some(IdentityViolation::IconNotImage {
                url: url.to_string(),
                content_type,
            }),
            Err(error) => Some(IdentityViolation::IconUnreachable {
                url: url.to_string(),
                error,
            }),
        }
    }
}
