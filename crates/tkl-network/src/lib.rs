//! tkl-network
//!
//! Boundary to the chain and the open web. The verification core depends only
//! on the [`NetworkClient`] trait; [`HorizonClient`] is the production
//! implementation over Horizon + plain HTTP.
//!
//! Deterministic contract-id derivation lives here too (see [`contract_id`])
//! since it is the network's canonical address function, but it is pure and
//! needs no IO.
//!
//! Any retry of transient failures belongs to this boundary ([`RetryPolicy`]),
//! never to callers.

pub mod contract_id;
pub mod horizon;
pub mod retry;

pub use contract_id::{asset_contract_id, native_contract_id, network_id, ContractIdError};
pub use horizon::HorizonClient;
pub use retry::{Attempt, RetryExhausted, RetryPolicy};

use std::fmt;

/// Passphrase of the Stellar public network.
pub const PUBLIC_NETWORK_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";
/// Passphrase of the Stellar test network.
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`NetworkClient`] implementation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Network or transport failure (timeouts, connection refused, ...).
    Transport(String),
    /// The upstream answered with a non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// The request could not be formed (bad identifier, bad URL, ...).
    Config(String),
}

impl NetworkError {
    /// Transport failures, rate limiting and server errors may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Transport(_) => true,
            NetworkError::Api { status, .. } => *status == 429 || *status >= 500,
            NetworkError::Decode(_) | NetworkError::Config(_) => false,
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Transport(msg) => write!(f, "transport error: {msg}"),
            NetworkError::Api { status, message } => {
                write!(f, "upstream error status={status}: {message}")
            }
            NetworkError::Decode(msg) => write!(f, "decode error: {msg}"),
            NetworkError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<ContractIdError> for NetworkError {
    fn from(e: ContractIdError) -> Self {
        NetworkError::Config(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Everything identity verification needs from the outside world.
///
/// Implementations must be `Send + Sync` so a single client can be shared by
/// concurrent verifications. Every method is a read; none mutates chain state.
#[async_trait::async_trait]
pub trait NetworkClient: Send + Sync {
    /// The home domain published by `account_id`, or `None` if it has none.
    async fn home_domain(&self, account_id: &str) -> Result<Option<String>, NetworkError>;

    /// Deterministic contract id of the `code:issuer` asset on the network
    /// identified by `network_passphrase`.
    fn derive_contract_id(
        &self,
        code: &str,
        issuer: &str,
        network_passphrase: &str,
    ) -> Result<String, NetworkError> {
        Ok(asset_contract_id(code, issuer, network_passphrase)?)
    }

    /// `true` if the network has at least one asset record for `code:issuer`.
    async fn asset_exists(&self, code: &str, issuer: &str) -> Result<bool, NetworkError>;

    /// Fetch `url` and return its `Content-Type`. Errors if unreachable or
    /// the response is not a success.
    async fn fetch_content_type(&self, url: &str) -> Result<String, NetworkError>;
}
