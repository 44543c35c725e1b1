//! Deterministic Stellar Asset Contract address derivation.
//!
//! contract id = SHA-256 of the XDR `HashIdPreimage::ContractId` envelope
//! (`network_id`, `ContractIdPreimage::FromAsset(asset)`), strkey-encoded
//! with the `C` version byte.
//!
//! Only the handful of XDR shapes needed here are encoded by hand:
//!
//! ```text
//! int32  ENVELOPE_TYPE_CONTRACT_ID (8)
//! opaque networkID[32]
//! int32  CONTRACT_ID_PREIMAGE_FROM_ASSET (1)
//! int32  AssetType (0 native | 1 alphanum4 | 2 alphanum12)
//! opaque assetCode[4 | 12]     (zero padded)     -- credit assets only
//! int32  PUBLIC_KEY_TYPE_ED25519 (0)             -- credit assets only
//! opaque ed25519[32]                             -- credit assets only
//! ```

use sha2::{Digest, Sha256};
use std::fmt;

const ENVELOPE_TYPE_CONTRACT_ID: i32 = 8;
const CONTRACT_ID_PREIMAGE_FROM_ASSET: i32 = 1;
const ASSET_TYPE_NATIVE: i32 = 0;
const ASSET_TYPE_CREDIT_ALPHANUM4: i32 = 1;
const ASSET_TYPE_CREDIT_ALPHANUM12: i32 = 2;
const PUBLIC_KEY_TYPE_ED25519: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractIdError {
    /// Asset code is empty, longer than 12 bytes, or not alphanumeric.
    InvalidCode(String),
    /// Issuer is not a valid `G...` strkey.
    InvalidIssuer(String),
}

impl fmt::Display for ContractIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractIdError::InvalidCode(c) => write!(f, "invalid asset code '{c}'"),
            ContractIdError::InvalidIssuer(i) => write!(f, "invalid issuer account id '{i}'"),
        }
    }
}

impl std::error::Error for ContractIdError {}

/// SHA-256 of the network passphrase.
pub fn network_id(network_passphrase: &str) -> [u8; 32] {
    Sha256::digest(network_passphrase.as_bytes()).into()
}

/// Contract id of the credit asset `code:issuer`.
pub fn asset_contract_id(
    code: &str,
    issuer: &str,
    network_passphrase: &str,
) -> Result<String, ContractIdError> {
    let len = code.len();
    if len == 0 || len > 12 || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ContractIdError::InvalidCode(code.to_string()));
    }
    let issuer_key = stellar_strkey::ed25519::PublicKey::from_string(issuer)
        .map_err(|_| ContractIdError::InvalidIssuer(issuer.to_string()))?;

    let mut asset = Vec::with_capacity(4 + 12 + 4 + 32);
    if len <= 4 {
        push_i32(&mut asset, ASSET_TYPE_CREDIT_ALPHANUM4);
        push_padded(&mut asset, code.as_bytes(), 4);
    } else {
        push_i32(&mut asset, ASSET_TYPE_CREDIT_ALPHANUM12);
        push_padded(&mut asset, code.as_bytes(), 12);
    }
    push_i32(&mut asset, PUBLIC_KEY_TYPE_ED25519);
    asset.extend_from_slice(&issuer_key.0);

    Ok(contract_id_from_asset_xdr(&asset, network_passphrase))
}

/// Contract id of the native asset (lumens).
pub fn native_contract_id(network_passphrase: &str) -> String {
    let mut asset = Vec::with_capacity(4);
    push_i32(&mut asset, ASSET_TYPE_NATIVE);
    contract_id_from_asset_xdr(&asset, network_passphrase)
}

fn contract_id_from_asset_xdr(asset_xdr: &[u8], network_passphrase: &str) -> String {
    let mut preimage = Vec::with_capacity(4 + 32 + 4 + asset_xdr.len());
    push_i32(&mut preimage, ENVELOPE_TYPE_CONTRACT_ID);
    preimage.extend_from_slice(&network_id(network_passphrase));
    push_i32(&mut preimage, CONTRACT_ID_PREIMAGE_FROM_ASSET);
    preimage.extend_from_slice(asset_xdr);

    let hash: [u8; 32] = Sha256::digest(&preimage).into();
    stellar_strkey::Contract(hash).to_string()
}

fn push_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn push_padded(buf: &mut Vec<u8>, bytes: &[u8], width: usize) {
    buf.extend_from_slice(bytes);
    buf.extend(std::iter::repeat(0u8).take(width - bytes.len()));
}
