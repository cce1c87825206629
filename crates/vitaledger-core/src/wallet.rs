use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::UnixSeconds;

/// The two supported signer families (spec §3 "Wallet Profile", §4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalletFamily {
    /// ECDSA secp256k1 over an EIP-191 personal-sign envelope.
    ExternalSigner,
    /// Ed25519 or RSA-PSS over the raw message.
    CustomKeypair,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Active,
    Revoked,
    Suspended,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletProfile {
    pub id: String,
    pub address: String,
    pub normalized_address: String,
    pub family: WalletFamily,
    pub label: Option<String>,
    /// Required for `CustomKeypair` wallets; absent/ignored for
    /// `ExternalSigner` (address recovery needs no stored key).
    pub public_key: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub roles: Vec<String>,
    pub status: WalletStatus,
    pub created_at: UnixSeconds,
    pub updated_at: UnixSeconds,
    pub last_seen_at: Option<UnixSeconds>,
}

impl WalletProfile {
    pub fn default_roles() -> Vec<String> {
        vec!["clinician".to_string()]
    }
}

/// A single-use, time-bounded signing challenge (spec §3 "Wallet Nonce
/// Record", §4.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletNonceRecord {
    pub address: String,
    pub normalized_address: String,
    pub nonce: String,
    pub message: String,
    pub family: WalletFamily,
    pub issued_at: UnixSeconds,
    pub expires_at: UnixSeconds,
    pub context: Option<BTreeMap<String, String>>,
}

/// Input to `issueNonce` (spec §4.4).
#[derive(Clone, Debug, Default)]
pub struct IssueNonceOptions {
    pub family: Option<WalletFamily>,
    pub label: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub custom_public_key: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedChallenge {
    pub nonce: String,
    pub message: String,
    pub expires_at: UnixSeconds,
    pub wallet: WalletProfile,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedSession {
    pub wallet: WalletProfile,
    pub verified_at: UnixSeconds,
    pub session_token: String,
    pub proof: String,
}
