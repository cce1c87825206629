use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use vitaledger_core::types::Payload;
use vitaledger_core::wallet::WalletFamily;

use crate::error::ApiError;

/// Parses the `"Tier-1"|"Tier-2"|"Tier-3"` label carried by the request
/// into the numeric hint the Mempool accepts. Anything else is a
/// validation error (spec §7 "malformed priority label").
pub fn parse_tier_label(label: &str) -> Result<u8, ApiError> {
    match label {
        "Tier-1" => Ok(1),
        "Tier-2" => Ok(2),
        "Tier-3" => Ok(3),
        other => Err(ApiError::validation(format!("malformed priority label: {other}"))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub patient_id: String,
    pub provider: String,
    pub provider_id: Option<String>,
    pub priority: String,
    pub status: Option<String>,
    pub signature: Option<String>,
    #[serde(default)]
    pub payload: Payload,
    pub actor_id: Option<String>,
    pub actor_type: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub patient_id: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuditQueryParams {
    pub actor_id: Option<String>,
    pub actor_type: Option<String>,
    pub patient_id: Option<String>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub outcome: Option<String>,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub search: Option<String>,
    pub tags: Option<String>,
    pub limit: Option<usize>,
    pub direction: Option<String>,
    pub cursor: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletChallengeRequest {
    pub address: String,
    #[serde(rename = "type")]
    pub family: Option<String>,
    pub label: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub custom_public_key: Option<String>,
}

impl WalletChallengeRequest {
    pub fn parsed_family(&self) -> Result<Option<WalletFamily>, ApiError> {
        match self.family.as_deref() {
            None => Ok(None),
            Some("external-signer") => Ok(Some(WalletFamily::ExternalSigner)),
            Some("custom-keypair") => Ok(Some(WalletFamily::CustomKeypair)),
            Some(other) => Err(ApiError::validation(format!("unknown wallet type: {other}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletVerifyRequest {
    pub address: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct DataEnvelope<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> DataEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
