use serde::{Deserialize, Serialize};

use crate::types::{Payload, UnixSeconds};

/// A signed clinical event submitted for ingestion (spec §3 "Transaction").
///
/// `id` is caller-supplied when present, server-generated otherwise.
/// `tier` and `priority` are set at admission time from the
/// [`crate::priority::PriorityBreakdown`] the Context Engine computed for
/// this transaction, and are not independently mutable afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub tier: u8,
    pub priority: f64,
    pub payload: Payload,
    pub signature: Option<String>,
    pub created_at: UnixSeconds,

    /// Free-form status the caller may attach (e.g. "submitted",
    /// "processed"); opaque to the core.
    pub status: Option<String>,
    pub patient_id: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    pub actor_id: Option<String>,
    pub actor_type: Option<String>,
    pub details: Option<String>,
    pub block_hash: Option<String>,
}

impl Transaction {
    /// Search text the Context Engine scans: the type tag followed by a
    /// depth-first traversal of every payload leaf (spec §4.1 step 1).
    pub fn search_text(&self) -> String {
        let mut text = self.tx_type.clone();
        text.push(' ');
        for value in self.payload.values() {
            text.push_str(&value.flatten_leaf_text());
        }
        text
    }

    /// Payload-only search text (type excluded), used by sensitivity and
    /// compliance scoring per spec §4.1 steps 3 and 5.
    pub fn payload_text(&self) -> String {
        let mut text = String::new();
        for value in self.payload.values() {
            text.push_str(&value.flatten_leaf_text());
        }
        text
    }
}
