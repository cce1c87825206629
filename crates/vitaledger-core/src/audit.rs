use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::UnixSeconds;

/// The literal sentinel used as entry 1's `prev_hash` (spec §3, §4.3).
pub const AUDIT_ROOT: &str = "AUDIT_ROOT";

/// Recognized outcome values (spec §3). The spec treats these three as
/// canonical but calls out that other values may appear; `Other` preserves
/// them instead of rejecting or panicking (spec §9 Open Question #1).
/// Serialized as its plain string form either way, so operator-defined
/// values round-trip byte-for-byte through storage and the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Failed,
    Blocked,
    Other(String),
}

impl AuditOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failed => "failed",
            AuditOutcome::Blocked => "blocked",
            AuditOutcome::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => AuditOutcome::Success,
            "failed" => AuditOutcome::Failed,
            "blocked" => AuditOutcome::Blocked,
            other => AuditOutcome::Other(other.to_string()),
        }
    }
}

impl Serialize for AuditOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuditOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(AuditOutcome::parse(&s))
    }
}

/// One entry in the append-only, hash-chained audit log (spec §3, §4.3).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub sequence: u64,
    pub id: String,
    pub timestamp: String,
    pub action: String,
    pub actor_id: String,
    pub actor_type: String,
    pub resource: String,
    pub outcome: AuditOutcome,
    pub patient_id: Option<String>,
    pub ip_address: Option<String>,
    pub block_hash: Option<String>,
    pub details: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub channel: String,
    pub prev_hash: String,
    pub integrity_hash: String,
}

/// Everything required to record a new entry, before sequencing and
/// hashing are assigned (spec §4.3 `record(input)`).
#[derive(Clone, Debug, Default)]
pub struct AuditRecordInput {
    pub action: String,
    pub actor_id: String,
    pub actor_type: String,
    pub resource: String,
    pub outcome: AuditOutcome,
    pub patient_id: Option<String>,
    pub ip_address: Option<String>,
    pub block_hash: Option<String>,
    pub details: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub channel: Option<String>,
}

impl Default for AuditOutcome {
    fn default() -> Self {
        AuditOutcome::Success
    }
}

/// Logical-AND filter set for `query()` (spec §4.3 "Query semantics").
#[derive(Clone, Debug, Default)]
pub struct AuditQueryFilters {
    pub actor_id: Option<String>,
    pub actor_type: Option<String>,
    pub patient_id: Option<String>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub outcome: Option<String>,
    pub from: Option<UnixSeconds>,
    pub to: Option<UnixSeconds>,
    pub tags: Vec<String>,
    pub search: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryDirection {
    Asc,
    Desc,
}

impl Default for QueryDirection {
    fn default() -> Self {
        QueryDirection::Desc
    }
}

#[derive(Clone, Debug, Default)]
pub struct AuditQuery {
    pub filters: AuditQueryFilters,
    pub limit: usize,
    pub cursor: Option<u64>,
    pub direction: QueryDirection,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQueryResult {
    pub entries: Vec<AuditEntry>,
    pub total_matches: u64,
    pub next_cursor: Option<u64>,
    pub previous_cursor: Option<u64>,
    pub has_more: bool,
}
