//! The Append-only Audit Log: sequence-numbered, hash-chained entries with
//! filtered/paginated query and CSV export (spec §4.3).

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

use vitaledger_core::audit::{
    AuditEntry, AuditQuery, AuditQueryResult, AuditRecordInput, QueryDirection, AUDIT_ROOT,
};
use vitaledger_core::constants::{DEFAULT_QUERY_LIMIT, MAX_AUDIT_QUERY_LIMIT};
use vitaledger_core::VitaLedgerError;
use vitaledger_storage::StorageBackend;

struct AuditTailState {
    next_sequence: u64,
    last_integrity_hash: String,
}

/// Append-only, hash-chained audit log. The tail (`nextSequence`,
/// `lastIntegrityHash`) is process-level state owned by this component and
/// rehydrated from storage at startup (spec §9 "Global state").
pub struct AuditLog {
    storage: Arc<dyn StorageBackend>,
    tail: Mutex<AuditTailState>,
}

impl AuditLog {
    /// Rehydrates the tail by re-verifying the stored chain. A broken link
    /// resets the tail to the last self-consistent entry and logs a
    /// warning rather than truncating committed entries (spec §7
    /// "Consistency").
    pub fn load(storage: Arc<dyn StorageBackend>) -> Result<Self, VitaLedgerError> {
        let entries = storage.iter_audit_entries()?;
        let mut expected_prev = AUDIT_ROOT.to_string();
        let mut last_valid_sequence = 0u64;
        let mut last_valid_hash = AUDIT_ROOT.to_string();

        for entry in &entries {
            let recomputed = integrity_hash_for_entry(entry);
            if entry.prev_hash != expected_prev || entry.integrity_hash != recomputed {
                tracing::warn!(
                    sequence = entry.sequence,
                    "audit chain broken on reload, resetting tail to last valid entry"
                );
                break;
            }
            expected_prev = entry.integrity_hash.clone();
            last_valid_sequence = entry.sequence;
            last_valid_hash = entry.integrity_hash.clone();
        }

        Ok(Self {
            storage,
            tail: Mutex::new(AuditTailState {
                next_sequence: last_valid_sequence + 1,
                last_integrity_hash: last_valid_hash,
            }),
        })
    }

    /// Validates required fields, assigns the next sequence, computes
    /// `prevHash`/`integrityHash`, appends durably, and returns the
    /// canonical entry (spec §4.3 `record`).
    ///
    /// Append is strictly serialized under the tail lock: compute hash,
    /// write, advance state — never interleaved (spec §5).
    pub fn record(&self, input: AuditRecordInput, now: DateTime<Utc>) -> Result<AuditEntry, VitaLedgerError> {
        if input.action.is_empty()
            || input.actor_id.is_empty()
            || input.actor_type.is_empty()
            || input.resource.is_empty()
        {
            return Err(VitaLedgerError::validation(
                "action, actorId, actorType, and resource are required",
            ));
        }

        let mut guard = self.tail.lock();
        let sequence = guard.next_sequence;
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut entry = AuditEntry {
            sequence,
            id: format!("audit-{sequence:012}"),
            timestamp,
            action: input.action,
            actor_id: input.actor_id,
            actor_type: input.actor_type,
            resource: input.resource,
            outcome: input.outcome,
            patient_id: input.patient_id,
            ip_address: input.ip_address,
            block_hash: input.block_hash,
            details: input.details,
            metadata: input.metadata,
            tags: input.tags,
            channel: input.channel.unwrap_or_else(|| "system".to_string()),
            prev_hash: guard.last_integrity_hash.clone(),
            integrity_hash: String::new(),
        };
        entry.integrity_hash = integrity_hash_for_entry(&entry);

        self.storage.append_audit_entry(&entry)?;

        guard.next_sequence = sequence + 1;
        guard.last_integrity_hash = entry.integrity_hash.clone();
        Ok(entry)
    }

    /// Paginated, filtered scan over the full log (spec §4.3 `query`).
    pub fn query(&self, query: AuditQuery) -> Result<AuditQueryResult, VitaLedgerError> {
        let limit = if query.limit == 0 {
            DEFAULT_QUERY_LIMIT
        } else {
            query.limit.min(MAX_AUDIT_QUERY_LIMIT)
        };

        let mut matching = self.matching_entries(&query.filters)?;
        let total_matches = matching.len() as u64;

        match query.direction {
            QueryDirection::Desc => matching.sort_by(|a, b| b.sequence.cmp(&a.sequence)),
            QueryDirection::Asc => matching.sort_by(|a, b| a.sequence.cmp(&b.sequence)),
        }

        let start_index = match query.cursor {
            Some(cursor) => matching
                .iter()
                .position(|e| match query.direction {
                    QueryDirection::Desc => e.sequence < cursor,
                    QueryDirection::Asc => e.sequence > cursor,
                })
                .unwrap_or(matching.len()),
            None => 0,
        };

        let page: Vec<AuditEntry> = matching[start_index..].iter().take(limit).cloned().collect();
        let has_more = start_index + page.len() < matching.len();
        let next_cursor = if has_more { page.last().map(|e| e.sequence) } else { None };

        Ok(AuditQueryResult {
            entries: page,
            total_matches,
            next_cursor,
            previous_cursor: query.cursor,
            has_more,
        })
    }

    /// Renders every entry matching `filters` as CSV with the fixed column
    /// order from spec §6, ignoring pagination.
    pub fn export_csv(&self, filters: &vitaledger_core::audit::AuditQueryFilters) -> Result<String, VitaLedgerError> {
        let mut entries = self.matching_entries(filters)?;
        entries.sort_by(|a, b| a.sequence.cmp(&b.sequence));

        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer
            .write_record([
                "sequence", "id", "timestamp", "action", "actorId", "actorType", "resource", "outcome",
                "patientId", "ipAddress", "blockHash", "channel", "tags", "details",
            ])
            .map_err(|e| VitaLedgerError::Other(format!("csv header write failed: {e}")))?;

        for entry in &entries {
            writer
                .write_record([
                    entry.sequence.to_string(),
                    entry.id.clone(),
                    entry.timestamp.clone(),
                    entry.action.clone(),
                    entry.actor_id.clone(),
                    entry.actor_type.clone(),
                    entry.resource.clone(),
                    entry.outcome.as_str().to_string(),
                    entry.patient_id.clone().unwrap_or_default(),
                    entry.ip_address.clone().unwrap_or_default(),
                    entry.block_hash.clone().unwrap_or_default(),
                    entry.channel.clone(),
                    entry.tags.join("|"),
                    entry.details.clone().unwrap_or_default(),
                ])
                .map_err(|e| VitaLedgerError::Other(format!("csv row write failed: {e}")))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| VitaLedgerError::Other(format!("csv flush failed: {e}")))?;
        String::from_utf8(bytes).map_err(|e| VitaLedgerError::Other(format!("csv not valid utf-8: {e}")))
    }

    /// Prunes entries older than `retention_days`. `0` disables the policy
    /// (spec §4.3 "Retention and rotation"). Never touches the chain head.
    pub fn prune_retention(&self, retention_days: u32, now: DateTime<Utc>) -> Result<u64, VitaLedgerError> {
        if retention_days == 0 {
            return Ok(0);
        }
        let cutoff = now.timestamp() - i64::from(retention_days) * 86_400;
        let entries = self.storage.iter_audit_entries()?;
        let threshold = entries
            .iter()
            .find(|e| entry_timestamp_unix(e).map(|t| t >= cutoff).unwrap_or(true))
            .map(|e| e.sequence)
            .unwrap_or_else(|| self.tail.lock().next_sequence);

        let removed = self.storage.prune_audit_before(threshold)?;
        if removed > 0 {
            tracing::info!(removed, retention_days, "pruned audit entries past retention window");
        }
        Ok(removed)
    }

    /// Rotates the live log to a timestamped archive if it exceeds
    /// `max_bytes`. `0` disables the policy (spec §4.3 "Retention and
    /// rotation").
    pub fn rotate_if_oversized(&self, max_bytes: u64, now_unix: i64) -> Result<Option<String>, VitaLedgerError> {
        if max_bytes == 0 {
            return Ok(None);
        }
        if self.storage.audit_log_size_bytes()? <= max_bytes {
            return Ok(None);
        }
        let archive_name = self.storage.rotate_audit_log(now_unix)?;
        let mut guard = self.tail.lock();
        guard.last_integrity_hash = AUDIT_ROOT.to_string();
        tracing::warn!(archive = %archive_name, "audit log rotated after exceeding byte budget");
        Ok(Some(archive_name))
    }

    fn matching_entries(
        &self,
        filters: &vitaledger_core::audit::AuditQueryFilters,
    ) -> Result<Vec<AuditEntry>, VitaLedgerError> {
        let entries = self.storage.iter_audit_entries()?;
        Ok(entries.into_iter().filter(|e| matches_filters(e, filters)).collect())
    }
}

fn matches_filters(entry: &AuditEntry, filters: &vitaledger_core::audit::AuditQueryFilters) -> bool {
    if let Some(v) = &filters.actor_id {
        if &entry.actor_id != v {
            return false;
        }
    }
    if let Some(v) = &filters.actor_type {
        if &entry.actor_type != v {
            return false;
        }
    }
    if let Some(v) = &filters.patient_id {
        if entry.patient_id.as_deref() != Some(v.as_str()) {
            return false;
        }
    }
    if let Some(v) = &filters.resource {
        if &entry.resource != v {
            return false;
        }
    }
    if let Some(v) = &filters.action {
        if &entry.action != v {
            return false;
        }
    }
    if let Some(v) = &filters.outcome {
        if entry.outcome.as_str() != v {
            return false;
        }
    }
    if let Some(from) = filters.from {
        if entry_timestamp_unix(entry).map(|t| t < from).unwrap_or(true) {
            return false;
        }
    }
    if let Some(to) = filters.to {
        if entry_timestamp_unix(entry).map(|t| t > to).unwrap_or(true) {
            return false;
        }
    }
    if !filters.tags.is_empty() && !filters.tags.iter().all(|t| entry.tags.contains(t)) {
        return false;
    }
    if let Some(needle) = &filters.search {
        let haystack = search_haystack(entry).to_lowercase();
        if !haystack.contains(&needle.to_lowercase()) {
            return false;
        }
    }
    true
}

fn search_haystack(entry: &AuditEntry) -> String {
    let metadata_json = serde_json::to_string(&entry.metadata).unwrap_or_default();
    [
        entry.details.clone().unwrap_or_default(),
        metadata_json,
        entry.actor_id.clone(),
        entry.resource.clone(),
        entry.block_hash.clone().unwrap_or_default(),
        entry.patient_id.clone().unwrap_or_default(),
    ]
    .join(" ")
}

fn entry_timestamp_unix(entry: &AuditEntry) -> Option<i64> {
    DateTime::parse_from_rfc3339(&entry.timestamp).ok().map(|dt| dt.timestamp())
}

fn integrity_hash_for_entry(entry: &AuditEntry) -> String {
    let value = serde_json::json!({
        "prevHash": entry.prev_hash,
        "sequence": entry.sequence,
        "timestamp": entry.timestamp,
        "action": entry.action,
        "actorId": entry.actor_id,
        "actorType": entry.actor_type,
        "resource": entry.resource,
        "outcome": entry.outcome.as_str(),
        "patientId": entry.patient_id,
        "ipAddress": entry.ip_address,
        "blockHash": entry.block_hash,
        "details": entry.details,
        "metadata": entry.metadata,
        "tags": entry.tags,
        "channel": entry.channel,
    });
    vitaledger_crypto::hash_canonical(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vitaledger_core::audit::{AuditOutcome, AuditQueryFilters};
    use vitaledger_storage::SledStorage;

    fn temp_log(name: &str) -> AuditLog {
        let dir = std::env::temp_dir().join(format!("vitaledger_audit_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let storage: Arc<dyn StorageBackend> = Arc::new(SledStorage::open(&dir).expect("open storage"));
        AuditLog::load(storage).expect("load audit log")
    }

    fn minimal_input(action: &str) -> AuditRecordInput {
        AuditRecordInput {
            action: action.to_string(),
            actor_id: "actor-1".to_string(),
            actor_type: "wallet".to_string(),
            resource: "transaction".to_string(),
            outcome: AuditOutcome::Success,
            ..Default::default()
        }
    }

    #[test]
    fn chain_links_and_recomputes() {
        let log = temp_log("chain");
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);

        let e1 = log.record(minimal_input("submit"), now).unwrap();
        let e2 = log.record(minimal_input("submit"), now).unwrap();
        let e3 = log.record(minimal_input("submit"), now).unwrap();

        assert_eq!(e1.sequence, 1);
        assert_eq!(e1.prev_hash, AUDIT_ROOT);
        assert_eq!(e2.prev_hash, e1.integrity_hash);
        assert_eq!(e3.prev_hash, e2.integrity_hash);

        for entry in [&e1, &e2, &e3] {
            assert_eq!(integrity_hash_for_entry(entry), entry.integrity_hash);
        }
    }

    #[test]
    fn record_requires_core_fields() {
        let log = temp_log("validation");
        let now = Utc::now();
        let mut input = minimal_input("submit");
        input.action = String::new();
        assert!(log.record(input, now).is_err());
    }

    #[test]
    fn pagination_reports_has_more_and_cursor() {
        let log = temp_log("pagination");
        let now = Utc::now();
        for _ in 0..5 {
            log.record(minimal_input("submit"), now).unwrap();
        }

        let page1 = log
            .query(AuditQuery {
                filters: AuditQueryFilters::default(),
                limit: 2,
                cursor: None,
                direction: QueryDirection::Desc,
            })
            .unwrap();
        assert_eq!(page1.entries.len(), 2);
        assert_eq!(page1.total_matches, 5);
        assert!(page1.has_more);
        assert_eq!(page1.entries[0].sequence, 5);

        let page2 = log
            .query(AuditQuery {
                filters: AuditQueryFilters::default(),
                limit: 2,
                cursor: page1.next_cursor,
                direction: QueryDirection::Desc,
            })
            .unwrap();
        assert_eq!(page2.entries[0].sequence, 3);
    }

    #[test]
    fn csv_export_quotes_special_characters() {
        let log = temp_log("csv");
        let now = Utc::now();
        let mut input = minimal_input("submit");
        input.details = Some("has, a comma".to_string());
        log.record(input, now).unwrap();

        let csv = log.export_csv(&AuditQueryFilters::default()).unwrap();
        assert!(csv.contains("\"has, a comma\""));
        assert!(csv.starts_with("sequence,id,timestamp"));
    }

    #[test]
    fn retention_prunes_without_touching_recent_entries() {
        let log = temp_log("retention");
        let old = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let recent = Utc::now();

        log.record(minimal_input("submit"), old).unwrap();
        log.record(minimal_input("submit"), recent).unwrap();

        let removed = log.prune_retention(30, recent).unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn metadata_round_trips_through_search() {
        let log = temp_log("search");
        let now = Utc::now();
        let mut metadata = BTreeMap::new();
        metadata.insert("note".to_string(), "needle-value".to_string());
        let mut input = minimal_input("submit");
        input.metadata = metadata;
        log.record(input, now).unwrap();

        let results = log
            .query(AuditQuery {
                filters: AuditQueryFilters {
                    search: Some("needle".to_string()),
                    ..Default::default()
                },
                limit: 10,
                cursor: None,
                direction: QueryDirection::Desc,
            })
            .unwrap();
        assert_eq!(results.entries.len(), 1);
    }
}
