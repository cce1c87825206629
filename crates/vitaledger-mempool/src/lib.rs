//! The Tiered Mempool: three priority-ordered, capacity-bounded queues
//! backed by a persisted snapshot (spec §4.2).

use std::sync::Arc;

use parking_lot::Mutex;

use vitaledger_core::mempool::{capacity_for_tier, MempoolEntry, MempoolSnapshot, MempoolStats};
use vitaledger_core::priority::PriorityBreakdown;
use vitaledger_core::transaction::Transaction;
use vitaledger_core::types::UnixSeconds;
use vitaledger_core::VitaLedgerError;
use vitaledger_storage::StorageBackend;

/// Tier thresholds: a hinted tier wins, otherwise priority decides (spec
/// §4.2 "Tier selection"). Per spec §9 Open Question #2, the hint is kept
/// for forward compatibility but priority thresholds are authoritative —
/// no caller in this core currently supplies a hint that would override
/// them downward.
fn select_tier(priority: f64, hint: Option<u8>) -> u8 {
    if hint == Some(1) || priority >= 0.85 {
        1
    } else if hint == Some(2) || priority >= 0.60 {
        2
    } else {
        3
    }
}

/// Outcome of `add` (spec §4.2 "Contract").
#[derive(Clone, Debug)]
pub struct AdmitResult {
    pub tier: u8,
    pub evicted: Option<MempoolEntry>,
}

/// In-memory tiered priority queues, mutated under a single writer lock and
/// persisted to `storage` on every mutation (spec §4.2 "Persistence", §5).
pub struct Mempool {
    storage: Arc<dyn StorageBackend>,
    state: Mutex<MempoolSnapshot>,
}

impl Mempool {
    /// Rehydrates from the persisted snapshot. On absence or corruption,
    /// starts empty (spec §4.2 "Persistence").
    pub fn load(storage: Arc<dyn StorageBackend>) -> Result<Self, VitaLedgerError> {
        let snapshot = match storage.get_mempool_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => MempoolSnapshot::default(),
            Err(e) => {
                tracing::warn!(error = %e, "mempool snapshot unreadable, starting empty");
                MempoolSnapshot::default()
            }
        };
        Ok(Self { storage, state: Mutex::new(snapshot) })
    }

    /// Admits `transaction` at the tier implied by `breakdown.priority` and
    /// `hint`, enforcing capacity. Mutate-then-persist: on persist failure
    /// the in-memory change is rolled back and the error is returned
    /// (spec §4.2 "Persistence", §5).
    pub fn add(
        &self,
        transaction: Transaction,
        breakdown: PriorityBreakdown,
        hint: Option<u8>,
        admitted_at: UnixSeconds,
    ) -> Result<AdmitResult, VitaLedgerError> {
        let tier = select_tier(breakdown.priority, hint);
        let entry = MempoolEntry {
            transaction,
            tier,
            priority: breakdown.priority,
            breakdown,
            admitted_at,
        };

        let mut guard = self.state.lock();
        let before = guard.clone();

        let queue = guard.tier_mut(tier);
        queue.push(entry);
        queue.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap_or(std::cmp::Ordering::Equal));
        let capacity = capacity_for_tier(tier);
        let evicted = if queue.len() > capacity { queue.pop() } else { None };

        match self.storage.put_mempool_snapshot(&guard) {
            Ok(()) => Ok(AdmitResult { tier, evicted }),
            Err(e) => {
                *guard = before;
                Err(e)
            }
        }
    }

    /// Removes the first entry matching `id` across all tiers, if any
    /// (spec §4.2 `removeById`).
    pub fn remove_by_id(&self, id: &str) -> Result<Option<MempoolEntry>, VitaLedgerError> {
        let mut guard = self.state.lock();
        let before = guard.clone();

        let mut removed = None;
        for tier in [1u8, 2, 3] {
            let queue = guard.tier_mut(tier);
            if let Some(pos) = queue.iter().position(|e| e.transaction.id == id) {
                removed = Some(queue.remove(pos));
                break;
            }
        }
        if removed.is_none() {
            return Ok(None);
        }

        match self.storage.put_mempool_snapshot(&guard) {
            Ok(()) => Ok(removed),
            Err(e) => {
                *guard = before;
                Err(e)
            }
        }
    }

    /// Removes every entry whose id is in `ids`, persisting once at the end
    /// (spec §4.2 `flush`).
    pub fn flush(&self, ids: &[String]) -> Result<usize, VitaLedgerError> {
        let mut guard = self.state.lock();
        let before = guard.clone();

        let mut removed_count = 0usize;
        for tier in [1u8, 2, 3] {
            let queue = guard.tier_mut(tier);
            let original_len = queue.len();
            queue.retain(|e| !ids.contains(&e.transaction.id));
            removed_count += original_len - queue.len();
        }
        if removed_count == 0 {
            return Ok(0);
        }

        match self.storage.put_mempool_snapshot(&guard) {
            Ok(()) => Ok(removed_count),
            Err(e) => {
                *guard = before;
                Err(e)
            }
        }
    }

    /// Top-`limit` transactions of `tier` in priority order (spec §4.2
    /// `byTier`).
    pub fn by_tier(&self, tier: u8, limit: usize) -> Vec<Transaction> {
        let guard = self.state.lock();
        guard
            .tier(tier)
            .iter()
            .take(limit)
            .map(|e| e.transaction.clone())
            .collect()
    }

    /// Current sizes, fixed capacities, and caller-supplied validator
    /// counts (spec §4.2 `stats`).
    pub fn stats(&self, validators_online: u64, validators_total: u64) -> MempoolStats {
        let guard = self.state.lock();
        MempoolStats {
            tier1_size: guard.tier1.len() as u64,
            tier2_size: guard.tier2.len() as u64,
            tier3_size: guard.tier3.len() as u64,
            tier1_capacity: capacity_for_tier(1) as u64,
            tier2_capacity: capacity_for_tier(2) as u64,
            tier3_capacity: capacity_for_tier(3) as u64,
            validators_online,
            validators_total,
        }
    }

    /// A read-only copy of the current three tier-queues (spec §4.2
    /// `snapshot`).
    pub fn snapshot(&self) -> MempoolSnapshot {
        self.state.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::Path;
    use vitaledger_storage::SledStorage;

    fn temp_mempool(name: &str) -> Mempool {
        let dir = std::env::temp_dir().join(format!("vitaledger_mempool_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let storage: Arc<dyn StorageBackend> = Arc::new(SledStorage::open(&dir).expect("open storage"));
        Mempool::load(storage).expect("load mempool")
    }

    fn tx(id: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            tx_type: "Emergency Record".to_string(),
            tier: 0,
            priority: 0.0,
            payload: BTreeMap::new(),
            signature: None,
            created_at: 0,
            status: None,
            patient_id: None,
            provider: None,
            provider_id: None,
            actor_id: None,
            actor_type: None,
            details: None,
            block_hash: None,
        }
    }

    fn breakdown(priority: f64) -> PriorityBreakdown {
        PriorityBreakdown {
            criticality: priority,
            sensitivity: priority,
            resources: 0.5,
            compliance: 0.1,
            priority,
        }
    }

    #[test]
    fn tier_selection_follows_priority_thresholds() {
        assert_eq!(select_tier(0.90, None), 1);
        assert_eq!(select_tier(0.70, None), 2);
        assert_eq!(select_tier(0.10, None), 3);
        assert_eq!(select_tier(0.10, Some(1)), 1);
    }

    #[test]
    fn eviction_keeps_tier_at_capacity() {
        let _ = Path::new(".");
        let mempool = temp_mempool("eviction");
        for i in 0..100 {
            mempool
                .add(tx(&format!("full-{i}")), breakdown(0.90), None, 0)
                .expect("admit full entries");
        }
        let result = mempool
            .add(tx("overflow"), breakdown(0.86), None, 0)
            .expect("admit overflow entry");
        assert_eq!(result.tier, 1);
        let evicted = result.evicted.expect("overflow entry evicted");
        assert_eq!(evicted.transaction.id, "overflow");
        assert_eq!(mempool.snapshot().tier1.len(), 100);
    }

    #[test]
    fn remove_by_id_persists_removal() {
        let mempool = temp_mempool("remove_by_id");
        mempool.add(tx("a"), breakdown(0.95), None, 0).unwrap();
        let removed = mempool.remove_by_id("a").unwrap();
        assert!(removed.is_some());
        assert_eq!(mempool.snapshot().tier1.len(), 0);
        assert!(mempool.remove_by_id("a").unwrap().is_none());
    }

    #[test]
    fn flush_removes_matching_ids_once() {
        let mempool = temp_mempool("flush");
        mempool.add(tx("a"), breakdown(0.95), None, 0).unwrap();
        mempool.add(tx("b"), breakdown(0.70), None, 0).unwrap();
        let removed = mempool.flush(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(mempool.snapshot().total_size(), 0);
    }
}
