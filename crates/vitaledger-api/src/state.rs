use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use vitaledger_audit::AuditLog;
use vitaledger_core::priority::ResourceStats;
use vitaledger_core::reference::ReferenceDirectory;
use vitaledger_mempool::Mempool;
use vitaledger_storage::StorageBackend;
use vitaledger_wallet::WalletAuth;

const TPS_TREND_LENGTH: usize = 24;

/// Everything the request dispatcher holds references to. Subsystems do
/// not reference each other or this struct back (spec §9 "Cyclic
/// references").
pub struct AppStateInner {
    pub storage: Arc<dyn StorageBackend>,
    pub mempool: Mempool,
    pub audit: AuditLog,
    pub wallet_auth: WalletAuth,
    pub reference: ReferenceDirectory,
    pub network_id: String,
    pub api_prefix: String,
    pub started_at: DateTime<Utc>,

    tx_since_sample: AtomicU64,
    tps_history: Mutex<VecDeque<f64>>,
    /// "Total blocks" is read from chain state owned by the out-of-scope
    /// block producer; this core only relays whatever value it is given
    /// (spec §9 Open Question #3). No producer is wired in this core, so
    /// it stays at zero.
    total_blocks: AtomicU64,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        mempool: Mempool,
        audit: AuditLog,
        wallet_auth: WalletAuth,
        reference: ReferenceDirectory,
        network_id: String,
        api_prefix: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            storage,
            mempool,
            audit,
            wallet_auth,
            reference,
            network_id,
            api_prefix,
            started_at,
            tx_since_sample: AtomicU64::new(0),
            tps_history: Mutex::new(VecDeque::with_capacity(TPS_TREND_LENGTH)),
            total_blocks: AtomicU64::new(0),
        }
    }

    pub fn uptime_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }

    /// Validator counts derived from the reference directory, fed to the
    /// Context Engine as the live occupancy snapshot it reads once per
    /// call (spec §4.1 step 4).
    pub fn resource_stats(&self) -> ResourceStats {
        let stats = self.mempool.stats(self.validators_online(), self.validators_total());
        ResourceStats {
            total_size: stats.total_size(),
            total_capacity: stats.total_capacity(),
            validators_online: stats.validators_online,
            validators_total: stats.validators_total,
        }
    }

    pub fn validators_total(&self) -> u64 {
        self.reference.validators.len() as u64
    }

    pub fn validators_online(&self) -> u64 {
        self.reference.validators.iter().filter(|v| v.last_seen.is_some()).count() as u64
    }

    pub fn record_admission(&self) {
        self.tx_since_sample.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_blocks(&self) -> u64 {
        self.total_blocks.load(Ordering::Relaxed)
    }

    /// Called periodically by the node's background sampler: folds the
    /// admissions seen since the last tick into a tps figure and pushes it
    /// onto the fixed-length trend buffer.
    pub fn sample_tps(&self, interval_seconds: f64) -> f64 {
        let count = self.tx_since_sample.swap(0, Ordering::Relaxed);
        let tps = if interval_seconds > 0.0 { count as f64 / interval_seconds } else { 0.0 };

        let mut history = self.tps_history.lock();
        if history.len() == TPS_TREND_LENGTH {
            history.pop_front();
        }
        history.push_back(tps);
        tps
    }

    pub fn current_tps(&self) -> f64 {
        self.tps_history.lock().back().copied().unwrap_or(0.0)
    }

    /// Last 24 samples, oldest first, left-padded with zeros until the
    /// buffer fills.
    pub fn tps_trend(&self) -> Vec<f64> {
        let history = self.tps_history.lock();
        let mut trend = vec![0.0; TPS_TREND_LENGTH - history.len()];
        trend.extend(history.iter().copied());
        trend
    }

    pub fn average_validator_latency_ms(&self) -> f64 {
        if self.reference.validators.is_empty() {
            return 0.0;
        }
        let total: f64 = self.reference.validators.iter().map(|v| (1.0 - v.reputation).max(0.0) * 500.0).sum();
        total / self.reference.validators.len() as f64
    }

    pub fn top_validator_scores(&self, limit: usize) -> Vec<(String, f64)> {
        let mut validators: Vec<_> = self.reference.validators.iter().map(|v| (v.id.clone(), v.reputation)).collect();
        validators.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        validators.truncate(limit);
        validators
    }
}
