use serde::{Deserialize, Serialize};

use crate::priority::PriorityBreakdown;
use crate::transaction::Transaction;
use crate::types::UnixSeconds;

/// Mempool tier capacities, fixed per spec §6.
pub const TIER1_CAPACITY: usize = 100;
pub const TIER2_CAPACITY: usize = 2_000;
pub const TIER3_CAPACITY: usize = 8_000;

/// An admitted transaction plus the admission-time scoring (spec §3
/// "Mempool Entry").
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MempoolEntry {
    pub transaction: Transaction,
    pub tier: u8,
    pub priority: f64,
    pub breakdown: PriorityBreakdown,
    pub admitted_at: UnixSeconds,
}

/// The three tier queues as persisted (spec §3 "Mempool Snapshot").
/// Each tier is sorted by priority descending.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MempoolSnapshot {
    pub tier1: Vec<MempoolEntry>,
    pub tier2: Vec<MempoolEntry>,
    pub tier3: Vec<MempoolEntry>,
}

impl MempoolSnapshot {
    pub fn tier(&self, tier: u8) -> &[MempoolEntry] {
        match tier {
            1 => &self.tier1,
            2 => &self.tier2,
            _ => &self.tier3,
        }
    }

    pub fn tier_mut(&mut self, tier: u8) -> &mut Vec<MempoolEntry> {
        match tier {
            1 => &mut self.tier1,
            2 => &mut self.tier2,
            _ => &mut self.tier3,
        }
    }

    pub fn total_size(&self) -> u64 {
        (self.tier1.len() + self.tier2.len() + self.tier3.len()) as u64
    }
}

pub fn capacity_for_tier(tier: u8) -> usize {
    match tier {
        1 => TIER1_CAPACITY,
        2 => TIER2_CAPACITY,
        _ => TIER3_CAPACITY,
    }
}

/// Current sizes, capacities, and caller-supplied validator counts (spec
/// §4.2 `stats()`).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MempoolStats {
    pub tier1_size: u64,
    pub tier2_size: u64,
    pub tier3_size: u64,
    pub tier1_capacity: u64,
    pub tier2_capacity: u64,
    pub tier3_capacity: u64,
    pub validators_online: u64,
    pub validators_total: u64,
}

impl MempoolStats {
    pub fn total_size(&self) -> u64 {
        self.tier1_size + self.tier2_size + self.tier3_size
    }

    pub fn total_capacity(&self) -> u64 {
        self.tier1_capacity + self.tier2_capacity + self.tier3_capacity
    }
}
