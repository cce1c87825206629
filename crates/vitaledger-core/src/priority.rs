use serde::{Deserialize, Serialize};

/// Five scores in `[0, 1]` (spec §3 "Priority Breakdown").
///
/// Invariant: `priority == clamp01(0.45*criticality + 0.35*sensitivity +
/// 0.10*resources + 0.10*compliance)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityBreakdown {
    pub criticality: f64,
    pub sensitivity: f64,
    pub resources: f64,
    pub compliance: f64,
    pub priority: f64,
}

/// Live mempool occupancy snapshot the Context Engine reads once per call
/// (spec §4.1 step 4). `None` fields fall back to the documented defaults.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResourceStats {
    pub total_size: u64,
    pub total_capacity: u64,
    pub validators_online: u64,
    pub validators_total: u64,
}
