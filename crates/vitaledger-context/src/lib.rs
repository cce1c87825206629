//! The Context Engine: a pure function from a transaction (plus a live
//! mempool-stats snapshot) to a priority breakdown (spec §4.1).

use vitaledger_core::priority::{PriorityBreakdown, ResourceStats};
use vitaledger_core::transaction::Transaction;
use vitaledger_core::types::clamp01;

/// First-match-wins keyword → score tables, scanned in declared order.
const CRITICALITY_KEYWORDS: &[(&[&str], f64)] = &[
    (&["cardiac arrest"], 0.95),
    (&["stroke"], 0.93),
    (&["sepsis", "trauma"], 0.90),
    (&["prescription"], 0.65),
    (&["lab", "diagnostic"], 0.50),
    (&["routine", "checkup"], 0.35),
];
const CRITICALITY_DEFAULT: f64 = 0.40;

const SENSITIVITY_KEYWORDS: &[(&[&str], f64)] = &[
    (&["stat"], 0.95),
    (&["urgent"], 0.80),
    (&["routine"], 0.40),
];
const SENSITIVITY_DEFAULT: f64 = 0.50;

const COMPLIANCE_KEYWORDS: &[(&[&str], f64)] = &[
    (&["controlled substance"], 0.50),
    (&["prescription"], 0.30),
];
const COMPLIANCE_DEFAULT: f64 = 0.10;

const RESOURCES_DEFAULT: f64 = 0.50;

/// Computes the priority breakdown for `tx`. Never fails: absent `stats`
/// falls back to a neutral resources score (spec §4.1 "Contract").
pub fn calculate_priority(tx: &Transaction, stats: Option<&ResourceStats>) -> PriorityBreakdown {
    let search_text = tx.search_text().to_lowercase();
    let payload_text = tx.payload_text().to_lowercase();

    let criticality = scan(&search_text, CRITICALITY_KEYWORDS, CRITICALITY_DEFAULT);
    let sensitivity = scan(&payload_text, SENSITIVITY_KEYWORDS, SENSITIVITY_DEFAULT);
    let resources = score_resources(stats);
    let compliance = scan(&payload_text, COMPLIANCE_KEYWORDS, COMPLIANCE_DEFAULT);

    let priority = clamp01(0.45 * criticality + 0.35 * sensitivity + 0.10 * resources + 0.10 * compliance);

    PriorityBreakdown {
        criticality,
        sensitivity,
        resources,
        compliance,
        priority,
    }
}

/// First list entry (in declared order) whose keywords any appear as a
/// substring of `haystack` wins.
fn scan(haystack: &str, table: &[(&[&str], f64)], default: f64) -> f64 {
    for (keywords, score) in table {
        if keywords.iter().any(|kw| haystack.contains(kw)) {
            return *score;
        }
    }
    default
}

fn score_resources(stats: Option<&ResourceStats>) -> f64 {
    let Some(stats) = stats else {
        return RESOURCES_DEFAULT;
    };
    let utilization = if stats.total_capacity == 0 {
        0.0
    } else {
        stats.total_size as f64 / stats.total_capacity as f64
    };
    let availability = if stats.validators_total == 0 {
        1.0
    } else {
        stats.validators_online as f64 / stats.validators_total.max(1) as f64
    };
    clamp01(0.20 + 0.60 * availability - 0.50 * utilization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vitaledger_core::types::PayloadValue;

    fn tx_with_payload(tx_type: &str, fields: &[(&str, &str)]) -> Transaction {
        let mut payload = BTreeMap::new();
        for (key, value) in fields {
            payload.insert(key.to_string(), PayloadValue::String(value.to_string()));
        }
        Transaction {
            id: "tx-1".to_string(),
            tx_type: tx_type.to_string(),
            tier: 0,
            priority: 0.0,
            payload,
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

    fn round2(x: f64) -> f64 {
        (x * 100.0).round() / 100.0
    }

    #[test]
    fn critical_cardiac_case() {
        let tx = tx_with_payload(
            "Emergency Record",
            &[("chiefComplaint", "Cardiac Arrest, stat"), ("severity", "Cardiac Arrest")],
        );
        let breakdown = calculate_priority(&tx, None);
        assert_eq!(breakdown.criticality, 0.95);
        assert_eq!(breakdown.sensitivity, 0.95);
        assert_eq!(breakdown.resources, 0.50);
        assert_eq!(breakdown.compliance, 0.10);
        assert_eq!(round2(breakdown.priority), 0.82);
    }

    #[test]
    fn routine_lab_result() {
        let tx = tx_with_payload(
            "Lab Result",
            &[("testType", "CBC"), ("status", "Normal"), ("notes", "routine")],
        );
        let breakdown = calculate_priority(&tx, None);
        assert_eq!(breakdown.criticality, 0.50);
        assert_eq!(breakdown.sensitivity, 0.40);
        assert_eq!(breakdown.resources, 0.50);
        assert_eq!(breakdown.compliance, 0.10);
        assert_eq!(round2(breakdown.priority), 0.425);
    }

    #[test]
    fn resources_score_reflects_utilization_and_availability() {
        let stats = ResourceStats {
            total_size: 5_000,
            total_capacity: 10_000,
            validators_online: 8,
            validators_total: 10,
        };
        let tx = tx_with_payload("Prescription Order", &[("drug", "amoxicillin")]);
        let breakdown = calculate_priority(&tx, Some(&stats));
        // utilization = 0.5, availability = 0.8
        // resources = clamp01(0.20 + 0.60*0.8 - 0.50*0.5) = clamp01(0.43) = 0.43
        assert!((breakdown.resources - 0.43).abs() < 1e-9);
    }

    #[test]
    fn resources_default_when_stats_absent() {
        let tx = tx_with_payload("Routine Checkup", &[]);
        let breakdown = calculate_priority(&tx, None);
        assert_eq!(breakdown.resources, 0.50);
    }

    #[test]
    fn compliance_detects_controlled_substance_before_prescription() {
        let tx = tx_with_payload(
            "Prescription Order",
            &[("notes", "controlled substance, prescription refill")],
        );
        let breakdown = calculate_priority(&tx, None);
        assert_eq!(breakdown.compliance, 0.50);
    }
}
