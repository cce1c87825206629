//! HTTP surface for the ledger core: a thin axum adapter over the four
//! subsystems, exposing the contracts in spec §6. Request dispatch holds
//! references to all four subsystems directly; it is not itself one of
//! them (spec §9 "Cyclic references").

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::{AppState, AppStateInner};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;

    use vitaledger_audit::AuditLog;
    use vitaledger_core::reference::ReferenceDirectory;
    use vitaledger_mempool::Mempool;
    use vitaledger_storage::{SledStorage, StorageBackend};
    use vitaledger_wallet::WalletAuth;

    use super::*;

    fn test_state(name: &str) -> AppState {
        let dir = std::env::temp_dir().join(format!("vitaledger_api_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let storage: Arc<dyn StorageBackend> = Arc::new(SledStorage::open(&dir).expect("open storage"));
        let mempool = Mempool::load(storage.clone()).expect("load mempool");
        let audit = AuditLog::load(storage.clone()).expect("load audit");
        let wallet_auth = WalletAuth::new(storage.clone(), 300);
        Arc::new(AppStateInner::new(
            storage,
            mempool,
            audit,
            wallet_auth,
            ReferenceDirectory::default(),
            "test-network".to_string(),
            "/api".to_string(),
            Utc::now(),
        ))
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = router(test_state("health"));
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_transaction_rejects_malformed_priority() {
        let app = router(test_state("bad_priority"));
        let body = serde_json::json!({
            "type": "Lab Result",
            "patientId": "patient-1",
            "provider": "Provider A",
            "priority": "urgent",
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/transactions")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_transaction_admits_and_audits() {
        let state = test_state("admit");
        let app = router(state.clone());
        let body = serde_json::json!({
            "type": "Emergency Record",
            "patientId": "patient-1",
            "provider": "Provider A",
            "priority": "Tier-2",
            "payload": {"chiefComplaint": "Cardiac Arrest, stat"},
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/transactions")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(state.storage.iter_transactions().unwrap().len(), 1);

        let audit = state.audit.query(vitaledger_core::audit::AuditQuery {
            limit: 10,
            ..Default::default()
        }).unwrap();
        assert_eq!(audit.entries.len(), 1);
        assert_eq!(audit.entries[0].action, "submit-transaction");
    }

    #[tokio::test]
    async fn wallet_challenge_and_verify_round_trip_missing_signature() {
        let app = router(test_state("wallet"));
        let body = serde_json::json!({"address": "0xAbC"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/wallet/challenge")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
