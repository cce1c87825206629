pub mod auth;
pub mod registry;

pub use auth::WalletAuth;
pub use registry::{RegisterInput, WalletRegistry};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use ed25519_dalek::Signer as _;
    use vitaledger_core::wallet::{IssueNonceOptions, WalletFamily, WalletStatus};
    use vitaledger_storage::{SledStorage, StorageBackend};

    fn temp_auth(name: &str) -> WalletAuth {
        let dir = std::env::temp_dir().join(format!("vitaledger_wallet_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let storage: Arc<dyn StorageBackend> = Arc::new(SledStorage::open(&dir).expect("open storage"));
        WalletAuth::new(storage, 300)
    }

    #[test]
    fn external_signer_challenge_and_reuse() {
        let auth = temp_auth("external_signer");
        let challenge = auth
            .issue_nonce("0xAbC123", IssueNonceOptions::default(), 1_000)
            .expect("issue nonce");
        assert!(challenge.message.contains(&challenge.nonce));
        assert_eq!(challenge.wallet.normalized_address, "0xabc123");

        // Wrong signature fails without consuming the nonce's error path as
        // a different error than "no active nonce".
        let err = auth.verify("0xAbC123", "0xdeadbeef", 1_001).unwrap_err();
        assert!(matches!(err, vitaledger_core::VitaLedgerError::Validation(_)));
    }

    #[test]
    fn custom_keypair_requires_public_key_on_first_sight() {
        let auth = temp_auth("custom_keypair_missing_key");
        let options = IssueNonceOptions {
            family: Some(WalletFamily::CustomKeypair),
            ..Default::default()
        };
        let result = auth.issue_nonce("wallet-addr", options, 1_000);
        assert!(result.is_err());
    }

    #[test]
    fn ed25519_verify_consumes_nonce() {
        let auth = temp_auth("ed25519_verify");
        let mut seed = [7u8; 32];
        seed[0] = 42;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
        let public_key_hex = hex::encode(signing_key.verifying_key().to_bytes());

        let mut metadata = BTreeMap::new();
        metadata.insert("scheme".to_string(), "ed25519".to_string());
        let options = IssueNonceOptions {
            family: Some(WalletFamily::CustomKeypair),
            custom_public_key: Some(public_key_hex),
            metadata,
            ..Default::default()
        };
        let challenge = auth.issue_nonce("custom-wallet", options, 1_000).expect("issue nonce");

        let signature = signing_key.sign(challenge.message.as_bytes());
        let sig_hex = hex::encode(signature.to_bytes());

        let session = auth.verify("custom-wallet", &sig_hex, 1_010).expect("verify succeeds");
        assert_eq!(session.wallet.status, WalletStatus::Active);

        let reuse = auth.verify("custom-wallet", &sig_hex, 1_011);
        assert!(reuse.is_err());
    }

    #[test]
    fn expired_nonce_is_rejected() {
        let auth = temp_auth("expired_nonce");
        let challenge = auth
            .issue_nonce("0xExpired", IssueNonceOptions::default(), 1_000)
            .expect("issue nonce");
        let result = auth.verify("0xExpired", "irrelevant", challenge.expires_at + 1);
        assert!(result.is_err());
    }

    #[test]
    fn register_is_idempotent_by_normalized_address() {
        let dir = std::env::temp_dir().join("vitaledger_wallet_test_idempotent");
        let _ = std::fs::remove_dir_all(&dir);
        let storage: Arc<dyn StorageBackend> = Arc::new(SledStorage::open(&dir).expect("open storage"));
        let registry = WalletRegistry::new(storage);

        let input = RegisterInput {
            address: "0xABC".to_string(),
            family: WalletFamily::ExternalSigner,
            label: None,
            metadata: BTreeMap::new(),
            public_key: None,
        };
        let first = registry.register(input.clone(), 1_000).unwrap();
        let second = registry.register(input, 2_000).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(registry.count().unwrap(), 1);
    }
}
