use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

use vitaledger_core::types::UnixSeconds;
use vitaledger_core::wallet::{
    IssueNonceOptions, IssuedChallenge, VerifiedSession, WalletFamily, WalletNonceRecord,
};
use vitaledger_core::VitaLedgerError;
use vitaledger_crypto::SignatureVerifier;
use vitaledger_storage::StorageBackend;

use crate::registry::{normalize_address, RegisterInput, WalletRegistry};

const SYSTEM_IDENTIFIER: &str = "VitaLedger Wallet Authentication";
const INTENT_LINE: &str = "Sign this message to authenticate";

fn build_challenge_message(address: &str, nonce: &str, issued_at: UnixSeconds) -> String {
    let timestamp = DateTime::<Utc>::from_timestamp(issued_at, 0)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    format!("{SYSTEM_IDENTIFIER}\n{INTENT_LINE}\nWallet: {address}\nNonce: {nonce}\nTimestamp: {timestamp}")
}

/// Binds addresses to active sessions via time-bounded nonces and
/// signature verification (spec §4.4). Owns the `WalletRegistry` it
/// resolves and auto-creates wallets through.
pub struct WalletAuth {
    storage: Arc<dyn StorageBackend>,
    registry: WalletRegistry,
    verifiers: Vec<Box<dyn SignatureVerifier>>,
    nonce_ttl_seconds: i64,
    // Serializes nonce reads/writes during verify to prevent a nonce being
    // consumed twice by concurrent requests (spec §5 "Nonce store").
    nonce_lock: Mutex<()>,
}

impl WalletAuth {
    pub fn new(storage: Arc<dyn StorageBackend>, nonce_ttl_seconds: i64) -> Self {
        let registry = WalletRegistry::new(storage.clone());
        Self {
            storage,
            registry,
            verifiers: vitaledger_crypto::default_verifiers(),
            nonce_ttl_seconds,
            nonce_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &WalletRegistry {
        &self.registry
    }

    /// Resolves or auto-creates the wallet, constructs a fresh challenge,
    /// and stores it keyed by normalized address (spec §4.4 `issueNonce`).
    pub fn issue_nonce(
        &self,
        address: &str,
        options: IssueNonceOptions,
        now: UnixSeconds,
    ) -> Result<IssuedChallenge, VitaLedgerError> {
        let normalized = normalize_address(address);

        let wallet = match self.registry.get(&normalized)? {
            Some(existing) => {
                if let Some(declared) = options.family {
                    if declared != existing.family {
                        return Err(VitaLedgerError::validation(
                            "declared wallet family does not match the registered family",
                        ));
                    }
                }
                existing
            }
            None => {
                let family = options.family.unwrap_or(WalletFamily::ExternalSigner);
                if family == WalletFamily::CustomKeypair && options.custom_public_key.is_none() {
                    return Err(VitaLedgerError::validation(
                        "custom-keypair wallet requires a public key on first registration",
                    ));
                }
                self.registry.register(
                    RegisterInput {
                        address: address.to_string(),
                        family,
                        label: options.label.clone(),
                        metadata: options.metadata.clone(),
                        public_key: options.custom_public_key.clone(),
                    },
                    now,
                )?
            }
        };

        let nonce = vitaledger_crypto::generate_nonce();
        let expires_at = now + self.nonce_ttl_seconds;
        let message = build_challenge_message(&wallet.address, &nonce, now);
        let context: Option<BTreeMap<String, String>> =
            if options.metadata.is_empty() { None } else { Some(options.metadata) };

        let record = WalletNonceRecord {
            address: wallet.address.clone(),
            normalized_address: normalized,
            nonce: nonce.clone(),
            message: message.clone(),
            family: wallet.family,
            issued_at: now,
            expires_at,
            context,
        };

        let _guard = self.nonce_lock.lock();
        self.storage.put_nonce(&record)?;

        Ok(IssuedChallenge { nonce, message, expires_at, wallet })
    }

    /// Looks up the active nonce, verifies the signature under the
    /// wallet's family, and on success deletes the nonce and updates
    /// `lastSeenAt` (spec §4.4 `verify`).
    pub fn verify(&self, address: &str, signature: &str, now: UnixSeconds) -> Result<VerifiedSession, VitaLedgerError> {
        let normalized = normalize_address(address);
        let _guard = self.nonce_lock.lock();

        let wallet = self
            .registry
            .get(&normalized)?
            .ok_or_else(|| VitaLedgerError::validation("unknown wallet"))?;

        let record = self
            .storage
            .get_nonce(&normalized)?
            .ok_or_else(|| VitaLedgerError::validation("no active nonce"))?;

        if now > record.expires_at {
            self.storage.delete_nonce(&normalized)?;
            return Err(VitaLedgerError::validation("nonce expired"));
        }

        let verified = vitaledger_crypto::verify_signature(&self.verifiers, &wallet, &record.message, signature)?;
        if !verified {
            return Err(VitaLedgerError::validation("signature invalid"));
        }

        self.storage.delete_nonce(&normalized)?;
        drop(_guard);

        let wallet = self.registry.touch(&normalized, now)?;
        let session_token = vitaledger_crypto::session_token(&wallet.id, &record.nonce, now);
        let proof = vitaledger_crypto::proof(signature, &record.message);

        Ok(VerifiedSession { wallet, verified_at: now, session_token, proof })
    }

    /// Drops every nonce record whose `expiresAt` has passed (spec §3
    /// "record is removed on successful verification or expiry sweep",
    /// §5 "nonces are swept"). An address that is challenged and never
    /// verified would otherwise leave its expired record in storage
    /// indefinitely — `verify` only clears the record for its own
    /// address. Returns the number of records removed.
    pub fn sweep_expired_nonces(&self, now: UnixSeconds) -> Result<u64, VitaLedgerError> {
        let _guard = self.nonce_lock.lock();
        let mut removed = 0u64;
        for record in self.storage.iter_nonces()? {
            if now > record.expires_at {
                self.storage.delete_nonce(&record.normalized_address)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
