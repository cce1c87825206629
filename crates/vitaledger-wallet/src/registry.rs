use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use vitaledger_core::types::UnixSeconds;
use vitaledger_core::wallet::{WalletFamily, WalletProfile, WalletStatus};
use vitaledger_core::VitaLedgerError;
use vitaledger_storage::StorageBackend;

/// Input to `register` (spec §4.5).
#[derive(Clone, Debug)]
pub struct RegisterInput {
    pub address: String,
    pub family: WalletFamily,
    pub label: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub public_key: Option<String>,
}

pub(crate) fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Durable keyed map from normalized address to wallet profile (spec
/// §4.5). Single-writer: mutations take the lock; reads go straight to
/// storage, which always holds a consistent snapshot of the map.
pub struct WalletRegistry {
    storage: Arc<dyn StorageBackend>,
    write_lock: Mutex<()>,
}

impl WalletRegistry {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage, write_lock: Mutex::new(()) }
    }

    pub fn get(&self, normalized_address: &str) -> Result<Option<WalletProfile>, VitaLedgerError> {
        self.storage.get_wallet(normalized_address)
    }

    pub fn count(&self) -> Result<u64, VitaLedgerError> {
        self.storage.count_wallets()
    }

    /// Idempotent by normalized address: a second call with an
    /// already-registered address returns the existing profile untouched
    /// rather than creating a second row (spec §4.5, §8 property 8).
    pub fn register(&self, input: RegisterInput, now: UnixSeconds) -> Result<WalletProfile, VitaLedgerError> {
        let normalized = normalize_address(&input.address);
        if input.family == WalletFamily::CustomKeypair && input.public_key.is_none() {
            return Err(VitaLedgerError::validation(
                "custom-keypair wallets require an explicit public key",
            ));
        }

        let _guard = self.write_lock.lock();
        if let Some(existing) = self.storage.get_wallet(&normalized)? {
            return Ok(existing);
        }

        let id = format!("wallet-{}", &vitaledger_crypto::sha256_hex(normalized.as_bytes())[..16]);
        let profile = WalletProfile {
            id,
            address: input.address,
            normalized_address: normalized,
            family: input.family,
            label: input.label,
            public_key: input.public_key,
            metadata: input.metadata,
            roles: WalletProfile::default_roles(),
            status: WalletStatus::Active,
            created_at: now,
            updated_at: now,
            last_seen_at: None,
        };
        self.storage.put_wallet(&profile)?;
        Ok(profile)
    }

    /// Updates `lastSeenAt` (spec §4.5 `touch`).
    pub fn touch(&self, normalized_address: &str, now: UnixSeconds) -> Result<WalletProfile, VitaLedgerError> {
        let _guard = self.write_lock.lock();
        let mut wallet = self
            .storage
            .get_wallet(normalized_address)?
            .ok_or_else(|| VitaLedgerError::NotFound(format!("wallet {normalized_address}")))?;
        wallet.last_seen_at = Some(now);
        wallet.updated_at = now;
        self.storage.put_wallet(&wallet)?;
        Ok(wallet)
    }

    /// Transitions status among {active, revoked, suspended} (spec §4.5
    /// `setStatus`).
    pub fn set_status(
        &self,
        normalized_address: &str,
        status: WalletStatus,
        now: UnixSeconds,
    ) -> Result<WalletProfile, VitaLedgerError> {
        let _guard = self.write_lock.lock();
        let mut wallet = self
            .storage
            .get_wallet(normalized_address)?
            .ok_or_else(|| VitaLedgerError::NotFound(format!("wallet {normalized_address}")))?;
        wallet.status = status;
        wallet.updated_at = now;
        self.storage.put_wallet(&wallet)?;
        Ok(wallet)
    }
}
