use vitaledger_core::audit::AuditEntry;
use vitaledger_core::mempool::MempoolSnapshot;
use vitaledger_core::transaction::Transaction;
use vitaledger_core::wallet::{WalletNonceRecord, WalletProfile};
use vitaledger_core::VitaLedgerError;

/// The audit tail as rehydrated from storage at startup (spec §9 "Global
/// state"): the next sequence to assign and the integrity hash the next
/// entry's `prevHash` must chain from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditTail {
    pub next_sequence: u64,
    pub last_integrity_hash: String,
}

/// Durable storage for wallets, nonces, the mempool snapshot, transactions,
/// and the audit log (spec §2 "Storage backend"). Subsystems depend on this
/// trait, never on a concrete backend, so storage can be swapped without
/// touching the Context Engine, Mempool, Audit Log, or Wallet Auth.
pub trait StorageBackend: Send + Sync {
    // ── Wallets ──────────────────────────────────────────────────────────
    fn get_wallet(&self, normalized_address: &str) -> Result<Option<WalletProfile>, VitaLedgerError>;
    fn put_wallet(&self, wallet: &WalletProfile) -> Result<(), VitaLedgerError>;
    fn iter_wallets(&self) -> Result<Vec<WalletProfile>, VitaLedgerError>;
    fn count_wallets(&self) -> Result<u64, VitaLedgerError>;

    // ── Nonces ───────────────────────────────────────────────────────────
    fn get_nonce(&self, normalized_address: &str) -> Result<Option<WalletNonceRecord>, VitaLedgerError>;
    fn put_nonce(&self, record: &WalletNonceRecord) -> Result<(), VitaLedgerError>;
    fn delete_nonce(&self, normalized_address: &str) -> Result<(), VitaLedgerError>;
    fn iter_nonces(&self) -> Result<Vec<WalletNonceRecord>, VitaLedgerError>;

    // ── Mempool snapshot ─────────────────────────────────────────────────
    fn get_mempool_snapshot(&self) -> Result<Option<MempoolSnapshot>, VitaLedgerError>;
    fn put_mempool_snapshot(&self, snapshot: &MempoolSnapshot) -> Result<(), VitaLedgerError>;

    // ── Transactions ─────────────────────────────────────────────────────
    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, VitaLedgerError>;
    fn put_transaction(&self, tx: &Transaction) -> Result<(), VitaLedgerError>;
    fn iter_transactions(&self) -> Result<Vec<Transaction>, VitaLedgerError>;

    // ── Audit log ────────────────────────────────────────────────────────
    fn append_audit_entry(&self, entry: &AuditEntry) -> Result<(), VitaLedgerError>;
    fn get_audit_entry(&self, sequence: u64) -> Result<Option<AuditEntry>, VitaLedgerError>;
    /// All entries in ascending sequence order.
    fn iter_audit_entries(&self) -> Result<Vec<AuditEntry>, VitaLedgerError>;
    fn audit_tail(&self) -> Result<Option<AuditTail>, VitaLedgerError>;
    /// Removes every entry with `sequence < before`. Returns the count removed.
    fn prune_audit_before(&self, before: u64) -> Result<u64, VitaLedgerError>;
    /// Approximate serialized byte size of the live audit log, tracked
    /// incrementally so size-rotation sweeps don't need a full scan.
    fn audit_log_size_bytes(&self) -> Result<u64, VitaLedgerError>;
    /// Moves every current entry into a timestamped archive and empties the
    /// live log, returning the archive's name.
    fn rotate_audit_log(&self, archive_timestamp: i64) -> Result<String, VitaLedgerError>;

    fn flush(&self) -> Result<(), VitaLedgerError>;
}
