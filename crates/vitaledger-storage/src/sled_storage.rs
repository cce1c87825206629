use std::path::Path;

use vitaledger_core::audit::AuditEntry;
use vitaledger_core::mempool::MempoolSnapshot;
use vitaledger_core::transaction::Transaction;
use vitaledger_core::wallet::{WalletNonceRecord, WalletProfile};
use vitaledger_core::VitaLedgerError;

use crate::backend::{AuditTail, StorageBackend};

const MEMPOOL_SNAPSHOT_KEY: &[u8] = b"snapshot";
const META_AUDIT_BYTES_KEY: &str = "audit_log_bytes";

fn storage_err(e: sled::Error) -> VitaLedgerError {
    VitaLedgerError::Storage(e.to_string())
}

fn ser_err(e: bincode::Error) -> VitaLedgerError {
    VitaLedgerError::Serialization(e.to_string())
}

fn json_err(e: serde_json::Error) -> VitaLedgerError {
    VitaLedgerError::Serialization(e.to_string())
}

/// Persistent storage backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   wallets      — normalized address bytes → bincode(WalletProfile)
///   nonces       — normalized address bytes → bincode(WalletNonceRecord)
///   mempool      — single fixed key         → json(MempoolSnapshot)
///   transactions — tx id bytes              → json(Transaction)
///   audit        — sequence be bytes        → bincode(AuditEntry)
///   meta         — utf8 key bytes           → raw bytes
///
/// `Transaction` and `MempoolSnapshot` embed `PayloadValue`, an
/// untagged enum (spec §9 "Dynamic payloads") that requires a
/// self-describing format to deserialize — `bincode` has no
/// `deserialize_any` and cannot round-trip it. Everything else has no
/// untagged data and stays on `bincode`.
pub struct SledStorage {
    db: sled::Db,
    wallets: sled::Tree,
    nonces: sled::Tree,
    mempool: sled::Tree,
    transactions: sled::Tree,
    audit: sled::Tree,
    meta: sled::Tree,
}

impl SledStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VitaLedgerError> {
        let db = sled::open(path).map_err(storage_err)?;
        let wallets = db.open_tree("wallets").map_err(storage_err)?;
        let nonces = db.open_tree("nonces").map_err(storage_err)?;
        let mempool = db.open_tree("mempool").map_err(storage_err)?;
        let transactions = db.open_tree("transactions").map_err(storage_err)?;
        let audit = db.open_tree("audit").map_err(storage_err)?;
        let meta = db.open_tree("meta").map_err(storage_err)?;
        Ok(Self { db, wallets, nonces, mempool, transactions, audit, meta })
    }

    fn meta_u64(&self, key: &str) -> Result<u64, VitaLedgerError> {
        match self.meta.get(key.as_bytes()).map_err(storage_err)? {
            Some(bytes) if bytes.len() == 8 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(u64::from_be_bytes(arr))
            }
            _ => Ok(0),
        }
    }

    fn put_meta_u64(&self, key: &str, value: u64) -> Result<(), VitaLedgerError> {
        self.meta
            .insert(key.as_bytes(), &value.to_be_bytes())
            .map_err(storage_err)?;
        Ok(())
    }
}

impl StorageBackend for SledStorage {
    fn get_wallet(&self, normalized_address: &str) -> Result<Option<WalletProfile>, VitaLedgerError> {
        match self.wallets.get(normalized_address.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn put_wallet(&self, wallet: &WalletProfile) -> Result<(), VitaLedgerError> {
        let bytes = bincode::serialize(wallet).map_err(ser_err)?;
        self.wallets
            .insert(wallet.normalized_address.as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    fn iter_wallets(&self) -> Result<Vec<WalletProfile>, VitaLedgerError> {
        let mut out = Vec::new();
        for item in self.wallets.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(ser_err)?);
        }
        Ok(out)
    }

    fn count_wallets(&self) -> Result<u64, VitaLedgerError> {
        Ok(self.wallets.len() as u64)
    }

    fn get_nonce(&self, normalized_address: &str) -> Result<Option<WalletNonceRecord>, VitaLedgerError> {
        match self.nonces.get(normalized_address.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn put_nonce(&self, record: &WalletNonceRecord) -> Result<(), VitaLedgerError> {
        let bytes = bincode::serialize(record).map_err(ser_err)?;
        self.nonces
            .insert(record.normalized_address.as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    fn delete_nonce(&self, normalized_address: &str) -> Result<(), VitaLedgerError> {
        self.nonces.remove(normalized_address.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    fn iter_nonces(&self) -> Result<Vec<WalletNonceRecord>, VitaLedgerError> {
        let mut out = Vec::new();
        for item in self.nonces.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(ser_err)?);
        }
        Ok(out)
    }

    fn get_mempool_snapshot(&self) -> Result<Option<MempoolSnapshot>, VitaLedgerError> {
        match self.mempool.get(MEMPOOL_SNAPSHOT_KEY).map_err(storage_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(json_err)?)),
            None => Ok(None),
        }
    }

    fn put_mempool_snapshot(&self, snapshot: &MempoolSnapshot) -> Result<(), VitaLedgerError> {
        let bytes = serde_json::to_vec(snapshot).map_err(json_err)?;
        self.mempool.insert(MEMPOOL_SNAPSHOT_KEY, bytes).map_err(storage_err)?;
        Ok(())
    }

    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, VitaLedgerError> {
        match self.transactions.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(json_err)?)),
            None => Ok(None),
        }
    }

    fn put_transaction(&self, tx: &Transaction) -> Result<(), VitaLedgerError> {
        let bytes = serde_json::to_vec(tx).map_err(json_err)?;
        self.transactions.insert(tx.id.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    fn iter_transactions(&self) -> Result<Vec<Transaction>, VitaLedgerError> {
        let mut out = Vec::new();
        for item in self.transactions.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(serde_json::from_slice(&bytes).map_err(json_err)?);
        }
        Ok(out)
    }

    fn append_audit_entry(&self, entry: &AuditEntry) -> Result<(), VitaLedgerError> {
        let bytes = bincode::serialize(entry).map_err(ser_err)?;
        let key = entry.sequence.to_be_bytes();
        self.audit.insert(key, bytes.clone()).map_err(storage_err)?;
        let current = self.meta_u64(META_AUDIT_BYTES_KEY)?;
        self.put_meta_u64(META_AUDIT_BYTES_KEY, current + bytes.len() as u64)?;
        Ok(())
    }

    fn get_audit_entry(&self, sequence: u64) -> Result<Option<AuditEntry>, VitaLedgerError> {
        match self.audit.get(sequence.to_be_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn iter_audit_entries(&self) -> Result<Vec<AuditEntry>, VitaLedgerError> {
        let mut out = Vec::new();
        for item in self.audit.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(ser_err)?);
        }
        Ok(out)
    }

    fn audit_tail(&self) -> Result<Option<AuditTail>, VitaLedgerError> {
        match self.audit.last().map_err(storage_err)? {
            Some((_, bytes)) => {
                let entry: AuditEntry = bincode::deserialize(&bytes).map_err(ser_err)?;
                Ok(Some(AuditTail {
                    next_sequence: entry.sequence + 1,
                    last_integrity_hash: entry.integrity_hash,
                }))
            }
            None => Ok(None),
        }
    }

    fn prune_audit_before(&self, before: u64) -> Result<u64, VitaLedgerError> {
        let mut removed = 0u64;
        let mut keys_to_remove = Vec::new();
        for item in self.audit.range(..before.to_be_bytes().to_vec()) {
            let (key, _) = item.map_err(storage_err)?;
            keys_to_remove.push(key);
        }
        for key in keys_to_remove {
            self.audit.remove(key).map_err(storage_err)?;
            removed += 1;
        }
        Ok(removed)
    }

    fn audit_log_size_bytes(&self) -> Result<u64, VitaLedgerError> {
        self.meta_u64(META_AUDIT_BYTES_KEY)
    }

    fn rotate_audit_log(&self, archive_timestamp: i64) -> Result<String, VitaLedgerError> {
        let archive_name = format!("audit_archive_{archive_timestamp}");
        let archive = self.db.open_tree(&archive_name).map_err(storage_err)?;
        for item in self.audit.iter() {
            let (key, value) = item.map_err(storage_err)?;
            archive.insert(key, value).map_err(storage_err)?;
        }
        self.audit.clear().map_err(storage_err)?;
        self.put_meta_u64(META_AUDIT_BYTES_KEY, 0)?;
        Ok(archive_name)
    }

    fn flush(&self) -> Result<(), VitaLedgerError> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }
}
