//! ─── VitaLedger Protocol Constants ──────────────────────────────────────────

/// Default wallet nonce TTL (spec §4.4), overridable via
/// `WALLET_NONCE_TTL_SECONDS`.
pub const DEFAULT_WALLET_NONCE_TTL_SECONDS: i64 = 300;

/// Default query page size for `/transactions` and `/audit` (spec §6).
pub const DEFAULT_QUERY_LIMIT: usize = 100;
pub const MAX_QUERY_LIMIT: usize = 1000;
pub const MAX_AUDIT_QUERY_LIMIT: usize = 1000;

/// Default API path prefix (spec §6).
pub const DEFAULT_API_PREFIX: &str = "/api";
