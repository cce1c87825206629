use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes, returned as lowercase hex (spec §3, §4.3).
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}

/// Serializes `value` as canonical JSON: object keys sorted, no fields
/// elided. `serde_json::Value` already sorts map keys when the `preserve_order`
/// feature is off, so a plain `to_string` over a `Value` built from a
/// `BTreeMap`-backed struct is canonical by construction.
pub fn canonical_json(value: &serde_json::Value) -> String {
    value.to_string()
}

/// Convenience for the audit log: canonicalize then hash.
pub fn hash_canonical(value: &serde_json::Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// `sha256(wallet.id + ":" + nonce + ":" + verifiedAt)` (spec §4.4 "Session
/// token").
pub fn session_token(wallet_id: &str, nonce: &str, verified_at: i64) -> String {
    sha256_hex(format!("{wallet_id}:{nonce}:{verified_at}").as_bytes())
}

/// `sha256(signature + ":" + message)` (spec §4.4 "Proof").
pub fn proof(signature: &str, message: &str) -> String {
    sha256_hex(format!("{signature}:{message}").as_bytes())
}
