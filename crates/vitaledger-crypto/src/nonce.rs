use uuid::Uuid;

/// Generates a fresh wallet challenge nonce in the `CAMTC-<uuid-v4>` form
/// required by spec §4.4.
pub fn generate_nonce() -> String {
    format!("CAMTC-{}", Uuid::new_v4())
}
