pub mod hash;
pub mod nonce;
pub mod signature;

pub use hash::{canonical_json, hash_canonical, proof, session_token, sha256_hex};
pub use nonce::generate_nonce;
pub use signature::{default_verifiers, verify_signature, SignatureVerifier};
