use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature as EdSignature, Verifier as _, VerifyingKey as EdVerifyingKey};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey as K256VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::pss::{Signature as PssSignature, VerifyingKey as PssVerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier as _;
use rsa::RsaPublicKey;
use sha2::Sha256;
use sha3::{Digest, Keccak256};

use vitaledger_core::wallet::{WalletFamily, WalletProfile};
use vitaledger_core::VitaLedgerError;

/// Capability-based dispatch for signature verification (spec §9 "Signature
/// family abstraction"). Each verifier declares which wallet family it
/// covers; callers never branch on family themselves.
pub trait SignatureVerifier: Send + Sync {
    fn can_verify(&self, family: WalletFamily) -> bool;
    fn verify(
        &self,
        wallet: &WalletProfile,
        message: &str,
        signature: &str,
    ) -> Result<bool, VitaLedgerError>;
}

/// ECDSA secp256k1 over an EIP-191 personal-sign envelope, with address
/// recovery (spec §4.4 "External-signer family").
pub struct ExternalSignerVerifier;

impl SignatureVerifier for ExternalSignerVerifier {
    fn can_verify(&self, family: WalletFamily) -> bool {
        family == WalletFamily::ExternalSigner
    }

    fn verify(
        &self,
        wallet: &WalletProfile,
        message: &str,
        signature: &str,
    ) -> Result<bool, VitaLedgerError> {
        let sig_bytes = decode_bytes(signature)?;
        let recovered = recover_eth_address(message, &sig_bytes)?;
        Ok(recovered.eq_ignore_ascii_case(&wallet.normalized_address))
    }
}

/// Ed25519 or RSA-PSS over the raw message, verified against the wallet's
/// registered public key (spec §4.4 "Custom-keypair family").
pub struct CustomKeypairVerifier;

impl SignatureVerifier for CustomKeypairVerifier {
    fn can_verify(&self, family: WalletFamily) -> bool {
        family == WalletFamily::CustomKeypair
    }

    fn verify(
        &self,
        wallet: &WalletProfile,
        message: &str,
        signature: &str,
    ) -> Result<bool, VitaLedgerError> {
        let public_key = wallet
            .public_key
            .as_deref()
            .ok_or_else(|| VitaLedgerError::validation("custom-keypair wallet has no public key"))?;
        let scheme = wallet
            .metadata
            .get("scheme")
            .map(String::as_str)
            .unwrap_or("ed25519");
        let sig_bytes = decode_bytes(signature)?;
        match scheme {
            "ed25519" => verify_ed25519(public_key, message, &sig_bytes),
            "rsa-pss" => verify_rsa_pss(public_key, message, &sig_bytes),
            other => Err(VitaLedgerError::validation(format!(
                "unsupported custom-keypair scheme: {other}"
            ))),
        }
    }
}

/// The default verifier set, one per wallet family (spec §9).
pub fn default_verifiers() -> Vec<Box<dyn SignatureVerifier>> {
    vec![Box::new(ExternalSignerVerifier), Box::new(CustomKeypairVerifier)]
}

/// Dispatches to the verifier whose family matches the wallet's.
pub fn verify_signature(
    verifiers: &[Box<dyn SignatureVerifier>],
    wallet: &WalletProfile,
    message: &str,
    signature: &str,
) -> Result<bool, VitaLedgerError> {
    for verifier in verifiers {
        if verifier.can_verify(wallet.family) {
            return verifier.verify(wallet, message, signature);
        }
    }
    Err(VitaLedgerError::validation(format!(
        "no signature verifier registered for family {:?}",
        wallet.family
    )))
}

/// Accepts a signature as hex (with or without `0x` prefix) or base64
/// (spec §4.4).
fn decode_bytes(signature: &str) -> Result<Vec<u8>, VitaLedgerError> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"));
    if let Some(hex_str) = hex_part {
        return hex::decode(hex_str)
            .map_err(|e| VitaLedgerError::validation(format!("malformed hex signature: {e}")));
    }
    if trimmed.chars().all(|c| c.is_ascii_hexdigit()) && trimmed.len() % 2 == 0 {
        if let Ok(bytes) = hex::decode(trimmed) {
            return Ok(bytes);
        }
    }
    BASE64
        .decode(trimmed)
        .map_err(|e| VitaLedgerError::validation(format!("malformed base64 signature: {e}")))
}

fn eip191_digest(message: &str) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

fn recover_eth_address(message: &str, signature_bytes: &[u8]) -> Result<String, VitaLedgerError> {
    if signature_bytes.len() != 65 {
        return Err(VitaLedgerError::validation(
            "secp256k1 signature must be 65 bytes (r || s || v)",
        ));
    }
    let (rs, v) = signature_bytes.split_at(64);
    let recovery_byte = if v[0] >= 27 { v[0] - 27 } else { v[0] };
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| VitaLedgerError::validation("invalid recovery id"))?;
    let signature = K256Signature::from_slice(rs)
        .map_err(|e| VitaLedgerError::validation(format!("malformed signature: {e}")))?;
    let digest = eip191_digest(message);
    let verifying_key = K256VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|e| VitaLedgerError::validation(format!("signature recovery failed: {e}")))?;
    Ok(eth_address_from_verifying_key(&verifying_key))
}

fn eth_address_from_verifying_key(key: &K256VerifyingKey) -> String {
    let encoded = key.to_encoded_point(false);
    let bytes = encoded.as_bytes();
    let mut hasher = Keccak256::new();
    hasher.update(&bytes[1..]);
    let digest = hasher.finalize();
    format!("0x{}", hex::encode(&digest[12..]))
}

fn verify_ed25519(public_key: &str, message: &str, sig_bytes: &[u8]) -> Result<bool, VitaLedgerError> {
    let key_bytes = decode_bytes(public_key)?;
    let key_array: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| VitaLedgerError::validation("ed25519 public key must be 32 bytes"))?;
    let verifying_key = EdVerifyingKey::from_bytes(&key_array)
        .map_err(|e| VitaLedgerError::validation(format!("malformed ed25519 public key: {e}")))?;
    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| VitaLedgerError::validation("ed25519 signature must be 64 bytes"))?;
    let signature = EdSignature::from_bytes(&sig_array);
    Ok(verifying_key.verify(message.as_bytes(), &signature).is_ok())
}

fn verify_rsa_pss(public_key: &str, message: &str, sig_bytes: &[u8]) -> Result<bool, VitaLedgerError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key.trim())
        .map_err(|e| VitaLedgerError::validation(format!("malformed RSA public key: {e}")))?;
    let verifying_key: PssVerifyingKey<Sha256> = PssVerifyingKey::new(public_key);
    let signature = PssSignature::try_from(sig_bytes)
        .map_err(|e| VitaLedgerError::validation(format!("malformed RSA-PSS signature: {e}")))?;
    Ok(verifying_key.verify(message.as_bytes(), &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Signer as _;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::SigningKey as K256SigningKey;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::signature::SignatureEncoding;
    use rsa::RsaPrivateKey;
    use std::collections::BTreeMap;
    use vitaledger_core::wallet::{WalletFamily, WalletStatus};

    fn wallet_fixture(family: WalletFamily, normalized_address: &str, public_key: Option<String>) -> WalletProfile {
        WalletProfile {
            id: "wallet-1".into(),
            address: normalized_address.into(),
            normalized_address: normalized_address.into(),
            family,
            label: None,
            public_key,
            metadata: BTreeMap::new(),
            roles: vec!["clinician".into()],
            status: WalletStatus::Active,
            created_at: 0,
            updated_at: 0,
            last_seen_at: None,
        }
    }

    #[test]
    fn eip191_recovery_round_trip() {
        let signing_key = K256SigningKey::random(&mut rand::thread_rng());
        let verifying_key = *signing_key.verifying_key();
        let address = eth_address_from_verifying_key(&verifying_key);

        let message = "Sign this message to authenticate\nNonce: CAMTC-test";
        let digest = eip191_digest(message);
        let (signature, recovery_id): (K256Signature, RecoveryId) =
            signing_key.sign_prehash_recoverable(&digest).expect("sign prehash");

        let mut raw = signature.to_vec();
        raw.push(recovery_id.to_byte() + 27);

        let wallet = wallet_fixture(WalletFamily::ExternalSigner, &address, None);
        let hex_sig = format!("0x{}", hex::encode(&raw));
        assert!(ExternalSignerVerifier.verify(&wallet, message, &hex_sig).unwrap());

        let other_wallet = wallet_fixture(WalletFamily::ExternalSigner, "0xdeadbeef00000000000000000000000000000000", None);
        assert!(!ExternalSignerVerifier.verify(&other_wallet, message, &hex_sig).unwrap());
    }

    #[test]
    fn ed25519_round_trip() {
        use ed25519_dalek::SigningKey as EdSigningKey;
        let mut seed = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut seed);
        let signing_key = EdSigningKey::from_bytes(&seed);
        let public_key_hex = hex::encode(signing_key.verifying_key().to_bytes());

        let message = "Sign this message to authenticate\nNonce: CAMTC-test";
        let signature = signing_key.sign(message.as_bytes());

        let mut metadata = BTreeMap::new();
        metadata.insert("scheme".to_string(), "ed25519".to_string());
        let mut wallet = wallet_fixture(WalletFamily::CustomKeypair, "wallet-addr", Some(public_key_hex));
        wallet.metadata = metadata;

        let sig_hex = hex::encode(signature.to_bytes());
        assert!(CustomKeypairVerifier.verify(&wallet, message, &sig_hex).unwrap());
        assert!(!CustomKeypairVerifier
            .verify(&wallet, "a different message", &sig_hex)
            .unwrap());
    }

    #[test]
    fn rsa_pss_round_trip() {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("generate rsa key");
        let public_key = RsaPublicKey::from(&private_key);
        let public_key_pem = public_key
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .expect("encode pem");

        let signing_key: rsa::pss::SigningKey<Sha256> = rsa::pss::SigningKey::new(private_key);
        let message = "Sign this message to authenticate\nNonce: CAMTC-test";
        let signature = rsa::signature::Signer::sign(&signing_key, message.as_bytes());

        let mut metadata = BTreeMap::new();
        metadata.insert("scheme".to_string(), "rsa-pss".to_string());
        let mut wallet = wallet_fixture(WalletFamily::CustomKeypair, "wallet-addr", Some(public_key_pem));
        wallet.metadata = metadata;

        let sig_b64 = BASE64.encode(signature.to_bytes());
        assert!(CustomKeypairVerifier.verify(&wallet, message, &sig_b64).unwrap());
    }

    #[test]
    fn decode_bytes_accepts_hex_and_base64() {
        assert_eq!(decode_bytes("0xdeadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode_bytes("deadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode_bytes(&BASE64.encode([1, 2, 3])).unwrap(), vec![1, 2, 3]);
    }
}
