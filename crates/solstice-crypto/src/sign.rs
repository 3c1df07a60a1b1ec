use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1, SecretKey};
use thiserror::Error;

use solstice_core::{PublicKeyType, Signature};

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid digest length")]
    InvalidDigest,
    #[error("signature recovery failed: {0}")]
    RecoveryFailed(#[from] secp256k1::Error),
}

pub type SolsticeSignature = Signature;

/// Sign a 32-byte digest with a recoverable ECDSA signature, so §4.2 step 5
/// ("recover a public key against the digest") can reconstruct the signer's
/// public key without it being attached separately.
pub fn sign(secret_bytes: &[u8; 32], digest: &[u8; 32]) -> SolsticeSignature {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(secret_bytes).expect("valid secret key");
    let message = Message::from_digest(*digest);
    let recoverable = secp.sign_ecdsa_recoverable(&message, &secret_key);
    let (recovery_id, compact) = recoverable.serialize_compact();
    let mut bytes = [0u8; 65];
    bytes[..64].copy_from_slice(&compact);
    bytes[64] = recovery_id.to_i32() as u8;
    Signature(bytes)
}

/// Recover the public key a signature was produced with, over the given
/// digest — used by the transaction processor to populate the "available
/// signer" set (§4.2 step 5).
pub fn recover_public_key(
    signature: &Signature,
    digest: &[u8; 32],
) -> Result<PublicKeyType, SignatureError> {
    let secp = Secp256k1::new();
    let recovery_id = RecoveryId::from_i32(signature.0[64] as i32)?;
    let recoverable = RecoverableSignature::from_compact(&signature.0[..64], recovery_id)?;
    let message = Message::from_digest(*digest);
    let public_key = secp.recover_ecdsa(&message, &recoverable)?;
    Ok(PublicKeyType(public_key.serialize()))
}

/// Verify a signature was produced by `key` over `digest` (non-recovering
/// check, used where the signer's key is already known rather than derived).
pub fn verify(signature: &Signature, digest: &[u8; 32], key: &PublicKeyType) -> bool {
    match recover_public_key(signature, digest) {
        Ok(recovered) => recovered.0 == key.0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::KeyPair;

    #[test]
    fn sign_then_recover_round_trips() {
        let kp = KeyPair::generate();
        let digest = [7u8; 32];
        let sig = kp.sign(&digest);
        let recovered = recover_public_key(&sig, &digest).unwrap();
        assert_eq!(recovered.0, kp.public_key.0);
        assert!(verify(&sig, &digest, &kp.public_key));
    }

    #[test]
    fn tampered_digest_rejected() {
        let kp = KeyPair::generate();
        let digest = [7u8; 32];
        let sig = kp.sign(&digest);
        let other_digest = [8u8; 32];
        assert!(!verify(&sig, &other_digest, &kp.public_key));
    }
}
