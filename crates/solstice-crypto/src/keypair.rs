use std::fmt;

use rand::rngs::OsRng;
use secp256k1::{Secp256k1, SecretKey};
use zeroize::Zeroizing;

use solstice_core::{Address, PublicKeyType};

use crate::hash::address_from_public_key;

/// An secp256k1 keypair. The secret key is wrapped in `Zeroizing` so it is
/// wiped from memory on drop; `Debug` never prints it.
pub struct KeyPair {
    secret: Zeroizing<[u8; 32]>,
    pub public_key: PublicKeyType,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        KeyPair {
            secret: Zeroizing::new(secret_key.secret_bytes()),
            public_key: PublicKeyType(public_key.serialize()),
        }
    }

    pub fn from_raw(secret_bytes: [u8; 32]) -> Result<Self, secp256k1::Error> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&secret_bytes)?;
        let public_key = secret_key.public_key(&secp);
        Ok(KeyPair {
            secret: Zeroizing::new(secret_bytes),
            public_key: PublicKeyType(public_key.serialize()),
        })
    }

    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key)
    }

    pub fn sign(&self, digest: &[u8; 32]) -> crate::sign::SolsticeSignature {
        crate::sign::sign(&self.secret, digest)
    }

    pub(crate) fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_round_trips_through_raw() {
        let kp = KeyPair::generate();
        let raw = *kp.secret_bytes();
        let kp2 = KeyPair::from_raw(raw).unwrap();
        assert_eq!(kp.public_key.0, kp2.public_key.0);
    }
}
