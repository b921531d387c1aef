//! Keys used to witness transactions

pub mod ed25519;

use crate::hash::{Hash, Hasher};
use ed25519::{PublicKey, Signature};

/// Anything able to produce an Ed25519 signature over a transaction body
///
/// Both plain and extended secret keys implement this so that callers can
/// hand a heterogeneous list of keys to a signing routine.
pub trait Signer {
    fn public_key(&self) -> PublicKey;

    fn sign(&self, msg: &[u8]) -> Signature;

    /// Blake2b-224 digest of the verification key
    fn key_hash(&self) -> Hash<28> {
        self.public_key().key_hash()
    }
}

impl Signer for ed25519::SecretKey {
    fn public_key(&self) -> PublicKey {
        ed25519::SecretKey::public_key(self)
    }

    fn sign(&self, msg: &[u8]) -> Signature {
        ed25519::SecretKey::sign(self, msg)
    }
}

impl Signer for ed25519::SecretKeyExtended {
    fn public_key(&self) -> PublicKey {
        ed25519::SecretKeyExtended::public_key(self)
    }

    fn sign(&self, msg: &[u8]) -> Signature {
        ed25519::SecretKeyExtended::sign(self, msg)
    }
}

impl PublicKey {
    /// Blake2b-224 digest of the key bytes, as found in addresses and
    /// required signer lists
    pub fn key_hash(&self) -> Hash<28> {
        Hasher::<224>::hash(self.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_hash_is_blake2b_224_of_the_key() {
        let key: PublicKey = "6443a101bdb948366fc87369336224595d36d8b0eee5602cba8b81a024e58473"
            .parse()
            .unwrap();

        assert_eq!(
            key.key_hash().to_string(),
            "9139e5c0a42f0f2389634c3dd18dc621f5594c5ba825d9a8883c6627"
        );
    }

    #[test]
    fn signers_agree_with_their_public_key() {
        let signers: Vec<Box<dyn Signer>> = vec![
            Box::new(ed25519::SecretKey::from([7; 32])),
            Box::new(ed25519::SecretKeyExtended::from_bytes([0x40; 64]).unwrap()),
        ];

        for signer in signers {
            let signature = signer.sign(b"body");
            assert!(signer.public_key().verify(b"body", &signature));
            assert_eq!(signer.key_hash(), signer.public_key().key_hash());
        }
    }
}
