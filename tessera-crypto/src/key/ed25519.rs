//! Ed25519 and Ed25519Extended Asymmetric Keys
//!
//! [`SecretKey`] is a plain 32 byte Ed25519 seed while [`SecretKeyExtended`]
//! is the 64 byte expanded form produced by hierarchical wallets. Both sign
//! transaction bodies and yield the same kind of [`PublicKey`] and
//! [`Signature`].

use cryptoxide::ed25519::{
    self, EXTENDED_KEY_LENGTH, PRIVATE_KEY_LENGTH, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH,
};
use rand_core::{CryptoRng, RngCore};
use std::{fmt, ptr, str::FromStr};
use tessera_codec::minicbor::{self, Decode, Encode};
use thiserror::Error;

/// Ed25519 Secret Key
#[derive(Clone)]
pub struct SecretKey([u8; Self::SIZE]);

/// Ed25519 Extended Secret Key
#[derive(Clone)]
pub struct SecretKeyExtended([u8; Self::SIZE]);

/// Ed25519 Public Key. Can be used to verify a [`Signature`]. A [`PublicKey`]
/// is associated to a [`SecretKey`]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; Self::SIZE]);

/// Ed25519 Signature. Is created by a [`SecretKey`] and is verified
/// with a [`PublicKey`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature([u8; Self::SIZE]);

#[derive(Debug, Error, PartialEq)]
pub enum KeyError {
    #[error("invalid size for {kind}, expecting {expected} bytes but got {found}")]
    InvalidSize {
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid Ed25519 extended secret key format")]
    InvalidBitTweaks,

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

macro_rules! impl_size_zero {
    ($Type:ty, $Size:expr) => {
        impl $Type {
            /// This is the size of the type in bytes.
            pub const SIZE: usize = $Size;

            #[inline]
            fn zero() -> Self {
                Self([0; Self::SIZE])
            }
        }
    };
}

impl_size_zero!(SecretKey, PRIVATE_KEY_LENGTH);
impl_size_zero!(SecretKeyExtended, EXTENDED_KEY_LENGTH);
impl_size_zero!(PublicKey, PUBLIC_KEY_LENGTH);
impl_size_zero!(Signature, SIGNATURE_LENGTH);

/// Overwrites the buffer with zeros in a way the optimizer can't elide
#[inline(never)]
fn scrub(bytes: &mut [u8]) {
    for byte in bytes.iter_mut() {
        // SAFETY: `byte` is a valid, aligned and exclusive reference
        unsafe { ptr::write_volatile(byte, 0) };
    }
}

fn copy_exact<const N: usize>(kind: &'static str, value: &[u8]) -> Result<[u8; N], KeyError> {
    value.try_into().map_err(|_| KeyError::InvalidSize {
        kind,
        expected: N,
        found: value.len(),
    })
}

impl SecretKey {
    /// generate a new [`SecretKey`] with the given random number generator
    pub fn new<Rng>(mut rng: Rng) -> Self
    where
        Rng: RngCore + CryptoRng,
    {
        let mut s = Self::zero();
        rng.fill_bytes(&mut s.0);
        s
    }

    /// get the [`PublicKey`] associated to this key
    pub fn public_key(&self) -> PublicKey {
        let (mut sk, pk) = ed25519::keypair(&self.0);
        scrub(&mut sk);

        PublicKey(pk)
    }

    /// create a [`Signature`] for the given message with this [`SecretKey`].
    pub fn sign<T>(&self, msg: T) -> Signature
    where
        T: AsRef<[u8]>,
    {
        let (mut sk, _) = ed25519::keypair(&self.0);
        let signature = ed25519::signature(msg.as_ref(), &sk);
        scrub(&mut sk);

        Signature(signature)
    }

    /// Exposes the raw seed, for instance to persist it in an encrypted
    /// envelope.
    ///
    /// # Safety
    ///
    /// The returned bytes are not scrubbed on drop and bypass the opaque
    /// [`Debug`] implementation.
    #[inline]
    pub unsafe fn leak_into_bytes(key: Self) -> [u8; Self::SIZE] {
        key.0
    }
}

impl SecretKeyExtended {
    /// generate a new [`SecretKeyExtended`] with the given random number
    /// generator
    pub fn new<Rng>(mut rng: Rng) -> Self
    where
        Rng: RngCore + CryptoRng,
    {
        let mut s = Self::zero();
        rng.fill_bytes(&mut s.0);

        s.0[0] &= 0b1111_1000;
        s.0[31] &= 0b0011_1111;
        s.0[31] |= 0b0100_0000;

        debug_assert!(s.check_structure());

        s
    }

    #[inline]
    #[allow(clippy::verbose_bit_mask)]
    fn check_structure(&self) -> bool {
        (self.0[0] & 0b0000_0111) == 0
            && (self.0[31] & 0b0100_0000) == 0b0100_0000
            && (self.0[31] & 0b1000_0000) == 0
    }

    /// Retrieve a [`SecretKeyExtended`] from the given bytes, checking the
    /// scalar bit tweaks.
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Result<Self, KeyError> {
        let candidate = Self(bytes);

        if candidate.check_structure() {
            Ok(candidate)
        } else {
            Err(KeyError::InvalidBitTweaks)
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(ed25519::extended_to_public(&self.0))
    }

    pub fn sign<T: AsRef<[u8]>>(&self, msg: T) -> Signature {
        Signature(ed25519::signature_extended(msg.as_ref(), &self.0))
    }
}

impl PublicKey {
    /// verify the cryptographic [`Signature`] against the `message` and the
    /// [`PublicKey`] `self`.
    #[inline]
    pub fn verify<T>(&self, message: T, signature: &Signature) -> bool
    where
        T: AsRef<[u8]>,
    {
        ed25519::verify(message.as_ref(), &self.0, &signature.0)
    }
}

/* Drop ******************************************************************** */

impl Drop for SecretKey {
    fn drop(&mut self) {
        scrub(&mut self.0)
    }
}

impl Drop for SecretKeyExtended {
    fn drop(&mut self) {
        scrub(&mut self.0)
    }
}

/* Format ****************************************************************** */

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_ref()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_ref()))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature<Ed25519>")
            .field(&hex::encode(self.as_ref()))
            .finish()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey<Ed25519>")
            .field(&hex::encode(self.as_ref()))
            .finish()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey<Ed25519>").finish_non_exhaustive()
    }
}

impl fmt::Debug for SecretKeyExtended {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey<Ed25519Extended>")
            .finish_non_exhaustive()
    }
}

/* AsRef ******************************************************************* */

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/* Conversion ************************************************************** */

impl From<[u8; Self::SIZE]> for PublicKey {
    fn from(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<[u8; Self::SIZE]> for Signature {
    fn from(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<[u8; Self::SIZE]> for SecretKey {
    fn from(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<[u8; Self::SIZE]> for SecretKeyExtended {
    type Error = KeyError;

    fn try_from(bytes: [u8; Self::SIZE]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        copy_exact("public key", value).map(Self)
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = KeyError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        copy_exact("signature", value).map(Self)
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(s)?.as_slice())
    }
}

impl FromStr for Signature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(s)?.as_slice())
    }
}

/* Cbor ******************************************************************** */

macro_rules! impl_cbor_bytes {
    ($Type:ty) => {
        impl<C> Encode<C> for $Type {
            fn encode<W: minicbor::encode::Write>(
                &self,
                e: &mut minicbor::Encoder<W>,
                _ctx: &mut C,
            ) -> Result<(), minicbor::encode::Error<W::Error>> {
                e.bytes(&self.0)?.ok()
            }
        }

        impl<'b, C> Decode<'b, C> for $Type {
            fn decode(
                d: &mut minicbor::Decoder<'b>,
                _ctx: &mut C,
            ) -> Result<Self, minicbor::decode::Error> {
                let position = d.position();
                let bytes = d.bytes()?;

                <$Type>::try_from(bytes)
                    .map_err(|e| minicbor::decode::Error::message(e.to_string()).at(position))
            }
        }
    };
}

impl_cbor_bytes!(PublicKey);
impl_cbor_bytes!(Signature);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn extended(mut bytes: [u8; 64]) -> SecretKeyExtended {
        bytes[0] &= 0b1111_1000;
        bytes[31] &= 0b0011_1111;
        bytes[31] |= 0b0100_0000;
        SecretKeyExtended::from_bytes(bytes).unwrap()
    }

    fn bytes64() -> impl Strategy<Value = [u8; 64]> {
        proptest::collection::vec(any::<u8>(), 64).prop_map(|v| {
            let mut out = [0u8; 64];
            out.copy_from_slice(&v);
            out
        })
    }

    proptest! {
        #[test]
        fn signing_verify_works(seed in any::<[u8; 32]>(), message in any::<Vec<u8>>()) {
            let key = SecretKey::from(seed);
            let signature = key.sign(&message);

            prop_assert!(key.public_key().verify(&message, &signature));
        }

        #[test]
        fn signing_verify_works_extended(raw in bytes64(), message in any::<Vec<u8>>()) {
            let key = extended(raw);
            let signature = key.sign(&message);

            prop_assert!(key.public_key().verify(&message, &signature));
        }

        #[test]
        fn signature_does_not_verify_other_message(seed in any::<[u8; 32]>(), message in any::<Vec<u8>>()) {
            let key = SecretKey::from(seed);
            let signature = key.sign(&message);

            let mut tampered = message.clone();
            tampered.push(0);
            prop_assert!(!key.public_key().verify(&tampered, &signature));
        }

        #[test]
        fn public_key_try_from_incorrect_size(bytes in any::<Vec<u8>>()) {
            prop_assume!(bytes.len() != PublicKey::SIZE);
            let is_size_error = matches!(
                PublicKey::try_from(bytes.as_slice()),
                Err(KeyError::InvalidSize { .. })
            );
            prop_assert!(is_size_error);
        }
    }

    #[test]
    fn extended_key_rejects_bad_tweaks() {
        assert_eq!(
            SecretKeyExtended::from_bytes([0; 64]).unwrap_err(),
            KeyError::InvalidBitTweaks
        );
    }

    #[test]
    fn public_key_hex_and_cbor() {
        let hex = "6443a101bdb948366fc87369336224595d36d8b0eee5602cba8b81a024e58473";
        let key: PublicKey = hex.parse().unwrap();
        assert_eq!(key.to_string(), hex);

        let cbor = minicbor::to_vec(key).unwrap();
        assert_eq!(hex::encode(&cbor), format!("5820{hex}"));
        assert_eq!(minicbor::decode::<PublicKey>(&cbor).unwrap(), key);
    }

    #[test]
    fn secret_debug_is_opaque() {
        let key = SecretKey::from([42; 32]);
        assert_eq!(format!("{key:?}"), "SecretKey<Ed25519> { .. }");
    }
}
