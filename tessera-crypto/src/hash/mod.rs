//! Blake2b hashing for ledger identifiers
//!
//! we expose two helper objects:
//!
//! * [`Hasher`] to help streaming objects or bytes into a hasher and computing
//!   a hash without allocating extra memory due to the required **CBOR**
//!   encoding of every ledger structure
//! * [`struct@Hash`] a conveniently strongly typed byte array
//!
//! Two digest sizes matter: 224 bits for key, script and policy hashes and
//! 256 bits for transaction, auxiliary data and datum hashes.
//!
//! # Example
//!
//! ```
//! use tessera_crypto::hash::Hasher;
//!
//! let mut hasher = Hasher::<224>::new();
//! hasher.input(b"my key");
//!
//! let digest = hasher.finalize();
//! # assert_eq!(
//! #   "276fd18711931e2c0e21430192dbeac0e458093cd9d1fcd7210f64b3",
//! #   hex::encode(digest)
//! # );
//! ```

#[allow(clippy::module_inception)]
mod hash;
mod hasher;
mod serde;

pub use self::{
    hash::{Hash, InvalidHashSize},
    hasher::Hasher,
};
