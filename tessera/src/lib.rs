//! Building blocks for assembling, balancing and signing UTxO transactions
//!
//! Tessera is a collection of crates covering the offline half of a wallet:
//! the canonical cbor codec, the ledger value types, addresses and keys, and
//! a transaction builder that selects inputs, estimates fees and computes
//! change against a pluggable chain context. This crate only re-exports them
//! under a single roof.

#![warn(missing_docs)]

#[doc(inline)]
pub use tessera_codec as codec;

#[doc(inline)]
pub use tessera_crypto as crypto;

pub mod ledger {
    //! Ledger primitives and addresses

    #[doc(inline)]
    pub use tessera_primitives as primitives;

    #[doc(inline)]
    pub use tessera_addresses as addresses;
}

pub mod wallet {
    //! Utilities for wallet implementations

    #[doc(inline)]
    pub use tessera_txbuilder as txbuilder;
}

#[doc(inline)]
pub use tessera_txbuilder as txbuilder;
