//! Ledger primitives and their canonical cbor codec
//!
//! Every type in this crate implements [`minicbor::Encode`] and
//! [`minicbor::Decode`], so any of them can be turned into bytes or hex
//! through [`tessera_codec::Fragment`].

pub mod certificate;
pub mod governance;
pub mod metadata;
pub mod pool;
pub mod script;
pub mod transaction;
pub mod value;

pub use certificate::*;
pub use governance::*;
pub use metadata::*;
pub use pool::*;
pub use script::*;
pub use transaction::*;
pub use value::*;

pub use tessera_addresses::{Address, Network, StakeAddress};
pub use tessera_codec::utils::{AnyCbor, Bytes, Int, KeyValuePairs, Nullable, Set};
pub use tessera_codec::Fragment;
pub use tessera_crypto::hash::Hash;

use tessera_codec::minicbor::{self, data::Tag, Decode, Encode};
use thiserror::Error;

// ----- Common type definitions

pub type AddrKeyhash = Hash<28>;

pub type Coin = u64;

pub type DatumHash = Hash<32>;

pub type Epoch = u64;

pub type PolicyId = Hash<28>;

pub type PoolKeyhash = Hash<28>;

pub type ScriptHash = Hash<28>;

pub type Slot = u64;

pub type TransactionId = Hash<32>;

pub type VrfKeyhash = Hash<32>;

pub type RewardAccount = StakeAddress;

/// Identity derived from the canonical encoding of a value
pub trait ToHash<const BYTES: usize> {
    fn to_hash(&self) -> Result<Hash<BYTES>, tessera_codec::Error>;
}

/// Raised when a value is built from out-of-range parts
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error(transparent)]
    HashSize(#[from] tessera_crypto::hash::InvalidHashSize),

    #[error("asset name is {0} bytes long, the limit is 32")]
    AssetNameTooLong(usize),

    #[error("governance action index {0} exceeds {max}", max = u16::MAX)]
    GovActionIndexOutOfRange(u64),

    #[error("invalid pool id {0}")]
    InvalidPoolId(String),

    #[error("invalid native script json: {0}")]
    InvalidScriptJson(String),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Raised when a metadata value can't be carried on chain
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("metadata {kind} is {len} bytes long, the limit is 64")]
    TooLong { kind: &'static str, len: usize },

    #[error("metadata value not representable: {0}")]
    Unsupported(String),
}

#[derive(Encode, Decode, Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct ExUnits {
    #[n(0)]
    pub mem: u64,
    #[n(1)]
    pub steps: u64,
}

#[derive(Encode, Decode, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[cbor(index_only)]
pub enum NetworkId {
    #[n(0)]
    Testnet,
    #[n(1)]
    Mainnet,
}

impl From<NetworkId> for u8 {
    fn from(network_id: NetworkId) -> u8 {
        match network_id {
            NetworkId::Testnet => 0,
            NetworkId::Mainnet => 1,
        }
    }
}

impl TryFrom<Network> for NetworkId {
    type Error = Network;

    fn try_from(network: Network) -> Result<Self, Self::Error> {
        match network {
            Network::Testnet => Ok(Self::Testnet),
            Network::Mainnet => Ok(Self::Mainnet),
            other => Err(other),
        }
    }
}

/// A non-negative fraction, encoded as `#6.30([numerator, denominator])`
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct RationalNumber {
    pub numerator: u64,
    pub denominator: u64,
}

impl RationalNumber {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// `floor(self * value)`, computed without intermediate rounding
    pub fn mul_floor(&self, value: u64) -> u64 {
        if self.denominator == 0 {
            return 0;
        }

        let product = self.numerator as u128 * value as u128 / self.denominator as u128;
        u64::try_from(product).unwrap_or(u64::MAX)
    }
}

pub type UnitInterval = RationalNumber;

impl<'b, C> minicbor::decode::Decode<'b, C> for RationalNumber {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();
        let tag = d.tag()?;

        if tag.as_u64() != 30 {
            return Err(minicbor::decode::Error::message(format!(
                "expected tag 30 for rational number, found {}",
                tag.as_u64()
            ))
            .at(position));
        }

        if d.array()? != Some(2) {
            return Err(
                minicbor::decode::Error::message("rational number must have 2 elements")
                    .at(position),
            );
        }

        Ok(RationalNumber {
            numerator: d.decode_with(ctx)?,
            denominator: d.decode_with(ctx)?,
        })
    }
}

impl<C> minicbor::encode::Encode<C> for RationalNumber {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.tag(Tag::new(30))?;
        e.array(2)?;
        e.encode_with(self.numerator, ctx)?;
        e.encode_with(self.denominator, ctx)?;
        Ok(())
    }
}
