//! Stake pool identifiers and registration parameters

use std::{fmt, str::FromStr};

use bech32::{FromBase32, ToBase32};
use tessera_codec::{
    minicbor::{self, Decode, Encode},
    codec_by_index,
    utils::{Bytes, Set},
};
use tessera_crypto::hash::Hash;

use crate::{AddrKeyhash, Coin, PoolKeyhash, RewardAccount, UnitInterval, ValidationError, VrfKeyhash};

const POOL_HRP: &str = "pool";

/// Identifier of a stake pool, the hash of its operator key
///
/// Parses from the bech32 `pool1...` form or from 56 hex characters and
/// displays as bech32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolId(PoolKeyhash);

impl PoolId {
    pub fn new(hash: PoolKeyhash) -> Self {
        Self(hash)
    }

    pub fn hash(&self) -> &PoolKeyhash {
        &self.0
    }

    pub fn to_bech32(&self) -> Result<String, ValidationError> {
        bech32::encode(POOL_HRP, self.0.to_base32(), bech32::Variant::Bech32)
            .map_err(|e| ValidationError::InvalidPoolId(e.to_string()))
    }
}

impl From<PoolKeyhash> for PoolId {
    fn from(hash: PoolKeyhash) -> Self {
        Self(hash)
    }
}

impl FromStr for PoolId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidPoolId(s.to_string());

        let bytes = if s.starts_with("pool1") {
            let (hrp, data, _) = bech32::decode(s).map_err(|_| invalid())?;

            if hrp != POOL_HRP {
                return Err(invalid());
            }

            Vec::<u8>::from_base32(&data).map_err(|_| invalid())?
        } else if s.len() == 56 {
            hex::decode(s).map_err(|_| invalid())?
        } else {
            return Err(invalid());
        };

        let hash = Hash::try_from(bytes.as_slice()).map_err(|_| invalid())?;
        Ok(Self(hash))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_bech32().map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl<C> minicbor::Encode<C> for PoolId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.encode_with(self.0, ctx)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for PoolId {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Self(d.decode_with(ctx)?))
    }
}

pub type Port = u32;

pub type IPv4 = Bytes;

pub type IPv6 = Bytes;

pub type DnsName = String;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum Relay {
    SingleHostAddr(Option<Port>, Option<IPv4>, Option<IPv6>),
    SingleHostName(Option<Port>, DnsName),
    MultiHostName(DnsName),
}

codec_by_index! {
    Relay,
    0 => SingleHostAddr(port, ipv4, ipv6),
    1 => SingleHostName(port, dns_name),
    2 => MultiHostName(dns_name),
}

pub type PoolMetadataHash = Hash<32>;

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetadata {
    #[n(0)]
    pub url: String,

    #[n(1)]
    pub hash: PoolMetadataHash,
}

/// Registration parameters of a stake pool
///
/// On the wire these fields are spliced directly into the registration
/// certificate array, see [`crate::Certificate::PoolRegistration`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PoolParams {
    pub operator: PoolKeyhash,
    pub vrf_keyhash: VrfKeyhash,
    pub pledge: Coin,
    pub cost: Coin,
    pub margin: UnitInterval,
    pub reward_account: RewardAccount,
    pub pool_owners: Set<AddrKeyhash>,
    pub relays: Vec<Relay>,
    pub pool_metadata: Option<PoolMetadata>,
}

impl PoolParams {
    pub(crate) const FIELDS: u64 = 9;

    pub fn pool_id(&self) -> PoolId {
        PoolId(self.operator)
    }

    pub(crate) fn encode_fields<C, W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.encode_with(self.operator, ctx)?;
        e.encode_with(self.vrf_keyhash, ctx)?;
        e.u64(self.pledge)?;
        e.u64(self.cost)?;
        e.encode_with(self.margin, ctx)?;
        e.encode_with(&self.reward_account, ctx)?;
        e.encode_with(&self.pool_owners, ctx)?;
        e.encode_with(&self.relays, ctx)?;
        e.encode_with(&self.pool_metadata, ctx)?;
        Ok(())
    }

    pub(crate) fn decode_fields<'b, C>(
        d: &mut minicbor::Decoder<'b>,
        ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        Ok(Self {
            operator: d.decode_with(ctx)?,
            vrf_keyhash: d.decode_with(ctx)?,
            pledge: d.u64()?,
            cost: d.u64()?,
            margin: d.decode_with(ctx)?,
            reward_account: d.decode_with(ctx)?,
            pool_owners: d.decode_with(ctx)?,
            relays: d.decode_with(ctx)?,
            pool_metadata: d.decode_with(ctx)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_codec::Fragment;

    const POOL: &str = "pool1mt8sdg37f2h3rypyuc77k7vxrjshtvjw04zdjlae9vdzyt9uu34";
    const POOL_HEX: &str = "dacf06a23e4aaf119024e63deb79861ca175b24e7d44d97fb92b1a22";

    #[test]
    fn pool_id_text_forms() {
        let from_bech32 = PoolId::from_str(POOL).unwrap();
        let from_hex = PoolId::from_str(POOL_HEX).unwrap();

        assert_eq!(from_bech32, from_hex);
        assert_eq!(from_hex.hash().to_string(), POOL_HEX);
        assert_eq!(from_hex.to_string(), POOL);
    }

    #[test]
    fn malformed_pool_ids() {
        for bad in ["pool1234567890abcdef", "pool1abcdefghijklmnopqrstuvwxyz", "abcd", ""] {
            assert_eq!(
                PoolId::from_str(bad),
                Err(ValidationError::InvalidPoolId(bad.to_string()))
            );
        }
    }

    #[test]
    fn relay_codes() {
        let relay = Relay::SingleHostAddr(Some(3001), Some(Bytes::from(vec![10, 0, 0, 1])), None);
        assert_eq!(relay.to_hex().unwrap(), "8400190bb9440a000001f6");
        assert_eq!(Relay::from_hex("8400190bb9440a000001f6").unwrap(), relay);

        let relay = Relay::MultiHostName("relays.example.com".into());
        assert_eq!(Relay::from_hex(&relay.to_hex().unwrap()).unwrap(), relay);
    }
}
