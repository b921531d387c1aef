//! Interact with ledger addresses of any type
//!
//! This crate decodes and encodes addresses from and to their binary, bech32
//! and base58 forms. The entry point to most of the methods is the [Address]
//! enum, which holds the decoded values of either a Byron, Shelley or Stake
//! address.
//!
//! The binary layout follows [CIP-19](https://cips.cardano.org/cips/cip19/):
//! a header byte `type << 4 | network` followed by the credential hashes.

pub mod byron;
pub mod varuint;

use std::{fmt, io::Cursor, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tessera_codec::minicbor;
use tessera_crypto::hash::Hash;
use thiserror::Error;

pub use byron::ByronAddress;

#[derive(Error, Debug)]
pub enum Error {
    #[error("error converting from/to bech32 {0}")]
    BadBech32(bech32::Error),

    #[error("error decoding base58 {0:?}")]
    BadBase58(base58::FromBase58Error),

    #[error("error decoding hex {0}")]
    BadHex(hex::FromHexError),

    #[error("address header not found")]
    MissingHeader,

    #[error("address header is invalid {0:08b}")]
    InvalidHeader(u8),

    #[error("invalid operation for Byron address")]
    InvalidForByron,

    #[error("invalid byron address cbor: {0}")]
    InvalidByronCbor(String),

    #[error("unknown hrp for network {0:08b}")]
    UnknownNetworkHrp(u8),

    #[error("unexpected payload length {found} for address type {typeid}")]
    InvalidPayloadLength { typeid: u8, found: usize },

    #[error("variable-length uint error: {0}")]
    VarUintError(varuint::Error),

    #[error("unrecognized address string {0}")]
    Unrecognized(String),
}

pub type PaymentKeyHash = Hash<28>;

pub type StakeKeyHash = Hash<28>;

pub type ScriptHash = Hash<28>;

pub type Slot = u64;
pub type TxIdx = u64;
pub type CertIdx = u64;

/// Location of the certificate registering a stake key, encoded as three
/// varuints
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pointer {
    pub slot: Slot,
    pub tx_index: TxIdx,
    pub cert_index: CertIdx,
}

impl Pointer {
    fn decode(typeid: u8, bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = Cursor::new(bytes);

        let slot = varuint::read(&mut cursor).map_err(Error::VarUintError)?;
        let tx_index = varuint::read(&mut cursor).map_err(Error::VarUintError)?;
        let cert_index = varuint::read(&mut cursor).map_err(Error::VarUintError)?;

        if cursor.position() as usize != bytes.len() {
            return Err(Error::InvalidPayloadLength {
                typeid,
                found: bytes.len() + 28,
            });
        }

        Ok(Pointer {
            slot,
            tx_index,
            cert_index,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        for x in [self.slot, self.tx_index, self.cert_index] {
            varuint::write(out, x);
        }
    }
}

fn slice_to_hash(typeid: u8, slice: &[u8]) -> Result<Hash<28>, Error> {
    Hash::try_from(slice).map_err(|_| Error::InvalidPayloadLength {
        typeid,
        found: slice.len(),
    })
}

/// The payment part of a Shelley address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShelleyPaymentPart {
    Key(PaymentKeyHash),
    Script(ScriptHash),
}

impl ShelleyPaymentPart {
    /// Get a reference to the inner hash of this address part
    pub fn as_hash(&self) -> &Hash<28> {
        match self {
            Self::Key(x) => x,
            Self::Script(x) => x,
        }
    }

    /// Indicates if this is the hash of a script
    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script(_))
    }
}

/// The delegation part of a Shelley address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShelleyDelegationPart {
    Key(StakeKeyHash),
    Script(ScriptHash),
    Pointer(Pointer),
    Null,
}

impl ShelleyDelegationPart {
    /// Get a reference to the inner hash of this address part, if it has one
    pub fn as_hash(&self) -> Option<&Hash<28>> {
        match self {
            Self::Key(x) => Some(x),
            Self::Script(x) => Some(x),
            Self::Pointer(_) | Self::Null => None,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, ShelleyDelegationPart::Script(_))
    }
}

/// The payload of a Stake address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StakePayload {
    Stake(StakeKeyHash),
    Script(ScriptHash),
}

impl StakePayload {
    pub fn as_hash(&self) -> &Hash<28> {
        match self {
            Self::Stake(x) => x,
            Self::Script(x) => x,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, StakePayload::Script(_))
    }
}

impl AsRef<[u8]> for StakePayload {
    fn as_ref(&self) -> &[u8] {
        self.as_hash().as_ref()
    }
}

/// The network tag of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Mainnet,
    Other(u8),
}

impl Network {
    pub fn value(&self) -> u8 {
        match self {
            Network::Testnet => 0,
            Network::Mainnet => 1,
            Network::Other(x) => *x,
        }
    }
}

impl From<u8> for Network {
    fn from(id: u8) -> Self {
        match id {
            0 => Network::Testnet,
            1 => Network::Mainnet,
            x => Network::Other(x),
        }
    }
}

/// A decoded Shelley address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShelleyAddress(Network, ShelleyPaymentPart, ShelleyDelegationPart);

/// A decoded Stake address
///
/// Stake addresses are ordered by their raw bytes, which is the order they
/// take as keys of a canonical withdrawal map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StakeAddress(Network, StakePayload);

impl Ord for StakeAddress {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_header()
            .cmp(&other.to_header())
            .then_with(|| self.1.as_hash().cmp(other.1.as_hash()))
    }
}

impl PartialOrd for StakeAddress {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A decoded address of any type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Address {
    Byron(ByronAddress),
    Shelley(ShelleyAddress),
    Stake(StakeAddress),
}

fn encode_bech32(addr: &[u8], hrp: &str) -> Result<String, Error> {
    let base32 = bech32::ToBase32::to_base32(&addr);
    bech32::encode(hrp, base32, bech32::Variant::Bech32).map_err(Error::BadBech32)
}

fn decode_bech32(bech32: &str) -> Result<(String, Vec<u8>), Error> {
    let (hrp, addr, _) = bech32::decode(bech32).map_err(Error::BadBech32)?;
    let base10 = bech32::FromBase32::from_base32(&addr).map_err(Error::BadBech32)?;
    Ok((hrp, base10))
}

fn parse_network(header: u8) -> Network {
    Network::from(header & 0b0000_1111)
}

/// Types 0 to 7: bit 0 flags a payment script, bits 1-2 pick the delegation
/// kind (key, script, pointer, none)
fn parse_shelley(header: u8, payload: &[u8]) -> Result<Address, Error> {
    let typeid = header >> 4;

    let expected = match typeid & 0b110 {
        0b000 | 0b010 => payload.len() == 56,
        0b100 => payload.len() > 28,
        _ => payload.len() == 28,
    };

    if !expected {
        return Err(Error::InvalidPayloadLength {
            typeid,
            found: payload.len(),
        });
    }

    let (payment, rest) = payload.split_at(28);
    let payment = slice_to_hash(typeid, payment)?;

    let payment = match typeid & 0b001 {
        0 => ShelleyPaymentPart::Key(payment),
        _ => ShelleyPaymentPart::Script(payment),
    };

    let delegation = match typeid & 0b110 {
        0b000 => ShelleyDelegationPart::Key(slice_to_hash(typeid, rest)?),
        0b010 => ShelleyDelegationPart::Script(slice_to_hash(typeid, rest)?),
        0b100 => ShelleyDelegationPart::Pointer(Pointer::decode(typeid, rest)?),
        _ => ShelleyDelegationPart::Null,
    };

    Ok(ShelleyAddress(parse_network(header), payment, delegation).into())
}

/// Types 14 and 15, a stake key or script hash
fn parse_stake(header: u8, payload: &[u8]) -> Result<Address, Error> {
    let hash = slice_to_hash(header >> 4, payload)?;

    let payload = match header & 0b0001_0000 {
        0 => StakePayload::Stake(hash),
        _ => StakePayload::Script(hash),
    };

    Ok(StakeAddress(parse_network(header), payload).into())
}

fn bytes_to_address(bytes: &[u8]) -> Result<Address, Error> {
    let (&header, payload) = bytes.split_first().ok_or(Error::MissingHeader)?;

    match header >> 4 {
        0..=7 => parse_shelley(header, payload),
        8 => ByronAddress::from_bytes(bytes).map(Address::Byron),
        14 | 15 => parse_stake(header, payload),
        _ => Err(Error::InvalidHeader(header)),
    }
}

fn bech32_to_address(bech32: &str) -> Result<Address, Error> {
    let (_, bytes) = decode_bech32(bech32)?;
    bytes_to_address(&bytes)
}

impl ShelleyAddress {
    pub fn new(
        network: Network,
        payment: ShelleyPaymentPart,
        delegation: ShelleyDelegationPart,
    ) -> Self {
        Self(network, payment, delegation)
    }

    /// Gets the network assoaciated with this address
    pub fn network(&self) -> Network {
        self.0
    }

    /// Header nibble: payment script flag in bit 0, delegation kind in
    /// bits 1-2
    pub fn typeid(&self) -> u8 {
        let delegation = match &self.2 {
            ShelleyDelegationPart::Key(_) => 0b000,
            ShelleyDelegationPart::Script(_) => 0b010,
            ShelleyDelegationPart::Pointer(_) => 0b100,
            ShelleyDelegationPart::Null => 0b110,
        };

        delegation | u8::from(self.1.is_script())
    }

    pub fn to_header(&self) -> u8 {
        (self.typeid() << 4) | self.0.value()
    }

    pub fn payment(&self) -> &ShelleyPaymentPart {
        &self.1
    }

    pub fn delegation(&self) -> &ShelleyDelegationPart {
        &self.2
    }

    /// Gets the bech32 human-readable-part for this address
    pub fn hrp(&self) -> Result<&'static str, Error> {
        match &self.0 {
            Network::Testnet => Ok("addr_test"),
            Network::Mainnet => Ok("addr"),
            Network::Other(x) => Err(Error::UnknownNetworkHrp(*x)),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![self.to_header()];
        out.extend_from_slice(self.1.as_hash().as_ref());

        match &self.2 {
            ShelleyDelegationPart::Pointer(x) => x.encode(&mut out),
            other => {
                if let Some(hash) = other.as_hash() {
                    out.extend_from_slice(hash.as_ref());
                }
            }
        }

        out
    }

    /// Indicates if either the payment or delegation part is a script
    pub fn has_script(&self) -> bool {
        self.payment().is_script() || self.delegation().is_script()
    }

    /// The reward account matching the delegation part, when it is a hash
    pub fn stake_address(&self) -> Option<StakeAddress> {
        match &self.2 {
            ShelleyDelegationPart::Key(x) => Some(StakeAddress(self.0, StakePayload::Stake(*x))),
            ShelleyDelegationPart::Script(x) => {
                Some(StakeAddress(self.0, StakePayload::Script(*x)))
            }
            _ => None,
        }
    }
}

impl StakeAddress {
    pub fn new(network: Network, payload: StakePayload) -> Self {
        Self(network, payload)
    }

    /// Gets the network assoaciated with this address
    pub fn network(&self) -> Network {
        self.0
    }

    /// Gets a numeric id describing the type of the address
    pub fn typeid(&self) -> u8 {
        match &self.1 {
            StakePayload::Stake(_) => 0b1110,
            StakePayload::Script(_) => 0b1111,
        }
    }

    /// Builds the header for this address
    pub fn to_header(&self) -> u8 {
        (self.typeid() << 4) | self.0.value()
    }

    /// Gets the payload of this address
    pub fn payload(&self) -> &StakePayload {
        &self.1
    }

    /// Gets the bech32 human-readable-part for this address
    pub fn hrp(&self) -> Result<&'static str, Error> {
        match &self.0 {
            Network::Testnet => Ok("stake_test"),
            Network::Mainnet => Ok("stake"),
            Network::Other(x) => Err(Error::UnknownNetworkHrp(*x)),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        [&[self.to_header()], self.1.as_ref()].concat()
    }

    pub fn to_bech32(&self) -> Result<String, Error> {
        encode_bech32(&self.to_vec(), self.hrp()?)
    }

    pub fn is_script(&self) -> bool {
        self.payload().is_script()
    }
}

impl Address {
    /// Tries to encode an Address into a bech32 string
    pub fn to_bech32(&self) -> Result<String, Error> {
        match self {
            Address::Byron(_) => Err(Error::InvalidForByron),
            Address::Shelley(x) => encode_bech32(&x.to_vec(), x.hrp()?),
            Address::Stake(x) => x.to_bech32(),
        }
    }

    /// Tries to parse a bech32 address into an Address
    pub fn from_bech32(bech32: &str) -> Result<Self, Error> {
        bech32_to_address(bech32)
    }

    /// Decodes the raw binary form of any address type
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        bytes_to_address(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(Error::BadHex)?;
        bytes_to_address(&bytes)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        match self {
            Address::Byron(x) => x.to_vec(),
            Address::Shelley(x) => x.to_vec(),
            Address::Stake(x) => x.to_vec(),
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_vec())
    }

    /// Gets the network assoaciated with this address
    pub fn network(&self) -> Option<Network> {
        match self {
            Address::Byron(_) => None,
            Address::Shelley(x) => Some(x.network()),
            Address::Stake(x) => Some(x.network()),
        }
    }

    /// Gets a numeric id describing the type of the address
    pub fn typeid(&self) -> u8 {
        match self {
            Address::Byron(x) => x.typeid(),
            Address::Shelley(x) => x.typeid(),
            Address::Stake(x) => x.typeid(),
        }
    }

    /// Gets the bech32 human-readable-part for this address
    pub fn hrp(&self) -> Result<&'static str, Error> {
        match self {
            Address::Byron(_) => Err(Error::InvalidForByron),
            Address::Shelley(x) => x.hrp(),
            Address::Stake(x) => x.hrp(),
        }
    }

    /// Indicates if this is address includes a script hash
    pub fn has_script(&self) -> bool {
        match self {
            Address::Byron(_) => false,
            Address::Shelley(x) => x.has_script(),
            Address::Stake(x) => x.is_script(),
        }
    }

    /// Indicates if this is an enterprise address
    pub fn is_enterprise(&self) -> bool {
        match self {
            Address::Shelley(x) => matches!(x.delegation(), ShelleyDelegationPart::Null),
            _ => false,
        }
    }

    /// Hash of the key that must sign to spend from this address
    pub fn payment_key_hash(&self) -> Option<&PaymentKeyHash> {
        match self {
            Address::Shelley(x) => match x.payment() {
                ShelleyPaymentPart::Key(h) => Some(h),
                ShelleyPaymentPart::Script(_) => None,
            },
            _ => None,
        }
    }

    /// Hash of the script that guards the funds at this address
    pub fn payment_script_hash(&self) -> Option<&ScriptHash> {
        match self {
            Address::Shelley(x) => match x.payment() {
                ShelleyPaymentPart::Script(h) => Some(h),
                ShelleyPaymentPart::Key(_) => None,
            },
            _ => None,
        }
    }
}

impl From<ByronAddress> for Address {
    fn from(addr: ByronAddress) -> Self {
        Address::Byron(addr)
    }
}

impl From<ShelleyAddress> for Address {
    fn from(addr: ShelleyAddress) -> Self {
        Address::Shelley(addr)
    }
}

impl From<StakeAddress> for Address {
    fn from(addr: StakeAddress) -> Self {
        Address::Stake(addr)
    }
}

impl TryFrom<Address> for StakeAddress {
    type Error = Error;

    fn try_from(value: Address) -> Result<Self, Self::Error> {
        match value {
            Address::Stake(x) => Ok(x),
            Address::Shelley(x) => x
                .stake_address()
                .ok_or(Error::InvalidHeader(x.to_header())),
            Address::Byron(_) => Err(Error::InvalidForByron),
        }
    }
}

/// Parses bech32, then base58 (Byron), then hex
impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(x) = Address::from_bech32(s) {
            return Ok(x);
        }

        if let Ok(x) = ByronAddress::from_base58(s) {
            return Ok(x.into());
        }

        Address::from_hex(s).map_err(|_| Error::Unrecognized(s.to_string()))
    }
}

/// Bech32 for Shelley and stake addresses, base58 for Byron. Addresses on a
/// network without a known prefix render as hex.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Byron(x) => f.write_str(&x.to_base58()),
            _ => match self.to_bech32() {
                Ok(s) => f.write_str(&s),
                Err(_) => f.write_str(&self.to_hex()),
            },
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<C> minicbor::Encode<C> for Address {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.to_vec())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Address {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();
        let bytes = d.bytes()?;

        Address::from_bytes(bytes)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()).at(position))
    }
}

impl<C> minicbor::Encode<C> for StakeAddress {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.to_vec())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for StakeAddress {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();
        let bytes = d.bytes()?;

        match Address::from_bytes(bytes) {
            Ok(Address::Stake(x)) => Ok(x),
            Ok(other) => Err(minicbor::decode::Error::message(format!(
                "expected a reward account, found address type {}",
                other.typeid()
            ))
            .at(position)),
            Err(e) => Err(minicbor::decode::Error::message(e.to_string()).at(position)),
        }
    }
}

impl fmt::Display for StakeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_bech32() {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str(&hex::encode(self.to_vec())),
        }
    }
}

impl FromStr for StakeAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StakeAddress::try_from(s.parse::<Address>()?)
    }
}

impl Serialize for StakeAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StakeAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAINNET_TEST_VECTORS: &[(&str, u8)] = &[
        ("addr1qx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzer3n0d3vllmyqwsx5wktcd8cc3sq835lu7drv2xwl2wywfgse35a3x", 00u8),
        ("addr1z8phkx6acpnf78fuvxn0mkew3l0fd058hzquvz7w36x4gten0d3vllmyqwsx5wktcd8cc3sq835lu7drv2xwl2wywfgs9yc0hh", 01u8),
        ("addr1yx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzerkr0vd4msrxnuwnccdxlhdjar77j6lg0wypcc9uar5d2shs2z78ve", 02u8),
        ("addr1x8phkx6acpnf78fuvxn0mkew3l0fd058hzquvz7w36x4gt7r0vd4msrxnuwnccdxlhdjar77j6lg0wypcc9uar5d2shskhj42g", 03u8),
        ("addr1gx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzer5pnz75xxcrzqf96k", 04u8),
        ("addr128phkx6acpnf78fuvxn0mkew3l0fd058hzquvz7w36x4gtupnz75xxcrtw79hu", 05u8),
        ("addr1vx2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzers66hrl8", 06u8),
        ("addr1w8phkx6acpnf78fuvxn0mkew3l0fd058hzquvz7w36x4gtcyjy7wx", 07u8),
        ("stake1uyehkck0lajq8gr28t9uxnuvgcqrc6070x3k9r8048z8y5gh6ffgw", 14u8),
        ("stake178phkx6acpnf78fuvxn0mkew3l0fd058hzquvz7w36x4gtcccycj5", 15u8),
    ];

    const PAYMENT_PUBLIC_KEY: &str =
        "addr_vk1w0l2sr2zgfm26ztc6nl9xy8ghsk5sh6ldwemlpmp9xylzy4dtf7st80zhd";
    const STAKE_PUBLIC_KEY: &str =
        "stake_vk1px4j0r2fk7ux5p23shz8f3y5y2qam7s954rgf3lg5merqcj6aetsft99wu";
    const SCRIPT_HASH: &str = "script1cda3khwqv60360rp5m7akt50m6ttapacs8rqhn5w342z7r35m37";

    fn hash_vector_key(key: &str) -> Hash<28> {
        let (_, x) = decode_bech32(key).unwrap();
        tessera_crypto::hash::Hasher::<224>::hash(&x)
    }

    fn script_vector() -> Hash<28> {
        let (_, bytes) = decode_bech32(SCRIPT_HASH).unwrap();
        Hash::try_from(bytes.as_slice()).unwrap()
    }

    #[test]
    fn roundtrip_bech32() {
        for (original, _) in MAINNET_TEST_VECTORS {
            let addr = Address::from_bech32(original).unwrap();
            assert_eq!(addr.to_bech32().unwrap(), *original);
            assert_eq!(addr.to_string(), *original);
        }
    }

    #[test]
    fn typeid_matches() {
        for (original, typeid) in MAINNET_TEST_VECTORS {
            let addr = Address::from_bech32(original).unwrap();
            assert_eq!(addr.typeid(), *typeid);
            assert_eq!(addr.network(), Some(Network::Mainnet));
        }
    }

    #[test]
    fn payload_matches() {
        for (original, _) in MAINNET_TEST_VECTORS {
            match Address::from_bech32(original).unwrap() {
                Address::Shelley(x) => {
                    match x.payment() {
                        ShelleyPaymentPart::Key(hash) => {
                            assert_eq!(*hash, hash_vector_key(PAYMENT_PUBLIC_KEY))
                        }
                        ShelleyPaymentPart::Script(hash) => assert_eq!(*hash, script_vector()),
                    };

                    match x.delegation() {
                        ShelleyDelegationPart::Key(hash) => {
                            assert_eq!(*hash, hash_vector_key(STAKE_PUBLIC_KEY))
                        }
                        ShelleyDelegationPart::Script(hash) => {
                            assert_eq!(*hash, script_vector())
                        }
                        ShelleyDelegationPart::Pointer(ptr) => {
                            assert_eq!(
                                ptr,
                                &Pointer {
                                    slot: 2498243,
                                    tx_index: 27,
                                    cert_index: 3,
                                }
                            );
                        }
                        ShelleyDelegationPart::Null => (),
                    };
                }
                Address::Stake(x) => match x.payload() {
                    StakePayload::Stake(hash) => {
                        assert_eq!(*hash, hash_vector_key(STAKE_PUBLIC_KEY))
                    }
                    StakePayload::Script(hash) => assert_eq!(*hash, script_vector()),
                },
                Address::Byron(_) => unreachable!(),
            };
        }
    }

    #[test]
    fn base_address_exposes_reward_account() {
        let base = Address::from_bech32(MAINNET_TEST_VECTORS[0].0).unwrap();
        let stake = StakeAddress::try_from(base).unwrap();

        assert_eq!(stake.to_string(), MAINNET_TEST_VECTORS[8].0);

        let enterprise = Address::from_bech32(MAINNET_TEST_VECTORS[6].0).unwrap();
        assert!(enterprise.is_enterprise());
        assert!(StakeAddress::try_from(enterprise).is_err());
    }

    #[test]
    fn testnet_enterprise_address() {
        let addr: Address = "addr_test1vrm9x2zsux7va6w892g38tvchnzahvcd9tykqf3ygnmwtaqyfg52x"
            .parse()
            .unwrap();

        assert_eq!(addr.network(), Some(Network::Testnet));
        assert_eq!(addr.typeid(), 6);
        assert!(addr.payment_key_hash().is_some());
        assert!(addr.payment_script_hash().is_none());
    }

    #[test]
    fn parses_every_text_form() {
        let bech = MAINNET_TEST_VECTORS[0].0;
        let addr: Address = bech.parse().unwrap();
        let from_hex: Address = addr.to_hex().parse().unwrap();
        assert_eq!(addr, from_hex);

        let byron: Address = "Ae2tdPwUPEZ4YjgvykNpoFeYUxoyhNj2kg8KfKWN2FizsSpLUPv68MpTVDo"
            .parse()
            .unwrap();
        assert_eq!(byron.typeid(), 8);
        assert!(byron.network().is_none());

        assert!(matches!(
            "not an address".parse::<Address>(),
            Err(Error::Unrecognized(_))
        ));
    }

    #[test]
    fn cbor_is_raw_bytes() {
        let addr = Address::from_bech32(MAINNET_TEST_VECTORS[6].0).unwrap();
        let cbor = minicbor::to_vec(&addr).unwrap();

        assert_eq!(cbor[0], 0x58);
        assert_eq!(cbor[1], 29);
        assert_eq!(&cbor[2..], addr.to_vec().as_slice());
        assert_eq!(minicbor::decode::<Address>(&cbor).unwrap(), addr);
    }

    #[test]
    fn every_shelley_type_reparses() {
        let hash = Hash::new([9; 28]);
        let pointer = Pointer {
            slot: 2498243,
            tx_index: 27,
            cert_index: 3,
        };

        let delegations = [
            ShelleyDelegationPart::Key(hash),
            ShelleyDelegationPart::Script(hash),
            ShelleyDelegationPart::Pointer(pointer),
            ShelleyDelegationPart::Null,
        ];

        for (i, delegation) in delegations.into_iter().enumerate() {
            for (j, payment) in [ShelleyPaymentPart::Key(hash), ShelleyPaymentPart::Script(hash)]
                .into_iter()
                .enumerate()
            {
                let addr = ShelleyAddress::new(Network::Mainnet, payment, delegation.clone());
                assert_eq!(addr.typeid() as usize, i * 2 + j);

                let bytes = addr.to_vec();
                assert_eq!(Address::from_bytes(&bytes).unwrap(), Address::Shelley(addr));
            }
        }
    }

    #[test]
    fn pointer_with_trailing_bytes_is_an_error() {
        let mut bytes = vec![0x41];
        bytes.extend_from_slice(&[9; 28]);
        bytes.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        assert!(matches!(
            Address::from_bytes(&bytes),
            Err(Error::InvalidPayloadLength { typeid: 4, found: 32 })
        ));
    }

    #[test]
    fn short_payload_is_an_error() {
        let bytes = [vec![0x01], vec![0xab; 40]].concat();
        assert!(matches!(
            Address::from_bytes(&bytes),
            Err(Error::InvalidPayloadLength { typeid: 0, found: 40 })
        ));
    }

    #[test]
    fn serde_uses_text_form() {
        let addr = Address::from_bech32(MAINNET_TEST_VECTORS[6].0).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", MAINNET_TEST_VECTORS[6].0));
    }
}
