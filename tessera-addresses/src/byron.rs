//! Legacy bootstrap-era addresses
//!
//! A Byron address is `[#6.24(payload), crc32]`. Only the envelope is
//! checked here; the payload is kept opaque and round-trips byte for byte.

use tessera_codec::{
    minicbor::Decoder,
    utils::{Bytes, TagWrap},
};

use crate::Error;

/// New type wrapping a Byron address primitive
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByronAddress {
    raw: Vec<u8>,
    crc: u64,
}

impl ByronAddress {
    pub fn from_bytes(value: &[u8]) -> Result<Self, Error> {
        let mut d = Decoder::new(value);

        let (_, crc): (TagWrap<Bytes, 24>, u64) = d
            .decode()
            .map_err(|e| Error::InvalidByronCbor(e.to_string()))?;

        if d.position() != value.len() {
            return Err(Error::InvalidByronCbor(format!(
                "{} trailing bytes",
                value.len() - d.position()
            )));
        }

        Ok(Self {
            raw: value.to_vec(),
            crc,
        })
    }

    pub fn from_base58(value: &str) -> Result<Self, Error> {
        let bytes = base58::FromBase58::from_base58(value).map_err(Error::BadBase58)?;
        Self::from_bytes(&bytes)
    }

    /// Gets a numeric id describing the type of the address
    pub fn typeid(&self) -> u8 {
        0b1000
    }

    pub fn crc(&self) -> u64 {
        self.crc
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.raw.clone()
    }

    pub fn to_base58(&self) -> String {
        base58::ToBase58::to_base58(self.raw.as_slice())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

impl AsRef<[u8]> for ByronAddress {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_VECTOR: &str = "Ae2tdPwUPEZ4YjgvykNpoFeYUxoyhNj2kg8KfKWN2FizsSpLUPv68MpTVDo";

    #[test]
    fn roundtrip_base58() {
        let addr = ByronAddress::from_base58(TEST_VECTOR).unwrap();
        assert_eq!(addr.to_base58(), TEST_VECTOR);
        assert!(addr.to_hex().starts_with("82d8185821"));
    }

    #[test]
    fn rejects_shelley_bytes() {
        let bytes = [vec![0x61], vec![0xab; 28]].concat();
        assert!(matches!(
            ByronAddress::from_bytes(&bytes),
            Err(Error::InvalidByronCbor(_))
        ));
    }
}
