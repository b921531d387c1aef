//! Scripts and datums
//!
//! Native scripts are fully modelled since the builder needs their key
//! hashes and their policy ids. Plutus scripts and datums are carried as
//! opaque bytes: they are hashed and serialized but never evaluated.

use std::collections::BTreeSet;

use tessera_codec::{
    codec_by_index,
    minicbor::{self, data::Tag},
    utils::{AnyCbor, Bytes, CborWrap, CBOR_TAG},
};
use tessera_crypto::hash::Hasher;

use crate::{AddrKeyhash, DatumHash, ScriptHash, Slot, ToHash};

/// Multi-signature and time-lock predicate
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NativeScript {
    ScriptPubkey(AddrKeyhash),
    ScriptAll(Vec<NativeScript>),
    ScriptAny(Vec<NativeScript>),
    ScriptNOfK(u32, Vec<NativeScript>),
    InvalidBefore(Slot),
    InvalidHereafter(Slot),
}

codec_by_index! {
    NativeScript,
    0 => ScriptPubkey(key_hash),
    1 => ScriptAll(scripts),
    2 => ScriptAny(scripts),
    3 => ScriptNOfK(required, scripts),
    4 => InvalidBefore(slot),
    5 => InvalidHereafter(slot),
}

impl NativeScript {
    /// Policy id or script credential of this script
    pub fn hash(&self) -> Result<ScriptHash, tessera_codec::Error> {
        Hasher::<224>::hash_tagged_cbor(self, 0)
    }

    /// Every verification key hash that may have to sign for this script
    pub fn key_hashes(&self) -> BTreeSet<AddrKeyhash> {
        let mut out = BTreeSet::new();
        self.collect_key_hashes(&mut out);
        out
    }

    fn collect_key_hashes(&self, out: &mut BTreeSet<AddrKeyhash>) {
        match self {
            NativeScript::ScriptPubkey(x) => {
                out.insert(*x);
            }
            NativeScript::ScriptAll(scripts)
            | NativeScript::ScriptAny(scripts)
            | NativeScript::ScriptNOfK(_, scripts) => {
                for script in scripts {
                    script.collect_key_hashes(out);
                }
            }
            NativeScript::InvalidBefore(_) | NativeScript::InvalidHereafter(_) => (),
        }
    }
}

impl ToHash<28> for NativeScript {
    fn to_hash(&self) -> Result<ScriptHash, tessera_codec::Error> {
        self.hash()
    }
}

#[cfg(feature = "json")]
mod json {
    use serde_json::{json, Value};

    use super::NativeScript;
    use crate::ValidationError;

    fn invalid(msg: impl Into<String>) -> ValidationError {
        ValidationError::InvalidScriptJson(msg.into())
    }

    fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value, ValidationError> {
        value
            .get(name)
            .ok_or_else(|| invalid(format!("missing field {name}")))
    }

    fn slot(value: &Value) -> Result<u64, ValidationError> {
        field(value, "slot")?
            .as_u64()
            .ok_or_else(|| invalid("slot must be a non-negative integer"))
    }

    fn scripts(value: &Value) -> Result<Vec<NativeScript>, ValidationError> {
        field(value, "scripts")?
            .as_array()
            .ok_or_else(|| invalid("scripts must be an array"))?
            .iter()
            .map(NativeScript::from_json)
            .collect()
    }

    impl NativeScript {
        /// Dictionary form used by policy files and the node cli
        pub fn to_json(&self) -> Value {
            match self {
                NativeScript::ScriptPubkey(x) => json!({ "type": "sig", "keyHash": x.to_string() }),
                NativeScript::ScriptAll(x) => {
                    let scripts: Vec<_> = x.iter().map(|i| i.to_json()).collect();
                    json!({ "type": "all", "scripts": scripts })
                }
                NativeScript::ScriptAny(x) => {
                    let scripts: Vec<_> = x.iter().map(|i| i.to_json()).collect();
                    json!({ "type": "any", "scripts": scripts })
                }
                NativeScript::ScriptNOfK(n, k) => {
                    let scripts: Vec<_> = k.iter().map(|i| i.to_json()).collect();
                    json!({ "type": "atLeast", "required": n, "scripts": scripts })
                }
                NativeScript::InvalidBefore(slot) => json!({ "type": "after", "slot": slot }),
                NativeScript::InvalidHereafter(slot) => json!({ "type": "before", "slot": slot }),
            }
        }

        pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
            let kind = field(value, "type")?
                .as_str()
                .ok_or_else(|| invalid("type must be a string"))?;

            match kind {
                "sig" => {
                    let key_hash = field(value, "keyHash")?
                        .as_str()
                        .ok_or_else(|| invalid("keyHash must be a string"))?;
                    let bytes = hex::decode(key_hash)?;
                    Ok(NativeScript::ScriptPubkey(bytes.as_slice().try_into()?))
                }
                "all" => Ok(NativeScript::ScriptAll(scripts(value)?)),
                "any" => Ok(NativeScript::ScriptAny(scripts(value)?)),
                "atLeast" => {
                    let required = field(value, "required")?
                        .as_u64()
                        .and_then(|n| u32::try_from(n).ok())
                        .ok_or_else(|| invalid("required must be a small integer"))?;
                    Ok(NativeScript::ScriptNOfK(required, scripts(value)?))
                }
                "after" => Ok(NativeScript::InvalidBefore(slot(value)?)),
                "before" => Ok(NativeScript::InvalidHereafter(slot(value)?)),
                other => Err(invalid(format!("unknown script type {other}"))),
            }
        }
    }
}

/// Compiled Plutus script of the given language version, kept as raw bytes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlutusScript<const VERSION: usize>(pub Bytes);

impl<const VERSION: usize> PlutusScript<VERSION> {
    pub fn hash(&self) -> ScriptHash {
        Hasher::<224>::hash_tagged(&self.0, VERSION as u8)
    }
}

impl<const VERSION: usize> AsRef<[u8]> for PlutusScript<VERSION> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<C, const VERSION: usize> minicbor::Encode<C> for PlutusScript<VERSION> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?.ok()
    }
}

impl<'b, C, const VERSION: usize> minicbor::Decode<'b, C> for PlutusScript<VERSION> {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Self(Bytes::from(d.bytes()?)))
    }
}

/// Any script that can be referenced from an output
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Script {
    Native(NativeScript),
    PlutusV1(PlutusScript<1>),
    PlutusV2(PlutusScript<2>),
    PlutusV3(PlutusScript<3>),
}

codec_by_index! {
    Script,
    0 => Native(script),
    1 => PlutusV1(script),
    2 => PlutusV2(script),
    3 => PlutusV3(script),
}

impl Script {
    pub fn hash(&self) -> Result<ScriptHash, tessera_codec::Error> {
        match self {
            Script::Native(x) => x.hash(),
            Script::PlutusV1(x) => Ok(x.hash()),
            Script::PlutusV2(x) => Ok(x.hash()),
            Script::PlutusV3(x) => Ok(x.hash()),
        }
    }
}

impl From<NativeScript> for Script {
    fn from(script: NativeScript) -> Self {
        Script::Native(script)
    }
}

/// Encodes a script reference as `#6.24(bytes .cbor script)`
pub(crate) fn encode_script_ref<C, W: minicbor::encode::Write>(
    script: &Script,
    e: &mut minicbor::Encoder<W>,
    ctx: &mut C,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.encode_with(CborWrap(script), ctx)?;
    Ok(())
}

pub(crate) fn decode_script_ref<'b, C>(
    d: &mut minicbor::Decoder<'b>,
    ctx: &mut C,
) -> Result<Script, minicbor::decode::Error> {
    let CborWrap(script) = d.decode_with(ctx)?;
    Ok(script)
}

/// Plutus data, kept as the exact cbor it was built or received with
pub type PlutusData = AnyCbor;

/// Blake2b-256 of the datum bytes
pub fn hash_datum(datum: &PlutusData) -> DatumHash {
    Hasher::<256>::hash(datum.raw_bytes())
}

/// Datum attached to an output, either by hash or inline
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatumOption {
    Hash(DatumHash),
    Data(PlutusData),
}

impl DatumOption {
    pub fn hash(&self) -> DatumHash {
        match self {
            DatumOption::Hash(x) => *x,
            DatumOption::Data(x) => hash_datum(x),
        }
    }
}

impl<C> minicbor::Encode<C> for DatumOption {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;

        match self {
            DatumOption::Hash(x) => {
                e.u8(0)?;
                e.encode_with(x, ctx)?;
            }
            DatumOption::Data(x) => {
                e.u8(1)?;
                e.tag(Tag::new(CBOR_TAG))?;
                e.bytes(x.raw_bytes())?;
            }
        }

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for DatumOption {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();

        if d.array()? != Some(2) {
            return Err(
                minicbor::decode::Error::message("datum option must be a 2 element array")
                    .at(position),
            );
        }

        match d.u64()? {
            0 => Ok(DatumOption::Hash(d.decode_with(ctx)?)),
            1 => {
                let position = d.position();
                let tag = d.tag()?;

                if tag != Tag::new(CBOR_TAG) {
                    return Err(minicbor::decode::Error::message(format!(
                        "expected embedded cbor tag {CBOR_TAG}, found tag {}",
                        tag.as_u64()
                    ))
                    .at(position));
                }

                let raw = d.bytes()?.to_vec();
                let data = AnyCbor::from_raw(raw).map_err(|e| {
                    minicbor::decode::Error::message(format!("invalid inline datum: {e}"))
                        .at(position)
                })?;

                Ok(DatumOption::Data(data))
            }
            other => Err(minicbor::decode::Error::message(format!(
                "unknown DatumOption code {other}"
            ))
            .at(position)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use tessera_codec::Fragment;
    use tessera_crypto::hash::Hash;
    use test_case::test_case;

    use super::*;

    fn key(s: &str) -> AddrKeyhash {
        Hash::from_str(s).unwrap()
    }

    // key hashes of the verification keys 6443a1..8473 and 6443a1..8475
    const VK1: &str = "9139e5c0a42f0f2389634c3dd18dc621f5594c5ba825d9a8883c6627";
    const VK2: &str = "835600a2be276a18a4bebf0225d728f090f724f4c0acd591d066fa6f";

    fn clauses() -> Vec<NativeScript> {
        vec![
            NativeScript::InvalidHereafter(123456789),
            NativeScript::InvalidBefore(123456780),
            NativeScript::ScriptPubkey(key(VK1)),
            NativeScript::ScriptPubkey(key(VK2)),
        ]
    }

    #[test_case(NativeScript::ScriptPubkey(key(VK1)), "88d1bd864d184909138e772d5b71b312113a985590fb551e8b35f50c"; "pubkey")]
    #[test_case(NativeScript::ScriptAll(clauses()), "ec8b7d1dd0b124e8333d3fa8d818f6eac068231a287554e9ceae490e"; "all")]
    #[test_case(NativeScript::ScriptAny(clauses()), "2cca2c35ff880760b34e42c87172125d2bad18d8bcf42e209298648b"; "any")]
    #[test_case(NativeScript::ScriptNOfK(2, clauses()), "088a24a57345f12db09c6eddac2e88edf281bf766e66a98ff1045c0d"; "n of k")]
    #[test_case(
        NativeScript::ScriptAll(vec![
            NativeScript::ScriptPubkey(key("4d04380dcb9fbad5aff8e2f4e19394ef4e5e11b37932838f01984a12")),
            NativeScript::InvalidBefore(112500819),
        ]),
        "d6a8ced01ecdfbb26c90850010a06fbc20a7c23632fc92f531667f36";
        "all with lower bound"
    )]
    fn native_script_hash_matches_node(script: NativeScript, expected: &str) {
        assert_eq!(script.hash().unwrap().to_string(), expected);

        let bytes = script.encode_fragment().unwrap();
        assert_eq!(NativeScript::decode_fragment(&bytes).unwrap(), script);
    }

    #[test]
    fn native_script_cbor_layout() {
        let script = NativeScript::ScriptAll(vec![NativeScript::InvalidHereafter(123456789)]);
        assert_eq!(script.to_hex().unwrap(), "82018182051a075bcd15");

        let err = NativeScript::from_hex("8206").unwrap_err();
        assert!(err.to_string().contains("unknown NativeScript code 6"));
    }

    #[test]
    fn collects_nested_key_hashes() {
        let script = NativeScript::ScriptAny(vec![
            NativeScript::ScriptNOfK(1, clauses()),
            NativeScript::ScriptPubkey(key(VK1)),
        ]);

        let keys: Vec<_> = script.key_hashes().into_iter().collect();
        assert_eq!(keys, vec![key(VK2), key(VK1)]);
    }

    #[cfg(feature = "json")]
    #[test]
    fn native_script_json_dictionary() {
        let script = NativeScript::ScriptNOfK(2, clauses());
        let json = script.to_json();

        assert_eq!(json["type"], "atLeast");
        assert_eq!(json["required"], 2);
        assert_eq!(json["scripts"][0], serde_json::json!({ "type": "before", "slot": 123456789 }));
        assert_eq!(json["scripts"][1], serde_json::json!({ "type": "after", "slot": 123456780 }));
        assert_eq!(json["scripts"][2]["keyHash"], VK1);

        assert_eq!(NativeScript::from_json(&json).unwrap(), script);

        let err = NativeScript::from_json(&serde_json::json!({ "type": "maybe" })).unwrap_err();
        assert_eq!(
            err,
            crate::ValidationError::InvalidScriptJson("unknown script type maybe".into())
        );
    }

    #[test]
    fn plutus_script_hash_prefixes_language() {
        let script = PlutusScript::<2>(Bytes::from(vec![0x4e, 0x4d, 0x01, 0x00, 0x00]));
        let expected = Hasher::<224>::hash(&[0x02, 0x4e, 0x4d, 0x01, 0x00, 0x00]);
        assert_eq!(Script::PlutusV2(script.clone()).hash().unwrap(), expected);
        assert_ne!(PlutusScript::<1>(script.0).hash(), expected);
    }

    #[test]
    fn inline_datum_roundtrip() {
        // 42 as plutus data
        let datum = DatumOption::Data(AnyCbor::from_raw(vec![0x18, 0x2a]).unwrap());
        assert_eq!(datum.to_hex().unwrap(), "8201d81842182a");
        assert_eq!(DatumOption::from_hex("8201d81842182a").unwrap(), datum);
        assert_eq!(datum.hash(), Hasher::<256>::hash(&[0x18, 0x2a]));

        let err = DatumOption::from_hex("8201d81942182a").unwrap_err();
        assert!(err.to_string().contains("expected embedded cbor tag 24"));
    }
}
