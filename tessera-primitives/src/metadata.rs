//! Transaction metadata and auxiliary data

use tessera_codec::{
    layout::{Field, MapLayout},
    minicbor::{self, data::Tag, data::Type},
    utils::{Bytes, Int, KeyValuePairs},
};
use tessera_crypto::hash::{Hash, Hasher};

use crate::{MetadataError, NativeScript, PlutusScript, ToHash};

/// Longest byte or text string a metadatum may hold
pub const MAX_METADATUM_LEN: usize = 64;

pub type MetadatumLabel = u64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metadatum {
    Int(Int),
    Bytes(Bytes),
    Text(String),
    Array(Vec<Metadatum>),
    Map(KeyValuePairs<Metadatum, Metadatum>),
}

pub type Metadata = KeyValuePairs<MetadatumLabel, Metadatum>;

fn check_len(kind: &'static str, len: usize) -> Result<(), MetadataError> {
    if len > MAX_METADATUM_LEN {
        return Err(MetadataError::TooLong { kind, len });
    }

    Ok(())
}

impl Metadatum {
    pub fn text(value: impl Into<String>) -> Result<Self, MetadataError> {
        let value = value.into();
        check_len("text", value.len())?;
        Ok(Metadatum::Text(value))
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Result<Self, MetadataError> {
        let value = value.into();
        check_len("bytes", value.len())?;
        Ok(Metadatum::Bytes(Bytes::from(value)))
    }

    pub fn int(value: i64) -> Self {
        Metadatum::Int(Int::from(value))
    }

    /// Builds a map metadatum keyed by text
    pub fn text_map<I, K>(entries: I) -> Result<Self, MetadataError>
    where
        I: IntoIterator<Item = (K, Metadatum)>,
        K: Into<String>,
    {
        let pairs = entries
            .into_iter()
            .map(|(k, v)| Ok((Metadatum::text(k)?, v)))
            .collect::<Result<Vec<_>, MetadataError>>()?;

        Ok(Metadatum::Map(KeyValuePairs::from(pairs)))
    }

    /// Converts a json value into a metadatum
    ///
    /// Numbers must be integers and strings must fit the 64 byte limit.
    /// Booleans, nulls and floats have no metadata counterpart.
    #[cfg(feature = "json")]
    pub fn from_json(value: &serde_json::Value) -> Result<Self, MetadataError> {
        use serde_json::Value;

        match value {
            Value::Number(n) => {
                if let Some(x) = n.as_i64() {
                    Ok(Metadatum::int(x))
                } else if let Some(x) = n.as_u64() {
                    Ok(Metadatum::Int(Int::from(x)))
                } else {
                    Err(MetadataError::Unsupported(format!("non-integer number {n}")))
                }
            }
            Value::String(s) => Metadatum::text(s.as_str()),
            Value::Array(items) => items
                .iter()
                .map(Metadatum::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Metadatum::Array),
            Value::Object(entries) => {
                let pairs = entries
                    .iter()
                    .map(|(k, v)| Ok((Metadatum::text(k.as_str())?, Metadatum::from_json(v)?)))
                    .collect::<Result<Vec<_>, MetadataError>>()?;
                Ok(Metadatum::Map(KeyValuePairs::from(pairs)))
            }
            Value::Bool(b) => Err(MetadataError::Unsupported(format!("boolean {b}"))),
            Value::Null => Err(MetadataError::Unsupported("null".into())),
        }
    }
}

/// Converts a json object keyed by numeric labels into metadata
#[cfg(feature = "json")]
pub fn metadata_from_json(value: &serde_json::Value) -> Result<Metadata, MetadataError> {
    let entries = value
        .as_object()
        .ok_or_else(|| MetadataError::Unsupported("metadata must be a json object".into()))?;

    let pairs = entries
        .iter()
        .map(|(label, v)| {
            let label = label
                .parse::<MetadatumLabel>()
                .map_err(|_| MetadataError::Unsupported(format!("label {label} is not a uint")))?;
            Ok((label, Metadatum::from_json(v)?))
        })
        .collect::<Result<Vec<_>, MetadataError>>()?;

    Ok(KeyValuePairs::from(pairs))
}

impl<C> minicbor::Encode<C> for Metadatum {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Metadatum::Int(x) => e.encode_with(x, ctx)?,
            Metadatum::Bytes(x) => e.encode_with(x, ctx)?,
            Metadatum::Text(x) => e.str(x)?,
            Metadatum::Array(x) => e.encode_with(x, ctx)?,
            Metadatum::Map(x) => e.encode_with(x, ctx)?,
        };

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Metadatum {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();
        let too_long = |e: MetadataError| minicbor::decode::Error::message(e.to_string()).at(position);

        match d.datatype()? {
            Type::U8 | Type::U16 | Type::U32 | Type::U64 | Type::I8 | Type::I16 | Type::I32
            | Type::I64 | Type::Int => Ok(Metadatum::Int(d.decode_with(ctx)?)),
            Type::Bytes => Metadatum::bytes(d.bytes()?).map_err(too_long),
            Type::String => Metadatum::text(d.str()?).map_err(too_long),
            Type::Array | Type::ArrayIndef => Ok(Metadatum::Array(d.decode_with(ctx)?)),
            Type::Map | Type::MapIndef => Ok(Metadatum::Map(d.decode_with(ctx)?)),
            other => Err(minicbor::decode::Error::message(format!(
                "unexpected cbor type {other} for Metadatum"
            ))
            .at(position)),
        }
    }
}

/// Scripts and metadata committed to by the body's auxiliary data hash
#[derive(Debug, Clone, PartialEq)]
pub enum AuxiliaryData {
    Shelley(Metadata),
    ShelleyMa(ShelleyMaAuxiliaryData),
    PostAlonzo(PostAlonzoAuxiliaryData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShelleyMaAuxiliaryData {
    pub transaction_metadata: Metadata,
    pub auxiliary_scripts: Vec<NativeScript>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostAlonzoAuxiliaryData {
    pub metadata: Option<Metadata>,
    pub native_scripts: Option<Vec<NativeScript>>,
    pub plutus_v1_scripts: Option<Vec<PlutusScript<1>>>,
    pub plutus_v2_scripts: Option<Vec<PlutusScript<2>>>,
    pub plutus_v3_scripts: Option<Vec<PlutusScript<3>>>,
}

pub const AUXILIARY_DATA_TAG: u64 = 259;

const POST_ALONZO_AUX: MapLayout = MapLayout::new(
    "auxiliary data",
    &[
        Field::optional(0, "metadata"),
        Field::optional(1, "native_scripts"),
        Field::optional(2, "plutus_v1_scripts"),
        Field::optional(3, "plutus_v2_scripts"),
        Field::optional(4, "plutus_v3_scripts"),
    ],
);

impl AuxiliaryData {
    pub fn from_metadata(metadata: Metadata) -> Self {
        AuxiliaryData::PostAlonzo(PostAlonzoAuxiliaryData {
            metadata: Some(metadata),
            ..Default::default()
        })
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            AuxiliaryData::Shelley(x) => Some(x),
            AuxiliaryData::ShelleyMa(x) => Some(&x.transaction_metadata),
            AuxiliaryData::PostAlonzo(x) => x.metadata.as_ref(),
        }
    }

    pub fn native_scripts(&self) -> &[NativeScript] {
        match self {
            AuxiliaryData::Shelley(_) => &[],
            AuxiliaryData::ShelleyMa(x) => &x.auxiliary_scripts,
            AuxiliaryData::PostAlonzo(x) => x.native_scripts.as_deref().unwrap_or(&[]),
        }
    }

    /// Adds metadata entries, replacing any existing entry with the same label
    pub fn merge_metadata(&mut self, entries: impl IntoIterator<Item = (MetadatumLabel, Metadatum)>) {
        let current = match self {
            AuxiliaryData::Shelley(x) => x,
            AuxiliaryData::ShelleyMa(x) => &mut x.transaction_metadata,
            AuxiliaryData::PostAlonzo(x) => x.metadata.get_or_insert_with(|| KeyValuePairs::from(vec![])),
        };

        let mut merged = current.clone().to_vec();

        for (label, value) in entries {
            match merged.iter_mut().find(|(k, _)| *k == label) {
                Some(entry) => entry.1 = value,
                None => merged.push((label, value)),
            }
        }

        merged.sort_by_key(|(k, _)| *k);
        *current = KeyValuePairs::from(merged);
    }

    pub fn hash(&self) -> Result<Hash<32>, tessera_codec::Error> {
        Hasher::<256>::hash_cbor(self)
    }
}

impl ToHash<32> for AuxiliaryData {
    fn to_hash(&self) -> Result<Hash<32>, tessera_codec::Error> {
        self.hash()
    }
}

impl<C> minicbor::Encode<C> for AuxiliaryData {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            AuxiliaryData::Shelley(x) => {
                e.encode_with(x, ctx)?;
            }
            AuxiliaryData::ShelleyMa(x) => {
                e.array(2)?;
                e.encode_with(&x.transaction_metadata, ctx)?;
                e.encode_with(&x.auxiliary_scripts, ctx)?;
            }
            AuxiliaryData::PostAlonzo(x) => {
                let len = [
                    x.metadata.is_some(),
                    x.native_scripts.is_some(),
                    x.plutus_v1_scripts.is_some(),
                    x.plutus_v2_scripts.is_some(),
                    x.plutus_v3_scripts.is_some(),
                ]
                .iter()
                .filter(|p| **p)
                .count();

                e.tag(Tag::new(AUXILIARY_DATA_TAG))?;
                e.map(len as u64)?;

                if let Some(v) = &x.metadata {
                    e.u8(0)?.encode_with(v, ctx)?;
                }
                if let Some(v) = &x.native_scripts {
                    e.u8(1)?.encode_with(v, ctx)?;
                }
                if let Some(v) = &x.plutus_v1_scripts {
                    e.u8(2)?.encode_with(v, ctx)?;
                }
                if let Some(v) = &x.plutus_v2_scripts {
                    e.u8(3)?.encode_with(v, ctx)?;
                }
                if let Some(v) = &x.plutus_v3_scripts {
                    e.u8(4)?.encode_with(v, ctx)?;
                }
            }
        }

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for AuxiliaryData {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();

        match d.datatype()? {
            Type::Map | Type::MapIndef => Ok(AuxiliaryData::Shelley(d.decode_with(ctx)?)),
            Type::Array | Type::ArrayIndef => {
                if d.array()? != Some(2) {
                    return Err(minicbor::decode::Error::message(
                        "shelley-ma auxiliary data must be a 2 element array",
                    )
                    .at(position));
                }

                Ok(AuxiliaryData::ShelleyMa(ShelleyMaAuxiliaryData {
                    transaction_metadata: d.decode_with(ctx)?,
                    auxiliary_scripts: d.decode_with(ctx)?,
                }))
            }
            Type::Tag => {
                let tag = d.tag()?;

                if tag != Tag::new(AUXILIARY_DATA_TAG) {
                    return Err(minicbor::decode::Error::message(format!(
                        "expected auxiliary data tag {AUXILIARY_DATA_TAG}, found tag {}",
                        tag.as_u64()
                    ))
                    .at(position));
                }

                let mut out = PostAlonzoAuxiliaryData::default();

                POST_ALONZO_AUX.decode_entries(d, |field, d| {
                    match field.key {
                        0 => out.metadata = Some(d.decode_with(ctx)?),
                        1 => out.native_scripts = Some(d.decode_with(ctx)?),
                        2 => out.plutus_v1_scripts = Some(d.decode_with(ctx)?),
                        3 => out.plutus_v2_scripts = Some(d.decode_with(ctx)?),
                        _ => out.plutus_v3_scripts = Some(d.decode_with(ctx)?),
                    }
                    Ok(())
                })?;

                Ok(AuxiliaryData::PostAlonzo(out))
            }
            other => Err(minicbor::decode::Error::message(format!(
                "unexpected cbor type {other} for AuxiliaryData"
            ))
            .at(position)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_codec::Fragment;

    #[test]
    fn strings_over_64_bytes_are_rejected() {
        assert!(Metadatum::text("a".repeat(64)).is_ok());
        assert_eq!(
            Metadatum::text("a".repeat(65)),
            Err(MetadataError::TooLong {
                kind: "text",
                len: 65
            })
        );
        assert!(Metadatum::bytes(vec![0; 65]).is_err());

        // 65 byte string
        let mut cbor = vec![0x58, 65];
        cbor.extend([0u8; 65]);
        let err = Metadatum::decode_fragment(&cbor).unwrap_err();
        assert!(err.to_string().contains("limit is 64"));
    }

    #[test]
    fn shelley_map_roundtrip() {
        let metadata: Metadata = vec![(674, Metadatum::text("hello").unwrap())].into();
        let aux = AuxiliaryData::Shelley(metadata);
        let hex = aux.to_hex().unwrap();
        assert_eq!(hex, "a11902a26568656c6c6f");
        assert_eq!(AuxiliaryData::from_hex(&hex).unwrap(), aux);
    }

    #[test]
    fn post_alonzo_is_tagged() {
        let aux = AuxiliaryData::from_metadata(vec![(1, Metadatum::int(-1))].into());
        let hex = aux.to_hex().unwrap();
        assert_eq!(hex, "d90103a100a10120");
        assert_eq!(AuxiliaryData::from_hex(&hex).unwrap(), aux);

        let err = AuxiliaryData::from_hex("d90104a100a10120").unwrap_err();
        assert!(err.to_string().contains("expected auxiliary data tag 259"));

        let err = AuxiliaryData::from_hex("d90103a105a0").unwrap_err();
        assert!(err.to_string().contains("unknown key 5"));
    }

    #[test]
    fn shelley_ma_keeps_scripts() {
        let aux = AuxiliaryData::ShelleyMa(ShelleyMaAuxiliaryData {
            transaction_metadata: vec![].into(),
            auxiliary_scripts: vec![NativeScript::InvalidBefore(10)],
        });

        let decoded = AuxiliaryData::from_hex(&aux.to_hex().unwrap()).unwrap();
        assert_eq!(decoded.native_scripts(), &[NativeScript::InvalidBefore(10)]);
        assert_eq!(decoded.hash().unwrap(), aux.hash().unwrap());
    }

    #[test]
    fn merge_replaces_labels() {
        let mut aux = AuxiliaryData::from_metadata(
            vec![(721, Metadatum::int(1)), (1, Metadatum::int(2))].into(),
        );

        aux.merge_metadata([(721, Metadatum::int(3)), (5, Metadatum::int(4))]);

        let labels: Vec<_> = aux.metadata().unwrap().iter().map(|(k, _)| *k).collect();
        assert_eq!(labels, vec![1, 5, 721]);
        assert_eq!(aux.metadata().unwrap().get(&721), Some(&Metadatum::int(3)));
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_conversion() {
        let value = serde_json::json!({
            "674": { "msg": ["hello", 42] }
        });

        let metadata = metadata_from_json(&value).unwrap();
        let msg = Metadatum::text_map([(
            "msg",
            Metadatum::Array(vec![Metadatum::text("hello").unwrap(), Metadatum::int(42)]),
        )])
        .unwrap();
        assert_eq!(metadata.get(&674), Some(&msg));

        for bad in [
            serde_json::json!(1.5),
            serde_json::json!(true),
            serde_json::json!(null),
            serde_json::json!("x".repeat(65)),
        ] {
            assert!(Metadatum::from_json(&bad).is_err());
        }

        assert!(metadata_from_json(&serde_json::json!({ "abc": 1 })).is_err());
    }
}
