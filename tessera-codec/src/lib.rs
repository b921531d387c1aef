/// Shared re-export of minicbor lib across all Tessera crates
pub use minicbor;

/// Round-trip friendly common helper structs
pub mod utils;

/// Static field layouts for map and array records
pub mod layout;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cbor decoding error: {0}")]
    Decode(#[from] minicbor::decode::Error),

    #[error("cbor encoding error: {0}")]
    Encode(String),

    #[error("{0} trailing bytes after cbor value")]
    TrailingBytes(usize),

    #[error("invalid hex string: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A value that can be encoded to and decoded from standalone CBOR bytes
pub trait Fragment: Sized + for<'b> minicbor::Decode<'b, ()> + minicbor::Encode<()> {
    fn encode_fragment(&self) -> Result<Vec<u8>, Error> {
        minicbor::to_vec(self).map_err(|e| Error::Encode(e.to_string()))
    }

    /// Decodes a single value, rejecting any bytes left after it
    fn decode_fragment(bytes: &[u8]) -> Result<Self, Error> {
        let mut decoder = minicbor::Decoder::new(bytes);
        let value = decoder.decode()?;

        match bytes.len() - decoder.position() {
            0 => Ok(value),
            n => Err(Error::TrailingBytes(n)),
        }
    }

    fn to_hex(&self) -> Result<String, Error> {
        self.encode_fragment().map(hex::encode)
    }

    fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s)?;
        Self::decode_fragment(&bytes)
    }
}

impl<T> Fragment for T where T: for<'b> minicbor::Decode<'b, ()> + minicbor::Encode<()> + Sized {}

#[macro_export]
macro_rules! codec_by_datatype {
    (
        $enum_name:ident $( < $lifetime:lifetime > )?,
        $( $( $cbortype:ident )|* => $one_f:ident ),*,
        ($( $( $vars:ident ),+ => $many_f:ident )?)
    ) => {
        impl<$( $lifetime, )? '__b $(:$lifetime)?,  C> minicbor::decode::Decode<'__b, C> for $enum_name $(<$lifetime>)? {
            fn decode(d: &mut minicbor::Decoder<'__b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
                match d.datatype()? {
                    $( minicbor::data::Type::Array => {
                        d.array()?;
                        // Using the identifiers trivially to ensure repetition.
                        Ok($enum_name::$many_f($({ let $vars = d.decode_with(ctx)?; $vars }, )+ ))
                    }, )?
                    $( $( minicbor::data::Type::$cbortype )|* => Ok($enum_name::$one_f(d.decode_with(ctx)?)), )*
                    other => Err(minicbor::decode::Error::message(format!(
                            "unexpected cbor type {} for {}", other, stringify!($enum_name)))
                    ),
                }
            }
        }

        impl< $( $lifetime, )? C> minicbor::encode::Encode<C> for $enum_name $(<$lifetime>)?  {
            fn encode<W: minicbor::encode::Write>(
                &self,
                e: &mut minicbor::Encoder<W>,
                ctx: &mut C,
            ) -> Result<(), minicbor::encode::Error<W::Error>> {
                match self {
                    $( $enum_name::$many_f ($( $vars ),+) => {
                        e.array(2)?;
                        $( e.encode_with($vars, ctx)?; )+
                    }, )?
                    $( $enum_name::$one_f(__x666) => {
                        e.encode_with(__x666, ctx)?;
                    } )*
                };

                Ok(())
            }
        }
    }
}

/// Implements the `[code, field...]` encoding shared by every tagged union on
/// the ledger (scripts, credentials, voters, governance actions).
///
/// Each arm maps a leading integer code to a variant and names its positional
/// fields. Decoding checks the array length against the variant and reports
/// the offending code when it is unknown.
#[macro_export]
macro_rules! codec_by_index {
    (
        $enum_name:ident,
        $( $code:literal => $variant:ident $( ( $( $field:ident ),* ) )? ),+ $(,)?
    ) => {
        impl<'__b, C> $crate::minicbor::decode::Decode<'__b, C> for $enum_name {
            fn decode(
                d: &mut $crate::minicbor::Decoder<'__b>,
                ctx: &mut C,
            ) -> Result<Self, $crate::minicbor::decode::Error> {
                let position = d.position();
                let len = d.array()?.ok_or_else(|| {
                    $crate::minicbor::decode::Error::message(concat!(
                        stringify!($enum_name),
                        " can't be an indefinite array"
                    ))
                    .at(position)
                })?;
                let code = d.u64()?;

                let expected: u64 = match code {
                    $( $code => 1 + <[&str]>::len(&[ $( $( stringify!($field) ),* )? ]) as u64, )+
                    other => {
                        return Err($crate::minicbor::decode::Error::message(format!(
                            "unknown {} code {}",
                            stringify!($enum_name),
                            other
                        ))
                        .at(position))
                    }
                };

                if len != expected {
                    return Err($crate::minicbor::decode::Error::message(format!(
                        "{} code {} expects {} elements, found {}",
                        stringify!($enum_name),
                        code,
                        expected,
                        len
                    ))
                    .at(position));
                }

                match code {
                    $(
                        $code => Ok($enum_name::$variant $( ( $( { let $field = d.decode_with(ctx)?; $field } ),* ) )?),
                    )+
                    other => Err($crate::minicbor::decode::Error::message(format!(
                        "unknown {} code {}",
                        stringify!($enum_name),
                        other
                    ))),
                }
            }
        }

        impl<C> $crate::minicbor::encode::Encode<C> for $enum_name {
            fn encode<W: $crate::minicbor::encode::Write>(
                &self,
                e: &mut $crate::minicbor::Encoder<W>,
                ctx: &mut C,
            ) -> Result<(), $crate::minicbor::encode::Error<W::Error>> {
                match self {
                    $(
                        $enum_name::$variant $( ( $( $field ),* ) )? => {
                            e.array(1 + <[&str]>::len(&[ $( $( stringify!($field) ),* )? ]) as u64)?;
                            e.u64($code)?;
                            $( $( e.encode_with($field, ctx)?; )* )?
                        }
                    )+
                }

                Ok(())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Shape {
        Dot,
        Circle(u64),
        Rect(u64, u64),
    }

    codec_by_index! {
        Shape,
        0 => Dot,
        1 => Circle(radius),
        4 => Rect(width, height),
    }

    #[test]
    fn tagged_union_layout() {
        assert_eq!(Shape::Dot.to_hex().unwrap(), "8100");
        assert_eq!(Shape::Circle(3).to_hex().unwrap(), "820103");
        assert_eq!(Shape::Rect(1, 2).to_hex().unwrap(), "83040102");
        assert_eq!(Shape::from_hex("83040102").unwrap(), Shape::Rect(1, 2));
    }

    #[test]
    fn tagged_union_reports_distinguisher() {
        let err = Shape::from_hex("8207").unwrap_err();
        assert!(err.to_string().contains("unknown Shape code 7"));

        let err = Shape::from_hex("83010203").unwrap_err();
        assert!(err.to_string().contains("Shape code 1 expects 2 elements, found 3"));
    }

    #[test]
    fn decode_fragment_rejects_trailing_bytes() {
        // 0x01 followed by a stray 0x02
        let result = u8::decode_fragment(&[0x01, 0x02]);
        assert!(matches!(result, Err(Error::TrailingBytes(1))));
    }

    #[test]
    fn hex_roundtrip() {
        let value: Vec<u64> = vec![1, 500, 70_000];
        let hex = value.to_hex().unwrap();
        assert_eq!(hex, "83011901f41a00011170");
        assert_eq!(Vec::<u64>::from_hex(&hex).unwrap(), value);
    }
}
