use minicbor::{
    data::{Tag, Type},
    Decode, Encode,
};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Deref};

/// Tag used by the ledger to mark an array as a set
pub const SET_TAG: u64 = 258;

/// Tag used to embed CBOR-encoded bytes inside another CBOR structure
pub const CBOR_TAG: u64 = 24;

/// Custom collection to ensure ordered pairs of values
///
/// Since the ordering of the entries requires a particular order to maintain
/// canonicalization for isomorphic decoding / encoding operators, we use a Vec
/// as the underlaying struct for storage of the items (as opposed to a BTreeMap
/// or HashMap).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(from = "Vec::<(K, V)>", into = "Vec::<(K, V)>")]
pub enum KeyValuePairs<K, V>
where
    K: Clone,
    V: Clone,
{
    Def(Vec<(K, V)>),
    Indef(Vec<(K, V)>),
}

impl<K, V> KeyValuePairs<K, V>
where
    K: Clone,
    V: Clone,
{
    pub fn to_vec(self) -> Vec<(K, V)> {
        self.into()
    }

    pub fn get(&self, key: &K) -> Option<&V>
    where
        K: PartialEq,
    {
        self.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl<K, V> From<KeyValuePairs<K, V>> for Vec<(K, V)>
where
    K: Clone,
    V: Clone,
{
    fn from(other: KeyValuePairs<K, V>) -> Self {
        match other {
            KeyValuePairs::Def(x) => x,
            KeyValuePairs::Indef(x) => x,
        }
    }
}

impl<K, V> From<Vec<(K, V)>> for KeyValuePairs<K, V>
where
    K: Clone,
    V: Clone,
{
    fn from(other: Vec<(K, V)>) -> Self {
        KeyValuePairs::Def(other)
    }
}

impl<K, V> Deref for KeyValuePairs<K, V>
where
    K: Clone,
    V: Clone,
{
    type Target = Vec<(K, V)>;

    fn deref(&self) -> &Self::Target {
        match self {
            KeyValuePairs::Def(x) => x,
            KeyValuePairs::Indef(x) => x,
        }
    }
}

impl<'b, C, K, V> minicbor::decode::Decode<'b, C> for KeyValuePairs<K, V>
where
    K: Decode<'b, C> + Clone,
    V: Decode<'b, C> + Clone,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let datatype = d.datatype()?;

        let items: Result<Vec<_>, _> = d.map_iter_with::<C, K, V>(ctx)?.collect();
        let items = items?;

        match datatype {
            Type::Map => Ok(KeyValuePairs::Def(items)),
            Type::MapIndef => Ok(KeyValuePairs::Indef(items)),
            _ => Err(minicbor::decode::Error::message(
                "invalid data type for keyvaluepairs",
            )),
        }
    }
}

impl<C, K, V> minicbor::encode::Encode<C> for KeyValuePairs<K, V>
where
    K: Encode<C> + Clone,
    V: Encode<C> + Clone,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            KeyValuePairs::Def(x) => {
                e.map(x.len() as u64)?;

                for (k, v) in x.iter() {
                    k.encode(e, ctx)?;
                    v.encode(e, ctx)?;
                }
            }
            KeyValuePairs::Indef(x) => {
                e.begin_map()?;

                for (k, v) in x.iter() {
                    k.encode(e, ctx)?;
                    v.encode(e, ctx)?;
                }

                e.end()?;
            }
        }

        Ok(())
    }
}

/// An array of unique items, optionally marked with tag 258
///
/// Newer ledger eras mark sets explicitly with a tag while older ones use a
/// plain array. Both forms are accepted when decoding and the form found is
/// kept so that re-encoding produces the same bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(from = "Vec::<T>", into = "Vec::<T>")]
pub struct Set<T: Clone> {
    items: Vec<T>,
    tagged: bool,
}

impl<T: Clone> Set<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            tagged: false,
        }
    }

    pub fn tagged(items: Vec<T>) -> Self {
        Self {
            items,
            tagged: true,
        }
    }

    pub fn is_tagged(&self) -> bool {
        self.tagged
    }

    pub fn to_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Clone> Deref for Set<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<T: Clone> From<Vec<T>> for Set<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: Clone> From<Set<T>> for Vec<T> {
    fn from(set: Set<T>) -> Self {
        set.items
    }
}

impl<T: Clone> FromIterator<T> for Set<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'b, C, T> minicbor::Decode<'b, C> for Set<T>
where
    T: minicbor::Decode<'b, C> + Clone,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let tagged = if d.datatype()? == Type::Tag {
            let position = d.position();
            let tag = d.tag()?;

            if tag != Tag::new(SET_TAG) {
                return Err(minicbor::decode::Error::message(format!(
                    "expected set tag {SET_TAG}, found tag {}",
                    tag.as_u64()
                ))
                .at(position));
            }

            true
        } else {
            false
        };

        let items = d.array_iter_with(ctx)?.collect::<Result<_, _>>()?;

        Ok(Self { items, tagged })
    }
}

impl<C, T> minicbor::Encode<C> for Set<T>
where
    T: minicbor::Encode<C> + Clone,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if self.tagged {
            e.tag(Tag::new(SET_TAG))?;
        }

        e.array(self.items.len() as u64)?;

        for item in &self.items {
            e.encode_with(item, ctx)?;
        }

        Ok(())
    }
}

/// Wraps a struct so that it is encoded/decoded as a cbor bytes
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd)]
#[serde(transparent)]
pub struct CborWrap<T>(pub T);

impl<'b, C, T> minicbor::Decode<'b, C> for CborWrap<T>
where
    T: minicbor::Decode<'b, C>,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();
        let tag = d.tag()?;

        if tag != Tag::new(CBOR_TAG) {
            return Err(minicbor::decode::Error::message(format!(
                "expected embedded cbor tag {CBOR_TAG}, found tag {}",
                tag.as_u64()
            ))
            .at(position));
        }

        let cbor = d.bytes()?;
        let wrapped = minicbor::decode_with(cbor, ctx)?;

        Ok(CborWrap(wrapped))
    }
}

impl<C, T> minicbor::Encode<C> for CborWrap<T>
where
    T: minicbor::Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let buf = minicbor::to_vec_with(&self.0, ctx).map_err(|_| {
            minicbor::encode::Error::message("error encoding cbor-wrapped structure")
        })?;

        e.tag(Tag::new(CBOR_TAG))?;
        e.bytes(&buf)?;

        Ok(())
    }
}

impl<T> Deref for CborWrap<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A value wrapped in a fixed numeric tag
///
/// Decoding fails when the payload carries a different tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TagWrap<I, const T: u64>(pub I);

impl<I, const T: u64> TagWrap<I, T> {
    pub fn new(inner: I) -> Self {
        TagWrap(inner)
    }

    pub fn unwrap(self) -> I {
        self.0
    }
}

impl<'b, C, I, const T: u64> minicbor::Decode<'b, C> for TagWrap<I, T>
where
    I: minicbor::Decode<'b, C>,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();
        let tag = d.tag()?;

        if tag != Tag::new(T) {
            return Err(minicbor::decode::Error::message(format!(
                "expected tag {T}, found tag {}",
                tag.as_u64()
            ))
            .at(position));
        }

        Ok(TagWrap(d.decode_with(ctx)?))
    }
}

impl<C, I, const T: u64> minicbor::Encode<C> for TagWrap<I, T>
where
    I: minicbor::Encode<C>,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.tag(Tag::new(T))?;
        e.encode_with(&self.0, ctx)?;

        Ok(())
    }
}

impl<I, const T: u64> Deref for TagWrap<I, T> {
    type Target = I;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Any well-formed CBOR value, kept as its original bytes
///
/// Used for payloads this library carries but never interprets, such as
/// inline datums or redeemers.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnyCbor {
    inner: Vec<u8>,
}

impl AnyCbor {
    /// Wraps already encoded bytes, checking that they hold exactly one value
    pub fn from_raw(bytes: Vec<u8>) -> Result<Self, crate::Error> {
        let mut d = minicbor::Decoder::new(&bytes);
        d.skip()?;

        match bytes.len() - d.position() {
            0 => Ok(Self { inner: bytes }),
            n => Err(crate::Error::TrailingBytes(n)),
        }
    }

    pub fn from_encode<T>(value: T) -> Result<Self, crate::Error>
    where
        T: minicbor::Encode<()>,
    {
        let inner = minicbor::to_vec(value).map_err(|e| crate::Error::Encode(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.inner
    }

    pub fn into_decode<T>(self) -> Result<T, minicbor::decode::Error>
    where
        for<'b> T: minicbor::Decode<'b, ()>,
    {
        minicbor::decode(&self.inner)
    }
}

impl fmt::Debug for AnyCbor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyCbor")
            .field(&hex::encode(&self.inner))
            .finish()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for AnyCbor {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let all = d.input();
        let start = d.position();
        d.skip()?;
        let end = d.position();

        Ok(Self {
            inner: all[start..end].to_vec(),
        })
    }
}

impl<C> minicbor::Encode<C> for AnyCbor {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.writer_mut()
            .write_all(&self.inner)
            .map_err(minicbor::encode::Error::write)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(from = "Option::<T>", into = "Option::<T>")]
pub enum Nullable<T>
where
    T: std::clone::Clone,
{
    Some(T),
    Null,
    Undefined,
}

impl<T> Nullable<T>
where
    T: std::clone::Clone,
{
    pub fn map<F, O>(self, f: F) -> Nullable<O>
    where
        O: std::clone::Clone,
        F: Fn(T) -> O,
    {
        match self {
            Nullable::Some(x) => Nullable::Some(f(x)),
            Nullable::Null => Nullable::Null,
            Nullable::Undefined => Nullable::Undefined,
        }
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Nullable::Some(x) => Some(x),
            _ => None,
        }
    }
}

impl<'b, C, T> minicbor::Decode<'b, C> for Nullable<T>
where
    T: minicbor::Decode<'b, C> + std::clone::Clone,
{
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            Type::Null => {
                d.null()?;
                Ok(Self::Null)
            }
            Type::Undefined => {
                d.undefined()?;
                Ok(Self::Undefined)
            }
            _ => {
                let x = d.decode_with(ctx)?;
                Ok(Self::Some(x))
            }
        }
    }
}

impl<C, T> minicbor::Encode<C> for Nullable<T>
where
    T: minicbor::Encode<C> + std::clone::Clone,
{
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Nullable::Some(x) => {
                e.encode_with(x, ctx)?;
                Ok(())
            }
            Nullable::Null => {
                e.null()?;
                Ok(())
            }
            Nullable::Undefined => {
                e.undefined()?;
                Ok(())
            }
        }
    }
}

impl<T> From<Option<T>> for Nullable<T>
where
    T: std::clone::Clone,
{
    fn from(x: Option<T>) -> Self {
        match x {
            Some(x) => Nullable::Some(x),
            None => Nullable::Null,
        }
    }
}

impl<T> From<Nullable<T>> for Option<T>
where
    T: std::clone::Clone,
{
    fn from(other: Nullable<T>) -> Self {
        match other {
            Nullable::Some(x) => Some(x),
            _ => None,
        }
    }
}

#[derive(
    Serialize, Deserialize, Clone, Encode, Decode, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[cbor(transparent)]
#[serde(into = "String")]
#[serde(try_from = "String")]
pub struct Bytes(#[n(0)] minicbor::bytes::ByteVec);

impl From<Vec<u8>> for Bytes {
    fn from(xs: Vec<u8>) -> Self {
        Bytes(minicbor::bytes::ByteVec::from(xs))
    }
}

impl From<&[u8]> for Bytes {
    fn from(xs: &[u8]) -> Self {
        Bytes::from(xs.to_vec())
    }
}

impl From<Bytes> for Vec<u8> {
    fn from(b: Bytes) -> Self {
        b.0.into()
    }
}

impl Deref for Bytes {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        self.deref().as_slice()
    }
}

impl TryFrom<String> for Bytes {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let v = hex::decode(value)?;
        Ok(Bytes(minicbor::bytes::ByteVec::from(v)))
    }
}

impl From<Bytes> for String {
    fn from(b: Bytes) -> Self {
        hex::encode(b.deref())
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.deref()))
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Bytes").field(&hex::encode(self.deref())).finish()
    }
}

#[derive(
    Serialize, Deserialize, Clone, Copy, Encode, Decode, Debug, PartialEq, Eq, PartialOrd, Ord,
)]
#[cbor(transparent)]
#[serde(into = "i128")]
#[serde(try_from = "i128")]
pub struct Int(#[n(0)] pub minicbor::data::Int);

impl Deref for Int {
    type Target = minicbor::data::Int;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Int> for i128 {
    fn from(value: Int) -> Self {
        i128::from(value.0)
    }
}

impl From<i64> for Int {
    fn from(x: i64) -> Self {
        let inner = minicbor::data::Int::from(x);
        Self(inner)
    }
}

impl From<u64> for Int {
    fn from(x: u64) -> Self {
        Self(minicbor::data::Int::from(x))
    }
}

impl TryFrom<i128> for Int {
    type Error = minicbor::data::TryFromIntError;

    fn try_from(value: i128) -> Result<Self, Self::Error> {
        let inner = minicbor::data::Int::try_from(value)?;
        Ok(Self(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fragment;

    #[test]
    fn set_keeps_tag_form() {
        // 258([1, 2])
        let tagged = hex::decode("d90102820102").unwrap();
        let set = Set::<u8>::decode_fragment(&tagged).unwrap();
        assert!(set.is_tagged());
        assert_eq!(*set, vec![1, 2]);
        assert_eq!(set.encode_fragment().unwrap(), tagged);

        let plain = hex::decode("820102").unwrap();
        let set = Set::<u8>::decode_fragment(&plain).unwrap();
        assert!(!set.is_tagged());
        assert_eq!(set.encode_fragment().unwrap(), plain);
    }

    #[test]
    fn set_rejects_foreign_tag() {
        // 259([1])
        let bytes = hex::decode("d901038101").unwrap();
        let err = Set::<u8>::decode_fragment(&bytes).unwrap_err();
        assert!(err.to_string().contains("found tag 259"));
    }

    #[test]
    fn tag_wrap_rejects_mismatch() {
        let bytes = minicbor::to_vec(TagWrap::<u8, 30>::new(7)).unwrap();
        assert_eq!(bytes, hex::decode("d81e07").unwrap());

        assert!(TagWrap::<u8, 30>::decode_fragment(&bytes).is_ok());
        assert!(TagWrap::<u8, 31>::decode_fragment(&bytes).is_err());
    }

    #[test]
    fn cbor_wrap_embeds_bytes() {
        let wrapped = CborWrap(vec![1u8, 2]);
        let bytes = wrapped.encode_fragment().unwrap();
        // 24(h'820102')
        assert_eq!(hex::encode(&bytes), "d81843820102");

        let back = CborWrap::<Vec<u8>>::decode_fragment(&bytes).unwrap();
        assert_eq!(back, wrapped);
    }

    #[test]
    fn any_cbor_preserves_bytes() {
        // non-canonical indefinite array [_ 1, 2]
        let raw = hex::decode("9f0102ff").unwrap();
        let any = AnyCbor::from_raw(raw.clone()).unwrap();
        assert_eq!(any.encode_fragment().unwrap(), raw);

        let values: Vec<u8> = any.into_decode().unwrap();
        assert_eq!(values, vec![1, 2]);

        assert!(AnyCbor::from_raw(vec![0x01, 0x02]).is_err());
    }

    #[test]
    fn nullable_roundtrip() {
        let null = Nullable::<u8>::decode_fragment(&[0xf6]).unwrap();
        assert_eq!(null, Nullable::Null);
        assert_eq!(null.encode_fragment().unwrap(), vec![0xf6]);

        let some = Nullable::<u8>::decode_fragment(&[0x05]).unwrap();
        assert_eq!(Option::from(some), Some(5u8));
    }

    #[test]
    fn bytes_display_as_hex() {
        let bytes = Bytes::from(vec![0xde, 0xad]);
        assert_eq!(bytes.to_string(), "dead");
        assert_eq!(Bytes::try_from("dead".to_string()).unwrap(), bytes);
    }

    proptest::proptest! {
        #[test]
        fn int_keeps_its_value(x in proptest::num::i64::ANY, y in proptest::num::u64::ANY) {
            let bytes = Int::from(x).encode_fragment().unwrap();
            proptest::prop_assert_eq!(i128::from(Int::decode_fragment(&bytes).unwrap()), x as i128);

            let bytes = Int::from(y).encode_fragment().unwrap();
            proptest::prop_assert_eq!(i128::from(Int::decode_fragment(&bytes).unwrap()), y as i128);

            // smallest head that holds the value
            let expected = match y {
                0..=23 => 1,
                24..=0xff => 2,
                0x100..=0xffff => 3,
                0x1_0000..=0xffff_ffff => 5,
                _ => 9,
            };
            proptest::prop_assert_eq!(bytes.len(), expected);
        }
    }
}
