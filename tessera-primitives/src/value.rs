//! Multi-asset values
//!
//! A [`Value`] is a coin amount plus a [`MultiAsset`] bundle. The bundle is a
//! two-level ordered map `policy -> asset name -> quantity` that never holds a
//! zero quantity nor an empty policy: every operation prunes them.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use tessera_codec::minicbor::{self, data::Type};

use crate::{Coin, PolicyId, ValidationError};

/// Name of a token under a policy, at most 32 bytes long
///
/// Names are ordered by length first, then bytewise, which matches the
/// canonical ordering of cbor map keys.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct AssetName(Vec<u8>);

impl AssetName {
    pub const MAX_LEN: usize = 32;

    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ValidationError> {
        let bytes = bytes.into();

        if bytes.len() > Self::MAX_LEN {
            return Err(ValidationError::AssetNameTooLong(bytes.len()));
        }

        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        Self::new(hex::decode(s)?)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Ord for AssetName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for AssetName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<&str> for AssetName {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.as_bytes())
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) if text.chars().all(|c| !c.is_control()) => {
                write!(f, "AssetName({text:?})")
            }
            _ => write!(f, "AssetName({})", hex::encode(&self.0)),
        }
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl<C> minicbor::Encode<C> for AssetName {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for AssetName {
    fn decode(d: &mut minicbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();
        let bytes = d.bytes()?;

        AssetName::new(bytes)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()).at(position))
    }
}

/// Signed token quantities grouped by policy
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct MultiAsset(BTreeMap<PolicyId, BTreeMap<AssetName, i64>>);

impl MultiAsset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Quantity held for the given asset, zero when absent
    pub fn get(&self, policy: &PolicyId, name: &AssetName) -> i64 {
        self.0
            .get(policy)
            .and_then(|assets| assets.get(name))
            .copied()
            .unwrap_or(0)
    }

    /// Adds `quantity` to the given asset, dropping the entry if it reaches zero
    pub fn add_asset(&mut self, policy: PolicyId, name: AssetName, quantity: i64) {
        let assets = self.0.entry(policy).or_default();
        let total = assets.get(&name).copied().unwrap_or(0).saturating_add(quantity);

        if total == 0 {
            assets.remove(&name);
        } else {
            assets.insert(name, total);
        }

        if assets.is_empty() {
            self.0.remove(&policy);
        }
    }

    pub fn with_asset(mut self, policy: PolicyId, name: AssetName, quantity: i64) -> Self {
        self.add_asset(policy, name, quantity);
        self
    }

    pub fn policies(&self) -> impl Iterator<Item = &PolicyId> {
        self.0.keys()
    }

    pub fn assets(&self, policy: &PolicyId) -> Option<&BTreeMap<AssetName, i64>> {
        self.0.get(policy)
    }

    /// Flattened `(policy, name, quantity)` triples in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&PolicyId, &AssetName, i64)> {
        self.0
            .iter()
            .flat_map(|(policy, assets)| assets.iter().map(move |(name, q)| (policy, name, *q)))
    }

    pub fn policy_count(&self) -> usize {
        self.0.len()
    }

    pub fn asset_count(&self) -> usize {
        self.0.values().map(|assets| assets.len()).sum()
    }

    /// New bundle holding only the entries accepted by `predicate`
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&PolicyId, &AssetName, i64) -> bool,
    {
        self.iter()
            .filter(|(policy, name, q)| predicate(policy, name, *q))
            .map(|(policy, name, q)| (*policy, name.clone(), q))
            .collect()
    }

    /// Entries with a strictly positive quantity
    pub fn positive(&self) -> Self {
        self.filter(|_, _, q| q > 0)
    }

    /// Entries with a strictly negative quantity
    pub fn negative(&self) -> Self {
        self.filter(|_, _, q| q < 0)
    }

    /// True when `self` has at least as much of every asset as `other`
    pub fn covers(&self, other: &MultiAsset) -> bool {
        other.iter().all(|(p, n, q)| self.get(p, n) >= q)
            && self.iter().all(|(p, n, q)| q >= other.get(p, n))
    }
}

impl FromIterator<(PolicyId, AssetName, i64)> for MultiAsset {
    fn from_iter<T: IntoIterator<Item = (PolicyId, AssetName, i64)>>(iter: T) -> Self {
        let mut out = MultiAsset::new();

        for (policy, name, quantity) in iter {
            out.add_asset(policy, name, quantity);
        }

        out
    }
}

impl fmt::Debug for MultiAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(p, a)| (p.to_string(), a)))
            .finish()
    }
}

impl AddAssign<&MultiAsset> for MultiAsset {
    fn add_assign(&mut self, rhs: &MultiAsset) {
        for (policy, name, quantity) in rhs.iter() {
            self.add_asset(*policy, name.clone(), quantity);
        }
    }
}

impl SubAssign<&MultiAsset> for MultiAsset {
    fn sub_assign(&mut self, rhs: &MultiAsset) {
        for (policy, name, quantity) in rhs.iter() {
            self.add_asset(*policy, name.clone(), quantity.saturating_neg());
        }
    }
}

impl Add for &MultiAsset {
    type Output = MultiAsset;

    fn add(self, rhs: &MultiAsset) -> MultiAsset {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Sub for &MultiAsset {
    type Output = MultiAsset;

    fn sub(self, rhs: &MultiAsset) -> MultiAsset {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

impl Neg for &MultiAsset {
    type Output = MultiAsset;

    fn neg(self) -> MultiAsset {
        self.iter()
            .map(|(p, n, q)| (*p, n.clone(), q.saturating_neg()))
            .collect()
    }
}

impl<C> minicbor::Encode<C> for MultiAsset {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.encode_with(&self.0, ctx)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for MultiAsset {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();
        let policies: BTreeMap<PolicyId, BTreeMap<AssetName, i64>> = d.decode_with(ctx)?;

        for (policy, assets) in policies.iter() {
            if assets.is_empty() {
                return Err(minicbor::decode::Error::message(format!(
                    "policy {policy} has no assets"
                ))
                .at(position));
            }

            if let Some((name, _)) = assets.iter().find(|(_, q)| **q == 0) {
                return Err(minicbor::decode::Error::message(format!(
                    "asset {policy}.{name} has a zero quantity"
                ))
                .at(position));
            }
        }

        Ok(MultiAsset(policies))
    }
}

/// Coin plus multi-asset bundle
///
/// Arithmetic is component-wise. Subtraction floors the coin at zero, use
/// [`Value::checked_sub`] to detect a shortfall instead.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Value {
    pub coin: Coin,
    pub multi_asset: MultiAsset,
}

impl Value {
    pub fn new(coin: Coin) -> Self {
        Self {
            coin,
            multi_asset: MultiAsset::new(),
        }
    }

    pub fn with_assets(coin: Coin, multi_asset: MultiAsset) -> Self {
        Self { coin, multi_asset }
    }

    pub fn is_zero(&self) -> bool {
        self.coin == 0 && self.multi_asset.is_empty()
    }

    pub fn is_pure_coin(&self) -> bool {
        self.multi_asset.is_empty()
    }

    /// `self - rhs`, or `None` when the coin would go below zero
    pub fn checked_sub(&self, rhs: &Value) -> Option<Value> {
        Some(Value {
            coin: self.coin.checked_sub(rhs.coin)?,
            multi_asset: &self.multi_asset - &rhs.multi_asset,
        })
    }

    /// Keeps the coin and only the assets accepted by `predicate`
    pub fn filter<F>(&self, predicate: F) -> Value
    where
        F: FnMut(&PolicyId, &AssetName, i64) -> bool,
    {
        Value {
            coin: self.coin,
            multi_asset: self.multi_asset.filter(predicate),
        }
    }
}

impl From<Coin> for Value {
    fn from(coin: Coin) -> Self {
        Value::new(coin)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.multi_asset.is_empty() {
            write!(f, "Value({})", self.coin)
        } else {
            write!(f, "Value({}, {:?})", self.coin, self.multi_asset)
        }
    }
}

impl Add for &Value {
    type Output = Value;

    fn add(self, rhs: &Value) -> Value {
        Value {
            coin: self.coin.saturating_add(rhs.coin),
            multi_asset: &self.multi_asset + &rhs.multi_asset,
        }
    }
}

impl Add for Value {
    type Output = Value;

    fn add(self, rhs: Value) -> Value {
        &self + &rhs
    }
}

impl Sub for &Value {
    type Output = Value;

    fn sub(self, rhs: &Value) -> Value {
        Value {
            coin: self.coin.saturating_sub(rhs.coin),
            multi_asset: &self.multi_asset - &rhs.multi_asset,
        }
    }
}

impl Sub for Value {
    type Output = Value;

    fn sub(self, rhs: Value) -> Value {
        &self - &rhs
    }
}

impl AddAssign<&Value> for Value {
    fn add_assign(&mut self, rhs: &Value) {
        self.coin = self.coin.saturating_add(rhs.coin);
        self.multi_asset += &rhs.multi_asset;
    }
}

impl SubAssign<&Value> for Value {
    fn sub_assign(&mut self, rhs: &Value) {
        self.coin = self.coin.saturating_sub(rhs.coin);
        self.multi_asset -= &rhs.multi_asset;
    }
}

impl<'a> Sum<&'a Value> for Value {
    fn sum<I: Iterator<Item = &'a Value>>(iter: I) -> Self {
        iter.fold(Value::default(), |mut acc, x| {
            acc += x;
            acc
        })
    }
}

impl Sum for Value {
    fn sum<I: Iterator<Item = Value>>(iter: I) -> Self {
        iter.fold(Value::default(), |mut acc, x| {
            acc += &x;
            acc
        })
    }
}

/// Component-wise order: `a <= b` when `b` holds at least as much coin and
/// at least as much of every asset. Values that differ in both directions are
/// incomparable.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let le = self.coin <= other.coin && other.multi_asset.covers(&self.multi_asset);
        let ge = self.coin >= other.coin && self.multi_asset.covers(&other.multi_asset);

        match (le, ge) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl<C> minicbor::Encode<C> for Value {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if self.multi_asset.is_empty() {
            e.u64(self.coin)?;
        } else {
            e.array(2)?;
            e.u64(self.coin)?;
            e.encode_with(&self.multi_asset, ctx)?;
        }

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Value {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            Type::U8 | Type::U16 | Type::U32 | Type::U64 => Ok(Value::new(d.u64()?)),
            Type::Array => {
                let position = d.position();
                if d.array()? != Some(2) {
                    return Err(minicbor::decode::Error::message(
                        "multi-asset value must be a 2 element array",
                    )
                    .at(position));
                }

                let coin = d.u64()?;
                let multi_asset = d.decode_with(ctx)?;
                Ok(Value::with_assets(coin, multi_asset))
            }
            t => Err(minicbor::decode::Error::message(format!(
                "unexpected cbor type {t} for value"
            ))),
        }
    }
}
