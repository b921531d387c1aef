//! Strategies picking the UTxOs that fund a transaction
//!
//! A [`Selector`] receives a pool of spendable UTxOs and a
//! [`SelectionRequest`] describing the outputs to cover. It returns the chosen
//! UTxOs, what is left of the pool and the change the choice produces.
//! Selectors are stateless apart from their source of randomness, so the same
//! request against the same pool can be replayed against any strategy.

use std::{cmp::Ordering, collections::VecDeque};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tessera_primitives::{Address, TransactionOutput, UTxO, Value};
use thiserror::Error;

use crate::{max_tx_fee, min_lovelace_post_alonzo, ProtocolParameters};

mod largest_first;
mod random_improve;

pub use largest_first::LargestFirst;
pub use random_improve::RandomImprove;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("UTxO balance insufficient")]
    InsufficientBalance,

    #[error("input UTxOs depleted")]
    InputsDepleted,

    #[error("max input count {0} exceeded")]
    MaxInputCountExceeded(usize),

    #[error("nothing was requested")]
    EmptyRequest,

    #[error("all selectors failed, unfulfilled amount {unfulfilled:?}")]
    AllSelectorsFailed { unfulfilled: Value },

    #[error(transparent)]
    Codec(#[from] tessera_codec::Error),
}

/// What a selector has to cover
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    pub outputs: Vec<TransactionOutput>,

    /// Upper bound on the number of selected UTxOs
    pub max_input_count: Option<usize>,

    /// Reserve room for the largest fee the protocol allows
    pub include_max_fee: bool,

    /// Keep selecting until the change can stand as an output on its own
    pub respect_min_utxo: bool,

    /// Surplus the caller already holds, counted toward the change
    pub existing_amount: Option<Value>,
}

impl SelectionRequest {
    pub fn new(outputs: Vec<TransactionOutput>) -> Self {
        Self {
            outputs,
            max_input_count: None,
            include_max_fee: true,
            respect_min_utxo: true,
            existing_amount: None,
        }
    }

    pub fn max_input_count(mut self, count: usize) -> Self {
        self.max_input_count = Some(count);
        self
    }

    pub fn include_max_fee(mut self, include: bool) -> Self {
        self.include_max_fee = include;
        self
    }

    pub fn respect_min_utxo(mut self, respect: bool) -> Self {
        self.respect_min_utxo = respect;
        self
    }

    pub fn existing_amount(mut self, amount: Value) -> Self {
        self.existing_amount = Some(amount);
        self
    }

    /// Sum of the outputs, plus the max fee when requested
    pub fn total(&self, params: &ProtocolParameters) -> Value {
        let mut total: Value = self.outputs.iter().map(|x| &x.amount).sum();

        if self.include_max_fee {
            total.coin = total.coin.saturating_add(max_tx_fee(params));
        }

        total
    }
}

/// Outcome of a successful selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Chosen UTxOs, ordered by transaction id and index
    pub selected: Vec<UTxO>,

    /// Pool entries that were not chosen, in pool order
    pub remaining: Vec<UTxO>,

    /// Value left over once the request is covered
    pub change: Value,
}

impl Selection {
    pub fn selected_amount(&self) -> Value {
        self.selected.iter().map(|x| &x.output.amount).sum()
    }
}

pub trait Selector {
    fn name(&self) -> &'static str;

    fn select(
        &mut self,
        pool: &[UTxO],
        request: &SelectionRequest,
        params: &ProtocolParameters,
    ) -> Result<Selection, SelectionError>;
}

impl<T: Selector + ?Sized> Selector for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn select(
        &mut self,
        pool: &[UTxO],
        request: &SelectionRequest,
        params: &ProtocolParameters,
    ) -> Result<Selection, SelectionError> {
        (**self).select(pool, request, params)
    }
}

/// Where a randomized selector gets the position of its next candidate
pub trait CandidateSource {
    /// An index below `len`, or `None` once the source is exhausted
    fn next_index(&mut self, len: usize) -> Option<usize>;
}

/// Candidates drawn uniformly from a random number generator
#[derive(Debug, Clone)]
pub struct RngSource<R>(R);

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self(rng)
    }
}

impl RngSource<StdRng> {
    pub fn from_seed(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self(StdRng::from_os_rng())
    }
}

impl<R: Rng> CandidateSource for RngSource<R> {
    fn next_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }

        Some(self.0.random_range(0..len))
    }
}

/// Candidates replayed from a fixed sequence, each value taken modulo the
/// pool length
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource(VecDeque<usize>);

impl ScriptedSource {
    pub fn new(values: impl IntoIterator<Item = usize>) -> Self {
        Self(values.into_iter().collect())
    }
}

impl CandidateSource for ScriptedSource {
    fn next_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }

        self.0.pop_front().map(|x| x % len)
    }
}

/// True when `amount` holds at least `total` of coin and of every asset
fn covers(amount: &Value, total: &Value) -> bool {
    matches!(
        total.partial_cmp(amount),
        Some(Ordering::Less | Ordering::Equal)
    )
}

fn sum_amounts(utxos: &[UTxO]) -> Value {
    utxos.iter().map(|x| &x.output.amount).sum()
}

fn check_input_count(selected: &[UTxO], request: &SelectionRequest) -> Result<(), SelectionError> {
    match request.max_input_count {
        Some(max) if selected.len() > max => Err(SelectionError::MaxInputCountExceeded(max)),
        _ => Ok(()),
    }
}

/// Change left by `selected` once `total` is paid, including the caller's
/// existing surplus
fn change_of(selected: &[UTxO], total: &Value, request: &SelectionRequest) -> Value {
    let mut provided = sum_amounts(selected);

    if let Some(existing) = &request.existing_amount {
        provided += existing;
    }

    &provided - total
}

/// Coin still missing for `change` to meet its own minimum, if any
fn min_utxo_shortfall(
    change: &Value,
    address: &Address,
    params: &ProtocolParameters,
) -> Result<Option<Value>, SelectionError> {
    let stub = TransactionOutput::new(address.clone(), change.clone());
    let required = min_lovelace_post_alonzo(&stub, params)?;

    if change.coin < required {
        Ok(Some(Value::new(required - change.coin)))
    } else {
        Ok(None)
    }
}

/// Tops up `selected` from `remaining` until the change covers its own min
/// lovelace, using `selector` for the extra coin
fn respect_min_utxo<S: Selector + ?Sized>(
    selector: &mut S,
    selected: &mut Vec<UTxO>,
    remaining: &mut Vec<UTxO>,
    total: &Value,
    request: &SelectionRequest,
    params: &ProtocolParameters,
) -> Result<(), SelectionError> {
    let Some(first) = request.outputs.first() else {
        return Ok(());
    };

    let change = change_of(selected, total, request);

    let Some(missing) = min_utxo_shortfall(&change, &first.address, params)? else {
        return Ok(());
    };

    tracing::debug!(
        selector = selector.name(),
        missing = missing.coin,
        "change below min lovelace, selecting more"
    );

    let top_up = SelectionRequest {
        outputs: vec![TransactionOutput::new(first.address.clone(), missing)],
        max_input_count: request
            .max_input_count
            .map(|max| max.saturating_sub(selected.len())),
        include_max_fee: false,
        respect_min_utxo: false,
        existing_amount: None,
    };

    let extra = selector.select(remaining, &top_up, params)?;

    selected.extend(extra.selected);
    *remaining = extra.remaining;

    check_input_count(selected, request)
}

/// Sorts the selection into its final order and computes its change
fn finish(
    mut selected: Vec<UTxO>,
    remaining: Vec<UTxO>,
    total: &Value,
    request: &SelectionRequest,
) -> Selection {
    selected.sort_by(|a, b| a.input.cmp(&b.input));
    let change = change_of(&selected, total, request);

    Selection {
        selected,
        remaining,
        change,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_source_wraps_and_ends() {
        let mut source = ScriptedSource::new([9, 4]);
        assert_eq!(source.next_index(5), Some(4));
        assert_eq!(source.next_index(10), Some(4));
        assert_eq!(source.next_index(10), None);
    }

    #[test]
    fn rng_source_stays_in_range() {
        let mut source = RngSource::from_seed(7);

        for len in 1..50 {
            let index = source.next_index(len).unwrap();
            assert!(index < len);
        }

        assert_eq!(source.next_index(0), None);
    }

    #[test]
    fn seeded_sources_replay() {
        let mut a = RngSource::new(rand_chacha::ChaCha8Rng::seed_from_u64(42));
        let mut b = RngSource::new(rand_chacha::ChaCha8Rng::seed_from_u64(42));

        let xs: Vec<_> = (0..20).map(|_| a.next_index(100)).collect();
        let ys: Vec<_> = (0..20).map(|_| b.next_index(100)).collect();
        assert_eq!(xs, ys);
    }
}
