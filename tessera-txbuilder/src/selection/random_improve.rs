use rand::rngs::StdRng;
use tessera_primitives::{AssetName, PolicyId, UTxO, Value};

use super::{
    check_input_count, covers, finish, respect_min_utxo, CandidateSource, RngSource, Selection,
    SelectionError, SelectionRequest, Selector,
};
use crate::ProtocolParameters;

/// A single entry of the requested value
#[derive(Debug, Clone, PartialEq, Eq)]
enum Asset {
    Coin,
    Token(PolicyId, AssetName),
}

impl Asset {
    fn quantity(&self, value: &Value) -> i128 {
        match self {
            Asset::Coin => value.coin as i128,
            Asset::Token(policy, name) => value.multi_asset.get(policy, name) as i128,
        }
    }
}

/// One request per asset, coin first, largest quantity first
fn split_by_asset(total: &Value) -> Vec<(Asset, i128)> {
    let mut requests = vec![];

    if total.coin > 0 {
        requests.push((Asset::Coin, total.coin as i128));
    }

    for (policy, name, quantity) in total.multi_asset.iter() {
        if quantity > 0 {
            requests.push((Asset::Token(*policy, name.clone()), quantity as i128));
        }
    }

    requests.sort_by(|a, b| b.1.cmp(&a.1));
    requests
}

/// Random selection followed by an improvement pass
///
/// Each asset of the request is covered by drawing random UTxOs from the
/// pool. A second pass then walks the assets from the smallest request to the
/// largest and keeps drawing, accepting a candidate only when it moves the
/// selected quantity closer to twice the request without exceeding three
/// times the request.
///
/// Candidate positions come from a [`CandidateSource`].
#[derive(Debug, Clone)]
pub struct RandomImprove<S = RngSource<StdRng>> {
    source: S,
    max_improve_rounds: Option<usize>,
}

impl RandomImprove {
    pub fn new() -> Self {
        Self::with_source(RngSource::from_os_rng())
    }
}

impl Default for RandomImprove {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CandidateSource> RandomImprove<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            max_improve_rounds: None,
        }
    }

    /// Caps the draws of the improvement pass. Defaults to the size of the
    /// pool left after the first pass.
    pub fn max_improve_rounds(mut self, rounds: usize) -> Self {
        self.max_improve_rounds = Some(rounds);
        self
    }

    fn random_select(
        &mut self,
        remaining: &mut Vec<UTxO>,
        selected: &mut Vec<UTxO>,
        selected_amount: &mut Value,
        asset: &Asset,
        quantity: i128,
        request: &SelectionRequest,
    ) -> Result<(), SelectionError> {
        while asset.quantity(selected_amount) < quantity {
            let index = self
                .source
                .next_index(remaining.len())
                .ok_or(SelectionError::InputsDepleted)?;

            let utxo = remaining.remove(index);
            *selected_amount += &utxo.output.amount;
            selected.push(utxo);

            check_input_count(selected, request)?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn improve(
        &mut self,
        remaining: &mut Vec<UTxO>,
        selected: &mut Vec<UTxO>,
        selected_amount: &mut Value,
        asset: &Asset,
        quantity: i128,
        rounds: &mut usize,
        request: &SelectionRequest,
    ) {
        let ideal = quantity * 2;
        let upper = quantity * 3;

        while asset.quantity(selected_amount) < ideal && *rounds > 0 {
            if let Some(max) = request.max_input_count {
                if selected.len() >= max {
                    return;
                }
            }

            let Some(index) = self.source.next_index(remaining.len()) else {
                return;
            };

            *rounds -= 1;

            let current = asset.quantity(selected_amount);
            let candidate = current + asset.quantity(&remaining[index].output.amount);

            let closer = (ideal - candidate).abs() < (ideal - current).abs();

            if closer && candidate <= upper {
                let utxo = remaining.remove(index);
                *selected_amount += &utxo.output.amount;
                selected.push(utxo);
            }
        }
    }
}

impl<S: CandidateSource> Selector for RandomImprove<S> {
    fn name(&self) -> &'static str {
        "random-improve"
    }

    fn select(
        &mut self,
        pool: &[UTxO],
        request: &SelectionRequest,
        params: &ProtocolParameters,
    ) -> Result<Selection, SelectionError> {
        let total = request.total(params);
        let requests = split_by_asset(&total);

        if requests.is_empty() {
            return Err(SelectionError::EmptyRequest);
        }

        let mut remaining: Vec<UTxO> = pool.to_vec();
        let mut selected = vec![];
        let mut selected_amount = Value::default();

        for (asset, quantity) in requests.iter() {
            self.random_select(
                &mut remaining,
                &mut selected,
                &mut selected_amount,
                asset,
                *quantity,
                request,
            )?;
        }

        let mut rounds = self.max_improve_rounds.unwrap_or(remaining.len());

        for (asset, quantity) in requests.iter().rev() {
            self.improve(
                &mut remaining,
                &mut selected,
                &mut selected_amount,
                asset,
                *quantity,
                &mut rounds,
                request,
            );
        }

        debug_assert!(covers(&selected_amount, &total));

        if request.respect_min_utxo {
            respect_min_utxo(
                self,
                &mut selected,
                &mut remaining,
                &total,
                request,
                params,
            )?;
        }

        tracing::debug!(
            selected = selected.len(),
            remaining = remaining.len(),
            "random-improve selection done"
        );

        Ok(finish(selected, remaining, &total, request))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use tessera_primitives::{Address, Hash, MultiAsset, TransactionInput, TransactionOutput};

    use super::*;
    use crate::ScriptedSource;

    const ADDRESS: &str = "addr_test1vrm9x2zsux7va6w892g38tvchnzahvcd9tykqf3ygnmwtaqyfg52x";

    fn token(name: &str) -> Asset {
        Asset::Token(Hash::new([1; 28]), AssetName::try_from(name).unwrap())
    }

    #[test]
    fn splits_coin_first_then_by_quantity() {
        let ma = MultiAsset::new()
            .with_asset(Hash::new([1; 28]), AssetName::try_from("a").unwrap(), 10)
            .with_asset(Hash::new([1; 28]), AssetName::try_from("b").unwrap(), 30)
            .with_asset(Hash::new([1; 28]), AssetName::try_from("c").unwrap(), 10);

        let requests = split_by_asset(&Value::with_assets(10, ma));

        assert_eq!(
            requests,
            vec![
                (token("b"), 30),
                (Asset::Coin, 10),
                (token("a"), 10),
                (token("c"), 10),
            ]
        );
    }

    #[test]
    fn empty_request_is_rejected() {
        let address = Address::from_str(ADDRESS).unwrap();
        let request = SelectionRequest::new(vec![TransactionOutput::new(address, Value::new(0))])
            .include_max_fee(false);

        let err = RandomImprove::with_source(ScriptedSource::default())
            .select(&[], &request, &ProtocolParameters::default())
            .unwrap_err();

        assert!(matches!(err, SelectionError::EmptyRequest));
    }

    #[test]
    fn improvement_rejects_overshoot() {
        let address = Address::from_str(ADDRESS).unwrap();

        let pool: Vec<UTxO> = [4_000_000u64, 10_000_000, 3_000_000]
            .into_iter()
            .enumerate()
            .map(|(i, coin)| {
                UTxO::new(
                    TransactionInput::new(Hash::new([2; 32]), i as u64),
                    TransactionOutput::new(address.clone(), coin),
                )
            })
            .collect();

        let output = TransactionOutput::new(address, Value::new(3_000_000));
        let request = SelectionRequest::new(vec![output])
            .include_max_fee(false)
            .respect_min_utxo(false);

        // 4 ada covers the request, 10 ada would overshoot 9, 3 ada lands on 7
        let selection = RandomImprove::with_source(ScriptedSource::new([0, 0, 1]))
            .select(&pool, &request, &ProtocolParameters::default())
            .unwrap();

        assert_eq!(selection.selected, vec![pool[0].clone(), pool[2].clone()]);
        assert_eq!(selection.remaining, vec![pool[1].clone()]);
        assert_eq!(selection.change, Value::new(4_000_000));
    }
}
