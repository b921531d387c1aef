use tessera_primitives::{UTxO, Value};

use super::{
    check_input_count, covers, finish, respect_min_utxo, Selection, SelectionError, SelectionRequest,
    Selector,
};
use crate::ProtocolParameters;

/// Spends the UTxOs holding the most coin first
///
/// The pool is sorted by coin, largest first, keeping the pool order between
/// UTxOs with equal coin, and consumed until the request is covered. Fully
/// deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargestFirst;

impl Selector for LargestFirst {
    fn name(&self) -> &'static str {
        "largest-first"
    }

    fn select(
        &mut self,
        pool: &[UTxO],
        request: &SelectionRequest,
        params: &ProtocolParameters,
    ) -> Result<Selection, SelectionError> {
        let total = request.total(params);

        let mut available: Vec<UTxO> = pool.to_vec();
        available.sort_by(|a, b| b.output.lovelace().cmp(&a.output.lovelace()));

        let mut available = available.into_iter();
        let mut selected = vec![];
        let mut selected_amount = Value::default();

        while !covers(&selected_amount, &total) {
            let Some(next) = available.next() else {
                return Err(SelectionError::InsufficientBalance);
            };

            selected_amount += &next.output.amount;
            selected.push(next);

            check_input_count(&selected, request)?;
        }

        let mut remaining: Vec<UTxO> = pool
            .iter()
            .filter(|x| !selected.contains(x))
            .cloned()
            .collect();

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
            "largest-first selection done"
        );

        Ok(finish(selected, remaining, &total, request))
    }
}
