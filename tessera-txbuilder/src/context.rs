use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    thread,
    time::Duration,
};

use tessera_codec::Fragment;
use tessera_primitives::{
    Address, Network, Slot, Transaction, TransactionId, TransactionInput, UTxO,
};
use thiserror::Error;

use crate::ProtocolParameters;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("nothing known about {0}")]
    NotFound(String),

    #[error("transaction rejected: {0}")]
    Submission(String),

    #[error("chain backend failure: {0}")]
    Backend(String),
}

/// Read and submit access to a chain
///
/// Building consults it for protocol parameters, the tip slot and the UTxOs
/// of input addresses. Implementations backed by a node or an indexer live
/// outside this crate.
pub trait ChainContext {
    fn protocol_parameters(&self) -> Result<ProtocolParameters, ChainError>;

    fn network(&self) -> Network;

    fn last_block_slot(&self) -> Result<Slot, ChainError>;

    /// UTxOs sitting at `address`, failing with [`ChainError::NotFound`] when
    /// the address has never been seen
    fn utxos(&self, address: &Address) -> Result<Vec<UTxO>, ChainError>;

    /// Submits a signed, cbor encoded transaction and returns its id
    fn submit_tx(&self, tx: &[u8]) -> Result<TransactionId, ChainError>;
}

/// A chain kept in memory, for offline building and tests
///
/// Submitting a transaction spends its inputs and adds its outputs right
/// away.
#[derive(Debug)]
pub struct MemoryContext {
    params: ProtocolParameters,
    network: Network,
    slot: Cell<Slot>,
    utxos: RefCell<BTreeMap<Address, Vec<UTxO>>>,
    submitted: RefCell<Vec<TransactionId>>,
}

impl MemoryContext {
    pub fn new(network: Network, params: ProtocolParameters) -> Self {
        Self {
            params,
            network,
            slot: Cell::new(0),
            utxos: Default::default(),
            submitted: Default::default(),
        }
    }

    pub fn with_utxo(self, utxo: UTxO) -> Self {
        self.add_utxo(utxo);
        self
    }

    pub fn with_slot(self, slot: Slot) -> Self {
        self.slot.set(slot);
        self
    }

    pub fn add_utxo(&self, utxo: UTxO) {
        self.utxos
            .borrow_mut()
            .entry(utxo.output.address.clone())
            .or_default()
            .push(utxo);
    }

    pub fn set_slot(&self, slot: Slot) {
        self.slot.set(slot);
    }

    /// Ids of every accepted transaction, in submission order
    pub fn submitted(&self) -> Vec<TransactionId> {
        self.submitted.borrow().clone()
    }

    fn spend(&self, inputs: &[TransactionInput]) -> Result<(), ChainError> {
        let mut utxos = self.utxos.borrow_mut();

        for input in inputs {
            let known = utxos
                .values()
                .any(|at| at.iter().any(|x| &x.input == input));

            if !known {
                return Err(ChainError::Submission(format!(
                    "unknown input {}#{}",
                    input.transaction_id, input.index
                )));
            }
        }

        for at in utxos.values_mut() {
            at.retain(|x| !inputs.contains(&x.input));
        }

        Ok(())
    }
}

impl ChainContext for MemoryContext {
    fn protocol_parameters(&self) -> Result<ProtocolParameters, ChainError> {
        Ok(self.params.clone())
    }

    fn network(&self) -> Network {
        self.network
    }

    fn last_block_slot(&self) -> Result<Slot, ChainError> {
        Ok(self.slot.get())
    }

    fn utxos(&self, address: &Address) -> Result<Vec<UTxO>, ChainError> {
        self.utxos
            .borrow()
            .get(address)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(address.to_string()))
    }

    fn submit_tx(&self, tx: &[u8]) -> Result<TransactionId, ChainError> {
        let tx = Transaction::decode_fragment(tx)
            .map_err(|e| ChainError::Submission(e.to_string()))?;

        let id = tx
            .id()
            .map_err(|e| ChainError::Submission(e.to_string()))?;

        self.spend(&tx.transaction_body.inputs)?;

        for (index, output) in tx.transaction_body.outputs.iter().enumerate() {
            self.add_utxo(UTxO::new(
                TransactionInput::new(id, index as u64),
                output.clone(),
            ));
        }

        self.submitted.borrow_mut().push(id);

        tracing::info!(%id, "transaction accepted");

        Ok(id)
    }
}

/// Polls `address` until an output of `tx_id` shows up
///
/// Returns `false` once `attempts` polls spaced by `delay` came back without
/// it. An address the chain hasn't seen yet counts as a miss.
pub fn wait_for_confirmation<C: ChainContext + ?Sized>(
    context: &C,
    address: &Address,
    tx_id: &TransactionId,
    attempts: usize,
    delay: Duration,
) -> Result<bool, ChainError> {
    for attempt in 0..attempts {
        let utxos = match context.utxos(address) {
            Ok(x) => x,
            Err(ChainError::NotFound(_)) => vec![],
            Err(e) => return Err(e),
        };

        if utxos.iter().any(|x| &x.input.transaction_id == tx_id) {
            return Ok(true);
        }

        tracing::debug!(attempt, %tx_id, "transaction not confirmed yet");

        if attempt + 1 < attempts {
            thread::sleep(delay);
        }
    }

    Ok(false)
}
