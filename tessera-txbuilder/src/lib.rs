//! Coin selection, fee estimation and balancing of Tessera transactions
//!
//! The entry point is [`TransactionBuilder`]: feed it explicit UTxOs or
//! addresses to spend from, the outputs to create and any mint, certificate,
//! withdrawal or governance content, then call
//! [`TransactionBuilder::build`] with a change address. Building selects
//! the missing inputs, estimates the fee from the final transaction size and
//! returns a balanced, unsigned [`BuiltTransaction`].

mod builder;
mod context;
mod fee;
mod observer;
mod params;
mod token;
mod transaction;

pub mod selection;

pub use builder::*;
pub use context::*;
pub use fee::*;
pub use observer::*;
pub use params::*;
pub use selection::{
    CandidateSource, LargestFirst, RandomImprove, RngSource, ScriptedSource, Selection,
    SelectionError, SelectionRequest, Selector,
};
pub use token::*;
pub use transaction::*;

use tessera_primitives::{Coin, MetadataError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxBuilderError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// The finalized transaction is larger than the protocol allows
    #[error("transaction size {size} exceeds the max limit {max} by {overage} bytes", overage = .size - .max)]
    SizeExceeded { size: u64, max: u64 },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("inputs can't cover outputs and fee: {0}")]
    InsufficientFunds(String),

    #[error("not enough coin left for change: {available} available, {required} required")]
    InsufficientChange { available: Coin, required: Coin },

    #[error("output #{index} carries {coin} lovelace, the minimum is {required}")]
    OutputBelowMinimum {
        index: usize,
        coin: Coin,
        required: Coin,
    },

    #[error("UTxO {0} is both an input and excluded")]
    InputConflict(String),

    #[error("treasury donation must be positive")]
    TreasuryDonation,

    #[error("no inputs to spend and no address to select from")]
    NoInputs,

    #[error(transparent)]
    Context(#[from] ChainError),

    #[error(transparent)]
    Codec(#[from] tessera_codec::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
