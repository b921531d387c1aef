use tessera_primitives::{Coin, Value};

/// Stages a build goes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Accumulating,
    Balancing,
    Finalized,
}

/// Something that happened while building a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Stage(BuildStage),

    SelectorAttempt {
        selector: &'static str,
        pool_size: usize,
    },

    SelectorFailed {
        selector: &'static str,
        reason: String,
    },

    /// One estimation of the fee, `pass` counting from 1
    FeePass { pass: u8, size: u64, fee: Coin },

    ChangeComputed { change: Value },

    Finalized { size: u64, fee: Coin },
}

/// Receives the events of a build
///
/// Attaching an observer never changes the outcome of a build. Any
/// `FnMut(&BuildEvent)` closure is an observer.
pub trait BuildObserver {
    fn on_event(&mut self, event: &BuildEvent);
}

impl<F> BuildObserver for F
where
    F: FnMut(&BuildEvent),
{
    fn on_event(&mut self, event: &BuildEvent) {
        self(event)
    }
}
