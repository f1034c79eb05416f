use thiserror::Error;

use crate::engine::RunState;
use crate::genome::GenomeId;

/// Errors raised by per-round species statistics computation.
#[derive(Debug, Error)]
pub enum StatsError {
    /// No non-champion species had allocation to give up when forcing
    /// the champion species' target size to one. Indicates the
    /// configured population size is less than or equal to the number
    /// of species.
    #[error(
        "cannot adjust target sizes down to preserve the champion specie; \
         is the population size less than or equal to the specie count?"
    )]
    PopulationTooSmall,
}

/// Errors raised by the evaluation unit pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool already has as many active units as the configured
    /// population ceiling. The affected genome is simply not
    /// evaluated this round and retried on the next.
    #[error("unit pool is saturated ({capacity} active units)")]
    Saturated { capacity: usize },
    /// A binding for this genome already exists. Activation never
    /// silently overwrites a live binding.
    #[error("genome {0:?} is already bound to an active unit")]
    AlreadyBound(GenomeId),
}

/// Errors raised by the evolution engine's lifecycle and round
/// control flow.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is {actual:?}, expected {expected:?}")]
    InvalidState { expected: RunState, actual: RunState },
    /// A replacement round (or the initial evaluation) has begun and
    /// its trial wait has not yet been completed.
    #[error("an evaluation window is already in flight")]
    RoundInFlight,
    /// `complete_round` was called with no round awaiting its
    /// evaluation result.
    #[error("no evaluation window is in flight")]
    NoRoundInFlight,
    #[error(transparent)]
    Stats(#[from] StatsError),
}
