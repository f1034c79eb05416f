//! A steady-state, real-time implementation of the NEAT
//! neuroevolution algorithm.
//!
//! Instead of generational batch evolution, the population evolves
//! continuously while its phenomes control live agents in a running
//! simulation: each replacement round removes the single
//! worst-performing genome (by fitness adjusted for species size,
//! and only once it has lived long enough to be fairly judged) and
//! breeds a single replacement from roulette-wheel-selected parents.
//! Agents stay in the world across rounds, so the simulation never
//! pauses for evolution.
//!
//! The crate is generic over the genome representation: implement
//! [`Genome`], [`GenomeFactory`] and [`GenomeDecoder`] for your
//! encoding, [`SpeciationStrategy`] for your compatibility measure,
//! and [`Unit`]/[`UnitSpawner`] for your simulated agents, then drive
//! an [`RtNeatEvolutionAlgorithm`].
//!
//! A round is split in two around the evaluation window, since the
//! engine cannot block while agents live out their trial:
//!
//! ```ignore
//! let trial = engine.begin_round()?;
//! simulation.run_for(trial, engine.pool_mut());
//! engine.complete_round()?;
//! ```
pub mod engine;
pub mod evaluation;
pub mod genome;
pub mod populations;
pub mod stats;
pub mod strategy;

#[cfg(test)]
mod test_util;

pub use engine::{EngineEvent, RtNeatEvolutionAlgorithm, RunState};
pub use evaluation::{SpecieColor, Unit, UnitPool, UnitSpawner};
pub use genome::{Genome, GenomeDecoder, GenomeFactory, GenomeId};
pub use populations::{
    EngineError, EvolutionParameters, PoolError, Population, Specie, StatsError,
};
pub use stats::AlgorithmStats;
pub use strategy::{ComplexityMode, ComplexityRegulationStrategy, SpeciationStrategy};
