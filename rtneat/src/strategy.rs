use serde::{Deserialize, Serialize};

use crate::genome::Genome;
use crate::populations::Specie;
use crate::stats::AlgorithmStats;

/// The high-level search mode the population is currently in.
///
/// Complexifying search permits additive structural mutations;
/// simplifying search biases mutations toward pruning structure. The
/// active mode also selects which parameter set the engine breeds with.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ComplexityMode {
    Complexifying,
    Simplifying,
}

/// Clusters genomes into species by some genetic distance metric.
///
/// Contract: after either method returns, every genome in `genomes`
/// appears in exactly one species' member list, and its
/// [`specie_idx`](Genome::specie_idx) back-reference names that
/// species' position in the returned/updated list. Re-speciating an
/// unchanged population must yield the same partition (idempotence).
pub trait SpeciationStrategy<G: Genome> {
    /// Builds an initial species list from scratch, aiming for
    /// `specie_count` species.
    fn initialize_speciation(&mut self, genomes: &mut [G], specie_count: usize) -> Vec<Specie>;

    /// Re-clusters the full population into the given species list.
    /// Member lists have already been cleared by the caller.
    fn speciate_genomes(&mut self, genomes: &mut [G], species: &mut Vec<Specie>);
}

/// Decides which complexity-regulation mode should be active, from
/// the trend statistics the engine maintains.
pub trait ComplexityRegulationStrategy {
    fn determine_mode(&mut self, stats: &AlgorithmStats) -> ComplexityMode;
}
