use serde::{Deserialize, Serialize};

use crate::strategy::ComplexityMode;

/// A stable, population-wide unique genome identifier.
///
/// The engine never compares genomes by position; species membership,
/// evaluation bindings and the champion record are all keyed by id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct GenomeId(pub u64);

/// An interface for genomes that can be evolved by the
/// real-time algorithm.
///
/// Implementors own their genetic representation entirely; the engine
/// only reads and writes the evaluation bookkeeping declared here and
/// calls the two offspring constructors. All fitness values must be
/// non-negative, higher is better.
pub trait Genome {
    /// Returns the genome's unique id.
    fn id(&self) -> GenomeId;

    /// Returns the genome's raw fitness value.
    fn fitness(&self) -> f64;

    /// Sets the genome's raw fitness value.
    ///
    /// Should make sure that the fitness value is ≥0;
    /// otherwise selection will probably break.
    fn set_fitness(&mut self, fitness: f64);

    /// Returns the genome's species-size adjusted fitness.
    fn adjusted_fitness(&self) -> f64;

    /// Sets the genome's species-size adjusted fitness.
    fn set_adjusted_fitness(&mut self, fitness: f64);

    /// Returns the number of replacement rounds the genome has survived.
    fn age(&self) -> u32;

    /// Sets the genome's age.
    fn set_age(&mut self, age: u32);

    /// Returns the index of the species the genome currently belongs to.
    ///
    /// This is a back-reference for O(1) lookup only. The species'
    /// member list remains the sole owner of membership truth and is
    /// rebuilt every round by the speciation strategy.
    fn specie_idx(&self) -> usize;

    /// Sets the genome's species back-reference.
    fn set_specie_idx(&mut self, idx: usize);

    /// Returns a scalar measure of the genome's structural complexity.
    fn complexity(&self) -> f64;

    /// Returns a mutated copy of this genome, tagged with the
    /// generation of its birth.
    fn create_offspring_asexual(&self, generation: u32) -> Self;

    /// Combines this genome with another and returns the child,
    /// tagged with the generation of its birth.
    fn create_offspring_sexual(&self, other: &Self, generation: u32) -> Self;
}

/// A source of new random genomes, and the recipient of search-mode
/// switches decided by the complexity-regulation strategy.
pub trait GenomeFactory<G: Genome> {
    /// Returns `length` freshly randomized genomes, tagged with the
    /// given birth generation.
    fn create_genome_list(&mut self, length: usize, generation: u32) -> Vec<G>;

    /// Notifies the factory of the active complexity-regulation mode,
    /// allowing it to bias future mutations toward or away from
    /// topology growth.
    fn set_search_mode(&mut self, mode: ComplexityMode);
}

/// Decodes genomes into their executable phenome form.
///
/// Decoding must be deterministic and pure given the genome.
pub trait GenomeDecoder<G: Genome> {
    type Phenome;

    /// Returns the genome's phenome, or `None` for a non-viable
    /// genome. Non-viable genomes receive an automatic zero fitness.
    fn decode(&self, genome: &G) -> Option<Self::Phenome>;
}
