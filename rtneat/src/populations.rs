//! A population is an ordered collection of genomes, partitioned
//! into species by a pluggable speciation strategy. The engine
//! removes and inserts single genomes between evaluation windows,
//! so the collection keeps an id index for O(1) lookup.
mod config;
mod errors;
mod sampling;
mod specie_stats;
mod species;

pub use config::EvolutionParameters;
pub use errors::{EngineError, PoolError, StatsError};
pub use sampling::{probabilistic_round, RouletteWheel};
pub(crate) use specie_stats::{calc_specie_stats, SpecieStats};
pub use species::Specie;

use ahash::AHashMap;

use crate::genome::{Genome, GenomeId};

/// The population's ordered genome list.
///
/// Insertion order is not semantically meaningful, but it is the fixed
/// iteration order that tie-breaks the worst-genome scan, so it must
/// not be perturbed outside of the engine's remove/append step.
pub struct Population<G> {
    genomes: Vec<G>,
    index: AHashMap<GenomeId, usize>,
}

impl<G: Genome> Population<G> {
    /// Creates a population from a seed genome list.
    pub fn new(genomes: Vec<G>) -> Population<G> {
        let index = genomes.iter().enumerate().map(|(i, g)| (g.id(), i)).collect();
        Population { genomes, index }
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &G> {
        self.genomes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut G> {
        self.genomes.iter_mut()
    }

    pub fn get(&self, id: GenomeId) -> Option<&G> {
        self.index.get(&id).map(|&i| &self.genomes[i])
    }

    pub fn get_mut(&mut self, id: GenomeId) -> Option<&mut G> {
        let i = *self.index.get(&id)?;
        Some(&mut self.genomes[i])
    }

    pub(crate) fn genome_at(&self, idx: usize) -> &G {
        &self.genomes[idx]
    }

    pub(crate) fn genomes_mut(&mut self) -> &mut [G] {
        &mut self.genomes
    }

    /// Appends a genome at the end of the list.
    pub(crate) fn push(&mut self, genome: G) {
        self.index.insert(genome.id(), self.genomes.len());
        self.genomes.push(genome);
    }

    /// Removes and returns the genome at `idx`, preserving the order
    /// of the remaining genomes.
    pub(crate) fn remove_at(&mut self, idx: usize) -> G {
        let genome = self.genomes.remove(idx);
        self.index.remove(&genome.id());
        for (i, g) in self.genomes.iter().enumerate().skip(idx) {
            self.index.insert(g.id(), i);
        }
        genome
    }

    /// Checks that the species lists form an exact partition of the
    /// population: every genome in exactly one member list.
    pub fn is_partitioned_by(&self, species: &[Specie]) -> bool {
        let mut seen = AHashMap::with_capacity(self.genomes.len());
        for specie in species {
            for &id in specie.members() {
                *seen.entry(id).or_insert(0usize) += 1;
            }
        }
        seen.len() == self.genomes.len()
            && self
                .genomes
                .iter()
                .all(|g| seen.get(&g.id()).copied() == Some(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::TestGenome;

    #[test]
    fn remove_at_keeps_order_and_index() {
        let mut pop = Population::new(TestGenome::list(&[1.0, 2.0, 3.0, 4.0]));
        let ids: Vec<GenomeId> = pop.iter().map(|g| g.id()).collect();

        let removed = pop.remove_at(1);
        assert_eq!(removed.id(), ids[1]);
        assert_eq!(pop.len(), 3);
        assert!(pop.get(ids[1]).is_none());
        // Remaining genomes keep their relative order and stay addressable.
        let order: Vec<GenomeId> = pop.iter().map(|g| g.id()).collect();
        assert_eq!(order, vec![ids[0], ids[2], ids[3]]);
        for id in &order {
            assert_eq!(pop.get(*id).map(TestGenome::id), Some(*id));
        }
    }

    #[test]
    fn partition_check_rejects_duplicates_and_omissions() {
        let pop = Population::new(TestGenome::list(&[1.0, 2.0]));
        let ids: Vec<GenomeId> = pop.iter().map(|g| g.id()).collect();

        let mut s0 = Specie::new(0);
        let mut s1 = Specie::new(1);
        s0.push(ids[0]);
        s1.push(ids[1]);
        assert!(pop.is_partitioned_by(&[s0.clone(), s1.clone()]));

        // Duplicate membership.
        s1.push(ids[0]);
        assert!(!pop.is_partitioned_by(&[s0.clone(), s1]));

        // Omission.
        assert!(!pop.is_partitioned_by(&[s0]));
    }
}
