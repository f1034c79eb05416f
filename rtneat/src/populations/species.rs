use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::genome::{Genome, GenomeId};
use crate::populations::Population;

/// A species: a cluster of genetically compatible genomes and the
/// unit of fitness sharing.
///
/// The member list holds ids, never genomes; the population owns the
/// genomes themselves. Membership is rebuilt from scratch by the
/// speciation strategy every replacement round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Specie {
    idx: usize,
    members: Vec<GenomeId>,
    mean_fitness: f64,
}

impl Specie {
    /// Creates an empty species at position `idx` of the species list.
    pub fn new(idx: usize) -> Specie {
        Specie {
            idx,
            members: vec![],
            mean_fitness: 0.0,
        }
    }

    /// The species' position in the species list. Mirrored by its
    /// members' [`specie_idx`](Genome::specie_idx) back-references.
    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn members(&self) -> &[GenomeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Adds a genome id to the member list.
    pub fn push(&mut self, id: GenomeId) {
        self.members.push(id);
    }

    /// Removes a genome id from the member list, if present.
    pub fn remove(&mut self, id: GenomeId) {
        self.members.retain(|m| *m != id);
    }

    /// Empties the member list ahead of re-speciation.
    pub fn clear(&mut self) {
        self.members.clear();
    }

    /// The mean fitness cached by the last
    /// [`calc_mean_fitness`](Specie::calc_mean_fitness) call.
    pub fn mean_fitness(&self) -> f64 {
        self.mean_fitness
    }

    /// Computes, caches and returns the mean raw fitness of the
    /// species' members. Zero for an empty species.
    pub fn calc_mean_fitness<G: Genome>(&mut self, population: &Population<G>) -> f64 {
        self.mean_fitness = if self.members.is_empty() {
            0.0
        } else {
            let sum: f64 = self
                .members
                .iter()
                .filter_map(|id| population.get(*id))
                .map(|g| g.fitness())
                .sum();
            sum / self.members.len() as f64
        };
        self.mean_fitness
    }

    /// The species' fittest member, by the sort order established by
    /// [`sort_by_fitness`](Specie::sort_by_fitness).
    pub fn champion_id(&self) -> Option<GenomeId> {
        self.members.first().copied()
    }

    /// Shuffles, then sorts members by descending fitness with ties
    /// broken youngest-first.
    ///
    /// The shuffle ensures genomes with equal fitness are randomly
    /// distributed amongst themselves, so the top N chosen for
    /// elitism and selection isn't biased to whichever subset
    /// happened to be at the front of the member list.
    pub fn sort_by_fitness<G: Genome, R: Rng>(&mut self, population: &Population<G>, rng: &mut R) {
        self.members.shuffle(rng);
        self.members.sort_by(|a, b| {
            let (a, b) = match (population.get(*a), population.get(*b)) {
                (Some(a), Some(b)) => (a, b),
                _ => return std::cmp::Ordering::Equal,
            };
            b.fitness()
                .partial_cmp(&a.fitness())
                .unwrap_or_else(|| panic!("invalid genome fitnesses detected (NaN)"))
                .then(a.age().cmp(&b.age()))
        });
    }
}
