//! A minimal fixed-topology genome: four weights mapping the
//! goal-relative offset to a steering velocity.
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use rtneat::{
    ComplexityMode, Genome, GenomeDecoder, GenomeFactory, GenomeId, Specie, SpeciationStrategy,
};

pub const WEIGHT_COUNT: usize = 4;
const WEIGHT_BOUND: f64 = 5.0;
const NUDGE_CHANCE: f64 = 0.8;
const NUDGE_POWER: f64 = 0.5;
const DECAY_FACTOR: f64 = 0.9;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_id() -> GenomeId {
    GenomeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Debug)]
pub struct SeekerGenome {
    id: GenomeId,
    pub weights: [f64; WEIGHT_COUNT],
    fitness: f64,
    adjusted_fitness: f64,
    age: u32,
    specie_idx: usize,
    pub birth_generation: u32,
}

impl SeekerGenome {
    pub fn random<R: Rng>(rng: &mut R, generation: u32) -> SeekerGenome {
        let mut weights = [0.0; WEIGHT_COUNT];
        for w in &mut weights {
            *w = rng.gen_range(-WEIGHT_BOUND..WEIGHT_BOUND);
        }
        SeekerGenome {
            id: next_id(),
            weights,
            fitness: 0.0,
            adjusted_fitness: 0.0,
            age: 0,
            specie_idx: 0,
            birth_generation: generation,
        }
    }

    /// Euclidean distance in weight space, the speciation measure.
    pub fn distance_to(&self, weights: &[f64; WEIGHT_COUNT]) -> f64 {
        self.weights
            .iter()
            .zip(weights)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl Genome for SeekerGenome {
    fn id(&self) -> GenomeId {
        self.id
    }

    fn fitness(&self) -> f64 {
        self.fitness
    }

    fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    fn adjusted_fitness(&self) -> f64 {
        self.adjusted_fitness
    }

    fn set_adjusted_fitness(&mut self, fitness: f64) {
        self.adjusted_fitness = fitness;
    }

    fn age(&self) -> u32 {
        self.age
    }

    fn set_age(&mut self, age: u32) {
        self.age = age;
    }

    fn specie_idx(&self) -> usize {
        self.specie_idx
    }

    fn set_specie_idx(&mut self, idx: usize) {
        self.specie_idx = idx;
    }

    /// Total weight magnitude. Simplification shrinks it; there is no
    /// structure to add or remove in a fixed-topology genome.
    fn complexity(&self) -> f64 {
        self.weights.iter().map(|w| w.abs()).sum()
    }

    fn create_offspring_asexual(&self, generation: u32) -> SeekerGenome {
        let mut rng = rand::thread_rng();
        let mut weights = self.weights;
        for w in &mut weights {
            if rng.gen::<f64>() < NUDGE_CHANCE {
                *w = (*w + rng.gen_range(-NUDGE_POWER..NUDGE_POWER))
                    .clamp(-WEIGHT_BOUND, WEIGHT_BOUND);
            }
        }
        SeekerGenome {
            id: next_id(),
            weights,
            fitness: 0.0,
            adjusted_fitness: 0.0,
            age: 0,
            specie_idx: self.specie_idx,
            birth_generation: generation,
        }
    }

    fn create_offspring_sexual(&self, other: &SeekerGenome, generation: u32) -> SeekerGenome {
        let mut rng = rand::thread_rng();
        let mut weights = [0.0; WEIGHT_COUNT];
        for (i, w) in weights.iter_mut().enumerate() {
            *w = if rng.gen::<bool>() {
                self.weights[i]
            } else {
                other.weights[i]
            };
        }
        let mut child = SeekerGenome {
            id: next_id(),
            weights,
            fitness: 0.0,
            adjusted_fitness: 0.0,
            age: 0,
            specie_idx: self.specie_idx,
            birth_generation: generation,
        };
        // Crossover alone only ever recombines existing weights.
        if rng.gen::<f64>() < NUDGE_CHANCE {
            child = child.create_offspring_asexual(generation);
        }
        child
    }
}

/// Seeds random genomes; in simplifying mode freshly created genomes
/// start from decayed weights so the population's total weight
/// magnitude can fall.
pub struct SeekerFactory {
    mode: ComplexityMode,
}

impl SeekerFactory {
    pub fn new() -> SeekerFactory {
        SeekerFactory {
            mode: ComplexityMode::Complexifying,
        }
    }
}

impl GenomeFactory<SeekerGenome> for SeekerFactory {
    fn create_genome_list(&mut self, length: usize, generation: u32) -> Vec<SeekerGenome> {
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| {
                let mut genome = SeekerGenome::random(&mut rng, generation);
                if self.mode == ComplexityMode::Simplifying {
                    for w in &mut genome.weights {
                        *w *= DECAY_FACTOR;
                    }
                }
                genome
            })
            .collect()
    }

    fn set_search_mode(&mut self, mode: ComplexityMode) {
        self.mode = mode;
    }
}

/// Quantizing speciation: each species is anchored to a fixed
/// representative weight vector taken from the initial population,
/// and every genome joins the species of its nearest representative.
///
/// Fixed anchors make assignment a pure function of a genome's
/// weights, so re-speciating an unchanged population is a no-op.
pub struct DistanceSpeciation {
    representatives: Vec<[f64; WEIGHT_COUNT]>,
}

impl DistanceSpeciation {
    pub fn new() -> DistanceSpeciation {
        DistanceSpeciation {
            representatives: vec![],
        }
    }

    fn nearest_specie(&self, genome: &SeekerGenome) -> usize {
        let mut nearest = 0;
        let mut nearest_distance = f64::MAX;
        for (i, rep) in self.representatives.iter().enumerate() {
            let distance = genome.distance_to(rep);
            if distance < nearest_distance {
                nearest_distance = distance;
                nearest = i;
            }
        }
        nearest
    }
}

impl SpeciationStrategy<SeekerGenome> for DistanceSpeciation {
    fn initialize_speciation(
        &mut self,
        genomes: &mut [SeekerGenome],
        specie_count: usize,
    ) -> Vec<Specie> {
        // Anchor one species on each of the first `specie_count`
        // genomes' weights.
        self.representatives = genomes
            .iter()
            .take(specie_count)
            .map(|g| g.weights)
            .collect();
        let mut species: Vec<Specie> = (0..specie_count).map(Specie::new).collect();
        for genome in genomes {
            let idx = self.nearest_specie(genome);
            genome.set_specie_idx(idx);
            species[idx].push(genome.id());
        }
        species
    }

    fn speciate_genomes(&mut self, genomes: &mut [SeekerGenome], species: &mut Vec<Specie>) {
        for genome in genomes {
            let idx = self.nearest_specie(genome);
            genome.set_specie_idx(idx);
            species[idx].push(genome.id());
        }
    }
}

/// Decodes a genome into its steering policy. Weights corrupted to
/// non-finite values make the genome non-viable.
pub struct SeekerDecoder;

impl GenomeDecoder<SeekerGenome> for SeekerDecoder {
    type Phenome = [f64; WEIGHT_COUNT];

    fn decode(&self, genome: &SeekerGenome) -> Option<[f64; WEIGHT_COUNT]> {
        genome
            .weights
            .iter()
            .all(|w| w.is_finite())
            .then(|| genome.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offspring_get_fresh_identities_and_reset_bookkeeping() {
        let mut rng = rand::thread_rng();
        let parent = SeekerGenome::random(&mut rng, 0);
        let child = parent.create_offspring_asexual(3);
        assert_ne!(child.id(), parent.id());
        assert_eq!(child.age(), 0);
        assert_eq!(child.fitness(), 0.0);
        assert_eq!(child.birth_generation, 3);
    }

    #[test]
    fn speciation_is_idempotent_on_an_unchanged_population() {
        let mut rng = rand::thread_rng();
        let mut genomes: Vec<SeekerGenome> =
            (0..20).map(|_| SeekerGenome::random(&mut rng, 0)).collect();

        let mut speciation = DistanceSpeciation::new();
        let mut species = speciation.initialize_speciation(&mut genomes, 4);
        let first: Vec<usize> = genomes.iter().map(|g| g.specie_idx()).collect();

        for specie in &mut species {
            specie.clear();
        }
        speciation.speciate_genomes(&mut genomes, &mut species);
        let second: Vec<usize> = genomes.iter().map(|g| g.specie_idx()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn non_finite_weights_are_non_viable() {
        let mut rng = rand::thread_rng();
        let mut genome = SeekerGenome::random(&mut rng, 0);
        assert!(SeekerDecoder.decode(&genome).is_some());
        genome.weights[2] = f64::NAN;
        assert!(SeekerDecoder.decode(&genome).is_none());
    }
}
