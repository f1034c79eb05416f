//! Minimal concrete implementations of the engine's collaborator
//! traits, for use by the crate's unit tests.
use std::sync::atomic::{AtomicU64, Ordering};

use crate::evaluation::{SpecieColor, Unit, UnitSpawner};
use crate::genome::{Genome, GenomeDecoder, GenomeFactory, GenomeId};
use crate::populations::{EvolutionParameters, Specie};
use crate::stats::AlgorithmStats;
use crate::strategy::{ComplexityMode, ComplexityRegulationStrategy, SpeciationStrategy};

use std::num::NonZeroUsize;
use std::time::Duration;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn fresh_id() -> GenomeId {
    GenomeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// A genome whose only genetic material is a scalar `tag`. The tag
/// doubles as the decoded phenome, and as the clustering key for
/// [`TagSpeciation`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TestGenome {
    id: GenomeId,
    pub tag: f64,
    pub viable: bool,
    fitness: f64,
    adjusted_fitness: f64,
    age: u32,
    specie_idx: usize,
    pub birth_generation: u32,
}

impl TestGenome {
    pub fn new(tag: f64) -> TestGenome {
        TestGenome {
            id: fresh_id(),
            tag,
            viable: true,
            fitness: tag,
            adjusted_fitness: 0.0,
            age: 0,
            specie_idx: 0,
            birth_generation: 0,
        }
    }

    /// A genome list with both tags and fitnesses set to `values`.
    pub fn list(values: &[f64]) -> Vec<TestGenome> {
        values.iter().map(|v| TestGenome::new(*v)).collect()
    }
}

impl Genome for TestGenome {
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
    fn complexity(&self) -> f64 {
        1.0
    }
    fn create_offspring_asexual(&self, generation: u32) -> TestGenome {
        TestGenome {
            id: fresh_id(),
            age: 0,
            birth_generation: generation,
            fitness: 0.0,
            adjusted_fitness: 0.0,
            ..self.clone()
        }
    }
    fn create_offspring_sexual(&self, other: &TestGenome, generation: u32) -> TestGenome {
        TestGenome {
            id: fresh_id(),
            tag: (self.tag + other.tag) / 2.0,
            age: 0,
            birth_generation: generation,
            fitness: 0.0,
            adjusted_fitness: 0.0,
            ..self.clone()
        }
    }
}

/// Seeds identical-tag genomes.
#[derive(Default)]
pub(crate) struct TestFactory {
    pub search_mode: Option<ComplexityMode>,
}

impl GenomeFactory<TestGenome> for TestFactory {
    fn create_genome_list(&mut self, length: usize, generation: u32) -> Vec<TestGenome> {
        (0..length)
            .map(|i| {
                let mut g = TestGenome::new(i as f64);
                g.birth_generation = generation;
                g
            })
            .collect()
    }

    fn set_search_mode(&mut self, mode: ComplexityMode) {
        self.search_mode = Some(mode);
    }
}

/// Clusters genomes by `tag % specie_count`. Deterministic, so
/// re-speciating an unchanged population yields the same partition.
pub(crate) struct TagSpeciation {
    specie_count: usize,
}

impl TagSpeciation {
    pub fn new(specie_count: usize) -> TagSpeciation {
        TagSpeciation { specie_count }
    }

    fn assign(&self, genomes: &mut [TestGenome], species: &mut [Specie]) {
        for genome in genomes {
            let idx = (genome.tag.abs() as usize) % self.specie_count;
            genome.set_specie_idx(idx);
            species[idx].push(genome.id());
        }
    }
}

impl SpeciationStrategy<TestGenome> for TagSpeciation {
    fn initialize_speciation(
        &mut self,
        genomes: &mut [TestGenome],
        specie_count: usize,
    ) -> Vec<Specie> {
        self.specie_count = self.specie_count.min(specie_count).max(1);
        let mut species: Vec<Specie> = (0..self.specie_count).map(Specie::new).collect();
        self.assign(genomes, &mut species);
        species
    }

    fn speciate_genomes(&mut self, genomes: &mut [TestGenome], species: &mut Vec<Specie>) {
        self.assign(genomes, species);
    }
}

/// Always reports the mode it was constructed with.
pub(crate) struct FixedRegulation(pub ComplexityMode);

impl ComplexityRegulationStrategy for FixedRegulation {
    fn determine_mode(&mut self, _stats: &AlgorithmStats) -> ComplexityMode {
        self.0
    }
}

/// Decodes a genome to its tag; non-viable genomes decode to `None`.
pub(crate) struct TestDecoder;

impl GenomeDecoder<TestGenome> for TestDecoder {
    type Phenome = f64;

    fn decode(&self, genome: &TestGenome) -> Option<f64> {
        genome.viable.then(|| genome.tag)
    }
}

/// A unit whose fitness is simply the phenome value it holds.
#[derive(Default)]
pub(crate) struct TestUnit {
    phenome: Option<f64>,
    pub specie_idx: usize,
    pub color: Option<SpecieColor>,
}

impl Unit for TestUnit {
    type Phenome = f64;

    fn activate(&mut self, phenome: f64, specie_idx: usize, color: SpecieColor) {
        self.phenome = Some(phenome);
        self.specie_idx = specie_idx;
        self.color = Some(color);
    }

    fn deactivate(&mut self) {
        self.phenome = None;
    }

    fn fitness(&self) -> f64 {
        self.phenome.unwrap_or(0.0)
    }
}

#[derive(Default)]
pub(crate) struct TestSpawner {
    pub spawned: usize,
}

impl UnitSpawner for TestSpawner {
    type Unit = TestUnit;

    fn spawn(&mut self) -> TestUnit {
        self.spawned += 1;
        TestUnit::default()
    }
}

/// A parameter set with sane mid-range proportions for unit tests.
pub(crate) fn params_for_tests() -> EvolutionParameters {
    EvolutionParameters {
        population_size: NonZeroUsize::new(8).unwrap(),
        specie_count: NonZeroUsize::new(2).unwrap(),
        elitism_proportion: 0.2,
        selection_proportion: 0.2,
        offspring_asexual_proportion: 0.5,
        min_genome_age: 0,
        trial_duration: Duration::from_millis(10),
        moving_average_history_length: NonZeroUsize::new(10).unwrap(),
    }
}
