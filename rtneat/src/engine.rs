//! The steady-state evolution engine.
//!
//! Rather than evaluating and replacing a whole generation at once,
//! each replacement round removes the single worst-performing genome,
//! breeds one replacement from fit parents, and re-integrates it into
//! the live population. Rounds are split in two around the trial
//! wait: [`begin_round`] runs the genetic operators and activates
//! phenomes, the caller steps its simulation for the returned
//! duration, and [`complete_round`] collects fitness and refreshes
//! the population bookkeeping.
//!
//! [`begin_round`]: RtNeatEvolutionAlgorithm::begin_round
//! [`complete_round`]: RtNeatEvolutionAlgorithm::complete_round
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::evaluation::{RtEvaluator, Unit, UnitPool, UnitSpawner};
use crate::genome::{Genome, GenomeDecoder, GenomeFactory, GenomeId};
use crate::populations::{
    calc_specie_stats, EngineError, EvolutionParameters, Population, RouletteWheel, Specie,
    SpecieStats,
};
use crate::stats::AlgorithmStats;
use crate::strategy::{ComplexityMode, ComplexityRegulationStrategy, SpeciationStrategy};

/// Lifecycle state of the engine.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RunState {
    Uninitialized,
    Initialized,
    Running,
    Paused,
    Stopped,
}

/// Where the engine stands relative to an evaluation window.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum RoundPhase {
    Idle,
    AwaitingInitialEvaluation,
    AwaitingRoundEvaluation,
}

/// Notifications published to subscribers. Consumers typically
/// persist the `Paused` payload; the engine itself owns no file
/// format.
#[derive(Clone, Debug, Serialize)]
pub enum EngineEvent<G> {
    RoundCompleted { generation: u32, best_fitness: f64 },
    Paused { population: Vec<G>, champion: Option<G> },
}

/// A real-time NEAT evolution algorithm, generic over the genome
/// representation and its collaborator strategies.
pub struct RtNeatEvolutionAlgorithm<G, F, SS, CS, D, S>
where
    G: Genome + Clone,
    F: GenomeFactory<G>,
    SS: SpeciationStrategy<G>,
    CS: ComplexityRegulationStrategy,
    D: GenomeDecoder<G>,
    S: UnitSpawner,
    S::Unit: Unit<Phenome = D::Phenome>,
{
    params: EvolutionParameters,
    params_complexifying: EvolutionParameters,
    params_simplifying: EvolutionParameters,

    factory: F,
    speciation: SS,
    regulation: CS,
    evaluator: RtEvaluator<D>,
    pool: UnitPool<S>,

    population: Population<G>,
    species: Vec<Specie>,
    stats: AlgorithmStats,
    complexity_mode: ComplexityMode,

    state: RunState,
    phase: RoundPhase,
    generation: u32,
    best_genome: Option<GenomeId>,
    best_specie_idx: usize,

    subscribers: Vec<Sender<EngineEvent<G>>>,
}

impl<G, F, SS, CS, D, S> RtNeatEvolutionAlgorithm<G, F, SS, CS, D, S>
where
    G: Genome + Clone,
    F: GenomeFactory<G>,
    SS: SpeciationStrategy<G>,
    CS: ComplexityRegulationStrategy,
    D: GenomeDecoder<G>,
    S: UnitSpawner,
    S::Unit: Unit<Phenome = D::Phenome>,
{
    /// Constructs the engine with the provided parameters and
    /// collaborators. The unit pool's activation ceiling is the
    /// configured population size.
    pub fn new(
        params: EvolutionParameters,
        factory: F,
        speciation: SS,
        regulation: CS,
        decoder: D,
        spawner: S,
    ) -> Self {
        let params_complexifying = params.clone();
        let params_simplifying = params.simplifying();
        let pool = UnitPool::new(spawner, params.population_size.get());
        let stats = AlgorithmStats::new(params.moving_average_history_length.get());
        RtNeatEvolutionAlgorithm {
            params,
            params_complexifying,
            params_simplifying,
            factory,
            speciation,
            regulation,
            evaluator: RtEvaluator::new(decoder),
            pool,
            population: Population::new(vec![]),
            species: vec![],
            stats,
            complexity_mode: ComplexityMode::Complexifying,
            state: RunState::Uninitialized,
            phase: RoundPhase::Idle,
            generation: 0,
            best_genome: None,
            best_specie_idx: 0,
            subscribers: vec![],
        }
    }

    /// Registers an observer. Disconnected receivers are dropped
    /// silently on the next publication.
    pub fn subscribe(&mut self) -> Receiver<EngineEvent<G>> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Seeds a fresh population from the genome factory and begins
    /// the initial full evaluation. Returns the trial duration the
    /// caller must simulate for before calling
    /// [`complete_initialization`](Self::complete_initialization).
    pub fn initialize(&mut self) -> Result<Duration, EngineError> {
        self.require_state(RunState::Uninitialized)?;
        let seed = self
            .factory
            .create_genome_list(self.params.population_size.get(), 0);
        self.begin_initial_evaluation(seed)
    }

    /// As [`initialize`](Self::initialize), but loads a previously
    /// persisted population instead of seeding a random one.
    pub fn initialize_with(&mut self, genomes: Vec<G>) -> Result<Duration, EngineError> {
        self.require_state(RunState::Uninitialized)?;
        self.begin_initial_evaluation(genomes)
    }

    fn begin_initial_evaluation(&mut self, genomes: Vec<G>) -> Result<Duration, EngineError> {
        self.population = Population::new(genomes);
        self.pool.init_colors(self.params.specie_count.get());
        self.evaluator
            .begin_trial(&mut self.population, None, None, &mut self.pool);
        self.phase = RoundPhase::AwaitingInitialEvaluation;
        Ok(self.params.trial_duration)
    }

    /// Second half of initialization: collects the initial fitness,
    /// runs the speciation strategy once, sorts species, and records
    /// the best genome.
    pub fn complete_initialization(&mut self) -> Result<(), EngineError> {
        if self.phase != RoundPhase::AwaitingInitialEvaluation {
            return Err(EngineError::NoRoundInFlight);
        }
        self.evaluator.collect(&mut self.population, &self.pool);
        self.species = self
            .speciation
            .initialize_speciation(self.population.genomes_mut(), self.params.specie_count.get());
        self.sort_specie_genomes();
        self.update_best_genome();
        self.phase = RoundPhase::Idle;
        self.state = RunState::Initialized;
        info!(
            population = self.population.len(),
            species = self.species.len(),
            "population initialized"
        );
        Ok(())
    }

    /// Transitions to `Running` so replacement rounds may be issued.
    pub fn start_continue(&mut self) -> Result<(), EngineError> {
        match self.state {
            RunState::Initialized | RunState::Paused => {
                self.state = RunState::Running;
                Ok(())
            }
            actual => Err(EngineError::InvalidState {
                expected: RunState::Initialized,
                actual,
            }),
        }
    }

    /// First half of one replacement round: ages every genome,
    /// refreshes adjusted fitness, removes the worst individual if it
    /// is old enough, breeds its replacement, and activates phenomes
    /// for the evaluation window. Returns the trial duration the
    /// caller must simulate for before calling
    /// [`complete_round`](Self::complete_round).
    ///
    /// A round must fully complete before the next begins; calling
    /// this with a window in flight is an error.
    pub fn begin_round(&mut self) -> Result<Duration, EngineError> {
        self.require_state(RunState::Running)?;
        if self.phase != RoundPhase::Idle {
            return Err(EngineError::RoundInFlight);
        }
        self.generation += 1;

        let mut rng = rand::thread_rng();
        let worst_idx = self.age_genomes_and_find_worst();

        let mut removed_id = None;
        let mut offspring_id = None;
        if let Some(worst_idx) = worst_idx {
            if self.population.genome_at(worst_idx).age() > self.params.min_genome_age {
                let old_genome = self.population.remove_at(worst_idx);
                self.species[old_genome.specie_idx()].remove(old_genome.id());

                let (specie_stats, _offspring_count) = calc_specie_stats(
                    &mut self.species,
                    &self.population,
                    &self.params,
                    self.best_specie_idx,
                    &mut rng,
                )?;
                let offspring = self.create_offspring(&specie_stats, &mut rng);
                offspring_id = Some(offspring.id());
                removed_id = Some(old_genome.id());
                self.population.push(offspring);
                debug!(removed = ?old_genome.id(), offspring = ?offspring_id, "replaced worst genome");
            } else {
                debug!("worst genome below minimum age; no replacement this round");
            }
        }

        self.evaluator
            .begin_trial(&mut self.population, removed_id, offspring_id, &mut self.pool);
        self.phase = RoundPhase::AwaitingRoundEvaluation;
        Ok(self.params.trial_duration)
    }

    /// Second half of one replacement round: collects fitness from
    /// the pool, rebuilds species membership, re-sorts, refreshes
    /// statistics, and applies the complexity-regulation decision.
    pub fn complete_round(&mut self) -> Result<(), EngineError> {
        if self.phase != RoundPhase::AwaitingRoundEvaluation {
            return Err(EngineError::NoRoundInFlight);
        }
        self.evaluator.collect(&mut self.population, &self.pool);

        // Reassign every genome to its species from scratch.
        for specie in &mut self.species {
            specie.clear();
        }
        self.speciation
            .speciate_genomes(self.population.genomes_mut(), &mut self.species);
        debug_assert!(self.population.is_partitioned_by(&self.species));

        self.sort_specie_genomes();
        self.update_best_genome();
        self.update_stats();

        // Determine the complexity regulation mode, switch to the
        // matching parameter set, and notify the genome factory so it
        // can bias how it creates genomes (e.g. reduce or disable
        // additive mutations).
        let mode = self.regulation.determine_mode(&self.stats);
        self.params = match mode {
            ComplexityMode::Complexifying => self.params_complexifying.clone(),
            ComplexityMode::Simplifying => self.params_simplifying.clone(),
        };
        self.factory.set_search_mode(mode);
        self.complexity_mode = mode;

        self.phase = RoundPhase::Idle;
        info!(
            generation = self.generation,
            best_fitness = self.stats.max_fitness,
            "round completed"
        );
        self.publish(EngineEvent::RoundCompleted {
            generation: self.generation,
            best_fitness: self.stats.max_fitness,
        });
        Ok(())
    }

    /// Pauses evolution. Every currently bound phenome is deactivated
    /// before the pause event is published, so no stale bindings
    /// survive; an in-flight evaluation window is abandoned.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.require_state(RunState::Running)?;
        self.pool.deactivate_all();
        self.phase = RoundPhase::Idle;
        self.state = RunState::Paused;
        let event = EngineEvent::Paused {
            population: self.population.iter().cloned().collect(),
            champion: self.champion().cloned(),
        };
        self.publish(event);
        info!(generation = self.generation, "evolution paused");
        Ok(())
    }

    /// Terminal transition; the engine cannot be restarted afterwards.
    pub fn terminate(&mut self) -> Result<(), EngineError> {
        match self.state {
            RunState::Initialized | RunState::Paused => {
                self.state = RunState::Stopped;
                self.subscribers.clear();
                Ok(())
            }
            actual => Err(EngineError::InvalidState {
                expected: RunState::Paused,
                actual,
            }),
        }
    }

    /// Step 1 of a round. Increments every genome's age, recomputes
    /// `adjusted fitness = fitness / species size`, and returns the
    /// index of the genome with the minimum adjusted fitness.
    ///
    /// Iteration runs back-to-front with a strict comparison, so on
    /// exact ties the genome at the highest list index is selected.
    /// This is a fixed, reproducible tie-break; changing it changes
    /// the evolutionary dynamics.
    fn age_genomes_and_find_worst(&mut self) -> Option<usize> {
        let specie_sizes: Vec<usize> = self.species.iter().map(Specie::len).collect();
        let mut smallest_adjusted = f64::MAX;
        let mut smallest_idx = None;
        let genomes = self.population.genomes_mut();
        for i in (0..genomes.len()).rev() {
            let genome = &mut genomes[i];
            genome.set_age(genome.age() + 1);
            let specie_size = specie_sizes.get(genome.specie_idx()).copied().unwrap_or(1);
            let adjusted = genome.fitness() / specie_size.max(1) as f64;
            genome.set_adjusted_fitness(adjusted);
            if adjusted < smallest_adjusted {
                smallest_adjusted = adjusted;
                smallest_idx = Some(i);
            }
        }
        smallest_idx
    }

    /// Synthesizes one offspring genome.
    ///
    /// A donor species is drawn from a roulette wheel weighted by
    /// mean fitness. A species with a single member reproduces it
    /// asexually; otherwise two distinct parents are drawn from a
    /// second wheel over the species' members weighted by raw
    /// fitness, the second without replacement.
    fn create_offspring<R: Rng>(&self, specie_stats: &[SpecieStats], rng: &mut R) -> G {
        let specie_wheel = RouletteWheel::new(specie_stats.iter().map(|s| s.mean_fitness));
        let mut specie_idx = specie_wheel.single_throw(rng);
        if self.species[specie_idx].is_empty() {
            // A degenerate draw can land on an emptied species. The
            // champion species is the usual fallback, but it too can
            // be empty when its sole member was the genome just
            // removed as the round's worst; pick any species that
            // still has members.
            specie_idx = if !self.species[self.best_specie_idx].is_empty() {
                self.best_specie_idx
            } else {
                self.species
                    .iter()
                    .position(|s| !s.is_empty())
                    .unwrap_or_else(|| panic!("no non-empty species in population"))
            };
        }
        let members = self.species[specie_idx].members();

        if members.len() == 1 {
            let parent = self
                .population
                .get(members[0])
                .unwrap_or_else(|| panic!("specie member missing from population"));
            let mut child = parent.create_offspring_asexual(self.generation);
            child.set_specie_idx(specie_idx);
            return child;
        }

        let genome_wheel = RouletteWheel::new(
            members
                .iter()
                .map(|id| self.population.get(*id).map_or(0.0, G::fitness)),
        );
        let first = genome_wheel.single_throw(rng);
        let second = genome_wheel.remove_outcome(first).single_throw(rng);

        let parent1 = self
            .population
            .get(members[first])
            .unwrap_or_else(|| panic!("specie member missing from population"));
        let parent2 = self
            .population
            .get(members[second])
            .unwrap_or_else(|| panic!("specie member missing from population"));
        let mut child = parent1.create_offspring_sexual(parent2, self.generation);
        child.set_specie_idx(specie_idx);
        child
    }

    /// Step 6. Shuffle-then-sort every species' members, fittest
    /// first, ties youngest first; also records the min/max species
    /// sizes in the statistics.
    fn sort_specie_genomes(&mut self) {
        let mut rng = rand::thread_rng();
        let mut min_size = usize::MAX;
        let mut max_size = 0;
        for specie in &mut self.species {
            specie.sort_by_fitness(&self.population, &mut rng);
            min_size = min_size.min(specie.len());
            max_size = max_size.max(specie.len());
        }
        self.stats.min_specie_size = if self.species.is_empty() { 0 } else { min_size };
        self.stats.max_specie_size = max_size;
        self.stats.mean_specie_size = if self.species.is_empty() {
            0.0
        } else {
            self.population.len() as f64 / self.species.len() as f64
        };
    }

    /// Step 7. Recomputes the best genome and the index of its
    /// species by scanning only each species' first (fittest) entry;
    /// correctness depends on the species having just been sorted.
    fn update_best_genome(&mut self) {
        let mut best_fitness = -1.0;
        let mut best_genome = None;
        let mut best_specie_idx = 0;
        for (i, specie) in self.species.iter().enumerate() {
            let champ_id = match specie.champion_id() {
                Some(id) => id,
                None => continue,
            };
            if let Some(genome) = self.population.get(champ_id) {
                if genome.fitness() > best_fitness {
                    best_fitness = genome.fitness();
                    best_genome = Some(champ_id);
                    best_specie_idx = i;
                }
            }
        }
        self.best_genome = best_genome;
        self.best_specie_idx = best_specie_idx;
    }

    /// Step 8. Refreshes fitness/complexity aggregates and the trend
    /// moving averages.
    fn update_stats(&mut self) {
        let stats = &mut self.stats;
        stats.generation = self.generation;
        stats.total_evaluation_count = self.evaluator.evaluation_count();
        stats.sample_evaluations_per_sec(Instant::now());

        let count = self.population.len();
        if count == 0 {
            return;
        }
        let mut total_fitness = 0.0;
        let mut total_complexity = 0.0;
        let mut max_complexity = f64::MIN;
        for genome in self.population.iter() {
            total_fitness += genome.fitness();
            total_complexity += genome.complexity();
            max_complexity = max_complexity.max(genome.complexity());
        }
        stats.max_fitness = self
            .best_genome
            .and_then(|id| self.population.get(id))
            .map_or(0.0, G::fitness);
        stats.mean_fitness = total_fitness / count as f64;
        stats.max_complexity = max_complexity;
        stats.mean_complexity = total_complexity / count as f64;

        let champ_fitnesses: Vec<f64> = self
            .species
            .iter()
            .filter_map(Specie::champion_id)
            .filter_map(|id| self.population.get(id))
            .map(G::fitness)
            .collect();
        if !champ_fitnesses.is_empty() {
            stats.mean_specie_champ_fitness =
                champ_fitnesses.iter().sum::<f64>() / champ_fitnesses.len() as f64;
        }

        stats.prev_best_fitness_ma = stats.best_fitness_ma.mean();
        stats.best_fitness_ma.enqueue(stats.max_fitness);
        stats.prev_mean_specie_champ_fitness_ma = stats.mean_specie_champ_fitness_ma.mean();
        stats
            .mean_specie_champ_fitness_ma
            .enqueue(stats.mean_specie_champ_fitness);
        stats.prev_complexity_ma = stats.complexity_ma.mean();
        stats.complexity_ma.enqueue(stats.mean_complexity);
    }

    fn require_state(&self, expected: RunState) -> Result<(), EngineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn publish(&mut self, event: EngineEvent<G>) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// The currently best-performing genome; supports running the
    /// best controller outside evolution.
    pub fn champion(&self) -> Option<&G> {
        self.best_genome.and_then(|id| self.population.get(id))
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn complexity_mode(&self) -> ComplexityMode {
        self.complexity_mode
    }

    pub fn statistics(&self) -> &AlgorithmStats {
        &self.stats
    }

    pub fn population(&self) -> &Population<G> {
        &self.population
    }

    pub fn species(&self) -> &[Specie] {
        &self.species
    }

    pub fn parameters(&self) -> &EvolutionParameters {
        &self.params
    }

    pub fn pool(&self) -> &UnitPool<S> {
        &self.pool
    }

    /// Mutable access to the unit pool, for the caller's simulation
    /// stepping. Bindings themselves are still only mutated through
    /// the pool's activate/deactivate operations.
    pub fn pool_mut(&mut self) -> &mut UnitPool<S> {
        &mut self.pool
    }
}
