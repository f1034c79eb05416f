//! Drives the real-time evolution loop end to end: a population of
//! goal-seeking agents evolves while the world keeps running, one
//! worst-for-best replacement per round.
use std::num::NonZeroUsize;
use std::time::Duration;

use tracing::info;

use rtneat::{
    AlgorithmStats, ComplexityMode, ComplexityRegulationStrategy, EngineEvent,
    EvolutionParameters, Genome, RtNeatEvolutionAlgorithm,
};

mod genome;
mod sim;

use genome::{DistanceSpeciation, SeekerDecoder, SeekerFactory};
use sim::{run_trial, SeekerSpawner};

const ROUNDS: u32 = 2_000;

/// Phased search: complexify until the population's mean weight
/// magnitude drifts past a ceiling, then simplify until its moving
/// average falls back below.
struct PhasedRegulation {
    complexity_ceiling: f64,
    mode: ComplexityMode,
}

impl PhasedRegulation {
    fn new(complexity_ceiling: f64) -> PhasedRegulation {
        PhasedRegulation {
            complexity_ceiling,
            mode: ComplexityMode::Complexifying,
        }
    }
}

impl ComplexityRegulationStrategy for PhasedRegulation {
    fn determine_mode(&mut self, stats: &AlgorithmStats) -> ComplexityMode {
        self.mode = match self.mode {
            ComplexityMode::Complexifying if stats.mean_complexity > self.complexity_ceiling => {
                ComplexityMode::Simplifying
            }
            ComplexityMode::Simplifying
                if stats.complexity_ma.mean() < self.complexity_ceiling =>
            {
                ComplexityMode::Complexifying
            }
            mode => mode,
        };
        self.mode
    }
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let params = EvolutionParameters {
        population_size: NonZeroUsize::new(50).unwrap(),
        specie_count: NonZeroUsize::new(5).unwrap(),
        elitism_proportion: 0.2,
        selection_proportion: 0.2,
        offspring_asexual_proportion: 0.5,
        min_genome_age: 5,
        trial_duration: Duration::from_millis(500),
        moving_average_history_length: NonZeroUsize::new(100).unwrap(),
    };

    let mut engine = RtNeatEvolutionAlgorithm::new(
        params,
        SeekerFactory::new(),
        DistanceSpeciation::new(),
        PhasedRegulation::new(12.0),
        SeekerDecoder,
        SeekerSpawner,
    );
    let events = engine.subscribe();

    if let Err(e) = run(&mut engine) {
        eprintln!("{}", e);
        return;
    }

    for event in events.try_iter() {
        if let EngineEvent::Paused { champion, .. } = event {
            match champion {
                Some(champion) => println!(
                    "champion fitness {:.4} after {} rounds",
                    champion.fitness(),
                    ROUNDS
                ),
                None => println!("no champion evolved"),
            }
        }
    }
}

type Engine = RtNeatEvolutionAlgorithm<
    genome::SeekerGenome,
    SeekerFactory,
    DistanceSpeciation,
    PhasedRegulation,
    SeekerDecoder,
    SeekerSpawner,
>;

fn run(engine: &mut Engine) -> Result<(), rtneat::EngineError> {
    let trial = engine.initialize()?;
    run_trial(trial, engine.pool_mut());
    engine.complete_initialization()?;
    engine.start_continue()?;

    for round in 0..ROUNDS {
        let trial = engine.begin_round()?;
        run_trial(trial, engine.pool_mut());
        engine.complete_round()?;

        if round % 100 == 0 {
            let stats = engine.statistics();
            info!(
                round,
                best = stats.max_fitness,
                mean = stats.mean_fitness,
                complexity = stats.mean_complexity,
                mode = ?engine.complexity_mode(),
                "progress"
            );
        }
    }

    engine.stop()
}
