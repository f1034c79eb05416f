use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration data for the real-time evolution algorithm.
///
/// # Note
/// All quantities expressing proportions should be in the range
/// [0.0, 1.0]. Using values that are not in this bound may result
/// in odd behaviours and/or incorrect programs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvolutionParameters {
    /// Target size of the population. Conserved across replacement
    /// rounds except for the transient remove-one/add-one step, and
    /// also the ceiling on concurrently active evaluation units.
    pub population_size: NonZeroUsize,
    /// Number of species the initial speciation pass aims for.
    pub specie_count: NonZeroUsize,
    /// Proportion of each species' current size retained as elites
    /// when allocating offspring quotas.
    pub elitism_proportion: f64,
    /// Proportion of each species' current size eligible as parents.
    pub selection_proportion: f64,
    /// Proportion of a species' offspring quota produced asexually.
    pub offspring_asexual_proportion: f64,
    /// Minimum age a genome must exceed before it can be removed as
    /// the round's worst individual.
    pub min_genome_age: u32,
    /// How long activated phenomes accumulate fitness inside the
    /// external simulation before the round's fitness collection.
    pub trial_duration: Duration,
    /// Window length of the trend moving averages kept in the
    /// algorithm statistics.
    pub moving_average_history_length: NonZeroUsize,
}

impl EvolutionParameters {
    /// Returns a "zero-valued" default configuration. All values are
    /// 0, zero-length, or in the case of `NonZeroUsize`s, 1.
    ///
    /// # Note
    /// This value is not suitable for use in most experiments. It is
    /// meant as a way to abbreviate configuration instantiation, or
    /// to fill in unused values.
    pub const fn zero() -> EvolutionParameters {
        EvolutionParameters {
            // SAFETY: 1 is a valid NonZeroUsize. Replace this with
            // NonZeroUsize::new(1).unwrap() once const Option::unwrap
            // becomes stable.
            population_size: unsafe { NonZeroUsize::new_unchecked(1) },
            // SAFETY: as above.
            specie_count: unsafe { NonZeroUsize::new_unchecked(1) },
            elitism_proportion: 0.0,
            selection_proportion: 0.0,
            offspring_asexual_proportion: 0.0,
            min_genome_age: 0,
            trial_duration: Duration::from_secs(0),
            // SAFETY: as above.
            moving_average_history_length: unsafe { NonZeroUsize::new_unchecked(1) },
        }
    }

    /// Derives the parameter set used while the population is in
    /// simplifying mode: offspring are produced exclusively by
    /// asexual reproduction, so mutation pressure alone drives the
    /// structural pruning.
    pub fn simplifying(&self) -> EvolutionParameters {
        EvolutionParameters {
            offspring_asexual_proportion: 1.0,
            ..self.clone()
        }
    }
}
