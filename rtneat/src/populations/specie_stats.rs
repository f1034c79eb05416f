use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::genome::Genome;
use crate::populations::{
    probabilistic_round, EvolutionParameters, Population, RouletteWheel, Specie, StatsError,
};

/// Per-round, per-species allocation statistics. Recomputed every
/// replacement round, never persisted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpecieStats {
    /// Mean raw fitness of the species' members (0 if empty).
    pub mean_fitness: f64,
    /// Real-valued fitness-proportional target size.
    pub target_size_real: f64,
    /// Stochastically rounded and reconciled integer target size.
    pub target_size: usize,
    /// Number of members retained as elites.
    pub elite_size: usize,
    /// Offspring quota: target size minus elite size.
    pub offspring_count: usize,
    /// Asexual share of the offspring quota.
    pub offspring_asexual_count: usize,
    /// Sexual share of the offspring quota.
    pub offspring_sexual_count: usize,
    /// Number of the species' fittest members eligible as parents.
    pub selection_size: usize,
}

/// Calculates per-species statistics for one replacement round.
/// This is at the heart of the algorithm; for each species it derives:
///  1) the target size, from the fitness of the species' members;
///  2) the elite size, from the species' *current* size, capped by
///     the target size;
///  3) from (1) and (2), the offspring quota and its asexual/sexual
///     split, plus the selection-pool size.
///
/// The integer target sizes always sum exactly to the configured
/// population size, and the champion species always gets at least 1.
///
/// Also returns the total offspring count across species, which the
/// steady-state engine only uses diagnostically (one offspring is
/// produced per round regardless).
pub(crate) fn calc_specie_stats<G: Genome, R: Rng>(
    species: &mut [Specie],
    population: &Population<G>,
    params: &EvolutionParameters,
    best_specie_idx: usize,
    rng: &mut R,
) -> Result<(Vec<SpecieStats>, usize), StatsError> {
    let specie_count = species.len();
    let population_size = params.population_size.get();

    // Mean fitness per species, and the sum across species.
    let mut stats: Vec<SpecieStats> = Vec::with_capacity(specie_count);
    let mut total_mean_fitness = 0.0;
    for specie in species.iter_mut() {
        let mean_fitness = specie.calc_mean_fitness(population);
        total_mean_fitness += mean_fitness;
        stats.push(SpecieStats {
            mean_fitness,
            ..SpecieStats::default()
        });
    }

    // Real target sizes, discretized with stochastic rounding so the
    // expected integer allocation matches the real allocation exactly.
    let mut total_target_size = 0usize;
    if total_mean_fitness == 0.0 {
        // All genomes/species have zero fitness. Assign every species
        // an equal real target size rather than dividing by zero and
        // starving them all.
        let target_size_real = population_size as f64 / specie_count as f64;
        for inst in stats.iter_mut() {
            inst.target_size_real = target_size_real;
            inst.target_size = probabilistic_round(target_size_real, rng);
            total_target_size += inst.target_size;
        }
    } else {
        for inst in stats.iter_mut() {
            inst.target_size_real =
                (inst.mean_fitness / total_mean_fitness) * population_size as f64;
            inst.target_size = probabilistic_round(inst.target_size_real, rng);
            total_target_size += inst.target_size;
        }
    }

    // The discretized target sizes will generally miss the required
    // population size by some integer delta. Reconcile by moving the
    // difference one unit at a time, weighted by each species'
    // rounding residual, so species whose integer allocation fell
    // furthest below (or above) their real allocation are the most
    // likely to be adjusted.
    let target_size_delta = total_target_size as i64 - population_size as i64;

    if target_size_delta < 0 {
        if target_size_delta == -1 {
            // Fast path: a shortfall of exactly one goes straight to
            // the champion species, which both shortcuts the wheel
            // below and pre-empts the champion minimum-size fixup.
            stats[best_specie_idx].target_size += 1;
        } else {
            let wheel = RouletteWheel::new(
                stats
                    .iter()
                    .map(|inst| (inst.target_size_real - inst.target_size as f64).max(0.0)),
            );
            for _ in 0..-target_size_delta {
                stats[wheel.single_throw(rng)].target_size += 1;
            }
        }
    } else if target_size_delta > 0 {
        let wheel = RouletteWheel::new(
            stats
                .iter()
                .map(|inst| (inst.target_size as f64 - inst.target_size_real).max(0.0)),
        );
        let mut removed = 0;
        while removed < target_size_delta {
            let specie_idx = wheel.single_throw(rng);
            // Skip species already at zero; the same species can be
            // drawn more than once.
            if stats[specie_idx].target_size != 0 {
                stats[specie_idx].target_size -= 1;
                removed += 1;
            }
        }
    }

    // Sum(target_size) == population_size now holds.

    // The champion species must keep a nonzero target size so the
    // best-known genome is never discarded. A zero size can have been
    // allocated in some pathological cases.
    if stats[best_specie_idx].target_size == 0 {
        stats[best_specie_idx].target_size += 1;

        // Steal one unit of allocation from another species. Pick one
        // at random (not the champion), scanning forward from it, and
        // then from the start of the list, for one with a nonzero
        // allocation.
        let donor = find_donor_specie(&stats, best_specie_idx, rng)?;
        stats[donor].target_size -= 1;
    }

    // Elite sizes, offspring quotas and selection-pool sizes.
    let mut total_offspring = 0;
    for (i, inst) in stats.iter_mut().enumerate() {
        if inst.target_size == 0 {
            inst.elite_size = 0;
            continue;
        }

        // Elite size is calculated against the species' current size,
        // not its new target size, so the target acts as a hard cap.
        let elite_size_real = species[i].len() as f64 * params.elitism_proportion;
        inst.elite_size = probabilistic_round(elite_size_real, rng).min(inst.target_size);

        // The champ species preserves the champ genome even when its
        // target size is just 1, in which case it produces no
        // offspring of its own.
        if i == best_specie_idx && inst.elite_size == 0 {
            inst.elite_size = 1;
        }

        inst.offspring_count = inst.target_size - inst.elite_size;
        total_offspring += inst.offspring_count;

        let offspring_asexual_real =
            inst.offspring_count as f64 * params.offspring_asexual_proportion;
        inst.offspring_asexual_count = probabilistic_round(offspring_asexual_real, rng);
        inst.offspring_sexual_count = inst.offspring_count - inst.offspring_asexual_count;

        let selection_size_real = species[i].len() as f64 * params.selection_proportion;
        inst.selection_size = probabilistic_round(selection_size_real, rng).max(1);
    }

    Ok((stats, total_offspring))
}

/// Finds a non-champion species with nonzero allocation to give a
/// unit back. Starts at a uniformly random species, scans forward,
/// then wraps to the start of the list.
fn find_donor_specie<R: Rng>(
    stats: &[SpecieStats],
    best_specie_idx: usize,
    rng: &mut R,
) -> Result<usize, StatsError> {
    let specie_count = stats.len();
    if specie_count < 2 {
        return Err(StatsError::PopulationTooSmall);
    }

    let mut idx = rng.gen_range(0..specie_count - 1);
    if idx == best_specie_idx {
        idx += 1;
    }
    if stats[idx].target_size > 0 {
        return Ok(idx);
    }
    for i in (idx + 1..specie_count).chain(0..idx) {
        if i != best_specie_idx && stats[i].target_size > 0 {
            return Ok(i);
        }
    }
    Err(StatsError::PopulationTooSmall)
}
