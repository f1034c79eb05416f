//! Maps live genomes onto a bounded pool of reusable simulated-agent
//! slots for the duration of an evaluation window.
//!
//! The pool and the engine share one logical thread of control; the
//! binding table is mutated only by [`UnitPool::activate`] and
//! [`UnitPool::deactivate`], and fitness is only read back after the
//! trial wait of the round in which a phenome was activated.
use ahash::AHashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::genome::{Genome, GenomeDecoder, GenomeId};
use crate::populations::{PoolError, Population};

/// A stable per-species color tag, applied to units on activation so
/// observers can tell species apart in the running simulation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecieColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl SpecieColor {
    fn random<R: Rng>(rng: &mut R) -> SpecieColor {
        SpecieColor {
            r: rng.gen_range(0.0..1.0),
            g: rng.gen_range(0.0..0.2),
            b: rng.gen_range(0.0..1.0),
        }
    }
}

/// A simulated agent slot. Implementors step their agent inside the
/// external simulation loop while activated and accumulate the
/// scalar fitness the pool reads back.
pub trait Unit {
    type Phenome;

    /// Hands the unit a freshly decoded phenome and returns it to the
    /// running simulation. Any fitness accumulated by a previous
    /// occupant must be reset.
    fn activate(&mut self, phenome: Self::Phenome, specie_idx: usize, color: SpecieColor);

    /// Withdraws the unit from the simulation and releases the
    /// phenome.
    fn deactivate(&mut self);

    /// The fitness accumulated since activation. Higher is better.
    fn fitness(&self) -> f64;
}

/// Creates units when the pool has no deactivated one to reuse.
pub trait UnitSpawner {
    type Unit: Unit;

    fn spawn(&mut self) -> Self::Unit;
}

/// An object pool of simulated-agent slots, keyed by genome id.
///
/// Units are never destroyed; deactivated units are reset and reused
/// to avoid re-instantiation. A slot is never bound to two phenomes
/// simultaneously, and activation is refused once the number of
/// active units reaches the configured population ceiling.
pub struct UnitPool<S: UnitSpawner> {
    spawner: S,
    units: Vec<S::Unit>,
    unused: Vec<usize>,
    binding: AHashMap<GenomeId, usize>,
    colors: Vec<SpecieColor>,
    capacity: usize,
}

impl<S: UnitSpawner> UnitPool<S> {
    pub fn new(spawner: S, capacity: usize) -> UnitPool<S> {
        UnitPool {
            spawner,
            units: vec![],
            unused: vec![],
            binding: AHashMap::new(),
            colors: vec![],
            capacity,
        }
    }

    /// Pre-assigns a random color to each of `specie_count` species.
    /// Species created later are colored lazily on first activation.
    pub fn init_colors(&mut self, specie_count: usize) {
        let mut rng = rand::thread_rng();
        self.colors = (0..specie_count).map(|_| SpecieColor::random(&mut rng)).collect();
    }

    fn color_for(&mut self, specie_idx: usize) -> SpecieColor {
        if specie_idx >= self.colors.len() {
            let mut rng = rand::thread_rng();
            self.colors
                .extend((self.colors.len()..=specie_idx).map(|_| SpecieColor::random(&mut rng)));
        }
        self.colors[specie_idx]
    }

    /// Number of currently active (bound) units.
    pub fn active_count(&self) -> usize {
        self.binding.len()
    }

    pub fn is_bound(&self, id: GenomeId) -> bool {
        self.binding.contains_key(&id)
    }

    /// Binds a decoded phenome to a pooled unit and activates it.
    ///
    /// Reuses a deactivated unit when one is available, spawning a new
    /// one only for a previously unseen concurrency level.
    pub fn activate(
        &mut self,
        id: GenomeId,
        phenome: <S::Unit as Unit>::Phenome,
        specie_idx: usize,
    ) -> Result<(), PoolError> {
        if self.binding.contains_key(&id) {
            return Err(PoolError::AlreadyBound(id));
        }
        if self.binding.len() >= self.capacity {
            return Err(PoolError::Saturated {
                capacity: self.capacity,
            });
        }

        let slot = match self.unused.pop() {
            Some(slot) => slot,
            None => {
                self.units.push(self.spawner.spawn());
                self.units.len() - 1
            }
        };
        let color = self.color_for(specie_idx);
        self.units[slot].activate(phenome, specie_idx, color);
        self.binding.insert(id, slot);
        Ok(())
    }

    /// Deactivates the unit bound to `id` and reclaims its slot.
    /// A no-op for unbound ids.
    pub fn deactivate(&mut self, id: GenomeId) {
        if let Some(slot) = self.binding.remove(&id) {
            self.units[slot].deactivate();
            self.unused.push(slot);
        }
    }

    /// The fitness accumulated by the unit bound to `id`, or zero if
    /// no binding exists.
    pub fn get_fitness(&self, id: GenomeId) -> f64 {
        self.fitness_of(id).unwrap_or(0.0)
    }

    pub(crate) fn fitness_of(&self, id: GenomeId) -> Option<f64> {
        self.binding.get(&id).map(|&slot| self.units[slot].fitness())
    }

    /// Applies `f` to every active unit, in no particular order. The
    /// caller's simulation loop steps units through this during the
    /// trial wait.
    pub fn for_each_active_unit_mut<F: FnMut(&mut S::Unit)>(&mut self, mut f: F) {
        for slot in self.binding.values() {
            f(&mut self.units[*slot]);
        }
    }

    /// Deactivates every bound unit. Called on engine stop so no
    /// stale bindings survive a pause.
    pub fn deactivate_all(&mut self) {
        for (_, slot) in self.binding.drain() {
            self.units[slot].deactivate();
            self.unused.push(slot);
        }
    }

    #[cfg(test)]
    pub(crate) fn unit_count(&self) -> usize {
        self.units.len()
    }
}

/// Runs the activate/collect halves of an evaluation window around
/// the caller's trial-duration wait.
pub struct RtEvaluator<D> {
    decoder: D,
    evaluation_count: u64,
}

impl<D> RtEvaluator<D> {
    pub fn new(decoder: D) -> RtEvaluator<D> {
        RtEvaluator {
            decoder,
            evaluation_count: 0,
        }
    }

    /// Total number of fitness collections performed so far.
    pub fn evaluation_count(&self) -> u64 {
        self.evaluation_count
    }

    /// First half of the window: reclaims the removed genome's unit,
    /// hands the new offspring its slot, and activates any other
    /// genome without a live binding, capacity permitting.
    ///
    /// Non-viable genomes (decoder returns `None`) get an immediate
    /// zero fitness. Genomes refused for saturation are simply not
    /// evaluated this round and retried on the next.
    pub(crate) fn begin_trial<G, S>(
        &mut self,
        population: &mut Population<G>,
        removed: Option<GenomeId>,
        offspring: Option<GenomeId>,
        pool: &mut UnitPool<S>,
    ) where
        G: Genome,
        D: GenomeDecoder<G>,
        S: UnitSpawner,
        S::Unit: Unit<Phenome = D::Phenome>,
    {
        if let Some(removed) = removed {
            pool.deactivate(removed);
        }
        // The offspring takes the freed slot ahead of the general
        // activation pass, so it cannot lose it to saturation.
        if let Some(offspring) = offspring {
            self.activate_genome(population, offspring, pool);
        }

        let mut saturated = 0;
        for i in 0..population.len() {
            let id = population.genome_at(i).id();
            if pool.is_bound(id) {
                continue;
            }
            if !self.activate_genome(population, id, pool) {
                saturated += 1;
            }
        }
        if saturated > 0 {
            debug!(saturated, "unit pool saturated; deferring evaluations");
        }
    }

    /// Decodes and activates one genome. Returns false if the pool
    /// refused the activation for saturation.
    fn activate_genome<G, S>(
        &mut self,
        population: &mut Population<G>,
        id: GenomeId,
        pool: &mut UnitPool<S>,
    ) -> bool
    where
        G: Genome,
        D: GenomeDecoder<G>,
        S: UnitSpawner,
        S::Unit: Unit<Phenome = D::Phenome>,
    {
        if pool.is_bound(id) {
            return true;
        }
        let genome = match population.get(id) {
            Some(genome) => genome,
            None => return true,
        };
        let specie_idx = genome.specie_idx();
        match self.decoder.decode(genome) {
            Some(phenome) => match pool.activate(id, phenome, specie_idx) {
                Ok(()) => true,
                Err(PoolError::Saturated { .. }) => false,
                // Bound-ness was checked above; within the
                // single-threaded discipline no one else binds.
                Err(PoolError::AlreadyBound(_)) => true,
            },
            None => {
                if let Some(genome) = population.get_mut(id) {
                    genome.set_fitness(0.0);
                }
                true
            }
        }
    }

    /// Second half of the window: reads the accumulated fitness of
    /// every bound genome back from the pool. Unbound genomes keep
    /// their previous fitness.
    pub(crate) fn collect<G, S>(&mut self, population: &mut Population<G>, pool: &UnitPool<S>)
    where
        G: Genome,
        S: UnitSpawner,
    {
        for genome in population.iter_mut() {
            if let Some(fitness) = pool.fitness_of(genome.id()) {
                genome.set_fitness(fitness);
                self.evaluation_count += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{TestDecoder, TestGenome, TestSpawner};

    fn pool(capacity: usize) -> UnitPool<TestSpawner> {
        let mut pool = UnitPool::new(TestSpawner::default(), capacity);
        pool.init_colors(4);
        pool
    }

    #[test]
    fn activation_beyond_capacity_is_refused_not_overwritten() {
        let mut pool = pool(2);
        let ids: Vec<GenomeId> = (0..3).map(GenomeId).collect();

        pool.activate(ids[0], 1.0, 0).unwrap();
        pool.activate(ids[1], 2.0, 0).unwrap();
        assert_eq!(pool.active_count(), 2);

        match pool.activate(ids[2], 3.0, 0) {
            Err(PoolError::Saturated { capacity }) => assert_eq!(capacity, 2),
            other => panic!("expected saturation, got {:?}", other.err()),
        }
        // Existing bindings are untouched.
        assert!(pool.is_bound(ids[0]) && pool.is_bound(ids[1]));
        assert!(!pool.is_bound(ids[2]));
    }

    #[test]
    fn rebinding_a_live_genome_is_an_error() {
        let mut pool = pool(4);
        let id = GenomeId(7);
        pool.activate(id, 1.0, 0).unwrap();
        assert!(matches!(
            pool.activate(id, 9.0, 0),
            Err(PoolError::AlreadyBound(bound)) if bound == id
        ));
        // The original phenome's fitness is still the one read back.
        assert_eq!(pool.get_fitness(id), 1.0);
    }

    #[test]
    fn slots_are_reused_instead_of_respawned() {
        let mut pool = pool(4);
        for i in 0..4 {
            pool.activate(GenomeId(i), i as f64, 0).unwrap();
        }
        assert_eq!(pool.unit_count(), 4);

        pool.deactivate(GenomeId(0));
        pool.deactivate(GenomeId(1));
        pool.activate(GenomeId(10), 1.0, 1).unwrap();
        pool.activate(GenomeId(11), 2.0, 1).unwrap();
        // Same four units serve the new bindings.
        assert_eq!(pool.unit_count(), 4);
        assert_eq!(pool.active_count(), 4);
    }

    #[test]
    fn fitness_of_unbound_genome_is_zero() {
        let pool = pool(1);
        assert_eq!(pool.get_fitness(GenomeId(99)), 0.0);
    }

    #[test]
    fn deactivate_all_clears_every_binding() {
        let mut pool = pool(3);
        for i in 0..3 {
            pool.activate(GenomeId(i), 1.0, 0).unwrap();
        }
        pool.deactivate_all();
        assert_eq!(pool.active_count(), 0);
        for i in 0..3 {
            assert!(!pool.is_bound(GenomeId(i)));
        }
        // Slots remain available for reuse.
        pool.activate(GenomeId(9), 1.0, 0).unwrap();
        assert_eq!(pool.unit_count(), 3);
    }

    #[test]
    fn non_viable_genomes_get_zero_fitness_and_no_binding() {
        let mut genomes = TestGenome::list(&[4.0, 4.0]);
        genomes[1].viable = false;
        let ids: Vec<GenomeId> = genomes.iter().map(TestGenome::id).collect();
        let mut population = Population::new(genomes);

        let mut evaluator = RtEvaluator::new(TestDecoder);
        let mut pool = pool(8);
        evaluator.begin_trial(&mut population, None, None, &mut pool);

        assert!(pool.is_bound(ids[0]));
        assert!(!pool.is_bound(ids[1]));
        assert_eq!(population.get(ids[1]).unwrap().fitness(), 0.0);
    }

    #[test]
    fn saturated_genomes_keep_their_previous_fitness_after_collect() {
        let mut population = Population::new(TestGenome::list(&[4.0, 7.5]));
        let ids: Vec<GenomeId> = population.iter().map(TestGenome::id).collect();

        let mut evaluator = RtEvaluator::new(TestDecoder);
        let mut pool = pool(1);
        evaluator.begin_trial(&mut population, None, None, &mut pool);
        assert_eq!(pool.active_count(), 1);

        evaluator.collect(&mut population, &pool);
        // TestDecoder phenomes report the genome's tag as fitness.
        assert_eq!(population.get(ids[0]).unwrap().fitness(), 4.0);
        // The deferred genome was not touched.
        assert_eq!(population.get(ids[1]).unwrap().fitness(), 7.5);
        assert_eq!(evaluator.evaluation_count(), 1);
    }
}
