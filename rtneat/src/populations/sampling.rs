use rand::Rng;

/// Discretizes a non-negative real value with stochastic rounding:
/// the fractional part is the probability of rounding up.
///
/// Across many rounds the expected integer result equals the real
/// value, so repeated allocations carry no systematic downward bias.
pub fn probabilistic_round<R: Rng>(value: f64, rng: &mut R) -> usize {
    let floor = value.floor();
    let frac = value - floor;
    floor as usize + usize::from(rng.gen::<f64>() < frac)
}

/// A roulette wheel over a fixed set of outcomes with non-negative
/// weights.
///
/// Supports single draws by cumulative-weight binary search, and
/// without-replacement pairing via [`remove_outcome`], which zeroes
/// one outcome and renormalizes.
///
/// A wheel whose live weights sum to zero is degenerate; draws then
/// fall back to a uniform choice among the live outcomes, so a
/// degenerate (e.g. all-zero-fitness) population can still breed.
///
/// [`remove_outcome`]: RouletteWheel::remove_outcome
#[derive(Clone, Debug)]
pub struct RouletteWheel {
    weights: Vec<f64>,
    cumulative: Vec<f64>,
    live: Vec<bool>,
    total: f64,
}

impl RouletteWheel {
    /// Builds a wheel from the given weights. Negative weights are
    /// treated as zero.
    pub fn new(weights: impl IntoIterator<Item = f64>) -> RouletteWheel {
        let weights: Vec<f64> = weights.into_iter().map(|w| w.max(0.0)).collect();
        let live = vec![true; weights.len()];
        let (cumulative, total) = Self::accumulate(&weights);
        RouletteWheel {
            weights,
            cumulative,
            live,
            total,
        }
    }

    fn accumulate(weights: &[f64]) -> (Vec<f64>, f64) {
        let mut total = 0.0;
        let cumulative = weights
            .iter()
            .map(|w| {
                total += w;
                total
            })
            .collect();
        (cumulative, total)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Whether the live outcomes carry zero total weight.
    pub fn is_degenerate(&self) -> bool {
        self.total <= 0.0
    }

    /// Draws one outcome index, with probability proportional to its
    /// weight.
    ///
    /// # Panics
    /// Panics if the wheel has no live outcomes.
    pub fn single_throw<R: Rng>(&self, rng: &mut R) -> usize {
        assert!(
            self.live.iter().any(|l| *l),
            "single throw on a wheel with no live outcomes"
        );
        if self.is_degenerate() {
            // Uniform among live outcomes.
            let live_count = self.live.iter().filter(|l| **l).count();
            let nth = rng.gen_range(0..live_count);
            return self
                .live
                .iter()
                .enumerate()
                .filter(|(_, l)| **l)
                .nth(nth)
                .map(|(i, _)| i)
                .unwrap_or(0);
        }
        let throw = rng.gen::<f64>() * self.total;
        // partition_point yields the first index whose cumulative
        // weight exceeds the throw; zero-weight (removed) outcomes
        // have zero-width intervals and cannot be hit.
        let idx = self.cumulative.partition_point(|&c| c <= throw);
        idx.min(self.weights.len() - 1)
    }

    /// Returns a copy of the wheel with the given outcome removed
    /// and the remaining weights renormalized. The removed index can
    /// never be drawn from the returned wheel.
    pub fn remove_outcome(&self, idx: usize) -> RouletteWheel {
        let mut weights = self.weights.clone();
        let mut live = self.live.clone();
        weights[idx] = 0.0;
        live[idx] = false;
        let (cumulative, total) = Self::accumulate(&weights);
        RouletteWheel {
            weights,
            cumulative,
            live,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn probabilistic_round_is_unbiased_in_expectation() {
        let mut rng = SmallRng::seed_from_u64(7);
        const TRIALS: usize = 100_000;
        let value = 2.3;

        let sum: usize = (0..TRIALS).map(|_| probabilistic_round(value, &mut rng)).sum();
        let mean = sum as f64 / TRIALS as f64;
        assert!((mean - value).abs() < 0.01, "sample mean {} drifted from {}", mean, value);
    }

    #[test]
    fn probabilistic_round_is_exact_on_whole_numbers() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(probabilistic_round(4.0, &mut rng), 4);
            assert_eq!(probabilistic_round(0.0, &mut rng), 0);
        }
    }

    #[test]
    fn single_throw_converges_to_weight_proportions() {
        let mut rng = SmallRng::seed_from_u64(11);
        let wheel = RouletteWheel::new([1.0, 3.0, 6.0]);

        const THROWS: usize = 100_000;
        let mut counts = [0usize; 3];
        for _ in 0..THROWS {
            counts[wheel.single_throw(&mut rng)] += 1;
        }
        for (i, expected) in [0.1, 0.3, 0.6].iter().enumerate() {
            let observed = counts[i] as f64 / THROWS as f64;
            assert!(
                (observed - expected).abs() < 0.01,
                "outcome {} drawn with frequency {}, expected {}",
                i,
                observed,
                expected
            );
        }
    }

    #[test]
    fn remove_outcome_never_reselects_removed_index() {
        let mut rng = SmallRng::seed_from_u64(13);
        let wheel = RouletteWheel::new([5.0, 1.0, 4.0]);
        let reduced = wheel.remove_outcome(0);

        for _ in 0..10_000 {
            assert_ne!(reduced.single_throw(&mut rng), 0);
        }
    }

    #[test]
    fn degenerate_wheel_draws_uniformly_among_live_outcomes() {
        let mut rng = SmallRng::seed_from_u64(17);
        let wheel = RouletteWheel::new([0.0, 0.0, 0.0]).remove_outcome(1);

        let mut counts = [0usize; 3];
        for _ in 0..10_000 {
            counts[wheel.single_throw(&mut rng)] += 1;
        }
        assert_eq!(counts[1], 0);
        assert!(counts[0] > 4_000 && counts[2] > 4_000);
    }
}
