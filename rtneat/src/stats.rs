//! Running statistics the engine refreshes at the end of every
//! replacement round. The three moving averages exist solely to feed
//! complexity-regulation decisions; selection never reads them.
use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A fixed-length history buffer exposing the mean of its contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MovingAverage {
    window: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl MovingAverage {
    pub fn new(capacity: usize) -> MovingAverage {
        MovingAverage {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            sum: 0.0,
        }
    }

    /// Appends a sample, evicting the oldest once the window is full.
    pub fn enqueue(&mut self, value: f64) {
        if self.window.len() == self.capacity {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
            }
        }
        self.window.push_back(value);
        self.sum += value;
    }

    /// Mean of the buffered samples; zero while empty.
    pub fn mean(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.sum / self.window.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/// Snapshot statistics for the running algorithm.
///
/// Each moving average is paired with the mean it held *before* the
/// latest sample was enqueued; complexity-regulation strategies
/// compare the two to read the trend direction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlgorithmStats {
    pub generation: u32,
    pub total_evaluation_count: u64,
    pub evaluations_per_sec: u64,

    pub min_specie_size: usize,
    pub max_specie_size: usize,
    pub mean_specie_size: f64,

    pub max_fitness: f64,
    pub mean_fitness: f64,
    pub max_complexity: f64,
    pub mean_complexity: f64,
    pub mean_specie_champ_fitness: f64,

    pub best_fitness_ma: MovingAverage,
    pub prev_best_fitness_ma: f64,
    pub mean_specie_champ_fitness_ma: MovingAverage,
    pub prev_mean_specie_champ_fitness_ma: f64,
    pub complexity_ma: MovingAverage,
    pub prev_complexity_ma: f64,

    pub(crate) evals_count_at_last_sample: u64,
    #[serde(skip, default = "Instant::now")]
    pub(crate) evals_per_sec_last_sample_time: Instant,
}

impl AlgorithmStats {
    pub fn new(moving_average_history_length: usize) -> AlgorithmStats {
        AlgorithmStats {
            generation: 0,
            total_evaluation_count: 0,
            evaluations_per_sec: 0,
            min_specie_size: 0,
            max_specie_size: 0,
            mean_specie_size: 0.0,
            max_fitness: 0.0,
            mean_fitness: 0.0,
            max_complexity: 0.0,
            mean_complexity: 0.0,
            mean_specie_champ_fitness: 0.0,
            best_fitness_ma: MovingAverage::new(moving_average_history_length),
            prev_best_fitness_ma: 0.0,
            mean_specie_champ_fitness_ma: MovingAverage::new(moving_average_history_length),
            prev_mean_specie_champ_fitness_ma: 0.0,
            complexity_ma: MovingAverage::new(moving_average_history_length),
            prev_complexity_ma: 0.0,
            evals_count_at_last_sample: 0,
            evals_per_sec_last_sample_time: Instant::now(),
        }
    }

    /// Refreshes the evaluations/sec figure. Sampled no more than
    /// once per second to smooth the statistic.
    pub(crate) fn sample_evaluations_per_sec(&mut self, now: Instant) {
        let elapsed = now - self.evals_per_sec_last_sample_time;
        if elapsed.as_secs_f64() >= 1.0 {
            let evals_since = self.total_evaluation_count - self.evals_count_at_last_sample;
            self.evaluations_per_sec = (evals_since as f64 / elapsed.as_secs_f64()) as u64;
            self.evals_count_at_last_sample = self.total_evaluation_count;
            self.evals_per_sec_last_sample_time = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn moving_average_evicts_oldest_sample() {
        let mut ma = MovingAverage::new(3);
        assert_eq!(ma.mean(), 0.0);

        ma.enqueue(1.0);
        ma.enqueue(2.0);
        ma.enqueue(3.0);
        assert_eq!(ma.mean(), 2.0);

        // 1.0 falls out of the window.
        ma.enqueue(6.0);
        assert_eq!(ma.len(), 3);
        assert!((ma.mean() - 11.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn evaluations_per_sec_is_throttled_to_one_second() {
        let mut stats = AlgorithmStats::new(8);
        let start = stats.evals_per_sec_last_sample_time;

        stats.total_evaluation_count = 100;
        stats.sample_evaluations_per_sec(start + Duration::from_millis(200));
        assert_eq!(stats.evaluations_per_sec, 0);

        stats.total_evaluation_count = 500;
        stats.sample_evaluations_per_sec(start + Duration::from_secs(2));
        assert_eq!(stats.evaluations_per_sec, 250);
    }

    #[test]
    fn stats_serialize_without_the_clock_field() {
        let stats = AlgorithmStats::new(4);
        let json = serde_json::to_string(&stats).unwrap();
        let back: AlgorithmStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back.generation, stats.generation);
        assert_eq!(back.best_fitness_ma.len(), 0);
    }
}
