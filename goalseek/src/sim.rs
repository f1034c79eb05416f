//! The goal-seeking world: agents steer toward a goal point and are
//! rewarded by inverse-square proximity, sampled every tick.
use std::time::Duration;

use rand::Rng;

use rtneat::{SpecieColor, Unit, UnitPool, UnitSpawner};

use crate::genome::WEIGHT_COUNT;

pub const WORLD_SIZE: f64 = 100.0;
pub const GOAL: [f64; 2] = [WORLD_SIZE / 2.0, WORLD_SIZE / 2.0];
const MAX_SPEED: f64 = 2.0;
const TICK: Duration = Duration::from_millis(10);

/// One agent slot. While activated it holds a steering policy (the
/// genome's weight matrix) and accumulates proximity reward.
pub struct SeekerUnit {
    pos: [f64; 2],
    policy: Option<[f64; WEIGHT_COUNT]>,
    specie_idx: usize,
    color: SpecieColor,
    reward: f64,
    ticks: u32,
}

impl SeekerUnit {
    fn new() -> SeekerUnit {
        SeekerUnit {
            pos: [0.0, 0.0],
            policy: None,
            specie_idx: 0,
            color: SpecieColor {
                r: 0.0,
                g: 0.0,
                b: 0.0,
            },
            reward: 0.0,
            ticks: 0,
        }
    }

    pub fn specie_idx(&self) -> usize {
        self.specie_idx
    }

    pub fn color(&self) -> SpecieColor {
        self.color
    }

    pub fn distance_to_goal(&self) -> f64 {
        let dx = GOAL[0] - self.pos[0];
        let dy = GOAL[1] - self.pos[1];
        (dx * dx + dy * dy).sqrt()
    }

    /// Advances the agent by one tick: applies the policy to the
    /// goal-relative offset, moves, and samples the reward.
    pub fn step(&mut self) {
        let policy = match self.policy {
            Some(policy) => policy,
            None => return,
        };
        let dx = GOAL[0] - self.pos[0];
        let dy = GOAL[1] - self.pos[1];
        let vx = (policy[0] * dx + policy[1] * dy).clamp(-MAX_SPEED, MAX_SPEED);
        let vy = (policy[2] * dx + policy[3] * dy).clamp(-MAX_SPEED, MAX_SPEED);
        self.pos[0] = (self.pos[0] + vx).clamp(0.0, WORLD_SIZE);
        self.pos[1] = (self.pos[1] + vy).clamp(0.0, WORLD_SIZE);

        let d = self.distance_to_goal();
        self.reward += 1.0 / (1.0 + d * d);
        self.ticks += 1;
    }
}

impl Unit for SeekerUnit {
    type Phenome = [f64; WEIGHT_COUNT];

    fn activate(&mut self, phenome: [f64; WEIGHT_COUNT], specie_idx: usize, color: SpecieColor) {
        let mut rng = rand::thread_rng();
        self.pos = [
            rng.gen_range(0.0..WORLD_SIZE),
            rng.gen_range(0.0..WORLD_SIZE),
        ];
        self.policy = Some(phenome);
        self.specie_idx = specie_idx;
        self.color = color;
        self.reward = 0.0;
        self.ticks = 0;
    }

    fn deactivate(&mut self) {
        self.policy = None;
    }

    /// Mean per-tick proximity reward, in (0, 1]. Averaging keeps
    /// fitness comparable between agents activated in different
    /// rounds.
    fn fitness(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.reward / self.ticks as f64
        }
    }
}

#[derive(Default)]
pub struct SeekerSpawner;

impl UnitSpawner for SeekerSpawner {
    type Unit = SeekerUnit;

    fn spawn(&mut self) -> SeekerUnit {
        SeekerUnit::new()
    }
}

/// Steps every active agent through one trial window. The window is
/// simulated rather than waited out in wall-clock time.
pub fn run_trial(trial: Duration, pool: &mut UnitPool<SeekerSpawner>) {
    let ticks = (trial.as_millis() / TICK.as_millis()).max(1);
    for _ in 0..ticks {
        pool.for_each_active_unit_mut(SeekerUnit::step);
    }
}
