//! Injectable randomness for the generator.
//!
//! Production code draws from any [`rand::Rng`]; tests replay fixed draws
//! with [`SequenceRandom`] so derived values can be asserted exactly.

use std::collections::VecDeque;

use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};

/// The three kinds of draw the generator makes.
pub trait RandomSource {
    /// Returns true with the given probability.
    fn chance(&mut self, probability: f64) -> bool;

    /// Uniform float in `[low, high]`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;

    /// Uniform integer in `[low, high]`.
    fn uniform_int(&mut self, low: u32, high: u32) -> u32;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn chance(&mut self, probability: f64) -> bool {
        Bernoulli::new(probability.clamp(0.0, 1.0)).is_ok_and(|coin| coin.sample(self))
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if low >= high {
            return low;
        }
        Uniform::new_inclusive(low, high).sample(self)
    }

    fn uniform_int(&mut self, low: u32, high: u32) -> u32 {
        if low >= high {
            return low;
        }
        Uniform::new_inclusive(low, high).sample(self)
    }
}

/// Replays scripted draws in order.
///
/// Exhausted queues fall back to "no impact" and the lower bound of the
/// requested range. Scripted floats and integers are clamped into the
/// requested range.
#[derive(Debug, Clone, Default)]
pub struct SequenceRandom {
    chances: VecDeque<bool>,
    floats: VecDeque<f64>,
    ints: VecDeque<u32>,
}

impl SequenceRandom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes of successive `chance` draws.
    pub fn with_chances(mut self, outcomes: impl IntoIterator<Item = bool>) -> Self {
        self.chances.extend(outcomes);
        self
    }

    /// Values of successive `uniform` draws.
    pub fn with_floats(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.floats.extend(values);
        self
    }

    /// Values of successive `uniform_int` draws.
    pub fn with_ints(mut self, values: impl IntoIterator<Item = u32>) -> Self {
        self.ints.extend(values);
        self
    }
}

impl RandomSource for SequenceRandom {
    fn chance(&mut self, _probability: f64) -> bool {
        self.chances.pop_front().unwrap_or(false)
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.floats
            .pop_front()
            .map_or(low, |v| v.clamp(low, high.max(low)))
    }

    fn uniform_int(&mut self, low: u32, high: u32) -> u32 {
        self.ints
            .pop_front()
            .map_or(low, |v| v.clamp(low, high.max(low)))
    }
}
