//! Selection strategies for "pick one of N" decisions.
//!
//! Header images, featured media ids and generation providers are all chosen
//! from a list. The choice is injected so tests can make it deterministic.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// Picks an index into a list of `len` candidates.
pub trait SelectionStrategy: Send + Sync {
    /// Returns `None` only when `len == 0`.
    fn pick(&self, len: usize) -> Option<usize>;
}

/// Uniformly random choice.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformRandom;

impl SelectionStrategy for UniformRandom {
    fn pick(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(rand::rng().random_range(0..len))
    }
}

/// Always the first candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstChoice;

impl SelectionStrategy for FirstChoice {
    fn pick(&self, len: usize) -> Option<usize> {
        (len > 0).then_some(0)
    }
}

/// Cycles through candidates in order.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl SelectionStrategy for RoundRobin {
    fn pick(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.next.fetch_add(1, Ordering::Relaxed) % len)
    }
}

/// Pick an element from a slice with the given strategy.
pub fn choose<'a, T>(strategy: &dyn SelectionStrategy, items: &'a [T]) -> Option<&'a T> {
    strategy.pick(items.len()).and_then(|i| items.get(i))
}
