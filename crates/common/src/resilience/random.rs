//! Injectable randomness for jittered backoff
//!
//! Backoff jitter exists to de-synchronize retry storms across many clients,
//! which makes it inherently non-deterministic. Injecting the source keeps
//! delay computation testable: production uses the thread-local RNG, tests
//! use a fixed sequence.

use std::sync::Mutex;

use rand::Rng;

/// Source of uniform random values in `[0.0, 1.0)`.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Production source backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Deterministic source cycling through a fixed sequence of values.
#[derive(Debug)]
pub struct FixedRandom {
    values: Vec<f64>,
    cursor: Mutex<usize>,
}

impl FixedRandom {
    /// Create a source that cycles through `values`.
    pub fn new(values: Vec<f64>) -> Self {
        let values = if values.is_empty() { vec![0.0] } else { values };
        Self {
            values,
            cursor: Mutex::new(0),
        }
    }

    /// Source that always yields the same value.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        let mut cursor = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let value = self.values[*cursor % self.values.len()];
        *cursor += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for randomness sources.

    use super::*;

    /// Validates `ThreadRandom` stays within `[0.0, 1.0)`.
    #[test]
    fn test_thread_random_range() {
        let source = ThreadRandom;
        for _ in 0..100 {
            let value = source.next_f64();
            assert!((0.0..1.0).contains(&value));
        }
    }

    /// Validates `FixedRandom` cycles its sequence deterministically.
    #[test]
    fn test_fixed_random_cycles() {
        let source = FixedRandom::new(vec![0.1, 0.9]);
        assert_eq!(source.next_f64(), 0.1);
        assert_eq!(source.next_f64(), 0.9);
        assert_eq!(source.next_f64(), 0.1);
    }

    /// Validates `FixedRandom::constant` always yields the same value.
    #[test]
    fn test_fixed_random_constant() {
        let source = FixedRandom::constant(0.5);
        assert_eq!(source.next_f64(), 0.5);
        assert_eq!(source.next_f64(), 0.5);
    }
}
