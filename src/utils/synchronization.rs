//! Synchronization utilities for the interception path.
//!
//! # Key Components
//!
//! - [`ComputeOnce`] - A memoized boolean computed at most once per generation
//!
//! The gate runs inline on host loading threads, so the common case has to be a single
//! atomic load. Only the first caller of a generation takes the lock and computes.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

const VALUE_BIT: u64 = 0b01;
const VALID_BIT: u64 = 0b10;
const GENERATION_SHIFT: u32 = 2;
const GENERATION_MASK: u64 = u64::MAX >> GENERATION_SHIFT;

/// A boolean that is computed once, lazily, and shared by every reader.
///
/// The stored value is tagged with a caller supplied generation. A read under a newer
/// generation, or a read after [`ComputeOnce::invalidate`], recomputes. Concurrent first
/// readers serialise on an internal mutex (double-checked): exactly one of them runs the
/// computation and all of them observe its result.
///
/// # Examples
///
/// ```rust,ignore
/// use classweave::utils::synchronization::ComputeOnce;
///
/// let flag = ComputeOnce::new();
/// assert!(flag.get_or_compute(0, || true));
/// // cached: the closure is not run again for the same generation
/// assert!(flag.get_or_compute(0, || false));
/// // a new generation recomputes
/// assert!(!flag.get_or_compute(1, || false));
/// ```
#[derive(Debug, Default)]
pub struct ComputeOnce {
    /// `generation << 2 | valid << 1 | value`
    state: AtomicU64,
    /// Serialises computation
    guard: Mutex<()>,
}

impl ComputeOnce {
    /// Create an empty, not yet computed flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `generation`, if one is present
    #[must_use]
    pub fn get(&self, generation: u64) -> Option<bool> {
        Self::decode(self.state.load(Ordering::Acquire), generation)
    }

    /// Returns the value for `generation`, running `compute` if no value is cached.
    ///
    /// If `compute` panics nothing is stored and the panic propagates to the caller; the
    /// next reader retries.
    pub fn get_or_compute<F>(&self, generation: u64, compute: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        if let Some(value) = self.get(generation) {
            return value;
        }

        let _guard = lock!(self.guard);
        if let Some(value) = self.get(generation) {
            return value;
        }

        let value = compute();
        self.state
            .store(Self::encode(generation, value), Ordering::Release);
        value
    }

    /// Drop the cached value so the next read recomputes
    pub fn invalidate(&self) {
        let _guard = lock!(self.guard);
        self.state.fetch_and(!VALID_BIT, Ordering::AcqRel);
    }

    fn encode(generation: u64, value: bool) -> u64 {
        ((generation & GENERATION_MASK) << GENERATION_SHIFT) | VALID_BIT | u64::from(value)
    }

    fn decode(state: u64, generation: u64) -> Option<bool> {
        if state & VALID_BIT == 0 {
            return None;
        }
        if state >> GENERATION_SHIFT != generation & GENERATION_MASK {
            return None;
        }
        Some(state & VALUE_BIT != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        panic::{catch_unwind, AssertUnwindSafe},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Barrier,
        },
        thread,
    };

    #[test]
    fn computes_once_per_generation() {
        let flag = ComputeOnce::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..5 {
            let value = flag.get_or_compute(7, || {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            });
            assert!(value);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flag.get(7), Some(true));
        assert_eq!(flag.get(8), None);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let flag = ComputeOnce::new();
        assert!(flag.get_or_compute(0, || true));
        flag.invalidate();
        assert_eq!(flag.get(0), None);
        assert!(!flag.get_or_compute(0, || false));
    }

    #[test]
    fn panicking_compute_stores_nothing() {
        let flag = ComputeOnce::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            flag.get_or_compute(0, || panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(flag.get(0), None);
        assert!(flag.get_or_compute(0, || true));
    }

    #[test]
    fn concurrent_first_readers_agree() {
        let flag = Arc::new(ComputeOnce::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let flag = Arc::clone(&flag);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    flag.get_or_compute(3, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        i % 2 == 0
                    })
                })
            })
            .collect();

        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
