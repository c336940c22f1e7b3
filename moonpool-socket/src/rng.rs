//! Thread-local random number generation for port selection.
//!
//! Ephemeral port allocation and synthesized peer ports draw from a seeded
//! `ChaCha8Rng` kept in thread-local storage. Seeding the thread that binds
//! and connects makes the chosen port numbers reproducible across runs.

use rand::distributions::uniform::SampleUniform;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::ops::Range;

thread_local! {
    static SIM_RNG: RefCell<ChaCha8Rng> = RefCell::new(ChaCha8Rng::from_entropy());

    /// Seed last installed with [`set_sim_seed`], 0 when unseeded.
    static CURRENT_SEED: RefCell<u64> = const { RefCell::new(0) };
}

/// Sample a value from `range` using the thread-local RNG.
///
/// Returns `range.start` when the range is empty instead of panicking.
///
/// ```rust
/// use moonpool_socket::rng::{set_sim_seed, sim_random_range};
///
/// set_sim_seed(7);
/// let port = sim_random_range(1024u16..2048);
/// assert!((1024..2048).contains(&port));
/// assert_eq!(sim_random_range(5u16..5), 5);
/// ```
pub fn sim_random_range<T>(range: Range<T>) -> T
where
    T: SampleUniform + PartialOrd + Copy,
{
    if range.start >= range.end {
        return range.start;
    }
    SIM_RNG.with(|rng| rng.borrow_mut().gen_range(range))
}

/// Seed the thread-local RNG so subsequent port choices on this thread repeat.
pub fn set_sim_seed(seed: u64) {
    SIM_RNG.with(|rng| {
        *rng.borrow_mut() = ChaCha8Rng::seed_from_u64(seed);
    });
    CURRENT_SEED.with(|current| {
        *current.borrow_mut() = seed;
    });
}

/// Seed last installed on this thread, or 0.
pub fn get_current_sim_seed() -> u64 {
    CURRENT_SEED.with(|current| *current.borrow())
}

/// Reseed the thread-local RNG from entropy and forget the current seed.
pub fn reset_sim_rng() {
    SIM_RNG.with(|rng| {
        *rng.borrow_mut() = ChaCha8Rng::from_entropy();
    });
    CURRENT_SEED.with(|current| {
        *current.borrow_mut() = 0;
    });
}
