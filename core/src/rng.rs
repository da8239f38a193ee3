//! Deterministic random numbers for chart layout.
//!
//! Nothing that renders may call a platform RNG: the same view state must
//! always produce the same markup. Each plotted series gets its own stream,
//! seeded from (base seed XOR series index), so adding a series never moves
//! the points of another.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub const BEESWARM_SEED: u64 = 0x5eed_c0de;

pub struct PlotRng {
    inner: Pcg64Mcg,
}

impl PlotRng {
    /// Stream for the series at `index`. The index must be stable for a
    /// given series (feature position, not display rank).
    pub fn for_series(seed: u64, index: u64) -> Self {
        let derived_seed = seed ^ index.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Offset in [-half_width, half_width).
    pub fn jitter(&mut self, half_width: f64) -> f64 {
        (self.next_f64() * 2.0 - 1.0) * half_width
    }
}
