//! Differentially-private counting: a Laplace sampler drawn from a
//! session-local, seedable RNG.

use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seed used when a session doesn't ask for a specific one, fixed for
/// test reproducibility.
pub const DEFAULT_SEED: u64 = 0x46_4f_52_47_45_44_42; // "FORGEDB" in hex-ish bytes

/// Draws `U ~ Uniform[-0.5, 0.5]` and returns
/// `-b * sign(U) * ln(1 - 2*|U|)`, a sample from the Laplace
/// distribution with scale `b`.
pub fn sample_laplace(rng: &mut StdRng, scale: f64) -> f64 {
    let u: f64 = rng.gen_range(-0.5..0.5);
    let sign = if u < 0.0 { -1.0 } else { 1.0 };
    -scale * sign * (1.0 - 2.0 * u.abs()).ln()
}

/// Scale `b = 1 / max(epsilon, 1e-9)` for a given privacy budget.
pub fn scale_for_epsilon(epsilon: f64) -> f64 {
    1.0 / epsilon.max(1e-9)
}

pub fn new_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
