//! Deterministic, per-draw random number generation for the stochastic
//! sub-steps (vertical and horizontal random walks).
//!
//! Reproducibility requires that the same `(seed, particle_id, step_index,
//! substep)` tuple produce the same draw, independent of thread scheduling.
//! Rather than carrying a mutable RNG stream across a particle's lifetime
//! (which would make the draw depend on call order, not just identity), the
//! mixer below folds all four coordinates into a single seed and spins up a
//! fresh `ChaCha8Rng` for that one draw. `ChaCha8Rng` is used instead of the
//! platform `StdRng` because it is specified to be portable across
//! platforms and Rust versions, which plain bit-identical reproducibility
//! depends on.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic FNV-1a 64-bit mixer, used to fold the four draw
/// coordinates into a single seed. Not cryptographic — just stable and
/// fast, same rationale as an ordinary hash-based seed derivation.
fn fold_seed(parts: &[u64]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut state = OFFSET_BASIS;
    for &part in parts {
        for byte in part.to_le_bytes() {
            state ^= byte as u64;
            state = state.wrapping_mul(PRIME);
        }
    }
    state
}

/// A single stochastic draw coordinate. `step_index` counts driver
/// timesteps; `substep` disambiguates the several independent draws made
/// within one step (e.g. vertical vs. the two horizontal components, or
/// the inner sub-steps of an operator-split method).
#[derive(Debug, Clone, Copy)]
pub struct DrawId {
    pub master_seed: u64,
    pub particle_id: u64,
    pub step_index: u64,
    pub substep: u32,
}

impl DrawId {
    fn seed(&self) -> u64 {
        fold_seed(&[
            self.master_seed,
            self.particle_id,
            self.step_index,
            self.substep as u64,
        ])
    }

    /// `R ~ Uniform(-1, 1)`, `Var(R) = 1/3`; the random-walk formulas scale
    /// by `r = 1/3` to normalize this to unit variance.
    pub fn uniform_symmetric(&self) -> f64 {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed());
        rng.gen_range(-1.0..1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_tuple_draws_same_value() {
        let a = DrawId {
            master_seed: 42,
            particle_id: 7,
            step_index: 100,
            substep: 1,
        };
        let b = a;
        assert_eq!(a.uniform_symmetric(), b.uniform_symmetric());
    }

    #[test]
    fn distinct_substeps_draw_independently() {
        let a = DrawId {
            master_seed: 42,
            particle_id: 7,
            step_index: 100,
            substep: 1,
        };
        let b = DrawId { substep: 2, ..a };
        assert_ne!(a.uniform_symmetric(), b.uniform_symmetric());
    }

    #[test]
    fn draws_stay_within_bounds() {
        let draw = DrawId {
            master_seed: 1,
            particle_id: 0,
            step_index: 0,
            substep: 0,
        };
        for step in 0..1000u64 {
            let d = DrawId { step_index: step, ..draw };
            let v = d.uniform_symmetric();
            assert!((-1.0..1.0).contains(&v));
        }
    }
}
