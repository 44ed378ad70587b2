//! Numerical methods: how a `NumMethod` composes the configured advective
//! and diffusive `ItMethod`s into one driver timestep (§4.E).
//!
//! `Std` evaluates every configured `ItMethod` once, at the particle's
//! position at the start of the step, and sums their deltas — advection
//! and diffusion see the same starting state. `OperatorSplit0` instead
//! takes `n_inner_steps` advective sub-steps, committing and relocating
//! the particle between each one, and applies the diffusive step once at
//! the end as a single outer correction — the split that gives its name.
//! Both variants check boundary crossings at every intermediate commit,
//! not just at the final position.

use crate::boundary::HorizBoundaryCalculator;
use crate::config::{DiffIterativeMethod, NumMethodKind, NumericsConfig};
use crate::field::FieldSource;
use crate::itmethod::{relocate_with_horizontal_bc, ItMethodKind, StepOutcome};
use crate::particle::{Delta, Particle};
use crate::rng::DrawId;

/// A resolved numerical method: which outer composition, and which
/// concrete advective/diffusive kernels feed it. Built once from
/// `NumericsConfig` at startup (§9).
pub struct NumMethod {
    kind: NumMethodKind,
    adv: ItMethodKind,
    diff_vert: ItMethodKind,
    diff_horiz: ItMethodKind,
    n_inner_steps: usize,
    horiz_bc: HorizBoundaryCalculator,
    max_bc_iters: usize,
}

impl NumMethod {
    pub fn from_config(numerics: &NumericsConfig, horiz_bc: HorizBoundaryCalculator, max_bc_iters: usize) -> Self {
        let adv = match numerics.adv_iterative_method {
            crate::config::AdvIterativeMethod::Rk4 => ItMethodKind::Rk4,
            crate::config::AdvIterativeMethod::Euler => ItMethodKind::Euler,
            crate::config::AdvIterativeMethod::None => ItMethodKind::None,
        };
        let diff_vert = match numerics.diff_iterative_method {
            DiffIterativeMethod::Visser => ItMethodKind::VisserVerticalRandomWalk,
            DiffIterativeMethod::Naive => ItMethodKind::NaiveVerticalRandomWalk,
            DiffIterativeMethod::None => ItMethodKind::None,
        };
        let diff_horiz = match numerics.diff_iterative_method {
            DiffIterativeMethod::None => ItMethodKind::None,
            _ => ItMethodKind::HorizontalRandomWalk2D,
        };
        NumMethod {
            kind: numerics.num_method,
            adv,
            diff_vert,
            diff_horiz,
            n_inner_steps: numerics.n_inner_steps.max(1),
            horiz_bc,
            max_bc_iters,
        }
    }

    /// Advance `p` one driver timestep `dt` starting at time `t`. Returns
    /// the accumulated `Delta` to apply, or the boundary/fault outcome
    /// that interrupted it; the particle itself is never mutated here —
    /// the driver applies the returned delta after its own boundary pass.
    pub fn step(
        &self,
        field: &dyn FieldSource,
        t: f64,
        dt: f64,
        p: &Particle,
        master_seed: u64,
        step_index: u64,
    ) -> StepOutcome {
        match self.kind {
            NumMethodKind::Standard => self.step_std(field, t, dt, p, master_seed, step_index),
            NumMethodKind::OperatorSplit0 => {
                self.step_operator_split(field, t, dt, p, master_seed, step_index)
            }
        }
    }

    fn step_std(
        &self,
        field: &dyn FieldSource,
        t: f64,
        dt: f64,
        p: &Particle,
        master_seed: u64,
        step_index: u64,
    ) -> StepOutcome {
        let mut total = Delta::ZERO;
        for (substep, kind) in [(0u32, self.adv), (1, self.diff_vert), (2, self.diff_horiz)] {
            if kind == ItMethodKind::None {
                continue;
            }
            let draw = DrawId {
                master_seed,
                particle_id: p.id,
                step_index,
                substep,
            };
            match kind.step(field, t, dt, p, draw) {
                StepOutcome::Ok(delta) => total.add(delta),
                other => return other,
            }
        }
        StepOutcome::Ok(total)
    }

    fn step_operator_split(
        &self,
        field: &dyn FieldSource,
        t: f64,
        dt: f64,
        p: &Particle,
        master_seed: u64,
        step_index: u64,
    ) -> StepOutcome {
        let inner_dt = dt / self.n_inner_steps as f64;
        let mut probe = p.clone();
        let mut total = Delta::ZERO;

        if self.adv != ItMethodKind::None {
            for inner in 0..self.n_inner_steps {
                let t_inner = t + inner as f64 * inner_dt;
                let draw = DrawId {
                    master_seed,
                    particle_id: p.id,
                    step_index,
                    substep: inner as u32,
                };
                let old_xy = (probe.x1, probe.x2);
                let old_host = probe.host;
                match self.adv.step(field, t_inner, inner_dt, &probe, draw) {
                    StepOutcome::Ok(delta) => {
                        total.add(delta);
                        probe.x1 += delta.dx;
                        probe.x2 += delta.dy;
                        probe.x3 += delta.dz;
                        if let Err(out) =
                            relocate_with_horizontal_bc(field, &self.horiz_bc, self.max_bc_iters, &mut probe, old_xy, old_host)
                        {
                            return out;
                        }
                    }
                    other => return other,
                }
            }
        }

        // Outer diffusive sub-step, evaluated once at the post-advection
        // position, after every inner advective sub-step has committed.
        let outer_base_substep = self.n_inner_steps as u32;
        for (offset, kind) in [(0u32, self.diff_vert), (1, self.diff_horiz)] {
            if kind == ItMethodKind::None {
                continue;
            }
            let draw = DrawId {
                master_seed,
                particle_id: p.id,
                step_index,
                substep: outer_base_substep + offset,
            };
            let old_xy = (probe.x1, probe.x2);
            let old_host = probe.host;
            match kind.step(field, t + dt, dt, &probe, draw) {
                StepOutcome::Ok(delta) => {
                    total.add(delta);
                    probe.x1 += delta.dx;
                    probe.x2 += delta.dy;
                    probe.x3 += delta.dz;
                    if let Err(out) =
                        relocate_with_horizontal_bc(field, &self.horiz_bc, self.max_bc_iters, &mut probe, old_xy, old_host)
                    {
                        return out;
                    }
                }
                other => return other,
            }
        }

        StepOutcome::Ok(total)
    }
}
