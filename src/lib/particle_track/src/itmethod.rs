//! Iterative methods: the individual advective or diffusive update rules a
//! `NumMethod` composes into a full timestep (§4.D).
//!
//! Every method here takes a `&dyn FieldSource` (never the concrete
//! sampler) so a `NumMethod` can be built against any adapter, and returns
//! a `StepOutcome` rather than mutating the particle directly — boundary
//! crossings discovered mid-stage (e.g. an RK4 intermediate evaluation
//! point that walks onto land) are reported the same way a final crossing
//! would be, so the caller's recovery policy (§7) doesn't need a separate
//! code path for "crossed while probing".

use crate::boundary::HorizBoundaryCalculator;
use crate::error::{CoreError, CrossedBoundary};
use crate::field::FieldSource;
use crate::particle::{Delta, Particle};
use crate::rng::DrawId;

/// `r = Var(Uniform(-1,1))^-1 / 3`'s usual symbol in the random-walk
/// literature; normalizes a `Uniform(-1,1)` draw so its variance matches a
/// unit normal scaled by `sqrt(2 K dt)`.
const R_NORMALIZER: f64 = 1.0 / 3.0;

/// The result of attempting one iterative-method contribution.
#[derive(Debug)]
pub enum StepOutcome {
    Ok(Delta),
    LandHit,
    OpenHit,
    Fault(CoreError),
}

/// Which concrete iterative method to run; resolved once from
/// configuration (`NUMERICS.adv_iterative_method` /
/// `NUMERICS.diff_iterative_method`) rather than dispatched virtually per
/// particle per step (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItMethodKind {
    Rk4,
    Euler,
    VisserVerticalRandomWalk,
    NaiveVerticalRandomWalk,
    HorizontalRandomWalk2D,
    None,
}

impl ItMethodKind {
    /// Run this method for one sub-step of length `dt`. `draw` supplies the
    /// stochastic methods' random numbers; deterministic methods ignore it.
    pub fn step(
        &self,
        field: &dyn FieldSource,
        t: f64,
        dt: f64,
        p: &Particle,
        draw: DrawId,
    ) -> StepOutcome {
        match self {
            ItMethodKind::Rk4 => rk4_advect(field, t, dt, p),
            ItMethodKind::Euler => euler_advect(field, t, dt, p),
            ItMethodKind::VisserVerticalRandomWalk => {
                visser_vertical_random_walk(field, t, dt, p, draw)
            }
            ItMethodKind::NaiveVerticalRandomWalk => {
                naive_vertical_random_walk(field, t, dt, p, draw)
            }
            ItMethodKind::HorizontalRandomWalk2D => horizontal_random_walk_2d(field, t, dt, p, draw),
            ItMethodKind::None => StepOutcome::Ok(Delta::ZERO),
        }
    }
}

pub(crate) fn try_relocate(field: &dyn FieldSource, probe: &mut Particle) -> Result<(), StepOutcome> {
    match field.set_local_coordinates(probe) {
        Ok(()) => Ok(()),
        Err(CoreError::BoundaryCrossed {
            boundary: CrossedBoundary::Land,
            ..
        }) => Err(StepOutcome::LandHit),
        Err(CoreError::BoundaryCrossed {
            boundary: CrossedBoundary::Open,
            ..
        }) => Err(StepOutcome::OpenHit),
        Err(e) => Err(StepOutcome::Fault(e)),
    }
}

/// Relocate `probe` after one committed sub-step displacement, resolving a
/// land crossing against `horiz_bc` (reflecting/restoring it back into the
/// domain) rather than treating it as terminal — used between
/// `OperatorSplit0`'s inner advective sub-steps and after its outer
/// diffusive step (§4.E: "BC checks run after each inner advective
/// sub-step and after the diffusive step"). An open-boundary crossing is
/// never retried — the particle has left the domain — and propagates as
/// `OpenHit`; anything else propagates as `Fault`.
pub(crate) fn relocate_with_horizontal_bc(
    field: &dyn FieldSource,
    horiz_bc: &HorizBoundaryCalculator,
    max_bc_iters: usize,
    probe: &mut Particle,
    old_xy: (f64, f64),
    old_host: usize,
) -> Result<(), StepOutcome> {
    for _ in 0..max_bc_iters.max(1) {
        match field.set_local_coordinates(probe) {
            Ok(()) => return Ok(()),
            Err(CoreError::BoundaryCrossed {
                boundary: CrossedBoundary::Open,
                ..
            }) => return Err(StepOutcome::OpenHit),
            Err(CoreError::BoundaryCrossed {
                boundary: CrossedBoundary::Land,
                ..
            }) => {
                let corrected = horiz_bc.resolve(field.mesh(), old_host, old_xy, (probe.x1, probe.x2));
                probe.x1 = corrected.0;
                probe.x2 = corrected.1;
            }
            Err(e) => return Err(StepOutcome::Fault(e)),
        }
    }
    Err(StepOutcome::Fault(CoreError::SearchFail {
        particle_id: probe.id,
        steps: max_bc_iters,
    }))
}

/// Classical fourth-order Runge-Kutta advection. Each intermediate stage
/// relocates a probe particle to the trial position before sampling
/// velocity there; a crossing discovered at any stage aborts the whole
/// step rather than silently advecting through a boundary.
fn rk4_advect(field: &dyn FieldSource, t: f64, dt: f64, p: &Particle) -> StepOutcome {
    let mut probe = p.clone();
    let k1 = match field.get_velocity(t, &probe) {
        Ok(v) => v,
        Err(e) => return StepOutcome::Fault(e),
    };

    probe.x1 = p.x1 + 0.5 * dt * k1.0;
    probe.x2 = p.x2 + 0.5 * dt * k1.1;
    probe.x3 = p.x3 + 0.5 * dt * k1.2;
    if let Err(out) = try_relocate(field, &mut probe) {
        return out;
    }
    let k2 = match field.get_velocity(t + 0.5 * dt, &probe) {
        Ok(v) => v,
        Err(e) => return StepOutcome::Fault(e),
    };

    probe.x1 = p.x1 + 0.5 * dt * k2.0;
    probe.x2 = p.x2 + 0.5 * dt * k2.1;
    probe.x3 = p.x3 + 0.5 * dt * k2.2;
    if let Err(out) = try_relocate(field, &mut probe) {
        return out;
    }
    let k3 = match field.get_velocity(t + 0.5 * dt, &probe) {
        Ok(v) => v,
        Err(e) => return StepOutcome::Fault(e),
    };

    probe.x1 = p.x1 + dt * k3.0;
    probe.x2 = p.x2 + dt * k3.1;
    probe.x3 = p.x3 + dt * k3.2;
    if let Err(out) = try_relocate(field, &mut probe) {
        return out;
    }
    let k4 = match field.get_velocity(t + dt, &probe) {
        Ok(v) => v,
        Err(e) => return StepOutcome::Fault(e),
    };

    let dx = dt / 6.0 * (k1.0 + 2.0 * k2.0 + 2.0 * k3.0 + k4.0);
    let dy = dt / 6.0 * (k1.1 + 2.0 * k2.1 + 2.0 * k3.1 + k4.1);
    let dz = dt / 6.0 * (k1.2 + 2.0 * k2.2 + 2.0 * k3.2 + k4.2);
    StepOutcome::Ok(Delta { dx, dy, dz })
}

/// Forward-Euler advection: a single velocity evaluation at the particle's
/// current position, no intermediate relocation.
fn euler_advect(field: &dyn FieldSource, t: f64, dt: f64, p: &Particle) -> StepOutcome {
    let (u, v, omega) = match field.get_velocity(t, p) {
        Ok(v) => v,
        Err(e) => return StepOutcome::Fault(e),
    };
    StepOutcome::Ok(Delta {
        dx: dt * u,
        dy: dt * v,
        dz: dt * omega,
    })
}

/// Visser's well-mixed-condition-consistent vertical random walk:
/// `dz = k'(z) dt + R sqrt(2 k(z*) dt / r)`, `z* = z + 0.5 k'(z) dt`,
/// `R ~ Uniform(-1,1)`, `r = 1/3`. Evaluating diffusivity at the
/// advectively-corrected midpoint `z*` rather than at `z` itself is what
/// keeps a uniformly seeded particle ensemble uniform at equilibrium.
fn visser_vertical_random_walk(
    field: &dyn FieldSource,
    t: f64,
    dt: f64,
    p: &Particle,
    draw: DrawId,
) -> StepOutcome {
    let k_prime = match field.get_vertical_eddy_diffusivity_derivative(t, p) {
        Ok(v) => v,
        Err(e) => return StepOutcome::Fault(e),
    };

    let zmin = field.get_zmin(t, p);
    let zmax = field.get_zmax(t, p);
    let mut probe = p.clone();
    probe.x3 = crate::boundary::reflect_vertical(p.x3 + 0.5 * k_prime * dt, zmin, zmax);
    let k_mid = match field.get_vertical_eddy_diffusivity(t, &probe) {
        Ok(v) => v,
        Err(e) => return StepOutcome::Fault(e),
    };

    let variance_term = (2.0 * k_mid.max(0.0) * dt / R_NORMALIZER).sqrt();
    let dz = k_prime * dt + draw.uniform_symmetric() * variance_term;
    StepOutcome::Ok(Delta {
        dx: 0.0,
        dy: 0.0,
        dz,
    })
}

/// The textbook vertical random walk without Visser's drift-correction
/// term: `dz = R sqrt(2 k(z) dt / r)`. Kept so the well-mixed-condition
/// test (§8) has a method that is expected to *fail* it, as a control
/// against the Visser walk.
fn naive_vertical_random_walk(
    field: &dyn FieldSource,
    t: f64,
    dt: f64,
    p: &Particle,
    draw: DrawId,
) -> StepOutcome {
    let k_here = match field.get_vertical_eddy_diffusivity(t, p) {
        Ok(v) => v,
        Err(e) => return StepOutcome::Fault(e),
    };
    let variance_term = (2.0 * k_here.max(0.0) * dt / R_NORMALIZER).sqrt();
    let dz = draw.uniform_symmetric() * variance_term;
    StepOutcome::Ok(Delta {
        dx: 0.0,
        dy: 0.0,
        dz,
    })
}

/// Isotropic 2D horizontal random walk: independent draws for each
/// component, `d{x,y} = R sqrt(2 A_h dt / r)`.
fn horizontal_random_walk_2d(
    field: &dyn FieldSource,
    t: f64,
    dt: f64,
    p: &Particle,
    draw: DrawId,
) -> StepOutcome {
    let a_h = match field.get_horizontal_eddy_viscosity(t, p) {
        Ok(v) => v,
        Err(e) => return StepOutcome::Fault(e),
    };
    let (da_dx, da_dy) = match field.get_horizontal_eddy_viscosity_gradient(t, p) {
        Ok(v) => v,
        Err(e) => return StepOutcome::Fault(e),
    };
    let variance_term = (2.0 * a_h.max(0.0) * dt / R_NORMALIZER).sqrt();
    let draw_x = draw;
    let draw_y = DrawId {
        substep: draw.substep + 1,
        ..draw
    };
    let dx = da_dx * dt + draw_x.uniform_symmetric() * variance_term;
    let dy = da_dy * dt + draw_y.uniform_symmetric() * variance_term;
    StepOutcome::Ok(Delta {
        dx,
        dy,
        dz: 0.0,
    })
}
