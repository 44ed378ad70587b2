//! The model driver: owns the particle array and the field source, and
//! advances every active particle by one timestep per `step` call (§2, §5).
//!
//! The driver is deliberately thin. It resolves the numerical method and
//! boundary calculators once from `Config` (§9), then for each step:
//! refreshes the field snapshots, advances every particle through
//! `NumMethod::step`, resolves any boundary crossing against the
//! configured calculators (bounded by `max_bc_iters`), and commits the
//! result. `step_particles_with` is the seam a caller uses to parallelize
//! that middle phase — the driver itself stays oblivious to whether the
//! fan-out is serial, a thread pool, or `rayon`.

use crate::boundary::{HorizBoundaryCalculator, VertBoundaryCalculator, VerticalOutcome};
use crate::config::Config;
use crate::error::{CoreError, CrossedBoundary};
use crate::field::FieldSource;
use crate::itmethod::StepOutcome;
use crate::mesh::Mesh;
use crate::nummethod::NumMethod;
use crate::particle::{Delta, Particle, ParticleStatus};

/// Everything a single particle's step needs, bundled so an external
/// executor can share one immutable context across a parallel fan-out.
/// Every field is a shared reference to `Sync` data; `StepContext` itself
/// is `Sync` as long as `F: FieldSource + Sync`.
pub struct StepContext<'a> {
    pub field: &'a dyn FieldSource,
    pub num_method: &'a NumMethod,
    pub horiz_bc: &'a HorizBoundaryCalculator,
    pub vert_bc: &'a VertBoundaryCalculator,
    pub config: &'a Config,
    pub t: f64,
    pub step_index: u64,
}

enum CommitFailure {
    ExitedOpenBoundary,
    SearchFail,
    Fault(CoreError),
}

/// Repeatedly resolve a tentative horizontal position against
/// `set_local_coordinates`, applying the horizontal boundary calculator on
/// every land crossing, up to `config.max_bc_iters` attempts. An open
/// crossing is never retried — the particle has left the domain.
fn commit_horizontal(
    ctx: &StepContext,
    p: &mut Particle,
    old_xy: (f64, f64),
    old_host: usize,
) -> Result<(), CommitFailure> {
    for _ in 0..ctx.config.max_bc_iters.max(1) {
        match ctx.field.set_local_coordinates(p) {
            Ok(()) => return Ok(()),
            Err(CoreError::BoundaryCrossed {
                boundary: CrossedBoundary::Open,
                ..
            }) => return Err(CommitFailure::ExitedOpenBoundary),
            Err(CoreError::BoundaryCrossed {
                boundary: CrossedBoundary::Land,
                ..
            }) => {
                let corrected =
                    ctx.horiz_bc
                        .resolve(ctx.field.mesh(), old_host, old_xy, (p.x1, p.x2));
                p.x1 = corrected.0;
                p.x2 = corrected.1;
            }
            Err(CoreError::SearchFail { .. }) => return Err(CommitFailure::SearchFail),
            Err(e) => return Err(CommitFailure::Fault(e)),
        }
    }
    Err(CommitFailure::SearchFail)
}

/// Advance one particle through one driver timestep: run the resolved
/// `NumMethod`, resolve the resulting displacement against both boundary
/// calculators, and commit the new state. Left status unchanged (and
/// returns immediately) for particles that are no longer `Active`.
pub fn advance_particle(ctx: &StepContext, p: &mut Particle) {
    if p.status == ParticleStatus::Beached {
        if ctx.config.simulation.allow_beaching && ctx.field.is_wet(p.host) {
            p.status = ParticleStatus::Active;
            p.is_beached = false;
        } else {
            return;
        }
    }
    if !p.is_active() {
        return;
    }

    let old_xy = (p.x1, p.x2);
    let old_host = p.host;
    let old_z = p.x3;

    let outcome = ctx.num_method.step(
        ctx.field,
        ctx.t,
        ctx.config.simulation.time_step_s,
        p,
        ctx.config.rng_seed,
        ctx.step_index,
    );

    let delta = match outcome {
        StepOutcome::Ok(delta) => delta,
        // A land crossing is a coast, not an exit (§4.D.4: ACTIVE ->
        // LAND_PENDING -> run horizontal BC, never terminal). The probe
        // that hit land never produced a displacement, so the particle
        // simply holds position this step; it still runs through the
        // horizontal-commit path below (with a zero delta that path's
        // `set_local_coordinates` trivially re-validates), the same BC
        // machinery a final-position land crossing would use.
        StepOutcome::LandHit => {
            if ctx.config.general.full_logging {
                tracing::debug!(
                    particle_id = p.id,
                    "intermediate stage probe grazed land; holding position this step"
                );
            }
            Delta::ZERO
        }
        StepOutcome::OpenHit => {
            tracing::warn!(
                particle_id = p.id,
                "intermediate stage probe exited through an open boundary"
            );
            p.status = ParticleStatus::OutOfDomain;
            return;
        }
        StepOutcome::Fault(e) => {
            tracing::warn!(particle_id = p.id, error = %e, "numerical fault, marking particle out of domain");
            p.status = ParticleStatus::OutOfDomain;
            return;
        }
    };

    p.x1 = old_xy.0 + delta.dx;
    p.x2 = old_xy.1 + delta.dy;
    p.x3 = old_z + delta.dz;

    match commit_horizontal(ctx, p, old_xy, old_host) {
        Ok(()) => {}
        Err(CommitFailure::ExitedOpenBoundary) => {
            if ctx.config.general.full_logging {
                tracing::debug!(particle_id = p.id, "exited through an open boundary");
            }
            p.status = ParticleStatus::OutOfDomain;
            return;
        }
        Err(CommitFailure::SearchFail) => {
            tracing::warn!(particle_id = p.id, "host search did not converge; marking particle out of domain");
            p.status = ParticleStatus::OutOfDomain;
            return;
        }
        Err(CommitFailure::Fault(e)) => {
            tracing::warn!(particle_id = p.id, error = %e, "field fault while committing position");
            p.status = ParticleStatus::OutOfDomain;
            return;
        }
    }

    if ctx.config.simulation.allow_beaching && !ctx.field.is_wet(p.host) {
        if ctx.config.general.full_logging {
            tracing::debug!(particle_id = p.id, "landed in a dry element; beaching");
        }
        p.status = ParticleStatus::Beached;
        p.is_beached = true;
        return;
    }

    if ctx.config.simulation.surface_only
        || ctx.config.simulation.depth_restoring
        || ctx.config.simulation.height_restoring
    {
        apply_vertical_restoring(ctx, p);
        return;
    }

    let zmin = ctx.field.get_zmin(ctx.t, p);
    let zmax = ctx.field.get_zmax(ctx.t, p);
    match ctx.vert_bc.resolve(p.x3, zmin, zmax) {
        VerticalOutcome::Value(z) => {
            p.x3 = z;
            if ctx.field.set_local_coordinates(p).is_err() {
                tracing::warn!(particle_id = p.id, "failed to relocate after vertical boundary correction");
                p.status = ParticleStatus::OutOfDomain;
            }
        }
        VerticalOutcome::Absorbed => {
            p.status = ParticleStatus::Absorbed;
        }
    }
}

/// `SIMULATION.surface_only` / `depth_restoring` / `height_restoring`
/// override the vertical component of the step entirely: rather than
/// letting advection and diffusion carry the particle through the water
/// column, the committed position is pinned to a single cartesian depth
/// every step (at the surface, at a fixed depth below it, or at a fixed
/// height above the bed), converted back to the sigma coordinate the
/// particle tracks internally via `sigma = (z - zeta) / (h + zeta)`.
/// `Config::validate` guarantees at most one of the three is set.
fn apply_vertical_restoring(ctx: &StepContext, p: &mut Particle) {
    let sim = &ctx.config.simulation;
    let h = ctx.field.get_bathymetry(p);
    let zeta = ctx.field.get_sea_sur_elev(ctx.t, p);

    let target_z = if sim.surface_only {
        zeta
    } else if sim.depth_restoring {
        sim.fixed_depth_m
    } else {
        sim.fixed_height_m - h
    };

    let denom = h + zeta;
    let sigma = if denom.abs() <= f64::EPSILON {
        0.0
    } else {
        ((target_z - zeta) / denom).clamp(-1.0, 0.0)
    };
    p.x3 = sigma;

    if ctx.field.set_local_coordinates(p).is_err() {
        tracing::warn!(particle_id = p.id, "failed to relocate after vertical restoring");
        p.status = ParticleStatus::OutOfDomain;
    }
}

/// Owns the particle array, the field source, and the resolved numerical
/// method / boundary calculators. Generic over the concrete `FieldSource`
/// so a caller can plug in any adapter without the core depending on it.
pub struct Driver<F: FieldSource> {
    field: F,
    particles: Vec<Particle>,
    num_method: NumMethod,
    horiz_bc: HorizBoundaryCalculator,
    vert_bc: VertBoundaryCalculator,
    config: Config,
    step_index: u64,
}

impl<F: FieldSource> Driver<F> {
    pub fn new(field: F, mut particles: Vec<Particle>, config: Config) -> Result<Self, CoreError> {
        config.validate()?;
        for p in &mut particles {
            field.set_local_coordinates(p)?;
        }
        let horiz_bc = HorizBoundaryCalculator::from_config(config.boundary_conditions.horiz_bound_cond);
        let num_method = NumMethod::from_config(&config.numerics, horiz_bc, config.max_bc_iters);
        let vert_bc = VertBoundaryCalculator::from_config(config.boundary_conditions.vert_bound_cond);
        Ok(Driver {
            field,
            particles,
            num_method,
            horiz_bc,
            vert_bc,
            config,
            step_index: 0,
        })
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn mesh(&self) -> &Mesh {
        self.field.mesh()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Default serial fan-out: refresh the field snapshots for `t`, then
    /// advance every active particle in place.
    pub fn step(&mut self, t: f64) -> Result<(), CoreError> {
        self.step_particles_with(t, |ctx, particles| {
            for p in particles {
                advance_particle(ctx, p);
            }
        })
    }

    /// Same as `step`, but the per-particle fan-out is delegated to `exec`
    /// (e.g. `particles.par_iter_mut().for_each(|p| advance_particle(ctx,
    /// p))` behind a `rayon` feature in a calling binary). `exec` receives
    /// the prepared context and the full particle slice so it can choose
    /// serial, threaded, or `rayon` iteration; the driver does not care
    /// which. The context is built here from disjoint field borrows
    /// (`&self.field`, `&self.num_method`, ...) specifically so it can be
    /// held alongside `&mut self.particles` in the same call.
    pub fn step_particles_with<Exec>(&mut self, t: f64, exec: Exec) -> Result<(), CoreError>
    where
        Exec: FnOnce(&StepContext, &mut [Particle]),
    {
        self.field.read_data(t)?;
        let ctx = StepContext {
            field: &self.field,
            num_method: &self.num_method,
            horiz_bc: &self.horiz_bc,
            vert_bc: &self.vert_bc,
            config: &self.config,
            t,
            step_index: self.step_index,
        };
        exec(&ctx, &mut self.particles);
        self.step_index += 1;
        Ok(())
    }
}
