//! Shared fixtures for the analytic-scenario integration tests (the suite
//! spec'd out in the testable-properties section): a single oversized
//! triangle so short trajectories never leave their host element, plus two
//! hand-rolled `FieldSource` implementations that skip the mesh-sampler
//! machinery entirely and answer the ODE and well-mixed-condition test
//! velocity/diffusivity profiles directly as closed-form functions of
//! particle state. Exercising `ItMethod`/`NumMethod`/`Driver` against a
//! `FieldSource` written by hand (rather than `MeshFieldSampler`) keeps
//! these tests honest about what they are checking: the integrator's
//! numerics, not the interpolation kernels (which have their own unit
//! tests under `src/field.rs` and `src/interp.rs`).

use particle_track_core::error::CoreError;
use particle_track_core::mesh::Mesh;
use particle_track_core::particle::Particle;
use particle_track_core::FieldSource;

/// One triangle covering `[-1e5, 1e5]^2`: one land edge, two open. Large
/// enough that no trajectory in these tests ever needs a second element;
/// at most one land edge keeps the two-land-boundary rule (mesh.rs) from
/// rejecting the particle's own starting host.
pub fn huge_flat_mesh() -> Mesh {
    let nv = vec![[0, 1, 2]];
    let nbe = vec![[-1, -2, -2]];
    let x = vec![-1.0e5, 1.0e5, -1.0e5];
    let y = vec![-1.0e5, -1.0e5, 1.0e5];
    Mesh::new(
        nv,
        nbe,
        x,
        y,
        vec![vec![0.0; 3], vec![-1.0; 3]],
        vec![vec![-0.5; 3]],
        vec![1.0e6; 3],
        vec![[0.0; 4]],
        vec![[0.0; 4]],
    )
}

/// `get_velocity(t, p) = (p.x1, 1.5 * p.x2, 0)`: the linear ODE system
/// `dx/dt = x, dy/dt = 1.5y` used to check RK4 against its analytic
/// solution `x(t) = x0 e^t, y(t) = y0 e^{1.5t}`.
pub struct LinearOdeSource {
    mesh: Mesh,
}

impl LinearOdeSource {
    pub fn new() -> Self {
        LinearOdeSource { mesh: huge_flat_mesh() }
    }
}

impl FieldSource for LinearOdeSource {
    fn read_data(&mut self, _t: f64) -> Result<(), CoreError> {
        Ok(())
    }

    fn set_local_coordinates(&self, p: &mut Particle) -> Result<(), CoreError> {
        match self.mesh.find_host_local(p.host, p.x1, p.x2, 8) {
            particle_track_core::mesh::HostSearchOutcome::Found { host, phi } => {
                p.host = host;
                p.phi = phi;
                Ok(())
            }
            _ => Err(CoreError::SearchFail { particle_id: p.id, steps: 8 }),
        }
    }

    fn get_velocity(&self, _t: f64, p: &Particle) -> Result<(f64, f64, f64), CoreError> {
        Ok((p.x1, 1.5 * p.x2, 0.0))
    }

    fn get_vertical_eddy_diffusivity(&self, _t: f64, _p: &Particle) -> Result<f64, CoreError> {
        Ok(0.0)
    }

    fn get_vertical_eddy_diffusivity_derivative(
        &self,
        _t: f64,
        _p: &Particle,
    ) -> Result<f64, CoreError> {
        Ok(0.0)
    }

    fn get_horizontal_eddy_viscosity(&self, _t: f64, _p: &Particle) -> Result<f64, CoreError> {
        Ok(0.0)
    }

    fn get_horizontal_eddy_viscosity_gradient(
        &self,
        _t: f64,
        _p: &Particle,
    ) -> Result<(f64, f64), CoreError> {
        Ok((0.0, 0.0))
    }

    fn get_zmin(&self, _t: f64, _p: &Particle) -> f64 {
        -1.0
    }

    fn get_zmax(&self, _t: f64, _p: &Particle) -> f64 {
        0.0
    }

    fn get_bathymetry(&self, _p: &Particle) -> f64 {
        1.0e6
    }

    fn get_sea_sur_elev(&self, _t: f64, _p: &Particle) -> f64 {
        0.0
    }

    fn is_wet(&self, _host: usize) -> bool {
        true
    }

    fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}

/// The degree-6 diffusivity profile from the well-mixed-condition test
/// (spec'd on `z in [0, 40]`, cartesian metres, increasing downward from
/// the surface at `z=0`): `k(z) = 0.001 + 0.0136245z - 0.00263245z^2 +
/// 2.11875e-4 z^3 - 8.65898e-6 z^4 + 1.7623e-7 z^5 - 1.40918e-9 z^6`. The
/// particle's `x3` is treated as this cartesian `z` directly (not sigma) —
/// `get_zmin`/`get_zmax` bound it to `[0, 40]` and the reflecting boundary
/// calculator keeps it there.
pub fn visser_profile_k(z: f64) -> f64 {
    0.001 + 0.0136245 * z - 0.00263245 * z.powi(2) + 2.11875e-4 * z.powi(3)
        - 8.65898e-6 * z.powi(4)
        + 1.7623e-7 * z.powi(5)
        - 1.40918e-9 * z.powi(6)
}

/// Central-difference derivative of [`visser_profile_k`], step `1e-4`,
/// used as the ground truth `k'(z)` the well-mixed test's `FieldSource`
/// reports (closed-form enough that its own discretisation error is
/// negligible next to the one the Visser scheme is being checked for).
pub fn visser_profile_k_prime(z: f64) -> f64 {
    const H: f64 = 1e-4;
    (visser_profile_k(z + H) - visser_profile_k(z - H)) / (2.0 * H)
}

/// A one-element "mesh" whose only job is to let `set_local_coordinates`
/// succeed; horizontal position is irrelevant to the well-mixed test, only
/// `x3` (depth) evolves.
pub struct WellMixedSource {
    mesh: Mesh,
}

impl WellMixedSource {
    pub fn new() -> Self {
        WellMixedSource { mesh: huge_flat_mesh() }
    }
}

impl FieldSource for WellMixedSource {
    fn read_data(&mut self, _t: f64) -> Result<(), CoreError> {
        Ok(())
    }

    fn set_local_coordinates(&self, p: &mut Particle) -> Result<(), CoreError> {
        match self.mesh.find_host_local(p.host, p.x1, p.x2, 8) {
            particle_track_core::mesh::HostSearchOutcome::Found { host, phi } => {
                p.host = host;
                p.phi = phi;
                Ok(())
            }
            _ => Err(CoreError::SearchFail { particle_id: p.id, steps: 8 }),
        }
    }

    fn get_velocity(&self, _t: f64, _p: &Particle) -> Result<(f64, f64, f64), CoreError> {
        Ok((0.0, 0.0, 0.0))
    }

    fn get_vertical_eddy_diffusivity(&self, _t: f64, p: &Particle) -> Result<f64, CoreError> {
        Ok(visser_profile_k(p.x3))
    }

    fn get_vertical_eddy_diffusivity_derivative(
        &self,
        _t: f64,
        p: &Particle,
    ) -> Result<f64, CoreError> {
        Ok(visser_profile_k_prime(p.x3))
    }

    fn get_horizontal_eddy_viscosity(&self, _t: f64, _p: &Particle) -> Result<f64, CoreError> {
        Ok(0.0)
    }

    fn get_horizontal_eddy_viscosity_gradient(
        &self,
        _t: f64,
        _p: &Particle,
    ) -> Result<(f64, f64), CoreError> {
        Ok((0.0, 0.0))
    }

    fn get_zmin(&self, _t: f64, _p: &Particle) -> f64 {
        0.0
    }

    fn get_zmax(&self, _t: f64, _p: &Particle) -> f64 {
        40.0
    }

    fn get_bathymetry(&self, _p: &Particle) -> f64 {
        40.0
    }

    fn get_sea_sur_elev(&self, _t: f64, _p: &Particle) -> f64 {
        0.0
    }

    fn is_wet(&self, _host: usize) -> bool {
        true
    }

    fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}
