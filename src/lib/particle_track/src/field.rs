//! The field sampler: binds mesh topology to time-indexed field snapshots
//! and answers the velocity/diffusivity/viscosity/elevation queries the
//! iterative methods need.
//!
//! The `FieldSource` trait is the external interface (§6): format adapters
//! (FVCOM, GOTM, ROMS, Arakawa-A) are out of scope for this crate and
//! would implement it by reading their own file formats. `MeshFieldSampler`
//! is the core's own implementation, driven by in-memory snapshot arrays
//! handed to it through the `SnapshotSource` trait (the seam where an
//! out-of-scope file reader plugs in) — the interpolation arithmetic it
//! performs (LLS-in-triangle, bilinear-in-time, linear-in-sigma) *is* part
//! of the core.
//!
//! Vertical position is tracked internally in sigma coordinates (`x3 in
//! [-1, 0]`) regardless of `SimulationConfig::depth_coordinates` — sigma is
//! the "by convention" representation named in the data model. Cartesian
//! depth is a presentation concern: `sigma_to_z` converts a sigma value to
//! metres for diagnostics when the caller asked for cartesian output. This
//! keeps every iterative method and boundary calculator working in one
//! consistent unit without needing a time-interpolated sea-surface
//! elevation inside the hot per-stage relocate path.

use crate::config::DepthCoordinates;
use crate::error::{CoreError, CrossedBoundary, RangeKind};
use crate::interp::{
    barycentric_interpolate, linear_triangle_gradient, locate_sigma, lls_horizontal,
    sigma_interpolate, temporal_alpha,
};
use crate::mesh::{EdgeNeighbor, Mesh, N_NEIGH_ELEMS};
use crate::particle::Particle;

/// A vertically layered/leveled scalar field, `values[k][spatial_index]`.
#[derive(Debug, Clone)]
pub struct LayeredField {
    pub values: Vec<Vec<f64>>,
}

impl LayeredField {
    pub fn new(values: Vec<Vec<f64>>) -> Self {
        LayeredField { values }
    }

    pub fn n_layers(&self) -> usize {
        self.values.len()
    }

    fn at(&self, k: usize, idx: usize) -> f64 {
        self.values[k][idx]
    }
}

/// One bracketing pair of field snapshots plus the time window they cover.
/// `u, v` are element-centred on `siglay`; `omega, k_h` are node-centred on
/// `siglev`; `a_h` is node-centred on `siglay`; `zeta` and `wet_mask` are
/// nodal / element flat arrays. Every field carries both the `last` and
/// `next` buffer so `get_velocity` et al. can interpolate within the window
/// `[t_last, t_next)`; all fields share one window rather than each
/// tracking its own, matching how a single source file frame updates every
/// variable at once.
pub struct RawFieldBracket {
    pub t_last: f64,
    pub t_next: f64,
    pub u_last: LayeredField,
    pub u_next: LayeredField,
    pub v_last: LayeredField,
    pub v_next: LayeredField,
    pub omega_last: LayeredField,
    pub omega_next: LayeredField,
    pub k_h_last: LayeredField,
    pub k_h_next: LayeredField,
    pub a_h_last: LayeredField,
    pub a_h_next: LayeredField,
    pub zeta_last: Vec<f64>,
    pub zeta_next: Vec<f64>,
    pub wet_mask: Vec<bool>,
}

/// The out-of-scope seam: something that can hand the sampler the next
/// bracketing pair of snapshots for a requested time. A real adapter reads
/// this from an FVCOM/GOTM/ROMS/A-grid file; for tests it is an in-memory
/// generator.
pub trait SnapshotSource: Sync {
    fn next_bracket(&mut self, t: f64) -> Result<RawFieldBracket, CoreError>;
}

/// The external interface between the tracking core and any time/field
/// I/O layer (§6). All particle-facing queries take a `&Particle` that has
/// already had `set_local_coordinates` run on it.
pub trait FieldSource: Sync {
    fn read_data(&mut self, t: f64) -> Result<(), CoreError>;
    fn set_local_coordinates(&self, p: &mut Particle) -> Result<(), CoreError>;
    fn get_velocity(&self, t: f64, p: &Particle) -> Result<(f64, f64, f64), CoreError>;
    fn get_vertical_eddy_diffusivity(&self, t: f64, p: &Particle) -> Result<f64, CoreError>;
    fn get_vertical_eddy_diffusivity_derivative(
        &self,
        t: f64,
        p: &Particle,
    ) -> Result<f64, CoreError>;
    fn get_horizontal_eddy_viscosity(&self, t: f64, p: &Particle) -> Result<f64, CoreError>;
    fn get_horizontal_eddy_viscosity_gradient(
        &self,
        t: f64,
        p: &Particle,
    ) -> Result<(f64, f64), CoreError>;
    fn get_zmin(&self, t: f64, p: &Particle) -> f64;
    fn get_zmax(&self, t: f64, p: &Particle) -> f64;
    fn get_bathymetry(&self, p: &Particle) -> f64;
    fn get_sea_sur_elev(&self, t: f64, p: &Particle) -> f64;
    fn is_wet(&self, host: usize) -> bool;
    fn mesh(&self) -> &Mesh;
}

/// The core's reference `FieldSource` implementation: a mesh plus the
/// current bracketing snapshot pair, fed by a `SnapshotSource`.
pub struct MeshFieldSampler<S: SnapshotSource> {
    mesh: Mesh,
    source: S,
    bracket: RawFieldBracket,
    max_walk_steps: usize,
    depth_coordinates: DepthCoordinates,
}

impl<S: SnapshotSource> MeshFieldSampler<S> {
    pub fn new(
        mesh: Mesh,
        mut source: S,
        t0: f64,
        max_walk_steps: usize,
        depth_coordinates: DepthCoordinates,
    ) -> Result<Self, CoreError> {
        let bracket = source.next_bracket(t0)?;
        Ok(MeshFieldSampler {
            mesh,
            source,
            bracket,
            max_walk_steps,
            depth_coordinates,
        })
    }

    fn covers(&self, t: f64) -> bool {
        t >= self.bracket.t_last && t < self.bracket.t_next
    }

    /// Convert an internally tracked sigma position to metres, for
    /// diagnostics when `depth_coordinates == Cartesian`.
    pub fn sigma_to_z(&self, t: f64, p: &Particle, sigma: f64) -> f64 {
        match self.depth_coordinates {
            DepthCoordinates::Sigma => sigma,
            DepthCoordinates::Cartesian => {
                let h = self.get_bathymetry(p);
                let zeta = self.get_sea_sur_elev(t, p);
                sigma * (h + zeta) + zeta
            }
        }
    }

    fn is_boundary_elem(&self, elem: usize) -> bool {
        (0..3).any(|edge| !matches!(self.mesh.neighbor(elem, edge), EdgeNeighbor::Element(_)))
    }

    /// The host plus its three edge neighbours, in the order the LLS
    /// coefficients expect (`a1u[0]`/`a2u[0]` belong to the host itself).
    fn neighbor_elems(&self, host: usize) -> [usize; N_NEIGH_ELEMS] {
        let mut out = [host; N_NEIGH_ELEMS];
        for edge in 0..3 {
            out[edge + 1] = match self.mesh.neighbor(host, edge) {
                EdgeNeighbor::Element(n) => n,
                _ => host, // unused: is_boundary_elem short-circuits lls_horizontal to u[0]
            };
        }
        out
    }

    fn time_interp(&self, last: f64, next: f64, alpha: f64) -> f64 {
        last + alpha * (next - last)
    }

    fn lls_at_layer(
        &self,
        field_last: &LayeredField,
        field_next: &LayeredField,
        k: usize,
        host: usize,
        alpha: f64,
        dx: f64,
        dy: f64,
    ) -> f64 {
        let neighbors = self.neighbor_elems(host);
        let mut u = [0.0; N_NEIGH_ELEMS];
        for (slot, &elem) in neighbors.iter().enumerate() {
            u[slot] = self.time_interp(field_last.at(k, elem), field_next.at(k, elem), alpha);
        }
        let (a1u, a2u) = self.mesh.lls_weights(host);
        lls_horizontal(u, a1u, a2u, dx, dy, self.is_boundary_elem(host))
    }

    /// Apply the §7 `OutOfRange(time)` policy to a raw `temporal_alpha`
    /// result instead of silently discarding it: a fraction outside `[0,1)`
    /// means `read_data` was never refreshed for this `t`, which is a
    /// caller bug worth panicking on in debug builds (`debug_assert!` is a
    /// no-op in release) and a logged, clamped anomaly otherwise — the
    /// policy says this should not abort a production run over one
    /// interpolation.
    fn checked_temporal_alpha(&self, t: f64) -> f64 {
        let (alpha, err) = temporal_alpha(t, self.bracket.t_last, self.bracket.t_next);
        if let Some(e) = err {
            debug_assert!(false, "{e}");
            tracing::warn!(
                t,
                t_last = self.bracket.t_last,
                t_next = self.bracket.t_next,
                error = %e,
                "time interpolation fraction out of range; using clamped value"
            );
        }
        alpha
    }

    fn nodal_triangle_value(
        &self,
        field_last: &LayeredField,
        field_next: &LayeredField,
        k: usize,
        nodes: [usize; 3],
        alpha: f64,
        phi: [f64; 3],
    ) -> f64 {
        let mut vals = [0.0; 3];
        for (i, &node) in nodes.iter().enumerate() {
            vals[i] = self.time_interp(field_last.at(k, node), field_next.at(k, node), alpha);
        }
        barycentric_interpolate(vals, phi)
    }
}

impl<S: SnapshotSource> FieldSource for MeshFieldSampler<S> {
    fn read_data(&mut self, t: f64) -> Result<(), CoreError> {
        if self.covers(t) {
            return Ok(());
        }
        let fresh = self.source.next_bracket(t)?;
        // Atomic swap: particles reading mid-refresh either see the old
        // bracket in full or the new one in full, never a mix.
        self.bracket = fresh;
        Ok(())
    }

    fn set_local_coordinates(&self, p: &mut Particle) -> Result<(), CoreError> {
        use crate::mesh::HostSearchOutcome;

        let outcome = self
            .mesh
            .find_host_local(p.host, p.x1, p.x2, self.max_walk_steps);
        let (host, phi) = match outcome {
            HostSearchOutcome::Found { host, phi } => (host, phi),
            HostSearchOutcome::LandCross => {
                return Err(CoreError::BoundaryCrossed {
                    particle_id: p.id,
                    boundary: CrossedBoundary::Land,
                })
            }
            HostSearchOutcome::OpenCross => {
                return Err(CoreError::BoundaryCrossed {
                    particle_id: p.id,
                    boundary: CrossedBoundary::Open,
                })
            }
            HostSearchOutcome::SearchFail => match self.mesh.find_host_global(p.x1, p.x2) {
                HostSearchOutcome::Found { host, phi } => (host, phi),
                _ => {
                    return Err(CoreError::SearchFail {
                        particle_id: p.id,
                        steps: self.max_walk_steps,
                    })
                }
            },
        };
        p.host = host;
        p.phi = phi;

        let [n0, n1, n2] = self.mesh.nodes_of(host);
        let layer_sigma: Vec<f64> = (0..self.mesh.siglay().len())
            .map(|k| {
                barycentric_interpolate(
                    [
                        self.mesh.siglay()[k][n0],
                        self.mesh.siglay()[k][n1],
                        self.mesh.siglay()[k][n2],
                    ],
                    phi,
                )
            })
            .collect();
        let level_sigma: Vec<f64> = (0..self.mesh.siglev().len())
            .map(|k| {
                barycentric_interpolate(
                    [
                        self.mesh.siglev()[k][n0],
                        self.mesh.siglev()[k][n1],
                        self.mesh.siglev()[k][n2],
                    ],
                    phi,
                )
            })
            .collect();

        p.layer_loc = locate_sigma(p.x3, &layer_sigma);
        p.level_loc = locate_sigma(p.x3, &level_sigma);
        p.in_vertical_boundary_layer = p.layer_loc.in_boundary_layer || p.level_loc.in_boundary_layer;
        Ok(())
    }

    fn get_velocity(&self, t: f64, p: &Particle) -> Result<(f64, f64, f64), CoreError> {
        let alpha = self.checked_temporal_alpha(t);
        let (xc, yc) = self.mesh.centroid(p.host);
        let (dx, dy) = (p.x1 - xc, p.x2 - yc);

        let u_upper = self.lls_at_layer(&self.bracket.u_last, &self.bracket.u_next, p.layer_loc.k_upper, p.host, alpha, dx, dy);
        let u_lower = self.lls_at_layer(&self.bracket.u_last, &self.bracket.u_next, p.layer_loc.k_lower, p.host, alpha, dx, dy);
        let v_upper = self.lls_at_layer(&self.bracket.v_last, &self.bracket.v_next, p.layer_loc.k_upper, p.host, alpha, dx, dy);
        let v_lower = self.lls_at_layer(&self.bracket.v_last, &self.bracket.v_next, p.layer_loc.k_lower, p.host, alpha, dx, dy);
        let u = sigma_interpolate(p.layer_loc, u_lower, u_upper);
        let v = sigma_interpolate(p.layer_loc, v_lower, v_upper);

        let nodes = self.mesh.nodes_of(p.host);
        let omega_upper = self.nodal_triangle_value(&self.bracket.omega_last, &self.bracket.omega_next, p.level_loc.k_upper, nodes, alpha, p.phi);
        let omega_lower = self.nodal_triangle_value(&self.bracket.omega_last, &self.bracket.omega_next, p.level_loc.k_lower, nodes, alpha, p.phi);
        let omega_sigma = sigma_interpolate(p.level_loc, omega_lower, omega_upper);

        let h = self.get_bathymetry(p);
        let zeta = self.get_sea_sur_elev(t, p);
        let omega = omega_sigma * (h + zeta);

        Ok((u, v, omega))
    }

    fn get_vertical_eddy_diffusivity(&self, t: f64, p: &Particle) -> Result<f64, CoreError> {
        let alpha = self.checked_temporal_alpha(t);
        let nodes = self.mesh.nodes_of(p.host);
        let k_upper = self.nodal_triangle_value(&self.bracket.k_h_last, &self.bracket.k_h_next, p.level_loc.k_upper, nodes, alpha, p.phi);
        let k_lower = self.nodal_triangle_value(&self.bracket.k_h_last, &self.bracket.k_h_next, p.level_loc.k_lower, nodes, alpha, p.phi);
        let k_sigma = sigma_interpolate(p.level_loc, k_lower, k_upper);

        let h = self.get_bathymetry(p);
        let zeta = self.get_sea_sur_elev(t, p);
        let scale = (h + zeta).powi(2);
        if scale <= f64::EPSILON {
            return Ok(0.0);
        }
        Ok(k_sigma / scale)
    }

    fn get_vertical_eddy_diffusivity_derivative(&self, t: f64, p: &Particle) -> Result<f64, CoreError> {
        const DSIGMA: f64 = 1e-3;
        let zmax = self.get_zmax(t, p);
        let zmin = self.get_zmin(t, p);

        let (z_hi, z_lo, step) = if p.x3 + DSIGMA > zmax {
            (p.x3, p.x3 - DSIGMA, DSIGMA)
        } else if p.x3 - DSIGMA < zmin {
            (p.x3 + DSIGMA, p.x3, DSIGMA)
        } else {
            (p.x3 + DSIGMA, p.x3 - DSIGMA, 2.0 * DSIGMA)
        };

        let mut p_hi = p.clone();
        p_hi.x3 = z_hi;
        self.set_local_coordinates(&mut p_hi)?;
        let mut p_lo = p.clone();
        p_lo.x3 = z_lo;
        self.set_local_coordinates(&mut p_lo)?;

        let k_hi = self.get_vertical_eddy_diffusivity(t, &p_hi)?;
        let k_lo = self.get_vertical_eddy_diffusivity(t, &p_lo)?;
        Ok((k_hi - k_lo) / step)
    }

    fn get_horizontal_eddy_viscosity(&self, t: f64, p: &Particle) -> Result<f64, CoreError> {
        let alpha = self.checked_temporal_alpha(t);
        let nodes = self.mesh.nodes_of(p.host);
        let a_upper = self.nodal_triangle_value(&self.bracket.a_h_last, &self.bracket.a_h_next, p.layer_loc.k_upper, nodes, alpha, p.phi);
        let a_lower = self.nodal_triangle_value(&self.bracket.a_h_last, &self.bracket.a_h_next, p.layer_loc.k_lower, nodes, alpha, p.phi);
        Ok(sigma_interpolate(p.layer_loc, a_lower, a_upper))
    }

    fn get_horizontal_eddy_viscosity_gradient(&self, t: f64, p: &Particle) -> Result<(f64, f64), CoreError> {
        let alpha = self.checked_temporal_alpha(t);
        let nodes = self.mesh.nodes_of(p.host);
        let nodes_xy = [
            self.mesh.node_xy(nodes[0]),
            self.mesh.node_xy(nodes[1]),
            self.mesh.node_xy(nodes[2]),
        ];

        let grad_at = |k: usize| {
            let mut vals = [0.0; 3];
            for (i, &node) in nodes.iter().enumerate() {
                vals[i] = self.time_interp(
                    self.bracket.a_h_last.at(k, node),
                    self.bracket.a_h_next.at(k, node),
                    alpha,
                );
            }
            linear_triangle_gradient(vals, nodes_xy)
        };

        let (dx_upper, dy_upper) = grad_at(p.layer_loc.k_upper);
        let (dx_lower, dy_lower) = grad_at(p.layer_loc.k_lower);
        let dx = sigma_interpolate(p.layer_loc, dx_lower, dx_upper);
        let dy = sigma_interpolate(p.layer_loc, dy_lower, dy_upper);
        Ok((dx, dy))
    }

    fn get_zmin(&self, _t: f64, _p: &Particle) -> f64 {
        -1.0
    }

    fn get_zmax(&self, _t: f64, _p: &Particle) -> f64 {
        0.0
    }

    fn get_bathymetry(&self, p: &Particle) -> f64 {
        let [n0, n1, n2] = self.mesh.nodes_of(p.host);
        barycentric_interpolate(
            [
                self.mesh.bathymetry(n0),
                self.mesh.bathymetry(n1),
                self.mesh.bathymetry(n2),
            ],
            p.phi,
        )
    }

    fn get_sea_sur_elev(&self, t: f64, p: &Particle) -> f64 {
        let alpha = self.checked_temporal_alpha(t);
        let nodes = self.mesh.nodes_of(p.host);
        let mut vals = [0.0; 3];
        for (i, &node) in nodes.iter().enumerate() {
            vals[i] = self.time_interp(
                self.bracket.zeta_last[node],
                self.bracket.zeta_next[node],
                alpha,
            );
        }
        barycentric_interpolate(vals, p.phi)
    }

    fn is_wet(&self, host: usize) -> bool {
        self.bracket.wet_mask.get(host).copied().unwrap_or(true)
    }

    fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}

/// Helper so callers can report the `OutOfRange` error variant for sigma
/// fractions the same way `temporal_alpha` does for time.
pub fn sigma_out_of_range(value: f64) -> CoreError {
    CoreError::OutOfRange {
        kind: RangeKind::Sigma,
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;

    /// A host triangle plus three non-adjacent neighbour triangles, laid
    /// out so their centroids sit at `(0,0)`, `(3,0)`, `(0,3)`, `(-3,-3)`.
    /// `a1u`/`a2u` below are the least-squares weights for exactly that
    /// geometry (solved offline against the normal equations), so that an
    /// element field equal to `10 + x + 2y` at each centroid is
    /// reconstructed *exactly* by `lls_horizontal` anywhere inside the
    /// host triangle — this exercises the full `get_velocity` plumbing
    /// (neighbour gather order, `a1u`/`a2u` indexing, centroid offset)
    /// end to end rather than just the bare interpolation kernel.
    fn four_element_mesh() -> Mesh {
        let nv = vec![
            [0, 1, 2],
            [3, 4, 5],
            [6, 7, 8],
            [9, 10, 11],
        ];
        // Host (element 0) is interior: all three neighbours present.
        // The neighbours' own edges are never queried by get_velocity, so
        // their neighbour lists are arbitrary land edges.
        let nbe = vec![
            [1, 2, 3],
            [-1, -1, -1],
            [-1, -1, -1],
            [-1, -1, -1],
        ];
        let x = vec![
            -1.0, 2.0, -1.0, // host, centroid (0,0)
            2.0, 5.0, 2.0,   // neighbour 1, centroid (3,0)
            -1.0, 2.0, -1.0, // neighbour 2, centroid (0,3)
            -4.0, -1.0, -4.0, // neighbour 3, centroid (-3,-3)
        ];
        let y = vec![
            -1.0, -1.0, 2.0,
            -1.0, -1.0, 2.0,
            2.0, 2.0, 5.0,
            -4.0, -4.0, -1.0,
        ];
        let a1u = [0.0, 2.0 / 9.0, -1.0 / 9.0, -1.0 / 9.0];
        let a2u = [0.0, -1.0 / 9.0, 2.0 / 9.0, -1.0 / 9.0];
        Mesh::new(
            nv,
            nbe,
            x,
            y,
            vec![vec![0.0; 12], vec![-1.0; 12]],
            vec![vec![-0.5; 12]],
            vec![10.0; 12],
            vec![a1u, [0.0; 4], [0.0; 4], [0.0; 4]],
            vec![a2u, [0.0; 4], [0.0; 4], [0.0; 4]],
        )
    }

    fn constant_bracket(t_last: f64, t_next: f64, u: [f64; 4], v: [f64; 4]) -> RawFieldBracket {
        RawFieldBracket {
            t_last,
            t_next,
            u_last: LayeredField::new(vec![u.to_vec()]),
            u_next: LayeredField::new(vec![u.to_vec()]),
            v_last: LayeredField::new(vec![v.to_vec()]),
            v_next: LayeredField::new(vec![v.to_vec()]),
            omega_last: LayeredField::new(vec![vec![0.0; 12], vec![0.0; 12]]),
            omega_next: LayeredField::new(vec![vec![0.0; 12], vec![0.0; 12]]),
            k_h_last: LayeredField::new(vec![vec![0.0; 12], vec![0.0; 12]]),
            k_h_next: LayeredField::new(vec![vec![0.0; 12], vec![0.0; 12]]),
            a_h_last: LayeredField::new(vec![vec![0.0; 12]]),
            a_h_next: LayeredField::new(vec![vec![0.0; 12]]),
            zeta_last: vec![0.0; 12],
            zeta_next: vec![0.0; 12],
            wet_mask: vec![true; 4],
        }
    }

    struct FixedSource {
        bracket: Option<RawFieldBracket>,
        calls: std::cell::Cell<u32>,
    }

    impl SnapshotSource for FixedSource {
        fn next_bracket(&mut self, _t: f64) -> Result<RawFieldBracket, CoreError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.bracket.take().expect("next_bracket called more than once"))
        }
    }

    #[test]
    fn get_velocity_reproduces_exact_linear_field_via_lls() {
        // u(x,y) = 10 + x + 2y at the four centroids.
        let u = [10.0, 13.0, 16.0, 1.0];
        let v = [0.0; 4];
        let mesh = four_element_mesh();
        let source = FixedSource {
            bracket: Some(constant_bracket(-1.0, 1e6, u, v)),
            calls: std::cell::Cell::new(0),
        };
        let sampler =
            MeshFieldSampler::new(mesh, source, 0.0, 8, DepthCoordinates::Sigma).unwrap();

        let mut p = Particle::new(0, 0, 0.3, 0.2, -0.5);
        sampler.set_local_coordinates(&mut p).unwrap();
        assert_eq!(p.host, 0);

        let (u_val, _v_val, _omega) = sampler.get_velocity(0.0, &p).unwrap();
        let expected = 10.0 + 0.3 + 2.0 * 0.2;
        assert!((u_val - expected).abs() < 1e-9);
    }

    #[test]
    fn get_velocity_at_host_centroid_is_unaffected_by_lls_slope() {
        let u = [10.0, 13.0, 16.0, 1.0];
        let v = [0.0; 4];
        let mesh = four_element_mesh();
        let source = FixedSource {
            bracket: Some(constant_bracket(-1.0, 1e6, u, v)),
            calls: std::cell::Cell::new(0),
        };
        let sampler =
            MeshFieldSampler::new(mesh, source, 0.0, 8, DepthCoordinates::Sigma).unwrap();
        let mut p = Particle::new(0, 0, 0.0, 0.0, -0.5);
        sampler.set_local_coordinates(&mut p).unwrap();
        let (u_val, _, _) = sampler.get_velocity(0.0, &p).unwrap();
        assert!((u_val - 10.0).abs() < 1e-9);
    }

    #[test]
    fn read_data_is_noop_when_already_covered() {
        let mesh = four_element_mesh();
        let u = [1.0; 4];
        let v = [0.0; 4];
        let source = FixedSource {
            bracket: Some(constant_bracket(0.0, 10.0, u, v)),
            calls: std::cell::Cell::new(0),
        };
        let mut sampler =
            MeshFieldSampler::new(mesh, source, 0.0, 8, DepthCoordinates::Sigma).unwrap();
        // The constructor already consumed the one available bracket; a
        // second read_data within [0, 10) must not ask the source again
        // (FixedSource would panic on a second call).
        sampler.read_data(5.0).unwrap();
        sampler.read_data(9.9).unwrap();
    }

    #[test]
    fn vertical_eddy_diffusivity_derivative_matches_hand_computed_central_difference() {
        // k_h at levels [0, -1] varies linearly with sigma: k(sigma) = 3 + 4*sigma,
        // so dk/dsigma = 4 exactly and the central-difference derivative should
        // recover it (h + zeta = 1 here, so the metric scaling is the identity).
        let nv = vec![[0, 1, 2]];
        let nbe = vec![[-1, -2, -2]];
        let x = vec![-100.0, 100.0, -100.0];
        let y = vec![-100.0, -100.0, 100.0];
        let mesh = Mesh::new(
            nv,
            nbe,
            x,
            y,
            vec![vec![0.0; 3], vec![-1.0; 3]],
            vec![vec![-0.5; 3]],
            vec![1.0; 3], // h=1, zeta=0 => (h+zeta)^2 = 1, sigma-to-metric scaling is the identity
            vec![[0.0; 4]],
            vec![[0.0; 4]],
        );
        let k_at_level = |sigma: f64| 3.0 + 4.0 * sigma;
        let bracket = RawFieldBracket {
            t_last: -1.0,
            t_next: 1e6,
            u_last: LayeredField::new(vec![vec![0.0; 1]]),
            u_next: LayeredField::new(vec![vec![0.0; 1]]),
            v_last: LayeredField::new(vec![vec![0.0; 1]]),
            v_next: LayeredField::new(vec![vec![0.0; 1]]),
            omega_last: LayeredField::new(vec![vec![0.0; 3], vec![0.0; 3]]),
            omega_next: LayeredField::new(vec![vec![0.0; 3], vec![0.0; 3]]),
            k_h_last: LayeredField::new(vec![vec![k_at_level(0.0); 3], vec![k_at_level(-1.0); 3]]),
            k_h_next: LayeredField::new(vec![vec![k_at_level(0.0); 3], vec![k_at_level(-1.0); 3]]),
            a_h_last: LayeredField::new(vec![vec![0.0; 3]]),
            a_h_next: LayeredField::new(vec![vec![0.0; 3]]),
            zeta_last: vec![0.0; 3],
            zeta_next: vec![0.0; 3],
            wet_mask: vec![true; 1],
        };
        let source = FixedSource {
            bracket: Some(bracket),
            calls: std::cell::Cell::new(0),
        };
        let sampler =
            MeshFieldSampler::new(mesh, source, 0.0, 8, DepthCoordinates::Sigma).unwrap();
        let mut p = Particle::new(0, 0, 0.0, 0.0, -0.5);
        sampler.set_local_coordinates(&mut p).unwrap();

        let deriv = sampler.get_vertical_eddy_diffusivity_derivative(0.0, &p).unwrap();
        assert!((deriv - 4.0).abs() < 1e-6);
    }

    #[test]
    fn get_bathymetry_interpolates_nodal_values() {
        let nv = vec![[0, 1, 2]];
        let nbe = vec![[-1, -2, -2]];
        let x = vec![0.0, 3.0, 0.0];
        let y = vec![0.0, 0.0, 3.0];
        let mesh = Mesh::new(
            nv,
            nbe,
            x,
            y,
            vec![vec![0.0; 3], vec![-1.0; 3]],
            vec![vec![-0.5; 3]],
            vec![0.0, 9.0, 0.0],
            vec![[0.0; N_NEIGH_ELEMS]],
            vec![[0.0; N_NEIGH_ELEMS]],
        );
        let u = [0.0];
        let source = FixedSource {
            bracket: Some(constant_bracket(-1.0, 1e6, [u[0], 0.0, 0.0, 0.0], [0.0; 4])),
            calls: std::cell::Cell::new(0),
        };
        // centroid of the triangle is (1,1), with barycentric weights (1/3,1/3,1/3).
        let mesh_for_test = mesh;
        let sampler =
            MeshFieldSampler::new(mesh_for_test, source, 0.0, 8, DepthCoordinates::Sigma).unwrap();
        let mut p = Particle::new(0, 0, 1.0, 1.0, -0.5);
        sampler.set_local_coordinates(&mut p).unwrap();
        let h = sampler.get_bathymetry(&p);
        assert!((h - 3.0).abs() < 1e-9);
    }
}
