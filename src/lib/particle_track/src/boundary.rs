//! Boundary calculators (§4.F): what happens to a tentative step that
//! crosses a land edge (horizontal) or over/undershoots `[zmin, zmax]`
//! (vertical). These are pure geometry — no RNG, no field sampling — and
//! are resolved once from `BoundaryConditionsConfig` at startup, same as
//! `NumMethod`/`ItMethodKind` (§9).

use crate::config::{HorizBoundCond, VertBoundCond};
use crate::mesh::Mesh;

/// Reflect `p_old -> p_new` off the land edge of `host` that the segment
/// crosses: find the crossing point via the zero of the (affine-in-position)
/// barycentric weight for that edge, then mirror the remaining displacement
/// across the edge's unit normal. `p_old` must be inside `host`; `p_new` may
/// lie outside it (that is what triggered the boundary check).
pub fn reflect_horizontal(mesh: &Mesh, host: usize, p_old: (f64, f64), p_new: (f64, f64)) -> (f64, f64) {
    let phi_old = mesh.barycentric(p_old.0, p_old.1, host);
    let phi_new = mesh.barycentric(p_new.0, p_new.1, host);

    // `total_cmp`, not `partial_cmp().unwrap()`: a NaN position here is a
    // numerical fault (§7), not a reason to panic the whole run. `total_cmp`
    // orders NaN last, so a faulted component just loses the tie rather than
    // aborting; the caller's host-search/fault handling absorbs it from there.
    let edge = (0..3)
        .min_by(|&a, &b| phi_new[a].total_cmp(&phi_new[b]))
        .expect("edge index range is never empty");

    let denom = phi_old[edge] - phi_new[edge];
    let t = if denom.abs() <= f64::EPSILON {
        0.0
    } else {
        (phi_old[edge] / denom).clamp(0.0, 1.0)
    };
    let ix = p_old.0 + t * (p_new.0 - p_old.0);
    let iy = p_old.1 + t * (p_new.1 - p_old.1);

    let verts = mesh.nodes_of(host);
    let (a, b) = match edge {
        0 => (verts[1], verts[2]),
        1 => (verts[2], verts[0]),
        _ => (verts[0], verts[1]),
    };
    let (ax, ay) = mesh.node_xy(a);
    let (bx, by) = mesh.node_xy(b);
    let (ex, ey) = (bx - ax, by - ay);
    let elen = (ex * ex + ey * ey).sqrt();
    if elen <= f64::EPSILON {
        return (ix, iy);
    }
    let (nx, ny) = (-ey / elen, ex / elen);

    let (rem_x, rem_y) = (p_new.0 - ix, p_new.1 - iy);
    let dot = rem_x * nx + rem_y * ny;
    let (refl_x, refl_y) = (rem_x - 2.0 * dot * nx, rem_y - 2.0 * dot * ny);
    (ix + refl_x, iy + refl_y)
}

/// Revert entirely to the last known-good position.
pub fn restore_horizontal(p_old: (f64, f64)) -> (f64, f64) {
    p_old
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerticalOutcome {
    Value(f64),
    Absorbed,
}

/// Mirror `z` across whichever bound it overshot. Guarded to at most two
/// reflections: a displacement so large it would bounce off both bounds in
/// one step is clamped instead of reflected indefinitely (the physical
/// step sizes this crate is built for never approach the domain depth, so
/// this guard only ever fires on pathological input).
pub fn reflect_vertical(z: f64, zmin: f64, zmax: f64) -> f64 {
    let mut zz = z;
    for _ in 0..2 {
        if zz > zmax {
            zz = 2.0 * zmax - zz;
        } else if zz < zmin {
            zz = 2.0 * zmin - zz;
        } else {
            return zz;
        }
    }
    zz.clamp(zmin, zmax)
}

/// Reflecting at the surface (`zmax`), absorbing at the bottom (`zmin`):
/// a particle that undershoots the bottom bound is terminal from here on.
pub fn absorb_bottom_vertical(z: f64, zmin: f64, zmax: f64) -> VerticalOutcome {
    if z < zmin {
        return VerticalOutcome::Absorbed;
    }
    if z > zmax {
        return VerticalOutcome::Value(reflect_vertical(z, zmin, zmax));
    }
    VerticalOutcome::Value(z)
}

/// Resolved horizontal boundary calculator, chosen once from
/// `BOUNDARY_CONDITIONS.horiz_bound_cond`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizBoundaryCalculator(HorizBoundCond);

impl HorizBoundaryCalculator {
    pub fn from_config(cond: HorizBoundCond) -> Self {
        HorizBoundaryCalculator(cond)
    }

    pub fn resolve(&self, mesh: &Mesh, host: usize, p_old: (f64, f64), p_new: (f64, f64)) -> (f64, f64) {
        match self.0 {
            HorizBoundCond::Reflecting => reflect_horizontal(mesh, host, p_old, p_new),
            HorizBoundCond::Restoring => restore_horizontal(p_old),
            HorizBoundCond::None => p_new,
        }
    }
}

/// Resolved vertical boundary calculator, chosen once from
/// `BOUNDARY_CONDITIONS.vert_bound_cond`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertBoundaryCalculator(VertBoundCond);

impl VertBoundaryCalculator {
    pub fn from_config(cond: VertBoundCond) -> Self {
        VertBoundaryCalculator(cond)
    }

    pub fn resolve(&self, z: f64, zmin: f64, zmax: f64) -> VerticalOutcome {
        match self.0 {
            VertBoundCond::Reflecting => VerticalOutcome::Value(reflect_vertical(z, zmin, zmax)),
            VertBoundCond::AbsorbingBottom => absorb_bottom_vertical(z, zmin, zmax),
            VertBoundCond::None => VerticalOutcome::Value(z),
        }
    }
}
