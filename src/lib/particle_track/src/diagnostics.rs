//! Per-particle diagnostic snapshot (§6): the read-only view a host
//! process asks for between steps, without reaching into driver internals.

use crate::field::FieldSource;
use crate::particle::{Particle, ParticleStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleDiagnostic {
    pub id: u64,
    pub group_id: u32,
    pub status: ParticleStatus,
    pub x1: f64,
    pub x2: f64,
    pub x3: f64,
    pub host: usize,
    pub bathymetry: f64,
    pub sea_surface_elevation: f64,
}

/// Build a diagnostic snapshot of `p` at time `t`. Valid for any particle
/// status: an `OutOfDomain`/`Absorbed` particle's `host`/`x*` reflect
/// wherever it last had valid local coordinates.
pub fn get_diagnostics(field: &dyn FieldSource, t: f64, p: &Particle) -> ParticleDiagnostic {
    ParticleDiagnostic {
        id: p.id,
        group_id: p.group_id,
        status: p.status,
        x1: p.x1,
        x2: p.x2,
        x3: p.x3,
        host: p.host,
        bathymetry: field.get_bathymetry(p),
        sea_surface_elevation: field.get_sea_sur_elev(t, p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_copy_and_comparable() {
        assert_eq!(ParticleStatus::Active, ParticleStatus::Active);
        assert_ne!(ParticleStatus::Active, ParticleStatus::Beached);
    }
}
