//! Offline Lagrangian particle-tracking core.
//!
//! Integrates the trajectories of a population of passive particles through
//! time-varying Eulerian fields (velocity, vertical eddy diffusivity,
//! horizontal eddy viscosity, sea-surface elevation, bathymetry) defined on
//! an unstructured triangular horizontal mesh with terrain-following
//! vertical layers. The crate is pure computation: no file I/O, no network,
//! no parallel partitioning. Those are external collaborators that plug in
//! behind the [`field::FieldSource`] trait and the [`driver::Driver`]'s
//! particle array.
//!
//! Module map, leaves first: [`mesh`] (topology + host location), [`interp`]
//! (barycentric/temporal/sigma/LLS kernels), [`field`] (the sampler that
//! binds topology to time-indexed snapshots), [`itmethod`] (RK4/Euler
//! advection, Visser/naive vertical random walk, horizontal random walk),
//! [`nummethod`] (how a timestep composes those), [`boundary`] (reflecting/
//! restoring/absorbing calculators), [`particle`] (per-particle state),
//! [`rng`] (deterministic per-draw seeding), [`config`] (the resolved
//! configuration record), [`error`] (the crate-wide error taxonomy),
//! [`diagnostics`] (the per-particle snapshot a host process reads between
//! steps), and [`driver`] (ties all of the above into one per-timestep
//! update).

pub mod boundary;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod field;
pub mod interp;
pub mod itmethod;
pub mod mesh;
pub mod nummethod;
pub mod particle;
pub mod rng;

pub use config::Config;
pub use diagnostics::{get_diagnostics, ParticleDiagnostic};
pub use driver::Driver;
pub use error::CoreError;
pub use field::FieldSource;
pub use mesh::Mesh;
pub use particle::{Particle, ParticleStatus};
