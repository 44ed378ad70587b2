//! Resolved configuration record.
//!
//! The core never parses a configuration file — it receives an already
//! validated `Config` by value. The `FromStr`-style factories here exist
//! because the configuration *keys* are still plain strings at the
//! boundary (as named in the external-interfaces section); translating
//! them into the concrete tagged-variant types is done once at startup
//! (see §9, "dynamic dispatch removal") rather than re-matched on every
//! particle step.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthCoordinates {
    Cartesian,
    Sigma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    Cartesian,
    Geographic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumMethodKind {
    Standard,
    OperatorSplit0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvIterativeMethod {
    Rk4,
    Euler,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffIterativeMethod {
    Visser,
    Naive,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizBoundCond {
    Reflecting,
    Restoring,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertBoundCond {
    Reflecting,
    AbsorbingBottom,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_enum_key<T>(key: &str, value: &str, table: &[(&str, T)]) -> Result<T, CoreError>
where
    T: Copy,
{
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
        .map(|(_, variant)| *variant)
        .ok_or_else(|| {
            CoreError::Config(format!(
                "unrecognized value {value:?} for {key}; expected one of {:?}",
                table.iter().map(|(n, _)| *n).collect::<Vec<_>>()
            ))
        })
}

impl DepthCoordinates {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        parse_enum_key(
            "SIMULATION.depth_coordinates",
            value,
            &[
                ("cartesian", DepthCoordinates::Cartesian),
                ("sigma", DepthCoordinates::Sigma),
            ],
        )
    }
}

impl CoordinateSystem {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        parse_enum_key(
            "SIMULATION.coordinate_system",
            value,
            &[
                ("cartesian", CoordinateSystem::Cartesian),
                ("geographic", CoordinateSystem::Geographic),
            ],
        )
    }
}

impl NumMethodKind {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        parse_enum_key(
            "NUMERICS.num_method",
            value,
            &[
                ("standard", NumMethodKind::Standard),
                ("operator_split_0", NumMethodKind::OperatorSplit0),
            ],
        )
    }
}

impl AdvIterativeMethod {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        parse_enum_key(
            "NUMERICS.adv_iterative_method",
            value,
            &[
                ("rk4", AdvIterativeMethod::Rk4),
                ("euler", AdvIterativeMethod::Euler),
                ("none", AdvIterativeMethod::None),
            ],
        )
    }
}

impl DiffIterativeMethod {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        parse_enum_key(
            "NUMERICS.diff_iterative_method",
            value,
            &[
                ("visser", DiffIterativeMethod::Visser),
                ("naive", DiffIterativeMethod::Naive),
                ("none", DiffIterativeMethod::None),
            ],
        )
    }
}

impl HorizBoundCond {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        parse_enum_key(
            "BOUNDARY_CONDITIONS.horiz_bound_cond",
            value,
            &[
                ("reflecting", HorizBoundCond::Reflecting),
                ("restoring", HorizBoundCond::Restoring),
                ("none", HorizBoundCond::None),
            ],
        )
    }
}

impl VertBoundCond {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        parse_enum_key(
            "BOUNDARY_CONDITIONS.vert_bound_cond",
            value,
            &[
                ("reflecting", VertBoundCond::Reflecting),
                ("absorbing_bottom", VertBoundCond::AbsorbingBottom),
                ("none", VertBoundCond::None),
            ],
        )
    }
}

/// `SIMULATION.*` keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub time_step_s: f64,
    pub depth_coordinates: DepthCoordinates,
    pub coordinate_system: CoordinateSystem,
    pub surface_only: bool,
    pub depth_restoring: bool,
    pub fixed_depth_m: f64,
    pub height_restoring: bool,
    pub fixed_height_m: f64,
    pub allow_beaching: bool,
}

/// `NUMERICS.*` keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NumericsConfig {
    pub num_method: NumMethodKind,
    pub n_inner_steps: usize,
    pub adv_iterative_method: AdvIterativeMethod,
    pub diff_iterative_method: DiffIterativeMethod,
}

/// `BOUNDARY_CONDITIONS.*` keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundaryConditionsConfig {
    pub horiz_bound_cond: HorizBoundCond,
    pub vert_bound_cond: VertBoundCond,
}

/// `GENERAL.*` keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub log_level: LogLevel,
    pub full_logging: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub numerics: NumericsConfig,
    pub boundary_conditions: BoundaryConditionsConfig,
    pub general: GeneralConfig,
    /// Bound on the host-search walk (§4.A).
    pub max_walk_steps: usize,
    /// Bound on the horizontal boundary-correction loop (§4.E step 2).
    pub max_bc_iters: usize,
    /// Master RNG seed (§4.D, §5).
    pub rng_seed: u64,
}

impl Config {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.simulation.time_step_s <= 0.0 {
            return Err(CoreError::Config(format!(
                "SIMULATION.time_step must be > 0, got {}",
                self.simulation.time_step_s
            )));
        }
        if self.simulation.depth_restoring && self.simulation.height_restoring {
            return Err(CoreError::Config(
                "SIMULATION.depth_restoring and SIMULATION.height_restoring are mutually exclusive"
                    .to_string(),
            ));
        }
        if self.simulation.surface_only
            && (self.simulation.depth_restoring || self.simulation.height_restoring)
        {
            return Err(CoreError::Config(
                "SIMULATION.surface_only is mutually exclusive with depth_restoring/height_restoring"
                    .to_string(),
            ));
        }
        if self.simulation.fixed_depth_m > 0.0 {
            return Err(CoreError::Config(format!(
                "SIMULATION.fixed_depth must be <= 0 m, got {}",
                self.simulation.fixed_depth_m
            )));
        }
        if self.simulation.fixed_height_m < 0.0 {
            return Err(CoreError::Config(format!(
                "SIMULATION.fixed_height must be >= 0 m, got {}",
                self.simulation.fixed_height_m
            )));
        }
        if self.numerics.num_method == NumMethodKind::OperatorSplit0 && self.numerics.n_inner_steps == 0
        {
            return Err(CoreError::Config(
                "NUMERICS.n_inner_steps must be >= 1 for operator_split_0".to_string(),
            ));
        }
        if self.max_walk_steps == 0 {
            return Err(CoreError::Config(
                "max_walk_steps must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
