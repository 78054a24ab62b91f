//! Variable-order BDF time integration for coupled field problems.
//!
//! The engine advances the fields of an external spatial discretization (an
//! [`Operator`](cadence_core::Operator)) with backward differentiation
//! formulas of order 1 to 4:
//!
//! - [`coefficients`]: BDF and extrapolation coefficients, uniform or adaptive
//! - [`SolutionHistory`] and [`StepSizeHistory`]: past time levels
//! - [`BdfIntegrator`]: the per-step phase sequence of a splitting scheme
//! - [`OifSubstepper`]: operator-integration-factor sub-stepping of convection
//! - [`StepSizeController`]: CFL, diffusion and efficiency step-size limits
//! - [`restart`]: versioned binary checkpoints
//! - [`SteadyStateDriver`]: pseudo-time marching to a steady state
//! - [`CoupledDriver`]: several integrators sharing one step size
//!
//! # Example
//!
//! ```ignore
//! use cadence_bdf::{BdfIntegrator, Config, SchemeKind, StepSizeControl};
//!
//! let config = Config::builder(StepSizeControl::Fixed(1e-3))
//!     .scheme(SchemeKind::Coupled)
//!     .order(2)
//!     .time_interval(0.0, 1.0)
//!     .build()?;
//!
//! let mut integrator = BdfIntegrator::new(operator, config)?;
//! let solution = integrator.run_unobserved()?;
//! ```

pub mod coefficients;
pub mod restart;

mod config;
mod coupled;
mod error;
mod history;
mod oif;
mod sequencer;
mod steady;
mod step_size;

pub use coefficients::{CoefficientSet, MAX_ORDER};
pub use config::{
    Config, ConfigBuilder, ConfigError, ConvectiveTreatment, ConvergenceCriterion,
    NonConvergencePolicy, SchemeKind, SteadyConfig, StepSizeControl,
};
pub use coupled::{CoupledDriver, TimeStepper};
pub use error::Error;
pub use history::{SolutionHistory, StepSizeHistory};
pub use oif::{ExplicitRungeKutta, OifSubstepper};
pub use restart::{FieldRecord, RestartState};
pub use sequencer::{
    Action, BdfIntegrator, Event, IterationStats, Solution, Status, StepSummary, SubStep,
    SubStepStats, TimeCursor, scheme_fields,
};
pub use steady::{SteadySolution, SteadyStateDriver};
pub use step_size::{StepSizeController, synchronize};
