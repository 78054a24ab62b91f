use thiserror::Error;

use crate::coefficients::MAX_ORDER;

/// Splitting of the coupled solve into sub-steps, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeKind {
    /// Convective, pressure, projection and viscous sub-steps.
    DualSplitting,

    /// Momentum, pressure (increment) and projection sub-steps.
    PressureCorrection,

    /// One monolithic solve of all unknowns.
    Coupled,
}

/// How the convective term enters the time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvectiveTreatment {
    /// No convective term (Stokes, pure diffusion, structural dynamics).
    None,

    /// Extrapolated explicitly from past time levels.
    Explicit,

    /// Handled by the operator inside its (nonlinear) solve.
    Implicit,

    /// Operator-integration-factor splitting with `substeps` explicit
    /// sub-steps per outer step and history level.
    Substepping { substeps: usize },
}

/// How the step size is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepSizeControl {
    /// A user-specified step size.
    Fixed(f64),

    /// Limited by the convective CFL condition.
    Cfl { cfl: f64 },

    /// Limited by the diffusion number.
    Diffusion { diffusion_number: f64, viscosity: f64 },

    /// The smaller of the CFL and diffusion limits.
    CflAndDiffusion {
        cfl: f64,
        diffusion_number: f64,
        viscosity: f64,
    },

    /// Balances temporal against spatial error through an efficiency constant.
    MaxEfficiency { c_eff: f64 },
}

/// What to do when an operator solve reports that it did not converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NonConvergencePolicy {
    /// Log a warning, count the event and continue with the returned solution.
    #[default]
    Continue,

    /// Abort the run with [`Error::NotConverged`](crate::Error::NotConverged).
    Abort,
}

/// Errors that can occur when validating an engine configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("order {0} must be between 1 and 4")]
    Order(usize),

    #[error("end time {end} must be finite and greater than start time {start}")]
    TimeInterval { start: f64, end: f64 },

    #[error("step size parameters must be finite and positive")]
    StepSize,

    #[error("adaptive stepping requires a step size control other than Fixed")]
    AdaptiveFixed,

    #[error("limiting factor must be finite and at least 1, got {0}")]
    LimitingFactor(f64),

    #[error("maximum step size must be positive, got {0}")]
    MaxStepSize(f64),

    #[error("substepping requires at least one substep")]
    Substeps,

    #[error("tolerances must be finite and non-negative, got abs {abs} and rel {rel}")]
    Tolerance { abs: f64, rel: f64 },

    #[error("steady-state marching needs a step budget of at least one step")]
    MaxSteps,
}

/// Immutable configuration of a BDF run.
///
/// Built once through [`Config::builder`] and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    scheme: SchemeKind,
    order: usize,
    start_with_low_order: bool,
    convective: ConvectiveTreatment,
    step_size: StepSizeControl,
    adaptive: bool,
    limiting_factor: f64,
    max_step_size: f64,
    start_time: f64,
    end_time: f64,
    non_convergence: NonConvergencePolicy,
}

impl Config {
    /// Starts a configuration with the given step size control.
    #[must_use]
    pub fn builder(step_size: StepSizeControl) -> ConfigBuilder {
        ConfigBuilder {
            config: Config {
                scheme: SchemeKind::Coupled,
                order: 2,
                start_with_low_order: true,
                convective: ConvectiveTreatment::None,
                step_size,
                adaptive: false,
                limiting_factor: 1.2,
                max_step_size: f64::MAX,
                start_time: 0.0,
                end_time: 1.0,
                non_convergence: NonConvergencePolicy::Continue,
            },
        }
    }

    #[must_use]
    pub fn scheme(&self) -> SchemeKind {
        self.scheme
    }

    /// Returns the target order of the BDF scheme.
    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Returns whether the run ramps the order up from 1 during startup.
    ///
    /// Otherwise all history levels are initialized from prescribed data.
    #[must_use]
    pub fn start_with_low_order(&self) -> bool {
        self.start_with_low_order
    }

    #[must_use]
    pub fn convective(&self) -> ConvectiveTreatment {
        self.convective
    }

    #[must_use]
    pub fn step_size(&self) -> StepSizeControl {
        self.step_size
    }

    /// Returns whether the step size is recomputed after every step.
    #[must_use]
    pub fn adaptive(&self) -> bool {
        self.adaptive
    }

    /// Returns the largest factor by which an adaptive step may grow or shrink.
    #[must_use]
    pub fn limiting_factor(&self) -> f64 {
        self.limiting_factor
    }

    #[must_use]
    pub fn max_step_size(&self) -> f64 {
        self.max_step_size
    }

    #[must_use]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    #[must_use]
    pub fn non_convergence(&self) -> NonConvergencePolicy {
        self.non_convergence
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn scheme(mut self, scheme: SchemeKind) -> Self {
        self.config.scheme = scheme;
        self
    }

    pub fn order(mut self, order: usize) -> Self {
        self.config.order = order;
        self
    }

    pub fn start_with_low_order(mut self, enabled: bool) -> Self {
        self.config.start_with_low_order = enabled;
        self
    }

    pub fn convective(mut self, treatment: ConvectiveTreatment) -> Self {
        self.config.convective = treatment;
        self
    }

    pub fn adaptive(mut self, enabled: bool) -> Self {
        self.config.adaptive = enabled;
        self
    }

    pub fn limiting_factor(mut self, factor: f64) -> Self {
        self.config.limiting_factor = factor;
        self
    }

    pub fn max_step_size(mut self, dt: f64) -> Self {
        self.config.max_step_size = dt;
        self
    }

    pub fn time_interval(mut self, start: f64, end: f64) -> Self {
        self.config.start_time = start;
        self.config.end_time = end;
        self
    }

    pub fn non_convergence(mut self, policy: NonConvergencePolicy) -> Self {
        self.config.non_convergence = policy;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid setting.
    pub fn build(self) -> Result<Config, ConfigError> {
        let c = self.config;

        if !(1..=MAX_ORDER).contains(&c.order) {
            return Err(ConfigError::Order(c.order));
        }
        if !c.start_time.is_finite() || !c.end_time.is_finite() || c.end_time <= c.start_time {
            return Err(ConfigError::TimeInterval {
                start: c.start_time,
                end: c.end_time,
            });
        }

        let positive = |v: f64| v.is_finite() && v > 0.0;
        let valid_step = match c.step_size {
            StepSizeControl::Fixed(dt) => positive(dt),
            StepSizeControl::Cfl { cfl } => positive(cfl),
            StepSizeControl::Diffusion {
                diffusion_number,
                viscosity,
            } => positive(diffusion_number) && positive(viscosity),
            StepSizeControl::CflAndDiffusion {
                cfl,
                diffusion_number,
                viscosity,
            } => positive(cfl) && positive(diffusion_number) && positive(viscosity),
            StepSizeControl::MaxEfficiency { c_eff } => positive(c_eff),
        };
        if !valid_step {
            return Err(ConfigError::StepSize);
        }
        if c.adaptive && matches!(c.step_size, StepSizeControl::Fixed(_)) {
            return Err(ConfigError::AdaptiveFixed);
        }
        if !c.limiting_factor.is_finite() || c.limiting_factor < 1.0 {
            return Err(ConfigError::LimitingFactor(c.limiting_factor));
        }
        if c.max_step_size.is_nan() || c.max_step_size <= 0.0 {
            return Err(ConfigError::MaxStepSize(c.max_step_size));
        }
        if c.convective == (ConvectiveTreatment::Substepping { substeps: 0 }) {
            return Err(ConfigError::Substeps);
        }

        Ok(c)
    }
}

/// How steady-state convergence is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvergenceCriterion {
    /// Norm of the change of all fields over one pseudo-time step.
    SolutionIncrement,

    /// Norm of the steady residual, relative to its value at the initial state.
    Residual,
}

/// Configuration for pseudo-time marching to a steady state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteadyConfig {
    criterion: ConvergenceCriterion,
    abs_tol: f64,
    rel_tol: f64,
    max_steps: usize,
}

impl SteadyConfig {
    /// Creates a validated steady-state configuration.
    ///
    /// Marching stops once the measure drops below `abs_tol` or its relative
    /// counterpart below `rel_tol`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a tolerance is negative or not finite,
    /// or if `max_steps` is zero.
    pub fn new(
        criterion: ConvergenceCriterion,
        abs_tol: f64,
        rel_tol: f64,
        max_steps: usize,
    ) -> Result<Self, ConfigError> {
        let valid = |tol: f64| tol.is_finite() && tol >= 0.0;
        if !valid(abs_tol) || !valid(rel_tol) {
            return Err(ConfigError::Tolerance {
                abs: abs_tol,
                rel: rel_tol,
            });
        }
        if max_steps == 0 {
            return Err(ConfigError::MaxSteps);
        }
        Ok(Self {
            criterion,
            abs_tol,
            rel_tol,
            max_steps,
        })
    }

    #[must_use]
    pub fn criterion(&self) -> ConvergenceCriterion {
        self.criterion
    }

    #[must_use]
    pub fn abs_tol(&self) -> f64 {
        self.abs_tol
    }

    #[must_use]
    pub fn rel_tol(&self) -> f64 {
        self.rel_tol
    }

    #[must_use]
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::builder(StepSizeControl::Fixed(0.1)).build().unwrap();

        assert_eq!(config.scheme(), SchemeKind::Coupled);
        assert_eq!(config.order(), 2);
        assert!(config.start_with_low_order());
        assert_eq!(config.non_convergence(), NonConvergencePolicy::Continue);
    }

    #[test]
    fn rejects_invalid_order() {
        for order in [0, 5] {
            let result = Config::builder(StepSizeControl::Fixed(0.1))
                .order(order)
                .build();
            assert_eq!(result, Err(ConfigError::Order(order)));
        }
    }

    #[test]
    fn rejects_bad_time_interval() {
        let result = Config::builder(StepSizeControl::Fixed(0.1))
            .time_interval(1.0, 1.0)
            .build();
        assert!(matches!(result, Err(ConfigError::TimeInterval { .. })));
    }

    #[test]
    fn rejects_non_positive_step_parameters() {
        let controls = [
            StepSizeControl::Fixed(0.0),
            StepSizeControl::Cfl { cfl: -1.0 },
            StepSizeControl::Diffusion {
                diffusion_number: 0.1,
                viscosity: 0.0,
            },
            StepSizeControl::MaxEfficiency { c_eff: f64::NAN },
        ];
        for control in controls {
            assert_eq!(Config::builder(control).build(), Err(ConfigError::StepSize));
        }
    }

    #[test]
    fn adaptive_needs_a_stability_limit() {
        let result = Config::builder(StepSizeControl::Fixed(0.1))
            .adaptive(true)
            .build();
        assert_eq!(result, Err(ConfigError::AdaptiveFixed));
    }

    #[test]
    fn substepping_needs_substeps() {
        let result = Config::builder(StepSizeControl::Cfl { cfl: 1.0 })
            .convective(ConvectiveTreatment::Substepping { substeps: 0 })
            .build();
        assert_eq!(result, Err(ConfigError::Substeps));
    }

    #[test]
    fn rejects_limiting_factor_below_one() {
        let result = Config::builder(StepSizeControl::Cfl { cfl: 1.0 })
            .limiting_factor(0.5)
            .build();
        assert_eq!(result, Err(ConfigError::LimitingFactor(0.5)));
    }

    #[test]
    fn steady_config_validation() {
        assert!(SteadyConfig::new(ConvergenceCriterion::Residual, 1e-12, 1e-6, 100).is_ok());
        assert_eq!(
            SteadyConfig::new(ConvergenceCriterion::Residual, -1.0, 1e-6, 100),
            Err(ConfigError::Tolerance {
                abs: -1.0,
                rel: 1e-6
            })
        );
        assert_eq!(
            SteadyConfig::new(ConvergenceCriterion::SolutionIncrement, 0.0, 0.0, 0),
            Err(ConfigError::MaxSteps)
        );
    }
}
