use cadence_core::Operator;

use crate::{BdfIntegrator, Error, StepSummary, step_size::synchronize};

/// A time integrator that can be advanced in lockstep with others.
///
/// Stepping is split from step-size selection so that a driver can collect
/// every integrator's recommendation and commit a common value.
pub trait TimeStepper {
    /// Returns the current time `t_n`.
    fn time(&self) -> f64;

    /// Returns whether the end time has been reached.
    fn finished(&self) -> bool;

    /// Takes one step without choosing the next step size.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the step.
    fn solve_timestep(&mut self) -> Result<StepSummary, Error>;

    /// Returns the step size this integrator would choose next.
    ///
    /// # Errors
    ///
    /// Returns an error if the recommendation cannot be computed.
    fn recommend_step_size(&self) -> Result<f64, Error>;

    /// Makes `dt` the size of the next step.
    ///
    /// # Errors
    ///
    /// Returns an error if the integrator cannot adopt the step size.
    fn commit_step_size(&mut self, dt: f64) -> Result<(), Error>;
}

impl<O: Operator> TimeStepper for BdfIntegrator<O> {
    fn time(&self) -> f64 {
        BdfIntegrator::time(self)
    }

    fn finished(&self) -> bool {
        BdfIntegrator::finished(self)
    }

    fn solve_timestep(&mut self) -> Result<StepSummary, Error> {
        BdfIntegrator::solve_timestep(self)
    }

    fn recommend_step_size(&self) -> Result<f64, Error> {
        BdfIntegrator::recommend_step_size(self)
    }

    fn commit_step_size(&mut self, dt: f64) -> Result<(), Error> {
        BdfIntegrator::commit_step_size(self, dt)
    }
}

/// Advances several integrators with one shared step size.
///
/// Every cycle steps each integrator once, then commits the smallest
/// recommended step size to all of them, so their step-size histories and
/// BDF coefficients stay identical.
pub struct CoupledDriver {
    steppers: Vec<Box<dyn TimeStepper>>,
    dt: f64,
}

impl CoupledDriver {
    /// Creates a driver and synchronizes the initial step size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedScheme`] if `steppers` is empty, or any
    /// error raised while recommending or committing the step size.
    pub fn new(mut steppers: Vec<Box<dyn TimeStepper>>) -> Result<Self, Error> {
        if steppers.is_empty() {
            return Err(Error::unsupported("a coupled driver needs at least one integrator"));
        }
        let dt = synchronize_all(&mut steppers)?;
        tracing::info!(integrators = steppers.len(), dt, "synchronized initial step size");
        Ok(Self { steppers, dt })
    }

    /// Steps every integrator once and commits the next common step size.
    ///
    /// Returns the summaries in integrator order.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any integrator.
    pub fn do_timestep(&mut self) -> Result<Vec<StepSummary>, Error> {
        let summaries = self
            .steppers
            .iter_mut()
            .map(|s| s.solve_timestep())
            .collect::<Result<Vec<_>, _>>()?;
        self.dt = synchronize_all(&mut self.steppers)?;
        tracing::debug!(dt = self.dt, "committed common step size");
        Ok(summaries)
    }

    /// Steps until every integrator has reached its end time.
    ///
    /// Returns the number of cycles.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any integrator.
    pub fn run(&mut self) -> Result<usize, Error> {
        let mut cycles = 0;
        while !self.finished() {
            self.do_timestep()?;
            cycles += 1;
        }
        tracing::info!(cycles, "finished coupled run");
        Ok(cycles)
    }

    /// Returns whether every integrator has reached its end time.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.steppers.iter().all(|s| s.finished())
    }

    /// Returns the step size committed for the next cycle.
    #[must_use]
    pub fn step_size(&self) -> f64 {
        self.dt
    }

    #[must_use]
    pub fn steppers(&self) -> &[Box<dyn TimeStepper>] {
        &self.steppers
    }
}

fn synchronize_all(steppers: &mut [Box<dyn TimeStepper>]) -> Result<f64, Error> {
    let candidates = steppers
        .iter()
        .map(|s| s.recommend_step_size())
        .collect::<Result<Vec<_>, _>>()?;
    let dt = synchronize(&candidates);
    for stepper in steppers.iter_mut() {
        stepper.commit_step_size(dt)?;
    }
    Ok(dt)
}
