mod action;
mod cursor;
mod event;
mod solution;
mod state;
mod stats;

pub use action::Action;
pub use cursor::TimeCursor;
pub use event::{Event, StepSummary};
pub use solution::{Solution, Status};
pub use state::SubStep;
pub use stats::{IterationStats, SubStepStats};

use std::time::Instant;

use cadence_core::{
    ExplicitSubIntegrator, FieldKind, FieldVector, Observer, Operator, OperatorKind,
    SolveContext, SolveReport,
};

use crate::{
    Error,
    coefficients::{CoefficientCache, CoefficientSet},
    config::{Config, ConvectiveTreatment, NonConvergencePolicy, SchemeKind},
    history::{SolutionHistory, StepSizeHistory},
    oif::{OifSubstepper, level_times},
    restart::{FieldRecord, RestartState},
    step_size::StepSizeController,
};

/// Relative tolerance on reaching the end time.
const END_TIME_TOLERANCE: f64 = 1e-12;

/// Returns the fields whose history a scheme keeps.
#[must_use]
pub fn scheme_fields(scheme: SchemeKind) -> &'static [FieldKind] {
    match scheme {
        SchemeKind::DualSplitting | SchemeKind::PressureCorrection => {
            &[FieldKind::Velocity, FieldKind::Pressure]
        }
        SchemeKind::Coupled => &[FieldKind::Solution],
    }
}

/// Returns the field that is transported and bounds the step size.
fn primary_field(scheme: SchemeKind) -> FieldKind {
    match scheme {
        SchemeKind::DualSplitting | SchemeKind::PressureCorrection => FieldKind::Velocity,
        SchemeKind::Coupled => FieldKind::Solution,
    }
}

/// Values produced by the phases of one step.
struct Scratch<V> {
    intermediate: Option<V>,
    projected: Option<V>,
    increment: Option<V>,
    pressure: Option<V>,
    velocity: Option<V>,
}

impl<V> Scratch<V> {
    fn new() -> Self {
        Self {
            intermediate: None,
            projected: None,
            increment: None,
            pressure: None,
            velocity: None,
        }
    }
}

fn produced<'a, V>(slot: &'a Option<V>, what: &str) -> Result<&'a V, Error> {
    slot.as_ref()
        .ok_or_else(|| Error::unsupported(format!("{what} requested before it was computed")))
}

/// A BDF time integrator driving an external spatial operator.
///
/// Each step walks the phases of the configured [`SchemeKind`], building
/// right-hand sides from the field histories and delegating every solve to
/// the operator. After the last phase the histories rotate, the time advances
/// and the next step size is chosen.
pub struct BdfIntegrator<O: Operator> {
    operator: O,
    config: Config,
    controller: StepSizeController,
    coefficients: CoefficientCache,
    fields: Vec<(FieldKind, SolutionHistory<O::Vector>)>,
    dts: StepSizeHistory,
    cursor: TimeCursor,
    oif: Option<OifSubstepper<O>>,
    stats: IterationStats,
    dt_pending: bool,
}

impl<O: Operator> BdfIntegrator<O> {
    /// Creates an integrator and prescribes its initial histories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedScheme`] if the configuration asks for
    /// OIF sub-stepping (use [`BdfIntegrator::with_substepping`]), or
    /// [`Error::Operator`] if the initial data cannot be prescribed.
    pub fn new(operator: O, config: Config) -> Result<Self, Error> {
        if let ConvectiveTreatment::Substepping { .. } = config.convective() {
            return Err(Error::unsupported(
                "OIF sub-stepping needs an explicit sub-integrator",
            ));
        }
        Self::setup(operator, config, None)
    }

    /// Creates an integrator that treats convection by OIF sub-stepping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedScheme`] unless the configuration selects
    /// [`ConvectiveTreatment::Substepping`] with at least one substep, or
    /// [`Error::Operator`] if the initial data cannot be prescribed.
    pub fn with_substepping(
        operator: O,
        integrator: Box<dyn ExplicitSubIntegrator<O>>,
        config: Config,
    ) -> Result<Self, Error> {
        let ConvectiveTreatment::Substepping { substeps } = config.convective() else {
            return Err(Error::unsupported(format!(
                "OIF sub-stepping cannot be combined with {:?} convective treatment",
                config.convective()
            )));
        };
        let oif = OifSubstepper::new(integrator, substeps)?;
        Self::setup(operator, config, Some(oif))
    }

    fn setup(operator: O, config: Config, oif: Option<OifSubstepper<O>>) -> Result<Self, Error> {
        let scheme = config.scheme();
        let order = config.order();
        let start = config.start_time();
        let controller = StepSizeController::new(&config);

        let u0 = operator
            .initial_condition(primary_field(scheme), start)
            .map_err(Error::operator)?;
        let dt = controller
            .initial_step_size(&u0, operator.mesh_metric(), operator.collective())
            .min(config.end_time() - start);

        let fields = prescribe(&operator, &config, dt)?;
        let active = fields
            .iter()
            .map(|(_, h)| h.active_length())
            .min()
            .unwrap_or(1);

        tracing::info!(
            ?scheme,
            order,
            dt,
            convective = ?config.convective(),
            adaptive = config.adaptive(),
            "initialized BDF integrator"
        );

        Ok(Self {
            operator,
            controller,
            coefficients: CoefficientCache::new(config.adaptive()),
            fields,
            dts: StepSizeHistory::filled(order, dt),
            cursor: TimeCursor::new(start, dt, order, active),
            oif,
            stats: IterationStats::default(),
            dt_pending: false,
            config,
        })
    }

    /// Integrates until the end time.
    ///
    /// The observer sees every completed step and may stop the run early.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a step.
    pub fn run<Obs>(&mut self, mut observer: Obs) -> Result<Solution, Error>
    where
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        tracing::info!(
            start = self.cursor.time(),
            end = self.config.end_time(),
            step = self.cursor.step_number(),
            "starting BDF run"
        );

        let mut steps = 0;
        while !self.finished() {
            let summary = self.do_timestep()?;
            steps += 1;

            let event = Event {
                summary: &summary,
                next_dt: self.dts.current(),
            };
            if let Some(action) = observer.observe(&event) {
                match action {
                    Action::StopEarly => {
                        tracing::info!(steps, time = self.cursor.time(), "run stopped by observer");
                        return Ok(Solution {
                            status: Status::StoppedByObserver,
                            steps,
                            time: self.cursor.time(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            steps,
            time = self.cursor.time(),
            non_converged = self.stats.non_converged(),
            wall_time = ?self.stats.total_wall_time(),
            "finished BDF run"
        );
        Ok(Solution {
            status: Status::ReachedEndTime,
            steps,
            time: self.cursor.time(),
        })
    }

    /// Integrates until the end time without observation.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a step.
    pub fn run_unobserved(&mut self) -> Result<Solution, Error> {
        self.run(())
    }

    /// Takes one step and commits the recommended size of the next.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a phase.
    pub fn do_timestep(&mut self) -> Result<StepSummary, Error> {
        let summary = self.solve_timestep()?;
        let dt = self.recommend_step_size()?;
        self.commit_step_size(dt)?;
        Ok(summary)
    }

    /// Takes one step without choosing the next step size.
    ///
    /// A step size must be committed through
    /// [`BdfIntegrator::commit_step_size`] before the next step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedScheme`] if the previous step's size was
    /// never committed, [`Error::Operator`] if the operator fails, or
    /// [`Error::NotConverged`] under [`NonConvergencePolicy::Abort`].
    pub fn solve_timestep(&mut self) -> Result<StepSummary, Error> {
        if self.dt_pending {
            return Err(Error::unsupported(
                "a step size must be committed before the next step",
            ));
        }

        let scheme = self.config.scheme();
        let order = self.cursor.active_order();
        let dt = self.dts.current();
        let coefficients = self.coefficients.get(order, &self.dts.to_vec())?;
        let ctx = SolveContext {
            time: self.cursor.time() + dt,
            dt,
            scaling: coefficients.gamma0() / dt,
            step: self.cursor.step_number(),
        };

        let mut scratch = Scratch::new();
        let mut reports = Vec::new();
        let mut phase = SubStep::first(scheme);
        while phase != SubStep::Done {
            tracing::trace!(?phase, step = ctx.step, "entering phase");
            match (scheme, phase) {
                (_, SubStep::Convective) => {
                    self.convective(&coefficients, &ctx, &mut scratch, &mut reports)?;
                }
                (SchemeKind::DualSplitting, SubStep::Pressure) => {
                    self.pressure(&coefficients, &ctx, &mut scratch, &mut reports)?;
                }
                (SchemeKind::DualSplitting, SubStep::Projection) => {
                    self.projection(&coefficients, &ctx, &mut scratch, &mut reports)?;
                }
                (_, SubStep::Viscous) => {
                    self.viscous(&coefficients, &ctx, &mut scratch, &mut reports)?;
                }
                (_, SubStep::Momentum) => {
                    self.momentum(&coefficients, &ctx, &mut scratch, &mut reports)?;
                }
                (_, SubStep::Pressure) => {
                    self.pressure_increment(&coefficients, &ctx, &mut scratch, &mut reports)?;
                }
                (_, SubStep::Projection) => {
                    self.incremental_projection(&coefficients, &ctx, &mut scratch, &mut reports)?;
                }
                (_, SubStep::CoupledSolve) => {
                    self.coupled(&coefficients, &ctx, &mut scratch, &mut reports)?;
                }
                (_, SubStep::Done) => {}
            }
            phase = phase.next(scheme);
        }

        self.finish_step(scheme, scratch)?;

        let summary = StepSummary {
            step: ctx.step,
            time: self.cursor.time(),
            dt,
            order,
            reports,
        };
        tracing::debug!(
            step = summary.step,
            time = summary.time,
            dt,
            order,
            iterations = summary.iterations(),
            "completed step"
        );
        Ok(summary)
    }

    /// Returns the step size the controller recommends for the next step.
    ///
    /// After a step the controller limits the change relative to the size of
    /// that step, using the current (most recent) transported field for the
    /// CFL estimate. Once a size has been committed for the next step, as
    /// after [`BdfIntegrator::resume`], that size is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HistoryUnderflow`] if the transported field has no
    /// history.
    pub fn recommend_step_size(&self) -> Result<f64, Error> {
        let velocity = self.field(primary_field(self.config.scheme()))?.current()?;
        let mesh = self.operator.mesh_metric();
        let comm = self.operator.collective();

        if self.dt_pending {
            let dt_old = self.dts.current();
            Ok(self.controller.next_step_size(dt_old, velocity, mesh, comm))
        } else if self.cursor.step_number() == 1 && !self.cursor.from_restart() {
            let remaining = self.config.end_time() - self.config.start_time();
            Ok(self
                .controller
                .initial_step_size(velocity, mesh, comm)
                .min(remaining))
        } else {
            Ok(self.dts.current())
        }
    }

    /// Makes `dt` the size of the next step.
    ///
    /// Before the first step of a fresh run the whole step-size history is
    /// reset to `dt` (and prescribed histories are re-sampled with it);
    /// after a step `dt` is pushed; otherwise the current size is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Operator`] if prescribed histories must be re-sampled
    /// and the operator fails.
    pub fn commit_step_size(&mut self, dt: f64) -> Result<(), Error> {
        if self.dt_pending {
            self.dts.push(dt);
            self.dt_pending = false;
        } else if self.cursor.step_number() == 1 && !self.cursor.from_restart() {
            self.dts.reset(dt);
            if !self.config.start_with_low_order() {
                self.fields = prescribe(&self.operator, &self.config, dt)?;
            }
        } else {
            self.dts.set_current(dt);
        }
        self.cursor.set_dt(dt);
        Ok(())
    }

    /// Returns whether the end time has been reached.
    #[must_use]
    pub fn finished(&self) -> bool {
        let end = self.config.end_time();
        self.cursor.time() >= end - END_TIME_TOLERANCE * end.abs()
    }

    /// Captures the state needed to continue this run elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RestartFormat`] if called between a step and the
    /// commit of the next step size.
    pub fn checkpoint(&self) -> Result<RestartState, Error> {
        if self.dt_pending {
            return Err(Error::restart(
                "cannot checkpoint before the next step size is committed",
            ));
        }

        let dts = self.dts.to_vec();
        let fields = self
            .fields
            .iter()
            .map(|(kind, history)| FieldRecord {
                kind: *kind,
                dts: dts.iter().copied().take(history.active_length()).collect(),
                snapshots: history.iter().map(|v| v.as_slice().to_vec()).collect(),
            })
            .collect();

        Ok(RestartState {
            order: self.config.order(),
            fields,
            time: self.cursor.time(),
            step: self.cursor.step_number(),
        })
    }

    /// Replaces the prescribed initial state with a restart record.
    ///
    /// Must be called before the first step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RestartFormat`] if the record's fields do not match
    /// the scheme, an active order exceeds the target order, or a snapshot
    /// length differs from the operator's vector layout.
    pub fn resume(&mut self, state: &RestartState) -> Result<(), Error> {
        if self.cursor.step_number() != 1 || self.cursor.from_restart() || self.dt_pending {
            return Err(Error::restart("a run can only resume before its first step"));
        }

        let order = self.config.order();
        let expected = scheme_fields(self.config.scheme());
        if state.fields.len() != expected.len()
            || expected
                .iter()
                .any(|kind| !state.fields.iter().any(|f| f.kind == *kind))
        {
            let found: Vec<_> = state.fields.iter().map(|f| f.kind).collect();
            return Err(Error::restart(format!(
                "record holds {found:?}, scheme needs {expected:?}"
            )));
        }

        let mut fields = Vec::with_capacity(expected.len());
        for &kind in expected {
            let Some(record) = state.fields.iter().find(|f| f.kind == kind) else {
                continue;
            };
            if record.snapshots.len() > order {
                return Err(Error::restart(format!(
                    "{kind:?} active order {} exceeds target order {order}",
                    record.snapshots.len()
                )));
            }

            let mut snapshots = Vec::with_capacity(record.snapshots.len());
            for values in &record.snapshots {
                let mut v = self.operator.dof_vector(kind);
                if v.len() != values.len() {
                    return Err(Error::restart(format!(
                        "{kind:?} snapshot has {} values, operator expects {}",
                        values.len(),
                        v.len()
                    )));
                }
                v.as_mut_slice().copy_from_slice(values);
                snapshots.push(v);
            }
            fields.push((kind, SolutionHistory::from_snapshots(order, snapshots)?));
        }

        if state.order != order {
            return Err(Error::restart(format!(
                "record was written with order {}, integrator is configured for order {order}",
                state.order
            )));
        }

        let record_dts = state
            .fields
            .first()
            .map(|f| f.dts.as_slice())
            .ok_or_else(|| Error::restart("record holds no fields"))?;
        let mut dts = StepSizeHistory::from_slice(record_dts)
            .map_err(|_| Error::restart("record holds no step sizes"))?;
        dts.pad_to(order);

        let active = fields
            .iter()
            .map(|(_, h)| h.active_length())
            .min()
            .unwrap_or(1);

        self.fields = fields;
        self.cursor = TimeCursor::restarted(state.time, state.step, dts.current(), order, active);
        self.dts = dts;

        tracing::info!(
            time = state.time,
            step = state.step,
            active_order = active,
            "resumed from restart record"
        );
        Ok(())
    }

    /// Returns the spatial operator being integrated.
    #[must_use]
    pub fn operator(&self) -> &O {
        &self.operator
    }

    /// Returns the configuration fixed at construction.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the time, step number and orders of the next step.
    #[must_use]
    pub fn cursor(&self) -> &TimeCursor {
        &self.cursor
    }

    /// Returns the current time `t_n`.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.cursor.time()
    }

    /// Returns the coefficients used by the most recent step.
    #[must_use]
    pub fn coefficients(&self) -> Option<CoefficientSet> {
        self.coefficients.current()
    }

    /// Returns how often coefficients have been computed.
    #[must_use]
    pub fn coefficient_recomputations(&self) -> usize {
        self.coefficients.recomputations()
    }

    /// Returns the history of a field, if the scheme keeps one.
    #[must_use]
    pub fn history(&self, field: FieldKind) -> Option<&SolutionHistory<O::Vector>> {
        self.fields
            .iter()
            .find(|(kind, _)| *kind == field)
            .map(|(_, history)| history)
    }

    /// Returns the current value of a field.
    #[must_use]
    pub fn solution(&self, field: FieldKind) -> Option<&O::Vector> {
        self.history(field).and_then(|h| h.current().ok())
    }

    /// Returns the step-size history, the committed next step first.
    #[must_use]
    pub fn step_sizes(&self) -> &StepSizeHistory {
        &self.dts
    }

    /// Returns solver statistics accumulated over every step so far.
    #[must_use]
    pub fn stats(&self) -> &IterationStats {
        &self.stats
    }

    fn field(&self, kind: FieldKind) -> Result<&SolutionHistory<O::Vector>, Error> {
        self.history(kind).ok_or_else(|| {
            Error::unsupported(format!(
                "{:?} scheme keeps no {kind:?} history",
                self.config.scheme()
            ))
        })
    }

    fn evaluate(&self, kind: OperatorKind, input: &O::Vector, time: f64) -> Result<O::Vector, Error> {
        self.operator
            .evaluate(kind, input, time)
            .map_err(Error::operator)
    }

    /// Returns `sum_i beta_i x_i` for a field's history.
    fn extrapolate(&self, kind: FieldKind, c: &CoefficientSet) -> Result<O::Vector, Error> {
        let history = self.field(kind)?;
        let mut value = history.current()?.clone();
        for (i, beta) in c.beta().iter().enumerate() {
            let x = history.get(i)?;
            if i == 0 {
                value.assign_scaled(*beta, x);
            } else {
                value.axpy(*beta, x);
            }
        }
        Ok(value)
    }

    /// Returns the BDF history sum `sum_i (alpha_i / dt) u_i`, transported by
    /// OIF sub-stepping when configured.
    fn inertia(&self, c: &CoefficientSet, dt: f64) -> Result<O::Vector, Error> {
        let kind = primary_field(self.config.scheme());
        let history = self.field(kind)?;

        if let Some(oif) = &self.oif {
            return oif.transported_sum(&self.operator, history, &self.dts, c, self.cursor.time());
        }

        let mut sum = history.current()?.clone();
        for (i, alpha) in c.alpha().iter().enumerate() {
            let u = history.get(i)?;
            if i == 0 {
                sum.assign_scaled(alpha / dt, u);
            } else {
                sum.axpy(alpha / dt, u);
            }
        }
        Ok(sum)
    }

    /// Returns the body force at `t_{n+1}` minus the extrapolated convective
    /// term when convection is explicit.
    fn explicit_forcing(&self, c: &CoefficientSet, time: f64) -> Result<O::Vector, Error> {
        let kind = primary_field(self.config.scheme());
        let history = self.field(kind)?;
        let mut rhs = self.evaluate(OperatorKind::BodyForce, history.current()?, time)?;

        if self.config.convective() == ConvectiveTreatment::Explicit {
            let times = level_times(&self.dts, c.order(), self.cursor.time())?;
            for (i, (beta, t)) in c.beta().iter().zip(&times).enumerate() {
                let convective = self.evaluate(OperatorKind::Convective, history.get(i)?, *t)?;
                rhs.axpy(-beta, &convective);
            }
        }
        Ok(rhs)
    }

    fn solve(
        &mut self,
        phase: SubStep,
        rhs: &O::Vector,
        guess: &O::Vector,
        ctx: &SolveContext,
        reports: &mut Vec<(SubStep, SolveReport)>,
    ) -> Result<O::Vector, Error> {
        let kind = phase
            .subproblem()
            .ok_or_else(|| Error::unsupported(format!("{phase:?} phase has no sub-problem")))?;
        let start = Instant::now();
        let (solution, report) = self
            .operator
            .solve(kind, rhs, guess, ctx)
            .map_err(Error::operator)?;
        self.stats.record_solve(phase, report, start.elapsed());
        tracing::trace!(
            ?kind,
            iterations = report.iterations,
            converged = report.converged,
            "solved sub-problem"
        );

        if !report.converged {
            match self.config.non_convergence() {
                NonConvergencePolicy::Continue => {
                    tracing::warn!(
                        ?kind,
                        iterations = report.iterations,
                        step = ctx.step,
                        "solver did not converge, continuing"
                    );
                    self.stats.record_non_converged();
                }
                NonConvergencePolicy::Abort => {
                    return Err(Error::NotConverged {
                        kind,
                        iterations: report.iterations,
                        step: ctx.step,
                    });
                }
            }
        }

        reports.push((phase, report));
        Ok(solution)
    }

    /// Dual splitting, explicit part: `u^ = (f - sum beta_i c_i + S) dt / gamma0`,
    /// or a convective solve under implicit treatment.
    fn convective(
        &mut self,
        c: &CoefficientSet,
        ctx: &SolveContext,
        scratch: &mut Scratch<O::Vector>,
        reports: &mut Vec<(SubStep, SolveReport)>,
    ) -> Result<(), Error> {
        let mut rhs = self.explicit_forcing(c, ctx.time)?;
        rhs.axpy(1.0, &self.inertia(c, ctx.dt)?);

        let intermediate = if self.config.convective() == ConvectiveTreatment::Implicit {
            let guess = self.extrapolate(FieldKind::Velocity, c)?;
            self.solve(SubStep::Convective, &rhs, &guess, ctx, reports)?
        } else {
            rhs.scale(ctx.dt / c.gamma0());
            rhs
        };

        scratch.intermediate = Some(intermediate);
        Ok(())
    }

    /// Pressure Poisson problem: `rhs = -(gamma0 / dt) div(u^)`.
    fn pressure(
        &mut self,
        c: &CoefficientSet,
        ctx: &SolveContext,
        scratch: &mut Scratch<O::Vector>,
        reports: &mut Vec<(SubStep, SolveReport)>,
    ) -> Result<(), Error> {
        let intermediate = produced(&scratch.intermediate, "intermediate velocity")?;
        let mut rhs = self.evaluate(OperatorKind::Divergence, intermediate, ctx.time)?;
        rhs.scale(-c.gamma0() / ctx.dt);

        let guess = self.extrapolate(FieldKind::Pressure, c)?;
        let pressure = self.solve(SubStep::Pressure, &rhs, &guess, ctx, reports)?;

        scratch.pressure = Some(pressure);
        Ok(())
    }

    /// Projection: `rhs = M u^ - (dt / gamma0) grad(p_{n+1})`.
    fn projection(
        &mut self,
        c: &CoefficientSet,
        ctx: &SolveContext,
        scratch: &mut Scratch<O::Vector>,
        reports: &mut Vec<(SubStep, SolveReport)>,
    ) -> Result<(), Error> {
        let intermediate = produced(&scratch.intermediate, "intermediate velocity")?;
        let pressure = produced(&scratch.pressure, "pressure")?;

        let mut rhs = self.evaluate(OperatorKind::MassMatrix, intermediate, ctx.time)?;
        let gradient = self.evaluate(OperatorKind::PressureGradient, pressure, ctx.time)?;
        rhs.axpy(-ctx.dt / c.gamma0(), &gradient);

        let guess = self.extrapolate(FieldKind::Velocity, c)?;
        let projected = self.solve(SubStep::Projection, &rhs, &guess, ctx, reports)?;

        scratch.projected = Some(projected);
        Ok(())
    }

    /// Viscous step: `rhs = (gamma0 / dt) M u^^`.
    fn viscous(
        &mut self,
        c: &CoefficientSet,
        ctx: &SolveContext,
        scratch: &mut Scratch<O::Vector>,
        reports: &mut Vec<(SubStep, SolveReport)>,
    ) -> Result<(), Error> {
        let projected = produced(&scratch.projected, "projected velocity")?;
        let mut rhs = self.evaluate(OperatorKind::MassMatrix, projected, ctx.time)?;
        rhs.scale(c.gamma0() / ctx.dt);

        let guess = self.extrapolate(FieldKind::Velocity, c)?;
        let velocity = self.solve(SubStep::Viscous, &rhs, &guess, ctx, reports)?;

        scratch.velocity = Some(velocity);
        Ok(())
    }

    /// Pressure correction, momentum step:
    /// `rhs = M (f - sum beta_i c_i + S) - grad(ext(p))`.
    fn momentum(
        &mut self,
        c: &CoefficientSet,
        ctx: &SolveContext,
        scratch: &mut Scratch<O::Vector>,
        reports: &mut Vec<(SubStep, SolveReport)>,
    ) -> Result<(), Error> {
        let mut forcing = self.explicit_forcing(c, ctx.time)?;
        forcing.axpy(1.0, &self.inertia(c, ctx.dt)?);

        let mut rhs = self.evaluate(OperatorKind::MassMatrix, &forcing, ctx.time)?;
        let pressure = self.extrapolate(FieldKind::Pressure, c)?;
        let gradient = self.evaluate(OperatorKind::PressureGradient, &pressure, ctx.time)?;
        rhs.axpy(-1.0, &gradient);

        let guess = self.extrapolate(FieldKind::Velocity, c)?;
        let intermediate = self.solve(SubStep::Momentum, &rhs, &guess, ctx, reports)?;

        scratch.intermediate = Some(intermediate);
        Ok(())
    }

    /// Pressure correction, increment: solves for `phi` with
    /// `rhs = -(gamma0 / dt) div(u^)`, then `p_{n+1} = ext(p) + phi`.
    fn pressure_increment(
        &mut self,
        c: &CoefficientSet,
        ctx: &SolveContext,
        scratch: &mut Scratch<O::Vector>,
        reports: &mut Vec<(SubStep, SolveReport)>,
    ) -> Result<(), Error> {
        let intermediate = produced(&scratch.intermediate, "intermediate velocity")?;
        let mut rhs = self.evaluate(OperatorKind::Divergence, intermediate, ctx.time)?;
        rhs.scale(-c.gamma0() / ctx.dt);

        let guess = self.operator.dof_vector(FieldKind::Pressure);
        let increment = self.solve(SubStep::Pressure, &rhs, &guess, ctx, reports)?;

        let mut pressure = self.extrapolate(FieldKind::Pressure, c)?;
        pressure.axpy(1.0, &increment);

        scratch.increment = Some(increment);
        scratch.pressure = Some(pressure);
        Ok(())
    }

    /// Pressure correction, projection with the increment:
    /// `rhs = M u^ - (dt / gamma0) grad(phi)`.
    fn incremental_projection(
        &mut self,
        c: &CoefficientSet,
        ctx: &SolveContext,
        scratch: &mut Scratch<O::Vector>,
        reports: &mut Vec<(SubStep, SolveReport)>,
    ) -> Result<(), Error> {
        let intermediate = produced(&scratch.intermediate, "intermediate velocity")?;
        let increment = produced(&scratch.increment, "pressure increment")?;

        let mut rhs = self.evaluate(OperatorKind::MassMatrix, intermediate, ctx.time)?;
        let gradient = self.evaluate(OperatorKind::PressureGradient, increment, ctx.time)?;
        rhs.axpy(-ctx.dt / c.gamma0(), &gradient);

        let guess = self.extrapolate(FieldKind::Velocity, c)?;
        let velocity = self.solve(SubStep::Projection, &rhs, &guess, ctx, reports)?;

        scratch.velocity = Some(velocity);
        Ok(())
    }

    /// Monolithic solve: `rhs = f - sum beta_i c_i + S`.
    fn coupled(
        &mut self,
        c: &CoefficientSet,
        ctx: &SolveContext,
        scratch: &mut Scratch<O::Vector>,
        reports: &mut Vec<(SubStep, SolveReport)>,
    ) -> Result<(), Error> {
        let mut rhs = self.explicit_forcing(c, ctx.time)?;
        rhs.axpy(1.0, &self.inertia(c, ctx.dt)?);

        let guess = self.extrapolate(FieldKind::Solution, c)?;
        let solution = self.solve(SubStep::CoupledSolve, &rhs, &guess, ctx, reports)?;

        scratch.velocity = Some(solution);
        Ok(())
    }

    /// Rotates the new time level into every history and advances the cursor.
    fn finish_step(&mut self, scheme: SchemeKind, scratch: Scratch<O::Vector>) -> Result<(), Error> {
        let mut new_values = Vec::with_capacity(2);
        match scheme {
            SchemeKind::DualSplitting | SchemeKind::PressureCorrection => {
                let velocity = scratch
                    .velocity
                    .ok_or_else(|| Error::unsupported("step finished without a velocity"))?;
                let pressure = scratch
                    .pressure
                    .ok_or_else(|| Error::unsupported("step finished without a pressure"))?;
                new_values.push((FieldKind::Velocity, velocity));
                new_values.push((FieldKind::Pressure, pressure));
            }
            SchemeKind::Coupled => {
                let solution = scratch
                    .velocity
                    .ok_or_else(|| Error::unsupported("step finished without a solution"))?;
                new_values.push((FieldKind::Solution, solution));
            }
        }

        for (kind, value) in new_values {
            if let Some((_, history)) = self.fields.iter_mut().find(|(k, _)| *k == kind) {
                history.rotate(value);
            }
        }

        let active = self
            .fields
            .iter()
            .map(|(_, h)| h.active_length())
            .min()
            .unwrap_or(1);
        self.cursor.advance(self.dts.current(), active);
        self.stats.record_step();
        self.dt_pending = true;
        Ok(())
    }
}

/// Builds the initial histories of every field the scheme keeps.
///
/// With a low-order start only `t_0` is prescribed; otherwise the target
/// order's worth of levels `t_0 - i dt` come from the operator.
fn prescribe<O: Operator>(
    operator: &O,
    config: &Config,
    dt: f64,
) -> Result<Vec<(FieldKind, SolutionHistory<O::Vector>)>, Error> {
    let order = config.order();
    let levels = if config.start_with_low_order() {
        1
    } else {
        order
    };

    let mut fields = Vec::new();
    for &kind in scheme_fields(config.scheme()) {
        let mut snapshots = Vec::with_capacity(levels);
        for i in 0..levels {
            #[allow(clippy::cast_precision_loss)]
            let t = config.start_time() - i as f64 * dt;
            snapshots.push(operator.initial_condition(kind, t).map_err(Error::operator)?);
        }
        fields.push((kind, SolutionHistory::from_snapshots(order, snapshots)?));
    }
    Ok(fields)
}
