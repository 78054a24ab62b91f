use cadence_core::{FieldVector, Operator, OperatorKind};

use crate::{
    BdfIntegrator, Error,
    config::{ConvergenceCriterion, SchemeKind, SteadyConfig},
    sequencer::scheme_fields,
};

/// Norms below this are treated as zero when forming relative measures.
const ZERO_NORM: f64 = 1e-10;

/// The result of marching to a steady state.
#[derive(Debug, Clone, PartialEq)]
pub struct SteadySolution {
    /// Pseudo-time steps taken.
    pub steps: usize,
    /// Pseudo-time reached.
    pub time: f64,
    /// Convergence measure after every step, in step order.
    pub measures: Vec<f64>,
}

/// Marches an integrator in pseudo-time until its fields stop changing.
///
/// The end time of the integrator's configuration is ignored; the step
/// budget of the [`SteadyConfig`] bounds the run instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteadyStateDriver {
    config: SteadyConfig,
}

impl SteadyStateDriver {
    #[must_use]
    pub fn new(config: SteadyConfig) -> Self {
        Self { config }
    }

    /// Steps `integrator` until the convergence criterion is met.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedScheme`] before the first step if the
    /// residual criterion is used with a split scheme,
    /// [`Error::SteadyStateNotReached`] if the step budget runs out, or any
    /// error raised by a step.
    pub fn run<O: Operator>(&self, integrator: &mut BdfIntegrator<O>) -> Result<SteadySolution, Error> {
        let scheme = integrator.config().scheme();
        let criterion = self.config.criterion();
        if criterion == ConvergenceCriterion::Residual && scheme != SchemeKind::Coupled {
            return Err(Error::unsupported(format!(
                "residual convergence check needs a coupled scheme, not {scheme:?}"
            )));
        }

        let initial_residual = match criterion {
            ConvergenceCriterion::Residual => residual_norm(integrator)?,
            ConvergenceCriterion::SolutionIncrement => 0.0,
        };

        tracing::info!(
            ?criterion,
            abs_tol = self.config.abs_tol(),
            rel_tol = self.config.rel_tol(),
            max_steps = self.config.max_steps(),
            "marching to steady state"
        );

        let mut measures = Vec::new();
        for step in 1..=self.config.max_steps() {
            let (absolute, relative) = match criterion {
                ConvergenceCriterion::SolutionIncrement => {
                    let previous = current_fields(integrator)?;
                    integrator.do_timestep()?;
                    increment_norms(integrator, &previous)?
                }
                ConvergenceCriterion::Residual => {
                    integrator.do_timestep()?;
                    let r = residual_norm(integrator)?;
                    let relative = if initial_residual > ZERO_NORM {
                        r / initial_residual
                    } else {
                        1.0
                    };
                    (r, relative)
                }
            };

            measures.push(absolute);
            tracing::debug!(step, absolute, relative, "steady-state measure");

            if absolute < self.config.abs_tol() || relative < self.config.rel_tol() {
                tracing::info!(steps = step, absolute, relative, "steady state reached");
                return Ok(SteadySolution {
                    steps: step,
                    time: integrator.time(),
                    measures,
                });
            }
        }

        Err(Error::SteadyStateNotReached {
            steps: self.config.max_steps(),
            last: measures.last().copied().unwrap_or(f64::INFINITY),
        })
    }
}

fn current_fields<O: Operator>(integrator: &BdfIntegrator<O>) -> Result<Vec<O::Vector>, Error> {
    scheme_fields(integrator.config().scheme())
        .iter()
        .map(|&kind| {
            integrator
                .solution(kind)
                .cloned()
                .ok_or_else(|| Error::unsupported(format!("no {kind:?} history")))
        })
        .collect()
}

/// Returns the combined increment norm over all fields and its size relative
/// to the combined solution norm.
fn increment_norms<O: Operator>(
    integrator: &BdfIntegrator<O>,
    previous: &[O::Vector],
) -> Result<(f64, f64), Error> {
    let comm = integrator.operator().collective();
    let current = current_fields(integrator)?;

    let mut increment_sq = 0.0;
    let mut norm_sq = 0.0;
    for (now, before) in current.iter().zip(previous) {
        let mut delta = now.clone();
        delta.axpy(-1.0, before);
        increment_sq += comm.sum(delta.local_dot(&delta));
        norm_sq += comm.sum(now.local_dot(now));
    }

    let increment = increment_sq.sqrt();
    let norm = norm_sq.sqrt();
    let relative = if norm > ZERO_NORM {
        increment / norm
    } else {
        1.0
    };
    Ok((increment, relative))
}

fn residual_norm<O: Operator>(integrator: &BdfIntegrator<O>) -> Result<f64, Error> {
    let solution = current_fields(integrator)?;
    let mut norm_sq = 0.0;
    for u in &solution {
        let r = integrator
            .operator()
            .evaluate(OperatorKind::SteadyResidual, u, integrator.time())
            .map_err(Error::operator)?;
        norm_sq += integrator.operator().collective().sum(r.local_dot(&r));
    }
    Ok(norm_sq.sqrt())
}
