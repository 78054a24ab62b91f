//! Operator-integration-factor (OIF) sub-stepping.
//!
//! With OIF splitting the convective term is not extrapolated. Instead every
//! history snapshot `u_i` is transported from its own time level `t_{n-i}` up
//! to `t_{n+1}` by solving the pure transport problem `du~/ds = -c(u~; w(s))`
//! with an explicit sub-integrator, where `w` is the interpolant through the
//! history. The transported snapshots then replace `u_i` in the BDF sum.

mod runge_kutta;

pub use runge_kutta::ExplicitRungeKutta;

use cadence_core::{ExplicitSubIntegrator, FieldVector, Operator, TransportInterpolant};

use crate::{
    Error,
    coefficients::CoefficientSet,
    history::{SolutionHistory, StepSizeHistory},
};

/// Computes the transported BDF sum `sum_i (alpha_i / dt) u~_i`.
pub struct OifSubstepper<O: Operator> {
    integrator: Box<dyn ExplicitSubIntegrator<O>>,
    substeps: usize,
}

impl<O: Operator> OifSubstepper<O> {
    /// Creates a substepper taking `substeps` sub-steps per history level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedScheme`] if `substeps` is zero.
    pub fn new(integrator: Box<dyn ExplicitSubIntegrator<O>>, substeps: usize) -> Result<Self, Error> {
        if substeps == 0 {
            return Err(Error::unsupported("OIF sub-stepping needs at least one substep"));
        }
        Ok(Self {
            integrator,
            substeps,
        })
    }

    #[must_use]
    pub fn substeps(&self) -> usize {
        self.substeps
    }

    /// Returns the transported sum for the step from `time` (`t_n`) to
    /// `t_n + dts[0]`.
    ///
    /// Snapshot `u_i` is advanced over `[t_{n-i}, t_{n+1}]` in
    /// `substeps * (i + 1)` equal sub-steps; the span is the true,
    /// possibly non-uniform interval `dts[0] + ... + dts[i]`. Terms are
    /// accumulated in increasing `i`, which makes the result bit-for-bit
    /// reproducible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HistoryUnderflow`] if the history or step sizes are
    /// shorter than the coefficient order, or [`Error::Operator`] if a
    /// transport evaluation fails.
    pub fn transported_sum(
        &self,
        operator: &O,
        history: &SolutionHistory<O::Vector>,
        dts: &StepSizeHistory,
        coefficients: &CoefficientSet,
        time: f64,
    ) -> Result<O::Vector, Error> {
        let order = coefficients.order();
        let dt = dts.current();

        let times = level_times(dts, order, time)?;
        let snapshots = (0..order)
            .map(|i| history.get(i))
            .collect::<Result<Vec<_>, _>>()?;
        let transport = TransportInterpolant::new(snapshots.clone(), times.clone()).ok_or(
            Error::HistoryUnderflow {
                index: 0,
                len: history.active_length(),
            },
        )?;

        let t_end = time + dt;
        let mut sum: Option<O::Vector> = None;

        for (i, (&alpha, &u_i)) in coefficients.alpha().iter().zip(&snapshots).enumerate() {
            let steps = self.substeps * (i + 1);
            let ds = (t_end - times[i]) / steps as f64;

            let mut transported = u_i.clone();
            let mut s = times[i];
            for _ in 0..steps {
                transported = self
                    .integrator
                    .advance(operator, transported, s, ds, &transport)
                    .map_err(Error::operator)?;
                s += ds;
            }
            tracing::trace!(level = i, steps, ds, "transported history level");

            match sum.as_mut() {
                Some(acc) => acc.axpy(alpha / dt, &transported),
                None => {
                    transported.scale(alpha / dt);
                    sum = Some(transported);
                }
            }
        }

        sum.ok_or(Error::HistoryUnderflow { index: 0, len: 0 })
    }
}

/// Returns the time levels `t_n, t_{n-1}, ...` of the first `order` history
/// slots.
pub(crate) fn level_times(dts: &StepSizeHistory, order: usize, time: f64) -> Result<Vec<f64>, Error> {
    let mut times = Vec::with_capacity(order);
    let mut t = time;
    for i in 0..order {
        if i > 0 {
            t -= dts.get(i).ok_or(Error::HistoryUnderflow {
                index: i,
                len: dts.len(),
            })?;
        }
        times.push(t);
    }
    Ok(times)
}
