use crate::{FieldVector, Operator};

/// Convective transport of a quantity by a frozen transport field.
///
/// This is the right-hand side of the operator-integration-factor sub-problem
/// `d(u~)/ds = -c(u~; w(s))`, where only `u~` evolves and `w` is supplied by a
/// [`TransportInterpolant`].
pub trait ConvectiveTransport: Operator {
    /// Returns the rate of change of `transported` under transport by `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`Operator::Error`] if the evaluation fails.
    fn transport_rate(
        &self,
        transported: &Self::Vector,
        transport: &Self::Vector,
        time: f64,
    ) -> Result<Self::Vector, Self::Error>;
}

/// Advances the transported quantity by one explicit sub-step.
///
/// Implementations must be deterministic: identical inputs produce
/// bit-identical outputs.
pub trait ExplicitSubIntegrator<O: Operator> {
    /// Advances `state` from `time` to `time + dt`.
    ///
    /// # Errors
    ///
    /// Returns [`Operator::Error`] if the operator fails.
    fn advance(
        &self,
        operator: &O,
        state: O::Vector,
        time: f64,
        dt: f64,
        transport: &TransportInterpolant<'_, O::Vector>,
    ) -> Result<O::Vector, O::Error>;
}

/// A polynomial in time through past snapshots of a transport field.
///
/// With `q` snapshots the interpolant has degree `q - 1`. Evaluating outside
/// the sampled interval extrapolates.
#[derive(Debug, Clone)]
pub struct TransportInterpolant<'a, V> {
    snapshots: Vec<&'a V>,
    times: Vec<f64>,
}

impl<'a, V: FieldVector> TransportInterpolant<'a, V> {
    /// Builds an interpolant from snapshots and their (distinct) times.
    ///
    /// Returns `None` if there are no snapshots or the lengths differ.
    #[must_use]
    pub fn new(snapshots: Vec<&'a V>, times: Vec<f64>) -> Option<Self> {
        if snapshots.is_empty() || snapshots.len() != times.len() {
            return None;
        }
        Some(Self { snapshots, times })
    }

    /// Returns the polynomial degree.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.times.len() - 1
    }

    /// Returns the sample times, most recent first.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Returns the Lagrange weights of each snapshot at time `t`.
    #[must_use]
    pub fn weights(&self, t: f64) -> Vec<f64> {
        let times = &self.times;
        (0..times.len())
            .map(|i| {
                times
                    .iter()
                    .enumerate()
                    .filter(|&(m, _)| m != i)
                    .map(|(_, &tm)| (t - tm) / (times[i] - tm))
                    .product()
            })
            .collect()
    }

    /// Evaluates the interpolant at time `t`.
    ///
    /// Contributions are accumulated in increasing snapshot index.
    #[must_use]
    pub fn evaluate(&self, t: f64) -> V {
        let weights = self.weights(t);
        let mut value = self.snapshots[0].clone();
        value.assign_scaled(weights[0], self.snapshots[0]);
        for (w, snapshot) in weights.iter().zip(&self.snapshots).skip(1) {
            value.axpy(*w, snapshot);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn constant_for_single_snapshot() {
        let u = vec![1.0, 2.0];
        let interp = TransportInterpolant::new(vec![&u], vec![0.0]).unwrap();

        assert_eq!(interp.degree(), 0);
        assert_eq!(interp.evaluate(5.0), u);
    }

    #[test]
    fn linear_extrapolation_is_exact() {
        // w(t) = 1 + 2t sampled at t = 1 and t = 0.
        let w1 = vec![3.0];
        let w0 = vec![1.0];
        let interp = TransportInterpolant::new(vec![&w1, &w0], vec![1.0, 0.0]).unwrap();

        assert_relative_eq!(interp.evaluate(1.5)[0], 4.0);
        assert_relative_eq!(interp.evaluate(0.25)[0], 1.5);
    }

    #[test]
    fn quadratic_through_three_points() {
        // w(t) = t^2 at t = 2, 1, 0.
        let (a, b, c) = (vec![4.0], vec![1.0], vec![0.0]);
        let interp = TransportInterpolant::new(vec![&a, &b, &c], vec![2.0, 1.0, 0.0]).unwrap();

        assert_relative_eq!(interp.evaluate(3.0)[0], 9.0, epsilon = 1e-12);
        let weights = interp.weights(3.0);
        assert_relative_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let u = vec![0.0];
        assert!(TransportInterpolant::new(vec![&u], vec![0.0, 1.0]).is_none());
        assert!(TransportInterpolant::<Vec<f64>>::new(vec![], vec![]).is_none());
    }
}
