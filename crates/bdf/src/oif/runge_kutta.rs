use cadence_core::{ConvectiveTransport, ExplicitSubIntegrator, FieldVector, TransportInterpolant};

use crate::Error;

/// Butcher tableau of an explicit Runge-Kutta method.
struct Tableau {
    a: &'static [&'static [f64]],
    b: &'static [f64],
    c: &'static [f64],
}

const EULER: Tableau = Tableau {
    a: &[&[]],
    b: &[1.0],
    c: &[0.0],
};

const MIDPOINT: Tableau = Tableau {
    a: &[&[], &[0.5]],
    b: &[0.0, 1.0],
    c: &[0.0, 0.5],
};

const HEUN3: Tableau = Tableau {
    a: &[&[], &[1.0 / 3.0], &[0.0, 2.0 / 3.0]],
    b: &[0.25, 0.0, 0.75],
    c: &[0.0, 1.0 / 3.0, 2.0 / 3.0],
};

const CLASSIC4: Tableau = Tableau {
    a: &[&[], &[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]],
    b: &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
    c: &[0.0, 0.5, 0.5, 1.0],
};

/// Classical explicit Runge-Kutta methods of order 1 to 4.
///
/// The transport field at each stage time comes from the interpolant; only
/// the transported quantity is integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplicitRungeKutta {
    order: usize,
}

impl ExplicitRungeKutta {
    /// Creates a method of the given order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOrder`] if `order` is not between 1 and 4.
    pub fn new(order: usize) -> Result<Self, Error> {
        if (1..=4).contains(&order) {
            Ok(Self { order })
        } else {
            Err(Error::InvalidOrder { order })
        }
    }

    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    fn tableau(&self) -> &'static Tableau {
        match self.order {
            1 => &EULER,
            2 => &MIDPOINT,
            3 => &HEUN3,
            _ => &CLASSIC4,
        }
    }
}

impl<O: ConvectiveTransport> ExplicitSubIntegrator<O> for ExplicitRungeKutta {
    fn advance(
        &self,
        operator: &O,
        state: O::Vector,
        time: f64,
        dt: f64,
        transport: &TransportInterpolant<'_, O::Vector>,
    ) -> Result<O::Vector, O::Error> {
        let tableau = self.tableau();
        let mut rates: Vec<O::Vector> = Vec::with_capacity(tableau.b.len());

        for (a_row, &c) in tableau.a.iter().zip(tableau.c) {
            let mut stage = state.clone();
            for (a, k) in a_row.iter().zip(&rates) {
                if *a != 0.0 {
                    stage.axpy(dt * a, k);
                }
            }
            let t = time + c * dt;
            let w = transport.evaluate(t);
            rates.push(operator.transport_rate(&stage, &w, t)?);
        }

        let mut next = state;
        for (b, k) in tableau.b.iter().zip(&rates) {
            if *b != 0.0 {
                next.axpy(dt * b, k);
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use approx::assert_relative_eq;
    use cadence_core::{
        FieldKind, MeshMetric, Operator, OperatorKind, SolveContext, SolveReport, SubproblemKind,
    };

    /// `du/ds = -lambda * u + w(s)`.
    struct LinearTransport {
        lambda: f64,
    }

    impl Operator for LinearTransport {
        type Vector = Vec<f64>;
        type Error = Infallible;

        fn dof_vector(&self, _field: FieldKind) -> Vec<f64> {
            vec![0.0]
        }

        fn initial_condition(&self, _field: FieldKind, _time: f64) -> Result<Vec<f64>, Infallible> {
            Ok(vec![1.0])
        }

        fn evaluate(
            &self,
            _kind: OperatorKind,
            input: &Vec<f64>,
            _time: f64,
        ) -> Result<Vec<f64>, Infallible> {
            Ok(input.clone())
        }

        fn solve(
            &self,
            _kind: SubproblemKind,
            rhs: &Vec<f64>,
            _initial_guess: &Vec<f64>,
            _ctx: &SolveContext,
        ) -> Result<(Vec<f64>, SolveReport), Infallible> {
            Ok((rhs.clone(), SolveReport::converged(0)))
        }

        fn mesh_metric(&self) -> MeshMetric {
            MeshMetric {
                h_min: 1.0,
                degree: 1,
            }
        }
    }

    impl ConvectiveTransport for LinearTransport {
        fn transport_rate(
            &self,
            transported: &Vec<f64>,
            transport: &Vec<f64>,
            _time: f64,
        ) -> Result<Vec<f64>, Infallible> {
            Ok(vec![-self.lambda * transported[0] + transport[0]])
        }
    }

    fn integrate(order: usize, steps: usize) -> f64 {
        let op = LinearTransport { lambda: 1.0 };
        let rk = ExplicitRungeKutta::new(order).unwrap();
        let zero = vec![0.0];
        let w = TransportInterpolant::new(vec![&zero], vec![0.0]).unwrap();

        let dt = 1.0 / steps as f64;
        let mut u = vec![1.0];
        for s in 0..steps {
            u = rk.advance(&op, u, s as f64 * dt, dt, &w).unwrap();
        }
        u[0]
    }

    #[test]
    fn rejects_invalid_orders() {
        assert!(matches!(
            ExplicitRungeKutta::new(0),
            Err(Error::InvalidOrder { order: 0 })
        ));
        assert!(ExplicitRungeKutta::new(5).is_err());
    }

    #[test]
    fn tableaus_are_consistent() {
        for order in 1..=4 {
            let tableau = ExplicitRungeKutta::new(order).unwrap().tableau();
            assert_eq!(tableau.b.len(), tableau.c.len());
            assert_relative_eq!(tableau.b.iter().sum::<f64>(), 1.0, epsilon = 1e-15);
            for (row, c) in tableau.a.iter().zip(tableau.c) {
                assert_relative_eq!(row.iter().sum::<f64>(), *c, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn converges_at_design_order() {
        let exact = (-1.0_f64).exp();
        for order in 1..=4 {
            let coarse = (integrate(order, 20) - exact).abs();
            let fine = (integrate(order, 40) - exact).abs();
            let observed = (coarse / fine).log2();
            assert!(
                (observed - order as f64).abs() < 0.2,
                "order {order}: observed {observed}"
            );
        }
    }

    #[test]
    fn uses_interpolated_transport_field() {
        // w(s) = s, lambda = 0: u(1) = u(0) + 1/2, exact for RK2 and above.
        let op = LinearTransport { lambda: 0.0 };
        let (w1, w0) = (vec![1.0], vec![0.0]);
        let w = TransportInterpolant::new(vec![&w1, &w0], vec![1.0, 0.0]).unwrap();

        for order in 2..=4 {
            let rk = ExplicitRungeKutta::new(order).unwrap();
            let u = rk.advance(&op, vec![0.0], 0.0, 1.0, &w).unwrap();
            assert_relative_eq!(u[0], 0.5, epsilon = 1e-14);
        }
    }
}
