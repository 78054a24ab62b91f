#![allow(dead_code)]

use std::{cell::RefCell, convert::Infallible, f64::consts::PI};

use cadence_core::{
    ConvectiveTransport, FieldKind, MeshMetric, Operator, OperatorKind, SolveContext,
    SolveReport, SubproblemKind,
};

/// Scalar decay `du/dt = -lambda u` with exact solution `exp(-lambda t)`.
pub struct Decay {
    pub lambda: f64,
}

impl Operator for Decay {
    type Vector = Vec<f64>;
    type Error = Infallible;

    fn dof_vector(&self, _field: FieldKind) -> Vec<f64> {
        vec![0.0]
    }

    fn initial_condition(&self, _field: FieldKind, time: f64) -> Result<Vec<f64>, Infallible> {
        Ok(vec![(-self.lambda * time).exp()])
    }

    fn evaluate(&self, kind: OperatorKind, input: &Vec<f64>, _time: f64) -> Result<Vec<f64>, Infallible> {
        Ok(match kind {
            OperatorKind::SteadyResidual => vec![-self.lambda * input[0]],
            OperatorKind::MassMatrix => input.clone(),
            _ => vec![0.0],
        })
    }

    fn solve(
        &self,
        _kind: SubproblemKind,
        rhs: &Vec<f64>,
        _initial_guess: &Vec<f64>,
        ctx: &SolveContext,
    ) -> Result<(Vec<f64>, SolveReport), Infallible> {
        Ok((vec![rhs[0] / (ctx.scaling + self.lambda)], SolveReport::converged(1)))
    }

    fn mesh_metric(&self) -> MeshMetric {
        MeshMetric {
            h_min: 1.0,
            degree: 1,
        }
    }
}

/// Heat equation `u_t = nu u_xx + f` on (0, 1) with homogeneous Dirichlet
/// boundaries, second-order finite differences on `n` interior nodes.
///
/// Convection, when used, is `-w u_x` with central differences.
pub struct Diffusion1d {
    pub n: usize,
    pub nu: f64,
    pub source: f64,
}

impl Diffusion1d {
    pub fn h(&self) -> f64 {
        1.0 / (self.n as f64 + 1.0)
    }

    /// Solves `(s I - nu A) u = rhs` with the Thomas algorithm.
    pub fn helmholtz(&self, s: f64, rhs: &[f64]) -> Vec<f64> {
        let n = self.n;
        let off = -self.nu / (self.h() * self.h());
        let diag = s - 2.0 * off;

        let mut c = vec![0.0; n];
        let mut d = vec![0.0; n];
        c[0] = off / diag;
        d[0] = rhs[0] / diag;
        for i in 1..n {
            let m = diag - off * c[i - 1];
            c[i] = off / m;
            d[i] = (rhs[i] - off * d[i - 1]) / m;
        }

        let mut u = vec![0.0; n];
        u[n - 1] = d[n - 1];
        for i in (0..n - 1).rev() {
            u[i] = d[i] - c[i] * u[i + 1];
        }
        u
    }

    /// Returns the steady solution of `-nu A u = f`.
    pub fn steady_state(&self) -> Vec<f64> {
        self.helmholtz(0.0, &vec![self.source; self.n])
    }

    fn laplacian(&self, u: &[f64]) -> Vec<f64> {
        let h2 = self.h() * self.h();
        (0..self.n)
            .map(|i| {
                let left = if i > 0 { u[i - 1] } else { 0.0 };
                let right = if i + 1 < self.n { u[i + 1] } else { 0.0 };
                (left - 2.0 * u[i] + right) / h2
            })
            .collect()
    }
}

impl Operator for Diffusion1d {
    type Vector = Vec<f64>;
    type Error = Infallible;

    fn dof_vector(&self, _field: FieldKind) -> Vec<f64> {
        vec![0.0; self.n]
    }

    fn initial_condition(&self, _field: FieldKind, _time: f64) -> Result<Vec<f64>, Infallible> {
        let h = self.h();
        Ok((1..=self.n).map(|i| (PI * i as f64 * h).sin()).collect())
    }

    fn evaluate(&self, kind: OperatorKind, input: &Vec<f64>, _time: f64) -> Result<Vec<f64>, Infallible> {
        Ok(match kind {
            OperatorKind::BodyForce => vec![self.source; self.n],
            OperatorKind::SteadyResidual => self
                .laplacian(input)
                .iter()
                .map(|v| self.nu * v + self.source)
                .collect(),
            OperatorKind::MassMatrix => input.clone(),
            _ => vec![0.0; self.n],
        })
    }

    fn solve(
        &self,
        _kind: SubproblemKind,
        rhs: &Vec<f64>,
        _initial_guess: &Vec<f64>,
        ctx: &SolveContext,
    ) -> Result<(Vec<f64>, SolveReport), Infallible> {
        Ok((self.helmholtz(ctx.scaling, rhs), SolveReport::converged(1)))
    }

    fn mesh_metric(&self) -> MeshMetric {
        MeshMetric {
            h_min: self.h(),
            degree: 1,
        }
    }
}

impl ConvectiveTransport for Diffusion1d {
    fn transport_rate(
        &self,
        transported: &Vec<f64>,
        transport: &Vec<f64>,
        _time: f64,
    ) -> Result<Vec<f64>, Infallible> {
        let h = self.h();
        let n = self.n;
        Ok((0..n)
            .map(|i| {
                let left = if i > 0 { transported[i - 1] } else { 0.0 };
                let right = if i + 1 < n { transported[i + 1] } else { 0.0 };
                -transport[i] * (right - left) / (2.0 * h)
            })
            .collect())
    }
}

/// One interaction of the engine with an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Evaluate(OperatorKind),
    Solve(SubproblemKind),
}

/// Records every call and answers with trivial values.
///
/// Every field has `n` values, every evaluation returns its input and every
/// solve returns its right-hand side.
pub struct Recorder {
    pub n: usize,
    pub converged: bool,
    pub calls: RefCell<Vec<Call>>,
}

impl Recorder {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            converged: true,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(n: usize) -> Self {
        Self {
            converged: false,
            ..Self::new(n)
        }
    }

    pub fn solves(&self) -> Vec<SubproblemKind> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Solve(kind) => Some(*kind),
                Call::Evaluate(_) => None,
            })
            .collect()
    }
}

impl Operator for Recorder {
    type Vector = Vec<f64>;
    type Error = Infallible;

    fn dof_vector(&self, _field: FieldKind) -> Vec<f64> {
        vec![0.0; self.n]
    }

    fn initial_condition(&self, _field: FieldKind, _time: f64) -> Result<Vec<f64>, Infallible> {
        Ok(vec![1.0; self.n])
    }

    fn evaluate(&self, kind: OperatorKind, input: &Vec<f64>, _time: f64) -> Result<Vec<f64>, Infallible> {
        self.calls.borrow_mut().push(Call::Evaluate(kind));
        Ok(input.clone())
    }

    fn solve(
        &self,
        kind: SubproblemKind,
        rhs: &Vec<f64>,
        _initial_guess: &Vec<f64>,
        _ctx: &SolveContext,
    ) -> Result<(Vec<f64>, SolveReport), Infallible> {
        self.calls.borrow_mut().push(Call::Solve(kind));
        let report = if self.converged {
            SolveReport::converged(3)
        } else {
            SolveReport::not_converged(50)
        };
        Ok((rhs.clone(), report))
    }

    fn mesh_metric(&self) -> MeshMetric {
        MeshMetric {
            h_min: 0.1,
            degree: 2,
        }
    }
}
