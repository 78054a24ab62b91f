use crate::{Collective, FieldVector, SERIAL};

/// A physical field whose history the engine maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Velocity of a split (segregated) flow solver.
    Velocity,

    /// Pressure of a split (segregated) flow solver.
    Pressure,

    /// The full unknown of a monolithic (coupled) solve.
    Solution,
}

/// Spatial operators the engine evaluates to build right-hand sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    /// Body force (source term) at the given time, in the space of the input.
    BodyForce,

    /// Convective term `c(u)` with the inverse mass matrix applied.
    Convective,

    /// Velocity divergence, mapping velocity into the pressure space.
    Divergence,

    /// Pressure gradient, mapping pressure into the velocity space.
    PressureGradient,

    /// Mass matrix applied to a velocity.
    MassMatrix,

    /// Residual of the steady governing equations at the input state.
    SteadyResidual,
}

/// Sub-problems the engine asks the operator to solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubproblemKind {
    /// Nonlinear convective step of a splitting scheme (implicit convection).
    Convective,

    /// Momentum step of a pressure-correction scheme.
    Momentum,

    /// Pressure Poisson problem.
    Pressure,

    /// Projection of the intermediate velocity.
    Projection,

    /// Viscous (Helmholtz-type) step.
    Viscous,

    /// Monolithic solve of all coupled unknowns.
    Coupled,
}

/// Time-level information passed to every sub-problem solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveContext {
    /// Time level being solved for, `t_{n+1}`.
    pub time: f64,

    /// Current step size.
    pub dt: f64,

    /// Scaling of the time-derivative term, `gamma_0 / dt`.
    pub scaling: f64,

    /// Number of the step being taken (1-based).
    pub step: usize,
}

/// What a sub-problem solve reports back to the engine.
///
/// A solver that fails to converge still returns a report; whether that is an
/// error is decided by the engine's configured policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveReport {
    /// Iterations used by the (linear or nonlinear) solver.
    pub iterations: u32,

    /// Whether the solver met its tolerances.
    pub converged: bool,
}

impl SolveReport {
    /// A report for a solve that met its tolerances.
    #[must_use]
    pub fn converged(iterations: u32) -> Self {
        Self {
            iterations,
            converged: true,
        }
    }

    /// A report for a solve that stopped without meeting its tolerances.
    #[must_use]
    pub fn not_converged(iterations: u32) -> Self {
        Self {
            iterations,
            converged: false,
        }
    }
}

/// Mesh quantities that bound admissible step sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshMetric {
    /// Smallest characteristic element length (global).
    pub h_min: f64,

    /// Polynomial degree of the spatial discretization.
    pub degree: u32,
}

/// The external spatial discretization driven by the engine.
///
/// The engine never looks inside a field snapshot beyond the
/// [`FieldVector`] operations; assembly, matrix-free evaluation, linear and
/// nonlinear solves, preconditioning and boundary conditions all live behind
/// this trait.
pub trait Operator {
    type Vector: FieldVector;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Allocates a zeroed, correctly sized snapshot for a field.
    fn dof_vector(&self, field: FieldKind) -> Self::Vector;

    /// Returns the prescribed (initial or analytical) state of a field.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the state cannot be prescribed.
    fn initial_condition(&self, field: FieldKind, time: f64) -> Result<Self::Vector, Self::Error>;

    /// Evaluates a spatial operator, typically to build a right-hand side.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the evaluation fails.
    fn evaluate(
        &self,
        kind: OperatorKind,
        input: &Self::Vector,
        time: f64,
    ) -> Result<Self::Vector, Self::Error>;

    /// Solves one sub-problem for the given right-hand side.
    ///
    /// The initial guess is an extrapolation of past solutions to the new
    /// time level.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the solve cannot be carried out at all.
    /// A solver that merely fails to converge should report that through
    /// [`SolveReport::converged`] instead.
    fn solve(
        &self,
        kind: SubproblemKind,
        rhs: &Self::Vector,
        initial_guess: &Self::Vector,
        ctx: &SolveContext,
    ) -> Result<(Self::Vector, SolveReport), Self::Error>;

    /// Returns the mesh quantities used for step-size selection.
    fn mesh_metric(&self) -> MeshMetric;

    /// Returns the reductions used for global norms and step-size decisions.
    ///
    /// The default is a single-partition run.
    fn collective(&self) -> &dyn Collective {
        &SERIAL
    }
}
