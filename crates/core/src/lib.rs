//! Core traits and types for the Cadence time-integration engine.
//!
//! This crate defines the contracts between the BDF engine and the external
//! spatial discretization it drives:
//!
//! - [`FieldVector`]: a vector of degrees of freedom for one field
//! - [`Collective`]: global reductions across the partitions of a domain
//! - [`Operator`]: evaluates spatial operators and solves sub-problems
//! - [`ConvectiveTransport`] and [`ExplicitSubIntegrator`]: the explicit
//!   transport sub-stepping used for operator-integration-factor splitting
//! - [`TransportInterpolant`]: a polynomial in time through past snapshots
//! - [`Observer`]: receives engine events and optionally returns control actions

mod collective;
mod observer;
mod operator;
mod transport;
mod vector;

pub use collective::{Collective, SERIAL, Serial, global_l2_norm, global_max_abs};
pub use observer::Observer;
pub use operator::{
    FieldKind, MeshMetric, Operator, OperatorKind, SolveContext, SolveReport, SubproblemKind,
};
pub use transport::{ConvectiveTransport, ExplicitSubIntegrator, TransportInterpolant};
pub use vector::FieldVector;
