/// Control actions supported by the BDF integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the run after the step just observed.
    StopEarly,
}
