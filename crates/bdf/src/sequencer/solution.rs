/// Indicates why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Reached the configured end time.
    ReachedEndTime,
    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

/// The result of a transient run.
///
/// The final field values stay in the integrator's histories.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    /// Final run status.
    pub status: Status,
    /// Steps taken by this call.
    pub steps: usize,
    /// Time reached.
    pub time: f64,
}
