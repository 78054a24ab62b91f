use cadence_core::SolveReport;

use super::SubStep;

/// What happened during one completed step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSummary {
    /// Number of the completed step (1-based).
    pub step: usize,
    /// Time reached by the step, `t_{n+1}`.
    pub time: f64,
    /// Size of the completed step.
    pub dt: f64,
    /// BDF order used for the step.
    pub order: usize,
    /// Solver reports in the order the phases ran.
    pub reports: Vec<(SubStep, SolveReport)>,
}

impl StepSummary {
    /// Returns the total solver iterations of the step.
    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.reports
            .iter()
            .map(|(_, report)| u64::from(report.iterations))
            .sum()
    }
}

/// Event emitted by the integrator after each completed step.
#[derive(Debug, Clone)]
pub struct Event<'a> {
    /// The completed step.
    pub summary: &'a StepSummary,
    /// Step size committed for the next step.
    pub next_dt: f64,
}
