use std::{collections::BTreeMap, time::Duration};

use cadence_core::SolveReport;

use super::SubStep;

/// Accumulated solver effort for one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubStepStats {
    /// Number of solves.
    pub solves: usize,
    /// Total solver iterations.
    pub iterations: u64,
    /// Wall time spent inside the operator's solve.
    pub wall_time: Duration,
}

impl SubStepStats {
    /// Returns the mean iterations per solve, or zero if nothing was solved.
    #[must_use]
    pub fn average_iterations(&self) -> f64 {
        if self.solves == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let average = self.iterations as f64 / self.solves as f64;
            average
        }
    }
}

/// Iteration counts and timings over a run, per phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationStats {
    sub_steps: BTreeMap<SubStep, SubStepStats>,
    steps: usize,
    non_converged: usize,
}

impl IterationStats {
    pub(crate) fn record_solve(&mut self, step: SubStep, report: SolveReport, elapsed: Duration) {
        let entry = self.sub_steps.entry(step).or_default();
        entry.solves += 1;
        entry.iterations += u64::from(report.iterations);
        entry.wall_time += elapsed;
    }

    pub(crate) fn record_non_converged(&mut self) {
        self.non_converged += 1;
    }

    pub(crate) fn record_step(&mut self) {
        self.steps += 1;
    }

    /// Returns the statistics of one phase, if it ever solved.
    #[must_use]
    pub fn get(&self, step: SubStep) -> Option<&SubStepStats> {
        self.sub_steps.get(&step)
    }

    /// Iterates phases in their natural order.
    pub fn iter(&self) -> impl Iterator<Item = (SubStep, &SubStepStats)> {
        self.sub_steps.iter().map(|(step, stats)| (*step, stats))
    }

    /// Returns the number of completed steps.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Returns how many solves did not converge and were accepted anyway.
    #[must_use]
    pub fn non_converged(&self) -> usize {
        self.non_converged
    }

    #[must_use]
    pub fn total_wall_time(&self) -> Duration {
        self.sub_steps.values().map(|s| s.wall_time).sum()
    }
}
