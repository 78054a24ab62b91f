/// Where an integrator stands in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeCursor {
    time: f64,
    step_number: usize,
    dt: f64,
    target_order: usize,
    active_order: usize,
    from_restart: bool,
}

impl TimeCursor {
    pub(crate) fn new(time: f64, dt: f64, target_order: usize, active_order: usize) -> Self {
        Self {
            time,
            step_number: 1,
            dt,
            target_order,
            active_order,
            from_restart: false,
        }
    }

    pub(crate) fn restarted(
        time: f64,
        step_number: usize,
        dt: f64,
        target_order: usize,
        active_order: usize,
    ) -> Self {
        Self {
            time,
            step_number,
            dt,
            target_order,
            active_order,
            from_restart: true,
        }
    }

    /// Moves past a completed step of size `dt`.
    pub(crate) fn advance(&mut self, dt: f64, active_order: usize) {
        self.time += dt;
        self.step_number += 1;
        self.active_order = active_order.min(self.target_order);
    }

    pub(crate) fn set_dt(&mut self, dt: f64) {
        self.dt = dt;
    }

    /// Returns the current time `t_n`.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns the 1-based number of the step about to be taken.
    #[must_use]
    pub fn step_number(&self) -> usize {
        self.step_number
    }

    /// Returns the size of the step about to be taken.
    #[must_use]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    #[must_use]
    pub fn target_order(&self) -> usize {
        self.target_order
    }

    /// Returns the order used for the next step, limited by available history.
    #[must_use]
    pub fn active_order(&self) -> usize {
        self.active_order
    }

    /// Returns whether the run was resumed from a restart record.
    #[must_use]
    pub fn from_restart(&self) -> bool {
        self.from_restart
    }
}
