use std::collections::VecDeque;

use crate::Error;

/// Past snapshots of one field, most recent first.
///
/// Index 0 holds the solution at `t_n`, index `i` the solution at `t_{n-i}`.
/// The number of retained snapshots grows by one per completed step until it
/// reaches the capacity (the target order), which models the startup ramp:
/// the scheme uses the history that is available rather than zero-padding.
#[derive(Debug, Clone)]
pub struct SolutionHistory<V> {
    snapshots: VecDeque<V>,
    capacity: usize,
}

impl<V> SolutionHistory<V> {
    /// Creates an empty history that retains at most `capacity` snapshots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Creates a history from snapshots ordered most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RestartFormat`] if there are more snapshots than
    /// `capacity` or none at all.
    pub fn from_snapshots(capacity: usize, snapshots: Vec<V>) -> Result<Self, Error> {
        if snapshots.is_empty() || snapshots.len() > capacity {
            return Err(Error::restart(format!(
                "{} snapshots do not fit a history of capacity {capacity}",
                snapshots.len()
            )));
        }
        Ok(Self {
            snapshots: snapshots.into(),
            capacity,
        })
    }

    /// Returns the most recent snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HistoryUnderflow`] if the history is empty.
    pub fn current(&self) -> Result<&V, Error> {
        self.get(0)
    }

    /// Returns the snapshot at `t_{n-i}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HistoryUnderflow`] if `i` is not below the active length.
    pub fn get(&self, i: usize) -> Result<&V, Error> {
        self.snapshots.get(i).ok_or(Error::HistoryUnderflow {
            index: i,
            len: self.snapshots.len(),
        })
    }

    /// Inserts a new current snapshot at slot 0.
    ///
    /// Once the history is at capacity the oldest snapshot is dropped from the
    /// history and handed back so its storage can be reused.
    pub fn rotate(&mut self, new_current: V) -> Option<V> {
        self.snapshots.push_front(new_current);
        if self.snapshots.len() > self.capacity {
            self.snapshots.pop_back()
        } else {
            None
        }
    }

    /// Returns the number of retained snapshots (the active order).
    #[must_use]
    pub fn active_length(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns the maximum number of retained snapshots (the target order).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates snapshots in increasing index (most recent first).
    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.snapshots.iter()
    }
}

/// Past step sizes, most recent first.
///
/// `dt[0]` is the size of the step being taken (`t_{n+1} - t_n`) and `dt[i]`
/// is `t_{n-i+1} - t_{n-i}`. The history is kept full: at startup every slot
/// holds the initial step size. It never holds fewer than one step size.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSizeHistory {
    dts: VecDeque<f64>,
}

impl StepSizeHistory {
    /// Creates a history of `capacity` slots, each holding `dt`.
    #[must_use]
    pub fn filled(capacity: usize, dt: f64) -> Self {
        Self {
            dts: std::iter::repeat_n(dt, capacity.max(1)).collect(),
        }
    }

    /// Creates a history from step sizes ordered most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HistoryUnderflow`] if `dts` is empty.
    pub fn from_slice(dts: &[f64]) -> Result<Self, Error> {
        if dts.is_empty() {
            return Err(Error::HistoryUnderflow { index: 0, len: 0 });
        }
        Ok(Self {
            dts: dts.iter().copied().collect(),
        })
    }

    /// Returns the current step size.
    #[must_use]
    pub fn current(&self) -> f64 {
        self.dts.front().copied().unwrap_or(0.0)
    }

    /// Returns the step sizes, most recent first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.dts.iter().copied().collect()
    }

    /// Returns the step size at index `i`, if retained.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<f64> {
        self.dts.get(i).copied()
    }

    /// Returns the number of retained step sizes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dts.len()
    }

    /// Returns `true` if no step sizes are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dts.is_empty()
    }

    /// Makes `dt` the current step size, shifting older sizes down.
    ///
    /// The oldest step size is dropped once the history is full.
    pub fn push(&mut self, dt: f64) {
        self.dts.pop_back();
        self.dts.push_front(dt);
    }

    /// Replaces the current step size, keeping older sizes.
    pub(crate) fn set_current(&mut self, dt: f64) {
        if let Some(current) = self.dts.front_mut() {
            *current = dt;
        }
    }

    /// Replaces every slot with `dt`.
    ///
    /// Only valid before the first step, when the history is still the
    /// uniform startup assumption.
    pub fn reset(&mut self, dt: f64) {
        self.dts.iter_mut().for_each(|d| *d = dt);
    }

    /// Extends the retained history to `capacity` slots by repeating the
    /// oldest step size.
    pub(crate) fn pad_to(&mut self, capacity: usize) {
        let oldest = self.dts.back().copied().unwrap_or(0.0);
        while self.dts.len() < capacity {
            self.dts.push_back(oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_inserts_at_front() {
        let mut history = SolutionHistory::new(3);
        history.rotate(1);
        history.rotate(2);

        assert_eq!(*history.current().unwrap(), 2);
        assert_eq!(*history.get(1).unwrap(), 1);
        assert_eq!(history.active_length(), 2);
    }

    #[test]
    fn rotate_drops_oldest_at_capacity() {
        let mut history = SolutionHistory::new(2);
        assert_eq!(history.rotate(1), None);
        assert_eq!(history.rotate(2), None);
        assert_eq!(history.rotate(3), Some(1));

        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![3, 2]);
    }

    #[test]
    fn get_beyond_active_length_underflows() {
        let mut history = SolutionHistory::new(4);
        history.rotate(1.0);

        assert!(matches!(
            history.get(1),
            Err(Error::HistoryUnderflow { index: 1, len: 1 })
        ));
        assert!(SolutionHistory::<f64>::new(1).current().is_err());
    }

    #[test]
    fn active_length_ramps_up_to_target_order() {
        for target in 1..=4 {
            let mut history = SolutionHistory::new(target);
            history.rotate(0);
            for step in 1..=8 {
                assert_eq!(history.active_length(), step.min(target));
                history.rotate(step);
            }
        }
    }

    #[test]
    fn from_snapshots_checks_capacity() {
        assert!(SolutionHistory::from_snapshots(2, vec![1, 2]).is_ok());
        assert!(SolutionHistory::from_snapshots(2, vec![1, 2, 3]).is_err());
        assert!(SolutionHistory::<i32>::from_snapshots(2, vec![]).is_err());
    }

    #[test]
    fn step_sizes_shift_on_push() {
        let mut dts = StepSizeHistory::filled(3, 0.1);
        dts.push(0.2);
        assert_eq!(dts.to_vec(), vec![0.2, 0.1, 0.1]);

        dts.push(0.3);
        dts.push(0.4);
        assert_eq!(dts.to_vec(), vec![0.4, 0.3, 0.2]);
        assert_eq!(dts.current(), 0.4);
    }

    #[test]
    fn step_sizes_are_never_empty() {
        assert!(matches!(
            StepSizeHistory::from_slice(&[]),
            Err(Error::HistoryUnderflow { index: 0, len: 0 })
        ));
        assert_eq!(StepSizeHistory::filled(0, 0.3).to_vec(), vec![0.3]);
    }

    #[test]
    fn reset_and_pad() {
        let mut dts = StepSizeHistory::from_slice(&[0.2, 0.1]).unwrap();
        dts.pad_to(4);
        assert_eq!(dts.to_vec(), vec![0.2, 0.1, 0.1, 0.1]);

        dts.reset(0.5);
        assert_eq!(dts.to_vec(), vec![0.5; 4]);
    }
}
