/// Watches a time integration step by step.
///
/// After every completed step an integrator hands its observer a borrowed
/// event of type `E` describing the step (time reached, step size, order,
/// solver reports). Returning `Some(action)` asks the integrator to act on
/// it, for example to stop before the end time; returning `None` continues
/// the run.
///
/// Any `FnMut(&E) -> Option<A>` closure is an observer, `()` is the observer
/// that never intervenes, and a pair `(P, Q)` lets a monitoring observer run
/// beside one that steers.
pub trait Observer<E, A> {
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}

/// Both observers see every event; the first one's action takes precedence.
impl<E, A, P, Q> Observer<E, A> for (P, Q)
where
    P: Observer<E, A>,
    Q: Observer<E, A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        let first = self.0.observe(event);
        let second = self.1.observe(event);
        first.or(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Halt {
        Early,
        Late,
    }

    fn drive<O: Observer<f64, Halt>>(observer: &mut O, times: &[f64]) -> (usize, Option<Halt>) {
        for (i, t) in times.iter().enumerate() {
            if let Some(action) = observer.observe(t) {
                return (i, Some(action));
            }
        }
        (times.len(), None)
    }

    #[test]
    fn closure_stops_the_run() {
        let mut stop = |t: &f64| (*t > 0.25).then_some(Halt::Early);
        assert_eq!(drive(&mut stop, &[0.1, 0.2, 0.3, 0.4]), (2, Some(Halt::Early)));
    }

    #[test]
    fn unit_never_intervenes() {
        assert_eq!(drive(&mut (), &[0.1, 0.2, 0.3]), (3, None));
    }

    #[test]
    fn pair_sees_every_event_and_prefers_the_first_action() {
        let mut seen = Vec::new();
        let mut pair = (
            |t: &f64| (*t > 0.25).then_some(Halt::Early),
            |t: &f64| {
                seen.push(*t);
                (*t > 0.15).then_some(Halt::Late)
            },
        );

        assert_eq!(drive(&mut pair, &[0.1, 0.2, 0.3]), (1, Some(Halt::Late)));
        assert_eq!(drive(&mut pair, &[0.3]), (0, Some(Halt::Early)));
        drop(pair);
        assert_eq!(seen, vec![0.1, 0.2, 0.3]);
    }
}
