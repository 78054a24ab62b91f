use crate::FieldVector;

/// Global reductions across all partitions of a distributed domain.
///
/// The engine runs identically on every partition. These reductions are its
/// only synchronization points: each call blocks until every partition has
/// contributed its local value.
pub trait Collective {
    /// Returns the sum of `local` over all partitions.
    fn sum(&self, local: f64) -> f64;

    /// Returns the minimum of `local` over all partitions.
    fn min(&self, local: f64) -> f64;

    /// Returns the maximum of `local` over all partitions.
    fn max(&self, local: f64) -> f64;
}

/// A single-partition run where every reduction is the identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Serial;

/// Shared instance used as the default [`Operator::collective`](crate::Operator::collective).
pub static SERIAL: Serial = Serial;

impl Collective for Serial {
    fn sum(&self, local: f64) -> f64 {
        local
    }

    fn min(&self, local: f64) -> f64 {
        local
    }

    fn max(&self, local: f64) -> f64 {
        local
    }
}

/// Returns the global L2 norm of `v`.
pub fn global_l2_norm<V: FieldVector>(comm: &dyn Collective, v: &V) -> f64 {
    comm.sum(v.local_dot(v)).sqrt()
}

/// Returns the global maximum absolute value of `v`.
pub fn global_max_abs<V: FieldVector>(comm: &dyn Collective, v: &V) -> f64 {
    comm.max(v.local_max_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    /// Pretends to be one of two partitions holding identical data.
    struct TwoPartitions;

    impl Collective for TwoPartitions {
        fn sum(&self, local: f64) -> f64 {
            2.0 * local
        }

        fn min(&self, local: f64) -> f64 {
            local
        }

        fn max(&self, local: f64) -> f64 {
            local
        }
    }

    #[test]
    fn serial_norm() {
        let v = vec![3.0, 4.0];
        assert_relative_eq!(global_l2_norm(&SERIAL, &v), 5.0);
        assert_relative_eq!(global_max_abs(&SERIAL, &v), 4.0);
    }

    #[test]
    fn norm_combines_partitions() {
        let v = vec![1.0, 1.0];
        assert_relative_eq!(global_l2_norm(&TwoPartitions, &v), 2.0);
    }
}
