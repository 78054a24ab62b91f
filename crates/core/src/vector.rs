/// A vector of degrees of freedom for one physical field.
///
/// The engine only ever needs a handful of BLAS-1 style operations on field
/// snapshots, all of which are expressed over the locally owned values. Any
/// global quantity (norms, maxima) is combined through a
/// [`Collective`](crate::Collective) by the caller.
///
/// Implementors provide slice access; every other operation has a default
/// implementation in terms of those slices.
pub trait FieldVector: Clone {
    /// Returns the locally owned values.
    fn as_slice(&self) -> &[f64];

    /// Returns the locally owned values mutably.
    fn as_mut_slice(&mut self) -> &mut [f64];

    /// Returns the number of locally owned values.
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns `true` if there are no locally owned values.
    fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Sets every value to `value`.
    fn fill(&mut self, value: f64) {
        self.as_mut_slice().iter_mut().for_each(|v| *v = value);
    }

    /// Computes `self = a * x`.
    fn assign_scaled(&mut self, a: f64, x: &Self) {
        debug_assert_eq!(self.len(), x.len());
        for (s, x) in self.as_mut_slice().iter_mut().zip(x.as_slice()) {
            *s = a * x;
        }
    }

    /// Computes `self += a * x`.
    fn axpy(&mut self, a: f64, x: &Self) {
        debug_assert_eq!(self.len(), x.len());
        for (s, x) in self.as_mut_slice().iter_mut().zip(x.as_slice()) {
            *s += a * x;
        }
    }

    /// Computes `self *= a`.
    fn scale(&mut self, a: f64) {
        self.as_mut_slice().iter_mut().for_each(|v| *v *= a);
    }

    /// Returns the dot product over the locally owned values.
    fn local_dot(&self, other: &Self) -> f64 {
        debug_assert_eq!(self.len(), other.len());
        self.as_slice()
            .iter()
            .zip(other.as_slice())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Returns the largest absolute value over the locally owned values.
    fn local_max_abs(&self) -> f64 {
        self.as_slice().iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }
}

impl FieldVector for Vec<f64> {
    fn as_slice(&self) -> &[f64] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        self
    }
}
