//! BDF derivative and extrapolation coefficients.
//!
//! The time derivative at `t_{n+1}` is approximated as
//!
//! ```text
//! du/dt ≈ (gamma_0 * u_{n+1} - sum_i alpha_i * u_{n-i}) / dt
//! ```
//!
//! and explicitly treated terms are extrapolated to `t_{n+1}` as
//!
//! ```text
//! f_{n+1} ≈ sum_i beta_i * f_{n-i}
//! ```
//!
//! For uniform step sizes the closed forms are used directly. For adaptive
//! stepping both sets are derived from Lagrange polynomials over the actual
//! time levels, which reduces to the closed forms when the steps are uniform.

use crate::Error;

/// Highest supported order.
pub const MAX_ORDER: usize = 4;

const GAMMA0: [f64; MAX_ORDER] = [1.0, 1.5, 11.0 / 6.0, 25.0 / 12.0];

const ALPHA: [[f64; MAX_ORDER]; MAX_ORDER] = [
    [1.0, 0.0, 0.0, 0.0],
    [2.0, -0.5, 0.0, 0.0],
    [3.0, -1.5, 1.0 / 3.0, 0.0],
    [4.0, -3.0, 4.0 / 3.0, -0.25],
];

const BETA: [[f64; MAX_ORDER]; MAX_ORDER] = [
    [1.0, 0.0, 0.0, 0.0],
    [2.0, -1.0, 0.0, 0.0],
    [3.0, -3.0, 1.0, 0.0],
    [4.0, -6.0, 4.0, -1.0],
];

/// Derivative and extrapolation coefficients for one order and step history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoefficientSet {
    order: usize,
    gamma0: f64,
    alpha: [f64; MAX_ORDER],
    beta: [f64; MAX_ORDER],
}

impl CoefficientSet {
    /// Returns the order `q`.
    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Returns `gamma_0`, the weight of the new time level.
    #[must_use]
    pub fn gamma0(&self) -> f64 {
        self.gamma0
    }

    /// Returns `alpha_0 .. alpha_{q-1}`.
    #[must_use]
    pub fn alpha(&self) -> &[f64] {
        &self.alpha[..self.order]
    }

    /// Returns `beta_0 .. beta_{q-1}`.
    #[must_use]
    pub fn beta(&self) -> &[f64] {
        &self.beta[..self.order]
    }
}

/// Computes the coefficient set for order `order`.
///
/// `dts[0]` is the current step `t_{n+1} - t_n` and `dts[i]` is
/// `t_{n-i+1} - t_{n-i}`. The step sizes are only read when `adaptive` is set,
/// in which case at least `order` of them are required.
///
/// # Errors
///
/// Returns [`Error::InvalidOrder`] if `order` is not in `1..=4`, and
/// [`Error::HistoryUnderflow`] if adaptive coefficients are requested with
/// fewer than `order` step sizes.
pub fn compute(order: usize, dts: &[f64], adaptive: bool) -> Result<CoefficientSet, Error> {
    if !(1..=MAX_ORDER).contains(&order) {
        return Err(Error::InvalidOrder { order });
    }

    if !adaptive {
        return Ok(CoefficientSet {
            order,
            gamma0: GAMMA0[order - 1],
            alpha: ALPHA[order - 1],
            beta: BETA[order - 1],
        });
    }

    if dts.len() < order {
        return Err(Error::HistoryUnderflow {
            index: order - 1,
            len: dts.len(),
        });
    }

    // Nodes relative to t_{n+1}: tau[0] = t_{n+1} = 0, tau[j] = t_{n-j+1}.
    let mut tau = [0.0; MAX_ORDER + 1];
    for j in 1..=order {
        tau[j] = tau[j - 1] - dts[j - 1];
    }
    let tau = &tau[..=order];
    let dt = dts[0];

    let gamma0 = dt * tau[1..].iter().map(|t| 1.0 / (tau[0] - t)).sum::<f64>();

    let mut alpha = [0.0; MAX_ORDER];
    for (i, a) in alpha.iter_mut().take(order).enumerate() {
        let k = i + 1;
        let numerator: f64 = (1..=order)
            .filter(|&m| m != k)
            .map(|m| tau[0] - tau[m])
            .product();
        let denominator: f64 = (0..=order)
            .filter(|&m| m != k)
            .map(|m| tau[k] - tau[m])
            .product();
        *a = -dt * numerator / denominator;
    }

    let mut beta = [0.0; MAX_ORDER];
    for (i, b) in beta.iter_mut().take(order).enumerate() {
        let k = i + 1;
        *b = (1..=order)
            .filter(|&m| m != k)
            .map(|m| (tau[0] - tau[m]) / (tau[k] - tau[m]))
            .product();
    }

    Ok(CoefficientSet {
        order,
        gamma0,
        alpha,
        beta,
    })
}

/// Caches the last coefficient set and recomputes only on order or step changes.
#[derive(Debug, Clone)]
pub(crate) struct CoefficientCache {
    adaptive: bool,
    key: Option<(usize, [f64; MAX_ORDER])>,
    set: Option<CoefficientSet>,
    recomputations: usize,
}

impl CoefficientCache {
    pub(crate) fn new(adaptive: bool) -> Self {
        Self {
            adaptive,
            key: None,
            set: None,
            recomputations: 0,
        }
    }

    /// Returns the coefficients for `order` and `dts`, recomputing if needed.
    pub(crate) fn get(&mut self, order: usize, dts: &[f64]) -> Result<CoefficientSet, Error> {
        let mut steps = [0.0; MAX_ORDER];
        if self.adaptive {
            let n = order.min(dts.len()).min(MAX_ORDER);
            steps[..n].copy_from_slice(&dts[..n]);
        }
        let key = (order, steps);

        if let (Some(cached), Some(set)) = (self.key, self.set) {
            if cached == key {
                return Ok(set);
            }
        }

        let set = compute(order, dts, self.adaptive)?;
        self.key = Some(key);
        self.set = Some(set);
        self.recomputations += 1;
        tracing::trace!(order, gamma0 = set.gamma0, "recomputed BDF coefficients");
        Ok(set)
    }

    pub(crate) fn current(&self) -> Option<CoefficientSet> {
        self.set
    }

    pub(crate) fn recomputations(&self) -> usize {
        self.recomputations
    }
}
