use cadence_core::{Collective, FieldVector, MeshMetric, global_max_abs};

use crate::config::{Config, StepSizeControl};

/// Chooses step sizes from stability limits of the spatial discretization.
///
/// The limits follow the usual high-order estimates, with `k` the polynomial
/// degree and `q` the BDF order:
///
/// - CFL: `dt = cfl * h_min / (u_max * k^1.5)`
/// - diffusion: `dt = d * h_min^2 / (nu * k^3)`
/// - max efficiency: `dt = c_eff * h_min^((k + 1) / q)`
///
/// Under adaptive stepping the new step may differ from the previous one by at
/// most the limiting factor and never exceeds the maximum step size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSizeController {
    control: StepSizeControl,
    order: usize,
    adaptive: bool,
    limiting_factor: f64,
    max_step_size: f64,
}

impl StepSizeController {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            control: config.step_size(),
            order: config.order(),
            adaptive: config.adaptive(),
            limiting_factor: config.limiting_factor(),
            max_step_size: config.max_step_size(),
        }
    }

    /// Returns the stability limit for the given velocity and mesh.
    ///
    /// A zero velocity removes the CFL limit, leaving the maximum step size.
    pub fn limit<V: FieldVector>(
        &self,
        velocity: &V,
        mesh: MeshMetric,
        comm: &dyn Collective,
    ) -> f64 {
        let k = f64::from(mesh.degree.max(1));
        let h = mesh.h_min;

        let cfl_limit = |cfl: f64| {
            let u_max = global_max_abs(comm, velocity);
            if u_max > 0.0 {
                cfl * h / (u_max * k.powf(1.5))
            } else {
                f64::INFINITY
            }
        };
        let diffusion_limit = |d: f64, nu: f64| d * h * h / (nu * k.powi(3));

        let dt = match self.control {
            StepSizeControl::Fixed(dt) => dt,
            StepSizeControl::Cfl { cfl } => cfl_limit(cfl),
            StepSizeControl::Diffusion {
                diffusion_number,
                viscosity,
            } => diffusion_limit(diffusion_number, viscosity),
            StepSizeControl::CflAndDiffusion {
                cfl,
                diffusion_number,
                viscosity,
            } => cfl_limit(cfl).min(diffusion_limit(diffusion_number, viscosity)),
            #[allow(clippy::cast_precision_loss)]
            StepSizeControl::MaxEfficiency { c_eff } => {
                c_eff * h.powf((k + 1.0) / self.order as f64)
            }
        };

        dt.min(self.max_step_size)
    }

    /// Returns the step size for the first step.
    pub fn initial_step_size<V: FieldVector>(
        &self,
        velocity: &V,
        mesh: MeshMetric,
        comm: &dyn Collective,
    ) -> f64 {
        self.limit(velocity, mesh, comm)
    }

    /// Returns the step size to use after a step of size `dt_old`.
    ///
    /// Non-adaptive runs keep `dt_old`.
    pub fn next_step_size<V: FieldVector>(
        &self,
        dt_old: f64,
        velocity: &V,
        mesh: MeshMetric,
        comm: &dyn Collective,
    ) -> f64 {
        if !self.adaptive {
            return dt_old;
        }

        let f = self.limiting_factor;
        self.limit(velocity, mesh, comm)
            .clamp(dt_old / f, dt_old * f)
            .min(self.max_step_size)
    }

    #[must_use]
    pub fn adaptive(&self) -> bool {
        self.adaptive
    }
}

/// Returns the step size every coupled integrator must commit: the minimum
/// of their candidates.
///
/// An empty slice imposes no limit and yields infinity.
#[must_use]
pub fn synchronize(candidates: &[f64]) -> f64 {
    candidates.iter().copied().fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use cadence_core::SERIAL;

    const MESH: MeshMetric = MeshMetric {
        h_min: 0.1,
        degree: 2,
    };

    fn controller(control: StepSizeControl, adaptive: bool) -> StepSizeController {
        let config = Config::builder(control)
            .adaptive(adaptive)
            .limiting_factor(1.5)
            .max_step_size(1.0)
            .build()
            .unwrap();
        StepSizeController::new(&config)
    }

    #[test]
    fn cfl_limit() {
        let c = controller(StepSizeControl::Cfl { cfl: 0.4 }, false);
        let u = vec![0.5, -2.0, 1.0];

        let expected = 0.4 * 0.1 / (2.0 * 2.0_f64.powf(1.5));
        assert_relative_eq!(c.limit(&u, MESH, &SERIAL), expected);
    }

    #[test]
    fn diffusion_limit_ignores_velocity() {
        let c = controller(
            StepSizeControl::Diffusion {
                diffusion_number: 0.2,
                viscosity: 0.01,
            },
            false,
        );
        let expected = 0.2 * 0.01 / (0.01 * 8.0);
        assert_relative_eq!(c.limit(&vec![100.0], MESH, &SERIAL), expected);
    }

    #[test]
    fn combined_limit_takes_the_minimum() {
        let c = controller(
            StepSizeControl::CflAndDiffusion {
                cfl: 0.4,
                diffusion_number: 0.2,
                viscosity: 0.01,
            },
            false,
        );
        let cfl = 0.4 * 0.1 / (2.0 * 2.0_f64.powf(1.5));
        let diffusion = 0.2 * 0.01 / (0.01 * 8.0);

        assert_relative_eq!(c.limit(&vec![2.0], MESH, &SERIAL), cfl.min(diffusion));
        assert_relative_eq!(c.limit(&vec![0.0], MESH, &SERIAL), diffusion);
    }

    #[test]
    fn max_efficiency_uses_order() {
        let c = controller(StepSizeControl::MaxEfficiency { c_eff: 3.0 }, false);
        let expected = 3.0 * 0.1_f64.powf(3.0 / 2.0);
        assert_relative_eq!(c.limit(&vec![0.0], MESH, &SERIAL), expected);
    }

    #[test]
    fn zero_velocity_gives_max_step_size() {
        let c = controller(StepSizeControl::Cfl { cfl: 0.4 }, true);
        assert_relative_eq!(c.limit(&vec![0.0; 4], MESH, &SERIAL), 1.0);
    }

    #[test]
    fn adaptive_growth_is_limited() {
        let c = controller(StepSizeControl::Cfl { cfl: 0.4 }, true);

        // Tiny velocity: the limit is huge, growth capped at 1.5x.
        let grown = c.next_step_size(0.01, &vec![1e-6], MESH, &SERIAL);
        assert_relative_eq!(grown, 0.015);

        // Huge velocity: the limit is tiny, shrink capped at 1/1.5.
        let shrunk = c.next_step_size(0.01, &vec![1e6], MESH, &SERIAL);
        assert_relative_eq!(shrunk, 0.01 / 1.5);
    }

    #[test]
    fn non_adaptive_keeps_step_size() {
        let c = controller(StepSizeControl::Cfl { cfl: 0.4 }, false);
        assert_eq!(c.next_step_size(0.01, &vec![1e6], MESH, &SERIAL), 0.01);
    }

    #[test]
    fn synchronize_takes_minimum() {
        assert_eq!(synchronize(&[0.1, 0.05, 0.2]), 0.05);
        assert_eq!(synchronize(&[]), f64::INFINITY);
    }
}
