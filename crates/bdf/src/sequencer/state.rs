use cadence_core::SubproblemKind;

use crate::config::SchemeKind;

/// One phase of a time step.
///
/// The phases a step passes through are fixed by the [`SchemeKind`]:
///
/// - dual splitting: `Convective -> Pressure -> Projection -> Viscous -> Done`
/// - pressure correction: `Momentum -> Pressure -> Projection -> Done`
/// - coupled: `CoupledSolve -> Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubStep {
    Convective,
    Momentum,
    Pressure,
    Projection,
    Viscous,
    CoupledSolve,
    Done,
}

impl SubStep {
    /// Returns the first phase of a step under `scheme`.
    #[must_use]
    pub fn first(scheme: SchemeKind) -> Self {
        match scheme {
            SchemeKind::DualSplitting => Self::Convective,
            SchemeKind::PressureCorrection => Self::Momentum,
            SchemeKind::Coupled => Self::CoupledSolve,
        }
    }

    /// Returns the phase following `self` under `scheme`.
    ///
    /// `Done` is terminal, as is any phase that does not belong to `scheme`.
    #[must_use]
    pub fn next(self, scheme: SchemeKind) -> Self {
        match (scheme, self) {
            (SchemeKind::DualSplitting, Self::Convective) => Self::Pressure,
            (SchemeKind::DualSplitting, Self::Pressure) => Self::Projection,
            (SchemeKind::DualSplitting, Self::Projection) => Self::Viscous,
            (SchemeKind::PressureCorrection, Self::Momentum) => Self::Pressure,
            (SchemeKind::PressureCorrection, Self::Pressure) => Self::Projection,
            _ => Self::Done,
        }
    }

    /// Returns the sub-problem this phase asks the operator to solve.
    ///
    /// The convective phase only solves under implicit treatment, which the
    /// sequencer decides; here it maps to [`SubproblemKind::Convective`].
    #[must_use]
    pub fn subproblem(self) -> Option<SubproblemKind> {
        match self {
            Self::Convective => Some(SubproblemKind::Convective),
            Self::Momentum => Some(SubproblemKind::Momentum),
            Self::Pressure => Some(SubproblemKind::Pressure),
            Self::Projection => Some(SubproblemKind::Projection),
            Self::Viscous => Some(SubproblemKind::Viscous),
            Self::CoupledSolve => Some(SubproblemKind::Coupled),
            Self::Done => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phases(scheme: SchemeKind) -> Vec<SubStep> {
        let mut phases = vec![SubStep::first(scheme)];
        while let Some(&last) = phases.last() {
            if last == SubStep::Done {
                break;
            }
            phases.push(last.next(scheme));
        }
        phases
    }

    #[test]
    fn dual_splitting_order() {
        assert_eq!(
            phases(SchemeKind::DualSplitting),
            vec![
                SubStep::Convective,
                SubStep::Pressure,
                SubStep::Projection,
                SubStep::Viscous,
                SubStep::Done
            ]
        );
    }

    #[test]
    fn pressure_correction_order() {
        assert_eq!(
            phases(SchemeKind::PressureCorrection),
            vec![
                SubStep::Momentum,
                SubStep::Pressure,
                SubStep::Projection,
                SubStep::Done
            ]
        );
    }

    #[test]
    fn coupled_order() {
        assert_eq!(
            phases(SchemeKind::Coupled),
            vec![SubStep::CoupledSolve, SubStep::Done]
        );
        assert_eq!(SubStep::Done.subproblem(), None);
    }
}
