//! minimization::outcome — what a minimizer hands back.
use crate::{
    energy::Energy,
    errors::{IftError, IftResult},
    solvers::ConvergenceStatus,
};

/// Final energy plus how the run ended.
///
/// `inner_solver_failures` counts Newton-CG direction solves that hit
/// their iteration cap; their partial solutions were still used.
#[derive(Debug, Clone)]
pub struct MinimizationOutcome<E: Energy> {
    pub energy: E,
    pub status: ConvergenceStatus,
    pub iterations: usize,
    pub inner_solver_failures: usize,
}

impl<E: Energy> MinimizationOutcome<E> {
    pub fn new(energy: E, status: ConvergenceStatus, iterations: usize, inner_solver_failures: usize) -> Self {
        Self { energy, status, iterations, inner_solver_failures }
    }

    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Energy unless the run stalled.
    ///
    /// Hitting the iteration limit is not an error: the caller asked for at
    /// most that many steps.
    ///
    /// # Errors
    /// - [`IftError::MinimizationStalled`] for [`ConvergenceStatus::Stalled`].
    pub fn into_result(self) -> IftResult<E> {
        match self.status {
            ConvergenceStatus::Stalled => Err(IftError::MinimizationStalled {
                iterations: self.iterations,
                value: self.energy.value(),
                reason: "No acceptable step could be found.",
            }),
            _ => Ok(self.energy),
        }
    }
}
