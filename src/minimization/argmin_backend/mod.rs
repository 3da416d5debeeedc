//! argmin_backend — L-BFGS from the `argmin` crate as a [`Minimizer`].
//!
//! Purpose
//! -------
//! Offer argmin's L-BFGS with its Moré–Thuente or Hager–Zhang line
//! searches for energies with cheap gradients, behind the same
//! [`Minimizer`] interface as the hand-written descent methods.
//!
//! Key behaviors
//! -------------
//! - [`adapter::EnergyProblem`] exposes an energy as argmin's
//!   `CostFunction` + `Gradient`.
//! - [`builders`] configure the solver from [`ArgminOptions`].
//! - [`run::run_lbfgs`] executes it (with the slog observer when the
//!   `obs_slog` feature is enabled and `verbose` is set) and maps argmin's
//!   termination reason onto [`ConvergenceStatus`](crate::solvers::ConvergenceStatus).
//!
//! Invariants & assumptions
//! ------------------------
//! - The energy's position is the starting point; argmin's best parameter
//!   vector is turned back into an energy with [`Energy::at`].
pub mod adapter;
pub mod builders;
pub mod run;
pub mod types;

use crate::{
    energy::Energy,
    errors::IftResult,
    minimization::{MinimizationOutcome, Minimizer},
};

pub use self::adapter::EnergyProblem;
pub use self::types::{ArgminOptions, LineSearcher, DEFAULT_LBFGS_MEM};

#[derive(Debug, Clone, PartialEq)]
pub struct ArgminLbfgs {
    options: ArgminOptions,
}

impl ArgminLbfgs {
    pub fn new(options: ArgminOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ArgminOptions {
        &self.options
    }
}

impl Minimizer for ArgminLbfgs {
    fn minimize<E: Energy>(&self, energy: E) -> IftResult<MinimizationOutcome<E>> {
        let problem = EnergyProblem::new(&energy);
        match self.options.line_searcher {
            LineSearcher::MoreThuente => {
                let solver = builders::build_more_thuente(&self.options)?;
                run::run_lbfgs(&energy, &self.options, problem, solver)
            }
            LineSearcher::HagerZhang => {
                let solver = builders::build_hager_zhang(&self.options)?;
                run::run_lbfgs(&energy, &self.options, problem, solver)
            }
        }
    }
}
