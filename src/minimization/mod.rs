//! minimization — minimizers for [`Energy`] objects.
//!
//! Purpose
//! -------
//! Drive an energy to a (local) minimum. All minimizers share the
//! [`Minimizer`] interface and report a [`MinimizationOutcome`] carrying
//! the final energy and a [`ConvergenceStatus`](crate::solvers::ConvergenceStatus).
//!
//! Key behaviors
//! -------------
//! - [`DescentMinimizer`]: steepest descent, Newton-CG or L-BFGS
//!   directions with a strong Wolfe [`LineSearch`].
//! - [`NonlinearCg`]: nonlinear conjugate gradient with a selectable
//!   [`BetaRule`].
//! - [`TrustRegionNewtonCg`]: Newton-CG in a trust region, with the
//!   subproblem solved by truncated CG.
//! - [`ArgminLbfgs`]: L-BFGS from `argmin`.
//!
//! Conventions
//! -----------
//! - Reaching the iteration limit is a status, not an error; a stalled
//!   run becomes an error only through
//!   [`MinimizationOutcome::into_result`].
pub mod argmin_backend;
pub mod descent;
pub mod line_search;
pub mod nonlinear_cg;
pub mod outcome;
pub mod trust_region;

use crate::{energy::Energy, errors::IftResult};

pub use self::argmin_backend::{ArgminLbfgs, ArgminOptions, LineSearcher};
pub use self::descent::{DescentDirection, DescentMinimizer};
pub use self::line_search::{LineSearch, LineStep};
pub use self::nonlinear_cg::{BetaRule, NonlinearCg};
pub use self::outcome::MinimizationOutcome;
pub use self::trust_region::{TrustRegionNewtonCg, TrustRegionOptions};

pub trait Minimizer {
    fn minimize<E: Energy>(&self, energy: E) -> IftResult<MinimizationOutcome<E>>;
}
