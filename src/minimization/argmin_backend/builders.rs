//! argmin_backend::builders — construct configured L-BFGS solvers.
use argmin::solver::quasinewton::LBFGS;

use crate::{
    errors::IftResult,
    minimization::argmin_backend::types::{
        ArgminOptions, Cost, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente, MoreThuenteLS, Theta,
        DEFAULT_LBFGS_MEM,
    },
};

/// L-BFGS with the Hager–Zhang line search.
pub fn build_hager_zhang(opts: &ArgminOptions) -> IftResult<LbfgsHagerZhang> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsHagerZhang::new(HagerZhangLS::new(), mem), opts)
}

/// L-BFGS with the Moré–Thuente line search.
pub fn build_more_thuente(opts: &ArgminOptions) -> IftResult<LbfgsMoreThuente> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsMoreThuente::new(MoreThuenteLS::new(), mem), opts)
}

/// Apply the gradient and cost tolerances that are set.
///
/// # Errors
/// - Argmin's own parameter errors, mapped into the crate error type.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &ArgminOptions,
) -> IftResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(g) = opts.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}
