//! solvers::conjugate_gradient — implicit solves of `A x = b`.
//!
//! Purpose
//! -------
//! Solve linear systems with a self-adjoint positive definite operator
//! using only operator applications. This is what makes inverse
//! covariances and metrics usable without ever forming a matrix.
//!
//! Key behaviors
//! -------------
//! - Preconditioned CG from zero (or a supplied start).
//! - Stops once `‖r‖ ≤ tolerance · ‖b‖` or the iteration cap is reached;
//!   the latter is a status ([`ConvergenceStatus::IterationLimit`]), not
//!   an error. [`CgOutcome::into_result`] converts it for callers that
//!   require convergence.
//! - `b = 0` returns `x = 0` immediately.
//! - Every `nreset` iterations the residual is recomputed as `b − A x` to
//!   shed accumulated round-off.
//! - Non-positive curvature `dᵀ A d ≤ 0` is raised as
//!   [`IftError::NotPositiveDefinite`] at once.
//!
//! Invariants & assumptions
//! ------------------------
//! - `A` is endomorphic, self-adjoint and positive definite on the span
//!   explored; the preconditioner, if any, approximates `A⁻¹` and is
//!   itself positive definite.
//!
//! Conventions
//! -----------
//! - Progress is logged at `debug` level per iteration; exhaustion of the
//!   iteration cap at `warn`.
use log::{debug, warn};

use crate::{
    domain::check_domain,
    errors::{IftError, IftResult},
    field::Field,
    operators::LinearOperator,
    solvers::controller::ConvergenceStatus,
    validation::{verify_iteration_limit, verify_tolerance},
};

/// Immutable solver configuration.
///
/// The preconditioner and a start vector are not part of it; pass them to
/// [`solve_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgOptions {
    /// Relative residual tolerance `‖r‖ / ‖b‖`.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Period of exact residual recomputation.
    pub nreset: usize,
}

impl CgOptions {
    /// # Errors
    /// - [`IftError::InvalidTolerance`] for a non-finite or non-positive tolerance.
    /// - [`IftError::InvalidIterationLimit`] for zero `max_iterations` or `nreset`.
    pub fn new(tolerance: f64, max_iterations: usize, nreset: usize) -> IftResult<Self> {
        verify_tolerance("cg_tolerance", tolerance)?;
        verify_iteration_limit("cg_max_iterations", max_iterations)?;
        verify_iteration_limit("cg_nreset", nreset)?;
        Ok(Self { tolerance, max_iterations, nreset })
    }
}

impl Default for CgOptions {
    fn default() -> Self {
        Self { tolerance: 1e-8, max_iterations: 500, nreset: 20 }
    }
}

/// Result of a CG run.
#[derive(Debug, Clone, PartialEq)]
pub struct CgOutcome {
    pub solution: Field,
    pub status: ConvergenceStatus,
    pub iterations: usize,
    pub residual_norm: f64,
    pub tolerance: f64,
}

impl CgOutcome {
    /// The solution if converged.
    ///
    /// # Errors
    /// - [`IftError::SolverNonConvergence`] otherwise.
    pub fn into_result(self) -> IftResult<Field> {
        match self.status {
            ConvergenceStatus::Converged => Ok(self.solution),
            _ => Err(IftError::SolverNonConvergence {
                iterations: self.iterations,
                residual_norm: self.residual_norm,
                tolerance: self.tolerance,
            }),
        }
    }
}

/// Solve `op x = b` from zero without preconditioning.
pub fn solve(op: &dyn LinearOperator, b: &Field, options: &CgOptions) -> IftResult<CgOutcome> {
    solve_with(op, b, options, None, None)
}

/// Solve `op x = b` with an optional start and preconditioner.
///
/// # Errors
/// - [`IftError::DomainMismatch`] if `op` is not endomorphic on `b`'s domain.
/// - [`IftError::NotPositiveDefinite`] on non-positive curvature.
/// - Any error raised while applying `op` or the preconditioner.
pub fn solve_with(
    op: &dyn LinearOperator, b: &Field, options: &CgOptions, x0: Option<&Field>,
    preconditioner: Option<&dyn LinearOperator>,
) -> IftResult<CgOutcome> {
    check_domain(op.domain(), b.domain())?;
    check_domain(op.target(), b.domain())?;
    let b_norm = b.norm();
    let target = options.tolerance * b_norm;
    if b_norm == 0.0 {
        return Ok(CgOutcome {
            solution: Field::zeros(b.domain().clone()),
            status: ConvergenceStatus::Converged,
            iterations: 0,
            residual_norm: 0.0,
            tolerance: options.tolerance,
        });
    }

    let (mut x, mut r) = match x0 {
        Some(start) => (start.clone(), b.sub(&op.times(start)?)?),
        None => (Field::zeros(b.domain().clone()), b.clone()),
    };
    let mut r_norm = r.norm();
    if r_norm <= target {
        return Ok(outcome(x, ConvergenceStatus::Converged, 0, r_norm, options));
    }
    let mut s = precondition(preconditioner, &r)?;
    let mut d = s.clone();
    let mut gamma = r.vdot(&s)?;
    if gamma <= 0.0 {
        return Err(IftError::NotPositiveDefinite { context: "cg preconditioner", value: gamma });
    }

    for iteration in 1..=options.max_iterations {
        let q = op.times(&d)?;
        let curvature = d.vdot(&q)?;
        if curvature <= 0.0 || !curvature.is_finite() {
            return Err(IftError::NotPositiveDefinite { context: "conjugate gradient", value: curvature });
        }
        let alpha = gamma / curvature;
        x = x.add_scaled(&d, alpha)?;
        r = if iteration % options.nreset == 0 { b.sub(&op.times(&x)?)? } else { r.add_scaled(&q, -alpha)? };
        r_norm = r.norm();
        debug!("cg iteration {iteration}: residual {:.3e} (target {:.3e})", r_norm, target);
        if r_norm <= target {
            return Ok(outcome(x, ConvergenceStatus::Converged, iteration, r_norm, options));
        }

        s = precondition(preconditioner, &r)?;
        let gamma_new = r.vdot(&s)?;
        if gamma_new < 0.0 {
            return Err(IftError::NotPositiveDefinite { context: "cg preconditioner", value: gamma_new });
        }
        let beta = (gamma_new / gamma).max(0.0);
        d = s.add_scaled(&d, beta)?;
        gamma = gamma_new;
    }

    warn!(
        "cg reached the iteration limit {} with residual {:.3e} (target {:.3e})",
        options.max_iterations, r_norm, target
    );
    Ok(outcome(x, ConvergenceStatus::IterationLimit, options.max_iterations, r_norm, options))
}

// ---- Helper methods ----

fn precondition(preconditioner: Option<&dyn LinearOperator>, r: &Field) -> IftResult<Field> {
    match preconditioner {
        Some(p) => p.times(r),
        None => Ok(r.clone()),
    }
}

fn outcome(
    solution: Field, status: ConvergenceStatus, iterations: usize, residual_norm: f64, options: &CgOptions,
) -> CgOutcome {
    CgOutcome { solution, status, iterations, residual_norm, tolerance: options.tolerance }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Domain,
        field::rng_for,
        operators::{DiagonalOperator, MatrixOperator, OpRef, OperatorAlgebra, ScalingOperator},
    };
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use std::sync::Arc;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Trivial systems (identity, zero right-hand side).
    // - Convergence on a dense SPD system within its dimension.
    // - Iteration-limit status, preconditioning, and curvature failures.
    // -------------------------------------------------------------------------

    /// SPD operator `MᵀM + 0.1 · 1` on R^n from a deterministic random M.
    fn spd_operator(n: usize, seed: u64) -> OpRef {
        let domain = Domain::unstructured(n);
        let values = Field::standard_normal(Domain::unstructured(n * n), &mut rng_for(seed, 0));
        let m = Array2::from_shape_vec((n, n), values.into_val().to_vec()).unwrap();
        let m: OpRef = Arc::new(MatrixOperator::new(domain.clone(), domain.clone(), m).unwrap());
        m.adjoint().chain(&m).unwrap().plus(&ScalingOperator::shared(domain, 0.1)).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // The identity is solved exactly in a single iteration.
    //
    // Given
    // -----
    // - A = 1 on R^10, random b.
    //
    // Expect
    // ------
    // - x = b, 1 iteration, status Converged.
    fn identity_converges_in_one_iteration() {
        let domain = Domain::unstructured(10);
        let id = ScalingOperator::new(domain.clone(), 1.0);
        let b = Field::standard_normal(domain, &mut rng_for(41, 0));

        let out = solve(&id, &b, &CgOptions::default()).unwrap();

        assert_eq!(out.iterations, 1);
        assert!(out.status.is_converged());
        for (x, y) in out.solution.val().iter().zip(b.val().iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-14);
        }
    }

    #[test]
    // Purpose
    // -------
    // A zero right-hand side returns zero without iterating.
    //
    // Given
    // -----
    // - b = 0.
    //
    // Expect
    // ------
    // - x = 0, 0 iterations, Converged.
    fn zero_rhs_returns_zero_immediately() {
        let domain = Domain::unstructured(5);
        let op = spd_operator(5, 1);
        let b = Field::zeros(domain);

        let out = solve(op.as_ref(), &b, &CgOptions::default()).unwrap();

        assert_eq!(out.iterations, 0);
        assert_eq!(out.solution, b);
        assert!(out.status.is_converged());
    }

    #[test]
    // Purpose
    // -------
    // A dense SPD system converges within its dimension (plus round-off slack).
    //
    // Given
    // -----
    // - A = MᵀM + 0.1 on R^12, tolerance 1e-10.
    //
    // Expect
    // ------
    // - Converged, residual ‖b − Ax‖ ≤ 1e-10 ‖b‖ (up to recomputation noise),
    //   iterations ≤ 2n.
    fn spd_system_converges_within_dimension() {
        let n = 12;
        let op = spd_operator(n, 2);
        let b = Field::standard_normal(op.domain().clone(), &mut rng_for(2, 1));
        let opts = CgOptions::new(1e-10, 10 * n, 5).unwrap();

        let out = solve(op.as_ref(), &b, &opts).unwrap();

        assert!(out.status.is_converged());
        assert!(out.iterations <= 2 * n, "took {} iterations", out.iterations);
        let residual = b.sub(&op.times(&out.solution).unwrap()).unwrap().norm();
        assert!(residual <= 1e-8 * b.norm(), "residual {residual}");
    }

    #[test]
    // Purpose
    // -------
    // Hitting the cap is a status, and `into_result` turns it into an error.
    //
    // Given
    // -----
    // - An ill-conditioned diagonal system capped at 2 iterations.
    //
    // Expect
    // ------
    // - Status IterationLimit; `into_result` gives `SolverNonConvergence`.
    fn iteration_cap_is_reported_not_raised() {
        let domain = Domain::unstructured(6);
        let d = DiagonalOperator::new(Field::from_fn(domain.clone(), |i| 10f64.powi(i as i32)));
        let b = Field::full(domain, 1.0);
        let opts = CgOptions::new(1e-12, 2, 20).unwrap();

        let out = solve(&d, &b, &opts).unwrap();

        assert_eq!(out.status, ConvergenceStatus::IterationLimit);
        assert!(matches!(out.into_result(), Err(IftError::SolverNonConvergence { iterations: 2, .. })));
    }

    #[test]
    // Purpose
    // -------
    // An exact preconditioner solves a diagonal system in one step.
    //
    // Given
    // -----
    // - D with widely spread entries and P = D⁻¹.
    //
    // Expect
    // ------
    // - 1 iteration, solution b / D.
    fn exact_preconditioner_converges_in_one_step() {
        let domain = Domain::unstructured(6);
        let d: OpRef = DiagonalOperator::shared(Field::from_fn(domain.clone(), |i| 1.0 + 100.0 * i as f64));
        let p = d.inverse();
        let b = Field::full(domain, 1.0);

        let out = solve_with(d.as_ref(), &b, &CgOptions::default(), None, Some(p.as_ref())).unwrap();

        assert_eq!(out.iterations, 1);
        let expected = d.inverse_times(&b).unwrap();
        for (x, y) in out.solution.val().iter().zip(expected.val().iter()) {
            assert_relative_eq!(*x, *y, max_relative = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Indefinite operators are detected instead of silently diverging.
    //
    // Given
    // -----
    // - A = -1.
    //
    // Expect
    // ------
    // - `NotPositiveDefinite`.
    fn negative_curvature_is_an_error() {
        let domain = Domain::unstructured(3);
        let a = ScalingOperator::new(domain.clone(), -1.0);

        let err = solve(&a, &Field::full(domain, 1.0), &CgOptions::default()).unwrap_err();

        assert!(matches!(err, IftError::NotPositiveDefinite { .. }));
    }
}
