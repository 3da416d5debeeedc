//! solvers::steihaug — truncated CG for the trust-region subproblem.
//!
//! Purpose
//! -------
//! Approximately minimize the quadratic model
//! `m(p) = gᵀp + ½ pᵀB p` subject to `‖p‖ ≤ Δ`, using only applications
//! of `B`. This is the inner solve of a trust-region Newton-CG minimizer.
//!
//! Key behaviors
//! -------------
//! - Plain CG on `B p = −g` from `p = 0` while the iterates stay inside
//!   the region and the curvature is positive.
//! - An iterate leaving the region is pulled back to the boundary along
//!   the current search direction.
//! - Non-positive curvature `dᵀB d ≤ 0` ends the solve on the boundary, at
//!   whichever of the two intersections has the lower model value.
//!   Unlike [`solve`](crate::solvers::solve), indefinite `B` is not an
//!   error here.
//! - Stops once `‖B p + g‖ ≤ tolerance · ‖g‖`; the iteration cap is a
//!   status, and the last interior iterate is returned.
//!
//! Invariants & assumptions
//! ------------------------
//! - `B` is endomorphic and self-adjoint on `g`'s domain.
//! - The returned step satisfies `‖p‖ ≤ Δ` up to round-off.
use log::debug;

use crate::{
    domain::check_domain,
    errors::{IftError, IftResult},
    field::Field,
    operators::LinearOperator,
    solvers::{conjugate_gradient::CgOptions, controller::ConvergenceStatus},
    validation::verify_tolerance,
};

/// Approximate minimizer of the model within the trust region.
#[derive(Debug, Clone, PartialEq)]
pub struct SteihaugOutcome {
    pub step: Field,
    /// `‖step‖ = Δ`: the region, not the model, limited the step.
    pub hits_boundary: bool,
    /// `m(0) − m(step)`.
    pub predicted_decrease: f64,
    pub status: ConvergenceStatus,
    pub iterations: usize,
}

/// Solve the trust-region subproblem for model Hessian `op`, gradient
/// `gradient` and radius `radius`.
///
/// # Errors
/// - [`IftError::DomainMismatch`] if `op` is not endomorphic on the gradient's domain.
/// - [`IftError::InvalidTolerance`] for a non-positive or non-finite radius.
/// - [`IftError::NotPositiveDefinite`] if a curvature is not finite.
pub fn solve_steihaug(
    op: &dyn LinearOperator, gradient: &Field, radius: f64, options: &CgOptions,
) -> IftResult<SteihaugOutcome> {
    check_domain(op.domain(), gradient.domain())?;
    check_domain(op.target(), gradient.domain())?;
    verify_tolerance("trust_radius", radius)?;
    let g_norm = gradient.norm();
    let target = options.tolerance * g_norm;
    let mut p = Field::zeros(gradient.domain().clone());
    if g_norm == 0.0 {
        return Ok(SteihaugOutcome {
            step: p,
            hits_boundary: false,
            predicted_decrease: 0.0,
            status: ConvergenceStatus::Converged,
            iterations: 0,
        });
    }

    let mut r = gradient.clone();
    let mut d = r.neg();
    let mut rr = r.vdot(&r)?;
    for iteration in 1..=options.max_iterations {
        let bd = op.times(&d)?;
        let curvature = d.vdot(&bd)?;
        if !curvature.is_finite() {
            return Err(IftError::NotPositiveDefinite { context: "steihaug", value: curvature });
        }
        if curvature <= 0.0 {
            debug!("steihaug iteration {iteration}: negative curvature {curvature:.3e}");
            let (ta, tb) = boundary_intersections(&p, &d, radius)?;
            let pa = p.add_scaled(&d, ta)?;
            let pb = p.add_scaled(&d, tb)?;
            let step = if model(op, gradient, &pa)? < model(op, gradient, &pb)? { pa } else { pb };
            return finish(op, gradient, step, true, ConvergenceStatus::Converged, iteration);
        }

        let alpha = rr / curvature;
        let next = p.add_scaled(&d, alpha)?;
        if next.norm() >= radius {
            debug!("steihaug iteration {iteration}: step leaves the region of radius {radius:.3e}");
            let (_, tb) = boundary_intersections(&p, &d, radius)?;
            let step = p.add_scaled(&d, tb)?;
            return finish(op, gradient, step, true, ConvergenceStatus::Converged, iteration);
        }
        p = next;
        r = r.add_scaled(&bd, alpha)?;
        let rr_next = r.vdot(&r)?;
        if rr_next.sqrt() <= target {
            return finish(op, gradient, p, false, ConvergenceStatus::Converged, iteration);
        }
        d = r.neg().add_scaled(&d, rr_next / rr)?;
        rr = rr_next;
    }

    debug!("steihaug reached the iteration limit {} inside the region", options.max_iterations);
    finish(op, gradient, p, false, ConvergenceStatus::IterationLimit, options.max_iterations)
}

/// `m(p) = gᵀp + ½ pᵀB p`.
fn model(op: &dyn LinearOperator, gradient: &Field, p: &Field) -> IftResult<f64> {
    Ok(gradient.vdot(p)? + 0.5 * p.vdot(&op.times(p)?)?)
}

fn finish(
    op: &dyn LinearOperator, gradient: &Field, step: Field, hits_boundary: bool, status: ConvergenceStatus,
    iterations: usize,
) -> IftResult<SteihaugOutcome> {
    let predicted_decrease = -model(op, gradient, &step)?;
    Ok(SteihaugOutcome { step, hits_boundary, predicted_decrease, status, iterations })
}

/// Both `t` with `‖p + t d‖ = Δ`, smaller first.
///
/// Solves `a t² + b t + c = 0` in the cancellation-free form; `p` lies
/// inside the region, so `c < 0` and the roots have opposite signs.
fn boundary_intersections(p: &Field, d: &Field, radius: f64) -> IftResult<(f64, f64)> {
    let a = d.vdot(d)?;
    let b = 2.0 * p.vdot(d)?;
    let c = p.vdot(p)? - radius * radius;
    let aux = b + (b * b - 4.0 * a * c).max(0.0).sqrt().copysign(b);
    if a == 0.0 || aux == 0.0 {
        return Err(IftError::NotPositiveDefinite { context: "steihaug boundary", value: a });
    }
    let (ta, tb) = (-aux / (2.0 * a), -2.0 * c / aux);
    Ok(if ta <= tb { (ta, tb) } else { (tb, ta) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Domain,
        field::rng_for,
        operators::{DiagonalOperator, ScalingOperator},
        solvers::solve,
    };
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Interior solves matching plain CG.
    // - Steps cut at the boundary, with and without negative curvature.
    // - Boundary intersections of a ray from inside the region.
    // -------------------------------------------------------------------------

    fn spread_diagonal() -> DiagonalOperator {
        DiagonalOperator::new(Field::from_fn(Domain::unstructured(5), |i| 1.0 + 3.0 * i as f64))
    }

    #[test]
    // Purpose
    // -------
    // With a large radius the subproblem is the Newton system.
    //
    // Given
    // -----
    // - B = diag(1, 4, 7, 10, 13), random g, Δ = 1e6.
    //
    // Expect
    // ------
    // - Interior step equal to −B⁻¹g, predicted decrease ½ gᵀB⁻¹g.
    fn large_radius_matches_newton_step() {
        let b = spread_diagonal();
        let g = Field::standard_normal(b.domain().clone(), &mut rng_for(5, 0));
        let opts = CgOptions::new(1e-12, 50, 20).unwrap();

        let out = solve_steihaug(&b, &g, 1e6, &opts).unwrap();

        let newton = solve(&b, &g.neg(), &opts).unwrap().solution;
        assert!(!out.hits_boundary);
        assert!(out.status.is_converged());
        for (x, y) in out.step.val().iter().zip(newton.val().iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-10);
        }
        assert_relative_eq!(out.predicted_decrease, -0.5 * g.vdot(&newton).unwrap(), max_relative = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // A small radius cuts the step at the boundary.
    //
    // Given
    // -----
    // - The same system, Δ = 0.01.
    //
    // Expect
    // ------
    // - ‖p‖ = Δ, hits_boundary, positive predicted decrease.
    fn small_radius_hits_boundary() {
        let b = spread_diagonal();
        let g = Field::standard_normal(b.domain().clone(), &mut rng_for(5, 0));

        let out = solve_steihaug(&b, &g, 0.01, &CgOptions::default()).unwrap();

        assert!(out.hits_boundary);
        assert_relative_eq!(out.step.norm(), 0.01, max_relative = 1e-12);
        assert!(out.predicted_decrease > 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Negative curvature goes to the boundary downhill instead of failing.
    //
    // Given
    // -----
    // - B = −1 on R^3, g = [1, -2, 0.5], Δ = 2.
    //
    // Expect
    // ------
    // - p = −2 g / ‖g‖ and predicted decrease 2‖g‖ + 2.
    fn negative_curvature_steps_to_boundary() {
        let domain = Domain::unstructured(3);
        let b = ScalingOperator::new(domain.clone(), -1.0);
        let g = Field::from_vec(domain, vec![1.0, -2.0, 0.5]).unwrap();

        let out = solve_steihaug(&b, &g, 2.0, &CgOptions::default()).unwrap();

        assert!(out.hits_boundary);
        let expected = g.scale(-2.0 / g.norm());
        for (x, y) in out.step.val().iter().zip(expected.val().iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-14);
        }
        assert_relative_eq!(out.predicted_decrease, 2.0 * g.norm() + 2.0, epsilon = 1e-12);
        assert!(solve_steihaug(&b, &g, 0.0, &CgOptions::default()).is_err());
    }

    #[test]
    // Purpose
    // -------
    // The intersections of a ray from inside the region bracket zero.
    //
    // Given
    // -----
    // - p = [0.5, 0], d = [1, 0], Δ = 1.
    //
    // Expect
    // ------
    // - t = -1.5 and t = 0.5.
    fn boundary_intersections_bracket_zero() {
        let domain = Domain::unstructured(2);
        let p = Field::from_vec(domain.clone(), vec![0.5, 0.0]).unwrap();
        let d = Field::from_vec(domain, vec![1.0, 0.0]).unwrap();

        let (ta, tb) = boundary_intersections(&p, &d, 1.0).unwrap();

        assert_relative_eq!(ta, -1.5, epsilon = 1e-15);
        assert_relative_eq!(tb, 0.5, epsilon = 1e-15);
    }
}
