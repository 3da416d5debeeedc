//! utils::consistency — numerical self-checks for operators.
//!
//! Purpose
//! -------
//! Verify on random probes that an operator keeps the promises of its
//! contract: linearity, the adjoint identity `⟨Ax, y⟩ = ⟨x, A†y⟩`, and
//! `A⁻¹(Ax) = x` wherever inversion is advertised. Useful in tests and
//! when assembling new forward models.
//!
//! Conventions
//! -----------
//! - Probes are standard-normal fields drawn from the caller's generator.
//! - Scalar comparisons pass if `|lhs − rhs| ≤ atol + rtol · max(|lhs|, |rhs|)`.
//! - Failures report [`IftError::ConsistencyViolated`] naming the check.
use crate::{
    errors::{IftError, IftResult},
    field::{Field, IftRng},
    operators::{LinearOperator, Mode},
};

fn close(check: &'static str, lhs: f64, rhs: f64, atol: f64, rtol: f64) -> IftResult<()> {
    if (lhs - rhs).abs() <= atol + rtol * lhs.abs().max(rhs.abs()) {
        Ok(())
    } else {
        Err(IftError::ConsistencyViolated { check, lhs, rhs })
    }
}

/// Adjoint identity for forward modes and, if supported, inverse modes.
pub fn check_adjoint(op: &dyn LinearOperator, rng: &mut IftRng, atol: f64, rtol: f64) -> IftResult<()> {
    let x = Field::standard_normal(op.domain().clone(), rng);
    let y = Field::standard_normal(op.target().clone(), rng);
    let cap = op.capability();
    if cap.supports(Mode::Times) && cap.supports(Mode::AdjointTimes) {
        let lhs = op.times(&x)?.vdot(&y)?;
        let rhs = x.vdot(&op.adjoint_times(&y)?)?;
        close("adjoint", lhs, rhs, atol, rtol)?;
    }
    if cap.supports(Mode::InverseTimes) && cap.supports(Mode::AdjointInverseTimes) {
        let lhs = op.inverse_times(&y)?.vdot(&x)?;
        let rhs = y.vdot(&op.adjoint_inverse_times(&x)?)?;
        close("adjoint_inverse", lhs, rhs, atol, rtol)?;
    }
    Ok(())
}

/// `A⁻¹ A x = x` and `A A⁻¹ y = y` within relative tolerance `tol`.
pub fn check_inverse(op: &dyn LinearOperator, rng: &mut IftRng, tol: f64) -> IftResult<()> {
    let cap = op.capability();
    if cap.supports(Mode::Times) && cap.supports(Mode::InverseTimes) {
        let x = Field::standard_normal(op.domain().clone(), rng);
        let back = op.inverse_times(&op.times(&x)?)?;
        close("inverse", back.sub(&x)?.norm(), 0.0, tol * x.norm(), 0.0)?;
        let y = Field::standard_normal(op.target().clone(), rng);
        let forth = op.times(&op.inverse_times(&y)?)?;
        close("inverse", forth.sub(&y)?.norm(), 0.0, tol * y.norm(), 0.0)?;
    }
    if cap.supports(Mode::AdjointTimes) && cap.supports(Mode::AdjointInverseTimes) {
        let y = Field::standard_normal(op.target().clone(), rng);
        let back = op.adjoint_inverse_times(&op.adjoint_times(&y)?)?;
        close("adjoint_inverse", back.sub(&y)?.norm(), 0.0, tol * y.norm(), 0.0)?;
    }
    Ok(())
}

/// `A(αx + βy) = αAx + βAy`.
pub fn check_linearity(op: &dyn LinearOperator, rng: &mut IftRng, tol: f64) -> IftResult<()> {
    let x = Field::standard_normal(op.domain().clone(), rng);
    let y = Field::standard_normal(op.domain().clone(), rng);
    let (alpha, beta) = (0.7, -1.3);
    let combined = op.times(&x.scale(alpha).add_scaled(&y, beta)?)?;
    let separate = op.times(&x)?.scale(alpha).add_scaled(&op.times(&y)?, beta)?;
    let scale = combined.norm().max(separate.norm());
    close("linearity", combined.sub(&separate)?.norm(), 0.0, tol * scale.max(f64::MIN_POSITIVE), 0.0)
}

/// Run every check the operator's capabilities allow.
pub fn consistency_check(op: &dyn LinearOperator, rng: &mut IftRng, tol: f64) -> IftResult<()> {
    if op.capability().supports(Mode::Times) {
        check_linearity(op, rng, tol)?;
    }
    check_adjoint(op, rng, tol, tol)?;
    check_inverse(op, rng, tol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Domain, DomainRef},
        field::rng_for,
        operators::{Capability, DiagonalOperator},
    };

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Detection of a wrong adjoint.
    // - A diagonal operator passing every check.
    // -------------------------------------------------------------------------

    /// Deliberately broken operator: its adjoint is not the transpose.
    #[derive(Debug)]
    struct BrokenAdjoint {
        domain: DomainRef,
    }

    impl LinearOperator for BrokenAdjoint {
        fn domain(&self) -> &DomainRef {
            &self.domain
        }
        fn target(&self) -> &DomainRef {
            &self.domain
        }
        fn capability(&self) -> Capability {
            Capability::FORWARD
        }
        fn name(&self) -> &'static str {
            "BrokenAdjoint"
        }
        fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
            match mode {
                Mode::Times => Ok(x.scale(2.0)),
                _ => Ok(x.scale(3.0)),
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // A wrong adjoint is caught.
    //
    // Given
    // -----
    // - A = 2 · 1 whose "adjoint" multiplies by 3.
    //
    // Expect
    // ------
    // - `ConsistencyViolated { check: "adjoint", .. }`.
    fn detects_wrong_adjoint() {
        let op = BrokenAdjoint { domain: Domain::unstructured(5) };

        let err = check_adjoint(&op, &mut rng_for(61, 0), 1e-12, 1e-12).unwrap_err();

        assert!(matches!(err, IftError::ConsistencyViolated { check: "adjoint", .. }));
    }

    #[test]
    // Purpose
    // -------
    // A correct invertible operator passes every check.
    //
    // Given
    // -----
    // - A nonzero diagonal.
    //
    // Expect
    // ------
    // - `consistency_check` returns Ok.
    fn diagonal_passes_all_checks() {
        let domain = Domain::unstructured(7);
        let d = DiagonalOperator::new(Field::from_fn(domain, |i| 1.0 + i as f64));

        consistency_check(&d, &mut rng_for(62, 0), 1e-12).unwrap();
    }
}
