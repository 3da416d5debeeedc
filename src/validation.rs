//! Validation helpers shared by the option structs and minimizers.
//!
//! - **Tolerance checks**: [`verify_tolerance`] and [`verify_optional_tolerance`]
//!   require finite, strictly positive values.
//! - **Iteration limits**: [`verify_iteration_limit`] rejects zero.
//! - **Unit-interval parameters**: [`verify_open_unit`] for line-search
//!   constants.
//! - **Energies**: [`validate_value`] and [`validate_gradient`] guard
//!   minimizer inputs against NaN and dimension errors.
//!
//! They standardize error reporting so every option struct fails the same way.
use crate::{
    errors::{IftError, IftResult},
    field::Field,
};

pub fn verify_tolerance(name: &'static str, value: f64) -> IftResult<()> {
    if !value.is_finite() {
        return Err(IftError::InvalidTolerance { name, value, reason: "Tolerance must be finite." });
    }
    if value <= 0.0 {
        return Err(IftError::InvalidTolerance { name, value, reason: "Tolerance must be positive." });
    }
    Ok(())
}

pub fn verify_optional_tolerance(name: &'static str, value: Option<f64>) -> IftResult<()> {
    match value {
        Some(v) => verify_tolerance(name, v),
        None => Ok(()),
    }
}

pub fn verify_iteration_limit(name: &'static str, value: usize) -> IftResult<()> {
    if value == 0 {
        return Err(IftError::InvalidIterationLimit {
            name,
            value,
            reason: "Iteration limit must be greater than zero.",
        });
    }
    Ok(())
}

/// Require `0 < value < 1`.
pub fn verify_open_unit(name: &'static str, value: f64) -> IftResult<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(IftError::InvalidTolerance { name, value, reason: "Value must lie strictly between 0 and 1." });
    }
    Ok(())
}

pub fn validate_value(context: &'static str, value: f64) -> IftResult<()> {
    if !value.is_finite() {
        return Err(IftError::NonFiniteValue { context, index: 0, value });
    }
    Ok(())
}

pub fn validate_gradient(gradient: &Field, position: &Field) -> IftResult<()> {
    if gradient.size() != position.size() {
        return Err(IftError::ShapeMismatch { expected: position.size(), found: gradient.size() });
    }
    gradient.check_finite("gradient")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Tolerance and iteration-limit checks.
    // - Gradient length and finiteness checks.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Tolerances must be finite and positive; limits must be non-zero.
    //
    // Given
    // -----
    // - Tolerances 0, -1, NaN and 1e-6; limits 0 and 5.
    //
    // Expect
    // ------
    // - Only 1e-6 and 5 pass.
    fn tolerances_and_limits() {
        assert!(verify_tolerance("tol", 0.0).is_err());
        assert!(verify_tolerance("tol", -1.0).is_err());
        assert!(verify_tolerance("tol", f64::NAN).is_err());
        assert!(verify_tolerance("tol", 1e-6).is_ok());
        assert!(verify_optional_tolerance("tol", None).is_ok());
        assert!(verify_iteration_limit("n", 0).is_err());
        assert!(verify_iteration_limit("n", 5).is_ok());
        assert!(verify_open_unit("c1", 1.0).is_err());
        assert!(verify_open_unit("c1", 1e-4).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Gradients must match the position size and be finite.
    //
    // Given
    // -----
    // - A position of size 3, gradients of size 2 and with a NaN.
    //
    // Expect
    // ------
    // - `ShapeMismatch`, then `NonFiniteValue`.
    fn gradient_validation() {
        let pos = Field::zeros(Domain::unstructured(3));
        let short = Field::zeros(Domain::unstructured(2));
        let bad = Field::from_vec(Domain::unstructured(3), vec![0.0, f64::NAN, 0.0]).unwrap();

        assert!(matches!(validate_gradient(&short, &pos), Err(IftError::ShapeMismatch { .. })));
        assert!(matches!(validate_gradient(&bad, &pos), Err(IftError::NonFiniteValue { .. })));
    }
}
