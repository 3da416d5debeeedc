//! linearization::finite_diff — numerical checks of model Jacobians.
//!
//! Purpose
//! -------
//! Compare the Jacobians produced by [`Model::linearize`] with finite
//! differences, so that new models can be validated before they are used
//! inside an inference run.
//!
//! Key behaviors
//! -------------
//! - [`directional_error`] measures `‖(f(x + εv) − f(x − εv)) / 2ε − J v‖`,
//!   which shrinks like `ε²` for a correct Jacobian.
//! - [`fd_gradient`] differentiates the scalar projection `⟨y, f(x)⟩` with
//!   `finitediff` (central differences, forward as a fallback) and
//!   [`check_jacobian`] compares it with the adjoint Jacobian `J† y`.
//!
//! Conventions
//! -----------
//! - Model errors raised inside a finite-difference closure are captured
//!   in a `RefCell` and returned after the sweep; the closure itself
//!   reports `NaN`.
//! - Mismatches beyond the tolerance are [`IftError::JacobianInconsistent`].
use std::cell::RefCell;

use finitediff::FiniteDiff;
use ndarray::Array1;

use crate::{
    errors::{IftError, IftResult},
    field::{Field, IftRng},
    linearization::Model,
};

/// Central-difference error of `J v` at `x` with step `eps`.
pub fn directional_error(model: &dyn Model, x: &Field, direction: &Field, eps: f64) -> IftResult<f64> {
    let (_, jac) = model.apply_with_jacobian(x)?;
    let jv = jac.times(direction)?;
    let plus = model.apply(&x.add_scaled(direction, eps)?)?;
    let minus = model.apply(&x.add_scaled(direction, -eps)?)?;
    let fd = plus.sub(&minus)?.scale(0.5 / eps);
    Ok(fd.sub(&jv)?.norm())
}

fn projected_objective<'a>(
    model: &'a dyn Model, x: &'a Field, direction: &'a Field, closure_err: &'a RefCell<Option<IftError>>,
) -> impl Fn(&Array1<f64>) -> f64 + 'a {
    move |theta: &Array1<f64>| {
        let evaluated = Field::new(x.domain().clone(), theta.clone())
            .and_then(|point| model.apply(&point))
            .and_then(|out| out.vdot(direction));
        match evaluated {
            Ok(v) => v,
            Err(e) => {
                closure_err.replace(Some(e));
                f64::NAN
            }
        }
    }
}

/// Finite-difference gradient of `x ↦ ⟨direction, model(x)⟩`.
///
/// # Errors
/// - Any error raised by the model during the sweep.
/// - [`IftError::NonFiniteValue`] if neither central nor forward
///   differences give a finite gradient.
pub fn fd_gradient(model: &dyn Model, x: &Field, direction: &Field) -> IftResult<Field> {
    let closure_err: RefCell<Option<IftError>> = RefCell::new(None);
    let f = projected_objective(model, x, direction, &closure_err);
    let theta = x.val().clone();

    let central = theta.central_diff(&f);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    let central = Field::new(x.domain().clone(), central)?;
    if central.check_finite("central difference").is_ok() {
        return Ok(central);
    }

    let forward = Field::new(x.domain().clone(), theta.forward_diff(&f))?;
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    forward.check_finite("forward difference")?;
    Ok(forward)
}

/// Compare `J† y` against finite differences for a random direction `y`.
///
/// Returns the largest absolute deviation relative to `max(1, ‖J† y‖∞)`.
///
/// # Errors
/// - [`IftError::JacobianInconsistent`] if it exceeds `tol`.
pub fn check_jacobian(model: &dyn Model, x: &Field, rng: &mut IftRng, tol: f64) -> IftResult<f64> {
    let direction = Field::standard_normal(model.target().clone(), rng);
    let (_, jac) = model.apply_with_jacobian(x)?;
    let analytic = jac.adjoint_times(&direction)?;
    let numeric = fd_gradient(model, x, &direction)?;
    let scale = analytic.max_abs().max(1.0);
    let max_error = analytic.sub(&numeric)?.max_abs() / scale;
    if max_error > tol {
        return Err(IftError::JacobianInconsistent { max_error, tolerance: tol });
    }
    Ok(max_error)
}
