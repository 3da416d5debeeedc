//! argmin_backend::adapter — expose an [`Energy`] as an argmin problem.
//!
//! Purpose
//! -------
//! Implement argmin's [`CostFunction`] and [`Gradient`] for any energy by
//! moving the energy to the requested parameter vector with
//! [`Energy::at`]. The adapter borrows a template energy and never
//! mutates it.
//!
//! Conventions
//! -----------
//! - Crate errors cross the boundary as `argmin::core::Error` and are
//!   recovered by `From<argmin::core::Error> for IftError`.
//! - A trial point whose energy overflows costs `+∞`, so argmin's line
//!   searches backtrack from it. Non-finite gradients are rejected.
use argmin::core::{CostFunction, Error, Gradient};

use crate::{
    energy::Energy,
    errors::{IftError, IftResult},
    field::Field,
    minimization::argmin_backend::types::{Cost, Grad, Theta},
    validation::validate_gradient,
};

#[derive(Debug, Clone)]
pub struct EnergyProblem<'a, E: Energy> {
    template: &'a E,
}

impl<'a, E: Energy> EnergyProblem<'a, E> {
    pub fn new(template: &'a E) -> Self {
        Self { template }
    }

    /// Energy at a raw parameter vector.
    pub fn energy_at(&self, theta: &Theta) -> IftResult<E> {
        let position = Field::new(self.template.position().domain().clone(), theta.clone())?;
        self.template.at(position)
    }
}

impl<'a, E: Energy> CostFunction for EnergyProblem<'a, E> {
    type Param = Theta;
    type Output = Cost;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        match self.energy_at(theta) {
            Ok(energy) if energy.value().is_finite() => Ok(energy.value()),
            Ok(_) | Err(IftError::NonFiniteValue { .. }) => Ok(f64::INFINITY),
            Err(e) => Err(e.into()),
        }
    }
}

impl<'a, E: Energy> Gradient for EnergyProblem<'a, E> {
    type Param = Theta;
    type Gradient = Grad;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        let energy = self.energy_at(theta)?;
        validate_gradient(energy.gradient(), energy.position())?;
        Ok(energy.gradient().val().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::Domain, energy::QuadraticEnergy, operators::ScalingOperator};
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Cost and gradient through argmin's problem traits.
    // - Overflowing trial points and shape errors.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Cost and gradient come from the moved energy; bad lengths surface as
    // crate errors after the round trip through argmin's error type.
    //
    // Given
    // -----
    // - E = ½·2‖x‖² − ⟨1, x⟩ on two pixels at θ = [1, 2], and θ of length 3.
    //
    // Expect
    // ------
    // - cost 5 − 3 = 2, gradient [1, 3]; `ShapeMismatch` for the bad length.
    fn cost_and_gradient() {
        let domain = Domain::unstructured(2);
        let e = QuadraticEnergy::new(
            Field::zeros(domain.clone()),
            ScalingOperator::shared(domain.clone(), 2.0),
            Field::full(domain, 1.0),
        )
        .unwrap();
        let problem = EnergyProblem::new(&e);

        assert_eq!(problem.cost(&array![1.0, 2.0]).unwrap(), 2.0);
        assert_eq!(problem.gradient(&array![1.0, 2.0]).unwrap(), array![1.0, 3.0]);
        let err: IftError = problem.cost(&array![1.0, 2.0, 3.0]).unwrap_err().into();
        assert!(matches!(err, IftError::ShapeMismatch { .. }));
    }

    #[test]
    // Purpose
    // -------
    // An overflowing trial point costs +∞ instead of aborting the line
    // search, while its gradient is still refused.
    //
    // Given
    // -----
    // - The same energy at θ = [1e300, 0], where ½·2·θ² overflows.
    //
    // Expect
    // ------
    // - cost +∞; gradient is an error.
    fn overflow_costs_infinity() {
        let domain = Domain::unstructured(2);
        let e = QuadraticEnergy::new(
            Field::zeros(domain.clone()),
            ScalingOperator::shared(domain.clone(), 2.0),
            Field::full(domain, 1.0),
        )
        .unwrap();
        let problem = EnergyProblem::new(&e);

        assert_eq!(problem.cost(&array![1e300, 0.0]).unwrap(), f64::INFINITY);
        assert!(problem.gradient(&array![1e300, 0.0]).is_err());
    }
}
