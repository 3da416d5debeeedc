//! energy::quadratic — `½ xᵀAx − bᵀx`.
use crate::{
    domain::check_domain,
    energy::Energy,
    errors::IftResult,
    field::Field,
    operators::OpRef,
    validation::{validate_gradient, validate_value},
};

/// Quadratic energy with SPD curvature `A`; its minimum solves `A x = b`.
#[derive(Debug, Clone)]
pub struct QuadraticEnergy {
    a: OpRef,
    b: Field,
    position: Field,
    value: f64,
    gradient: Field,
}

impl QuadraticEnergy {
    /// # Errors
    /// - [`IftError::DomainMismatch`](crate::errors::IftError::DomainMismatch)
    ///   if `A` is not endomorphic on the domain of `b` and `position`.
    pub fn new(position: Field, a: OpRef, b: Field) -> IftResult<Self> {
        check_domain(a.domain(), a.target())?;
        check_domain(a.domain(), b.domain())?;
        let ax = a.times(&position)?;
        let value = 0.5 * position.vdot(&ax)? - b.vdot(&position)?;
        validate_value("quadratic energy", value)?;
        let gradient = ax.sub(&b)?;
        validate_gradient(&gradient, &position)?;
        Ok(Self { a, b, position, value, gradient })
    }

    pub fn rhs(&self) -> &Field {
        &self.b
    }
}

impl Energy for QuadraticEnergy {
    fn position(&self) -> &Field {
        &self.position
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn gradient(&self) -> &Field {
        &self.gradient
    }

    fn metric(&self) -> IftResult<OpRef> {
        Ok(self.a.clone())
    }

    fn at(&self, position: Field) -> IftResult<Self> {
        Self::new(position, self.a.clone(), self.b.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::Domain, operators::DiagonalOperator};
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Value, gradient and metric of a diagonal quadratic.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Value and gradient of a diagonal quadratic.
    //
    // Given
    // -----
    // - A = diag(2, 4), b = [2, 4], x = [0, 0] and x* = [1, 1].
    //
    // Expect
    // ------
    // - E(0) = 0 with gradient −b; E(x*) = −3 with zero gradient.
    fn diagonal_quadratic() {
        let domain = Domain::unstructured(2);
        let a = DiagonalOperator::shared(Field::from_vec(domain.clone(), vec![2.0, 4.0]).unwrap());
        let b = Field::from_vec(domain.clone(), vec![2.0, 4.0]).unwrap();

        let e = QuadraticEnergy::new(Field::zeros(domain.clone()), a, b.clone()).unwrap();
        let opt = e.at(Field::full(domain, 1.0)).unwrap();

        assert_relative_eq!(e.value(), 0.0);
        assert_eq!(e.gradient(), &b.neg());
        assert_relative_eq!(opt.value(), -3.0);
        assert_relative_eq!(opt.gradient_norm(), 0.0);
    }
}
