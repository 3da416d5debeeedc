//! energy::sum — pointwise sum of two energies.
use crate::{
    domain::check_domain,
    energy::Energy,
    errors::{IftError, IftResult},
    field::Field,
    operators::{OpRef, OperatorAlgebra},
};

/// `a + b`: values, gradients and metrics add.
#[derive(Debug, Clone)]
pub struct EnergySum<A: Energy, B: Energy> {
    a: A,
    b: B,
    gradient: Field,
}

impl<A: Energy, B: Energy> EnergySum<A, B> {
    /// # Errors
    /// - [`IftError::DomainMismatch`] if the energies are on different domains.
    /// - [`IftError::InvalidOption`] if they sit at different positions.
    pub fn new(a: A, b: B) -> IftResult<Self> {
        check_domain(a.position().domain(), b.position().domain())?;
        if a.position() != b.position() {
            return Err(IftError::InvalidOption {
                name: "position",
                reason: "Summed energies must be evaluated at the same position.",
            });
        }
        let gradient = a.gradient().add(b.gradient())?;
        Ok(Self { a, b, gradient })
    }

    pub fn parts(&self) -> (&A, &B) {
        (&self.a, &self.b)
    }
}

impl<A: Energy, B: Energy> Energy for EnergySum<A, B> {
    fn position(&self) -> &Field {
        self.a.position()
    }

    fn value(&self) -> f64 {
        self.a.value() + self.b.value()
    }

    fn gradient(&self) -> &Field {
        &self.gradient
    }

    fn metric(&self) -> IftResult<OpRef> {
        self.a.metric()?.plus(&self.b.metric()?)
    }

    fn at(&self, position: Field) -> IftResult<Self> {
        Self::new(self.a.at(position.clone())?, self.b.at(position)?)
    }
}
