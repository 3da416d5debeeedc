//! operators::basic — small leaf operators.
//!
//! - [`ScalingOperator`]: `α · Identity`, also the identity itself.
//! - [`NullOperator`]: maps everything to zero; Jacobian of constants.
//! - [`VdotOperator`]: `x ↦ ⟨f, x⟩` onto the scalar domain.
//! - [`SumReductionOperator`]: `x ↦ Σ x` onto the scalar domain.
use std::sync::Arc;

use crate::{
    domain::{Domain, DomainRef},
    errors::{IftError, IftResult},
    field::{Field, IftRng},
    operators::traits::{Capability, LinearOperator, Mode, OpRef},
};

/// `α · Identity` on a domain.
#[derive(Debug, Clone)]
pub struct ScalingOperator {
    domain: DomainRef,
    factor: f64,
}

impl ScalingOperator {
    pub fn new(domain: DomainRef, factor: f64) -> Self {
        Self { domain, factor }
    }

    pub fn identity(domain: DomainRef) -> Self {
        Self::new(domain, 1.0)
    }

    pub fn shared(domain: DomainRef, factor: f64) -> OpRef {
        Arc::new(Self::new(domain, factor))
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl LinearOperator for ScalingOperator {
    fn domain(&self) -> &DomainRef {
        &self.domain
    }

    fn target(&self) -> &DomainRef {
        &self.domain
    }

    fn capability(&self) -> Capability {
        if self.factor == 0.0 { Capability::FORWARD } else { Capability::ALL }
    }

    fn name(&self) -> &'static str {
        "ScalingOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        if mode.is_inverse() { Ok(x.scale(1.0 / self.factor)) } else { Ok(x.scale(self.factor)) }
    }

    fn draw_sample(&self, from_inverse: bool, rng: &mut IftRng) -> IftResult<Field> {
        if self.factor < 0.0 {
            return Err(IftError::NotPositiveDefinite { context: self.name(), value: self.factor });
        }
        if self.factor == 0.0 {
            if from_inverse {
                return Err(IftError::SingularOperator { operator: self.name(), index: 0 });
            }
            return Ok(Field::zeros(self.domain.clone()));
        }
        let xi = Field::standard_normal(self.domain.clone(), rng);
        let amplitude = if from_inverse { 1.0 / self.factor.sqrt() } else { self.factor.sqrt() };
        Ok(xi.scale(amplitude))
    }

    fn scaling_factor(&self) -> Option<f64> {
        Some(self.factor)
    }
}

/// The zero map between two domains.
#[derive(Debug, Clone)]
pub struct NullOperator {
    domain: DomainRef,
    target: DomainRef,
}

impl NullOperator {
    pub fn new(domain: DomainRef, target: DomainRef) -> Self {
        Self { domain, target }
    }
}

impl LinearOperator for NullOperator {
    fn domain(&self) -> &DomainRef {
        &self.domain
    }

    fn target(&self) -> &DomainRef {
        &self.target
    }

    fn capability(&self) -> Capability {
        Capability::FORWARD
    }

    fn name(&self) -> &'static str {
        "NullOperator"
    }

    fn apply_unchecked(&self, _x: &Field, mode: Mode) -> IftResult<Field> {
        let out = if mode.input_is_domain() { &self.target } else { &self.domain };
        Ok(Field::zeros(out.clone()))
    }
}

/// `x ↦ ⟨f, x⟩`. The adjoint maps a scalar `s` to `s · f`.
#[derive(Debug, Clone)]
pub struct VdotOperator {
    field: Field,
    target: DomainRef,
}

impl VdotOperator {
    pub fn new(field: Field) -> Self {
        Self { field, target: Domain::scalar() }
    }
}

impl LinearOperator for VdotOperator {
    fn domain(&self) -> &DomainRef {
        self.field.domain()
    }

    fn target(&self) -> &DomainRef {
        &self.target
    }

    fn capability(&self) -> Capability {
        Capability::FORWARD
    }

    fn name(&self) -> &'static str {
        "VdotOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        match mode {
            Mode::Times => Ok(Field::scalar(self.field.vdot(x)?)),
            _ => Ok(self.field.scale(x.as_scalar()?)),
        }
    }
}

/// `x ↦ Σᵢ xᵢ`. The adjoint broadcasts a scalar to every pixel.
#[derive(Debug, Clone)]
pub struct SumReductionOperator {
    domain: DomainRef,
    target: DomainRef,
}

impl SumReductionOperator {
    pub fn new(domain: DomainRef) -> Self {
        Self { domain, target: Domain::scalar() }
    }
}

impl LinearOperator for SumReductionOperator {
    fn domain(&self) -> &DomainRef {
        &self.domain
    }

    fn target(&self) -> &DomainRef {
        &self.target
    }

    fn capability(&self) -> Capability {
        Capability::FORWARD
    }

    fn name(&self) -> &'static str {
        "SumReductionOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        match mode {
            Mode::Times => Ok(Field::scalar(x.sum())),
            _ => Ok(Field::full(self.domain.clone(), x.as_scalar()?)),
        }
    }
}
