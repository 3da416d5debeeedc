//! linearization::base — value, Jacobian and metric at a point.
//!
//! Purpose
//! -------
//! A [`Linearization`] is the unit of reverse-mode differentiation: the
//! value of a model at a point, the Jacobian there as a lazy operator from
//! the latent domain, and optionally the metric of a scalar energy. Every
//! operation on it returns a new linearization whose Jacobian is the chain
//! rule applied to its inputs' Jacobians.
//!
//! Key behaviors
//! -------------
//! - [`Linearization::make_var`] starts a computation: value `x`,
//!   Jacobian the identity.
//! - Arithmetic (`add`, `mul`, `vdot`, `sum`, `pointwise`, ...) combines
//!   values eagerly and Jacobians lazily.
//! - [`Linearization::gradient`] applies the adjoint Jacobian of a scalar
//!   linearization to the seed `1.0`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `jac.target == val.domain`; the Jacobian's domain is the latent
//!   domain shared by every linearization in one computation.
//! - Values are finite; NaN or infinity is raised immediately.
//! - Metrics only appear on scalar linearizations and live on the latent
//!   domain.
use std::sync::Arc;

use crate::{
    domain::{check_domain, DomainRef},
    errors::IftResult,
    field::{Field, Pointwise},
    operators::{
        DiagonalOperator, NullOperator, OpRef, OperatorAlgebra, ScalingOperator,
        SumReductionOperator, VdotOperator,
    },
};

#[derive(Debug, Clone)]
pub struct Linearization {
    val: Field,
    jac: OpRef,
    metric: Option<OpRef>,
    want_metric: bool,
}

impl Linearization {
    /// # Errors
    /// - [`IftError::DomainMismatch`](crate::errors::IftError::DomainMismatch)
    ///   if the Jacobian does not end on the value's domain or the metric is
    ///   not on the Jacobian's domain.
    /// - [`IftError::NonFiniteValue`](crate::errors::IftError::NonFiniteValue)
    ///   for a non-finite value.
    pub fn new(val: Field, jac: OpRef, metric: Option<OpRef>, want_metric: bool) -> IftResult<Self> {
        check_domain(jac.target(), val.domain())?;
        if let Some(m) = &metric {
            check_domain(m.domain(), jac.domain())?;
        }
        val.check_finite("linearization value")?;
        Ok(Self { val, jac, metric, want_metric })
    }

    /// Independent variable at `position`.
    pub fn make_var(position: Field, want_metric: bool) -> Self {
        let jac = ScalingOperator::shared(position.domain().clone(), 1.0);
        Self { val: position, jac, metric: None, want_metric }
    }

    /// Constant with respect to a latent domain.
    pub fn make_const(value: Field, latent: DomainRef) -> Self {
        let jac: OpRef = Arc::new(NullOperator::new(latent, value.domain().clone()));
        Self { val: value, jac, metric: None, want_metric: false }
    }

    pub fn val(&self) -> &Field {
        &self.val
    }

    pub fn jac(&self) -> &OpRef {
        &self.jac
    }

    pub fn metric(&self) -> Option<&OpRef> {
        self.metric.as_ref()
    }

    pub fn want_metric(&self) -> bool {
        self.want_metric
    }

    /// Latent domain.
    pub fn domain(&self) -> &DomainRef {
        self.jac.domain()
    }

    /// Domain of the value.
    pub fn target(&self) -> &DomainRef {
        self.val.domain()
    }

    pub fn value(&self) -> IftResult<f64> {
        self.val.as_scalar()
    }

    /// Gradient of a scalar linearization, `J†(1)`.
    pub fn gradient(&self) -> IftResult<Field> {
        self.val.as_scalar()?;
        self.jac.adjoint_times(&Field::scalar(1.0))
    }

    pub fn with_metric(self, metric: Option<OpRef>) -> IftResult<Self> {
        Self::new(self.val, self.jac, metric, self.want_metric)
    }

    fn derived(&self, val: Field, jac: OpRef) -> IftResult<Self> {
        Self::new(val, jac, None, self.want_metric)
    }

    // ---- Arithmetic ----

    pub fn add(&self, other: &Linearization) -> IftResult<Self> {
        let val = self.val.add(&other.val)?;
        let jac = self.jac.plus(&other.jac)?;
        let metric = match (&self.metric, &other.metric) {
            (Some(a), Some(b)) => Some(a.plus(b)?),
            _ => None,
        };
        Self::new(val, jac, metric, self.want_metric || other.want_metric)
    }

    pub fn sub(&self, other: &Linearization) -> IftResult<Self> {
        let val = self.val.sub(&other.val)?;
        let jac = self.jac.minus(&other.jac)?;
        Self::new(val, jac, None, self.want_metric || other.want_metric)
    }

    /// Shift the value by a constant field.
    pub fn add_field(&self, offset: &Field) -> IftResult<Self> {
        Self::new(self.val.add(offset)?, self.jac.clone(), self.metric.clone(), self.want_metric)
    }

    pub fn scale(&self, factor: f64) -> IftResult<Self> {
        let metric = self.metric.as_ref().map(|m| m.scaled(factor));
        Self::new(self.val.scale(factor), self.jac.scaled(factor), metric, self.want_metric)
    }

    /// Pointwise product with the product rule.
    pub fn mul(&self, other: &Linearization) -> IftResult<Self> {
        let val = self.val.mul(&other.val)?;
        let left = DiagonalOperator::shared(other.val.clone()).chain(&self.jac)?;
        let right = DiagonalOperator::shared(self.val.clone()).chain(&other.jac)?;
        Self::new(val, left.plus(&right)?, None, self.want_metric || other.want_metric)
    }

    /// Pointwise product with a constant field.
    pub fn mul_field(&self, factor: &Field) -> IftResult<Self> {
        let jac = DiagonalOperator::shared(factor.clone()).chain(&self.jac)?;
        self.derived(self.val.mul(factor)?, jac)
    }

    /// Scalar `⟨self, other⟩`.
    pub fn vdot(&self, other: &Linearization) -> IftResult<Self> {
        let val = Field::scalar(self.val.vdot(&other.val)?);
        let left: OpRef = Arc::new(VdotOperator::new(other.val.clone()));
        let right: OpRef = Arc::new(VdotOperator::new(self.val.clone()));
        let jac = left.chain(&self.jac)?.plus(&right.chain(&other.jac)?)?;
        Self::new(val, jac, None, self.want_metric || other.want_metric)
    }

    /// Scalar `⟨self, f⟩` with a constant field.
    pub fn vdot_field(&self, f: &Field) -> IftResult<Self> {
        let vdot: OpRef = Arc::new(VdotOperator::new(f.clone()));
        self.derived(Field::scalar(self.val.vdot(f)?), vdot.chain(&self.jac)?)
    }

    /// Scalar sum over all pixels.
    pub fn sum(&self) -> IftResult<Self> {
        let reduce: OpRef = Arc::new(SumReductionOperator::new(self.target().clone()));
        self.derived(Field::scalar(self.val.sum()), reduce.chain(&self.jac)?)
    }

    /// Elementwise nonlinearity; the Jacobian gains a diagonal factor.
    pub fn pointwise(&self, func: Pointwise) -> IftResult<Self> {
        let (val, derivative) = func.evaluate(&self.val);
        derivative.check_finite(func.name())?;
        self.derived(val, DiagonalOperator::shared(derivative).chain(&self.jac)?)
    }

    /// Push through a linear operator.
    pub fn apply_linear(&self, op: &OpRef) -> IftResult<Self> {
        self.derived(op.times(&self.val)?, op.chain(&self.jac)?)
    }
}
