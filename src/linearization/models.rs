//! linearization::models — nonlinear forward models built from composable parts.
//!
//! Purpose
//! -------
//! A [`Model`] maps fields on its domain to fields on its target and can
//! propagate a [`Linearization`] through itself. Concrete models cover the
//! building blocks needed for generative priors and likelihoods: linear
//! maps, elementwise nonlinearities, chains, sums, products, offsets and
//! scalings. Anything more elaborate is assembled with [`ModelAlgebra`].
//!
//! Key behaviors
//! -------------
//! - [`Model::apply`] evaluates on a plain field and rejects non-finite
//!   output.
//! - [`Model::linearize`] evaluates on a linearization, chaining the new
//!   Jacobian onto the incoming one.
//! - [`Model::apply_with_jacobian`] is the convenience form returning the
//!   value together with the Jacobian as an operator.
//!
//! Invariants & assumptions
//! ------------------------
//! - `apply(x)` and `linearize(make_var(x)).val()` agree exactly.
//! - Composites check domain compatibility at construction, not per call.
use std::{fmt, sync::Arc};

use crate::{
    domain::{check_domain, DomainRef},
    errors::IftResult,
    field::{Field, Pointwise},
    linearization::Linearization,
    operators::OpRef,
};

pub type ModelRef = Arc<dyn Model>;

pub trait Model: fmt::Debug + Send + Sync {
    fn domain(&self) -> &DomainRef;
    fn target(&self) -> &DomainRef;
    fn name(&self) -> &'static str;

    /// Evaluate on a field already checked against [`Model::domain`].
    fn apply_field(&self, x: &Field) -> IftResult<Field>;

    /// Evaluate on a linearization already checked against [`Model::domain`].
    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization>;

    fn apply(&self, x: &Field) -> IftResult<Field> {
        check_domain(self.domain(), x.domain())?;
        let out = self.apply_field(x)?;
        out.check_finite(self.name())?;
        Ok(out)
    }

    fn linearize(&self, lin: &Linearization) -> IftResult<Linearization> {
        check_domain(self.domain(), lin.target())?;
        self.apply_linearization(lin)
    }

    fn linearize_at(&self, x: &Field, want_metric: bool) -> IftResult<Linearization> {
        self.linearize(&Linearization::make_var(x.clone(), want_metric))
    }

    /// Value and Jacobian at `x`.
    fn apply_with_jacobian(&self, x: &Field) -> IftResult<(Field, OpRef)> {
        let lin = self.linearize_at(x, false)?;
        Ok((lin.val().clone(), lin.jac().clone()))
    }
}

/// A linear operator viewed as a model.
#[derive(Debug, Clone)]
pub struct LinearModel {
    op: OpRef,
}

impl LinearModel {
    pub fn new(op: OpRef) -> Self {
        Self { op }
    }
}

impl Model for LinearModel {
    fn domain(&self) -> &DomainRef {
        self.op.domain()
    }
    fn target(&self) -> &DomainRef {
        self.op.target()
    }
    fn name(&self) -> &'static str {
        "LinearModel"
    }
    fn apply_field(&self, x: &Field) -> IftResult<Field> {
        self.op.times(x)
    }
    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization> {
        lin.apply_linear(&self.op)
    }
}

/// Elementwise nonlinearity.
#[derive(Debug, Clone)]
pub struct PointwiseModel {
    domain: DomainRef,
    func: Pointwise,
}

impl PointwiseModel {
    pub fn new(domain: DomainRef, func: Pointwise) -> Self {
        Self { domain, func }
    }
}

impl Model for PointwiseModel {
    fn domain(&self) -> &DomainRef {
        &self.domain
    }
    fn target(&self) -> &DomainRef {
        &self.domain
    }
    fn name(&self) -> &'static str {
        self.func.name()
    }
    fn apply_field(&self, x: &Field) -> IftResult<Field> {
        Ok(x.mapv(|v| self.func.value(v)))
    }
    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization> {
        lin.pointwise(self.func)
    }
}

/// `outer ∘ inner`.
#[derive(Debug, Clone)]
pub struct ChainModel {
    outer: ModelRef,
    inner: ModelRef,
}

impl ChainModel {
    pub fn new(outer: ModelRef, inner: ModelRef) -> IftResult<Self> {
        check_domain(outer.domain(), inner.target())?;
        Ok(Self { outer, inner })
    }
}

impl Model for ChainModel {
    fn domain(&self) -> &DomainRef {
        self.inner.domain()
    }
    fn target(&self) -> &DomainRef {
        self.outer.target()
    }
    fn name(&self) -> &'static str {
        "ChainModel"
    }
    fn apply_field(&self, x: &Field) -> IftResult<Field> {
        self.outer.apply_field(&self.inner.apply_field(x)?)
    }
    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization> {
        self.outer.apply_linearization(&self.inner.apply_linearization(lin)?)
    }
}

/// `a + b` on a shared domain and target.
#[derive(Debug, Clone)]
pub struct SumModel {
    a: ModelRef,
    b: ModelRef,
}

impl SumModel {
    pub fn new(a: ModelRef, b: ModelRef) -> IftResult<Self> {
        check_domain(a.domain(), b.domain())?;
        check_domain(a.target(), b.target())?;
        Ok(Self { a, b })
    }
}

impl Model for SumModel {
    fn domain(&self) -> &DomainRef {
        self.a.domain()
    }
    fn target(&self) -> &DomainRef {
        self.a.target()
    }
    fn name(&self) -> &'static str {
        "SumModel"
    }
    fn apply_field(&self, x: &Field) -> IftResult<Field> {
        self.a.apply_field(x)?.add(&self.b.apply_field(x)?)
    }
    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization> {
        self.a.apply_linearization(lin)?.add(&self.b.apply_linearization(lin)?)
    }
}

/// Pointwise product `a · b`.
#[derive(Debug, Clone)]
pub struct ProductModel {
    a: ModelRef,
    b: ModelRef,
}

impl ProductModel {
    pub fn new(a: ModelRef, b: ModelRef) -> IftResult<Self> {
        check_domain(a.domain(), b.domain())?;
        check_domain(a.target(), b.target())?;
        Ok(Self { a, b })
    }
}

impl Model for ProductModel {
    fn domain(&self) -> &DomainRef {
        self.a.domain()
    }
    fn target(&self) -> &DomainRef {
        self.a.target()
    }
    fn name(&self) -> &'static str {
        "ProductModel"
    }
    fn apply_field(&self, x: &Field) -> IftResult<Field> {
        self.a.apply_field(x)?.mul(&self.b.apply_field(x)?)
    }
    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization> {
        self.a.apply_linearization(lin)?.mul(&self.b.apply_linearization(lin)?)
    }
}

/// `model(x) + offset`.
#[derive(Debug, Clone)]
pub struct OffsetModel {
    model: ModelRef,
    offset: Field,
}

impl OffsetModel {
    pub fn new(model: ModelRef, offset: Field) -> IftResult<Self> {
        check_domain(model.target(), offset.domain())?;
        Ok(Self { model, offset })
    }
}

impl Model for OffsetModel {
    fn domain(&self) -> &DomainRef {
        self.model.domain()
    }
    fn target(&self) -> &DomainRef {
        self.model.target()
    }
    fn name(&self) -> &'static str {
        "OffsetModel"
    }
    fn apply_field(&self, x: &Field) -> IftResult<Field> {
        self.model.apply_field(x)?.add(&self.offset)
    }
    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization> {
        self.model.apply_linearization(lin)?.add_field(&self.offset)
    }
}

/// `factor · model(x)`.
#[derive(Debug, Clone)]
pub struct ScaledModel {
    model: ModelRef,
    factor: f64,
}

impl ScaledModel {
    pub fn new(model: ModelRef, factor: f64) -> Self {
        Self { model, factor }
    }
}

impl Model for ScaledModel {
    fn domain(&self) -> &DomainRef {
        self.model.domain()
    }
    fn target(&self) -> &DomainRef {
        self.model.target()
    }
    fn name(&self) -> &'static str {
        "ScaledModel"
    }
    fn apply_field(&self, x: &Field) -> IftResult<Field> {
        Ok(self.model.apply_field(x)?.scale(self.factor))
    }
    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization> {
        self.model.apply_linearization(lin)?.scale(self.factor)
    }
}

/// Composition helpers on shared models.
pub trait ModelAlgebra {
    /// `self ∘ inner`.
    fn chain(&self, inner: &ModelRef) -> IftResult<ModelRef>;
    fn plus(&self, other: &ModelRef) -> IftResult<ModelRef>;
    fn product(&self, other: &ModelRef) -> IftResult<ModelRef>;
    fn offset(&self, offset: Field) -> IftResult<ModelRef>;
    fn scaled(&self, factor: f64) -> ModelRef;
    /// `func ∘ self`.
    fn pointwise(&self, func: Pointwise) -> ModelRef;
}

impl ModelAlgebra for ModelRef {
    fn chain(&self, inner: &ModelRef) -> IftResult<ModelRef> {
        Ok(Arc::new(ChainModel::new(self.clone(), inner.clone())?))
    }

    fn plus(&self, other: &ModelRef) -> IftResult<ModelRef> {
        Ok(Arc::new(SumModel::new(self.clone(), other.clone())?))
    }

    fn product(&self, other: &ModelRef) -> IftResult<ModelRef> {
        Ok(Arc::new(ProductModel::new(self.clone(), other.clone())?))
    }

    fn offset(&self, offset: Field) -> IftResult<ModelRef> {
        Ok(Arc::new(OffsetModel::new(self.clone(), offset)?))
    }

    fn scaled(&self, factor: f64) -> ModelRef {
        Arc::new(ScaledModel::new(self.clone(), factor))
    }

    fn pointwise(&self, func: Pointwise) -> ModelRef {
        let outer = PointwiseModel::new(self.target().clone(), func);
        Arc::new(ChainModel { outer: Arc::new(outer), inner: self.clone() })
    }
}

/// Shorthand for [`LinearModel::new`] behind an `Arc`.
pub fn linear(op: OpRef) -> ModelRef {
    Arc::new(LinearModel::new(op))
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
    // - Agreement of `apply` with the value of `linearize`.
    // - Jacobians of composite models against hand-derived formulas.
    // - Domain checks at construction.
    // -------------------------------------------------------------------------

    fn log_normal_model(domain: &DomainRef) -> ModelRef {
        let amp = DiagonalOperator::shared(Field::from_fn(domain.clone(), |i| 0.5 + i as f64));
        linear(amp).pointwise(Pointwise::Exp)
    }

    #[test]
    // Purpose
    // -------
    // exp(A x) and its Jacobian diag(exp(Ax)) A.
    //
    // Given
    // -----
    // - A = diag(0.5, 1.5, 2.5), x = [0.2, -0.1, 0.3].
    //
    // Expect
    // ------
    // - `apply` equals the linearized value; J v matches the formula.
    fn exp_of_linear_jacobian() {
        let domain = Domain::unstructured(3);
        let model = log_normal_model(&domain);
        let x = Field::from_vec(domain.clone(), vec![0.2, -0.1, 0.3]).unwrap();
        let v = Field::from_vec(domain.clone(), vec![1.0, 2.0, -1.0]).unwrap();

        let (val, jac) = model.apply_with_jacobian(&x).unwrap();
        let jv = jac.times(&v).unwrap();

        assert_eq!(val, model.apply(&x).unwrap());
        for i in 0..3 {
            let a = 0.5 + i as f64;
            let expected = (a * x.val()[i]).exp() * a * v.val()[i];
            assert_relative_eq!(jv.val()[i], expected, epsilon = 1e-13);
        }
    }

    #[test]
    // Purpose
    // -------
    // Sums, products, offsets and scalings compose consistently.
    //
    // Given
    // -----
    // - f(x) = 2·(x·exp(x) + x) + 1 on one pixel at x = 0.5.
    //
    // Expect
    // ------
    // - value and derivative 2·(eˣ(1+x) + 1).
    fn composite_value_and_derivative() {
        let domain = Domain::unstructured(1);
        let id = linear(crate::operators::ScalingOperator::shared(domain.clone(), 1.0));
        let f = id
            .pointwise(Pointwise::Exp)
            .product(&id)
            .unwrap()
            .plus(&id)
            .unwrap()
            .scaled(2.0)
            .offset(Field::full(domain.clone(), 1.0))
            .unwrap();
        let x = Field::full(domain.clone(), 0.5);

        let (val, jac) = f.apply_with_jacobian(&x).unwrap();

        let e = 0.5f64.exp();
        assert_relative_eq!(val.val()[0], 2.0 * (0.5 * e + 0.5) + 1.0, epsilon = 1e-14);
        let d = jac.times(&Field::full(domain, 1.0)).unwrap();
        assert_relative_eq!(d.val()[0], 2.0 * (e * 1.5 + 1.0), epsilon = 1e-14);
    }

    #[test]
    // Purpose
    // -------
    // Mismatched domains are rejected when composing.
    //
    // Given
    // -----
    // - Models on domains of size 2 and 3.
    //
    // Expect
    // ------
    // - `plus` and `chain` fail with `DomainMismatch`.
    fn composition_checks_domains() {
        let a = log_normal_model(&Domain::unstructured(2));
        let b = log_normal_model(&Domain::unstructured(3));

        assert!(matches!(a.plus(&b), Err(crate::errors::IftError::DomainMismatch { .. })));
        assert!(matches!(a.chain(&b), Err(crate::errors::IftError::DomainMismatch { .. })));
    }
}
