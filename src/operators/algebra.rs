//! operators::algebra — lazy composition of operators.
//!
//! Purpose
//! -------
//! Build composite operators from existing ones without evaluating
//! anything: sums and differences, chains, scalar multiples and the
//! adjoint / inverse flips. Every composite is itself a
//! [`LinearOperator`], so compositions nest into an acyclic expression
//! tree whose leaves are concrete operators.
//!
//! Key behaviors
//! -------------
//! - [`OperatorAlgebra`] adds `adjoint`, `inverse`, `chain`, `plus`,
//!   `minus` and `scaled` to [`OpRef`].
//! - Constructors simplify where it is free: identities vanish from
//!   chains, scalings merge, double flips cancel.
//! - Domain compatibility is checked once at construction; application
//!   re-checks only the input field.
//!
//! Invariants & assumptions
//! ------------------------
//! - Chain `A ∘ B` requires `B.target == A.domain`.
//! - Sum `A + B` requires equal domains and equal targets; it supports
//!   only the forward modes.
//! - Capabilities of a chain are the intersection of its parts.
use std::sync::Arc;

use crate::{
    domain::{check_domain, DomainRef},
    errors::{IftError, IftResult},
    field::{Field, IftRng},
    operators::{
        basic::ScalingOperator,
        traits::{Capability, Flip, LinearOperator, Mode, OpRef},
    },
};

/// Operator-building methods on shared operators.
pub trait OperatorAlgebra {
    /// Lazy adjoint.
    fn adjoint(&self) -> OpRef;
    /// Lazy inverse. Application fails unless the wrapped operator can invert.
    fn inverse(&self) -> OpRef;
    /// `self ∘ inner`.
    fn chain(&self, inner: &OpRef) -> IftResult<OpRef>;
    /// `self + other`.
    fn plus(&self, other: &OpRef) -> IftResult<OpRef>;
    /// `self - other`.
    fn minus(&self, other: &OpRef) -> IftResult<OpRef>;
    /// `factor · self`.
    fn scaled(&self, factor: f64) -> OpRef;
}

impl OperatorAlgebra for OpRef {
    fn adjoint(&self) -> OpRef {
        if self.scaling_factor().is_some() {
            return self.clone();
        }
        flip(self, Flip::Adjoint)
    }

    fn inverse(&self) -> OpRef {
        match self.scaling_factor() {
            Some(factor) if factor != 0.0 => ScalingOperator::shared(self.domain().clone(), 1.0 / factor),
            _ => flip(self, Flip::Inverse),
        }
    }

    fn chain(&self, inner: &OpRef) -> IftResult<OpRef> {
        check_domain(self.domain(), inner.target())?;
        match (self.scaling_factor(), inner.scaling_factor()) {
            (Some(a), Some(b)) => Ok(ScalingOperator::shared(inner.domain().clone(), a * b)),
            (Some(a), None) if a == 1.0 => Ok(inner.clone()),
            (None, Some(b)) if b == 1.0 => Ok(self.clone()),
            _ => Ok(Arc::new(ChainOperator { outer: self.clone(), inner: inner.clone() })),
        }
    }

    fn plus(&self, other: &OpRef) -> IftResult<OpRef> {
        SumOperator::make(vec![(self.clone(), 1.0), (other.clone(), 1.0)])
    }

    fn minus(&self, other: &OpRef) -> IftResult<OpRef> {
        SumOperator::make(vec![(self.clone(), 1.0), (other.clone(), -1.0)])
    }

    fn scaled(&self, factor: f64) -> OpRef {
        if factor == 1.0 {
            return self.clone();
        }
        match self.scaling_factor() {
            Some(s) => ScalingOperator::shared(self.domain().clone(), factor * s),
            None => Arc::new(ScaledOperator { op: self.clone(), factor }),
        }
    }
}

fn flip(op: &OpRef, f: Flip) -> OpRef {
    if let Some((inner, existing)) = op.flip_parts() {
        return match existing.compose(f) {
            None => inner.clone(),
            Some(combined) => Arc::new(FlippedOperator::new(inner.clone(), combined)),
        };
    }
    Arc::new(FlippedOperator::new(op.clone(), f))
}

/// Lazy adjoint, inverse or adjoint-inverse of an operator.
#[derive(Debug, Clone)]
pub struct FlippedOperator {
    op: OpRef,
    flip: Flip,
}

impl FlippedOperator {
    pub fn new(op: OpRef, flip: Flip) -> Self {
        Self { op, flip }
    }
}

impl LinearOperator for FlippedOperator {
    fn domain(&self) -> &DomainRef {
        if self.flip.swaps_spaces() { self.op.target() } else { self.op.domain() }
    }

    fn target(&self) -> &DomainRef {
        if self.flip.swaps_spaces() { self.op.domain() } else { self.op.target() }
    }

    fn capability(&self) -> Capability {
        self.op.capability().flipped(self.flip)
    }

    fn name(&self) -> &'static str {
        match self.flip {
            Flip::Adjoint => "AdjointOperator",
            Flip::Inverse => "InverseOperator",
            Flip::AdjointInverse => "AdjointInverseOperator",
        }
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        self.op.apply(x, mode.flipped(self.flip))
    }

    fn draw_sample(&self, from_inverse: bool, rng: &mut IftRng) -> IftResult<Field> {
        match self.flip {
            Flip::Adjoint if self.op.is_endomorphic() => self.op.draw_sample(from_inverse, rng),
            Flip::Inverse | Flip::AdjointInverse => self.op.draw_sample(!from_inverse, rng),
            Flip::Adjoint => Err(IftError::SamplingNotSupported { operator: self.name() }),
        }
    }

    fn flip_parts(&self) -> Option<(&OpRef, Flip)> {
        Some((&self.op, self.flip))
    }
}

/// `outer ∘ inner`.
#[derive(Debug, Clone)]
pub struct ChainOperator {
    outer: OpRef,
    inner: OpRef,
}

impl LinearOperator for ChainOperator {
    fn domain(&self) -> &DomainRef {
        self.inner.domain()
    }

    fn target(&self) -> &DomainRef {
        self.outer.target()
    }

    fn capability(&self) -> Capability {
        self.outer.capability() & self.inner.capability()
    }

    fn name(&self) -> &'static str {
        "ChainOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        match mode {
            Mode::Times => self.outer.apply(&self.inner.apply(x, mode)?, mode),
            Mode::AdjointTimes => self.inner.apply(&self.outer.apply(x, mode)?, mode),
            Mode::InverseTimes => self.inner.apply(&self.outer.apply(x, mode)?, mode),
            Mode::AdjointInverseTimes => self.outer.apply(&self.inner.apply(x, mode)?, mode),
        }
    }
}

/// Signed sum `Σ sᵢ Aᵢ` of operators with equal domains and targets.
#[derive(Debug, Clone)]
pub struct SumOperator {
    ops: Vec<(OpRef, f64)>,
}

impl SumOperator {
    /// Build a sum; scalings with positive and negative signs merge.
    ///
    /// # Errors
    /// - [`IftError::InvalidOption`] for an empty list.
    /// - [`IftError::DomainMismatch`] if domains or targets differ.
    pub fn make(ops: Vec<(OpRef, f64)>) -> IftResult<OpRef> {
        let first = match ops.first() {
            Some((op, _)) => op.clone(),
            None => return Err(IftError::InvalidOption { name: "ops", reason: "A sum needs at least one operator." }),
        };
        for (op, _) in &ops[1..] {
            check_domain(first.domain(), op.domain())?;
            check_domain(first.target(), op.target())?;
        }
        let factors: Option<Vec<f64>> = ops.iter().map(|(op, sign)| op.scaling_factor().map(|f| f * sign)).collect();
        if let Some(factors) = factors {
            return Ok(ScalingOperator::shared(first.domain().clone(), factors.iter().sum()));
        }
        Ok(Arc::new(SumOperator { ops }))
    }
}

impl LinearOperator for SumOperator {
    fn domain(&self) -> &DomainRef {
        self.ops[0].0.domain()
    }

    fn target(&self) -> &DomainRef {
        self.ops[0].0.target()
    }

    fn capability(&self) -> Capability {
        self.ops.iter().fold(Capability::FORWARD, |acc, (op, _)| acc & op.capability())
    }

    fn name(&self) -> &'static str {
        "SumOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        let mut terms = self.ops.iter();
        let (op, sign) = terms.next().ok_or(IftError::UnknownError)?;
        let mut acc = op.apply(x, mode)?.scale(*sign);
        for (op, sign) in terms {
            acc = acc.add_scaled(&op.apply(x, mode)?, *sign)?;
        }
        Ok(acc)
    }

    /// Sum of independent draws from every term.
    ///
    /// Only available for covariance draws of sums with non-negative weights.
    fn draw_sample(&self, from_inverse: bool, rng: &mut IftRng) -> IftResult<Field> {
        if from_inverse || self.ops.iter().any(|(_, sign)| *sign < 0.0) {
            return Err(IftError::SamplingNotSupported { operator: self.name() });
        }
        let mut acc = Field::zeros(self.domain().clone());
        for (op, sign) in &self.ops {
            acc = acc.add_scaled(&op.draw_sample(false, rng)?, sign.sqrt())?;
        }
        Ok(acc)
    }
}

/// `α · A` for an arbitrary operator `A`.
#[derive(Debug, Clone)]
pub struct ScaledOperator {
    op: OpRef,
    factor: f64,
}

impl LinearOperator for ScaledOperator {
    fn domain(&self) -> &DomainRef {
        self.op.domain()
    }

    fn target(&self) -> &DomainRef {
        self.op.target()
    }

    fn capability(&self) -> Capability {
        if self.factor == 0.0 {
            self.op.capability() & Capability::FORWARD
        } else {
            self.op.capability()
        }
    }

    fn name(&self) -> &'static str {
        "ScaledOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        let out = self.op.apply(x, mode)?;
        if mode.is_inverse() { Ok(out.scale(1.0 / self.factor)) } else { Ok(out.scale(self.factor)) }
    }

    fn draw_sample(&self, from_inverse: bool, rng: &mut IftRng) -> IftResult<Field> {
        if self.factor <= 0.0 {
            return Err(IftError::NotPositiveDefinite { context: self.name(), value: self.factor });
        }
        let sample = self.op.draw_sample(from_inverse, rng)?;
        let amplitude = if from_inverse { 1.0 / self.factor.sqrt() } else { self.factor.sqrt() };
        Ok(sample.scale(amplitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Domain,
        field::rng_for,
        operators::{diagonal::DiagonalOperator, response::MatrixOperator},
        utils::consistency::{check_adjoint, check_inverse},
    };
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Simplifications performed at construction.
    // - Adjoint and inverse propagation through chains, sums and scalings.
    // - Domain checks when composing.
    // -------------------------------------------------------------------------

    fn matrix_op() -> OpRef {
        let m = array![[1.0, 2.0, 0.0], [0.0, 1.0, -1.0]];
        Arc::new(MatrixOperator::new(Domain::unstructured(3), Domain::unstructured(2), m).unwrap())
    }

    fn diag_op(domain: DomainRef, values: Vec<f64>) -> OpRef {
        Arc::new(DiagonalOperator::new(Field::from_vec(domain, values).unwrap()))
    }

    #[test]
    // Purpose
    // -------
    // Double adjoints cancel and identities vanish from chains.
    //
    // Given
    // -----
    // - A matrix operator A and the identity on its domain.
    //
    // Expect
    // ------
    // - (A†)† is A itself; A ∘ 1 is A itself; 2·1 + 3·1 is a scaling by 5.
    fn constructors_simplify() {
        let a = matrix_op();
        let id = ScalingOperator::shared(a.domain().clone(), 1.0);

        assert!(Arc::ptr_eq(&a.adjoint().adjoint(), &a));
        assert!(Arc::ptr_eq(&a.chain(&id).unwrap(), &a));
        let s = id.scaled(2.0).plus(&id.scaled(3.0)).unwrap();
        assert_eq!(s.scaling_factor(), Some(5.0));
    }

    #[test]
    // Purpose
    // -------
    // Chains require matching intermediate domains.
    //
    // Given
    // -----
    // - A: R³ → R², composed with itself.
    //
    // Expect
    // ------
    // - `DomainMismatch`.
    fn chain_checks_intermediate_domain() {
        let a = matrix_op();

        assert!(matches!(a.chain(&a), Err(IftError::DomainMismatch { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Composites satisfy the adjoint identity.
    //
    // Given
    // -----
    // - A† ∘ D ∘ A + 0.5 · 1 with D diagonal.
    //
    // Expect
    // ------
    // - ⟨Mx, y⟩ = ⟨x, M†y⟩ for random x, y.
    fn composite_satisfies_adjoint_identity() {
        let a = matrix_op();
        let d = diag_op(a.target().clone(), vec![2.0, 3.0]);
        let id = ScalingOperator::shared(a.domain().clone(), 0.5);
        let m = a.adjoint().chain(&d.chain(&a).unwrap()).unwrap().plus(&id).unwrap();

        check_adjoint(m.as_ref(), &mut rng_for(11, 0), 1e-12, 1e-12).unwrap();
    }

    #[test]
    // Purpose
    // -------
    // Inverses propagate through chains of invertible parts.
    //
    // Given
    // -----
    // - D₁ ∘ (3 · D₂) with nonzero diagonals.
    //
    // Expect
    // ------
    // - inverse(M)(M x) = x.
    fn chain_of_invertibles_is_invertible() {
        let domain = Domain::unstructured(4);
        let d1 = diag_op(domain.clone(), vec![1.0, 2.0, 4.0, -1.0]);
        let d2 = diag_op(domain, vec![0.5, 1.0, -3.0, 2.0]);
        let m = d1.chain(&d2.scaled(3.0)).unwrap();

        check_inverse(m.as_ref(), &mut rng_for(12, 0), 1e-12).unwrap();
        check_inverse(m.inverse().as_ref(), &mut rng_for(12, 1), 1e-12).unwrap();
    }

    #[test]
    // Purpose
    // -------
    // Sums of operators only support forward modes.
    //
    // Given
    // -----
    // - D₁ + D₂ with invertible diagonals.
    //
    // Expect
    // ------
    // - inverse_times fails with `CapabilityMissing`.
    fn sums_are_not_directly_invertible() {
        let domain = Domain::unstructured(2);
        let s = diag_op(domain.clone(), vec![1.0, 2.0]).plus(&diag_op(domain.clone(), vec![3.0, 4.0])).unwrap();

        let err = s.inverse_times(&Field::full(domain, 1.0)).unwrap_err();

        assert!(matches!(err, IftError::CapabilityMissing { .. }));
    }
}
