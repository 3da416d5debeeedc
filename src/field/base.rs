//! field::base — immutable values attached to a domain.
//!
//! Purpose
//! -------
//! A [`Field`] pairs a [`DomainRef`] with a flat `Array1<f64>` buffer. It is
//! the only currency operators, linearizations and energies exchange.
//!
//! Invariants & assumptions
//! ------------------------
//! - `val.len() == domain.size()` for every constructed field.
//! - Fields are never mutated in place by the public API: arithmetic
//!   methods return a new field.
//! - Binary operations require structurally equal domains and fail with
//!   [`IftError::DomainMismatch`] otherwise; there is no broadcasting
//!   except through explicit scalar methods (`scale`, `add_scalar`).
use ndarray::{Array1, Zip};

use crate::{
    domain::{check_domain, Domain, DomainRef},
    errors::{IftError, IftResult},
};

/// A real-valued field on a domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    domain: DomainRef,
    val: Array1<f64>,
}

impl Field {
    /// Wrap a buffer.
    ///
    /// # Errors
    /// - [`IftError::ShapeMismatch`] if the buffer length differs from the domain size.
    pub fn new(domain: DomainRef, val: Array1<f64>) -> IftResult<Self> {
        if val.len() != domain.size() {
            return Err(IftError::ShapeMismatch { expected: domain.size(), found: val.len() });
        }
        Ok(Self { domain, val })
    }

    pub fn from_vec(domain: DomainRef, values: Vec<f64>) -> IftResult<Self> {
        Self::new(domain, Array1::from(values))
    }

    pub fn full(domain: DomainRef, value: f64) -> Self {
        let val = Array1::from_elem(domain.size(), value);
        Self { domain, val }
    }

    pub fn zeros(domain: DomainRef) -> Self {
        Self::full(domain, 0.0)
    }

    /// Field on the scalar domain.
    pub fn scalar(value: f64) -> Self {
        Self { domain: Domain::scalar(), val: Array1::from_elem(1, value) }
    }

    /// Field whose value at flat index `i` is `f(i)`.
    pub fn from_fn<F: FnMut(usize) -> f64>(domain: DomainRef, f: F) -> Self {
        let val = Array1::from_shape_fn(domain.size(), f);
        Self { domain, val }
    }

    pub fn domain(&self) -> &DomainRef {
        &self.domain
    }

    pub fn val(&self) -> &Array1<f64> {
        &self.val
    }

    pub fn into_val(self) -> Array1<f64> {
        self.val
    }

    pub fn size(&self) -> usize {
        self.val.len()
    }

    /// Same values on another domain of equal size.
    ///
    /// # Errors
    /// - [`IftError::ShapeMismatch`] if the sizes differ.
    pub fn with_domain(&self, domain: DomainRef) -> IftResult<Self> {
        Self::new(domain, self.val.clone())
    }

    /// Value of a field on the scalar domain.
    ///
    /// # Errors
    /// - [`IftError::NotScalar`] for any other domain.
    pub fn as_scalar(&self) -> IftResult<f64> {
        if !self.domain.is_scalar() {
            return Err(IftError::NotScalar { size: self.size() });
        }
        Ok(self.val[0])
    }

    // ---- Reductions ----

    /// Real inner product `⟨self, other⟩`.
    pub fn vdot(&self, other: &Field) -> IftResult<f64> {
        check_domain(&self.domain, &other.domain)?;
        Ok(self.val.dot(&other.val))
    }

    pub fn norm(&self) -> f64 {
        self.val.dot(&self.val).sqrt()
    }

    pub fn sum(&self) -> f64 {
        self.val.sum()
    }

    pub fn max_abs(&self) -> f64 {
        self.val.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    // ---- Arithmetic ----

    pub fn add(&self, other: &Field) -> IftResult<Field> {
        check_domain(&self.domain, &other.domain)?;
        Ok(Self { domain: self.domain.clone(), val: &self.val + &other.val })
    }

    pub fn sub(&self, other: &Field) -> IftResult<Field> {
        check_domain(&self.domain, &other.domain)?;
        Ok(Self { domain: self.domain.clone(), val: &self.val - &other.val })
    }

    /// Pointwise product.
    pub fn mul(&self, other: &Field) -> IftResult<Field> {
        check_domain(&self.domain, &other.domain)?;
        Ok(Self { domain: self.domain.clone(), val: &self.val * &other.val })
    }

    /// Pointwise quotient. Division by zero yields non-finite values; callers
    /// that need a guarantee check with [`Field::check_finite`].
    pub fn div(&self, other: &Field) -> IftResult<Field> {
        check_domain(&self.domain, &other.domain)?;
        Ok(Self { domain: self.domain.clone(), val: &self.val / &other.val })
    }

    /// `self + alpha · other`.
    pub fn add_scaled(&self, other: &Field, alpha: f64) -> IftResult<Field> {
        check_domain(&self.domain, &other.domain)?;
        let mut val = self.val.clone();
        Zip::from(&mut val).and(&other.val).for_each(|a, &b| *a += alpha * b);
        Ok(Self { domain: self.domain.clone(), val })
    }

    pub fn scale(&self, factor: f64) -> Field {
        Self { domain: self.domain.clone(), val: &self.val * factor }
    }

    pub fn add_scalar(&self, value: f64) -> Field {
        Self { domain: self.domain.clone(), val: &self.val + value }
    }

    pub fn neg(&self) -> Field {
        self.scale(-1.0)
    }

    pub fn mapv<F: Fn(f64) -> f64>(&self, f: F) -> Field {
        Self { domain: self.domain.clone(), val: self.val.mapv(f) }
    }

    // ---- Checks ----

    /// Reject NaN and infinities.
    ///
    /// # Errors
    /// - [`IftError::NonFiniteValue`] for the first offending entry.
    pub fn check_finite(&self, context: &'static str) -> IftResult<()> {
        match self.val.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(IftError::NonFiniteValue { context, index, value: self.val[index] }),
            None => Ok(()),
        }
    }
}
