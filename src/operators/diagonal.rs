//! operators::diagonal — pixel-wise scaling by a field.
//!
//! Purpose
//! -------
//! The workhorse covariance and noise operator. Applying it multiplies
//! pixel by pixel; its adjoint is itself and its inverse divides.
//!
//! Key behaviors
//! -------------
//! - [`DiagonalOperator::new`] wraps any field; the operator is
//!   endomorphic on the field's domain.
//! - [`DiagonalOperator::from_spectrum`] builds a diagonal in harmonic
//!   space from a function of `|k|`, the usual way to specify a
//!   stationary prior covariance.
//! - Inversion checks for zero entries at call time and reports the first
//!   one as [`IftError::SingularOperator`].
//! - Sampling needs non-negative entries; inverse sampling needs strictly
//!   positive ones.
use std::sync::Arc;

use crate::{
    domain::DomainRef,
    errors::{IftError, IftResult},
    field::{Field, IftRng},
    operators::traits::{Capability, LinearOperator, Mode, OpRef},
};

#[derive(Debug, Clone)]
pub struct DiagonalOperator {
    diag: Field,
}

impl DiagonalOperator {
    pub fn new(diag: Field) -> Self {
        Self { diag }
    }

    pub fn shared(diag: Field) -> OpRef {
        Arc::new(Self::new(diag))
    }

    /// Diagonal on a harmonic grid with entries `spectrum(|k|)`.
    ///
    /// # Errors
    /// - [`IftError::InvalidDomain`] if `domain` is not a harmonic grid.
    pub fn from_spectrum<F: Fn(f64) -> f64>(domain: DomainRef, spectrum: F) -> IftResult<Self> {
        let grid = domain.as_grid().ok_or(IftError::InvalidDomain {
            reason: "Spectral diagonals need a harmonic grid.",
        })?;
        let k = grid.k_lengths()?;
        let values = k.into_iter().map(spectrum).collect();
        Ok(Self::new(Field::from_vec(domain, values)?))
    }

    pub fn diag(&self) -> &Field {
        &self.diag
    }

    fn first_zero(&self) -> Option<usize> {
        self.diag.val().iter().position(|v| *v == 0.0)
    }
}

impl LinearOperator for DiagonalOperator {
    fn domain(&self) -> &DomainRef {
        self.diag.domain()
    }

    fn target(&self) -> &DomainRef {
        self.diag.domain()
    }

    fn capability(&self) -> Capability {
        Capability::ALL
    }

    fn name(&self) -> &'static str {
        "DiagonalOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        if !mode.is_inverse() {
            return x.mul(&self.diag);
        }
        if let Some(index) = self.first_zero() {
            return Err(IftError::SingularOperator { operator: self.name(), index });
        }
        x.div(&self.diag)
    }

    fn draw_sample(&self, from_inverse: bool, rng: &mut IftRng) -> IftResult<Field> {
        if let Some(index) = self.diag.val().iter().position(|v| *v < 0.0) {
            return Err(IftError::NotPositiveDefinite { context: self.name(), value: self.diag.val()[index] });
        }
        let xi = Field::standard_normal(self.domain().clone(), rng);
        if from_inverse {
            if let Some(index) = self.first_zero() {
                return Err(IftError::SingularOperator { operator: self.name(), index });
            }
            return xi.div(&self.diag.mapv(f64::sqrt));
        }
        xi.mul(&self.diag.mapv(f64::sqrt))
    }
}
