//! energy — scalar objectives evaluated at a position.
//!
//! Purpose
//! -------
//! Define the [`Energy`] protocol consumed by the minimizers and the KL
//! layer: an immutable snapshot of value, gradient and (on request) metric
//! at one position, with [`Energy::at`] producing the snapshot at another
//! position.
//!
//! Key behaviors
//! -------------
//! - [`EnergyAdapter`] wraps any scalar [`Model`](crate::linearization::Model).
//! - [`QuadraticEnergy`] is `½ xᵀAx − bᵀx` for an SPD operator `A`.
//! - [`EnergySum`] adds two energies on the same domain.
//!
//! Invariants & assumptions
//! ------------------------
//! - Values and gradients are finite; construction fails otherwise.
//! - Energies are values: `at` never mutates `self`.
pub mod adapter;
pub mod quadratic;
pub mod sum;

use std::fmt;

use crate::{
    errors::IftResult,
    field::Field,
    operators::OpRef,
};

pub use self::adapter::EnergyAdapter;
pub use self::quadratic::QuadraticEnergy;
pub use self::sum::EnergySum;

pub trait Energy: Clone + fmt::Debug + Send + Sync {
    fn position(&self) -> &Field;
    fn value(&self) -> f64;
    fn gradient(&self) -> &Field;

    /// Curvature at the position.
    ///
    /// # Errors
    /// - [`IftError::InvalidOption`](crate::errors::IftError::InvalidOption)
    ///   if the energy was built without a metric.
    fn metric(&self) -> IftResult<OpRef>;

    /// Same energy at another position.
    fn at(&self, position: Field) -> IftResult<Self>;

    fn gradient_norm(&self) -> f64 {
        self.gradient().norm()
    }

    fn apply_metric(&self, x: &Field) -> IftResult<Field> {
        self.metric()?.times(x)
    }
}
