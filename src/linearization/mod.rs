//! linearization — automatic differentiation for nonlinear models.
//!
//! Purpose
//! -------
//! Carry values together with lazily composed Jacobians ([`Linearization`])
//! through nonlinear [`Model`]s, and define the scalar energies whose
//! gradients and Fisher metrics drive minimization and variational
//! inference.
//!
//! Downstream usage
//! ----------------
//! - The energy layer wraps a scalar model at a position and asks for
//!   value, gradient and metric.
//! - [`finite_diff`] validates new models numerically.
pub mod base;
pub mod energy_operators;
pub mod finite_diff;
pub mod models;

pub use self::energy_operators::{GaussianEnergy, PoissonianEnergy, StandardHamiltonian};
pub use self::finite_diff::{check_jacobian, directional_error, fd_gradient};
pub use self::base::Linearization;
pub use self::models::{
    linear, ChainModel, LinearModel, Model, ModelAlgebra, ModelRef, OffsetModel, PointwiseModel, ProductModel,
    ScaledModel, SumModel,
};
