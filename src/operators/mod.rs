//! operators — implicit linear operators and their algebra.
//!
//! Purpose
//! -------
//! Provide the operator contract ([`LinearOperator`]), the concrete leaf
//! operators used to build forward models and covariances, and the lazy
//! algebra that combines them. Nothing here forms a dense matrix.
//!
//! Key behaviors
//! -------------
//! - Leaves: [`ScalingOperator`], [`NullOperator`], [`VdotOperator`],
//!   [`SumReductionOperator`], [`DiagonalOperator`],
//!   [`HarmonicTransformOperator`], [`MaskOperator`], [`MatrixOperator`],
//!   [`GeometryRemover`].
//! - Composites: sums, chains, scalings and flips via [`OperatorAlgebra`];
//!   [`SandwichOperator`] for `B† C B`.
//! - [`InversionEnabler`] turns forward-only SPD operators into invertible
//!   ones by running conjugate gradient at call time.
//!
//! Downstream usage
//! ----------------
//! - The linearization layer wraps Jacobians as operators; energies build
//!   their metrics as sandwiches and sums; the KL layer draws samples
//!   through [`LinearOperator::draw_sample`].
pub mod algebra;
pub mod basic;
pub mod diagonal;
pub mod harmonic;
pub mod inversion;
pub mod response;
pub mod sandwich;
pub mod traits;

pub use self::algebra::{ChainOperator, FlippedOperator, OperatorAlgebra, ScaledOperator, SumOperator};
pub use self::basic::{NullOperator, ScalingOperator, SumReductionOperator, VdotOperator};
pub use self::diagonal::DiagonalOperator;
pub use self::harmonic::HarmonicTransformOperator;
pub use self::inversion::InversionEnabler;
pub use self::response::{GeometryRemover, MaskOperator, MatrixOperator};
pub use self::sandwich::SandwichOperator;
pub use self::traits::{Capability, Flip, LinearOperator, Mode, OpRef};
