//! utils — verification helpers for operators.
pub mod consistency;
pub mod dense;

pub use self::consistency::{check_adjoint, check_inverse, check_linearity, consistency_check};
pub use self::dense::{solve_spd, symmetric_eigenvalues, to_dense};
