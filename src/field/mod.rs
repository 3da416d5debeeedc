//! field — values on domains, their randomness and elementwise maps.
pub mod base;
pub mod pointwise;
pub mod random;

pub use self::base::Field;
pub use self::pointwise::{safe_sigmoid, safe_softplus, Pointwise};
pub use self::random::{rng_for, IftRng};
