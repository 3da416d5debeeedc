//! library — ready-made posteriors built from the operator algebra.
pub mod wiener_filter;

pub use self::wiener_filter::WienerFilterCurvature;
