//! field::pointwise — elementwise nonlinearities and their derivatives.
//!
//! Purpose
//! -------
//! Provide the scalar functions nonlinear models apply pixel by pixel,
//! together with their first derivatives so the linearization layer can
//! build diagonal Jacobians.
//!
//! Key behaviors
//! -------------
//! - [`Pointwise`] names a function; [`Pointwise::value`] and
//!   [`Pointwise::derivative`] evaluate it and its derivative.
//! - [`safe_softplus`] and [`safe_sigmoid`] use guarded forms that neither
//!   overflow for large positive inputs nor lose precision for large
//!   negative ones (cutoff `|x| > 20`).
//!
//! Conventions
//! -----------
//! - Functions are applied outside their domain (e.g. `log` of a negative
//!   number) without a check here; the resulting NaN is caught by the
//!   finiteness check of the linearization that uses it.
use std::str::FromStr;

use crate::{
    errors::{IftError, IftResult},
    field::Field,
};

/// Numerically stable softplus `ln(1 + exp(x))`.
pub fn safe_softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Numerically stable logistic function `1 / (1 + exp(-x))`.
///
/// This is also the derivative of [`safe_softplus`].
pub fn safe_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Elementwise nonlinearity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pointwise {
    Exp,
    Log,
    Tanh,
    Sigmoid,
    Softplus,
    Sqrt,
    Square,
    Reciprocal,
}

impl Pointwise {
    pub fn value(self, x: f64) -> f64 {
        match self {
            Pointwise::Exp => x.exp(),
            Pointwise::Log => x.ln(),
            Pointwise::Tanh => x.tanh(),
            Pointwise::Sigmoid => safe_sigmoid(x),
            Pointwise::Softplus => safe_softplus(x),
            Pointwise::Sqrt => x.sqrt(),
            Pointwise::Square => x * x,
            Pointwise::Reciprocal => 1.0 / x,
        }
    }

    pub fn derivative(self, x: f64) -> f64 {
        match self {
            Pointwise::Exp => x.exp(),
            Pointwise::Log => 1.0 / x,
            Pointwise::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            Pointwise::Sigmoid => {
                let s = safe_sigmoid(x);
                s * (1.0 - s)
            }
            Pointwise::Softplus => safe_sigmoid(x),
            Pointwise::Sqrt => 0.5 / x.sqrt(),
            Pointwise::Square => 2.0 * x,
            Pointwise::Reciprocal => -1.0 / (x * x),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Pointwise::Exp => "exp",
            Pointwise::Log => "log",
            Pointwise::Tanh => "tanh",
            Pointwise::Sigmoid => "sigmoid",
            Pointwise::Softplus => "softplus",
            Pointwise::Sqrt => "sqrt",
            Pointwise::Square => "square",
            Pointwise::Reciprocal => "reciprocal",
        }
    }

    /// Values and derivatives at every pixel of `x`.
    pub fn evaluate(self, x: &Field) -> (Field, Field) {
        (x.mapv(|v| self.value(v)), x.mapv(|v| self.derivative(v)))
    }
}

impl FromStr for Pointwise {
    type Err = IftError;

    /// Parse a nonlinearity name, case-insensitively.
    fn from_str(s: &str) -> IftResult<Self> {
        match s.to_lowercase().as_str() {
            "exp" => Ok(Pointwise::Exp),
            "log" => Ok(Pointwise::Log),
            "tanh" => Ok(Pointwise::Tanh),
            "sigmoid" => Ok(Pointwise::Sigmoid),
            "softplus" => Ok(Pointwise::Softplus),
            "sqrt" => Ok(Pointwise::Sqrt),
            "square" => Ok(Pointwise::Square),
            "reciprocal" => Ok(Pointwise::Reciprocal),
            _ => Err(IftError::InvalidOption {
                name: "pointwise",
                reason: "Valid options are exp, log, tanh, sigmoid, softplus, sqrt, square, reciprocal.",
            }),
        }
    }
}
