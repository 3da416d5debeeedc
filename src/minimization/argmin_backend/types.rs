//! argmin_backend::types — aliases and options for the argmin L-BFGS path.
//!
//! Field values cross the argmin boundary as plain `Array1<f64>`; the
//! domain is re-attached on the way back.
use std::str::FromStr;

use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::Array1;

use crate::{
    errors::{IftError, IftResult},
    validation::{verify_iteration_limit, verify_optional_tolerance},
};

pub type Theta = Array1<f64>;
pub type Grad = Array1<f64>;
pub type Cost = f64;

pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = IftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(IftError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Options for [`ArgminLbfgs`](super::ArgminLbfgs).
///
/// - `tol_grad`: stop once `‖∇E‖ < tol_grad`.
/// - `tol_cost`: stop once the energy changes by less than `tol_cost`.
/// - `max_iter`: iteration cap passed to the executor.
/// - `lbfgs_mem`: curvature pairs kept; [`DEFAULT_LBFGS_MEM`] if `None`.
/// - `verbose`: attach the slog observer (feature `obs_slog`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArgminOptions {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
    pub line_searcher: LineSearcher,
    pub lbfgs_mem: Option<usize>,
    pub verbose: bool,
}

impl ArgminOptions {
    /// # Errors
    /// - [`IftError::NoStoppingRule`] if tolerances and cap are all `None`.
    /// - [`IftError::InvalidTolerance`] for non-positive or non-finite tolerances.
    /// - [`IftError::InvalidIterationLimit`] for a zero cap or zero memory.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>, line_searcher: LineSearcher,
        lbfgs_mem: Option<usize>, verbose: bool,
    ) -> IftResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(IftError::NoStoppingRule);
        }
        verify_optional_tolerance("tol_grad", tol_grad)?;
        verify_optional_tolerance("tol_cost", tol_cost)?;
        if let Some(n) = max_iter {
            verify_iteration_limit("max_iter", n)?;
        }
        if let Some(m) = lbfgs_mem {
            verify_iteration_limit("lbfgs_mem", m)?;
        }
        Ok(Self { tol_grad, tol_cost, max_iter, line_searcher, lbfgs_mem, verbose })
    }
}

impl Default for ArgminOptions {
    fn default() -> Self {
        Self {
            tol_grad: Some(1e-6),
            tol_cost: None,
            max_iter: Some(300),
            line_searcher: LineSearcher::MoreThuente,
            lbfgs_mem: None,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Line searcher parsing and option validation.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Line searchers parse case-insensitively and options validate.
    //
    // Given
    // -----
    // - "HAGERZHANG", "moreThuente", "wolfe"; options with no rule, zero memory.
    //
    // Expect
    // ------
    // - The two searchers, `InvalidLineSearch`, `NoStoppingRule`,
    //   `InvalidIterationLimit`.
    fn parse_and_validate() {
        assert_eq!("HAGERZHANG".parse::<LineSearcher>().unwrap(), LineSearcher::HagerZhang);
        assert_eq!("moreThuente".parse::<LineSearcher>().unwrap(), LineSearcher::MoreThuente);
        assert!(matches!("wolfe".parse::<LineSearcher>(), Err(IftError::InvalidLineSearch { .. })));
        assert_eq!(
            ArgminOptions::new(None, None, None, LineSearcher::MoreThuente, None, false),
            Err(IftError::NoStoppingRule)
        );
        assert!(matches!(
            ArgminOptions::new(Some(1e-6), None, None, LineSearcher::MoreThuente, Some(0), false),
            Err(IftError::InvalidIterationLimit { .. })
        ));
    }
}
