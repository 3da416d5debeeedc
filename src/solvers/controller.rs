//! solvers::controller — stopping rules and convergence status.
//!
//! Purpose
//! -------
//! Decide when an iterative method stops. Every loop in the crate (the
//! minimizers, nonlinear CG) feeds the current energy value and gradient
//! norm into an [`IterationController`] after each step and acts on the
//! returned [`ControllerStatus`].
//!
//! Key behaviors
//! -------------
//! - [`StoppingRules`] bundles absolute and relative gradient-norm
//!   tolerances, an absolute energy-change tolerance, a convergence level
//!   and an iteration limit. At least one rule is required.
//! - A tolerance hit increments a counter; convergence is declared once
//!   the counter reaches `convergence_level`. A miss decrements it (not
//!   below zero), so isolated lucky steps do not end a run.
//! - The iteration limit is reported as its own status, not as an error.
//!
//! Conventions
//! -----------
//! - The relative gradient tolerance is measured against the gradient norm
//!   seen by [`IterationController::start`].
use crate::{
    errors::{IftError, IftResult},
    validation::{verify_iteration_limit, verify_optional_tolerance},
};

/// Terminal state of an iterative method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// Tolerance reached.
    Converged,
    /// Iteration cap exhausted before the tolerance was reached.
    IterationLimit,
    /// No acceptable step could be found.
    Stalled,
}

impl ConvergenceStatus {
    pub fn is_converged(self) -> bool {
        matches!(self, ConvergenceStatus::Converged)
    }
}

/// Decision after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    Continue,
    Converged,
    IterationLimit,
}

/// Validated stopping rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoppingRules {
    pub tol_abs_gradnorm: Option<f64>,
    pub tol_rel_gradnorm: Option<f64>,
    pub delta_energy: Option<f64>,
    pub convergence_level: usize,
    pub iteration_limit: Option<usize>,
}

impl StoppingRules {
    /// # Rules
    /// - At least one tolerance or the iteration limit must be `Some`.
    /// - Tolerances must be finite and strictly positive.
    /// - `convergence_level` and the iteration limit must be positive.
    ///
    /// # Errors
    /// - [`IftError::NoStoppingRule`], [`IftError::InvalidTolerance`],
    ///   [`IftError::InvalidIterationLimit`].
    pub fn new(
        tol_abs_gradnorm: Option<f64>, tol_rel_gradnorm: Option<f64>, delta_energy: Option<f64>,
        convergence_level: usize, iteration_limit: Option<usize>,
    ) -> IftResult<Self> {
        if tol_abs_gradnorm.is_none()
            && tol_rel_gradnorm.is_none()
            && delta_energy.is_none()
            && iteration_limit.is_none()
        {
            return Err(IftError::NoStoppingRule);
        }
        verify_optional_tolerance("tol_abs_gradnorm", tol_abs_gradnorm)?;
        verify_optional_tolerance("tol_rel_gradnorm", tol_rel_gradnorm)?;
        verify_optional_tolerance("delta_energy", delta_energy)?;
        verify_iteration_limit("convergence_level", convergence_level)?;
        if let Some(limit) = iteration_limit {
            verify_iteration_limit("iteration_limit", limit)?;
        }
        Ok(Self { tol_abs_gradnorm, tol_rel_gradnorm, delta_energy, convergence_level, iteration_limit })
    }

    /// Gradient-norm rule only.
    pub fn gradient_norm(tol: f64, iteration_limit: usize) -> IftResult<Self> {
        Self::new(Some(tol), None, None, 1, Some(iteration_limit))
    }

    /// Energy-change rule only.
    pub fn energy_change(delta: f64, convergence_level: usize, iteration_limit: usize) -> IftResult<Self> {
        Self::new(None, None, Some(delta), convergence_level, Some(iteration_limit))
    }
}

impl Default for StoppingRules {
    fn default() -> Self {
        Self {
            tol_abs_gradnorm: Some(1e-6),
            tol_rel_gradnorm: None,
            delta_energy: None,
            convergence_level: 1,
            iteration_limit: Some(200),
        }
    }
}

/// Running state of one iterative solve.
#[derive(Debug, Clone)]
pub struct IterationController {
    rules: StoppingRules,
    iteration: usize,
    hits: usize,
    reference_norm: f64,
    last_energy: f64,
}

impl IterationController {
    pub fn new(rules: StoppingRules) -> Self {
        Self { rules, iteration: 0, hits: 0, reference_norm: 0.0, last_energy: f64::INFINITY }
    }

    pub fn rules(&self) -> &StoppingRules {
        &self.rules
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Reset and evaluate the starting point.
    ///
    /// A starting point inside the gradient tolerance counts as one hit
    /// toward `convergence_level`; an exactly vanishing gradient converges
    /// at once.
    pub fn start(&mut self, energy: f64, gradient_norm: f64) -> ControllerStatus {
        self.iteration = 0;
        self.hits = 0;
        self.reference_norm = gradient_norm;
        self.last_energy = energy;
        if gradient_norm == 0.0 {
            return ControllerStatus::Converged;
        }
        if self.gradient_converged(gradient_norm) {
            self.hits = 1;
            if self.hits >= self.rules.convergence_level {
                return ControllerStatus::Converged;
            }
        }
        ControllerStatus::Continue
    }

    /// Record one completed step.
    pub fn check(&mut self, energy: f64, gradient_norm: f64) -> ControllerStatus {
        self.iteration += 1;
        let energy_hit = self.rules.delta_energy.map(|tol| (self.last_energy - energy).abs() <= tol);
        self.last_energy = energy;

        let hit = self.gradient_converged(gradient_norm) || energy_hit.unwrap_or(false);
        if hit {
            self.hits += 1;
        } else {
            self.hits = self.hits.saturating_sub(1);
        }
        if hit && self.hits >= self.rules.convergence_level {
            return ControllerStatus::Converged;
        }
        if let Some(limit) = self.rules.iteration_limit {
            if self.iteration >= limit {
                return ControllerStatus::IterationLimit;
            }
        }
        ControllerStatus::Continue
    }

    fn gradient_converged(&self, gradient_norm: f64) -> bool {
        if gradient_norm == 0.0 {
            return true;
        }
        let abs = self.rules.tol_abs_gradnorm.map(|tol| gradient_norm <= tol);
        let rel = self.rules.tol_rel_gradnorm.map(|tol| gradient_norm <= tol * self.reference_norm);
        abs.unwrap_or(false) || rel.unwrap_or(false)
    }
}
