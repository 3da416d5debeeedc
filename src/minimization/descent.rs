//! minimization::descent — line-search descent minimizers.
//!
//! Purpose
//! -------
//! Minimize an [`Energy`] by repeatedly choosing a descent direction and
//! running a strong Wolfe [`LineSearch`] along it until the
//! [`IterationController`] reports convergence or the iteration limit.
//!
//! Key behaviors
//! -------------
//! - [`DescentDirection::SteepestDescent`]: `−∇E`.
//! - [`DescentDirection::NewtonCg`]: solve `M Δ = −∇E` with the energy's
//!   metric by conjugate gradient. A solve that hits its iteration cap is
//!   counted in `inner_solver_failures` and its partial solution is used.
//! - [`DescentDirection::Lbfgs`]: two-loop recursion over the last
//!   `memory` curvature pairs.
//! - A failed line search resets to steepest descent once (and clears the
//!   L-BFGS memory); a second consecutive failure ends with
//!   [`ConvergenceStatus::Stalled`].
//!
//! Conventions
//! -----------
//! - Per-iteration progress is logged with `debug!`, or with `info!` when
//!   the minimizer is verbose. Hitting the iteration limit and line-search
//!   resets are logged with `warn!`.
use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::{
    energy::Energy,
    errors::IftResult,
    field::Field,
    minimization::{LineSearch, LineStep, MinimizationOutcome, Minimizer},
    solvers::{solve, CgOptions, ControllerStatus, ConvergenceStatus, IterationController, StoppingRules},
    validation::verify_iteration_limit,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DescentDirection {
    SteepestDescent,
    NewtonCg(CgOptions),
    Lbfgs { memory: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescentMinimizer {
    direction: DescentDirection,
    rules: StoppingRules,
    line_search: LineSearch,
    verbose: bool,
}

impl DescentMinimizer {
    /// # Errors
    /// - [`IftError::InvalidIterationLimit`](crate::errors::IftError::InvalidIterationLimit)
    ///   for an L-BFGS memory of zero.
    pub fn new(direction: DescentDirection, rules: StoppingRules, line_search: LineSearch) -> IftResult<Self> {
        if let DescentDirection::Lbfgs { memory } = direction {
            verify_iteration_limit("lbfgs memory", memory)?;
        }
        Ok(Self { direction, rules, line_search, verbose: false })
    }

    pub fn steepest_descent(rules: StoppingRules) -> Self {
        Self { direction: DescentDirection::SteepestDescent, rules, line_search: LineSearch::default(), verbose: false }
    }

    pub fn newton_cg(rules: StoppingRules, cg: CgOptions) -> Self {
        Self { direction: DescentDirection::NewtonCg(cg), rules, line_search: LineSearch::default(), verbose: false }
    }

    pub fn lbfgs(rules: StoppingRules, memory: usize) -> IftResult<Self> {
        Self::new(DescentDirection::Lbfgs { memory }, rules, LineSearch::default())
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn direction(&self) -> &DescentDirection {
        &self.direction
    }

    fn report(&self, iteration: usize, value: f64, gradient_norm: f64, step: f64) {
        if self.verbose {
            info!("iteration {iteration}: energy {value:.6e}, |grad| {gradient_norm:.3e}, step {step:.3e}");
        } else {
            debug!("iteration {iteration}: energy {value:.6e}, |grad| {gradient_norm:.3e}, step {step:.3e}");
        }
    }
}

impl Minimizer for DescentMinimizer {
    fn minimize<E: Energy>(&self, energy: E) -> IftResult<MinimizationOutcome<E>> {
        let mut controller = IterationController::new(self.rules);
        let mut energy = energy;
        let mut status = controller.start(energy.value(), energy.gradient_norm());
        let mut history = match self.direction {
            DescentDirection::Lbfgs { memory } => Some(CurvatureHistory::new(memory)),
            _ => None,
        };
        let mut inner_failures = 0usize;
        let mut reset = false;

        loop {
            match status {
                ControllerStatus::Continue => {}
                ControllerStatus::Converged => {
                    let iterations = controller.iteration();
                    return Ok(MinimizationOutcome::new(energy, ConvergenceStatus::Converged, iterations, inner_failures));
                }
                ControllerStatus::IterationLimit => {
                    warn!("descent stopped at the iteration limit with |grad| = {:.3e}", energy.gradient_norm());
                    let iterations = controller.iteration();
                    return Ok(MinimizationOutcome::new(energy, ConvergenceStatus::IterationLimit, iterations, inner_failures));
                }
            }

            let gradient = energy.gradient().clone();
            let (direction, initial_step) = if reset {
                (gradient.neg(), steepest_step(&gradient))
            } else {
                match (&self.direction, history.as_ref()) {
                    (DescentDirection::NewtonCg(cg), _) => {
                        let outcome = solve(energy.metric()?.as_ref(), &gradient.neg(), cg)?;
                        if !outcome.status.is_converged() {
                            inner_failures += 1;
                            debug!("Newton-CG direction solve stopped after {} iterations", outcome.iterations);
                        }
                        (outcome.solution, 1.0)
                    }
                    (DescentDirection::Lbfgs { .. }, Some(h)) if !h.is_empty() => (h.direction(&gradient)?, 1.0),
                    _ => (gradient.neg(), steepest_step(&gradient)),
                }
            };

            match self.line_search.search(&energy, &direction, initial_step)? {
                LineStep::Accepted { energy: next, step } => {
                    if let Some(h) = history.as_mut() {
                        let s = next.position().sub(energy.position())?;
                        let y = next.gradient().sub(energy.gradient())?;
                        h.push(s, y)?;
                    }
                    energy = next;
                    reset = false;
                    status = controller.check(energy.value(), energy.gradient_norm());
                    self.report(controller.iteration(), energy.value(), energy.gradient_norm(), step);
                }
                LineStep::Failed { reason } if !reset => {
                    warn!("line search failed ({reason}); resetting to steepest descent");
                    if let Some(h) = history.as_mut() {
                        h.clear();
                    }
                    reset = true;
                }
                LineStep::Failed { reason } => {
                    warn!("line search failed twice in a row ({reason}); giving up");
                    let iterations = controller.iteration();
                    return Ok(MinimizationOutcome::new(energy, ConvergenceStatus::Stalled, iterations, inner_failures));
                }
            }
        }
    }
}

/// Initial steepest-descent step: unit length along `−∇E`, at most 1.
fn steepest_step(gradient: &Field) -> f64 {
    let norm = gradient.norm();
    if norm > 1.0 {
        1.0 / norm
    } else {
        1.0
    }
}

/// L-BFGS curvature pairs, newest last.
#[derive(Debug, Clone)]
struct CurvatureHistory {
    memory: usize,
    pairs: VecDeque<(Field, Field, f64)>,
}

impl CurvatureHistory {
    fn new(memory: usize) -> Self {
        Self { memory, pairs: VecDeque::with_capacity(memory) }
    }

    fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Store `(s, y)` if it has positive curvature.
    fn push(&mut self, s: Field, y: Field) -> IftResult<()> {
        let sy = s.vdot(&y)?;
        if sy <= 0.0 {
            debug!("skipping L-BFGS pair with non-positive curvature {sy:.3e}");
            return Ok(());
        }
        if self.pairs.len() == self.memory {
            self.pairs.pop_front();
        }
        self.pairs.push_back((s, y, 1.0 / sy));
        Ok(())
    }

    /// `−H ∇E` by the two-loop recursion.
    fn direction(&self, gradient: &Field) -> IftResult<Field> {
        let mut q = gradient.clone();
        let mut alphas = Vec::with_capacity(self.pairs.len());
        for (s, y, rho) in self.pairs.iter().rev() {
            let alpha = rho * s.vdot(&q)?;
            q = q.add_scaled(y, -alpha)?;
            alphas.push(alpha);
        }
        let gamma = match self.pairs.back() {
            Some((s, y, _)) => s.vdot(y)? / y.vdot(y)?,
            None => 1.0,
        };
        let mut r = q.scale(gamma);
        for ((s, y, rho), alpha) in self.pairs.iter().zip(alphas.iter().rev()) {
            let beta = rho * y.vdot(&r)?;
            r = r.add_scaled(s, alpha - beta)?;
        }
        Ok(r.neg())
    }
}
