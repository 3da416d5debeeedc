//! minimization::nonlinear_cg — nonlinear conjugate gradient.
//!
//! Purpose
//! -------
//! Minimize energies whose metric is unavailable or expensive using only
//! gradients. Directions are `d ← −g_new + β d` with β from one of the
//! classic update rules; a strong Wolfe line search with a tight
//! curvature constant (`c2 = 0.1`) keeps the directions conjugate.
//!
//! Key behaviors
//! -------------
//! - [`BetaRule`] selects Polak–Ribière (clipped at zero),
//!   Fletcher–Reeves, Hestenes–Stiefel (clipped at zero) or the
//!   Dai–Yuan rule (Nocedal & Wright eq. 5.49).
//! - A direction that is not a descent direction restarts at `−g`.
//! - Line-search failures reset once to steepest descent; a second
//!   consecutive failure ends with [`ConvergenceStatus::Stalled`].
use std::str::FromStr;

use log::{debug, info, warn};

use crate::{
    energy::Energy,
    errors::{IftError, IftResult},
    field::Field,
    minimization::{LineSearch, LineStep, MinimizationOutcome, Minimizer},
    solvers::{ControllerStatus, ConvergenceStatus, IterationController, StoppingRules},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetaRule {
    PolakRibiere,
    FletcherReeves,
    HestenesStiefel,
    DaiYuan,
}

impl BetaRule {
    /// β from the old gradient `g`, the new gradient `g_new` and the old
    /// direction `d`.
    pub fn beta(self, g: &Field, g_new: &Field, d: &Field) -> IftResult<f64> {
        let y = g_new.sub(g)?;
        let beta = match self {
            BetaRule::PolakRibiere => (g_new.vdot(&y)? / g.vdot(g)?).max(0.0),
            BetaRule::FletcherReeves => g_new.vdot(g_new)? / g.vdot(g)?,
            BetaRule::HestenesStiefel => (g_new.vdot(&y)? / d.vdot(&y)?).max(0.0),
            BetaRule::DaiYuan => g_new.vdot(g_new)? / d.vdot(&y)?,
        };
        Ok(if beta.is_finite() { beta } else { 0.0 })
    }
}

impl FromStr for BetaRule {
    type Err = IftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "polak-ribiere" | "polakribiere" | "pr" => Ok(BetaRule::PolakRibiere),
            "fletcher-reeves" | "fletcherreeves" | "fr" => Ok(BetaRule::FletcherReeves),
            "hestenes-stiefel" | "hestenesstiefel" | "hs" => Ok(BetaRule::HestenesStiefel),
            "5.49" | "dai-yuan" | "daiyuan" => Ok(BetaRule::DaiYuan),
            _ => Err(IftError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid beta rules are 'Polak-Ribiere', 'Fletcher-Reeves', 'Hestenes-Stiefel' or '5.49'.",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonlinearCg {
    rules: StoppingRules,
    beta: BetaRule,
    line_search: LineSearch,
    verbose: bool,
}

impl NonlinearCg {
    pub fn new(rules: StoppingRules, beta: BetaRule) -> Self {
        Self { rules, beta, line_search: LineSearch::for_conjugate_gradient(), verbose: false }
    }

    pub fn with_line_search(mut self, line_search: LineSearch) -> Self {
        self.line_search = line_search;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Minimizer for NonlinearCg {
    fn minimize<E: Energy>(&self, energy: E) -> IftResult<MinimizationOutcome<E>> {
        let mut controller = IterationController::new(self.rules);
        let mut energy = energy;
        let mut status = controller.start(energy.value(), energy.gradient_norm());
        let mut direction = energy.gradient().neg();
        let mut step_guess = 1.0 / energy.gradient_norm().max(1.0);
        let mut reset = false;

        loop {
            let finished = match status {
                ControllerStatus::Continue => None,
                ControllerStatus::Converged => Some(ConvergenceStatus::Converged),
                ControllerStatus::IterationLimit => {
                    warn!("nonlinear CG stopped at the iteration limit with |grad| = {:.3e}", energy.gradient_norm());
                    Some(ConvergenceStatus::IterationLimit)
                }
            };
            if let Some(s) = finished {
                return Ok(MinimizationOutcome::new(energy, s, controller.iteration(), 0));
            }

            match self.line_search.search(&energy, &direction, step_guess)? {
                LineStep::Accepted { energy: next, step } => {
                    let beta = self.beta.beta(energy.gradient(), next.gradient(), &direction)?;
                    let mut new_direction = next.gradient().neg().add_scaled(&direction, beta)?;
                    if new_direction.vdot(next.gradient())? >= 0.0 {
                        debug!("nonlinear CG restart: direction lost descent");
                        new_direction = next.gradient().neg();
                    }
                    // Reuse the last step scaled by the change in slope along the direction.
                    let old_slope = energy.gradient().vdot(&direction)?;
                    let new_slope = next.gradient().vdot(&new_direction)?;
                    step_guess = (step * old_slope / new_slope).clamp(f64::EPSILON, 1.0);
                    direction = new_direction;
                    energy = next;
                    reset = false;
                    status = controller.check(energy.value(), energy.gradient_norm());
                    let (it, v, gn) = (controller.iteration(), energy.value(), energy.gradient_norm());
                    if self.verbose {
                        info!("iteration {it}: energy {v:.6e}, |grad| {gn:.3e}, beta {beta:.3e}");
                    } else {
                        debug!("iteration {it}: energy {v:.6e}, |grad| {gn:.3e}, beta {beta:.3e}");
                    }
                }
                LineStep::Failed { reason } if !reset => {
                    warn!("line search failed ({reason}); restarting from steepest descent");
                    direction = energy.gradient().neg();
                    step_guess = 1.0 / energy.gradient_norm().max(1.0);
                    reset = true;
                }
                LineStep::Failed { reason } => {
                    warn!("line search failed twice in a row ({reason}); giving up");
                    let iterations = controller.iteration();
                    return Ok(MinimizationOutcome::new(energy, ConvergenceStatus::Stalled, iterations, 0));
                }
            }
        }
    }
}
