//! minimization::trust_region — trust-region Newton-CG.
//!
//! Purpose
//! -------
//! Minimize an [`Energy`] without a line search: each iteration solves the
//! quadratic model built from the gradient and the metric inside a ball of
//! radius `Δ` ([`solve_steihaug`]) and adapts `Δ` to how well the model
//! predicted the actual change in energy.
//!
//! Key behaviors
//! -------------
//! - `ρ = (E(x) − E(x + p)) / (m(0) − m(p))`. The step is taken when
//!   `ρ > eta`; otherwise the iterate stays and only the radius changes.
//! - `ρ < 0.25` shrinks the radius to `Δ/4`; `ρ > 0.75` with a step on the
//!   boundary doubles it, capped at `max_radius`.
//! - A trial point whose energy overflows counts as `ρ = −∞`.
//! - When the predicted decrease is below the round-off of the energy,
//!   `ρ` cannot be measured; a step that does not raise the energy beyond
//!   that round-off counts as `ρ = 1`.
//! - The run ends with [`ConvergenceStatus::Stalled`] when the model
//!   predicts no decrease or the radius shrinks below round-off of the
//!   position.
//! - Subproblem solves that hit their iteration cap are counted in
//!   `inner_solver_failures`, as for [`DescentDirection::NewtonCg`](crate::minimization::DescentDirection::NewtonCg).
//!
//! Conventions
//! -----------
//! - Only accepted steps count as iterations.
//! - Per-iteration progress is logged like the descent minimizers; radius
//!   changes at `debug`.
use log::{debug, info, warn};

use crate::{
    energy::Energy,
    errors::{IftError, IftResult},
    minimization::{MinimizationOutcome, Minimizer},
    solvers::{solve_steihaug, CgOptions, ControllerStatus, ConvergenceStatus, IterationController, StoppingRules},
    validation::verify_tolerance,
};

/// Radius update thresholds on `ρ`.
const SHRINK_BELOW: f64 = 0.25;
const EXPAND_ABOVE: f64 = 0.75;

/// Energy changes within this many ulps of `|E|` are round-off.
const ROUND_OFF_ULPS: f64 = 8.0;

/// Validated trust-region constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustRegionOptions {
    pub initial_radius: f64,
    pub max_radius: f64,
    /// Minimum `ρ` for accepting a step, in `[0, 0.25)`.
    pub eta: f64,
}

impl TrustRegionOptions {
    /// # Errors
    /// - [`IftError::InvalidTolerance`] for non-positive radii, an initial
    ///   radius not below the maximum, or `eta` outside `[0, 0.25)`.
    pub fn new(initial_radius: f64, max_radius: f64, eta: f64) -> IftResult<Self> {
        verify_tolerance("initial_radius", initial_radius)?;
        verify_tolerance("max_radius", max_radius)?;
        if initial_radius >= max_radius {
            return Err(IftError::InvalidTolerance {
                name: "initial_radius",
                value: initial_radius,
                reason: "Initial radius must be smaller than the maximum radius.",
            });
        }
        if !(0.0..SHRINK_BELOW).contains(&eta) {
            return Err(IftError::InvalidTolerance { name: "eta", value: eta, reason: "eta must lie in [0, 0.25)." });
        }
        Ok(Self { initial_radius, max_radius, eta })
    }
}

impl Default for TrustRegionOptions {
    fn default() -> Self {
        Self { initial_radius: 1.0, max_radius: 1000.0, eta: 0.15 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrustRegionNewtonCg {
    rules: StoppingRules,
    cg: CgOptions,
    options: TrustRegionOptions,
    verbose: bool,
}

impl TrustRegionNewtonCg {
    pub fn new(rules: StoppingRules, cg: CgOptions, options: TrustRegionOptions) -> Self {
        Self { rules, cg, options, verbose: false }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn options(&self) -> &TrustRegionOptions {
        &self.options
    }

    fn report(&self, iteration: usize, value: f64, gradient_norm: f64, radius: f64) {
        if self.verbose {
            info!("iteration {iteration}: energy {value:.6e}, |grad| {gradient_norm:.3e}, radius {radius:.3e}");
        } else {
            debug!("iteration {iteration}: energy {value:.6e}, |grad| {gradient_norm:.3e}, radius {radius:.3e}");
        }
    }
}

impl Minimizer for TrustRegionNewtonCg {
    fn minimize<E: Energy>(&self, energy: E) -> IftResult<MinimizationOutcome<E>> {
        let mut controller = IterationController::new(self.rules);
        let mut energy = energy;
        let mut status = controller.start(energy.value(), energy.gradient_norm());
        let mut radius = self.options.initial_radius;
        let mut inner_failures = 0usize;

        loop {
            match status {
                ControllerStatus::Continue => {}
                ControllerStatus::Converged => {
                    let iterations = controller.iteration();
                    return Ok(MinimizationOutcome::new(energy, ConvergenceStatus::Converged, iterations, inner_failures));
                }
                ControllerStatus::IterationLimit => {
                    warn!("trust region stopped at the iteration limit with |grad| = {:.3e}", energy.gradient_norm());
                    let iterations = controller.iteration();
                    return Ok(MinimizationOutcome::new(energy, ConvergenceStatus::IterationLimit, iterations, inner_failures));
                }
            }

            let sub = solve_steihaug(energy.metric()?.as_ref(), energy.gradient(), radius, &self.cg)?;
            if !sub.status.is_converged() {
                inner_failures += 1;
                debug!("trust-region subproblem stopped after {} iterations", sub.iterations);
            }
            if sub.predicted_decrease.is_nan() || sub.predicted_decrease <= 0.0 {
                warn!("trust-region model predicts no decrease ({:.3e}); giving up", sub.predicted_decrease);
                let iterations = controller.iteration();
                return Ok(MinimizationOutcome::new(energy, ConvergenceStatus::Stalled, iterations, inner_failures));
            }

            let trial = match energy.at(energy.position().add(&sub.step)?) {
                Ok(trial) => Some(trial),
                Err(IftError::NonFiniteValue { .. }) => None,
                Err(e) => return Err(e),
            };
            let noise = ROUND_OFF_ULPS * f64::EPSILON * energy.value().abs();
            let rho = match &trial {
                Some(t) => {
                    let actual = energy.value() - t.value();
                    if sub.predicted_decrease <= noise && actual >= -noise {
                        1.0
                    } else {
                        actual / sub.predicted_decrease
                    }
                }
                None => f64::NEG_INFINITY,
            };

            if rho < SHRINK_BELOW {
                radius *= 0.25;
                debug!("rho {rho:.3e}: shrinking radius to {radius:.3e}");
            } else if rho > EXPAND_ABOVE && sub.hits_boundary {
                radius = (2.0 * radius).min(self.options.max_radius);
                debug!("rho {rho:.3e}: expanding radius to {radius:.3e}");
            }

            match trial {
                Some(next) if rho > self.options.eta => {
                    energy = next;
                    status = controller.check(energy.value(), energy.gradient_norm());
                    self.report(controller.iteration(), energy.value(), energy.gradient_norm(), radius);
                }
                _ => {
                    let floor = f64::EPSILON * (1.0 + energy.position().norm());
                    if radius < floor {
                        warn!("trust radius {radius:.3e} fell below round-off; giving up");
                        let iterations = controller.iteration();
                        return Ok(MinimizationOutcome::new(energy, ConvergenceStatus::Stalled, iterations, inner_failures));
                    }
                }
            }
        }
    }
}
