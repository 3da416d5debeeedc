//! minimization::line_search — strong Wolfe line search on energies.
//!
//! Purpose
//! -------
//! Find a step length `α` along a descent direction `d` from the current
//! energy such that the strong Wolfe conditions hold:
//!
//! - sufficient decrease: `φ(α) ≤ φ(0) + c1 α φ'(0)`,
//! - curvature: `|φ'(α)| ≤ c2 |φ'(0)|`,
//!
//! where `φ(α) = E(x + α d)`.
//!
//! Key behaviors
//! -------------
//! - Bracketing phase doubles the step (capped at `max_step`) until the
//!   conditions hold or a bracket is found.
//! - Zoom phase shrinks the bracket with a safeguarded quadratic
//!   interpolation and falls back to bisection when the interpolant leaves
//!   the interior of the bracket. It has its own budget of
//!   [`MAX_ZOOM_EVALUATIONS`]; once that is spent, or the bracket is
//!   narrower than round-off, the best sufficient-decrease point found so
//!   far is accepted.
//! - Near a minimum, energy differences drop below the round-off of the
//!   energy itself. Trials within `APPROX_WOLFE_EPS·|φ(0)|` of `φ(0)` are
//!   bracketed by the sign of their slope alone, and are accepted under
//!   the approximate Wolfe condition of Hager and Zhang,
//!   `φ'(α) ≤ (2c1 − 1) φ'(0)`, in place of sufficient decrease.
//! - Failures (no descent direction, evaluation budget spent without any
//!   acceptable point, step cap reached) are reported as
//!   [`LineStep::Failed`], not as errors; the minimizer decides whether to
//!   reset or stop.
//!
//! Invariants & assumptions
//! ------------------------
//! - `0 < c1 < c2 < 1`, `max_step > 0`, `max_iterations > 0`.
//! - Every trial point is evaluated through [`Energy::at`]; errors there
//!   (non-finite values included) propagate.
use log::debug;

use crate::{
    energy::Energy,
    errors::{IftError, IftResult},
    field::Field,
    validation::{verify_iteration_limit, verify_open_unit, verify_tolerance},
};

/// Evaluations allowed in the zoom phase, on top of `max_iterations`.
pub const MAX_ZOOM_EVALUATIONS: usize = 100;

/// Relative energy tolerance below which the approximate Wolfe condition
/// replaces the sufficient-decrease test.
pub const APPROX_WOLFE_EPS: f64 = 1e-10;

/// Validated strong Wolfe parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearch {
    pub c1: f64,
    pub c2: f64,
    pub max_step: f64,
    pub max_iterations: usize,
}

impl LineSearch {
    /// # Errors
    /// - [`IftError::InvalidTolerance`] if `c1`, `c2` are outside `(0, 1)`,
    ///   `c1 ≥ c2`, or `max_step` is not positive and finite.
    /// - [`IftError::InvalidIterationLimit`] for `max_iterations == 0`.
    pub fn new(c1: f64, c2: f64, max_step: f64, max_iterations: usize) -> IftResult<Self> {
        verify_open_unit("c1", c1)?;
        verify_open_unit("c2", c2)?;
        if c1 >= c2 {
            return Err(IftError::InvalidTolerance { name: "c1", value: c1, reason: "c1 must be smaller than c2." });
        }
        verify_tolerance("max_step", max_step)?;
        verify_iteration_limit("max_iterations", max_iterations)?;
        Ok(Self { c1, c2, max_step, max_iterations })
    }

    /// Tight curvature condition (`c2 = 0.1`) for nonlinear conjugate gradient.
    pub fn for_conjugate_gradient() -> Self {
        Self { c2: 0.1, ..Self::default() }
    }

    /// Search along `direction` starting from `initial_step`.
    pub fn search<E: Energy>(&self, energy: &E, direction: &Field, initial_step: f64) -> IftResult<LineStep<E>> {
        let phi0 = energy.value();
        let dphi0 = energy.gradient().vdot(direction)?;
        if dphi0 >= 0.0 {
            return Ok(LineStep::Failed { reason: "not a descent direction" });
        }

        let base = Base { phi: phi0, dphi: dphi0, noise: APPROX_WOLFE_EPS * phi0.abs() };
        let mut evaluations = 0usize;
        let mut prev = Trial { alpha: 0.0, phi: phi0, dphi: dphi0, energy: energy.clone() };
        let mut alpha = initial_step.min(self.max_step);
        if alpha.is_nan() || alpha <= 0.0 {
            alpha = self.max_step.min(1.0);
        }

        while evaluations < self.max_iterations {
            let cur = self.evaluate(energy, direction, alpha)?;
            evaluations += 1;
            let reference = if evaluations > 1 { prev.phi } else { f64::INFINITY };
            if !self.admissible(&cur, reference, &base) {
                return self.zoom(energy, direction, prev, cur, &base);
            }
            if self.acceptable(&cur, &base) {
                debug!("line search accepted step {alpha:.3e} after {evaluations} evaluations");
                return Ok(LineStep::Accepted { energy: cur.energy, step: alpha });
            }
            if cur.dphi >= 0.0 {
                return self.zoom(energy, direction, cur, prev, &base);
            }
            if alpha >= self.max_step {
                return Ok(LineStep::Failed { reason: "maximum step length reached" });
            }
            prev = cur;
            alpha = (2.0 * alpha).min(self.max_step);
        }
        Ok(LineStep::Failed { reason: "evaluation budget exhausted while bracketing" })
    }

    fn evaluate<E: Energy>(&self, energy: &E, direction: &Field, alpha: f64) -> IftResult<Trial<E>> {
        let trial = energy.at(energy.position().add_scaled(direction, alpha)?)?;
        let dphi = trial.gradient().vdot(direction)?;
        Ok(Trial { alpha, phi: trial.value(), dphi, energy: trial })
    }

    fn armijo<E>(&self, cur: &Trial<E>, base: &Base) -> bool {
        cur.phi <= base.phi + self.c1 * cur.alpha * base.dphi
    }

    /// May serve as the low end of a bracket: sufficient decrease without
    /// rising above `reference`, or a value indistinguishable from `φ(0)`.
    fn admissible<E>(&self, cur: &Trial<E>, reference: f64, base: &Base) -> bool {
        (self.armijo(cur, base) && cur.phi < reference) || cur.phi <= base.phi + base.noise
    }

    /// Strong curvature plus sufficient or approximate decrease.
    fn acceptable<E>(&self, cur: &Trial<E>, base: &Base) -> bool {
        let approximate = cur.dphi <= (2.0 * self.c1 - 1.0) * base.dphi;
        cur.dphi.abs() <= -self.c2 * base.dphi && (self.armijo(cur, base) || approximate)
    }

    /// `lo` is always admissible (or the start `α = 0`) and `φ'(lo)` points
    /// towards `hi`.
    fn zoom<E: Energy>(
        &self, energy: &E, direction: &Field, mut lo: Trial<E>, mut hi: Trial<E>, base: &Base,
    ) -> IftResult<LineStep<E>> {
        for evaluation in 1..=MAX_ZOOM_EVALUATIONS {
            let width = (hi.alpha - lo.alpha).abs();
            if width <= f64::EPSILON * lo.alpha.abs().max(hi.alpha.abs()) {
                debug!("line search bracket collapsed to {width:.3e}");
                break;
            }
            let alpha = interpolate(&lo, &hi);
            let cur = self.evaluate(energy, direction, alpha)?;
            if !self.admissible(&cur, lo.phi, base) {
                hi = cur;
                continue;
            }
            if self.acceptable(&cur, base) {
                debug!("line search accepted step {alpha:.3e} after {evaluation} zoom evaluations");
                return Ok(LineStep::Accepted { energy: cur.energy, step: alpha });
            }
            if cur.dphi * (hi.alpha - lo.alpha) >= 0.0 {
                hi = lo;
            }
            lo = cur;
        }
        let approximate = lo.dphi <= (2.0 * self.c1 - 1.0) * base.dphi;
        if lo.alpha > 0.0 && (self.armijo(&lo, base) || approximate) {
            debug!("line search settled for step {:.3e} without the curvature condition", lo.alpha);
            return Ok(LineStep::Accepted { energy: lo.energy, step: lo.alpha });
        }
        Ok(LineStep::Failed { reason: "no sufficient decrease found while zooming" })
    }
}

impl Default for LineSearch {
    fn default() -> Self {
        Self { c1: 1e-4, c2: 0.9, max_step: 1e10, max_iterations: 20 }
    }
}

/// Result of one line search.
#[derive(Debug, Clone)]
pub enum LineStep<E: Energy> {
    Accepted { energy: E, step: f64 },
    Failed { reason: &'static str },
}

/// `φ(0)`, `φ'(0)` and the round-off allowance on `φ`.
#[derive(Debug, Clone, Copy)]
struct Base {
    phi: f64,
    dphi: f64,
    noise: f64,
}

#[derive(Debug, Clone)]
struct Trial<E> {
    alpha: f64,
    phi: f64,
    dphi: f64,
    energy: E,
}

/// Minimizer of the quadratic through `φ(lo)`, `φ'(lo)`, `φ(hi)`, kept at
/// least 10% of the bracket away from either end; bisection otherwise.
fn interpolate<E>(lo: &Trial<E>, hi: &Trial<E>) -> f64 {
    let delta = hi.alpha - lo.alpha;
    let mid = lo.alpha + 0.5 * delta;
    let denom = 2.0 * (hi.phi - lo.phi - lo.dphi * delta);
    if denom <= 0.0 || !denom.is_finite() {
        return mid;
    }
    let alpha = lo.alpha - lo.dphi * delta * delta / denom;
    let (a, b) = if delta > 0.0 { (lo.alpha, hi.alpha) } else { (hi.alpha, lo.alpha) };
    let margin = 0.1 * delta.abs();
    if alpha.is_finite() && alpha > a + margin && alpha < b - margin {
        alpha
    } else {
        mid
    }
}
