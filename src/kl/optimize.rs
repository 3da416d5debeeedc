//! kl::optimize — the MGVI loop.
//!
//! Purpose
//! -------
//! Alternate between drawing residual samples at the current mean and
//! minimizing the sampled KL with those samples held fixed, for a fixed
//! number of global iterations.
//!
//! Key behaviors
//! -------------
//! - Global iteration `i` draws with seed `seed + i`; runs are reproducible.
//! - The minimizer's status is logged; a stalled or capped inner run still
//!   moves the mean to the best energy it reached. Truncated Newton-CG
//!   solves of each inner run are kept per global iteration.
//! - Any error ends the loop. The outcome keeps the last valid mean and
//!   samples next to the error instead of discarding them.
use log::{info, warn};

use crate::{
    domain::check_domain,
    energy::Energy,
    errors::{IftError, IftResult},
    field::Field,
    kl::{
        metric_gaussian_kl::{KlOptions, MetricGaussianKL},
        samples::ResidualSampleList,
    },
    linearization::{Model, StandardHamiltonian},
    minimization::Minimizer,
    parallel::CommRef,
    validation::verify_iteration_limit,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeKlOptions {
    pub global_iterations: usize,
    pub kl: KlOptions,
}

impl OptimizeKlOptions {
    /// # Errors
    /// - [`IftError::InvalidIterationLimit`] for zero global iterations.
    pub fn new(global_iterations: usize, kl: KlOptions) -> IftResult<Self> {
        verify_iteration_limit("global_iterations", global_iterations)?;
        Ok(Self { global_iterations, kl })
    }
}

impl Default for OptimizeKlOptions {
    fn default() -> Self {
        Self { global_iterations: 5, kl: KlOptions::default() }
    }
}

/// State after an MGVI run.
#[derive(Debug, Clone)]
pub struct KlRunOutcome {
    /// Last valid mean.
    pub mean: Field,
    /// Samples belonging to `mean`; `None` if the first draw failed.
    pub samples: Option<ResidualSampleList>,
    /// KL value after each completed global iteration.
    pub history: Vec<f64>,
    /// Completed global iterations.
    pub iterations: usize,
    /// `inner_solver_failures` of the minimizer, per completed global
    /// iteration.
    pub inner_solver_failures: Vec<usize>,
    /// Error that stopped the run early.
    pub failure: Option<IftError>,
}

impl KlRunOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// The mean and samples, or the error that interrupted the run.
    pub fn into_result(self) -> IftResult<(Field, ResidualSampleList)> {
        match (self.failure, self.samples) {
            (Some(e), _) => Err(e),
            (None, Some(samples)) => Ok((self.mean, samples)),
            (None, None) => Err(IftError::InvalidOption { name: "samples", reason: "Run produced no samples." }),
        }
    }
}

/// Run `options.global_iterations` MGVI iterations from `initial`.
///
/// # Errors
/// - [`IftError::DomainMismatch`] if `initial` is off the Hamiltonian's domain.
///
/// Failures during the run are reported in [`KlRunOutcome::failure`].
pub fn optimize_kl<M: Minimizer>(
    hamiltonian: &StandardHamiltonian, initial: Field, minimizer: &M, options: &OptimizeKlOptions, comm: CommRef,
) -> IftResult<KlRunOutcome> {
    check_domain(hamiltonian.domain(), initial.domain())?;
    let mut outcome = KlRunOutcome {
        mean: initial,
        samples: None,
        history: Vec::new(),
        iterations: 0,
        inner_solver_failures: Vec::new(),
        failure: None,
    };

    for i in 0..options.global_iterations {
        let kl_options = options.kl.with_seed(options.kl.seed.wrapping_add(i as u64));
        let step = MetricGaussianKL::draw(outcome.mean.clone(), hamiltonian.clone(), kl_options, comm.clone())
            .and_then(|kl| minimizer.minimize(kl));
        let inner = match step {
            Ok(inner) => inner,
            Err(e) => {
                warn!("MGVI iteration {i} failed: {e}");
                outcome.failure = Some(e);
                break;
            }
        };
        if !inner.is_converged() {
            warn!("MGVI iteration {i}: minimizer ended with {:?} after {} steps", inner.status, inner.iterations);
        }
        if inner.inner_solver_failures > 0 {
            warn!("MGVI iteration {i}: {} truncated inner solves", inner.inner_solver_failures);
        }
        outcome.inner_solver_failures.push(inner.inner_solver_failures);
        let kl = inner.energy;
        info!("MGVI iteration {i}: KL = {:.6e}, |grad| = {:.3e}", kl.value(), kl.gradient_norm());
        outcome.history.push(kl.value());
        outcome.mean = kl.position().clone();
        outcome.samples = Some(kl.samples().clone());
        outcome.iterations = i + 1;
    }
    Ok(outcome)
}
