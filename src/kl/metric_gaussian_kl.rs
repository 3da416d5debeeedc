//! kl::metric_gaussian_kl — sampled KL divergence to a metric Gaussian.
//!
//! Purpose
//! -------
//! Approximate a posterior `exp(−H)` by a Gaussian centred on `mean` whose
//! covariance is the inverse of the Hamiltonian's metric at the mean, and
//! expose the sampled KL divergence as an [`Energy`] of the mean.
//!
//! Key behaviors
//! -------------
//! - [`draw_residual`] is a pure function of (metric, seed, index): it
//!   draws `ξ ~ N(0, M)` from a ChaCha8 stream keyed by the index and
//!   solves `M s = ξ` by CG, so `s ~ N(0, M⁻¹)`.
//! - [`MetricGaussianKL::draw`] draws the residuals of this worker's
//!   shard; mirrored residuals `−s` reuse the same solve.
//! - Value and gradient are averages of `H(m ± s)` and `∇H(m ± s)` over
//!   all samples of all workers; the metric is the averaged sample metric.
//! - [`Energy::at`] keeps the residuals. Only
//!   [`MetricGaussianKL::resample`] draws new ones.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every worker of the communicator constructs, moves and resamples its
//!   KL in lockstep; collectives are issued in the same order everywhere.
//! - A local failure is shared with all workers before any further
//!   collective, so the group fails together instead of hanging.
use std::sync::Arc;

use log::debug;

use crate::{
    domain::{check_domain, DomainRef},
    energy::Energy,
    errors::{IftError, IftResult},
    field::{rng_for, Field},
    kl::samples::ResidualSampleList,
    linearization::{Model, StandardHamiltonian},
    operators::{Capability, LinearOperator, Mode, OpRef},
    parallel::{agree, local_indices, CommRef},
    solvers::{solve, CgOptions},
    validation::{validate_gradient, validate_value},
};

/// Sampling configuration of the KL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KlOptions {
    /// Residuals drawn over all workers, before mirroring.
    pub n_samples: usize,
    /// Also use `−s` for every residual `s`.
    pub mirror: bool,
    pub seed: u64,
    /// Solver settings for `M s = ξ`.
    pub cg: CgOptions,
}

impl KlOptions {
    /// # Errors
    /// - [`IftError::InvalidOption`] for `n_samples == 0`.
    pub fn new(n_samples: usize, mirror: bool, seed: u64, cg: CgOptions) -> IftResult<Self> {
        if n_samples == 0 {
            return Err(IftError::InvalidOption { name: "n_samples", reason: "At least one sample is required." });
        }
        Ok(Self { n_samples, mirror, seed, cg })
    }

    /// Same options with another seed.
    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }
}

impl Default for KlOptions {
    fn default() -> Self {
        Self { n_samples: 8, mirror: true, seed: 42, cg: CgOptions::default() }
    }
}

/// Residual `index` of the stream `seed`, distributed as `N(0, M⁻¹)`.
///
/// # Errors
/// - [`IftError::SamplingNotSupported`] if `metric` cannot draw `N(0, M)`.
/// - [`IftError::SolverNonConvergence`] if CG does not reach its tolerance.
pub fn draw_residual(metric: &dyn LinearOperator, seed: u64, index: usize, cg: &CgOptions) -> IftResult<Field> {
    let mut rng = rng_for(seed, index as u64);
    let xi = metric.draw_sample(false, &mut rng)?;
    let outcome = solve(metric, &xi, cg)?;
    debug!("residual {index}: CG finished after {} iterations", outcome.iterations);
    outcome.into_result()
}

/// Average of the sample metrics over all workers.
///
/// Applying it is a collective operation.
#[derive(Debug)]
pub struct SampledMetric {
    domain: DomainRef,
    metrics: Vec<OpRef>,
    weight: f64,
    comm: CommRef,
}

impl SampledMetric {
    fn local_sum(&self, x: &Field) -> IftResult<Field> {
        let mut acc = Field::zeros(self.domain.clone());
        for m in &self.metrics {
            acc = acc.add(&m.times(x)?)?;
        }
        Ok(acc)
    }
}

impl LinearOperator for SampledMetric {
    fn domain(&self) -> &DomainRef {
        &self.domain
    }

    fn target(&self) -> &DomainRef {
        &self.domain
    }

    fn capability(&self) -> Capability {
        Capability::FORWARD
    }

    fn name(&self) -> &'static str {
        "SampledMetric"
    }

    // Self-adjoint: both forward modes are the same map.
    fn apply_unchecked(&self, x: &Field, _mode: Mode) -> IftResult<Field> {
        let local = agree(self.comm.as_ref(), self.local_sum(x))?;
        Ok(self.comm.allreduce_sum(&local)?.scale(self.weight))
    }
}

#[derive(Debug, Clone)]
pub struct MetricGaussianKL {
    hamiltonian: StandardHamiltonian,
    samples: ResidualSampleList,
    options: KlOptions,
    comm: CommRef,
    value: f64,
    gradient: Field,
}

impl MetricGaussianKL {
    /// Draw this worker's residuals at `mean` and evaluate the KL there.
    ///
    /// # Errors
    /// - [`IftError::DomainMismatch`] if `mean` is off the Hamiltonian's domain.
    /// - Metric, sampling and solver errors, on every worker if on any.
    pub fn draw(mean: Field, hamiltonian: StandardHamiltonian, options: KlOptions, comm: CommRef) -> IftResult<Self> {
        check_domain(hamiltonian.domain(), mean.domain())?;
        let shard = local_indices(options.n_samples, comm.rank(), comm.size());
        debug!("rank {} draws residuals {:?} of {}", comm.rank(), shard, options.n_samples);
        let residuals = hamiltonian.metric_at(&mean).and_then(|metric| {
            shard.map(|i| draw_residual(metric.as_ref(), options.seed, i, &options.cg)).collect::<IftResult<Vec<_>>>()
        });
        let residuals = agree(comm.as_ref(), residuals)?;
        let samples = ResidualSampleList::new(mean, residuals, options.mirror, options.n_samples)?;
        Self::evaluate(hamiltonian, samples, options, comm)
    }

    fn evaluate(
        hamiltonian: StandardHamiltonian, samples: ResidualSampleList, options: KlOptions, comm: CommRef,
    ) -> IftResult<Self> {
        let local = Self::local_sums(&hamiltonian, &samples);
        let (value, gradient) = agree(comm.as_ref(), local)?;
        let n = samples.n_samples() as f64;
        let value = comm.allreduce_sum_scalar(value)? / n;
        let gradient = comm.allreduce_sum(&gradient)?.scale(1.0 / n);
        validate_value("kl value", value)?;
        validate_gradient(&gradient, samples.mean())?;
        Ok(Self { hamiltonian, samples, options, comm, value, gradient })
    }

    fn local_sums(hamiltonian: &StandardHamiltonian, samples: &ResidualSampleList) -> IftResult<(f64, Field)> {
        let mut value = 0.0;
        let mut gradient = Field::zeros(samples.mean().domain().clone());
        for x in samples.local_samples()? {
            let lin = hamiltonian.linearize_at(&x, false)?;
            value += lin.value()?;
            gradient = gradient.add(&lin.gradient()?)?;
        }
        Ok((value, gradient))
    }

    /// Fresh residuals at the current mean from the next seed.
    pub fn resample(&self) -> IftResult<Self> {
        let options = self.options.with_seed(self.options.seed.wrapping_add(1));
        Self::draw(self.samples.mean().clone(), self.hamiltonian.clone(), options, self.comm.clone())
    }

    pub fn samples(&self) -> &ResidualSampleList {
        &self.samples
    }

    pub fn hamiltonian(&self) -> &StandardHamiltonian {
        &self.hamiltonian
    }

    pub fn options(&self) -> &KlOptions {
        &self.options
    }

    pub fn communicator(&self) -> &CommRef {
        &self.comm
    }
}

impl Energy for MetricGaussianKL {
    fn position(&self) -> &Field {
        self.samples.mean()
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn gradient(&self) -> &Field {
        &self.gradient
    }

    fn metric(&self) -> IftResult<OpRef> {
        let local = self
            .samples
            .local_samples()
            .and_then(|xs| xs.iter().map(|x| self.hamiltonian.metric_at(x)).collect::<IftResult<Vec<_>>>());
        let metrics = agree(self.comm.as_ref(), local)?;
        Ok(Arc::new(SampledMetric {
            domain: self.samples.mean().domain().clone(),
            metrics,
            weight: 1.0 / self.samples.n_samples() as f64,
            comm: self.comm.clone(),
        }))
    }

    fn at(&self, position: Field) -> IftResult<Self> {
        let samples = self.samples.at(position)?;
        Self::evaluate(self.hamiltonian.clone(), samples, self.options, self.comm.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Domain,
        linearization::{linear, GaussianEnergy, ModelAlgebra, ModelRef},
        operators::ScalingOperator,
        parallel::{LocalGroup, SerialCommunicator},
    };
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Determinism and distribution of drawn residuals.
    // - Antithetic cancellation in the KL gradient.
    // - Sample persistence under `at` and refresh under `resample`.
    // - Sharded evaluation against the serial one.
    // -------------------------------------------------------------------------

    /// H(x) = ½‖x − d‖² + ½‖x‖², metric 2·1.
    fn hamiltonian(n: usize) -> (StandardHamiltonian, Field) {
        let domain = Domain::unstructured(n);
        let data = Field::from_fn(domain.clone(), |i| 1.0 + i as f64);
        let lh: ModelRef =
            Arc::new(GaussianEnergy::new(ScalingOperator::shared(domain.clone(), 1.0), Some(data.clone())).unwrap());
        let lh = lh.chain(&linear(ScalingOperator::shared(domain, 1.0))).unwrap();
        (StandardHamiltonian::new(lh, None).unwrap(), data)
    }

    fn tight_cg() -> CgOptions {
        CgOptions::new(1e-12, 200, 20).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Residuals depend only on (seed, index) and have covariance M⁻¹.
    //
    // Given
    // -----
    // - M = 2·1 on 2000 pixels.
    //
    // Expect
    // ------
    // - Identical draws for equal keys, different draws otherwise, and a
    //   pixel variance near 1/2.
    fn residuals_are_pure_and_distributed() {
        let (h, _) = hamiltonian(2000);
        let metric = h.metric_at(&Field::zeros(h.domain().clone())).unwrap();

        let a = draw_residual(metric.as_ref(), 7, 3, &tight_cg()).unwrap();
        let b = draw_residual(metric.as_ref(), 7, 3, &tight_cg()).unwrap();
        let c = draw_residual(metric.as_ref(), 7, 4, &tight_cg()).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        let var = a.vdot(&a).unwrap() / a.size() as f64;
        assert_relative_eq!(var, 0.5, epsilon = 0.06);
    }

    #[test]
    // Purpose
    // -------
    // Mirrored samples cancel in the gradient of a quadratic Hamiltonian.
    //
    // Given
    // -----
    // - 3 mirrored residuals at mean m = 0 on 4 pixels.
    //
    // Expect
    // ------
    // - gradient 2m − d = −d; six samples; value at least H(m).
    fn mirrored_gradient_is_exact() {
        let (h, data) = hamiltonian(4);
        let opts = KlOptions::new(3, true, 11, tight_cg()).unwrap();
        let mean = Field::zeros(data.domain().clone());

        let kl = MetricGaussianKL::draw(mean.clone(), h.clone(), opts, SerialCommunicator::shared()).unwrap();

        assert_eq!(kl.samples().n_samples(), 6);
        for (g, d) in kl.gradient().val().iter().zip(data.val().iter()) {
            assert_relative_eq!(*g, -d, epsilon = 1e-12);
        }
        assert!(kl.value() >= h.value_at(&mean).unwrap());
    }

    #[test]
    // Purpose
    // -------
    // `at` keeps residuals, `resample` replaces them, and the metric is
    // the average sample metric.
    //
    // Given
    // -----
    // - A KL at zero moved to d/2 and resampled there.
    //
    // Expect
    // ------
    // - Same residuals after `at`, different after `resample`; gradient
    //   zero at d/2 with mirroring; metric 2·1.
    fn at_keeps_and_resample_refreshes() {
        let (h, data) = hamiltonian(3);
        let opts = KlOptions::new(2, true, 5, tight_cg()).unwrap();
        let kl = MetricGaussianKL::draw(Field::zeros(data.domain().clone()), h, opts, SerialCommunicator::shared())
            .unwrap();

        let moved = kl.at(data.scale(0.5)).unwrap();
        assert_eq!(moved.samples().residuals(), kl.samples().residuals());
        assert_relative_eq!(moved.gradient_norm(), 0.0, epsilon = 1e-12);

        let fresh = moved.resample().unwrap();
        assert_ne!(fresh.samples().residuals(), moved.samples().residuals());
        assert_eq!(fresh.position(), moved.position());

        let ones = Field::full(data.domain().clone(), 1.0);
        let applied = moved.apply_metric(&ones).unwrap();
        for v in applied.val().iter() {
            assert_relative_eq!(*v, 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Splitting samples across workers does not change the KL.
    //
    // Given
    // -----
    // - 5 unmirrored samples, serial and on 3 workers, at m = 0.3.
    //
    // Expect
    // ------
    // - Equal values and gradients on every worker to 1e-12.
    fn sharded_equals_serial() {
        let (h, data) = hamiltonian(4);
        let opts = KlOptions::new(5, false, 99, tight_cg()).unwrap();
        let mean = Field::full(data.domain().clone(), 0.3);

        let serial = MetricGaussianKL::draw(mean.clone(), h.clone(), opts, SerialCommunicator::shared()).unwrap();
        let group = LocalGroup::new(3).unwrap();
        let sharded = group
            .run(|comm| {
                let kl = MetricGaussianKL::draw(mean.clone(), h.clone(), opts, comm.shared()).unwrap();
                (kl.value(), kl.gradient().clone(), kl.samples().residuals().len())
            })
            .unwrap();

        let counts: Vec<_> = sharded.iter().map(|(_, _, n)| *n).collect();
        assert_eq!(counts, vec![2, 2, 1]);
        for (value, gradient, _) in sharded {
            assert_relative_eq!(value, serial.value(), max_relative = 1e-12);
            for (a, b) in gradient.val().iter().zip(serial.gradient().val().iter()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Option validation.
    //
    // Given
    // -----
    // - Zero samples.
    //
    // Expect
    // ------
    // - `InvalidOption`.
    fn rejects_zero_samples() {
        assert!(matches!(
            KlOptions::new(0, false, 1, CgOptions::default()),
            Err(IftError::InvalidOption { name: "n_samples", .. })
        ));
    }
}
