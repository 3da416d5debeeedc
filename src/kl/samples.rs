//! kl::samples — residual samples around a mean.
//!
//! Purpose
//! -------
//! Hold the residuals `s_i` a worker owns together with the mean they are
//! centered on. Posterior samples are `mean + s_i` and, when mirrored,
//! also `mean − s_i`.
//!
//! Key behaviors
//! -------------
//! - [`ResidualSampleList::at`] recenters the same residuals on a new
//!   mean; residuals are never redrawn here.
//! - [`ResidualSampleList::sample_stat`] computes mean and unbiased
//!   variance of the samples (optionally pushed through a model) across
//!   all workers of a communicator.
//!
//! Invariants & assumptions
//! ------------------------
//! - All residuals live on the mean's domain.
//! - `n_global` counts drawn residuals over all workers, before mirroring.
use crate::{
    domain::check_domain,
    errors::{IftError, IftResult},
    field::Field,
    linearization::Model,
    parallel::Communicator,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ResidualSampleList {
    mean: Field,
    residuals: Vec<Field>,
    mirrored: bool,
    n_global: usize,
}

impl ResidualSampleList {
    /// # Errors
    /// - [`IftError::DomainMismatch`] if a residual is off the mean's domain.
    /// - [`IftError::InvalidOption`] if `n_global` is smaller than the local count.
    pub fn new(mean: Field, residuals: Vec<Field>, mirrored: bool, n_global: usize) -> IftResult<Self> {
        for s in &residuals {
            check_domain(mean.domain(), s.domain())?;
        }
        if n_global < residuals.len() {
            return Err(IftError::InvalidOption {
                name: "n_global",
                reason: "Global sample count is below the local count.",
            });
        }
        Ok(Self { mean, residuals, mirrored, n_global })
    }

    pub fn mean(&self) -> &Field {
        &self.mean
    }

    pub fn residuals(&self) -> &[Field] {
        &self.residuals
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// Samples held by this worker, mirrors included.
    pub fn n_local_samples(&self) -> usize {
        self.residuals.len() * self.multiplicity()
    }

    /// Samples over all workers, mirrors included.
    pub fn n_samples(&self) -> usize {
        self.n_global * self.multiplicity()
    }

    fn multiplicity(&self) -> usize {
        if self.mirrored {
            2
        } else {
            1
        }
    }

    /// Signed residuals: `s_0, −s_0, s_1, −s_1, …` when mirrored.
    pub fn iter_residuals(&self) -> impl Iterator<Item = Field> + '_ {
        let mirrored = self.mirrored;
        self.residuals.iter().flat_map(move |s| {
            let mirror = if mirrored { Some(s.neg()) } else { None };
            std::iter::once(s.clone()).chain(mirror)
        })
    }

    /// Local posterior samples `mean ± s`.
    pub fn local_samples(&self) -> IftResult<Vec<Field>> {
        self.iter_residuals().map(|s| self.mean.add(&s)).collect()
    }

    /// Same residuals around `mean`.
    ///
    /// # Errors
    /// - [`IftError::DomainMismatch`] if `mean` is on another domain.
    pub fn at(&self, mean: Field) -> IftResult<Self> {
        check_domain(self.mean.domain(), mean.domain())?;
        Ok(Self { mean, residuals: self.residuals.clone(), mirrored: self.mirrored, n_global: self.n_global })
    }

    /// Mean and unbiased variance of the samples, or of `model` applied to
    /// them, over all workers.
    ///
    /// A single sample has zero variance.
    ///
    /// # Errors
    /// - [`IftError::InvalidOption`] if there are no samples at all.
    /// - Errors from the model or the collectives.
    pub fn sample_stat(&self, model: Option<&dyn Model>, comm: &dyn Communicator) -> IftResult<(Field, Field)> {
        let n = self.n_samples();
        if n == 0 {
            return Err(IftError::InvalidOption { name: "samples", reason: "Statistics need at least one sample." });
        }
        let values = self
            .local_samples()?
            .into_iter()
            .map(|x| match model {
                Some(m) => m.apply(&x),
                None => Ok(x),
            })
            .collect::<IftResult<Vec<_>>>()?;
        let target = match model {
            Some(m) => m.target().clone(),
            None => self.mean.domain().clone(),
        };

        let mut local_sum = Field::zeros(target.clone());
        for v in &values {
            local_sum = local_sum.add(v)?;
        }
        let mean = comm.allreduce_sum(&local_sum)?.scale(1.0 / n as f64);

        let mut local_sq = Field::zeros(target);
        for v in &values {
            let d = v.sub(&mean)?;
            local_sq = local_sq.add(&d.mul(&d)?)?;
        }
        let total_sq = comm.allreduce_sum(&local_sq)?;
        let var = if n > 1 { total_sq.scale(1.0 / (n - 1) as f64) } else { total_sq.scale(0.0) };
        Ok((mean, var))
    }
}
