//! linearization::energy_operators — scalar energies with Fisher metrics.
//!
//! Purpose
//! -------
//! Negative log-likelihoods and the standard-normal prior, expressed as
//! models with a scalar target. When asked for a metric they attach the
//! Fisher information pulled back through the incoming Jacobian, which is
//! what geometric variational inference samples from.
//!
//! Key behaviors
//! -------------
//! - [`GaussianEnergy`]: `½ (d − m)† N⁻¹ (d − m)`, metric `J† N⁻¹ J`.
//! - [`PoissonianEnergy`]: `Σ λ − d ln λ`, metric `J† diag(1/λ) J`.
//! - [`StandardHamiltonian`]: `H(ξ) = L(ξ) + ½ ξ†ξ`, metric
//!   `M_L + 1`; with sampling options the metric can also be inverted
//!   and sampled from its inverse through conjugate gradient.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inverse covariances are self-adjoint and positive definite; this is
//!   not re-verified at call time.
//! - Poisson rates must be strictly positive; a zero or negative rate
//!   shows up as a non-finite energy.
use std::sync::Arc;

use crate::{
    domain::{check_domain, Domain, DomainRef},
    errors::{IftError, IftResult},
    field::Field,
    linearization::{Linearization, Model, ModelRef},
    operators::{DiagonalOperator, InversionEnabler, OpRef, SandwichOperator},
    solvers::CgOptions,
};

/// `½ (x − mean)† N⁻¹ (x − mean)`.
#[derive(Debug, Clone)]
pub struct GaussianEnergy {
    domain: DomainRef,
    target: DomainRef,
    mean: Option<Field>,
    inverse_covariance: OpRef,
}

impl GaussianEnergy {
    /// # Errors
    /// - [`IftError::DomainMismatch`] if the inverse covariance is not
    ///   endomorphic or the mean lives elsewhere.
    pub fn new(inverse_covariance: OpRef, mean: Option<Field>) -> IftResult<Self> {
        check_domain(inverse_covariance.domain(), inverse_covariance.target())?;
        if let Some(m) = &mean {
            check_domain(inverse_covariance.domain(), m.domain())?;
        }
        let domain = inverse_covariance.domain().clone();
        Ok(Self { domain, target: Domain::scalar(), mean, inverse_covariance })
    }

    pub fn inverse_covariance(&self) -> &OpRef {
        &self.inverse_covariance
    }

    pub fn mean(&self) -> Option<&Field> {
        self.mean.as_ref()
    }

    fn residual(&self, x: &Field) -> IftResult<Field> {
        match &self.mean {
            Some(m) => x.sub(m),
            None => Ok(x.clone()),
        }
    }
}

impl Model for GaussianEnergy {
    fn domain(&self) -> &DomainRef {
        &self.domain
    }
    fn target(&self) -> &DomainRef {
        &self.target
    }
    fn name(&self) -> &'static str {
        "GaussianEnergy"
    }

    fn apply_field(&self, x: &Field) -> IftResult<Field> {
        let r = self.residual(x)?;
        Ok(Field::scalar(0.5 * r.vdot(&self.inverse_covariance.times(&r)?)?))
    }

    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization> {
        let r = match &self.mean {
            Some(m) => lin.add_field(&m.neg())?,
            None => lin.clone(),
        };
        let weighted = self.inverse_covariance.times(r.val())?;
        let projected = r.vdot_field(&weighted)?;
        let value = Field::scalar(0.5 * projected.value()?);
        let energy = Linearization::new(value, projected.jac().clone(), None, lin.want_metric())?;
        if !lin.want_metric() {
            return Ok(energy);
        }
        let metric = SandwichOperator::make(lin.jac().clone(), Some(self.inverse_covariance.clone()))?;
        energy.with_metric(Some(metric))
    }
}

/// Poisson negative log-likelihood of counts `data` given rates `λ`.
#[derive(Debug, Clone)]
pub struct PoissonianEnergy {
    data: Field,
    target: DomainRef,
}

impl PoissonianEnergy {
    /// # Errors
    /// - [`IftError::InvalidOption`] for negative counts.
    /// - [`IftError::NonFiniteValue`] for non-finite counts.
    pub fn new(data: Field) -> IftResult<Self> {
        data.check_finite("poisson data")?;
        if data.val().iter().any(|&d| d < 0.0) {
            return Err(IftError::InvalidOption { name: "data", reason: "Poisson counts must be non-negative." });
        }
        Ok(Self { data, target: Domain::scalar() })
    }

    pub fn data(&self) -> &Field {
        &self.data
    }
}

impl Model for PoissonianEnergy {
    fn domain(&self) -> &DomainRef {
        self.data.domain()
    }
    fn target(&self) -> &DomainRef {
        &self.target
    }
    fn name(&self) -> &'static str {
        "PoissonianEnergy"
    }

    fn apply_field(&self, x: &Field) -> IftResult<Field> {
        let log_rate = x.mapv(f64::ln);
        Ok(Field::scalar(x.sum() - self.data.vdot(&log_rate)?))
    }

    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization> {
        let rate = lin.val();
        let value = self.apply_field(rate)?;
        value.check_finite("poisson energy")?;
        let grad = Field::full(rate.domain().clone(), 1.0).sub(&self.data.div(rate)?)?;
        let energy = lin.vdot_field(&grad)?;
        let energy = Linearization::new(value, energy.jac().clone(), None, lin.want_metric())?;
        if !lin.want_metric() {
            return Ok(energy);
        }
        let fisher = DiagonalOperator::shared(rate.mapv(|l| 1.0 / l));
        let metric = SandwichOperator::make(lin.jac().clone(), Some(fisher))?;
        energy.with_metric(Some(metric))
    }
}

/// Posterior energy in standardized coordinates: likelihood plus
/// standard-normal prior.
#[derive(Debug, Clone)]
pub struct StandardHamiltonian {
    likelihood: ModelRef,
    target: DomainRef,
    sampling: Option<CgOptions>,
}

impl StandardHamiltonian {
    /// # Errors
    /// - [`IftError::NotScalar`] if the likelihood is not scalar-valued.
    pub fn new(likelihood: ModelRef, sampling: Option<CgOptions>) -> IftResult<Self> {
        if !likelihood.target().is_scalar() {
            return Err(IftError::NotScalar { size: likelihood.target().size() });
        }
        Ok(Self { likelihood, target: Domain::scalar(), sampling })
    }

    pub fn likelihood(&self) -> &ModelRef {
        &self.likelihood
    }

    pub fn value_at(&self, x: &Field) -> IftResult<f64> {
        self.apply(x)?.as_scalar()
    }

    pub fn gradient_at(&self, x: &Field) -> IftResult<Field> {
        self.linearize_at(x, false)?.gradient()
    }

    /// Metric at `x`, invertible when sampling options are set.
    ///
    /// # Errors
    /// - [`IftError::InvalidOption`] if the likelihood provides no metric.
    pub fn metric_at(&self, x: &Field) -> IftResult<OpRef> {
        let lin = self.linearize_at(x, true)?;
        lin.metric()
            .cloned()
            .ok_or(IftError::InvalidOption { name: "metric", reason: "Likelihood does not provide a metric." })
    }
}

impl Model for StandardHamiltonian {
    fn domain(&self) -> &DomainRef {
        self.likelihood.domain()
    }
    fn target(&self) -> &DomainRef {
        &self.target
    }
    fn name(&self) -> &'static str {
        "StandardHamiltonian"
    }

    fn apply_field(&self, x: &Field) -> IftResult<Field> {
        let lh = self.likelihood.apply_field(x)?.as_scalar()?;
        Ok(Field::scalar(lh + 0.5 * x.vdot(x)?))
    }

    fn apply_linearization(&self, lin: &Linearization) -> IftResult<Linearization> {
        let lh = self.likelihood.apply_linearization(lin)?;
        // ⟨x, x⟩ linearized against a constant copy has gradient x.
        let prior = lin.vdot_field(lin.val())?;
        let prior_val = Field::scalar(0.5 * lin.val().vdot(lin.val())?);
        let prior_metric = if lin.want_metric() { Some(SandwichOperator::make(lin.jac().clone(), None)?) } else { None };
        let prior = Linearization::new(prior_val, prior.jac().clone(), prior_metric, lin.want_metric())?;
        let total = lh.add(&prior)?;
        match (self.sampling.as_ref(), total.metric().cloned()) {
            (Some(options), Some(metric)) => {
                let enabled: OpRef = Arc::new(InversionEnabler::new(metric, *options)?);
                total.with_metric(Some(enabled))
            }
            _ => Ok(total),
        }
    }
}
