//! kl::diagnostics — goodness of fit of reconstructions.
//!
//! Reduced χ² of data residuals under the noise model, with the upper-tail
//! p-value of the χ² distribution. Values near one indicate residuals
//! consistent with the assumed noise; large values underfitting, small
//! values overfitting.
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::{
    domain::check_domain,
    errors::{IftError, IftResult},
    field::Field,
    kl::samples::ResidualSampleList,
    linearization::Model,
    operators::LinearOperator,
    parallel::{agree, Communicator},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquareReport {
    /// `r† N⁻¹ r`, averaged over samples where applicable.
    pub chi_square: f64,
    pub dof: usize,
    /// `chi_square / dof`.
    pub reduced: f64,
    /// `P(X ≥ chi_square)` for `X ~ χ²(dof)`.
    pub p_value: f64,
}

impl ChiSquareReport {
    fn new(chi_square: f64, dof: usize) -> IftResult<Self> {
        let dist = ChiSquared::new(dof as f64)
            .map_err(|_| IftError::InvalidOption { name: "dof", reason: "Degrees of freedom must be positive." })?;
        let p_value = 1.0 - dist.cdf(chi_square);
        Ok(Self { chi_square, dof, reduced: chi_square / dof as f64, p_value })
    }
}

/// χ² statistics of one residual `d − R(x)`.
///
/// # Errors
/// - [`IftError::DomainMismatch`] if `residual` is off the operator's domain.
/// - [`IftError::InvalidOption`] for an empty residual.
pub fn reduced_chi_square(residual: &Field, inverse_covariance: &dyn LinearOperator) -> IftResult<ChiSquareReport> {
    let chi_square = residual.vdot(&inverse_covariance.times(residual)?)?;
    ChiSquareReport::new(chi_square, residual.size())
}

/// χ² statistics of `data − response(sample)`, averaged over all samples
/// of all workers.
///
/// # Errors
/// - [`IftError::DomainMismatch`] if `data` is off the response's target.
/// - Errors from the response, the noise operator or the collectives.
pub fn sample_reduced_chi_square(
    samples: &ResidualSampleList, response: &dyn Model, data: &Field, inverse_covariance: &dyn LinearOperator,
    comm: &dyn Communicator,
) -> IftResult<ChiSquareReport> {
    check_domain(response.target(), data.domain())?;
    let n = samples.n_samples();
    if n == 0 {
        return Err(IftError::InvalidOption { name: "samples", reason: "Statistics need at least one sample." });
    }
    let local = agree(comm, local_chi_square(samples, response, data, inverse_covariance))?;
    let chi_square = comm.allreduce_sum_scalar(local)? / n as f64;
    ChiSquareReport::new(chi_square, data.size())
}

fn local_chi_square(
    samples: &ResidualSampleList, response: &dyn Model, data: &Field, inverse_covariance: &dyn LinearOperator,
) -> IftResult<f64> {
    let mut total = 0.0;
    for x in samples.local_samples()? {
        let r = data.sub(&response.apply(&x)?)?;
        total += r.vdot(&inverse_covariance.times(&r)?)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Domain,
        linearization::LinearModel,
        operators::{DiagonalOperator, ScalingOperator},
        parallel::SerialCommunicator,
    };
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - χ² value, reduction and p-value for known residuals.
    // - Sample averaging through a response.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // χ² of a known residual under a diagonal noise model.
    //
    // Given
    // -----
    // - r = [1, 2], N⁻¹ = diag(1, 0.25): χ² = 1 + 1 = 2 with 2 dof.
    //
    // Expect
    // ------
    // - reduced 1 and p = exp(−1) (χ²(2) tail is exp(−x/2)).
    fn known_residual_statistics() {
        let domain = Domain::unstructured(2);
        let r = Field::from_vec(domain.clone(), vec![1.0, 2.0]).unwrap();
        let ninv = DiagonalOperator::shared(Field::from_vec(domain, vec![1.0, 0.25]).unwrap());

        let report = reduced_chi_square(&r, ninv.as_ref()).unwrap();

        assert_relative_eq!(report.chi_square, 2.0);
        assert_eq!(report.dof, 2);
        assert_relative_eq!(report.reduced, 1.0);
        assert_relative_eq!(report.p_value, (-1.0f64).exp(), epsilon = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Averaging over mirrored samples through an identity response.
    //
    // Given
    // -----
    // - data 0, mean 0, residual ±[1, 1], unit noise.
    //
    // Expect
    // ------
    // - χ² 2 per sample, so an average of 2 over 2 dof.
    fn averages_over_samples() {
        let domain = Domain::unstructured(2);
        let s = Field::full(domain.clone(), 1.0);
        let samples = ResidualSampleList::new(Field::zeros(domain.clone()), vec![s], true, 1).unwrap();
        let response = LinearModel::new(ScalingOperator::shared(domain.clone(), 1.0));
        let ninv = ScalingOperator::shared(domain.clone(), 1.0);

        let report = sample_reduced_chi_square(
            &samples,
            &response,
            &Field::zeros(domain),
            ninv.as_ref(),
            &SerialCommunicator,
        )
        .unwrap();

        assert_relative_eq!(report.chi_square, 2.0);
        assert_relative_eq!(report.reduced, 1.0);
    }
}
