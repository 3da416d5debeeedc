//! library::wiener_filter — closed-form posterior of linear Gaussian problems.
//!
//! Purpose
//! -------
//! For data `d = R s + n` with `s ~ N(0, S)` and `n ~ N(0, N)` the
//! posterior is Gaussian with covariance `D = (R† N⁻¹ R + S⁻¹)⁻¹` and mean
//! `m = D j`, `j = R† N⁻¹ d`. Provide the curvature `D⁻¹` with a CG-backed
//! inverse, the mean, and posterior samples.
//!
//! Key behaviors
//! -------------
//! - [`WienerFilterCurvature::make`] preconditions CG with `S`, which is
//!   exact when the likelihood is uninformative.
//! - [`WienerFilterCurvature::mean`] and
//!   [`WienerFilterCurvature::posterior_sample`] solve against the
//!   curvature; a non-converged solve is an error.
//!
//! Invariants & assumptions
//! ------------------------
//! - `S` and `N⁻¹` are self-adjoint positive definite; `S` is invertible
//!   without CG (scaling or diagonal) and can draw samples.
use log::debug;

use crate::{
    domain::check_domain,
    errors::IftResult,
    field::{Field, IftRng},
    operators::{InversionEnabler, OpRef, OperatorAlgebra, SandwichOperator},
    solvers::CgOptions,
};

#[derive(Debug, Clone)]
pub struct WienerFilterCurvature {
    response: OpRef,
    noise_inverse: OpRef,
    curvature: OpRef,
}

impl WienerFilterCurvature {
    /// `R† N⁻¹ R + S⁻¹` on the signal domain.
    ///
    /// # Errors
    /// - [`IftError::DomainMismatch`](crate::errors::IftError::DomainMismatch)
    ///   if `N⁻¹` is not endomorphic on `R`'s target or `S` not on `R`'s domain.
    pub fn make(response: OpRef, noise_inverse: OpRef, signal: OpRef, cg: CgOptions) -> IftResult<Self> {
        check_domain(response.domain(), signal.domain())?;
        check_domain(response.domain(), signal.target())?;
        let likelihood = SandwichOperator::make(response.clone(), Some(noise_inverse.clone()))?;
        let op = likelihood.plus(&signal.inverse())?;
        let curvature = InversionEnabler::new(op, cg)?.with_preconditioner(signal)?.shared();
        Ok(Self { response, noise_inverse, curvature })
    }

    /// The curvature `D⁻¹`; its inverse is the posterior covariance.
    pub fn operator(&self) -> &OpRef {
        &self.curvature
    }

    /// Information source `j = R† N⁻¹ d`.
    pub fn information_source(&self, data: &Field) -> IftResult<Field> {
        self.response.adjoint_times(&self.noise_inverse.times(data)?)
    }

    /// Posterior mean `D j`.
    ///
    /// # Errors
    /// - [`IftError::SolverNonConvergence`](crate::errors::IftError::SolverNonConvergence)
    ///   if CG does not reach its tolerance.
    pub fn mean(&self, data: &Field) -> IftResult<Field> {
        let j = self.information_source(data)?;
        debug!("Wiener filter: |j| = {:.3e}", j.norm());
        self.curvature.inverse_times(&j)
    }

    /// Draw from the posterior `N(mean, D)`.
    pub fn posterior_sample(&self, mean: &Field, rng: &mut IftRng) -> IftResult<Field> {
        mean.add(&self.curvature.draw_sample(true, rng)?)
    }
}
