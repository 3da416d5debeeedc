//! kl — metric Gaussian variational inference.
//!
//! Purpose
//! -------
//! Approximate the posterior of a [`StandardHamiltonian`](crate::linearization::StandardHamiltonian)
//! by a Gaussian whose covariance is the inverse Fisher metric at its mean,
//! and optimize that mean against a sampled KL divergence.
//!
//! Key behaviors
//! -------------
//! - [`ResidualSampleList`]: residuals around a mean, mirrored or not, with
//!   sample statistics across workers.
//! - [`MetricGaussianKL`]: the sampled KL as an [`Energy`](crate::energy::Energy).
//! - [`optimize_kl`]: the outer draw/minimize loop.
//! - [`diagnostics`]: reduced χ² of reconstructions.
pub mod diagnostics;
pub mod metric_gaussian_kl;
pub mod optimize;
pub mod samples;

pub use self::diagnostics::{reduced_chi_square, sample_reduced_chi_square, ChiSquareReport};
pub use self::metric_gaussian_kl::{draw_residual, KlOptions, MetricGaussianKL, SampledMetric};
pub use self::optimize::{optimize_kl, KlRunOutcome, OptimizeKlOptions};
pub use self::samples::ResidualSampleList;
