//! Integration tests for the Wiener filter posterior.
//!
//! Purpose
//! -------
//! - Validate the full linear-Gaussian pipeline: synthetic signal and noise
//!   draws, response application, curvature construction, CG-based
//!   inversion and the posterior mean.
//! - Compare the implicit, matrix-free result against an explicit dense
//!   solve that is small enough to form.
//!
//! Coverage
//! --------
//! - `library::wiener_filter`: curvature, information source, mean and
//!   posterior samples.
//! - `operators`: scaling, diagonal, sandwich, sum, inversion and the
//!   harmonic transform working together.
//! - `utils::dense`: dense materialization and Cholesky solves as the
//!   reference.
//!
//! Exclusions
//! ----------
//! - Nonlinear models and MGVI; see `integration_energy_mgvi.rs`.
//! - Per-operator adjoint and inverse checks; those are unit tests.
use approx::assert_relative_eq;
use rust_ift::{
    domain::{Domain, DomainRef},
    field::{rng_for, Field},
    library::WienerFilterCurvature,
    operators::{DiagonalOperator, HarmonicTransformOperator, LinearOperator, Mode, OpRef, ScalingOperator},
    solvers::CgOptions,
    utils::{solve_spd, to_dense},
};
use std::sync::Arc;

/// Purpose
/// -------
/// Draw a synthetic measurement `d = R s + n` with `s ~ N(0, S)` and
/// white noise `n` of standard deviation `noise_std`.
///
/// Returns
/// -------
/// - `(s, d)`: the true signal and the data.
///
/// Invariants
/// ----------
/// - Signal and noise use separate ChaCha8 streams of the same seed, so the
///   draws are reproducible and independent.
fn synthetic_data(response: &OpRef, signal: &OpRef, noise_std: f64, seed: u64) -> (Field, Field) {
    let s = signal.draw_sample(false, &mut rng_for(seed, 0)).expect("signal covariance should support sampling");
    let n = Field::standard_normal(response.target().clone(), &mut rng_for(seed, 1)).scale(noise_std);
    let d = response.times(&s).expect("response should apply to the signal").add(&n).expect("noise on data domain");
    (s, d)
}

/// Purpose
/// -------
/// Reference posterior mean by an explicit dense Cholesky solve of
/// `D⁻¹ m = j`.
fn dense_mean(wf: &WienerFilterCurvature, data: &Field, domain: &DomainRef) -> Field {
    let matrix = to_dense(wf.operator().as_ref(), Mode::Times).expect("curvature should materialize");
    let j = wf.information_source(data).expect("information source should apply");
    solve_spd(&matrix, &j, domain).expect("curvature should be SPD")
}

fn relative_error(a: &Field, b: &Field) -> f64 {
    a.sub(b).expect("same domain").norm() / b.norm()
}

#[test]
// Purpose
// -------
// The CG posterior mean matches the dense solve for a 64-pixel problem
// with identity response and unit noise.
//
// Given
// -----
// - A 1-D regular grid of 64 pixels, S = diag(2), R = 1, N = 1.
// - Synthetic data from seed 2024; CG tolerance 1e-10.
//
// Expect
// ------
// - Relative error between CG and dense means below 1e-6.
// - Both equal the closed form m = S/(S + N) d = (2/3) d.
fn wiener_filter_mean_matches_dense_solve() {
    let domain = Domain::regular_grid(vec![64], vec![1.0 / 64.0]).expect("valid grid");
    let signal = DiagonalOperator::shared(Field::full(domain.clone(), 2.0));
    let response = ScalingOperator::shared(domain.clone(), 1.0);
    let noise_inverse = ScalingOperator::shared(domain.clone(), 1.0);
    let cg = CgOptions::new(1e-10, 200, 20).expect("valid CG options");
    let wf = WienerFilterCurvature::make(response.clone(), noise_inverse, signal.clone(), cg)
        .expect("curvature should build");
    let (_, data) = synthetic_data(&response, &signal, 1.0, 2024);

    let m = wf.mean(&data).expect("CG should converge");
    let reference = dense_mean(&wf, &data, &domain);

    assert!(relative_error(&m, &reference) < 1e-6);
    for (a, d) in m.val().iter().zip(data.val().iter()) {
        assert_relative_eq!(*a, 2.0 / 3.0 * d, epsilon = 1e-8);
    }
}

#[test]
// Purpose
// -------
// The same agreement holds for a signal with a falling power spectrum
// defined in harmonic space and observed through the harmonic transform.
//
// Given
// -----
// - A 32-pixel harmonic grid, S(k) = 4 / (1 + |k|²), R = HT, N = 0.5.
//
// Expect
// ------
// - Relative error between CG and dense means below 1e-6, and the
//   reconstruction closer to the truth than the data back-transformed.
fn harmonic_prior_mean_matches_dense_solve() {
    let harmonic = Domain::harmonic_grid(vec![32], vec![1.0]).expect("valid harmonic grid");
    let signal: OpRef = Arc::new(
        DiagonalOperator::from_spectrum(harmonic.clone(), |k| 4.0 / (1.0 + k * k)).expect("harmonic spectrum"),
    );
    let ht: OpRef = Arc::new(HarmonicTransformOperator::new(harmonic.clone()).expect("transform should build"));
    let noise_inverse = ScalingOperator::shared(ht.target().clone(), 2.0);
    let cg = CgOptions::new(1e-12, 200, 20).expect("valid CG options");
    let wf = WienerFilterCurvature::make(ht.clone(), noise_inverse, signal.clone(), cg)
        .expect("curvature should build");
    let (truth, data) = synthetic_data(&ht, &signal, 0.5f64.sqrt(), 7);

    let m = wf.mean(&data).expect("CG should converge");
    let reference = dense_mean(&wf, &data, &harmonic);

    assert!(relative_error(&m, &reference) < 1e-6);
    let naive = ht.adjoint_times(&data).expect("adjoint transform");
    assert!(m.sub(&truth).expect("same domain").norm() < naive.sub(&truth).expect("same domain").norm());
}

#[test]
// Purpose
// -------
// Posterior samples scatter around the mean with the posterior variance.
//
// Given
// -----
// - 2048 pixels, S = 2, R = 1, N = 1: posterior variance 2/3.
//
// Expect
// ------
// - Pixel variance of (sample − mean) within 0.05 of 2/3.
fn posterior_samples_have_wiener_variance() {
    let domain = Domain::unstructured(2048);
    let signal = DiagonalOperator::shared(Field::full(domain.clone(), 2.0));
    let unit = ScalingOperator::shared(domain.clone(), 1.0);
    let wf = WienerFilterCurvature::make(unit.clone(), unit.clone(), signal.clone(), CgOptions::default())
        .expect("curvature should build");
    let (_, data) = synthetic_data(&unit, &signal, 1.0, 11);
    let m = wf.mean(&data).expect("CG should converge");

    let sample = wf.posterior_sample(&m, &mut rng_for(11, 2)).expect("posterior sampling");
    let residual = sample.sub(&m).expect("same domain");

    let var = residual.vdot(&residual).expect("same domain") / residual.size() as f64;
    assert_relative_eq!(var, 2.0 / 3.0, epsilon = 0.05);
}
