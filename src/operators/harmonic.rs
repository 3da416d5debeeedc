//! operators::harmonic — orthonormal Hartley transform between a harmonic
//! grid and its position-space partner.
//!
//! Purpose
//! -------
//! Change basis between harmonic and position space without a solver. The
//! transform is the real Hartley transform
//! `H[k] = N^{-1/2} Σₓ f[x] cas(2π k·x / N)`, `cas = cos + sin`, evaluated
//! as `Re F − Im F` of an FFT along every axis.
//!
//! Key behaviors
//! -------------
//! - With the `N^{-1/2}` normalization the transform is symmetric and its
//!   own inverse, so all four modes apply the same map; only the input and
//!   output domains differ.
//! - FFT plans are built once per axis at construction (`rustfft`).
//!
//! Invariants & assumptions
//! ------------------------
//! - The domain is a harmonic [`RegularGrid`](crate::domain::RegularGrid);
//!   the target is its codomain.
//! - Buffers are row-major over the grid shape.
use std::{fmt, sync::Arc};

use ndarray::{ArrayD, Axis, IxDyn};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::{
    domain::DomainRef,
    errors::{IftError, IftResult},
    field::Field,
    operators::traits::{Capability, LinearOperator, Mode},
};

pub struct HarmonicTransformOperator {
    domain: DomainRef,
    target: DomainRef,
    shape: Vec<usize>,
    plans: Vec<Arc<dyn Fft<f64>>>,
}

impl fmt::Debug for HarmonicTransformOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarmonicTransformOperator")
            .field("domain", &self.domain)
            .field("target", &self.target)
            .finish()
    }
}

impl HarmonicTransformOperator {
    /// Transform from `harmonic` to its position-space partner.
    ///
    /// # Errors
    /// - [`IftError::InvalidDomain`] if `harmonic` is not a harmonic grid.
    pub fn new(harmonic: DomainRef) -> IftResult<Self> {
        if !harmonic.is_harmonic() {
            return Err(IftError::InvalidDomain { reason: "Harmonic transforms start on a harmonic grid." });
        }
        let target = harmonic.codomain()?;
        let shape = harmonic.shape();
        let mut planner = FftPlanner::<f64>::new();
        let plans = shape.iter().map(|&n| planner.plan_fft_forward(n)).collect();
        Ok(Self { domain: harmonic, target, shape, plans })
    }

    fn hartley(&self, x: &Field, out_domain: &DomainRef) -> IftResult<Field> {
        let values: Vec<Complex64> = x.val().iter().map(|&v| Complex64::new(v, 0.0)).collect();
        let mut data = ArrayD::from_shape_vec(IxDyn(&self.shape), values)
            .map_err(|_| IftError::ShapeMismatch { expected: self.domain.size(), found: x.size() })?;
        for (axis, plan) in self.plans.iter().enumerate() {
            let mut buffer = vec![Complex64::new(0.0, 0.0); self.shape[axis]];
            for mut lane in data.lanes_mut(Axis(axis)) {
                for (b, v) in buffer.iter_mut().zip(lane.iter()) {
                    *b = *v;
                }
                plan.process(&mut buffer);
                for (v, b) in lane.iter_mut().zip(buffer.iter()) {
                    *v = *b;
                }
            }
        }
        let norm = 1.0 / (self.domain.size() as f64).sqrt();
        let out = data.iter().map(|c| (c.re - c.im) * norm).collect();
        Field::from_vec(out_domain.clone(), out)
    }
}

impl LinearOperator for HarmonicTransformOperator {
    fn domain(&self) -> &DomainRef {
        &self.domain
    }

    fn target(&self) -> &DomainRef {
        &self.target
    }

    fn capability(&self) -> Capability {
        Capability::ALL
    }

    fn name(&self) -> &'static str {
        "HarmonicTransformOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        let out = if mode.input_is_domain() { &self.target } else { &self.domain };
        self.hartley(x, out)
    }
}
