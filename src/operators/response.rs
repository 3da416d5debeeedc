//! operators::response — operators mapping signal space to data space.
//!
//! - [`MaskOperator`]: keep a subset of pixels; adjoint scatters back with zeros.
//! - [`MatrixOperator`]: explicit small response matrix.
//! - [`GeometryRemover`]: reinterpret a structured domain as a flat data vector.
use ndarray::Array2;

use crate::{
    domain::{Domain, DomainRef},
    errors::{IftError, IftResult},
    field::Field,
    operators::traits::{Capability, LinearOperator, Mode},
};

/// Select the pixels whose flag is `true`.
#[derive(Debug, Clone)]
pub struct MaskOperator {
    domain: DomainRef,
    target: DomainRef,
    keep: Vec<usize>,
}

impl MaskOperator {
    /// # Errors
    /// - [`IftError::ShapeMismatch`] if `flags` does not cover the domain.
    pub fn new(domain: DomainRef, flags: &[bool]) -> IftResult<Self> {
        if flags.len() != domain.size() {
            return Err(IftError::ShapeMismatch { expected: domain.size(), found: flags.len() });
        }
        let keep: Vec<usize> = flags.iter().enumerate().filter(|(_, k)| **k).map(|(i, _)| i).collect();
        let target = Domain::unstructured(keep.len());
        Ok(Self { domain, target, keep })
    }
}

impl LinearOperator for MaskOperator {
    fn domain(&self) -> &DomainRef {
        &self.domain
    }

    fn target(&self) -> &DomainRef {
        &self.target
    }

    fn capability(&self) -> Capability {
        Capability::FORWARD
    }

    fn name(&self) -> &'static str {
        "MaskOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        let val = x.val();
        match mode {
            Mode::Times => Field::from_vec(self.target.clone(), self.keep.iter().map(|&i| val[i]).collect()),
            _ => {
                let mut out = vec![0.0; self.domain.size()];
                for (j, &i) in self.keep.iter().enumerate() {
                    out[i] = val[j];
                }
                Field::from_vec(self.domain.clone(), out)
            }
        }
    }
}

/// Dense `target.size() × domain.size()` response.
#[derive(Debug, Clone)]
pub struct MatrixOperator {
    domain: DomainRef,
    target: DomainRef,
    matrix: Array2<f64>,
}

impl MatrixOperator {
    /// # Errors
    /// - [`IftError::ShapeMismatch`] if the matrix does not map domain to target.
    pub fn new(domain: DomainRef, target: DomainRef, matrix: Array2<f64>) -> IftResult<Self> {
        if matrix.ncols() != domain.size() {
            return Err(IftError::ShapeMismatch { expected: domain.size(), found: matrix.ncols() });
        }
        if matrix.nrows() != target.size() {
            return Err(IftError::ShapeMismatch { expected: target.size(), found: matrix.nrows() });
        }
        Ok(Self { domain, target, matrix })
    }
}

impl LinearOperator for MatrixOperator {
    fn domain(&self) -> &DomainRef {
        &self.domain
    }

    fn target(&self) -> &DomainRef {
        &self.target
    }

    fn capability(&self) -> Capability {
        Capability::FORWARD
    }

    fn name(&self) -> &'static str {
        "MatrixOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        match mode {
            Mode::Times => Field::new(self.target.clone(), self.matrix.dot(x.val())),
            _ => Field::new(self.domain.clone(), self.matrix.t().dot(x.val())),
        }
    }
}

/// Identity on values, moving a field from a structured domain onto an
/// unstructured one of the same size.
#[derive(Debug, Clone)]
pub struct GeometryRemover {
    domain: DomainRef,
    target: DomainRef,
}

impl GeometryRemover {
    pub fn new(domain: DomainRef) -> Self {
        let target = Domain::unstructured(domain.size());
        Self { domain, target }
    }
}

impl LinearOperator for GeometryRemover {
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
        "GeometryRemover"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        if mode.input_is_domain() { x.with_domain(self.target.clone()) } else { x.with_domain(self.domain.clone()) }
    }
}
