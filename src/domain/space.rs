//! domain::space — shape and geometry descriptors that fields live on.
//!
//! Purpose
//! -------
//! Describe *where* a field lives: how many values it carries and, for
//! regular grids, the pixel spacing and whether the grid is a harmonic
//! (Fourier-space) grid. Operators use these descriptors to validate their
//! inputs and outputs at call time.
//!
//! Invariants & assumptions
//! ------------------------
//! - Domains are immutable after construction and compared structurally.
//! - A [`RegularGrid`] has a non-empty shape with non-zero extents and
//!   strictly positive, finite distances, one per axis.
//! - Flat buffers follow row-major (C) order over the grid shape.
//!
//! Conventions
//! -----------
//! - The harmonic partner of a grid with `n` pixels of width `d` along an
//!   axis has `n` pixels of width `1 / (n·d)`; the partner of the partner is
//!   the original grid.
//! - Harmonic grids index frequencies in FFT order: `0, 1, ..., n/2,
//!   -(n - 1)/2, ..., -1` times the harmonic pixel width.
use std::{fmt, sync::Arc};

use crate::errors::{IftError, IftResult};

/// Shared handle to an immutable domain.
pub type DomainRef = Arc<Domain>;

/// Regular Cartesian grid, either in position or in harmonic space.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularGrid {
    shape: Vec<usize>,
    distances: Vec<f64>,
    harmonic: bool,
}

impl RegularGrid {
    /// Build a validated grid.
    ///
    /// # Errors
    /// - [`IftError::InvalidDomain`] for an empty shape, a zero extent, a
    ///   distance count different from the number of axes, or a distance
    ///   that is not finite and positive.
    pub fn new(shape: Vec<usize>, distances: Vec<f64>, harmonic: bool) -> IftResult<Self> {
        if shape.is_empty() {
            return Err(IftError::InvalidDomain { reason: "Grid shape must have at least one axis." });
        }
        if shape.iter().any(|&n| n == 0) {
            return Err(IftError::InvalidDomain { reason: "Grid extents must be positive." });
        }
        if distances.len() != shape.len() {
            return Err(IftError::InvalidDomain {
                reason: "Grid needs exactly one distance per axis.",
            });
        }
        if distances.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(IftError::InvalidDomain {
                reason: "Grid distances must be finite and positive.",
            });
        }
        Ok(Self { shape, distances, harmonic })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    pub fn harmonic(&self) -> bool {
        self.harmonic
    }

    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Harmonic partner of this grid (position ↔ harmonic).
    pub fn codomain(&self) -> Self {
        let distances =
            self.shape.iter().zip(&self.distances).map(|(&n, &d)| 1.0 / (n as f64 * d)).collect();
        Self { shape: self.shape.clone(), distances, harmonic: !self.harmonic }
    }

    /// Length of the wave vector `|k|` for every pixel, in flat order.
    ///
    /// # Errors
    /// - [`IftError::InvalidDomain`] if the grid is not harmonic.
    pub fn k_lengths(&self) -> IftResult<Vec<f64>> {
        if !self.harmonic {
            return Err(IftError::InvalidDomain { reason: "k-lengths require a harmonic grid." });
        }
        let size = self.size();
        let mut out = Vec::with_capacity(size);
        for flat in 0..size {
            let mut rest = flat;
            let mut k2 = 0.0;
            for axis in (0..self.shape.len()).rev() {
                let n = self.shape[axis];
                let index = rest % n;
                rest /= n;
                let freq = if index <= n / 2 { index as f64 } else { index as f64 - n as f64 };
                let k = freq * self.distances[axis];
                k2 += k * k;
            }
            out.push(k2.sqrt());
        }
        Ok(out)
    }
}

/// Shape and geometry of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// A single number. Target domain of every energy.
    Scalar,
    /// Flat data vector without geometry.
    Unstructured { size: usize },
    /// Regular grid in position or harmonic space.
    RegularGrid(RegularGrid),
}

impl Domain {
    pub fn scalar() -> DomainRef {
        Arc::new(Domain::Scalar)
    }

    pub fn unstructured(size: usize) -> DomainRef {
        Arc::new(Domain::Unstructured { size })
    }

    /// Position-space regular grid.
    pub fn regular_grid(shape: Vec<usize>, distances: Vec<f64>) -> IftResult<DomainRef> {
        Ok(Arc::new(Domain::RegularGrid(RegularGrid::new(shape, distances, false)?)))
    }

    /// Harmonic-space regular grid.
    pub fn harmonic_grid(shape: Vec<usize>, distances: Vec<f64>) -> IftResult<DomainRef> {
        Ok(Arc::new(Domain::RegularGrid(RegularGrid::new(shape, distances, true)?)))
    }

    /// Number of values a field on this domain carries.
    pub fn size(&self) -> usize {
        match self {
            Domain::Scalar => 1,
            Domain::Unstructured { size } => *size,
            Domain::RegularGrid(grid) => grid.size(),
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Domain::Scalar => Vec::new(),
            Domain::Unstructured { size } => vec![*size],
            Domain::RegularGrid(grid) => grid.shape().to_vec(),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Domain::Scalar)
    }

    pub fn is_harmonic(&self) -> bool {
        matches!(self, Domain::RegularGrid(grid) if grid.harmonic())
    }

    pub fn as_grid(&self) -> Option<&RegularGrid> {
        match self {
            Domain::RegularGrid(grid) => Some(grid),
            _ => None,
        }
    }

    /// Harmonic partner of a regular grid.
    ///
    /// # Errors
    /// - [`IftError::InvalidDomain`] for domains without harmonic structure.
    pub fn codomain(&self) -> IftResult<DomainRef> {
        match self {
            Domain::RegularGrid(grid) => Ok(Arc::new(Domain::RegularGrid(grid.codomain()))),
            _ => Err(IftError::InvalidDomain { reason: "Only regular grids have a harmonic partner." }),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Scalar => write!(f, "Scalar"),
            Domain::Unstructured { size } => write!(f, "Unstructured({size})"),
            Domain::RegularGrid(grid) => {
                let kind = if grid.harmonic() { "HarmonicGrid" } else { "RegularGrid" };
                write!(f, "{kind}(shape={:?}, distances={:?})", grid.shape(), grid.distances())
            }
        }
    }
}

/// Check that `found` is the domain an operation expects.
///
/// Pointer equality short-circuits the structural comparison.
///
/// # Errors
/// - [`IftError::DomainMismatch`] naming both domains.
pub fn check_domain(expected: &DomainRef, found: &DomainRef) -> IftResult<()> {
    if Arc::ptr_eq(expected, found) || **expected == **found {
        Ok(())
    } else {
        Err(IftError::DomainMismatch { expected: expected.to_string(), found: found.to_string() })
    }
}
