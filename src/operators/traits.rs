//! operators::traits — the linear-operator contract.
//!
//! Purpose
//! -------
//! Define what every operator promises: a domain, a target, a capability
//! set over the four application modes, and an implementation of the modes
//! it supports. Dense matrices are never formed; operators act on fields.
//!
//! Key behaviors
//! -------------
//! - [`LinearOperator::apply`] checks the capability and the input domain,
//!   dispatches to [`LinearOperator::apply_unchecked`] and rejects
//!   non-finite output before it can travel further.
//! - [`Mode`] and [`Flip`] share a two-bit encoding (`adjoint = 1`,
//!   `inverse = 2`) so flipping a mode is an xor and flips compose.
//! - [`Capability`] is a four-bit set, one bit per mode.
//!
//! Invariants & assumptions
//! ------------------------
//! - `times` maps domain → target, `adjoint_times` target → domain,
//!   `inverse_times` target → domain, `adjoint_inverse_times`
//!   domain → target.
//! - The adjoint satisfies ⟨A x, y⟩ = ⟨x, A† y⟩ up to round-off.
//! - Operators are immutable after construction and shared through
//!   [`OpRef`]; composites hold references to their constituents.
//!
//! Downstream usage
//! ----------------
//! - Build composites with [`crate::operators::OperatorAlgebra`].
//! - Covariance-like operators override [`LinearOperator::draw_sample`].
use std::{
    fmt,
    ops::{BitAnd, BitOr},
    sync::Arc,
};

use crate::{
    domain::{check_domain, DomainRef},
    errors::{IftError, IftResult},
    field::{Field, IftRng},
};

/// Shared handle to an operator.
pub type OpRef = Arc<dyn LinearOperator>;

/// Direction in which an operator is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Times,
    AdjointTimes,
    InverseTimes,
    AdjointInverseTimes,
}

impl Mode {
    pub const ALL: [Mode; 4] =
        [Mode::Times, Mode::AdjointTimes, Mode::InverseTimes, Mode::AdjointInverseTimes];

    fn bits(self) -> u8 {
        match self {
            Mode::Times => 0,
            Mode::AdjointTimes => 1,
            Mode::InverseTimes => 2,
            Mode::AdjointInverseTimes => 3,
        }
    }

    fn from_bits(bits: u8) -> Mode {
        match bits & 3 {
            0 => Mode::Times,
            1 => Mode::AdjointTimes,
            2 => Mode::InverseTimes,
            _ => Mode::AdjointInverseTimes,
        }
    }

    pub fn capability(self) -> Capability {
        Capability(1 << self.bits())
    }

    /// Whether the input of this mode lives on the operator's domain.
    pub fn input_is_domain(self) -> bool {
        matches!(self, Mode::Times | Mode::AdjointInverseTimes)
    }

    pub fn is_inverse(self) -> bool {
        matches!(self, Mode::InverseTimes | Mode::AdjointInverseTimes)
    }

    /// The mode an operator must be applied in to realize `self` on its flip.
    pub fn flipped(self, flip: Flip) -> Mode {
        Mode::from_bits(self.bits() ^ flip.bits())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Times => "times",
            Mode::AdjointTimes => "adjoint_times",
            Mode::InverseTimes => "inverse_times",
            Mode::AdjointInverseTimes => "adjoint_inverse_times",
        };
        write!(f, "{name}")
    }
}

/// Lazy transformation of an operator: adjoint, inverse or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    Adjoint,
    Inverse,
    AdjointInverse,
}

impl Flip {
    fn bits(self) -> u8 {
        match self {
            Flip::Adjoint => 1,
            Flip::Inverse => 2,
            Flip::AdjointInverse => 3,
        }
    }

    /// Combined flip; `None` means the flips cancel.
    pub fn compose(self, other: Flip) -> Option<Flip> {
        match self.bits() ^ other.bits() {
            1 => Some(Flip::Adjoint),
            2 => Some(Flip::Inverse),
            3 => Some(Flip::AdjointInverse),
            _ => None,
        }
    }

    /// Whether domain and target swap under this flip.
    pub fn swaps_spaces(self) -> bool {
        !matches!(self, Flip::AdjointInverse)
    }
}

/// Set of supported modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability(u8);

impl Capability {
    pub const NONE: Capability = Capability(0);
    pub const TIMES: Capability = Capability(1);
    pub const ADJOINT_TIMES: Capability = Capability(2);
    pub const INVERSE_TIMES: Capability = Capability(4);
    pub const ADJOINT_INVERSE_TIMES: Capability = Capability(8);
    /// `times | adjoint_times`
    pub const FORWARD: Capability = Capability(3);
    /// `inverse_times | adjoint_inverse_times`
    pub const INVERSE: Capability = Capability(12);
    pub const ALL: Capability = Capability(15);

    pub fn contains(self, other: Capability) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn supports(self, mode: Mode) -> bool {
        self.contains(mode.capability())
    }

    /// Capability of the flipped operator.
    pub fn flipped(self, flip: Flip) -> Capability {
        Mode::ALL
            .iter()
            .filter(|m| self.supports(**m))
            .fold(Capability::NONE, |acc, m| acc | m.flipped(flip).capability())
    }
}

impl BitOr for Capability {
    type Output = Capability;

    fn bitor(self, rhs: Capability) -> Capability {
        Capability(self.0 | rhs.0)
    }
}

impl BitAnd for Capability {
    type Output = Capability;

    fn bitand(self, rhs: Capability) -> Capability {
        Capability(self.0 & rhs.0)
    }
}

/// A linear map between field domains, applied implicitly.
///
/// Implementors provide the four accessors and `apply_unchecked`; callers
/// use [`apply`](LinearOperator::apply) or the named mode methods, which
/// check capability and domains first.
pub trait LinearOperator: fmt::Debug + Send + Sync {
    fn domain(&self) -> &DomainRef;
    fn target(&self) -> &DomainRef;
    fn capability(&self) -> Capability;
    fn name(&self) -> &'static str;

    /// Apply in `mode`. Capability and input domain are already checked.
    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field>;

    /// Draw a field from the Gaussian whose covariance is this operator
    /// (`from_inverse == false`) or its inverse.
    fn draw_sample(&self, _from_inverse: bool, _rng: &mut IftRng) -> IftResult<Field> {
        Err(IftError::SamplingNotSupported { operator: self.name() })
    }

    /// `Some(α)` if this operator is `α · Identity`.
    fn scaling_factor(&self) -> Option<f64> {
        None
    }

    /// `Some((inner, flip))` if this operator is a lazy flip of `inner`.
    fn flip_parts(&self) -> Option<(&OpRef, Flip)> {
        None
    }

    fn is_endomorphic(&self) -> bool {
        check_domain(self.domain(), self.target()).is_ok()
    }

    /// Checked application.
    ///
    /// # Errors
    /// - [`IftError::CapabilityMissing`] if `mode` is unsupported.
    /// - [`IftError::DomainMismatch`] if `x` is on the wrong domain.
    /// - [`IftError::NonFiniteValue`] if the result contains NaN or infinities.
    /// - Whatever the implementation raises (e.g. `SolverNonConvergence`).
    fn apply(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        if !self.capability().supports(mode) {
            return Err(IftError::CapabilityMissing { operator: self.name(), mode });
        }
        let (input, output) = if mode.input_is_domain() {
            (self.domain(), self.target())
        } else {
            (self.target(), self.domain())
        };
        check_domain(input, x.domain())?;
        let out = self.apply_unchecked(x, mode)?;
        check_domain(output, out.domain())?;
        out.check_finite(self.name())?;
        Ok(out)
    }

    fn times(&self, x: &Field) -> IftResult<Field> {
        self.apply(x, Mode::Times)
    }

    fn adjoint_times(&self, x: &Field) -> IftResult<Field> {
        self.apply(x, Mode::AdjointTimes)
    }

    fn inverse_times(&self, x: &Field) -> IftResult<Field> {
        self.apply(x, Mode::InverseTimes)
    }

    fn adjoint_inverse_times(&self, x: &Field) -> IftResult<Field> {
        self.apply(x, Mode::AdjointInverseTimes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Mode flips under adjoint and inverse.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Flipping modes and capabilities follows the adjoint/inverse algebra.
    //
    // Given
    // -----
    // - Every mode under every flip, and a times-only capability.
    //
    // Expect
    // ------
    // - Adjoint swaps times ↔ adjoint_times, inverse swaps times ↔
    //   inverse_times, flips compose by cancellation.
    // - A times-only operator flipped to its inverse supports only
    //   inverse_times.
    fn flips_follow_operator_algebra() {
        assert_eq!(Mode::Times.flipped(Flip::Adjoint), Mode::AdjointTimes);
        assert_eq!(Mode::InverseTimes.flipped(Flip::Adjoint), Mode::AdjointInverseTimes);
        assert_eq!(Mode::Times.flipped(Flip::Inverse), Mode::InverseTimes);
        assert_eq!(Mode::AdjointTimes.flipped(Flip::AdjointInverse), Mode::InverseTimes);
        assert_eq!(Flip::Adjoint.compose(Flip::Adjoint), None);
        assert_eq!(Flip::Adjoint.compose(Flip::Inverse), Some(Flip::AdjointInverse));
        for mode in Mode::ALL {
            for flip in [Flip::Adjoint, Flip::Inverse, Flip::AdjointInverse] {
                assert_eq!(mode.flipped(flip).flipped(flip), mode);
            }
        }

        assert_eq!(Capability::TIMES.flipped(Flip::Inverse), Capability::INVERSE_TIMES);
        assert_eq!(Capability::FORWARD.flipped(Flip::Adjoint), Capability::FORWARD);
        assert_eq!(Capability::ALL.flipped(Flip::AdjointInverse), Capability::ALL);
    }
}
