//! errors — crate-wide error type for field inference.
//!
//! Purpose
//! -------
//! Collect every failure mode of the operator algebra, the iterative
//! solvers, the minimizers and the variational-inference layer into one
//! enum so callers can match on a single type and `?` works across module
//! boundaries.
//!
//! Key behaviors
//! -------------
//! - [`IftError`] groups variants by area (domains and fields, operators,
//!   solvers, options, checks, parallel, argmin wrappers).
//! - [`IftResult<T>`] is the result alias used throughout the crate.
//! - `From<argmin::core::Error>` downcasts argmin's own error kinds and
//!   keeps anything else as [`IftError::BackendError`].
//!
//! Conventions
//! -----------
//! - Errors carry the offending value and a short static reason where that
//!   helps debugging; they never carry whole fields.
//! - Non-convergence of the conjugate-gradient solver is a *status* first
//!   (`ConvergenceStatus::IterationLimit`) and becomes
//!   [`IftError::SolverNonConvergence`] only where a caller requires a
//!   converged solve (operator inversion, sample drawing).
use argmin::core::{ArgminError, Error};

use crate::operators::Mode;

/// Crate-wide result alias.
pub type IftResult<T> = Result<T, IftError>;

#[derive(Debug, Clone, PartialEq)]
pub enum IftError {
    // ---- Domains and fields ----
    /// Operator input or operand lives on a different domain.
    DomainMismatch {
        expected: String,
        found: String,
    },
    /// Buffer length does not match the domain size.
    ShapeMismatch {
        expected: usize,
        found: usize,
    },
    /// Domain parameters are invalid (empty shape, non-positive distances, ...).
    InvalidDomain {
        reason: &'static str,
    },
    /// A scalar was requested from a field that is not on the scalar domain.
    NotScalar {
        size: usize,
    },
    /// NaN or infinity detected.
    NonFiniteValue {
        context: &'static str,
        index: usize,
        value: f64,
    },

    // ---- Operators ----
    /// The operator does not support the requested application mode.
    CapabilityMissing {
        operator: &'static str,
        mode: Mode,
    },
    /// Inversion of an operator with a zero entry.
    SingularOperator {
        operator: &'static str,
        index: usize,
    },
    /// The operator cannot draw samples in the requested direction.
    SamplingNotSupported {
        operator: &'static str,
    },
    /// Negative or zero curvature where a positive definite operator was assumed.
    NotPositiveDefinite {
        context: &'static str,
        value: f64,
    },

    // ---- Solvers and minimizers ----
    /// Conjugate gradient did not reach its tolerance within the iteration cap.
    SolverNonConvergence {
        iterations: usize,
        residual_norm: f64,
        tolerance: f64,
    },
    /// Line search or step repeatedly rejected.
    MinimizationStalled {
        iterations: usize,
        value: f64,
        reason: &'static str,
    },

    // ---- Options ----
    /// Tolerances need to be finite and positive.
    InvalidTolerance {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    /// Iteration limits need to be positive.
    InvalidIterationLimit {
        name: &'static str,
        value: usize,
        reason: &'static str,
    },
    /// At least one stopping rule must be provided.
    NoStoppingRule,
    /// Any other invalid option value.
    InvalidOption {
        name: &'static str,
        reason: &'static str,
    },
    /// Invalid line searcher or beta rule name.
    InvalidLineSearch {
        name: String,
        reason: &'static str,
    },

    // ---- Checks ----
    /// An operator failed a consistency check.
    ConsistencyViolated {
        check: &'static str,
        lhs: f64,
        rhs: f64,
    },
    /// Analytic and numerical derivatives disagree.
    JacobianInconsistent {
        max_error: f64,
        tolerance: f64,
    },

    // ---- Parallel ----
    /// A collective operation could not complete.
    CommunicationFailed {
        reason: &'static str,
    },

    // ---- Argmin ----
    /// Wrapper for argmin::InvalidParameter
    InvalidParameter {
        text: String,
    },
    /// Wrapper for argmin::NotImplemented
    NotImplemented {
        text: String,
    },
    /// Wrapper for argmin::NotInitialized
    NotInitialized {
        text: String,
    },
    /// Wrapper for argmin::ConditionViolated
    ConditionViolated {
        text: String,
    },
    /// Wrapper for argmin::PotentialBug
    PotentialBug {
        text: String,
    },
    /// Wrapper for other argmin::Error types
    BackendError {
        text: String,
    },

    // ---- Fallback ----
    UnknownError,
}

impl std::error::Error for IftError {}

impl std::fmt::Display for IftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Domains and fields ----
            IftError::DomainMismatch { expected, found } => {
                write!(f, "Domain mismatch: expected {expected}, found {found}")
            }
            IftError::ShapeMismatch { expected, found } => {
                write!(f, "Shape mismatch: expected {expected} values, found {found}")
            }
            IftError::InvalidDomain { reason } => write!(f, "Invalid domain: {reason}"),
            IftError::NotScalar { size } => {
                write!(f, "Expected a scalar field, found a field with {size} values")
            }
            IftError::NonFiniteValue { context, index, value } => {
                write!(f, "Non-finite value {value} at index {index} in {context}")
            }

            // ---- Operators ----
            IftError::CapabilityMissing { operator, mode } => {
                write!(f, "{operator} does not support {mode}")
            }
            IftError::SingularOperator { operator, index } => {
                write!(f, "{operator} is singular: zero entry at index {index}")
            }
            IftError::SamplingNotSupported { operator } => {
                write!(f, "{operator} cannot draw samples in this direction")
            }
            IftError::NotPositiveDefinite { context, value } => {
                write!(f, "Operator not positive definite in {context}: curvature {value}")
            }

            // ---- Solvers and minimizers ----
            IftError::SolverNonConvergence { iterations, residual_norm, tolerance } => {
                write!(
                    f,
                    "Conjugate gradient did not converge after {iterations} iterations: \
                     residual norm {residual_norm:e}, tolerance {tolerance:e}"
                )
            }
            IftError::MinimizationStalled { iterations, value, reason } => {
                write!(f, "Minimization stalled after {iterations} iterations at energy {value}: {reason}")
            }

            // ---- Options ----
            IftError::InvalidTolerance { name, value, reason } => {
                write!(f, "Invalid tolerance {name} = {value}: {reason}")
            }
            IftError::InvalidIterationLimit { name, value, reason } => {
                write!(f, "Invalid iteration limit {name} = {value}: {reason}")
            }
            IftError::NoStoppingRule => write!(f, "No stopping rule provided"),
            IftError::InvalidOption { name, reason } => write!(f, "Invalid option {name}: {reason}"),
            IftError::InvalidLineSearch { name, reason } => {
                write!(f, "Invalid line search '{name}': {reason}")
            }

            // ---- Checks ----
            IftError::ConsistencyViolated { check, lhs, rhs } => {
                write!(f, "Consistency check '{check}' failed: {lhs} != {rhs}")
            }
            IftError::JacobianInconsistent { max_error, tolerance } => {
                write!(f, "Jacobian inconsistent: max error {max_error:e} exceeds {tolerance:e}")
            }

            // ---- Parallel ----
            IftError::CommunicationFailed { reason } => {
                write!(f, "Collective communication failed: {reason}")
            }

            // ---- Argmin ----
            IftError::InvalidParameter { text } => write!(f, "Invalid parameter: {text}"),
            IftError::NotImplemented { text } => write!(f, "Not implemented: {text}"),
            IftError::NotInitialized { text } => write!(f, "Not initialized: {text}"),
            IftError::ConditionViolated { text } => write!(f, "Condition violated: {text}"),
            IftError::PotentialBug { text } => write!(f, "Potential bug: {text}"),
            IftError::BackendError { text } => write!(f, "Backend error: {text}"),

            // ---- Fallback ----
            IftError::UnknownError => write!(f, "Unknown error"),
        }
    }
}

impl From<Error> for IftError {
    fn from(original_err: Error) -> Self {
        let original_err = match original_err.downcast::<IftError>() {
            Ok(ift_err) => return ift_err,
            Err(err) => err,
        };
        match original_err.downcast() {
            Ok(argmin_err) => match argmin_err {
                ArgminError::InvalidParameter { text } => IftError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => IftError::NotImplemented { text },
                ArgminError::NotInitialized { text } => IftError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => IftError::ConditionViolated { text },
                ArgminError::PotentialBug { text } => IftError::PotentialBug { text },
                _ => IftError::UnknownError,
            },
            Err(err) => IftError::BackendError { text: err.to_string() },
        }
    }
}
