//! rust_ift — information field theory: implicit operators, automatic
//! differentiation and variational inference for fields.
//!
//! Purpose
//! -------
//! Reconstruct signals defined on discretized spaces from noisy, incomplete
//! data. Priors, responses and noise are expressed as implicit linear and
//! nonlinear operators; posteriors are explored by minimization and by
//! metric Gaussian variational inference (MGVI).
//!
//! Key behaviors
//! -------------
//! - [`domain`] and [`field`] describe spaces and the values living on them.
//! - [`operators`] provides implicit linear operators with capability-checked
//!   application modes, a lazy operator algebra and CG-backed inversion.
//! - [`linearization`] carries values together with Jacobians so gradients
//!   of composite models come from a single adjoint application.
//! - [`energy`] and [`minimization`] define scalar objectives and the
//!   minimizers that drive them (descent methods, trust-region Newton-CG,
//!   nonlinear CG, argmin's L-BFGS).
//! - [`kl`] implements the sampled KL divergence, its sample bookkeeping and
//!   the outer MGVI loop; [`parallel`] shards samples across workers.
//! - [`library`] contains ready-made posteriors such as the Wiener filter.
//!
//! Invariants & assumptions
//! ------------------------
//! - Fields are real-valued and immutable; operations return new fields.
//! - Domain compatibility is checked at every operator application and
//!   arithmetic operation; mismatches are errors, never broadcasts.
//! - Randomness enters only through explicitly seeded ChaCha8 streams, so
//!   every sampling step is reproducible.
//!
//! Conventions
//! -----------
//! - Fallible operations return [`errors::IftResult`]; there is a single
//!   crate-wide error enum.
//! - Progress and non-fatal anomalies are reported through the `log`
//!   facade; the crate never installs a logger itself.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to the code; end-to-end scenarios (Wiener filter,
//!   energy additivity, MGVI) live under `tests/`.
//! - [`utils`] offers adjoint, inverse and linearity checks that downstream
//!   operator implementations can reuse in their own tests.
pub mod domain;
pub mod energy;
pub mod errors;
pub mod field;
pub mod kl;
pub mod library;
pub mod linearization;
pub mod minimization;
pub mod operators;
pub mod parallel;
pub mod solvers;
pub mod utils;
pub mod validation;

pub use crate::domain::{Domain, DomainRef};
pub use crate::errors::{IftError, IftResult};
pub use crate::field::Field;
pub use crate::operators::{LinearOperator, OpRef};
