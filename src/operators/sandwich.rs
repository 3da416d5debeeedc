//! operators::sandwich — `B† C B` with sampling support.
//!
//! Gaussian likelihood metrics have this shape: `B` is the Jacobian of the
//! response, `C` the inverse noise covariance. Keeping the factors lets
//! the operator draw samples with covariance `B† C B` as `B† ξ_C` without
//! any inversion.
use std::sync::Arc;

use crate::{
    domain::{check_domain, DomainRef},
    errors::{IftError, IftResult},
    field::{Field, IftRng},
    operators::{
        algebra::OperatorAlgebra,
        traits::{Capability, LinearOperator, Mode, OpRef},
    },
};

#[derive(Debug, Clone)]
pub struct SandwichOperator {
    bun: OpRef,
    cheese: Option<OpRef>,
    op: OpRef,
}

impl SandwichOperator {
    /// Build `bun† ∘ cheese ∘ bun`, or `bun† ∘ bun` without cheese.
    ///
    /// Pure scalings come back as a scaling; everything else is wrapped so
    /// sampling stays available.
    ///
    /// # Errors
    /// - [`IftError::DomainMismatch`] if `cheese` is not endomorphic on the
    ///   bun's target.
    pub fn make(bun: OpRef, cheese: Option<OpRef>) -> IftResult<OpRef> {
        let op = match &cheese {
            Some(c) => {
                check_domain(c.domain(), bun.target())?;
                check_domain(c.target(), bun.target())?;
                bun.adjoint().chain(&c.chain(&bun)?)?
            }
            None => bun.adjoint().chain(&bun)?,
        };
        if op.scaling_factor().is_some() {
            return Ok(op);
        }
        Ok(Arc::new(SandwichOperator { bun, cheese, op }))
    }
}

impl LinearOperator for SandwichOperator {
    fn domain(&self) -> &DomainRef {
        self.op.domain()
    }

    fn target(&self) -> &DomainRef {
        self.op.target()
    }

    fn capability(&self) -> Capability {
        self.op.capability()
    }

    fn name(&self) -> &'static str {
        "SandwichOperator"
    }

    fn apply_unchecked(&self, x: &Field, mode: Mode) -> IftResult<Field> {
        self.op.apply(x, mode)
    }

    fn draw_sample(&self, from_inverse: bool, rng: &mut IftRng) -> IftResult<Field> {
        if from_inverse {
            return Err(IftError::SamplingNotSupported { operator: self.name() });
        }
        let inner = match &self.cheese {
            Some(c) => c.draw_sample(false, rng)?,
            None => Field::standard_normal(self.bun.target().clone(), rng),
        };
        self.bun.adjoint_times(&inner)
    }
}
