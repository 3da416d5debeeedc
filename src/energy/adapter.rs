//! energy::adapter — an [`Energy`] backed by a scalar model.
use crate::{
    domain::check_domain,
    energy::Energy,
    errors::{IftError, IftResult},
    field::Field,
    linearization::ModelRef,
    operators::OpRef,
    validation::{validate_gradient, validate_value},
};

/// Evaluates a scalar model at a position, eagerly.
///
/// With `want_metric` the model's metric is kept and returned by
/// [`Energy::metric`]; without it only value and gradient are computed.
#[derive(Debug, Clone)]
pub struct EnergyAdapter {
    model: ModelRef,
    position: Field,
    value: f64,
    gradient: Field,
    metric: Option<OpRef>,
    want_metric: bool,
}

impl EnergyAdapter {
    /// # Errors
    /// - [`IftError::NotScalar`] if the model is not scalar-valued.
    /// - [`IftError::DomainMismatch`] if `position` is not on the model's domain.
    /// - [`IftError::NonFiniteValue`] for a non-finite value or gradient.
    pub fn new(position: Field, model: ModelRef, want_metric: bool) -> IftResult<Self> {
        if !model.target().is_scalar() {
            return Err(IftError::NotScalar { size: model.target().size() });
        }
        check_domain(model.domain(), position.domain())?;
        let lin = model.linearize_at(&position, want_metric)?;
        let value = lin.value()?;
        validate_value("energy value", value)?;
        let gradient = lin.gradient()?;
        validate_gradient(&gradient, &position)?;
        let metric = lin.metric().cloned();
        Ok(Self { model, position, value, gradient, metric, want_metric })
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }
}

impl Energy for EnergyAdapter {
    fn position(&self) -> &Field {
        &self.position
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn gradient(&self) -> &Field {
        &self.gradient
    }

    fn metric(&self) -> IftResult<OpRef> {
        self.metric.clone().ok_or(IftError::InvalidOption {
            name: "want_metric",
            reason: "Energy was evaluated without a metric.",
        })
    }

    fn at(&self, position: Field) -> IftResult<Self> {
        Self::new(position, self.model.clone(), self.want_metric)
    }
}
