use crate::cost_function::reduction::{accumulate_weighted_squares, Evaluation, Request, Residuals};
use crate::cost_function::{CostFunctionOptions, CostMeasureTrait, Model};
use crate::error::CostFunctionError;

use macro_const::macro_const;
use ndarray::Zip;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

macro_const! {
    const DOC: &str = r#"
Weighted profile R-factor

Least squares with every weight normalized by the weighted observations,
$$
w'_i = \frac{w_i}{\sqrt{\sum_j \mathrm{obs}_j^2 w_j^2}}.
$$
The normalization is recomputed on every evaluation, before the residual pass. Parameter
penalties are never applied. All-zero weighted observations make the normalization vanish and
the evaluation fails.
"#;
}

#[doc = DOC!()]
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename = "Rwp")]
pub struct RwpCost;

impl RwpCost {
    pub const fn doc() -> &'static str {
        DOC
    }

    /// `Σ obs² w²` over points with non-zero weight
    pub fn normalization(residuals: &Residuals<'_>) -> f64 {
        Zip::from(&residuals.observed)
            .and(&residuals.weights)
            .fold(0.0, |acc, &obs, &w| {
                if w == 0.0 { acc } else { acc + (obs * w).powi(2) }
            })
    }
}

impl CostMeasureTrait for RwpCost {
    fn name(&self) -> &'static str {
        "Rwp"
    }

    fn applies_penalty(&self) -> bool {
        false
    }

    fn reduce(
        &self,
        residuals: &Residuals<'_>,
        request: Request,
        options: &CostFunctionOptions,
        _model: &mut Model<'_>,
    ) -> Result<Evaluation, CostFunctionError> {
        let normalization = Self::normalization(residuals);
        if normalization.is_nan() || normalization <= 0.0 {
            return Err(CostFunctionError::DegenerateNormalization);
        }
        let scale = normalization.sqrt().recip();
        let weights = residuals.weights.mapv(|w| w * scale);
        let normalized = Residuals {
            calculated: residuals.calculated.view(),
            observed: residuals.observed.view(),
            weights: weights.view(),
            jacobian: residuals.jacobian.as_ref().map(|j| j.view()),
        };
        Ok(accumulate_weighted_squares(&normalized, request, options))
    }
}
