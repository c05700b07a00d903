use crate::cost_function::reduction::{accumulate_weighted_squares, Evaluation, Request, Residuals};
use crate::cost_function::{CostFunctionOptions, CostMeasureTrait, Model};
use crate::error::CostFunctionError;

use macro_const::macro_const;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

macro_const! {
    const DOC: &str = r#"
Weighted least squares

$$
\mathrm{cost} = f \sum_i w_i^2 (\mathrm{calc}_i - \mathrm{obs}_i)^2,
$$
where $f$ is the `factor` option (0.5 by default) and $w_i$ are fit weights, inverse
uncertainties of the observations. The Hessian is the Gauss-Newton approximation
$2 f \sum_i w_i^2 J_i J_i^T$. Penalties of constrained parameters are added to the value, the
gradient and the Hessian diagonal.
"#;
}

#[doc = DOC!()]
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename = "LeastSquares")]
pub struct LeastSquaresCost;

impl LeastSquaresCost {
    pub const fn doc() -> &'static str {
        DOC
    }
}

impl CostMeasureTrait for LeastSquaresCost {
    fn name(&self) -> &'static str {
        "Least squares"
    }

    fn applies_penalty(&self) -> bool {
        true
    }

    fn reduce(
        &self,
        residuals: &Residuals<'_>,
        request: Request,
        options: &CostFunctionOptions,
        _model: &mut Model<'_>,
    ) -> Result<Evaluation, CostFunctionError> {
        Ok(accumulate_weighted_squares(residuals, request, options))
    }
}
