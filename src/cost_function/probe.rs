use crate::cost_function::active_jacobian;
use crate::data::Domain;
use crate::error::FunctionError;
use crate::function::FitFunction;

use ndarray::Array2;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Centered finite-difference probe of a function's Jacobian
///
/// Derivative of the Jacobian with respect to a parameter `θ` is estimated as
/// `(J(θ + h) - J(θ - h)) / 2h` with `h = relative_step * |θ|`, or `h = relative_step` when
/// `θ == 0`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct JacobianProbe {
    #[serde(default = "JacobianProbe::default_relative_step")]
    relative_step: f64,
}

impl JacobianProbe {
    pub fn new(relative_step: f64) -> Self {
        assert!(
            relative_step.is_finite() && relative_step > 0.0,
            "relative_step must be positive"
        );
        Self { relative_step }
    }

    #[inline]
    pub fn default_relative_step() -> f64 {
        1e-4
    }

    pub fn relative_step(&self) -> f64 {
        self.relative_step
    }

    pub fn step(&self, x: f64) -> f64 {
        if x == 0.0 {
            self.relative_step
        } else {
            self.relative_step * x.abs()
        }
    }

    /// `∂J/∂θ` for parameter `param`, columns are the `active` parameters
    ///
    /// The parameter is restored afterwards, also on error.
    pub fn jacobian_derivative(
        &self,
        function: &mut dyn FitFunction,
        domain: &Domain,
        active: &[usize],
        param: usize,
    ) -> Result<Array2<f64>, FunctionError> {
        let x = function.parameter(param);
        let h = self.step(x);
        function.set_parameter(param, x + h);
        let plus = active_jacobian(function, domain, active);
        function.set_parameter(param, x - h);
        let minus = active_jacobian(function, domain, active);
        function.set_parameter(param, x);
        Ok((plus? - minus?) / (2.0 * h))
    }
}

impl Default for JacobianProbe {
    fn default() -> Self {
        Self::new(Self::default_relative_step())
    }
}
