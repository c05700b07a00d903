use crate::cost_function::probe::JacobianProbe;
use crate::cost_function::reduction::{reduce_points, Evaluation, Request, Residuals};
use crate::cost_function::{CostFunctionOptions, CostMeasureTrait, Model};
use crate::error::CostFunctionError;

use macro_const::macro_const;
use ndarray::Array1;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

macro_const! {
    const DOC: &str = r#"
Poisson deviance

$$
\mathrm{cost} = 2 \sum_i d(p_i, o_i),
$$
where $p_i$ is the prediction and $o_i$ is the observed count:
- $d = +\infty$ for $p \le 0$,
- $d = (\varepsilon - p) / p$ for $0 < p \le \varepsilon$, $\varepsilon = 10^{-4}$,
- $d = p$ for $o = 0$,
- $d = p - o + o (\ln o - \ln p)$ otherwise.

Fit weights only mask points: points of zero weight are skipped. The Hessian includes the
second derivatives of the model, estimated with a centered finite-difference probe of the
Jacobian. Parameter penalties are never applied.
"#;
}

#[doc = DOC!()]
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename = "Poisson")]
pub struct PoissonCost {
    #[serde(default)]
    probe: JacobianProbe,
}

/// Deviance term and its first and second derivatives with respect to the prediction
#[derive(Clone, Copy, Debug, PartialEq)]
struct Deviance {
    value: f64,
    first: f64,
    second: f64,
}

impl PoissonCost {
    /// Predictions below this value are treated with a smooth barrier
    pub const EPSILON: f64 = 1e-4;

    pub fn new(probe: JacobianProbe) -> Self {
        Self { probe }
    }

    pub const fn doc() -> &'static str {
        DOC
    }

    pub fn probe(&self) -> &JacobianProbe {
        &self.probe
    }

    /// `None` for a non-positive prediction, which makes the cost infinite
    fn deviance(predicted: f64, observed: f64) -> Option<Deviance> {
        let p = predicted;
        let o = observed;
        if p <= 0.0 {
            None
        } else if p <= Self::EPSILON {
            Some(Deviance {
                value: (Self::EPSILON - p) / p,
                first: -Self::EPSILON / (p * p),
                second: 2.0 * Self::EPSILON / (p * p * p),
            })
        } else if o == 0.0 {
            Some(Deviance {
                value: p,
                first: 1.0,
                second: 0.0,
            })
        } else {
            Some(Deviance {
                value: (p - o) + o * (o.ln() - p.ln()),
                first: 1.0 - o / p,
                second: o / (p * p),
            })
        }
    }

    /// `None` for a masked point, `Some(None)` for a non-positive prediction at any point
    fn point_deviance(residuals: &Residuals<'_>, i: usize) -> Option<Option<Deviance>> {
        match Self::deviance(residuals.calculated[i], residuals.observed[i]) {
            Some(_) if residuals.weights[i] == 0.0 => None,
            deviance => Some(deviance),
        }
    }

    /// Add `2 Σ_i d'_i ∂²p_i/∂θ_a∂θ_b` to the lower triangle of the Hessian
    fn add_model_curvature(
        &self,
        residuals: &Residuals<'_>,
        model: &mut Model<'_>,
        evaluation: &mut Evaluation,
    ) -> Result<(), CostFunctionError> {
        let Some(hessian) = &mut evaluation.hessian else {
            return Ok(());
        };
        let first: Array1<f64> = (0..residuals.len())
            .map(|i| match Self::point_deviance(residuals, i) {
                Some(Some(deviance)) => deviance.first,
                _ => 0.0,
            })
            .collect();
        let n_active = model.active.len();
        for (b, &param) in model.active.iter().enumerate() {
            let d_jacobian = self.probe.jacobian_derivative(
                &mut *model.function,
                model.domain,
                model.active,
                param,
            )?;
            let column = d_jacobian.t().dot(&first);
            for a in b..n_active {
                hessian[(a, b)] += 2.0 * column[a];
            }
        }
        Ok(())
    }
}

impl CostMeasureTrait for PoissonCost {
    fn name(&self) -> &'static str {
        "Poisson"
    }

    fn applies_penalty(&self) -> bool {
        false
    }

    fn reduce(
        &self,
        residuals: &Residuals<'_>,
        request: Request,
        options: &CostFunctionOptions,
        model: &mut Model<'_>,
    ) -> Result<Evaluation, CostFunctionError> {
        let mut evaluation = reduce_points(
            residuals.len(),
            residuals.n_params(),
            request,
            options,
            |i, partial| match Self::point_deviance(residuals, i) {
                None => {}
                Some(None) => partial.add_value(f64::INFINITY),
                Some(Some(deviance)) => {
                    partial.add_value(2.0 * deviance.value);
                    if let Some(jacobian) = &residuals.jacobian {
                        partial.add_gradient(2.0 * deviance.first, jacobian.row(i));
                        partial.add_outer_lower(2.0 * deviance.second, jacobian.row(i));
                    }
                }
            },
        );
        if request.hessian {
            self.add_model_curvature(residuals, model, &mut evaluation)?;
        }
        evaluation.mirror_hessian();
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost_function::{CostFunction, CostMeasure};
    use crate::data::{Domain, FunctionValues, PointsDomain};
    use crate::function::{ExpDecay, FitFunction, LinearBackground};
    use crate::tests::{line_cost, numeric_gradient};

    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn exp_decay_cost(counts: &[f64]) -> CostFunction<ExpDecay> {
        let n = counts.len();
        let domain: Domain = PointsDomain::linspace(0.0, 5.0, n).into();
        CostFunction::new(
            CostMeasure::poisson(),
            ExpDecay::new(9.0, 2.2),
            Arc::new(domain),
            Some(FunctionValues::with_unit_weights(counts.to_vec())),
        )
        .unwrap()
    }

    #[test]
    fn deviance_branches() {
        assert_eq!(PoissonCost::deviance(0.0, 1.0), None);
        assert_eq!(PoissonCost::deviance(-1.0, 0.0), None);
        assert_relative_eq!(PoissonCost::deviance(5e-5, 3.0).unwrap().value, 1.0);
        assert_eq!(PoissonCost::deviance(2.5, 0.0).unwrap().value, 2.5);
        assert_eq!(PoissonCost::deviance(4.0, 4.0).unwrap().value, 0.0);
        assert_relative_eq!(
            PoissonCost::deviance(2.0, 4.0).unwrap().value,
            -2.0 + 4.0 * 2.0_f64.ln()
        );
    }

    #[test]
    fn deviance_derivatives() {
        const H: f64 = 1e-7;
        for (p, o) in [(5e-5, 3.0), (2.5, 0.0), (2.0, 4.0), (7.0, 1.0)] {
            let d = PoissonCost::deviance(p, o).unwrap();
            let plus = PoissonCost::deviance(p + H * p, o).unwrap();
            let minus = PoissonCost::deviance(p - H * p, o).unwrap();
            assert_relative_eq!(
                d.first,
                (plus.value - minus.value) / (2.0 * H * p),
                epsilon = 1e-6,
                max_relative = 1e-5
            );
            assert_relative_eq!(
                d.second,
                (plus.first - minus.first) / (2.0 * H * p),
                epsilon = 1e-6,
                max_relative = 1e-5
            );
        }
    }

    #[test]
    fn zero_prediction_is_infinite() {
        // a0 + a1 x vanishes at x = 1
        let mut cost = line_cost(CostMeasure::poisson(), 1.0, -1.0, &[2.0, 1.0, 3.0]);
        assert_eq!(cost.value().unwrap(), f64::INFINITY);
        let mut positive = line_cost(CostMeasure::poisson(), 1.0, 1.0, &[2.0, 1.0, 3.0]);
        assert!(positive.value().unwrap().is_finite());
    }

    #[test]
    fn zero_prediction_at_masked_point_is_infinite() {
        let domain: Domain = PointsDomain::new(vec![0.0, 1.0, 0.5]).into();
        let mut masked = CostFunction::new(
            CostMeasure::poisson(),
            LinearBackground::new(1.0, -1.0),
            Arc::new(domain),
            Some(FunctionValues::with_fit_data(vec![2.0, 1.0, 3.0], vec![1.0, 0.0, 1.0])),
        )
        .unwrap();
        assert_eq!(masked.value().unwrap(), f64::INFINITY);

        // a masked point with a positive prediction is skipped
        let domain: Domain = PointsDomain::new(vec![0.0, 0.25, 0.5]).into();
        let mut cost = CostFunction::new(
            CostMeasure::poisson(),
            LinearBackground::new(1.0, -1.0),
            Arc::new(domain),
            Some(FunctionValues::with_fit_data(vec![1.0, f64::NAN, 0.5], vec![1.0, 0.0, 1.0])),
        )
        .unwrap();
        assert_relative_eq!(cost.value().unwrap(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn exact_counts_have_zero_cost() {
        let mut cost = line_cost(CostMeasure::poisson(), 1.0, 2.0, &[1.0, 3.0, 5.0]);
        assert_relative_eq!(cost.value().unwrap(), 0.0, epsilon = 1e-14);
        for g in cost.gradient().unwrap() {
            assert_relative_eq!(g, 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn gradient_matches_numeric() {
        let mut cost = exp_decay_cost(&[10.0, 7.0, 4.0, 4.0, 1.0, 2.0, 0.0, 1.0]);
        let analytic = cost.gradient().unwrap();
        let numeric = numeric_gradient(&mut cost, 1e-6);
        for (a, n) in analytic.iter().zip(numeric.iter()) {
            assert_relative_eq!(a, n, max_relative = 1e-5);
        }
    }

    #[test]
    fn hessian_matches_numeric_gradient_differences() {
        let mut cost = exp_decay_cost(&[10.0, 7.0, 4.0, 4.0, 1.0, 2.0, 0.0, 1.0]);
        let hessian = cost.hessian().unwrap();
        assert_eq!(hessian[(0, 1)], hessian[(1, 0)]);

        let x0 = cost.parameters();
        for b in 0..x0.len() {
            let h = 1e-5 * x0[b].abs();
            let mut plus = x0.clone();
            plus[b] += h;
            cost.set_parameters(&plus).unwrap();
            let g_plus = cost.gradient().unwrap();
            let mut minus = x0.clone();
            minus[b] -= h;
            cost.set_parameters(&minus).unwrap();
            let g_minus = cost.gradient().unwrap();
            for a in 0..x0.len() {
                assert_relative_eq!(
                    hessian[(a, b)],
                    (g_plus[a] - g_minus[a]) / (2.0 * h),
                    epsilon = 1e-6,
                    max_relative = 1e-4
                );
            }
        }
    }

    #[test]
    fn hessian_probe_restores_parameters() {
        let mut cost = exp_decay_cost(&[3.0, 2.0, 1.0]);
        cost.hessian().unwrap();
        assert_eq!(cost.function().parameters().values(), &[9.0, 2.2]);
        assert_eq!(cost.function().parameter(1), 2.2);
    }

    #[test]
    fn linear_model_hessian_has_no_curvature_term() {
        // second derivatives of a linear model vanish, only Σ d'' J J^T remains
        let mut cost = line_cost(CostMeasure::poisson(), 1.0, 1.0, &[2.0, 1.0, 4.0]);
        let hessian = cost.hessian().unwrap();
        let mut expected = [[0.0; 2]; 2];
        for (x, o) in [(0.0, 2.0), (1.0, 1.0), (2.0, 4.0)] {
            let p = 1.0 + x;
            let second = o / (p * p);
            let j = [1.0, x];
            for a in 0..2 {
                for b in 0..2 {
                    expected[a][b] += 2.0 * second * j[a] * j[b];
                }
            }
        }
        for a in 0..2 {
            for b in 0..2 {
                assert_relative_eq!(hessian[(a, b)], expected[a][b], max_relative = 1e-6);
            }
        }
    }
}
