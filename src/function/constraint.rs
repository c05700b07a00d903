use enum_dispatch::enum_dispatch;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Penalty attached to a single fit parameter
///
/// The penalty is added to the least-squares cost, its derivatives go to the gradient and to the
/// Hessian diagonal.
#[enum_dispatch]
pub trait ConstraintTrait: Clone + Debug {
    /// Penalty value at `x`
    fn check(&self, x: f64) -> f64;

    /// d(penalty)/dx
    fn first_derivative(&self, x: f64) -> f64;

    /// d²(penalty)/dx²
    fn second_derivative(&self, x: f64) -> f64;
}

/// Parameter constraint
#[enum_dispatch(ConstraintTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[non_exhaustive]
pub enum Constraint {
    Boundary(BoundaryConstraint),
    Gaussian(GaussianConstraint),
}

impl Constraint {
    pub fn boundary(lower: Option<f64>, upper: Option<f64>) -> Self {
        BoundaryConstraint::new(lower, upper, BoundaryConstraint::default_penalty_factor()).into()
    }

    pub fn lower_bound(lower: f64) -> Self {
        Self::boundary(Some(lower), None)
    }

    pub fn upper_bound(upper: f64) -> Self {
        Self::boundary(None, Some(upper))
    }

    pub fn gaussian(centre: f64, width: f64, penalty_factor: f64) -> Self {
        GaussianConstraint::new(centre, width, penalty_factor).into()
    }
}

/// Quadratic penalty outside of `[lower, upper]`, zero inside
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(
    into = "BoundaryConstraintParameters",
    try_from = "BoundaryConstraintParameters"
)]
pub struct BoundaryConstraint {
    lower: Option<f64>,
    upper: Option<f64>,
    penalty_factor: f64,
}

impl BoundaryConstraint {
    pub fn new(lower: Option<f64>, upper: Option<f64>, penalty_factor: f64) -> Self {
        Self::try_new(lower, upper, penalty_factor).unwrap_or_else(|e| panic!("{}", e))
    }

    fn try_new(
        lower: Option<f64>,
        upper: Option<f64>,
        penalty_factor: f64,
    ) -> Result<Self, &'static str> {
        if lower.is_some_and(f64::is_nan) || upper.is_some_and(f64::is_nan) {
            return Err("bounds must be not NaN");
        }
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if lower > upper {
                return Err("lower bound must not exceed upper bound");
            }
        }
        if !(penalty_factor.is_finite() && penalty_factor > 0.0) {
            return Err("penalty factor must be positive and finite");
        }
        Ok(Self {
            lower,
            upper,
            penalty_factor,
        })
    }

    #[inline]
    pub fn default_penalty_factor() -> f64 {
        1000.0
    }

    pub fn lower(&self) -> Option<f64> {
        self.lower
    }

    pub fn upper(&self) -> Option<f64> {
        self.upper
    }

    /// Signed distance to the violated bound, zero inside the interval
    fn violation(&self, x: f64) -> f64 {
        match (self.lower, self.upper) {
            (Some(lower), _) if x < lower => x - lower,
            (_, Some(upper)) if x > upper => x - upper,
            _ => 0.0,
        }
    }
}

impl ConstraintTrait for BoundaryConstraint {
    fn check(&self, x: f64) -> f64 {
        self.penalty_factor * self.violation(x).powi(2)
    }

    fn first_derivative(&self, x: f64) -> f64 {
        2.0 * self.penalty_factor * self.violation(x)
    }

    fn second_derivative(&self, x: f64) -> f64 {
        if self.violation(x) == 0.0 {
            0.0
        } else {
            2.0 * self.penalty_factor
        }
    }
}

#[derive(Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "BoundaryConstraint")]
struct BoundaryConstraintParameters {
    lower: Option<f64>,
    upper: Option<f64>,
    #[serde(default = "BoundaryConstraint::default_penalty_factor")]
    penalty_factor: f64,
}

impl From<BoundaryConstraint> for BoundaryConstraintParameters {
    fn from(c: BoundaryConstraint) -> Self {
        Self {
            lower: c.lower,
            upper: c.upper,
            penalty_factor: c.penalty_factor,
        }
    }
}

impl TryFrom<BoundaryConstraintParameters> for BoundaryConstraint {
    type Error = &'static str;

    fn try_from(p: BoundaryConstraintParameters) -> Result<Self, Self::Error> {
        Self::try_new(p.lower, p.upper, p.penalty_factor)
    }
}

/// Soft pull towards `centre`: `penalty_factor * ((x - centre) / width)²`
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(
    into = "GaussianConstraintParameters",
    try_from = "GaussianConstraintParameters"
)]
pub struct GaussianConstraint {
    centre: f64,
    inv_width2: f64,
    penalty_factor: f64,
}

impl GaussianConstraint {
    pub fn new(centre: f64, width: f64, penalty_factor: f64) -> Self {
        GaussianConstraintParameters {
            centre,
            width,
            penalty_factor,
        }
        .try_into()
        .unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn centre(&self) -> f64 {
        self.centre
    }

    pub fn width(&self) -> f64 {
        self.inv_width2.recip().sqrt()
    }
}

impl ConstraintTrait for GaussianConstraint {
    fn check(&self, x: f64) -> f64 {
        self.penalty_factor * (x - self.centre).powi(2) * self.inv_width2
    }

    fn first_derivative(&self, x: f64) -> f64 {
        2.0 * self.penalty_factor * (x - self.centre) * self.inv_width2
    }

    fn second_derivative(&self, _x: f64) -> f64 {
        2.0 * self.penalty_factor * self.inv_width2
    }
}

#[derive(Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "GaussianConstraint")]
struct GaussianConstraintParameters {
    centre: f64,
    width: f64,
    penalty_factor: f64,
}

impl From<GaussianConstraint> for GaussianConstraintParameters {
    fn from(c: GaussianConstraint) -> Self {
        Self {
            centre: c.centre(),
            width: c.width(),
            penalty_factor: c.penalty_factor,
        }
    }
}

impl TryFrom<GaussianConstraintParameters> for GaussianConstraint {
    type Error = &'static str;

    fn try_from(p: GaussianConstraintParameters) -> Result<Self, Self::Error> {
        if p.centre.is_nan() {
            return Err("centre must be not NaN");
        }
        if !(p.width.is_finite() && p.width > 0.0) {
            return Err("width must be positive and finite");
        }
        if !(p.penalty_factor.is_finite() && p.penalty_factor > 0.0) {
            return Err("penalty factor must be positive and finite");
        }
        Ok(Self {
            centre: p.centre,
            inv_width2: p.width.powi(-2),
            penalty_factor: p.penalty_factor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn check_derivatives(constraint: &Constraint, xs: &[f64]) {
        const EPS: f64 = 1e-6;
        for &x in xs {
            let numeric_first =
                (constraint.check(x + EPS) - constraint.check(x - EPS)) / (2.0 * EPS);
            assert_relative_eq!(
                constraint.first_derivative(x),
                numeric_first,
                epsilon = 1e-5,
                max_relative = 1e-6
            );
            let numeric_second = (constraint.first_derivative(x + EPS)
                - constraint.first_derivative(x - EPS))
                / (2.0 * EPS);
            assert_relative_eq!(
                constraint.second_derivative(x),
                numeric_second,
                epsilon = 1e-5,
                max_relative = 1e-6
            );
        }
    }

    #[test]
    fn boundary_is_zero_inside() {
        let c = Constraint::boundary(Some(-1.0), Some(2.0));
        for x in [-1.0, 0.0, 2.0] {
            assert_eq!(c.check(x), 0.0);
            assert_eq!(c.first_derivative(x), 0.0);
            assert_eq!(c.second_derivative(x), 0.0);
        }
        assert_relative_eq!(c.check(3.0), 1000.0);
        assert_relative_eq!(c.check(-1.5), 250.0);
    }

    #[test]
    fn boundary_derivatives() {
        check_derivatives(&Constraint::boundary(Some(-1.0), Some(2.0)), &[-3.0, 4.5]);
        check_derivatives(&Constraint::lower_bound(0.0), &[-2.0, 1.0]);
        check_derivatives(&Constraint::upper_bound(0.0), &[-2.0, 1.0]);
    }

    #[test]
    fn gaussian_derivatives() {
        let c = Constraint::gaussian(1.0, 0.5, 3.0);
        assert_relative_eq!(c.check(2.0), 12.0);
        check_derivatives(&c, &[-1.0, 0.0, 1.0, 2.5]);
    }

    #[test]
    #[should_panic]
    fn boundary_inverted() {
        let _ = Constraint::boundary(Some(1.0), Some(0.0));
    }

    #[test]
    fn deserialize() {
        let c: Constraint =
            serde_json::from_str(r#"{"Boundary": {"lower": 0.0, "upper": null}}"#).unwrap();
        assert_eq!(c, Constraint::lower_bound(0.0));
        assert!(
            serde_json::from_str::<Constraint>(r#"{"Boundary": {"lower": 1.0, "upper": 0.0}}"#)
                .is_err()
        );
        let gaussian: Constraint = serde_json::from_str(
            r#"{"Gaussian": {"centre": 1.0, "width": 2.0, "penalty_factor": 1.0}}"#,
        )
        .unwrap();
        assert_relative_eq!(gaussian.check(3.0), 1.0);
    }
}
