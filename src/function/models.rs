use crate::data::{Domain, DomainTrait, FunctionValues, Jacobian};
use crate::error::FunctionError;
use crate::function::constraint::Constraint;
use crate::function::parameters::ParameterSet;
use crate::function::FitFunction;

use ndarray::Zip;
use num_traits::Float;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Analytic model of a single abscissa value
///
/// `model` is generic over the float type so derivatives can be checked with dual numbers.
pub trait PointModel: Debug + Send + Sync + 'static {
    const NAME: &'static str;
    const PARAMETER_NAMES: &'static [&'static str];

    fn model<U: Float>(x: U, params: &[U]) -> U;

    /// ∂model/∂params
    fn derivatives(x: f64, params: &[f64], jac: &mut [f64]);
}

/// [FitFunction] evaluating a [PointModel] on a [PointsDomain](crate::PointsDomain)
#[derive(Clone, Debug, PartialEq)]
pub struct PointFunction<M> {
    parameters: ParameterSet,
    model: PhantomData<M>,
}

impl<M> PointFunction<M>
where
    M: PointModel,
{
    pub fn with_parameters(values: &[f64]) -> Self {
        assert_eq!(
            values.len(),
            M::PARAMETER_NAMES.len(),
            "{} requires {} parameters",
            M::NAME,
            M::PARAMETER_NAMES.len(),
        );
        Self {
            parameters: ParameterSet::new(M::PARAMETER_NAMES, values),
            model: PhantomData,
        }
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    pub fn fix(mut self, name: &str) -> Self {
        let index = self.index_of(name);
        self.parameters.fix(index);
        self
    }

    pub fn constrain(mut self, name: &str, constraint: Constraint) -> Self {
        let index = self.index_of(name);
        self.parameters.set_constraint(index, constraint);
        self
    }

    fn index_of(&self, name: &str) -> usize {
        self.parameters
            .index_of(name)
            .unwrap_or_else(|| panic!("{} has no parameter {:?}", M::NAME, name))
    }
}

impl<M> FitFunction for PointFunction<M>
where
    M: PointModel,
{
    fn n_params(&self) -> usize {
        self.parameters.len()
    }

    fn parameter_name(&self, index: usize) -> String {
        self.parameters.name(index).to_owned()
    }

    fn parameter(&self, index: usize) -> f64 {
        self.parameters.value(index)
    }

    fn set_parameter(&mut self, index: usize, value: f64) {
        self.parameters.set_value(index, value);
    }

    fn is_active(&self, index: usize) -> bool {
        self.parameters.is_active(index)
    }

    fn constraint(&self, index: usize) -> Option<&Constraint> {
        self.parameters.constraint(index)
    }

    fn function(&self, domain: &Domain, values: &mut FunctionValues) -> Result<(), FunctionError> {
        let points = domain
            .as_points()
            .ok_or(FunctionError::UnsupportedDomain(M::NAME))?;
        if values.size() != domain.size() {
            return Err(FunctionError::SizeMismatch {
                domain: domain.size(),
                values: values.size(),
            });
        }
        let params = self.parameters.values();
        Zip::from(values.calculated_mut())
            .and(points.x())
            .for_each(|y, &x| *y = M::model(x, params));
        Ok(())
    }

    fn function_deriv(
        &mut self,
        domain: &Domain,
        jacobian: &mut dyn Jacobian,
    ) -> Result<(), FunctionError> {
        let points = domain
            .as_points()
            .ok_or(FunctionError::UnsupportedDomain(M::NAME))?;
        let params = self.parameters.values();
        let mut der = vec![0.0; params.len()];
        for (row, &x) in points.x().iter().enumerate() {
            M::derivatives(x, params, &mut der);
            for (col, &d) in der.iter().enumerate() {
                jacobian.set(row, col, d);
            }
        }
        Ok(())
    }
}

/// `height * exp(-(x - centre)² / (2 sigma²))`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianModel;

pub type Gaussian = PointFunction<GaussianModel>;

impl PointModel for GaussianModel {
    const NAME: &'static str = "Gaussian";
    const PARAMETER_NAMES: &'static [&'static str] = &["height", "centre", "sigma"];

    fn model<U: Float>(x: U, params: &[U]) -> U {
        let (height, centre, sigma) = (params[0], params[1], params[2]);
        let z = (x - centre) / sigma;
        height * U::exp(-z * z / (U::one() + U::one()))
    }

    fn derivatives(x: f64, params: &[f64], jac: &mut [f64]) {
        let (height, centre, sigma) = (params[0], params[1], params[2]);
        let dx = x - centre;
        let e = f64::exp(-0.5 * (dx / sigma).powi(2));
        jac[0] = e;
        jac[1] = height * e * dx / sigma.powi(2);
        jac[2] = height * e * dx.powi(2) / sigma.powi(3);
    }
}

impl PointFunction<GaussianModel> {
    pub fn new(height: f64, centre: f64, sigma: f64) -> Self {
        Self::with_parameters(&[height, centre, sigma])
    }
}

/// `a0 + a1 * x`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearBackgroundModel;

pub type LinearBackground = PointFunction<LinearBackgroundModel>;

impl PointModel for LinearBackgroundModel {
    const NAME: &'static str = "LinearBackground";
    const PARAMETER_NAMES: &'static [&'static str] = &["a0", "a1"];

    fn model<U: Float>(x: U, params: &[U]) -> U {
        params[0] + params[1] * x
    }

    fn derivatives(x: f64, _params: &[f64], jac: &mut [f64]) {
        jac[0] = 1.0;
        jac[1] = x;
    }
}

impl PointFunction<LinearBackgroundModel> {
    pub fn new(a0: f64, a1: f64) -> Self {
        Self::with_parameters(&[a0, a1])
    }
}

/// `height * exp(-x / lifetime)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExpDecayModel;

pub type ExpDecay = PointFunction<ExpDecayModel>;

impl PointModel for ExpDecayModel {
    const NAME: &'static str = "ExpDecay";
    const PARAMETER_NAMES: &'static [&'static str] = &["height", "lifetime"];

    fn model<U: Float>(x: U, params: &[U]) -> U {
        params[0] * U::exp(-x / params[1])
    }

    fn derivatives(x: f64, params: &[f64], jac: &mut [f64]) {
        let (height, lifetime) = (params[0], params[1]);
        let e = f64::exp(-x / lifetime);
        jac[0] = e;
        jac[1] = height * e * x / lifetime.powi(2);
    }
}

impl PointFunction<ExpDecayModel> {
    pub fn new(height: f64, lifetime: f64) -> Self {
        Self::with_parameters(&[height, lifetime])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DenseJacobian, JointDomain, PointsDomain};

    use approx::assert_relative_eq;
    use hyperdual::Hyperdual;

    fn check_derivatives<M: PointModel>(params: &[f64], xs: &[f64]) {
        let mut actual = vec![0.0; params.len()];
        for &x in xs {
            M::derivatives(x, params, &mut actual);
            for (i, &actual) in actual.iter().enumerate() {
                let dual_params: Vec<_> = params
                    .iter()
                    .enumerate()
                    .map(|(j, &p)| {
                        let mut p = Hyperdual::<f64, 2>::from_real(p);
                        if i == j {
                            p[1] = 1.0;
                        }
                        p
                    })
                    .collect();
                let desired = M::model(Hyperdual::<f64, 2>::from_real(x), &dual_params)[1];
                assert_relative_eq!(actual, desired, epsilon = 1e-12, max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn gaussian_derivatives() {
        check_derivatives::<GaussianModel>(&[2.0, 0.3, 0.7], &[-1.0, 0.0, 0.3, 0.9, 2.5]);
    }

    #[test]
    fn linear_background_derivatives() {
        check_derivatives::<LinearBackgroundModel>(&[1.5, -0.5], &[-3.0, 0.0, 4.0]);
    }

    #[test]
    fn exp_decay_derivatives() {
        check_derivatives::<ExpDecayModel>(&[10.0, 2.5], &[0.0, 0.5, 3.0, 10.0]);
    }

    #[test]
    fn evaluate_on_points() {
        let domain: Domain = PointsDomain::new(vec![0.0, 1.0, 2.0]).into();
        let line = LinearBackground::new(1.0, 2.0);
        let mut values = FunctionValues::new(3);
        line.function(&domain, &mut values).unwrap();
        assert_eq!(values.calculated().to_vec(), vec![1.0, 3.0, 5.0]);

        let mut jac = DenseJacobian::zeros(3, 2);
        LinearBackground::new(1.0, 2.0)
            .function_deriv(&domain, &mut jac)
            .unwrap();
        assert_eq!(jac.column(1).to_vec(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn composite_domain_is_unsupported() {
        let domain: Domain = JointDomain::new()
            .with_domain(PointsDomain::new(vec![0.0]))
            .into();
        let mut values = FunctionValues::new(1);
        assert_eq!(
            Gaussian::new(1.0, 0.0, 1.0).function(&domain, &mut values),
            Err(FunctionError::UnsupportedDomain("Gaussian"))
        );
    }

    #[test]
    fn builder_helpers() {
        let gaussian = Gaussian::new(1.0, 0.0, 1.0)
            .fix("centre")
            .constrain("sigma", Constraint::lower_bound(0.0));
        assert!(!gaussian.is_active(1));
        assert!(gaussian.constraint(2).is_some());
        assert_eq!(gaussian.parameter_name(2), "sigma");
    }
}
