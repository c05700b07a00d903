//! Fit functions and their routing over composite domains
//!
//! A [FitFunction] owns its parameters and evaluates calculated values on a [Domain]. Plain
//! functions ([PointFunction] models) work on a leaf [PointsDomain](crate::PointsDomain),
//! [MultiDomainFunction] dispatches its members over the parts of a composite domain.
//!
//! Jacobian columns always correspond to the declared parameters of the function, including the
//! fixed ones; consumers pick the columns of the active parameters they need.

use crate::data::{Domain, DomainTrait, FunctionValues, Jacobian};
use crate::error::FunctionError;

use std::fmt::Debug;

pub mod constraint;
pub use constraint::{BoundaryConstraint, Constraint, ConstraintTrait, GaussianConstraint};

pub mod domain_selector;
pub use domain_selector::DomainSelector;

pub mod models;
pub use models::{
    ExpDecay, ExpDecayModel, Gaussian, GaussianModel, LinearBackground, LinearBackgroundModel,
    PointFunction, PointModel,
};

pub mod multi_domain;
pub use multi_domain::MultiDomainFunction;

mod parameters;
pub use parameters::ParameterSet;

/// Parametric function evaluated on a [Domain]
pub trait FitFunction: Debug + Send + Sync {
    fn n_params(&self) -> usize;

    fn parameter_name(&self, index: usize) -> String;

    fn parameter(&self, index: usize) -> f64;

    fn set_parameter(&mut self, index: usize, value: f64);

    /// Fixed parameters are not active and don't take part in the fit
    fn is_active(&self, index: usize) -> bool;

    fn constraint(&self, _index: usize) -> Option<&Constraint> {
        None
    }

    /// Write calculated values for every point of `domain` into `values`
    fn function(&self, domain: &Domain, values: &mut FunctionValues) -> Result<(), FunctionError>;

    /// Write derivatives of calculated values into a zero-initialised `jacobian`
    ///
    /// Default implementation differentiates [FitFunction::function] numerically.
    fn function_deriv(
        &mut self,
        domain: &Domain,
        jacobian: &mut dyn Jacobian,
    ) -> Result<(), FunctionError> {
        numeric_deriv(self, domain, jacobian)
    }
}

/// Indices of the active parameters in declaration order
pub fn active_indices<F>(function: &F) -> Vec<usize>
where
    F: FitFunction + ?Sized,
{
    (0..function.n_params())
        .filter(|&i| function.is_active(i))
        .collect()
}

/// Forward-difference step for a parameter value
fn numeric_step(x: f64) -> f64 {
    const STEP_FRACTION: f64 = 1e-3;
    let cutoff = 100.0 * f64::MIN_POSITIVE / STEP_FRACTION;
    if x.abs() < cutoff {
        100.0 * f64::EPSILON
    } else {
        x * STEP_FRACTION
    }
}

/// Fill Jacobian columns of the active parameters by forward differences
///
/// Every parameter is restored to its original value afterwards, also on error.
pub fn numeric_deriv<F>(
    function: &mut F,
    domain: &Domain,
    jacobian: &mut dyn Jacobian,
) -> Result<(), FunctionError>
where
    F: FitFunction + ?Sized,
{
    let size = domain.size();
    if jacobian.n_rows() != size {
        return Err(FunctionError::SizeMismatch {
            domain: size,
            values: jacobian.n_rows(),
        });
    }
    let mut base = FunctionValues::new(size);
    function.function(domain, &mut base)?;
    let mut shifted = FunctionValues::new(size);
    for param in active_indices(function) {
        let x = function.parameter(param);
        let step = numeric_step(x);
        function.set_parameter(param, x + step);
        shifted.zero_calculated();
        let result = function.function(domain, &mut shifted);
        function.set_parameter(param, x);
        result?;
        for (row, (&y1, &y0)) in shifted
            .calculated()
            .iter()
            .zip(base.calculated().iter())
            .enumerate()
        {
            jacobian.set(row, param, (y1 - y0) / step);
        }
    }
    Ok(())
}
