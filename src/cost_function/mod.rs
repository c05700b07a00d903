//! Cost functions: reduction of a fit function's residuals to a scalar with its derivatives
//!
//! [CostFunction] evaluates a [FitFunction] on a [Domain] and reduces calculated values against
//! the fit data with one of the [CostMeasure]s. The value, the gradient and the Hessian are cached
//! separately and recomputed only when stale. All derivatives are taken with respect to the
//! active (not fixed) parameters of the function, in declaration order.

use crate::data::{DenseJacobian, Domain, DomainTrait, FunctionValues, Jacobian};
use crate::error::{CostFunctionError, FunctionError};
use crate::function::{active_indices, ConstraintTrait, FitFunction};

use enum_dispatch::enum_dispatch;
use ndarray::{Array1, Array2, Axis, Zip};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

mod cache;
pub use cache::{CacheState, Cached};
use cache::Checkpoint;

mod least_squares;
pub use least_squares::LeastSquaresCost;

mod options;
pub use options::CostFunctionOptions;

mod poisson;
pub use poisson::PoissonCost;

mod probe;
pub use probe::JacobianProbe;

mod reduction;
pub use reduction::{accumulate_weighted_squares, reduce_points, Evaluation, Request, Residuals};

mod rwp;
pub use rwp::RwpCost;

/// Fit function under reduction, for measures that need more than its Jacobian
pub struct Model<'a> {
    pub function: &'a mut dyn FitFunction,
    pub domain: &'a Domain,
    /// Indices of the active parameters
    pub active: &'a [usize],
}

/// Reduction of residuals into a cost value and its derivatives
#[enum_dispatch]
pub trait CostMeasureTrait: Clone + Debug {
    fn name(&self) -> &'static str;

    /// Whether penalties of constrained parameters are added to the cost
    fn applies_penalty(&self) -> bool;

    /// Compute the value and the requested derivatives, the Hessian must be symmetric
    fn reduce(
        &self,
        residuals: &Residuals<'_>,
        request: Request,
        options: &CostFunctionOptions,
        model: &mut Model<'_>,
    ) -> Result<Evaluation, CostFunctionError>;
}

/// Cost measure
#[enum_dispatch(CostMeasureTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[non_exhaustive]
pub enum CostMeasure {
    LeastSquares(LeastSquaresCost),
    Rwp(RwpCost),
    Poisson(PoissonCost),
}

impl CostMeasure {
    pub fn least_squares() -> Self {
        LeastSquaresCost.into()
    }

    pub fn rwp() -> Self {
        RwpCost.into()
    }

    pub fn poisson() -> Self {
        PoissonCost::default().into()
    }
}

impl Default for CostMeasure {
    fn default() -> Self {
        Self::least_squares()
    }
}

/// Jacobian columns of the `active` parameters
pub(crate) fn active_jacobian(
    function: &mut dyn FitFunction,
    domain: &Domain,
    active: &[usize],
) -> Result<Array2<f64>, FunctionError> {
    let mut jacobian = DenseJacobian::zeros(domain.size(), function.n_params());
    function.function_deriv(domain, &mut jacobian)?;
    if jacobian.n_cols() == active.len() {
        return Ok(jacobian.into_inner());
    }
    Ok(jacobian.into_inner().select(Axis(1), active))
}

/// Add penalties of constrained active parameters
fn add_penalty<F>(function: &F, active: &[usize], evaluation: &mut Evaluation)
where
    F: FitFunction + ?Sized,
{
    for (k, &param) in active.iter().enumerate() {
        let Some(constraint) = function.constraint(param) else {
            continue;
        };
        let x = function.parameter(param);
        evaluation.value += constraint.check(x);
        if let Some(gradient) = &mut evaluation.gradient {
            gradient[k] += constraint.first_derivative(x);
        }
        if let Some(hessian) = &mut evaluation.hessian {
            hessian[(k, k)] += constraint.second_derivative(x);
        }
    }
}

/// Cost of a fit function on a domain with cached value, gradient and Hessian
///
/// Every change of parameters invalidates all three cached quantities. A single checkpoint can be
/// taken with [CostFunction::push] and either restored with [CostFunction::pop] or discarded with
/// [CostFunction::drop_checkpoint].
#[derive(Debug)]
pub struct CostFunction<F> {
    measure: CostMeasure,
    function: F,
    domain: Arc<Domain>,
    values: FunctionValues,
    options: CostFunctionOptions,
    value: Cached<f64>,
    gradient: Cached<Array1<f64>>,
    hessian: Cached<Array2<f64>>,
    checkpoint: Option<Checkpoint>,
}

impl<F> CostFunction<F>
where
    F: FitFunction,
{
    /// Create a cost function
    ///
    /// Fit data and weights come from `values` or, if it is `None`, from the domain itself.
    pub fn new(
        measure: CostMeasure,
        function: F,
        domain: Arc<Domain>,
        values: Option<FunctionValues>,
    ) -> Result<Self, CostFunctionError> {
        let values = match values {
            Some(values) => values,
            None => domain.fit_values().ok_or(CostFunctionError::UndefinedValues)?,
        };
        if !values.has_fit_data() {
            return Err(CostFunctionError::UndefinedValues);
        }
        if values.size() != domain.size() {
            return Err(CostFunctionError::SizeMismatch {
                domain: domain.size(),
                values: values.size(),
            });
        }
        log::debug!(
            "{} cost function over {} points, {} active parameters",
            measure.name(),
            values.size(),
            active_indices(&function).len(),
        );
        Ok(Self {
            measure,
            function,
            domain,
            values,
            options: CostFunctionOptions::default(),
            value: Cached::new(0.0),
            gradient: Cached::new(Array1::zeros(0)),
            hessian: Cached::new(Array2::zeros((0, 0))),
            checkpoint: None,
        })
    }

    pub fn with_options(mut self, options: CostFunctionOptions) -> Self {
        self.set_options(options);
        self
    }

    pub fn set_options(&mut self, options: CostFunctionOptions) {
        self.options = options;
        self.invalidate_all();
    }

    pub fn options(&self) -> &CostFunctionOptions {
        &self.options
    }

    pub fn measure(&self) -> &CostMeasure {
        &self.measure
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    /// Mutable access to the function, invalidates all cached quantities
    pub fn function_mut(&mut self) -> &mut F {
        self.invalidate_all();
        &mut self.function
    }

    pub fn into_function(self) -> F {
        self.function
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Fit data, weights and values calculated by the last evaluation
    pub fn values(&self) -> &FunctionValues {
        &self.values
    }

    pub fn n_active_params(&self) -> usize {
        active_indices(&self.function).len()
    }

    /// Values of the active parameters
    pub fn parameters(&self) -> Vec<f64> {
        active_indices(&self.function)
            .into_iter()
            .map(|i| self.function.parameter(i))
            .collect()
    }

    /// Set values of the active parameters
    pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<(), CostFunctionError> {
        let active = active_indices(&self.function);
        if active.len() != parameters.len() {
            return Err(CostFunctionError::ParameterCountMismatch {
                expected: active.len(),
                actual: parameters.len(),
            });
        }
        for (&i, &x) in active.iter().zip(parameters) {
            self.function.set_parameter(i, x);
        }
        self.invalidate_all();
        Ok(())
    }

    pub fn value_state(&self) -> CacheState {
        self.value.state()
    }

    pub fn gradient_state(&self) -> CacheState {
        self.gradient.state()
    }

    pub fn hessian_state(&self) -> CacheState {
        self.hessian.state()
    }

    fn invalidate_all(&mut self) {
        self.value.invalidate();
        self.gradient.invalidate();
        self.hessian.invalidate();
    }

    /// Cost value, recomputed only when stale
    pub fn value(&mut self) -> Result<f64, CostFunctionError> {
        if !self.value.is_fresh() {
            let evaluation = self.evaluate(Request::VALUE)?;
            self.value.store(evaluation.value);
        }
        Ok(*self.value.get())
    }

    /// Recompute the value and the requested stale derivatives
    ///
    /// Without derivatives requested this is the same as [CostFunction::value].
    pub fn val_deriv_hessian(
        &mut self,
        eval_deriv: bool,
        eval_hessian: bool,
    ) -> Result<f64, CostFunctionError> {
        let request = Request {
            gradient: eval_deriv && !self.gradient.is_fresh(),
            hessian: eval_hessian && !self.hessian.is_fresh(),
        };
        if !request.needs_jacobian() {
            return self.value();
        }
        let evaluation = self.evaluate(request)?;
        self.value.store(evaluation.value);
        if let Some(gradient) = evaluation.gradient {
            self.gradient.store(gradient);
        }
        if let Some(hessian) = evaluation.hessian {
            self.hessian.store(hessian);
        }
        Ok(evaluation.value)
    }

    pub fn value_and_gradient(&mut self) -> Result<(f64, Array1<f64>), CostFunctionError> {
        let value = self.val_deriv_hessian(true, false)?;
        Ok((value, self.gradient.get().clone()))
    }

    pub fn gradient(&mut self) -> Result<Array1<f64>, CostFunctionError> {
        self.val_deriv_hessian(true, false)?;
        Ok(self.gradient.get().clone())
    }

    pub fn hessian(&mut self) -> Result<Array2<f64>, CostFunctionError> {
        self.val_deriv_hessian(false, true)?;
        Ok(self.hessian.get().clone())
    }

    pub fn is_pushed(&self) -> bool {
        self.checkpoint.is_some()
    }

    /// Take a checkpoint of the parameters together with fresh value, gradient and Hessian
    pub fn push(&mut self) -> Result<(), CostFunctionError> {
        if self.checkpoint.is_some() {
            return Err(CostFunctionError::DoublePush);
        }
        let value = self.val_deriv_hessian(true, true)?;
        self.checkpoint = Some(Checkpoint {
            value,
            parameters: (0..self.function.n_params())
                .map(|i| self.function.parameter(i))
                .collect(),
            gradient: self.gradient.get().clone(),
            hessian: self.hessian.get().clone(),
            calculated: self.values.calculated().to_owned(),
        });
        log::debug!("pushed checkpoint with cost value {}", value);
        Ok(())
    }

    /// Restore the checkpoint, all cached quantities become fresh
    pub fn pop(&mut self) -> Result<(), CostFunctionError> {
        let checkpoint = self.checkpoint.take().ok_or(CostFunctionError::EmptyStack)?;
        for (i, &x) in checkpoint.parameters.iter().enumerate() {
            self.function.set_parameter(i, x);
        }
        self.values.calculated_mut().assign(&checkpoint.calculated);
        self.value.store(checkpoint.value);
        self.gradient.store(checkpoint.gradient);
        self.hessian.store(checkpoint.hessian);
        log::debug!("restored checkpoint with cost value {}", checkpoint.value);
        Ok(())
    }

    /// Discard the checkpoint without restoring it, all cached quantities become stale
    pub fn drop_checkpoint(&mut self) -> Result<(), CostFunctionError> {
        self.checkpoint
            .take()
            .ok_or(CostFunctionError::EmptyStack)?;
        self.invalidate_all();
        log::debug!("dropped checkpoint");
        Ok(())
    }

    /// `Σ (w r)² / (N - N_active)`, where `N` is the number of points with non-zero weight
    ///
    /// The number of degrees of freedom is clamped to at least one.
    pub fn reduced_chi2(&mut self) -> Result<f64, CostFunctionError> {
        self.value()?;
        let observed = self
            .values
            .fit_data()
            .ok_or(CostFunctionError::UndefinedValues)?;
        let weights = self
            .values
            .fit_weights()
            .ok_or(CostFunctionError::UndefinedValues)?;
        let chi2 = Zip::from(&self.values.calculated())
            .and(&observed)
            .and(&weights)
            .fold(0.0, |acc, &calc, &obs, &w| {
                if w == 0.0 {
                    acc
                } else {
                    acc + ((calc - obs) * w).powi(2)
                }
            });
        let dof = self
            .values
            .n_weighted()
            .saturating_sub(self.n_active_params())
            .max(1);
        Ok(chi2 / dof as f64)
    }

    fn evaluate(&mut self, request: Request) -> Result<Evaluation, CostFunctionError> {
        let active = active_indices(&self.function);
        self.function.function(&self.domain, &mut self.values)?;
        let jacobian = if request.needs_jacobian() {
            Some(active_jacobian(&mut self.function, &self.domain, &active)?)
        } else {
            None
        };
        let residuals = Residuals {
            calculated: self.values.calculated(),
            observed: self
                .values
                .fit_data()
                .ok_or(CostFunctionError::UndefinedValues)?,
            weights: self
                .values
                .fit_weights()
                .ok_or(CostFunctionError::UndefinedValues)?,
            jacobian: jacobian.as_ref().map(|j| j.view()),
        };
        let mut model = Model {
            function: &mut self.function,
            domain: &self.domain,
            active: &active,
        };
        let mut evaluation = self
            .measure
            .reduce(&residuals, request, &self.options, &mut model)?;
        if self.measure.applies_penalty() {
            add_penalty(&self.function, &active, &mut evaluation);
        }
        log::trace!(
            "{} cost value {}, gradient: {}, Hessian: {}",
            self.measure.name(),
            evaluation.value,
            request.gradient,
            request.hessian,
        );
        Ok(evaluation)
    }
}
