#![doc = include_str!("../README.md")]


pub mod cost_function;
pub use cost_function::{
    CacheState, CostFunction, CostFunctionOptions, CostMeasure, CostMeasureTrait, JacobianProbe,
    LeastSquaresCost, PoissonCost, RwpCost,
};

mod data;
pub use data::{
    CompositeDomain, DenseJacobian, Domain, DomainTrait, FunctionValues, Jacobian, JointDomain,
    PartialJacobian, PointsDomain, Spectra, SpectraDomain, SpectraSource, Spectrum, SpectrumView,
    XRange,
};

mod error;
pub use error::{CostFunctionError, DomainError, FunctionError, ParseDomainsError};

pub mod function;
pub use function::{
    numeric_deriv, BoundaryConstraint, Constraint, ConstraintTrait, DomainSelector, ExpDecay,
    FitFunction, Gaussian, GaussianConstraint, LinearBackground, MultiDomainFunction,
    ParameterSet, PointFunction, PointModel,
};

pub use ndarray;
