/// Error returned from [crate::CompositeDomain] and domain constructors
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum DomainError {
    #[error("domain index {index} is out of range, composite domain has {count} parts")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("spectrum {index} is malformed: {reason}")]
    InvalidSpectrum { index: usize, reason: &'static str },
}

/// Error returned when the `domains` attribute value cannot be parsed
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ParseDomainsError {
    #[error("cannot parse domain selector {0:?}")]
    InvalidToken(String),

    #[error("domain range {start} - {end} must be increasing")]
    InvalidRange { start: usize, end: usize },
}

/// Error returned from [crate::FitFunction] evaluation and [crate::MultiDomainFunction] setup
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum FunctionError {
    #[error("multi-domain function requires a composite domain")]
    InvalidDomainType,

    #[error("function is assigned to domain {max_index}, but the composite domain has {actual} parts")]
    TooFewDomains { max_index: usize, actual: usize },

    #[error("domain size {domain} doesn't match values size {values}")]
    SizeMismatch { domain: usize, values: usize },

    #[error("function index {index} is out of range, there are {count} functions")]
    FunctionIndexOutOfRange { index: usize, count: usize },

    #[error("unknown attribute {0:?}")]
    UnknownAttribute(String),

    #[error("{0} cannot be evaluated on this kind of domain")]
    UnsupportedDomain(&'static str),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    ParseDomains(#[from] ParseDomainsError),
}

/// Error returned from [crate::CostFunction]
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum CostFunctionError {
    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error("fit data and weights are undefined for this domain")]
    UndefinedValues,

    #[error("domain size {domain} doesn't match fit data size {values}")]
    SizeMismatch { domain: usize, values: usize },

    #[error("{expected} active parameters expected, {actual} given")]
    ParameterCountMismatch { expected: usize, actual: usize },

    #[error("double push: a checkpoint is already held")]
    DoublePush,

    #[error("empty stack: no checkpoint is held")]
    EmptyStack,

    #[error("Rwp normalization is zero: all weighted observations vanish")]
    DegenerateNormalization,
}
