mod domain;
pub use domain::{CompositeDomain, Domain, DomainTrait, PointsDomain};

mod function_values;
pub use function_values::FunctionValues;

mod jacobian;
pub use jacobian::{DenseJacobian, Jacobian, PartialJacobian};

mod joint_domain;
pub use joint_domain::JointDomain;

mod spectra;
pub use spectra::{Spectra, SpectraDomain, SpectraSource, Spectrum, SpectrumView, XRange};
