use crate::data::function_values::FunctionValues;
use crate::data::joint_domain::JointDomain;
use crate::data::spectra::SpectraDomain;
use crate::error::DomainError;

use enum_dispatch::enum_dispatch;
use ndarray::{Array1, ArrayView1};

/// Common interface of every domain a fit function can be evaluated on
#[enum_dispatch]
pub trait DomainTrait {
    /// Total number of data points
    fn size(&self) -> usize;

    /// Composite view of the domain, `None` for a leaf domain
    fn as_composite(&self) -> Option<&dyn CompositeDomain> {
        None
    }

    /// Fit data and fit weights carried by the domain itself
    ///
    /// Leaf domains built from bare abscissas have no observations attached and return `None`.
    fn fit_values(&self) -> Option<FunctionValues> {
        None
    }
}

/// Ordered collection of sub-domains
///
/// Invariant: `size() == (0..part_count()).map(|i| get_part(i).size()).sum()`.
pub trait CompositeDomain: Sync {
    fn part_count(&self) -> usize;

    fn get_part(&self, index: usize) -> Result<&Domain, DomainError>;

    /// Offsets of every part in the flat value array, `part_count() + 1` entries
    fn value_offsets(&self) -> Result<Vec<usize>, DomainError> {
        let mut offsets = Vec::with_capacity(self.part_count() + 1);
        offsets.push(0);
        for i in 0..self.part_count() {
            let previous = offsets[i];
            offsets.push(previous + self.get_part(i)?.size());
        }
        Ok(offsets)
    }
}

/// All domain kinds are available as variants of this enum
#[enum_dispatch(DomainTrait)]
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Domain {
    Points(PointsDomain),
    Joint(JointDomain),
    Spectra(SpectraDomain),
}

impl Domain {
    pub fn as_points(&self) -> Option<&PointsDomain> {
        match self {
            Self::Points(points) => Some(points),
            _ => None,
        }
    }
}

/// Leaf domain: a set of abscissa values
#[derive(Clone, Debug, PartialEq)]
pub struct PointsDomain {
    x: Array1<f64>,
}

impl PointsDomain {
    pub fn new(x: impl Into<Array1<f64>>) -> Self {
        Self { x: x.into() }
    }

    /// `n` equally spaced points from `start` to `end` inclusive
    pub fn linspace(start: f64, end: f64, n: usize) -> Self {
        Self::new(Array1::linspace(start, end, n))
    }

    pub fn x(&self) -> ArrayView1<'_, f64> {
        self.x.view()
    }
}

impl DomainTrait for PointsDomain {
    fn size(&self) -> usize {
        self.x.len()
    }
}

impl From<Vec<f64>> for PointsDomain {
    fn from(x: Vec<f64>) -> Self {
        Self::new(x)
    }
}

impl From<&[f64]> for PointsDomain {
    fn from(x: &[f64]) -> Self {
        Self::new(x.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_domain_size() {
        let domain: Domain = PointsDomain::linspace(0.0, 1.0, 11).into();
        assert_eq!(domain.size(), 11);
        assert!(domain.as_composite().is_none());
        assert!(domain.fit_values().is_none());
        assert_eq!(domain.as_points().unwrap().x()[10], 1.0);
    }
}
