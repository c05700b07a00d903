use crate::data::domain::{CompositeDomain, Domain, DomainTrait};
use crate::data::function_values::FunctionValues;
use crate::error::DomainError;

/// Composite domain assembled part by part with [JointDomain::add_domain]
///
/// Parts keep the order they were appended in; appending never reorders earlier parts.
#[derive(Clone, Debug, Default)]
pub struct JointDomain {
    parts: Vec<Domain>,
    size: usize,
}

impl JointDomain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_domain(&mut self, domain: impl Into<Domain>) {
        let domain = domain.into();
        self.size += domain.size();
        self.parts.push(domain);
    }

    pub fn with_domain(mut self, domain: impl Into<Domain>) -> Self {
        self.add_domain(domain);
        self
    }

    pub fn parts(&self) -> &[Domain] {
        &self.parts
    }
}

impl<D> FromIterator<D> for JointDomain
where
    D: Into<Domain>,
{
    fn from_iter<I: IntoIterator<Item = D>>(iter: I) -> Self {
        let mut joint = Self::new();
        for domain in iter {
            joint.add_domain(domain);
        }
        joint
    }
}

impl DomainTrait for JointDomain {
    fn size(&self) -> usize {
        self.size
    }

    fn as_composite(&self) -> Option<&dyn CompositeDomain> {
        Some(self)
    }

    /// Concatenation of the parts' fit values, `None` if any part has none
    fn fit_values(&self) -> Option<FunctionValues> {
        let parts = self
            .parts
            .iter()
            .map(|part| part.fit_values())
            .collect::<Option<Vec<_>>>()?;
        Some(FunctionValues::concatenate(&parts))
    }
}

impl CompositeDomain for JointDomain {
    fn part_count(&self) -> usize {
        self.parts.len()
    }

    fn get_part(&self, index: usize) -> Result<&Domain, DomainError> {
        self.parts.get(index).ok_or(DomainError::IndexOutOfRange {
            index,
            count: self.parts.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::domain::PointsDomain;

    #[test]
    fn size_is_sum_of_parts() {
        let joint: JointDomain = [3, 0, 5, 1]
            .into_iter()
            .map(|n| PointsDomain::linspace(0.0, 1.0, n))
            .collect();
        let sum: usize = (0..joint.part_count())
            .map(|i| joint.get_part(i).unwrap().size())
            .sum();
        assert_eq!(joint.size(), 9);
        assert_eq!(joint.size(), sum);
        assert_eq!(joint.value_offsets().unwrap(), vec![0, 3, 3, 8, 9]);
    }

    #[test]
    fn get_part_out_of_range() {
        let joint = JointDomain::new().with_domain(PointsDomain::linspace(0.0, 1.0, 2));
        assert_eq!(
            joint.get_part(1).unwrap_err(),
            DomainError::IndexOutOfRange { index: 1, count: 1 }
        );
    }

    #[test]
    fn append_keeps_order() {
        let mut joint = JointDomain::new();
        joint.add_domain(PointsDomain::new(vec![1.0]));
        joint.add_domain(PointsDomain::new(vec![2.0, 3.0]));
        joint.add_domain(PointsDomain::new(vec![4.0]));
        let firsts: Vec<_> = joint
            .parts()
            .iter()
            .map(|d| d.as_points().unwrap().x()[0])
            .collect();
        assert_eq!(firsts, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn no_fit_values_for_bare_points() {
        let joint = JointDomain::new().with_domain(PointsDomain::linspace(0.0, 1.0, 2));
        assert!(joint.fit_values().is_none());
    }
}
