use crate::function::constraint::Constraint;

/// Named parameters of a fit function with their values, fixed flags and constraints
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSet {
    names: Vec<&'static str>,
    values: Vec<f64>,
    fixed: Vec<bool>,
    constraints: Vec<Option<Constraint>>,
}

impl ParameterSet {
    pub fn new(names: &[&'static str], values: &[f64]) -> Self {
        assert_eq!(
            names.len(),
            values.len(),
            "names and values should have the same size"
        );
        Self {
            names: names.to_vec(),
            values: values.to_vec(),
            fixed: vec![false; names.len()],
            constraints: vec![None; names.len()],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn name(&self, index: usize) -> &'static str {
        self.names[index]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|&n| n == name)
    }

    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn set_value(&mut self, index: usize, value: f64) {
        self.values[index] = value;
    }

    pub fn is_active(&self, index: usize) -> bool {
        !self.fixed[index]
    }

    /// Exclude the parameter from fitting, keeping its current value
    pub fn fix(&mut self, index: usize) {
        self.fixed[index] = true;
    }

    pub fn unfix(&mut self, index: usize) {
        self.fixed[index] = false;
    }

    pub fn constraint(&self, index: usize) -> Option<&Constraint> {
        self.constraints[index].as_ref()
    }

    pub fn set_constraint(&mut self, index: usize, constraint: Constraint) {
        self.constraints[index] = Some(constraint);
    }

    pub fn remove_constraint(&mut self, index: usize) -> Option<Constraint> {
        self.constraints[index].take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_and_lookup() {
        let mut params = ParameterSet::new(&["a", "b"], &[1.0, 2.0]);
        assert_eq!(params.index_of("b"), Some(1));
        assert_eq!(params.index_of("c"), None);
        params.fix(0);
        assert!(!params.is_active(0));
        assert!(params.is_active(1));
        params.unfix(0);
        assert!(params.is_active(0));
        params.set_constraint(1, Constraint::lower_bound(0.0));
        assert!(params.constraint(1).is_some());
        assert!(params.remove_constraint(1).is_some());
        assert!(params.constraint(1).is_none());
    }
}
