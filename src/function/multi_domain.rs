use crate::data::{
    CompositeDomain, Domain, DomainTrait, FunctionValues, Jacobian, PartialJacobian,
};
use crate::error::FunctionError;
use crate::function::constraint::Constraint;
use crate::function::domain_selector::DomainSelector;
use crate::function::{numeric_deriv, FitFunction};

use rayon::prelude::*;
use std::collections::BTreeMap;

/// Composite fit function whose members are restricted to subsets of a composite domain
///
/// Every member is evaluated on the parts of the composite domain it is assigned to, and its
/// values are added at the offsets of those parts. A member without an assignment applies to all
/// parts, a member with an empty assignment contributes nothing.
///
/// The router is a [FitFunction] itself: parameters of all members are concatenated in member
/// order and are named `f{index}.{name}`.
#[derive(Debug)]
pub struct MultiDomainFunction {
    functions: Vec<Box<dyn FitFunction>>,
    assignments: BTreeMap<usize, Vec<usize>>,
    max_index: usize,
    numeric_derivatives: bool,
    parallel: bool,
}

impl MultiDomainFunction {
    pub fn new() -> Self {
        Self {
            functions: vec![],
            assignments: BTreeMap::new(),
            max_index: 0,
            numeric_derivatives: false,
            parallel: true,
        }
    }

    /// Append a member, returns its index
    pub fn add_function(&mut self, function: impl FitFunction + 'static) -> usize {
        self.functions.push(Box::new(function));
        self.functions.len() - 1
    }

    pub fn with_function(mut self, function: impl FitFunction + 'static) -> Self {
        self.add_function(function);
        self
    }

    /// Differentiate numerically instead of calling members' derivatives
    pub fn with_numeric_derivatives(mut self, numeric: bool) -> Self {
        self.numeric_derivatives = numeric;
        self
    }

    /// Evaluate (function, domain) pairs on the rayon thread pool
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn n_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn get_function(&self, index: usize) -> Result<&dyn FitFunction, FunctionError> {
        self.check_function_index(index)?;
        Ok(self.functions[index].as_ref())
    }

    pub fn get_function_mut(
        &mut self,
        index: usize,
    ) -> Result<&mut dyn FitFunction, FunctionError> {
        self.check_function_index(index)?;
        Ok(self.functions[index].as_mut())
    }

    /// Largest assigned domain index, zero without assignments
    pub fn max_index(&self) -> usize {
        self.max_index
    }

    fn check_function_index(&self, index: usize) -> Result<(), FunctionError> {
        if index < self.functions.len() {
            Ok(())
        } else {
            Err(FunctionError::FunctionIndexOutOfRange {
                index,
                count: self.functions.len(),
            })
        }
    }

    fn update_max_index(&mut self) {
        self.max_index = self
            .assignments
            .values()
            .flatten()
            .copied()
            .max()
            .unwrap_or(0);
    }

    /// Restrict a member to a single domain
    pub fn assign(
        &mut self,
        function_index: usize,
        domain_index: usize,
    ) -> Result<(), FunctionError> {
        self.assign_many(function_index, vec![domain_index])
    }

    /// Restrict a member to an ordered list of domains, an empty list disables the member
    pub fn assign_many(
        &mut self,
        function_index: usize,
        domain_indices: impl Into<Vec<usize>>,
    ) -> Result<(), FunctionError> {
        self.check_function_index(function_index)?;
        self.assignments.insert(function_index, domain_indices.into());
        self.update_max_index();
        Ok(())
    }

    /// Every member applies to all domains again
    pub fn clear_assignments(&mut self) {
        self.assignments.clear();
        self.max_index = 0;
    }

    /// Domains the member is evaluated on for a composite domain with `domain_count` parts
    ///
    /// Stored lists are returned as is, without checking them against `domain_count`.
    pub fn resolve_assignment(&self, function_index: usize, domain_count: usize) -> Vec<usize> {
        match self.assignments.get(&function_index) {
            Some(indices) => indices.clone(),
            None => (0..domain_count).collect(),
        }
    }

    /// Per-member attribute, only `domains` is supported
    pub fn local_attribute(
        &self,
        function_index: usize,
        name: &str,
    ) -> Result<String, FunctionError> {
        self.check_function_index(function_index)?;
        match name {
            "domains" => {
                let assignment = self.assignments.get(&function_index).map(Vec::as_slice);
                Ok(DomainSelector::from_assignment(function_index, assignment).to_string())
            }
            _ => Err(FunctionError::UnknownAttribute(name.to_owned())),
        }
    }

    pub fn set_local_attribute(
        &mut self,
        function_index: usize,
        name: &str,
        value: &str,
    ) -> Result<(), FunctionError> {
        self.check_function_index(function_index)?;
        if name != "domains" {
            return Err(FunctionError::UnknownAttribute(name.to_owned()));
        }
        let selector: DomainSelector = value.parse()?;
        match selector.into_assignment(function_index) {
            Some(indices) => self.assign_many(function_index, indices),
            None => {
                self.assignments.remove(&function_index);
                self.update_max_index();
                Ok(())
            }
        }
    }

    /// Single member without any restriction can be called on a plain domain
    fn is_degenerate(&self) -> bool {
        self.functions.len() == 1 && self.assignments.is_empty()
    }

    /// Index of the member owning global parameter `index` and the parameter's local index
    fn locate_parameter(&self, mut index: usize) -> (usize, usize) {
        for (i, function) in self.functions.iter().enumerate() {
            if index < function.n_params() {
                return (i, index);
            }
            index -= function.n_params();
        }
        panic!("parameter index is out of range")
    }

    fn param_offsets(&self) -> Vec<usize> {
        self.functions
            .iter()
            .scan(0, |offset, function| {
                let current = *offset;
                *offset += function.n_params();
                Some(current)
            })
            .collect()
    }

    fn pairs(&self, domain_count: usize) -> Vec<(usize, usize)> {
        (0..self.functions.len())
            .flat_map(|f| {
                self.resolve_assignment(f, domain_count)
                    .into_iter()
                    .map(move |d| (f, d))
            })
            .collect()
    }

    fn evaluate_pair(
        &self,
        composite: &dyn CompositeDomain,
        (function_index, domain_index): (usize, usize),
    ) -> Result<(usize, FunctionValues), FunctionError> {
        let part = composite.get_part(domain_index)?;
        log::trace!(
            "evaluating function {} on domain {} of size {}",
            function_index,
            domain_index,
            part.size()
        );
        let mut values = FunctionValues::new(part.size());
        self.functions[function_index].function(part, &mut values)?;
        Ok((domain_index, values))
    }
}

impl Default for MultiDomainFunction {
    fn default() -> Self {
        Self::new()
    }
}

impl FitFunction for MultiDomainFunction {
    fn n_params(&self) -> usize {
        self.functions.iter().map(|f| f.n_params()).sum()
    }

    fn parameter_name(&self, index: usize) -> String {
        let (f, local) = self.locate_parameter(index);
        format!("f{}.{}", f, self.functions[f].parameter_name(local))
    }

    fn parameter(&self, index: usize) -> f64 {
        let (f, local) = self.locate_parameter(index);
        self.functions[f].parameter(local)
    }

    fn set_parameter(&mut self, index: usize, value: f64) {
        let (f, local) = self.locate_parameter(index);
        self.functions[f].set_parameter(local, value);
    }

    fn is_active(&self, index: usize) -> bool {
        let (f, local) = self.locate_parameter(index);
        self.functions[f].is_active(local)
    }

    fn constraint(&self, index: usize) -> Option<&Constraint> {
        let (f, local) = self.locate_parameter(index);
        self.functions[f].constraint(local)
    }

    fn function(&self, domain: &Domain, values: &mut FunctionValues) -> Result<(), FunctionError> {
        let composite = match domain.as_composite() {
            Some(composite) => composite,
            None if self.is_degenerate() => return self.functions[0].function(domain, values),
            None => return Err(FunctionError::InvalidDomainType),
        };
        if composite.part_count() <= self.max_index {
            return Err(FunctionError::TooFewDomains {
                max_index: self.max_index,
                actual: composite.part_count(),
            });
        }
        if domain.size() != values.size() {
            return Err(FunctionError::SizeMismatch {
                domain: domain.size(),
                values: values.size(),
            });
        }

        values.zero_calculated();
        let offsets = composite.value_offsets()?;
        let pairs = self.pairs(composite.part_count());
        log::debug!(
            "evaluating {} functions over {} (function, domain) pairs",
            self.functions.len(),
            pairs.len()
        );
        let partials: Vec<_> = if self.parallel {
            pairs
                .par_iter()
                .map(|&pair| self.evaluate_pair(composite, pair))
                .collect::<Result<_, _>>()?
        } else {
            pairs
                .iter()
                .map(|&pair| self.evaluate_pair(composite, pair))
                .collect::<Result<_, _>>()?
        };
        for (domain_index, partial) in partials {
            values.add_to_calculated(offsets[domain_index], &partial);
        }
        Ok(())
    }

    fn function_deriv(
        &mut self,
        domain: &Domain,
        jacobian: &mut dyn Jacobian,
    ) -> Result<(), FunctionError> {
        let composite = match domain.as_composite() {
            Some(composite) => composite,
            None if self.is_degenerate() && self.numeric_derivatives => {
                return numeric_deriv(self, domain, jacobian);
            }
            None if self.is_degenerate() => {
                return self.functions[0].function_deriv(domain, jacobian);
            }
            None => return Err(FunctionError::InvalidDomainType),
        };
        // Looser than the check in `function`: a composite with exactly `max_index` parts passes
        // here and fails on the missing part below.
        if composite.part_count() < self.max_index {
            return Err(FunctionError::TooFewDomains {
                max_index: self.max_index,
                actual: composite.part_count(),
            });
        }
        if domain.size() != jacobian.n_rows() {
            return Err(FunctionError::SizeMismatch {
                domain: domain.size(),
                values: jacobian.n_rows(),
            });
        }

        if self.numeric_derivatives {
            return numeric_deriv(self, domain, jacobian);
        }

        let offsets = composite.value_offsets()?;
        let plan: Vec<_> = (0..self.functions.len())
            .map(|f| self.resolve_assignment(f, composite.part_count()))
            .collect();
        let param_offsets = self.param_offsets();
        for ((function, domains), &col_offset) in
            self.functions.iter_mut().zip(plan).zip(&param_offsets)
        {
            for domain_index in domains {
                let part = composite.get_part(domain_index)?;
                let mut partial =
                    PartialJacobian::new(&mut *jacobian, offsets[domain_index], col_offset);
                function.function_deriv(part, &mut partial)?;
            }
        }
        Ok(())
    }
}
