use ndarray::{s, Array1, ArrayView1, ArrayViewMut1};

/// Calculated values, fit data and fit weights parallel to a domain
///
/// The calculated values are written by the function being evaluated, fit data and weights are
/// written once by the weighting setup.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionValues {
    calculated: Array1<f64>,
    fit_data: Option<Array1<f64>>,
    fit_weights: Option<Array1<f64>>,
}

impl FunctionValues {
    /// Zero calculated values without fit data
    pub fn new(size: usize) -> Self {
        Self {
            calculated: Array1::zeros(size),
            fit_data: None,
            fit_weights: None,
        }
    }

    /// Zero calculated values with the given observations and weights
    ///
    /// Weights are inverse uncertainties of the observations.
    pub fn with_fit_data(
        fit_data: impl Into<Array1<f64>>,
        fit_weights: impl Into<Array1<f64>>,
    ) -> Self {
        let fit_data = fit_data.into();
        let fit_weights = fit_weights.into();
        assert_eq!(
            fit_data.len(),
            fit_weights.len(),
            "fit data and weights should have the same size"
        );
        Self {
            calculated: Array1::zeros(fit_data.len()),
            fit_data: Some(fit_data),
            fit_weights: Some(fit_weights),
        }
    }

    /// Observations with unity weights
    pub fn with_unit_weights(fit_data: impl Into<Array1<f64>>) -> Self {
        let fit_data = fit_data.into();
        let weights = Array1::ones(fit_data.len());
        Self::with_fit_data(fit_data, weights)
    }

    /// Joins values in order, fit data is kept only if every part has it
    pub fn concatenate(parts: &[FunctionValues]) -> Self {
        let calculated: Array1<f64> = parts
            .iter()
            .flat_map(|v| v.calculated.iter().copied())
            .collect();
        let fit_data = parts
            .iter()
            .map(|v| v.fit_data.as_ref())
            .collect::<Option<Vec<_>>>()
            .map(|data| data.into_iter().flatten().copied().collect());
        let fit_weights = parts
            .iter()
            .map(|v| v.fit_weights.as_ref())
            .collect::<Option<Vec<_>>>()
            .map(|weights| weights.into_iter().flatten().copied().collect());
        Self {
            calculated,
            fit_data,
            fit_weights,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.calculated.len()
    }

    pub fn calculated(&self) -> ArrayView1<'_, f64> {
        self.calculated.view()
    }

    pub fn calculated_mut(&mut self) -> ArrayViewMut1<'_, f64> {
        self.calculated.view_mut()
    }

    pub fn zero_calculated(&mut self) {
        self.calculated.fill(0.0);
    }

    /// Add calculated values of `other` to the slice starting at `offset`
    pub fn add_to_calculated(&mut self, offset: usize, other: &FunctionValues) {
        assert!(
            offset + other.size() <= self.size(),
            "values of size {} don't fit at offset {} into values of size {}",
            other.size(),
            offset,
            self.size(),
        );
        let mut window = self.calculated.slice_mut(s![offset..offset + other.size()]);
        window += &other.calculated;
    }

    pub fn has_fit_data(&self) -> bool {
        self.fit_data.is_some() && self.fit_weights.is_some()
    }

    pub fn fit_data(&self) -> Option<ArrayView1<'_, f64>> {
        self.fit_data.as_ref().map(|a| a.view())
    }

    pub fn fit_weights(&self) -> Option<ArrayView1<'_, f64>> {
        self.fit_weights.as_ref().map(|a| a.view())
    }

    /// Number of points taking part in a weighted fit
    pub fn n_weighted(&self) -> usize {
        self.fit_weights
            .as_ref()
            .map_or(self.size(), |w| w.iter().filter(|&&w| w != 0.0).count())
    }

}
