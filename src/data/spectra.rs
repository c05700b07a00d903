use crate::data::domain::{CompositeDomain, Domain, DomainTrait, PointsDomain};
use crate::data::function_values::FunctionValues;
use crate::error::DomainError;

use itertools::Itertools;
use ndarray::{s, Array1, ArrayView1};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

/// Workspace-like source of measured spectra
pub trait SpectraSource: Debug + Send + Sync {
    fn spectrum_count(&self) -> usize;

    /// X, Y and E arrays of a spectrum, `None` if `index` is out of range
    fn spectrum(&self, index: usize) -> Option<SpectrumView<'_>>;
}

/// Borrowed X, Y and E arrays of a single spectrum
///
/// `x` is either as long as `y` (point data) or one element longer (histogram bin edges).
#[derive(Clone, Debug)]
pub struct SpectrumView<'a> {
    pub x: ArrayView1<'a, f64>,
    pub y: ArrayView1<'a, f64>,
    pub e: ArrayView1<'a, f64>,
}

/// Owned spectrum
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub e: Array1<f64>,
}

impl Spectrum {
    pub fn new(
        x: impl Into<Array1<f64>>,
        y: impl Into<Array1<f64>>,
        e: impl Into<Array1<f64>>,
    ) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            e: e.into(),
        }
    }

    pub fn view(&self) -> SpectrumView<'_> {
        SpectrumView {
            x: self.x.view(),
            y: self.y.view(),
            e: self.e.view(),
        }
    }
}

/// In-memory [SpectraSource]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Spectra {
    spectra: Vec<Spectrum>,
}

impl Spectra {
    pub fn new(spectra: impl Into<Vec<Spectrum>>) -> Self {
        Self {
            spectra: spectra.into(),
        }
    }

    pub fn push(&mut self, spectrum: Spectrum) {
        self.spectra.push(spectrum);
    }
}

impl FromIterator<Spectrum> for Spectra {
    fn from_iter<I: IntoIterator<Item = Spectrum>>(iter: I) -> Self {
        Self {
            spectra: iter.into_iter().collect(),
        }
    }
}

impl SpectraSource for Spectra {
    fn spectrum_count(&self) -> usize {
        self.spectra.len()
    }

    fn spectrum(&self, index: usize) -> Option<SpectrumView<'_>> {
        self.spectra.get(index).map(Spectrum::view)
    }
}

/// Inclusive X interval used to select fitted points, open when a bound is `None`
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct XRange {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl XRange {
    pub fn new(start: Option<f64>, end: Option<f64>) -> Self {
        Self { start, end }
    }

    pub fn full() -> Self {
        Self::default()
    }

    /// Index range of sorted `x` values inside the interval
    fn index_range(&self, x: &[f64]) -> Range<usize> {
        let first = self.start.map_or(0, |start| x.partition_point(|&v| v < start));
        let last = self.end.map_or(x.len(), |end| x.partition_point(|&v| v <= end));
        first..last.max(first)
    }
}

/// Abscissas of a spectrum: bin centres for histograms, `x` itself otherwise
fn abscissas(index: usize, spectrum: &SpectrumView) -> Result<Vec<f64>, DomainError> {
    let (nx, ny) = (spectrum.x.len(), spectrum.y.len());
    if ny != spectrum.e.len() {
        return Err(DomainError::InvalidSpectrum {
            index,
            reason: "y and e have different lengths",
        });
    }
    if nx == ny {
        Ok(spectrum.x.to_vec())
    } else if nx == ny + 1 {
        Ok(spectrum
            .x
            .iter()
            .tuple_windows()
            .map(|(&left, &right)| 0.5 * (left + right))
            .collect())
    } else {
        Err(DomainError::InvalidSpectrum {
            index,
            reason: "x must be as long as y or one element longer",
        })
    }
}

/// Fit weight of a single observation
///
/// Inverse error, unity for a zero error, zero for non-finite data which excludes the point.
fn fit_weight(y: f64, e: f64) -> f64 {
    if !y.is_finite() || !e.is_finite() {
        0.0
    } else if e == 0.0 {
        1.0
    } else {
        e.abs().recip()
    }
}

/// Composite domain with one part per spectrum of a [SpectraSource]
///
/// Parts are built on first access and cached.
#[derive(Clone, Debug)]
pub struct SpectraDomain {
    source: Arc<dyn SpectraSource>,
    indices: Vec<usize>,
    ranges: Vec<Range<usize>>,
    parts: Vec<OnceLock<Domain>>,
    size: usize,
}

impl SpectraDomain {
    /// Domain over the spectra with the given indices, in that order
    pub fn new(
        source: Arc<dyn SpectraSource>,
        indices: impl Into<Vec<usize>>,
        x_range: XRange,
    ) -> Result<Self, DomainError> {
        let indices = indices.into();
        let count = source.spectrum_count();
        let ranges = indices
            .iter()
            .map(|&index| {
                let spectrum = source
                    .spectrum(index)
                    .ok_or(DomainError::IndexOutOfRange { index, count })?;
                let x = abscissas(index, &spectrum)?;
                Ok(x_range.index_range(&x))
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        let size = ranges.iter().map(|r| r.len()).sum();
        let parts = (0..indices.len()).map(|_| OnceLock::new()).collect();
        Ok(Self {
            source,
            indices,
            ranges,
            parts,
            size,
        })
    }

    /// Domain over every spectrum of the source, whole X range
    pub fn all(source: Arc<dyn SpectraSource>) -> Result<Self, DomainError> {
        let indices: Vec<_> = (0..source.spectrum_count()).collect();
        Self::new(source, indices, XRange::full())
    }

    pub fn spectrum_indices(&self) -> &[usize] {
        &self.indices
    }

    fn spectrum(&self, part: usize) -> SpectrumView<'_> {
        self.source
            .spectrum(self.indices[part])
            .expect("spectrum is validated on construction")
    }

    fn build_part(&self, part: usize) -> Domain {
        let index = self.indices[part];
        let x = abscissas(index, &self.spectrum(part))
            .expect("spectrum is validated on construction");
        PointsDomain::new(x[self.ranges[part].clone()].to_vec()).into()
    }
}

impl DomainTrait for SpectraDomain {
    fn size(&self) -> usize {
        self.size
    }

    fn as_composite(&self) -> Option<&dyn CompositeDomain> {
        Some(self)
    }

    fn fit_values(&self) -> Option<FunctionValues> {
        let mut data = Vec::with_capacity(self.size);
        let mut weights = Vec::with_capacity(self.size);
        for (part, range) in self.ranges.iter().enumerate() {
            let spectrum = self.spectrum(part);
            let y = spectrum.y.slice(s![range.clone()]);
            let e = spectrum.e.slice(s![range.clone()]);
            let before = weights.len();
            for (&y, &e) in y.iter().zip(e.iter()) {
                data.push(if y.is_finite() { y } else { 0.0 });
                weights.push(fit_weight(y, e));
            }
            let masked = weights[before..].iter().filter(|&&w| w == 0.0).count();
            if masked > 0 {
                log::warn!(
                    "spectrum {}: {} non-finite points are excluded from the fit",
                    self.indices[part],
                    masked
                );
            }
        }
        Some(FunctionValues::with_fit_data(data, weights))
    }
}

impl CompositeDomain for SpectraDomain {
    fn part_count(&self) -> usize {
        self.indices.len()
    }

    fn get_part(&self, index: usize) -> Result<&Domain, DomainError> {
        let cell = self.parts.get(index).ok_or(DomainError::IndexOutOfRange {
            index,
            count: self.parts.len(),
        })?;
        Ok(cell.get_or_init(|| self.build_part(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn source() -> Arc<dyn SpectraSource> {
        Arc::new(Spectra::new(vec![
            Spectrum::new(
                vec![0.0, 1.0, 2.0, 3.0],
                vec![1.0, 2.0, 3.0, 4.0],
                vec![0.5, 1.0, 0.0, 2.0],
            ),
            // histogram
            Spectrum::new(vec![0.0, 2.0, 4.0], vec![5.0, f64::NAN], vec![1.0, 1.0]),
        ]))
    }

    #[test]
    fn parts_and_offsets() {
        let domain = SpectraDomain::all(source()).unwrap();
        assert_eq!(domain.size(), 6);
        assert_eq!(domain.part_count(), 2);
        assert_eq!(domain.value_offsets().unwrap(), vec![0, 4, 6]);
        let histogram = domain.get_part(1).unwrap().as_points().unwrap();
        assert_eq!(histogram.x(), array![1.0, 3.0]);
        assert!(domain.get_part(2).is_err());
    }

    #[test]
    fn fit_values_weights() {
        let domain = SpectraDomain::all(source()).unwrap();
        let values = domain.fit_values().unwrap();
        assert_eq!(
            values.fit_data().unwrap(),
            array![1.0, 2.0, 3.0, 4.0, 5.0, 0.0]
        );
        assert_abs_diff_eq!(
            values.fit_weights().unwrap(),
            array![2.0, 1.0, 1.0, 0.5, 1.0, 0.0]
        );
    }

    #[test]
    fn x_range_selects_points() {
        let domain =
            SpectraDomain::new(source(), vec![1, 0], XRange::new(Some(1.0), Some(2.5))).unwrap();
        assert_eq!(domain.spectrum_indices(), [1, 0]);
        assert_eq!(domain.size(), 3);
        assert_eq!(
            domain.get_part(0).unwrap().as_points().unwrap().x(),
            array![1.0]
        );
        assert_eq!(
            domain.get_part(1).unwrap().as_points().unwrap().x(),
            array![1.0, 2.0]
        );
        assert_eq!(domain.fit_values().unwrap().fit_data().unwrap(), array![5.0, 2.0, 3.0]);
    }

    #[test]
    fn malformed_spectrum() {
        let source: Arc<dyn SpectraSource> = Arc::new(Spectra::new(vec![Spectrum::new(
            vec![0.0],
            vec![1.0, 2.0],
            vec![1.0, 1.0],
        )]));
        assert!(matches!(
            SpectraDomain::all(source.clone()),
            Err(DomainError::InvalidSpectrum { index: 0, .. })
        ));
        assert_eq!(
            SpectraDomain::new(source, vec![3], XRange::full()).unwrap_err(),
            DomainError::IndexOutOfRange { index: 3, count: 1 }
        );
    }
}
