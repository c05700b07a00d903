use ndarray::Array1;
use rand::prelude::*;
use rand_distr::StandardNormal;

/// Gaussian peak on a linear background
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    pub height: f64,
    pub centre: f64,
    pub sigma: f64,
    pub a0: f64,
    pub a1: f64,
}

impl Peak {
    pub fn eval(&self, x: f64) -> f64 {
        self.height * f64::exp(-0.5 * ((x - self.centre) / self.sigma).powi(2))
            + self.a0
            + self.a1 * x
    }

    /// Peak with height in `[1, 10)`, centre in `[-2, 2)`, sigma in `[0.3, 1.5)` and a flat
    /// background in `[0, 1)`
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            height: rng.random_range(1.0..10.0),
            centre: rng.random_range(-2.0..2.0),
            sigma: rng.random_range(0.3..1.5),
            a0: rng.random_range(0.0..1.0),
            a1: 0.0,
        }
    }
}

/// Abscissas, observations and their errors
pub type SpectrumArrays = (Vec<f64>, Vec<f64>, Vec<f64>);

/// One spectrum per peak on a shared grid, Gaussian noise of `error` is added when `seed` is
/// given
pub fn peak_spectra(
    peaks: &[Peak],
    x: &[f64],
    error: f64,
    seed: Option<u64>,
) -> Vec<SpectrumArrays> {
    let mut rng = seed.map(StdRng::seed_from_u64);
    peaks
        .iter()
        .map(|peak| {
            let y = x
                .iter()
                .map(|&x| {
                    let noise = match &mut rng {
                        Some(rng) => error * rng.sample::<f64, _>(StandardNormal),
                        None => 0.0,
                    };
                    peak.eval(x) + noise
                })
                .collect();
            (x.to_vec(), y, vec![error; x.len()])
        })
        .collect()
}

/// `n` equally spaced points from `start` to `end` inclusive
pub fn grid(start: f64, end: f64, n: usize) -> Vec<f64> {
    Array1::linspace(start, end, n).to_vec()
}
