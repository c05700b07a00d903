use crate::cost_function::options::CostFunctionOptions;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// Derivatives requested from a reduction pass, the value is always computed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request {
    pub gradient: bool,
    pub hessian: bool,
}

impl Request {
    pub const VALUE: Self = Self {
        gradient: false,
        hessian: false,
    };

    #[inline]
    pub fn needs_jacobian(&self) -> bool {
        self.gradient || self.hessian
    }
}

/// Model predictions and observations entering a reduction
#[derive(Clone, Debug)]
pub struct Residuals<'a> {
    pub calculated: ArrayView1<'a, f64>,
    pub observed: ArrayView1<'a, f64>,
    pub weights: ArrayView1<'a, f64>,
    /// Derivatives of calculated values with respect to the active parameters, present whenever
    /// a derivative is requested
    pub jacobian: Option<ArrayView2<'a, f64>>,
}

impl Residuals<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        self.calculated.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.calculated.is_empty()
    }

    pub fn n_params(&self) -> usize {
        self.jacobian.as_ref().map_or(0, |j| j.ncols())
    }
}

/// Cost value with the requested derivatives
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    pub gradient: Option<Array1<f64>>,
    pub hessian: Option<Array2<f64>>,
}

impl Evaluation {
    pub fn zeros(n_params: usize, request: Request) -> Self {
        Self {
            value: 0.0,
            gradient: request.gradient.then(|| Array1::zeros(n_params)),
            hessian: request.hessian.then(|| Array2::zeros((n_params, n_params))),
        }
    }

    #[inline]
    pub fn add_value(&mut self, x: f64) {
        self.value += x;
    }

    #[inline]
    pub fn add_gradient(&mut self, scale: f64, row: ArrayView1<'_, f64>) {
        if let Some(gradient) = &mut self.gradient {
            gradient.scaled_add(scale, &row);
        }
    }

    /// Add `scale * row * row^T` to the lower triangle of the Hessian
    pub fn add_outer_lower(&mut self, scale: f64, row: ArrayView1<'_, f64>) {
        if let Some(hessian) = &mut self.hessian {
            for p in 0..row.len() {
                let a = scale * row[p];
                if a == 0.0 {
                    continue;
                }
                for q in 0..=p {
                    hessian[(p, q)] += a * row[q];
                }
            }
        }
    }

    /// Copy the lower triangle of the Hessian to the upper one
    pub fn mirror_hessian(&mut self) {
        if let Some(hessian) = &mut self.hessian {
            for p in 0..hessian.nrows() {
                for q in 0..p {
                    hessian[(q, p)] = hessian[(p, q)];
                }
            }
        }
    }
}

/// `f64` which can be added to from many threads
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(x: f64) -> Self {
        Self(AtomicU64::new(x.to_bits()))
    }

    fn add(&self, x: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let new = (f64::from_bits(current) + x).to_bits();
            match self
                .0
                .compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    fn into_inner(self) -> f64 {
        f64::from_bits(self.0.into_inner())
    }
}

/// Shared sums of per-chunk partial evaluations
struct Accumulator {
    value: AtomicF64,
    gradient: Option<Mutex<Array1<f64>>>,
    hessian: Option<Mutex<Array2<f64>>>,
}

impl Accumulator {
    fn new(n_params: usize, request: Request) -> Self {
        let Evaluation {
            gradient, hessian, ..
        } = Evaluation::zeros(n_params, request);
        Self {
            value: AtomicF64::new(0.0),
            gradient: gradient.map(|g| Mutex::new(g)),
            hessian: hessian.map(|h| Mutex::new(h)),
        }
    }

    fn add(&self, partial: Evaluation) {
        self.value.add(partial.value);
        if let (Some(total), Some(partial)) = (&self.gradient, partial.gradient) {
            *total.lock() += &partial;
        }
        if let (Some(total), Some(partial)) = (&self.hessian, partial.hessian) {
            *total.lock() += &partial;
        }
    }

    fn into_evaluation(self) -> Evaluation {
        Evaluation {
            value: self.value.into_inner(),
            gradient: self.gradient.map(|g| g.into_inner()),
            hessian: self.hessian.map(|h| h.into_inner()),
        }
    }
}

/// Sum per-point contributions added by `kernel`
///
/// `kernel(i, partial)` adds the contribution of point `i` to `partial`. Only the lower triangle
/// of the Hessian is expected to be filled, see [Evaluation::mirror_hessian]. With parallel
/// options points are split into chunks, every chunk is reduced on its own and the partial sums
/// are added to the shared total, so the summation order depends on scheduling.
pub fn reduce_points<K>(
    n_points: usize,
    n_params: usize,
    request: Request,
    options: &CostFunctionOptions,
    kernel: K,
) -> Evaluation
where
    K: Fn(usize, &mut Evaluation) + Sync,
{
    let chunk_size = options.chunk_size.max(1);
    if !options.parallel || n_points <= chunk_size {
        let mut evaluation = Evaluation::zeros(n_params, request);
        for i in 0..n_points {
            kernel(i, &mut evaluation);
        }
        return evaluation;
    }

    let accumulator = Accumulator::new(n_params, request);
    let n_chunks = n_points.div_ceil(chunk_size);
    (0..n_chunks).into_par_iter().for_each(|chunk| {
        let start = chunk * chunk_size;
        let end = usize::min(start + chunk_size, n_points);
        let mut partial = Evaluation::zeros(n_params, request);
        for i in start..end {
            kernel(i, &mut partial);
        }
        accumulator.add(partial);
    });
    accumulator.into_evaluation()
}

/// `factor * Σ w² r²` with gradient `2 factor Σ w² r J` and Gauss-Newton Hessian
/// `2 factor Σ w² J J^T`
///
/// Points with zero weight are skipped, so masked observations may hold any value.
pub fn accumulate_weighted_squares(
    residuals: &Residuals<'_>,
    request: Request,
    options: &CostFunctionOptions,
) -> Evaluation {
    let factor = options.factor;
    let mut evaluation = reduce_points(
        residuals.len(),
        residuals.n_params(),
        request,
        options,
        |i, partial| {
            let w = residuals.weights[i];
            if w == 0.0 {
                return;
            }
            let w2 = w * w;
            let r = residuals.calculated[i] - residuals.observed[i];
            partial.add_value(factor * w2 * r * r);
            if let Some(jacobian) = &residuals.jacobian {
                partial.add_gradient(2.0 * factor * w2 * r, jacobian.row(i));
                partial.add_outer_lower(2.0 * factor * w2, jacobian.row(i));
            }
        },
    );
    evaluation.mirror_hessian();
    evaluation
}
