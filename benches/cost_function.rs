use criterion::Criterion;
use multidomain_fit::{
    CostFunction, CostFunctionOptions, CostMeasure, DenseJacobian, Domain, DomainTrait,
    FitFunction, FunctionValues, Gaussian, LinearBackground, MultiDomainFunction, Spectra,
    SpectraDomain, Spectrum,
};
use multidomain_fit_test_util::{grid, peak_spectra, Peak};
use rand::prelude::*;
use std::hint::black_box;
use std::sync::Arc;

const N_SPECTRA: usize = 8;
const N_POINTS: usize = 2000;

fn domain() -> (Vec<Peak>, Arc<Domain>) {
    let mut rng = StdRng::seed_from_u64(0);
    let peaks: Vec<_> = (0..N_SPECTRA).map(|_| Peak::random(&mut rng)).collect();
    let spectra: Spectra = peak_spectra(&peaks, &grid(-5.0, 5.0, N_POINTS), 0.1, Some(1))
        .into_iter()
        .map(|(x, y, e)| Spectrum::new(x, y, e))
        .collect();
    let domain = SpectraDomain::all(Arc::new(spectra)).unwrap();
    (peaks, Arc::new(domain.into()))
}

fn router(peaks: &[Peak]) -> MultiDomainFunction {
    let mut router = MultiDomainFunction::new();
    for (i, peak) in peaks.iter().enumerate() {
        router.add_function(Gaussian::new(peak.height, peak.centre + 0.1, peak.sigma));
        router.set_local_attribute(i, "domains", "i").unwrap();
    }
    router.add_function(LinearBackground::new(0.5, 0.0));
    router
}

pub fn bench_cost_function(c: &mut Criterion) {
    let (peaks, domain) = domain();
    let measures = [
        ("least squares", CostMeasure::least_squares()),
        ("Rwp", CostMeasure::rwp()),
        ("Poisson", CostMeasure::poisson()),
    ];
    let options = [
        ("parallel", CostFunctionOptions::default()),
        ("sequential", CostFunctionOptions::sequential()),
    ];
    for (measure_name, measure) in measures {
        for (options_name, options) in options.iter() {
            let mut cost =
                CostFunction::new(measure.clone(), router(&peaks), domain.clone(), None)
                    .unwrap()
                    .with_options(options.clone());
            let parameters = cost.parameters();
            c.bench_function(
                &format!("Cost {measure_name} value, {options_name}"),
                |b| {
                    b.iter(|| {
                        cost.set_parameters(black_box(&parameters)).unwrap();
                        cost.value().unwrap()
                    });
                },
            );
            c.bench_function(
                &format!("Cost {measure_name} value, gradient and Hessian, {options_name}"),
                |b| {
                    b.iter(|| {
                        cost.set_parameters(black_box(&parameters)).unwrap();
                        cost.hessian().unwrap()
                    });
                },
            );
        }
    }
}

pub fn bench_router(c: &mut Criterion) {
    let (peaks, domain) = domain();
    let size = domain.size();
    for (name, parallel) in [("parallel", true), ("sequential", false)] {
        let function = router(&peaks).with_parallel(parallel);
        let mut values = FunctionValues::new(size);
        c.bench_function(&format!("Router evaluation, {name}"), |b| {
            b.iter(|| function.function(black_box(&domain), &mut values).unwrap());
        });
    }
    let mut function = router(&peaks);
    let n_params = function.n_params();
    c.bench_function("Router Jacobian", |b| {
        b.iter(|| {
            let mut jacobian = DenseJacobian::zeros(size, n_params);
            function
                .function_deriv(black_box(&domain), &mut jacobian)
                .unwrap();
            jacobian
        });
    });
}
