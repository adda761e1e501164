//! End-to-end fits: extraction, optimizer choice, statistics and reporting.

use approx::assert_relative_eq;
use numfit_rs::data::{CurveRef, Range, Table, WeightingScheme};
use numfit_rs::fit::{
    Algorithm, CurveCollector, CurveSampling, FitConfig, FitEngine, FitStatus, PlotSink,
};
use numfit_rs::models::{BoltzmannModel, ExponentialModel, PolynomialModel};
use numfit_rs::parameters::{Parameter, ParameterSet};
use numfit_rs::{FitError, FitModel};

use crate::test_helpers::{exact_dataset, grid, init_logging, noisy_dataset};

#[test]
fn test_fit_from_table_with_range() {
    init_logging();
    let x = grid(0.0, 10.0, 21);
    let y: Vec<f64> = x.iter().map(|x| if *x <= 5.0 { 2.0 * x + 1.0 } else { 100.0 }).collect();
    let table = Table::new("Table1")
        .with_numeric("A", x)
        .with_numeric("B", y);
    let config = FitConfig::default().with_range(Range::new(0.0, 5.0).unwrap());
    let result = FitEngine::new(config)
        .fit_source(
            &table,
            &CurveRef::new("Table1_B", "A", "B"),
            &PolynomialModel::linear(),
            None,
        )
        .unwrap();

    assert_eq!(result.points, 11);
    assert_eq!(result.x_range, (0.0, 5.0));
    assert_relative_eq!(result.value("a0").unwrap(), 1.0, epsilon = 1e-10);
    assert_relative_eq!(result.value("a1").unwrap(), 2.0, epsilon = 1e-10);
}

#[test]
fn test_missing_column_is_reported() {
    let table = Table::new("Table1").with_numeric("A", vec![1.0, 2.0]);
    let err = FitEngine::default()
        .fit_source(
            &table,
            &CurveRef::new("Table1_B", "A", "B"),
            &PolynomialModel::linear(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, FitError::EmptySelection(ref name) if name == "B"));
}

#[test]
fn test_instrumental_weighting_changes_errors() {
    let x = grid(0.0, 4.0, 9);
    let y: Vec<f64> = x.iter().map(|x| 0.5 * x + (x * 3.0).sin() * 0.1).collect();
    let sigma = vec![0.1; x.len()];
    let table = Table::new("T")
        .with_numeric("x", x)
        .with_numeric("y", y)
        .with_numeric("err", sigma);
    let curve = CurveRef::new("T_y", "x", "y").with_error("err");

    let unweighted = FitEngine::default()
        .fit_source(&table, &curve, &PolynomialModel::linear(), None)
        .unwrap();
    let weighted = FitEngine::new(FitConfig::default().with_weighting(WeightingScheme::Instrumental))
        .fit_source(&table, &curve, &PolynomialModel::linear(), None)
        .unwrap();

    // Uniform weights leave the estimate alone but scale χ² by 1/σ²
    assert_relative_eq!(
        weighted.value("a1").unwrap(),
        unweighted.value("a1").unwrap(),
        epsilon = 1e-10
    );
    assert_relative_eq!(
        weighted.chi_square(),
        unweighted.chi_square() * 100.0,
        max_relative = 1e-8
    );
    assert!(weighted.summary().contains("Weighting Method: Instrumental"));
}

#[test]
fn test_algorithms_agree_on_decay() {
    init_logging();
    let x = grid(0.0, 10.0, 60);
    let data = noisy_dataset("decay", &x, |x| 5.0 * (-x / 2.5).exp() + 1.0, 0.01, 7);
    let model = ExponentialModel::decay(1).unwrap();

    let mut values = Vec::new();
    for algorithm in [
        Algorithm::ScaledLevenbergMarquardt,
        Algorithm::LevenbergMarquardt,
        Algorithm::Simplex,
    ] {
        let config = FitConfig::default()
            .with_algorithm(algorithm)
            .with_tolerance(1e-8)
            .with_max_iterations(5000);
        let result = FitEngine::new(config).fit(&data, &model, None).unwrap();
        assert_eq!(result.algorithm, algorithm);
        values.push(result.value("t").unwrap());
    }
    for t in &values {
        assert_relative_eq!(*t, 2.5, epsilon = 0.05);
    }
    assert_relative_eq!(values[0], values[1], epsilon = 1e-4);
}

#[test]
fn test_scaled_fit_from_zero_amplitude() {
    let x = grid(0.0, 10.0, 51);
    let data = exact_dataset("decay", &x, |x| 5.0 * (-x / 2.5).exp() + 1.0);
    let start = ParameterSet::from_values(&["A", "t", "y0"], &[0.0, 1.0, 0.0]).unwrap();
    let result = FitEngine::new(FitConfig::default().with_tolerance(1e-10))
        .fit(&data, &ExponentialModel::decay(1).unwrap(), Some(&start))
        .unwrap();
    assert_eq!(result.algorithm, Algorithm::ScaledLevenbergMarquardt);
    assert!(result.status.is_converged());
    assert_relative_eq!(result.value("A").unwrap(), 5.0, epsilon = 1e-6);
    assert_relative_eq!(result.value("t").unwrap(), 2.5, epsilon = 1e-6);
    assert_relative_eq!(result.value("y0").unwrap(), 1.0, epsilon = 1e-6);
}

#[test]
fn test_parameter_significance() {
    let x = grid(0.0, 10.0, 40);
    let data = noisy_dataset("line", &x, |x| 0.8 * x + 0.01, 0.2, 3);
    let result = FitEngine::new(FitConfig::default().with_confidence_level(99.0))
        .fit(&data, &PolynomialModel::linear(), None)
        .unwrap();
    let slope = result.parameter_tests[1];
    let intercept = result.parameter_tests[0];
    assert_relative_eq!(
        slope.t_value,
        result.value("a1").unwrap() / result.error("a1").unwrap(),
        max_relative = 1e-12
    );
    assert_eq!(slope.p_value, 0.0);
    assert!(intercept.p_value > 1e-9);
    // the 99% margin is wider than one standard error
    assert!(slope.margin > 2.5 * result.error("a1").unwrap());

    let stats = &result.statistics;
    assert!(stats.f_statistic > 100.0);
    assert_eq!(stats.f_p_value, 0.0);
    assert!(stats.aic < stats.bic);
    assert!(result.summary().contains("99% margin"));

    let err = FitEngine::new(FitConfig::default().with_confidence_level(100.0))
        .fit(&data, &PolynomialModel::linear(), None)
        .unwrap_err();
    assert!(matches!(err, FitError::ConfigurationError(_)));
}

#[test]
fn test_boltzmann_with_fixed_parameter() {
    let x = grid(-5.0, 5.0, 41);
    let data = exact_dataset("step", &x, |x| 3.0 + (1.0 - 3.0) / (1.0 + (x / 0.8).exp()));

    let model = BoltzmannModel::new();
    let mut params = ParameterSet::new();
    params.add_param("A1", 0.8).unwrap();
    params.add(Parameter::fixed("A2", 3.0)).unwrap();
    params.add_param("x0", 0.5).unwrap();
    params.add_param("dx", 1.0).unwrap();

    let result = FitEngine::new(FitConfig::default().with_tolerance(1e-10))
        .fit(&data, &model, Some(&params))
        .unwrap();
    assert!(result.status.is_converged());
    assert_eq!(result.value("A2"), Some(3.0));
    assert_eq!(result.error("A2"), Some(0.0));
    assert_relative_eq!(result.value("A1").unwrap(), 1.0, epsilon = 1e-5);
    assert_relative_eq!(result.value("x0").unwrap(), 0.0, epsilon = 1e-5);
    assert_relative_eq!(result.value("dx").unwrap(), 0.8, epsilon = 1e-5);
}

#[test]
fn test_bounded_parameter_stays_inside() {
    let x = grid(0.0, 5.0, 30);
    let data = exact_dataset("line", &x, |x| 2.0 * x + 1.0);
    let mut params = ParameterSet::new();
    params.add_param_with_bounds("a0", 0.0, -0.5, 0.5).unwrap();
    params.add_param("a1", 1.0).unwrap();

    let result = FitEngine::default()
        .fit(&data, &PolynomialModel::linear(), Some(&params))
        .unwrap();
    // constrained parameters skip the closed form
    assert_eq!(result.algorithm, Algorithm::ScaledLevenbergMarquardt);
    let a0 = result.value("a0").unwrap();
    assert!((-0.5..=0.5).contains(&a0));
    assert_relative_eq!(a0, 0.5, epsilon = 1e-3);
}

#[test]
fn test_curve_sampling_modes() {
    let x = grid(0.0, 3.0, 7);
    let data = exact_dataset("quad", &x, |x| x * x);
    let model = PolynomialModel::new(2).unwrap();

    let uniform = FitEngine::new(FitConfig::default().with_sampling(CurveSampling::Uniform(25)))
        .fit(&data, &model, None)
        .unwrap();
    let curve = uniform.curve.as_ref().unwrap();
    assert_eq!(curve.len(), 25);
    assert_eq!(curve.x[0], 0.0);
    assert_eq!(curve.x[24], 3.0);

    let at_points = FitEngine::new(FitConfig::default().with_sampling(CurveSampling::DataPoints))
        .fit(&data, &model, None)
        .unwrap();
    assert_eq!(at_points.curve.as_ref().unwrap().x, x);

    let none = FitEngine::new(FitConfig::default().with_sampling(CurveSampling::None))
        .fit(&data, &model, None)
        .unwrap();
    assert!(none.curve.is_none());

    let mut sink = CurveCollector::new();
    assert!(uniform.register_curve(&mut sink).is_some());
    let handle = sink.add_curve(curve, "copy");
    assert_eq!(sink.get(handle).unwrap().len(), 25);
}

#[test]
fn test_iteration_cap_is_reported() {
    let x = grid(0.0, 10.0, 40);
    let data = exact_dataset("decay", &x, |x| 5.0 * (-x / 2.5).exp() + 1.0);
    let config = FitConfig::default()
        .with_algorithm(Algorithm::Simplex)
        .with_tolerance(1e-14)
        .with_max_iterations(3);
    let result = FitEngine::new(config)
        .fit(&data, &ExponentialModel::decay(1).unwrap(), None)
        .unwrap();
    assert_eq!(result.status, FitStatus::MaxIterationsReached);
    assert!(result.summary().contains("Status = maximum number of iterations reached"));
    assert!(matches!(
        result.require_converged(),
        Err(FitError::NonConvergence { .. })
    ));
}

#[test]
fn test_scale_errors() {
    let x = grid(0.0, 10.0, 50);
    let data = noisy_dataset("line", &x, |x| 0.3 * x - 2.0, 0.5, 11);
    let model = PolynomialModel::linear();
    let plain = FitEngine::default().fit(&data, &model, None).unwrap();
    let scaled = FitEngine::new(FitConfig::default().with_scale_errors(true))
        .fit(&data, &model, None)
        .unwrap();
    let factor = plain.reduced_chi_square().sqrt();
    assert_relative_eq!(
        scaled.error("a1").unwrap(),
        plain.error("a1").unwrap() * factor,
        max_relative = 1e-10
    );
}

#[test]
fn test_result_json_round_trip() {
    let x = grid(0.0, 1.0, 5);
    let data = exact_dataset("line", &x, |x| x);
    let result = FitEngine::default()
        .fit(&data, &PolynomialModel::linear(), None)
        .unwrap();
    let back = numfit_rs::FitResult::from_json(&result.to_json().unwrap()).unwrap();
    assert_eq!(back.parameters.names(), result.parameters.names());
    assert_eq!(back.points, 5);
    assert_eq!(back.formula, PolynomialModel::linear().formula());
}
