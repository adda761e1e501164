//! Fits with each model family.

use approx::assert_relative_eq;
use numfit_rs::expression::ExpressionContext;
use numfit_rs::fit::{Algorithm, FitConfig, FitEngine};
use numfit_rs::models::{
    ExponentialModel, ExpressionModel, MultiPeakModel, PeakShape, PluginModel, PluginRegistry,
    PluginUnit, PolynomialModel, SYMBOL_NAME, SYMBOL_PARAMETERS,
};
use numfit_rs::parameters::ParameterSet;
use numfit_rs::FitModel;

use crate::test_helpers::{exact_dataset, grid, noisy_dataset};

fn precise() -> FitEngine {
    FitEngine::new(FitConfig::default().with_tolerance(1e-10))
}

#[test]
fn test_polynomial_orders() {
    let x = grid(-2.0, 2.0, 30);
    let line = exact_dataset("line", &x, |x| 1.0 - 0.5 * x);
    let result = FitEngine::default()
        .fit(&line, &PolynomialModel::linear(), None)
        .unwrap();
    assert_eq!(result.algorithm, Algorithm::LinearLeastSquares);
    assert!(result.summary().contains("Iterations = 1\n"));

    // higher orders have no closed form and start from zero coefficients
    let cubic = exact_dataset("cubic", &x, |x| 1.0 - x + 0.5 * x * x + 0.25 * x * x * x);
    let result = precise()
        .fit(&cubic, &PolynomialModel::new(3).unwrap(), None)
        .unwrap();
    assert_eq!(result.algorithm, Algorithm::ScaledLevenbergMarquardt);
    for (name, expected) in [("a0", 1.0), ("a1", -1.0), ("a2", 0.5), ("a3", 0.25)] {
        assert_relative_eq!(result.value(name).unwrap(), expected, epsilon = 1e-6);
    }
    assert!(result.summary().contains("Iterations ="));
}

#[test]
fn test_two_term_decay() {
    let x = grid(0.0, 20.0, 200);
    let data = exact_dataset("double", &x, |x| {
        3.0 * (-x / 0.8).exp() + 2.0 * (-x / 6.0).exp() + 0.2
    });
    let model = ExponentialModel::decay(2).unwrap();
    let start =
        ParameterSet::from_values(&["A1", "t1", "A2", "t2", "y0"], &[2.0, 0.5, 1.0, 4.0, 0.0])
            .unwrap();
    let config = FitConfig::default().with_tolerance(1e-8);
    let result = FitEngine::new(config).fit(&data, &model, Some(&start)).unwrap();
    assert!(result.status.is_converged());
    assert!(result.r_squared() > 0.999_999);
    let mut times = [result.value("t1").unwrap(), result.value("t2").unwrap()];
    times.sort_by(f64::total_cmp);
    assert_relative_eq!(times[0], 0.8, epsilon = 1e-3);
    assert_relative_eq!(times[1], 6.0, epsilon = 1e-3);
}

#[test]
fn test_expression_model_fit() {
    let ctx = ExpressionContext::new();
    let model = ExpressionModel::new("a*sin(b*x) + c", &ctx).unwrap();
    assert_eq!(model.parameter_names(), vec!["a", "b", "c"]);

    let x = grid(0.0, 6.0, 80);
    let data = noisy_dataset("wave", &x, |x| 1.5 * (1.2 * x).sin() + 0.3, 0.005, 3);
    let start = ParameterSet::from_values(&["a", "b", "c"], &[1.0, 1.1, 0.0]).unwrap();
    let result = FitEngine::default().fit(&data, &model, Some(&start)).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), 1.5, epsilon = 5e-3);
    assert_relative_eq!(result.value("b").unwrap(), 1.2, epsilon = 5e-3);
    assert_relative_eq!(result.value("c").unwrap(), 0.3, epsilon = 5e-3);
    assert!(result.formula.starts_with("y = a*sin(b*x)"));
}

#[test]
fn test_expression_with_user_constant() {
    let ctx = ExpressionContext::new().with_constant("k", 2.0);
    let model = ExpressionModel::new("a*exp(-k*x)", &ctx).unwrap();
    assert_eq!(model.parameter_names(), vec!["a"]);
    let x = grid(0.0, 2.0, 20);
    let data = exact_dataset("k", &x, |x| 4.0 * (-2.0 * x).exp());
    let result = precise().fit(&data, &model, None).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), 4.0, epsilon = 1e-6);
}

#[test]
fn test_plugin_model_fit() {
    let unit = PluginUnit::new()
        .with_text(SYMBOL_NAME, "Power")
        .with_text(SYMBOL_PARAMETERS, "a, n")
        .with_eval(|x, p| p[0] * x.powf(p[1]))
        .with_jacobian(|x, p, row| {
            row[0] = x.powf(p[1]);
            row[1] = p[0] * x.powf(p[1]) * x.ln();
        });
    let registry = PluginRegistry::new().with_unit("fit_plugins/power.so", unit);
    let model = PluginModel::load(&registry, "fit_plugins/power.so").unwrap();
    assert!(model.has_custom_jacobian());

    let x = grid(0.5, 4.0, 30);
    let data = exact_dataset("power", &x, |x| 2.0 * x.powf(1.5));
    let result = precise().fit(&data, &model, None).unwrap();
    assert_eq!(result.model_name, "Power");
    assert_relative_eq!(result.value("a").unwrap(), 2.0, epsilon = 1e-6);
    assert_relative_eq!(result.value("n").unwrap(), 1.5, epsilon = 1e-6);
}

#[test]
fn test_lorentzian_peak_area() {
    let x = grid(-20.0, 20.0, 401);
    let data = exact_dataset("peak", &x, |x| {
        PeakShape::Lorentzian.value(x, 5.0, 1.0, 2.0) + 0.1
    });
    let model = MultiPeakModel::new(PeakShape::Lorentzian, &[0.5]).unwrap();
    let result = precise().fit(&data, &model, None).unwrap();
    assert_relative_eq!(result.value("A").unwrap(), 5.0, epsilon = 1e-5);
    assert_relative_eq!(result.value("xc").unwrap(), 1.0, epsilon = 1e-5);
    assert_relative_eq!(result.value("w").unwrap(), 2.0, epsilon = 1e-5);

    assert_eq!(result.components.len(), 1);
    let component = &result.components[0];
    assert_relative_eq!(component.area, 5.0, epsilon = 1e-4);
    assert!(component.curve.is_some());
    assert!(result.summary().contains("Peak 1 area = "));
}
