//! Formula compilation against host data.

use approx::assert_relative_eq;
use numfit_rs::data::Table;
use numfit_rs::expression::{compile, detect_parameters, parse, Compiler, ExpressionContext};
use numfit_rs::fit::FitEngine;
use numfit_rs::models::ExpressionModel;
use numfit_rs::{FitError, FitModel};

use crate::test_helpers::{exact_dataset, grid};

#[test]
fn test_context_from_table() {
    let table = Table::new("Book1")
        .with_numeric("A", vec![1.0, 2.0, 3.0, 4.0])
        .with_text("B", vec!["10", "20", "n/a", "40"]);
    let ctx = ExpressionContext::from_source(&table);
    assert!(ctx.has_column("A"));
    assert!(ctx.has_column("B"));

    let expr = compile("cell(\"B\", x) / size(\"A\")", &[] as &[&str], &ctx).unwrap();
    assert!(expr.parameter_names().is_empty());
    assert_relative_eq!(expr.eval(2.0, &[]), 5.0);
    assert!(expr.eval(3.0, &[]).is_nan());
    // NaN cells are skipped by the statistics
    let mean = compile("mean(\"B\")", &[] as &[&str], &ctx).unwrap();
    assert_relative_eq!(mean.eval(0.0, &[]), 70.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn test_custom_variable_name() {
    let ctx = ExpressionContext::new();
    let expr = Compiler::new(&ctx)
        .variable("t")
        .parameters(&["k"])
        .compile("exp(-k*t)")
        .unwrap();
    assert_eq!(expr.variable(), "t");
    assert_relative_eq!(expr.eval(2.0, &[0.5]), (-1.0_f64).exp());

    assert!(matches!(
        Compiler::new(&ctx).variable("t").parameters(&["k"]).compile("k*x"),
        Err(FitError::UnknownIdentifier(name)) if name == "x"
    ));
}

#[test]
fn test_detected_parameter_order() {
    let ctx = ExpressionContext::new().with_constant("c0", 3.0e8);
    let names = detect_parameters("y0 + A*gauss(x, xc, w) + c0*e", "x", &ctx).unwrap();
    assert_eq!(names, vec!["y0", "A", "xc", "w"]);
}

#[test]
fn test_parse_errors_carry_position() {
    match parse("a*x )") {
        Err(FitError::ParseError { position, .. }) => assert_eq!(position, 4),
        other => panic!("expected a parse error, got {:?}", other),
    }
    assert!(matches!(parse("2 * (x + 1"), Err(FitError::ParseError { .. })));
    assert!(matches!(parse(""), Err(FitError::EmptyExpression)));

    let ctx = ExpressionContext::new();
    assert!(matches!(
        compile("nosuch(x)", &["a"], &ctx),
        Err(FitError::ParseError { .. })
    ));
    assert!(matches!(
        compile("pow(x)", &["a"], &ctx),
        Err(FitError::ParseError { .. })
    ));
}

#[test]
fn test_fit_with_table_statistic() {
    let x = grid(0.0, 5.0, 26);
    let table = Table::new("ref").with_numeric("baseline", vec![0.5, 1.5]);
    let ctx = ExpressionContext::from_source(&table);
    let model = ExpressionModel::new("a*x^2 + mean(\"baseline\")", &ctx).unwrap();
    assert_eq!(model.parameter_names(), vec!["a"]);

    let data = exact_dataset("parabola", &x, |x| 0.7 * x * x + 1.0);
    let result = FitEngine::default().fit(&data, &model, None).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), 0.7, epsilon = 1e-6);
}
