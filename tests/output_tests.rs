// tests/output_tests.rs

use clove_match::ast::Expr;
use clove_match::compiler::{Transformer, compile};
use clove_match::output::explain;
use serde_json::json;

#[test]
fn test_explain_deferred_comparison() {
    let def = compile(&Expr::equals(Expr::field(&["a"]), Expr::field(&["b"]))).unwrap();
    let expected = "\
buckets: 1, slots: 2, expressions: 1
tree:
  0: leaf
plan:
  \"a\":
    capture $0
  \"b\":
    capture $1
  after:
    #0 == $0 $1
";
    assert_eq!(explain(&def), expected);
}

#[test]
fn test_explain_deferred_loop() {
    let expr = Expr::every_in(
        1,
        Expr::field(&["items"]),
        Expr::less_equals(Expr::var_field(1, &["price"]), Expr::field(&["limit"])),
    );
    let expected = "\
buckets: 2, slots: 2, expressions: 1
tree:
  0: barrier 1
  1: leaf
plan:
  \"items\":
    capture $1
  \"limit\":
    capture $0
  after:
    #0 every in $1
      \"price\":
        #1 <= @ $0
";
    assert_eq!(explain(&compile(&expr).unwrap()), expected);
}

#[test]
fn test_explain_batch_and_pattern() {
    let exprs = vec![
        Expr::like(Expr::field(&["say \"hi\""]), "^h"),
        Expr::not(Expr::exists(Expr::field(&["x"]))),
    ];
    let text = explain(&Transformer::new().transform_batch(&exprs).unwrap());

    let test_cases = vec![
        "buckets: 4, slots: 0, expressions: 2",
        "0: barrier 1 2",
        "2: not 3",
        "\"say \\\"hi\\\"\":",
        "#1 =~ @ /^h/",
        "#3 exists @",
    ];
    for expected in test_cases {
        assert!(text.contains(expected), "missing {:?} in:\n{}", expected, text);
    }
}

#[test]
fn test_explain_functions_and_literals() {
    let expr = Expr::greater_than(
        Expr::func(clove_match::ast::FuncName::Abs, vec![Expr::field(&["d"])]),
        Expr::value(json!({"k": [1]})),
    );
    let text = explain(&compile(&expr).unwrap());
    assert!(text.contains(r#"#0 > abs(@) {"k":[1]}"#), "got:\n{}", text);
}
