// tests/compiler_tests.rs

use clove_match::ast::{CompareOp, Expr, FuncName, LoopMode};
use clove_match::bintree::NodeType;
use clove_match::compiler::{CompileError, ExecNode, MatchDef, Operand, Transformer, compile};
use clove_match::value::FastVal;
use serde_json::json;

fn child<'a>(node: &'a ExecNode, path: &[&str]) -> &'a ExecNode {
    path.iter().fold(node, |node, key| {
        node.elems
            .get(*key)
            .unwrap_or_else(|| panic!("no plan node for key {:?}", key))
    })
}

fn brett() -> Expr {
    Expr::or(vec![
        Expr::equals(Expr::field(&["name", "first"]), Expr::value(json!("Brett"))),
        Expr::and(vec![
            Expr::less_than(Expr::field(&["age"]), Expr::value(json!(50))),
            Expr::equals(Expr::field(&["isActive"]), Expr::value(json!(true))),
        ]),
    ])
}

// ============================================================================
// Resolution Tree Layout
// ============================================================================

#[test]
fn test_tree_layout_follows_expression() {
    let def = compile(&brett()).unwrap();

    let kinds: Vec<NodeType> = def.tree.nodes().iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![NodeType::Or, NodeType::Leaf, NodeType::And, NodeType::Leaf, NodeType::Leaf]
    );
    assert_eq!(def.tree.node(0).left, 1);
    assert_eq!(def.tree.node(0).right, 2);
    assert_eq!(def.tree.node(2).left, 3);
    assert_eq!(def.tree.node(2).right, 4);
    assert_eq!(def.match_buckets, vec![0]);
    assert!(!def.is_batch());
}

#[test]
fn test_long_lists_fold_into_chains() {
    let expr = Expr::and(vec![
        Expr::exists(Expr::field(&["a"])),
        Expr::exists(Expr::field(&["b"])),
        Expr::exists(Expr::field(&["c"])),
    ]);
    let def = compile(&expr).unwrap();

    // 0: AND(1, 2); 2: AND(3, 4)
    assert_eq!(def.num_buckets(), 5);
    assert_eq!(def.tree.node(0).kind, NodeType::And);
    assert_eq!(def.tree.node(2).kind, NodeType::And);
    assert_eq!(def.tree.node(2).parent, 0);
    assert_eq!(def.tree.node(4).parent, 2);
}

#[test]
fn test_empty_lists_are_constants() {
    let test_cases = vec![
        (Expr::and(vec![]), FastVal::True),
        (Expr::or(vec![]), FastVal::False),
    ];

    for (expr, expected) in test_cases {
        let def = compile(&expr).unwrap();
        assert_eq!(def.num_buckets(), 1, "Failed for {:?}", expr);

        let after = def.root.after.as_ref().expect("constant goes in the root after block");
        assert_eq!(after.ops.len(), 1);
        assert_eq!(after.ops[0].op, CompareOp::IsTrue);
        match &after.ops[0].lhs {
            Operand::Literal(value) => assert_eq!(*value, expected, "Failed for {:?}", expr),
            other => panic!("expected a literal, got {:?}", other),
        }
    }
}

#[test]
fn test_bare_values_become_truth_tests() {
    let def = compile(&Expr::not(Expr::field(&["enabled"]))).unwrap();
    assert_eq!(def.tree.node(0).kind, NodeType::Not);

    let enabled = child(&def.root, &["enabled"]);
    assert_eq!(enabled.ops.len(), 1);
    assert_eq!(enabled.ops[0].op, CompareOp::IsTrue);
    assert_eq!(enabled.ops[0].bucket, 1);
    assert!(matches!(enabled.ops[0].lhs, Operand::Active));
}

// ============================================================================
// Test Placement
// ============================================================================

#[test]
fn test_single_field_tests_run_on_their_node() {
    let def = compile(&brett()).unwrap();
    assert_eq!(def.num_slots, 0);
    assert!(def.root.after.is_none());

    let test_cases = vec![
        (vec!["name", "first"], 1, CompareOp::Equals),
        (vec!["age"], 3, CompareOp::LessThan),
        (vec!["isActive"], 4, CompareOp::Equals),
    ];

    for (path, bucket, op) in test_cases {
        let node = child(&def.root, &path);
        assert_eq!(node.ops.len(), 1, "Failed for path: {:?}", path);
        assert_eq!(node.ops[0].bucket, bucket, "Failed for path: {:?}", path);
        assert_eq!(node.ops[0].op, op, "Failed for path: {:?}", path);
        assert!(matches!(node.ops[0].lhs, Operand::Active));
        assert!(matches!(node.ops[0].rhs, Some(Operand::Literal(_))));
        assert!(node.slot.is_none());
    }
}

#[test]
fn test_sibling_comparison_is_deferred() {
    let def = compile(&Expr::equals(Expr::field(&["a"]), Expr::field(&["b"]))).unwrap();
    assert_eq!(def.num_slots, 2);

    let a = child(&def.root, &["a"]);
    let b = child(&def.root, &["b"]);
    assert!(a.ops.is_empty() && b.ops.is_empty());

    let after = def.root.after.as_ref().unwrap();
    let op = &after.ops[0];
    match (&op.lhs, &op.rhs) {
        (Operand::Slot(lhs), Some(Operand::Slot(rhs))) => {
            assert_eq!(a.slot, Some(*lhs));
            assert_eq!(b.slot, Some(*rhs));
        }
        other => panic!("expected two slot operands, got {:?}", other),
    }
}

#[test]
fn test_deferral_uses_the_common_ancestor() {
    let expr = Expr::less_than(
        Expr::field(&["range", "low"]),
        Expr::field(&["range", "high"]),
    );
    let def = compile(&expr).unwrap();

    assert!(def.root.after.is_none());
    let range = child(&def.root, &["range"]);
    assert_eq!(range.after.as_ref().unwrap().ops.len(), 1);
    assert!(child(range, &["low"]).slot.is_some());
    assert!(child(range, &["high"]).slot.is_some());
}

#[test]
fn test_same_field_twice_stays_on_node() {
    let expr = Expr::greater_than(
        Expr::func(FuncName::Abs, vec![Expr::field(&["delta"])]),
        Expr::field(&["delta"]),
    );
    let def = compile(&expr).unwrap();

    let delta = child(&def.root, &["delta"]);
    assert_eq!(def.num_slots, 0);
    assert!(matches!(&delta.ops[0].lhs, Operand::Func(f) if f.name == FuncName::Abs));
    assert!(matches!(delta.ops[0].rhs, Some(Operand::Active)));
}

#[test]
fn test_like_compiles_its_pattern() {
    let def = compile(&Expr::like(Expr::field(&["email"]), "^[a-z]+@example\\.com$")).unwrap();
    let op = &child(&def.root, &["email"]).ops[0];
    assert_eq!(op.op, CompareOp::Matches);
    assert!(op.rhs.is_none());
    assert!(op.pattern.as_ref().unwrap().is_match("ann@example.com"));
}

// ============================================================================
// Loops
// ============================================================================

#[test]
fn test_simple_loop_is_inline() {
    let expr = Expr::any_in(
        1,
        Expr::field(&["tags"]),
        Expr::equals(Expr::var_field(1, &[]), Expr::value(json!("red"))),
    );
    let def = compile(&expr).unwrap();

    assert_eq!(def.tree.node(0).kind, NodeType::Barrier);
    assert_eq!(def.tree.node(0).left, 1);
    assert_eq!(def.num_slots, 0);

    let tags = child(&def.root, &["tags"]);
    assert_eq!(tags.loops.len(), 1);
    let lp = &tags.loops[0];
    assert_eq!(lp.bucket, 0);
    assert_eq!(lp.mode, LoopMode::Any);
    assert!(matches!(lp.target, Operand::Active));
    assert_eq!(lp.node.ops[0].bucket, 1);
    assert!(matches!(lp.node.ops[0].lhs, Operand::Active));
    assert!(lp.local_slots.is_empty());
}

#[test]
fn test_loop_reading_outer_field_is_deferred() {
    let expr = Expr::every_in(
        1,
        Expr::field(&["items"]),
        Expr::less_equals(Expr::var_field(1, &["price"]), Expr::field(&["limit"])),
    );
    let def = compile(&expr).unwrap();

    let items = child(&def.root, &["items"]);
    let limit = child(&def.root, &["limit"]);
    assert!(items.loops.is_empty());
    assert_eq!(def.num_slots, 2);

    let lp = &def.root.after.as_ref().unwrap().loops[0];
    assert_eq!(lp.mode, LoopMode::Every);
    assert!(matches!(lp.target, Operand::Slot(s) if items.slot == Some(s)));

    let price = child(&lp.node, &["price"]);
    assert!(matches!(price.ops[0].lhs, Operand::Active));
    assert!(matches!(price.ops[0].rhs, Some(Operand::Slot(s)) if limit.slot == Some(s)));
    assert!(lp.local_slots.is_empty(), "the outer slot belongs to the root scope");
}

#[test]
fn test_loop_local_slots() {
    let expr = Expr::any_in(
        1,
        Expr::field(&["orders"]),
        Expr::greater_than(Expr::var_field(1, &["qty"]), Expr::var_field(1, &["max"])),
    );
    let def = compile(&expr).unwrap();

    let lp = &child(&def.root, &["orders"]).loops[0];
    assert_eq!(lp.local_slots.len(), 2);
    assert!(lp.node.after.as_ref().is_some_and(|a| a.ops.len() == 1));
    for key in ["qty", "max"] {
        let slot = child(&lp.node, &[key]).slot.unwrap();
        assert!(lp.local_slots.contains(&slot), "Failed for key: {}", key);
    }
}

#[test]
fn test_nested_loop_over_loop_variable() {
    // ANY o IN orders SATISFIES (ANY l IN o.lines SATISFIES l.sku == "X")
    let expr = Expr::any_in(
        1,
        Expr::field(&["orders"]),
        Expr::any_in(
            2,
            Expr::var_field(1, &["lines"]),
            Expr::equals(Expr::var_field(2, &["sku"]), Expr::value(json!("X"))),
        ),
    );
    let def = compile(&expr).unwrap();

    assert_eq!(def.num_buckets(), 3);
    assert_eq!(def.tree.node(1).kind, NodeType::Barrier);
    assert_eq!(def.tree.node(1).parent, 0);

    let outer = &child(&def.root, &["orders"]).loops[0];
    let inner = &child(&outer.node, &["lines"]).loops[0];
    assert_eq!(inner.bucket, 1);
    assert!(matches!(inner.target, Operand::Active));
    assert_eq!(child(&inner.node, &["sku"]).ops[0].bucket, 2);
}

#[test]
fn test_loop_modes() {
    let body = || Expr::exists(Expr::var_field(1, &[]));
    let test_cases = vec![
        (Expr::any_in(1, Expr::field(&["xs"]), body()), LoopMode::Any),
        (Expr::every_in(1, Expr::field(&["xs"]), body()), LoopMode::Every),
        (Expr::any_every_in(1, Expr::field(&["xs"]), body()), LoopMode::AnyEvery),
    ];

    for (expr, expected) in test_cases {
        let def = compile(&expr).unwrap();
        assert_eq!(child(&def.root, &["xs"]).loops[0].mode, expected);
    }
}

// ============================================================================
// Batches
// ============================================================================

#[test]
fn test_batch_records_each_expression() {
    let exprs = vec![
        Expr::exists(Expr::field(&["a"])),
        Expr::exists(Expr::field(&["b"])),
        Expr::exists(Expr::field(&["c"])),
    ];
    let def = Transformer::new().transform_batch(&exprs).unwrap();

    assert!(def.is_batch());
    assert_eq!(def.match_buckets, vec![1, 3, 4]);
    assert_eq!(def.tree.node(0).kind, NodeType::Barrier);
    assert_eq!(def.tree.node(2).kind, NodeType::Barrier);
    for (idx, key) in ["a", "b", "c"].iter().enumerate() {
        assert_eq!(child(&def.root, &[key]).ops[0].bucket, def.match_buckets[idx]);
    }
}

#[test]
fn test_plan_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>(_: &T) {}
    let def: MatchDef = compile(&brett()).unwrap();
    assert_send_sync(&def);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_compile_errors() {
    let test_cases = vec![
        (
            Expr::greater_than(Expr::func(FuncName::Abs, vec![]), Expr::value(json!(1))),
            CompileError::FunctionArity { func: "abs", expected: 1, found: 0 },
        ),
        (
            Expr::equals(
                Expr::func(FuncName::Pow, vec![Expr::field(&["x"])]),
                Expr::value(json!(4)),
            ),
            CompileError::FunctionArity { func: "pow", expected: 2, found: 1 },
        ),
        (
            Expr::equals(Expr::var_field(3, &["a"]), Expr::value(json!(1))),
            CompileError::UnboundVariable { var: 3 },
        ),
        (
            Expr::any_in(1, Expr::value(json!([1, 2])), Expr::True),
            CompileError::InvalidLoopTarget,
        ),
        (
            Expr::Like {
                lhs: Box::new(Expr::field(&["a"])),
                rhs: Box::new(Expr::field(&["b"])),
            },
            CompileError::NonLiteralPattern,
        ),
        (
            Expr::equals(Expr::field(&["a"]), Expr::and(vec![])),
            CompileError::BooleanOperand,
        ),
    ];

    for (expr, expected) in test_cases {
        assert_eq!(compile(&expr).unwrap_err(), expected, "Failed for {:?}", expr);
    }
}

#[test]
fn test_loop_variable_is_not_visible_outside_its_body() {
    let expr = Expr::and(vec![
        Expr::any_in(1, Expr::field(&["xs"]), Expr::True),
        Expr::exists(Expr::var_field(1, &["y"])),
    ]);
    assert_eq!(compile(&expr).unwrap_err(), CompileError::UnboundVariable { var: 1 });
}

#[test]
fn test_invalid_pattern() {
    let err = compile(&Expr::like(Expr::field(&["a"]), "(unclosed")).unwrap_err();
    assert!(
        matches!(&err, CompileError::InvalidPattern { pattern, .. } if pattern == "(unclosed"),
        "unexpected error: {:?}",
        err
    );
}

#[test]
fn test_empty_batch() {
    assert_eq!(
        Transformer::new().transform_batch(&[]).unwrap_err(),
        CompileError::EmptyBatch
    );
}
