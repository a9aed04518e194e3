//! Property-based tests for the parser.
//!
//! Two invariants: every parsed node's source slice re-parses to a
//! structurally equal tree, and the binding-power table produces the
//! documented grouping for every infix operator.

use proptest::prelude::*;

use smallc::lexer::lex;
use smallc::parser::ast::{Expr, Op};
use smallc::parser::Parser;
use smallc::span::Spanned;

fn parse_expression(src: &str) -> Option<Spanned<Expr>> {
    let tokens = lex(src).ok()?;
    let mut parser = Parser::new(&tokens, src);
    parser.parse_expression().ok()
}

/// Structural equality up to source slices.
fn expr_eq(a: &Expr, b: &Expr) -> bool {
    match (a, b) {
        (Expr::Var(x), Expr::Var(y)) => x == y,
        (Expr::Num(x), Expr::Num(y)) => x == y,
        (
            Expr::PreOp { op: oa, inner: ia },
            Expr::PreOp { op: ob, inner: ib },
        ) => oa == ob && expr_eq(&ia.node, &ib.node),
        (
            Expr::TypeCast { type_name: ta, inner: ia },
            Expr::TypeCast { type_name: tb, inner: ib },
        ) => ta.node == tb.node && expr_eq(&ia.node, &ib.node),
        (
            Expr::BinOp { op: oa, lhs: la, rhs: ra },
            Expr::BinOp { op: ob, lhs: lb, rhs: rb },
        ) => oa == ob && expr_eq(&la.node, &lb.node) && expr_eq(&ra.node, &rb.node),
        (
            Expr::SubScript { array: aa, index: ia },
            Expr::SubScript { array: ab, index: ib },
        ) => expr_eq(&aa.node, &ab.node) && expr_eq(&ia.node, &ib.node),
        (
            Expr::Call { callee: ca, args: aa },
            Expr::Call { callee: cb, args: ab },
        ) => {
            expr_eq(&ca.node, &cb.node)
                && aa.len() == ab.len()
                && aa.iter().zip(ab).all(|(x, y)| expr_eq(&x.node, &y.node))
        }
        _ => false,
    }
}

fn collect_nodes<'a>(expr: &'a Spanned<Expr>, out: &mut Vec<&'a Spanned<Expr>>) {
    out.push(expr);
    match &expr.node {
        Expr::Var(_) | Expr::Num(_) => {}
        Expr::PreOp { inner, .. } | Expr::TypeCast { inner, .. } => {
            collect_nodes(inner, out);
        }
        Expr::BinOp { lhs, rhs, .. } => {
            collect_nodes(lhs, out);
            collect_nodes(rhs, out);
        }
        Expr::SubScript { array, index } => {
            collect_nodes(array, out);
            collect_nodes(index, out);
        }
        Expr::Call { callee, args } => {
            collect_nodes(callee, out);
            for arg in args {
                collect_nodes(arg, out);
            }
        }
    }
}

// ── generators ───────────────────────────────────────────────────────

fn arb_identifier() -> impl Strategy<Value = String> {
    // avoid keywords: single letters are never reserved
    "[a-z]".prop_map(|s| s.to_string())
}

fn arb_leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u64..10_000).prop_map(|n| n.to_string()),
        arb_identifier(),
    ]
}

fn arb_expr() -> impl Strategy<Value = String> {
    let binops = proptest::sample::select(vec![
        "+", "-", "*", "/", "%", "<", ">", "<=", ">=", "==", "!=", "&", "|", "^",
        "&&", "||", "=",
    ]);
    let prefix_ops = proptest::sample::select(vec!["-", "!", "+", "&", "*"]);
    let type_names = proptest::sample::select(vec!["int", "bool"]);

    arb_leaf().prop_recursive(4, 32, 4, move |inner| {
        prop_oneof![
            (inner.clone(), binops.clone(), inner.clone())
                .prop_map(|(a, op, b)| format!("{a} {op} {b}")),
            (prefix_ops.clone(), inner.clone()).prop_map(|(op, a)| format!("{op}{a}")),
            inner.clone().prop_map(|a| format!("({a})")),
            (type_names.clone(), inner.clone()).prop_map(|(ty, a)| format!("@{ty} {a}")),
            (arb_identifier(), proptest::collection::vec(inner.clone(), 0..3))
                .prop_map(|(f, args)| format!("{f}({})", args.join(", "))),
            (inner.clone(), inner).prop_map(|(a, i)| format!("{a}[{i}]")),
        ]
    })
}

proptest! {
    /// Every parsed node's source slice re-parses to an equal tree.
    #[test]
    fn source_slices_round_trip(src in arb_expr()) {
        if let Some(expr) = parse_expression(&src) {
            let mut nodes = Vec::new();
            collect_nodes(&expr, &mut nodes);
            for node in nodes {
                let slice = &src[node.span.start..node.span.end];
                let reparsed = parse_expression(slice).unwrap_or_else(|| {
                    panic!("slice {slice:?} of {src:?} failed to re-parse")
                });
                prop_assert!(
                    expr_eq(&node.node, &reparsed.node),
                    "slice {slice:?} of {src:?} re-parsed to a different tree"
                );
            }
        }
    }

    /// Lexer spans are monotonic and non-overlapping.
    #[test]
    fn lexer_spans_are_monotonic(src in arb_expr()) {
        if let Ok(tokens) = lex(&src) {
            for window in tokens.windows(2) {
                prop_assert!(window[0].span.end <= window[1].span.start);
            }
        }
    }
}

// ── the binding-power table, exhaustively ────────────────────────────

/// For every infix operator, `a op b op c` groups left iff
/// `bp_infix_left >= bp_infix_right`; only `=` groups right.
#[test]
fn associativity_follows_the_binding_power_table() {
    for op in Op::ALL {
        let lbp = op.bp_infix_left();
        if lbp == 0 {
            continue;
        }
        let src = format!("a {op} b {op} c", op = op.as_str());
        let expr = parse_expression(&src)
            .unwrap_or_else(|| panic!("failed to parse {src:?}"));

        let Expr::BinOp { op: top, lhs, rhs } = &expr.node else {
            panic!("expected a binary expression for {src:?}");
        };
        assert_eq!(*top, op);

        let groups_left = lbp >= op.bp_infix_right();
        if groups_left {
            assert!(
                matches!(lhs.node, Expr::BinOp { .. }),
                "{src:?} should group left"
            );
            assert!(matches!(&rhs.node, Expr::Var(name) if name == "c"));
        } else {
            assert_eq!(op, Op::Assign, "only '=' is right-associative");
            assert!(
                matches!(rhs.node, Expr::BinOp { .. }),
                "{src:?} should group right"
            );
            assert!(matches!(&lhs.node, Expr::Var(name) if name == "a"));
        }
    }
}

/// Precedence pairs: the looser operator ends up at the root.
#[test]
fn precedence_orders_operator_pairs() {
    let cases = [
        ("a + b * c", Op::Plus, Op::Star),
        ("a < b + c", Op::Lt, Op::Plus),
        ("a == b < c", Op::EqEq, Op::Lt),
        ("a & b == c", Op::BitAnd, Op::EqEq),
        ("a ^ b & c", Op::BitXor, Op::BitAnd),
        ("a | b ^ c", Op::BitOr, Op::BitXor),
        ("a && b | c", Op::AndAnd, Op::BitOr),
        ("a || b && c", Op::OrOr, Op::AndAnd),
        ("a = b || c", Op::Assign, Op::OrOr),
    ];
    for (src, outer, inner) in cases {
        let expr = parse_expression(src).unwrap();
        let Expr::BinOp { op, rhs, .. } = &expr.node else {
            panic!("expected binop for {src:?}");
        };
        assert_eq!(*op, outer, "wrong root operator for {src:?}");
        assert!(
            matches!(&rhs.node, Expr::BinOp { op, .. } if *op == inner),
            "wrong nested operator for {src:?}"
        );
    }
}
