use playbill_ast::ast::{BinOp, Expr, Stmt};
use playbill_parse::parse_str;

fn value_of(src: &str) -> Expr {
    let p = parse_str("<mem>", src).unwrap();
    match p.stmts.into_iter().next() {
        Some(Stmt::Assign { value, .. }) => value,
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn pipe_binds_loosest() {
    // GameFeature.A | 1 + 2  ==>  GameFeature.A | (1 + 2)
    let Expr::Binary { op, rhs, .. } = value_of("root.F = GameFeature.A | 1 + 2;") else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::BitOr);
    assert!(matches!(*rhs, Expr::Binary { op: BinOp::Add, .. }));
}

#[test]
fn flag_chain_is_left_associative() {
    let src = "root.GameFeatures = GameFeature.Sc3VirtualMachine | GameFeature.Renderer2D | GameFeature.Input | GameFeature.Audio;";
    let Expr::Binary { lhs, op, rhs, .. } = value_of(src) else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::BitOr);
    assert!(matches!(*rhs, Expr::Place(ref p) if p.to_string() == "GameFeature.Audio"));
    assert!(matches!(*lhs, Expr::Binary { op: BinOp::BitOr, .. }));
}

#[test]
fn mul_over_add_and_unary_minus() {
    let Expr::Binary { op, lhs, rhs, .. } = value_of("root.X = -1 + 2 * 3;") else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::Add);
    assert!(matches!(*lhs, Expr::Unary { .. }));
    assert!(matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. }));
}
