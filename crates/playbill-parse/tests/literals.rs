use playbill_ast::ast::{Expr, Lit, Stmt};
use playbill_parse::parse_str;

fn value_of(src: &str) -> Expr {
    let p = parse_str("<mem>", src).unwrap();
    match p.stmts.into_iter().next() {
        Some(Stmt::Assign { value, .. }) => value,
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn scalar_literals() {
    assert!(matches!(value_of("root.A = 42;"), Expr::Lit(Lit::Int(42), _)));
    assert!(matches!(value_of("root.A = 0x10;"), Expr::Lit(Lit::Int(16), _)));
    assert!(matches!(value_of("root.A = true;"), Expr::Lit(Lit::Bool(true), _)));
    assert!(matches!(value_of("root.A = null;"), Expr::Lit(Lit::Null, _)));
    match value_of("root.A = 2.5;") {
        Expr::Lit(Lit::Float(f), _) => assert_eq!(f, 2.5),
        other => panic!("expected float, got {:?}", other),
    }
    match value_of(r#"root.A = "hi\n";"#) {
        Expr::Lit(Lit::Str(s), _) => assert_eq!(s, "hi\n"),
        other => panic!("expected string, got {:?}", other),
    }
}

#[test]
fn object_with_trailing_comma() {
    let Expr::Object { fields, .. } = value_of(
        r#"root.Vm = {
    StartScript: 0,
    "StartScriptBuffer": 0,
    UseReturnIds: false,
};"#,
    ) else {
        panic!("expected object");
    };
    let keys: Vec<_> = fields.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["StartScript", "StartScriptBuffer", "UseReturnIds"]);
}

#[test]
fn nested_arrays() {
    let Expr::Array { elems, .. } = value_of("root.A = [1, [2, 3], {X: 4}];") else {
        panic!("expected array");
    };
    assert_eq!(elems.len(), 3);
    assert!(matches!(elems[1], Expr::Array { .. }));
    assert!(matches!(elems[2], Expr::Object { .. }));
}

#[test]
fn empty_containers() {
    assert!(matches!(value_of("root.A = {};"), Expr::Object { ref fields, .. } if fields.is_empty()));
    assert!(matches!(value_of("root.A = [];"), Expr::Array { ref elems, .. } if elems.is_empty()));
}
