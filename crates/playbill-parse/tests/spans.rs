use playbill_ast::ast::Stmt;
use playbill_ast::span::{LineCol, LineIndex};
use playbill_parse::parse_str;

#[test]
fn statement_spans_cover_source_text() {
    let src = "root.A = 1;\n  include('x/y.js');\n";
    let p = parse_str("<mem>", src).unwrap();
    let s0 = p.stmts[0].span();
    let s1 = p.stmts[1].span();
    assert_eq!(&src[s0.start as usize..s0.end as usize], "root.A = 1;");
    assert_eq!(&src[s1.start as usize..s1.end as usize], "include('x/y.js');");
}

#[test]
fn statement_position_is_reportable() {
    let src = "root.A = 1;\n  include('x/y.js');\n";
    let p = parse_str("<mem>", src).unwrap();
    let idx = LineIndex::new(src);
    let Stmt::Include { span, .. } = &p.stmts[1] else {
        panic!("expected include");
    };
    assert_eq!(idx.line_col(span.start), LineCol { line: 2, column: 3 });
}
