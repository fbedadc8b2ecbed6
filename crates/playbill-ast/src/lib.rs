pub mod span {
    use serde::Serialize;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
    pub struct Span {
        pub start: u32,
        pub end: u32,
    }

    impl Span {
        pub fn join(self, other: Span) -> Span {
            Span {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            }
        }
    }

    /// 1-based line and column of a byte offset.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
    pub struct LineCol {
        pub line: u32,
        pub column: u32,
    }

    impl std::fmt::Display for LineCol {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}:{}", self.line, self.column)
        }
    }

    /// Byte offsets of every line start in a source text.
    #[derive(Debug, Clone)]
    pub struct LineIndex {
        starts: Vec<u32>,
    }

    impl LineIndex {
        pub fn new(src: &str) -> Self {
            let mut starts = vec![0];
            for (i, b) in src.bytes().enumerate() {
                if b == b'\n' {
                    starts.push(i as u32 + 1);
                }
            }
            Self { starts }
        }

        pub fn line_col(&self, offset: u32) -> LineCol {
            let line = match self.starts.binary_search(&offset) {
                Ok(i) => i,
                Err(i) => i - 1,
            };
            LineCol {
                line: line as u32 + 1,
                column: offset - self.starts[line] + 1,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn line_col_tracks_newlines() {
            let idx = LineIndex::new("ab\ncd\n\nx");
            assert_eq!(idx.line_col(0), LineCol { line: 1, column: 1 });
            assert_eq!(idx.line_col(1), LineCol { line: 1, column: 2 });
            assert_eq!(idx.line_col(3), LineCol { line: 2, column: 1 });
            assert_eq!(idx.line_col(7), LineCol { line: 4, column: 1 });
        }

        #[test]
        fn join_covers_both() {
            let a = Span { start: 4, end: 6 };
            let b = Span { start: 1, end: 3 };
            assert_eq!(a.join(b), Span { start: 1, end: 6 });
        }
    }
}

pub mod ast {
    use super::span::Span;
    use serde::Serialize;

    /// One parsed fragment: a flat list of statements in source order.
    #[derive(Debug, Clone, Serialize)]
    pub struct Program {
        pub stmts: Vec<Stmt>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum Stmt {
        /// `place = value;`
        Assign {
            target: Place,
            value: Expr,
            span: Span,
        },
        /// `include('relative/path.js');`
        Include { path: String, span: Span },
    }

    impl Stmt {
        pub fn span(&self) -> Span {
            match self {
                Stmt::Assign { span, .. } | Stmt::Include { span, .. } => *span,
            }
        }
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct Ident {
        pub text: String,
        pub span: Span,
    }

    /// A dotted/indexed path such as `root.Sprites["Box"]`.
    #[derive(Debug, Clone, Serialize)]
    pub struct Place {
        pub head: Ident,
        pub segments: Vec<Segment>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum Segment {
        Field(Ident),
        Key(String, Span),
        Index(i64, Span),
    }

    impl Segment {
        pub fn span(&self) -> Span {
            match self {
                Segment::Field(id) => id.span,
                Segment::Key(_, sp) | Segment::Index(_, sp) => *sp,
            }
        }
    }

    impl std::fmt::Display for Place {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.head.text)?;
            for seg in &self.segments {
                match seg {
                    Segment::Field(id) => write!(f, ".{}", id.text)?,
                    Segment::Key(k, _) => write!(f, "[{:?}]", k)?,
                    Segment::Index(i, _) => write!(f, "[{}]", i)?,
                }
            }
            Ok(())
        }
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct Field {
        pub key: String,
        pub value: Expr,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum Expr {
        Lit(Lit, Span),
        Place(Place),
        Object {
            fields: Vec<Field>,
            span: Span,
        },
        Array {
            elems: Vec<Expr>,
            span: Span,
        },
        Unary {
            op: UnOp,
            expr: Box<Expr>,
            span: Span,
        },
        Binary {
            lhs: Box<Expr>,
            op: BinOp,
            rhs: Box<Expr>,
            span: Span,
        },
        Paren {
            inner: Box<Expr>,
            span: Span,
        },
    }

    impl Expr {
        pub fn span(&self) -> Span {
            match self {
                Expr::Lit(_, sp) => *sp,
                Expr::Place(p) => p.span,
                Expr::Object { span, .. }
                | Expr::Array { span, .. }
                | Expr::Unary { span, .. }
                | Expr::Binary { span, .. }
                | Expr::Paren { span, .. } => *span,
            }
        }
    }

    #[derive(Debug, Clone, Copy, Serialize)]
    pub enum UnOp {
        Neg,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum Lit {
        Int(i64),
        Float(f64),
        Str(String),
        Bool(bool),
        Null,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum BinOp {
        BitOr,
        Add,
        Sub,
        Mul,
        Div,
    }

    impl BinOp {
        pub fn symbol(self) -> &'static str {
            match self {
                BinOp::BitOr => "|",
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "/",
            }
        }
    }
}
