use crate::lexer::Lexer;
use crate::token::{Tok, TokKind};
use crate::ParseError;
use playbill_ast::ast::{BinOp, Expr, Field, Ident, Lit, Place, Program, Segment, Stmt, UnOp};
use playbill_ast::span::Span;

/// Maximum expression nesting (objects, arrays, parens, unary chains).
pub const MAX_NESTING_DEPTH: u32 = 128;

type Result<T> = std::result::Result<T, ParseError>;

fn fail<T>(span: Span, message: impl Into<String>) -> Result<T> {
    Err(ParseError {
        message: message.into(),
        span,
    })
}

pub fn parse_str(_file: &str, src: &str) -> Result<Program> {
    let mut p = Parser::new(src);
    p.parse_program()
}

struct Parser<'a> {
    lex: Lexer<'a>,
    cur: Tok,
    nxt: Tok,
    depth: u32,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        let mut lex = Lexer::new(src);
        let cur = lex.next_tok();
        let nxt = lex.next_tok();
        Self {
            lex,
            cur,
            nxt,
            depth: 0,
        }
    }

    fn bump(&mut self) {
        self.cur = std::mem::replace(&mut self.nxt, self.lex.next_tok());
    }

    fn at(&self, k: &TokKind) -> bool {
        std::mem::discriminant(&self.cur.kind) == std::mem::discriminant(k)
    }

    /// Surface lexer errors before any "expected X" message.
    fn check_lex_error(&self) -> Result<()> {
        if let TokKind::Error(msg) = &self.cur.kind {
            return fail(self.cur.span, format!("Lexer error: {}", msg));
        }
        Ok(())
    }

    fn expect(&mut self, k: TokKind) -> Result<Tok> {
        if self.at(&k) {
            let t = self.cur.clone();
            self.bump();
            Ok(t)
        } else {
            self.check_lex_error()?;
            fail(
                self.cur.span,
                format!("expected {:?}, found {:?}", k, self.cur.kind),
            )
        }
    }

    // ======= program / statements =======

    fn parse_program(&mut self) -> Result<Program> {
        let start = self.cur.span.start;
        let mut stmts = Vec::new();
        while !matches!(self.cur.kind, TokKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Program {
            stmts,
            span: Span {
                start,
                end: self.cur.span.end,
            },
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.cur.kind {
            TokKind::KwInclude => self.parse_include(),
            TokKind::Ident(_) => self.parse_assign(),
            _ => {
                self.check_lex_error()?;
                fail(
                    self.cur.span,
                    format!("unexpected token at top level: {:?}", self.cur.kind),
                )
            }
        }
    }

    /// `include('path');`
    fn parse_include(&mut self) -> Result<Stmt> {
        let start = self.cur.span.start;
        self.expect(TokKind::KwInclude)?;
        self.expect(TokKind::LParen)?;
        let path = match &self.cur.kind {
            TokKind::Str(s) => {
                let s = s.clone();
                self.bump();
                s
            }
            _ => {
                self.check_lex_error()?;
                return fail(
                    self.cur.span,
                    format!(
                        "include expects a string literal path, found {:?}",
                        self.cur.kind
                    ),
                );
            }
        };
        self.expect(TokKind::RParen)?;
        let end = self.expect(TokKind::Semicolon)?.span.end;
        Ok(Stmt::Include {
            path,
            span: Span { start, end },
        })
    }

    /// `root.A.B["c"] = expr;`
    fn parse_assign(&mut self) -> Result<Stmt> {
        let target = self.parse_place()?;
        self.expect(TokKind::Eq)?;
        let value = self.parse_expr_bp(0)?;
        let end = self.expect(TokKind::Semicolon)?.span.end;
        Ok(Stmt::Assign {
            span: Span {
                start: target.span.start,
                end,
            },
            target,
            value,
        })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        match &self.cur.kind {
            TokKind::Ident(s) => {
                let span = self.cur.span;
                let id = Ident {
                    text: s.clone(),
                    span,
                };
                self.bump();
                Ok(id)
            }
            _ => {
                self.check_lex_error()?;
                fail(
                    self.cur.span,
                    format!("expected identifier, found {:?}", self.cur.kind),
                )
            }
        }
    }

    /// A member name after `.`; keywords are plain names in that position.
    fn parse_member_name(&mut self) -> Result<Ident> {
        let text = match &self.cur.kind {
            TokKind::KwInclude => "include",
            TokKind::KwTrue => "true",
            TokKind::KwFalse => "false",
            TokKind::KwNull => "null",
            _ => return self.parse_ident(),
        };
        let id = Ident {
            text: text.to_string(),
            span: self.cur.span,
        };
        self.bump();
        Ok(id)
    }

    fn parse_place(&mut self) -> Result<Place> {
        let head = self.parse_ident()?;
        let mut segments = Vec::new();
        let mut end = head.span.end;
        loop {
            match self.cur.kind {
                TokKind::Dot => {
                    self.bump();
                    let field = self.parse_member_name()?;
                    end = field.span.end;
                    segments.push(Segment::Field(field));
                }
                TokKind::LBracket => {
                    let open = self.cur.span.start;
                    self.bump();
                    let seg = match self.cur.kind.clone() {
                        TokKind::Str(s) => {
                            self.bump();
                            let close = self.expect(TokKind::RBracket)?;
                            Segment::Key(
                                s,
                                Span {
                                    start: open,
                                    end: close.span.end,
                                },
                            )
                        }
                        TokKind::Int(i) => {
                            self.bump();
                            let close = self.expect(TokKind::RBracket)?;
                            Segment::Index(
                                i,
                                Span {
                                    start: open,
                                    end: close.span.end,
                                },
                            )
                        }
                        other => {
                            self.check_lex_error()?;
                            return fail(
                                self.cur.span,
                                format!("index must be a string or integer literal, found {:?}", other),
                            );
                        }
                    };
                    end = seg.span().end;
                    segments.push(seg);
                }
                _ => break,
            }
        }
        Ok(Place {
            span: Span {
                start: head.span.start,
                end,
            },
            head,
            segments,
        })
    }

    // ======= expressions (Pratt parser) =======
    //
    // Precedence (low -> high):
    //   1:  |
    //   10: + -
    //   20: * /
    // prefix (unary) binds tighter than all infix; we give it rbp = 100

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            let span = self.cur.span;
            self.depth -= 1;
            return fail(
                span,
                format!("nesting depth exceeded (limit {})", MAX_NESTING_DEPTH),
            );
        }
        let result = self.parse_expr_bp_inner(min_bp);
        self.depth -= 1;
        result
    }

    fn parse_expr_bp_inner(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let (op, lbp, rbp) = match self.cur.kind {
                TokKind::Pipe => (BinOp::BitOr, 1, 2),
                TokKind::Plus => (BinOp::Add, 10, 11),
                TokKind::Minus => (BinOp::Sub, 10, 11),
                TokKind::Star => (BinOp::Mul, 20, 21),
                TokKind::Slash => (BinOp::Div, 20, 21),
                _ => break,
            };

            if lbp < min_bp {
                break;
            }
            self.bump(); // consume operator
            let rhs = self.parse_expr_bp(rbp)?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
                span,
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        // Snapshot current token to avoid borrow issues when bumping
        let tok_kind = self.cur.kind.clone();
        let tok_span = self.cur.span;

        match tok_kind {
            TokKind::Minus => {
                self.bump();
                let inner = self.parse_expr_bp(100)?;
                let span = tok_span.join(inner.span());
                Ok(Expr::Unary {
                    op: UnOp::Neg,
                    expr: Box::new(inner),
                    span,
                })
            }

            // primaries
            TokKind::Int(v) => {
                self.bump();
                Ok(Expr::Lit(Lit::Int(v), tok_span))
            }
            TokKind::Float(v) => {
                self.bump();
                Ok(Expr::Lit(Lit::Float(v), tok_span))
            }
            TokKind::Str(s) => {
                self.bump();
                Ok(Expr::Lit(Lit::Str(s), tok_span))
            }
            TokKind::KwTrue => {
                self.bump();
                Ok(Expr::Lit(Lit::Bool(true), tok_span))
            }
            TokKind::KwFalse => {
                self.bump();
                Ok(Expr::Lit(Lit::Bool(false), tok_span))
            }
            TokKind::KwNull => {
                self.bump();
                Ok(Expr::Lit(Lit::Null, tok_span))
            }

            TokKind::Ident(_) => Ok(Expr::Place(self.parse_place()?)),

            TokKind::LParen => {
                self.bump(); // '('
                let inner = self.parse_expr_bp(0)?;
                let end_tok = self.expect(TokKind::RParen)?;
                Ok(Expr::Paren {
                    inner: Box::new(inner),
                    span: Span {
                        start: tok_span.start,
                        end: end_tok.span.end,
                    },
                })
            }

            TokKind::LBrace => self.parse_object(),
            TokKind::LBracket => self.parse_array(),

            TokKind::Error(msg) => fail(tok_span, format!("Lexer error: {}", msg)),

            _ => fail(
                tok_span,
                format!("unexpected token in expression: {:?}", tok_kind),
            ),
        }
    }

    /// `{ Key: expr, "Other": expr, }`
    fn parse_object(&mut self) -> Result<Expr> {
        let start = self.cur.span.start;
        self.expect(TokKind::LBrace)?;
        let mut fields = Vec::new();
        while !matches!(self.cur.kind, TokKind::RBrace) {
            let key_span = self.cur.span;
            let key = match self.cur.kind.clone() {
                TokKind::Ident(s) | TokKind::Str(s) => s,
                TokKind::Int(i) => i.to_string(),
                other => {
                    self.check_lex_error()?;
                    return fail(key_span, format!("expected object key, found {:?}", other));
                }
            };
            self.bump();
            self.expect(TokKind::Colon)?;
            let value = self.parse_expr_bp(0)?;
            fields.push(Field {
                key,
                span: key_span.join(value.span()),
                value,
            });
            if matches!(self.cur.kind, TokKind::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        let end_tok = self.expect(TokKind::RBrace)?;
        Ok(Expr::Object {
            fields,
            span: Span {
                start,
                end: end_tok.span.end,
            },
        })
    }

    /// `[expr, expr, ]`
    fn parse_array(&mut self) -> Result<Expr> {
        let start = self.cur.span.start;
        self.expect(TokKind::LBracket)?;
        let mut elems = Vec::new();
        while !matches!(self.cur.kind, TokKind::RBracket) {
            elems.push(self.parse_expr_bp(0)?);
            if matches!(self.cur.kind, TokKind::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        let end_tok = self.expect(TokKind::RBracket)?;
        Ok(Expr::Array {
            elems,
            span: Span {
                start,
                end: end_tok.span.end,
            },
        })
    }
}
