use crate::token::{Tok, TokKind};
use playbill_ast::span::Span;

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn bump(&mut self) -> Option<u8> {
        if self.pos >= self.src.len() {
            None
        } else {
            let b = self.src[self.pos];
            self.pos += 1;
            Some(b)
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }
    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn span(&self, start: usize) -> Span {
        Span {
            start: start as u32,
            end: self.pos as u32,
        }
    }

    fn tok(&self, kind: TokKind, start: usize) -> Tok {
        Tok {
            kind,
            span: self.span(start),
        }
    }

    /// Skips whitespace, `//` and `/* */` comments. A commented statement
    /// never reaches the parser.
    fn skip_ws_and_comments(&mut self) -> Option<Tok> {
        loop {
            while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
                self.bump();
            }
            // line comment: //
            if self.peek() == Some(b'/') && self.peek2() == Some(b'/') {
                while let Some(b) = self.peek() {
                    if b == b'\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            // block comment: /* ... */
            if self.peek() == Some(b'/') && self.peek2() == Some(b'*') {
                let start = self.pos;
                self.bump();
                self.bump();
                loop {
                    match self.bump() {
                        Some(b'*') if self.peek() == Some(b'/') => {
                            self.bump();
                            break;
                        }
                        Some(_) => {}
                        None => {
                            return Some(
                                self.tok(TokKind::Error("unterminated block comment".into()), start),
                            )
                        }
                    }
                }
                continue;
            }
            return None;
        }
    }

    pub fn next_tok(&mut self) -> Tok {
        if let Some(err) = self.skip_ws_and_comments() {
            return err;
        }
        let start = self.pos;
        let Some(b) = self.bump() else {
            return Tok {
                kind: TokKind::Eof,
                span: Span {
                    start: self.pos as u32,
                    end: self.pos as u32,
                },
            };
        };
        let c = b as char;

        let single = match c {
            '(' => Some(TokKind::LParen),
            ')' => Some(TokKind::RParen),
            '{' => Some(TokKind::LBrace),
            '}' => Some(TokKind::RBrace),
            '[' => Some(TokKind::LBracket),
            ']' => Some(TokKind::RBracket),
            ',' => Some(TokKind::Comma),
            ':' => Some(TokKind::Colon),
            ';' => Some(TokKind::Semicolon),
            '.' => Some(TokKind::Dot),
            '=' => Some(TokKind::Eq),
            '+' => Some(TokKind::Plus),
            '-' => Some(TokKind::Minus),
            '*' => Some(TokKind::Star),
            '/' => Some(TokKind::Slash),
            '|' => Some(TokKind::Pipe),
            _ => None,
        };
        if let Some(k) = single {
            return self.tok(k, start);
        }

        // string, either quote style
        if c == '"' || c == '\'' {
            return self.lex_string(b, start);
        }

        if c.is_ascii_digit() {
            return self.lex_number(b, start);
        }

        // ident / keywords
        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let mut s = String::from(c);
            while let Some(p) = self.peek() {
                let ch = p as char;
                if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                    s.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
            let kind = match s.as_str() {
                "include" => TokKind::KwInclude,
                "true" => TokKind::KwTrue,
                "false" => TokKind::KwFalse,
                "null" => TokKind::KwNull,
                _ => TokKind::Ident(s),
            };
            return self.tok(kind, start);
        }

        // Skip the rest of a multi-byte UTF-8 sequence so the span stays on a char boundary.
        while matches!(self.peek(), Some(b) if (b & 0xC0) == 0x80) {
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.tok(TokKind::Error(format!("unexpected character '{}'", text)), start)
    }

    fn lex_string(&mut self, quote: u8, start: usize) -> Tok {
        let mut bytes = Vec::new();
        loop {
            let Some(b) = self.bump() else {
                return self.tok(TokKind::Error("unterminated string literal".into()), start);
            };
            if b == quote {
                break;
            }
            match b {
                b'\n' => {
                    return self.tok(TokKind::Error("unterminated string literal".into()), start)
                }
                b'\\' => {
                    let Some(esc) = self.bump() else {
                        return self
                            .tok(TokKind::Error("unterminated string literal".into()), start);
                    };
                    let real = match esc {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        b'0' => b'\0',
                        _ => esc,
                    };
                    bytes.push(real);
                }
                _ => bytes.push(b),
            }
        }
        match String::from_utf8(bytes) {
            Ok(s) => self.tok(TokKind::Str(s), start),
            Err(_) => self.tok(TokKind::Error("invalid UTF-8 in string literal".into()), start),
        }
    }

    fn lex_number(&mut self, first: u8, start: usize) -> Tok {
        // hex: 0x...
        if first == b'0' && matches!(self.peek(), Some(b'x') | Some(b'X')) {
            self.bump();
            let digits_start = self.pos;
            while matches!(self.peek(), Some(b) if b.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = String::from_utf8_lossy(&self.src[digits_start..self.pos]).into_owned();
            return match i64::from_str_radix(&digits, 16) {
                Ok(v) => self.tok(TokKind::Int(v), start),
                Err(_) if digits.is_empty() => {
                    self.tok(TokKind::Error("hex literal has no digits".into()), start)
                }
                Err(_) => self.tok(TokKind::Error("integer literal out of range".into()), start),
            };
        }

        let mut s = String::from(first as char);
        let mut dot = false;
        while let Some(p) = self.peek() {
            let ch = p as char;
            if ch.is_ascii_digit() {
                s.push(ch);
                self.bump();
            } else if ch == '.' && !dot && matches!(self.peek2(), Some(d) if d.is_ascii_digit()) {
                dot = true;
                s.push('.');
                self.bump();
            } else {
                break;
            }
        }
        if dot {
            match s.parse() {
                Ok(v) => self.tok(TokKind::Float(v), start),
                Err(_) => self.tok(TokKind::Error("invalid float literal".into()), start),
            }
        } else {
            match s.parse() {
                Ok(v) => self.tok(TokKind::Int(v), start),
                Err(_) => self.tok(TokKind::Error("integer literal out of range".into()), start),
            }
        }
    }
}
