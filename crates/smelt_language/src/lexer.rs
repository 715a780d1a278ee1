//! The SRC lexer.
//!
//! A byte-walking tokenizer. Identifiers are classified through the parser
//! context (locals first, then the symbol table) before they reach the
//! parser, and every significant token boundary consults the context's
//! skip machine so early passes can fast-forward over bodies without
//! producing tokens for them. A consumed region surfaces as a single
//! [`TokenType::Skipped`] token.

use crate::context::{Context, SkipAction};
use crate::ops::AssignOp;
use crate::token::{Token, TokenType};
use smelt_base::{CompileError, Result, Span};

pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'*') => {
                    self.pos += 2;
                    while self.pos < self.bytes.len() {
                        if self.peek_byte() == Some(b'*') && self.peek_byte_at(1) == Some(b'/') {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Produces the next token, honoring the context's skip machine.
    pub fn next_token(&mut self, ctx: &mut Context) -> Result<Token> {
        loop {
            self.skip_trivia();

            let start = self.pos;
            let b = match self.peek_byte() {
                Some(b) => b,
                None => return Ok(Token::new(TokenType::Eof, Span::new(start, start))),
            };

            if ctx.skip_armed() {
                match ctx.should_skip(b as char)? {
                    SkipAction::Start => {
                        self.pos += 1;
                        self.consume_skipped(b as char, ctx.skip_until, ctx.skip_pair_count)?;
                        ctx.finish_skip();
                        return Ok(Token::new(TokenType::Skipped, Span::new(start, self.pos)));
                    }
                    SkipAction::Exit => {
                        ctx.finish_skip();
                    }
                    SkipAction::None => {}
                }
            }

            return self.lex_at(start, b, ctx);
        }
    }

    /// Lexes one token ahead without consuming it.
    ///
    /// Used only at expression and type positions, where the peeked token
    /// can never be a skip opener.
    pub fn peek_token(&mut self, ctx: &mut Context) -> Result<Token> {
        let saved = self.pos;
        let token = self.next_token(ctx);
        self.pos = saved;
        token
    }

    /// Consumes a balanced region. With a pair count of 0 the region ends
    /// at the first terminator; otherwise openers nest. String and
    /// character literals inside the region are consumed atomically.
    fn consume_skipped(&mut self, open: char, close: char, pair_count: u8) -> Result<()> {
        let mut depth: usize = 1;
        loop {
            let b = match self.bump() {
                Some(b) => b,
                None => {
                    return Err(CompileError::syntax_at(
                        format!("unexpected end of file while looking for '{}'", close),
                        Span::new(self.pos, self.pos),
                    ))
                }
            };
            match b {
                b'"' => self.consume_string_body(b'"')?,
                b'\'' => self.consume_string_body(b'\'')?,
                b'/' if self.peek_byte() == Some(b'/') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                b'/' if self.peek_byte() == Some(b'*') => {
                    self.pos += 1;
                    while self.pos < self.bytes.len() {
                        if self.peek_byte() == Some(b'*') && self.peek_byte_at(1) == Some(b'/') {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ if b as char == close => {
                    if pair_count == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ if b as char == open && pair_count != 0 => {
                    depth += 1;
                }
                _ => {}
            }
        }
    }

    fn consume_string_body(&mut self, quote: u8) -> Result<()> {
        while let Some(b) = self.bump() {
            match b {
                b'\\' => {
                    self.bump();
                }
                _ if b == quote => return Ok(()),
                _ => {}
            }
        }
        Err(CompileError::syntax_at(
            "unterminated literal",
            Span::new(self.pos, self.pos),
        ))
    }

    fn lex_at(&mut self, start: usize, b: u8, ctx: &mut Context) -> Result<Token> {
        let ty = match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => return self.lex_identifier(start, ctx),
            b'0'..=b'9' => return self.lex_number(start),
            b'"' => return self.lex_string(start),
            b'\'' => return self.lex_character(start),

            b'(' => self.single(TokenType::LParen),
            b')' => self.single(TokenType::RParen),
            b'{' => self.single(TokenType::LBrace),
            b'}' => self.single(TokenType::RBrace),
            b'[' => self.single(TokenType::LBracket),
            b']' => self.single(TokenType::RBracket),
            b';' => self.single(TokenType::Semicolon),
            b',' => self.single(TokenType::Comma),
            b'.' => self.multi(&[("...", TokenType::Ellipsis)], TokenType::Dot),
            b'?' => self.single(TokenType::Question),
            b':' => self.single(TokenType::Colon),
            b'~' => self.single(TokenType::Tilde),

            b'+' => self.multi(&[("++", TokenType::PlusPlus), ("+=", TokenType::Assign(AssignOp::Add))], TokenType::Plus),
            b'-' => self.multi(
                &[
                    ("->", TokenType::Arrow),
                    ("--", TokenType::MinusMinus),
                    ("-=", TokenType::Assign(AssignOp::Subtract)),
                ],
                TokenType::Minus,
            ),
            b'*' => self.multi(&[("*=", TokenType::Assign(AssignOp::Multiply))], TokenType::Star),
            b'/' => self.multi(&[("/=", TokenType::Assign(AssignOp::Divide))], TokenType::Slash),
            b'%' => self.multi(&[("%=", TokenType::Assign(AssignOp::Modulo))], TokenType::Percent),
            b'<' => self.multi(
                &[
                    ("<<=", TokenType::Assign(AssignOp::ShiftLeft)),
                    ("<<", TokenType::ShiftLeft),
                    ("<=", TokenType::LessEqual),
                ],
                TokenType::Less,
            ),
            b'>' => self.multi(
                &[
                    (">>=", TokenType::Assign(AssignOp::ShiftRight)),
                    (">>", TokenType::ShiftRight),
                    (">=", TokenType::GreaterEqual),
                ],
                TokenType::Greater,
            ),
            b'=' => self.multi(&[("==", TokenType::EqualEqual)], TokenType::Assign(AssignOp::Plain)),
            b'!' => self.multi(&[("!=", TokenType::NotEqual)], TokenType::Bang),
            b'&' => self.multi(
                &[("&&", TokenType::AmpAmp), ("&=", TokenType::Assign(AssignOp::BitAnd))],
                TokenType::Amp,
            ),
            b'|' => self.multi(
                &[("||", TokenType::PipePipe), ("|=", TokenType::Assign(AssignOp::BitOr))],
                TokenType::Pipe,
            ),
            b'^' => self.multi(&[("^=", TokenType::Assign(AssignOp::BitXor))], TokenType::Caret),

            _ => {
                return Err(CompileError::syntax_at(
                    format!("unexpected character '{}'", b as char),
                    Span::new(start, start + 1),
                ))
            }
        };
        Ok(Token::new(ty, Span::new(start, self.pos)))
    }

    fn single(&mut self, ty: TokenType) -> TokenType {
        self.pos += 1;
        ty
    }

    fn multi(&mut self, options: &[(&str, TokenType)], fallback: TokenType) -> TokenType {
        for (text, ty) in options {
            if self.source[self.pos..].starts_with(text) {
                self.pos += text.len();
                return ty.clone();
            }
        }
        self.pos += 1;
        fallback
    }

    fn lex_identifier(&mut self, start: usize, ctx: &mut Context) -> Result<Token> {
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        let span = Span::new(start, self.pos);

        let ty = match text {
            "import" => TokenType::Import,
            "native" => TokenType::Native,
            "new" => TokenType::New,
            "fn" => TokenType::Fn,
            "struct" => TokenType::Struct,
            "enum" => TokenType::Enum,
            "alias" => TokenType::Alias,
            "return" => TokenType::Return,
            "if" => TokenType::If,
            "else" => TokenType::Else,
            "while" => TokenType::While,
            "break" => TokenType::Break,
            "continue" => TokenType::Continue,
            "unsigned" => TokenType::Unsigned,
            "signed" => TokenType::Signed,
            "true" => TokenType::True,
            "false" => TokenType::False,
            _ => TokenType::Ident(ctx.classify(text).map_err(|e| e.with_span(span))?),
        };
        Ok(Token::new(ty, span))
    }

    fn lex_number(&mut self, start: usize) -> Result<Token> {
        let span_err = |pos: usize| Span::new(start, pos);

        if self.peek_byte() == Some(b'0') && matches!(self.peek_byte_at(1), Some(b'x' | b'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while matches!(self.peek_byte(), Some(b) if b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            if self.pos == digits_start {
                return Err(CompileError::syntax_at(
                    "incomplete hexadecimal literal",
                    span_err(self.pos),
                ));
            }
            let unsigned = self.consume_unsigned_suffix();
            let text = &self.source[digits_start..if unsigned { self.pos - 1 } else { self.pos }];
            let value = u64::from_str_radix(text, 16).map_err(|_| {
                CompileError::syntax_at("number literal is too large", span_err(self.pos))
            })?;
            return self.integer_token(start, value, unsigned);
        }

        while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }

        if self.peek_byte() == Some(b'.')
            && matches!(self.peek_byte_at(1), Some(b) if b.is_ascii_digit())
        {
            self.pos += 1;
            while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
            }
            let text = &self.source[start..self.pos];
            let value: f64 = text.parse().map_err(|_| {
                CompileError::syntax_at("malformed number literal", span_err(self.pos))
            })?;
            return Ok(Token::new(TokenType::Float(value), Span::new(start, self.pos)));
        }

        let unsigned = self.consume_unsigned_suffix();
        let text = &self.source[start..if unsigned { self.pos - 1 } else { self.pos }];
        let value: u64 = text.parse().map_err(|_| {
            CompileError::syntax_at("number literal is too large", span_err(self.pos))
        })?;
        self.integer_token(start, value, unsigned)
    }

    fn consume_unsigned_suffix(&mut self) -> bool {
        if matches!(self.peek_byte(), Some(b'u' | b'U')) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn integer_token(&mut self, start: usize, value: u64, unsigned: bool) -> Result<Token> {
        if !unsigned && value > i64::MAX as u64 {
            return Err(CompileError::syntax_at(
                "number literal is too large",
                Span::new(start, self.pos),
            ));
        }
        Ok(Token::new(
            TokenType::Int {
                value: value as i64,
                unsigned,
            },
            Span::new(start, self.pos),
        ))
    }

    fn lex_string(&mut self, start: usize) -> Result<Token> {
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(b'"') => break,
                Some(b'\\') => value.push(self.lex_escape(start)?),
                Some(b) => value.push(b as char),
                None => {
                    return Err(CompileError::syntax_at(
                        "unterminated string literal",
                        Span::new(start, self.pos),
                    ))
                }
            }
        }
        Ok(Token::new(TokenType::Str(value), Span::new(start, self.pos)))
    }

    fn lex_character(&mut self, start: usize) -> Result<Token> {
        self.pos += 1;
        let value = match self.bump() {
            Some(b'\\') => self.lex_escape(start)?,
            Some(b'\'') => {
                return Err(CompileError::syntax_at(
                    "empty character literal",
                    Span::new(start, self.pos),
                ))
            }
            Some(b) => b as char,
            None => {
                return Err(CompileError::syntax_at(
                    "unterminated character literal",
                    Span::new(start, self.pos),
                ))
            }
        };
        match self.bump() {
            Some(b'\'') => Ok(Token::new(TokenType::Char(value), Span::new(start, self.pos))),
            _ => Err(CompileError::syntax_at(
                "unterminated character literal",
                Span::new(start, self.pos),
            )),
        }
    }

    fn lex_escape(&mut self, start: usize) -> Result<char> {
        match self.bump() {
            Some(b'n') => Ok('\n'),
            Some(b't') => Ok('\t'),
            Some(b'r') => Ok('\r'),
            Some(b'0') => Ok('\0'),
            Some(b'\\') => Ok('\\'),
            Some(b'\'') => Ok('\''),
            Some(b'"') => Ok('"'),
            Some(other) => Err(CompileError::syntax_at(
                format!("unknown escape sequence '\\{}'", other as char),
                Span::new(start, self.pos),
            )),
            None => Err(CompileError::syntax_at(
                "unterminated escape sequence",
                Span::new(start, self.pos),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Pass;

    fn lex_all(source: &str) -> Vec<TokenType> {
        let mut ctx = Context::new();
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token(&mut ctx).unwrap();
            if matches!(token.ty, TokenType::Eof) {
                break;
            }
            tokens.push(token.ty);
        }
        tokens
    }

    #[test]
    fn lexes_punctuation_longest_first(){
        let tokens = lex_all("<<= << <= < == = -> -- -");
        assert!(matches!(tokens[0], TokenType::Assign(AssignOp::ShiftLeft)));
        assert!(matches!(tokens[1], TokenType::ShiftLeft));
        assert!(matches!(tokens[2], TokenType::LessEqual));
        assert!(matches!(tokens[3], TokenType::Less));
        assert!(matches!(tokens[4], TokenType::EqualEqual));
        assert!(matches!(tokens[5], TokenType::Assign(AssignOp::Plain)));
        assert!(matches!(tokens[6], TokenType::Arrow));
        assert!(matches!(tokens[7], TokenType::MinusMinus));
        assert!(matches!(tokens[8], TokenType::Minus));
    }

    #[test]
    fn lexes_number_literals() {
        let tokens = lex_all("42 300u 0x10 3.5");
        assert!(matches!(tokens[0], TokenType::Int { value: 42, unsigned: false }));
        assert!(matches!(tokens[1], TokenType::Int { value: 300, unsigned: true }));
        assert!(matches!(tokens[2], TokenType::Int { value: 16, unsigned: false }));
        assert!(matches!(tokens[3], TokenType::Float(v) if v == 3.5));
    }

    #[test]
    fn rejects_overflowing_integer_literals() {
        let mut ctx = Context::new();
        let mut lexer = Lexer::new("99999999999999999999");
        assert!(lexer.next_token(&mut ctx).is_err());
    }

    #[test]
    fn lexes_string_and_char_escapes() {
        let tokens = lex_all(r#""hi\n" 'a' '\0'"#);
        assert!(matches!(&tokens[0], TokenType::Str(s) if s == "hi\n"));
        assert!(matches!(tokens[1], TokenType::Char('a')));
        assert!(matches!(tokens[2], TokenType::Char('\0')));
    }

    #[test]
    fn classifies_known_identifiers() {
        let tokens = lex_all("int banana");
        match &tokens[0] {
            TokenType::Ident(c) => assert!(c.is_type_name()),
            other => panic!("expected identifier, got {:?}", other),
        }
        match &tokens[1] {
            TokenType::Ident(c) => {
                assert_eq!(c.class, crate::ast::IdentClass::Identifier)
            }
            other => panic!("expected identifier, got {:?}", other),
        }
    }

    #[test]
    fn comments_are_trivia() {
        let tokens = lex_all("1 // line\n/* block */ 2");
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn skip_consumes_balanced_braces() {
        let mut ctx = Context::new();
        ctx.pass = Pass::One;
        let mut lexer = Lexer::new("{ nested { \"}\" } body } after");
        ctx.skip_specific(Pass::One, '{');

        let token = lexer.next_token(&mut ctx).unwrap();
        assert!(matches!(token.ty, TokenType::Skipped));

        let token = lexer.next_token(&mut ctx).unwrap();
        match token.ty {
            TokenType::Ident(c) => assert_eq!(c.name, "after"),
            other => panic!("expected the token after the region, got {:?}", other),
        }
    }

    #[test]
    fn skip_discard_lets_the_terminator_through() {
        let mut ctx = Context::new();
        ctx.pass = Pass::One;
        let mut lexer = Lexer::new("; next");
        ctx.skip_specific_unless(Pass::One, '{', ';');

        let token = lexer.next_token(&mut ctx).unwrap();
        assert!(matches!(token.ty, TokenType::Semicolon));
        assert!(!ctx.skip_armed());
    }

    #[test]
    fn initializer_skip_stops_at_first_semicolon() {
        let mut ctx = Context::new();
        ctx.pass = Pass::One;
        let mut lexer = Lexer::new("= 1 + 2; after");
        ctx.skip_specific_unless(Pass::One, '=', ';');

        let token = lexer.next_token(&mut ctx).unwrap();
        assert!(matches!(token.ty, TokenType::Skipped));
        let token = lexer.next_token(&mut ctx).unwrap();
        match token.ty {
            TokenType::Ident(c) => assert_eq!(c.name, "after"),
            other => panic!("expected the token after the region, got {:?}", other),
        }
    }

    #[test]
    fn skip_expectation_survives_intervening_tokens() {
        let mut ctx = Context::new();
        ctx.pass = Pass::One;
        let mut lexer = Lexer::new("-> int { body } rest");
        ctx.skip_specific(Pass::One, '{');

        let token = lexer.next_token(&mut ctx).unwrap();
        assert!(matches!(token.ty, TokenType::Arrow));
        let token = lexer.next_token(&mut ctx).unwrap();
        assert!(matches!(token.ty, TokenType::Ident(_)));
        let token = lexer.next_token(&mut ctx).unwrap();
        assert!(matches!(token.ty, TokenType::Skipped));
        let token = lexer.next_token(&mut ctx).unwrap();
        match token.ty {
            TokenType::Ident(c) => assert_eq!(c.name, "rest"),
            other => panic!("expected the trailing identifier, got {:?}", other),
        }
    }
}
