//! C-native interop.
//!
//! `import native` routes a header through the system preprocessor and
//! lands here: a small scanner and declaration parser accept the subset of
//! C that headers are made of — declaration specifier lists, declarators
//! (pointers, arrays, function declarators with parameter lists and `...`),
//! `struct`/`union`/`enum` bodies, and `typedef` — and [`translate`] turns
//! them into SRC declarations.
//!
//! Function *definitions* (inline functions in headers) are accepted and
//! their bodies discarded; preprocessor line markers and the common GCC
//! extension keywords are dropped by the scanner.

pub mod translate;

use crate::ast::FunctionParameter;
use crate::context::Context;
use crate::types::{Type, TypeLevel};
use smelt_base::{warn, CompileError, Result};

/// Entry point: parses preprocessed C source and adds its declarations to
/// the AST, marked native to `filename`.
pub fn parse_native(ctx: &mut Context, source: &str, filename: &str) -> Result<()> {
    let tokens = scan(source)?;
    let mut parser = CParser {
        tokens,
        pos: 0,
        filename: filename.to_string(),
    };
    parser.parse_translation_unit(ctx)
}

// ----------------------------------------------------------------------
// Scanner
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum CTok {
    Ident(String),
    Keyword(CKeyword),
    Int(i64),
    FloatLit(f64),
    Str(String),
    CharLit(char),
    Star,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    Assign,
    Ellipsis,
    Minus,
    Plus,
    ShiftLeft,
    ShiftRight,
    Pipe,
    Amp,
    Tilde,
    /// Punctuation the declaration subset has no use for.
    Other(char),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CKeyword {
    Typedef,
    Extern,
    Static,
    Auto,
    Register,
    ThreadLocal,
    Inline,
    Noreturn,
    Const,
    Volatile,
    Restrict,
    Signed,
    Unsigned,
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Bool,
    Struct,
    Union,
    Enum,
    Complex,
    Imaginary,
    Atomic,
}

fn keyword_of(text: &str) -> Option<CKeyword> {
    Some(match text {
        "typedef" => CKeyword::Typedef,
        "extern" => CKeyword::Extern,
        "static" => CKeyword::Static,
        "auto" => CKeyword::Auto,
        "register" => CKeyword::Register,
        "_Thread_local" | "__thread" => CKeyword::ThreadLocal,
        "inline" | "__inline" | "__inline__" => CKeyword::Inline,
        "_Noreturn" => CKeyword::Noreturn,
        "const" | "__const" => CKeyword::Const,
        "volatile" | "__volatile__" => CKeyword::Volatile,
        "restrict" | "__restrict" | "__restrict__" => CKeyword::Restrict,
        "signed" | "__signed__" => CKeyword::Signed,
        "unsigned" => CKeyword::Unsigned,
        "void" => CKeyword::Void,
        "char" => CKeyword::Char,
        "short" => CKeyword::Short,
        "int" => CKeyword::Int,
        "long" => CKeyword::Long,
        "float" => CKeyword::Float,
        "double" => CKeyword::Double,
        "_Bool" => CKeyword::Bool,
        "struct" => CKeyword::Struct,
        "union" => CKeyword::Union,
        "enum" => CKeyword::Enum,
        "_Complex" => CKeyword::Complex,
        "_Imaginary" => CKeyword::Imaginary,
        "_Atomic" => CKeyword::Atomic,
        _ => return None,
    })
}

/// Extension keywords that carry no information for declaration parsing.
fn is_ignorable_ident(text: &str) -> bool {
    matches!(text, "__extension__" | "__attribute__" | "__asm__" | "__asm")
}

fn scan(source: &str) -> Result<Vec<CTok>> {
    let bytes = source.as_bytes();
    let mut pos = 0;
    let mut tokens = Vec::new();

    while pos < bytes.len() {
        let b = bytes[pos];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => pos += 1,
            // Preprocessor line markers.
            b'#' => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = pos;
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                let text = &source[start..pos];
                if is_ignorable_ident(text) {
                    // `__attribute__((…))` and `__asm__(…)` drag a
                    // parenthesized tail along.
                    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                        pos += 1;
                    }
                    if pos < bytes.len() && bytes[pos] == b'(' {
                        let mut depth = 0usize;
                        while pos < bytes.len() {
                            match bytes[pos] {
                                b'(' => depth += 1,
                                b')' => {
                                    depth -= 1;
                                    if depth == 0 {
                                        pos += 1;
                                        break;
                                    }
                                }
                                _ => {}
                            }
                            pos += 1;
                        }
                    }
                } else if let Some(keyword) = keyword_of(text) {
                    tokens.push(CTok::Keyword(keyword));
                } else {
                    tokens.push(CTok::Ident(text.to_string()));
                }
            }
            b'0'..=b'9' => {
                let start = pos;
                let mut is_float = false;
                if b == b'0' && pos + 1 < bytes.len() && (bytes[pos + 1] | 0x20) == b'x' {
                    pos += 2;
                    while pos < bytes.len() && bytes[pos].is_ascii_hexdigit() {
                        pos += 1;
                    }
                } else {
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                    if pos < bytes.len() && bytes[pos] == b'.' {
                        is_float = true;
                        pos += 1;
                        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                            pos += 1;
                        }
                    }
                }
                let digits = &source[start..pos];
                // Integer suffixes.
                while pos < bytes.len() && matches!(bytes[pos] | 0x20, b'u' | b'l' | b'f') {
                    pos += 1;
                }
                if is_float {
                    tokens.push(CTok::FloatLit(digits.parse().unwrap_or(0.0)));
                } else {
                    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
                        i64::from_str_radix(hex, 16).unwrap_or(i64::MAX)
                    } else if digits.starts_with('0') && digits.len() > 1 {
                        i64::from_str_radix(&digits[1..], 8).unwrap_or(i64::MAX)
                    } else {
                        digits.parse().unwrap_or(i64::MAX)
                    };
                    tokens.push(CTok::Int(value));
                }
            }
            b'"' => {
                pos += 1;
                let mut value = String::new();
                while pos < bytes.len() && bytes[pos] != b'"' {
                    if bytes[pos] == b'\\' && pos + 1 < bytes.len() {
                        value.push(bytes[pos + 1] as char);
                        pos += 2;
                    } else {
                        value.push(bytes[pos] as char);
                        pos += 1;
                    }
                }
                pos += 1;
                tokens.push(CTok::Str(value));
            }
            b'\'' => {
                pos += 1;
                let value = if bytes.get(pos) == Some(&b'\\') {
                    pos += 2;
                    bytes.get(pos - 1).map(|b| *b as char).unwrap_or('\0')
                } else {
                    let c = bytes.get(pos).map(|b| *b as char).unwrap_or('\0');
                    pos += 1;
                    c
                };
                while pos < bytes.len() && bytes[pos] != b'\'' {
                    pos += 1;
                }
                pos += 1;
                tokens.push(CTok::CharLit(value));
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 2;
                while pos + 1 < bytes.len() && !(bytes[pos] == b'*' && bytes[pos + 1] == b'/') {
                    pos += 1;
                }
                pos += 2;
            }
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            }
            _ => {
                let tok = match b {
                    b'*' => CTok::Star,
                    b'(' => CTok::LParen,
                    b')' => CTok::RParen,
                    b'{' => CTok::LBrace,
                    b'}' => CTok::RBrace,
                    b'[' => CTok::LBracket,
                    b']' => CTok::RBracket,
                    b';' => CTok::Semicolon,
                    b',' => CTok::Comma,
                    b':' => CTok::Colon,
                    b'=' => CTok::Assign,
                    b'-' => CTok::Minus,
                    b'+' => CTok::Plus,
                    b'|' => CTok::Pipe,
                    b'&' => CTok::Amp,
                    b'~' => CTok::Tilde,
                    b'.' if bytes.get(pos + 1) == Some(&b'.') && bytes.get(pos + 2) == Some(&b'.') => {
                        pos += 2;
                        CTok::Ellipsis
                    }
                    b'<' if bytes.get(pos + 1) == Some(&b'<') => {
                        pos += 1;
                        CTok::ShiftLeft
                    }
                    b'>' if bytes.get(pos + 1) == Some(&b'>') => {
                        pos += 1;
                        CTok::ShiftRight
                    }
                    other => CTok::Other(other as char),
                };
                pos += 1;
                tokens.push(tok);
            }
        }
    }

    tokens.push(CTok::Eof);
    Ok(tokens)
}

// ----------------------------------------------------------------------
// Declaration parser
// ----------------------------------------------------------------------

/// One entry of a declaration specifier list, in source order.
#[derive(Debug, Clone)]
pub enum CTypeSpec {
    Signed,
    Unsigned,
    Complex,
    Imaginary,
    Atomic,
    /// A resolved base type: a primitive keyword, a typedef name, or a
    /// struct/union/enum specifier.
    Ty(Type),
}

#[derive(Debug, Clone, Default)]
pub struct CDeclSpecs {
    pub is_typedef: bool,
    pub type_specs: Vec<CTypeSpec>,
}

/// A parsed declarator: the declared name (absent for abstract
/// declarators), the levels it adds, and its function shape if any.
#[derive(Debug, Default)]
pub struct CDeclarator {
    pub name: Option<String>,
    pub levels: Vec<TypeLevel>,
    pub is_function: bool,
    /// `(*name)(…)` — a function pointer rather than a function.
    pub is_function_pointer: bool,
    pub parameters: Vec<FunctionParameter>,
    pub is_c_vararg: bool,
}

struct CParser {
    tokens: Vec<CTok>,
    pos: usize,
    filename: String,
}

impl CParser {
    fn current(&self) -> &CTok {
        self.tokens.get(self.pos).unwrap_or(&CTok::Eof)
    }

    fn peek(&self, offset: usize) -> &CTok {
        self.tokens.get(self.pos + offset).unwrap_or(&CTok::Eof)
    }

    fn advance(&mut self) -> CTok {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &CTok) -> bool {
        if self.current() == tok {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: CTok, what: &str) -> Result<()> {
        if self.current() == &tok {
            self.advance();
            Ok(())
        } else {
            Err(CompileError::syntax(format!(
                "{}: expected {} in a C declaration, got {:?}",
                self.filename, what, self.current()
            )))
        }
    }

    fn skip_braces(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.advance() {
                CTok::LBrace => depth += 1,
                CTok::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                CTok::Eof => return,
                _ => {}
            }
        }
    }

    fn skip_to_declaration_end(&mut self) {
        loop {
            match self.current() {
                CTok::Semicolon => {
                    self.advance();
                    return;
                }
                CTok::LBrace => {
                    self.skip_braces();
                    return;
                }
                CTok::Eof => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_translation_unit(&mut self, ctx: &mut Context) -> Result<()> {
        loop {
            match self.current() {
                CTok::Eof => return Ok(()),
                CTok::Semicolon => {
                    self.advance();
                }
                _ => self.parse_external_declaration(ctx)?,
            }
        }
    }

    fn parse_external_declaration(&mut self, ctx: &mut Context) -> Result<()> {
        let specs = match self.parse_declaration_specifiers(ctx)? {
            Some(specs) => specs,
            None => {
                // Nothing recognizable; resynchronize at the next ';'.
                self.skip_to_declaration_end();
                return Ok(());
            }
        };

        if self.eat(&CTok::Semicolon) {
            // `struct X { … };` — the specifier did all the declaring.
            return Ok(());
        }

        loop {
            let declarator = self.parse_declarator(ctx)?;
            translate::declare_from_declarator(ctx, &specs, declarator, &self.filename)?;

            if self.eat(&CTok::Comma) {
                continue;
            }
            if self.current() == &CTok::LBrace {
                // An inline function definition; the body is not ours.
                self.skip_braces();
                return Ok(());
            }
            if self.eat(&CTok::Assign) {
                // A header-level initializer; discard its value.
                while !matches!(self.current(), CTok::Semicolon | CTok::Eof) {
                    self.advance();
                }
            }
            self.expect(CTok::Semicolon, "';'")?;
            return Ok(());
        }
    }

    /// Parses storage classes, qualifiers and type specifiers. Returns
    /// `None` when the position holds nothing declaration-like.
    fn parse_declaration_specifiers(&mut self, ctx: &mut Context) -> Result<Option<CDeclSpecs>> {
        let mut specs = CDeclSpecs::default();
        let mut saw_base = false;
        let mut progressed = false;

        loop {
            match self.current().clone() {
                CTok::Keyword(keyword) => match keyword {
                    CKeyword::Typedef => {
                        specs.is_typedef = true;
                        self.advance();
                    }
                    CKeyword::Extern
                    | CKeyword::Static
                    | CKeyword::Auto
                    | CKeyword::Register
                    | CKeyword::ThreadLocal
                    | CKeyword::Inline
                    | CKeyword::Noreturn
                    | CKeyword::Const
                    | CKeyword::Volatile
                    | CKeyword::Restrict => {
                        self.advance();
                    }
                    CKeyword::Signed => {
                        specs.type_specs.push(CTypeSpec::Signed);
                        self.advance();
                    }
                    CKeyword::Unsigned => {
                        specs.type_specs.push(CTypeSpec::Unsigned);
                        self.advance();
                    }
                    CKeyword::Complex => {
                        specs.type_specs.push(CTypeSpec::Complex);
                        self.advance();
                    }
                    CKeyword::Imaginary => {
                        specs.type_specs.push(CTypeSpec::Imaginary);
                        self.advance();
                    }
                    CKeyword::Atomic => {
                        specs.type_specs.push(CTypeSpec::Atomic);
                        self.advance();
                    }
                    CKeyword::Void
                    | CKeyword::Char
                    | CKeyword::Short
                    | CKeyword::Int
                    | CKeyword::Long
                    | CKeyword::Float
                    | CKeyword::Double
                    | CKeyword::Bool => {
                        specs
                            .type_specs
                            .push(CTypeSpec::Ty(translate::primitive_keyword_type(keyword)));
                        saw_base = true;
                        self.advance();
                    }
                    CKeyword::Struct | CKeyword::Union => {
                        let ty = self.parse_struct_spec(ctx, keyword == CKeyword::Union)?;
                        specs.type_specs.push(CTypeSpec::Ty(ty));
                        saw_base = true;
                    }
                    CKeyword::Enum => {
                        let ty = self.parse_enum_spec(ctx)?;
                        specs.type_specs.push(CTypeSpec::Ty(ty));
                        saw_base = true;
                    }
                },
                CTok::Ident(name) if !saw_base => {
                    // A lone identifier is a type specifier only while no
                    // base type has been seen and the symbol table knows it
                    // as one.
                    match translate::lookup_type_name(ctx, &name) {
                        Some(ty) => {
                            specs.type_specs.push(CTypeSpec::Ty(ty));
                            saw_base = true;
                            self.advance();
                        }
                        None => break,
                    }
                }
                _ => break,
            }
            progressed = true;
        }

        if progressed {
            Ok(Some(specs))
        } else {
            Ok(None)
        }
    }

    fn parse_struct_spec(&mut self, ctx: &mut Context, is_union: bool) -> Result<Type> {
        self.advance();
        if is_union {
            warn("C unions are not supported, treating as a structure");
        }

        let tag = match self.current().clone() {
            CTok::Ident(name) => {
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let members = if self.eat(&CTok::LBrace) {
            Some(self.parse_member_list(ctx)?)
        } else {
            None
        };

        translate::declare_struct(ctx, tag, members, &self.filename)
    }

    fn parse_member_list(&mut self, ctx: &mut Context) -> Result<Vec<crate::ast::StructureMember>> {
        let mut members = Vec::new();
        while !self.eat(&CTok::RBrace) {
            if self.current() == &CTok::Eof {
                return Err(CompileError::syntax(format!(
                    "{}: unexpected end of header in a structure body",
                    self.filename
                )));
            }
            let specs = match self.parse_declaration_specifiers(ctx)? {
                Some(specs) => specs,
                None => {
                    self.skip_to_declaration_end();
                    continue;
                }
            };
            loop {
                let declarator = self.parse_declarator(ctx)?;
                // Bitfields only constrain layout; the width is dropped.
                if self.eat(&CTok::Colon) {
                    while !matches!(
                        self.current(),
                        CTok::Comma | CTok::Semicolon | CTok::RBrace | CTok::Eof
                    ) {
                        self.advance();
                    }
                }
                if let Some(member) =
                    translate::member_from_declarator(ctx, &specs, declarator)?
                {
                    members.push(member);
                }
                if !self.eat(&CTok::Comma) {
                    break;
                }
            }
            self.expect(CTok::Semicolon, "';' after a member")?;
        }
        Ok(members)
    }

    fn parse_enum_spec(&mut self, ctx: &mut Context) -> Result<Type> {
        self.advance();

        let tag = match self.current().clone() {
            CTok::Ident(name) => {
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let members = if self.eat(&CTok::LBrace) {
            let mut members = Vec::new();
            let mut next_value = 0i64;
            while !self.eat(&CTok::RBrace) {
                let name = match self.advance() {
                    CTok::Ident(name) => name,
                    CTok::Eof => {
                        return Err(CompileError::syntax(format!(
                            "{}: unexpected end of header in an enum body",
                            self.filename
                        )))
                    }
                    _ => continue,
                };
                let value = if self.eat(&CTok::Assign) {
                    match self.parse_enum_value() {
                        Some(value) => value,
                        None => {
                            // Not a plain constant; keep counting from the
                            // last known value.
                            while !matches!(self.current(), CTok::Comma | CTok::RBrace | CTok::Eof)
                            {
                                self.advance();
                            }
                            next_value
                        }
                    }
                } else {
                    next_value
                };
                next_value = value + 1;
                members.push(crate::ast::EnumMember { name, value });
                self.eat(&CTok::Comma);
            }
            Some(members)
        } else {
            None
        };

        translate::declare_enum(ctx, tag, members, &self.filename)
    }

    /// A plain constant enum value: an integer, optionally negated or
    /// parenthesized.
    fn parse_enum_value(&mut self) -> Option<i64> {
        match self.current().clone() {
            CTok::Int(value) => {
                self.advance();
                Some(value)
            }
            CTok::Minus => {
                self.advance();
                match self.current().clone() {
                    CTok::Int(value) => {
                        self.advance();
                        Some(-value)
                    }
                    _ => None,
                }
            }
            CTok::LParen => {
                self.advance();
                let value = self.parse_enum_value()?;
                if self.eat(&CTok::RParen) {
                    Some(value)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn parse_declarator(&mut self, ctx: &mut Context) -> Result<CDeclarator> {
        let mut declarator = CDeclarator::default();

        while matches!(
            self.current(),
            CTok::Star
                | CTok::Keyword(CKeyword::Const)
                | CTok::Keyword(CKeyword::Volatile)
                | CTok::Keyword(CKeyword::Restrict)
        ) {
            if self.advance() == CTok::Star {
                declarator.levels.push(TypeLevel::pointer());
            }
        }

        match self.current().clone() {
            CTok::Ident(name) => {
                self.advance();
                declarator.name = Some(name);
            }
            CTok::LParen if self.nested_declarator_follows() => {
                self.advance();
                let inner = self.parse_declarator(ctx)?;
                self.expect(CTok::RParen, "')'")?;
                declarator.name = inner.name;
                if !inner.levels.is_empty() {
                    declarator.is_function_pointer = true;
                }
            }
            _ => {
                // Abstract declarator: no name.
            }
        }

        loop {
            match self.current() {
                CTok::LParen => {
                    self.advance();
                    if declarator.is_function_pointer {
                        // The pointed-to signature is not representable;
                        // consume and discard it.
                        self.skip_parameter_list()?;
                        declarator.is_function = true;
                        continue;
                    }
                    declarator.is_function = true;
                    let (parameters, is_c_vararg) = self.parse_parameter_list(ctx)?;
                    declarator.parameters = parameters;
                    declarator.is_c_vararg = is_c_vararg;
                }
                CTok::LBracket => {
                    self.advance();
                    let size = match self.current().clone() {
                        CTok::Int(value) if value >= 0 => {
                            self.advance();
                            Some(value as u64)
                        }
                        _ => {
                            while !matches!(self.current(), CTok::RBracket | CTok::Eof) {
                                self.advance();
                            }
                            None
                        }
                    };
                    self.expect(CTok::RBracket, "']'")?;
                    declarator.levels.push(match size {
                        Some(size) => TypeLevel::sized_array(size),
                        None => TypeLevel::array(),
                    });
                }
                _ => break,
            }
        }

        Ok(declarator)
    }

    /// Distinguishes `(*name)` from a parameter list after an omitted name.
    fn nested_declarator_follows(&self) -> bool {
        matches!(self.peek(1), CTok::Star)
    }

    fn skip_parameter_list(&mut self) -> Result<()> {
        let mut depth = 1usize;
        loop {
            match self.advance() {
                CTok::LParen => depth += 1,
                CTok::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                CTok::Eof => {
                    return Err(CompileError::syntax(format!(
                        "{}: unexpected end of header in a parameter list",
                        self.filename
                    )))
                }
                _ => {}
            }
        }
    }

    fn parse_parameter_list(
        &mut self,
        ctx: &mut Context,
    ) -> Result<(Vec<FunctionParameter>, bool)> {
        let mut parameters = Vec::new();
        let mut is_c_vararg = false;

        if self.eat(&CTok::RParen) {
            return Ok((parameters, is_c_vararg));
        }

        loop {
            if self.eat(&CTok::Ellipsis) {
                is_c_vararg = true;
                break;
            }
            let specs = match self.parse_declaration_specifiers(ctx)? {
                Some(specs) => specs,
                None => {
                    // K&R style or unparseable; give up on details.
                    self.skip_parameter_list()?;
                    return Ok((parameters, is_c_vararg));
                }
            };
            let declarator = self.parse_declarator(ctx)?;
            if let Some(parameter) =
                translate::parameter_from_declarator(ctx, &specs, declarator, parameters.len())?
            {
                parameters.push(parameter);
            }
            if !self.eat(&CTok::Comma) {
                break;
            }
        }
        self.expect(CTok::RParen, "')'")?;
        Ok((parameters, is_c_vararg))
    }
}
