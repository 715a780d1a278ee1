//! The SRC parser.
//!
//! A recursive-descent parser with one token of lookahead. Declarations are
//! parsed differently per import pass: pass 1 registers top-level names and
//! fast-forwards over bodies through the lexer's skip facility, pass 2
//! fills in type bodies and signatures, and pass 3 (origin only) parses
//! function bodies and variable initializers.
//!
//! Frame discipline matters because the lexer classifies identifiers one
//! token ahead: scope and flag frames are entered *before* advancing past
//! the token that precedes their region, and exited while their closing
//! token is still current.

use crate::ast::{
    DcAlias, DcEnum, DcFunction, DcImport, DcStructure, DcVariable, DeclBody, DeclId, Declaration,
    EnumMember, FunctionParameter, FunctionSignature, IdentClass, IndexTarget, StructureMember,
};
use crate::constant::Constant;
use crate::context::{Context, EnumValueKind, Frame, LocalDecl, Pass, TypeFlags};
use crate::expr::inherit::check_constructor;
use crate::expr::{
    Basic, Binary, Cast, Condition, ExConstructor, Expression, ExpressionBlock, NumberLiteral,
    Postfix, PostfixKind, Unary, UnaryKind,
};
use crate::lexer::Lexer;
use crate::ops::{BinaryOp, UnaryOp};
use crate::stmt::{Jump, Statement, StVariable};
use crate::token::{Classified, Resolved, Token, TokenType};
use crate::types::Type;
use smelt_base::{CompileError, Result};

/// Parses one source file into the context's AST, honoring the context's
/// current pass.
pub fn parse(ctx: &mut Context, source: &str) -> Result<()> {
    let mut parser = Parser::new(source, ctx)?;
    parser.parse_program(ctx)
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, ctx: &mut Context) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token(ctx)?;
        Ok(Self { lexer, current })
    }

    fn advance(&mut self, ctx: &mut Context) -> Result<Token> {
        let next = self.lexer.next_token(ctx)?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn err_here(&self, message: impl Into<String>) -> CompileError {
        CompileError::syntax_at(message, self.current.span)
    }

    fn expect(&mut self, ctx: &mut Context, ty: &TokenType, what: &str) -> Result<Token> {
        if self.current.is(ty) {
            self.advance(ctx)
        } else {
            Err(self.err_here(format!("expected {}, got {}", what, self.current.describe())))
        }
    }

    fn eat(&mut self, ctx: &mut Context, ty: &TokenType) -> Result<bool> {
        if self.current.is(ty) {
            self.advance(ctx)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn at_plain_assign(&self) -> bool {
        matches!(self.current.ty, TokenType::Assign(crate::ops::AssignOp::Plain))
    }

    /// Consumes the current token, which must be an identifier of any
    /// class, and returns its raw name.
    fn expect_name(&mut self, ctx: &mut Context, what: &str) -> Result<String> {
        match &self.current.ty {
            TokenType::Ident(c) => {
                let name = c.name.clone();
                self.advance(ctx)?;
                Ok(name)
            }
            _ => Err(self.err_here(format!("expected {}, got {}", what, self.current.describe()))),
        }
    }

    fn current_name(&self) -> Result<String> {
        match &self.current.ty {
            TokenType::Ident(c) => Ok(c.name.clone()),
            _ => Err(self.err_here(format!("expected a name, got {}", self.current.describe()))),
        }
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    pub fn parse_program(&mut self, ctx: &mut Context) -> Result<()> {
        loop {
            match &self.current.ty {
                TokenType::Eof => return Ok(()),
                TokenType::Semicolon => {
                    self.advance(ctx)?;
                }
                TokenType::Import => self.parse_import(ctx)?,
                TokenType::Struct => self.parse_struct(ctx)?,
                TokenType::Enum => self.parse_enum(ctx)?,
                TokenType::Alias => self.parse_alias(ctx)?,
                TokenType::Fn => self.parse_function(ctx)?,
                TokenType::Unsigned | TokenType::Signed | TokenType::Ident(_) => {
                    self.parse_global_variable(ctx)?
                }
                _ => {
                    return Err(self.err_here(format!(
                        "expected a declaration, got {}",
                        self.current.describe()
                    )))
                }
            }
        }
    }

    fn parse_import(&mut self, ctx: &mut Context) -> Result<()> {
        // Path segments must stay plain identifiers no matter what the
        // symbol table says about them.
        ctx.enter(Frame::Import);
        self.advance(ctx)?;

        let is_native = self.eat(ctx, &TokenType::Native)?;
        let mut path = vec![self.expect_name(ctx, "an import path segment")?];
        while self.eat(ctx, &TokenType::Dot)? {
            path.push(self.expect_name(ctx, "an import path segment")?);
        }
        ctx.exit()?;

        // Process the import while ';' is still current: the token after
        // it must be classified with the imported names already registered.
        let import = DcImport { path, is_native };
        crate::import::process_import(ctx, import)?;

        self.expect(ctx, &TokenType::Semicolon, "';' after the import path")?;
        Ok(())
    }

    /// Registers a declaration and indexes its name; a merge into an
    /// existing forward declaration registers nothing new.
    fn declare(&self, ctx: &mut Context, decl: Declaration) -> Result<Option<DeclId>> {
        match ctx.ast.add_declaration(decl)? {
            Some(id) => {
                ctx.ast.add_identifier(id)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// The declaration id a name resolves to after `declare`.
    fn declared_id(&self, ctx: &Context, name: &str) -> Result<DeclId> {
        match ctx.ast.lookup(name).map(|e| e.target) {
            Some(IndexTarget::Decl(id)) => Ok(id),
            _ => Err(CompileError::internal(format!(
                "declaration \"{}\" vanished from the index",
                name
            ))),
        }
    }

    fn parse_struct(&mut self, ctx: &mut Context) -> Result<()> {
        self.advance(ctx)?;
        let name = self.current_name()?;

        // Bodies are parsed on pass 2 only.
        ctx.skip_specific_unless(Pass::One, '{', ';');
        ctx.skip_specific_unless(Pass::Three, '{', ';');
        self.advance(ctx)?;

        match &self.current.ty {
            TokenType::Skipped | TokenType::Semicolon => {
                self.advance(ctx)?;
                let decl = Declaration::new(
                    DeclBody::Structure(DcStructure {
                        name: Some(name),
                        members: Vec::new(),
                    }),
                    false,
                );
                self.declare(ctx, decl)?;
                Ok(())
            }
            TokenType::LBrace => {
                self.advance(ctx)?;
                let mut members = Vec::new();
                while !self.current.is(&TokenType::RBrace) {
                    let ty = self.parse_type(ctx)?;
                    let member_name = self.expect_name(ctx, "a member name")?;
                    self.expect(ctx, &TokenType::Semicolon, "';' after the member")?;
                    members.push(StructureMember {
                        name: member_name,
                        ty,
                    });
                }
                self.advance(ctx)?;

                let decl = Declaration::new(
                    DeclBody::Structure(DcStructure {
                        name: Some(name),
                        members,
                    }),
                    true,
                );
                self.declare(ctx, decl)?;
                Ok(())
            }
            _ => Err(self.err_here(format!(
                "expected a structure body or ';', got {}",
                self.current.describe()
            ))),
        }
    }

    fn parse_enum(&mut self, ctx: &mut Context) -> Result<()> {
        self.advance(ctx)?;
        let name = self.current_name()?;

        ctx.skip_specific_unless(Pass::One, '{', ';');
        ctx.skip_specific_unless(Pass::Three, '{', ';');
        self.advance(ctx)?;

        match &self.current.ty {
            TokenType::Skipped | TokenType::Semicolon => {
                self.advance(ctx)?;
                let decl = Declaration::new(
                    DeclBody::Enum(DcEnum {
                        name: Some(name),
                        members: Vec::new(),
                    }),
                    false,
                );
                self.declare(ctx, decl)?;
                Ok(())
            }
            TokenType::LBrace => {
                ctx.enter_enum();
                self.advance(ctx)?;

                let mut members = Vec::new();
                while !self.current.is(&TokenType::RBrace) {
                    let member_name = self.expect_name(ctx, "an enum member name")?;
                    let explicit = self.at_plain_assign();

                    let (member_index, kind) = ctx.expect_enum()?;
                    let index = *member_index;
                    *member_index += 1;
                    let chosen = if explicit {
                        EnumValueKind::Explicit
                    } else {
                        EnumValueKind::Implicit
                    };
                    if *kind == EnumValueKind::Unknown {
                        *kind = chosen;
                    } else if *kind != chosen {
                        return Err(self.err_here(format!(
                            "enum \"{}\" cannot mix implicit and explicit member values",
                            name
                        )));
                    }

                    let value = if explicit {
                        self.advance(ctx)?;
                        let expression = self.parse_expression(ctx)?;
                        match ctx.ast.props.get(expression.props).constant.convert(
                            crate::constant::ConstantKind::Long,
                        ) {
                            Constant::Long(v) => v,
                            _ => {
                                return Err(self.err_here(format!(
                                    "enum member \"{}\" value must be a constant integer",
                                    member_name
                                )))
                            }
                        }
                    } else {
                        index as i64
                    };

                    members.push(EnumMember {
                        name: member_name,
                        value,
                    });
                    if !self.eat(ctx, &TokenType::Comma)? {
                        break;
                    }
                }

                ctx.exit()?;
                self.expect(ctx, &TokenType::RBrace, "'}' after the enum members")?;

                let decl = Declaration::new(
                    DeclBody::Enum(DcEnum {
                        name: Some(name.clone()),
                        members: members.clone(),
                    }),
                    true,
                );
                self.declare(ctx, decl)?;
                let id = self.declared_id(ctx, &name)?;
                for (index, member) in members.iter().enumerate() {
                    ctx.ast.add_enum_member(&member.name, id, index)?;
                }
                Ok(())
            }
            _ => Err(self.err_here(format!(
                "expected an enum body or ';', got {}",
                self.current.describe()
            ))),
        }
    }

    fn parse_alias(&mut self, ctx: &mut Context) -> Result<()> {
        self.advance(ctx)?;
        let name = self.current_name()?;

        // The target is parsed on pass 2 only; elsewhere the initializer
        // pair consumes "= … ;" wholesale.
        ctx.skip_specific(Pass::One, '=');
        ctx.skip_specific(Pass::Three, '=');
        self.advance(ctx)?;

        match &self.current.ty {
            TokenType::Skipped => {
                self.advance(ctx)?;
                let decl = Declaration::new(
                    DeclBody::Alias(DcAlias {
                        name: Some(name),
                        target: Type::primitive(crate::primitive::VOID),
                    }),
                    false,
                );
                self.declare(ctx, decl)?;
                Ok(())
            }
            TokenType::Assign(crate::ops::AssignOp::Plain) => {
                self.advance(ctx)?;
                let target = self.parse_type(ctx)?;
                self.expect(ctx, &TokenType::Semicolon, "';' after the alias target")?;
                let decl = Declaration::new(
                    DeclBody::Alias(DcAlias {
                        name: Some(name),
                        target,
                    }),
                    true,
                );
                self.declare(ctx, decl)?;
                Ok(())
            }
            _ => Err(self.err_here(format!(
                "expected '=' after the alias name, got {}",
                self.current.describe()
            ))),
        }
    }

    fn parse_function(&mut self, ctx: &mut Context) -> Result<()> {
        self.advance(ctx)?;
        let name = self.current_name()?;

        if ctx.pass == Pass::One {
            // Name only: consume the parameter list, then everything up to
            // and including the body (or the ';' of a bodyless prototype).
            ctx.skip_specific(Pass::One, '(');
            self.advance(ctx)?;
            self.expect(ctx, &TokenType::Skipped, "a parameter list")?;

            ctx.skip_specific_unless(Pass::One, '{', ';');
            while !self.current.is(&TokenType::Skipped)
                && !self.current.is(&TokenType::Semicolon)
            {
                if self.current.is(&TokenType::Eof) {
                    return Err(self.err_here("unexpected end of file in a function declaration"));
                }
                self.advance(ctx)?;
            }
            self.advance(ctx)?;

            let decl = Declaration::new(
                DeclBody::Function(DcFunction {
                    name,
                    signature: None,
                    body: None,
                    is_extern: !ctx.in_origin,
                }),
                false,
            );
            self.declare(ctx, decl)?;
            return Ok(());
        }

        self.advance(ctx)?;
        self.expect(ctx, &TokenType::LParen, "'(' after the function name")?;

        let mut parameters = Vec::new();
        let mut is_c_vararg = false;
        while !self.current.is(&TokenType::RParen) {
            if self.eat(ctx, &TokenType::Ellipsis)? {
                is_c_vararg = true;
                break;
            }
            let ty = self.parse_type(ctx)?;
            let parameter_name = self.expect_name(ctx, "a parameter name")?;
            parameters.push(FunctionParameter {
                name: parameter_name,
                ty,
            });
            if !self.eat(ctx, &TokenType::Comma)? {
                break;
            }
        }

        // Bodies are parsed on pass 3 only; arm before ')' so the skip is
        // live when '{' gets lexed. A ';' first means a bodyless prototype.
        ctx.skip_specific_unless(Pass::Two, '{', ';');
        self.expect(ctx, &TokenType::RParen, "')' after the parameters")?;

        let return_type = if self.eat(ctx, &TokenType::Arrow)? {
            self.parse_type(ctx)?
        } else {
            Type::primitive(crate::primitive::VOID)
        };

        let signature = FunctionSignature {
            parameters,
            is_c_vararg,
            return_type,
        };

        let body = match &self.current.ty {
            TokenType::Skipped | TokenType::Semicolon => {
                self.advance(ctx)?;
                None
            }
            TokenType::LBrace => {
                ctx.enter_scope();
                for parameter in &signature.parameters {
                    ctx.register_local(LocalDecl {
                        name: parameter.name.clone(),
                        class: IdentClass::ParameterName,
                        ty: parameter.ty.clone(),
                    })?;
                }
                self.advance(ctx)?;
                let statements = self.parse_block_statements(ctx)?;
                ctx.exit()?;
                self.expect(ctx, &TokenType::RBrace, "'}' after the function body")?;
                Some(Statement::Compound(statements))
            }
            _ => {
                return Err(self.err_here(format!(
                    "expected a function body, got {}",
                    self.current.describe()
                )))
            }
        };

        let is_full = body.is_some();
        let decl = Declaration::new(
            DeclBody::Function(DcFunction {
                name,
                signature: Some(signature),
                body,
                is_extern: !ctx.in_origin,
            }),
            is_full,
        );
        self.declare(ctx, decl)?;
        Ok(())
    }

    fn parse_global_variable(&mut self, ctx: &mut Context) -> Result<()> {
        let ty = if ctx.pass == Pass::One {
            self.parse_type_loose(ctx)?
                .unwrap_or_else(crate::ast::type_placeholder)
        } else {
            self.parse_type(ctx)?
        };
        let name = self.current_name()?;

        // Initializers are parsed on pass 3 only.
        ctx.skip_specific_unless(Pass::One, '=', ';');
        ctx.skip_specific_unless(Pass::Two, '=', ';');
        self.advance(ctx)?;

        let value = match &self.current.ty {
            TokenType::Skipped => {
                self.advance(ctx)?;
                None
            }
            TokenType::Semicolon => {
                self.advance(ctx)?;
                None
            }
            TokenType::Assign(crate::ops::AssignOp::Plain) => {
                self.advance(ctx)?;
                let block = self.parse_expression_block(ctx)?;
                self.check_initializer(ctx, &ty, &block)?;
                self.expect(ctx, &TokenType::Semicolon, "';' after the initializer")?;
                Some(block)
            }
            _ => {
                return Err(self.err_here(format!(
                    "expected ';' or an initializer, got {}",
                    self.current.describe()
                )))
            }
        };

        let decl = Declaration::new(
            DeclBody::Variable(DcVariable {
                name,
                ty,
                value,
                is_extern: !ctx.in_origin,
            }),
            ctx.pass != Pass::One,
        );
        self.declare(ctx, decl)?;
        Ok(())
    }

    fn check_initializer(&self, ctx: &Context, ty: &Type, block: &ExpressionBlock) -> Result<()> {
        let value_ty = &ctx.ast.props.get(block.value.props).ty;
        if Type::merge_prioritized(ty, value_ty).is_none() {
            return Err(CompileError::syntax(format!(
                "illegal assignment to type \"{}\" from type \"{}\"",
                ty.display_name(&ctx.ast),
                value_ty.display_name(&ctx.ast)
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn parse_type(&mut self, ctx: &mut Context) -> Result<Type> {
        let mut ty = self.parse_type_base(ctx)?;
        self.parse_type_levels(ctx, &mut ty)?;
        Ok(ty)
    }

    /// The named part of a type, handling a signedness override keyword.
    ///
    /// The flag frame is entered before the type token is lexed and left
    /// before the token after it is lexed, so the override applies to
    /// exactly one identifier.
    fn parse_type_base(&mut self, ctx: &mut Context) -> Result<Type> {
        match &self.current.ty {
            TokenType::Unsigned | TokenType::Signed => {
                let flags = if self.current.is(&TokenType::Unsigned) {
                    TypeFlags::UNSIGNED
                } else {
                    TypeFlags::empty()
                };
                ctx.enter_flag(flags);
                self.advance(ctx)?;
                let classified = self.current_classified()?;
                let ty = ctx.classified_as_type(&classified)?;
                ctx.exit()?;
                self.advance(ctx)?;
                Ok(ty)
            }
            TokenType::Ident(c) if c.is_type_name() => {
                let classified = c.clone();
                let ty = ctx.classified_as_type(&classified)?;
                self.advance(ctx)?;
                Ok(ty)
            }
            _ => Err(self.err_here(format!("expected a type, got {}", self.current.describe()))),
        }
    }

    fn current_classified(&self) -> Result<Classified> {
        match &self.current.ty {
            TokenType::Ident(c) => Ok(c.clone()),
            _ => Err(self.err_here(format!("expected a type, got {}", self.current.describe()))),
        }
    }

    fn parse_type_levels(&mut self, ctx: &mut Context, ty: &mut Type) -> Result<()> {
        loop {
            if self.eat(ctx, &TokenType::Star)? {
                ty.wrap_pointer();
            } else if self.current.is(&TokenType::LBracket) {
                self.advance(ctx)?;
                if self.eat(ctx, &TokenType::RBracket)? {
                    ty.wrap_array();
                } else {
                    let size = self.parse_constant_size(ctx)?;
                    self.expect(ctx, &TokenType::RBracket, "']' after the array size")?;
                    ty.wrap_sized_array(size);
                }
            } else {
                return Ok(());
            }
        }
    }

    fn parse_constant_size(&mut self, ctx: &mut Context) -> Result<u64> {
        let expression = self.parse_expression(ctx)?;
        match ctx
            .ast
            .props
            .get(expression.props)
            .constant
            .convert(crate::constant::ConstantKind::Long)
        {
            Constant::Long(v) if v >= 0 => Ok(v as u64),
            _ => Err(self.err_here("array size must be a constant non-negative integer")),
        }
    }

    /// Pass-1 type parsing: names may not be registered yet, so an unknown
    /// identifier with level tokens is consumed without building a type.
    fn parse_type_loose(&mut self, ctx: &mut Context) -> Result<Option<Type>> {
        match &self.current.ty {
            TokenType::Unsigned | TokenType::Signed => self.parse_type(ctx).map(Some),
            TokenType::Ident(c) if c.is_type_name() => self.parse_type(ctx).map(Some),
            TokenType::Ident(_) => {
                self.advance(ctx)?;
                loop {
                    if self.eat(ctx, &TokenType::Star)? {
                        continue;
                    }
                    if self.current.is(&TokenType::LBracket) {
                        let mut depth = 0usize;
                        loop {
                            if self.current.is(&TokenType::LBracket) {
                                depth += 1;
                            } else if self.current.is(&TokenType::RBracket) {
                                depth -= 1;
                            } else if self.current.is(&TokenType::Eof) {
                                return Err(self.err_here("unexpected end of file in a type"));
                            }
                            self.advance(ctx)?;
                            if depth == 0 {
                                break;
                            }
                        }
                        continue;
                    }
                    break;
                }
                Ok(None)
            }
            _ => Err(self.err_here(format!("expected a type, got {}", self.current.describe()))),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Statements up to, but not including, the closing brace.
    fn parse_block_statements(&mut self, ctx: &mut Context) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        while !self.current.is(&TokenType::RBrace) {
            if self.current.is(&TokenType::Eof) {
                return Err(self.err_here("unexpected end of file in a block"));
            }
            statements.push(self.parse_statement(ctx)?);
        }
        Ok(statements)
    }

    fn parse_statement(&mut self, ctx: &mut Context) -> Result<Statement> {
        match &self.current.ty {
            TokenType::LBrace => {
                self.advance(ctx)?;
                let statements = self.parse_block_statements(ctx)?;
                self.expect(ctx, &TokenType::RBrace, "'}' after the block")?;
                Ok(Statement::Compound(statements))
            }
            TokenType::If => {
                self.advance(ctx)?;
                self.expect(ctx, &TokenType::LParen, "'(' after 'if'")?;
                let condition = self.parse_expression_block(ctx)?;
                self.check_condition(ctx, &condition, "if")?;
                self.expect(ctx, &TokenType::RParen, "')' after the condition")?;
                let body = Box::new(self.parse_statement(ctx)?);
                let otherwise = if self.eat(ctx, &TokenType::Else)? {
                    Some(Box::new(self.parse_statement(ctx)?))
                } else {
                    None
                };
                Ok(Statement::If {
                    condition,
                    body,
                    otherwise,
                })
            }
            TokenType::While => {
                self.advance(ctx)?;
                self.expect(ctx, &TokenType::LParen, "'(' after 'while'")?;
                let condition = self.parse_expression_block(ctx)?;
                self.check_condition(ctx, &condition, "while")?;
                self.expect(ctx, &TokenType::RParen, "')' after the condition")?;
                let body = Box::new(self.parse_statement(ctx)?);
                Ok(Statement::While { condition, body })
            }
            TokenType::Return => {
                self.advance(ctx)?;
                if self.eat(ctx, &TokenType::Semicolon)? {
                    return Ok(Statement::Jump(Jump::Return(None)));
                }
                let value = self.parse_expression_block(ctx)?;
                self.expect(ctx, &TokenType::Semicolon, "';' after the return value")?;
                Ok(Statement::Jump(Jump::Return(Some(value))))
            }
            TokenType::Break => {
                self.advance(ctx)?;
                self.expect(ctx, &TokenType::Semicolon, "';' after 'break'")?;
                Ok(Statement::Jump(Jump::Break))
            }
            TokenType::Continue => {
                self.advance(ctx)?;
                self.expect(ctx, &TokenType::Semicolon, "';' after 'continue'")?;
                Ok(Statement::Jump(Jump::Continue))
            }
            TokenType::Semicolon => {
                self.advance(ctx)?;
                Ok(Statement::Compound(Vec::new()))
            }
            TokenType::Unsigned | TokenType::Signed => self.parse_variable_statement(ctx),
            TokenType::Ident(c) if c.is_type_name() => {
                // A type name starts a local declaration unless it is a
                // constructor expression.
                let peeked = self.peek_is_constructor(ctx)?;
                if peeked {
                    self.parse_expression_statement(ctx)
                } else {
                    self.parse_variable_statement(ctx)
                }
            }
            _ => self.parse_expression_statement(ctx),
        }
    }

    /// Distinguishes `P { … }` / `P[n] { … }` (constructor expression) from
    /// `P x;` / `P* x;` (local declaration) at a type-name token.
    fn peek_is_constructor(&mut self, ctx: &mut Context) -> Result<bool> {
        Ok(matches!(self.lexer.peek_token(ctx)?.ty, TokenType::LBrace))
    }

    fn parse_variable_statement(&mut self, ctx: &mut Context) -> Result<Statement> {
        let ty = self.parse_type(ctx)?;
        let name = self.expect_name(ctx, "a variable name")?;

        let value = if self.at_plain_assign() {
            self.advance(ctx)?;
            let block = self.parse_expression_block(ctx)?;
            self.check_initializer(ctx, &ty, &block)?;
            Some(block)
        } else {
            None
        };

        // Bind before consuming ';' so the next statement's first token
        // already sees the new local.
        ctx.register_local(LocalDecl {
            name: name.clone(),
            class: IdentClass::VariableName,
            ty: ty.clone(),
        })?;
        self.expect(ctx, &TokenType::Semicolon, "';' after the declaration")?;

        Ok(Statement::Variable(StVariable { name, ty, value }))
    }

    fn parse_expression_statement(&mut self, ctx: &mut Context) -> Result<Statement> {
        let block = self.parse_expression_block(ctx)?;
        self.expect(ctx, &TokenType::Semicolon, "';' after the expression")?;
        Ok(Statement::Expression(block))
    }

    fn check_condition(
        &self,
        ctx: &Context,
        condition: &ExpressionBlock,
        construct: &str,
    ) -> Result<()> {
        let ty = &ctx.ast.props.get(condition.value.props).ty;
        if !ty.is_pp_boolean() {
            return Err(CompileError::syntax(format!(
                "{} condition must be a boolean, got type \"{}\"",
                construct,
                ty.display_name(&ctx.ast)
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expression_block(&mut self, ctx: &mut Context) -> Result<ExpressionBlock> {
        ctx.enter_expression();
        let value = self.parse_expression(ctx);
        let frame = ctx.exit()?;
        let value = value?;
        let constructors = match frame {
            Frame::Expression { constructors } => constructors,
            _ => return Err(CompileError::internal("expression frame mismatch")),
        };
        Ok(ExpressionBlock {
            constructors,
            value,
        })
    }

    pub fn parse_expression(&mut self, ctx: &mut Context) -> Result<Expression> {
        let condition = self.parse_condition(ctx)?;

        if let TokenType::Assign(op) = &self.current.ty {
            let op = *op;
            let assignee = match into_assign_target(condition) {
                Some(assignee) => assignee,
                None => return Err(self.err_here("invalid assignment target")),
            };
            self.advance(ctx)?;
            let value = self.parse_expression(ctx)?;
            return Expression::assignment(&mut ctx.ast, assignee, op, value);
        }

        Ok(Expression::plain(condition))
    }

    fn parse_condition(&mut self, ctx: &mut Context) -> Result<Condition> {
        let binary = self.parse_binary(ctx, 0)?;

        if self.eat(ctx, &TokenType::Question)? {
            let then = self.parse_expression(ctx)?;
            self.expect(ctx, &TokenType::Colon, "':' in the conditional expression")?;
            let otherwise = self.parse_condition(ctx)?;
            return Condition::ternary(&mut ctx.ast, binary, then, otherwise);
        }

        Ok(Condition::from_binary(binary))
    }

    fn parse_binary(&mut self, ctx: &mut Context, min_precedence: u8) -> Result<Binary> {
        let mut left = Binary::from_cast(self.parse_cast(ctx)?);

        while let Some((op, precedence)) = binary_op_of(&self.current.ty) {
            if precedence < min_precedence {
                break;
            }
            self.advance(ctx)?;
            let right = self.parse_binary(ctx, precedence + 1)?;
            left = Binary::combine(&mut ctx.ast, op, left, right)?;
        }

        Ok(left)
    }

    fn parse_cast(&mut self, ctx: &mut Context) -> Result<Cast> {
        if self.current.is(&TokenType::LParen) {
            let peeked = self.lexer.peek_token(ctx)?;
            let is_cast = match &peeked.ty {
                TokenType::Unsigned | TokenType::Signed => true,
                TokenType::Ident(c) => c.is_type_name(),
                _ => false,
            };
            if is_cast {
                self.advance(ctx)?;
                let target = self.parse_type(ctx)?;
                self.expect(ctx, &TokenType::RParen, "')' after the cast type")?;
                let mut inner = self.parse_cast(ctx)?;
                inner.add_cast(&mut ctx.ast, target)?;
                return Ok(inner);
            }
        }

        Ok(Cast::from_unary(self.parse_unary(ctx)?))
    }

    fn parse_unary(&mut self, ctx: &mut Context) -> Result<Unary> {
        let prefix_op = match &self.current.ty {
            TokenType::Amp => Some(UnaryOp::Reference),
            TokenType::Star => Some(UnaryOp::Dereference),
            TokenType::Tilde => Some(UnaryOp::BitwiseNot),
            TokenType::Bang => Some(UnaryOp::LogicNot),
            _ => None,
        };
        if let Some(op) = prefix_op {
            self.advance(ctx)?;
            let mut inner = self.parse_unary(ctx)?;
            inner.add_op(&mut ctx.ast, op)?;
            return Ok(inner);
        }

        let kind = match &self.current.ty {
            TokenType::PlusPlus => Some(UnaryKind::Increment),
            TokenType::MinusMinus => Some(UnaryKind::Decrement),
            TokenType::Plus => Some(UnaryKind::Plus),
            TokenType::Minus => Some(UnaryKind::Minus),
            _ => None,
        };
        if let Some(kind) = kind {
            self.advance(ctx)?;
            let mut inner = self.parse_unary(ctx)?;
            inner.set_kind(&mut ctx.ast, kind)?;
            return Ok(inner);
        }

        Ok(Unary::from_postfix(self.parse_postfix(ctx)?))
    }

    fn parse_postfix(&mut self, ctx: &mut Context) -> Result<Postfix> {
        let basic = self.parse_basic(ctx)?;
        let mut postfix = Postfix::from_basic(basic);

        loop {
            match &self.current.ty {
                TokenType::LBracket => {
                    self.advance(ctx)?;
                    let index = self.parse_expression(ctx)?;
                    self.expect(ctx, &TokenType::RBracket, "']' after the index")?;
                    postfix.add_index(&mut ctx.ast, index)?;
                }
                TokenType::LParen => {
                    self.advance(ctx)?;
                    let mut arguments = Vec::new();
                    while !self.current.is(&TokenType::RParen) {
                        arguments.push(self.parse_expression(ctx)?);
                        if !self.eat(ctx, &TokenType::Comma)? {
                            break;
                        }
                    }
                    self.expect(ctx, &TokenType::RParen, "')' after the arguments")?;
                    postfix.add_invocation(&mut ctx.ast, arguments)?;
                }
                TokenType::Dot => {
                    self.advance(ctx)?;
                    let name = self.expect_name(ctx, "a member name")?;
                    postfix.add_property(&mut ctx.ast, name)?;
                }
                TokenType::Arrow => {
                    self.advance(ctx)?;
                    let name = self.expect_name(ctx, "a member name")?;
                    postfix.add_pointer_property(&mut ctx.ast, name)?;
                }
                TokenType::PlusPlus => {
                    self.advance(ctx)?;
                    postfix.end(&mut ctx.ast, PostfixKind::Increment)?;
                    break;
                }
                TokenType::MinusMinus => {
                    self.advance(ctx)?;
                    postfix.end(&mut ctx.ast, PostfixKind::Decrement)?;
                    break;
                }
                _ => break,
            }
        }

        Ok(postfix)
    }

    fn parse_basic(&mut self, ctx: &mut Context) -> Result<Basic> {
        match self.current.ty.clone() {
            TokenType::Int { value, unsigned } => {
                self.advance(ctx)?;
                Ok(Basic::number(
                    &mut ctx.ast,
                    NumberLiteral::Integer { value, unsigned },
                ))
            }
            TokenType::Float(value) => {
                self.advance(ctx)?;
                Ok(Basic::number(&mut ctx.ast, NumberLiteral::Floating(value)))
            }
            TokenType::True => {
                self.advance(ctx)?;
                Ok(Basic::boolean(&mut ctx.ast, true))
            }
            TokenType::False => {
                self.advance(ctx)?;
                Ok(Basic::boolean(&mut ctx.ast, false))
            }
            TokenType::Char(value) => {
                self.advance(ctx)?;
                Ok(Basic::character(&mut ctx.ast, value))
            }
            TokenType::Str(value) => {
                self.advance(ctx)?;
                Ok(Basic::string(&mut ctx.ast, value))
            }
            TokenType::LParen => {
                self.advance(ctx)?;
                let expression = self.parse_expression(ctx)?;
                self.expect(ctx, &TokenType::RParen, "')' after the expression")?;
                Ok(Basic::parenthesized(expression))
            }
            TokenType::New => {
                self.advance(ctx)?;
                self.parse_constructor(ctx, true)
            }
            TokenType::Unsigned | TokenType::Signed => self.parse_constructor(ctx, false),
            TokenType::Ident(classified) => match (&classified.class, &classified.resolved) {
                (IdentClass::VariableName, Resolved::Local(ty)) => {
                    let ty = ty.clone();
                    self.advance(ctx)?;
                    Ok(Basic::variable(&mut ctx.ast, classified.name, &ty))
                }
                (IdentClass::VariableName, Resolved::Decl(id)) => {
                    let ty = match &ctx.ast.decl(*id).body {
                        DeclBody::Variable(v) => v.ty.clone(),
                        _ => return Err(CompileError::internal("variable index entry mismatch")),
                    };
                    self.advance(ctx)?;
                    Ok(Basic::variable(&mut ctx.ast, classified.name, &ty))
                }
                (IdentClass::ParameterName, Resolved::Local(ty)) => {
                    let ty = ty.clone();
                    self.advance(ctx)?;
                    Ok(Basic::parameter(&mut ctx.ast, classified.name, &ty))
                }
                (IdentClass::FunctionName, Resolved::Decl(id)) => {
                    let id = *id;
                    self.advance(ctx)?;
                    Ok(Basic::function(&mut ctx.ast, id))
                }
                (IdentClass::EnumMemberName, Resolved::EnumMember(decl, member)) => {
                    let (decl, member) = (*decl, *member);
                    self.advance(ctx)?;
                    Ok(Basic::enum_member(&mut ctx.ast, decl, member))
                }
                _ if classified.is_type_name() => self.parse_constructor(ctx, false),
                _ => Err(self.err_here(format!(
                    "unknown identifier \"{}\"",
                    classified.name
                ))),
            },
            _ => Err(self.err_here(format!(
                "expected an expression, got {}",
                self.current.describe()
            ))),
        }
    }

    /// `new? T ('['size?']')? '{' args… '}'`
    fn parse_constructor(&mut self, ctx: &mut Context, is_new: bool) -> Result<Basic> {
        let mut ty = self.parse_type_base(ctx)?;
        while self.eat(ctx, &TokenType::Star)? {
            ty.wrap_pointer();
        }

        let mut is_array = false;
        let mut array_size = None;
        if self.current.is(&TokenType::LBracket) {
            self.advance(ctx)?;
            is_array = true;
            if !self.current.is(&TokenType::RBracket) {
                array_size = Some(Box::new(self.parse_expression(ctx)?));
            }
            self.expect(ctx, &TokenType::RBracket, "']' after the array size")?;
        }

        self.expect(ctx, &TokenType::LBrace, "'{' to begin the constructor")?;
        let mut arguments = Vec::new();
        while !self.current.is(&TokenType::RBrace) {
            arguments.push(self.parse_expression(ctx)?);
            if !self.eat(ctx, &TokenType::Comma)? {
                break;
            }
        }
        self.expect(ctx, &TokenType::RBrace, "'}' after the constructor arguments")?;

        let ctor = ExConstructor {
            is_new,
            is_array,
            array_size,
            ty,
            arguments,
            variable_name: ctx.next_tmpvar_name(),
        };
        check_constructor(&ctx.ast, &ctor)?;
        let id = ctx.ast.constructors.alloc(ctor);
        if let Some(constructors) = ctx.find_expression() {
            constructors.push(id);
        }
        Ok(Basic::constructor(&mut ctx.ast, id))
    }
}

/// Extracts the unary assignment target from a parsed condition, which must
/// be a bare unary chain (no binary operators, no casts, no ternary).
fn into_assign_target(condition: Condition) -> Option<Unary> {
    use crate::expr::{BinaryNode, ConditionNode};
    match condition.node {
        ConditionNode::Plain(Binary {
            node: BinaryNode::Leaf(cast),
            ..
        }) if cast.casts.is_empty() => Some(cast.value),
        _ => None,
    }
}

fn binary_op_of(token: &TokenType) -> Option<(BinaryOp, u8)> {
    let entry = match token {
        TokenType::PipePipe => (BinaryOp::LogicOr, 0),
        TokenType::AmpAmp => (BinaryOp::LogicAnd, 1),
        TokenType::Pipe => (BinaryOp::BitOr, 2),
        TokenType::Caret => (BinaryOp::BitXor, 3),
        TokenType::Amp => (BinaryOp::BitAnd, 4),
        TokenType::EqualEqual => (BinaryOp::Equal, 5),
        TokenType::NotEqual => (BinaryOp::NotEqual, 5),
        TokenType::Less => (BinaryOp::Less, 6),
        TokenType::LessEqual => (BinaryOp::LessEqual, 6),
        TokenType::Greater => (BinaryOp::Greater, 6),
        TokenType::GreaterEqual => (BinaryOp::GreaterEqual, 6),
        TokenType::ShiftLeft => (BinaryOp::ShiftLeft, 7),
        TokenType::ShiftRight => (BinaryOp::ShiftRight, 7),
        TokenType::Plus => (BinaryOp::Add, 8),
        TokenType::Minus => (BinaryOp::Subtract, 8),
        TokenType::Star => (BinaryOp::Multiply, 9),
        TokenType::Slash => (BinaryOp::Divide, 9),
        TokenType::Percent => (BinaryOp::Modulo, 9),
        _ => return None,
    };
    Some(entry)
}
