//! C code emission.
//!
//! The emitter walks the AST's declaration list in source order and writes
//! one C translation unit:
//!
//! 1. a preface of standard includes plus every `import native` header,
//! 2. structure typedefs (names first, then bodies, so self-references
//!    resolve),
//! 3. enum typedefs with mangled member names,
//! 4. alias typedefs,
//! 5. forward declarations for functions and variables,
//! 6. definitions for the origin's functions and variables.
//!
//! Native declarations come from an included header and are never
//! re-emitted; extern declarations get a forward but no definition.
//!
//! Constructor expressions are hoisted: each one was assigned a
//! `_cst_tmpvar_<n>_` name at parse time, and the statement that uses one
//! is preceded by the lines that build it.

use smelt_base::{CompileError, Result};
use smelt_language::ast::{Ast, DcFunction, DcVariable, DeclBody, Declaration, FunctionSignature};
use smelt_language::expr::{
    Basic, BasicKind, Binary, BinaryNode, Cast, Condition, ConditionNode, ConstructorId,
    Expression, ExpressionBlock, ExpressionNode, NumberLiteral, Postfix, PostfixKind,
    PostfixLevel, Unary, UnaryKind,
};
use smelt_language::primitive;
use smelt_language::stmt::{Jump, Statement, StVariable};
use smelt_language::types::{Type, TypeKind};
use std::fmt::Write;

/// Emits the whole program as one C source file.
pub fn emit(ast: &Ast) -> Result<String> {
    let mut emitter = Emitter {
        ast,
        out: String::new(),
    };
    emitter.emit_program()?;
    Ok(emitter.out)
}

struct Emitter<'a> {
    ast: &'a Ast,
    out: String,
}

const INDENT: &str = "    ";

impl<'a> Emitter<'a> {
    fn emit_program(&mut self) -> Result<()> {
        self.emit_preface();
        self.emit_structures()?;
        self.emit_enums()?;
        self.emit_aliases()?;
        self.emit_forwards()?;
        self.emit_definitions()?;
        Ok(())
    }

    fn emit_preface(&mut self) {
        self.out.push_str("#include <stdint.h>\n");
        self.out.push_str("#include <stdbool.h>\n");
        self.out.push_str("#include <stdlib.h>\n");
        for (_, decl) in self.ast.decls() {
            if let DeclBody::Import(import) = &decl.body {
                if import.is_native {
                    let mut path = import.path.join("/");
                    path.push_str(".h");
                    let _ = writeln!(self.out, "#include <{}>", path);
                }
            }
        }
        self.out.push('\n');
    }

    fn emit_structures(&mut self) -> Result<()> {
        for (_, decl) in self.ast.decls() {
            if decl.is_native {
                continue;
            }
            if let DeclBody::Structure(s) = &decl.body {
                if let Some(name) = &s.name {
                    let _ = writeln!(self.out, "typedef struct {} {};", name, name);
                }
            }
        }
        for (_, decl) in self.ast.decls() {
            if decl.is_native || !decl.is_full {
                continue;
            }
            if let DeclBody::Structure(s) = &decl.body {
                if let Some(name) = &s.name {
                    let _ = writeln!(self.out, "struct {} {{", name);
                    for member in &s.members {
                        let ty = self.c_type(&member.ty)?;
                        let _ = writeln!(self.out, "{}{} {};", INDENT, ty, member.name);
                    }
                    self.out.push_str("};\n");
                }
            }
        }
        self.out.push('\n');
        Ok(())
    }

    fn emit_enums(&mut self) -> Result<()> {
        for (_, decl) in self.ast.decls() {
            if decl.is_native || !decl.is_full {
                continue;
            }
            if let DeclBody::Enum(e) = &decl.body {
                if let Some(name) = &e.name {
                    let _ = writeln!(self.out, "typedef enum {} {{", name);
                    for member in &e.members {
                        let _ = writeln!(
                            self.out,
                            "{}{} = {},",
                            INDENT,
                            mangled_enum_member(name, &member.name),
                            member.value
                        );
                    }
                    let _ = writeln!(self.out, "}} {};", name);
                }
            }
        }
        self.out.push('\n');
        Ok(())
    }

    fn emit_aliases(&mut self) -> Result<()> {
        for (_, decl) in self.ast.decls() {
            if decl.is_native || !decl.is_full {
                continue;
            }
            if let DeclBody::Alias(a) = &decl.body {
                if let Some(name) = &a.name {
                    let ty = self.c_type(&a.target)?;
                    let _ = writeln!(self.out, "typedef {} {};", ty, name);
                }
            }
        }
        self.out.push('\n');
        Ok(())
    }

    fn emit_forwards(&mut self) -> Result<()> {
        for (_, decl) in self.ast.decls() {
            if decl.is_native {
                continue;
            }
            match &decl.body {
                DeclBody::Function(f) => {
                    if let Some(signature) = &f.signature {
                        let line = self.function_head(f, signature)?;
                        let _ = writeln!(self.out, "{};", line);
                    }
                }
                DeclBody::Variable(v) => {
                    let ty = self.c_type(&v.ty)?;
                    if v.is_extern {
                        let _ = writeln!(self.out, "extern {} {};", ty, v.name);
                    } else {
                        let _ = writeln!(self.out, "{} {};", ty, v.name);
                    }
                }
                _ => {}
            }
        }
        self.out.push('\n');
        Ok(())
    }

    fn emit_definitions(&mut self) -> Result<()> {
        for (_, decl) in self.ast.decls() {
            if decl.is_native {
                continue;
            }
            match &decl.body {
                DeclBody::Function(f) => self.emit_function_definition(decl, f)?,
                DeclBody::Variable(v) => self.emit_variable_definition(v)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn emit_function_definition(&mut self, decl: &Declaration, f: &DcFunction) -> Result<()> {
        if f.is_extern || !decl.is_full {
            return Ok(());
        }
        let (signature, body) = match (&f.signature, &f.body) {
            (Some(signature), Some(body)) => (signature, body),
            _ => return Ok(()),
        };

        let head = self.function_head(f, signature)?;
        let _ = writeln!(self.out, "{} {{", head);
        match body {
            Statement::Compound(statements) => {
                for statement in statements {
                    self.emit_statement(statement, 1)?;
                }
            }
            other => self.emit_statement(other, 1)?,
        }
        self.out.push_str("}\n\n");
        Ok(())
    }

    fn emit_variable_definition(&mut self, v: &DcVariable) -> Result<()> {
        if v.is_extern {
            return Ok(());
        }
        if let Some(block) = &v.value {
            let ty = self.c_type(&v.ty)?;
            let value = self.expression(&block.value)?;
            let _ = writeln!(self.out, "{} {} = {};", ty, v.name, value);
        }
        Ok(())
    }

    fn function_head(&self, f: &DcFunction, signature: &FunctionSignature) -> Result<String> {
        let mut parameters = Vec::new();
        for parameter in &signature.parameters {
            parameters.push(format!(
                "{} {}",
                self.c_type(&parameter.ty)?,
                parameter.name
            ));
        }
        if signature.is_c_vararg {
            parameters.push("...".to_string());
        }
        Ok(format!(
            "{} {}({})",
            self.c_type(&signature.return_type)?,
            f.name,
            parameters.join(", ")
        ))
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// The C spelling of a lexical type. Arrays emit as pointers; the
    /// distinction only matters to the type checker.
    fn c_type(&self, ty: &Type) -> Result<String> {
        let mut name = match ty.kind {
            TypeKind::Primitive(index) => {
                primitive::PRIMITIVES[index].c_code_name.to_string()
            }
            TypeKind::Structure(id) => self.native_tag_name(id, "struct")?,
            TypeKind::Enum(id) => self.native_tag_name(id, "enum")?,
            TypeKind::Alias(id) => self
                .ast
                .decl(id)
                .name
                .clone()
                .ok_or_else(|| CompileError::internal("anonymous alias reached emission"))?,
            TypeKind::Function(_) => {
                return Err(CompileError::internal(
                    "function types cannot be spelled in C output",
                ))
            }
            #[cfg(feature = "generics")]
            TypeKind::Generic(_) => {
                return Err(CompileError::internal(
                    "generic types cannot be spelled in C output",
                ))
            }
        };
        for _ in &ty.levels {
            name.push('*');
        }
        Ok(name)
    }

    /// SRC-side `struct_X` / `enum_X` names map back to C tag syntax;
    /// everything else is a typedef name.
    fn native_tag_name(&self, id: smelt_language::ast::DeclId, tag: &str) -> Result<String> {
        let decl = self.ast.decl(id);
        let name = decl
            .name
            .clone()
            .ok_or_else(|| CompileError::internal("anonymous type reached emission"))?;
        if decl.is_native {
            let prefix = format!("{}_", tag);
            if let Some(stripped) = name.strip_prefix(&prefix) {
                return Ok(format!("{} {}", tag, stripped));
            }
        }
        Ok(name)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
    }

    fn emit_statement(&mut self, statement: &Statement, depth: usize) -> Result<()> {
        match statement {
            Statement::Variable(variable) => self.emit_variable_statement(variable, depth),
            Statement::Expression(block) => {
                self.emit_hoisted(block, depth)?;
                let value = self.expression(&block.value)?;
                self.indent(depth);
                let _ = writeln!(self.out, "{};", value);
                Ok(())
            }
            Statement::Compound(statements) => {
                self.indent(depth);
                self.out.push_str("{\n");
                for statement in statements {
                    self.emit_statement(statement, depth + 1)?;
                }
                self.indent(depth);
                self.out.push_str("}\n");
                Ok(())
            }
            Statement::If {
                condition,
                body,
                otherwise,
            } => {
                self.emit_hoisted(condition, depth)?;
                let value = self.expression(&condition.value)?;
                self.indent(depth);
                let _ = writeln!(self.out, "if ({})", value);
                self.emit_braced(body, depth)?;
                if let Some(otherwise) = otherwise {
                    self.indent(depth);
                    self.out.push_str("else\n");
                    self.emit_braced(otherwise, depth)?;
                }
                Ok(())
            }
            Statement::While { condition, body } => {
                self.emit_hoisted(condition, depth)?;
                let value = self.expression(&condition.value)?;
                self.indent(depth);
                let _ = writeln!(self.out, "while ({})", value);
                self.emit_braced(body, depth)?;
                Ok(())
            }
            Statement::Jump(jump) => {
                match jump {
                    Jump::Return(Some(block)) => {
                        self.emit_hoisted(block, depth)?;
                        let value = self.expression(&block.value)?;
                        self.indent(depth);
                        let _ = writeln!(self.out, "return {};", value);
                    }
                    Jump::Return(None) => {
                        self.indent(depth);
                        self.out.push_str("return;\n");
                    }
                    Jump::Break => {
                        self.indent(depth);
                        self.out.push_str("break;\n");
                    }
                    Jump::Continue => {
                        self.indent(depth);
                        self.out.push_str("continue;\n");
                    }
                }
                Ok(())
            }
        }
    }

    /// Bodies of `if`/`while` always emit inside braces, so hoisted
    /// temporaries cannot leak into the surrounding scope.
    fn emit_braced(&mut self, body: &Statement, depth: usize) -> Result<()> {
        match body {
            Statement::Compound(_) => self.emit_statement(body, depth),
            other => {
                self.indent(depth);
                self.out.push_str("{\n");
                self.emit_statement(other, depth + 1)?;
                self.indent(depth);
                self.out.push_str("}\n");
                Ok(())
            }
        }
    }

    fn emit_variable_statement(&mut self, variable: &StVariable, depth: usize) -> Result<()> {
        let ty = self.c_type(&variable.ty)?;
        match &variable.value {
            Some(block) => {
                self.emit_hoisted(block, depth)?;
                let value = self.expression(&block.value)?;
                self.indent(depth);
                let _ = writeln!(self.out, "{} {} = {};", ty, variable.name, value);
            }
            None => {
                self.indent(depth);
                let _ = writeln!(self.out, "{} {};", ty, variable.name);
            }
        }
        Ok(())
    }

    /// Emits the temporary-variable lines for every constructor created
    /// while parsing `block`, in creation order (inner before outer).
    fn emit_hoisted(&mut self, block: &ExpressionBlock, depth: usize) -> Result<()> {
        for id in &block.constructors {
            self.emit_constructor(*id, depth)?;
        }
        Ok(())
    }

    fn emit_constructor(&mut self, id: ConstructorId, depth: usize) -> Result<()> {
        let ctor = self.ast.constructors.get(id);
        let base = self.c_type(&ctor.ty)?;
        let name = &ctor.variable_name;

        let mut arguments = Vec::new();
        for argument in &ctor.arguments {
            arguments.push(self.expression(argument)?);
        }

        if ctor.is_array {
            let count = match &ctor.array_size {
                Some(size) => self.expression(size)?,
                None => arguments.len().to_string(),
            };
            self.indent(depth);
            let _ = writeln!(
                self.out,
                "{}* {} = malloc(sizeof({}) * ({}));",
                base, name, base, count
            );
            for (index, argument) in arguments.iter().enumerate() {
                self.indent(depth);
                let _ = writeln!(self.out, "{}[{}] = {};", name, index, argument);
            }
            return Ok(());
        }

        if ctor.is_new {
            self.indent(depth);
            let _ = writeln!(self.out, "{}* {} = malloc(sizeof({}));", base, name, base);
            self.indent(depth);
            if matches!(ctor.ty.kind, TypeKind::Structure(_)) {
                let _ = writeln!(self.out, "*{} = ({}){{ {} }};", name, base, arguments.join(", "));
            } else {
                let _ = writeln!(self.out, "*{} = {};", name, arguments.join(", "));
            }
            return Ok(());
        }

        if ctor.ty.is_pointer() {
            let mut pointee = ctor.ty.clone();
            pointee.pop_level();
            let pointee = self.c_type(&pointee)?;
            self.indent(depth);
            let _ = writeln!(self.out, "{} {} = malloc(sizeof({}));", base, name, pointee);
            self.indent(depth);
            let _ = writeln!(self.out, "*{} = {};", name, arguments.join(", "));
            return Ok(());
        }

        self.indent(depth);
        if matches!(ctor.ty.kind, TypeKind::Structure(_)) {
            let _ = writeln!(self.out, "{} {} = {{ {} }};", base, name, arguments.join(", "));
        } else {
            let _ = writeln!(self.out, "{} {} = {};", base, name, arguments.join(", "));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&self, expression: &Expression) -> Result<String> {
        match &expression.node {
            ExpressionNode::Plain(condition) => self.condition(condition),
            ExpressionNode::Assignment {
                assignee,
                op,
                value,
            } => Ok(format!(
                "{} {} {}",
                self.unary(assignee)?,
                op.symbol(),
                self.expression(value)?
            )),
        }
    }

    fn condition(&self, condition: &Condition) -> Result<String> {
        match &condition.node {
            ConditionNode::Plain(binary) => self.binary(binary),
            ConditionNode::Ternary {
                condition,
                then,
                otherwise,
            } => Ok(format!(
                "({} ? {} : {})",
                self.binary(condition)?,
                self.expression(then)?,
                self.condition(otherwise)?
            )),
        }
    }

    fn binary(&self, binary: &Binary) -> Result<String> {
        match &binary.node {
            BinaryNode::Leaf(cast) => self.cast(cast),
            BinaryNode::Operation { left, op, right } => Ok(format!(
                "({} {} {})",
                self.binary(left)?,
                op.symbol(),
                self.binary(right)?
            )),
        }
    }

    fn cast(&self, cast: &Cast) -> Result<String> {
        let mut result = self.unary(&cast.value)?;
        for target in &cast.casts {
            result = format!("(({}){})", self.c_type(target)?, result);
        }
        Ok(result)
    }

    fn unary(&self, unary: &Unary) -> Result<String> {
        let mut result = self.postfix(&unary.value)?;
        result = match unary.kind {
            UnaryKind::Plain => result,
            UnaryKind::Increment => format!("++{}", result),
            UnaryKind::Decrement => format!("--{}", result),
            UnaryKind::Plus => format!("+{}", result),
            UnaryKind::Minus => format!("-{}", result),
        };
        // Application order is innermost-first; prepending in that order
        // rebuilds the source spelling.
        for op in &unary.ops {
            result = format!("{}{}", op.symbol(), result);
        }
        Ok(result)
    }

    fn postfix(&self, postfix: &Postfix) -> Result<String> {
        let mut result = self.basic(&postfix.value)?;
        for level in &postfix.levels {
            result = match level {
                PostfixLevel::Index(index) => {
                    format!("{}[{}]", result, self.expression(index)?)
                }
                PostfixLevel::Invocation(arguments) => {
                    let mut parts = Vec::new();
                    for argument in arguments {
                        parts.push(self.expression(argument)?);
                    }
                    format!("{}({})", result, parts.join(", "))
                }
                PostfixLevel::Property(name) => format!("{}.{}", result, name),
                PostfixLevel::PointerProperty(name) => format!("{}->{}", result, name),
            };
        }
        match postfix.kind {
            PostfixKind::Plain => {}
            PostfixKind::Increment => result.push_str("++"),
            PostfixKind::Decrement => result.push_str("--"),
        }
        Ok(result)
    }

    fn basic(&self, basic: &Basic) -> Result<String> {
        Ok(match &basic.kind {
            BasicKind::Variable(name) | BasicKind::Parameter(name) => name.clone(),
            BasicKind::Function(id) => self
                .ast
                .decl(*id)
                .name
                .clone()
                .ok_or_else(|| CompileError::internal("anonymous function reached emission"))?,
            BasicKind::Number(NumberLiteral::Integer { value, unsigned }) => {
                if *unsigned {
                    format!("{}u", *value as u64)
                } else {
                    value.to_string()
                }
            }
            BasicKind::Number(NumberLiteral::Floating(value)) => format!("{:?}", value),
            BasicKind::Boolean(value) => value.to_string(),
            BasicKind::Character(value) => format!("'{}'", escape_char(*value)),
            BasicKind::Str(value) => format!("\"{}\"", escape_str(value)),
            BasicKind::EnumMember { decl, member } => {
                let declaration = self.ast.decl(*decl);
                let e = match &declaration.body {
                    DeclBody::Enum(e) => e,
                    _ => return Err(CompileError::internal("enum member points at a non-enum")),
                };
                let member = &e.members[*member];
                if declaration.is_native {
                    // The included header already defines the plain name.
                    member.name.clone()
                } else {
                    let name = e
                        .name
                        .as_deref()
                        .ok_or_else(|| CompileError::internal("anonymous enum reached emission"))?;
                    mangled_enum_member(name, &member.name)
                }
            }
            BasicKind::Constructor(id) => self.ast.constructors.get(*id).variable_name.clone(),
            BasicKind::Parenthesized(expression) => {
                format!("({})", self.expression(expression)?)
            }
        })
    }
}

fn mangled_enum_member(enum_name: &str, member_name: &str) -> String {
    format!("_cst_enum__{}__member__{}", enum_name, member_name)
}

fn escape_char(c: char) -> String {
    match c {
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        '\r' => "\\r".to_string(),
        '\0' => "\\0".to_string(),
        '\\' => "\\\\".to_string(),
        '\'' => "\\'".to_string(),
        other => other.to_string(),
    }
}

fn escape_str(s: &str) -> String {
    let mut out = String::new();
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}
