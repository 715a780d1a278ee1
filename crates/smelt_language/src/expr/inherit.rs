//! Expression inheritance.
//!
//! Each function here performs one construction step of the expression
//! hierarchy: it takes the node one grammar level down (plus, for many
//! kinds, an extra operand), enforces the operand type rules, and populates
//! the node's data and shared properties side by side.
//!
//! Steps that wrap a lower node reuse the lower node's properties handle
//! and mutate through it; steps that introduce a fresh referent or literal
//! allocate a new block.

use crate::ast::Ast;
use crate::constant::{self, Constant};
use crate::expr::*;
use crate::ops::{AssignOp, BinaryOp, UnaryOp};
use crate::primitive;
use crate::types::{Type, TypeKind};
use smelt_base::{CompileError, Result};

fn alloc_props(ast: &mut Ast, ty: Type, constant: Constant) -> PropsId {
    ast.props.alloc(ExprProps { ty, constant })
}

fn ty(ast: &Ast, props: PropsId) -> &Type {
    &ast.props.get(props).ty
}

fn constant_of(ast: &Ast, props: PropsId) -> &Constant {
    &ast.props.get(props).constant
}

/// The type and constant of a numeric literal.
///
/// Integer literals take the smallest signed primitive whose range contains
/// the value (unsigned with a `u` suffix); floating literals take the
/// smallest of float and double.
pub fn number_literal_props(literal: &NumberLiteral) -> (Type, Constant) {
    match *literal {
        NumberLiteral::Integer { value, unsigned: false } => {
            if value <= i8::MAX as i64 {
                (Type::primitive(primitive::BYTE), Constant::Byte(value as i8))
            } else if value <= i16::MAX as i64 {
                (Type::primitive(primitive::SHORT), Constant::Short(value as i16))
            } else if value <= i32::MAX as i64 {
                (Type::primitive(primitive::INT), Constant::Int(value as i32))
            } else {
                (Type::primitive(primitive::LONG), Constant::Long(value))
            }
        }
        NumberLiteral::Integer { value, unsigned: true } => {
            let value = value as u64;
            if value <= u8::MAX as u64 {
                (Type::primitive(primitive::UBYTE), Constant::UByte(value as u8))
            } else if value <= u16::MAX as u64 {
                (Type::primitive(primitive::USHORT), Constant::UShort(value as u16))
            } else if value <= u32::MAX as u64 {
                (Type::primitive(primitive::UINT), Constant::UInt(value as u32))
            } else {
                (Type::primitive(primitive::ULONG), Constant::ULong(value))
            }
        }
        NumberLiteral::Floating(value) => {
            if value.abs() <= f32::MAX as f64 {
                (Type::primitive(primitive::FLOAT), Constant::Float(value as f32))
            } else {
                (Type::primitive(primitive::DOUBLE), Constant::Double(value))
            }
        }
    }
}

impl Basic {
    pub fn number(ast: &mut Ast, literal: NumberLiteral) -> Basic {
        let (ty, constant) = number_literal_props(&literal);
        Basic {
            kind: BasicKind::Number(literal),
            props: alloc_props(ast, ty, constant),
        }
    }

    pub fn boolean(ast: &mut Ast, value: bool) -> Basic {
        Basic {
            kind: BasicKind::Boolean(value),
            props: alloc_props(ast, Type::boolean(), Constant::Boolean(value)),
        }
    }

    pub fn character(ast: &mut Ast, value: char) -> Basic {
        let constant = if value.is_ascii() {
            Constant::Byte(value as u8 as i8)
        } else {
            Constant::Dynamic
        };
        Basic {
            kind: BasicKind::Character(value),
            props: alloc_props(ast, Type::character(), constant),
        }
    }

    pub fn string(ast: &mut Ast, value: String) -> Basic {
        Basic {
            kind: BasicKind::Str(value),
            props: alloc_props(ast, Type::string(), Constant::Dynamic),
        }
    }

    pub fn variable(ast: &mut Ast, name: String, ty: &Type) -> Basic {
        Basic {
            kind: BasicKind::Variable(name),
            props: alloc_props(ast, ty.clone(), Constant::Dynamic),
        }
    }

    pub fn parameter(ast: &mut Ast, name: String, ty: &Type) -> Basic {
        Basic {
            kind: BasicKind::Parameter(name),
            props: alloc_props(ast, ty.clone(), Constant::Dynamic),
        }
    }

    pub fn function(ast: &mut Ast, decl: crate::ast::DeclId) -> Basic {
        Basic {
            kind: BasicKind::Function(decl),
            props: alloc_props(ast, Type::new(TypeKind::Function(decl)), Constant::Dynamic),
        }
    }

    pub fn enum_member(ast: &mut Ast, decl: crate::ast::DeclId, member: usize) -> Basic {
        Basic {
            kind: BasicKind::EnumMember { decl, member },
            props: alloc_props(ast, Type::new(TypeKind::Enum(decl)), Constant::Dynamic),
        }
    }

    /// The constructed value's type is the constructor's base type with an
    /// array wrapper for `[]` constructors or a pointer wrapper for `new`.
    pub fn constructor(ast: &mut Ast, id: ConstructorId) -> Basic {
        let ctor = ast.constructors.get(id);
        let mut ty = ctor.ty.clone();
        if ctor.is_array {
            ty.wrap_array();
        } else if ctor.is_new {
            ty.wrap_pointer();
        }
        Basic {
            kind: BasicKind::Constructor(id),
            props: alloc_props(ast, ty, Constant::Dynamic),
        }
    }

    /// A parenthesized expression shares the inner chain's properties.
    pub fn parenthesized(expression: Expression) -> Basic {
        let props = expression.props;
        Basic {
            kind: BasicKind::Parenthesized(Box::new(expression)),
            props,
        }
    }
}

impl Postfix {
    pub fn from_basic(value: Basic) -> Postfix {
        let props = value.props;
        Postfix {
            value,
            levels: Vec::new(),
            kind: PostfixKind::Plain,
            props,
        }
    }

    /// `parent[index]`: the parent must be an array and the index a number;
    /// the result is the parent type with its array wrapper popped.
    pub fn add_index(&mut self, ast: &mut Ast, index: Expression) -> Result<()> {
        if !ty(ast, index.props).is_pp_number() {
            return Err(CompileError::syntax(format!(
                "expected a numerical index for [] operation, got type \"{}\"",
                ty(ast, index.props).display_name(ast)
            )));
        }
        if !ty(ast, self.props).is_array() {
            return Err(CompileError::syntax(format!(
                "expected an array for [] operation, got type \"{}\"",
                ty(ast, self.props).display_name(ast)
            )));
        }

        self.levels.push(PostfixLevel::Index(Box::new(index)));
        let props = ast.props.get_mut(self.props);
        props.ty.pop_level();
        props.constant = Constant::Dynamic;
        Ok(())
    }

    /// `parent(args)`: the parent must be a function; arity and argument
    /// types are checked against the signature, with a C-variadic tail
    /// accepting any extra arguments unchecked.
    pub fn add_invocation(&mut self, ast: &mut Ast, arguments: Vec<Expression>) -> Result<()> {
        let function = match ty(ast, self.props).kind {
            TypeKind::Function(id) => id,
            _ => {
                return Err(CompileError::syntax(format!(
                    "expected a function for a () operation, got \"{}\"",
                    ty(ast, self.props).display_name(ast)
                )))
            }
        };

        let name = ast.function(function)?.name.clone();
        let signature = ast.function_signature(function)?;
        let parameters = signature.parameters.clone();
        let is_c_vararg = signature.is_c_vararg;
        let return_type = signature.return_type.clone();

        if !is_c_vararg && arguments.len() != parameters.len() {
            return Err(CompileError::syntax(format!(
                "invalid argument count for a function \"{}\", expected {}, got {}",
                name,
                parameters.len(),
                arguments.len()
            )));
        }
        if is_c_vararg && arguments.len() < parameters.len() {
            return Err(CompileError::syntax(format!(
                "invalid argument count for a function \"{}\", expected at least {}, got {}",
                name,
                parameters.len(),
                arguments.len()
            )));
        }

        for (parameter, argument) in parameters.iter().zip(arguments.iter()) {
            if !parameter.ty.can_assign(ty(ast, argument.props)) {
                return Err(CompileError::syntax(format!(
                    "expected type \"{}\" for parameter \"{}\" of function \"{}\", got type \"{}\"",
                    parameter.ty.display_name(ast),
                    parameter.name,
                    name,
                    ty(ast, argument.props).display_name(ast)
                )));
            }
        }

        self.levels.push(PostfixLevel::Invocation(arguments));
        let props = ast.props.get_mut(self.props);
        props.ty = return_type;
        props.constant = Constant::Dynamic;
        Ok(())
    }

    /// `parent.name`: the parent must be a plain structure with a member of
    /// that name; the result is the member's declared type.
    pub fn add_property(&mut self, ast: &mut Ast, name: String) -> Result<()> {
        let member_ty = lookup_member(ast, ty(ast, self.props), &name, false)?;
        self.levels.push(PostfixLevel::Property(name));
        let props = ast.props.get_mut(self.props);
        props.ty = member_ty;
        props.constant = Constant::Dynamic;
        Ok(())
    }

    /// `parent->name`: like `.`, but through exactly one pointer level.
    pub fn add_pointer_property(&mut self, ast: &mut Ast, name: String) -> Result<()> {
        let member_ty = lookup_member(ast, ty(ast, self.props), &name, true)?;
        self.levels.push(PostfixLevel::PointerProperty(name));
        let props = ast.props.get_mut(self.props);
        props.ty = member_ty;
        props.constant = Constant::Dynamic;
        Ok(())
    }

    pub fn end(&mut self, ast: &mut Ast, kind: PostfixKind) -> Result<()> {
        if kind != PostfixKind::Plain {
            if !ty(ast, self.props).is_pp_number() {
                let verb = if kind == PostfixKind::Increment {
                    "increment"
                } else {
                    "decrement"
                };
                return Err(CompileError::syntax(format!(
                    "cannot {} a non-number of type \"{}\"",
                    verb,
                    ty(ast, self.props).display_name(ast)
                )));
            }
            ast.props.get_mut(self.props).constant = Constant::Dynamic;
        }
        self.kind = kind;
        Ok(())
    }
}

fn lookup_member(ast: &Ast, parent: &Type, name: &str, through_pointer: bool) -> Result<Type> {
    let op = if through_pointer { "->" } else { "." };
    let shape_ok = if through_pointer {
        parent.is_single_pointer()
    } else {
        parent.is_plain()
    };
    let structure = match parent.kind {
        TypeKind::Structure(id) if shape_ok => id,
        _ => {
            return Err(CompileError::syntax(format!(
                "expected a {} for {} operation, got type \"{}\"",
                if through_pointer { "structure pointer" } else { "plain structure" },
                op,
                parent.display_name(ast)
            )))
        }
    };

    let decl = ast.structure(structure)?;
    match decl.members.iter().find(|m| m.name == name) {
        Some(member) => Ok(member.ty.clone()),
        None => Err(CompileError::syntax(format!(
            "structure \"{}\" has no member \"{}\"",
            decl.name.as_deref().unwrap_or("<anonymous structure>"),
            name
        ))),
    }
}

impl Unary {
    pub fn from_postfix(value: Postfix) -> Unary {
        let props = value.props;
        Unary {
            value,
            ops: Vec::new(),
            kind: UnaryKind::Plain,
            props,
        }
    }

    /// Applies one prefix operator. Operators arrive innermost first; the
    /// list keeps that application order.
    pub fn add_op(&mut self, ast: &mut Ast, op: UnaryOp) -> Result<()> {
        match op {
            UnaryOp::Reference => {
                let props = ast.props.get_mut(self.props);
                props.ty.wrap_pointer();
                props.constant = Constant::Dynamic;
            }
            UnaryOp::Dereference => {
                if !ty(ast, self.props).is_pointer() {
                    return Err(CompileError::syntax(format!(
                        "cannot dereference a non-pointer of type \"{}\"",
                        ty(ast, self.props).display_name(ast)
                    )));
                }
                let props = ast.props.get_mut(self.props);
                props.ty.pop_level();
                props.constant = Constant::Dynamic;
            }
            UnaryOp::BitwiseNot => {
                if !ty(ast, self.props).is_pp_number() {
                    return Err(CompileError::syntax(format!(
                        "cannot apply binary not to a non-number of type \"{}\"",
                        ty(ast, self.props).display_name(ast)
                    )));
                }
                let props = ast.props.get_mut(self.props);
                props.constant = bitwise_not(&props.constant);
            }
            UnaryOp::LogicNot => {
                if !ty(ast, self.props).is_pp_boolean() {
                    return Err(CompileError::syntax(format!(
                        "cannot apply logic not to a non-boolean of type \"{}\"",
                        ty(ast, self.props).display_name(ast)
                    )));
                }
                let props = ast.props.get_mut(self.props);
                props.constant = match props.constant {
                    Constant::Boolean(v) => Constant::Boolean(!v),
                    _ => Constant::Dynamic,
                };
            }
        }
        self.ops.push(op);
        Ok(())
    }

    pub fn set_kind(&mut self, ast: &mut Ast, kind: UnaryKind) -> Result<()> {
        if self.kind != UnaryKind::Plain {
            return Err(CompileError::internal(
                "unary terminal modifier applied twice",
            ));
        }
        match kind {
            UnaryKind::Plain | UnaryKind::Plus => {}
            UnaryKind::Minus => {
                if !ty(ast, self.props).is_pp_number() {
                    return Err(CompileError::syntax(format!(
                        "cannot negate a non-number of type \"{}\"",
                        ty(ast, self.props).display_name(ast)
                    )));
                }
                let props = ast.props.get_mut(self.props);
                props.constant = negate(&props.constant)?;
            }
            UnaryKind::Increment | UnaryKind::Decrement => {
                let verb = if kind == UnaryKind::Increment {
                    "increment"
                } else {
                    "decrement"
                };
                if !ty(ast, self.props).is_pp_number() {
                    return Err(CompileError::syntax(format!(
                        "cannot {} a non-number of type \"{}\"",
                        verb,
                        ty(ast, self.props).display_name(ast)
                    )));
                }
                ast.props.get_mut(self.props).constant = Constant::Dynamic;
            }
        }
        self.kind = kind;
        Ok(())
    }
}

fn bitwise_not(value: &Constant) -> Constant {
    if !value.kind().is_integer() {
        return Constant::Dynamic;
    }
    let minus_one = Constant::Long(-1).convert(value.kind());
    match constant::eval_binary(BinaryOp::BitXor, value, &minus_one) {
        Ok(result) => result,
        Err(_) => Constant::Dynamic,
    }
}

fn negate(value: &Constant) -> Result<Constant> {
    if !value.kind().is_number() {
        return Ok(Constant::Dynamic);
    }
    let zero = Constant::Long(0).convert(value.kind());
    constant::eval_binary(BinaryOp::Subtract, &zero, value)
}

impl Cast {
    pub fn from_unary(value: Unary) -> Cast {
        let props = value.props;
        Cast {
            value,
            casts: Vec::new(),
            props,
        }
    }

    /// Applies one cast target. For a plain-primitive target with a known
    /// parent constant, the constant is reinterpreted with C cast
    /// semantics; otherwise it becomes dynamic.
    pub fn add_cast(&mut self, ast: &mut Ast, target: Type) -> Result<()> {
        if target.is_pp_void() {
            return Err(CompileError::syntax("cannot cast to a void type"));
        }

        let constant = match target.kind {
            TypeKind::Primitive(index) if target.is_pp() => {
                constant_of(ast, self.props).reinterpret_cast(index)
            }
            _ => Constant::Dynamic,
        };

        let props = ast.props.get_mut(self.props);
        props.ty = target.clone();
        props.constant = constant;
        self.casts.push(target);
        Ok(())
    }
}

impl Binary {
    pub fn from_cast(value: Cast) -> Binary {
        let props = value.props;
        Binary {
            node: BinaryNode::Leaf(value),
            props,
        }
    }

    /// Joins two operand chains with a binary operator, enforcing the
    /// operator's operand rules and computing the result type.
    ///
    /// The left chain's properties block carries the result; the right
    /// chain keeps its own block.
    pub fn combine(ast: &mut Ast, op: BinaryOp, left: Binary, right: Binary) -> Result<Binary> {
        use BinaryOp::*;

        let result = match op {
            Multiply | Divide => {
                check_number(ast, op, left.props)?;
                check_number(ast, op, right.props)?;
                BinaryResult::Merged(merge_or_error(ast, op, left.props, right.props)?)
            }
            Add | Subtract => {
                check_number(ast, op, left.props)?;
                check_number(ast, op, right.props)?;
                let merged = merge_or_error(ast, op, left.props, right.props)?;
                let folded = fold(ast, op, left.props, right.props)?;
                BinaryResult::MergedWith(merged, folded)
            }
            Modulo | ShiftLeft | ShiftRight | BitAnd | BitXor | BitOr => {
                check_integer(ast, op, left.props)?;
                check_integer(ast, op, right.props)?;
                BinaryResult::Merged(merge_or_error(ast, op, left.props, right.props)?)
            }
            Greater | GreaterEqual | Less | LessEqual => {
                check_number(ast, op, left.props)?;
                check_number(ast, op, right.props)?;
                BinaryResult::Boolean
            }
            Equal | NotEqual => {
                merge_or_error(ast, op, left.props, right.props)?;
                BinaryResult::Boolean
            }
            LogicAnd | LogicOr => {
                check_boolean(ast, op, left.props)?;
                check_boolean(ast, op, right.props)?;
                BinaryResult::Boolean
            }
        };

        let props = left.props;
        let block = ast.props.get_mut(props);
        match result {
            BinaryResult::Merged(ty) => {
                block.ty = ty;
                block.constant = Constant::Dynamic;
            }
            BinaryResult::MergedWith(ty, constant) => {
                block.ty = ty;
                block.constant = constant;
            }
            BinaryResult::Boolean => {
                block.ty = Type::boolean();
                block.constant = Constant::Dynamic;
            }
        }

        Ok(Binary {
            node: BinaryNode::Operation {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            props,
        })
    }
}

enum BinaryResult {
    Merged(Type),
    MergedWith(Type, Constant),
    Boolean,
}

fn check_number(ast: &Ast, op: BinaryOp, props: PropsId) -> Result<()> {
    if ty(ast, props).is_pp_number() {
        return Ok(());
    }
    Err(CompileError::syntax(format!(
        "expected a number in binary expression '{}', got {}",
        op.symbol(),
        ty(ast, props).display_name(ast)
    )))
}

fn check_integer(ast: &Ast, op: BinaryOp, props: PropsId) -> Result<()> {
    if ty(ast, props).is_pp_integer() {
        return Ok(());
    }
    Err(CompileError::syntax(format!(
        "expected an integer in binary expression '{}', got {}",
        op.symbol(),
        ty(ast, props).display_name(ast)
    )))
}

fn check_boolean(ast: &Ast, op: BinaryOp, props: PropsId) -> Result<()> {
    if ty(ast, props).is_pp_boolean() {
        return Ok(());
    }
    Err(CompileError::syntax(format!(
        "expected a boolean in binary expression '{}', got {}",
        op.symbol(),
        ty(ast, props).display_name(ast)
    )))
}

fn merge_or_error(ast: &Ast, op: BinaryOp, left: PropsId, right: PropsId) -> Result<Type> {
    Type::merge_extend(ty(ast, left), ty(ast, right)).ok_or_else(|| {
        CompileError::syntax(format!(
            "incompatible types for binary operation '{}': \"{}\" and \"{}\" \
             require an explicit cast because of integer truncation",
            op.symbol(),
            ty(ast, left).display_name(ast),
            ty(ast, right).display_name(ast)
        ))
    })
}

fn fold(ast: &Ast, op: BinaryOp, left: PropsId, right: PropsId) -> Result<Constant> {
    constant::eval_binary(op, constant_of(ast, left), constant_of(ast, right))
}

impl Condition {
    pub fn from_binary(value: Binary) -> Condition {
        let props = value.props;
        Condition {
            node: ConditionNode::Plain(value),
            props,
        }
    }

    /// `condition ? then : otherwise`: the condition must be boolean and
    /// the branch types mergeable; the merged type is the result.
    pub fn ternary(
        ast: &mut Ast,
        condition: Binary,
        then: Expression,
        otherwise: Condition,
    ) -> Result<Condition> {
        if !ty(ast, condition.props).is_pp_boolean() {
            return Err(CompileError::syntax(format!(
                "conditional expression has non-boolean condition of type \"{}\"",
                ty(ast, condition.props).display_name(ast)
            )));
        }

        let merged = Type::merge_extend(ty(ast, then.props), ty(ast, otherwise.props))
            .ok_or_else(|| {
                CompileError::syntax(format!(
                    "conditional expression values are not equal: first value has type \"{}\", \
                     but second has type \"{}\"",
                    ty(ast, then.props).display_name(ast),
                    ty(ast, otherwise.props).display_name(ast)
                ))
            })?;

        let props = otherwise.props;
        let block = ast.props.get_mut(props);
        block.ty = merged;
        block.constant = Constant::Dynamic;

        Ok(Condition {
            node: ConditionNode::Ternary {
                condition,
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            props,
        })
    }
}

impl Expression {
    pub fn plain(value: Condition) -> Expression {
        let props = value.props;
        Expression {
            node: ExpressionNode::Plain(value),
            props,
        }
    }

    /// `assignee <op>= value`: the value must merge into the assignee, and
    /// a compound operator additionally requires a numeric assignee. The
    /// expression carries the assignee's type.
    pub fn assignment(
        ast: &mut Ast,
        assignee: Unary,
        op: AssignOp,
        value: Expression,
    ) -> Result<Expression> {
        let assignee_ty = ty(ast, assignee.props).clone();
        if Type::merge_prioritized(&assignee_ty, ty(ast, value.props)).is_none() {
            return Err(CompileError::syntax(format!(
                "illegal assignment to type \"{}\" from type \"{}\"",
                assignee_ty.display_name(ast),
                ty(ast, value.props).display_name(ast)
            )));
        }
        if op != AssignOp::Plain && !assignee_ty.is_pp_number() {
            return Err(CompileError::syntax(format!(
                "assignment operator \"{}\" can only be applied to numbers, got type \"{}\"",
                op.symbol(),
                assignee_ty.display_name(ast)
            )));
        }

        let props = value.props;
        let block = ast.props.get_mut(props);
        block.ty = assignee_ty;
        block.constant = Constant::Dynamic;

        Ok(Expression {
            node: ExpressionNode::Assignment {
                assignee,
                op,
                value: Box::new(value),
            },
            props,
        })
    }
}

/// Validates a constructor expression against its target type.
pub fn check_constructor(ast: &Ast, ctor: &ExConstructor) -> Result<()> {
    if ctor.ty.is_plain() && !ctor.is_array {
        return check_constructor_plain(ast, ctor);
    }
    if ctor.ty.is_pointer() {
        return check_constructor_pointer(ast, ctor);
    }
    if ctor.is_array && ctor.ty.is_plain() {
        for argument in &ctor.arguments {
            if !ctor.ty.can_assign(ty(ast, argument.props)) {
                return Err(CompileError::syntax(format!(
                    "invalid element for \"{}\" array constructor: expected \"{}\", got \"{}\"",
                    ctor.ty.display_name(ast),
                    ctor.ty.display_name(ast),
                    ty(ast, argument.props).display_name(ast)
                )));
            }
        }
    }
    Ok(())
}

fn check_constructor_plain(ast: &Ast, ctor: &ExConstructor) -> Result<()> {
    match ctor.ty.kind {
        TypeKind::Enum(_) => Err(CompileError::syntax(format!(
            "cannot construct an enum \"{}\"",
            ctor.ty.display_name(ast)
        ))),
        TypeKind::Function(_) => Err(CompileError::syntax(format!(
            "cannot construct a function \"{}\"",
            ctor.ty.display_name(ast)
        ))),
        #[cfg(feature = "generics")]
        TypeKind::Generic(_) => Err(CompileError::syntax(format!(
            "cannot construct a generic type \"{}\"",
            ctor.ty.display_name(ast)
        ))),
        TypeKind::Alias(_) => Err(CompileError::internal(
            "alias types are resolved before construction",
        )),
        TypeKind::Primitive(_) => {
            if ctor.arguments.len() != 1 {
                return Err(CompileError::syntax(format!(
                    "invalid argument count for \"{}\" primitive type constructor: \
                     expected 1, got {}",
                    ctor.ty.display_name(ast),
                    ctor.arguments.len()
                )));
            }
            let argument = ty(ast, ctor.arguments[0].props);
            if !ctor.ty.can_assign(argument) {
                return Err(CompileError::syntax(format!(
                    "invalid argument for \"{}\" primitive type constructor: \
                     expected \"{}\", got \"{}\"",
                    ctor.ty.display_name(ast),
                    ctor.ty.display_name(ast),
                    argument.display_name(ast)
                )));
            }
            Ok(())
        }
        TypeKind::Structure(id) => {
            let structure = ast.structure(id)?;
            if structure.members.len() != ctor.arguments.len() {
                return Err(CompileError::syntax(format!(
                    "invalid argument count for \"{}\" structure type constructor: \
                     expected {}, got {}",
                    ctor.ty.display_name(ast),
                    structure.members.len(),
                    ctor.arguments.len()
                )));
            }
            for (member, argument) in structure.members.iter().zip(ctor.arguments.iter()) {
                if !member.ty.can_assign(ty(ast, argument.props)) {
                    return Err(CompileError::syntax(format!(
                        "invalid constructor argument \"{}\": expected type \"{}\", got \"{}\"",
                        member.name,
                        member.ty.display_name(ast),
                        ty(ast, argument.props).display_name(ast)
                    )));
                }
            }
            Ok(())
        }
    }
}

fn check_constructor_pointer(ast: &Ast, ctor: &ExConstructor) -> Result<()> {
    if ctor.arguments.len() != 1 {
        return Err(CompileError::syntax(format!(
            "invalid argument count for \"{}\" pointer type constructor: expected 1, got {}",
            ctor.ty.display_name(ast),
            ctor.arguments.len()
        )));
    }
    let mut pointee = ctor.ty.clone();
    pointee.pop_level();
    let argument = ty(ast, ctor.arguments[0].props);
    if !pointee.can_assign(argument) {
        return Err(CompileError::syntax(format!(
            "invalid argument for \"{}\" pointer type constructor: expected \"{}\", got \"{}\"",
            ctor.ty.display_name(ast),
            pointee.display_name(ast),
            argument.display_name(ast)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ast;

    fn int_literal(ast: &mut Ast, value: i64) -> Binary {
        let basic = Basic::number(ast, NumberLiteral::Integer { value, unsigned: false });
        Binary::from_cast(Cast::from_unary(Unary::from_postfix(Postfix::from_basic(basic))))
    }

    fn bool_literal(ast: &mut Ast, value: bool) -> Binary {
        let basic = Basic::boolean(ast, value);
        Binary::from_cast(Cast::from_unary(Unary::from_postfix(Postfix::from_basic(basic))))
    }

    fn float_literal(ast: &mut Ast, value: f64) -> Binary {
        let basic = Basic::number(ast, NumberLiteral::Floating(value));
        Binary::from_cast(Cast::from_unary(Unary::from_postfix(Postfix::from_basic(basic))))
    }

    #[test]
    fn integer_literals_take_the_smallest_signed_primitive() {
        let checks = [
            (1, primitive::BYTE),
            (300, primitive::SHORT),
            (70_000, primitive::INT),
            (3_000_000_000, primitive::LONG),
        ];
        for (value, expected) in checks {
            let (ty, _) = number_literal_props(&NumberLiteral::Integer { value, unsigned: false });
            assert!(
                matches!(ty.kind, TypeKind::Primitive(i) if i == expected),
                "literal {} should type as primitive {}",
                value,
                expected
            );
        }
    }

    #[test]
    fn unsigned_literals_take_the_smallest_unsigned_primitive() {
        let (ty, constant) = number_literal_props(&NumberLiteral::Integer { value: 1, unsigned: true });
        assert!(matches!(ty.kind, TypeKind::Primitive(i) if i == primitive::UBYTE));
        assert_eq!(constant, Constant::UByte(1));
    }

    #[test]
    fn small_float_literals_type_as_float() {
        let (ty, constant) = number_literal_props(&NumberLiteral::Floating(2.0));
        assert!(matches!(ty.kind, TypeKind::Primitive(i) if i == primitive::FLOAT));
        assert_eq!(constant, Constant::Float(2.0));
    }

    #[test]
    fn addition_folds_constants() {
        let mut ast = Ast::new();
        let left = int_literal(&mut ast, 1);
        let right = int_literal(&mut ast, 2);
        let sum = Binary::combine(&mut ast, BinaryOp::Add, left, right).unwrap();
        assert_eq!(*constant_of(&ast, sum.props), Constant::Byte(3));
        assert!(ty(&ast, sum.props).is_equal(&Type::primitive(primitive::BYTE)));
    }

    #[test]
    fn integer_plus_float_folds_to_float() {
        let mut ast = Ast::new();
        let left = int_literal(&mut ast, 1);
        let right = float_literal(&mut ast, 2.0);
        let sum = Binary::combine(&mut ast, BinaryOp::Add, left, right).unwrap();
        assert_eq!(*constant_of(&ast, sum.props), Constant::Float(3.0));
        assert!(ty(&ast, sum.props).is_equal(&Type::primitive(primitive::FLOAT)));
    }

    #[test]
    fn boolean_plus_number_is_a_syntax_error() {
        let mut ast = Ast::new();
        let left = bool_literal(&mut ast, true);
        let right = int_literal(&mut ast, 1);
        let err = Binary::combine(&mut ast, BinaryOp::Add, left, right).unwrap_err();
        assert!(err.message.contains("expected a number"));
        assert!(err.message.contains("bool"));
    }

    #[test]
    fn logic_and_requires_booleans() {
        let mut ast = Ast::new();
        let left = int_literal(&mut ast, 1);
        let right = int_literal(&mut ast, 2);
        let err = Binary::combine(&mut ast, BinaryOp::LogicAnd, left, right).unwrap_err();
        assert!(err.message.contains("expected a boolean"));
    }

    #[test]
    fn dereferencing_a_number_is_a_syntax_error() {
        let mut ast = Ast::new();
        let basic = Basic::number(&mut ast, NumberLiteral::Integer { value: 5, unsigned: false });
        let mut unary = Unary::from_postfix(Postfix::from_basic(basic));
        let err = unary.add_op(&mut ast, UnaryOp::Dereference).unwrap_err();
        assert!(err.message.contains("cannot dereference"));
    }

    #[test]
    fn cast_reinterprets_known_constants() {
        let mut ast = Ast::new();
        let basic = Basic::number(&mut ast, NumberLiteral::Integer { value: 3, unsigned: false });
        let mut cast = Cast::from_unary(Unary::from_postfix(Postfix::from_basic(basic)));
        cast.add_cast(&mut ast, Type::primitive(primitive::FLOAT)).unwrap();
        assert_eq!(*constant_of(&ast, cast.props), Constant::Float(3.0));
    }

    #[test]
    fn cast_wraps_overflowing_constants() {
        let mut ast = Ast::new();
        let basic = Basic::number(&mut ast, NumberLiteral::Integer { value: 300, unsigned: false });
        let mut cast = Cast::from_unary(Unary::from_postfix(Postfix::from_basic(basic)));
        cast.add_cast(&mut ast, Type::primitive(primitive::BYTE)).unwrap();
        assert_eq!(*constant_of(&ast, cast.props), Constant::Byte(44));
    }

    #[test]
    fn cast_to_void_is_rejected() {
        let mut ast = Ast::new();
        let basic = Basic::number(&mut ast, NumberLiteral::Integer { value: 1, unsigned: false });
        let mut cast = Cast::from_unary(Unary::from_postfix(Postfix::from_basic(basic)));
        let err = cast.add_cast(&mut ast, Type::primitive(primitive::VOID)).unwrap_err();
        assert!(err.message.contains("void"));
    }

    #[test]
    fn unsigned_then_widened_addition() {
        let mut ast = Ast::new();
        let left = {
            let basic = Basic::number(&mut ast, NumberLiteral::Integer { value: 1, unsigned: true });
            Binary::from_cast(Cast::from_unary(Unary::from_postfix(Postfix::from_basic(basic))))
        };
        let right = int_literal(&mut ast, 1);
        let sum = Binary::combine(&mut ast, BinaryOp::Add, left, right).unwrap();
        assert_eq!(*constant_of(&ast, sum.props), Constant::Short(2));
        assert!(ty(&ast, sum.props).is_equal(&Type::primitive(primitive::SHORT)));
    }

    #[test]
    fn ternary_requires_boolean_condition() {
        let mut ast = Ast::new();
        let cond = int_literal(&mut ast, 1);
        let then = Expression::plain(Condition::from_binary(int_literal(&mut ast, 2)));
        let otherwise = Condition::from_binary(int_literal(&mut ast, 3));
        let err = Condition::ternary(&mut ast, cond, then, otherwise).unwrap_err();
        assert!(err.message.contains("non-boolean condition"));
    }

    #[test]
    fn ternary_merges_branch_types() {
        let mut ast = Ast::new();
        let cond = bool_literal(&mut ast, true);
        let then = Expression::plain(Condition::from_binary(int_literal(&mut ast, 70_000)));
        let otherwise = Condition::from_binary(int_literal(&mut ast, 1));
        let merged = Condition::ternary(&mut ast, cond, then, otherwise).unwrap();
        assert!(ty(&ast, merged.props).is_equal(&Type::primitive(primitive::INT)));
    }

    #[test]
    fn compound_assignment_requires_a_numeric_assignee() {
        let mut ast = Ast::new();
        let assignee = {
            let basic = Basic::variable(&mut ast, "flag".to_string(), &Type::boolean());
            Unary::from_postfix(Postfix::from_basic(basic))
        };
        let value = {
            let b = bool_literal(&mut ast, true);
            Expression::plain(Condition::from_binary(b))
        };
        let err = Expression::assignment(&mut ast, assignee, AssignOp::Add, value).unwrap_err();
        assert!(err.message.contains("can only be applied to numbers"));
    }
}
