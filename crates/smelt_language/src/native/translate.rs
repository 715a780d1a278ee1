//! Translation of parsed C declarations into SRC declarations.
//!
//! - A specifier list reduces to exactly one SRC type; `signed`/`unsigned`
//!   flips an integer primitive, multi-word forms like `long int` and
//!   `long long` collapse to the nearest SRC primitive, and `long double`
//!   loses precision with a warning.
//! - `struct X` and `enum X` become SRC declarations named `struct_X` /
//!   `enum_X`, keeping the two namespaces from colliding.
//! - Function declarators become extern SRC functions; a `typedef` of a
//!   function declarator becomes an alias to a plain pointer, because
//!   function types are not representable yet.
//! - C's `char *` is retyped as `char[]`, the SRC convention for C strings.
//!
//! Declarations whose names already exist in the symbol table are ignored:
//! an earlier import has provided them.

use crate::ast::{
    DcAlias, DcEnum, DcFunction, DcStructure, DeclBody, DeclId, Declaration, EnumMember,
    FunctionParameter, FunctionSignature, IndexTarget, StructureMember,
};
use crate::context::Context;
use crate::native::{CDeclSpecs, CDeclarator, CKeyword, CTypeSpec};
use crate::primitive;
use crate::types::{Type, TypeKind, TypeLevel};
use smelt_base::{warn, CompileError, Result};

pub fn native_struct_name(name: &str) -> String {
    format!("struct_{}", name)
}

pub fn native_enum_name(name: &str) -> String {
    format!("enum_{}", name)
}

pub fn primitive_keyword_type(keyword: CKeyword) -> Type {
    let index = match keyword {
        CKeyword::Void => primitive::VOID,
        CKeyword::Char => primitive::CHAR,
        CKeyword::Short => primitive::SHORT,
        CKeyword::Int => primitive::INT,
        CKeyword::Long => primitive::LONG,
        CKeyword::Float => primitive::FLOAT,
        CKeyword::Double => primitive::DOUBLE,
        CKeyword::Bool => primitive::BOOL,
        _ => primitive::VOID,
    };
    Type::primitive(index)
}

/// An identifier usable as a C type specifier, if the symbol table knows it
/// as one.
pub fn lookup_type_name(ctx: &Context, name: &str) -> Option<Type> {
    let entry = ctx.ast.lookup(name)?;
    match entry.target {
        IndexTarget::Primitive(index) => Some(Type::primitive(index)),
        IndexTarget::Decl(id) => match &ctx.ast.decl(id).body {
            DeclBody::Structure(_) | DeclBody::Enum(_) | DeclBody::Alias(_) => {
                ctx.ast.decl_as_type(id).ok()
            }
            _ => None,
        },
        IndexTarget::EnumMember(..) => None,
    }
}

/// Reduces a declaration specifier list to exactly one SRC type.
pub fn reduce_type_specs(specs: &[CTypeSpec]) -> Result<Type> {
    let mut is_unsigned = false;
    let mut saw_signedness = false;
    let mut base: Option<Type> = None;

    for spec in specs.iter().rev() {
        match spec {
            CTypeSpec::Signed => {
                if is_unsigned {
                    warn("signedness redefined for a type, possible error");
                }
                is_unsigned = false;
                saw_signedness = true;
            }
            CTypeSpec::Unsigned => {
                if is_unsigned {
                    warn("double unsigned type, possible error");
                }
                is_unsigned = true;
                saw_signedness = true;
            }
            CTypeSpec::Complex | CTypeSpec::Imaginary | CTypeSpec::Atomic => {
                warn("ignoring unsupported C type specifier");
            }
            CTypeSpec::Ty(ty) => {
                base = Some(match base {
                    None => ty.clone(),
                    Some(existing) => combine_base(existing, ty)?,
                });
            }
        }
    }

    let mut ty = match base {
        Some(ty) => ty,
        // Bare `unsigned x;` defaults the base to int, like C does.
        None if saw_signedness => Type::primitive(primitive::INT),
        None => {
            return Err(CompileError::syntax(
                "no type found in a C specifier sequence",
            ))
        }
    };

    if is_unsigned {
        match ty.kind {
            TypeKind::Primitive(index) if ty.is_plain() && primitive::is_signed(index) => {
                ty = Type::primitive(primitive::signed_to_unsigned(index));
            }
            _ => {
                return Err(CompileError::syntax(
                    "only primitive integer types can be unsigned",
                ))
            }
        }
    }

    if let TypeKind::Primitive(index) = ty.kind {
        if !primitive::PRIMITIVES[index].allowed_in_native {
            return Err(CompileError::internal(format!(
                "primitive \"{}\" escaped into a native declaration",
                primitive::PRIMITIVES[index].name
            )));
        }
    }

    Ok(ty)
}

/// Collapses multi-word C forms (`long int`, `long long`, `short int`,
/// `long double`) into one SRC primitive.
fn combine_base(a: Type, b: &Type) -> Result<Type> {
    let (ia, ib) = match (&a.kind, &b.kind) {
        (TypeKind::Primitive(ia), TypeKind::Primitive(ib)) if a.is_plain() && b.is_plain() => {
            (*ia, *ib)
        }
        _ => {
            return Err(CompileError::syntax(
                "this type is not allowed in a C specifier sequence",
            ))
        }
    };

    let (low, high) = if ia <= ib { (ia, ib) } else { (ib, ia) };
    match (low, high) {
        (primitive::INT, primitive::LONG) | (primitive::LONG, primitive::LONG) => {
            Ok(Type::primitive(primitive::LONG))
        }
        (primitive::SHORT, primitive::INT) => Ok(Type::primitive(primitive::SHORT)),
        (primitive::LONG, primitive::DOUBLE) => {
            warn("long doubles are not supported yet, resolving as double");
            Ok(Type::primitive(primitive::DOUBLE))
        }
        _ => Err(CompileError::syntax(
            "this type is not allowed in a C specifier sequence",
        )),
    }
}

/// `char*` becomes `char[]`; C strings arrive as arrays on the SRC side.
fn apply_char_pointer_patch(ty: &mut Type) {
    if ty.is_single_pointer() {
        if let TypeKind::Primitive(index) = ty.kind {
            if index == primitive::CHAR {
                ty.levels[0] = TypeLevel::array();
            }
        }
    }
}

fn declare_ignoring_duplicates(ctx: &mut Context, decl: Declaration) -> Result<Option<DeclId>> {
    if let Some(name) = &decl.name {
        if ctx.ast.lookup(name).is_some() {
            return Ok(None);
        }
    }
    match ctx.ast.add_declaration(decl)? {
        Some(id) => {
            ctx.ast.add_identifier(id)?;
            Ok(Some(id))
        }
        None => Ok(None),
    }
}

/// Registers a struct (or union, degraded with a warning upstream) and
/// returns its SRC type.
pub fn declare_struct(
    ctx: &mut Context,
    tag: Option<String>,
    members: Option<Vec<StructureMember>>,
    filename: &str,
) -> Result<Type> {
    match tag {
        Some(tag) => {
            let name = native_struct_name(&tag);
            if let Some(target) = ctx.ast.lookup(&name).map(|entry| entry.target) {
                if let IndexTarget::Decl(id) = target {
                    if let Some(members) = members {
                        if !ctx.ast.decl(id).is_full {
                            let decl = Declaration::native(
                                DeclBody::Structure(DcStructure {
                                    name: Some(name),
                                    members,
                                }),
                                true,
                                filename,
                            );
                            ctx.ast.add_declaration(decl)?;
                        }
                    }
                    return Ok(Type::new(TypeKind::Structure(id)));
                }
                return Err(CompileError::syntax(format!(
                    "identifier \"{}\" already exists",
                    name
                )));
            }

            let is_full = members.is_some();
            let decl = Declaration::native(
                DeclBody::Structure(DcStructure {
                    name: Some(name.clone()),
                    members: members.unwrap_or_default(),
                }),
                is_full,
                filename,
            );
            let id = ctx
                .ast
                .add_declaration(decl)?
                .ok_or_else(|| CompileError::internal("fresh structure merged unexpectedly"))?;
            ctx.ast.add_identifier(id)?;
            Ok(Type::new(TypeKind::Structure(id)))
        }
        None => {
            let decl = Declaration::native(
                DeclBody::Structure(DcStructure {
                    name: None,
                    members: members.unwrap_or_default(),
                }),
                true,
                filename,
            );
            let id = ctx
                .ast
                .add_declaration(decl)?
                .ok_or_else(|| CompileError::internal("anonymous structure merged unexpectedly"))?;
            Ok(Type::new(TypeKind::Structure(id)))
        }
    }
}

/// Registers an enum and its member names, returning its SRC type.
pub fn declare_enum(
    ctx: &mut Context,
    tag: Option<String>,
    members: Option<Vec<EnumMember>>,
    filename: &str,
) -> Result<Type> {
    let name = tag.map(|tag| native_enum_name(&tag));

    if let Some(name) = &name {
        if let Some(entry) = ctx.ast.lookup(name) {
            if let IndexTarget::Decl(id) = entry.target {
                return Ok(Type::new(TypeKind::Enum(id)));
            }
            return Err(CompileError::syntax(format!(
                "identifier \"{}\" already exists",
                name
            )));
        }
    }

    let members = members.unwrap_or_default();
    let is_full = !members.is_empty();
    let decl = Declaration::native(
        DeclBody::Enum(DcEnum {
            name: name.clone(),
            members: members.clone(),
        }),
        is_full,
        filename,
    );
    let id = ctx
        .ast
        .add_declaration(decl)?
        .ok_or_else(|| CompileError::internal("fresh enum merged unexpectedly"))?;
    if name.is_some() {
        ctx.ast.add_identifier(id)?;
    }
    for (index, member) in members.iter().enumerate() {
        if ctx.ast.lookup(&member.name).is_none() {
            ctx.ast.add_enum_member(&member.name, id, index)?;
        }
    }
    Ok(Type::new(TypeKind::Enum(id)))
}

fn declarator_type(specs: &CDeclSpecs, declarator: &CDeclarator) -> Result<Type> {
    let mut ty = reduce_type_specs(&specs.type_specs)?;
    ty.levels.extend(declarator.levels.iter().copied());
    apply_char_pointer_patch(&mut ty);
    Ok(ty)
}

/// The stand-in for anything function-typed: a plain pointer.
fn opaque_pointer() -> Type {
    let mut ty = Type::primitive(primitive::VOID);
    ty.wrap_pointer();
    ty
}

/// Turns one top-level declarator into an SRC declaration.
pub fn declare_from_declarator(
    ctx: &mut Context,
    specs: &CDeclSpecs,
    declarator: CDeclarator,
    filename: &str,
) -> Result<()> {
    let target = declarator_type(specs, &declarator)?;

    let name = match declarator.name.clone() {
        Some(name) => name,
        None => {
            // Abstract declarator: a nameless alias carries the computed
            // type but never enters the symbol table.
            let decl = Declaration::native(
                DeclBody::Alias(DcAlias {
                    name: None,
                    target,
                }),
                true,
                filename,
            );
            ctx.ast.add_declaration(decl)?;
            return Ok(());
        }
    };

    let decl = if declarator.is_function_pointer {
        warn("function types are not supported yet!");
        Declaration::native(
            DeclBody::Alias(DcAlias {
                name: Some(name),
                target: opaque_pointer(),
            }),
            true,
            filename,
        )
    } else if declarator.is_function {
        if specs.is_typedef {
            warn("function types are not supported yet!");
            Declaration::native(
                DeclBody::Alias(DcAlias {
                    name: Some(name),
                    target: opaque_pointer(),
                }),
                true,
                filename,
            )
        } else {
            Declaration::native(
                DeclBody::Function(DcFunction {
                    name,
                    signature: Some(FunctionSignature {
                        parameters: declarator.parameters,
                        is_c_vararg: declarator.is_c_vararg,
                        return_type: target,
                    }),
                    body: None,
                    is_extern: true,
                }),
                true,
                filename,
            )
        }
    } else {
        Declaration::native(
            DeclBody::Alias(DcAlias {
                name: Some(name),
                target,
            }),
            true,
            filename,
        )
    };

    declare_ignoring_duplicates(ctx, decl)?;
    Ok(())
}

/// Turns a member declarator into a structure member. Unnamed members
/// (anonymous padding and such) are dropped.
pub fn member_from_declarator(
    _ctx: &mut Context,
    specs: &CDeclSpecs,
    declarator: CDeclarator,
) -> Result<Option<StructureMember>> {
    let name = match declarator.name.clone() {
        Some(name) => name,
        None => return Ok(None),
    };
    let ty = if declarator.is_function || declarator.is_function_pointer {
        opaque_pointer()
    } else {
        declarator_type(specs, &declarator)?
    };
    Ok(Some(StructureMember { name, ty }))
}

/// Turns a parameter declarator into a function parameter. A lone `void`
/// means an empty parameter list.
pub fn parameter_from_declarator(
    _ctx: &mut Context,
    specs: &CDeclSpecs,
    declarator: CDeclarator,
    index: usize,
) -> Result<Option<FunctionParameter>> {
    let ty = if declarator.is_function || declarator.is_function_pointer {
        opaque_pointer()
    } else {
        declarator_type(specs, &declarator)?
    };

    if ty.is_pp_void() && declarator.name.is_none() {
        return Ok(None);
    }

    let name = declarator
        .name
        .unwrap_or_else(|| format!("arg{}", index));
    Ok(Some(FunctionParameter { name, ty }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prim(keyword: CKeyword) -> CTypeSpec {
        CTypeSpec::Ty(primitive_keyword_type(keyword))
    }

    fn reduced(specs: &[CTypeSpec]) -> Type {
        reduce_type_specs(specs).unwrap()
    }

    fn assert_primitive(ty: &Type, index: primitive::PrimitiveIndex) {
        assert!(
            matches!(ty.kind, TypeKind::Primitive(i) if i == index) && ty.is_plain(),
            "expected primitive {}, got {:?}",
            primitive::PRIMITIVES[index].name,
            ty
        );
    }

    #[test]
    fn unsigned_int_flips_signedness() {
        let ty = reduced(&[CTypeSpec::Unsigned, prim(CKeyword::Int)]);
        assert_primitive(&ty, primitive::UINT);
    }

    #[test]
    fn long_long_collapses_to_long() {
        let ty = reduced(&[prim(CKeyword::Long), prim(CKeyword::Long)]);
        assert_primitive(&ty, primitive::LONG);

        let ty = reduced(&[prim(CKeyword::Long), prim(CKeyword::Long), prim(CKeyword::Int)]);
        assert_primitive(&ty, primitive::LONG);
    }

    #[test]
    fn long_int_collapses_to_long() {
        let ty = reduced(&[prim(CKeyword::Long), prim(CKeyword::Int)]);
        assert_primitive(&ty, primitive::LONG);
    }

    #[test]
    fn short_int_collapses_to_short() {
        let ty = reduced(&[prim(CKeyword::Short), prim(CKeyword::Int)]);
        assert_primitive(&ty, primitive::SHORT);
    }

    #[test]
    fn long_double_degrades_with_precision_loss() {
        let ty = reduced(&[prim(CKeyword::Long), prim(CKeyword::Double)]);
        assert_primitive(&ty, primitive::DOUBLE);
    }

    #[test]
    fn bare_unsigned_defaults_to_int() {
        let ty = reduced(&[CTypeSpec::Unsigned]);
        assert_primitive(&ty, primitive::UINT);
    }

    #[test]
    fn unsigned_bool_is_rejected() {
        let err = reduce_type_specs(&[CTypeSpec::Unsigned, prim(CKeyword::Bool)]).unwrap_err();
        assert!(err.message.contains("unsigned"));
    }

    #[test]
    fn char_pointer_becomes_char_array() {
        let mut ty = Type::primitive(primitive::CHAR);
        ty.wrap_pointer();
        apply_char_pointer_patch(&mut ty);
        assert!(ty.is_array());

        // A double pointer stays a pointer.
        let mut ty = Type::primitive(primitive::CHAR);
        ty.wrap_pointer();
        ty.wrap_pointer();
        apply_char_pointer_patch(&mut ty);
        assert!(ty.is_pointer());
    }

    #[test]
    fn native_names_are_prefixed() {
        assert_eq!(native_struct_name("stat"), "struct_stat");
        assert_eq!(native_enum_name("order"), "enum_order");
    }
}
