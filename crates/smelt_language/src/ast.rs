//! The abstract syntax tree root and symbol table.
//!
//! The AST keeps declarations twice: an ordered list that preserves source
//! order (the emitter walks it), and a name index for lookup. Every named
//! declaration is reachable both ways. The index rejects duplicate names
//! unless the existing entry can be *merged* — a forward declaration being
//! promoted to a full one with structural identity.
//!
//! Each declaration records which token class its identifier produces, once
//! for SRC lookups (`token`) and once for C-native lookups (`ctoken`), so
//! both lexers can tier identifiers by category at classification time.

use crate::expr::{ExConstructor, ExpressionBlock, ExprProps};
use crate::primitive::{self, PrimitiveIndex};
use crate::stmt::Statement;
use crate::types::{Type, TypeKind};
use hashbrown::HashMap;
use smelt_base::{Arena, CompileError, Result};

/// Identifier of a declaration in the AST's ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The token class an identifier resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentClass {
    PrimitiveName,
    StructureName,
    EnumName,
    EnumMemberName,
    AliasName,
    FunctionName,
    VariableName,
    ParameterName,
    /// Not bound to anything; a plain identifier.
    Identifier,
}

/// What a symbol-table entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTarget {
    Primitive(PrimitiveIndex),
    Decl(DeclId),
    EnumMember(DeclId, usize),
}

/// One symbol-table entry.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    pub class: IdentClass,
    pub target: IndexTarget,
}

/// `import a.b.c;` or `import native a.b.c;`.
#[derive(Debug, Clone)]
pub struct DcImport {
    pub path: Vec<String>,
    pub is_native: bool,
}

#[derive(Debug, Clone)]
pub struct StructureMember {
    pub name: String,
    pub ty: Type,
}

/// A structure: a named list of typed members.
#[derive(Debug, Clone)]
pub struct DcStructure {
    pub name: Option<String>,
    pub members: Vec<StructureMember>,
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

/// An enumeration: a named list of members with integer values.
#[derive(Debug, Clone)]
pub struct DcEnum {
    pub name: Option<String>,
    pub members: Vec<EnumMember>,
}

/// A named alias for another type. The target is stored by deep copy.
///
/// Nameless aliases exist only as carriers for type computation in the
/// C-native translator; they never enter the symbol table.
#[derive(Debug, Clone)]
pub struct DcAlias {
    pub name: Option<String>,
    pub target: Type,
}

#[derive(Debug, Clone)]
pub struct FunctionParameter {
    pub name: String,
    pub ty: Type,
}

/// A function signature, filled in on the second pass.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub parameters: Vec<FunctionParameter>,
    /// A C-style `...` tail; invocation then accepts extra arguments.
    pub is_c_vararg: bool,
    pub return_type: Type,
}

impl FunctionSignature {
    fn is_equal(&self, other: &FunctionSignature) -> bool {
        self.parameters.len() == other.parameters.len()
            && self.is_c_vararg == other.is_c_vararg
            && self.return_type.is_equal(&other.return_type)
            && self
                .parameters
                .iter()
                .zip(other.parameters.iter())
                .all(|(a, b)| a.ty.is_equal(&b.ty))
    }
}

#[derive(Debug)]
pub struct DcFunction {
    pub name: String,
    pub signature: Option<FunctionSignature>,
    pub body: Option<Statement>,
    /// Defined elsewhere (a C header); emitted as a forward only.
    pub is_extern: bool,
}

#[derive(Debug)]
pub struct DcVariable {
    pub name: String,
    pub ty: Type,
    pub value: Option<ExpressionBlock>,
    /// Defined elsewhere; emitted as an `extern` forward only.
    pub is_extern: bool,
}

/// The typed payload of a declaration.
#[derive(Debug)]
pub enum DeclBody {
    Import(DcImport),
    Alias(DcAlias),
    Structure(DcStructure),
    Enum(DcEnum),
    Function(DcFunction),
    Variable(DcVariable),
}

/// A tagged declaration record.
#[derive(Debug)]
pub struct Declaration {
    /// Imports and abstract native aliases carry no name.
    pub name: Option<String>,
    pub body: DeclBody,
    /// Fully defined, as opposed to forward-declared.
    pub is_full: bool,
    /// Came from a C header.
    pub is_native: bool,
    /// For native declarations, the header they belong to.
    pub native_filename: Option<String>,
    /// Token class the SRC lexer should produce for this name.
    pub token: IdentClass,
    /// Token class the C-native lexer should produce for this name.
    pub ctoken: IdentClass,
}

impl Declaration {
    /// Builds a declaration record, deriving name and token classes from
    /// the payload kind.
    pub fn new(body: DeclBody, is_full: bool) -> Self {
        let (name, class) = match &body {
            DeclBody::Import(_) => (None, IdentClass::Identifier),
            DeclBody::Alias(a) => (a.name.clone(), IdentClass::AliasName),
            DeclBody::Structure(s) => (s.name.clone(), IdentClass::StructureName),
            DeclBody::Enum(e) => (e.name.clone(), IdentClass::EnumName),
            DeclBody::Function(f) => (Some(f.name.clone()), IdentClass::FunctionName),
            DeclBody::Variable(v) => (Some(v.name.clone()), IdentClass::VariableName),
        };
        Self {
            name,
            body,
            is_full,
            is_native: false,
            native_filename: None,
            token: class,
            ctoken: class,
        }
    }

    pub fn native(body: DeclBody, is_full: bool, filename: &str) -> Self {
        let mut decl = Self::new(body, is_full);
        decl.is_native = true;
        decl.native_filename = Some(filename.to_string());
        decl
    }

}

fn body_kind_name(body: &DeclBody) -> &'static str {
    match body {
        DeclBody::Import(_) => "import",
        DeclBody::Alias(_) => "alias",
        DeclBody::Structure(_) => "structure",
        DeclBody::Enum(_) => "enum",
        DeclBody::Function(_) => "function",
        DeclBody::Variable(_) => "variable",
    }
}

/// The AST root.
#[derive(Debug)]
pub struct Ast {
    decls: Vec<Declaration>,
    index: HashMap<String, IndexEntry>,
    /// Shared expression property blocks; one per expression chain.
    pub props: Arena<ExprProps>,
    /// Constructor expressions, referenced from basic expressions and from
    /// the expression blocks that hoist them.
    pub constructors: Arena<ExConstructor>,
}

impl Ast {
    /// Creates an AST seeded with the primitive type identifiers.
    pub fn new() -> Self {
        let mut index = HashMap::new();
        for i in 0..primitive::ANY {
            index.insert(
                primitive::PRIMITIVES[i].name.to_string(),
                IndexEntry {
                    class: IdentClass::PrimitiveName,
                    target: IndexTarget::Primitive(i),
                },
            );
        }
        Self {
            decls: Vec::new(),
            index,
            props: Arena::new(),
            constructors: Arena::new(),
        }
    }

    pub fn decl(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.decls[id.index()]
    }

    /// Declarations in source (= emission) order.
    pub fn decls(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclId(i as u32), d))
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<&IndexEntry> {
        self.index.get(name)
    }

    /// Appends a declaration unless it merges into an existing forward
    /// declaration of the same name; returns `None` when merged.
    pub fn add_declaration(&mut self, decl: Declaration) -> Result<Option<DeclId>> {
        if let Some(name) = decl.name.clone() {
            let existing = self.index.get(&name).map(|entry| entry.target);
            match existing {
                Some(IndexTarget::Decl(existing)) => {
                    self.merge(existing, decl)?;
                    return Ok(None);
                }
                Some(_) => {
                    return Err(CompileError::syntax(format!(
                        "identifier \"{}\" already exists",
                        name
                    )))
                }
                None => {}
            }
        }
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        Ok(Some(id))
    }

    /// Inserts `name → decl` into the index.
    ///
    /// Fails on a conflicting entry; silently succeeds when the entry
    /// already points at the same declaration (a forward being upgraded).
    pub fn add_identifier(&mut self, id: DeclId) -> Result<()> {
        let decl = self.decl(id);
        let name = match decl.name.clone() {
            Some(name) => name,
            None => return Ok(()),
        };
        let entry = IndexEntry {
            class: decl.token,
            target: IndexTarget::Decl(id),
        };
        if let Some(existing) = self.index.get(&name) {
            match existing.target {
                IndexTarget::Decl(other) if other == id => return Ok(()),
                _ => {
                    return Err(CompileError::syntax(format!(
                        "identifier \"{}\" already exists",
                        name
                    )))
                }
            }
        }
        self.index.insert(name, entry);
        Ok(())
    }

    /// Registers an enum member name in the index.
    pub fn add_enum_member(&mut self, name: &str, decl: DeclId, member: usize) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(CompileError::syntax(format!(
                "identifier \"{}\" already exists",
                name
            )));
        }
        self.index.insert(
            name.to_string(),
            IndexEntry {
                class: IdentClass::EnumMemberName,
                target: IndexTarget::EnumMember(decl, member),
            },
        );
        Ok(())
    }

    /// Attempts structural promotion of `existing` with the contents of
    /// `incoming`: a forward-declared structure or enum gains its body; a
    /// function signature must match when promoting to full.
    pub fn merge(&mut self, existing: DeclId, incoming: Declaration) -> Result<()> {
        let slot = &mut self.decls[existing.index()];
        let name = incoming.name.clone().unwrap_or_default();

        match (&mut slot.body, incoming.body) {
            (DeclBody::Structure(a), DeclBody::Structure(b)) => {
                if incoming.is_full {
                    if slot.is_full {
                        return Err(CompileError::syntax(format!(
                            "structure \"{}\" is already fully defined",
                            name
                        )));
                    }
                    a.members = b.members;
                    slot.is_full = true;
                }
                Ok(())
            }
            (DeclBody::Enum(a), DeclBody::Enum(b)) => {
                if incoming.is_full {
                    if slot.is_full {
                        return Err(CompileError::syntax(format!(
                            "enum \"{}\" is already fully defined",
                            name
                        )));
                    }
                    a.members = b.members;
                    slot.is_full = true;
                }
                Ok(())
            }
            (DeclBody::Alias(a), DeclBody::Alias(b)) => {
                if incoming.is_full {
                    if slot.is_full {
                        return Err(CompileError::syntax(format!(
                            "alias \"{}\" is already defined",
                            name
                        )));
                    }
                    a.target = b.target;
                    slot.is_full = true;
                }
                Ok(())
            }
            (DeclBody::Function(a), DeclBody::Function(b)) => {
                if let Some(sig) = b.signature {
                    match &a.signature {
                        Some(existing_sig) if !existing_sig.is_equal(&sig) => {
                            return Err(CompileError::syntax(format!(
                                "conflicting signatures for function \"{}\"",
                                name
                            )));
                        }
                        _ => a.signature = Some(sig),
                    }
                }
                if let Some(body) = b.body {
                    if a.body.is_some() {
                        return Err(CompileError::syntax(format!(
                            "function \"{}\" is already fully defined",
                            name
                        )));
                    }
                    a.body = Some(body);
                    slot.is_full = true;
                }
                a.is_extern |= b.is_extern;
                Ok(())
            }
            (DeclBody::Variable(a), DeclBody::Variable(b)) => {
                a.is_extern |= b.is_extern;
                if !is_type_placeholder(&b.ty) {
                    if !is_type_placeholder(&a.ty) && !a.ty.is_equal(&b.ty) {
                        return Err(CompileError::syntax(format!(
                            "conflicting types for variable \"{}\"",
                            name
                        )));
                    }
                    a.ty = b.ty;
                    slot.is_full = true;
                }
                if let Some(value) = b.value {
                    if a.value.is_some() {
                        return Err(CompileError::syntax(format!(
                            "variable \"{}\" is already initialized",
                            name
                        )));
                    }
                    a.value = Some(value);
                }
                Ok(())
            }
            (slot_body, _) => Err(CompileError::syntax(format!(
                "identifier \"{}\" is already declared as a {}",
                name,
                body_kind_name(slot_body)
            ))),
        }
    }

    /// The lexical type a type-naming declaration stands for in source.
    ///
    /// Aliases dissolve into a copy of their target.
    pub fn decl_as_type(&self, id: DeclId) -> Result<Type> {
        match &self.decl(id).body {
            DeclBody::Structure(_) => Ok(Type::new(TypeKind::Structure(id))),
            DeclBody::Enum(_) => Ok(Type::new(TypeKind::Enum(id))),
            DeclBody::Alias(a) => Ok(a.target.clone()),
            other => Err(CompileError::internal(format!(
                "a {} declaration does not name a type",
                body_kind_name(other)
            ))),
        }
    }

    pub fn function(&self, id: DeclId) -> Result<&DcFunction> {
        match &self.decl(id).body {
            DeclBody::Function(f) => Ok(f),
            _ => Err(CompileError::internal("expected a function declaration")),
        }
    }

    pub fn function_signature(&self, id: DeclId) -> Result<&FunctionSignature> {
        self.function(id)?.signature.as_ref().ok_or_else(|| {
            CompileError::internal("function signature used before the signature pass")
        })
    }

    pub fn structure(&self, id: DeclId) -> Result<&DcStructure> {
        match &self.decl(id).body {
            DeclBody::Structure(s) => Ok(s),
            _ => Err(CompileError::internal("expected a structure declaration")),
        }
    }

    pub fn enumeration(&self, id: DeclId) -> Result<&DcEnum> {
        match &self.decl(id).body {
            DeclBody::Enum(e) => Ok(e),
            _ => Err(CompileError::internal("expected an enum declaration")),
        }
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

/// The pass-1 stand-in type for globals whose real type is not resolvable
/// until every name is registered.
pub fn type_placeholder() -> Type {
    Type::primitive(primitive::ANY)
}

pub fn is_type_placeholder(ty: &Type) -> bool {
    matches!(ty.kind, TypeKind::Primitive(primitive::ANY)) && ty.is_plain()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward_struct(name: &str) -> Declaration {
        Declaration::new(
            DeclBody::Structure(DcStructure {
                name: Some(name.to_string()),
                members: Vec::new(),
            }),
            false,
        )
    }

    fn full_struct(name: &str, members: Vec<StructureMember>) -> Declaration {
        Declaration::new(
            DeclBody::Structure(DcStructure {
                name: Some(name.to_string()),
                members,
            }),
            true,
        )
    }

    #[test]
    fn primitives_are_seeded() {
        let ast = Ast::new();
        let entry = ast.lookup("int").unwrap();
        assert_eq!(entry.class, IdentClass::PrimitiveName);
        assert_eq!(entry.target, IndexTarget::Primitive(primitive::INT));
        assert!(ast.lookup("<any>").is_none());
    }

    #[test]
    fn forward_then_full_yields_one_declaration() {
        let mut ast = Ast::new();
        let id = ast.add_declaration(forward_struct("N")).unwrap().unwrap();
        ast.add_identifier(id).unwrap();
        assert!(!ast.decl(id).is_full);

        let merged = ast
            .add_declaration(full_struct(
                "N",
                vec![StructureMember {
                    name: "v".to_string(),
                    ty: Type::primitive(primitive::INT),
                }],
            ))
            .unwrap();
        assert!(merged.is_none(), "full declaration merges into the forward one");
        assert_eq!(ast.len(), 1);
        assert!(ast.decl(id).is_full);

        let entry = ast.lookup("N").unwrap();
        assert_eq!(entry.target, IndexTarget::Decl(id));
    }

    #[test]
    fn duplicate_full_definitions_conflict() {
        let mut ast = Ast::new();
        let id = ast
            .add_declaration(full_struct("P", Vec::new()))
            .unwrap()
            .unwrap();
        ast.add_identifier(id).unwrap();

        let err = ast.add_declaration(full_struct("P", Vec::new())).unwrap_err();
        assert!(err.message.contains("already fully defined"));
    }

    #[test]
    fn primitive_names_are_reserved() {
        let mut ast = Ast::new();
        let err = ast
            .add_declaration(full_struct("int", Vec::new()))
            .unwrap_err();
        assert!(err.message.contains("already exists"));
    }

    #[test]
    fn function_signature_mismatch_is_rejected() {
        let mut ast = Ast::new();
        let sig = |ret: PrimitiveIndex| FunctionSignature {
            parameters: Vec::new(),
            is_c_vararg: false,
            return_type: Type::primitive(ret),
        };
        let decl = |s: FunctionSignature| {
            Declaration::new(
                DeclBody::Function(DcFunction {
                    name: "f".to_string(),
                    signature: Some(s),
                    body: None,
                    is_extern: false,
                }),
                false,
            )
        };

        let id = ast.add_declaration(decl(sig(primitive::INT))).unwrap().unwrap();
        ast.add_identifier(id).unwrap();
        let err = ast.add_declaration(decl(sig(primitive::BOOL))).unwrap_err();
        assert!(err.message.contains("conflicting signatures"));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut ast = Ast::new();
        let id = ast.add_declaration(forward_struct("X")).unwrap().unwrap();
        ast.add_identifier(id).unwrap();

        let var = Declaration::new(
            DeclBody::Variable(DcVariable {
                name: "X".to_string(),
                ty: Type::primitive(primitive::INT),
                value: None,
                is_extern: false,
            }),
            true,
        );
        assert!(ast.add_declaration(var).is_err());
    }
}
