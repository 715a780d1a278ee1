//! Lexical types.
//!
//! A [`Type`] is a tagged payload (a primitive row or a declaration in the
//! AST) plus a list of levels, where each level is one pointer (`*`) or
//! array (`[]`) wrapper applied in order. A type with no levels is *plain*;
//! a plain type whose kind is primitive is *plain primitive* (pp).
//!
//! The symbol table canonicalizes declarations, so payload comparison is
//! identity comparison on declaration ids. `char`/`byte` and
//! `uchar`/`ubyte` are interchangeable under equality.

use crate::ast::{Ast, DeclId};
use crate::primitive::{self, PrimitiveIndex};

/// One pointer or array wrapper on a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeLevelKind {
    Pointer,
    Array,
}

/// A level with an optional constant array size.
///
/// Sizes are folded to plain integers at parse time; only the level kind
/// participates in type equality.
#[derive(Debug, Clone, Copy)]
pub struct TypeLevel {
    pub kind: TypeLevelKind,
    pub array_size: Option<u64>,
}

impl TypeLevel {
    pub fn pointer() -> Self {
        Self { kind: TypeLevelKind::Pointer, array_size: None }
    }

    pub fn array() -> Self {
        Self { kind: TypeLevelKind::Array, array_size: None }
    }

    pub fn sized_array(size: u64) -> Self {
        Self { kind: TypeLevelKind::Array, array_size: Some(size) }
    }
}

/// What a type's payload points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Primitive(PrimitiveIndex),
    Structure(DeclId),
    Enum(DeclId),
    Alias(DeclId),
    Function(DeclId),
    #[cfg(feature = "generics")]
    Generic(DeclId),
}

/// A lexical type: payload kind plus level list.
#[derive(Debug, Clone)]
pub struct Type {
    pub kind: TypeKind,
    pub levels: Vec<TypeLevel>,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Self { kind, levels: Vec::new() }
    }

    pub fn primitive(index: PrimitiveIndex) -> Self {
        Self::new(TypeKind::Primitive(index))
    }

    /// The default boolean expression type.
    pub fn boolean() -> Self {
        Self::primitive(primitive::BOOL)
    }

    /// The default character literal type.
    pub fn character() -> Self {
        Self::primitive(primitive::BYTE)
    }

    /// The default string literal type, `char[]`.
    pub fn string() -> Self {
        let mut ty = Self::primitive(primitive::CHAR);
        ty.wrap_array();
        ty
    }

    pub fn wrap_pointer(&mut self) {
        self.levels.push(TypeLevel::pointer());
    }

    pub fn wrap_array(&mut self) {
        self.levels.push(TypeLevel::array());
    }

    pub fn wrap_sized_array(&mut self, size: u64) {
        self.levels.push(TypeLevel::sized_array(size));
    }

    /// Removes the outermost level. Callers check the level kind first.
    pub fn pop_level(&mut self) {
        self.levels.pop();
    }

    fn last_level_is(&self, kind: TypeLevelKind) -> bool {
        self.levels.last().map(|l| l.kind == kind).unwrap_or(false)
    }

    pub fn is_array(&self) -> bool {
        self.last_level_is(TypeLevelKind::Array)
    }

    pub fn is_pointer(&self) -> bool {
        self.last_level_is(TypeLevelKind::Pointer)
    }

    pub fn is_single_pointer(&self) -> bool {
        self.levels.len() == 1 && self.is_pointer()
    }

    pub fn is_plain(&self) -> bool {
        self.levels.is_empty()
    }

    /// Plain primitive.
    pub fn is_pp(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(_)) && self.is_plain()
    }

    fn pp_index(&self) -> Option<PrimitiveIndex> {
        match self.kind {
            TypeKind::Primitive(index) if self.is_plain() => Some(index),
            _ => None,
        }
    }

    pub fn is_pp_number(&self) -> bool {
        self.pp_index().map(primitive::is_number).unwrap_or(false)
    }

    pub fn is_pp_integer(&self) -> bool {
        self.pp_index().map(primitive::is_integer).unwrap_or(false)
    }

    pub fn is_pp_boolean(&self) -> bool {
        self.pp_index().map(primitive::is_boolean).unwrap_or(false)
    }

    pub fn is_pp_void(&self) -> bool {
        self.pp_index().map(primitive::is_void).unwrap_or(false)
    }

    /// Deep comparison without implicit casting.
    ///
    /// Payloads compare by identity (the symbol table canonicalizes
    /// declarations); `char`/`byte` and `uchar`/`ubyte` are aliases of each
    /// other.
    pub fn is_equal(&self, other: &Type) -> bool {
        if self.levels.len() != other.levels.len() {
            return false;
        }
        if self
            .levels
            .iter()
            .zip(other.levels.iter())
            .any(|(a, b)| a.kind != b.kind)
        {
            return false;
        }

        match (self.kind, other.kind) {
            (TypeKind::Primitive(a), TypeKind::Primitive(b)) => {
                a == b || char_byte_aliased(a, b)
            }
            (a, b) => a == b,
        }
    }

    /// Whether a value of type `value` can be assigned to a slot of this
    /// type without truncation or precision loss.
    pub fn can_assign(&self, value: &Type) -> bool {
        if self.is_equal(value) {
            return true;
        }

        let (a, v) = match (self.pp_index(), value.pp_index()) {
            (Some(a), Some(v)) if primitive::is_number(a) && primitive::is_number(v) => (a, v),
            _ => return false,
        };

        if primitive::is_integer(a) && primitive::is_floating(v) {
            return false;
        }
        if primitive::is_unsigned(a) && primitive::is_signed(v) {
            return false;
        }
        primitive::capacity(a) > primitive::capacity(v)
    }

    /// The promoted common type for two binary-operation operands.
    ///
    /// The smaller type is widened to the larger, so no truncation can
    /// occur. Returns `None` for incompatible inputs; callers escalate to a
    /// syntax error naming both display names.
    pub fn merge_extend(a: &Type, b: &Type) -> Option<Type> {
        if a.is_equal(b) {
            return Some(a.clone());
        }

        let (mut ia, mut ib) = match (a.pp_index(), b.pp_index()) {
            (Some(ia), Some(ib))
                if primitive::is_number(ia) && primitive::is_number(ib) =>
            {
                (ia, ib)
            }
            _ => return None,
        };

        // Normalize so that `a` is never the wider category:
        // INTEGER < FLOATING, UNSIGNED < SIGNED.
        if primitive::is_floating(ia) && primitive::is_integer(ib) {
            std::mem::swap(&mut ia, &mut ib);
        }
        if primitive::is_signed(ia) && primitive::is_unsigned(ib) {
            std::mem::swap(&mut ia, &mut ib);
        }

        if primitive::is_unsigned(ia) && primitive::is_signed(ib) {
            ia = primitive::smallest_with_capacity(
                primitive::SIGNED,
                primitive::capacity(ia),
                ia,
            );
        }
        if primitive::is_integer(ia) && primitive::is_floating(ib) {
            ia = primitive::smallest_with_capacity(
                primitive::FLOATING,
                primitive::capacity(ia),
                ia,
            );
        }

        if primitive::capacity(ia) > primitive::capacity(ib) {
            Some(Type::primitive(ia))
        } else {
            Some(Type::primitive(ib))
        }
    }

    /// Merge used only for assignment typing: the value side may be
    /// implicitly truncated into the assignee's type.
    ///
    /// Slated for removal once constant-expression sizing can prove value
    /// ranges; assignment checking is its last caller.
    pub fn merge_prioritized<'a>(lhs: &'a Type, value: &Type) -> Option<&'a Type> {
        if lhs.is_equal(value) {
            return Some(lhs);
        }
        if lhs.is_pp_number() && value.is_pp_number() {
            return Some(lhs);
        }
        None
    }

    pub fn can_merge(a: &Type, b: &Type) -> bool {
        Type::merge_extend(a, b).is_some()
    }

    /// Human-readable name: payload name followed by `*`/`[]` levels.
    pub fn display_name(&self, ast: &Ast) -> String {
        let mut name = self.payload_name(ast);
        for level in &self.levels {
            match level.kind {
                TypeLevelKind::Pointer => name.push('*'),
                TypeLevelKind::Array => name.push_str("[]"),
            }
        }
        name
    }

    /// Identifier-valid name for generated C identifiers: levels become
    /// `__cst_pointer` / `__cst_array`.
    pub fn mangled_name(&self, ast: &Ast) -> String {
        let mut name = self.payload_name(ast);
        for level in &self.levels {
            match level.kind {
                TypeLevelKind::Pointer => name.push_str("__cst_pointer"),
                TypeLevelKind::Array => name.push_str("__cst_array"),
            }
        }
        name
    }

    fn payload_name(&self, ast: &Ast) -> String {
        match self.kind {
            TypeKind::Primitive(index) => primitive::PRIMITIVES[index].name.to_string(),
            TypeKind::Structure(id) => named_or(ast, id, "<anonymous structure>"),
            TypeKind::Enum(id) => named_or(ast, id, "<anonymous enum>"),
            TypeKind::Alias(id) => named_or(ast, id, "<anonymous alias>"),
            TypeKind::Function(id) => named_or(ast, id, "<function>"),
            #[cfg(feature = "generics")]
            TypeKind::Generic(id) => named_or(ast, id, "<generic>"),
        }
    }
}

fn named_or(ast: &Ast, id: DeclId, fallback: &str) -> String {
    ast.decl(id)
        .name
        .clone()
        .unwrap_or_else(|| fallback.to_string())
}

fn char_byte_aliased(a: PrimitiveIndex, b: PrimitiveIndex) -> bool {
    matches!(
        (a, b),
        (primitive::CHAR, primitive::BYTE)
            | (primitive::BYTE, primitive::CHAR)
            | (primitive::UCHAR, primitive::UBYTE)
            | (primitive::UBYTE, primitive::UCHAR)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{BYTE, CHAR, DOUBLE, FLOAT, INT, LONG, UBYTE, UCHAR, UINT};

    fn pp(index: PrimitiveIndex) -> Type {
        Type::primitive(index)
    }

    #[test]
    fn equality_is_reflexive_for_all_primitives() {
        for i in 0..crate::primitive::PRIMITIVES.len() {
            assert!(pp(i).is_equal(&pp(i)), "primitive {} not equal to itself", i);
        }
    }

    #[test]
    fn char_and_byte_are_interchangeable() {
        assert!(pp(CHAR).is_equal(&pp(BYTE)));
        assert!(pp(BYTE).is_equal(&pp(CHAR)));
        assert!(pp(UCHAR).is_equal(&pp(UBYTE)));
        assert!(pp(UBYTE).is_equal(&pp(UCHAR)));
        assert!(!pp(CHAR).is_equal(&pp(UCHAR)));
    }

    #[test]
    fn equality_requires_matching_levels() {
        let mut ptr = pp(INT);
        ptr.wrap_pointer();
        assert!(!ptr.is_equal(&pp(INT)));

        let mut arr = pp(INT);
        arr.wrap_array();
        assert!(!ptr.is_equal(&arr));

        let mut ptr2 = pp(INT);
        ptr2.wrap_pointer();
        assert!(ptr.is_equal(&ptr2));
    }

    #[test]
    fn assign_rejects_truncation() {
        assert!(!pp(INT).can_assign(&pp(LONG)));
        assert!(pp(LONG).can_assign(&pp(INT)));
        assert!(!pp(INT).can_assign(&pp(UINT)));
        assert!(!pp(BYTE).can_assign(&pp(FLOAT)));
    }

    #[test]
    fn assign_rejects_unsigned_from_signed() {
        assert!(!pp(UINT).can_assign(&pp(BYTE)));
    }

    #[test]
    fn merge_extend_widens_mixed_signedness() {
        let merged = Type::merge_extend(&pp(BYTE), &pp(UBYTE)).unwrap();
        assert!(matches!(merged.kind, TypeKind::Primitive(i) if i == crate::primitive::SHORT));

        let merged = Type::merge_extend(&pp(INT), &pp(UINT)).unwrap();
        assert!(matches!(merged.kind, TypeKind::Primitive(i) if i == LONG));
    }

    #[test]
    fn merge_extend_prefers_floating() {
        for i in crate::primitive::INTEGER.start..=crate::primitive::INTEGER.end {
            for f in [FLOAT, DOUBLE] {
                let merged = Type::merge_extend(&pp(i), &pp(f)).expect("integer x floating merges");
                let out = match merged.kind {
                    TypeKind::Primitive(out) => out,
                    _ => unreachable!(),
                };
                assert!(crate::primitive::is_floating(out));
                let needed = crate::primitive::capacity(i).max(crate::primitive::capacity(f));
                assert!(crate::primitive::capacity(out) >= needed);
            }
        }
    }

    #[test]
    fn merge_extend_rejects_non_numbers() {
        assert!(Type::merge_extend(&pp(crate::primitive::BOOL), &pp(INT)).is_none());
        let mut ptr = pp(INT);
        ptr.wrap_pointer();
        assert!(Type::merge_extend(&ptr, &pp(INT)).is_none());
    }

    #[test]
    fn display_and_mangled_names_follow_the_levels() {
        let ast = crate::ast::Ast::new();
        let mut ty = pp(INT);
        ty.wrap_pointer();
        ty.wrap_array();
        assert_eq!(ty.display_name(&ast), "int*[]");
        assert_eq!(ty.mangled_name(&ast), "int__cst_pointer__cst_array");
    }

    #[test]
    fn merge_prioritized_keeps_the_assignee() {
        let lhs = pp(BYTE);
        let merged = Type::merge_prioritized(&lhs, &pp(LONG)).unwrap();
        assert!(merged.is_equal(&pp(BYTE)));
        assert!(Type::merge_prioritized(&pp(crate::primitive::BOOL), &pp(INT)).is_none());
    }
}
