//! The parser context.
//!
//! A stack of frames tracks which construct is being parsed: the bottom
//! frame is always `Global`; `Scope` frames carry function-local bindings,
//! `Expression` frames collect constructor expressions for hoisting, `Enum`
//! frames enforce the implicit-XOR-explicit member value rule, and `Flag`
//! frames carry a signedness override for the next type token. Frames push
//! on entering a construct and pop on leaving.
//!
//! The context also owns the AST being built, the current import pass, the
//! per-file import registry, and the *skip* state machine the lexer
//! consults to fast-forward over bodies during early passes.

use crate::ast::{Ast, IdentClass, IndexTarget};
use crate::primitive;
use crate::token::{Classified, Resolved};
use crate::types::Type;
use bitflags::bitflags;
use smelt_base::{CompileError, Result};
use std::path::PathBuf;

bitflags! {
    /// Flag-frame bits. Bit 0 selects the unsigned sibling for the next
    /// resolved integer type token.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TypeFlags: u8 {
        const UNSIGNED = 1;
    }
}

/// Whether an enum chose implicit or explicit member values.
///
/// The first member decides; mixing the two would invite value conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumValueKind {
    Unknown,
    Implicit,
    Explicit,
}

/// A local binding inside a scope frame.
#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: String,
    pub class: IdentClass,
    pub ty: Type,
}

/// One context frame.
#[derive(Debug)]
pub enum Frame {
    Global,
    Import,
    Scope {
        locals: Vec<LocalDecl>,
    },
    Expression {
        constructors: Vec<crate::expr::ConstructorId>,
    },
    Enum {
        member_index: usize,
        kind: EnumValueKind,
    },
    Flag {
        flags: TypeFlags,
    },
}

impl Frame {
    fn kind_name(&self) -> &'static str {
        match self {
            Frame::Global => "GLOBAL",
            Frame::Import => "IMPORT",
            Frame::Scope { .. } => "SCOPE",
            Frame::Expression { .. } => "EXPRESSION",
            Frame::Enum { .. } => "ENUM",
            Frame::Flag { .. } => "FLAG",
        }
    }
}

/// One of the three sweeps the import driver performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Pass {
    One,
    Two,
    Three,
}

/// One record in the import registry.
#[derive(Debug)]
pub struct ImportedFile {
    pub filename: PathBuf,
    pub is_native: bool,
    pub last: Pass,
}

/// What the lexer should do at the current significant character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipAction {
    /// Not a skip boundary; lex normally.
    None,
    /// Enter skip mode and consume through the configured pair.
    Start,
    /// The discard character arrived first; drop the expectation and lex
    /// normally.
    Exit,
}

/// A skip expectation: nothing, a specific character, or any opener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipExpect {
    None,
    Any,
    Char(char),
}

/// Opening/closing pairs the skip machine understands. A pair count of 0
/// means "stop at the first terminator, do not nest".
const SKIP_PAIRS: [(char, char, u8); 4] = [('{', '}', 1), ('(', ')', 1), ('=', ';', 0), ('<', '>', 1)];

#[derive(Debug)]
pub struct Context {
    pub ast: Ast,
    stack: Vec<Frame>,
    pub pass: Pass,
    /// Whether the file currently being parsed is the origin file. Only
    /// origin functions and variables receive definitions in the output.
    pub in_origin: bool,
    /// Absolute path of the origin file, once known.
    pub filename: Option<PathBuf>,
    /// Ordered registry of every file touched by the import driver.
    pub files: Vec<ImportedFile>,
    tmpvar_counter: usize,

    expect_skip_from: SkipExpect,
    expect_skip_discard: SkipExpect,
    pub skip_until: char,
    pub skip_pair_count: u8,
}

impl Context {
    pub fn new() -> Self {
        Self {
            ast: Ast::new(),
            stack: vec![Frame::Global],
            pass: Pass::Three,
            in_origin: true,
            filename: None,
            files: Vec::new(),
            tmpvar_counter: 0,
            expect_skip_from: SkipExpect::None,
            expect_skip_discard: SkipExpect::None,
            skip_until: '\0',
            skip_pair_count: 0,
        }
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    pub fn enter(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    pub fn enter_scope(&mut self) {
        self.stack.push(Frame::Scope { locals: Vec::new() });
    }

    pub fn enter_expression(&mut self) {
        self.stack.push(Frame::Expression {
            constructors: Vec::new(),
        });
    }

    pub fn enter_enum(&mut self) {
        self.stack.push(Frame::Enum {
            member_index: 0,
            kind: EnumValueKind::Unknown,
        });
    }

    pub fn enter_flag(&mut self, flags: TypeFlags) {
        self.stack.push(Frame::Flag { flags });
    }

    /// Pops the current frame. Popping the global frame is a bug.
    pub fn exit(&mut self) -> Result<Frame> {
        if self.stack.len() <= 1 {
            return Err(CompileError::internal(
                "attempted to exit from the global context",
            ));
        }
        Ok(self.stack.pop().expect("stack is non-empty"))
    }

    pub fn current(&self) -> &Frame {
        self.stack.last().expect("global frame always present")
    }

    /// The current frame, which must be of the expected kind.
    pub fn expect_expression(&mut self) -> Result<&mut Vec<crate::expr::ConstructorId>> {
        match self.stack.last_mut() {
            Some(Frame::Expression { constructors }) => Ok(constructors),
            Some(other) => Err(CompileError::internal(format!(
                "unexpected context level kind: expected \"EXPRESSION\", got \"{}\"",
                other.kind_name()
            ))),
            None => Err(CompileError::internal("context stack is empty")),
        }
    }

    pub fn expect_enum(&mut self) -> Result<(&mut usize, &mut EnumValueKind)> {
        match self.stack.last_mut() {
            Some(Frame::Enum { member_index, kind }) => Ok((member_index, kind)),
            Some(other) => Err(CompileError::internal(format!(
                "unexpected context level kind: expected \"ENUM\", got \"{}\"",
                other.kind_name()
            ))),
            None => Err(CompileError::internal("context stack is empty")),
        }
    }

    /// Finds the innermost expression frame, if any.
    pub fn find_expression(&mut self) -> Option<&mut Vec<crate::expr::ConstructorId>> {
        for frame in self.stack.iter_mut().rev() {
            if let Frame::Expression { constructors } = frame {
                return Some(constructors);
            }
        }
        None
    }

    fn find_flags(&self) -> Option<TypeFlags> {
        for frame in self.stack.iter().rev() {
            if let Frame::Flag { flags } = frame {
                return Some(*flags);
            }
        }
        None
    }

    /// Binds a local declaration in the innermost scope frame.
    pub fn register_local(&mut self, local: LocalDecl) -> Result<()> {
        for frame in self.stack.iter_mut().rev() {
            if let Frame::Scope { locals } = frame {
                locals.push(local);
                return Ok(());
            }
        }
        Err(CompileError::internal(
            "local declaration outside of any scope frame",
        ))
    }

    pub fn next_tmpvar_name(&mut self) -> String {
        let name = format!("_cst_tmpvar_{}_", self.tmpvar_counter);
        self.tmpvar_counter += 1;
        name
    }

    // ------------------------------------------------------------------
    // Identifier classification
    // ------------------------------------------------------------------

    /// Decides the token class of a raw identifier.
    ///
    /// The context stack is consulted first — the innermost local binding
    /// wins, and inside an import frame every identifier is a plain path
    /// segment. Only then does the global index decide. An unsigned flag
    /// frame rewrites a resolved signed integer primitive to its unsigned
    /// sibling; applying it to anything else is a syntax error.
    pub fn classify(&self, name: &str) -> Result<Classified> {
        let mut result = None;

        'stack: for frame in self.stack.iter().rev() {
            match frame {
                Frame::Scope { locals } => {
                    if let Some(local) = locals.iter().rev().find(|l| l.name == name) {
                        result = Some(Classified {
                            name: name.to_string(),
                            class: local.class,
                            resolved: Resolved::Local(local.ty.clone()),
                        });
                        break 'stack;
                    }
                }
                Frame::Import => {
                    result = Some(Classified {
                        name: name.to_string(),
                        class: IdentClass::Identifier,
                        resolved: Resolved::Plain,
                    });
                    break 'stack;
                }
                Frame::Global => break 'stack,
                Frame::Expression { .. } | Frame::Enum { .. } | Frame::Flag { .. } => {}
            }
        }

        let mut classified = match result {
            Some(classified) => classified,
            None => match self.ast.lookup(name) {
                Some(entry) => Classified {
                    name: name.to_string(),
                    class: entry.class,
                    resolved: match entry.target {
                        IndexTarget::Primitive(index) => Resolved::Primitive(index),
                        IndexTarget::Decl(id) => Resolved::Decl(id),
                        IndexTarget::EnumMember(id, member) => Resolved::EnumMember(id, member),
                    },
                },
                None => Classified {
                    name: name.to_string(),
                    class: IdentClass::Identifier,
                    resolved: Resolved::Plain,
                },
            },
        };

        if let Some(flags) = self.find_flags() {
            if flags.contains(TypeFlags::UNSIGNED) {
                classified = self.apply_unsigned(classified)?;
            }
        }

        Ok(classified)
    }

    fn apply_unsigned(&self, classified: Classified) -> Result<Classified> {
        match classified.resolved {
            Resolved::Primitive(index) if primitive::is_signed(index) => {
                let unsigned = primitive::signed_to_unsigned(index);
                Ok(Classified {
                    resolved: Resolved::Primitive(unsigned),
                    ..classified
                })
            }
            _ => Err(CompileError::syntax(format!(
                "only signed integer types can be unsigned, got \"{}\"",
                classified.name
            ))),
        }
    }

    /// Resolves a classified type name to a lexical type.
    pub fn classified_as_type(&self, classified: &Classified) -> Result<Type> {
        match classified.resolved {
            Resolved::Primitive(index) => Ok(Type::primitive(index)),
            Resolved::Decl(id) => self.ast.decl_as_type(id),
            _ => Err(CompileError::syntax(format!(
                "\"{}\" does not name a type",
                classified.name
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Skipping
    // ------------------------------------------------------------------

    /// Arms the skip machine for any opener, if currently on `pass`.
    pub fn skip_on_pass(&mut self, pass: Pass) {
        if self.pass == pass {
            self.expect_skip_from = SkipExpect::Any;
            self.expect_skip_discard = SkipExpect::None;
        }
    }

    /// Arms the skip machine for a specific opener, if currently on `pass`.
    pub fn skip_specific(&mut self, pass: Pass, from: char) {
        if self.pass == pass {
            self.expect_skip_from = SkipExpect::Char(from);
            self.expect_skip_discard = SkipExpect::None;
        }
    }

    /// Arms the skip machine for `from`, cancelled if `discard` arrives
    /// first, if currently on `pass`.
    pub fn skip_specific_unless(&mut self, pass: Pass, from: char, discard: char) {
        if self.pass == pass {
            self.expect_skip_from = SkipExpect::Char(from);
            self.expect_skip_discard = SkipExpect::Char(discard);
        }
    }

    pub fn skip_armed(&self) -> bool {
        self.expect_skip_from != SkipExpect::None
    }

    /// Decides what the lexer should do at significant character `c`, and
    /// on `Start` configures the closing character and nesting behavior.
    pub fn should_skip(&mut self, c: char) -> Result<SkipAction> {
        if self.expect_skip_from == SkipExpect::None {
            return Ok(SkipAction::None);
        }

        match self.expect_skip_discard {
            SkipExpect::Any if self.expect_skip_from != SkipExpect::Char(c) => {
                return Ok(SkipAction::Exit);
            }
            SkipExpect::Char(d) if d == c => {
                return Ok(SkipAction::Exit);
            }
            _ => {}
        }

        let matches = match self.expect_skip_from {
            SkipExpect::Any => true,
            SkipExpect::Char(from) => from == c,
            SkipExpect::None => false,
        };
        if !matches {
            return Ok(SkipAction::None);
        }

        let pair = SKIP_PAIRS
            .iter()
            .find(|(open, _, _)| *open == c)
            .ok_or_else(|| CompileError::internal(format!("no skip pair found for '{}'", c)))?;
        self.skip_until = pair.1;
        self.skip_pair_count = pair.2;
        Ok(SkipAction::Start)
    }

    /// Clears the skip expectation after the lexer leaves skip mode.
    pub fn finish_skip(&mut self) {
        self.expect_skip_from = SkipExpect::None;
        self.expect_skip_discard = SkipExpect::None;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_frame_cannot_be_exited() {
        let mut ctx = Context::new();
        assert!(ctx.exit().is_err());
        ctx.enter_scope();
        assert!(ctx.exit().is_ok());
        assert!(ctx.exit().is_err());
    }

    #[test]
    fn innermost_local_binding_wins() {
        let mut ctx = Context::new();
        ctx.enter_scope();
        ctx.register_local(LocalDecl {
            name: "x".to_string(),
            class: IdentClass::ParameterName,
            ty: Type::primitive(primitive::INT),
        })
        .unwrap();
        ctx.register_local(LocalDecl {
            name: "x".to_string(),
            class: IdentClass::VariableName,
            ty: Type::primitive(primitive::LONG),
        })
        .unwrap();

        let classified = ctx.classify("x").unwrap();
        assert_eq!(classified.class, IdentClass::VariableName);
        match classified.resolved {
            Resolved::Local(ty) => assert!(ty.is_equal(&Type::primitive(primitive::LONG))),
            other => panic!("expected a local binding, got {:?}", other),
        }
    }

    #[test]
    fn import_frames_neutralize_identifiers() {
        let mut ctx = Context::new();
        ctx.enter(Frame::Import);
        let classified = ctx.classify("int").unwrap();
        assert_eq!(classified.class, IdentClass::Identifier);
    }

    #[test]
    fn unsigned_flag_rewrites_signed_integers() {
        let mut ctx = Context::new();
        ctx.enter_flag(TypeFlags::UNSIGNED);
        let classified = ctx.classify("int").unwrap();
        match classified.resolved {
            Resolved::Primitive(index) => assert_eq!(index, primitive::UINT),
            other => panic!("expected a primitive, got {:?}", other),
        }
    }

    #[test]
    fn unsigned_flag_rejects_booleans() {
        let mut ctx = Context::new();
        ctx.enter_flag(TypeFlags::UNSIGNED);
        let err = ctx.classify("bool").unwrap_err();
        assert!(err.message.contains("unsigned"));
    }

    #[test]
    fn skip_machine_starts_on_expected_opener() {
        let mut ctx = Context::new();
        ctx.pass = Pass::One;
        ctx.skip_specific(Pass::One, '{');

        assert_eq!(ctx.should_skip('x').unwrap(), SkipAction::None);
        assert_eq!(ctx.should_skip('{').unwrap(), SkipAction::Start);
        assert_eq!(ctx.skip_until, '}');
        assert_eq!(ctx.skip_pair_count, 1);
    }

    #[test]
    fn skip_machine_discards_on_cancel_character() {
        let mut ctx = Context::new();
        ctx.pass = Pass::One;
        ctx.skip_specific_unless(Pass::One, '=', ';');

        assert_eq!(ctx.should_skip(';').unwrap(), SkipAction::Exit);
    }

    #[test]
    fn initializer_pair_does_not_nest() {
        let mut ctx = Context::new();
        ctx.pass = Pass::One;
        ctx.skip_specific(Pass::One, '=');
        assert_eq!(ctx.should_skip('=').unwrap(), SkipAction::Start);
        assert_eq!(ctx.skip_until, ';');
        assert_eq!(ctx.skip_pair_count, 0);
    }

    #[test]
    fn skip_is_inert_on_other_passes() {
        let mut ctx = Context::new();
        ctx.pass = Pass::Two;
        ctx.skip_specific(Pass::One, '{');
        assert!(!ctx.skip_armed());
        assert_eq!(ctx.should_skip('{').unwrap(), SkipAction::None);
    }

    #[test]
    fn tmpvar_names_are_sequential() {
        let mut ctx = Context::new();
        assert_eq!(ctx.next_tmpvar_name(), "_cst_tmpvar_0_");
        assert_eq!(ctx.next_tmpvar_name(), "_cst_tmpvar_1_");
    }
}
