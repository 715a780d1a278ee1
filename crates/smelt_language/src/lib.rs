//! # smelt-language
//!
//! The SRC front-end: lexing, parsing, symbol resolution, static type
//! checking, and C-header interop.
//!
//! Compilation is driven by the [`import`] module: the origin file is swept
//! three times (names, signatures, bodies), pulling in transitive imports
//! along the way, and everything lands in one [`ast::Ast`]. The emitter in
//! `smelt-compile` then walks the declaration list in source order.
//!
//! ```no_run
//! use smelt_language::context::Context;
//! use smelt_language::import;
//! use std::path::Path;
//!
//! # fn main() -> smelt_base::Result<()> {
//! let mut ctx = Context::new();
//! import::parse_origin(&mut ctx, Path::new("main.src"))?;
//! for (_, decl) in ctx.ast.decls() {
//!     println!("{:?}", decl.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod constant;
pub mod context;
pub mod expr;
pub mod import;
pub mod lexer;
pub mod native;
pub mod ops;
pub mod parser;
pub mod primitive;
pub mod stmt;
pub mod token;
pub mod types;
