//! # smelt-base
//!
//! Structural atoms for the smelt compiler.
//!
//! This crate provides the foundational types used throughout smelt:
//!
//! - [`Span`] — Source location tracking
//! - [`CompileError`]/[`Result`] — the two compiler error kinds, with
//!   optional source positions
//! - [`Arena`]/[`Id`] — dense index arenas for shared, mutable tables
//! - [`Style`] — ANSI styling for terminal diagnostics
//!
//! # Design Principles
//!
//! This crate has no knowledge of the SRC grammar or of I/O. It provides
//! only generic, reusable infrastructure that higher-level crates build
//! upon.

pub mod arena;
pub mod error;
pub mod span;
pub mod style;

pub use arena::{Arena, Id};
pub use error::{warn, CompileError, ErrorKind, Result};
pub use span::Span;
pub use style::Style;
