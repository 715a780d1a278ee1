//! # smelt-compile
//!
//! The smelt compilation pipeline: drives the `smelt-language` import
//! engine over an origin file and emits one C translation unit.
//!
//! The two entry points are [`compile::compile_to_c`] (in memory) and
//! [`compile::compile_file`] (writes `<origin>.c` alongside the input).

pub mod codegen_c;
pub mod compile;

pub use compile::{compile_file, compile_to_c};
