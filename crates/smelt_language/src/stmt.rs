//! Statements.
//!
//! Function bodies are compound statements; `if` and `while` conditions are
//! checked to be boolean at parse time, and local variable statements bind
//! into the innermost scope frame as they are parsed.

use crate::expr::ExpressionBlock;
use crate::types::Type;

/// A local variable declaration with an optional initializer.
#[derive(Debug)]
pub struct StVariable {
    pub name: String,
    pub ty: Type,
    pub value: Option<ExpressionBlock>,
}

#[derive(Debug)]
pub enum Jump {
    Return(Option<ExpressionBlock>),
    Break,
    Continue,
}

#[derive(Debug)]
pub enum Statement {
    Variable(StVariable),
    Expression(ExpressionBlock),
    Compound(Vec<Statement>),
    If {
        condition: ExpressionBlock,
        body: Box<Statement>,
        otherwise: Option<Box<Statement>>,
    },
    While {
        condition: ExpressionBlock,
        body: Box<Statement>,
    },
    Jump(Jump),
}
