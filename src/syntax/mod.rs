//! A small Go front-end: enough of the language to index declarations,
//! read comments and evaluate constants.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use parser::{parse_expr, parse_file, parse_type_expr};

/// A lexical or syntactic error with the 1-based line it was found on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}
