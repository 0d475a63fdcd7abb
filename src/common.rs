use thiserror::Error;

use crate::lexer::Category;
use crate::symbol_table::SymbolError;

/// Reasons compilation of a class stops. None of them are recovered from.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("line {line}, {production}: {message}")]
    Lexical {
        line: u32,
        production: &'static str,
        message: String,
    },

    #[error("line {line}, {production}: expected {expected}, found {}", found_token(.category, .found))]
    Syntax {
        line: u32,
        production: &'static str,
        expected: &'static str,
        found: String,
        category: Category,
    },

    #[error("line {line}, {production}: {source}")]
    Symbol {
        line: u32,
        production: &'static str,
        found: String,
        category: Category,
        source: SymbolError,
    },

    #[error("line {line}, {production}: too many {what}")]
    TooMany {
        line: u32,
        production: &'static str,
        what: &'static str,
    },
}

fn found_token(category: &Category, text: &str) -> String {
    match category {
        Category::EndOfInput => category.to_string(),
        _ => format!("{} '{}'", category, text),
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
