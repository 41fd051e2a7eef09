//! Lexing and parsing: source text → command tree.

pub mod arithmetic_parser;
pub mod compound_parser;
pub mod conditional_parser;
pub mod expansion_parser;
pub mod lexer;
pub mod parser;
pub mod types;
pub mod word_parser;

pub use parser::Parser;
pub use types::ParseError;

use crate::ast::types::ScriptNode;
use crate::environment::aliases::AliasTable;

/// Parse one complete command unit.
pub fn parse_script(source: &str, aliases: Option<&AliasTable>) -> Result<ScriptNode, ParseError> {
    let tokens = lexer::Lexer::new(source, aliases).tokenize()?;
    Parser::new(tokens, source).parse_script()
}
