use tracing::debug;

use crate::chunk::Chunk;
use crate::common::CompileResult;
use crate::lexer::Lexer;
use crate::parser::Parser;

/// Compiles the single class in `source`. Nothing is returned unless the
/// whole class compiled.
pub fn compile(source: &str) -> CompileResult<Chunk> {
    let lexer = Lexer::new(source.as_bytes());
    let mut parser = Parser::new(lexer);
    parser.advance("class")?;
    parser.class()?;
    let chunk = parser.end();

    debug!(instructions = chunk.len(), "compiled class");
    #[cfg(feature = "debug-logging")]
    chunk.disassemble("class");

    Ok(chunk)
}
