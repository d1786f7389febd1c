//! Pipeline logic for parsing and lowering Waveguide source code.
//!
//! Waveguide source → Parser → AST → Lowering → IR `Program`.

use waveguide_parser::ParseError;

use crate::error::LowerError;
use crate::ir::Program;
use crate::lowering;

/// Error variants produced by the parse-and-lower pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Source text failed to parse.
    Parse(ParseError),
    /// Lowering to IR failed.
    Lower(LowerError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Parse(e) => write!(f, "parse error: {}", e),
            PipelineError::Lower(e) => write!(f, "lowering error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Parse(e) => Some(e),
            PipelineError::Lower(e) => Some(e),
        }
    }
}

/// Result of parsing and lowering Waveguide source code.
pub type PipelineResult = Result<Program, PipelineError>;

/// Parse and lower source text into an IR program.
pub fn lower_source(source: &str) -> PipelineResult {
    let ast = waveguide_parser::parse(source).map_err(PipelineError::Parse)?;
    lowering::lower_program(&ast).map_err(PipelineError::Lower)
}
