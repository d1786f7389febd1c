//! Rust API for programmatic use: compile-and-run helpers over the
//! pipeline and interpreter.

use crate::interp::{Interpreter, RunError, RunOutcome};
use crate::pipeline::{self, PipelineError};

/// Error from compiling or executing a program.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecError {
    Pipeline(PipelineError),
    Run(RunError),
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Pipeline(e) => write!(f, "{}", e),
            ExecError::Run(e) => write!(f, "runtime error: {}", e),
        }
    }
}

impl std::error::Error for ExecError {}

/// Compile and interpret `source`, returning the interpreter's `log`
/// output joined with newlines.
pub fn compile_and_run_str(source: &str) -> Result<String, ExecError> {
    let outcome = compile_and_run(source)?;
    Ok(outcome.log.join("\n"))
}

/// Compile and interpret `source`, returning the full run outcome.
pub fn compile_and_run(source: &str) -> Result<RunOutcome, ExecError> {
    let program = pipeline::lower_source(source).map_err(ExecError::Pipeline)?;
    let mut interpreter = Interpreter::new(&program);
    interpreter.run().map_err(ExecError::Run)
}

/// Compile `source` and serialize the lowered IR to pretty-printed JSON.
pub fn compile_to_ir_json(source: &str) -> Result<String, PipelineError> {
    let program = pipeline::lower_source(source)?;
    Ok(serde_json::to_string_pretty(&program).expect("IR serialization cannot fail"))
}
