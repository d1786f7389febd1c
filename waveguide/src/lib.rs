// Prevent accidental debug output in library code; `log(...)` output goes
// through the interpreter's log buffer instead.
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

// Core modules
pub mod builtins;
pub mod error;
pub mod ir;

// Lowering: AST -> IR
pub mod lowering;

// Tree-walking interpreter over the IR
pub mod interp;

// Pipeline: parse and lower Waveguide source
pub mod pipeline;

// Rust API for programmatic use
pub mod api;

// Re-exports
pub use api::{compile_and_run, compile_and_run_str, compile_to_ir_json, ExecError};
pub use builtins::Builtins;
pub use error::LowerError;
pub use interp::{Interpreter, RunError, RunOutcome};
pub use ir::{
    Augmentation, AutoAdd, Command, DataType, Program, Scope, ScopeId, Storage, Value, ValueId,
};
pub use lowering::{lower_program, Lowerer};
pub use pipeline::{lower_source, PipelineError, PipelineResult};
