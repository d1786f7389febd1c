//! Shared helpers for integration tests.
//!
//! Each integration test binary compiles this module separately and uses
//! its own subset of the helpers.
#![allow(dead_code)]

use waveguide::{lower_source, Interpreter, Program, RunOutcome, ValueId};

/// Lower source text, panicking with the error message on failure.
pub fn lower(source: &str) -> Program {
    lower_source(source).unwrap_or_else(|e| panic!("lowering failed: {}", e))
}

/// Lower and interpret, returning the run outcome.
pub fn run(source: &str) -> RunOutcome {
    let program = lower(source);
    Interpreter::new(&program)
        .run()
        .unwrap_or_else(|e| panic!("interpretation failed: {}", e))
}

/// Interpret and read a root-scope variable as an `i32`.
pub fn root_int(source: &str, name: &str) -> i32 {
    with_root_var(source, name, |interp, id| interp.read_i32(id).unwrap())
}

/// Interpret and read a root-scope variable as an `f32`.
pub fn root_float(source: &str, name: &str) -> f32 {
    with_root_var(source, name, |interp, id| interp.read_f32(id).unwrap())
}

/// Interpret and read a root-scope variable's raw bytes.
pub fn root_bytes(source: &str, name: &str) -> Vec<u8> {
    with_root_var(source, name, |interp, id| interp.read_bytes(id).unwrap())
}

fn with_root_var<T>(
    source: &str,
    name: &str,
    read: impl FnOnce(&Interpreter<'_>, ValueId) -> T,
) -> T {
    let program = lower(source);
    let mut interp = Interpreter::new(&program);
    interp
        .run()
        .unwrap_or_else(|e| panic!("interpretation failed: {}", e));
    let id = program
        .lookup_var(program.root(), name)
        .unwrap_or_else(|| panic!("no root variable `{}`", name));
    read(&interp, id)
}

/// Interpret a program with a `main` and read its first output as `i32`.
pub fn main_int(source: &str) -> i32 {
    let outcome = run(source);
    let bytes = outcome
        .main_outputs
        .first()
        .expect("main declared no outputs");
    i32::from_le_bytes(bytes[0..4].try_into().unwrap())
}

pub fn int_bytes(values: &[i32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn float_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
