//! AST-to-IR lowering.
//!
//! A tree-walking visitor that consumes parsed statements and emits
//! commands into the current scope. The walk holds one mutable cursor (the
//! current scope handle); expression lowering returns the value holding
//! each result. Statement lists are lowered in two passes so that function
//! bodies can reference siblings declared later in the same block.

pub mod expr;
pub mod stmt;

use waveguide_parser::ast;

use crate::error::LowerError;
use crate::ir::{Command, Program, ScopeId, Value, ValueId};

pub type LowerResult<T> = Result<T, LowerError>;

/// Lower a parsed program into a fresh IR arena.
///
/// On success the returned program's root scope holds the top-level
/// commands and every declared function.
pub fn lower_program(statements: &[ast::Statement]) -> LowerResult<Program> {
    let mut program = Program::new();
    let root = program.root();
    Lowerer::new(&mut program, root).lower_block(statements)?;
    Ok(program)
}

/// The lowering cursor: the arena under construction plus the scope
/// commands are currently emitted into.
#[derive(Debug)]
pub struct Lowerer<'p> {
    pub(crate) program: &'p mut Program,
    pub(crate) scope: ScopeId,
}

impl<'p> Lowerer<'p> {
    pub fn new(program: &'p mut Program, scope: ScopeId) -> Self {
        Self { program, scope }
    }

    /// Run `f` with the cursor moved into `scope`, restoring it after.
    pub(crate) fn in_scope<T>(
        &mut self,
        scope: ScopeId,
        f: impl FnOnce(&mut Self) -> LowerResult<T>,
    ) -> LowerResult<T> {
        let saved = self.scope;
        self.scope = scope;
        let result = f(self);
        self.scope = saved;
        result
    }

    pub(crate) fn add_command(&mut self, command: Command) {
        self.program.scope_mut(self.scope).add_command(command);
    }

    /// Allocate a value owned by the current scope's temporary list.
    pub(crate) fn add_temp_value(&mut self, value: Value) -> ValueId {
        let id = self.program.add_value(value);
        self.program.scope_mut(self.scope).declare_temp_var(id);
        id
    }

    pub(crate) fn int_literal(&mut self, v: i32) -> ValueId {
        self.add_temp_value(Value::known_int(v))
    }

    /// Emit `COPY(src, offset) -> dst`.
    pub(crate) fn emit_copy(&mut self, src: ValueId, offset: ValueId, dst: ValueId) {
        let mut copy = Command::new(self.program.builtins().copy);
        copy.add_input(src);
        copy.add_input(offset);
        copy.add_output(Some(dst));
        self.add_command(copy);
    }

    /// Emit a builtin call writing into an existing slot.
    pub(crate) fn emit_into(&mut self, callee: ScopeId, ins: &[ValueId], out: ValueId) {
        let mut command = Command::new(callee);
        for &input in ins {
            command.add_input(input);
        }
        command.add_output(Some(out));
        self.add_command(command);
    }

    pub(crate) fn lookup_var(&self, name: &str) -> LowerResult<ValueId> {
        self.program
            .lookup_var(self.scope, name)
            .ok_or_else(|| LowerError::UndefinedVariable(name.to_string()))
    }

    pub(crate) fn lookup_func(&self, name: &str) -> LowerResult<ScopeId> {
        self.program
            .lookup_func(self.scope, name)
            .ok_or_else(|| LowerError::UndefinedFunction(name.to_string()))
    }

    pub(crate) fn lookup_type(&self, name: &str) -> LowerResult<crate::ir::DataType> {
        self.program
            .lookup_type(self.scope, name)
            .cloned()
            .ok_or_else(|| LowerError::UndefinedType(name.to_string()))
    }

    /// Lower a statement list with the two-pass hoisting contract.
    pub fn lower_block(&mut self, statements: &[ast::Statement]) -> LowerResult<()> {
        stmt::lower_block(self, &[], statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::DataType;

    fn lower(source: &str) -> Program {
        let ast = waveguide_parser::parse(source).expect("parse failed");
        lower_program(&ast).expect("lowering failed")
    }

    /// Commands in the root scope that call the given builtin.
    fn count_calls(program: &Program, callee: crate::ir::ScopeId) -> usize {
        program
            .scope(program.root())
            .commands()
            .iter()
            .filter(|c| c.callee() == callee)
            .count()
    }

    #[test]
    fn test_consecutive_additions_join_into_one_command() {
        let program = lower("Int a = 1 + 2 + 3;");
        let add = program.builtins().add;
        let command = program
            .scope(program.root())
            .commands()
            .iter()
            .find(|c| c.callee() == add)
            .expect("no ADD command");
        assert_eq!(command.inputs().len(), 3);
    }

    #[test]
    fn test_operator_change_breaks_the_run() {
        // 1 + 2 - 3 + 4: the run restarts at each operator change even
        // though every command calls ADD, so three ADD commands emit (plus
        // one MUL for the folded negation).
        let program = lower("Int a = 1 + 2 - 3 + 4;");
        assert_eq!(count_calls(&program, program.builtins().add), 3);
        assert_eq!(count_calls(&program, program.builtins().mul), 1);
    }

    #[test]
    fn test_subtraction_emits_nested_negation() {
        let program = lower("Int a = 5 - 2;");
        // One MUL(2, -1) feeding one ADD.
        assert_eq!(count_calls(&program, program.builtins().mul), 1);
        assert_eq!(count_calls(&program, program.builtins().add), 1);
    }

    #[test]
    fn test_division_emits_reciprocal() {
        let program = lower("Float a = 1.0 / 2.0;");
        assert_eq!(count_calls(&program, program.builtins().recip), 1);
        assert_eq!(count_calls(&program, program.builtins().mul), 1);
    }

    #[test]
    fn test_access_lowers_to_offset_arithmetic() {
        let program = lower("Int[3] xs = [1, 2, 3]; Int y = xs[2];");
        // The indexed read contributes MUL(index, stride) and
        // ADD(offset, scaled) -> offset.
        assert!(count_calls(&program, program.builtins().mul) >= 1);
        assert!(count_calls(&program, program.builtins().add) >= 1);
        let root = program.scope(program.root());
        // Offset and scaled-index temporaries are owned by the root scope.
        assert!(root
            .temp_vars()
            .iter()
            .any(|&v| program.value(v).ty() == &DataType::Int));
    }

    #[test]
    fn test_return_emits_sentinel_last() {
        let program = lower("def f():Int { return 3; }");
        let f = program.lookup_func(program.root(), "f").unwrap();
        let commands = program.scope(f).commands();
        let last = commands.last().expect("empty body");
        assert_eq!(last.callee(), program.builtins().ret);
    }

    #[test]
    fn test_temporaries_are_owned_by_the_emitting_scope() {
        let program = lower("def f():Int { return 1 + 2; }");
        let f = program.lookup_func(program.root(), "f").unwrap();
        assert!(!program.scope(f).temp_vars().is_empty());
    }
}
