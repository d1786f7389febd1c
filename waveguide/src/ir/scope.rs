//! Scopes and commands: the IR's unit of containment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DataType, ScopeId, ValueId};

/// Control-flow decoration on a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Augmentation {
    /// Run the command only if the condition holds.
    DoIf { condition: ValueId },
    /// Run the command only if the condition does not hold.
    DoIfNot { condition: ValueId },
    /// Run the command once per element of `iterable`, with the element
    /// written into `counter` first.
    LoopFor { counter: ValueId, iterable: ValueId },
    /// Run the command for `counter` in `start..end` stepping by `step`.
    LoopRange {
        counter: ValueId,
        start: ValueId,
        end: ValueId,
        step: ValueId,
    },
}

/// One IR instruction: a callee with input and output value references.
///
/// Output slots may be `None` when a call site explicitly discards a
/// result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    callee: ScopeId,
    ins: Vec<ValueId>,
    outs: Vec<Option<ValueId>>,
    aug: Option<Augmentation>,
}

impl Command {
    pub fn new(callee: ScopeId) -> Self {
        Self {
            callee,
            ins: Vec::new(),
            outs: Vec::new(),
            aug: None,
        }
    }

    pub fn with_augmentation(callee: ScopeId, aug: Augmentation) -> Self {
        Self {
            callee,
            ins: Vec::new(),
            outs: Vec::new(),
            aug: Some(aug),
        }
    }

    pub fn add_input(&mut self, input: ValueId) {
        self.ins.push(input);
    }

    pub fn add_output(&mut self, output: Option<ValueId>) {
        self.outs.push(output);
    }

    pub fn callee(&self) -> ScopeId {
        self.callee
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.ins
    }

    pub fn outputs(&self) -> &[Option<ValueId>] {
        &self.outs
    }

    pub fn augmentation(&self) -> Option<&Augmentation> {
        self.aug.as_ref()
    }
}

/// Auto-add mode: while active, each variable declaration also appends to
/// the scope's declared inputs or outputs. This is how function parameter
/// lists are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutoAdd {
    #[default]
    None,
    Inputs,
    Outputs,
}

/// A symbol table plus command list plus declared I/O signature.
///
/// Function scopes carry declared input/output lists and may be invoked as
/// command callees; the root scope has empty lists and is never called.
/// Branch and loop bodies are *temporary* scopes: owned by their parent
/// but not named in any table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    parent: Option<ScopeId>,
    label: Option<String>,
    funcs: BTreeMap<String, ScopeId>,
    vars: BTreeMap<String, ValueId>,
    types: BTreeMap<String, DataType>,
    temp_funcs: Vec<ScopeId>,
    temp_vars: Vec<ValueId>,
    commands: Vec<Command>,
    ins: Vec<ValueId>,
    outs: Vec<ValueId>,
    auto_add: AutoAdd,
}

impl Scope {
    pub fn new(parent: Option<ScopeId>) -> Self {
        Self {
            parent,
            label: None,
            funcs: BTreeMap::new(),
            vars: BTreeMap::new(),
            types: BTreeMap::new(),
            temp_funcs: Vec::new(),
            temp_vars: Vec::new(),
            commands: Vec::new(),
            ins: Vec::new(),
            outs: Vec::new(),
            auto_add: AutoAdd::None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Insert a named function. Returns the previously bound scope, if any.
    pub fn declare_func(&mut self, name: impl Into<String>, body: ScopeId) -> Option<ScopeId> {
        self.funcs.insert(name.into(), body)
    }

    pub fn declare_temp_func(&mut self, body: ScopeId) {
        self.temp_funcs.push(body);
    }

    /// Insert a named variable. While an auto-add mode is active the value
    /// is also appended to the declared inputs or outputs.
    pub fn declare_var(&mut self, name: impl Into<String>, value: ValueId) -> Option<ValueId> {
        match self.auto_add {
            AutoAdd::None => {}
            AutoAdd::Inputs => self.ins.push(value),
            AutoAdd::Outputs => self.outs.push(value),
        }
        self.vars.insert(name.into(), value)
    }

    pub fn declare_temp_var(&mut self, value: ValueId) {
        self.temp_vars.push(value);
    }

    /// Insert a named type. Returns the previously bound type, if any.
    pub fn declare_type(&mut self, name: impl Into<String>, ty: DataType) -> Option<DataType> {
        self.types.insert(name.into(), ty)
    }

    pub fn add_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn lookup_local_func(&self, name: &str) -> Option<ScopeId> {
        self.funcs.get(name).copied()
    }

    pub fn lookup_local_var(&self, name: &str) -> Option<ValueId> {
        self.vars.get(name).copied()
    }

    pub fn lookup_local_type(&self, name: &str) -> Option<&DataType> {
        self.types.get(name)
    }

    pub fn funcs(&self) -> &BTreeMap<String, ScopeId> {
        &self.funcs
    }

    pub fn vars(&self) -> &BTreeMap<String, ValueId> {
        &self.vars
    }

    pub fn types(&self) -> &BTreeMap<String, DataType> {
        &self.types
    }

    pub fn temp_funcs(&self) -> &[ScopeId] {
        &self.temp_funcs
    }

    pub fn temp_vars(&self) -> &[ValueId] {
        &self.temp_vars
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn add_in(&mut self, value: ValueId) {
        self.ins.push(value);
    }

    pub fn add_out(&mut self, value: ValueId) {
        self.outs.push(value);
    }

    pub fn ins(&self) -> &[ValueId] {
        &self.ins
    }

    pub fn outs(&self) -> &[ValueId] {
        &self.outs
    }

    pub fn auto_add_inputs(&mut self) {
        self.auto_add = AutoAdd::Inputs;
    }

    pub fn auto_add_outputs(&mut self) {
        self.auto_add = AutoAdd::Outputs;
    }

    pub fn auto_add_none(&mut self) {
        self.auto_add = AutoAdd::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_add_captures_parameter_lists() {
        let mut scope = Scope::new(None);
        scope.auto_add_inputs();
        scope.declare_var("a", ValueId(0));
        scope.declare_var("b", ValueId(1));
        scope.auto_add_outputs();
        scope.declare_var("x", ValueId(2));
        scope.auto_add_none();
        scope.declare_var("local", ValueId(3));

        assert_eq!(scope.ins(), &[ValueId(0), ValueId(1)]);
        assert_eq!(scope.outs(), &[ValueId(2)]);
        assert_eq!(scope.lookup_local_var("local"), Some(ValueId(3)));
    }

    #[test]
    fn test_declare_returns_previous_binding() {
        let mut scope = Scope::new(None);
        assert_eq!(scope.declare_var("a", ValueId(0)), None);
        assert_eq!(scope.declare_var("a", ValueId(1)), Some(ValueId(0)));
        assert_eq!(scope.lookup_local_var("a"), Some(ValueId(1)));
    }
}
