//! The compilation arena.
//!
//! A `Program` owns every scope and value produced by one lowering, plus
//! the builtin handle table installed into its root scope. Commands and
//! proxies refer into the arena by id, so the lowered IR is a plain data
//! structure: it can be serialized, dumped, and walked without reference
//! counting.

use serde::{Deserialize, Serialize};

use crate::builtins::{self, Builtins};

use super::{Scope, ScopeId, Value, ValueId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    scopes: Vec<Scope>,
    values: Vec<Value>,
    root: ScopeId,
    builtins: Builtins,
}

impl Program {
    /// Create a program whose root scope is seeded with the builtin types
    /// and functions.
    pub fn new() -> Self {
        let root = Scope::new(None).with_label("!ROOT");
        let mut program = Self {
            scopes: vec![root],
            values: Vec::new(),
            root: ScopeId(0),
            builtins: Builtins::default(),
        };
        program.builtins = builtins::install(&mut program);
        program
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    // ==================== Arena access ====================

    pub fn add_scope(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    pub fn add_value(&mut self, value: Value) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(value);
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.index()]
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn scope_ids(&self) -> impl Iterator<Item = ScopeId> + '_ {
        (0..self.scopes.len()).map(|i| ScopeId(i as u32))
    }

    pub fn value_ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        (0..self.values.len()).map(|i| ValueId(i as u32))
    }

    // ==================== Lookup ====================

    /// Resolve a variable name, walking parent scopes when `recurse`.
    pub fn lookup_var_from(
        &self,
        scope: ScopeId,
        name: &str,
        recurse: bool,
    ) -> Option<ValueId> {
        let s = self.scope(scope);
        if let Some(found) = s.lookup_local_var(name) {
            return Some(found);
        }
        match s.parent() {
            Some(parent) if recurse => self.lookup_var_from(parent, name, true),
            _ => None,
        }
    }

    pub fn lookup_var(&self, scope: ScopeId, name: &str) -> Option<ValueId> {
        self.lookup_var_from(scope, name, true)
    }

    /// Resolve a function name, walking parent scopes when `recurse`.
    pub fn lookup_func_from(
        &self,
        scope: ScopeId,
        name: &str,
        recurse: bool,
    ) -> Option<ScopeId> {
        let s = self.scope(scope);
        if let Some(found) = s.lookup_local_func(name) {
            return Some(found);
        }
        match s.parent() {
            Some(parent) if recurse => self.lookup_func_from(parent, name, true),
            _ => None,
        }
    }

    pub fn lookup_func(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        self.lookup_func_from(scope, name, true)
    }

    /// Resolve a type name, walking parent scopes when `recurse`.
    pub fn lookup_type_from(
        &self,
        scope: ScopeId,
        name: &str,
        recurse: bool,
    ) -> Option<&super::DataType> {
        let s = self.scope(scope);
        if let Some(found) = s.lookup_local_type(name) {
            return Some(found);
        }
        match s.parent() {
            Some(parent) if recurse => self.lookup_type_from(parent, name, true),
            _ => None,
        }
    }

    pub fn lookup_type(&self, scope: ScopeId, name: &str) -> Option<&super::DataType> {
        self.lookup_type_from(scope, name, true)
    }

    // ==================== Proxy resolution ====================

    /// Follow a proxy chain to its owning tail.
    ///
    /// Returns the terminal value and the accumulated byte offset into its
    /// storage. A chain longer than the arena cannot terminate; that is a
    /// lowering bug and panics.
    pub fn real_value(&self, id: ValueId) -> (ValueId, usize) {
        let mut current = id;
        let mut offset = 0usize;
        let mut hops = 0usize;
        loop {
            match self.value(current).storage() {
                super::Storage::Owned(_) => return (current, offset),
                super::Storage::Proxy {
                    target,
                    byte_offset,
                } => {
                    offset += byte_offset;
                    current = *target;
                    hops += 1;
                    assert!(
                        hops <= self.values.len(),
                        "proxy chain starting at {} does not terminate",
                        id
                    );
                }
            }
        }
    }

    /// A value's known flag, read through any proxy chain.
    pub fn value_known(&self, id: ValueId) -> bool {
        let (real, _) = self.real_value(id);
        self.value(real).known_flag()
    }

    // ==================== Debug dump ====================

    /// Stable textual dump of the whole scope tree.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.scope_repr_into(self.root, 0, &mut out);
        out
    }

    fn value_repr(&self, id: ValueId) -> String {
        let value = self.value(id);
        let mut repr = format!("{}: {}", id, value.ty());
        if let Some(label) = value.label() {
            repr.push_str(&format!(" `{}`", label));
        }
        if value.is_proxy() {
            let (real, offset) = self.real_value(id);
            repr.push_str(&format!(" -> {}+{}", real, offset));
        } else if value.known_flag() {
            let bytes = value.bytes().unwrap();
            repr.push_str(&format!(" = {}", value.ty().format_value(bytes)));
        }
        repr
    }

    fn command_repr(&self, command: &super::Command) -> String {
        let callee = self.scope(command.callee());
        let name = callee.label().unwrap_or("?");
        let ins: Vec<String> = command.inputs().iter().map(|v| v.to_string()).collect();
        let outs: Vec<String> = command
            .outputs()
            .iter()
            .map(|slot| match slot {
                Some(v) => v.to_string(),
                None => "_".to_string(),
            })
            .collect();
        let mut repr = format!(
            "call {} `{}` ({}) -> ({})",
            command.callee(),
            name,
            ins.join(", "),
            outs.join(", ")
        );
        if let Some(aug) = command.augmentation() {
            let aug_repr = match aug {
                super::Augmentation::DoIf { condition } => format!("do_if {}", condition),
                super::Augmentation::DoIfNot { condition } => {
                    format!("do_if_not {}", condition)
                }
                super::Augmentation::LoopFor { counter, iterable } => {
                    format!("loop_for {} in {}", counter, iterable)
                }
                super::Augmentation::LoopRange {
                    counter,
                    start,
                    end,
                    step,
                } => format!("loop_range {} in {}..{} by {}", counter, start, end, step),
            };
            repr.push_str(&format!(" [{}]", aug_repr));
        }
        repr
    }

    fn scope_repr_into(&self, id: ScopeId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let scope = self.scope(id);
        let ins: Vec<String> = scope.ins().iter().map(|v| v.to_string()).collect();
        let outs: Vec<String> = scope.outs().iter().map(|v| v.to_string()).collect();
        out.push_str(&format!(
            "{}scope {} `{}` ins=[{}] outs=[{}]\n",
            indent,
            id,
            scope.label().unwrap_or(""),
            ins.join(", "),
            outs.join(", ")
        ));
        for (name, ty) in scope.types() {
            out.push_str(&format!("{}  type {} = {}\n", indent, name, ty));
        }
        for (name, value) in scope.vars() {
            out.push_str(&format!(
                "{}  var {} = {}\n",
                indent,
                name,
                self.value_repr(*value)
            ));
        }
        for value in scope.temp_vars() {
            out.push_str(&format!("{}  tmp {}\n", indent, self.value_repr(*value)));
        }
        for command in scope.commands() {
            out.push_str(&format!("{}  {}\n", indent, self.command_repr(command)));
        }
        for (name, func) in scope.funcs() {
            // Builtins have no parent link back into the tree; dumping
            // their signatures at every scope would drown the output.
            if self.scope(*func).parent().is_none() && *func != self.root {
                out.push_str(&format!("{}  func {} = {} (builtin)\n", indent, name, func));
            } else {
                out.push_str(&format!("{}  func {}:\n", indent, name));
                self.scope_repr_into(*func, depth + 2, out);
            }
        }
        for func in scope.temp_funcs() {
            out.push_str(&format!("{}  temp func:\n", indent));
            self.scope_repr_into(*func, depth + 2, out);
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}
