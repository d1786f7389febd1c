//! The builtin registry.
//!
//! A process-wide catalog describes every builtin once: its internal name,
//! optional user-facing alias, and input/output signature in terms of the
//! wildcard types. Installing the catalog into a fresh [`Program`] seeds
//! the root scope with the primitive type names and one bodiless function
//! scope per builtin, and returns the [`Builtins`] handle table the
//! interpreter uses for identity dispatch.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::ir::{DataType, Program, Scope, ScopeId, Value};

/// Wildcard substituted via `bigger_of` over a call's inputs.
pub const UPCAST_WILDCARD: &str = "UPCAST_WILDCARD";
/// Wildcard substituted with the matching input's type verbatim.
pub const ANY_WILDCARD: &str = "ANY_WILDCARD";

pub fn upcast_wildcard() -> DataType {
    DataType::Abstract(UPCAST_WILDCARD.to_string())
}

pub fn any_wildcard() -> DataType {
    DataType::Abstract(ANY_WILDCARD.to_string())
}

/// One row of the builtin catalog.
#[derive(Debug)]
pub struct BuiltinSpec {
    /// Internal name, always `!`-prefixed.
    pub name: &'static str,
    /// User-facing alias, registered alongside the internal name.
    pub alias: Option<&'static str>,
    pub ins: Vec<(&'static str, DataType)>,
    pub outs: Vec<(&'static str, DataType)>,
}

/// The shared, immutable builtin catalog. Initialized once per process and
/// read-only across compilations.
pub fn catalog() -> &'static [BuiltinSpec] {
    static CATALOG: Lazy<Vec<BuiltinSpec>> = Lazy::new(build_catalog);
    &CATALOG
}

fn build_catalog() -> Vec<BuiltinSpec> {
    let spec = |name, alias, ins, outs| BuiltinSpec {
        name,
        alias,
        ins,
        outs,
    };
    let binary = |name, operand: fn() -> DataType, result: fn() -> DataType| {
        spec(
            name,
            None,
            vec![("a", operand()), ("b", operand())],
            vec![("x", result())],
        )
    };
    let convert = |name, from: DataType, to: DataType| {
        spec(name, None, vec![("a", from)], vec![("x", to)])
    };
    let marker = |name| spec(name, None, vec![], vec![]);

    vec![
        // Arithmetic
        binary("!ADD", upcast_wildcard, upcast_wildcard),
        binary("!MUL", upcast_wildcard, upcast_wildcard),
        binary("!MOD", upcast_wildcard, upcast_wildcard),
        spec(
            "!RECIP",
            None,
            vec![("a", DataType::Float)],
            vec![("x", DataType::Float)],
        ),
        // Comparison
        binary("!EQ", upcast_wildcard, || DataType::Bool),
        binary("!NEQ", upcast_wildcard, || DataType::Bool),
        binary("!LTE", upcast_wildcard, || DataType::Bool),
        binary("!GTE", upcast_wildcard, || DataType::Bool),
        binary("!LT", upcast_wildcard, || DataType::Bool),
        binary("!GT", upcast_wildcard, || DataType::Bool),
        // Boolean
        binary("!AND", || DataType::Bool, || DataType::Bool),
        binary("!OR", || DataType::Bool, || DataType::Bool),
        binary("!XOR", || DataType::Bool, || DataType::Bool),
        // Bitwise
        binary("!BAND", upcast_wildcard, upcast_wildcard),
        binary("!BOR", upcast_wildcard, upcast_wildcard),
        binary("!BXOR", upcast_wildcard, upcast_wildcard),
        // Conversions
        convert("!ITOF", DataType::Int, DataType::Float),
        convert("!FTOI", DataType::Float, DataType::Int),
        convert("!BTOF", DataType::Bool, DataType::Float),
        convert("!BTOI", DataType::Bool, DataType::Int),
        convert("!ITOB", DataType::Int, DataType::Bool),
        convert("!FTOB", DataType::Float, DataType::Bool),
        // Bulk byte copy. With equal sizes OFFSET is zero and the whole
        // value moves; otherwise min(src, dst) bytes are transferred and
        // OFFSET indexes into the larger side.
        spec(
            "!COPY",
            None,
            vec![("a", any_wildcard()), ("offset", DataType::Int)],
            vec![("x", any_wildcard())],
        ),
        spec("!LOG", Some("log"), vec![("a", any_wildcard())], vec![]),
        // Control markers: sinks recognized by the interpreter and the
        // augmentation rewriter.
        marker("!RETURN"),
        marker("!IF"),
        marker("!FOR"),
        marker("!FOR_EACH"),
        marker("!WHILE"),
        marker("!DEF"),
    ]
}

/// Handles to the builtin scopes installed in one program's root scope.
///
/// Identity dispatch in the interpreter is `ScopeId` equality against this
/// table. `Default` produces an uninstalled placeholder that
/// `Program::new` replaces immediately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Builtins {
    pub add: ScopeId,
    pub mul: ScopeId,
    pub modulo: ScopeId,
    pub recip: ScopeId,
    pub eq: ScopeId,
    pub neq: ScopeId,
    pub lte: ScopeId,
    pub gte: ScopeId,
    pub lt: ScopeId,
    pub gt: ScopeId,
    pub and_: ScopeId,
    pub or_: ScopeId,
    pub xor_: ScopeId,
    pub band: ScopeId,
    pub bor: ScopeId,
    pub bxor: ScopeId,
    pub itof: ScopeId,
    pub ftoi: ScopeId,
    pub btof: ScopeId,
    pub btoi: ScopeId,
    pub itob: ScopeId,
    pub ftob: ScopeId,
    pub copy: ScopeId,
    pub log: ScopeId,
    pub ret: ScopeId,
    pub if_: ScopeId,
    pub for_: ScopeId,
    pub for_each: ScopeId,
    pub while_: ScopeId,
    pub def: ScopeId,
}

impl Builtins {
    /// The five callees whose commands fold two *or more* inputs: the
    /// operator-list join rule appends operands past the declared arity.
    pub fn is_variadic(&self, id: ScopeId) -> bool {
        id == self.add || id == self.mul || id == self.band || id == self.bor || id == self.bxor
    }
}

/// Seed `program`'s root scope from the catalog.
pub(crate) fn install(program: &mut Program) -> Builtins {
    let root = program.root();

    program.scope_mut(root).declare_type("Int", DataType::Int);
    program.scope_mut(root).declare_type("Float", DataType::Float);
    program.scope_mut(root).declare_type("Bool", DataType::Bool);
    program
        .scope_mut(root)
        .declare_type("!UPCAST_WILDCARD", upcast_wildcard());
    program
        .scope_mut(root)
        .declare_type("!ANY_WILDCARD", any_wildcard());

    for spec in catalog() {
        let scope = program.add_scope(Scope::new(None).with_label(spec.name));
        program.scope_mut(scope).auto_add_inputs();
        for (name, ty) in &spec.ins {
            let value = program.add_value(Value::new(ty.clone()).with_label(*name));
            program.scope_mut(scope).declare_var(*name, value);
        }
        program.scope_mut(scope).auto_add_outputs();
        for (name, ty) in &spec.outs {
            let value = program.add_value(Value::new(ty.clone()).with_label(*name));
            program.scope_mut(scope).declare_var(*name, value);
        }
        program.scope_mut(scope).auto_add_none();

        program.scope_mut(root).declare_func(spec.name, scope);
        if let Some(alias) = spec.alias {
            program.scope_mut(root).declare_func(alias, scope);
        }
    }

    let find = |name: &str| {
        program
            .scope(root)
            .lookup_local_func(name)
            .expect("builtin was just installed")
    };
    Builtins {
        add: find("!ADD"),
        mul: find("!MUL"),
        modulo: find("!MOD"),
        recip: find("!RECIP"),
        eq: find("!EQ"),
        neq: find("!NEQ"),
        lte: find("!LTE"),
        gte: find("!GTE"),
        lt: find("!LT"),
        gt: find("!GT"),
        and_: find("!AND"),
        or_: find("!OR"),
        xor_: find("!XOR"),
        band: find("!BAND"),
        bor: find("!BOR"),
        bxor: find("!BXOR"),
        itof: find("!ITOF"),
        ftoi: find("!FTOI"),
        btof: find("!BTOF"),
        btoi: find("!BTOI"),
        itob: find("!ITOB"),
        ftob: find("!FTOB"),
        copy: find("!COPY"),
        log: find("!LOG"),
        ret: find("!RETURN"),
        if_: find("!IF"),
        for_: find("!FOR"),
        for_each: find("!FOR_EACH"),
        while_: find("!WHILE"),
        def: find("!DEF"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_arities() {
        let by_name = |name: &str| {
            catalog()
                .iter()
                .find(|spec| spec.name == name)
                .expect("catalog entry")
        };
        assert_eq!(by_name("!ADD").ins.len(), 2);
        assert_eq!(by_name("!ADD").outs.len(), 1);
        assert_eq!(by_name("!RECIP").ins.len(), 1);
        assert_eq!(by_name("!COPY").ins.len(), 2);
        assert_eq!(by_name("!LOG").outs.len(), 0);
        assert_eq!(by_name("!RETURN").ins.len(), 0);
    }

    #[test]
    fn test_install_registers_both_names() {
        let program = Program::new();
        let root = program.root();
        let internal = program.scope(root).lookup_local_func("!LOG");
        let alias = program.scope(root).lookup_local_func("log");
        assert_eq!(internal, alias);
        assert!(internal.is_some());
    }

    #[test]
    fn test_installed_signatures_use_auto_add() {
        let program = Program::new();
        let add = program.builtins().add;
        let scope = program.scope(add);
        assert_eq!(scope.ins().len(), 2);
        assert_eq!(scope.outs().len(), 1);
        let out_ty = program.value(scope.outs()[0]).ty();
        assert_eq!(out_ty, &upcast_wildcard());
    }

    #[test]
    fn test_comparison_outputs_bool() {
        let program = Program::new();
        let gt = program.builtins().gt;
        let out = program.scope(gt).outs()[0];
        assert_eq!(program.value(out).ty(), &DataType::Bool);
    }

    #[test]
    fn test_types_seeded_into_root() {
        let program = Program::new();
        let root = program.root();
        assert_eq!(
            program.scope(root).lookup_local_type("Int"),
            Some(&DataType::Int)
        );
        assert_eq!(
            program.scope(root).lookup_local_type("!ANY_WILDCARD"),
            Some(&any_wildcard())
        );
    }
}
