//! Statement lowering.

use waveguide_parser::ast;

use crate::error::LowerError;
use crate::ir::{Augmentation, Command, Scope, ScopeId, Value};

use super::{expr, LowerResult, Lowerer};

/// Lower a block with the hoisting contract: every function declaration in
/// the block (and any surrounding lambda list) is registered before any
/// statement is lowered, and bodies are lowered only after the whole block
/// has been visited. A call may therefore name a function declared later
/// in the same block, and sibling functions resolve regardless of textual
/// order.
pub(crate) fn lower_block(
    l: &mut Lowerer<'_>,
    lambdas: &[ast::FunctionDec],
    statements: &[ast::Statement],
) -> LowerResult<()> {
    let mut declared: Vec<(&ast::FunctionDec, ScopeId)> = Vec::new();
    for dec in lambdas {
        let scope = declare_function(l, dec)?;
        declared.push((dec, scope));
    }
    for statement in statements {
        if let ast::Statement::FunctionDec(dec) = statement {
            let scope = declare_function(l, dec)?;
            declared.push((dec, scope));
        }
    }
    for statement in statements {
        if !matches!(statement, ast::Statement::FunctionDec(_)) {
            lower_statement(l, statement)?;
        }
    }
    for (dec, scope) in declared {
        l.in_scope(scope, |l| lower_block(l, &dec.lambdas, &dec.body))?;
    }
    Ok(())
}

fn lower_statement(l: &mut Lowerer<'_>, statement: &ast::Statement) -> LowerResult<()> {
    match statement {
        ast::Statement::FunctionCall(call) => {
            expr::lower_call(l, call)?;
            Ok(())
        }
        ast::Statement::Assign(assign) => {
            let value = expr::lower_expression(l, &assign.value)?;
            expr::lower_write_access(l, &assign.target, value)
        }
        ast::Statement::VarDec(dec) => lower_var_dec(l, dec),
        ast::Statement::Return(ret) => lower_return(l, ret),
        ast::Statement::Branch(branch) => lower_branch(l, branch),
        ast::Statement::ForEach(each) => lower_for_each(l, each),
        ast::Statement::While(_) => Err(LowerError::Unsupported("while loop".to_string())),
        ast::Statement::FunctionDec(_) => {
            unreachable!("function declarations are hoisted by lower_block")
        }
    }
}

/// Register a function's signature without touching its body. The child
/// scope's parameter lists are captured through the auto-add modes as each
/// parameter is declared.
fn declare_function(l: &mut Lowerer<'_>, dec: &ast::FunctionDec) -> LowerResult<ScopeId> {
    let scope = l
        .program
        .add_scope(Scope::new(Some(l.scope)).with_label(&dec.name));

    l.in_scope(scope, |l| {
        l.program.scope_mut(scope).auto_add_inputs();
        for param in &dec.inputs {
            declare_parameter(l, scope, param)?;
        }
        l.program.scope_mut(scope).auto_add_outputs();
        for param in &dec.outputs {
            declare_parameter(l, scope, param)?;
        }
        l.program.scope_mut(scope).auto_add_none();
        Ok(())
    })?;

    l.program
        .scope_mut(l.scope)
        .declare_func(&dec.name, scope);
    Ok(scope)
}

fn declare_parameter(
    l: &mut Lowerer<'_>,
    scope: ScopeId,
    param: &ast::Parameter,
) -> LowerResult<()> {
    let ty = expr::resolve_data_type(l, &param.ty)?;
    let value = l
        .program
        .add_value(Value::new(ty).with_label(&param.name));
    l.program.scope_mut(scope).declare_var(&param.name, value);
    Ok(())
}

fn lower_var_dec(l: &mut Lowerer<'_>, dec: &ast::VarDecStatement) -> LowerResult<()> {
    let ty = expr::resolve_data_type(l, &dec.ty)?;
    for declarator in &dec.decs {
        let value = l
            .program
            .add_value(Value::new(ty.clone()).with_label(&declarator.name));
        l.program
            .scope_mut(l.scope)
            .declare_var(&declarator.name, value);
        if let Some(init) = &declarator.init {
            let init_value = expr::lower_expression(l, init)?;
            let zero = l.int_literal(0);
            l.emit_copy(init_value, zero, value);
        }
    }
    Ok(())
}

fn lower_return(l: &mut Lowerer<'_>, ret: &ast::ReturnStatement) -> LowerResult<()> {
    let value = expr::lower_expression(l, &ret.value)?;
    let slot = l.lookup_var("return")?;
    let zero = l.int_literal(0);
    l.emit_copy(value, zero, slot);
    l.add_command(Command::new(l.program.builtins().ret));
    Ok(())
}

fn lower_branch(l: &mut Lowerer<'_>, branch: &ast::Branch) -> LowerResult<()> {
    let condition = expr::lower_expression(l, &branch.condition)?;

    let if_true = l.program.add_scope(Scope::new(Some(l.scope)));
    l.program.scope_mut(l.scope).declare_temp_func(if_true);
    l.in_scope(if_true, |l| lower_block(l, &[], &branch.if_true))?;
    l.add_command(Command::with_augmentation(
        if_true,
        Augmentation::DoIf { condition },
    ));

    if !branch.if_false.is_empty() {
        let if_false = l.program.add_scope(Scope::new(Some(l.scope)));
        l.program.scope_mut(l.scope).declare_temp_func(if_false);
        l.in_scope(if_false, |l| lower_block(l, &[], &branch.if_false))?;
        l.add_command(Command::with_augmentation(
            if_false,
            Augmentation::DoIfNot { condition },
        ));
    }
    Ok(())
}

/// For-each lowering. The iterables are evaluated up front (the counter's
/// type is the first one's element type), then the loop unrolls: known
/// arrays feed the body through element views sharing the array's bytes,
/// unknown arrays through per-index `COPY` temporaries, and scalars are
/// passed through as a single call.
fn lower_for_each(l: &mut Lowerer<'_>, each: &ast::ForEach) -> LowerResult<()> {
    let mut values = Vec::new();
    for value in &each.values {
        values.push(expr::lower_expression(l, value)?);
    }

    let first_ty = l.program.value(values[0]).ty().clone();
    let counter_ty = first_ty.element_type().cloned().unwrap_or(first_ty);

    let body = l.program.add_scope(Scope::new(Some(l.scope)));
    l.program.scope_mut(l.scope).declare_temp_func(body);
    let counter = l
        .program
        .add_value(Value::new(counter_ty).with_label(&each.counter));
    l.program.scope_mut(body).declare_var(&each.counter, counter);
    l.program.scope_mut(body).add_in(counter);
    l.in_scope(body, |l| lower_block(l, &[], &each.body))?;

    for value in values {
        let ty = l.program.value(value).ty().clone();
        let Some(element) = ty.element_type().cloned() else {
            // Scalar iterable: one call with the value itself.
            let mut call = Command::new(body);
            call.add_input(value);
            l.add_command(call);
            continue;
        };
        let len = ty.array_len().unwrap();
        // A proxy array holds one element's bytes for every index.
        let stride = if ty.is_proxy() { 0 } else { element.byte_len() };
        if l.program.value_known(value) {
            for i in 0..len {
                let view =
                    l.add_temp_value(Value::element_view(element.clone(), value, i * stride));
                let mut call = Command::new(body);
                call.add_input(view);
                l.add_command(call);
            }
        } else {
            for i in 0..len {
                let temp = l.add_temp_value(Value::new(element.clone()));
                let offset = l.int_literal((i * stride) as i32);
                l.emit_copy(value, offset, temp);
                let mut call = Command::new(body);
                call.add_input(temp);
                l.add_command(call);
            }
        }
    }
    Ok(())
}
