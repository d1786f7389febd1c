//! Expression lowering.

use waveguide_parser::ast;

use crate::builtins::UPCAST_WILDCARD;
use crate::error::LowerError;
use crate::ir::{Command, DataType, ScopeId, Value, ValueId};

use super::{LowerResult, Lowerer};

/// The result of lowering `a[i][j]…` into offset arithmetic: the root
/// variable's value, the byte offset into it, and the type at the end of
/// the accessor chain.
#[derive(Debug)]
pub struct AccessResult {
    pub root: ValueId,
    pub offset: ValueId,
    pub final_ty: DataType,
}

pub(crate) fn lower_expression(
    l: &mut Lowerer<'_>,
    expression: &ast::Expression,
) -> LowerResult<ValueId> {
    match expression {
        ast::Expression::Int(v) => Ok(l.add_temp_value(Value::known_int(*v))),
        ast::Expression::Float(v) => Ok(l.add_temp_value(Value::known_float(*v))),
        ast::Expression::Bool(v) => Ok(l.add_temp_value(Value::known_bool(*v))),
        ast::Expression::Variable(access) => lower_read_access(l, access),
        ast::Expression::Signed(signed) => lower_signed(l, signed),
        ast::Expression::OperatorList(list) => lower_operator_list(l, list),
        ast::Expression::FunctionCall(call) => match lower_call(l, call)? {
            Some(value) => Ok(value),
            None => Err(LowerError::TypeMismatch(format!(
                "call to `{}` produces no value in expression position",
                call.name
            ))),
        },
        ast::Expression::ArrayLiteral(elements) => lower_array_literal(l, elements),
        ast::Expression::Range(range) => lower_range(l, range),
    }
}

/// `-x` lowers to `MUL(x, -1)`; `+x` passes through.
fn lower_signed(l: &mut Lowerer<'_>, signed: &ast::SignedExpression) -> LowerResult<ValueId> {
    let value = lower_expression(l, &signed.value)?;
    if !signed.negative {
        return Ok(value);
    }
    let minus_one = l.int_literal(-1);
    let mul = l.program.builtins().mul;
    emit_builtin(l, mul, vec![value, minus_one])
}

/// Map an operator to its builtin and join flag. Joined operators let
/// consecutive same-operator operands collapse into one running command.
fn op_builtin(l: &Lowerer<'_>, op: ast::BinaryOp) -> (ScopeId, bool) {
    let builtins = l.program.builtins();
    match op {
        ast::BinaryOp::Add | ast::BinaryOp::Sub => (builtins.add, true),
        ast::BinaryOp::Mul | ast::BinaryOp::Div => (builtins.mul, true),
        ast::BinaryOp::Mod => (builtins.modulo, false),
        ast::BinaryOp::Eq => (builtins.eq, false),
        ast::BinaryOp::Neq => (builtins.neq, false),
        ast::BinaryOp::Lte => (builtins.lte, false),
        ast::BinaryOp::Gte => (builtins.gte, false),
        ast::BinaryOp::Lt => (builtins.lt, false),
        ast::BinaryOp::Gt => (builtins.gt, false),
        ast::BinaryOp::And => (builtins.and_, false),
        ast::BinaryOp::Or => (builtins.or_, false),
        ast::BinaryOp::Xor => (builtins.xor_, false),
        ast::BinaryOp::Band => (builtins.band, true),
        ast::BinaryOp::Bor => (builtins.bor, true),
        ast::BinaryOp::Bxor => (builtins.bxor, true),
    }
}

/// Lower `start op1 v1 op2 v2 …`. While the next operator equals the last
/// and its builtin joins, the operand is appended to the running command;
/// otherwise the running command is finalized into a temporary and a new
/// one starts. Subtraction folds in as `ADD(prev, MUL(v, -1))`, division
/// as `MUL(prev, RECIP(v))`.
fn lower_operator_list(
    l: &mut Lowerer<'_>,
    list: &ast::OperatorList,
) -> LowerResult<ValueId> {
    let mut current = lower_expression(l, &list.start)?;
    let mut pending: Option<(ScopeId, Vec<ValueId>)> = None;
    let mut last_op: Option<ast::BinaryOp> = None;

    for operation in &list.operations {
        let (callee, join) = op_builtin(l, operation.op);
        let continues_run = pending.is_some() && join && last_op == Some(operation.op);
        if !continues_run {
            if let Some((prev_callee, ins)) = pending.take() {
                current = emit_builtin(l, prev_callee, ins)?;
            }
            pending = Some((callee, vec![current]));
        }

        let mut operand = lower_expression(l, &operation.value)?;
        operand = match operation.op {
            ast::BinaryOp::Sub => {
                let minus_one = l.int_literal(-1);
                let mul = l.program.builtins().mul;
                emit_builtin(l, mul, vec![operand, minus_one])?
            }
            ast::BinaryOp::Div => {
                let recip = l.program.builtins().recip;
                emit_builtin(l, recip, vec![operand])?
            }
            _ => operand,
        };
        pending
            .as_mut()
            .expect("a command is always running inside the loop")
            .1
            .push(operand);
        last_op = Some(operation.op);
    }

    if let Some((callee, ins)) = pending.take() {
        current = emit_builtin(l, callee, ins)?;
    }
    Ok(current)
}

/// Emit a builtin call into a fresh temporary whose type is the callee's
/// declared output with wildcards substituted, and return the temporary.
pub(crate) fn emit_builtin(
    l: &mut Lowerer<'_>,
    callee: ScopeId,
    ins: Vec<ValueId>,
) -> LowerResult<ValueId> {
    let out_ty = resolve_output_type(l, callee, 0, &ins);
    let out = l.add_temp_value(Value::new(out_ty));
    let mut command = Command::new(callee);
    for &input in &ins {
        command.add_input(input);
    }
    command.add_output(Some(out));
    l.add_command(command);
    Ok(out)
}

/// Substitute a wildcard declared output with a concrete type: the upcast
/// wildcard folds `bigger_of` over the inputs bound to it, any other
/// wildcard takes the first bound input's type verbatim. Joined commands
/// may carry more inputs than declared parameters; the extras bind to the
/// last parameter.
fn resolve_output_type(
    l: &Lowerer<'_>,
    callee: ScopeId,
    out_index: usize,
    ins: &[ValueId],
) -> DataType {
    let scope = l.program.scope(callee);
    let declared_ty = l.program.value(scope.outs()[out_index]).ty().clone();
    let DataType::Abstract(wildcard) = &declared_ty else {
        return declared_ty;
    };

    let declared_ins = scope.ins();
    let mut resolved: Option<DataType> = None;
    for (i, &input) in ins.iter().enumerate() {
        let declared_in = match declared_ins.get(i).or(declared_ins.last()) {
            Some(&id) => l.program.value(id).ty(),
            None => continue,
        };
        if declared_in != &declared_ty {
            continue;
        }
        let in_ty = l.program.value(input).ty().clone();
        resolved = Some(match resolved {
            None => in_ty,
            Some(acc) if wildcard == UPCAST_WILDCARD => DataType::bigger_of(&acc, &in_ty),
            Some(acc) => acc,
        });
    }

    match resolved {
        Some(ty) => owned_variant(ty),
        None => declared_ty,
    }
}

/// Output slots own their storage; a proxy wrapper inferred from a proxy
/// input becomes a plain array.
fn owned_variant(ty: DataType) -> DataType {
    match ty {
        DataType::ArrayProxy { element, len } => DataType::Array { element, len },
        other => other,
    }
}

/// Resolve a syntactic type reference. Array sizes wrap in source order
/// (the last written size is the outermost wrapper) and must be
/// compile-time constants; float sizes are floored.
pub(crate) fn resolve_data_type(
    l: &mut Lowerer<'_>,
    dte: &ast::DataTypeExpr,
) -> LowerResult<DataType> {
    let mut ty = l.lookup_type(&dte.name)?;
    for size in &dte.array_sizes {
        let value = lower_expression(l, size)?;
        if !l.program.value_known(value) {
            return Err(LowerError::NonConstant("array size".to_string()));
        }
        let len = known_scalar_i32(l, value)?;
        ty = DataType::array(ty, len.max(0) as usize);
    }
    Ok(ty)
}

// ==================== Variable and array access ====================

/// Lower an accessor chain into offset arithmetic.
///
/// With no accessors the offset is a known literal zero. Otherwise the
/// offset is a mutable temporary seeded with `COPY(0, 0)`, and each index
/// contributes `MUL(index, element.byte_len())` followed by
/// `ADD(offset, scaled) -> offset`.
pub(crate) fn lower_access(
    l: &mut Lowerer<'_>,
    access: &ast::VariableAccess,
) -> LowerResult<AccessResult> {
    let root = l.lookup_var(&access.name)?;
    let root_ty = l.program.value(root).ty().clone();

    if access.indexes.is_empty() {
        let offset = l.add_temp_value(Value::known_int(0));
        return Ok(AccessResult {
            root,
            offset,
            final_ty: root_ty,
        });
    }

    let offset = l.add_temp_value(Value::new(DataType::Int));
    let zero_src = l.int_literal(0);
    let zero_off = l.int_literal(0);
    l.emit_copy(zero_src, zero_off, offset);

    let mut ty = root_ty;
    for index in &access.indexes {
        let element = ty
            .element_type()
            .cloned()
            .ok_or_else(|| LowerError::TypeMismatch(format!("cannot index into `{}`", ty)))?;
        let index_value = lower_expression(l, index)?;
        let stride = l.int_literal(element.byte_len() as i32);
        let scaled = l.add_temp_value(Value::new(DataType::Int));
        let mul = l.program.builtins().mul;
        l.emit_into(mul, &[index_value, stride], scaled);
        let add = l.program.builtins().add;
        l.emit_into(add, &[offset, scaled], offset);
        ty = element;
    }

    Ok(AccessResult {
        root,
        offset,
        final_ty: ty,
    })
}

/// Read through an accessor chain. A bare name is the looked-up value
/// itself; an indexed access reads `COPY(root, offset)` into a fresh
/// temporary of the final type.
pub(crate) fn lower_read_access(
    l: &mut Lowerer<'_>,
    access: &ast::VariableAccess,
) -> LowerResult<ValueId> {
    if access.indexes.is_empty() {
        return l.lookup_var(&access.name);
    }
    let result = lower_access(l, access)?;
    let out = l.add_temp_value(Value::new(result.final_ty.clone()));
    let mut copy = Command::new(l.program.builtins().copy);
    copy.add_input(result.root);
    copy.add_input(result.offset);
    copy.add_output(Some(out));
    l.add_command(copy);
    Ok(out)
}

/// Write `src` through an accessor chain: `COPY(src, offset) -> root`.
pub(crate) fn lower_write_access(
    l: &mut Lowerer<'_>,
    access: &ast::VariableAccess,
    src: ValueId,
) -> LowerResult<()> {
    let result = lower_access(l, access)?;
    l.emit_copy(src, result.offset, result.root);
    Ok(())
}

// ==================== Calls ====================

/// Lower a call. Returns the value of the last return-style output, if
/// any; statement position ignores it.
pub(crate) fn lower_call(
    l: &mut Lowerer<'_>,
    call: &ast::FunctionCall,
) -> LowerResult<Option<ValueId>> {
    let callee = l.lookup_func(&call.name)?;

    let declared_in_count = l.program.scope(callee).ins().len();
    if call.inputs.len() != declared_in_count {
        return Err(LowerError::InputArityMismatch {
            callee: call.name.clone(),
            expected: declared_in_count,
            found: call.inputs.len(),
        });
    }
    let mut ins = Vec::new();
    for input in &call.inputs {
        ins.push(lower_expression(l, input)?);
    }

    enum Slot<'a> {
        Ret,
        Spec(&'a ast::OutputSpec),
    }
    let declared_out_count = l.program.scope(callee).outs().len();
    let slots: Vec<Slot> = match &call.outputs {
        Some(specs) => {
            if specs.len() != declared_out_count {
                return Err(LowerError::OutputArityMismatch {
                    callee: call.name.clone(),
                    expected: declared_out_count,
                    found: specs.len(),
                });
            }
            specs.iter().map(Slot::Spec).collect()
        }
        // No explicit list: one synthesized return-style slot per declared
        // output.
        None => (0..declared_out_count).map(|_| Slot::Ret).collect(),
    };

    let mut command = Command::new(callee);
    for &input in &ins {
        command.add_input(input);
    }
    let mut result = None;
    let mut deferred_writes: Vec<(ValueId, AccessResult)> = Vec::new();

    for (i, slot) in slots.iter().enumerate() {
        match slot {
            Slot::Ret => {
                let out_ty = resolve_output_type(l, callee, i, &ins);
                let out = l.add_temp_value(Value::new(out_ty));
                command.add_output(Some(out));
                result = Some(out);
            }
            Slot::Spec(ast::OutputSpec::Discard) => command.add_output(None),
            Slot::Spec(ast::OutputSpec::Variable(access)) => {
                if access.indexes.is_empty() {
                    command.add_output(Some(l.lookup_var(&access.name)?));
                } else {
                    // Indexed l-value: the call writes a temporary which is
                    // copied into place after the call command.
                    let access_result = lower_access(l, access)?;
                    let temp =
                        l.add_temp_value(Value::new(access_result.final_ty.clone()));
                    command.add_output(Some(temp));
                    deferred_writes.push((temp, access_result));
                }
            }
            Slot::Spec(ast::OutputSpec::Declare { ty, name }) => {
                let dtype = resolve_data_type(l, ty)?;
                let value = l.program.add_value(Value::new(dtype).with_label(name));
                l.program.scope_mut(l.scope).declare_var(name.as_str(), value);
                command.add_output(Some(value));
            }
        }
    }

    l.add_command(command);
    for (temp, access_result) in deferred_writes {
        l.emit_copy(temp, access_result.offset, access_result.root);
    }
    Ok(result)
}

// ==================== Array literals and ranges ====================

/// The conversion builtin that carries a scalar from one primitive type
/// to another, if one exists.
fn conversion_builtin(l: &Lowerer<'_>, from: &DataType, to: &DataType) -> Option<ScopeId> {
    let builtins = l.program.builtins();
    match (from, to) {
        (DataType::Int, DataType::Float) => Some(builtins.itof),
        (DataType::Float, DataType::Int) => Some(builtins.ftoi),
        (DataType::Bool, DataType::Float) => Some(builtins.btof),
        (DataType::Bool, DataType::Int) => Some(builtins.btoi),
        (DataType::Int, DataType::Bool) => Some(builtins.itob),
        (DataType::Float, DataType::Bool) => Some(builtins.ftob),
        _ => None,
    }
}

/// Lower `[e1, …, eN]`: widen every element to their `bigger_of`, allocate
/// the array output, and copy each element to its byte offset. An element
/// narrower than the widened type goes through the matching conversion
/// builtin first, so reading the array back yields the widened forms.
fn lower_array_literal(
    l: &mut Lowerer<'_>,
    elements: &[ast::Expression],
) -> LowerResult<ValueId> {
    let mut values = Vec::new();
    let mut element_ty: Option<DataType> = None;
    for element in elements {
        let value = lower_expression(l, element)?;
        let ty = l.program.value(value).ty().clone();
        element_ty = Some(match element_ty {
            None => ty,
            Some(acc) => DataType::bigger_of(&acc, &ty),
        });
        values.push(value);
    }
    let element_ty = element_ty.expect("the grammar requires at least one element");

    let output = l.add_temp_value(Value::new(DataType::array(
        element_ty.clone(),
        values.len(),
    )));
    for (i, &value) in values.iter().enumerate() {
        let value_ty = l.program.value(value).ty().clone();
        let source = if value_ty != element_ty {
            match conversion_builtin(l, &value_ty, &element_ty) {
                Some(callee) => emit_builtin(l, callee, vec![value])?,
                None => value,
            }
        } else {
            value
        };
        let offset = l.int_literal((i * element_ty.byte_len()) as i32);
        l.emit_copy(source, offset, output);
    }
    Ok(output)
}

/// Constant-fold `{start, end[, step]}` into a known array value. All
/// endpoints must be known; the element type is `bigger_of` of the three.
fn lower_range(l: &mut Lowerer<'_>, range: &ast::RangeExpression) -> LowerResult<ValueId> {
    let start = lower_expression(l, &range.start)?;
    let end = lower_expression(l, &range.end)?;
    let step = match &range.step {
        Some(step) => lower_expression(l, step)?,
        None => l.int_literal(1),
    };

    for endpoint in [start, end, step] {
        if !l.program.value_known(endpoint) {
            return Err(LowerError::NonConstant("range endpoint".to_string()));
        }
    }

    let ty = DataType::bigger_of(
        &DataType::bigger_of(l.program.value(start).ty(), l.program.value(end).ty()),
        l.program.value(step).ty(),
    );
    match ty {
        DataType::Float => {
            let (s, e, st) = (
                known_scalar_f32(l, start)?,
                known_scalar_f32(l, end)?,
                known_scalar_f32(l, step)?,
            );
            if st == 0.0 {
                return Err(LowerError::TypeMismatch("range step is zero".to_string()));
            }
            let count = (((e - s) / st).ceil() as i64).max(0) as usize;
            let mut bytes = Vec::with_capacity(count * 4);
            let mut v = s;
            for _ in 0..count {
                bytes.extend_from_slice(&v.to_le_bytes());
                v += st;
            }
            Ok(l.add_temp_value(Value::new_known(
                DataType::array(DataType::Float, count),
                bytes,
            )))
        }
        DataType::Int => {
            let (s, e, st) = (
                known_scalar_i32(l, start)?,
                known_scalar_i32(l, end)?,
                known_scalar_i32(l, step)?,
            );
            if st == 0 {
                return Err(LowerError::TypeMismatch("range step is zero".to_string()));
            }
            let count = (((e - s) + st - 1) / st).max(0) as usize;
            let mut bytes = Vec::with_capacity(count * 4);
            let mut v = s;
            for _ in 0..count {
                bytes.extend_from_slice(&v.to_le_bytes());
                v += st;
            }
            Ok(l.add_temp_value(Value::new_known(
                DataType::array(DataType::Int, count),
                bytes,
            )))
        }
        other => Err(LowerError::TypeMismatch(format!(
            "range endpoints must be Int or Float, got `{}`",
            other
        ))),
    }
}

// ==================== Known scalar readers ====================

/// Read a known scalar's bytes through any proxy chain.
fn known_scalar_bytes(l: &Lowerer<'_>, id: ValueId) -> (DataType, Vec<u8>) {
    let ty = l.program.value(id).ty().clone();
    let (real, offset) = l.program.real_value(id);
    let bytes = l.program.value(real).bytes().expect("real value owns bytes");
    let bytes = bytes[offset..offset + ty.byte_len()].to_vec();
    (ty, bytes)
}

fn known_scalar_i32(l: &Lowerer<'_>, id: ValueId) -> LowerResult<i32> {
    let (ty, bytes) = known_scalar_bytes(l, id);
    match ty {
        DataType::Int => Ok(i32::from_le_bytes(bytes[0..4].try_into().unwrap())),
        DataType::Float => Ok(f32::from_le_bytes(bytes[0..4].try_into().unwrap()) as i32),
        DataType::Bool => Ok(bytes[0] as i32),
        other => Err(LowerError::TypeMismatch(format!(
            "expected a numeric constant, got `{}`",
            other
        ))),
    }
}

fn known_scalar_f32(l: &Lowerer<'_>, id: ValueId) -> LowerResult<f32> {
    let (ty, bytes) = known_scalar_bytes(l, id);
    match ty {
        DataType::Float => Ok(f32::from_le_bytes(bytes[0..4].try_into().unwrap())),
        DataType::Int => Ok(i32::from_le_bytes(bytes[0..4].try_into().unwrap()) as f32),
        DataType::Bool => Ok(bytes[0] as f32),
        other => Err(LowerError::TypeMismatch(format!(
            "expected a numeric constant, got `{}`",
            other
        ))),
    }
}
