//! Tree-walking interpreter over the lowered IR.
//!
//! Runtime bytes live in an interpreter-owned store indexed by value id;
//! the program itself is never mutated. Builtins are dispatched by scope
//! identity against the program's builtin handle table and evaluated
//! directly; every other callee is invoked by binding argument bytes into
//! its declared inputs, running its commands, and copying its declared
//! outputs back into the caller's slots.

use crate::ir::{Augmentation, Command, DataType, Program, ScopeId, ValueId};

/// Runtime errors during interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// An operand had a type the operation cannot handle.
    TypeError(String),
    DivisionByZero,
    /// A byte access fell outside a value's storage.
    ByteRangeOutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
    /// A write landed on a proxy array, which owns no repeated storage.
    WriteThroughProxy,
    /// IR shape the lowerer never produces.
    Internal(String),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::TypeError(detail) => write!(f, "type error: {}", detail),
            RunError::DivisionByZero => write!(f, "division by zero"),
            RunError::ByteRangeOutOfBounds { offset, len, size } => write!(
                f,
                "byte range {}..{} is outside storage of {} bytes",
                offset,
                offset + len,
                size
            ),
            RunError::WriteThroughProxy => write!(f, "cannot write through a proxy array"),
            RunError::Internal(detail) => write!(f, "internal error: {}", detail),
        }
    }
}

impl std::error::Error for RunError {}

/// What `run` observed: the bytes of `main`'s declared outputs (empty when
/// the program declares no `main`) and everything `log` printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub main_outputs: Vec<Vec<u8>>,
    pub log: Vec<String>,
}

enum Flow {
    Normal,
    Return,
}

/// The interpreter.
#[derive(Debug)]
pub struct Interpreter<'p> {
    program: &'p Program,
    memory: Vec<Vec<u8>>,
    log: Vec<String>,
}

impl<'p> Interpreter<'p> {
    /// Seed runtime storage from the lowered values: owned byte blocks are
    /// copied in, proxies own nothing.
    pub fn new(program: &'p Program) -> Self {
        let memory = (0..program.value_count())
            .map(|i| {
                let value = program.value(ValueId(i as u32));
                value.bytes().map(|b| b.to_vec()).unwrap_or_default()
            })
            .collect();
        Self {
            program,
            memory,
            log: Vec::new(),
        }
    }

    /// Run every root-scope command, then invoke `main` if declared.
    pub fn run(&mut self) -> Result<RunOutcome, RunError> {
        let program = self.program;
        let root = program.scope(program.root());
        for command in root.commands() {
            if let Flow::Return = self.exec_command(command)? {
                break;
            }
        }

        let mut main_outputs = Vec::new();
        if let Some(main) = root.lookup_local_func("main") {
            let scope = program.scope(main);
            for &input in scope.ins() {
                let len = program.value(input).ty().byte_len();
                self.write_value(input, &vec![0; len])?;
            }
            for command in scope.commands() {
                if let Flow::Return = self.exec_command(command)? {
                    break;
                }
            }
            for &output in scope.outs() {
                main_outputs.push(self.read_bytes(output)?);
            }
        }

        Ok(RunOutcome {
            main_outputs,
            log: std::mem::take(&mut self.log),
        })
    }

    // ==================== Command execution ====================

    fn exec_command(&mut self, command: &Command) -> Result<Flow, RunError> {
        let program = self.program;
        match command.augmentation() {
            None => self.dispatch(command),
            Some(Augmentation::DoIf { condition }) => {
                if self.read_bool(*condition)? {
                    self.dispatch(command)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Some(Augmentation::DoIfNot { condition }) => {
                if !self.read_bool(*condition)? {
                    self.dispatch(command)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Some(Augmentation::LoopFor { counter, iterable }) => {
                let ty = program.value(*iterable).ty().clone();
                match ty.element_type() {
                    Some(element) => {
                        let stride = element.byte_len();
                        let bytes = self.read_bytes(*iterable)?;
                        for i in 0..ty.array_len().unwrap() {
                            self.write_value(*counter, &bytes[i * stride..(i + 1) * stride])?;
                            self.dispatch(command)?;
                        }
                    }
                    None => {
                        let bytes = self.read_bytes(*iterable)?;
                        self.write_value(*counter, &bytes)?;
                        self.dispatch(command)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Some(Augmentation::LoopRange {
                counter,
                start,
                end,
                step,
            }) => {
                let start = self.read_i32(*start)?;
                let end = self.read_i32(*end)?;
                let step = self.read_i32(*step)?;
                if step == 0 {
                    return Err(RunError::TypeError("loop range step is zero".to_string()));
                }
                let mut v = start;
                while (step > 0 && v < end) || (step < 0 && v > end) {
                    self.write_value(*counter, &v.to_le_bytes())?;
                    self.dispatch(command)?;
                    v += step;
                }
                Ok(Flow::Normal)
            }
        }
    }

    /// Dispatch by callee identity: builtins are evaluated in place, user
    /// scopes are invoked.
    fn dispatch(&mut self, command: &Command) -> Result<Flow, RunError> {
        let builtins = self.program.builtins();
        let callee = command.callee();
        if callee == builtins.ret {
            return Ok(Flow::Return);
        }
        // Marker sinks carry no behavior of their own.
        if callee == builtins.if_
            || callee == builtins.for_
            || callee == builtins.for_each
            || callee == builtins.while_
            || callee == builtins.def
        {
            return Ok(Flow::Normal);
        }

        let ins = command.inputs();
        let outs = command.outputs();
        if callee == builtins.copy {
            self.eval_copy(ins, outs)?;
        } else if callee == builtins.log {
            let bytes = self.read_bytes(ins[0])?;
            let ty = self.program.value(ins[0]).ty();
            self.log.push(ty.format_value(&bytes));
        } else if callee == builtins.add
            || callee == builtins.mul
            || callee == builtins.modulo
            || callee == builtins.band
            || callee == builtins.bor
            || callee == builtins.bxor
        {
            self.eval_arith(callee, ins, outs)?;
        } else if callee == builtins.recip {
            if let Some(out) = first_out(outs) {
                let x = 1.0f32 / self.scalar_f32(ins[0])?;
                self.write_value(out, &x.to_le_bytes())?;
            }
        } else if callee == builtins.eq
            || callee == builtins.neq
            || callee == builtins.lte
            || callee == builtins.gte
            || callee == builtins.lt
            || callee == builtins.gt
        {
            self.eval_compare(callee, ins, outs)?;
        } else if callee == builtins.and_ || callee == builtins.or_ || callee == builtins.xor_ {
            self.eval_bool(callee, ins, outs)?;
        } else if callee == builtins.itof
            || callee == builtins.ftoi
            || callee == builtins.btof
            || callee == builtins.btoi
            || callee == builtins.itob
            || callee == builtins.ftob
        {
            self.eval_convert(callee, ins, outs)?;
        } else {
            return self.invoke_scope(callee, ins, outs);
        }
        Ok(Flow::Normal)
    }

    /// Invoke a function scope: bind inputs, run the body, copy declared
    /// outputs back into the caller's slots.
    fn invoke_scope(
        &mut self,
        callee: ScopeId,
        ins: &[ValueId],
        outs: &[Option<ValueId>],
    ) -> Result<Flow, RunError> {
        let program = self.program;
        let scope = program.scope(callee);
        if ins.len() != scope.ins().len() {
            return Err(RunError::Internal(format!(
                "call to {} binds {} inputs, scope declares {}",
                callee,
                ins.len(),
                scope.ins().len()
            )));
        }
        for (&slot, &arg) in scope.ins().iter().zip(ins) {
            let bytes = self.read_bytes(arg)?;
            self.write_value(slot, &bytes)?;
        }
        for command in scope.commands() {
            if let Flow::Return = self.exec_command(command)? {
                break;
            }
        }
        for (i, out) in outs.iter().enumerate() {
            let Some(out) = out else { continue };
            let declared = *scope.outs().get(i).ok_or_else(|| {
                RunError::Internal(format!("call to {} binds more outputs than declared", callee))
            })?;
            let bytes = self.read_bytes(declared)?;
            self.write_value(*out, &bytes)?;
        }
        Ok(Flow::Normal)
    }

    // ==================== Builtin evaluation ====================

    /// Variadic left fold for the joined arithmetic/bitwise builtins. The
    /// output slot's resolved type picks the arithmetic domain; operands
    /// upcast into it.
    fn eval_arith(
        &mut self,
        callee: ScopeId,
        ins: &[ValueId],
        outs: &[Option<ValueId>],
    ) -> Result<(), RunError> {
        let builtins = self.program.builtins();
        let Some(out) = first_out(outs) else {
            return Ok(());
        };
        match self.program.value(out).ty().clone() {
            DataType::Int => {
                let mut acc = self.scalar_i32(ins[0])?;
                for &operand in &ins[1..] {
                    let x = self.scalar_i32(operand)?;
                    acc = if callee == builtins.add {
                        acc.wrapping_add(x)
                    } else if callee == builtins.mul {
                        acc.wrapping_mul(x)
                    } else if callee == builtins.modulo {
                        if x == 0 {
                            return Err(RunError::DivisionByZero);
                        }
                        acc % x
                    } else if callee == builtins.band {
                        acc & x
                    } else if callee == builtins.bor {
                        acc | x
                    } else {
                        acc ^ x
                    };
                }
                self.write_value(out, &acc.to_le_bytes())
            }
            DataType::Float => {
                let mut acc = self.scalar_f32(ins[0])?;
                for &operand in &ins[1..] {
                    let x = self.scalar_f32(operand)?;
                    acc = if callee == builtins.add {
                        acc + x
                    } else if callee == builtins.mul {
                        acc * x
                    } else if callee == builtins.modulo {
                        acc % x
                    } else {
                        return Err(RunError::TypeError(
                            "bitwise operation on Float".to_string(),
                        ));
                    };
                }
                self.write_value(out, &acc.to_le_bytes())
            }
            DataType::Bool => {
                let mut acc = self.read_bool(ins[0])?;
                for &operand in &ins[1..] {
                    let x = self.read_bool(operand)?;
                    acc = if callee == builtins.add || callee == builtins.bxor {
                        acc ^ x
                    } else if callee == builtins.mul || callee == builtins.band {
                        acc & x
                    } else if callee == builtins.bor {
                        acc | x
                    } else {
                        return Err(RunError::TypeError(
                            "modulo operation on Bool".to_string(),
                        ));
                    };
                }
                self.write_value(out, &[acc as u8])
            }
            other => Err(RunError::TypeError(format!(
                "arithmetic on `{}` is not supported",
                other
            ))),
        }
    }

    fn eval_compare(
        &mut self,
        callee: ScopeId,
        ins: &[ValueId],
        outs: &[Option<ValueId>],
    ) -> Result<(), RunError> {
        let builtins = self.program.builtins();
        let Some(out) = first_out(outs) else {
            return Ok(());
        };
        let float = self.program.value(ins[0]).ty() == &DataType::Float
            || self.program.value(ins[1]).ty() == &DataType::Float;
        let ordering = if float {
            let (a, b) = (self.scalar_f32(ins[0])?, self.scalar_f32(ins[1])?);
            a.partial_cmp(&b)
        } else {
            let (a, b) = (self.scalar_i32(ins[0])?, self.scalar_i32(ins[1])?);
            Some(a.cmp(&b))
        };
        let result = match ordering {
            Some(ordering) => {
                if callee == builtins.eq {
                    ordering.is_eq()
                } else if callee == builtins.neq {
                    ordering.is_ne()
                } else if callee == builtins.lte {
                    ordering.is_le()
                } else if callee == builtins.gte {
                    ordering.is_ge()
                } else if callee == builtins.lt {
                    ordering.is_lt()
                } else {
                    ordering.is_gt()
                }
            }
            // NaN compares unequal to everything.
            None => callee == builtins.neq,
        };
        self.write_value(out, &[result as u8])
    }

    fn eval_bool(
        &mut self,
        callee: ScopeId,
        ins: &[ValueId],
        outs: &[Option<ValueId>],
    ) -> Result<(), RunError> {
        let builtins = self.program.builtins();
        let Some(out) = first_out(outs) else {
            return Ok(());
        };
        let (a, b) = (self.read_bool(ins[0])?, self.read_bool(ins[1])?);
        let result = if callee == builtins.and_ {
            a && b
        } else if callee == builtins.or_ {
            a || b
        } else {
            a ^ b
        };
        self.write_value(out, &[result as u8])
    }

    fn eval_convert(
        &mut self,
        callee: ScopeId,
        ins: &[ValueId],
        outs: &[Option<ValueId>],
    ) -> Result<(), RunError> {
        let builtins = self.program.builtins();
        let Some(out) = first_out(outs) else {
            return Ok(());
        };
        if callee == builtins.itof {
            let x = self.read_i32(ins[0])? as f32;
            self.write_value(out, &x.to_le_bytes())
        } else if callee == builtins.ftoi {
            let x = self.read_f32(ins[0])? as i32;
            self.write_value(out, &x.to_le_bytes())
        } else if callee == builtins.btof {
            let x = if self.read_bool(ins[0])? { 1.0f32 } else { 0.0 };
            self.write_value(out, &x.to_le_bytes())
        } else if callee == builtins.btoi {
            let x = self.read_bool(ins[0])? as i32;
            self.write_value(out, &x.to_le_bytes())
        } else if callee == builtins.itob {
            let x = self.read_i32(ins[0])? != 0;
            self.write_value(out, &[x as u8])
        } else {
            let x = self.read_f32(ins[0])? != 0.0;
            self.write_value(out, &[x as u8])
        }
    }

    /// `COPY(a, offset) -> x`: move `min(a, x)` bytes, with `offset`
    /// indexing into the larger side.
    fn eval_copy(&mut self, ins: &[ValueId], outs: &[Option<ValueId>]) -> Result<(), RunError> {
        let Some(out) = first_out(outs) else {
            return Ok(());
        };
        let src = self.read_bytes(ins[0])?;
        let offset = self.read_i32(ins[1])?;
        if offset < 0 {
            return Err(RunError::ByteRangeOutOfBounds {
                offset: 0,
                len: src.len(),
                size: 0,
            });
        }
        let offset = offset as usize;
        let dst_len = self.program.value(out).ty().byte_len();
        if src.len() <= dst_len {
            self.write_bytes_at(out, offset, &src)
        } else {
            let end = offset + dst_len;
            if end > src.len() {
                return Err(RunError::ByteRangeOutOfBounds {
                    offset,
                    len: dst_len,
                    size: src.len(),
                });
            }
            self.write_bytes_at(out, 0, &src[offset..end])
        }
    }

    // ==================== Byte store access ====================

    fn storage_slice(&self, real: ValueId, offset: usize, len: usize) -> Result<&[u8], RunError> {
        let block = &self.memory[real.index()];
        if offset + len > block.len() {
            return Err(RunError::ByteRangeOutOfBounds {
                offset,
                len,
                size: block.len(),
            });
        }
        Ok(&block[offset..offset + len])
    }

    /// A value's logical bytes, resolved through any proxy chain. Proxy
    /// arrays materialize their single element repeated.
    pub fn read_bytes(&self, id: ValueId) -> Result<Vec<u8>, RunError> {
        let value = self.program.value(id);
        let (real, offset) = self.program.real_value(id);
        if let DataType::ArrayProxy { element, len } = value.ty() {
            let stride = element.byte_len();
            let chunk = self.storage_slice(real, offset, stride)?.to_vec();
            let mut bytes = Vec::with_capacity(stride * len);
            for _ in 0..*len {
                bytes.extend_from_slice(&chunk);
            }
            Ok(bytes)
        } else {
            Ok(self
                .storage_slice(real, offset, value.ty().byte_len())?
                .to_vec())
        }
    }

    fn write_bytes_at(
        &mut self,
        id: ValueId,
        extra_offset: usize,
        bytes: &[u8],
    ) -> Result<(), RunError> {
        if self.program.value(id).ty().is_proxy() {
            return Err(RunError::WriteThroughProxy);
        }
        let (real, offset) = self.program.real_value(id);
        let start = offset + extra_offset;
        let block = &mut self.memory[real.index()];
        if start + bytes.len() > block.len() {
            return Err(RunError::ByteRangeOutOfBounds {
                offset: start,
                len: bytes.len(),
                size: block.len(),
            });
        }
        block[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Exact-length write of a value's whole storage.
    fn write_value(&mut self, id: ValueId, bytes: &[u8]) -> Result<(), RunError> {
        let expected = self.program.value(id).ty().byte_len();
        if bytes.len() != expected {
            return Err(RunError::TypeError(format!(
                "cannot store {} bytes into `{}`",
                bytes.len(),
                self.program.value(id).ty()
            )));
        }
        self.write_bytes_at(id, 0, bytes)
    }

    // ==================== Typed readers ====================

    pub fn read_i32(&self, id: ValueId) -> Result<i32, RunError> {
        match self.program.value(id).ty() {
            DataType::Int => {
                let bytes = self.read_bytes(id)?;
                Ok(i32::from_le_bytes(bytes[0..4].try_into().unwrap()))
            }
            other => Err(RunError::TypeError(format!("expected Int, got `{}`", other))),
        }
    }

    pub fn read_f32(&self, id: ValueId) -> Result<f32, RunError> {
        match self.program.value(id).ty() {
            DataType::Float => {
                let bytes = self.read_bytes(id)?;
                Ok(f32::from_le_bytes(bytes[0..4].try_into().unwrap()))
            }
            other => Err(RunError::TypeError(format!(
                "expected Float, got `{}`",
                other
            ))),
        }
    }

    pub fn read_bool(&self, id: ValueId) -> Result<bool, RunError> {
        match self.program.value(id).ty() {
            DataType::Bool => Ok(self.read_bytes(id)?[0] != 0),
            other => Err(RunError::TypeError(format!(
                "expected Bool, got `{}`",
                other
            ))),
        }
    }

    /// Numeric upcast readers used by arithmetic and comparison.
    fn scalar_i32(&self, id: ValueId) -> Result<i32, RunError> {
        match self.program.value(id).ty() {
            DataType::Int => self.read_i32(id),
            DataType::Bool => Ok(self.read_bool(id)? as i32),
            DataType::Float => Ok(self.read_f32(id)? as i32),
            other => Err(RunError::TypeError(format!(
                "expected a scalar, got `{}`",
                other
            ))),
        }
    }

    fn scalar_f32(&self, id: ValueId) -> Result<f32, RunError> {
        match self.program.value(id).ty() {
            DataType::Float => self.read_f32(id),
            DataType::Int => Ok(self.read_i32(id)? as f32),
            DataType::Bool => Ok(self.read_bool(id)? as i32 as f32),
            other => Err(RunError::TypeError(format!(
                "expected a scalar, got `{}`",
                other
            ))),
        }
    }
}

fn first_out(outs: &[Option<ValueId>]) -> Option<ValueId> {
    outs.first().copied().flatten()
}
