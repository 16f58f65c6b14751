//! Execution of generated method bodies.
//!
//! The [`Interpreter`] runs one [`MethodBody`] of a [`LoadedUnit`] to completion. Each call
//! owns a fresh frame, so any number of threads can execute the same unit at once.
//!
//! # Failure Handling
//!
//! Instructions fail in one of two ways:
//!
//! - A [`Throwable`] (raised by a callback, by the backup, by `throw`, or by a runtime
//!   fault such as a `null` operand or a bad cast) is routed to the handler of the catch
//!   range covering the failing instruction. Without one it leaves the body as
//!   [`Error::Thrown`].
//! - Any other error means the IR is inconsistent and aborts execution immediately.
//!
//! Callbacks and bound originals run under [`std::panic::catch_unwind`], so a panic is
//! handled exactly like a throwable.

use std::{
    cmp::Ordering,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity},
    emitter::boxing::{box_value, cast_value, unbox_value},
    ir::{
        body::MethodBody,
        instruction::{BinaryOp, Constant, Instruction, Label, Local, RecordMethod},
    },
    metadata::types::{TypeTag, CALLBACK_CLASS},
    runtime::{
        callback::{HookCallback, HookPhase},
        loader::LoadedUnit,
        member::NativeMethod,
        record::InvocationRecord,
        throwable::Throwable,
        value::{Object, ObjectRef, Value},
    },
    Error, Result,
};

/// Outcome of a single step.
#[derive(Debug)]
pub enum StepResult {
    /// Proceed with the next instruction
    Continue,
    /// Continue at a label
    Branch(Label),
    /// The body returned
    Return(Value),
}

/// Interpreter for one invocation of a method body.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use hookgen::prelude::*;
///
/// let target = MethodDescriptor::method("app.Math", "square")
///     .with_flags(MemberFlags::STATIC)
///     .param(TypeTag::INT)
///     .returns(TypeTag::INT);
/// let trampoline = TrampolineGenerator::new()
///     .start(target, Arc::new(CallbackChainInfo::new()), None, "/tmp/hooks")?;
///
/// // The placeholder backup returns the default value
/// let body = trampoline.unit().definition().body(EntryPointKind::Backup)?;
/// let result = Interpreter::new(trampoline.unit(), body).run(&[Value::Int(7)])?;
/// assert_eq!(result, Value::Int(0));
/// # Ok::<(), hookgen::Error>(())
/// ```
pub struct Interpreter<'a> {
    unit: &'a LoadedUnit,
    body: &'a MethodBody,
    frame: Vec<Option<Value>>,
    pc: usize,
    steps: u64,
    since_call: u64,
    pending: Option<Throwable>,
    failed_callback: Option<String>,
}

impl<'a> Interpreter<'a> {
    /// Creates an interpreter for `body`, executing in the context of `unit`.
    #[must_use]
    pub fn new(unit: &'a LoadedUnit, body: &'a MethodBody) -> Self {
        Self {
            unit,
            body,
            frame: vec![None; body.locals().len()],
            pc: 0,
            steps: 0,
            since_call: 0,
            pending: None,
            failed_callback: None,
        }
    }

    /// Number of instructions executed so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs the body with the given arguments.
    ///
    /// Arguments are stored into the parameter locals unchecked; callers that need type
    /// checking go through [`crate::runtime::EntryPoint::invoke`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Thrown`] for an uncaught failure, [`Error::StepLimit`] if more
    /// instructions than the configured step limit run without a callback or backup call in
    /// between, and [`Error::Malformed`] for inconsistent IR.
    pub fn run(mut self, args: &[Value]) -> Result<Value> {
        if args.len() != self.body.param_count() {
            return Err(malformed_error!(
                "'{}' takes {} argument(s), got {}",
                self.body.name(),
                self.body.param_count(),
                args.len()
            ));
        }
        for (slot, arg) in self.frame.iter_mut().zip(args) {
            *slot = Some(arg.clone());
        }

        let body = self.body;
        let step_limit = self.unit.config().step_limit;
        loop {
            // The budget only covers work between calls, so a long callback chain never
            // exhausts it
            if step_limit > 0 && self.since_call >= step_limit {
                return Err(Error::StepLimit(step_limit));
            }
            self.steps += 1;
            self.since_call += 1;

            let instruction = body.instructions().get(self.pc).ok_or_else(|| {
                malformed_error!("'{}' fell off its end at {}", body.name(), self.pc)
            })?;
            if matches!(
                instruction,
                Instruction::InvokeCallback { .. } | Instruction::InvokeStatic { .. }
            ) {
                self.since_call = 0;
            }

            match self.step(instruction) {
                Ok(StepResult::Continue) => self.pc += 1,
                Ok(StepResult::Branch(label)) => self.pc = self.body.target(label)?,
                Ok(StepResult::Return(value)) => return Ok(value),
                Err(Error::Thrown(throwable)) => match self.body.handler_for(self.pc) {
                    Some(handler) => {
                        self.pending = Some(throwable);
                        self.pc = self.body.target(handler)?;
                    }
                    None => return Err(Error::Thrown(throwable)),
                },
                Err(error) => return Err(error),
            }
        }
    }

    /// Executes a single instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Thrown`] for catchable failures and any other error for
    /// inconsistent IR.
    pub fn step(&mut self, instruction: &Instruction) -> Result<StepResult> {
        match instruction {
            Instruction::Const { dst, value } => self.write(*dst, constant_value(*value)),
            Instruction::Move { dst, src } => {
                let value = self.read(*src)?.clone();
                self.write(*dst, value);
            }
            Instruction::GetStatic { dst, field } => {
                let value = self.unit.get_static(*field);
                self.write(*dst, value);
            }
            Instruction::PutStatic { field, src } => {
                let value = self.read(*src)?.clone();
                self.unit.put_static(*field, value)?;
            }
            Instruction::HooksDisabled { dst } => {
                let disabled = self.unit.config().hooks_switch.is_disabled();
                self.write(*dst, Value::Boolean(disabled));
            }
            Instruction::Snapshot { dst, chain } => {
                let snapshot = match self.object(*chain, "snapshot")?.get() {
                    Object::ChainInfo(chain) => chain.snapshot(),
                    other => {
                        return Err(malformed_error!(
                            "snapshot of {} in '{}'",
                            other.class_name(),
                            self.body.name()
                        ))
                    }
                };
                let items = snapshot
                    .iter()
                    .map(|callback| {
                        Value::Object(ObjectRef::new(Object::Callback(Arc::clone(callback))))
                    })
                    .collect();
                self.write(*dst, Value::array(TypeTag::class(CALLBACK_CLASS), items));
            }
            Instruction::NewArray {
                dst,
                element,
                length,
            } => {
                let length = self.read_int(*length)?;
                let Ok(length) = usize::try_from(length) else {
                    return Err(
                        Throwable::illegal_state(format!("negative array size {length}")).into(),
                    );
                };
                let items = vec![Value::default_for(element); length];
                self.write(*dst, Value::array(element.clone(), items));
            }
            Instruction::ArrayLength { dst, array } => {
                let length = self.with_array(*array, |_, items| Ok(items.len()))?;
                let length = i32::try_from(length)
                    .map_err(|_| malformed_error!("array length {} exceeds int", length))?;
                self.write(*dst, Value::Int(length));
            }
            Instruction::ArrayGet { dst, array, index } => {
                let index = self.read_int(*index)?;
                let value = self.with_array(*array, |_, items| {
                    usize::try_from(index)
                        .ok()
                        .and_then(|i| items.get(i).cloned())
                        .ok_or_else(|| Throwable::index_out_of_range(index, items.len()).into())
                })?;
                self.write(*dst, value);
            }
            Instruction::ArrayPut { array, index, src } => {
                let index = self.read_int(*index)?;
                let value = self.read(*src)?.clone();
                let array = self.object(*array, "array store")?.clone();
                let Object::Array { element, items } = array.get() else {
                    return Err(malformed_error!("array store into {}", array.class_name()));
                };
                if !value.is_assignable_to(element) {
                    return Err(Throwable::invalid_cast(format!(
                        "cannot store {} into {element}[]",
                        value.kind_name()
                    ))
                    .into());
                }
                let mut items = items.write().map_err(|_| Error::LockError)?;
                let length = items.len();
                match usize::try_from(index).ok().and_then(|i| items.get_mut(i)) {
                    Some(slot) => *slot = value,
                    None => return Err(Throwable::index_out_of_range(index, length).into()),
                }
            }
            Instruction::Box { dst, src } => {
                let value = box_value(self.read(*src)?);
                self.write(*dst, value);
            }
            Instruction::Unbox { dst, src, target } => {
                let value = unbox_value(self.read(*src)?, target)?;
                self.write(*dst, value);
            }
            Instruction::Cast { dst, src, target } => {
                let value = cast_value(self.read(*src)?, target)?;
                self.write(*dst, value);
            }
            Instruction::NewRecord {
                dst,
                method,
                this_object,
                args,
            } => {
                let record = InvocationRecord::with_args_array(
                    self.read(*method)?.clone(),
                    self.read(*this_object)?.clone(),
                    self.read(*args)?.clone(),
                );
                let record = Value::Object(ObjectRef::new(Object::Record(Mutex::new(record))));
                self.write(*dst, record);
            }
            Instruction::RecordGet { dst, record, field } => {
                let value = self.with_record(*record, |record| Ok(record.get_field(*field)))?;
                self.write(*dst, value);
            }
            Instruction::RecordPut { record, field, src } => {
                let value = self.read(*src)?.clone();
                self.with_record(*record, |record| record.put_field(*field, value))?;
            }
            Instruction::RecordCall {
                dst,
                record,
                method,
                arg,
            } => {
                let arg = match arg {
                    Some(arg) => Some(self.read(*arg)?.clone()),
                    None => None,
                };
                let value = self.with_record(*record, |record| call_record(record, *method, arg))?;
                if let Some(dst) = dst {
                    self.write(*dst, value);
                }
            }
            Instruction::InvokeCallback {
                callback,
                record,
                phase,
            } => {
                let callback = match self.object(*callback, "callback invocation")?.get() {
                    Object::Callback(callback) => Arc::clone(callback),
                    other => {
                        return Err(malformed_error!("{} is not a callback", other.class_name()))
                    }
                };
                let record = self.object(*record, "callback invocation")?.clone();
                let Object::Record(record) = record.get() else {
                    return Err(malformed_error!("{} is not a record", record.class_name()));
                };
                let outcome = invoke_callback(callback.as_ref(), &mut lock_record(record), *phase);
                if outcome.is_err() {
                    self.failed_callback = Some(callback.name().to_string());
                }
                outcome?;
            }
            Instruction::InvokeStatic { dst, method, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.read(*arg).cloned())
                    .collect::<Result<Vec<_>>>()?;
                let value = self.unit.call(*method, &args)?;
                if let Some(dst) = dst {
                    self.write(*dst, value);
                }
            }
            Instruction::Report { phase, index, src } => {
                let index = self.read_int(*index)?;
                let failure = self.read(*src)?.clone();
                let name = self
                    .failed_callback
                    .take()
                    .unwrap_or_else(|| "callback".to_string());
                let message = match failure.as_throwable() {
                    Some(throwable) => {
                        format!("{phase} callback #{index} ({name}) failed: {throwable}")
                    }
                    None => format!("{phase} callback #{index} ({name}) failed"),
                };
                self.unit.config().diagnostics.push(
                    Diagnostic::new(
                        DiagnosticSeverity::Warning,
                        DiagnosticCategory::Callback,
                        message,
                    )
                    .with_unit(self.unit.name())
                    .with_pc(self.pc),
                );
            }
            Instruction::BinOp { op, dst, lhs, rhs } => {
                let lhs = self.read_int(*lhs)?;
                let rhs = self.read_int(*rhs)?;
                let value = match op {
                    BinaryOp::Add => lhs.wrapping_add(rhs),
                    BinaryOp::Sub => lhs.wrapping_sub(rhs),
                };
                self.write(*dst, Value::Int(value));
            }
            Instruction::Goto { target } => return Ok(StepResult::Branch(*target)),
            Instruction::IfZero { cmp, src, target } => {
                let ordering = match self.read(*src)? {
                    Value::Int(value) => value.cmp(&0),
                    Value::Boolean(value) => i32::from(*value).cmp(&0),
                    Value::Null => Ordering::Equal,
                    Value::Object(_) => Ordering::Greater,
                    other => {
                        return Err(malformed_error!(
                            "cannot compare {} with zero",
                            other.kind_name()
                        ))
                    }
                };
                if cmp.holds(ordering) {
                    return Ok(StepResult::Branch(*target));
                }
            }
            Instruction::IfCmp {
                cmp,
                lhs,
                rhs,
                target,
            } => {
                let lhs = self.read_int(*lhs)?;
                let rhs = self.read_int(*rhs)?;
                if cmp.holds(lhs.cmp(&rhs)) {
                    return Ok(StepResult::Branch(*target));
                }
            }
            Instruction::MoveException { dst } => {
                let throwable = self.pending.take().ok_or_else(|| {
                    malformed_error!("move-exception outside a handler at {}", self.pc)
                })?;
                self.write(*dst, Value::throwable(throwable));
            }
            Instruction::ReturnVoid => return Ok(StepResult::Return(Value::Void)),
            Instruction::Return { src } => {
                return Ok(StepResult::Return(self.read(*src)?.clone()))
            }
            Instruction::Throw { src } => {
                let throwable = match self.read(*src)? {
                    Value::Null => Throwable::null_reference("throw null"),
                    value => value.as_throwable().cloned().ok_or_else(|| {
                        malformed_error!("cannot throw {}", value.kind_name())
                    })?,
                };
                return Err(Error::Thrown(throwable));
            }
        }
        Ok(StepResult::Continue)
    }

    fn read(&self, local: Local) -> Result<&Value> {
        self.frame
            .get(local.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                malformed_error!(
                    "{} read before it was written in '{}' at {}",
                    local,
                    self.body.name(),
                    self.pc
                )
            })
    }

    fn write(&mut self, local: Local, value: Value) {
        if let Some(slot) = self.frame.get_mut(local.index()) {
            *slot = Some(value);
        }
    }

    fn read_int(&self, local: Local) -> Result<i32> {
        match self.read(local)? {
            Value::Int(value) => Ok(*value),
            other => Err(malformed_error!("{} holds {}, not int", local, other.kind_name())),
        }
    }

    /// Reads a non-null reference; `null` raises a `NullReference` throwable.
    fn object(&self, local: Local, operation: &str) -> Result<&ObjectRef> {
        match self.read(local)? {
            Value::Object(object) => Ok(object),
            Value::Null => Err(Throwable::null_reference(format!("{operation} on null")).into()),
            other => Err(malformed_error!(
                "{operation} on {} in '{}'",
                other.kind_name(),
                self.body.name()
            )),
        }
    }

    fn with_array<T>(
        &self,
        local: Local,
        f: impl FnOnce(&TypeTag, &[Value]) -> Result<T>,
    ) -> Result<T> {
        let object = self.object(local, "array access")?;
        let Object::Array { element, items } = object.get() else {
            return Err(malformed_error!("{} is not an array", object.class_name()));
        };
        let items = items.read().map_err(|_| Error::LockError)?;
        f(element, &items)
    }

    fn with_record<T>(
        &self,
        local: Local,
        f: impl FnOnce(&mut InvocationRecord) -> Result<T>,
    ) -> Result<T> {
        let object = self.object(local, "record access")?;
        let Object::Record(record) = object.get() else {
            return Err(malformed_error!("{} is not a record", object.class_name()));
        };
        f(&mut lock_record(record))
    }
}

/// A callback that panicked while holding the record leaves it poisoned; the record is
/// still consistent because every mutation is a single field store.
fn lock_record(record: &Mutex<InvocationRecord>) -> MutexGuard<'_, InvocationRecord> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

fn constant_value(constant: Constant) -> Value {
    match constant {
        Constant::Null => Value::Null,
        Constant::Boolean(value) => Value::Boolean(value),
        Constant::Byte(value) => Value::Byte(value),
        Constant::Char(value) => Value::Char(value),
        Constant::Short(value) => Value::Short(value),
        Constant::Int(value) => Value::Int(value),
        Constant::Long(value) => Value::Long(value),
        Constant::Float(value) => Value::Float(value),
        Constant::Double(value) => Value::Double(value),
    }
}

fn call_record(
    record: &mut InvocationRecord,
    method: RecordMethod,
    arg: Option<Value>,
) -> Result<Value> {
    let argument = || {
        arg.clone()
            .ok_or_else(|| malformed_error!("record method '{}' takes an argument", method))
    };
    match method {
        RecordMethod::SetResult => {
            record.set_result(argument()?);
            Ok(Value::Void)
        }
        RecordMethod::SetThrowable => match argument()? {
            Value::Null => Err(Throwable::null_reference("set_throwable(null)").into()),
            value => {
                let throwable = value.as_throwable().cloned().ok_or_else(|| {
                    malformed_error!("set_throwable of {}", value.kind_name())
                })?;
                record.set_throwable(throwable);
                Ok(Value::Void)
            }
        },
        RecordMethod::GetResult => Ok(record.result().clone()),
        RecordMethod::GetThrowable => Ok(record
            .throwable()
            .cloned()
            .map_or(Value::Null, Value::throwable)),
        RecordMethod::HasThrowable => Ok(Value::Boolean(record.has_throwable())),
    }
}

fn invoke_callback(
    callback: &dyn HookCallback,
    record: &mut InvocationRecord,
    phase: HookPhase,
) -> Result<()> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match phase {
        HookPhase::Before => callback.before_hooked_method(record),
        HookPhase::After => callback.after_hooked_method(record),
    }));
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(throwable)) => Err(Error::Thrown(throwable)),
        Err(payload) => Err(Error::Thrown(Throwable::from_panic(payload))),
    }
}

/// Runs a host implementation, converting a panic into a throwable.
pub(crate) fn invoke_native(native: &NativeMethod, args: &[Value]) -> Result<Value> {
    match panic::catch_unwind(AssertUnwindSafe(|| native(args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(throwable)) => Err(Error::Thrown(throwable)),
        Err(payload) => Err(Error::Thrown(Throwable::from_panic(payload))),
    }
}
