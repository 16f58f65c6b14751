//! Emission of hook bodies.
//!
//! The hook entry point of every unit runs the callback chain of its target around a call
//! of the backup entry point. [`CallbackChainEmitter`] produces that body for one
//! [`ResolvedSignature`].
//!
//! # Protocol
//!
//! 1. If hooks are disabled, or the chain snapshot is empty, the hook calls the backup
//!    with its own arguments and returns (or propagates) the outcome unchanged.
//! 2. Otherwise an invocation record is built from the receiver (`null` for static
//!    targets) and the boxed remaining arguments.
//! 3. Before callbacks run in snapshot order. A callback that requests an early return
//!    ends the loop. A failing callback is reported, its result is cleared and the early
//!    return it may have requested is cancelled.
//! 4. Unless an early return was requested, the arguments are reloaded from the record,
//!    unboxed and passed to the backup. Its result (or failure) is stored on the record.
//! 5. After callbacks run in reverse order, starting at the last before callback that ran.
//!    A failing after callback is reported and the outcome it saw is restored.
//! 6. A pending failure is thrown, otherwise the result is narrowed to the return type.
//!
//! After callback `i` runs if and only if before callback `i` ran.

use crate::{
    emitter::boxing::{emit_box, emit_unbox, ResultLocals},
    ir::{
        body::MethodBody,
        code::CodeBuilder,
        instruction::{
            BinaryOp, Comparison, Constant, EntryPointKind, Instruction, Label, Local,
            RecordMethod, StaticField,
        },
    },
    metadata::{
        signature::ResolvedSignature,
        types::{TypeTag, CALLBACK_CLASS, RECORD_CLASS, THROWABLE_CLASS},
    },
    runtime::{callback::HookPhase, record::RecordField},
    Result,
};

struct HookLocals {
    params: Vec<Local>,
    results: ResultLocals,
    one: Local,
    null_obj: Local,
    disabled: Local,
    info: Local,
    snapshot: Local,
    snapshot_len: Local,
    callback: Local,
    throwable: Local,
    record: Local,
    method: Local,
    this_object: Local,
    args: Local,
    return_early: Local,
    arg_count: Local,
    arg_index: Local,
    index: Local,
    last_result: Local,
    last_throwable: Local,
    has_throwable: Local,
}

impl HookLocals {
    fn allocate(code: &mut CodeBuilder) -> Result<Self> {
        let params = code.params()?;
        let results = ResultLocals::allocate(code)?;
        let throwable_type = TypeTag::class(THROWABLE_CLASS);

        Ok(Self {
            params,
            results,
            one: code.new_local(TypeTag::INT)?,
            null_obj: code.new_local(TypeTag::Object)?,
            disabled: code.new_local(TypeTag::BOOLEAN)?,
            info: code.new_local(StaticField::HookInfo.field_type())?,
            snapshot: code.new_local(TypeTag::array_of(TypeTag::class(CALLBACK_CLASS)))?,
            snapshot_len: code.new_local(TypeTag::INT)?,
            callback: code.new_local(TypeTag::class(CALLBACK_CLASS))?,
            throwable: code.new_local(throwable_type.clone())?,
            record: code.new_local(TypeTag::class(RECORD_CLASS))?,
            method: code.new_local(StaticField::Method.field_type())?,
            this_object: code.new_local(TypeTag::Object)?,
            args: code.new_local(TypeTag::object_array())?,
            return_early: code.new_local(TypeTag::BOOLEAN)?,
            arg_count: code.new_local(TypeTag::INT)?,
            arg_index: code.new_local(TypeTag::INT)?,
            index: code.new_local(TypeTag::INT)?,
            last_result: code.new_local(TypeTag::Object)?,
            last_throwable: code.new_local(throwable_type)?,
            has_throwable: code.new_local(TypeTag::BOOLEAN)?,
        })
    }
}

struct HookLabels {
    bypass: Label,
    before_loop: Label,
    before_failed: Label,
    before_done: Label,
    before_next: Label,
    invoke_original: Label,
    original_failed: Label,
    after_entry: Label,
    after_loop: Label,
    after_failed: Label,
    restore_result: Label,
    after_next: Label,
    rethrow: Label,
}

impl HookLabels {
    fn allocate(code: &mut CodeBuilder) -> Self {
        Self {
            bypass: code.new_label("bypass"),
            before_loop: code.new_label("before_loop"),
            before_failed: code.new_label("before_failed"),
            before_done: code.new_label("before_done"),
            before_next: code.new_label("before_next"),
            invoke_original: code.new_label("invoke_original"),
            original_failed: code.new_label("original_failed"),
            after_entry: code.new_label("after_entry"),
            after_loop: code.new_label("after_loop"),
            after_failed: code.new_label("after_failed"),
            restore_result: code.new_label("restore_result"),
            after_next: code.new_label("after_next"),
            rethrow: code.new_label("rethrow"),
        }
    }
}

/// Emits the hook body for one signature.
///
/// # Examples
///
/// ```rust
/// use hookgen::emitter::CallbackChainEmitter;
/// use hookgen::metadata::{resolve, MemberFlags, MethodDescriptor, TypeTag};
///
/// let add = MethodDescriptor::method("app.Math", "add")
///     .with_flags(MemberFlags::STATIC)
///     .params([TypeTag::INT, TypeTag::INT])
///     .returns(TypeTag::INT);
/// let signature = resolve(&add)?;
///
/// let body = CallbackChainEmitter::new(&signature).emit()?;
/// assert_eq!(body.name(), "hook");
/// assert_eq!(body.param_count(), 2);
/// # Ok::<(), hookgen::Error>(())
/// ```
pub struct CallbackChainEmitter<'a> {
    signature: &'a ResolvedSignature,
}

impl<'a> CallbackChainEmitter<'a> {
    /// Creates an emitter for `signature`.
    #[must_use]
    pub fn new(signature: &'a ResolvedSignature) -> Self {
        Self { signature }
    }

    /// Emits and finalizes the hook body.
    ///
    /// # Errors
    ///
    /// Returns an error only if the emitted IR is inconsistent, which indicates a defect in
    /// the emitter rather than a property of the target.
    pub fn emit(&self) -> Result<MethodBody> {
        let mut code = CodeBuilder::new(
            EntryPointKind::Hook.to_string(),
            &self.signature.parameter_types,
            self.signature.return_type.clone(),
        );
        let locals = HookLocals::allocate(&mut code)?;
        let labels = HookLabels::allocate(&mut code);

        self.emit_gate(&mut code, &locals, &labels);
        self.emit_record(&mut code, &locals);
        self.emit_before_loop(&mut code, &locals, &labels)?;
        self.emit_original_call(&mut code, &locals, &labels)?;
        self.emit_after_loop(&mut code, &locals, &labels)?;
        self.emit_finish(&mut code, &locals, &labels)?;
        self.emit_bypass(&mut code, &locals, &labels)?;

        code.finalize()
    }

    fn declared_params<'l>(&self, locals: &'l HookLocals) -> &'l [Local] {
        &locals.params[self.signature.first_argument_slot()..]
    }

    fn declared_types(&self) -> &[TypeTag] {
        &self.signature.parameter_types[self.signature.first_argument_slot()..]
    }

    fn emit_gate(&self, code: &mut CodeBuilder, locals: &HookLocals, labels: &HookLabels) {
        code.emit(Instruction::Const {
            dst: locals.one,
            value: Constant::Int(1),
        });
        code.emit(Instruction::Const {
            dst: locals.null_obj,
            value: Constant::Null,
        });

        code.emit(Instruction::HooksDisabled {
            dst: locals.disabled,
        });
        code.emit(Instruction::IfZero {
            cmp: Comparison::Ne,
            src: locals.disabled,
            target: labels.bypass,
        });

        code.emit(Instruction::GetStatic {
            dst: locals.info,
            field: StaticField::HookInfo,
        });
        code.emit(Instruction::Snapshot {
            dst: locals.snapshot,
            chain: locals.info,
        });
        code.emit(Instruction::ArrayLength {
            dst: locals.snapshot_len,
            array: locals.snapshot,
        });
        code.emit(Instruction::IfZero {
            cmp: Comparison::Eq,
            src: locals.snapshot_len,
            target: labels.bypass,
        });
    }

    fn emit_record(&self, code: &mut CodeBuilder, locals: &HookLocals) {
        if self.signature.is_static {
            code.emit(Instruction::Const {
                dst: locals.this_object,
                value: Constant::Null,
            });
        } else {
            code.emit(Instruction::Move {
                dst: locals.this_object,
                src: locals.params[0],
            });
        }

        let declared = self.declared_params(locals);
        code.emit(Instruction::Const {
            dst: locals.arg_count,
            value: Constant::Int(declared.len() as i32),
        });
        code.emit(Instruction::NewArray {
            dst: locals.args,
            element: TypeTag::Object,
            length: locals.arg_count,
        });

        let temp = locals.results.object();
        for (position, (param, tag)) in declared.iter().zip(self.declared_types()).enumerate() {
            emit_box(code, temp, *param, tag);
            code.emit(Instruction::Const {
                dst: locals.arg_index,
                value: Constant::Int(position as i32),
            });
            code.emit(Instruction::ArrayPut {
                array: locals.args,
                index: locals.arg_index,
                src: temp,
            });
        }

        code.emit(Instruction::GetStatic {
            dst: locals.method,
            field: StaticField::Method,
        });
        code.emit(Instruction::NewRecord {
            dst: locals.record,
            method: locals.method,
            this_object: locals.this_object,
            args: locals.args,
        });
        code.emit(Instruction::Const {
            dst: locals.index,
            value: Constant::Int(0),
        });
    }

    fn emit_before_loop(
        &self,
        code: &mut CodeBuilder,
        locals: &HookLocals,
        labels: &HookLabels,
    ) -> Result<()> {
        code.mark(labels.before_loop)?;
        code.add_catch_clause(labels.before_failed);
        code.emit(Instruction::ArrayGet {
            dst: locals.callback,
            array: locals.snapshot,
            index: locals.index,
        });
        code.emit(Instruction::InvokeCallback {
            callback: locals.callback,
            record: locals.record,
            phase: HookPhase::Before,
        });
        code.emit(Instruction::Goto {
            target: labels.before_done,
        });
        code.remove_catch_clause()?;

        // Failure: report, clear the result and cancel any requested early return
        code.mark(labels.before_failed)?;
        code.emit(Instruction::MoveException {
            dst: locals.throwable,
        });
        code.emit(Instruction::Report {
            phase: HookPhase::Before,
            index: locals.index,
            src: locals.throwable,
        });
        code.emit(Instruction::RecordCall {
            dst: None,
            record: locals.record,
            method: RecordMethod::SetResult,
            arg: Some(locals.null_obj),
        });
        code.emit(Instruction::Const {
            dst: locals.return_early,
            value: Constant::Boolean(false),
        });
        code.emit(Instruction::RecordPut {
            record: locals.record,
            field: RecordField::ReturnEarly,
            src: locals.return_early,
        });
        code.emit(Instruction::Goto {
            target: labels.before_next,
        });

        code.mark(labels.before_done)?;
        code.emit(Instruction::RecordGet {
            dst: locals.return_early,
            record: locals.record,
            field: RecordField::ReturnEarly,
        });
        code.emit(Instruction::IfZero {
            cmp: Comparison::Eq,
            src: locals.return_early,
            target: labels.before_next,
        });
        // The callback that returned early still gets its after phase
        code.emit(Instruction::BinOp {
            op: BinaryOp::Add,
            dst: locals.index,
            lhs: locals.index,
            rhs: locals.one,
        });
        code.emit(Instruction::Goto {
            target: labels.invoke_original,
        });

        code.mark(labels.before_next)?;
        code.emit(Instruction::BinOp {
            op: BinaryOp::Add,
            dst: locals.index,
            lhs: locals.index,
            rhs: locals.one,
        });
        code.emit(Instruction::IfCmp {
            cmp: Comparison::Lt,
            lhs: locals.index,
            rhs: locals.snapshot_len,
            target: labels.before_loop,
        });
        Ok(())
    }

    fn emit_original_call(
        &self,
        code: &mut CodeBuilder,
        locals: &HookLocals,
        labels: &HookLabels,
    ) -> Result<()> {
        code.mark(labels.invoke_original)?;
        code.emit(Instruction::RecordGet {
            dst: locals.return_early,
            record: locals.record,
            field: RecordField::ReturnEarly,
        });
        code.emit(Instruction::IfZero {
            cmp: Comparison::Ne,
            src: locals.return_early,
            target: labels.after_entry,
        });

        code.add_catch_clause(labels.original_failed);

        // Callbacks may have replaced arguments; the receiver is passed as received
        let temp = locals.results.object();
        for (position, (param, tag)) in self
            .declared_params(locals)
            .iter()
            .zip(self.declared_types())
            .enumerate()
        {
            code.emit(Instruction::Const {
                dst: locals.arg_index,
                value: Constant::Int(position as i32),
            });
            code.emit(Instruction::ArrayGet {
                dst: temp,
                array: locals.args,
                index: locals.arg_index,
            });
            emit_unbox(code, *param, temp, tag);
        }

        let return_type = &self.signature.return_type;
        match locals.results.for_type(return_type) {
            None => {
                code.emit(Instruction::InvokeStatic {
                    dst: None,
                    method: EntryPointKind::Backup,
                    args: locals.params.clone(),
                });
                code.emit(Instruction::RecordCall {
                    dst: None,
                    record: locals.record,
                    method: RecordMethod::SetResult,
                    arg: Some(locals.null_obj),
                });
            }
            Some(returned) => {
                code.emit(Instruction::InvokeStatic {
                    dst: Some(returned),
                    method: EntryPointKind::Backup,
                    args: locals.params.clone(),
                });
                emit_box(code, temp, returned, return_type);
                code.emit(Instruction::RecordCall {
                    dst: None,
                    record: locals.record,
                    method: RecordMethod::SetResult,
                    arg: Some(temp),
                });
            }
        }
        code.emit(Instruction::Goto {
            target: labels.after_entry,
        });
        code.remove_catch_clause()?;

        code.mark(labels.original_failed)?;
        code.emit(Instruction::MoveException {
            dst: locals.throwable,
        });
        code.emit(Instruction::RecordCall {
            dst: None,
            record: locals.record,
            method: RecordMethod::SetThrowable,
            arg: Some(locals.throwable),
        });
        Ok(())
    }

    fn emit_after_loop(
        &self,
        code: &mut CodeBuilder,
        locals: &HookLocals,
        labels: &HookLabels,
    ) -> Result<()> {
        code.mark(labels.after_entry)?;
        code.emit(Instruction::BinOp {
            op: BinaryOp::Sub,
            dst: locals.index,
            lhs: locals.index,
            rhs: locals.one,
        });

        code.mark(labels.after_loop)?;
        code.emit(Instruction::RecordCall {
            dst: Some(locals.last_result),
            record: locals.record,
            method: RecordMethod::GetResult,
            arg: None,
        });
        code.emit(Instruction::RecordCall {
            dst: Some(locals.last_throwable),
            record: locals.record,
            method: RecordMethod::GetThrowable,
            arg: None,
        });
        code.add_catch_clause(labels.after_failed);
        code.emit(Instruction::ArrayGet {
            dst: locals.callback,
            array: locals.snapshot,
            index: locals.index,
        });
        code.emit(Instruction::InvokeCallback {
            callback: locals.callback,
            record: locals.record,
            phase: HookPhase::After,
        });
        code.emit(Instruction::Goto {
            target: labels.after_next,
        });
        code.remove_catch_clause()?;

        // Failure: report and restore what the callback saw
        code.mark(labels.after_failed)?;
        code.emit(Instruction::MoveException {
            dst: locals.throwable,
        });
        code.emit(Instruction::Report {
            phase: HookPhase::After,
            index: locals.index,
            src: locals.throwable,
        });
        code.emit(Instruction::IfZero {
            cmp: Comparison::Eq,
            src: locals.last_throwable,
            target: labels.restore_result,
        });
        code.emit(Instruction::RecordCall {
            dst: None,
            record: locals.record,
            method: RecordMethod::SetThrowable,
            arg: Some(locals.last_throwable),
        });
        code.emit(Instruction::Goto {
            target: labels.after_next,
        });
        code.mark(labels.restore_result)?;
        code.emit(Instruction::RecordCall {
            dst: None,
            record: locals.record,
            method: RecordMethod::SetResult,
            arg: Some(locals.last_result),
        });

        code.mark(labels.after_next)?;
        code.emit(Instruction::BinOp {
            op: BinaryOp::Sub,
            dst: locals.index,
            lhs: locals.index,
            rhs: locals.one,
        });
        code.emit(Instruction::IfZero {
            cmp: Comparison::Ge,
            src: locals.index,
            target: labels.after_loop,
        });
        Ok(())
    }

    fn emit_finish(
        &self,
        code: &mut CodeBuilder,
        locals: &HookLocals,
        labels: &HookLabels,
    ) -> Result<()> {
        code.emit(Instruction::RecordCall {
            dst: Some(locals.has_throwable),
            record: locals.record,
            method: RecordMethod::HasThrowable,
            arg: None,
        });
        code.emit(Instruction::IfZero {
            cmp: Comparison::Ne,
            src: locals.has_throwable,
            target: labels.rethrow,
        });

        let return_type = &self.signature.return_type;
        match locals.results.for_type(return_type) {
            None => code.emit(Instruction::ReturnVoid),
            Some(returned) => {
                let result = locals.results.object();
                code.emit(Instruction::RecordCall {
                    dst: Some(result),
                    record: locals.record,
                    method: RecordMethod::GetResult,
                    arg: None,
                });
                if return_type.is_primitive() {
                    // Narrow through the matching box so a wrong kind fails as a cast
                    let boxed_type = return_type.boxed();
                    let boxed = locals.results.for_type(&boxed_type).ok_or_else(|| {
                        malformed_error!("No result local for {}", boxed_type)
                    })?;
                    emit_unbox(code, boxed, result, &boxed_type);
                    emit_unbox(code, returned, boxed, return_type);
                    code.emit(Instruction::Return { src: returned });
                } else {
                    code.emit(Instruction::Return { src: result });
                }
            }
        }

        code.mark(labels.rethrow)?;
        code.emit(Instruction::RecordCall {
            dst: Some(locals.throwable),
            record: locals.record,
            method: RecordMethod::GetThrowable,
            arg: None,
        });
        code.emit(Instruction::Throw {
            src: locals.throwable,
        });
        Ok(())
    }

    fn emit_bypass(
        &self,
        code: &mut CodeBuilder,
        locals: &HookLocals,
        labels: &HookLabels,
    ) -> Result<()> {
        code.mark(labels.bypass)?;
        match locals.results.for_type(&self.signature.return_type) {
            None => {
                code.emit(Instruction::InvokeStatic {
                    dst: None,
                    method: EntryPointKind::Backup,
                    args: locals.params.clone(),
                });
                code.emit(Instruction::ReturnVoid);
            }
            Some(returned) => {
                code.emit(Instruction::InvokeStatic {
                    dst: Some(returned),
                    method: EntryPointKind::Backup,
                    args: locals.params.clone(),
                });
                code.emit(Instruction::Return { src: returned });
            }
        }
        Ok(())
    }
}
