//! Instructions of the intermediate representation.
//!
//! The IR is register based: every instruction reads and writes typed [`Local`]s, control
//! flow goes through [`Label`]s that the [`crate::ir::CodeBuilder`] resolves to instruction
//! offsets, and failures are routed to catch handlers recorded alongside the code.
//!
//! Besides generic operations (constants, moves, arrays, boxing, comparisons and branches),
//! the instruction set has a few operations specific to hook bodies: reading the hooks
//! switch, snapshotting a callback chain, building and manipulating an invocation record,
//! invoking a callback phase and reporting a swallowed failure.

use std::fmt;

use strum::{Display, EnumCount, EnumIter};

use crate::{
    metadata::types::TypeTag,
    runtime::{callback::HookPhase, record::RecordField},
};

/// A typed IR register. Parameters occupy the first locals of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Local(pub u16);

impl Local {
    /// Position of the local in the frame.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A branch or handler target, resolved when the body is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl Label {
    /// Position of the label in the builder's label table.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// The two static fields of a generated unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum StaticField {
    /// The member handle of the hook target
    #[strum(serialize = "method")]
    Method,
    /// The callback chain of the hook target
    #[strum(serialize = "additionalHookInfo")]
    HookInfo,
}

impl StaticField {
    /// Declared type of the field.
    #[must_use]
    pub fn field_type(self) -> TypeTag {
        match self {
            StaticField::Method => TypeTag::class(crate::metadata::types::MEMBER_CLASS),
            StaticField::HookInfo => TypeTag::class(crate::metadata::types::CHAIN_INFO_CLASS),
        }
    }
}

/// The four entry points of a generated unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount)]
pub enum EntryPointKind {
    /// Stores the member handle and callback chain
    #[strum(serialize = "setup")]
    Setup,
    /// Placeholder for the original implementation
    #[strum(serialize = "backup")]
    Backup,
    /// Runs the callback chain around the backup
    #[strum(serialize = "hook")]
    Hook,
    /// Forwards to the backup
    #[strum(serialize = "callBackup")]
    CallBackup,
}

/// Comparison of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Comparison {
    /// equal
    Eq,
    /// not equal
    Ne,
    /// less than
    Lt,
    /// greater than or equal
    Ge,
    /// greater than
    Gt,
    /// less than or equal
    Le,
}

impl Comparison {
    /// Evaluates the comparison on an ordering.
    #[must_use]
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Comparison::Eq => ordering == Equal,
            Comparison::Ne => ordering != Equal,
            Comparison::Lt => ordering == Less,
            Comparison::Ge => ordering != Less,
            Comparison::Gt => ordering == Greater,
            Comparison::Le => ordering != Greater,
        }
    }
}

/// Arithmetic operation on `int` locals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    /// wrapping addition
    Add,
    /// wrapping subtraction
    Sub,
}

/// Methods of an invocation record callable from generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "camelCase")]
pub enum RecordMethod {
    /// `set_result(arg)`
    SetResult,
    /// `set_throwable(arg)`
    SetThrowable,
    /// `result()`
    GetResult,
    /// `throwable()`
    GetThrowable,
    /// `has_throwable()`
    HasThrowable,
}

/// An immediate value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    /// `null`
    Null,
    /// boolean immediate
    Boolean(bool),
    /// byte immediate
    Byte(i8),
    /// char immediate
    Char(u16),
    /// short immediate
    Short(i16),
    /// int immediate
    Int(i32),
    /// long immediate
    Long(i64),
    /// float immediate
    Float(f32),
    /// double immediate
    Double(f64),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => write!(f, "null"),
            Constant::Boolean(v) => write!(f, "{v}"),
            Constant::Byte(v) => write!(f, "{v}b"),
            Constant::Char(v) => write!(f, "'\\u{v:04x}'"),
            Constant::Short(v) => write!(f, "{v}s"),
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Long(v) => write!(f, "{v}L"),
            Constant::Float(v) => write!(f, "{v}f"),
            Constant::Double(v) => write!(f, "{v}d"),
        }
    }
}

/// A single IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `dst = value`
    Const {
        /// destination
        dst: Local,
        /// immediate
        value: Constant,
    },
    /// `dst = src`
    Move {
        /// destination
        dst: Local,
        /// source
        src: Local,
    },
    /// `dst = <unit>.field`
    GetStatic {
        /// destination
        dst: Local,
        /// field to read
        field: StaticField,
    },
    /// `<unit>.field = src`, allowed once per field
    PutStatic {
        /// field to write
        field: StaticField,
        /// source
        src: Local,
    },
    /// `dst = hooks switch is disabled`
    HooksDisabled {
        /// boolean destination
        dst: Local,
    },
    /// `dst = chain.snapshot()` as an array of callbacks
    Snapshot {
        /// array destination
        dst: Local,
        /// callback chain
        chain: Local,
    },
    /// `dst = new element[length]`
    NewArray {
        /// array destination
        dst: Local,
        /// element type
        element: TypeTag,
        /// int length
        length: Local,
    },
    /// `dst = array.length`
    ArrayLength {
        /// int destination
        dst: Local,
        /// array
        array: Local,
    },
    /// `dst = array[index]`
    ArrayGet {
        /// destination
        dst: Local,
        /// array
        array: Local,
        /// int index
        index: Local,
    },
    /// `array[index] = src`
    ArrayPut {
        /// array
        array: Local,
        /// int index
        index: Local,
        /// source
        src: Local,
    },
    /// `dst = box(src)`
    Box {
        /// reference destination
        dst: Local,
        /// primitive source
        src: Local,
    },
    /// `dst = unbox(src)` as a primitive of the target type
    Unbox {
        /// primitive destination
        dst: Local,
        /// reference source
        src: Local,
        /// primitive target type
        target: TypeTag,
    },
    /// `dst = (target) src`
    Cast {
        /// reference destination
        dst: Local,
        /// reference source
        src: Local,
        /// reference target type
        target: TypeTag,
    },
    /// `dst = new InvocationRecord(method, this_object, args)`
    NewRecord {
        /// record destination
        dst: Local,
        /// member handle
        method: Local,
        /// receiver or null
        this_object: Local,
        /// boxed argument array
        args: Local,
    },
    /// `dst = record.field`
    RecordGet {
        /// destination
        dst: Local,
        /// record
        record: Local,
        /// field to read
        field: RecordField,
    },
    /// `record.field = src` without side effects
    RecordPut {
        /// record
        record: Local,
        /// field to write
        field: RecordField,
        /// source
        src: Local,
    },
    /// `dst = record.method(arg)`
    RecordCall {
        /// destination of getters
        dst: Option<Local>,
        /// record
        record: Local,
        /// called method
        method: RecordMethod,
        /// argument of setters
        arg: Option<Local>,
    },
    /// `callback.<phase>_hooked_method(record)`, may throw
    InvokeCallback {
        /// callback
        callback: Local,
        /// record
        record: Local,
        /// phase to invoke
        phase: HookPhase,
    },
    /// `dst = <unit>.method(args...)`, may throw
    InvokeStatic {
        /// result destination, absent for `void`
        dst: Option<Local>,
        /// entry point to call
        method: EntryPointKind,
        /// arguments in entry-point order
        args: Vec<Local>,
    },
    /// Reports a swallowed callback failure to the diagnostic sink.
    Report {
        /// phase that failed
        phase: HookPhase,
        /// int position of the callback in the snapshot
        index: Local,
        /// the throwable
        src: Local,
    },
    /// `dst = lhs op rhs` on `int`s
    BinOp {
        /// operation
        op: BinaryOp,
        /// int destination
        dst: Local,
        /// left operand
        lhs: Local,
        /// right operand
        rhs: Local,
    },
    /// Unconditional branch.
    Goto {
        /// target
        target: Label,
    },
    /// Branches if `src cmp 0`. References compare as `0` when `null`.
    IfZero {
        /// comparison
        cmp: Comparison,
        /// int, boolean or reference operand
        src: Local,
        /// target
        target: Label,
    },
    /// Branches if `lhs cmp rhs` on `int`s.
    IfCmp {
        /// comparison
        cmp: Comparison,
        /// left operand
        lhs: Local,
        /// right operand
        rhs: Local,
        /// target
        target: Label,
    },
    /// First instruction of a catch handler: `dst = caught throwable`.
    MoveException {
        /// throwable destination
        dst: Local,
    },
    /// Returns from a `void` body.
    ReturnVoid,
    /// Returns `src`.
    Return {
        /// returned value
        src: Local,
    },
    /// Throws `src`.
    Throw {
        /// throwable
        src: Local,
    },
}

impl Instruction {
    /// Branch target of this instruction, if any.
    #[must_use]
    pub fn branch_target(&self) -> Option<Label> {
        match self {
            Instruction::Goto { target }
            | Instruction::IfZero { target, .. }
            | Instruction::IfCmp { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Returns `true` if execution never falls through to the next instruction.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Goto { .. }
                | Instruction::ReturnVoid
                | Instruction::Return { .. }
                | Instruction::Throw { .. }
        )
    }

    /// Returns `true` if this instruction can raise a throwable.
    #[must_use]
    pub fn may_throw(&self) -> bool {
        !matches!(
            self,
            Instruction::Const { .. }
                | Instruction::Move { .. }
                | Instruction::GetStatic { .. }
                | Instruction::HooksDisabled { .. }
                | Instruction::Box { .. }
                | Instruction::Report { .. }
                | Instruction::BinOp { .. }
                | Instruction::Goto { .. }
                | Instruction::IfCmp { .. }
                | Instruction::IfZero { .. }
                | Instruction::MoveException { .. }
                | Instruction::ReturnVoid
                | Instruction::Return { .. }
        )
    }
}

fn write_locals(f: &mut fmt::Formatter<'_>, locals: &[Local]) -> fmt::Result {
    for (i, local) in locals.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{local}")?;
    }
    Ok(())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Const { dst, value } => write!(f, "const {dst}, {value}"),
            Instruction::Move { dst, src } => write!(f, "move {dst}, {src}"),
            Instruction::GetStatic { dst, field } => write!(f, "sget {dst}, {field}"),
            Instruction::PutStatic { field, src } => write!(f, "sput {field}, {src}"),
            Instruction::HooksDisabled { dst } => write!(f, "hooks-disabled {dst}"),
            Instruction::Snapshot { dst, chain } => write!(f, "snapshot {dst}, {chain}"),
            Instruction::NewArray {
                dst,
                element,
                length,
            } => write!(f, "new-array {dst}, {element}[{length}]"),
            Instruction::ArrayLength { dst, array } => write!(f, "array-length {dst}, {array}"),
            Instruction::ArrayGet { dst, array, index } => {
                write!(f, "aget {dst}, {array}[{index}]")
            }
            Instruction::ArrayPut { array, index, src } => {
                write!(f, "aput {array}[{index}], {src}")
            }
            Instruction::Box { dst, src } => write!(f, "box {dst}, {src}"),
            Instruction::Unbox { dst, src, target } => write!(f, "unbox {dst}, {src} as {target}"),
            Instruction::Cast { dst, src, target } => write!(f, "cast {dst}, {src} as {target}"),
            Instruction::NewRecord {
                dst,
                method,
                this_object,
                args,
            } => write!(f, "new-record {dst}, {method}, {this_object}, {args}"),
            Instruction::RecordGet { dst, record, field } => {
                write!(f, "iget {dst}, {record}.{field}")
            }
            Instruction::RecordPut { record, field, src } => {
                write!(f, "iput {record}.{field}, {src}")
            }
            Instruction::RecordCall {
                dst,
                record,
                method,
                arg,
            } => {
                write!(f, "invoke-record ")?;
                if let Some(dst) = dst {
                    write!(f, "{dst} = ")?;
                }
                write!(f, "{record}.{method}(")?;
                if let Some(arg) = arg {
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Instruction::InvokeCallback {
                callback,
                record,
                phase,
            } => write!(f, "invoke-callback {callback}.{phase}({record})"),
            Instruction::InvokeStatic { dst, method, args } => {
                write!(f, "invoke-static ")?;
                if let Some(dst) = dst {
                    write!(f, "{dst} = ")?;
                }
                write!(f, "{method}(")?;
                write_locals(f, args)?;
                write!(f, ")")
            }
            Instruction::Report { phase, index, src } => {
                write!(f, "report {phase}[{index}], {src}")
            }
            Instruction::BinOp { op, dst, lhs, rhs } => write!(f, "{op}-int {dst}, {lhs}, {rhs}"),
            Instruction::Goto { target } => write!(f, "goto {target}"),
            Instruction::IfZero { cmp, src, target } => write!(f, "if-{cmp}z {src}, {target}"),
            Instruction::IfCmp {
                cmp,
                lhs,
                rhs,
                target,
            } => write!(f, "if-{cmp} {lhs}, {rhs}, {target}"),
            Instruction::MoveException { dst } => write!(f, "move-exception {dst}"),
            Instruction::ReturnVoid => write!(f, "return-void"),
            Instruction::Return { src } => write!(f, "return {src}"),
            Instruction::Throw { src } => write!(f, "throw {src}"),
        }
    }
}
