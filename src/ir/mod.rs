//! Intermediate representation of generated code.
//!
//! Generated units are not machine code. Their methods are [`MethodBody`]s: sequences of
//! register-based [`Instruction`]s over typed [`Local`]s, with [`Label`]s resolved to
//! instruction offsets and [`CatchRange`]s routing failures to handlers. Bodies are built
//! with a [`CodeBuilder`] and executed by [`crate::runtime::interpreter`].
//!
//! # Key Components
//!
//! - [`instruction`] - The instruction set and its operand types
//! - [`code`] - [`CodeBuilder`], with label and catch-clause bookkeeping
//! - [`body`] - [`MethodBody`], the checked result, and its textual listing

/// Finalized method bodies
pub mod body;
/// Incremental construction of method bodies
pub mod code;
/// The instruction set
pub mod instruction;

pub use body::{CatchRange, MethodBody};
pub use code::CodeBuilder;
pub use instruction::{
    BinaryOp, Comparison, Constant, EntryPointKind, Instruction, Label, Local, RecordMethod,
    StaticField,
};
