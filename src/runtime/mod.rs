//! Runtime support for generated units.
//!
//! Everything generated code touches while it runs lives here: the value model, failures,
//! the invocation record handed to callbacks, the callback chain itself, the process-wide
//! hooks switch, the loader that makes units callable and the interpreter that executes
//! their bodies.
//!
//! # Key Components
//!
//! - [`value`] - [`Value`] and heap [`Object`]s
//! - [`throwable`] - [`Throwable`], the catchable failure type of generated code
//! - [`record`] - [`InvocationRecord`], the per-call state shared by all callbacks
//! - [`callback`] - [`HookCallback`] and the priority-ordered [`CallbackChainInfo`]
//! - [`member`] - [`Member`] handles stored in a unit's `method` field
//! - [`switches`] - [`HooksSwitch`]
//! - [`loader`] - [`UnitLoader`], [`LoadedUnit`] and [`EntryPoint`]
//! - [`interpreter`] - [`Interpreter`]

/// Callback capability and chain
pub mod callback;
/// Body execution
pub mod interpreter;
/// Unit loading
pub mod loader;
/// Member handles
pub mod member;
/// Invocation records
pub mod record;
/// Process-wide switches
pub mod switches;
/// Failures
pub mod throwable;
/// Runtime values
pub mod value;

pub use callback::{
    CallbackChainInfo, CallbackHandle, CallbackSnapshot, ClosureCallback, HookCallback,
    HookPhase, HookPriority,
};
pub use interpreter::{Interpreter, StepResult};
pub use loader::{EntryPoint, LoadContext, LoadedUnit, UnitLoader};
pub use member::{Member, NativeMethod};
pub use record::{InvocationRecord, RecordField};
pub use switches::HooksSwitch;
pub use throwable::Throwable;
pub use value::{Object, ObjectRef, Value};
