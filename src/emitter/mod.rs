//! Code generation for hook targets.
//!
//! The emitters translate a resolved signature into IR. They never execute anything and
//! never touch runtime state beyond the process-wide unit-name counter.
//!
//! # Key Components
//!
//! - [`boxing`] - Primitive/object conversions, emitted and at runtime
//! - [`chain`] - [`CallbackChainEmitter`], the body of the hook entry point
//! - [`trampoline`] - [`TrampolineBuilder`], the complete unit

/// Primitive/object conversions
pub mod boxing;
/// Hook body emission
pub mod chain;
/// Unit declaration
pub mod trampoline;

pub use chain::CallbackChainEmitter;
pub use trampoline::{
    next_unit_name, FieldDefinition, MethodDefinition, TrampolineBuilder, UnitDefinition,
    DEFAULT_CLASS_NAME_PREFIX,
};
