//! # hookgen Prelude
//!
//! Convenient re-exports of the types needed to describe a target, generate its
//! trampoline and register callbacks.
//!
//! ```rust
//! use hookgen::prelude::*;
//!
//! let target = MethodDescriptor::method("app.Log", "write").param(TypeTag::Str);
//! assert_eq!(target.name(), "write");
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all hookgen operations
pub use crate::Error;

/// The result type used throughout hookgen
pub use crate::Result;

// ================================================================================================
// Generation
// ================================================================================================

/// Generation facade and its product
pub use crate::{Trampoline, TrampolineGenerator};

/// Generator configuration
pub use crate::config::TrampolineConfig;

/// Entry point names
pub use crate::ir::EntryPointKind;

// ================================================================================================
// Target Descriptions
// ================================================================================================

/// Member descriptors and type tags
pub use crate::metadata::{MemberFlags, MemberKind, MethodDescriptor, PrimitiveKind, TypeTag};

// ================================================================================================
// Runtime
// ================================================================================================

/// Callbacks and the callback chain
pub use crate::runtime::{
    CallbackChainInfo, CallbackHandle, ClosureCallback, HookCallback, HookPhase, HookPriority,
};

/// Values, failures and invocation records
pub use crate::runtime::{InvocationRecord, Member, Throwable, Value};

/// Loading and execution
pub use crate::runtime::{EntryPoint, HooksSwitch, Interpreter, LoadContext, UnitLoader};

/// Diagnostics
pub use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};
