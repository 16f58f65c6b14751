// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # hookgen
//!
//! A runtime trampoline generator for method hooking.
//!
//! Given the description of a method or constructor, `hookgen` generates a small unit of
//! code with four entry points sharing the target's calling convention:
//!
//! - `setup(member, info)` stores the target's member handle and its callback chain
//! - `backup(...)` stands in for the original implementation until one is bound to it
//! - `hook(...)` runs the callback chain around a call of `backup`
//! - `callBackup(...)` forwards to `backup`
//!
//! A patching layer redirects calls of the target to `hook` and binds the displaced
//! original to `backup`. Everything in between (boxing arguments, running before and after
//! callbacks, skipping the original on request, recovering from failing callbacks and
//! narrowing the result) happens in the generated code.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use hookgen::prelude::*;
//!
//! let add = MethodDescriptor::method("app.Calculator", "add")
//!     .with_flags(MemberFlags::STATIC)
//!     .params([TypeTag::INT, TypeTag::INT])
//!     .returns(TypeTag::INT);
//!
//! let chain = Arc::new(CallbackChainInfo::new());
//! let trampoline = TrampolineGenerator::new().start(add, Arc::clone(&chain), None, "/tmp/hooks")?;
//! trampoline.bind_backup(|args| {
//!     Ok(Value::Int(args[0].as_i32().unwrap_or(0) + args[1].as_i32().unwrap_or(0)))
//! })?;
//!
//! // Double the first argument before the original runs
//! chain.register(
//!     ClosureCallback::new("doubler").before(|record| {
//!         let first = record.arg(0).and_then(|v| v.as_i32()).unwrap_or(0);
//!         record.set_arg(0, Value::Int(first * 2).boxed())
//!     }),
//!     HookPriority::NORMAL,
//! );
//!
//! let result = trampoline.hook_method().invoke(&[Value::Int(2), Value::Int(3)])?;
//! assert_eq!(result, Value::Int(7));
//! # Ok::<(), hookgen::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - Target descriptors, type tags and signature resolution
//! - [`ir`] - The intermediate representation generated code is expressed in
//! - [`emitter`] - Generation of hook bodies and complete units
//! - [`runtime`] - Values, callbacks, invocation records, loading and interpretation
//! - [`diagnostics`] - The sink for swallowed callback failures
//! - [`config`] - Generator configuration
//! - [`Error`] and [`Result`] - Error handling
//!
//! Generated code is executed by an interpreter rather than compiled to machine code, so
//! units behave identically on every platform.

#[macro_use]
pub(crate) mod error;

/// Generator configuration
pub mod config;
/// Diagnostic sink
pub mod diagnostics;
/// Code generation
pub mod emitter;
/// Intermediate representation
pub mod ir;
/// Target descriptions
pub mod metadata;
/// Commonly used types
pub mod prelude;
/// Runtime support
pub mod runtime;

mod generator;

#[cfg(test)]
pub(crate) mod test;

pub use generator::{Trampoline, TrampolineGenerator};

/// `hookgen` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `hookgen` Error type
///
/// The main error type for all operations in this crate. Provides detailed error
/// information for generation, loading and invocation failures.
pub use error::Error;
