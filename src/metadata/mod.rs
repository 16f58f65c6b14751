//! Descriptions of hook targets and their calling conventions.
//!
//! This module holds everything the generator knows about a target before it emits a
//! single instruction: the [`TypeTag`]s of parameters and results, the [`MethodDescriptor`]
//! of the member itself, and the [`ResolvedSignature`] derived from it.
//!
//! # Key Components
//!
//! - [`types`] - Primitive kinds, type tags and well-known class names
//! - [`member`] - Member descriptors and modifier flags
//! - [`signature`] - Resolution of the shared entry-point signature
//!
//! # Examples
//!
//! ```rust
//! use hookgen::metadata::{resolve, MemberFlags, MethodDescriptor, TypeTag};
//!
//! let add = MethodDescriptor::method("app.Math", "add")
//!     .with_flags(MemberFlags::STATIC)
//!     .params([TypeTag::INT, TypeTag::INT])
//!     .returns(TypeTag::INT);
//!
//! let signature = resolve(&add)?;
//! assert!(signature.is_static);
//! assert_eq!(signature.arity(), 2);
//! # Ok::<(), hookgen::Error>(())
//! ```

/// Member descriptors and modifier flags
pub mod member;
/// Signature resolution for hook targets
pub mod signature;
/// Type tags and primitive kinds
pub mod types;

pub use member::{MemberFlags, MemberKind, MethodDescriptor};
pub use signature::{resolve, ResolvedSignature};
pub use types::{PrimitiveKind, TypeTag};
