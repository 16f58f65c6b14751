//! Signature resolution for hook targets.
//!
//! Maps a [`MethodDescriptor`] onto the calling convention shared by all four entry points
//! of a generated unit. Instance members receive a leading `Object` receiver slot, return
//! types are normalized so that every reference result travels as `Object`, and members
//! without a concrete body are rejected before any code is generated.

use crate::{
    metadata::{
        member::{MemberKind, MethodDescriptor},
        types::TypeTag,
    },
    Error, Result,
};

/// The calling convention of a generated unit.
///
/// `parameter_types` and `actual_parameter_types` are identical today. They are kept apart
/// because the former describes IR parameter slots while the latter is the signature that
/// callers of the entry points have to honour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSignature {
    /// The target has no receiver
    pub is_static: bool,
    /// Types of the IR parameter slots, receiver first for instance members
    pub parameter_types: Vec<TypeTag>,
    /// Types of the entry-point parameters, receiver first for instance members
    pub actual_parameter_types: Vec<TypeTag>,
    /// Normalized return type
    pub return_type: TypeTag,
    /// The target declares exception types
    pub has_checked_exceptions: bool,
}

impl ResolvedSignature {
    /// Number of entry-point parameters, including the receiver.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.actual_parameter_types.len()
    }

    /// Number of declared parameters, excluding the receiver.
    #[must_use]
    pub fn declared_arity(&self) -> usize {
        self.actual_parameter_types.len() - usize::from(!self.is_static)
    }

    /// Index of the first declared parameter slot.
    #[must_use]
    pub fn first_argument_slot(&self) -> usize {
        usize::from(!self.is_static)
    }
}

/// Resolves the calling convention of a hook target.
///
/// # Arguments
///
/// * `descriptor` - The member to resolve
///
/// # Errors
///
/// Returns [`Error::UnsupportedTarget`] if the member is declared on an interface, is
/// abstract, or is neither a method nor a constructor. The checks run in that order.
///
/// # Examples
///
/// ```rust
/// use hookgen::metadata::{resolve, MemberFlags, MethodDescriptor, TypeTag};
///
/// let method = MethodDescriptor::method("app.Service", "name").returns(TypeTag::Str);
/// let signature = resolve(&method)?;
///
/// assert!(!signature.is_static);
/// assert_eq!(signature.actual_parameter_types, vec![TypeTag::Object]);
/// assert_eq!(signature.return_type, TypeTag::Object);
/// # Ok::<(), hookgen::Error>(())
/// ```
pub fn resolve(descriptor: &MethodDescriptor) -> Result<ResolvedSignature> {
    if descriptor.is_interface_member() {
        return Err(Error::UnsupportedTarget(format!(
            "cannot hook interface method: {descriptor}"
        )));
    }
    if descriptor.is_abstract() {
        return Err(Error::UnsupportedTarget(format!(
            "cannot hook abstract method: {descriptor}"
        )));
    }

    let (is_static, return_type) = match descriptor.kind() {
        MemberKind::Method => (
            descriptor.is_static(),
            descriptor.return_type().normalized_return(),
        ),
        MemberKind::Constructor => (false, TypeTag::Void),
        MemberKind::Field => {
            return Err(Error::UnsupportedTarget(format!(
                "only methods and constructors can be hooked: {descriptor}"
            )));
        }
    };

    let mut parameter_types = Vec::with_capacity(descriptor.parameter_types().len() + 1);
    if !is_static {
        parameter_types.push(TypeTag::Object);
    }
    parameter_types.extend(descriptor.parameter_types().iter().cloned());

    Ok(ResolvedSignature {
        is_static,
        actual_parameter_types: parameter_types.clone(),
        parameter_types,
        return_type,
        has_checked_exceptions: descriptor.declares_checked_exceptions(),
    })
}
