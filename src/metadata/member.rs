//! Descriptors of hookable members.
//!
//! A [`MethodDescriptor`] is the immutable description of a hook target as produced by
//! whatever inspects the host's object model: kind, modifiers, parameter types, return
//! type and declared exceptions. It drives every generation decision.

use std::fmt;

use bitflags::bitflags;

use crate::metadata::types::TypeTag;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Modifiers of a member and its declaring type
    pub struct MemberFlags: u32 {
        /// Member is publicly accessible
        const PUBLIC = 0x0001;
        /// Member is private to its declaring type
        const PRIVATE = 0x0002;
        /// Member is static (no receiver)
        const STATIC = 0x0008;
        /// Member cannot be overridden
        const FINAL = 0x0010;
        /// Member is synchronized on its receiver or class
        const SYNCHRONIZED = 0x0020;
        /// Member is implemented natively
        const NATIVE = 0x0100;
        /// The declaring type is an interface
        const INTERFACE = 0x0200;
        /// Member has no body
        const ABSTRACT = 0x0400;
    }
}

/// The kind of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// A regular method
    Method,
    /// An instance initializer
    Constructor,
    /// A field or any other member that has no code
    Field,
}

/// Immutable description of a hook target.
///
/// # Examples
///
/// ```rust
/// use hookgen::metadata::{MemberFlags, MethodDescriptor, TypeTag};
///
/// let add = MethodDescriptor::method("app.Calculator", "add")
///     .with_flags(MemberFlags::PUBLIC)
///     .param(TypeTag::INT)
///     .param(TypeTag::INT)
///     .returns(TypeTag::INT);
///
/// assert!(!add.is_static());
/// assert_eq!(add.parameter_types().len(), 2);
/// assert_eq!(add.to_string(), "int app.Calculator.add(int, int)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    declaring_type: String,
    name: String,
    kind: MemberKind,
    flags: MemberFlags,
    parameter_types: Vec<TypeTag>,
    return_type: TypeTag,
    exception_types: Vec<String>,
}

impl MethodDescriptor {
    /// Creates a descriptor of a `void`, parameterless method.
    #[must_use]
    pub fn method(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(declaring_type.into(), name.into(), MemberKind::Method)
    }

    /// Creates a descriptor of a parameterless constructor.
    #[must_use]
    pub fn constructor(declaring_type: impl Into<String>) -> Self {
        Self::new(declaring_type.into(), "<init>".to_string(), MemberKind::Constructor)
    }

    /// Creates a descriptor of a field, which can never be hooked.
    #[must_use]
    pub fn field(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(declaring_type.into(), name.into(), MemberKind::Field)
    }

    fn new(declaring_type: String, name: String, kind: MemberKind) -> Self {
        Self {
            declaring_type,
            name,
            kind,
            flags: MemberFlags::empty(),
            parameter_types: Vec::new(),
            return_type: TypeTag::Void,
            exception_types: Vec::new(),
        }
    }

    /// Replaces the modifier flags.
    #[must_use]
    pub fn with_flags(mut self, flags: MemberFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Appends a parameter type.
    #[must_use]
    pub fn param(mut self, parameter: TypeTag) -> Self {
        self.parameter_types.push(parameter);
        self
    }

    /// Appends several parameter types.
    #[must_use]
    pub fn params(mut self, parameters: impl IntoIterator<Item = TypeTag>) -> Self {
        self.parameter_types.extend(parameters);
        self
    }

    /// Sets the declared return type.
    #[must_use]
    pub fn returns(mut self, return_type: TypeTag) -> Self {
        self.return_type = return_type;
        self
    }

    /// Adds a declared exception type.
    #[must_use]
    pub fn throws(mut self, exception: impl Into<String>) -> Self {
        self.exception_types.push(exception.into());
        self
    }

    /// Name of the declaring type.
    #[must_use]
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Member name (`<init>` for constructors).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member kind.
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Modifier flags.
    #[must_use]
    pub fn flags(&self) -> MemberFlags {
        self.flags
    }

    /// Declared parameter types, without any receiver.
    #[must_use]
    pub fn parameter_types(&self) -> &[TypeTag] {
        &self.parameter_types
    }

    /// Declared return type (`void` for constructors).
    #[must_use]
    pub fn return_type(&self) -> &TypeTag {
        &self.return_type
    }

    /// Declared exception types.
    #[must_use]
    pub fn exception_types(&self) -> &[String] {
        &self.exception_types
    }

    /// Returns `true` if the member has no receiver.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    /// Returns `true` if the member has no body.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MemberFlags::ABSTRACT)
    }

    /// Returns `true` if the member is declared on an interface.
    #[must_use]
    pub fn is_interface_member(&self) -> bool {
        self.flags.contains(MemberFlags::INTERFACE)
    }

    /// Returns `true` if the member declares any exception types.
    #[must_use]
    pub fn declares_checked_exceptions(&self) -> bool {
        !self.exception_types.is_empty()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == MemberKind::Field {
            return write!(f, "field {}.{}", self.declaring_type, self.name);
        }

        write!(f, "{} {}.{}(", self.return_type, self.declaring_type, self.name)?;
        for (index, parameter) in self.parameter_types.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{parameter}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_defaults() {
        let ctor = MethodDescriptor::constructor("app.Widget").param(TypeTag::Str);
        assert_eq!(ctor.kind(), MemberKind::Constructor);
        assert_eq!(ctor.name(), "<init>");
        assert_eq!(ctor.return_type(), &TypeTag::Void);
        assert!(!ctor.is_static());
    }

    #[test]
    fn test_flags() {
        let method = MethodDescriptor::method("app.Tool", "run")
            .with_flags(MemberFlags::STATIC | MemberFlags::PUBLIC)
            .throws("app.IoFailure");
        assert!(method.is_static());
        assert!(!method.is_abstract());
        assert!(!method.is_interface_member());
        assert!(method.declares_checked_exceptions());
    }

    #[test]
    fn test_display() {
        let method = MethodDescriptor::method("app.Log", "write")
            .param(TypeTag::Str)
            .param(TypeTag::LONG);
        assert_eq!(method.to_string(), "void app.Log.write(String, long)");
        assert_eq!(
            MethodDescriptor::field("app.Log", "level").to_string(),
            "field app.Log.level"
        );
    }
}
