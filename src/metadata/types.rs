//! Type tags for parameters, return values and IR locals.
//!
//! A [`TypeTag`] is the only type information the generator needs: it decides how a
//! value crosses the boundary between the typed world of the hooked method and the
//! object-only world of callbacks, and which default a placeholder body returns.
//!
//! # Key Components
//!
//! - [`PrimitiveKind`] - The eight primitive kinds, each with a boxed counterpart
//! - [`TypeTag`] - A primitive, boxed, reference, array or `void` type
//! - Well-known class names used by generated code ([`MEMBER_CLASS`], [`CHAIN_INFO_CLASS`],
//!   [`CALLBACK_CLASS`], [`RECORD_CLASS`], [`THROWABLE_CLASS`])

use std::fmt;

use strum::{Display, EnumCount, EnumIter};

/// Class name of member handles stored in a generated unit.
pub const MEMBER_CLASS: &str = "hookgen.Member";
/// Class name of the callback-chain-info handle stored in a generated unit.
pub const CHAIN_INFO_CLASS: &str = "hookgen.CallbackChainInfo";
/// Class name of a single callback in a snapshot.
pub const CALLBACK_CLASS: &str = "hookgen.HookCallback";
/// Class name of the per-call invocation record.
pub const RECORD_CLASS: &str = "hookgen.InvocationRecord";
/// Class name of failures raised by callbacks, originals and generated code.
pub const THROWABLE_CLASS: &str = "hookgen.Throwable";

/// Primitive value kinds.
///
/// Every primitive kind has a boxed representation (see [`TypeTag::Boxed`]) that is
/// used whenever a value is handed to the callback layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum PrimitiveKind {
    /// boolean
    Boolean,
    /// signed 8bit integer
    Byte,
    /// 16bit code unit
    Char,
    /// signed 16bit integer
    Short,
    /// signed 32bit integer
    Int,
    /// signed 64bit integer
    Long,
    /// 32bit floating-point
    Float,
    /// 64bit floating-point
    Double,
}

impl PrimitiveKind {
    /// Returns the name of the boxed class for this kind (e.g. `Integer` for `int`).
    #[must_use]
    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Char => "Character",
            PrimitiveKind::Short => "Short",
            PrimitiveKind::Int => "Integer",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Double => "Double",
        }
    }

    /// Returns the single-character descriptor code of this kind.
    #[must_use]
    pub fn descriptor(self) -> char {
        match self {
            PrimitiveKind::Boolean => 'Z',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Char => 'C',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Double => 'D',
        }
    }
}

/// Type of a parameter, return value or IR local.
///
/// # Examples
///
/// ```rust
/// use hookgen::metadata::{PrimitiveKind, TypeTag};
///
/// assert!(TypeTag::INT.is_primitive());
/// assert_eq!(TypeTag::INT.boxed(), TypeTag::Boxed(PrimitiveKind::Int));
/// assert_eq!(TypeTag::Str.normalized_return(), TypeTag::Object);
/// assert_eq!(TypeTag::LONG.normalized_return(), TypeTag::LONG);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// No value
    Void,
    /// A primitive value
    Primitive(PrimitiveKind),
    /// The boxed object form of a primitive
    Boxed(PrimitiveKind),
    /// The root reference type
    Object,
    /// A string reference
    Str,
    /// Any other class, by name
    Class(String),
    /// An array of the element type
    Array(Box<TypeTag>),
}

impl TypeTag {
    /// `boolean`
    pub const BOOLEAN: TypeTag = TypeTag::Primitive(PrimitiveKind::Boolean);
    /// `byte`
    pub const BYTE: TypeTag = TypeTag::Primitive(PrimitiveKind::Byte);
    /// `char`
    pub const CHAR: TypeTag = TypeTag::Primitive(PrimitiveKind::Char);
    /// `short`
    pub const SHORT: TypeTag = TypeTag::Primitive(PrimitiveKind::Short);
    /// `int`
    pub const INT: TypeTag = TypeTag::Primitive(PrimitiveKind::Int);
    /// `long`
    pub const LONG: TypeTag = TypeTag::Primitive(PrimitiveKind::Long);
    /// `float`
    pub const FLOAT: TypeTag = TypeTag::Primitive(PrimitiveKind::Float);
    /// `double`
    pub const DOUBLE: TypeTag = TypeTag::Primitive(PrimitiveKind::Double);

    /// Creates a class type tag.
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        TypeTag::Class(name.into())
    }

    /// Creates an array type tag with the given element type.
    #[must_use]
    pub fn array_of(element: TypeTag) -> Self {
        TypeTag::Array(Box::new(element))
    }

    /// `Object[]`, the representation of argument arrays and callback snapshots.
    #[must_use]
    pub fn object_array() -> Self {
        TypeTag::array_of(TypeTag::Object)
    }

    /// Returns `true` for `void`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeTag::Void)
    }

    /// Returns `true` for the primitive kinds.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeTag::Primitive(_))
    }

    /// Returns `true` for every type that is represented by a reference.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        !matches!(self, TypeTag::Void | TypeTag::Primitive(_))
    }

    /// Returns the primitive kind, if this is a primitive type.
    #[must_use]
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            TypeTag::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Maps a primitive to its boxed counterpart; every other type maps to itself.
    #[must_use]
    pub fn boxed(&self) -> TypeTag {
        match self {
            TypeTag::Primitive(kind) => TypeTag::Boxed(*kind),
            other => other.clone(),
        }
    }

    /// Applies the return-type normalization rule of generated units.
    ///
    /// `void` and primitives pass through unchanged. Every reference type collapses to
    /// [`TypeTag::Object`], because results travel through the callback layer as objects.
    #[must_use]
    pub fn normalized_return(&self) -> TypeTag {
        match self {
            TypeTag::Void | TypeTag::Primitive(_) => self.clone(),
            _ => TypeTag::Object,
        }
    }

    /// Returns `true` if this is the given well-known class.
    #[must_use]
    pub fn is_class(&self, name: &str) -> bool {
        matches!(self, TypeTag::Class(class) if class == name)
    }
}

impl From<PrimitiveKind> for TypeTag {
    fn from(kind: PrimitiveKind) -> Self {
        TypeTag::Primitive(kind)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Void => write!(f, "void"),
            TypeTag::Primitive(kind) => write!(f, "{kind}"),
            TypeTag::Boxed(kind) => write!(f, "{}", kind.boxed_name()),
            TypeTag::Object => write!(f, "Object"),
            TypeTag::Str => write!(f, "String"),
            TypeTag::Class(name) => write!(f, "{name}"),
            TypeTag::Array(element) => write!(f, "{element}[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_return_normalization() {
        assert_eq!(TypeTag::Void.normalized_return(), TypeTag::Void);
        for kind in PrimitiveKind::iter() {
            let tag = TypeTag::from(kind);
            assert_eq!(tag.normalized_return(), tag);
        }
        assert_eq!(TypeTag::Str.normalized_return(), TypeTag::Object);
        assert_eq!(
            TypeTag::class("app.Config").normalized_return(),
            TypeTag::Object
        );
        assert_eq!(
            TypeTag::array_of(TypeTag::INT).normalized_return(),
            TypeTag::Object
        );
        assert_eq!(
            TypeTag::Boxed(PrimitiveKind::Int).normalized_return(),
            TypeTag::Object
        );
    }

    #[test]
    fn test_boxed_mapping() {
        assert_eq!(TypeTag::DOUBLE.boxed(), TypeTag::Boxed(PrimitiveKind::Double));
        assert_eq!(TypeTag::Object.boxed(), TypeTag::Object);
        assert_eq!(TypeTag::Str.boxed(), TypeTag::Str);
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeTag::INT.to_string(), "int");
        assert_eq!(TypeTag::Boxed(PrimitiveKind::Char).to_string(), "Character");
        assert_eq!(TypeTag::object_array().to_string(), "Object[]");
        assert_eq!(TypeTag::class("a.B").to_string(), "a.B");
    }

    #[test]
    fn test_reference_classification() {
        assert!(!TypeTag::Void.is_reference());
        assert!(!TypeTag::BOOLEAN.is_reference());
        assert!(TypeTag::Boxed(PrimitiveKind::Boolean).is_reference());
        assert!(TypeTag::Str.is_reference());
        assert_eq!(PrimitiveKind::COUNT, 8);
    }
}
