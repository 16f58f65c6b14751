//! Runtime values of generated code.
//!
//! [`Value`] is what flows through IR locals, entry-point arguments and results. Primitives
//! are stored inline. Everything else is an [`ObjectRef`], a shared handle to an [`Object`]
//! on the heap: boxed primitives, strings, arrays, user instances and the handful of
//! runtime objects generated code manipulates directly (member handles, the callback chain,
//! callbacks, invocation records and throwables).
//!
//! # Equality
//!
//! Primitives compare by value. Boxed primitives and strings compare by content, matching
//! how callers naturally write assertions about results. All other objects compare by
//! identity.

use std::{
    any::Any,
    fmt,
    sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    metadata::types::{
        PrimitiveKind, TypeTag, CALLBACK_CLASS, CHAIN_INFO_CLASS, MEMBER_CLASS, RECORD_CLASS,
        THROWABLE_CLASS,
    },
    runtime::{
        callback::{CallbackChainInfo, HookCallback},
        member::Member,
        record::InvocationRecord,
        throwable::Throwable,
    },
};

/// A heap object.
pub enum Object {
    /// A boxed primitive. The inner value is always a primitive.
    Boxed(Value),
    /// An immutable string.
    Str(String),
    /// An array with a fixed element type.
    Array {
        /// Declared element type
        element: TypeTag,
        /// Elements, mutable through the shared handle
        items: RwLock<Vec<Value>>,
    },
    /// An instance of a host class, carrying arbitrary state.
    Instance {
        /// Name of the class
        class_name: String,
        /// Host-defined state
        state: Box<dyn Any + Send + Sync>,
    },
    /// Handle of a hook target.
    Member(Member),
    /// The callback chain of a hook target.
    ChainInfo(Arc<CallbackChainInfo>),
    /// A single callback of a snapshot.
    Callback(Arc<dyn HookCallback>),
    /// The per-call invocation record.
    Record(Mutex<InvocationRecord>),
    /// A failure.
    Throwable(Throwable),
}

impl Object {
    /// Name of the runtime class of this object.
    #[must_use]
    pub fn class_name(&self) -> String {
        match self {
            Object::Boxed(value) => value
                .primitive_kind()
                .map_or("Object", PrimitiveKind::boxed_name)
                .to_string(),
            Object::Str(_) => "String".to_string(),
            Object::Array { element, .. } => format!("{element}[]"),
            Object::Instance { class_name, .. } => class_name.clone(),
            Object::Member(_) => MEMBER_CLASS.to_string(),
            Object::ChainInfo(_) => CHAIN_INFO_CLASS.to_string(),
            Object::Callback(_) => CALLBACK_CLASS.to_string(),
            Object::Record(_) => RECORD_CLASS.to_string(),
            Object::Throwable(throwable) => throwable.class_name().to_string(),
        }
    }

    /// Returns `true` if this object may be stored in a location of type `tag`.
    ///
    /// There is no class hierarchy for host instances: an instance is accepted for any
    /// class tag that does not name one of the runtime's own classes.
    #[must_use]
    pub fn is_instance_of(&self, tag: &TypeTag) -> bool {
        match (tag, self) {
            (TypeTag::Object, _) => true,
            (TypeTag::Str, Object::Str(_)) => true,
            (TypeTag::Boxed(kind), Object::Boxed(value)) => value.primitive_kind() == Some(*kind),
            (TypeTag::Array(target), Object::Array { element, .. }) => {
                element == target.as_ref()
                    || (**target == TypeTag::Object && element.is_reference())
            }
            (TypeTag::Class(name), object) => match name.as_str() {
                MEMBER_CLASS => matches!(object, Object::Member(_)),
                CHAIN_INFO_CLASS => matches!(object, Object::ChainInfo(_)),
                CALLBACK_CLASS => matches!(object, Object::Callback(_)),
                RECORD_CLASS => matches!(object, Object::Record(_)),
                THROWABLE_CLASS => matches!(object, Object::Throwable(_)),
                _ => matches!(object, Object::Instance { .. } | Object::Throwable(_)),
            },
            _ => false,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Boxed(value) => write!(f, "Boxed({value:?})"),
            Object::Str(string) => write!(f, "Str({string:?})"),
            Object::Array { element, items } => match items.read() {
                Ok(items) => write!(f, "Array<{element}>({:?})", &*items),
                Err(_) => write!(f, "Array<{element}>(<poisoned>)"),
            },
            Object::Instance { class_name, .. } => write!(f, "Instance({class_name})"),
            Object::Member(member) => write!(f, "Member({})", member.descriptor()),
            Object::ChainInfo(chain) => write!(f, "ChainInfo(len={})", chain.len()),
            Object::Callback(_) => write!(f, "Callback"),
            Object::Record(_) => write!(f, "Record"),
            Object::Throwable(throwable) => write!(f, "Throwable({throwable})"),
        }
    }
}

/// Shared handle of a heap [`Object`].
#[derive(Clone, Debug)]
pub struct ObjectRef(Arc<Object>);

impl ObjectRef {
    /// Allocates a new object.
    pub fn new(object: Object) -> Self {
        ObjectRef(Arc::new(object))
    }

    /// Returns the referenced object.
    #[must_use]
    pub fn get(&self) -> &Object {
        &self.0
    }

    /// Returns `true` if both handles reference the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for ObjectRef {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.0
    }
}

/// A runtime value.
///
/// # Examples
///
/// ```rust
/// use hookgen::{metadata::TypeTag, runtime::Value};
///
/// let name = Value::string("config.json");
/// assert!(name.is_assignable_to(&TypeTag::Str));
/// assert!(!name.is_assignable_to(&TypeTag::INT));
/// assert!(Value::Null.is_assignable_to(&TypeTag::Str));
/// assert_eq!(Value::default_for(&TypeTag::INT), Value::Int(0));
/// ```
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// The absent result of a `void` method.
    #[default]
    Void,
    /// `boolean`
    Boolean(bool),
    /// `byte`
    Byte(i8),
    /// `char`
    Char(u16),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// The null reference.
    Null,
    /// A reference to a heap object.
    Object(ObjectRef),
}

impl Value {
    /// Allocates a string.
    pub fn string(value: impl Into<String>) -> Self {
        Value::Object(ObjectRef::new(Object::Str(value.into())))
    }

    /// Allocates an array with the given element type.
    pub fn array(element: TypeTag, items: Vec<Value>) -> Self {
        Value::Object(ObjectRef::new(Object::Array {
            element,
            items: RwLock::new(items),
        }))
    }

    /// Allocates an `Object[]`.
    pub fn object_array(items: Vec<Value>) -> Self {
        Value::array(TypeTag::Object, items)
    }

    /// Allocates a host instance carrying `state`.
    pub fn instance(class_name: impl Into<String>, state: impl Any + Send + Sync) -> Self {
        Value::Object(ObjectRef::new(Object::Instance {
            class_name: class_name.into(),
            state: Box::new(state),
        }))
    }

    /// Wraps a throwable as a value.
    pub fn throwable(throwable: Throwable) -> Self {
        Value::Object(ObjectRef::new(Object::Throwable(throwable)))
    }

    /// Boxes a primitive. References are returned unchanged.
    #[must_use]
    pub fn boxed(self) -> Self {
        if self.primitive_kind().is_some() {
            Value::Object(ObjectRef::new(Object::Boxed(self)))
        } else {
            self
        }
    }

    /// The default value of a location of type `tag`.
    #[must_use]
    pub fn default_for(tag: &TypeTag) -> Self {
        match tag {
            TypeTag::Void => Value::Void,
            TypeTag::Primitive(kind) => match kind {
                PrimitiveKind::Boolean => Value::Boolean(false),
                PrimitiveKind::Byte => Value::Byte(0),
                PrimitiveKind::Char => Value::Char(0),
                PrimitiveKind::Short => Value::Short(0),
                PrimitiveKind::Int => Value::Int(0),
                PrimitiveKind::Long => Value::Long(0),
                PrimitiveKind::Float => Value::Float(0.0),
                PrimitiveKind::Double => Value::Double(0.0),
            },
            _ => Value::Null,
        }
    }

    /// Primitive kind of an inline primitive value.
    #[must_use]
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Value::Boolean(_) => Some(PrimitiveKind::Boolean),
            Value::Byte(_) => Some(PrimitiveKind::Byte),
            Value::Char(_) => Some(PrimitiveKind::Char),
            Value::Short(_) => Some(PrimitiveKind::Short),
            Value::Int(_) => Some(PrimitiveKind::Int),
            Value::Long(_) => Some(PrimitiveKind::Long),
            Value::Float(_) => Some(PrimitiveKind::Float),
            Value::Double(_) => Some(PrimitiveKind::Double),
            Value::Void | Value::Null | Value::Object(_) => None,
        }
    }

    /// Short description of the value's kind, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Boolean(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Char(_) => "char",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Null => "null",
            Value::Object(object) => match object.get() {
                Object::Boxed(_) => "boxed primitive",
                Object::Str(_) => "String",
                Object::Array { .. } => "array",
                Object::Instance { .. } => "instance",
                Object::Member(_) => "member",
                Object::ChainInfo(_) => "callback chain",
                Object::Callback(_) => "callback",
                Object::Record(_) => "invocation record",
                Object::Throwable(_) => "throwable",
            },
        }
    }

    /// Returns `true` for the null reference.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` if this value may be stored in a location of type `tag`.
    #[must_use]
    pub fn is_assignable_to(&self, tag: &TypeTag) -> bool {
        match tag {
            TypeTag::Void => matches!(self, Value::Void),
            TypeTag::Primitive(kind) => self.primitive_kind() == Some(*kind),
            _ => match self {
                Value::Null => true,
                Value::Object(object) => object.is_instance_of(tag),
                _ => false,
            },
        }
    }

    /// Returns the referenced object, if any.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the content of a string object.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self.as_object()?.get() {
            Object::Str(string) => Some(string),
            _ => None,
        }
    }

    /// Returns the inline or boxed `int`.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self.unboxed_ref()? {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the inline or boxed `long`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self.unboxed_ref()? {
            Value::Long(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the inline or boxed `boolean`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.unboxed_ref()? {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the inline or boxed `double`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self.unboxed_ref()? {
            Value::Double(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the throwable carried by this value.
    #[must_use]
    pub fn as_throwable(&self) -> Option<&Throwable> {
        match self.as_object()?.get() {
            Object::Throwable(throwable) => Some(throwable),
            _ => None,
        }
    }

    /// Returns the member handle carried by this value.
    #[must_use]
    pub fn as_member(&self) -> Option<&Member> {
        match self.as_object()?.get() {
            Object::Member(member) => Some(member),
            _ => None,
        }
    }

    /// Downcasts the state of a host instance.
    #[must_use]
    pub fn instance_state<T: Any>(&self) -> Option<&T> {
        match self.as_object()?.get() {
            Object::Instance { state, .. } => state.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Read access to the elements of an array object.
    ///
    /// Returns `None` if this is not an array or its lock was poisoned.
    #[must_use]
    pub fn array_items(&self) -> Option<RwLockReadGuard<'_, Vec<Value>>> {
        match self.as_object()?.get() {
            Object::Array { items, .. } => items.read().ok(),
            _ => None,
        }
    }

    /// Write access to the elements of an array object.
    ///
    /// Returns `None` if this is not an array or its lock was poisoned.
    #[must_use]
    pub fn array_items_mut(&self) -> Option<RwLockWriteGuard<'_, Vec<Value>>> {
        match self.as_object()?.get() {
            Object::Array { items, .. } => items.write().ok(),
            _ => None,
        }
    }

    fn unboxed_ref(&self) -> Option<&Value> {
        match self {
            Value::Object(object) => match object.get() {
                Object::Boxed(value) => Some(value),
                _ => None,
            },
            Value::Void | Value::Null => None,
            primitive => Some(primitive),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                match (a.get(), b.get()) {
                    (Object::Boxed(a), Object::Boxed(b)) => a == b,
                    (Object::Str(a), Object::Str(b)) => a == b,
                    (Object::Throwable(a), Object::Throwable(b)) => a.same_as(b),
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Byte(value) => write!(f, "{value}"),
            Value::Char(value) => match char::from_u32(u32::from(*value)) {
                Some(c) => write!(f, "'{c}'"),
                None => write!(f, "'\\u{value:04x}'"),
            },
            Value::Short(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Long(value) => write!(f, "{value}L"),
            Value::Float(value) => write!(f, "{value}f"),
            Value::Double(value) => write!(f, "{value}"),
            Value::Null => write!(f, "null"),
            Value::Object(object) => match object.get() {
                Object::Boxed(value) => write!(f, "{value}"),
                Object::Str(string) => write!(f, "{string:?}"),
                other => write!(f, "{}", other.class_name()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_equality_is_by_content() {
        assert_eq!(Value::Int(5).boxed(), Value::Int(5).boxed());
        assert_ne!(Value::Int(5).boxed(), Value::Long(5).boxed());
        assert_ne!(Value::Int(5).boxed(), Value::Int(5));
        assert_eq!(Value::string("a"), Value::from("a"));
    }

    #[test]
    fn arrays_compare_by_identity() {
        let a = Value::object_array(vec![]);
        let b = Value::object_array(vec![]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn assignability() {
        let boxed = Value::Int(1).boxed();
        assert!(boxed.is_assignable_to(&TypeTag::Object));
        assert!(boxed.is_assignable_to(&TypeTag::Boxed(PrimitiveKind::Int)));
        assert!(!boxed.is_assignable_to(&TypeTag::Boxed(PrimitiveKind::Long)));
        assert!(!boxed.is_assignable_to(&TypeTag::INT));
        assert!(!Value::Null.is_assignable_to(&TypeTag::INT));

        let strings = Value::array(TypeTag::Str, vec![Value::string("x")]);
        assert!(strings.is_assignable_to(&TypeTag::array_of(TypeTag::Str)));
        assert!(strings.is_assignable_to(&TypeTag::object_array()));
        assert!(!strings.is_assignable_to(&TypeTag::array_of(TypeTag::INT)));

        let widget = Value::instance("app.Widget", 3_u32);
        assert!(widget.is_assignable_to(&TypeTag::class("app.Widget")));
        assert!(!widget.is_assignable_to(&TypeTag::Str));
        assert!(!widget.is_assignable_to(&TypeTag::class(RECORD_CLASS)));
        assert_eq!(widget.instance_state::<u32>(), Some(&3));
    }

    #[test]
    fn accessors_see_through_boxes() {
        assert_eq!(Value::Int(7).boxed().as_i32(), Some(7));
        assert_eq!(Value::Long(7).as_i64(), Some(7));
        assert_eq!(Value::Boolean(true).boxed().as_bool(), Some(true));
        assert_eq!(Value::Null.as_i32(), None);
        assert_eq!(Value::string("s").as_str(), Some("s"));
    }

    #[test]
    fn array_mutation_is_shared() {
        let array = Value::object_array(vec![Value::Null]);
        let alias = array.clone();
        alias.array_items_mut().unwrap()[0] = Value::string("changed");
        assert_eq!(array.array_items().unwrap()[0], Value::string("changed"));
    }
}
