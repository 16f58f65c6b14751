//! Failures that travel through generated code.
//!
//! A [`Throwable`] is a catchable failure: what the original method raises, what a callback
//! returns from a failed hook, or what the interpreter synthesizes for runtime faults such
//! as dereferencing `null`. Throwables are reference values. Two clones of the same
//! throwable compare equal, two separately created ones never do, which is what lets callers
//! verify that the exact failure of the original method came out of the hook.

use std::{any::Any, fmt, sync::Arc};

/// Class name of failures raised when `null` is dereferenced or unboxed.
pub const NULL_REFERENCE_CLASS: &str = "hookgen.NullReference";
/// Class name of failures raised by an invalid cast or unboxing of the wrong kind.
pub const INVALID_CAST_CLASS: &str = "hookgen.InvalidCast";
/// Class name of failures raised by out-of-range array accesses.
pub const INDEX_OUT_OF_RANGE_CLASS: &str = "hookgen.IndexOutOfRange";
/// Class name of failures raised when an operation is not valid in the current state.
pub const ILLEGAL_STATE_CLASS: &str = "hookgen.IllegalState";
/// Class name of failures converted from a panic.
pub const PANIC_CLASS: &str = "hookgen.Panic";

struct ThrowableInner {
    class_name: String,
    message: Option<String>,
    cause: Option<Throwable>,
}

/// A catchable failure with reference identity.
///
/// # Examples
///
/// ```rust
/// use hookgen::runtime::Throwable;
///
/// let failure = Throwable::new("app.IoFailure", "disk full");
/// let same = failure.clone();
///
/// assert_eq!(failure, same);
/// assert_ne!(failure, Throwable::new("app.IoFailure", "disk full"));
/// assert_eq!(failure.to_string(), "app.IoFailure: disk full");
/// ```
#[derive(Clone)]
pub struct Throwable(Arc<ThrowableInner>);

impl Throwable {
    /// Creates a throwable of the given class with a message.
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::build(class_name.into(), Some(message.into()), None)
    }

    /// Creates a throwable of the given class without a message.
    pub fn of_class(class_name: impl Into<String>) -> Self {
        Self::build(class_name.into(), None, None)
    }

    /// Creates a throwable that wraps a cause.
    pub fn with_cause(
        class_name: impl Into<String>,
        message: impl Into<String>,
        cause: Throwable,
    ) -> Self {
        Self::build(class_name.into(), Some(message.into()), Some(cause))
    }

    fn build(class_name: String, message: Option<String>, cause: Option<Throwable>) -> Self {
        Throwable(Arc::new(ThrowableInner {
            class_name,
            message,
            cause,
        }))
    }

    /// Failure raised for a `null` dereference.
    pub fn null_reference(message: impl Into<String>) -> Self {
        Self::new(NULL_REFERENCE_CLASS, message)
    }

    /// Failure raised for a failed cast.
    pub fn invalid_cast(message: impl Into<String>) -> Self {
        Self::new(INVALID_CAST_CLASS, message)
    }

    /// Failure raised for an out-of-range array index.
    pub fn index_out_of_range(index: i32, length: usize) -> Self {
        Self::new(
            INDEX_OUT_OF_RANGE_CLASS,
            format!("index {index} out of range for length {length}"),
        )
    }

    /// Failure raised for an operation that is invalid in the current state.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(ILLEGAL_STATE_CLASS, message)
    }

    /// Converts a panic payload into a throwable.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "panic with a non-string payload".to_string()
        };
        Self::new(PANIC_CLASS, message)
    }

    /// Class name of this throwable.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.0.class_name
    }

    /// Message of this throwable, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.0.message.as_deref()
    }

    /// The wrapped cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&Throwable> {
        self.0.cause.as_ref()
    }

    /// Returns `true` if this is an instance of the given class.
    #[must_use]
    pub fn is_instance_of(&self, class_name: &str) -> bool {
        self.0.class_name == class_name
    }

    /// Returns `true` if both handles refer to the same failure.
    #[must_use]
    pub fn same_as(&self, other: &Throwable) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Throwable {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Throwable {}

impl fmt::Debug for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throwable")
            .field("class_name", &self.0.class_name)
            .field("message", &self.0.message)
            .field("cause", &self.0.cause)
            .finish()
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.message {
            Some(message) => write!(f, "{}: {}", self.0.class_name, message),
            None => write!(f, "{}", self.0.class_name),
        }
    }
}

impl std::error::Error for Throwable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0
            .cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity() {
        let a = Throwable::illegal_state("x");
        let b = Throwable::illegal_state("x");
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
        assert!(a.is_instance_of(ILLEGAL_STATE_CLASS));
    }

    #[test]
    fn cause_chain() {
        let root = Throwable::of_class("app.Root");
        let wrapped = Throwable::with_cause("app.Wrapper", "outer", root.clone());
        assert_eq!(wrapped.cause(), Some(&root));
        assert_eq!(root.to_string(), "app.Root");
        assert!(std::error::Error::source(&wrapped).is_some());
    }

    #[test]
    fn panic_payloads() {
        let result = std::panic::catch_unwind(|| panic!("boom {}", 7));
        let throwable = Throwable::from_panic(result.unwrap_err());
        assert_eq!(throwable.class_name(), PANIC_CLASS);
        assert_eq!(throwable.message(), Some("boom 7"));

        let result = std::panic::catch_unwind(|| panic!("static"));
        assert_eq!(
            Throwable::from_panic(result.unwrap_err()).message(),
            Some("static")
        );
    }
}
