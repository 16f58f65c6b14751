//! Member handles stored in generated units.

use std::{fmt, sync::Arc};

use crate::{
    metadata::member::MethodDescriptor,
    runtime::{throwable::Throwable, value::Value},
};

/// A host implementation of a method.
///
/// Receives the entry-point arguments (receiver first for instance members) and returns
/// the result, or the failure it raised. Used for the original behaviour bound to a backup
/// entry point and for the optional capability of a [`Member`].
pub type NativeMethod = Arc<dyn Fn(&[Value]) -> Result<Value, Throwable> + Send + Sync>;

/// Opaque handle of a hook target.
///
/// Carries the target's descriptor and, optionally, a capability to invoke the target's
/// original implementation directly. Callbacks see the handle through
/// [`crate::runtime::InvocationRecord::member`].
#[derive(Clone)]
pub struct Member {
    descriptor: Arc<MethodDescriptor>,
    original: Option<NativeMethod>,
}

impl Member {
    /// Creates a handle without an invocation capability.
    pub fn new(descriptor: impl Into<Arc<MethodDescriptor>>) -> Self {
        Self {
            descriptor: descriptor.into(),
            original: None,
        }
    }

    /// Attaches a capability that invokes the original implementation.
    #[must_use]
    pub fn with_original<F>(mut self, original: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.original = Some(Arc::new(original));
        self
    }

    /// The target's descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &Arc<MethodDescriptor> {
        &self.descriptor
    }

    /// Returns `true` if the handle can invoke the original implementation.
    #[must_use]
    pub fn has_original(&self) -> bool {
        self.original.is_some()
    }

    /// Invokes the original implementation, bypassing all callbacks.
    ///
    /// # Errors
    ///
    /// Returns whatever the implementation raised, or an `IllegalState` throwable if the
    /// handle carries no invocation capability.
    pub fn invoke_original(&self, args: &[Value]) -> Result<Value, Throwable> {
        match &self.original {
            Some(original) => original(args),
            None => Err(Throwable::illegal_state(format!(
                "no original implementation attached to {}",
                self.descriptor
            ))),
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("descriptor", &self.descriptor.to_string())
            .field("has_original", &self.original.is_some())
            .finish()
    }
}
