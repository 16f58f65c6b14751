//! Callback capability and the priority-ordered callback chain.
//!
//! A [`HookCallback`] is invoked around every call of a hooked target: its
//! `before_hooked_method` before the original runs, its `after_hooked_method` afterwards.
//! A [`CallbackChainInfo`] owns the set of callbacks registered for one target and hands
//! out immutable snapshots of it. Generated code takes exactly one snapshot per invocation,
//! so registration changes never affect a call that is already in flight.
//!
//! # Ordering
//!
//! Callbacks are ordered by descending [`HookPriority`]; callbacks of equal priority keep
//! their registration order. Before callbacks run in snapshot order, after callbacks run
//! in reverse.
//!
//! # Examples
//!
//! ```rust
//! use hookgen::runtime::{CallbackChainInfo, ClosureCallback, HookPriority, Value};
//! use std::sync::Arc;
//!
//! let chain = Arc::new(CallbackChainInfo::new());
//!
//! chain.register(
//!     ClosureCallback::new("deny").before(|record| {
//!         record.set_result(Value::Boolean(false).boxed());
//!         Ok(())
//!     }),
//!     HookPriority::HIGH,
//! );
//!
//! assert_eq!(chain.len(), 1);
//! assert_eq!(chain.snapshot().len(), 1);
//! ```

use std::{
    cmp::Reverse,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crossbeam_skiplist::SkipMap;
use strum::{Display, EnumIter};

use crate::runtime::{record::InvocationRecord, throwable::Throwable};

/// A callback invoked around calls of a hooked target.
///
/// Both methods default to doing nothing. Returning an error (or panicking) is reported
/// to the diagnostic sink and recovered from: a failing before callback cannot skip the
/// original call, and a failing after callback cannot change the outcome.
pub trait HookCallback: Send + Sync {
    /// Called before the original method runs.
    ///
    /// Calling [`InvocationRecord::set_result`] or [`InvocationRecord::set_throwable`] here
    /// skips the original method and all remaining before callbacks.
    ///
    /// # Errors
    ///
    /// A returned failure is reported and swallowed.
    fn before_hooked_method(&self, record: &mut InvocationRecord) -> Result<(), Throwable> {
        let _ = record;
        Ok(())
    }

    /// Called after the original method ran or was skipped.
    ///
    /// # Errors
    ///
    /// A returned failure is reported and swallowed; the outcome seen before this
    /// callback is restored.
    fn after_hooked_method(&self, record: &mut InvocationRecord) -> Result<(), Throwable> {
        let _ = record;
        Ok(())
    }

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "callback"
    }
}

/// The two callback phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum HookPhase {
    /// Before the original method
    Before,
    /// After the original method
    After,
}

/// Priority of a registered callback.
///
/// Higher priority callbacks run their before phase first and their after phase last.
///
/// | Constant | Value |
/// |----------|-------|
/// | [`HIGHEST`](Self::HIGHEST) | 1000 |
/// | [`HIGH`](Self::HIGH) | 500 |
/// | [`NORMAL`](Self::NORMAL) | 0 |
/// | [`LOW`](Self::LOW) | -500 |
/// | [`LOWEST`](Self::LOWEST) | -1000 |
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HookPriority(pub i32);

impl HookPriority {
    /// Highest priority (value: 1000).
    pub const HIGHEST: Self = Self(1000);
    /// High priority (value: 500).
    pub const HIGH: Self = Self(500);
    /// Normal priority, the default (value: 0).
    pub const NORMAL: Self = Self(0);
    /// Low priority (value: -500).
    pub const LOW: Self = Self(-500);
    /// Lowest priority (value: -1000).
    pub const LOWEST: Self = Self(-1000);
}

/// Closure type for a callback phase.
pub type PhaseFn = Arc<dyn Fn(&mut InvocationRecord) -> Result<(), Throwable> + Send + Sync>;

/// A [`HookCallback`] assembled from closures.
///
/// ```rust
/// use hookgen::runtime::ClosureCallback;
///
/// let logger = ClosureCallback::new("logger")
///     .before(|record| {
///         println!("called with {} argument(s)", record.arg_count());
///         Ok(())
///     })
///     .after(|record| {
///         println!("returned {}", record.result());
///         Ok(())
///     });
/// ```
#[derive(Clone)]
pub struct ClosureCallback {
    name: String,
    before: Option<PhaseFn>,
    after: Option<PhaseFn>,
}

impl ClosureCallback {
    /// Creates a callback that does nothing in either phase.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: None,
            after: None,
        }
    }

    /// Sets the before phase.
    #[must_use]
    pub fn before<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut InvocationRecord) -> Result<(), Throwable> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(handler));
        self
    }

    /// Sets the after phase.
    #[must_use]
    pub fn after<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut InvocationRecord) -> Result<(), Throwable> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(handler));
        self
    }
}

impl HookCallback for ClosureCallback {
    fn before_hooked_method(&self, record: &mut InvocationRecord) -> Result<(), Throwable> {
        match &self.before {
            Some(handler) => handler(record),
            None => Ok(()),
        }
    }

    fn after_hooked_method(&self, record: &mut InvocationRecord) -> Result<(), Throwable> {
        match &self.after {
            Some(handler) => handler(record),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ClosureCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureCallback")
            .field("name", &self.name)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// Handle returned by [`CallbackChainInfo::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle {
    priority: HookPriority,
    seq: u64,
}

impl CallbackHandle {
    /// Priority the callback was registered with.
    #[must_use]
    pub fn priority(&self) -> HookPriority {
        self.priority
    }
}

type ChainKey = (Reverse<i32>, u64);

/// An immutable, ordered view of a callback chain.
pub type CallbackSnapshot = Arc<[Arc<dyn HookCallback>]>;

/// The priority-ordered callback set of one hook target.
///
/// Registration and removal are lock-free and may happen concurrently with invocations.
#[derive(Default)]
pub struct CallbackChainInfo {
    callbacks: SkipMap<ChainKey, Arc<dyn HookCallback>>,
    next_seq: AtomicU64,
}

impl CallbackChainInfo {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback with the given priority.
    pub fn register(
        &self,
        callback: impl HookCallback + 'static,
        priority: HookPriority,
    ) -> CallbackHandle {
        self.register_arc(Arc::new(callback), priority)
    }

    /// Registers an already shared callback.
    pub fn register_arc(
        &self,
        callback: Arc<dyn HookCallback>,
        priority: HookPriority,
    ) -> CallbackHandle {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.callbacks.insert((Reverse(priority.0), seq), callback);
        CallbackHandle { priority, seq }
    }

    /// Removes a callback. Returns `false` if it was not registered.
    pub fn unregister(&self, handle: CallbackHandle) -> bool {
        self.callbacks
            .remove(&(Reverse(handle.priority.0), handle.seq))
            .is_some()
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns `true` if no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Takes an ordered snapshot of the registered callbacks.
    pub fn snapshot(&self) -> CallbackSnapshot {
        self.callbacks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl fmt::Debug for CallbackChainInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackChainInfo")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(snapshot: &CallbackSnapshot) -> Vec<String> {
        snapshot.iter().map(|cb| cb.name().to_string()).collect()
    }

    #[test]
    fn priority_then_registration_order() {
        let chain = CallbackChainInfo::new();
        chain.register(ClosureCallback::new("normal-1"), HookPriority::NORMAL);
        chain.register(ClosureCallback::new("low"), HookPriority::LOW);
        chain.register(ClosureCallback::new("highest"), HookPriority::HIGHEST);
        chain.register(ClosureCallback::new("normal-2"), HookPriority::NORMAL);

        assert_eq!(
            names(&chain.snapshot()),
            vec!["highest", "normal-1", "normal-2", "low"]
        );
    }

    #[test]
    fn snapshot_is_immutable() {
        let chain = CallbackChainInfo::new();
        let handle = chain.register(ClosureCallback::new("a"), HookPriority(750));
        let snapshot = chain.snapshot();

        assert!(chain.unregister(handle));
        assert!(!chain.unregister(handle));
        assert!(chain.is_empty());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(handle.priority(), HookPriority(750));
    }

    #[test]
    fn default_phases_are_noops() {
        struct Silent;
        impl HookCallback for Silent {}

        let mut record = InvocationRecord::new(
            crate::runtime::Value::Null,
            crate::runtime::Value::Null,
            vec![],
        );
        assert!(Silent.before_hooked_method(&mut record).is_ok());
        assert!(Silent.after_hooked_method(&mut record).is_ok());
        assert!(!record.returns_early());
        assert_eq!(Silent.name(), "callback");
    }
}
