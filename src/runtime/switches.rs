//! Process-wide switches consulted by generated code.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

/// A shared flag that bypasses every callback chain while set.
///
/// Generated hook bodies read the flag once per invocation, before taking the callback
/// snapshot. While it is set, a hook behaves exactly like its backup. Units use the
/// process-wide [`HooksSwitch::global`] unless configured otherwise.
#[derive(Debug, Clone, Default)]
pub struct HooksSwitch(Arc<AtomicBool>);

impl HooksSwitch {
    /// Creates an independent, enabled switch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide switch.
    pub fn global() -> HooksSwitch {
        static GLOBAL: OnceLock<HooksSwitch> = OnceLock::new();
        GLOBAL.get_or_init(HooksSwitch::new).clone()
    }

    /// Bypasses all callback chains using this switch.
    pub fn disable(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Re-enables the callback chains.
    pub fn enable(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Returns `true` while hooks are bypassed.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns `true` if both handles control the same flag.
    #[must_use]
    pub fn same_as(&self, other: &HooksSwitch) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_switches() {
        let a = HooksSwitch::new();
        let b = HooksSwitch::new();
        a.disable();
        assert!(a.is_disabled());
        assert!(!b.is_disabled());
        a.enable();
        assert!(!a.is_disabled());
    }

    #[test]
    fn global_is_shared() {
        assert!(HooksSwitch::global().same_as(&HooksSwitch::global()));
        assert!(!HooksSwitch::global().same_as(&HooksSwitch::new()));
    }
}
