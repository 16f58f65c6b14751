//! Generator configuration.
//!
//! [`TrampolineConfig`] controls how units are named, which hooks switch their hook bodies
//! consult, where swallowed failures are reported and how many instructions a hook body
//! may execute between two calls.
//!
//! # Example
//!
//! ```rust
//! use hookgen::{config::TrampolineConfig, runtime::HooksSwitch};
//!
//! let switch = HooksSwitch::new();
//! let config = TrampolineConfig::new()
//!     .with_class_name_prefix("Trampoline")
//!     .with_hooks_switch(switch.clone())
//!     .with_step_limit(50_000);
//!
//! assert_eq!(config.class_name_prefix, "Trampoline");
//! assert!(config.hooks_switch.same_as(&switch));
//! ```

use std::sync::Arc;

use crate::{
    diagnostics::Diagnostics, emitter::DEFAULT_CLASS_NAME_PREFIX, runtime::HooksSwitch,
};

/// Default number of instructions an entry-point call may execute between two calls.
pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// Default number of diagnostic entries a generator's sink retains.
pub const DEFAULT_MAX_DIAGNOSTICS: usize = 10_000;

/// Configuration shared by every unit a generator produces.
///
/// # Default Values
///
/// | Setting | Default Value |
/// |---------|---------------|
/// | `class_name_prefix` | `"EdHooker"` |
/// | `hooks_switch` | [`HooksSwitch::global()`] |
/// | `diagnostics` | an empty sink retaining [`DEFAULT_MAX_DIAGNOSTICS`] entries |
/// | `step_limit` | 1,000,000 |
#[derive(Clone, Debug)]
pub struct TrampolineConfig {
    /// Prefix of generated unit names. A process-wide counter supplies the suffix.
    pub class_name_prefix: String,

    /// Switch consulted at the start of every hook invocation.
    ///
    /// While disabled, hook bodies forward straight to the backup.
    pub hooks_switch: HooksSwitch,

    /// Sink for swallowed callback failures and generation events.
    pub diagnostics: Arc<Diagnostics>,

    /// Maximum instructions an entry-point call may execute without calling a callback or
    /// the backup.
    ///
    /// Guards against malformed bodies that loop forever. Each call resets the count, so
    /// the length of the callback chain is not limited. Set to 0 for no limit.
    pub step_limit: u64,
}

impl Default for TrampolineConfig {
    fn default() -> Self {
        Self {
            class_name_prefix: DEFAULT_CLASS_NAME_PREFIX.to_string(),
            hooks_switch: HooksSwitch::global(),
            diagnostics: Arc::new(Diagnostics::bounded(DEFAULT_MAX_DIAGNOSTICS)),
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

impl TrampolineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unit name prefix.
    #[must_use]
    pub fn with_class_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.class_name_prefix = prefix.into();
        self
    }

    /// Sets the hooks switch.
    #[must_use]
    pub fn with_hooks_switch(mut self, switch: HooksSwitch) -> Self {
        self.hooks_switch = switch;
        self
    }

    /// Sets the diagnostic sink.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Replaces the diagnostic sink with an empty one retaining at most `max_entries`
    /// entries. `0` means unbounded.
    #[must_use]
    pub fn with_max_diagnostics(mut self, max_entries: usize) -> Self {
        self.diagnostics = Arc::new(Diagnostics::bounded(max_entries));
        self
    }

    /// Sets the step limit.
    #[must_use]
    pub fn with_step_limit(mut self, step_limit: u64) -> Self {
        self.step_limit = step_limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TrampolineConfig::default();
        assert_eq!(config.class_name_prefix, "EdHooker");
        assert_eq!(config.step_limit, DEFAULT_STEP_LIMIT);
        assert!(config.hooks_switch.same_as(&HooksSwitch::global()));
        assert!(config.diagnostics.is_empty());
        assert_eq!(config.diagnostics.max_entries(), DEFAULT_MAX_DIAGNOSTICS);
    }

    #[test]
    fn builder_overrides() {
        let sink = Arc::new(Diagnostics::new());
        let config = TrampolineConfig::new()
            .with_diagnostics(Arc::clone(&sink))
            .with_step_limit(0);
        assert!(Arc::ptr_eq(&config.diagnostics, &sink));
        assert_eq!(config.step_limit, 0);

        let bounded = config.with_max_diagnostics(16);
        assert_eq!(bounded.diagnostics.max_entries(), 16);
        assert!(!Arc::ptr_eq(&bounded.diagnostics, &sink));
    }
}
