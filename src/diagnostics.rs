//! Diagnostics collection for generation and hook invocation.
//!
//! Callback failures inside a hook body never reach the caller: the hook protocol reports
//! them and carries on. This module is where they end up. Generation and loading events
//! are recorded as informational entries next to them, so a single [`Diagnostics`] gives a
//! complete account of what a [`crate::TrampolineGenerator`] did.
//!
//! Every entry is also emitted as a `tracing` event. Entries reported with
//! [`DiagnosticSeverity::Warning`] or above log at `warn`, informational ones at `debug`.
//!
//! # Key Components
//!
//! - [`Diagnostics`] - Thread-safe container for diagnostic entries
//! - [`Diagnostic`] - Individual diagnostic entry with severity and context
//! - [`DiagnosticSeverity`] - Severity level (Info, Warning, Error)
//! - [`DiagnosticCategory`] - Category of the diagnostic source
//!
//! # Usage Examples
//!
//! ```rust
//! use hookgen::diagnostics::{DiagnosticCategory, Diagnostics};
//! use std::sync::Arc;
//!
//! let diagnostics = Arc::new(Diagnostics::new());
//!
//! diagnostics.warning(
//!     DiagnosticCategory::Callback,
//!     "before callback 0 of app.Log.write failed: IllegalState",
//! );
//!
//! assert!(diagnostics.has_warnings());
//! for entry in diagnostics.by_category(DiagnosticCategory::Callback) {
//!     println!("{entry}");
//! }
//! ```
//!
//! # Thread Safety
//!
//! All types in this module are [`Send`] and [`Sync`]. The [`Diagnostics`] container
//! uses `boxcar::Vec` internally, which provides lock-free concurrent append operations,
//! so hook invocations on many threads can report into the same sink.

use std::{
    collections::BTreeMap,
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

use strum::{Display, EnumIter};

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum DiagnosticSeverity {
    /// Generation and loading events.
    #[strum(serialize = "info")]
    Info,

    /// A failure the hook protocol recovered from.
    ///
    /// Callback failures are reported at this level: the invocation carried on as if the
    /// callback had not run, or had not changed the outcome.
    #[strum(serialize = "warn")]
    Warning,

    /// A failure that could not be recovered from.
    #[strum(serialize = "error")]
    Error,
}

/// Category indicating the source of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum DiagnosticCategory {
    /// A before or after callback failed.
    Callback,

    /// Code generation for a target.
    Generation,

    /// Loading, linking and setup of a generated unit.
    Loader,
}

/// A single diagnostic entry.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// How serious the entry is.
    pub severity: DiagnosticSeverity,
    /// Where it came from.
    pub category: DiagnosticCategory,
    /// What happened.
    pub message: String,
    /// Name of the generated unit, if the entry relates to one.
    pub unit: Option<String>,
    /// Offset of the reporting instruction inside its method body.
    pub pc: Option<usize>,
}

impl Diagnostic {
    /// Creates an entry without unit or instruction context.
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            unit: None,
            pc: None,
        }
    }

    /// Adds the name of the related unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Adds the instruction offset that produced the entry.
    #[must_use]
    pub fn with_pc(mut self, pc: usize) -> Self {
        self.pc = Some(pc);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.severity, self.category)?;
        match (&self.unit, self.pc) {
            (Some(unit), Some(pc)) => write!(f, " {unit}@{pc:04}")?,
            (Some(unit), None) => write!(f, " {unit}")?,
            (None, Some(pc)) => write!(f, " @{pc:04}")?,
            (None, None) => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Append-only sink for diagnostic entries, shared by every unit of a generator.
///
/// Backed by `boxcar::Vec`, so reporting never blocks a concurrent invocation. A bounded
/// sink stops retaining entries once it is full and only counts them; every entry is still
/// emitted as a `tracing` event.
///
/// # Example
///
/// ```rust
/// use hookgen::diagnostics::{DiagnosticCategory, Diagnostics};
/// use std::sync::Arc;
///
/// let diagnostics = Arc::new(Diagnostics::new());
///
/// let shared = Arc::clone(&diagnostics);
/// std::thread::spawn(move || {
///     shared.warning(DiagnosticCategory::Callback, "after callback failed");
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(diagnostics.warning_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
    max_entries: usize,
    reserved: AtomicUsize,
    dropped: AtomicUsize,
}

impl Diagnostics {
    /// Creates an empty, unbounded sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sink that retains at most `max_entries` entries.
    ///
    /// `0` means unbounded.
    ///
    /// ```rust
    /// use hookgen::diagnostics::{DiagnosticCategory, Diagnostics};
    ///
    /// let diagnostics = Diagnostics::bounded(2);
    /// for call in 0..5 {
    ///     diagnostics.warning(DiagnosticCategory::Callback, format!("call {call} failed"));
    /// }
    /// assert_eq!(diagnostics.len(), 2);
    /// assert_eq!(diagnostics.dropped(), 3);
    /// ```
    #[must_use]
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    /// Maximum number of retained entries, `0` if unbounded.
    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of entries that were reported after the sink was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Records an informational entry.
    pub fn info(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Info, category, message));
    }

    /// Records a recovered failure.
    pub fn warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Warning, category, message));
    }

    /// Records an entry and emits it as a `tracing` event.
    pub fn push(&self, diagnostic: Diagnostic) {
        if diagnostic.severity == DiagnosticSeverity::Info {
            tracing::debug!(
                category = %diagnostic.category,
                unit = diagnostic.unit.as_deref(),
                "{}",
                diagnostic.message
            );
        } else {
            tracing::warn!(
                category = %diagnostic.category,
                severity = %diagnostic.severity,
                unit = diagnostic.unit.as_deref(),
                pc = diagnostic.pc,
                "{}",
                diagnostic.message
            );
        }
        let full = self.max_entries > 0
            && self.reserved.fetch_add(1, Ordering::Relaxed) >= self.max_entries;
        if full {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.entries.push(diagnostic);
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.count()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if any failure (warning or error) was recorded.
    pub fn has_warnings(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Number of entries at [`DiagnosticSeverity::Warning`].
    pub fn warning_count(&self) -> usize {
        self.iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
            .count()
    }

    /// All entries in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Entries above [`DiagnosticSeverity::Info`].
    pub fn failures(&self) -> impl Iterator<Item = &Diagnostic> {
        self.iter().filter(|d| d.severity > DiagnosticSeverity::Info)
    }

    /// Entries of one category.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.iter().filter(|d| d.category == category).collect()
    }

    /// Entries reported by one unit.
    pub fn by_unit(&self, unit: &str) -> Vec<&Diagnostic> {
        self.iter()
            .filter(|d| d.unit.as_deref() == Some(unit))
            .collect()
    }

    /// Number of failures per unit, keyed by unit name. Failures without a unit are skipped.
    pub fn failures_by_unit(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for unit in self.failures().filter_map(|d| d.unit.as_deref()) {
            *counts.entry(unit).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} entries, {} failure(s)",
            self.len(),
            self.failures().count()
        )?;
        if self.dropped() > 0 {
            writeln!(f, "  {} more not retained", self.dropped())?;
        }
        for diagnostic in self.failures() {
            writeln!(f, "  {diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn entry_formatting() {
        let callback = Diagnostic::new(
            DiagnosticSeverity::Warning,
            DiagnosticCategory::Callback,
            "after callback #1 failed",
        )
        .with_unit("EdHooker7")
        .with_pc(42);
        assert_eq!(
            callback.to_string(),
            "warn callback EdHooker7@0042: after callback #1 failed"
        );

        let loaded = Diagnostic::new(
            DiagnosticSeverity::Info,
            DiagnosticCategory::Loader,
            "loaded",
        );
        assert_eq!(loaded.to_string(), "info loader: loaded");
    }

    #[test]
    fn filters() {
        let diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());

        diagnostics.info(DiagnosticCategory::Generation, "generated EdHooker1");
        diagnostics.warning(DiagnosticCategory::Callback, "before callback failed");
        diagnostics.push(
            Diagnostic::new(
                DiagnosticSeverity::Error,
                DiagnosticCategory::Loader,
                "duplicate unit",
            )
            .with_unit("EdHooker2"),
        );
        diagnostics.push(
            Diagnostic::new(
                DiagnosticSeverity::Warning,
                DiagnosticCategory::Callback,
                "after callback failed",
            )
            .with_unit("EdHooker1"),
        );

        assert_eq!(diagnostics.len(), 4);
        assert_eq!(diagnostics.warning_count(), 2);
        assert_eq!(diagnostics.failures().count(), 3);
        assert!(diagnostics.has_warnings());
        assert_eq!(diagnostics.by_category(DiagnosticCategory::Callback).len(), 2);
        assert_eq!(diagnostics.by_unit("EdHooker1").len(), 1);

        let per_unit = diagnostics.failures_by_unit();
        assert_eq!(per_unit.get("EdHooker1"), Some(&1));
        assert_eq!(per_unit.get("EdHooker2"), Some(&1));

        let listing = diagnostics.to_string();
        assert!(listing.starts_with("4 entries, 3 failure(s)"));
        assert!(!listing.contains("generated EdHooker1"));
    }

    #[test]
    fn category_names() {
        use strum::IntoEnumIterator;

        let names: Vec<String> = DiagnosticCategory::iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["callback", "generation", "loader"]);
    }

    #[test]
    fn bounded_sink_counts_overflow() {
        let diagnostics = Diagnostics::bounded(3);
        assert_eq!(diagnostics.max_entries(), 3);

        for call in 0..10 {
            diagnostics.warning(DiagnosticCategory::Callback, format!("call {call}"));
        }

        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics.dropped(), 7);
        let kept: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(kept, vec!["call 0", "call 1", "call 2"]);
        assert!(diagnostics.to_string().contains("7 more not retained"));
    }

    #[test]
    fn bounded_sink_under_contention() {
        let diagnostics = Diagnostics::bounded(100);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        diagnostics.warning(DiagnosticCategory::Callback, "failed");
                    }
                });
            }
        });

        assert_eq!(diagnostics.len(), 100);
        assert_eq!(diagnostics.dropped(), 300);
    }

    #[test]
    fn reports_from_many_threads() {
        let diagnostics = Arc::new(Diagnostics::new());

        thread::scope(|scope| {
            for worker in 0..8 {
                let diagnostics = &diagnostics;
                scope.spawn(move || {
                    for call in 0..50 {
                        diagnostics.warning(
                            DiagnosticCategory::Callback,
                            format!("worker {worker} call {call}"),
                        );
                    }
                });
            }
        });

        assert_eq!(diagnostics.warning_count(), 400);
    }
}
