//! Diagnostics collected while transforming units.
//!
//! Transformation failures never reach the host: a failed bundle is rolled back, a failed
//! unit is returned unchanged. What remains is a [`Diagnostic`] recorded here and a log line.
//!
//! The [`Diagnostics`] container uses `boxcar::Vec` for lock-free appends, so host loading
//! threads can report concurrently without coordination.
//!
//! # Key Components
//!
//! - [`Diagnostics`] - Thread-safe, append-only container
//! - [`Diagnostic`] - One entry with unit, bundle and rule context
//! - [`DiagnosticKind`] - Why the entry was recorded
//!
//! # Examples
//!
//! ```rust
//! use classweave::mixin::{Diagnostic, DiagnosticKind, Diagnostics};
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.push(
//!     Diagnostic::new(DiagnosticKind::Configuration, "com/example/Player", "No method 'tick'")
//!         .with_bundle("PlayerMixin")
//!         .with_rule(0),
//! );
//! assert_eq!(diagnostics.count(), 1);
//! assert!(diagnostics.iter().all(|d| d.unit == "com/example/Player"));
//! ```

use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

use log::{error, warn};

/// Why a diagnostic was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A rule does not fit the unit; the bundle was rolled back.
    Configuration,
    /// A name-only method match had several candidates; the first declared was used.
    Ambiguity,
    /// Decoding, encoding or an unexpected panic; the unit was returned unchanged.
    Internal,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Configuration => write!(f, "CONFIG"),
            DiagnosticKind::Ambiguity => write!(f, "AMBIGUOUS"),
            DiagnosticKind::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// A single diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Internal name of the unit being transformed
    pub unit: String,
    /// Name of the bundle, if the entry concerns one
    pub bundle: Option<String>,
    /// Index of the rule inside the bundle
    pub rule: Option<usize>,
    /// Category
    pub kind: DiagnosticKind,
    /// Human-readable description
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic entry.
    ///
    /// # Arguments
    ///
    /// * `kind` - Category of the diagnostic
    /// * `unit` - Internal name of the affected unit
    /// * `message` - Human-readable description
    pub fn new(kind: DiagnosticKind, unit: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            unit: unit.to_string(),
            bundle: None,
            rule: None,
            kind,
            message: message.into(),
        }
    }

    /// Adds the bundle name.
    #[must_use]
    pub fn with_bundle(mut self, bundle: &str) -> Self {
        self.bundle = Some(bundle.to_string());
        self
    }

    /// Adds the rule index.
    #[must_use]
    pub fn with_rule(mut self, rule: usize) -> Self {
        self.rule = Some(rule);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.unit)?;
        if let Some(bundle) = &self.bundle {
            write!(f, " ({bundle}")?;
            if let Some(rule) = self.rule {
                write!(f, " rule #{rule}")?;
            }
            write!(f, ")")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Thread-safe container for diagnostic entries.
///
/// `clear` hides everything recorded so far without needing exclusive access; the
/// underlying storage is append-only.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
    /// Entries below this index were cleared
    floor: AtomicUsize,
}

impl Diagnostics {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic and logs it.
    pub fn push(&self, diagnostic: Diagnostic) {
        match diagnostic.kind {
            DiagnosticKind::Internal => error!("{diagnostic}"),
            DiagnosticKind::Configuration | DiagnosticKind::Ambiguity => warn!("{diagnostic}"),
        }
        self.entries.push(diagnostic);
    }

    /// Returns the number of visible diagnostics.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Returns the number of visible diagnostics of `kind`.
    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.iter().filter(|d| d.kind == kind).count()
    }

    /// Returns an iterator over the visible diagnostics in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        let floor = self.floor.load(Ordering::Acquire);
        self.entries
            .iter()
            .filter(move |(index, _)| *index >= floor)
            .map(|(_, diagnostic)| diagnostic)
    }

    /// Returns the diagnostics recorded for `unit`.
    pub fn for_unit<'s>(&'s self, unit: &'s str) -> impl Iterator<Item = &'s Diagnostic> {
        self.iter().filter(move |d| d.unit == unit)
    }

    /// Hides every diagnostic recorded so far.
    pub fn clear(&self) {
        self.floor.store(self.entries.count(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_display() {
        let d = Diagnostic::new(DiagnosticKind::Configuration, "a/B", "missing")
            .with_bundle("Mixin")
            .with_rule(2);
        assert_eq!(d.to_string(), "[CONFIG] a/B (Mixin rule #2): missing");
        let d = Diagnostic::new(DiagnosticKind::Internal, "a/B", "decode");
        assert_eq!(d.to_string(), "[INTERNAL] a/B: decode");
    }

    #[test]
    fn test_concurrent_push() {
        let diagnostics = Arc::new(Diagnostics::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let diagnostics = Arc::clone(&diagnostics);
                thread::spawn(move || {
                    for i in 0..25 {
                        diagnostics.push(Diagnostic::new(
                            DiagnosticKind::Ambiguity,
                            &format!("u{t}"),
                            format!("{i}"),
                        ));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(diagnostics.count(), 100);
        assert_eq!(diagnostics.for_unit("u1").count(), 25);
    }

    #[test]
    fn test_clear_hides_previous() {
        let diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::new(DiagnosticKind::Internal, "a", "x"));
        diagnostics.clear();
        assert!(diagnostics.is_empty());
        diagnostics.push(Diagnostic::new(DiagnosticKind::Ambiguity, "b", "y"));
        assert_eq!(diagnostics.count(), 1);
        assert_eq!(diagnostics.count_of(DiagnosticKind::Ambiguity), 1);
        assert_eq!(diagnostics.count_of(DiagnosticKind::Internal), 0);
    }
}
