//! Process-wide table of rule bundles keyed by target unit.
//!
//! Readers never lock: each target maps to an immutable, already sorted snapshot
//! (`Arc<[RegisteredBundle]>`) stored in a `crossbeam-skiplist` map. Writers serialise on a
//! mutex, build a new sorted snapshot and publish it with a single insert, so a reader sees
//! either the old list or the new one and never a partially written bundle.
//!
//! # Ordering
//!
//! Bundles of one target are ordered by priority descending, then by registration sequence
//! ascending. The sequence is assigned under the writer lock, so the order depends only on
//! the order of `register` calls.

use std::{
    borrow::Cow,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use crossbeam_skiplist::SkipMap;
use log::debug;

use crate::{mixin::RuleBundle, utils::internal_name};

/// A bundle together with its registration sequence number.
#[derive(Debug, Clone)]
pub struct RegisteredBundle {
    /// The bundle
    pub bundle: Arc<RuleBundle>,
    /// Position in the global registration order
    pub sequence: u64,
}

/// Immutable, sorted bundles of one target.
pub type BundleSnapshot = Arc<[RegisteredBundle]>;

/// The transformation registry.
#[derive(Debug, Default)]
pub struct TransformationRegistry {
    entries: SkipMap<String, BundleSnapshot>,
    writer: Mutex<()>,
    sequence: AtomicU64,
    epoch: AtomicU64,
    rules: AtomicUsize,
    bundles: AtomicUsize,
    enabled: AtomicUsize,
}

impl TransformationRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bundle` under its target unit and return its sequence number.
    ///
    /// A dotted target is stored under its internal name.
    pub fn register(&self, mut bundle: RuleBundle) -> u64 {
        if let Cow::Owned(target) = canonical(&bundle.target_unit) {
            bundle.target_unit = target;
        }
        let _guard = lock!(self.writer);

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let rules = bundle.rules.len();
        let enabled = bundle.enabled;
        let target = bundle.target_unit.clone();

        let mut bundles: Vec<RegisteredBundle> = self
            .entries
            .get(target.as_str())
            .map(|entry| entry.value().to_vec())
            .unwrap_or_default();
        bundles.push(RegisteredBundle {
            bundle: Arc::new(bundle),
            sequence,
        });
        bundles.sort_by(|a, b| {
            b.bundle
                .priority
                .cmp(&a.bundle.priority)
                .then(a.sequence.cmp(&b.sequence))
        });

        debug!(
            "Registered bundle #{} for {} ({} rules, {} bundles for target)",
            sequence,
            target,
            rules,
            bundles.len()
        );
        self.entries.insert(target, Arc::from(bundles));

        self.rules.fetch_add(rules, Ordering::AcqRel);
        self.bundles.fetch_add(1, Ordering::AcqRel);
        if enabled {
            self.enabled.fetch_add(1, Ordering::AcqRel);
        }
        sequence
    }

    /// Bundles registered for `target` (dotted or internal) in application order; empty for
    /// unknown targets
    #[must_use]
    pub fn lookup(&self, target: &str) -> BundleSnapshot {
        let key = canonical(target);
        self.entries
            .get(key.as_ref())
            .map_or_else(|| Arc::from(Vec::new()), |entry| entry.value().clone())
    }

    /// Total number of rules across all bundles, disabled ones included
    #[must_use]
    pub fn count(&self) -> usize {
        self.rules.load(Ordering::Acquire)
    }

    /// Number of registered bundles, disabled ones included
    #[must_use]
    pub fn bundle_count(&self) -> usize {
        self.bundles.load(Ordering::Acquire)
    }

    /// Returns `true` if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundle_count() == 0
    }

    /// Registered targets in lexical order
    #[must_use]
    pub fn targets(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns `true` if at least one enabled bundle is registered
    #[must_use]
    pub fn has_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire) > 0
    }

    /// Returns `true` if `target` has at least one enabled bundle
    #[must_use]
    pub fn has_enabled_for(&self, target: &str) -> bool {
        self.entries
            .get(canonical(target).as_ref())
            .is_some_and(|entry| entry.value().iter().any(|r| r.bundle.enabled))
    }

    /// Remove every bundle and advance the epoch
    pub fn clear(&self) {
        let _guard = lock!(self.writer);
        self.entries.clear();
        self.rules.store(0, Ordering::Release);
        self.bundles.store(0, Ordering::Release);
        self.enabled.store(0, Ordering::Release);
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Registry cleared, epoch {epoch}");
    }

    /// Number of `clear` calls so far; cached decisions are keyed on it
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }
}

fn canonical(target: &str) -> Cow<'_, str> {
    if target.contains('.') || target.trim() != target {
        Cow::Owned(internal_name(target))
    } else {
        Cow::Borrowed(target)
    }
}
